//! Scope extraction: free-form request -> validated [`Scope`].
//!
//! One completion call builds the structured scope. The raw response gets one
//! repair pass (strip markdown fences or surrounding prose, re-parse) before
//! the extraction fails with `MalformedScope`. Requests too vague to populate
//! a goal or a feature list produce a clarification outcome instead of a
//! project; callers must branch on it before persisting anything.

use tracing::{debug, warn};

use crate::completion::{CompletionOptions, CompletionService};
use crate::error::{PlanError, Result};
use crate::planner::types::Scope;

/// Outcome of scope extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeOutcome {
    Scope(Scope),
    /// The request cannot be planned yet; re-prompt the user with these
    /// questions. Never persisted as a project.
    NeedsClarification { questions: Vec<String> },
}

const GREETING_WORDS: [&str; 3] = ["hey", "hello", "hi"];
const VAGUE_PHRASES: [&str; 2] = ["build something", "help me"];

/// Cheap pre-flight vagueness check, applied before spending a completion
/// call: greetings and near-empty requests go straight to clarification.
pub fn is_vague(request: &str) -> bool {
    let lowered = request.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if words.len() < 5 {
        return true;
    }
    GREETING_WORDS.iter().any(|kw| words.contains(kw))
        || VAGUE_PHRASES.iter().any(|kw| lowered.contains(kw))
}

/// Clarifying questions for a request that cannot be scoped.
pub fn clarifying_questions(request: &str) -> Vec<String> {
    vec![
        format!("What is the goal behind \"{}\"? What problem should it solve?", request.trim()),
        "What type of application is this? (web app, mobile, API, dashboard, ...)".to_string(),
        "Are there specific features, integrations, or constraints it must have?".to_string(),
    ]
}

fn scope_prompt(request: &str) -> String {
    format!(
        r#"You are an expert AI for full-stack development scoping.

User Request: "{request}"

**Task**: Flesh out a complete project scope.

**Output JSON** with these fields:
{{
  "project_name": "ProjectName (CamelCase, descriptive)",
  "goal": "Clear 2-3 sentence goal with the pain point solved",
  "tech_stack": {{
    "frontend": "...",
    "backend": "...",
    "database": "...",
    "deployment": "..."
  }},
  "features": ["feature1 with details", "feature2"],
  "comparables": ["Competitor1 (strength/gap)", "Competitor2"],
  "timeline": "1-2h MVP" or "1 day prod",
  "outcome": "What exists when the work is done",
  "scope_of_work": {{
    "in_scope": ["..."],
    "out_scope": ["..."],
    "milestones": ["M1: ...", "M2: ..."],
    "risks": ["Risk1 (mitigation)"],
    "kpis": ["..."]
  }}
}}

If the request is vague, leave "goal" empty and "features" as [].
Return ONLY valid JSON, no markdown code blocks."#
    )
}

/// Strip non-structural wrapping from a completion response: markdown code
/// fences first, otherwise everything outside the outermost JSON delimiters.
pub fn extract_json_block(raw: &str, open: char, close: char) -> &str {
    if let Some(fenced) = extract_fenced(raw) {
        return fenced;
    }
    match (raw.find(open), raw.rfind(close)) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => raw,
    }
}

fn extract_fenced(raw: &str) -> Option<&str> {
    let start = raw.find("```")?;
    let after = &raw[start + 3..];
    // Skip the language tag on the opening fence, if any.
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Parse the scope response, applying the single repair pass on failure.
pub fn parse_scope(raw: &str) -> Result<Scope> {
    match serde_json::from_str::<Scope>(raw) {
        Ok(scope) => Ok(scope),
        Err(first_err) => {
            let repaired = extract_json_block(raw, '{', '}');
            debug!(%first_err, "scope parse failed, retrying after repair");
            serde_json::from_str::<Scope>(repaired).map_err(|e| {
                PlanError::MalformedScope(format!("scope JSON invalid after repair: {e}"))
            })
        }
    }
}

/// Fill the identifier-safe project label when extraction left it empty.
fn normalize(mut scope: Scope) -> Scope {
    if scope.project_name.trim().is_empty() {
        scope.project_name = derive_project_name(&scope.goal);
    } else {
        scope.project_name = sanitize_name(&scope.project_name);
    }
    scope
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "UserProject".to_string()
    } else {
        cleaned
    }
}

fn derive_project_name(goal: &str) -> String {
    let camel: String = goal
        .split_whitespace()
        .take(3)
        .map(|word| {
            let word: String = word.chars().filter(char::is_ascii_alphanumeric).collect();
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if camel.is_empty() {
        "UserProject".to_string()
    } else {
        camel
    }
}

/// Extract a structured scope from a free-form request.
///
/// Returns `NeedsClarification` for vague requests (pre-flight heuristic, or
/// a parsed scope with neither goal nor features). Upstream and parse
/// failures propagate; no project is created on any error path.
pub async fn extract<C>(completion: &C, request: &str) -> Result<ScopeOutcome>
where
    C: CompletionService + ?Sized,
{
    if is_vague(request) {
        warn!(request, "request too vague to scope");
        return Ok(ScopeOutcome::NeedsClarification {
            questions: clarifying_questions(request),
        });
    }

    let raw = completion
        .complete(&scope_prompt(request), CompletionOptions::default())
        .await?;
    let scope = parse_scope(&raw)?;

    if !scope.is_actionable() {
        warn!(request, "extracted scope has no goal or features");
        return Ok(ScopeOutcome::NeedsClarification {
            questions: clarifying_questions(request),
        });
    }

    Ok(ScopeOutcome::Scope(normalize(scope)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::ScriptedCompletion;

    const BLOG_SCOPE: &str = r#"{
        "project_name": "MarkdownBlog",
        "goal": "A blog engine with markdown authoring",
        "tech_stack": {"frontend": "Next.js", "backend": "FastAPI"},
        "features": ["markdown posts", "tags"],
        "comparables": ["Ghost (polished, paid)"],
        "timeline": "1-2h MVP",
        "outcome": "Blog running locally",
        "scope_of_work": {"in_scope": ["Research"], "out_scope": [], "milestones": [], "risks": [], "kpis": []}
    }"#;

    #[tokio::test]
    async fn well_formed_request_yields_scope() {
        let completion = ScriptedCompletion::new([Ok(BLOG_SCOPE)]);
        let outcome = extract(&completion, "Build a blog with markdown support")
            .await
            .unwrap();
        match outcome {
            ScopeOutcome::Scope(scope) => {
                assert_eq!(scope.project_name, "MarkdownBlog");
                assert!(!scope.goal.is_empty());
                assert!(!scope.features.is_empty());
            }
            other => panic!("expected scope, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn vague_request_needs_clarification_without_a_call() {
        // Scripted with zero responses: a completion call would panic.
        let completion = ScriptedCompletion::new(Vec::<std::result::Result<String, String>>::new());
        let outcome = extract(&completion, "make it better").await.unwrap();
        assert!(matches!(
            outcome,
            ScopeOutcome::NeedsClarification { ref questions } if questions.len() == 3
        ));
    }

    #[tokio::test]
    async fn fenced_response_is_repaired() {
        let fenced = format!("Here is the scope:\n```json\n{BLOG_SCOPE}\n```\nDone.");
        let completion = ScriptedCompletion::new([Ok(fenced)]);
        let outcome = extract(&completion, "Build a blog with markdown support")
            .await
            .unwrap();
        assert!(matches!(outcome, ScopeOutcome::Scope(_)));
    }

    #[tokio::test]
    async fn garbage_after_repair_is_malformed_scope() {
        let completion = ScriptedCompletion::new([Ok("I cannot help with that.")]);
        let err = extract(&completion, "Build a blog with markdown support")
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::MalformedScope(_)));
    }

    #[tokio::test]
    async fn upstream_failure_propagates() {
        let completion = ScriptedCompletion::new([Err("429 rate limited")]);
        let err = extract(&completion, "Build a blog with markdown support")
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Upstream(_)));
    }

    #[tokio::test]
    async fn empty_goal_and_features_become_clarification() {
        let completion =
            ScriptedCompletion::new([Ok(r#"{"project_name": "Mystery", "goal": "", "features": []}"#)]);
        let outcome = extract(&completion, "please do the thing we discussed somewhere")
            .await
            .unwrap();
        assert!(matches!(outcome, ScopeOutcome::NeedsClarification { .. }));
    }

    #[test]
    fn project_name_is_derived_and_sanitized() {
        let scope: Scope =
            serde_json::from_str(r#"{"goal": "ship a blog engine", "features": ["x"]}"#).unwrap();
        assert_eq!(normalize(scope).project_name, "ShipABlog");

        let scope: Scope =
            serde_json::from_str(r#"{"project_name": "Track Flow!", "goal": "g"}"#).unwrap();
        assert_eq!(normalize(scope).project_name, "TrackFlow");
    }

    #[test]
    fn json_block_extraction_handles_prose_wrapping() {
        assert_eq!(extract_json_block("noise {\"a\":1} noise", '{', '}'), "{\"a\":1}");
        assert_eq!(extract_json_block("[1,2]", '[', ']'), "[1,2]");
        assert_eq!(extract_json_block("no json here", '{', '}'), "no json here");
    }
}
