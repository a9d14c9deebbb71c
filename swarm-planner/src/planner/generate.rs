//! Task generation: scope -> fixed two-level role tree.
//!
//! The tree shape is deterministic: one task per configured role, exactly the
//! configured subtask count per task, IDs assigned positionally
//! (`"{role_index}.{subtask_index}"`) no matter what the completion service
//! returned. Subtask *content* comes from one completion call per role; a
//! role whose call fails or parses badly falls back to templated subtasks
//! instead of aborting the tree, because the other roles' trees are
//! independently valid.

use tracing::warn;

use swarm_planner_sdk::{Priority, Role, TaskStatus};

use crate::completion::{CompletionOptions, CompletionService};
use crate::config::{PlannerConfig, RolePlan};
use crate::error::{PlanError, Result};
use crate::planner::scope::extract_json_block;
use crate::planner::types::{Scope, SubtaskDraft};

/// One task ready for persistence, with its subtasks.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    /// Role index as a string: `"1"`..`"{n}"`.
    pub id: String,
    pub role: Role,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub level: u8,
    pub dependencies: Vec<String>,
    pub subtasks: Vec<SubtaskPlan>,
}

/// One subtask ready for persistence.
#[derive(Debug, Clone)]
pub struct SubtaskPlan {
    /// Positional ID: `"{role_index}.{subtask_index}"`.
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub tools: Vec<String>,
}

/// Output of generation: the full tree plus which roles degraded to template
/// content. Degradation is logged, not surfaced as failure.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub tasks: Vec<TaskPlan>,
    pub degraded_roles: Vec<Role>,
}

fn role_prompt(plan: &RolePlan, scope: &Scope) -> String {
    let project = &scope.project_name;
    let count = plan.subtask_count;
    let focus = match plan.role {
        Role::Research => {
            let comparables = if scope.comparables.is_empty() {
                "industry standards".to_string()
            } else {
                scope.comparables.join("; ")
            };
            format!(
                "Goal: {}\nFeatures: {}\nComparables to analyze: {}\n\nFocus on user requirements, competitor analysis, and stack validation.",
                scope.goal,
                scope.features.join(", "),
                comparables
            )
        }
        Role::Design => {
            let stack: Vec<String> = scope
                .tech_stack
                .iter()
                .map(|(facet, desc)| format!("{facet}: {desc}"))
                .collect();
            format!(
                "Stack: {}\nFeatures: {}\n\nFocus on wireframes, data schema, API specification, and integrations.",
                stack.join("; "),
                scope.features.join(", ")
            )
        }
        Role::Implementation => format!(
            "Timeline: {}\nIn scope: {}\nMilestones: {}\n\nFocus on resource allocation, development timeline, risk assessment, and delivery preparation.",
            scope.timeline,
            scope.scope_of_work.in_scope.join(", "),
            scope.scope_of_work.milestones.join(", ")
        ),
    };

    format!(
        r#"You are a {role} specialist agent in a swarm for project "{project}".

{focus}

Generate exactly {count} {role} subtasks as a JSON array. Available tools: {tools}.

**Output Format** (ONLY a JSON array, no markdown):
[
  {{
    "id": "{idx}.1",
    "title": "...",
    "description": "...",
    "priority": "high",
    "tools": ["{first_tool}"]
  }},
  ... ({count} total)
]

Make titles specific to {project}. Every subtask must declare at least one tool."#,
        role = plan.role,
        idx = plan.role.index(),
        tools = plan.tools.join(", "),
        first_tool = plan.tools.first().map(String::as_str).unwrap_or("search"),
    )
}

/// Parse the drafted subtask array, applying the single repair pass.
pub fn parse_subtask_drafts(raw: &str) -> Result<Vec<SubtaskDraft>> {
    match serde_json::from_str::<Vec<SubtaskDraft>>(raw) {
        Ok(drafts) => Ok(drafts),
        Err(_) => {
            let repaired = extract_json_block(raw, '[', ']');
            serde_json::from_str::<Vec<SubtaskDraft>>(repaired).map_err(|e| {
                PlanError::MalformedScope(format!("subtask JSON invalid after repair: {e}"))
            })
        }
    }
}

fn fallback_title(role: Role, index: usize) -> String {
    let templates: [&str; 4] = match role {
        Role::Research => [
            "Gather user requirements",
            "Analyze comparable products",
            "Validate the proposed stack",
            "Summarize research findings",
        ],
        Role::Design => [
            "Design wireframes for main features",
            "Design the data schema",
            "Specify API endpoints",
            "Outline third-party integrations",
        ],
        Role::Implementation => [
            "Allocate roles and resources",
            "Draft the development timeline",
            "Assess delivery risks",
            "Prepare the local and deploy environments",
        ],
    };
    match templates.get(index) {
        Some(title) => (*title).to_string(),
        None => format!("Additional {role} checkpoint {}", index + 1),
    }
}

fn fallback_subtask(plan: &RolePlan, scope: &Scope, index: usize) -> SubtaskPlan {
    SubtaskPlan {
        id: format!("{}.{}", plan.role.index(), index + 1),
        title: fallback_title(plan.role, index),
        description: format!("{} for {}", fallback_title(plan.role, index), scope.project_name),
        status: TaskStatus::Pending,
        priority: plan.priority,
        tools: plan.tools.clone(),
    }
}

/// Template-only subtasks for one role, used when content generation fails.
pub fn template_subtasks(plan: &RolePlan, scope: &Scope) -> Vec<SubtaskPlan> {
    (0..plan.subtask_count)
        .map(|i| fallback_subtask(plan, scope, i))
        .collect()
}

/// Normalize drafts into exactly `subtask_count` subtasks with positional
/// IDs. Surplus drafts are dropped, missing ones are filled from templates,
/// and unusable fields (blank title, unknown priority, empty tool list) fall
/// back per-field.
fn normalize_drafts(plan: &RolePlan, scope: &Scope, drafts: Vec<SubtaskDraft>) -> Vec<SubtaskPlan> {
    let mut drafts = drafts.into_iter();
    (0..plan.subtask_count)
        .map(|i| match drafts.next() {
            Some(draft) if !draft.title.trim().is_empty() => SubtaskPlan {
                id: format!("{}.{}", plan.role.index(), i + 1),
                title: draft.title.trim().to_string(),
                description: if draft.description.trim().is_empty() {
                    format!("{} for {}", draft.title.trim(), scope.project_name)
                } else {
                    draft.description.trim().to_string()
                },
                status: TaskStatus::Pending,
                priority: Priority::parse(&draft.priority).unwrap_or(plan.priority),
                tools: if draft.tools.is_empty() {
                    plan.tools.clone()
                } else {
                    draft.tools
                },
            },
            _ => fallback_subtask(plan, scope, i),
        })
        .collect()
}

fn task_for_role(plan: &RolePlan, scope: &Scope, subtasks: Vec<SubtaskPlan>) -> TaskPlan {
    TaskPlan {
        id: plan.role.index().to_string(),
        role: plan.role,
        title: plan.title.clone(),
        description: format!("{} for {}", plan.description, scope.project_name),
        status: TaskStatus::Pending,
        priority: plan.priority,
        level: 0,
        // The generator creates no cross-role ordering; the field exists for
        // future dependency-aware scheduling.
        dependencies: Vec::new(),
        subtasks,
    }
}

/// Build the whole tree from templates, without any completion call.
///
/// This is the degraded path applied role-by-role in [`generate`]; it also
/// gives tests a deterministic tree.
pub fn template_plan(config: &PlannerConfig, scope: &Scope) -> Vec<TaskPlan> {
    config
        .roles
        .iter()
        .map(|plan| task_for_role(plan, scope, template_subtasks(plan, scope)))
        .collect()
}

/// Expand a scope into the full role tree.
///
/// Deterministic in structure: `config.roles.len()` tasks, each with its
/// configured subtask count, IDs `"{role}.{index}"` with no gaps. Per-role
/// completion failures degrade that role to template subtasks.
pub async fn generate<C>(completion: &C, config: &PlannerConfig, scope: &Scope) -> GenerationResult
where
    C: CompletionService + ?Sized,
{
    let options = CompletionOptions {
        temperature: 0.4,
        max_tokens: 1500,
    };

    let mut tasks = Vec::with_capacity(config.roles.len());
    let mut degraded_roles = Vec::new();

    for plan in &config.roles {
        let drafted = match completion.complete(&role_prompt(plan, scope), options).await {
            Ok(raw) => parse_subtask_drafts(&raw),
            Err(e) => Err(e),
        };
        let subtasks = match drafted {
            Ok(drafts) => normalize_drafts(plan, scope, drafts),
            Err(e) => {
                warn!(role = %plan.role, error = %e, "subtask generation degraded to templates");
                degraded_roles.push(plan.role);
                template_subtasks(plan, scope)
            }
        };
        tasks.push(task_for_role(plan, scope, subtasks));
    }

    GenerationResult {
        tasks,
        degraded_roles,
    }
}
