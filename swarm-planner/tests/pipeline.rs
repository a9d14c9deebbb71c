//! End-to-end pipeline tests: request -> scope -> tree -> store, with the
//! completion service replaced by scripted responses.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use swarm_planner::completion::{CompletionOptions, CompletionService};
use swarm_planner::config::PlannerConfig;
use swarm_planner::database::Database;
use swarm_planner::error::PlanError;
use swarm_planner::orchestrator::{Orchestrator, PlanOutcome};
use swarm_planner_sdk::{ProjectStatus, Role, TaskStatus};

/// Replays a fixed queue of completion responses.
struct QueueCompletion {
    responses: Mutex<VecDeque<Result<String, String>>>,
}

impl QueueCompletion {
    fn new(responses: Vec<Result<&str, &str>>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl CompletionService for QueueCompletion {
    async fn complete(
        &self,
        _prompt: &str,
        _options: CompletionOptions,
    ) -> Result<String, PlanError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted completion exhausted")
            .map_err(PlanError::Upstream)
    }
}

fn open_db(dir: &TempDir) -> Database {
    let db = Database::new(dir.path().join("swarms.db")).unwrap();
    db.initialize_schema().unwrap();
    db
}

const BLOG_SCOPE: &str = r#"{
    "project_name": "MarkdownBlog",
    "goal": "A blog engine with markdown authoring and publishing",
    "tech_stack": {"frontend": "Next.js + Tailwind", "backend": "FastAPI", "database": "PostgreSQL"},
    "features": ["markdown posts", "tags", "RSS feed"],
    "comparables": ["Ghost (polished, paid)", "Jekyll (static, no editor)"],
    "timeline": "1-2h MVP",
    "outcome": "Blog running on localhost:3000",
    "scope_of_work": {
        "in_scope": ["Research", "Design", "Implementation"],
        "out_scope": ["Native apps"],
        "milestones": ["M1: Research done", "M2: Design specs", "M3: MVP"],
        "risks": ["Markdown edge cases (use battle-tested parser)"],
        "kpis": ["Lighthouse 90+"]
    }
}"#;

fn subtask_array(role_index: usize) -> String {
    let items: Vec<String> = (1..=4)
        .map(|i| {
            format!(
                r#"{{"id": "{role_index}.{i}", "title": "Step {role_index}.{i}", "description": "Work on step {i}", "priority": "high", "tools": ["search"]}}"#
            )
        })
        .collect();
    format!("[{}]", items.join(","))
}

#[tokio::test]
async fn blog_request_creates_a_full_tracked_tree() {
    let dir = TempDir::new().unwrap();
    let sub1 = subtask_array(1);
    let sub2 = subtask_array(2);
    let sub3 = subtask_array(3);
    let completion = QueueCompletion::new(vec![
        Ok(BLOG_SCOPE),
        Ok(sub1.as_str()),
        Ok(sub2.as_str()),
        Ok(sub3.as_str()),
    ]);
    let orchestrator = Orchestrator::new(open_db(&dir), completion, PlannerConfig::default());

    let outcome = orchestrator
        .handle_request("Build a blog with markdown support")
        .await
        .unwrap();

    let PlanOutcome::Created {
        project_id,
        project_name,
        degraded_roles,
    } = outcome
    else {
        panic!("expected created outcome");
    };
    assert_eq!(project_name, "MarkdownBlog");
    assert!(degraded_roles.is_empty());

    let tree = orchestrator.database().read_tree(&project_id).unwrap();
    assert_eq!(tree.status, ProjectStatus::Active);
    assert_eq!(tree.tasks.len(), 3);

    let ids: Vec<String> = tree
        .tasks
        .iter()
        .flat_map(|t| t.subtasks.iter().map(|s| s.id.clone()))
        .collect();
    let expected: Vec<String> = (1..=3)
        .flat_map(|r| (1..=4).map(move |s| format!("{r}.{s}")))
        .collect();
    assert_eq!(ids, expected);
    assert!(tree
        .tasks
        .iter()
        .flat_map(|t| &t.subtasks)
        .all(|s| s.status == TaskStatus::Pending && !s.tools.is_empty()));

    assert_eq!(orchestrator.database().count_projects().unwrap(), 1);
}

#[tokio::test]
async fn vague_request_persists_nothing() {
    let dir = TempDir::new().unwrap();
    let completion = QueueCompletion::new(vec![]);
    let orchestrator = Orchestrator::new(open_db(&dir), completion, PlannerConfig::default());

    let before = orchestrator.database().count_projects().unwrap();
    let outcome = orchestrator.handle_request("make it better").await.unwrap();

    assert!(matches!(outcome, PlanOutcome::NeedsClarification { ref questions } if !questions.is_empty()));
    assert_eq!(orchestrator.database().count_projects().unwrap(), before);
}

#[tokio::test]
async fn one_degraded_role_still_yields_a_complete_project() {
    let dir = TempDir::new().unwrap();
    let sub1 = subtask_array(1);
    let sub3 = subtask_array(3);
    let completion = QueueCompletion::new(vec![
        Ok(BLOG_SCOPE),
        Ok(sub1.as_str()),
        Err("504 gateway timeout"),
        Ok(sub3.as_str()),
    ]);
    let orchestrator = Orchestrator::new(open_db(&dir), completion, PlannerConfig::default());

    let outcome = orchestrator
        .handle_request("Build a blog with markdown support")
        .await
        .unwrap();
    let PlanOutcome::Created {
        project_id,
        degraded_roles,
        ..
    } = outcome
    else {
        panic!("expected created outcome");
    };

    assert_eq!(degraded_roles, vec![Role::Design]);
    let tree = orchestrator.database().read_tree(&project_id).unwrap();
    // The degraded role still owns a full subtask set with declared tools.
    assert_eq!(tree.tasks[1].subtasks.len(), 4);
    assert!(tree.tasks[1].subtasks.iter().all(|s| !s.tools.is_empty()));
}

#[tokio::test]
async fn extraction_failures_create_no_project() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);

    // Upstream error during extraction.
    let completion = QueueCompletion::new(vec![Err("429 rate limited")]);
    let orchestrator = Orchestrator::new(db, completion, PlannerConfig::default());
    let err = orchestrator
        .handle_request("Build a blog with markdown support")
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::Upstream(_)));
    assert_eq!(orchestrator.database().count_projects().unwrap(), 0);

    // Unparseable scope, even after the repair pass.
    let dir2 = TempDir::new().unwrap();
    let completion = QueueCompletion::new(vec![Ok("I'd be happy to help you plan that!")]);
    let orchestrator = Orchestrator::new(open_db(&dir2), completion, PlannerConfig::default());
    let err = orchestrator
        .handle_request("Build a blog with markdown support")
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::MalformedScope(_)));
    assert_eq!(orchestrator.database().count_projects().unwrap(), 0);
}
