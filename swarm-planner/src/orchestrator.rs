//! Request -> scope -> swarm pipeline.
//!
//! Glue between the stateless planning stages and the plan store. A request
//! either produces a clarification turn (nothing persisted) or a fully
//! persisted project tree; there is no in-between state a caller can observe.

use tracing::info;
use uuid::Uuid;

use swarm_planner_sdk::Role;

use crate::completion::CompletionService;
use crate::config::PlannerConfig;
use crate::database::{Database, NewProject};
use crate::error::Result;
use crate::planner::{generate, scope};

/// Outcome of handling one user request.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    /// The request was too vague to plan; re-prompt with these questions.
    NeedsClarification { questions: Vec<String> },
    /// A full project tree was created and is visible to observers.
    Created {
        project_id: String,
        project_name: String,
        /// Roles whose subtask content fell back to templates. Informational;
        /// the tree is complete either way.
        degraded_roles: Vec<Role>,
    },
}

/// Entry point tying extraction, generation, and persistence together.
pub struct Orchestrator<C> {
    db: Database,
    completion: C,
    config: PlannerConfig,
}

impl<C: CompletionService> Orchestrator<C> {
    pub fn new(db: Database, completion: C, config: PlannerConfig) -> Self {
        Self {
            db,
            completion,
            config,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Handle one free-form request.
    ///
    /// Extraction failures (`Upstream`, `MalformedScope`) propagate before
    /// anything is written. Generation degrades per role but never fails the
    /// pipeline, so the only write is the single atomic tree insert.
    pub async fn handle_request(&self, request: &str) -> Result<PlanOutcome> {
        let scope = match scope::extract(&self.completion, request).await? {
            scope::ScopeOutcome::NeedsClarification { questions } => {
                return Ok(PlanOutcome::NeedsClarification { questions });
            }
            scope::ScopeOutcome::Scope(scope) => scope,
        };

        let generation = generate::generate(&self.completion, &self.config, &scope).await;

        let project = NewProject {
            id: Uuid::new_v4().to_string(),
            name: scope.project_name.clone(),
            metadata: serde_json::to_string(&scope)?,
        };
        self.db.create_project_tree(&project, &generation.tasks)?;

        info!(
            project_id = %project.id,
            name = %project.name,
            tasks = generation.tasks.len(),
            degraded = generation.degraded_roles.len(),
            "project tree created"
        );

        Ok(PlanOutcome::Created {
            project_id: project.id,
            project_name: project.name,
            degraded_roles: generation.degraded_roles,
        })
    }
}
