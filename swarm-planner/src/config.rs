//! Provider and planner configuration.
//!
//! The completion provider is selected through environment variables (loaded
//! from `.env` when present), matching the deployment convention of the
//! surrounding stack: `AI_PROVIDER` picks OpenRouter or XAI, each with its own
//! key, endpoint, and default model.

use std::env;
use std::time::Duration;

use anyhow::{bail, Result};
use swarm_planner_sdk::{Priority, Role};

const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const XAI_ENDPOINT: &str = "https://api.x.ai/v1/chat/completions";

/// Connection settings for the chat-completions provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// OpenRouter attribution headers; unused for XAI direct.
    pub referer: Option<String>,
    pub app_name: Option<String>,
    /// Upper bound on a single completion call. The extraction and generation
    /// paths fail rather than hang past this.
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Build the provider configuration from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let provider = env::var("AI_PROVIDER").unwrap_or_else(|_| "openrouter".to_string());
        let timeout = env::var("COMPLETION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        match provider.as_str() {
            "openrouter" => {
                let Ok(api_key) = env::var("OPENROUTER_API_KEY") else {
                    bail!("OPENROUTER_API_KEY not set (required for AI_PROVIDER=openrouter)");
                };
                Ok(Self {
                    endpoint: OPENROUTER_ENDPOINT.to_string(),
                    api_key,
                    model: env::var("OPENROUTER_MODEL")
                        .unwrap_or_else(|_| "x-ai/grok-4-fast".to_string()),
                    referer: env::var("OPENROUTER_REFERER").ok(),
                    app_name: env::var("OPENROUTER_APP_NAME").ok(),
                    timeout,
                })
            }
            "xai" => {
                let Ok(api_key) = env::var("XAI_API_KEY") else {
                    bail!("XAI_API_KEY not set (required for AI_PROVIDER=xai)");
                };
                Ok(Self {
                    endpoint: XAI_ENDPOINT.to_string(),
                    api_key,
                    model: env::var("XAI_MODEL").unwrap_or_else(|_| "grok-beta".to_string()),
                    referer: None,
                    app_name: None,
                    timeout,
                })
            }
            other => bail!("unknown AI_PROVIDER `{other}` (expected `openrouter` or `xai`)"),
        }
    }
}

/// Generation plan for one worker role: the parent task template plus the
/// role -> capability mapping its subtasks draw from.
#[derive(Debug, Clone)]
pub struct RolePlan {
    pub role: Role,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    /// Fixed subtask count for this role.
    pub subtask_count: usize,
    /// Capability names available to this role's subtasks.
    pub tools: Vec<String>,
}

/// Full planner configuration: the ordered role list.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub roles: Vec<RolePlan>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let strings = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            roles: vec![
                RolePlan {
                    role: Role::Research,
                    title: "Research Project Requirements".to_string(),
                    description: "Gather information about project scope, competitors, and market"
                        .to_string(),
                    priority: Priority::High,
                    subtask_count: 4,
                    tools: strings(&["search", "web-scraper", "messaging"]),
                },
                RolePlan {
                    role: Role::Design,
                    title: "Design System Architecture".to_string(),
                    description: "Create architecture, wireframes, and technical specifications"
                        .to_string(),
                    priority: Priority::High,
                    subtask_count: 4,
                    tools: strings(&["diagramming", "schema-gen", "api-designer"]),
                },
                RolePlan {
                    role: Role::Implementation,
                    title: "Implementation Planning".to_string(),
                    description: "Plan resource allocation, timeline, and execution strategy"
                        .to_string(),
                    priority: Priority::Medium,
                    subtask_count: 4,
                    tools: strings(&["code-gen", "storage-sync", "test-runner"]),
                },
            ],
        }
    }
}
