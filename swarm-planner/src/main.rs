use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use swarm_planner::completion::ChatCompletionClient;
use swarm_planner::config::{PlannerConfig, ProviderConfig};
use swarm_planner::database::Database;
use swarm_planner::orchestrator::{Orchestrator, PlanOutcome};
use swarm_planner_sdk::{EntityKind, ProjectStatus, ProjectTree, TaskStatus};

/// Scope-to-swarm task decomposition and execution tracking
#[derive(Parser, Debug)]
#[command(name = "swarm-planner")]
#[command(about = "Turn a free-form project request into a tracked task tree")]
#[command(version)]
struct Cli {
    /// Path to the plan database (defaults to ~/.swarm-planner/swarms.db)
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn a free-form request into a persisted project plan
    Plan {
        /// The project request, e.g. "Build a blog with markdown support"
        request: String,
    },

    /// List known projects, most recent first
    List,

    /// Print the full task tree for a project
    Show {
        project_id: String,

        /// Emit the tree as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Report a worker status transition for a task or subtask
    ///
    /// Entity IDs containing a dot ("2.3") address subtasks; bare role
    /// indexes ("2") address tasks.
    Update {
        project_id: String,
        entity_id: String,

        /// New status: in_progress, completed, or failed
        #[arg(long)]
        status: String,

        /// Optional result payload to attach
        #[arg(long)]
        output: Option<String>,
    },

    /// Poll a project tree and print progress until it reaches a terminal status
    Watch {
        project_id: String,

        /// Seconds between polls
        #[arg(long, default_value_t = 3)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("swarm_planner=info")),
        )
        .init();

    let cli = Cli::parse();
    let db = Database::new(cli.db.unwrap_or_else(Database::default_path))?;
    db.initialize_schema()?;

    match cli.command {
        Command::Plan { request } => {
            let provider = ProviderConfig::from_env()?;
            let client = ChatCompletionClient::new(provider)?;
            let orchestrator = Orchestrator::new(db, client, PlannerConfig::default());

            match orchestrator.handle_request(&request).await? {
                PlanOutcome::NeedsClarification { questions } => {
                    println!("That request needs some detail before it can be planned:");
                    for question in questions {
                        println!("  - {question}");
                    }
                }
                PlanOutcome::Created {
                    project_id,
                    project_name,
                    degraded_roles,
                } => {
                    println!("Project '{project_name}' created: {project_id}");
                    if !degraded_roles.is_empty() {
                        let roles: Vec<String> =
                            degraded_roles.iter().map(|r| r.to_string()).collect();
                        println!(
                            "note: template subtasks used for: {} (completion unavailable)",
                            roles.join(", ")
                        );
                    }
                    print_tree(&orchestrator.database().read_tree(&project_id)?);
                }
            }
        }

        Command::List => {
            let projects = db.list_projects()?;
            if projects.is_empty() {
                println!("No projects yet. Try: swarm-planner plan \"Build a blog\"");
            }
            for project in projects {
                println!(
                    "{}  {:9}  {}  {}",
                    project.created_at.format("%Y-%m-%d %H:%M"),
                    project.status.to_string(),
                    project.id,
                    project.name
                );
            }
        }

        Command::Show { project_id, json } => {
            let tree = db.read_tree(&project_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                print_tree(&tree);
            }
        }

        Command::Update {
            project_id,
            entity_id,
            status,
            output,
        } => {
            let Some(status) = TaskStatus::parse(&status) else {
                bail!("unknown status `{status}` (expected pending, in_progress, completed, or failed)");
            };
            let kind = if entity_id.contains('.') {
                EntityKind::Subtask
            } else {
                EntityKind::Task
            };
            db.update_status(kind, &project_id, &entity_id, status, output.as_deref())
                .with_context(|| format!("updating {kind} {entity_id}"))?;
            println!("{kind} {entity_id} -> {status}");
        }

        Command::Watch {
            project_id,
            interval,
        } => {
            loop {
                let tree = db.read_tree(&project_id)?;
                let (done, total) = subtask_progress(&tree);
                println!(
                    "[{}] {}: {}/{} subtasks completed, status {}",
                    chrono::Local::now().format("%H:%M:%S"),
                    tree.name,
                    done,
                    total,
                    tree.status
                );
                if tree.status != ProjectStatus::Active {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(interval)).await;
            }
        }
    }

    Ok(())
}

fn status_marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "[ ]",
        TaskStatus::InProgress => "[~]",
        TaskStatus::Completed => "[x]",
        TaskStatus::Failed => "[!]",
    }
}

fn subtask_progress(tree: &ProjectTree) -> (usize, usize) {
    let total = tree.tasks.iter().map(|t| t.subtasks.len()).sum();
    let done = tree
        .tasks
        .iter()
        .flat_map(|t| &t.subtasks)
        .filter(|s| s.status == TaskStatus::Completed)
        .count();
    (done, total)
}

fn print_tree(tree: &ProjectTree) {
    println!("\n{} ({}) status: {}", tree.name, tree.id, tree.status);
    for task in &tree.tasks {
        println!(
            "  {} {} {} [{}]",
            status_marker(task.status),
            task.id,
            task.title,
            task.role
        );
        for subtask in &task.subtasks {
            println!(
                "      {} {} {} (tools: {})",
                status_marker(subtask.status),
                subtask.id,
                subtask.title,
                subtask.tools.join(", ")
            );
        }
    }
}
