//! SQLite plan store for projects, tasks, and subtasks.
//!
//! The store is the single shared mutable resource in the engine. It provides:
//!
//! - **Atomic tree creation**: `create_project_tree` inserts the project and
//!   every task and subtask in one transaction; readers see the whole tree or
//!   none of it.
//! - **Guarded status updates**: `update_status` checks the transition against
//!   the state machine inside the same transaction that applies it, so
//!   conflicting writers serialize per entity and an illegal transition leaves
//!   the row untouched.
//! - **Consistent snapshots**: `read_tree` assembles the nested
//!   Project -> Tasks -> Subtasks view inside one transaction; project and
//!   task statuses are derived from children at read time rather than stored
//!   a second time.
//!
//! WAL mode plus a busy timeout let independent worker processes each open
//! their own connection to the same database file and update unrelated
//! subtasks in parallel; SQLite serializes the conflicting writes.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use swarm_planner_sdk::{
    can_transition, derive_project_status, derive_task_status, EntityKind, Priority, ProjectStatus,
    ProjectSummary, ProjectTree, Role, SubtaskNode, TaskNode, TaskStatus,
};

use crate::error::{PlanError, Result};
use crate::planner::generate::TaskPlan;

/// Database wrapper for plan persistence.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

/// A project about to be created, before any rows exist.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub id: String,
    pub name: String,
    /// Serialized scope summary.
    pub metadata: String,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PlanError::StoreUnavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)?;

        // WAL for concurrent readers/writers across worker processes.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // Wait out a sibling writer's transaction instead of failing fast.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(Self { conn })
    }

    /// In-memory database for tests.
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    /// Default on-disk location: `~/.swarm-planner/swarms.db`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".swarm-planner")
            .join("swarms.db")
    }

    /// Create all tables and indexes.
    pub fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_projects_created_at ON projects(created_at DESC);

            CREATE TABLE IF NOT EXISTS tasks (
                project_id TEXT NOT NULL,
                id TEXT NOT NULL,
                role TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                priority TEXT NOT NULL,
                level INTEGER NOT NULL DEFAULT 0,
                dependencies TEXT NOT NULL DEFAULT '[]',
                output TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,

                PRIMARY KEY (project_id, id),
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

            CREATE TABLE IF NOT EXISTS subtasks (
                project_id TEXT NOT NULL,
                id TEXT NOT NULL,
                task_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                priority TEXT NOT NULL,
                tools TEXT NOT NULL DEFAULT '[]',
                output TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,

                PRIMARY KEY (project_id, id),
                FOREIGN KEY (project_id, task_id) REFERENCES tasks(project_id, id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks(project_id, task_id);
            CREATE INDEX IF NOT EXISTS idx_subtasks_status ON subtasks(status);

            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            INSERT OR IGNORE INTO schema_version (version) VALUES (1);
            "#,
        )?;
        Ok(())
    }

    /// Current schema version.
    pub fn schema_version(&self) -> Result<i32> {
        let version =
            self.conn
                .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
        Ok(version)
    }

    /// Persist a full project tree in one transaction.
    ///
    /// Either the whole tree becomes visible or none of it does: any insert
    /// failure rolls the transaction back, so no reader ever observes a
    /// project with a partial task set.
    pub fn create_project_tree(&self, project: &NewProject, tasks: &[TaskPlan]) -> Result<()> {
        let now = Local::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO projects (id, name, status, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                project.id,
                project.name,
                ProjectStatus::Active.as_str(),
                project.metadata,
                now,
                now
            ],
        )?;

        {
            let mut task_stmt = tx.prepare(
                r#"
                INSERT INTO tasks (
                    project_id, id, role, title, description, status, priority,
                    level, dependencies, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )?;
            let mut subtask_stmt = tx.prepare(
                r#"
                INSERT INTO subtasks (
                    project_id, id, task_id, title, description, status, priority,
                    tools, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )?;

            for task in tasks {
                task_stmt.execute(params![
                    project.id,
                    task.id,
                    task.role.as_str(),
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.priority.as_str(),
                    task.level,
                    serde_json::to_string(&task.dependencies)?,
                    now,
                    now,
                ])?;

                for subtask in &task.subtasks {
                    subtask_stmt.execute(params![
                        project.id,
                        subtask.id,
                        task.id,
                        subtask.title,
                        subtask.description,
                        subtask.status.as_str(),
                        subtask.priority.as_str(),
                        serde_json::to_string(&subtask.tools)?,
                        now,
                        now,
                    ])?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Apply a worker status transition to a task or subtask.
    ///
    /// The transition is validated against the state machine inside the same
    /// transaction that applies it; illegal transitions return
    /// [`PlanError::InvalidTransition`] with the store unchanged. `output`,
    /// when given, replaces the entity's result payload.
    pub fn update_status(
        &self,
        kind: EntityKind,
        project_id: &str,
        entity_id: &str,
        new_status: TaskStatus,
        output: Option<&str>,
    ) -> Result<()> {
        let table = match kind {
            EntityKind::Task => "tasks",
            EntityKind::Subtask => "subtasks",
        };

        // Take the write lock before reading the current status, so the
        // check-then-update pair cannot interleave with a sibling worker's
        // write. The busy timeout waits the lock out instead of failing.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let current: Option<String> = tx
            .query_row(
                &format!("SELECT status FROM {table} WHERE project_id = ?1 AND id = ?2"),
                params![project_id, entity_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(current) = current else {
            return Err(PlanError::NotFound {
                kind: match kind {
                    EntityKind::Task => "task",
                    EntityKind::Subtask => "subtask",
                },
                id: format!("{project_id}/{entity_id}"),
            });
        };
        let from = parse_status(&current)?;

        if !can_transition(from, new_status) {
            return Err(PlanError::InvalidTransition {
                kind,
                id: entity_id.to_string(),
                from,
                to: new_status,
            });
        }

        tx.execute(
            &format!(
                r#"
                UPDATE {table}
                SET status = ?1, output = COALESCE(?2, output), updated_at = ?3
                WHERE project_id = ?4 AND id = ?5
                "#
            ),
            params![
                new_status.as_str(),
                output,
                Local::now().to_rfc3339(),
                project_id,
                entity_id
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Assemble the nested project snapshot in one consistent read.
    ///
    /// Task statuses are effective (stored status combined with subtask
    /// statuses) and the project status derives from those, so observers see
    /// one committed state, never an interleaving of two writes.
    pub fn read_tree(&self, project_id: &str) -> Result<ProjectTree> {
        let tx = self.conn.unchecked_transaction()?;

        let project: Option<(String, String, String)> = tx
            .query_row(
                "SELECT name, metadata, created_at FROM projects WHERE id = ?1",
                params![project_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((name, metadata, created_at)) = project else {
            return Err(PlanError::NotFound {
                kind: "project",
                id: project_id.to_string(),
            });
        };

        // Prepared statements borrow the transaction; keep them scoped so the
        // commit below can take it by value.
        let tasks = {
            let mut task_stmt = tx.prepare(
                r#"
                SELECT id, role, title, description, status, priority, level, dependencies, output
                FROM tasks
                WHERE project_id = ?1
                ORDER BY CAST(id AS INTEGER)
                "#,
            )?;
            let task_rows: Vec<(String, String, String, String, String, String, u8, String, Option<String>)> =
                task_stmt
                    .query_map(params![project_id], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                            row.get(7)?,
                            row.get(8)?,
                        ))
                    })?
                    .collect::<std::result::Result<_, _>>()?;

            let mut subtask_stmt = tx.prepare(
                r#"
                SELECT id, title, description, status, priority, tools, output
                FROM subtasks
                WHERE project_id = ?1 AND task_id = ?2
                ORDER BY rowid
                "#,
            )?;

            let mut tasks = Vec::with_capacity(task_rows.len());
            for (id, role, title, description, status, priority, level, dependencies, output) in
                task_rows
            {
                let subtask_rows: Vec<(String, String, String, String, String, String, Option<String>)> =
                    subtask_stmt
                        .query_map(params![project_id, id], |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                                row.get(5)?,
                                row.get(6)?,
                            ))
                        })?
                        .collect::<std::result::Result<_, _>>()?;

                let mut subtasks = Vec::with_capacity(subtask_rows.len());
                for (sid, stitle, sdesc, sstatus, spriority, tools, soutput) in subtask_rows {
                    subtasks.push(SubtaskNode {
                        id: sid,
                        task_id: id.clone(),
                        title: stitle,
                        description: sdesc,
                        status: parse_status(&sstatus)?,
                        priority: parse_priority(&spriority)?,
                        tools: serde_json::from_str(&tools)?,
                        output: soutput,
                    });
                }

                let stored = parse_status(&status)?;
                let child_statuses: Vec<TaskStatus> = subtasks.iter().map(|s| s.status).collect();
                tasks.push(TaskNode {
                    id,
                    role: parse_role(&role)?,
                    title,
                    description,
                    status: derive_task_status(stored, &child_statuses),
                    priority: parse_priority(&priority)?,
                    level,
                    dependencies: serde_json::from_str(&dependencies)?,
                    output,
                    subtasks,
                });
            }
            tasks
        };

        tx.commit()?;

        let task_statuses: Vec<TaskStatus> = tasks.iter().map(|t| t.status).collect();
        Ok(ProjectTree {
            id: project_id.to_string(),
            name,
            status: derive_project_status(&task_statuses),
            created_at: parse_timestamp(&created_at)?,
            metadata,
            tasks,
        })
    }

    /// List projects, most recent first, with derived statuses.
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let tx = self.conn.unchecked_transaction()?;

        // Scoped so the statement's borrow of the transaction ends before the
        // commit moves it.
        let summaries = {
            let mut stmt = tx.prepare(
                "SELECT id, name, created_at FROM projects ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows: Vec<(String, String, String)> = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<std::result::Result<_, _>>()?;

            let mut summaries = Vec::with_capacity(rows.len());
            for (id, name, created_at) in rows {
                let status = derive_project_status(&self.effective_task_statuses(&tx, &id)?);
                summaries.push(ProjectSummary {
                    id,
                    name,
                    status,
                    created_at: parse_timestamp(&created_at)?,
                });
            }
            summaries
        };

        tx.commit()?;
        Ok(summaries)
    }

    /// Number of stored projects.
    pub fn count_projects(&self) -> Result<usize> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete a project; tasks and subtasks cascade.
    pub fn delete_project(&self, project_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
        Ok(())
    }

    fn effective_task_statuses(
        &self,
        tx: &rusqlite::Transaction<'_>,
        project_id: &str,
    ) -> Result<Vec<TaskStatus>> {
        let mut task_stmt =
            tx.prepare("SELECT id, status FROM tasks WHERE project_id = ?1 ORDER BY CAST(id AS INTEGER)")?;
        let rows: Vec<(String, String)> = task_stmt
            .query_map(params![project_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;

        let mut subtask_stmt =
            tx.prepare("SELECT status FROM subtasks WHERE project_id = ?1 AND task_id = ?2")?;
        let mut statuses = Vec::with_capacity(rows.len());
        for (task_id, stored) in rows {
            let children: Vec<String> = subtask_stmt
                .query_map(params![project_id, task_id], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?;
            let children: Vec<TaskStatus> = children
                .iter()
                .map(|s| parse_status(s))
                .collect::<Result<_>>()?;
            statuses.push(derive_task_status(parse_status(&stored)?, &children));
        }
        Ok(statuses)
    }
}

fn parse_status(s: &str) -> Result<TaskStatus> {
    TaskStatus::parse(s).ok_or_else(|| PlanError::Corrupt(format!("unknown status `{s}`")))
}

fn parse_priority(s: &str) -> Result<Priority> {
    Priority::parse(s).ok_or_else(|| PlanError::Corrupt(format!("unknown priority `{s}`")))
}

fn parse_role(s: &str) -> Result<Role> {
    Role::parse(s).ok_or_else(|| PlanError::Corrupt(format!("unknown role `{s}`")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| PlanError::Corrupt(format!("bad timestamp `{s}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::planner::generate::template_plan;
    use crate::planner::types::Scope;

    fn test_db() -> Database {
        let db = Database::new_in_memory().unwrap();
        db.initialize_schema().unwrap();
        db
    }

    fn test_scope(name: &str) -> Scope {
        let mut scope = Scope::default();
        scope.project_name = name.to_string();
        scope.goal = format!("Ship {name}");
        scope.features = vec!["core".to_string()];
        scope
    }

    fn create_project(db: &Database, name: &str) -> String {
        let scope = test_scope(name);
        let plan = template_plan(&PlannerConfig::default(), &scope);
        let project = NewProject {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            metadata: serde_json::to_string(&scope).unwrap(),
        };
        db.create_project_tree(&project, &plan).unwrap();
        project.id
    }

    fn all_subtask_ids() -> Vec<String> {
        (1..=3)
            .flat_map(|r| (1..=4).map(move |s| format!("{r}.{s}")))
            .collect()
    }

    #[test]
    fn schema_initializes_at_version_one() {
        let db = test_db();
        assert_eq!(db.schema_version().unwrap(), 1);
    }

    #[test]
    fn unreachable_store_location_is_unavailable_not_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        // A file where a parent directory should be makes create_dir_all fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"occupied").unwrap();

        let err = Database::new(blocker.join("nested").join("swarms.db")).unwrap_err();
        assert!(matches!(err, PlanError::StoreUnavailable(_)));
    }

    #[test]
    fn full_tree_round_trips() {
        let db = test_db();
        let id = create_project(&db, "TrackFlow");

        let tree = db.read_tree(&id).unwrap();
        assert_eq!(tree.name, "TrackFlow");
        assert_eq!(tree.status, ProjectStatus::Active);
        assert_eq!(tree.tasks.len(), 3);
        for (i, task) in tree.tasks.iter().enumerate() {
            assert_eq!(task.id, (i + 1).to_string());
            assert_eq!(task.status, TaskStatus::Pending);
            assert_eq!(task.subtasks.len(), 4);
        }
        let ids: Vec<String> = tree
            .tasks
            .iter()
            .flat_map(|t| t.subtasks.iter().map(|s| s.id.clone()))
            .collect();
        assert_eq!(ids, all_subtask_ids());

        // Metadata carries the scope summary back out.
        let scope: Scope = serde_json::from_str(&tree.metadata).unwrap();
        assert_eq!(scope.project_name, "TrackFlow");
    }

    #[test]
    fn reads_are_idempotent_without_writes() {
        let db = test_db();
        let id = create_project(&db, "TrackFlow");
        let first = db.read_tree(&id).unwrap();
        let second = db.read_tree(&id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn failed_tree_insert_leaves_no_partial_project() {
        let db = test_db();
        let scope = test_scope("Broken");
        let mut plan = template_plan(&PlannerConfig::default(), &scope);
        // Duplicate subtask id violates the primary key mid-transaction.
        plan[2].subtasks[3].id = "3.1".to_string();

        let project = NewProject {
            id: "p-broken".to_string(),
            name: "Broken".to_string(),
            metadata: "{}".to_string(),
        };
        let err = db.create_project_tree(&project, &plan);
        assert!(err.is_err());

        assert_eq!(db.count_projects().unwrap(), 0);
        assert!(matches!(
            db.read_tree("p-broken"),
            Err(PlanError::NotFound { .. })
        ));
    }

    #[test]
    fn legal_lifecycle_and_output_persist() {
        let db = test_db();
        let id = create_project(&db, "TrackFlow");

        db.update_status(EntityKind::Subtask, &id, "2.3", TaskStatus::InProgress, None)
            .unwrap();
        db.update_status(
            EntityKind::Subtask,
            &id,
            "2.3",
            TaskStatus::Completed,
            Some("wireframes attached"),
        )
        .unwrap();

        let tree = db.read_tree(&id).unwrap();
        let subtask = &tree.tasks[1].subtasks[2];
        assert_eq!(subtask.status, TaskStatus::Completed);
        assert_eq!(subtask.output.as_deref(), Some("wireframes attached"));
        // Everything else untouched; the project stays active.
        assert_eq!(tree.status, ProjectStatus::Active);
        assert_eq!(tree.tasks[1].status, TaskStatus::InProgress);
        assert_eq!(tree.tasks[0].status, TaskStatus::Pending);
    }

    #[test]
    fn illegal_transitions_are_rejected_and_store_unchanged() {
        let db = test_db();
        let id = create_project(&db, "TrackFlow");

        // Direct pending -> completed skip.
        let err = db
            .update_status(EntityKind::Subtask, &id, "1.1", TaskStatus::Completed, None)
            .unwrap_err();
        assert!(matches!(
            err,
            PlanError::InvalidTransition {
                from: TaskStatus::Pending,
                to: TaskStatus::Completed,
                ..
            }
        ));

        // Terminal statuses are sinks.
        db.update_status(EntityKind::Subtask, &id, "1.1", TaskStatus::Failed, None)
            .unwrap();
        let err = db
            .update_status(EntityKind::Subtask, &id, "1.1", TaskStatus::InProgress, None)
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidTransition { .. }));

        let tree = db.read_tree(&id).unwrap();
        assert_eq!(tree.tasks[0].subtasks[0].status, TaskStatus::Failed);
        assert_eq!(tree.tasks[0].subtasks[1].status, TaskStatus::Pending);
    }

    #[test]
    fn unknown_entities_are_not_found() {
        let db = test_db();
        let id = create_project(&db, "TrackFlow");
        let err = db
            .update_status(EntityKind::Subtask, &id, "9.9", TaskStatus::InProgress, None)
            .unwrap_err();
        assert!(matches!(err, PlanError::NotFound { kind: "subtask", .. }));

        let err = db
            .update_status(EntityKind::Task, "no-such-project", "1", TaskStatus::InProgress, None)
            .unwrap_err();
        assert!(matches!(err, PlanError::NotFound { kind: "task", .. }));
    }

    #[test]
    fn project_completes_when_every_subtask_completes() {
        let db = test_db();
        let id = create_project(&db, "TrackFlow");

        for subtask_id in all_subtask_ids() {
            db.update_status(EntityKind::Subtask, &id, &subtask_id, TaskStatus::InProgress, None)
                .unwrap();
            db.update_status(EntityKind::Subtask, &id, &subtask_id, TaskStatus::Completed, None)
                .unwrap();
        }

        let tree = db.read_tree(&id).unwrap();
        assert!(tree.tasks.iter().all(|t| t.status == TaskStatus::Completed));
        assert_eq!(tree.status, ProjectStatus::Completed);
    }

    #[test]
    fn project_fails_only_once_all_tasks_are_terminal() {
        let db = test_db();
        let id = create_project(&db, "TrackFlow");

        // Task 1: one failed subtask, siblings completed -> task failed.
        db.update_status(EntityKind::Subtask, &id, "1.1", TaskStatus::Failed, None)
            .unwrap();
        for subtask_id in ["1.2", "1.3", "1.4"] {
            db.update_status(EntityKind::Subtask, &id, subtask_id, TaskStatus::InProgress, None)
                .unwrap();
            db.update_status(EntityKind::Subtask, &id, subtask_id, TaskStatus::Completed, None)
                .unwrap();
        }

        // Other roles still pending: failure is not first-failure-wins.
        assert_eq!(db.read_tree(&id).unwrap().status, ProjectStatus::Active);

        for role in [2, 3] {
            for sub in 1..=4 {
                let subtask_id = format!("{role}.{sub}");
                db.update_status(EntityKind::Subtask, &id, &subtask_id, TaskStatus::InProgress, None)
                    .unwrap();
                db.update_status(EntityKind::Subtask, &id, &subtask_id, TaskStatus::Completed, None)
                    .unwrap();
            }
        }

        let tree = db.read_tree(&id).unwrap();
        assert_eq!(tree.tasks[0].status, TaskStatus::Failed);
        assert_eq!(tree.status, ProjectStatus::Failed);
    }

    #[test]
    fn listing_is_most_recent_first_with_derived_status() {
        let db = test_db();
        let first = create_project(&db, "First");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = create_project(&db, "Second");

        let projects = db.list_projects().unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].id, second);
        assert_eq!(projects[1].id, first);
        assert!(projects.iter().all(|p| p.status == ProjectStatus::Active));
    }

    #[test]
    fn deleting_a_project_cascades() {
        let db = test_db();
        let id = create_project(&db, "TrackFlow");
        db.delete_project(&id).unwrap();

        assert_eq!(db.count_projects().unwrap(), 0);
        let orphans: usize = db
            .conn
            .query_row("SELECT COUNT(*) FROM subtasks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn explicit_task_transitions_also_follow_the_state_machine() {
        let db = test_db();
        let id = create_project(&db, "TrackFlow");

        db.update_status(EntityKind::Task, &id, "1", TaskStatus::InProgress, None)
            .unwrap();
        db.update_status(EntityKind::Task, &id, "1", TaskStatus::Failed, Some("blocked"))
            .unwrap();

        let tree = db.read_tree(&id).unwrap();
        // Explicit terminal task status wins over pending children.
        assert_eq!(tree.tasks[0].status, TaskStatus::Failed);
        assert_eq!(tree.tasks[0].output.as_deref(), Some("blocked"));
    }
}
