//! # Task Store
//!
//! Persistence seam for the engine. The coordinator plans against a job
//! snapshot and hands the store a complete [`WriteSet`]; the store applies
//! it in exactly one transaction, compare-and-setting every row against the
//! version the plan was built from. A lost race rolls back and surfaces a
//! conflict carrying the now-current state.
//!
//! Two implementations ship: [`PgTaskStore`] over sqlx/Postgres for
//! production, and [`MemoryTaskStore`] with identical semantics for
//! embedded use and tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryTaskStore;
pub use postgres::PgTaskStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Job, JobSnapshot, NewTask, Task};

/// One staged row mutation. Carries the final values, not deltas: the plan
/// already knows exactly what the row should look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWrite {
    pub task_id: i64,
    /// Version the row had when the plan was built; the compare-and-set
    /// anchor. A mismatch at apply time means another writer committed
    /// first.
    pub expected_version: i32,
    pub position: i32,
    pub parent_task_id: Option<i64>,
    /// Soft-delete marker for the row after the write.
    pub deleted: bool,
}

/// An atomic multi-row mutation of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteSet {
    pub job_id: i64,
    /// Job version the plan was built from. The job row is compare-and-set
    /// first, so racing batches serialize on it: first committer wins.
    pub expected_job_version: i32,
    pub writes: Vec<TaskWrite>,
}

/// Refreshed state returned after a successful apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedBatch {
    pub job_version: i32,
    /// All tasks of the job after the write, ordered by `(position,
    /// task_id)`, soft-deleted rows included.
    pub tasks: Vec<Task>,
}

/// Transactional, versioned persistence for jobs and tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_job(&self, name: &str) -> Result<Job>;

    async fn find_job(&self, job_id: i64) -> Result<Option<Job>>;

    /// Consistent read of a job and all of its tasks (deleted included).
    async fn load_job(&self, job_id: i64) -> Result<JobSnapshot>;

    async fn find_task(&self, task_id: i64) -> Result<Option<Task>>;

    /// Insert a task at an already-resolved position. The job row is
    /// compare-and-set against `expected_job_version` and advanced, so a
    /// concurrent structural change rejects the insert.
    async fn insert_task(
        &self,
        new_task: &NewTask,
        position: i32,
        expected_job_version: i32,
    ) -> Result<Task>;

    /// Apply a write set atomically: every row compare-and-set and advanced
    /// by exactly one version, the job row advanced, all-or-nothing.
    async fn apply(&self, write_set: &WriteSet) -> Result<AppliedBatch>;
}
