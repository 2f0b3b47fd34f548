//! # Job Model
//!
//! A job owns an ordered collection of tasks. Its `version` guards
//! structural batch operations that span many task rows: any successful
//! batch reorder, re-parent, creation, or deletion advances it, so a caller
//! holding a stale job version finds out before any of its directives are
//! applied.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::Task;

/// A persisted job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub job_id: i64,
    pub name: String,
    pub version: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A consistent read of one job and all of its task rows, soft-deleted rows
/// included (flagged via `deleted_at`). This is what conflict responses
/// carry back so callers can reconcile local state in one round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: i64,
    pub job_version: i32,
    /// All tasks of the job, ordered by `(position, task_id)`.
    pub tasks: Vec<Task>,
}

impl JobSnapshot {
    pub fn live_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !t.is_deleted())
    }

    pub fn find_task(&self, task_id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    /// Sorted live positions of one sibling group.
    pub fn sibling_positions(&self, parent_task_id: Option<i64>) -> Vec<i32> {
        let mut positions: Vec<i32> = self
            .live_tasks()
            .filter(|t| t.parent_task_id == parent_task_id)
            .map(|t| t.position)
            .collect();
        positions.sort_unstable();
        positions
    }
}
