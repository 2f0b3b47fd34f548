//! # Task Model
//!
//! A task is one work item inside a job. Tasks form an ordered tree: every
//! task carries a sparse integer `position` that sorts it among its siblings
//! (same job, same parent), and an optional `parent_task_id` pointing at
//! another task in the same job.
//!
//! ## Database Schema
//!
//! Maps to the `taskboard_tasks` table:
//! - `task_id`: primary key (BIGINT)
//! - `job_id`: owning job (BIGINT)
//! - `parent_task_id`: nullable self-reference, same job only
//! - `position`: sparse ordering value (INTEGER, bounded by the application
//!   ceiling, sibling reads order by `(position, task_id)`)
//! - `version`: optimistic lock counter, +1 per successful mutation
//! - `deleted_at`: soft-delete marker; deleted rows are excluded from
//!   sibling position computations unless explicitly included
//!
//! The `(job_id, parent_task_id, position)` index backs sibling queries.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::constants::TaskStatus;
use crate::ordering::Placement;

/// A persisted task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub task_id: i64,
    pub job_id: i64,
    pub parent_task_id: Option<i64>,
    pub title: String,
    pub status: String,
    pub position: i32,
    pub version: i32,
    pub deleted_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Task {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True when this task sits in the given sibling group and counts for
    /// position computations.
    pub fn is_live_sibling_of(&self, parent_task_id: Option<i64>) -> bool {
        !self.is_deleted() && self.parent_task_id == parent_task_id
    }
}

/// Input for task creation. The placement is transient intent, resolved to a
/// concrete position by the allocator at creation time and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub job_id: i64,
    pub parent_task_id: Option<i64>,
    pub title: String,
    pub status: TaskStatus,
    pub placement: Placement,
}
