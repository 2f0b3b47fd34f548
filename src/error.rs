//! # Structured Error Handling
//!
//! One error taxonomy for the whole engine. Conflicts are first-class and
//! recoverable: they carry the current authoritative state so a caller can
//! reconcile and retry without an extra round trip. Everything that reaches
//! the persistence layer is all-or-nothing, so an error here always means
//! "nothing was changed" for the operation that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::JobSnapshot;

/// Which kind of row a conflict or lookup failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictEntity {
    Job,
    Task,
}

impl fmt::Display for ConflictEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictEntity::Job => f.write_str("job"),
            ConflictEntity::Task => f.write_str("task"),
        }
    }
}

/// Error taxonomy for ordering and hierarchy operations.
#[derive(Debug, thiserror::Error)]
pub enum OrderingError {
    /// Malformed directive. Nothing was attempted against the store.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Stale version detected, either against a caller-supplied expected
    /// version or at commit time when another writer got there first.
    /// Recoverable: refetch (or use `snapshot`) and resubmit.
    #[error("stale version for {entity} {id}: expected {expected}, current {current}")]
    Conflict {
        entity: ConflictEntity,
        id: i64,
        expected: i32,
        current: i32,
        /// Fresh authoritative state of the job at the time of rejection.
        snapshot: Option<JobSnapshot>,
    },

    /// The requested parent change would make a task its own ancestor.
    #[error("task {task_id} cannot be re-parented under {parent_id}: would create a cycle")]
    Cycle { task_id: i64, parent_id: i64 },

    /// Referenced task, neighbor, parent, or job is missing or out of scope.
    #[error("{entity} {id} not found")]
    NotFound { entity: ConflictEntity, id: i64 },

    /// A sibling group has no insertion headroom left even after rebalancing.
    #[error("no insertion headroom left in a sibling group of job {job_id}")]
    Exhausted {
        job_id: i64,
        parent_id: Option<i64>,
    },

    /// Unexpected persistence failure. The transaction was rolled back.
    #[error("storage failure: {0}")]
    Transaction(String),
}

impl OrderingError {
    /// Attach the fresh job snapshot to a conflict. No-op for other variants.
    pub fn with_snapshot(mut self, snap: JobSnapshot) -> Self {
        if let OrderingError::Conflict { snapshot, .. } = &mut self {
            *snapshot = Some(snap);
        }
        self
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, OrderingError::Conflict { .. })
    }
}

impl From<sqlx::Error> for OrderingError {
    fn from(err: sqlx::Error) -> Self {
        OrderingError::Transaction(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrderingError>;
