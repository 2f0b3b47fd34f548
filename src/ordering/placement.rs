//! # Placement Requests
//!
//! Transient move intent, passed directly into the allocator at the service
//! boundary. Placements are never persisted: a request is resolved to a
//! concrete position inside the same operation that uses it, so no stale
//! intent can survive between requests.

use serde::{Deserialize, Serialize};

/// Where a task should land within its (target) sibling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Caller-trusted absolute position, used as-is. Collisions are
    /// tolerated and tie-broken by task id at read time.
    Finalized(i32),
    /// Directly after the named sibling.
    After(i64),
    /// Directly before the named sibling.
    Before(i64),
    /// Top of the sibling group.
    First,
    /// Bottom of the sibling group.
    Last,
}

/// Optional parent reassignment bundled with a placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentDirective {
    /// Keep the current parent.
    #[default]
    Unchanged,
    /// Move to the top level of the job.
    Root,
    /// Move under the named task (same job, cycle-checked).
    Under(i64),
}

impl ParentDirective {
    /// Resolve against the task's current parent.
    pub fn resolve(self, current: Option<i64>) -> Option<i64> {
        match self {
            ParentDirective::Unchanged => current,
            ParentDirective::Root => None,
            ParentDirective::Under(task_id) => Some(task_id),
        }
    }
}

/// One directive of an absolute batch: the caller states positions literally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteItem {
    pub task_id: i64,
    pub position: i32,
    #[serde(default)]
    pub parent: ParentDirective,
    #[serde(default)]
    pub expected_version: Option<i32>,
}

/// One directive of a relative batch: placement is resolved against the
/// pre-batch sibling snapshot through the allocator. `Finalized` placements
/// are rejected here; the two grammars are never intermixed in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeItem {
    pub task_id: i64,
    pub placement: Placement,
    #[serde(default)]
    pub parent: ParentDirective,
    #[serde(default)]
    pub expected_version: Option<i32>,
}
