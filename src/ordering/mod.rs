//! # Ordering & Hierarchy Engine
//!
//! The consistency core: sparse position allocation, optimistic conflict
//! detection, cycle-free re-parenting, spacing rebalance, and the batch
//! coordinator that ties them into single atomic write sets.
//!
//! Pure logic (allocator, guard, validator, rebalance math) lives in leaf
//! modules and operates on an in-memory [`WorkingSet`] copied from a job
//! snapshot; only the coordinator talks to a [`crate::store::TaskStore`].

pub mod allocator;
pub mod conflict;
pub mod coordinator;
pub mod hierarchy;
pub mod placement;
pub mod rebalance;

pub use allocator::{allocate, PlacementError, SiblingGroup};
pub use coordinator::{
    Actor, BatchOutcome, OrderingCoordinator, RebalanceOutcome, SingleReorderOutcome,
    TaskPlacementView,
};
pub use placement::{AbsoluteItem, ParentDirective, Placement, RelativeItem};

use std::collections::HashMap;

use crate::models::JobSnapshot;

/// Mutable in-memory view of a job used while planning a batch. Directives
/// are staged against this copy so later directives observe earlier ones
/// (version bumps included), exactly as they would after a reload inside
/// the same transaction.
#[derive(Debug, Clone)]
pub(crate) struct WorkingSet {
    pub job_id: i64,
    pub job_version: i32,
    pub tasks: HashMap<i64, WorkingTask>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkingTask {
    pub parent_task_id: Option<i64>,
    pub position: i32,
    pub version: i32,
    pub deleted: bool,
}

impl WorkingSet {
    pub(crate) fn from_snapshot(snapshot: &JobSnapshot) -> Self {
        let tasks = snapshot
            .tasks
            .iter()
            .map(|t| {
                (
                    t.task_id,
                    WorkingTask {
                        parent_task_id: t.parent_task_id,
                        position: t.position,
                        version: t.version,
                        deleted: t.is_deleted(),
                    },
                )
            })
            .collect();
        Self {
            job_id: snapshot.job_id,
            job_version: snapshot.job_version,
            tasks,
        }
    }

    /// Live members of one sibling group, optionally excluding a task that
    /// is being moved into (or within) the group.
    pub(crate) fn sibling_group(
        &self,
        parent_task_id: Option<i64>,
        exclude: Option<i64>,
    ) -> SiblingGroup {
        SiblingGroup::new(
            self.tasks
                .iter()
                .filter(|(id, t)| {
                    !t.deleted && t.parent_task_id == parent_task_id && Some(**id) != exclude
                })
                .map(|(id, t)| (*id, t.position))
                .collect(),
        )
    }

    /// Live `(task_id, position)` rows of a sibling group in display order.
    pub(crate) fn live_group_rows(
        &self,
        parent_task_id: Option<i64>,
        exclude: Option<i64>,
    ) -> Vec<(i64, i32)> {
        let mut rows: Vec<(i64, i32)> = self
            .tasks
            .iter()
            .filter(|(id, t)| {
                !t.deleted && t.parent_task_id == parent_task_id && Some(**id) != exclude
            })
            .map(|(id, t)| (*id, t.position))
            .collect();
        rows.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
        rows
    }

    pub(crate) fn is_live(&self, task_id: i64) -> bool {
        self.tasks.get(&task_id).is_some_and(|t| !t.deleted)
    }
}
