//! # Hierarchy Validator
//!
//! Server-side enforcement that a parent reassignment keeps the task tree
//! acyclic. Client-side prevention is not trusted: every parent change goes
//! through this check before it is staged, and rejection is total.

use crate::error::{ConflictEntity, OrderingError};

use super::WorkingSet;

/// Validate that `task_id` may be re-parented under `new_parent_id`.
///
/// Confirms the parent exists in the job and is live, is not the task
/// itself, and is not a descendant of the task. The walk up the candidate
/// parent's ancestor chain is bounded by the job's task count so a corrupt
/// chain cannot loop forever.
pub(crate) fn validate_parent(
    working: &WorkingSet,
    task_id: i64,
    new_parent_id: i64,
) -> Result<(), OrderingError> {
    if new_parent_id == task_id {
        return Err(OrderingError::Cycle {
            task_id,
            parent_id: new_parent_id,
        });
    }

    // Membership in the working set is membership in the job; a parent from
    // another job is simply out of scope here.
    let parent = working
        .tasks
        .get(&new_parent_id)
        .filter(|t| !t.deleted)
        .ok_or(OrderingError::NotFound {
            entity: ConflictEntity::Task,
            id: new_parent_id,
        })?;

    let mut cursor = parent.parent_task_id;
    let mut hops = 0usize;
    while let Some(ancestor_id) = cursor {
        if ancestor_id == task_id {
            return Err(OrderingError::Cycle {
                task_id,
                parent_id: new_parent_id,
            });
        }
        hops += 1;
        if hops > working.tasks.len() {
            return Err(OrderingError::Transaction(format!(
                "ancestor chain of task {new_parent_id} exceeds job task count; hierarchy is corrupt"
            )));
        }
        cursor = working
            .tasks
            .get(&ancestor_id)
            .and_then(|t| t.parent_task_id);
    }

    Ok(())
}
