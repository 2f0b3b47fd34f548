//! # Position Allocator
//!
//! Pure resolution of a placement request against one sibling group: returns
//! an integer position that sorts correctly relative to the requested
//! neighbors, avoids collisions with existing values, and preserves future
//! insertion headroom. Touches no state; exhaustion is signalled to the
//! caller, which decides whether to rebalance and retry.

use crate::constants::{POSITION_CEILING, POSITION_FLOOR};

use super::placement::Placement;

/// Failure modes of pure placement resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    /// The referenced neighbor is not a member of the sibling group
    /// (wrong job, wrong parent, deleted, or missing).
    #[error("task {0} is not a member of the target sibling group")]
    UnknownNeighbor(i64),
    /// No integer slot is available where the request wants one. The caller
    /// should rebalance the group and retry.
    #[error("no insertion headroom left in the sibling group")]
    Exhausted,
    /// A finalized position falls outside the allowed range.
    #[error("position {0} is outside the allowed range")]
    OutOfRange(i32),
}

/// The live members of one sibling group, ordered by `(position, task_id)`.
/// A task being moved within its own group must be excluded before
/// allocation so it is not its own neighbor.
#[derive(Debug, Clone, Default)]
pub struct SiblingGroup {
    entries: Vec<(i64, i32)>,
}

impl SiblingGroup {
    pub fn new(mut entries: Vec<(i64, i32)>) -> Self {
        entries.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `(task_id, position)` pairs in display order.
    pub fn entries(&self) -> &[(i64, i32)] {
        &self.entries
    }

    fn index_of(&self, task_id: i64) -> Option<usize> {
        self.entries.iter().position(|&(id, _)| id == task_id)
    }

    fn min_position(&self) -> Option<i32> {
        self.entries.first().map(|&(_, p)| p)
    }

    fn max_position(&self) -> Option<i32> {
        self.entries.last().map(|&(_, p)| p)
    }
}

/// Resolve a placement to a concrete position within `group`.
pub fn allocate(
    group: &SiblingGroup,
    placement: Placement,
    spacing: i32,
) -> Result<i32, PlacementError> {
    match placement {
        Placement::Finalized(position) => {
            if (POSITION_FLOOR..=POSITION_CEILING).contains(&position) {
                Ok(position)
            } else {
                Err(PlacementError::OutOfRange(position))
            }
        }
        Placement::Last => match group.max_position() {
            None => Ok(spacing),
            Some(max) => {
                let candidate = max.saturating_add(spacing);
                if candidate > POSITION_CEILING {
                    Err(PlacementError::Exhausted)
                } else {
                    Ok(candidate)
                }
            }
        },
        Placement::First => match group.min_position() {
            None => Ok(spacing),
            Some(min) => slot_before(min, spacing),
        },
        Placement::After(neighbor) => {
            let idx = group
                .index_of(neighbor)
                .ok_or(PlacementError::UnknownNeighbor(neighbor))?;
            let here = group.entries[idx].1;
            match group.entries.get(idx + 1) {
                None => {
                    let candidate = here.saturating_add(spacing);
                    if candidate > POSITION_CEILING {
                        Err(PlacementError::Exhausted)
                    } else {
                        Ok(candidate)
                    }
                }
                Some(&(_, next)) => midpoint(here, next),
            }
        }
        Placement::Before(neighbor) => {
            let idx = group
                .index_of(neighbor)
                .ok_or(PlacementError::UnknownNeighbor(neighbor))?;
            let here = group.entries[idx].1;
            if idx == 0 {
                slot_before(here, spacing)
            } else {
                let prev = group.entries[idx - 1].1;
                midpoint(prev, here)
            }
        }
    }
}

/// A slot above the group's (local) minimum: one spacing out when room
/// allows, otherwise the midpoint down to the positive floor.
fn slot_before(min: i32, spacing: i32) -> Result<i32, PlacementError> {
    let candidate = min - spacing;
    if candidate >= POSITION_FLOOR {
        Ok(candidate)
    } else if min > POSITION_FLOOR {
        Ok(min / 2)
    } else {
        Err(PlacementError::Exhausted)
    }
}

fn midpoint(low: i32, high: i32) -> Result<i32, PlacementError> {
    if high - low > 1 {
        Ok(low + (high - low) / 2)
    } else {
        Err(PlacementError::Exhausted)
    }
}
