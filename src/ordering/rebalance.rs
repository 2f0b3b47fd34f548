//! # Rebalance Engine (pure half)
//!
//! Detection and recomputation of sibling spacing. The heuristics decide
//! when a group's position sequence has degraded; the assignment function
//! produces the minimal set of rewrites that restores even spacing. The
//! coordinator folds these rewrites into its atomic write sets.

use crate::constants::{POSITION_CEILING, REBALANCE_GAP_RATIO_LIMIT, REBALANCE_MIN_GAP};

use super::allocator::PlacementError;

/// Whether a sibling group's sorted position sequence calls for a rebalance.
///
/// True when any adjacent gap has fallen below the minimum (midpoint
/// precision exhausted), when the gap distribution is too skewed, or when
/// the largest position approaches the representable ceiling.
pub fn needs_rebalance(sorted_positions: &[i32], spacing: i32) -> bool {
    if let Some(&last) = sorted_positions.last() {
        if last > POSITION_CEILING - spacing {
            return true;
        }
    }
    if sorted_positions.len() < 2 {
        return false;
    }

    let mut min_gap = i64::MAX;
    let mut max_gap = 0i64;
    for pair in sorted_positions.windows(2) {
        let gap = i64::from(pair[1]) - i64::from(pair[0]);
        min_gap = min_gap.min(gap);
        max_gap = max_gap.max(gap);
    }

    if min_gap < i64::from(REBALANCE_MIN_GAP) {
        return true;
    }
    max_gap / min_gap > i64::from(REBALANCE_GAP_RATIO_LIMIT)
}

/// Even-spacing assignments for one sibling group.
///
/// `ordered` holds the live `(task_id, position)` rows in display order
/// (position, id-tiebreak). Each row's target is `spacing * (index + 1)`;
/// only rows whose position actually changes are returned, so rebalancing
/// an already-even group yields zero writes and zero version churn.
pub fn rebalance_assignments(
    ordered: &[(i64, i32)],
    spacing: i32,
) -> Result<Vec<(i64, i32)>, PlacementError> {
    let highest = i64::from(spacing) * ordered.len() as i64;
    if highest > i64::from(POSITION_CEILING) {
        // Even a fresh layout will not fit; the group is simply too large
        // for this spacing.
        return Err(PlacementError::Exhausted);
    }

    Ok(ordered
        .iter()
        .enumerate()
        .filter_map(|(index, &(task_id, position))| {
            let target = spacing * (index as i32 + 1);
            (target != position).then_some((task_id, target))
        })
        .collect())
}
