//! # Conflict Guard
//!
//! Optimistic version checking. Multiple collaborators may reorder the same
//! list from different sessions at once; without detection, a blind
//! overwrite silently discards another user's work. The guard makes the
//! conflict explicit so callers reconcile instead of losing edits invisibly.
//!
//! Version advancement only ever happens as a side effect of a successful
//! mutation in the store, never here.

use crate::error::{ConflictEntity, OrderingError};

/// Compare a caller-supplied expected version against the stored one.
///
/// A no-op when the caller omits version checking (`expected` is `None`).
pub fn check(
    entity: ConflictEntity,
    id: i64,
    current: i32,
    expected: Option<i32>,
) -> Result<(), OrderingError> {
    match expected {
        None => Ok(()),
        Some(expected) if expected == current => Ok(()),
        Some(expected) => Err(OrderingError::Conflict {
            entity,
            id,
            expected,
            current,
            snapshot: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_expectation_is_a_no_op() {
        assert!(check(ConflictEntity::Task, 1, 99, None).is_ok());
    }

    #[test]
    fn matching_expectation_passes() {
        assert!(check(ConflictEntity::Job, 1, 4, Some(4)).is_ok());
    }

    #[test]
    fn stale_expectation_reports_both_versions() {
        let err = check(ConflictEntity::Task, 12, 6, Some(5)).unwrap_err();
        match err {
            OrderingError::Conflict {
                entity,
                id,
                expected,
                current,
                snapshot,
            } => {
                assert_eq!(entity, ConflictEntity::Task);
                assert_eq!(id, 12);
                assert_eq!(expected, 5);
                assert_eq!(current, 6);
                assert!(snapshot.is_none());
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }
}
