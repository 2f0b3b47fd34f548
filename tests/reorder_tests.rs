//! End-to-end reorder coverage: single moves, absolute and relative
//! batches, conflict rejection, and atomic rollback.

mod common;

use common::{actor, engine, position_and_version, seed_job};
use taskboard_core::{
    AbsoluteItem, ConflictEntity, OrderingError, ParentDirective, Placement, RelativeItem,
    TaskStore,
};

#[tokio::test]
async fn single_reorder_moves_the_task_and_bumps_its_version() {
    let (store, coordinator) = engine();
    let (_, tasks) = seed_job(&store, &coordinator, 3).await;

    let outcome = coordinator
        .reorder_single(&actor(), tasks[0].task_id, 25_000, Some(1))
        .await
        .unwrap();

    assert_eq!(outcome.position, 25_000);
    assert_eq!(outcome.version, 2);
    let (position, version) = position_and_version(&store, tasks[0].task_id).await;
    assert_eq!((position, version), (25_000, 2));
}

#[tokio::test]
async fn single_reorder_with_stale_version_is_rejected_untouched() {
    let (store, coordinator) = engine();
    let (_, tasks) = seed_job(&store, &coordinator, 2).await;

    let err = coordinator
        .reorder_single(&actor(), tasks[0].task_id, 25_000, Some(7))
        .await
        .unwrap_err();

    match err {
        OrderingError::Conflict {
            entity,
            id,
            expected,
            current,
            snapshot,
        } => {
            assert_eq!(entity, ConflictEntity::Task);
            assert_eq!(id, tasks[0].task_id);
            assert_eq!(expected, 7);
            assert_eq!(current, 1);
            assert!(snapshot.is_some(), "conflict must carry fresh state");
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    let (position, version) = position_and_version(&store, tasks[0].task_id).await;
    assert_eq!((position, version), (10_000, 1));
}

#[tokio::test]
async fn absolute_batch_repositions_every_task_atomically() {
    let (store, coordinator) = engine();
    let (job, tasks) = seed_job(&store, &coordinator, 3).await;
    // Job version: 1 on creation plus one per inserted task.
    let pre_batch_job_version = 4;

    let outcome = coordinator
        .reorder_batch_absolute(
            &actor(),
            job.job_id,
            Some(pre_batch_job_version),
            vec![
                AbsoluteItem {
                    task_id: tasks[2].task_id,
                    position: 100,
                    parent: ParentDirective::Unchanged,
                    expected_version: Some(1),
                },
                AbsoluteItem {
                    task_id: tasks[0].task_id,
                    position: 200,
                    parent: ParentDirective::Unchanged,
                    expected_version: Some(1),
                },
                AbsoluteItem {
                    task_id: tasks[1].task_id,
                    position: 300,
                    parent: ParentDirective::Unchanged,
                    expected_version: Some(1),
                },
            ],
        )
        .await
        .unwrap();

    assert_eq!(outcome.job_version, pre_batch_job_version + 1);
    let order: Vec<i64> = outcome.tasks.iter().map(|t| t.task_id).collect();
    assert_eq!(
        order,
        vec![tasks[2].task_id, tasks[0].task_id, tasks[1].task_id]
    );
    assert!(outcome.tasks.iter().all(|t| t.version == 2));
}

#[tokio::test]
async fn stale_job_version_rejects_the_whole_batch() {
    let (store, coordinator) = engine();
    let (job, tasks) = seed_job(&store, &coordinator, 3).await;

    let err = coordinator
        .reorder_batch_absolute(
            &actor(),
            job.job_id,
            Some(1), // long stale
            vec![AbsoluteItem {
                task_id: tasks[0].task_id,
                position: 99,
                parent: ParentDirective::Unchanged,
                expected_version: None,
            }],
        )
        .await
        .unwrap_err();

    match err {
        OrderingError::Conflict {
            entity,
            current,
            snapshot,
            ..
        } => {
            assert_eq!(entity, ConflictEntity::Job);
            assert_eq!(current, 4);
            assert_eq!(snapshot.unwrap().job_version, 4);
        }
        other => panic!("expected job conflict, got {other:?}"),
    }
    // Zero tasks mutated.
    for task in &tasks {
        let (position, version) = position_and_version(&store, task.task_id).await;
        assert_eq!((position, version), (task.position, 1));
    }
}

#[tokio::test]
async fn failing_directive_rolls_back_the_entire_batch() {
    let (store, coordinator) = engine();
    let (job, tasks) = seed_job(&store, &coordinator, 3).await;

    let err = coordinator
        .reorder_batch_absolute(
            &actor(),
            job.job_id,
            None,
            vec![
                AbsoluteItem {
                    task_id: tasks[0].task_id,
                    position: 50,
                    parent: ParentDirective::Unchanged,
                    expected_version: None,
                },
                AbsoluteItem {
                    task_id: 9_999, // not in this job
                    position: 60,
                    parent: ParentDirective::Unchanged,
                    expected_version: None,
                },
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrderingError::NotFound { id: 9_999, .. }));

    for task in &tasks {
        let (position, version) = position_and_version(&store, task.task_id).await;
        assert_eq!((position, version), (task.position, 1));
    }
    assert_eq!(store.load_job(job.job_id).await.unwrap().job_version, 4);
}

#[tokio::test]
async fn relative_batch_resolves_against_the_working_snapshot() {
    let (store, coordinator) = engine();
    let (job, tasks) = seed_job(&store, &coordinator, 3).await;

    let outcome = coordinator
        .reorder_batch_relative(
            &actor(),
            job.job_id,
            None,
            vec![
                // Midpoint between 10_000 and 20_000.
                RelativeItem {
                    task_id: tasks[2].task_id,
                    placement: Placement::After(tasks[0].task_id),
                    parent: ParentDirective::Unchanged,
                    expected_version: None,
                },
                // Resolved against the already-updated working state.
                RelativeItem {
                    task_id: tasks[1].task_id,
                    placement: Placement::First,
                    parent: ParentDirective::Unchanged,
                    expected_version: None,
                },
            ],
        )
        .await
        .unwrap();

    let placements: Vec<(i64, i32)> = outcome.tasks.iter().map(|t| (t.task_id, t.position)).collect();
    assert_eq!(
        placements,
        vec![
            (tasks[1].task_id, 5_000),
            (tasks[0].task_id, 10_000),
            (tasks[2].task_id, 15_000),
        ]
    );
}

#[tokio::test]
async fn relative_batch_rejects_finalized_placements() {
    let (store, coordinator) = engine();
    let (job, tasks) = seed_job(&store, &coordinator, 2).await;

    let err = coordinator
        .reorder_batch_relative(
            &actor(),
            job.job_id,
            None,
            vec![RelativeItem {
                task_id: tasks[0].task_id,
                placement: Placement::Finalized(500),
                parent: ParentDirective::Unchanged,
                expected_version: None,
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrderingError::Validation(_)));
}

#[tokio::test]
async fn exhaustion_folds_a_rebalance_into_the_same_batch() {
    let (store, coordinator) = engine();
    let (job, tasks) = seed_job(&store, &coordinator, 3).await;

    // Jam the first two tasks together so After(t0) has no room.
    coordinator
        .reorder_batch_absolute(
            &actor(),
            job.job_id,
            None,
            vec![
                AbsoluteItem {
                    task_id: tasks[0].task_id,
                    position: 100,
                    parent: ParentDirective::Unchanged,
                    expected_version: None,
                },
                AbsoluteItem {
                    task_id: tasks[1].task_id,
                    position: 101,
                    parent: ParentDirective::Unchanged,
                    expected_version: None,
                },
            ],
        )
        .await
        .unwrap();
    let job_version_before = store.load_job(job.job_id).await.unwrap().job_version;

    let outcome = coordinator
        .reorder_batch_relative(
            &actor(),
            job.job_id,
            None,
            vec![RelativeItem {
                task_id: tasks[2].task_id,
                placement: Placement::After(tasks[0].task_id),
                parent: ParentDirective::Unchanged,
                expected_version: None,
            }],
        )
        .await
        .unwrap();

    // One atomic unit: rebalance plus placement advanced the job once.
    assert_eq!(outcome.job_version, job_version_before + 1);
    let placements: Vec<(i64, i32)> = outcome.tasks.iter().map(|t| (t.task_id, t.position)).collect();
    assert_eq!(
        placements,
        vec![
            (tasks[0].task_id, 10_000),
            (tasks[2].task_id, 15_000),
            (tasks[1].task_id, 20_000),
        ]
    );
}

#[tokio::test]
async fn positions_stay_unique_and_increasing_after_mutations() {
    let (store, coordinator) = engine();
    let (job, tasks) = seed_job(&store, &coordinator, 5).await;

    coordinator
        .reorder_batch_relative(
            &actor(),
            job.job_id,
            None,
            vec![
                RelativeItem {
                    task_id: tasks[4].task_id,
                    placement: Placement::First,
                    parent: ParentDirective::Unchanged,
                    expected_version: None,
                },
                RelativeItem {
                    task_id: tasks[0].task_id,
                    placement: Placement::After(tasks[2].task_id),
                    parent: ParentDirective::Unchanged,
                    expected_version: None,
                },
                RelativeItem {
                    task_id: tasks[1].task_id,
                    placement: Placement::Last,
                    parent: ParentDirective::Unchanged,
                    expected_version: None,
                },
            ],
        )
        .await
        .unwrap();

    let positions = store
        .load_job(job.job_id)
        .await
        .unwrap()
        .sibling_positions(None);
    let mut deduped = positions.clone();
    deduped.dedup();
    assert_eq!(positions, deduped, "positions must be unique");
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn a_task_touched_twice_in_one_batch_advances_one_version() {
    let (store, coordinator) = engine();
    let (job, tasks) = seed_job(&store, &coordinator, 2).await;

    coordinator
        .reorder_batch_absolute(
            &actor(),
            job.job_id,
            None,
            vec![
                AbsoluteItem {
                    task_id: tasks[0].task_id,
                    position: 100,
                    parent: ParentDirective::Unchanged,
                    expected_version: Some(1),
                },
                // The second directive observes the first one's bump.
                AbsoluteItem {
                    task_id: tasks[0].task_id,
                    position: 200,
                    parent: ParentDirective::Unchanged,
                    expected_version: Some(2),
                },
            ],
        )
        .await
        .unwrap();

    let (position, version) = position_and_version(&store, tasks[0].task_id).await;
    assert_eq!((position, version), (200, 2));
}

#[tokio::test]
async fn empty_batches_are_rejected_outright() {
    let (store, coordinator) = engine();
    let (job, _) = seed_job(&store, &coordinator, 1).await;

    let err = coordinator
        .reorder_batch_absolute(&actor(), job.job_id, None, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, OrderingError::Validation(_)));
}

#[tokio::test]
async fn first_committer_wins_the_race() {
    let (store, coordinator) = engine();
    let (job, tasks) = seed_job(&store, &coordinator, 2).await;
    let stale_job_version = store.load_job(job.job_id).await.unwrap().job_version;

    // Writer A commits first.
    coordinator
        .reorder_single(&actor(), tasks[0].task_id, 25_000, None)
        .await
        .unwrap();

    // Writer B planned against the pre-A state and loses.
    let err = coordinator
        .reorder_batch_absolute(
            &actor(),
            job.job_id,
            Some(stale_job_version),
            vec![AbsoluteItem {
                task_id: tasks[1].task_id,
                position: 500,
                parent: ParentDirective::Unchanged,
                expected_version: None,
            }],
        )
        .await
        .unwrap_err();

    match err {
        OrderingError::Conflict { entity, snapshot, .. } => {
            assert_eq!(entity, ConflictEntity::Job);
            let snapshot = snapshot.unwrap();
            // The loser gets the now-current state, A's move included.
            assert_eq!(
                snapshot.find_task(tasks[0].task_id).unwrap().position,
                25_000
            );
        }
        other => panic!("expected job conflict, got {other:?}"),
    }
}
