//! # Batch Transaction Coordinator
//!
//! Applies one or many placement/parent directives as a single atomic unit.
//!
//! ## Plan / apply split
//!
//! Every mutating operation follows the same shape:
//!
//! 1. Load a consistent job snapshot from the store.
//! 2. Plan against an in-memory [`WorkingSet`]: conflict-guard each
//!    directive, validate hierarchy changes, resolve placements through the
//!    allocator (folding a sibling-group rebalance into the plan when the
//!    allocator signals exhaustion), and stage a write per touched row.
//! 3. Apply the whole write set through [`TaskStore::apply`] in one store
//!    transaction. Commit-time compare-and-set on the versions read at plan
//!    time serializes racing writers: the first committer wins and the
//!    loser receives a conflict carrying the now-current state.
//!
//! Any failure at any step leaves persisted state untouched.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::OrderingConfig;
use crate::error::{ConflictEntity, OrderingError, Result};
use crate::models::{NewTask, Task};
use crate::store::{TaskStore, TaskWrite, WriteSet};

use super::allocator::{self, PlacementError};
use super::placement::{AbsoluteItem, ParentDirective, Placement, RelativeItem};
use super::{conflict, hierarchy, rebalance, WorkingSet};

/// The authenticated user a mutation is attributed to. Threaded explicitly
/// through every mutating call; the engine holds no ambient identity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
}

/// One row of the refreshed snapshot returned after a successful batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPlacementView {
    pub task_id: i64,
    pub parent_task_id: Option<i64>,
    pub position: i32,
    pub version: i32,
}

/// Result of a successful batch: the advanced job version plus the live
/// tasks of the job so callers can reconcile local state in one round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub job_version: i32,
    pub tasks: Vec<TaskPlacementView>,
}

/// Result of a successful single-task reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleReorderOutcome {
    pub task_id: i64,
    pub position: i32,
    pub version: i32,
}

/// Result of an explicit rebalance call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceOutcome {
    pub rebalanced: bool,
    /// Rows whose position actually changed.
    pub count: usize,
}

/// How one directive's position is resolved.
enum DirectivePlacement {
    /// Caller-trusted absolute value.
    Absolute(i32),
    /// Resolved through the allocator against the working sibling snapshot.
    Relative(Placement),
}

/// Staged writes for one operation. Keyed by task so a row touched twice
/// collapses into one write carrying its original snapshot version for the
/// commit-time compare-and-set.
#[derive(Debug, Default)]
struct WritePlan {
    order: Vec<i64>,
    writes: HashMap<i64, TaskWrite>,
}

impl WritePlan {
    fn stage(
        &mut self,
        working: &mut WorkingSet,
        task_id: i64,
        position: i32,
        parent_task_id: Option<i64>,
        deleted: bool,
    ) -> Result<()> {
        let task = working
            .tasks
            .get_mut(&task_id)
            .ok_or(OrderingError::NotFound {
                entity: ConflictEntity::Task,
                id: task_id,
            })?;

        if let Some(write) = self.writes.get_mut(&task_id) {
            write.position = position;
            write.parent_task_id = parent_task_id;
            write.deleted = deleted;
        } else {
            self.order.push(task_id);
            self.writes.insert(
                task_id,
                TaskWrite {
                    task_id,
                    expected_version: task.version,
                    position,
                    parent_task_id,
                    deleted,
                },
            );
            // The working version advances on first touch so a later
            // directive on the same row must expect the post-batch version.
            // Writes coalesce, so the persisted row still advances by
            // exactly one however many directives touched it.
            task.version += 1;
        }

        // Later directives in the same batch observe this one, as they
        // would after a reload inside the transaction.
        task.position = position;
        task.parent_task_id = parent_task_id;
        task.deleted = deleted;
        Ok(())
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn into_write_set(mut self, job_id: i64, expected_job_version: i32) -> WriteSet {
        let writes = self
            .order
            .iter()
            .filter_map(|id| self.writes.remove(id))
            .collect();
        WriteSet {
            job_id,
            expected_job_version,
            writes,
        }
    }
}

/// The engine's service facade, generic over the backing store.
#[derive(Debug, Clone)]
pub struct OrderingCoordinator<S: TaskStore> {
    store: Arc<S>,
    config: OrderingConfig,
}

impl<S: TaskStore> OrderingCoordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, OrderingConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: OrderingConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create a task, resolving its placement at creation time.
    ///
    /// On allocator exhaustion the target sibling group is rebalanced once
    /// and the placement retried against fresh state.
    pub async fn create_task(&self, actor: &Actor, new_task: NewTask) -> Result<Task> {
        if new_task.title.trim().is_empty() {
            return Err(OrderingError::Validation(
                "task title must not be empty".to_string(),
            ));
        }

        let mut rebalanced = false;
        loop {
            let snapshot = self.store.load_job(new_task.job_id).await?;
            let working = WorkingSet::from_snapshot(&snapshot);

            if let Some(parent_id) = new_task.parent_task_id {
                if !working.is_live(parent_id) {
                    return Err(OrderingError::NotFound {
                        entity: ConflictEntity::Task,
                        id: parent_id,
                    });
                }
            }

            let group = working.sibling_group(new_task.parent_task_id, None);
            match allocator::allocate(&group, new_task.placement, self.config.spacing) {
                Ok(position) => {
                    let task = self
                        .store
                        .insert_task(&new_task, position, snapshot.job_version)
                        .await?;
                    info!(
                        user_id = actor.user_id,
                        job_id = task.job_id,
                        task_id = task.task_id,
                        position = task.position,
                        "task created"
                    );
                    return Ok(task);
                }
                Err(PlacementError::Exhausted) if !rebalanced => {
                    rebalanced = true;
                    debug!(
                        job_id = new_task.job_id,
                        parent_task_id = ?new_task.parent_task_id,
                        "placement exhausted on create, rebalancing sibling group"
                    );
                    self.rebalance(actor, new_task.job_id, new_task.parent_task_id, None)
                        .await?;
                }
                Err(err) => {
                    return Err(placement_error(err, &working, new_task.parent_task_id));
                }
            }
        }
    }

    /// Reorder one task to a caller-trusted absolute position.
    pub async fn reorder_single(
        &self,
        actor: &Actor,
        task_id: i64,
        new_position: i32,
        expected_version: Option<i32>,
    ) -> Result<SingleReorderOutcome> {
        let task = self
            .store
            .find_task(task_id)
            .await?
            .ok_or(OrderingError::NotFound {
                entity: ConflictEntity::Task,
                id: task_id,
            })?;

        let outcome = self
            .reorder_batch_absolute(
                actor,
                task.job_id,
                None,
                vec![AbsoluteItem {
                    task_id,
                    position: new_position,
                    parent: ParentDirective::Unchanged,
                    expected_version,
                }],
            )
            .await?;

        let view = outcome
            .tasks
            .iter()
            .find(|t| t.task_id == task_id)
            .ok_or_else(|| {
                OrderingError::Transaction(
                    "reordered task missing from refreshed snapshot".to_string(),
                )
            })?;
        Ok(SingleReorderOutcome {
            task_id,
            position: view.position,
            version: view.version,
        })
    }

    /// Apply a batch of absolute directives as one atomic unit.
    pub async fn reorder_batch_absolute(
        &self,
        actor: &Actor,
        job_id: i64,
        expected_job_version: Option<i32>,
        items: Vec<AbsoluteItem>,
    ) -> Result<BatchOutcome> {
        validate_batch_size(items.len(), self.config.max_batch_items)?;
        let snapshot = self.store.load_job(job_id).await?;
        conflict::check(
            ConflictEntity::Job,
            job_id,
            snapshot.job_version,
            expected_job_version,
        )
        .map_err(|err| err.with_snapshot(snapshot.clone()))?;

        let mut working = WorkingSet::from_snapshot(&snapshot);
        let mut plan = WritePlan::default();
        for item in &items {
            self.stage_directive(
                &mut working,
                &mut plan,
                &snapshot,
                item.task_id,
                item.expected_version,
                item.parent,
                DirectivePlacement::Absolute(item.position),
            )?;
        }

        self.commit_batch(actor, job_id, snapshot.job_version, plan, "absolute")
            .await
    }

    /// Apply a batch of relative directives as one atomic unit. Placements
    /// are resolved against the pre-batch sibling snapshot through the
    /// allocator before being applied in the same pass.
    pub async fn reorder_batch_relative(
        &self,
        actor: &Actor,
        job_id: i64,
        expected_job_version: Option<i32>,
        items: Vec<RelativeItem>,
    ) -> Result<BatchOutcome> {
        validate_batch_size(items.len(), self.config.max_batch_items)?;
        let snapshot = self.store.load_job(job_id).await?;
        conflict::check(
            ConflictEntity::Job,
            job_id,
            snapshot.job_version,
            expected_job_version,
        )
        .map_err(|err| err.with_snapshot(snapshot.clone()))?;

        let mut working = WorkingSet::from_snapshot(&snapshot);
        let mut plan = WritePlan::default();
        for item in &items {
            if matches!(item.placement, Placement::Finalized(_)) {
                return Err(OrderingError::Validation(
                    "absolute positions are not allowed in a relative batch".to_string(),
                ));
            }
            self.stage_directive(
                &mut working,
                &mut plan,
                &snapshot,
                item.task_id,
                item.expected_version,
                item.parent,
                DirectivePlacement::Relative(item.placement),
            )?;
        }

        self.commit_batch(actor, job_id, snapshot.job_version, plan, "relative")
            .await
    }

    /// Restore even spacing across one sibling group.
    ///
    /// Idempotent: a group that is already evenly spaced produces zero
    /// writes and no version churn, and the call reports `rebalanced:
    /// false`.
    pub async fn rebalance(
        &self,
        actor: &Actor,
        job_id: i64,
        parent_scope: Option<i64>,
        spacing: Option<i32>,
    ) -> Result<RebalanceOutcome> {
        let spacing = spacing.unwrap_or(self.config.spacing);
        if spacing < 1 {
            return Err(OrderingError::Validation(
                "rebalance spacing must be positive".to_string(),
            ));
        }

        let snapshot = self.store.load_job(job_id).await?;
        let mut working = WorkingSet::from_snapshot(&snapshot);
        if let Some(parent_id) = parent_scope {
            if !working.is_live(parent_id) {
                return Err(OrderingError::NotFound {
                    entity: ConflictEntity::Task,
                    id: parent_id,
                });
            }
        }

        let rows = working.live_group_rows(parent_scope, None);
        let assignments = rebalance::rebalance_assignments(&rows, spacing).map_err(|_| {
            OrderingError::Exhausted {
                job_id,
                parent_id: parent_scope,
            }
        })?;

        if assignments.is_empty() {
            debug!(
                job_id,
                parent_task_id = ?parent_scope,
                "sibling group already evenly spaced, nothing to write"
            );
            return Ok(RebalanceOutcome {
                rebalanced: false,
                count: 0,
            });
        }

        let mut plan = WritePlan::default();
        for &(task_id, position) in &assignments {
            plan.stage(&mut working, task_id, position, parent_scope, false)?;
        }

        let count = assignments.len();
        let write_set = plan.into_write_set(job_id, snapshot.job_version);
        self.store.apply(&write_set).await?;
        info!(
            user_id = actor.user_id,
            job_id,
            parent_task_id = ?parent_scope,
            count,
            "sibling group rebalanced"
        );
        Ok(RebalanceOutcome {
            rebalanced: true,
            count,
        })
    }

    /// Whether a sibling group's spacing has degraded enough that callers
    /// should schedule a rebalance.
    pub async fn group_needs_rebalance(
        &self,
        job_id: i64,
        parent_scope: Option<i64>,
    ) -> Result<bool> {
        let snapshot = self.store.load_job(job_id).await?;
        let working = WorkingSet::from_snapshot(&snapshot);
        let positions: Vec<i32> = working
            .live_group_rows(parent_scope, None)
            .iter()
            .map(|&(_, position)| position)
            .collect();
        Ok(rebalance::needs_rebalance(&positions, self.config.spacing))
    }

    /// Soft-delete a task. Preconditioned on the task having no live
    /// children; deleting a deleted task is a no-op.
    pub async fn delete_task(
        &self,
        actor: &Actor,
        task_id: i64,
        expected_version: Option<i32>,
    ) -> Result<()> {
        let task = self
            .store
            .find_task(task_id)
            .await?
            .ok_or(OrderingError::NotFound {
                entity: ConflictEntity::Task,
                id: task_id,
            })?;
        if task.is_deleted() {
            return Ok(());
        }

        let snapshot = self.store.load_job(task.job_id).await?;
        let current_version = snapshot
            .find_task(task_id)
            .map(|t| t.version)
            .ok_or(OrderingError::NotFound {
                entity: ConflictEntity::Task,
                id: task_id,
            })?;
        conflict::check(ConflictEntity::Task, task_id, current_version, expected_version)
            .map_err(|err| err.with_snapshot(snapshot.clone()))?;

        let has_live_children = snapshot
            .live_tasks()
            .any(|t| t.parent_task_id == Some(task_id));
        if has_live_children {
            warn!(
                user_id = actor.user_id,
                task_id, "refusing to delete a task with live children"
            );
            return Err(OrderingError::Validation(format!(
                "task {task_id} still has live children"
            )));
        }

        let mut working = WorkingSet::from_snapshot(&snapshot);
        let mut plan = WritePlan::default();
        plan.stage(
            &mut working,
            task_id,
            task.position,
            task.parent_task_id,
            true,
        )?;
        let write_set = plan.into_write_set(task.job_id, snapshot.job_version);
        self.store.apply(&write_set).await?;
        info!(
            user_id = actor.user_id,
            job_id = task.job_id,
            task_id,
            "task soft-deleted"
        );
        Ok(())
    }

    /// Conflict-guard, hierarchy-validate, resolve, and stage one directive.
    #[allow(clippy::too_many_arguments)]
    fn stage_directive(
        &self,
        working: &mut WorkingSet,
        plan: &mut WritePlan,
        snapshot: &crate::models::JobSnapshot,
        task_id: i64,
        expected_version: Option<i32>,
        parent: ParentDirective,
        placement: DirectivePlacement,
    ) -> Result<()> {
        let current = working
            .tasks
            .get(&task_id)
            .copied()
            .ok_or(OrderingError::NotFound {
                entity: ConflictEntity::Task,
                id: task_id,
            })?;
        if current.deleted {
            return Err(OrderingError::Validation(format!(
                "task {task_id} is deleted and cannot be reordered"
            )));
        }

        conflict::check(ConflictEntity::Task, task_id, current.version, expected_version)
            .map_err(|err| err.with_snapshot(snapshot.clone()))?;

        let target_parent = parent.resolve(current.parent_task_id);
        if target_parent != current.parent_task_id {
            if let Some(parent_id) = target_parent {
                hierarchy::validate_parent(working, task_id, parent_id)?;
            }
        }

        let position = match placement {
            DirectivePlacement::Absolute(position) => {
                let group = working.sibling_group(target_parent, Some(task_id));
                allocator::allocate(&group, Placement::Finalized(position), self.config.spacing)
                    .map_err(|err| placement_error(err, working, target_parent))?
            }
            DirectivePlacement::Relative(requested) => {
                let group = working.sibling_group(target_parent, Some(task_id));
                match allocator::allocate(&group, requested, self.config.spacing) {
                    Ok(position) => position,
                    Err(PlacementError::Exhausted) => {
                        // Fold a rebalance of the target group into this
                        // same atomic write set, then place again.
                        debug!(
                            job_id = working.job_id,
                            parent_task_id = ?target_parent,
                            task_id,
                            "placement exhausted mid-batch, folding in a rebalance"
                        );
                        self.stage_group_rebalance(working, plan, target_parent, Some(task_id))?;
                        let group = working.sibling_group(target_parent, Some(task_id));
                        allocator::allocate(&group, requested, self.config.spacing)
                            .map_err(|err| placement_error(err, working, target_parent))?
                    }
                    Err(err) => return Err(placement_error(err, working, target_parent)),
                }
            }
        };

        plan.stage(working, task_id, position, target_parent, false)
    }

    /// Stage even-spacing rewrites for one sibling group into the plan.
    fn stage_group_rebalance(
        &self,
        working: &mut WorkingSet,
        plan: &mut WritePlan,
        parent_task_id: Option<i64>,
        exclude: Option<i64>,
    ) -> Result<()> {
        let rows = working.live_group_rows(parent_task_id, exclude);
        let assignments = rebalance::rebalance_assignments(&rows, self.config.spacing).map_err(
            |_| OrderingError::Exhausted {
                job_id: working.job_id,
                parent_id: parent_task_id,
            },
        )?;
        for (task_id, position) in assignments {
            plan.stage(working, task_id, position, parent_task_id, false)?;
        }
        Ok(())
    }

    async fn commit_batch(
        &self,
        actor: &Actor,
        job_id: i64,
        expected_job_version: i32,
        plan: WritePlan,
        grammar: &'static str,
    ) -> Result<BatchOutcome> {
        let staged = plan.len();
        let write_set = plan.into_write_set(job_id, expected_job_version);
        let applied = self.store.apply(&write_set).await?;
        info!(
            user_id = actor.user_id,
            job_id,
            grammar,
            writes = staged,
            job_version = applied.job_version,
            "batch reorder committed"
        );
        Ok(BatchOutcome {
            job_version: applied.job_version,
            tasks: applied
                .tasks
                .iter()
                .filter(|t| !t.is_deleted())
                .map(|t| TaskPlacementView {
                    task_id: t.task_id,
                    parent_task_id: t.parent_task_id,
                    position: t.position,
                    version: t.version,
                })
                .collect(),
        })
    }
}

fn validate_batch_size(len: usize, limit: usize) -> Result<()> {
    if len == 0 {
        return Err(OrderingError::Validation(
            "batch contains no directives".to_string(),
        ));
    }
    if len > limit {
        return Err(OrderingError::Validation(format!(
            "batch exceeds {limit} directives"
        )));
    }
    Ok(())
}

/// Translate a pure placement failure into the engine taxonomy.
fn placement_error(
    err: PlacementError,
    working: &WorkingSet,
    parent_id: Option<i64>,
) -> OrderingError {
    match err {
        PlacementError::UnknownNeighbor(id) => {
            if working.is_live(id) {
                // The neighbor exists in the job but sits in a different
                // sibling group than the one targeted.
                OrderingError::Validation(format!(
                    "task {id} is not a member of the target sibling group"
                ))
            } else {
                OrderingError::NotFound {
                    entity: ConflictEntity::Task,
                    id,
                }
            }
        }
        PlacementError::Exhausted => OrderingError::Exhausted {
            job_id: working.job_id,
            parent_id,
        },
        PlacementError::OutOfRange(position) => OrderingError::Validation(format!(
            "position {position} is outside the allowed range"
        )),
    }
}
