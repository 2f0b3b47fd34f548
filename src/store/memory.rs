//! # In-Memory Store
//!
//! A mutex-guarded store with the same observable semantics as the Postgres
//! implementation: compare-and-set on every versioned row, all-or-nothing
//! write sets, snapshots ordered by `(position, task_id)`. Used by the test
//! suites and by embedded callers that do not want a database.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{ConflictEntity, OrderingError, Result};
use crate::models::{Job, JobSnapshot, NewTask, Task};

use super::{AppliedBatch, TaskStore, TaskWrite, WriteSet};

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<i64, Job>,
    tasks: HashMap<i64, Task>,
    next_job_id: i64,
    next_task_id: i64,
}

impl Inner {
    fn snapshot_of(&self, job_id: i64) -> Option<JobSnapshot> {
        let job = self.jobs.get(&job_id)?;
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| t.job_id == job_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.position.cmp(&b.position).then(a.task_id.cmp(&b.task_id)));
        Some(JobSnapshot {
            job_id,
            job_version: job.version,
            tasks,
        })
    }
}

/// Thread-safe in-memory [`TaskStore`].
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    inner: Mutex<Inner>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_job_id: 1,
                next_task_id: 1,
                ..Inner::default()
            }),
        }
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create_job(&self, name: &str) -> Result<Job> {
        let mut inner = self.inner.lock();
        let now = Utc::now().naive_utc();
        let job = Job {
            job_id: inner.next_job_id,
            name: name.to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        inner.next_job_id += 1;
        inner.jobs.insert(job.job_id, job.clone());
        Ok(job)
    }

    async fn find_job(&self, job_id: i64) -> Result<Option<Job>> {
        Ok(self.inner.lock().jobs.get(&job_id).cloned())
    }

    async fn load_job(&self, job_id: i64) -> Result<JobSnapshot> {
        self.inner
            .lock()
            .snapshot_of(job_id)
            .ok_or(OrderingError::NotFound {
                entity: ConflictEntity::Job,
                id: job_id,
            })
    }

    async fn find_task(&self, task_id: i64) -> Result<Option<Task>> {
        Ok(self.inner.lock().tasks.get(&task_id).cloned())
    }

    async fn insert_task(
        &self,
        new_task: &NewTask,
        position: i32,
        expected_job_version: i32,
    ) -> Result<Task> {
        let mut inner = self.inner.lock();

        let job_version = inner
            .jobs
            .get(&new_task.job_id)
            .map(|j| j.version)
            .ok_or(OrderingError::NotFound {
                entity: ConflictEntity::Job,
                id: new_task.job_id,
            })?;
        if job_version != expected_job_version {
            let snapshot = inner.snapshot_of(new_task.job_id);
            return Err(OrderingError::Conflict {
                entity: ConflictEntity::Job,
                id: new_task.job_id,
                expected: expected_job_version,
                current: job_version,
                snapshot,
            });
        }

        let now = Utc::now().naive_utc();
        let task = Task {
            task_id: inner.next_task_id,
            job_id: new_task.job_id,
            parent_task_id: new_task.parent_task_id,
            title: new_task.title.clone(),
            status: new_task.status.as_str().to_string(),
            position,
            version: 1,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.next_task_id += 1;
        inner.tasks.insert(task.task_id, task.clone());

        if let Some(job) = inner.jobs.get_mut(&new_task.job_id) {
            job.version += 1;
            job.updated_at = now;
        }
        Ok(task)
    }

    async fn apply(&self, write_set: &WriteSet) -> Result<AppliedBatch> {
        let mut inner = self.inner.lock();

        // Validation pass first so a mid-set failure never leaves a
        // partially applied write set behind.
        let job_version = inner
            .jobs
            .get(&write_set.job_id)
            .map(|j| j.version)
            .ok_or(OrderingError::NotFound {
                entity: ConflictEntity::Job,
                id: write_set.job_id,
            })?;
        if job_version != write_set.expected_job_version {
            let snapshot = inner.snapshot_of(write_set.job_id);
            return Err(OrderingError::Conflict {
                entity: ConflictEntity::Job,
                id: write_set.job_id,
                expected: write_set.expected_job_version,
                current: job_version,
                snapshot,
            });
        }
        for write in &write_set.writes {
            let task = inner
                .tasks
                .get(&write.task_id)
                .filter(|t| t.job_id == write_set.job_id)
                .ok_or(OrderingError::NotFound {
                    entity: ConflictEntity::Task,
                    id: write.task_id,
                })?;
            if task.version != write.expected_version {
                let current = task.version;
                let snapshot = inner.snapshot_of(write_set.job_id);
                return Err(OrderingError::Conflict {
                    entity: ConflictEntity::Task,
                    id: write.task_id,
                    expected: write.expected_version,
                    current,
                    snapshot,
                });
            }
        }

        let now = Utc::now().naive_utc();
        for write in &write_set.writes {
            apply_write(inner.tasks.get_mut(&write.task_id), write, now)?;
        }
        if let Some(job) = inner.jobs.get_mut(&write_set.job_id) {
            job.version += 1;
            job.updated_at = now;
        }

        let snapshot =
            inner
                .snapshot_of(write_set.job_id)
                .ok_or_else(|| OrderingError::Transaction(
                    "job disappeared during apply".to_string(),
                ))?;
        Ok(AppliedBatch {
            job_version: snapshot.job_version,
            tasks: snapshot.tasks,
        })
    }
}

fn apply_write(
    task: Option<&mut Task>,
    write: &TaskWrite,
    now: chrono::NaiveDateTime,
) -> Result<()> {
    let task = task.ok_or(OrderingError::NotFound {
        entity: ConflictEntity::Task,
        id: write.task_id,
    })?;
    task.position = write.position;
    task.parent_task_id = write.parent_task_id;
    task.deleted_at = if write.deleted {
        task.deleted_at.or(Some(now))
    } else {
        None
    };
    task.version += 1;
    task.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TaskStatus;
    use crate::ordering::Placement;

    fn new_task(job_id: i64, title: &str) -> NewTask {
        NewTask {
            job_id,
            parent_task_id: None,
            title: title.to_string(),
            status: TaskStatus::Pending,
            placement: Placement::Last,
        }
    }

    #[tokio::test]
    async fn insert_advances_the_job_version() {
        let store = MemoryTaskStore::new();
        let job = store.create_job("roof repair").await.unwrap();
        assert_eq!(job.version, 1);

        let task = store
            .insert_task(&new_task(job.job_id, "strip tiles"), 10_000, 1)
            .await
            .unwrap();
        assert_eq!(task.version, 1);
        assert_eq!(store.load_job(job.job_id).await.unwrap().job_version, 2);
    }

    #[tokio::test]
    async fn stale_job_version_rejects_the_insert() {
        let store = MemoryTaskStore::new();
        let job = store.create_job("roof repair").await.unwrap();
        store
            .insert_task(&new_task(job.job_id, "strip tiles"), 10_000, 1)
            .await
            .unwrap();

        let err = store
            .insert_task(&new_task(job.job_id, "felt"), 20_000, 1)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        // Nothing was inserted.
        let snapshot = store.load_job(job.job_id).await.unwrap();
        assert_eq!(snapshot.tasks.len(), 1);
    }

    #[tokio::test]
    async fn apply_is_all_or_nothing() {
        let store = MemoryTaskStore::new();
        let job = store.create_job("roof repair").await.unwrap();
        let a = store
            .insert_task(&new_task(job.job_id, "a"), 10_000, 1)
            .await
            .unwrap();
        let b = store
            .insert_task(&new_task(job.job_id, "b"), 20_000, 2)
            .await
            .unwrap();

        let write_set = WriteSet {
            job_id: job.job_id,
            expected_job_version: 3,
            writes: vec![
                TaskWrite {
                    task_id: a.task_id,
                    expected_version: 1,
                    position: 30_000,
                    parent_task_id: None,
                    deleted: false,
                },
                TaskWrite {
                    task_id: b.task_id,
                    expected_version: 99, // stale
                    position: 40_000,
                    parent_task_id: None,
                    deleted: false,
                },
            ],
        };
        let err = store.apply(&write_set).await.unwrap_err();
        assert!(err.is_conflict());

        let snapshot = store.load_job(job.job_id).await.unwrap();
        let a_after = snapshot.find_task(a.task_id).unwrap();
        assert_eq!(a_after.position, 10_000);
        assert_eq!(a_after.version, 1);
    }
}
