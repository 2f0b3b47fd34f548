//! # Postgres Store
//!
//! sqlx-backed [`TaskStore`] over the `taskboard_jobs` / `taskboard_tasks`
//! tables (see `migrations/`). Every write set runs in one database
//! transaction; optimistic concurrency is enforced with compare-and-set
//! `UPDATE ... WHERE version = $expected` statements rather than held locks,
//! so readers are never blocked and racing writers serialize at commit.
//!
//! Queries are checked at runtime rather than via the sqlx compile-time
//! macros so the crate builds without a live database.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::error::{ConflictEntity, OrderingError, Result};
use crate::models::{Job, JobSnapshot, NewTask, Task};

use super::{AppliedBatch, TaskStore, TaskWrite, WriteSet};

const SELECT_TASK_COLUMNS: &str = "task_id, job_id, parent_task_id, title, status, position, \
     version, deleted_at, created_at, updated_at";

/// Postgres-backed [`TaskStore`].
#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Build the conflict for a job row that lost its compare-and-set,
    /// carrying the fresh snapshot for caller reconciliation.
    async fn job_conflict(&self, job_id: i64, expected: i32) -> OrderingError {
        match self.load_job(job_id).await {
            Ok(snapshot) => OrderingError::Conflict {
                entity: ConflictEntity::Job,
                id: job_id,
                expected,
                current: snapshot.job_version,
                snapshot: Some(snapshot),
            },
            Err(err) => err,
        }
    }

    /// Build the conflict for a task row that lost its compare-and-set.
    async fn task_conflict(&self, job_id: i64, write: &TaskWrite) -> OrderingError {
        match self.load_job(job_id).await {
            Ok(snapshot) => match snapshot.find_task(write.task_id) {
                Some(task) => OrderingError::Conflict {
                    entity: ConflictEntity::Task,
                    id: write.task_id,
                    expected: write.expected_version,
                    current: task.version,
                    snapshot: Some(snapshot),
                },
                None => OrderingError::NotFound {
                    entity: ConflictEntity::Task,
                    id: write.task_id,
                },
            },
            Err(err) => err,
        }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create_job(&self, name: &str) -> Result<Job> {
        let job = sqlx::query_as::<_, Job>(
            "INSERT INTO taskboard_jobs (name, version, created_at, updated_at) \
             VALUES ($1, 1, NOW(), NOW()) \
             RETURNING job_id, name, version, created_at, updated_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    async fn find_job(&self, job_id: i64) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            "SELECT job_id, name, version, created_at, updated_at \
             FROM taskboard_jobs WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn load_job(&self, job_id: i64) -> Result<JobSnapshot> {
        let job = self
            .find_job(job_id)
            .await?
            .ok_or(OrderingError::NotFound {
                entity: ConflictEntity::Job,
                id: job_id,
            })?;
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {SELECT_TASK_COLUMNS} FROM taskboard_tasks \
             WHERE job_id = $1 ORDER BY position ASC, task_id ASC"
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(JobSnapshot {
            job_id,
            job_version: job.version,
            tasks,
        })
    }

    async fn find_task(&self, task_id: i64) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {SELECT_TASK_COLUMNS} FROM taskboard_tasks WHERE task_id = $1"
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    async fn insert_task(
        &self,
        new_task: &NewTask,
        position: i32,
        expected_job_version: i32,
    ) -> Result<Task> {
        let mut tx = self.pool.begin().await?;

        let advanced = sqlx::query_scalar::<_, i32>(
            "UPDATE taskboard_jobs SET version = version + 1, updated_at = NOW() \
             WHERE job_id = $1 AND version = $2 RETURNING version",
        )
        .bind(new_task.job_id)
        .bind(expected_job_version)
        .fetch_optional(&mut *tx)
        .await?;
        if advanced.is_none() {
            tx.rollback().await?;
            warn!(
                job_id = new_task.job_id,
                expected_job_version, "job version moved during task creation"
            );
            return Err(self.job_conflict(new_task.job_id, expected_job_version).await);
        }

        let task = sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO taskboard_tasks \
             (job_id, parent_task_id, title, status, position, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 1, NOW(), NOW()) \
             RETURNING {SELECT_TASK_COLUMNS}"
        ))
        .bind(new_task.job_id)
        .bind(new_task.parent_task_id)
        .bind(new_task.title.as_str())
        .bind(new_task.status.as_str())
        .bind(position)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn apply(&self, write_set: &WriteSet) -> Result<AppliedBatch> {
        let mut tx = self.pool.begin().await?;

        // The job row is the serialization point for racing batches.
        let advanced = sqlx::query_scalar::<_, i32>(
            "UPDATE taskboard_jobs SET version = version + 1, updated_at = NOW() \
             WHERE job_id = $1 AND version = $2 RETURNING version",
        )
        .bind(write_set.job_id)
        .bind(write_set.expected_job_version)
        .fetch_optional(&mut *tx)
        .await?;
        if advanced.is_none() {
            tx.rollback().await?;
            return Err(self
                .job_conflict(write_set.job_id, write_set.expected_job_version)
                .await);
        }

        for write in &write_set.writes {
            let updated = sqlx::query_scalar::<_, i32>(
                "UPDATE taskboard_tasks SET \
                     position = $3, \
                     parent_task_id = $4, \
                     deleted_at = CASE WHEN $5 THEN COALESCE(deleted_at, NOW()) ELSE NULL END, \
                     version = version + 1, \
                     updated_at = NOW() \
                 WHERE task_id = $1 AND job_id = $6 AND version = $2 \
                 RETURNING version",
            )
            .bind(write.task_id)
            .bind(write.expected_version)
            .bind(write.position)
            .bind(write.parent_task_id)
            .bind(write.deleted)
            .bind(write_set.job_id)
            .fetch_optional(&mut *tx)
            .await?;
            if updated.is_none() {
                tx.rollback().await?;
                return Err(self.task_conflict(write_set.job_id, write).await);
            }
        }

        tx.commit().await?;
        debug!(
            job_id = write_set.job_id,
            writes = write_set.writes.len(),
            "write set committed"
        );

        let snapshot = self.load_job(write_set.job_id).await?;
        Ok(AppliedBatch {
            job_version: snapshot.job_version,
            tasks: snapshot.tasks,
        })
    }
}
