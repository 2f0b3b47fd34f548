//! Shared builders for the integration suites: an engine over the
//! in-memory store plus helpers for seeding jobs with ordered tasks.

#![allow(dead_code)]

use std::sync::Arc;

use taskboard_core::{
    Actor, Job, MemoryTaskStore, NewTask, OrderingCoordinator, Placement, Task, TaskStatus,
    TaskStore,
};

pub fn actor() -> Actor {
    Actor { user_id: 42 }
}

pub fn engine() -> (Arc<MemoryTaskStore>, OrderingCoordinator<MemoryTaskStore>) {
    let store = Arc::new(MemoryTaskStore::new());
    let coordinator = OrderingCoordinator::new(store.clone());
    (store, coordinator)
}

pub fn task_input(
    job_id: i64,
    parent_task_id: Option<i64>,
    title: &str,
    placement: Placement,
) -> NewTask {
    NewTask {
        job_id,
        parent_task_id,
        title: title.to_string(),
        status: TaskStatus::Pending,
        placement,
    }
}

/// A job with `count` root tasks appended in order, landing at positions
/// 10_000, 20_000, 30_000, ...
pub async fn seed_job(
    store: &MemoryTaskStore,
    coordinator: &OrderingCoordinator<MemoryTaskStore>,
    count: usize,
) -> (Job, Vec<Task>) {
    let job = store.create_job("site survey").await.unwrap();
    let mut tasks = Vec::with_capacity(count);
    for index in 0..count {
        let task = coordinator
            .create_task(
                &actor(),
                task_input(job.job_id, None, &format!("task {index}"), Placement::Last),
            )
            .await
            .unwrap();
        tasks.push(task);
    }
    (job, tasks)
}

/// Current `(position, version)` of a task.
pub async fn position_and_version(store: &MemoryTaskStore, task_id: i64) -> (i32, i32) {
    let task = store.find_task(task_id).await.unwrap().unwrap();
    (task.position, task.version)
}
