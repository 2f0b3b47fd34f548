#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections

//! # Taskboard Core
//!
//! Position and hierarchy consistency engine for collaborative job/task
//! lists. A job owns an ordered tree of tasks; this crate owns everything
//! that keeps that tree coherent while several users edit it at once:
//!
//! - **Position allocation**: sparse integer positions with deliberate
//!   spacing, so "drop it after that one" rarely needs to rewrite neighbors.
//! - **Optimistic concurrency**: per-row and per-job version counters,
//!   checked on every mutation; conflicts carry the fresh state so clients
//!   reconcile instead of silently overwriting each other.
//! - **Hierarchy validation**: server-side cycle prevention for parent
//!   changes, bounded ancestor walks, total rejection on violation.
//! - **Atomic batches**: one or many placement/parent directives applied in
//!   exactly one store transaction, all-or-nothing.
//! - **Rebalancing**: spacing restoration for degraded sibling groups,
//!   explicit or folded into a batch when the allocator runs out of room.
//!
//! ## Module Organization
//!
//! - [`models`] - job and task row models
//! - [`ordering`] - allocator, conflict guard, hierarchy validator,
//!   rebalance math, and the batch coordinator
//! - [`store`] - the `TaskStore` seam with Postgres and in-memory backends
//! - [`config`] - configuration loading
//! - [`error`] - structured error taxonomy
//! - [`logging`] - tracing initialization
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use taskboard_core::{
//!     Actor, MemoryTaskStore, NewTask, OrderingCoordinator, Placement, TaskStatus, TaskStore,
//! };
//!
//! # async fn example() -> taskboard_core::Result<()> {
//! let store = Arc::new(MemoryTaskStore::new());
//! let engine = OrderingCoordinator::new(store.clone());
//! let actor = Actor { user_id: 1 };
//!
//! let job = store.create_job("kitchen remodel").await?;
//! let demo = engine
//!     .create_task(
//!         &actor,
//!         NewTask {
//!             job_id: job.job_id,
//!             parent_task_id: None,
//!             title: "demolition".into(),
//!             status: TaskStatus::Pending,
//!             placement: Placement::Last,
//!         },
//!     )
//!     .await?;
//! assert_eq!(demo.position, 10_000);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod ordering;
pub mod store;

pub use config::{DatabaseConfig, OrderingConfig, TaskboardConfig};
pub use constants::TaskStatus;
pub use error::{ConflictEntity, OrderingError, Result};
pub use models::{Job, JobSnapshot, NewTask, Task};
pub use ordering::{
    AbsoluteItem, Actor, BatchOutcome, OrderingCoordinator, ParentDirective, Placement,
    PlacementError, RebalanceOutcome, RelativeItem, SiblingGroup, SingleReorderOutcome,
    TaskPlacementView,
};
pub use store::{AppliedBatch, MemoryTaskStore, PgTaskStore, TaskStore, TaskWrite, WriteSet};
