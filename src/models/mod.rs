//! # Data Layer
//!
//! Row models for jobs and their ordered, hierarchical tasks. These map
//! one-to-one onto the `taskboard_jobs` and `taskboard_tasks` tables (see
//! `migrations/`), and double as the in-memory representation used by the
//! embedded store.

pub mod job;
pub mod task;

pub use job::{Job, JobSnapshot};
pub use task::{NewTask, Task};
