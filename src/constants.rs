//! # System Constants
//!
//! Core constants and enums that define the operational boundaries of the
//! position and hierarchy engine.
//!
//! The spacing and threshold values are deliberate: `POSITION_SPACING` leaves
//! enough room between adjacent siblings for many midpoint insertions before
//! a rebalance becomes necessary, and `POSITION_CEILING` keeps every position
//! comfortably inside the signed 32-bit range even after repeated
//! append-to-bottom operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gap left between adjacent sibling positions on allocation and rebalance.
pub const POSITION_SPACING: i32 = 10_000;

/// Smallest position a task may occupy. Positions are always positive.
pub const POSITION_FLOOR: i32 = 1;

/// Application ceiling for positions, well below `i32::MAX`.
pub const POSITION_CEILING: i32 = 2_000_000_000;

/// An adjacent gap below this value means midpoint precision is exhausted.
pub const REBALANCE_MIN_GAP: i32 = 2;

/// A max-gap / min-gap ratio above this value means the distribution is too
/// skewed to keep absorbing insertions evenly.
pub const REBALANCE_GAP_RATIO_LIMIT: i32 = 100;

/// Upper bound on directives accepted in a single batch call.
pub const MAX_BATCH_ITEMS: usize = 1_000;

/// Lifecycle states a task can be in.
///
/// Stored as lowercase strings in the `status` column; the enum exists so
/// engine code never passes raw strings around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Complete,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Complete => "complete",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "complete" => Ok(TaskStatus::Complete),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}
