//! # Configuration
//!
//! Explicit, validated configuration loading. Defaults mirror the engine
//! constants; overrides come from an optional file named by
//! `TASKBOARD_CONFIG` plus `TASKBOARD_`-prefixed environment variables
//! (double underscore as the section separator, e.g.
//! `TASKBOARD_ORDERING__SPACING=5000`).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_BATCH_ITEMS, POSITION_SPACING};

/// Tunables of the ordering engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    /// Gap left between adjacent siblings on allocation and rebalance.
    pub spacing: i32,
    /// Upper bound on directives per batch call.
    pub max_batch_items: usize,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            spacing: POSITION_SPACING,
            max_batch_items: MAX_BATCH_ITEMS,
        }
    }
}

/// Connection settings for the Postgres store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/taskboard_development".to_string(),
            pool: 10,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TaskboardConfig {
    pub environment: Option<String>,
    pub ordering: OrderingConfig,
    pub database: DatabaseConfig,
}

impl TaskboardConfig {
    /// Load configuration: defaults, then the optional file named by
    /// `TASKBOARD_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Ok(path) = std::env::var("TASKBOARD_CONFIG") {
            builder = builder.add_source(File::with_name(&path));
        }
        let settings = builder
            .add_source(Environment::with_prefix("TASKBOARD").separator("__"))
            .build()?;

        let mut loaded: TaskboardConfig = settings.try_deserialize()?;
        if loaded.environment.is_none() {
            loaded.environment = Some(detect_environment());
        }
        Ok(loaded)
    }

    pub fn environment(&self) -> &str {
        self.environment.as_deref().unwrap_or("development")
    }
}

/// Current environment from environment variables.
fn detect_environment() -> String {
    std::env::var("TASKBOARD_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}
