//! services/tracker/src/error.rs
//!
//! Defines the primary error type for the tracker service.

use crate::config::ConfigError;
use reading_plan_core::ReadingPlanError;

/// The primary error type for the `tracker` service.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error returned by a reading plan operation.
    #[error("Reading plan error: {0}")]
    ReadingPlan(#[from] ReadingPlanError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),
}
