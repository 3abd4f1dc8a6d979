//! services/tracker/src/state.rs
//!
//! Builds the shared application state: one reading plan service wired to the
//! Postgres adapters, created once at startup and shared by all callers.

use crate::adapters::{PgContentAdapter, PgStore};
use crate::config::Config;
use crate::error::TrackerError;
use reading_plan_core::{ReadingPlanService, SystemClock};
use std::sync::Arc;
use tracing::info;

/// The shared application state, created once at startup and passed to all callers.
#[derive(Clone)]
pub struct AppState {
    pub store: PgStore,
    pub reading_plans: Arc<ReadingPlanService>,
}

impl AppState {
    /// Connects to the database and wires the service. Migrations are not run here.
    pub async fn connect(config: &Config) -> Result<Self, TrackerError> {
        info!("Connecting to database...");
        let store = PgStore::connect(config).await?;
        Ok(Self::from_store(config, store))
    }

    pub fn from_store(config: &Config, store: PgStore) -> Self {
        let shared = Arc::new(store.clone());
        let content = Arc::new(PgContentAdapter::new(store.pool().clone()));

        let reading_plans = ReadingPlanService::new(
            shared.clone(),
            shared.clone(),
            shared,
            content,
            Arc::new(SystemClock),
        )
        .with_default_timezone(config.default_timezone)
        .with_default_bible_version(config.default_bible_version.clone());

        Self {
            store,
            reading_plans: Arc::new(reading_plans),
        }
    }
}
