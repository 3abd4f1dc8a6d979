//! crates/reading_plan_core/src/ports.rs
//!
//! Defines the service contracts (traits) the reading plan core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of the database, the user profile store and the scripture
//! content provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ChapterContent, CompletedDay, PassagesProgress, ReadingPlan, ReadingPlanDay,
    UserReadingProgress,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports (Traits)
//=========================================================================================

/// Read-only access to imported plans and their scheduled days.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn get_plan(&self, plan_id: Uuid) -> PortResult<Option<ReadingPlan>>;

    async fn find_active_plan_for_year(&self, year: i32) -> PortResult<Option<ReadingPlan>>;

    /// Years that have at least one active plan.
    async fn active_plan_years(&self) -> PortResult<Vec<i32>>;

    async fn get_day(&self, day_id: Uuid) -> PortResult<Option<ReadingPlanDay>>;

    /// The day of `plan_id` whose `date` lies in `[start, end)`.
    async fn find_day_in_window(
        &self,
        plan_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Option<ReadingPlanDay>>;
}

/// Data access for per-user, per-day progress records. No business rules live here.
///
/// Implementations must keep at most one record per (user, plan, day).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn get(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
    ) -> PortResult<Option<UserReadingProgress>>;

    /// Returns the existing record or creates one with empty progress.
    async fn get_or_create(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        day_number: u32,
    ) -> PortResult<UserReadingProgress>;

    /// Removes any entry for `passage_index`, then appends the new entry.
    /// The two steps are not required to be atomic.
    async fn upsert_passage_completion(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        passage_index: usize,
        completed: bool,
    ) -> PortResult<()>;

    /// Overwrites the stored progress sequence.
    async fn replace_passages(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        passages: &PassagesProgress,
    ) -> PortResult<()>;

    /// Sets `completed_at` and `last_streak_date` if `completed_at` is still unset.
    async fn mark_day_complete(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        completed_at: DateTime<Utc>,
        last_streak_date: DateTime<Utc>,
    ) -> PortResult<()>;

    /// All records with a non-null `completed_at`, joined with their day.
    async fn list_completed(&self, user_id: Uuid, plan_id: Uuid) -> PortResult<Vec<CompletedDay>>;

    async fn count_completed_in_plan(&self, user_id: Uuid, plan_id: Uuid) -> PortResult<u64>;
}

//=========================================================================================
// Collaborator Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait UserProfileService: Send + Sync {
    /// The user's stored IANA timezone identifier, if any.
    async fn get_timezone(&self, user_id: Uuid) -> PortResult<Option<String>>;
}

#[async_trait]
pub trait ContentService: Send + Sync {
    /// Looks up a chapter's text and audio metadata.
    async fn get_chapter(
        &self,
        bible_version: Option<&str>,
        book: &str,
        chapter: u32,
    ) -> PortResult<ChapterContent>;
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
