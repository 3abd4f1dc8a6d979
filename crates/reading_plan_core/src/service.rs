//! crates/reading_plan_core/src/service.rs
//!
//! The reading plan engine: locates plans and days, applies passage progress,
//! and produces streak, stats and calendar rollups. One long-lived instance is
//! built at startup with its repositories and collaborators injected.

use chrono::Datelike;
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar;
use crate::domain::{
    CalendarSummary, DailyReading, PassageProgressUpdate, PassageStatus, PassageView,
    ProgressUpdate, ReadingPlan, ReadingPlanDay, UserReadingProgress, UserStats,
};
use crate::error::{ReadingPlanError, ReadingPlanResult};
use crate::ports::{
    Clock, ContentService, PlanRepository, PortError, ProgressRepository, UserProfileService,
};
use crate::streak;
use crate::timezone::{local_midnight, DayWindow, DayWindowResolver};

/// Parameters of a "reading for date D" request.
#[derive(Debug, Clone, Default)]
pub struct ReadingByDateRequest {
    pub user_id: Uuid,
    /// Civil date key, `YYYY-MM-DD`.
    pub date: String,
    pub plan_id: Option<Uuid>,
    pub bible_version: Option<String>,
}

#[derive(Clone)]
pub struct ReadingPlanService {
    plans: Arc<dyn PlanRepository>,
    progress: Arc<dyn ProgressRepository>,
    content: Arc<dyn ContentService>,
    resolver: DayWindowResolver,
    default_bible_version: Option<String>,
}

impl ReadingPlanService {
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        progress: Arc<dyn ProgressRepository>,
        profiles: Arc<dyn UserProfileService>,
        content: Arc<dyn ContentService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            plans,
            progress,
            content,
            resolver: DayWindowResolver::new(profiles, clock),
            default_bible_version: None,
        }
    }

    /// Timezone used for users without a stored profile value.
    pub fn with_default_timezone(mut self, timezone: Tz) -> Self {
        self.resolver = self.resolver.with_fallback(timezone);
        self
    }

    pub fn with_default_bible_version(mut self, version: Option<String>) -> Self {
        self.default_bible_version = version;
        self
    }

    //=====================================================================================
    // Plan/Day Locator
    //=====================================================================================

    pub async fn find_active_plan_for_year(&self, year: i32) -> ReadingPlanResult<ReadingPlan> {
        self.plans
            .find_active_plan_for_year(year)
            .await?
            .ok_or_else(|| {
                ReadingPlanError::NotFound(format!("No active reading plan for year {}", year))
            })
    }

    /// The plan's scheduled day inside the canonical window of `window`.
    pub async fn find_day(
        &self,
        plan_id: Uuid,
        window: &DayWindow,
    ) -> ReadingPlanResult<ReadingPlanDay> {
        self.plans
            .find_day_in_window(plan_id, window.canonical_start_utc, window.canonical_end_utc)
            .await?
            .ok_or_else(|| {
                ReadingPlanError::NotFound(format!("No reading scheduled for {}", window.ymd))
            })
    }

    /// The requested plan, or the active plan for `year` when none is given.
    async fn plan_or_active(
        &self,
        plan_id: Option<Uuid>,
        year: i32,
    ) -> ReadingPlanResult<ReadingPlan> {
        match plan_id {
            Some(id) => self
                .plans
                .get_plan(id)
                .await?
                .ok_or_else(|| ReadingPlanError::NotFound(format!("Reading plan {} not found", id))),
            None => self.find_active_plan_for_year(year).await,
        }
    }

    //=====================================================================================
    // Read Paths
    //=====================================================================================

    pub async fn get_today_reading(
        &self,
        user_id: Uuid,
        plan_id: Option<Uuid>,
        tz_override: Option<&str>,
    ) -> ReadingPlanResult<DailyReading> {
        let window = self.resolver.resolve(user_id, None, tz_override).await?;
        debug!(user_id = %user_id, date = %window.ymd, timezone = %window.timezone.name(), "Resolving today's reading");
        let plan = self.plan_or_active(plan_id, window.date.year()).await?;
        let day = self.find_day(plan.id, &window).await?;
        self.assemble_reading(user_id, plan, day, &window, None).await
    }

    /// Today's and past readings only; a future date fails with `Forbidden`.
    pub async fn get_reading_by_date(
        &self,
        request: ReadingByDateRequest,
    ) -> ReadingPlanResult<DailyReading> {
        let user_id = request.user_id;
        let window = self
            .resolver
            .resolve(user_id, Some(request.date.as_str()), None)
            .await?;
        let today = DayWindow::today(window.timezone, self.resolver.now());
        // Both keys are zero-padded YYYY-MM-DD, so string order is date order.
        if window.ymd > today.ymd {
            return Err(ReadingPlanError::Forbidden(format!(
                "Reading for {} is not available before that date",
                window.ymd
            )));
        }

        let plan = self.plan_or_active(request.plan_id, window.date.year()).await?;
        let day = self.find_day(plan.id, &window).await?;
        let version = request
            .bible_version
            .or_else(|| self.default_bible_version.clone());
        self.assemble_reading(user_id, plan, day, &window, version.as_deref())
            .await
    }

    async fn assemble_reading(
        &self,
        user_id: Uuid,
        plan: ReadingPlan,
        day: ReadingPlanDay,
        window: &DayWindow,
        bible_version: Option<&str>,
    ) -> ReadingPlanResult<DailyReading> {
        let progress = self.progress.get(user_id, plan.id, day.id).await?;
        let total_count = day.total_passages();

        let mut passages = Vec::with_capacity(total_count);
        for (index, passage) in day.passages.iter().enumerate() {
            let status = progress
                .as_ref()
                .map(|p| p.passages_progress.status(index))
                .unwrap_or(PassageStatus::Untouched);
            let content = match self
                .content
                .get_chapter(bible_version, &passage.book, passage.chapter)
                .await
            {
                Ok(content) => Some(content),
                Err(e) => {
                    warn!(book = %passage.book, chapter = passage.chapter, error = %e, "Content lookup failed, omitting passage content");
                    None
                }
            };
            passages.push(PassageView {
                index,
                passage: passage.clone(),
                status,
                content,
            });
        }

        let completed_count = progress
            .as_ref()
            .map(|p| p.passages_progress.completed_count(total_count))
            .unwrap_or(0);
        let is_completed = progress
            .as_ref()
            .is_some_and(|p| p.completed_at.is_some());

        Ok(DailyReading {
            date: window.date,
            timezone: window.timezone.name().to_string(),
            plan,
            day,
            passages,
            progress,
            completed_count,
            total_count,
            is_completed,
        })
    }

    //=====================================================================================
    // Passage Progress Mutator
    //=====================================================================================

    /// Records one passage as completed or not, auto-completing the day once
    /// every passage is completed. Safe to retry.
    pub async fn update_passage_progress(
        &self,
        user_id: Uuid,
        day_id: Uuid,
        passage_index: usize,
        update: PassageProgressUpdate,
    ) -> ReadingPlanResult<ProgressUpdate> {
        // 1. Resolve the scheduled day.
        let day = self
            .plans
            .get_day(day_id)
            .await?
            .ok_or_else(|| ReadingPlanError::NotFound(format!("Reading day {} not found", day_id)))?;
        let plan_id = day.plan_id;
        let total_count = day.total_passages();
        if passage_index >= total_count {
            return Err(ReadingPlanError::InvalidPassageIndex {
                index: passage_index,
                total: total_count,
            });
        }
        let completed = update.completed.unwrap_or(false);

        // 2. Ensure the record exists, then replace the entry for this index.
        self.progress
            .get_or_create(user_id, plan_id, day_id, day.day_number)
            .await?;
        self.progress
            .upsert_passage_completion(user_id, plan_id, day_id, passage_index, completed)
            .await?;

        // 3. Re-read and repair anything a concurrent write left behind.
        let mut record = self.reload(user_id, plan_id, day_id).await?;
        if let Some(cleaned) = record.passages_progress.sanitized() {
            warn!(
                user_id = %user_id,
                day_id = %day_id,
                before = record.passages_progress.raw().len(),
                after = cleaned.raw().len(),
                "Repairing passage progress sequence"
            );
            self.progress
                .replace_passages(user_id, plan_id, day_id, &cleaned)
                .await?;
            record = self.reload(user_id, plan_id, day_id).await?;
        }

        // 4. Auto-complete the day exactly once.
        let completed_count = record.passages_progress.completed_count(total_count);
        let mut day_completed_now = false;
        if record.passages_progress.all_completed(total_count) && record.completed_at.is_none() {
            let timezone = self.resolver.timezone_for(user_id, None).await;
            let last_streak_date = local_midnight(day.scheduled_date(), timezone);
            let completed_at = self.resolver.now();
            self.progress
                .mark_day_complete(user_id, plan_id, day_id, completed_at, last_streak_date)
                .await?;
            record = self.reload(user_id, plan_id, day_id).await?;
            day_completed_now = true;
            info!(user_id = %user_id, day_id = %day_id, day_number = day.day_number, "Reading day completed");
        }

        let streak = if day_completed_now {
            Some(self.current_streak(user_id, Some(plan_id)).await)
        } else {
            None
        };

        Ok(ProgressUpdate {
            progress: record,
            completed_count,
            total_count,
            day_completed_now,
            streak,
        })
    }

    async fn reload(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
    ) -> ReadingPlanResult<UserReadingProgress> {
        self.progress
            .get(user_id, plan_id, day_id)
            .await?
            .ok_or_else(|| {
                ReadingPlanError::Port(PortError::Unexpected(format!(
                    "Progress record for day {} disappeared after write",
                    day_id
                )))
            })
    }

    //=====================================================================================
    // Streak Calculator
    //=====================================================================================

    /// The user's current streak. Any failure degrades to `0`.
    pub async fn current_streak(&self, user_id: Uuid, plan_id: Option<Uuid>) -> u32 {
        match self.try_current_streak(user_id, plan_id).await {
            Ok(streak) => streak,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Streak computation failed, reporting 0");
                0
            }
        }
    }

    async fn try_current_streak(
        &self,
        user_id: Uuid,
        plan_id: Option<Uuid>,
    ) -> ReadingPlanResult<u32> {
        let timezone = self.resolver.timezone_for(user_id, None).await;
        let today = DayWindow::today(timezone, self.resolver.now());
        let plan_id = match plan_id {
            Some(id) => id,
            None => self.find_active_plan_for_year(today.date.year()).await?.id,
        };
        let completed = self.progress.list_completed(user_id, plan_id).await?;
        Ok(streak::current_streak(&completed, timezone, today.date))
    }

    //=====================================================================================
    // Calendar/Stats Aggregator
    //=====================================================================================

    /// Completed-day count and current streak. `longest_streak` reports the
    /// current streak; no historical maximum is tracked.
    pub async fn get_user_stats(
        &self,
        user_id: Uuid,
        plan_id: Option<Uuid>,
    ) -> ReadingPlanResult<UserStats> {
        let timezone = self.resolver.timezone_for(user_id, None).await;
        let today = DayWindow::today(timezone, self.resolver.now());
        let plan = self.plan_or_active(plan_id, today.date.year()).await?;

        let total_completed = self.progress.count_completed_in_plan(user_id, plan.id).await?;
        let current_streak = self.current_streak(user_id, Some(plan.id)).await;

        Ok(UserStats {
            plan_id: plan.id,
            total_completed,
            current_streak,
            longest_streak: current_streak,
        })
    }

    pub async fn get_completed_days_for_calendar(
        &self,
        user_id: Uuid,
        plan_id: Option<Uuid>,
        year: Option<i32>,
    ) -> ReadingPlanResult<CalendarSummary> {
        let timezone = self.resolver.timezone_for(user_id, None).await;
        let today = DayWindow::today(timezone, self.resolver.now());
        let year = year.unwrap_or_else(|| today.date.year());
        let plan = self.plan_or_active(plan_id, year).await?;

        let completed = self.progress.list_completed(user_id, plan.id).await?;
        let completed_days = calendar::calendar_days(&plan, year, &completed, timezone);
        let streak = streak::current_streak(&completed, timezone, today.date);

        let mut available_years = match self.plans.active_plan_years().await {
            Ok(years) => years,
            Err(e) => {
                warn!(error = %e, "Listing plan years failed, returning none");
                Vec::new()
            }
        };
        available_years.sort_unstable();
        available_years.dedup();

        Ok(CalendarSummary {
            plan_id: plan.id,
            year,
            total_completed: completed_days.len(),
            completed_days,
            streak,
            available_years,
        })
    }
}
