//! services/tracker/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `PlanRepository`, `ProgressRepository` and `UserProfileService` ports from
//! the `core` crate. It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reading_plan_core::domain::{
    CompletedDay, Passage, PassagesProgress, ReadingPlan, ReadingPlanDay, UserReadingProgress,
};
use reading_plan_core::ports::{
    PlanRepository, PortError, PortResult, ProgressRepository, UserProfileService,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter backing plans, progress records and user profiles.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from the configuration.
    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Converts a signed column value into a count, rejecting negative rows.
pub(crate) fn non_negative(value: i32, column: &str) -> PortResult<u32> {
    u32::try_from(value)
        .map_err(|_| PortError::Unexpected(format!("Negative {} in stored row: {}", column, value)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct PlanRecord {
    id: Uuid,
    name: String,
    version: String,
    year: i32,
    total_days: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    is_active: bool,
    metadata: serde_json::Value,
}
impl PlanRecord {
    fn to_domain(self) -> PortResult<ReadingPlan> {
        Ok(ReadingPlan {
            id: self.id,
            name: self.name,
            version: self.version,
            year: self.year,
            total_days: non_negative(self.total_days, "total_days")?,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            metadata: self.metadata,
        })
    }
}

#[derive(FromRow)]
struct DayRecord {
    id: Uuid,
    plan_id: Uuid,
    day_number: i32,
    date: DateTime<Utc>,
    passages: Json<Vec<Passage>>,
}
impl DayRecord {
    fn to_domain(self) -> PortResult<ReadingPlanDay> {
        Ok(ReadingPlanDay {
            id: self.id,
            plan_id: self.plan_id,
            day_number: non_negative(self.day_number, "day_number")?,
            date: self.date,
            passages: self.passages.0,
        })
    }
}

#[derive(FromRow)]
struct ProgressRecord {
    id: Uuid,
    user_id: Uuid,
    plan_id: Uuid,
    day_id: Uuid,
    day_number: i32,
    passages_progress: Json<PassagesProgress>,
    completed_at: Option<DateTime<Utc>>,
    last_streak_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProgressRecord {
    fn to_domain(self) -> PortResult<UserReadingProgress> {
        Ok(UserReadingProgress {
            id: self.id,
            user_id: self.user_id,
            plan_id: self.plan_id,
            day_id: self.day_id,
            day_number: non_negative(self.day_number, "day_number")?,
            passages_progress: self.passages_progress.0,
            completed_at: self.completed_at,
            last_streak_date: self.last_streak_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CompletedDayRecord {
    #[sqlx(flatten)]
    progress: ProgressRecord,
    plan_day_number: Option<i32>,
    day_date: Option<DateTime<Utc>>,
}
impl CompletedDayRecord {
    fn to_domain(self) -> PortResult<CompletedDay> {
        let progress = self.progress.to_domain()?;
        let day_number = match self.plan_day_number {
            Some(n) => non_negative(n, "day_number")?,
            None => progress.day_number,
        };
        Ok(CompletedDay {
            day_number,
            day_date: self.day_date,
            progress,
        })
    }
}

const PLAN_COLUMNS: &str =
    "id, name, version, year, total_days, start_date, end_date, is_active, metadata";

const DAY_COLUMNS: &str = "id, plan_id, day_number, date, passages";

const PROGRESS_COLUMNS: &str = "id, user_id, plan_id, day_id, day_number, passages_progress, \
     completed_at, last_streak_date, created_at, updated_at";

//=========================================================================================
// `PlanRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl PlanRepository for PgStore {
    async fn get_plan(&self, plan_id: Uuid) -> PortResult<Option<ReadingPlan>> {
        let record = sqlx::query_as::<_, PlanRecord>(&format!(
            "SELECT {} FROM reading_plans WHERE id = $1",
            PLAN_COLUMNS
        ))
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(PlanRecord::to_domain).transpose()
    }

    async fn find_active_plan_for_year(&self, year: i32) -> PortResult<Option<ReadingPlan>> {
        let record = sqlx::query_as::<_, PlanRecord>(&format!(
            "SELECT {} FROM reading_plans WHERE is_active AND year = $1 ORDER BY created_at DESC LIMIT 1",
            PLAN_COLUMNS
        ))
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(PlanRecord::to_domain).transpose()
    }

    async fn active_plan_years(&self) -> PortResult<Vec<i32>> {
        sqlx::query_scalar::<_, i32>(
            "SELECT DISTINCT year FROM reading_plans WHERE is_active ORDER BY year",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn get_day(&self, day_id: Uuid) -> PortResult<Option<ReadingPlanDay>> {
        let record = sqlx::query_as::<_, DayRecord>(&format!(
            "SELECT {} FROM reading_plan_days WHERE id = $1",
            DAY_COLUMNS
        ))
        .bind(day_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(DayRecord::to_domain).transpose()
    }

    async fn find_day_in_window(
        &self,
        plan_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Option<ReadingPlanDay>> {
        let record = sqlx::query_as::<_, DayRecord>(&format!(
            "SELECT {} FROM reading_plan_days \
             WHERE plan_id = $1 AND date >= $2 AND date < $3 \
             ORDER BY date ASC LIMIT 1",
            DAY_COLUMNS
        ))
        .bind(plan_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(DayRecord::to_domain).transpose()
    }
}

//=========================================================================================
// `ProgressRepository` Trait Implementation
//=========================================================================================

impl PgStore {
    fn ensure_updated(
        result: sqlx::postgres::PgQueryResult,
        day_id: Uuid,
    ) -> PortResult<()> {
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Progress record for day {} not found",
                day_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for PgStore {
    async fn get(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
    ) -> PortResult<Option<UserReadingProgress>> {
        let record = sqlx::query_as::<_, ProgressRecord>(&format!(
            "SELECT {} FROM user_reading_progress \
             WHERE user_id = $1 AND plan_id = $2 AND day_id = $3",
            PROGRESS_COLUMNS
        ))
        .bind(user_id)
        .bind(plan_id)
        .bind(day_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(ProgressRecord::to_domain).transpose()
    }

    async fn get_or_create(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        day_number: u32,
    ) -> PortResult<UserReadingProgress> {
        sqlx::query(
            "INSERT INTO user_reading_progress (id, user_id, plan_id, day_id, day_number) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, plan_id, day_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(plan_id)
        .bind(day_id)
        .bind(day_number as i32)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        self.get(user_id, plan_id, day_id).await?.ok_or_else(|| {
            PortError::Unexpected(format!("Progress record for day {} was not created", day_id))
        })
    }

    async fn upsert_passage_completion(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        passage_index: usize,
        completed: bool,
    ) -> PortResult<()> {
        // Step 1: drop any entry for this index. Non-object placeholders are left
        // for the caller's sanitize pass.
        let removed = sqlx::query(
            "UPDATE user_reading_progress SET \
                 passages_progress = COALESCE(( \
                     SELECT jsonb_agg(e.entry ORDER BY e.ord) \
                     FROM jsonb_array_elements(passages_progress) WITH ORDINALITY AS e(entry, ord) \
                     WHERE jsonb_typeof(e.entry) <> 'object' \
                        OR (e.entry->>'passage_index')::int <> $4 \
                 ), '[]'::jsonb), \
                 updated_at = now() \
             WHERE user_id = $1 AND plan_id = $2 AND day_id = $3",
        )
        .bind(user_id)
        .bind(plan_id)
        .bind(day_id)
        .bind(passage_index as i32)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Self::ensure_updated(removed, day_id)?;

        // Step 2: append the new entry.
        let appended = sqlx::query(
            "UPDATE user_reading_progress SET \
                 passages_progress = passages_progress || jsonb_build_array( \
                     jsonb_build_object('passage_index', $4::int, 'completed', $5::boolean)), \
                 updated_at = now() \
             WHERE user_id = $1 AND plan_id = $2 AND day_id = $3",
        )
        .bind(user_id)
        .bind(plan_id)
        .bind(day_id)
        .bind(passage_index as i32)
        .bind(completed)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Self::ensure_updated(appended, day_id)
    }

    async fn replace_passages(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        passages: &PassagesProgress,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE user_reading_progress SET passages_progress = $4, updated_at = now() \
             WHERE user_id = $1 AND plan_id = $2 AND day_id = $3",
        )
        .bind(user_id)
        .bind(plan_id)
        .bind(day_id)
        .bind(Json(passages))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Self::ensure_updated(result, day_id)
    }

    async fn mark_day_complete(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        completed_at: DateTime<Utc>,
        last_streak_date: DateTime<Utc>,
    ) -> PortResult<()> {
        // A second writer matches no row; the first completion stands.
        sqlx::query(
            "UPDATE user_reading_progress \
             SET completed_at = $4, last_streak_date = $5, updated_at = now() \
             WHERE user_id = $1 AND plan_id = $2 AND day_id = $3 AND completed_at IS NULL",
        )
        .bind(user_id)
        .bind(plan_id)
        .bind(day_id)
        .bind(completed_at)
        .bind(last_streak_date)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_completed(&self, user_id: Uuid, plan_id: Uuid) -> PortResult<Vec<CompletedDay>> {
        let records = sqlx::query_as::<_, CompletedDayRecord>(
            "SELECT p.id, p.user_id, p.plan_id, p.day_id, p.day_number, p.passages_progress, \
                    p.completed_at, p.last_streak_date, p.created_at, p.updated_at, \
                    d.day_number AS plan_day_number, d.date AS day_date \
             FROM user_reading_progress p \
             LEFT JOIN reading_plan_days d ON d.id = p.day_id \
             WHERE p.user_id = $1 AND p.plan_id = $2 AND p.completed_at IS NOT NULL \
             ORDER BY p.day_number ASC",
        )
        .bind(user_id)
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(CompletedDayRecord::to_domain).collect()
    }

    async fn count_completed_in_plan(&self, user_id: Uuid, plan_id: Uuid) -> PortResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM user_reading_progress \
             WHERE user_id = $1 AND plan_id = $2 AND completed_at IS NOT NULL",
        )
        .bind(user_id)
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        u64::try_from(count)
            .map_err(|_| PortError::Unexpected(format!("Negative completed count: {}", count)))
    }
}

//=========================================================================================
// `UserProfileService` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserProfileService for PgStore {
    async fn get_timezone(&self, user_id: Uuid) -> PortResult<Option<String>> {
        let timezone = sqlx::query_scalar::<_, Option<String>>(
            "SELECT timezone FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(timezone.flatten())
    }
}
