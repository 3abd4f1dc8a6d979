//! crates/reading_plan_core/src/timezone.rs
//!
//! Resolves a user's timezone and turns civil dates into the UTC instants used
//! for plan-day lookups (canonical window) and for streak anchors (local midnight).

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::error::{ReadingPlanError, ReadingPlanResult};
use crate::ports::{Clock, UserProfileService};

const YMD_FORMAT: &str = "%Y-%m-%d";

/// The day boundaries for one civil date as seen from one timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayWindow {
    pub timezone: Tz,
    /// Civil-date key, always `YYYY-MM-DD`.
    pub ymd: String,
    pub date: NaiveDate,
    /// `ymd` at 00:00:00 UTC. Plan days are stored on this boundary.
    pub canonical_start_utc: DateTime<Utc>,
    pub canonical_end_utc: DateTime<Utc>,
    /// Midnight of `ymd` in `timezone`, expressed in UTC.
    pub local_start_utc: DateTime<Utc>,
}

impl DayWindow {
    pub fn for_date(timezone: Tz, date: NaiveDate) -> Self {
        let canonical_start_utc = canonical_start(date);
        Self {
            timezone,
            ymd: ymd_key(date),
            date,
            canonical_start_utc,
            canonical_end_utc: canonical_start_utc + Duration::days(1),
            local_start_utc: local_midnight(date, timezone),
        }
    }

    /// The window for the civil date containing `now` in `timezone`.
    pub fn today(timezone: Tz, now: DateTime<Utc>) -> Self {
        Self::for_date(timezone, civil_date(now, timezone))
    }
}

/// Parses an IANA identifier, falling back to UTC with a warning.
pub fn parse_timezone(name: &str) -> Tz {
    match name.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(timezone = %name, "Unknown timezone identifier, falling back to UTC");
            Tz::UTC
        }
    }
}

/// Parses a strict `YYYY-MM-DD` key. Non-padded forms are rejected so keys
/// stay comparable as strings.
pub fn parse_ymd(ymd: &str) -> ReadingPlanResult<NaiveDate> {
    NaiveDate::parse_from_str(ymd, YMD_FORMAT)
        .ok()
        .filter(|date| ymd_key(*date) == ymd)
        .ok_or_else(|| ReadingPlanError::InvalidDate(ymd.to_string()))
}

pub fn ymd_key(date: NaiveDate) -> String {
    date.format(YMD_FORMAT).to_string()
}

/// The civil date of `instant` in `timezone`.
pub fn civil_date(instant: DateTime<Utc>, timezone: Tz) -> NaiveDate {
    instant.with_timezone(&timezone).date_naive()
}

/// `date` at 00:00:00 UTC.
pub fn canonical_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// The first instant of `date` in `timezone`.
///
/// Ambiguous midnights take the earlier instant. Where a DST gap swallows
/// midnight, the first valid local time after it is used.
pub fn local_midnight(date: NaiveDate, timezone: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    // Gaps are at most a few hours; probe in 15 minute steps.
    for step in 0..=16 {
        let probe: NaiveDateTime = midnight + Duration::minutes(15 * step);
        match timezone.from_local_datetime(&probe) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => continue,
        }
    }
    Utc.from_utc_datetime(&midnight)
}

//=========================================================================================
// Resolver
//=========================================================================================

/// Resolves "which day is it for this user" against the profile collaborator.
#[derive(Clone)]
pub struct DayWindowResolver {
    profiles: Arc<dyn UserProfileService>,
    clock: Arc<dyn Clock>,
    fallback: Tz,
}

impl DayWindowResolver {
    pub fn new(profiles: Arc<dyn UserProfileService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            profiles,
            clock,
            fallback: Tz::UTC,
        }
    }

    /// Replaces the timezone used when a user has none stored.
    pub fn with_fallback(mut self, fallback: Tz) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Override, else stored profile value, else the fallback. Never fails.
    pub async fn timezone_for(&self, user_id: Uuid, tz_override: Option<&str>) -> Tz {
        if let Some(name) = tz_override.filter(|s| !s.trim().is_empty()) {
            return parse_timezone(name);
        }
        match self.profiles.get_timezone(user_id).await {
            Ok(Some(name)) if !name.trim().is_empty() => parse_timezone(&name),
            Ok(_) => self.fallback,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Timezone lookup failed, using fallback");
                self.fallback
            }
        }
    }

    /// Resolves the window for `date` (or today when absent) for this user.
    pub async fn resolve(
        &self,
        user_id: Uuid,
        date: Option<&str>,
        tz_override: Option<&str>,
    ) -> ReadingPlanResult<DayWindow> {
        let timezone = self.timezone_for(user_id, tz_override).await;
        match date {
            Some(ymd) => Ok(DayWindow::for_date(timezone, parse_ymd(ymd)?)),
            None => Ok(DayWindow::today(timezone, self.clock.now())),
        }
    }
}
