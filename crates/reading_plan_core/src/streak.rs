//! crates/reading_plan_core/src/streak.rs
//!
//! Consecutive-day streak computation.
//!
//! A completed day only counts when it was completed on the same civil date it
//! was scheduled for, in the user's timezone. Late (backfilled) completions keep
//! their `completed_at` but never contribute to a streak.

use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::BTreeSet;
use tracing::warn;

use crate::domain::CompletedDay;
use crate::timezone::civil_date;

/// The civil date a completed record was scheduled for.
///
/// Prefers the stored streak anchor, then the day's canonical date, and only as
/// a last resort the completion instant itself.
pub fn scheduled_date(day: &CompletedDay, timezone: Tz) -> Option<NaiveDate> {
    if let Some(anchor) = day.progress.last_streak_date {
        return Some(civil_date(anchor, timezone));
    }
    if let Some(date) = day.day_date {
        // Canonical dates are UTC midnight of the civil date; not re-projected into `timezone`.
        return Some(date.date_naive());
    }
    let completed_at = day.progress.completed_at?;
    warn!(
        progress_id = %day.progress.id,
        day_number = day.day_number,
        "No scheduled date on completed record, using completion time"
    );
    Some(civil_date(completed_at, timezone))
}

/// Scheduled dates of every record completed on its own scheduled date.
pub fn qualifying_dates(days: &[CompletedDay], timezone: Tz) -> BTreeSet<NaiveDate> {
    days.iter()
        .filter_map(|day| {
            let completed_on = civil_date(day.progress.completed_at?, timezone);
            let scheduled = scheduled_date(day, timezone)?;
            (scheduled == completed_on).then_some(scheduled)
        })
        .collect()
}

/// Walks back from today (or yesterday, if today is not done yet) while each
/// civil date is in `qualifying`.
pub fn walk_back(qualifying: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut cursor = if qualifying.contains(&today) {
        Some(today)
    } else {
        today.pred_opt()
    };

    let mut streak = 0;
    while let Some(date) = cursor.filter(|d| qualifying.contains(d)) {
        streak += 1;
        cursor = date.pred_opt();
    }
    streak
}

pub fn current_streak(days: &[CompletedDay], timezone: Tz, today: NaiveDate) -> u32 {
    walk_back(&qualifying_dates(days, timezone), today)
}
