//! crates/reading_plan_core/src/calendar.rs
//!
//! Calendar placement of completed days.

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::domain::{CalendarDay, CompletedDay, ReadingPlan};
use crate::streak::scheduled_date;

/// The final authored day of a fixed annual plan.
const LAST_ANNUAL_DAY: u32 = 365;

pub fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Where a completed day is displayed.
///
/// Fixed 365-day plans have no row for December 31 of a leap year, so their
/// last day is shown there instead of on its stored date.
pub fn display_date(plan: &ReadingPlan, year: i32, day_number: u32, stored: NaiveDate) -> NaiveDate {
    if day_number == LAST_ANNUAL_DAY && plan.is_fixed_annual() && is_leap_year(year) {
        NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(stored)
    } else {
        stored
    }
}

/// Calendar entries for `completed`, ordered by displayed date.
pub fn calendar_days(
    plan: &ReadingPlan,
    year: i32,
    completed: &[CompletedDay],
    timezone: Tz,
) -> Vec<CalendarDay> {
    let mut days: Vec<CalendarDay> = completed
        .iter()
        .filter_map(|day| {
            let completed_at = day.progress.completed_at?;
            let stored = match day.day_date {
                Some(date) => date.date_naive(),
                None => scheduled_date(day, timezone)?,
            };
            Some(CalendarDay {
                day_id: day.progress.day_id,
                day_number: day.day_number,
                date: display_date(plan, year, day.day_number, stored),
                completed_at,
            })
        })
        .collect();
    days.sort_by_key(|d| (d.date, d.day_number));
    days
}
