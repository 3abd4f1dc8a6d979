//! crates/reading_plan_core/src/domain.rs
//!
//! Defines the pure, core data structures for the reading plan tracker.
//! These structs are independent of any database; serde derives exist so
//! adapters can store passage lists and progress sequences as JSON documents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

//=========================================================================================
// Plans and Scheduled Days (read-only, created by import)
//=========================================================================================

/// A dated reading plan for a single civil year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPlan {
    pub id: Uuid,
    pub name: String,
    pub version: String,
    pub year: i32,
    pub total_days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ReadingPlan {
    /// True for plans authored as a fixed 365-day annual sequence.
    ///
    /// Marked either by `metadata.fixedAnnual = true` or by a "365" in the
    /// plan name, and always requires exactly 365 authored days.
    pub fn is_fixed_annual(&self) -> bool {
        if self.total_days != 365 {
            return false;
        }
        let flagged = self
            .metadata
            .get("fixedAnnual")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        flagged || self.name.contains("365")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassageType {
    OldTestament,
    NewTestament,
    Psalms,
    Acts,
    Custom,
}

/// One entry in a day's ordered passage list. Addressed by position only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    #[serde(rename = "type")]
    pub passage_type: PassageType,
    pub reference: String,
    pub book: String,
    pub chapter: u32,
    #[serde(default)]
    pub verse_start: Option<u32>,
    #[serde(default)]
    pub verse_end: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A scheduled day of a plan.
///
/// `date` is the civil date at 00:00:00 UTC, never a user's local midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPlanDay {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub day_number: u32,
    pub date: DateTime<Utc>,
    pub passages: Vec<Passage>,
}

impl ReadingPlanDay {
    /// The civil date this day is scheduled for.
    pub fn scheduled_date(&self) -> NaiveDate {
        self.date.date_naive()
    }

    pub fn total_passages(&self) -> usize {
        self.passages.len()
    }
}

//=========================================================================================
// Passage Progress
//=========================================================================================

/// A single stored progress entry for a passage position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageProgressEntry {
    pub passage_index: usize,
    pub completed: bool,
}

/// The state of one passage position as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PassageStatus {
    /// No entry exists for this position.
    Untouched,
    /// The user explicitly marked this position, either way.
    Touched { completed: bool },
}

/// The sparse, ordered progress sequence stored on a progress record.
///
/// The stored form may contain `null` placeholders or duplicate entries for
/// an index when concurrent writes interleave; `sanitized` repairs both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassagesProgress(Vec<Option<PassageProgressEntry>>);

impl PassagesProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a raw stored sequence as-is, placeholders included.
    pub fn from_raw(raw: Vec<Option<PassageProgressEntry>>) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &[Option<PassageProgressEntry>] {
        &self.0
    }

    /// Non-null entries in stored order.
    pub fn entries(&self) -> impl Iterator<Item = &PassageProgressEntry> {
        self.0.iter().flatten()
    }

    /// Status of a position. With duplicates present, the last entry wins.
    pub fn status(&self, passage_index: usize) -> PassageStatus {
        self.entries()
            .filter(|e| e.passage_index == passage_index)
            .last()
            .map(|e| PassageStatus::Touched {
                completed: e.completed,
            })
            .unwrap_or(PassageStatus::Untouched)
    }

    /// Drops every entry for `passage_index`.
    pub fn remove(&mut self, passage_index: usize) {
        self.0
            .retain(|e| !matches!(e, Some(entry) if entry.passage_index == passage_index));
    }

    /// Appends an entry without checking for an existing one.
    pub fn push(&mut self, entry: PassageProgressEntry) {
        self.0.push(Some(entry));
    }

    /// Returns a cleaned copy if the stored sequence has placeholders or
    /// duplicate indices, `None` if it is already clean.
    ///
    /// For duplicates the last occurrence is kept, at its own position.
    pub fn sanitized(&self) -> Option<Self> {
        let mut seen = HashSet::new();
        let mut cleaned: Vec<Option<PassageProgressEntry>> = self
            .0
            .iter()
            .rev()
            .flatten()
            .filter(|e| seen.insert(e.passage_index))
            .map(|e| Some(*e))
            .collect();
        cleaned.reverse();

        if cleaned.len() == self.0.len() {
            None
        } else {
            Some(Self(cleaned))
        }
    }

    /// Number of distinct in-range positions currently marked completed.
    pub fn completed_count(&self, total_passages: usize) -> usize {
        (0..total_passages)
            .filter(|i| {
                matches!(
                    self.status(*i),
                    PassageStatus::Touched { completed: true }
                )
            })
            .count()
    }

    pub fn all_completed(&self, total_passages: usize) -> bool {
        total_passages > 0 && self.completed_count(total_passages) == total_passages
    }
}

/// One record per (user, plan, day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReadingProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub day_id: Uuid,
    pub day_number: u32,
    pub passages_progress: PassagesProgress,
    /// Set once when every passage is completed. Never cleared.
    pub completed_at: Option<DateTime<Utc>>,
    /// Local midnight, in the user's timezone, of the day's scheduled date.
    pub last_streak_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A completed progress record joined with its scheduled day.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedDay {
    pub progress: UserReadingProgress,
    pub day_number: u32,
    /// Canonical UTC date of the day, absent if the day row is gone.
    pub day_date: Option<DateTime<Utc>>,
}

//=========================================================================================
// Content (from the scripture collaborator)
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterContent {
    pub book: String,
    pub chapter: u32,
    pub bible_version: Option<String>,
    pub text: String,
    pub audio_url: Option<String>,
    pub audio_duration_seconds: Option<u32>,
}

//=========================================================================================
// Operation Results
//=========================================================================================

/// A passage of a day together with the user's status and optional content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassageView {
    pub index: usize,
    pub passage: Passage,
    pub status: PassageStatus,
    pub content: Option<ChapterContent>,
}

/// A day's reading as presented to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReading {
    pub plan: ReadingPlan,
    pub day: ReadingPlanDay,
    pub date: NaiveDate,
    pub timezone: String,
    pub passages: Vec<PassageView>,
    #[serde(skip)]
    pub progress: Option<UserReadingProgress>,
    pub completed_count: usize,
    pub total_count: usize,
    pub is_completed: bool,
}

/// The caller-supplied body of a passage progress update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PassageProgressUpdate {
    #[serde(default)]
    pub completed: Option<bool>,
}

/// The outcome of applying one passage update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub progress: UserReadingProgress,
    pub completed_count: usize,
    pub total_count: usize,
    /// True only for the write that transitioned the day to completed.
    pub day_completed_now: bool,
    /// Freshly computed streak, present when `day_completed_now`.
    pub streak: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub day_id: Uuid,
    pub day_number: u32,
    pub date: NaiveDate,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarSummary {
    pub plan_id: Uuid,
    pub year: i32,
    pub completed_days: Vec<CalendarDay>,
    pub total_completed: usize,
    pub streak: u32,
    pub available_years: Vec<i32>,
}

/// `longest_streak` mirrors `current_streak`; no historical maximum is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub plan_id: Uuid,
    pub total_completed: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(passage_index: usize, completed: bool) -> Option<PassageProgressEntry> {
        Some(PassageProgressEntry {
            passage_index,
            completed,
        })
    }

    #[test]
    fn untouched_is_distinct_from_uncompleted() {
        let progress = PassagesProgress::from_raw(vec![entry(1, false)]);
        assert_eq!(progress.status(0), PassageStatus::Untouched);
        assert_eq!(
            progress.status(1),
            PassageStatus::Touched { completed: false }
        );
    }

    #[test]
    fn sanitize_drops_placeholders_and_keeps_last_duplicate() {
        let progress =
            PassagesProgress::from_raw(vec![entry(0, true), None, entry(1, false), entry(0, false)]);
        let cleaned = progress.sanitized().unwrap();
        assert_eq!(cleaned.raw(), &[entry(1, false), entry(0, false)]);
        assert!(cleaned.sanitized().is_none());
    }

    #[test]
    fn clean_sequence_needs_no_sanitizing() {
        let progress = PassagesProgress::from_raw(vec![entry(2, true), entry(0, true)]);
        assert!(progress.sanitized().is_none());
    }

    #[test]
    fn completed_count_ignores_out_of_range_entries() {
        let progress = PassagesProgress::from_raw(vec![entry(0, true), entry(5, true)]);
        assert_eq!(progress.completed_count(2), 1);
        assert!(!progress.all_completed(2));
    }

    #[test]
    fn empty_day_is_never_all_completed() {
        assert!(!PassagesProgress::new().all_completed(0));
    }

    #[test]
    fn progress_serializes_as_plain_array() {
        let progress = PassagesProgress::from_raw(vec![entry(0, true), None]);
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"passage_index": 0, "completed": true}, null])
        );
    }

    #[test]
    fn fixed_annual_detection() {
        let mut plan = ReadingPlan {
            id: Uuid::new_v4(),
            name: "Chronological".to_string(),
            version: "1".to_string(),
            year: 2024,
            total_days: 365,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 30).unwrap(),
            is_active: true,
            metadata: serde_json::Value::Null,
        };
        assert!(!plan.is_fixed_annual());
        plan.metadata = serde_json::json!({"fixedAnnual": true});
        assert!(plan.is_fixed_annual());
        plan.metadata = serde_json::Value::Null;
        plan.name = "Bible in 365".to_string();
        assert!(plan.is_fixed_annual());
        plan.total_days = 90;
        assert!(!plan.is_fixed_annual());
    }
}
