#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reading_plan_core::timezone::canonical_start;
use reading_plan_core::{
    ChapterContent, Clock, CompletedDay, ContentService, Passage, PassageProgressEntry,
    PassageType, PassagesProgress, PlanRepository, PortError, PortResult, ProgressRepository,
    ReadingPlan, ReadingPlanDay, ReadingPlanService, UserProfileService, UserReadingProgress,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

//=========================================================================================
// Clock
//=========================================================================================

pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn at(instant: &str) -> Self {
        Self(Mutex::new(utc(instant)))
    }

    pub fn set(&self, instant: &str) {
        *self.0.lock().unwrap() = utc(instant);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

//=========================================================================================
// In-memory store for plans, progress and profiles
//=========================================================================================

#[derive(Default)]
pub struct InMemoryStore {
    plans: Mutex<Vec<ReadingPlan>>,
    days: Mutex<Vec<ReadingPlanDay>>,
    progress: Mutex<Vec<UserReadingProgress>>,
    timezones: Mutex<HashMap<Uuid, String>>,
    fail_list_completed: AtomicBool,
    fail_profile_lookup: AtomicBool,
}

impl InMemoryStore {
    pub fn add_plan(&self, plan: ReadingPlan) {
        self.plans.lock().unwrap().push(plan);
    }

    pub fn add_day(&self, day: ReadingPlanDay) {
        self.days.lock().unwrap().push(day);
    }

    pub fn set_timezone(&self, user_id: Uuid, timezone: &str) {
        self.timezones
            .lock()
            .unwrap()
            .insert(user_id, timezone.to_string());
    }

    pub fn fail_list_completed(&self) {
        self.fail_list_completed.store(true, Ordering::SeqCst);
    }

    pub fn fail_profile_lookup(&self) {
        self.fail_profile_lookup.store(true, Ordering::SeqCst);
    }

    pub fn progress_records(&self) -> Vec<UserReadingProgress> {
        self.progress.lock().unwrap().clone()
    }

    /// Overwrites the stored sequence, as an interleaved write might leave it.
    pub fn put_raw_progress(
        &self,
        user_id: Uuid,
        day: &ReadingPlanDay,
        raw: Vec<Option<PassageProgressEntry>>,
    ) {
        let now = Utc::now();
        let mut records = self.progress.lock().unwrap();
        records.retain(|r| !(r.user_id == user_id && r.day_id == day.id));
        records.push(UserReadingProgress {
            id: Uuid::new_v4(),
            user_id,
            plan_id: day.plan_id,
            day_id: day.id,
            day_number: day.day_number,
            passages_progress: PassagesProgress::from_raw(raw),
            completed_at: None,
            last_streak_date: None,
            created_at: now,
            updated_at: now,
        });
    }

    fn with_record<T>(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        f: impl FnOnce(&mut UserReadingProgress) -> T,
    ) -> PortResult<T> {
        let mut records = self.progress.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.user_id == user_id && r.plan_id == plan_id && r.day_id == day_id)
            .ok_or_else(|| PortError::NotFound(format!("progress for day {}", day_id)))?;
        record.updated_at = Utc::now();
        Ok(f(record))
    }
}

#[async_trait]
impl PlanRepository for InMemoryStore {
    async fn get_plan(&self, plan_id: Uuid) -> PortResult<Option<ReadingPlan>> {
        let plans = self.plans.lock().unwrap();
        Ok(plans.iter().find(|p| p.id == plan_id).cloned())
    }

    async fn find_active_plan_for_year(&self, year: i32) -> PortResult<Option<ReadingPlan>> {
        let plans = self.plans.lock().unwrap();
        Ok(plans
            .iter()
            .find(|p| p.is_active && p.year == year)
            .cloned())
    }

    async fn active_plan_years(&self) -> PortResult<Vec<i32>> {
        let plans = self.plans.lock().unwrap();
        Ok(plans.iter().filter(|p| p.is_active).map(|p| p.year).collect())
    }

    async fn get_day(&self, day_id: Uuid) -> PortResult<Option<ReadingPlanDay>> {
        let days = self.days.lock().unwrap();
        Ok(days.iter().find(|d| d.id == day_id).cloned())
    }

    async fn find_day_in_window(
        &self,
        plan_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Option<ReadingPlanDay>> {
        let days = self.days.lock().unwrap();
        Ok(days
            .iter()
            .find(|d| d.plan_id == plan_id && d.date >= start && d.date < end)
            .cloned())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryStore {
    async fn get(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
    ) -> PortResult<Option<UserReadingProgress>> {
        let records = self.progress.lock().unwrap();
        Ok(records
            .iter()
            .find(|r| r.user_id == user_id && r.plan_id == plan_id && r.day_id == day_id)
            .cloned())
    }

    async fn get_or_create(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        day_number: u32,
    ) -> PortResult<UserReadingProgress> {
        let mut records = self.progress.lock().unwrap();
        if let Some(existing) = records
            .iter()
            .find(|r| r.user_id == user_id && r.plan_id == plan_id && r.day_id == day_id)
        {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let record = UserReadingProgress {
            id: Uuid::new_v4(),
            user_id,
            plan_id,
            day_id,
            day_number,
            passages_progress: PassagesProgress::new(),
            completed_at: None,
            last_streak_date: None,
            created_at: now,
            updated_at: now,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn upsert_passage_completion(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        passage_index: usize,
        completed: bool,
    ) -> PortResult<()> {
        self.with_record(user_id, plan_id, day_id, |r| {
            r.passages_progress.remove(passage_index)
        })?;
        // Two separate writes, like the Postgres adapter; other writers may run between them.
        tokio::task::yield_now().await;
        self.with_record(user_id, plan_id, day_id, |r| {
            r.passages_progress.push(PassageProgressEntry {
                passage_index,
                completed,
            })
        })
    }

    async fn replace_passages(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        passages: &PassagesProgress,
    ) -> PortResult<()> {
        self.with_record(user_id, plan_id, day_id, |r| {
            r.passages_progress = passages.clone()
        })
    }

    async fn mark_day_complete(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        day_id: Uuid,
        completed_at: DateTime<Utc>,
        last_streak_date: DateTime<Utc>,
    ) -> PortResult<()> {
        self.with_record(user_id, plan_id, day_id, |r| {
            if r.completed_at.is_none() {
                r.completed_at = Some(completed_at);
                r.last_streak_date = Some(last_streak_date);
            }
        })
    }

    async fn list_completed(&self, user_id: Uuid, plan_id: Uuid) -> PortResult<Vec<CompletedDay>> {
        if self.fail_list_completed.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("progress store offline".to_string()));
        }
        let records = self.progress.lock().unwrap();
        let days = self.days.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id && r.plan_id == plan_id && r.completed_at.is_some())
            .map(|r| {
                let day = days.iter().find(|d| d.id == r.day_id);
                CompletedDay {
                    progress: r.clone(),
                    day_number: day.map(|d| d.day_number).unwrap_or(r.day_number),
                    day_date: day.map(|d| d.date),
                }
            })
            .collect())
    }

    async fn count_completed_in_plan(&self, user_id: Uuid, plan_id: Uuid) -> PortResult<u64> {
        let records = self.progress.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id && r.plan_id == plan_id && r.completed_at.is_some())
            .count() as u64)
    }
}

#[async_trait]
impl UserProfileService for InMemoryStore {
    async fn get_timezone(&self, user_id: Uuid) -> PortResult<Option<String>> {
        if self.fail_profile_lookup.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("profile service offline".to_string()));
        }
        Ok(self.timezones.lock().unwrap().get(&user_id).cloned())
    }
}

//=========================================================================================
// Content collaborators
//=========================================================================================

/// Serves placeholder chapters and records which versions were requested.
#[derive(Default)]
pub struct RecordingContent {
    pub requested_versions: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl ContentService for RecordingContent {
    async fn get_chapter(
        &self,
        bible_version: Option<&str>,
        book: &str,
        chapter: u32,
    ) -> PortResult<ChapterContent> {
        self.requested_versions
            .lock()
            .unwrap()
            .push(bible_version.map(str::to_string));
        Ok(ChapterContent {
            book: book.to_string(),
            chapter,
            bible_version: bible_version.map(str::to_string),
            text: format!("{} {}", book, chapter),
            audio_url: Some(format!("https://audio.test/{}/{}.mp3", book, chapter)),
            audio_duration_seconds: Some(240),
        })
    }
}

pub struct FailingContent;

#[async_trait]
impl ContentService for FailingContent {
    async fn get_chapter(
        &self,
        _bible_version: Option<&str>,
        _book: &str,
        _chapter: u32,
    ) -> PortResult<ChapterContent> {
        Err(PortError::Unexpected("content provider unavailable".to_string()))
    }
}

//=========================================================================================
// Fixtures
//=========================================================================================

pub fn utc(instant: &str) -> DateTime<Utc> {
    instant.parse().unwrap()
}

pub fn date(ymd: &str) -> NaiveDate {
    ymd.parse().unwrap()
}

pub fn plan(name: &str, year: i32, total_days: u32) -> ReadingPlan {
    ReadingPlan {
        id: Uuid::new_v4(),
        name: name.to_string(),
        version: "2024.1".to_string(),
        year,
        total_days,
        start_date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
        is_active: true,
        metadata: serde_json::Value::Null,
    }
}

pub fn passage(book: &str, chapter: u32) -> Passage {
    Passage {
        passage_type: PassageType::OldTestament,
        reference: format!("{} {}", book, chapter),
        book: book.to_string(),
        chapter,
        verse_start: None,
        verse_end: None,
        title: None,
        metadata: serde_json::Value::Null,
    }
}

/// A day scheduled on `ymd` with `passages` chapters of Genesis.
pub fn day(plan: &ReadingPlan, day_number: u32, ymd: &str, passages: u32) -> ReadingPlanDay {
    ReadingPlanDay {
        id: Uuid::new_v4(),
        plan_id: plan.id,
        day_number,
        date: canonical_start(date(ymd)),
        passages: (1..=passages).map(|c| passage("GEN", c)).collect(),
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub service: ReadingPlanService,
}

pub fn harness(now: &str) -> Harness {
    harness_with_content(now, Arc::new(RecordingContent::default()))
}

pub fn harness_with_content(now: &str, content: Arc<dyn ContentService>) -> Harness {
    let store = Arc::new(InMemoryStore::default());
    let clock = Arc::new(FixedClock::at(now));
    let service = ReadingPlanService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        content,
        clock.clone(),
    );
    Harness {
        store,
        clock,
        service,
    }
}

/// Marks every passage of `day` completed at the clock's current time.
pub async fn complete_day(h: &Harness, user_id: Uuid, day: &ReadingPlanDay) {
    for index in 0..day.total_passages() {
        h.service
            .update_passage_progress(
                user_id,
                day.id,
                index,
                reading_plan_core::PassageProgressUpdate {
                    completed: Some(true),
                },
            )
            .await
            .unwrap();
    }
}
