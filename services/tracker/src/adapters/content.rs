//! services/tracker/src/adapters/content.rs
//!
//! This module contains the adapter for scripture content lookups.
//! It implements the `ContentService` port from the `core` crate against the
//! read-only `scripture_chapters` table.

use async_trait::async_trait;
use reading_plan_core::domain::ChapterContent;
use reading_plan_core::ports::{ContentService, PortError, PortResult};
use sqlx::{FromRow, PgPool};

use super::db::non_negative;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ContentService` port using Postgres.
#[derive(Clone)]
pub struct PgContentAdapter {
    pool: PgPool,
}

impl PgContentAdapter {
    /// Creates a new `PgContentAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ChapterRecord {
    bible_version: String,
    book: String,
    chapter: i32,
    text: String,
    audio_url: Option<String>,
    audio_duration_seconds: Option<i32>,
}
impl ChapterRecord {
    fn to_domain(self) -> PortResult<ChapterContent> {
        Ok(ChapterContent {
            book: self.book,
            chapter: non_negative(self.chapter, "chapter")?,
            bible_version: Some(self.bible_version),
            text: self.text,
            audio_url: self.audio_url,
            audio_duration_seconds: self
                .audio_duration_seconds
                .map(|s| non_negative(s, "audio_duration_seconds"))
                .transpose()?,
        })
    }
}

//=========================================================================================
// `ContentService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentService for PgContentAdapter {
    /// Without a version, the first stored version of the chapter is returned.
    async fn get_chapter(
        &self,
        bible_version: Option<&str>,
        book: &str,
        chapter: u32,
    ) -> PortResult<ChapterContent> {
        let record = sqlx::query_as::<_, ChapterRecord>(
            "SELECT bible_version, book, chapter, text, audio_url, audio_duration_seconds \
             FROM scripture_chapters \
             WHERE book = $1 AND chapter = $2 AND ($3::text IS NULL OR bible_version = $3) \
             ORDER BY bible_version ASC LIMIT 1",
        )
        .bind(book)
        .bind(chapter as i32)
        .bind(bible_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record
            .ok_or_else(|| {
                PortError::NotFound(format!(
                    "{} {} ({})",
                    book,
                    chapter,
                    bible_version.unwrap_or("any version")
                ))
            })?
            .to_domain()
    }
}
