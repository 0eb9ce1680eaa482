//! Rows and insert payloads shared by every storage backend and the HTTP layer.

pub mod phrases;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

pub use phrases::PhraseList;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string, never leaves the server
    #[serde(skip_serializing, default)]
    pub password: String,
    pub display_name: String,
    pub level: i64,
    pub xp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

/// Level grows by one every 100 xp.
pub fn level_for_xp(xp: i64) -> i64 {
    1 + xp.max(0) / 100
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LessonStatus {
    #[default]
    Locked,
    Available,
    InProgress,
    Completed,
}

impl LessonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonStatus::Locked => "locked",
            LessonStatus::Available => "available",
            LessonStatus::InProgress => "in_progress",
            LessonStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "locked" => Ok(LessonStatus::Locked),
            "available" => Ok(LessonStatus::Available),
            "in_progress" => Ok(LessonStatus::InProgress),
            "completed" => Ok(LessonStatus::Completed),
            other => anyhow::bail!("unknown lesson status: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Minutes
    pub duration: i64,
    #[sqlx(rename = "lesson_order")]
    pub order: i64,
    pub word_count: i64,
    pub status: LessonStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLesson {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub duration: i64,
    pub order: i64,
    pub word_count: i64,
    #[serde(default)]
    pub status: LessonStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vocabulary {
    pub id: i64,
    pub lesson_id: i64,
    pub portuguese: String,
    pub english: String,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub pronunciation: Option<String>,
    pub usage: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVocabulary {
    pub lesson_id: i64,
    pub portuguese: String,
    pub english: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub pronunciation: Option<String>,
    #[serde(default)]
    pub usage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: i64,
    pub lesson_id: i64,
    pub question: String,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuizQuestion {
    pub lesson_id: i64,
    pub question: String,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// `is_correct` is derived from the parent question's `correct_answer` when the
/// option is stored; it is kept for reporting only and never sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub id: i64,
    pub question_id: i64,
    pub option: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuizOption {
    pub question_id: i64,
    pub option: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub id: i64,
    pub user_id: i64,
    pub lesson_id: i64,
    pub completed: bool,
    pub score: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConversationScenario {
    pub id: i64,
    pub lesson_id: i64,
    pub title: String,
    pub description: String,
    pub context: String,
    pub image_url: Option<String>,
    pub difficulty: String,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversationScenario {
    pub lesson_id: i64,
    pub title: String,
    pub description: String,
    pub context: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub difficulty: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SpeakerRole {
    NativeSpeaker,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDialogue {
    pub id: i64,
    pub scenario_id: i64,
    pub speaker_role: SpeakerRole,
    pub portuguese: String,
    pub english: String,
    pub audio_url: Option<String>,
    pub order: i64,
    pub hints: Vec<String>,
    pub accepted_responses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversationDialogue {
    pub scenario_id: i64,
    pub speaker_role: SpeakerRole,
    pub portuguese: String,
    pub english: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    pub order: i64,
    #[serde(default)]
    pub hints: PhraseList,
    #[serde(default)]
    pub accepted_responses: PhraseList,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserConversationPractice {
    pub id: i64,
    pub user_id: i64,
    pub scenario_id: i64,
    pub completed: bool,
    pub accuracy: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub completed_at: Option<OffsetDateTime>,
}

/// A finished quiz or conversation run, keyed by (user, lesson or scenario).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub user_id: i64,
    pub entity_id: i64,
    /// Quiz score or conversation accuracy
    pub value: i64,
    pub completed_at: OffsetDateTime,
}

impl Completion {
    pub fn now(user_id: i64, entity_id: i64, value: i64) -> Self {
        Self {
            user_id,
            entity_id,
            value,
            completed_at: crate::utils::now_utc(),
        }
    }
}
