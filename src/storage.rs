//! Persistence facade.
//!
//! Routes only ever see `Arc<dyn Storage>`, so the in-memory demo store and the
//! SQLite store are interchangeable.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{
    Completion, ConversationDialogue, ConversationScenario, Lesson, LessonStatus,
    NewConversationDialogue, NewConversationScenario, NewLesson, NewQuizOption, NewQuizQuestion,
    NewUser, NewVocabulary, QuizOption, QuizQuestion, User, UserConversationPractice,
    UserProgress, Vocabulary,
};
use crate::utils::percentage;

pub use memory::MemStorage;
pub use sqlite::SqliteStorage;

pub type SharedStorage = Arc<dyn Storage>;

#[derive(Debug, thiserror::Error)]
#[error("username {0} already exists")]
pub struct DuplicateUsername(pub String);

/// `current + xp`, failing instead of wrapping.
pub fn total_xp(current: i64, xp: i64) -> anyhow::Result<i64> {
    current
        .checked_add(xp)
        .filter(|total| *total >= 0)
        .ok_or_else(|| anyhow::anyhow!("xp out of range: {current} + {xp}"))
}

#[async_trait]
pub trait Storage: Send + Sync {
    // users
    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    /// `user.password` must already be hashed. A taken username fails with
    /// [`DuplicateUsername`].
    async fn create_user(&self, user: NewUser) -> anyhow::Result<User>;
    /// Adds xp and recomputes the level. `None` for an unknown user.
    async fn add_user_xp(&self, id: i64, xp: i64) -> anyhow::Result<Option<User>>;

    // lessons
    /// Ordered by `order`.
    async fn get_lessons(&self) -> anyhow::Result<Vec<Lesson>>;
    async fn get_lesson(&self, id: i64) -> anyhow::Result<Option<Lesson>>;
    async fn create_lesson(&self, lesson: NewLesson) -> anyhow::Result<Lesson>;
    async fn update_lesson_status(
        &self,
        id: i64,
        status: LessonStatus,
    ) -> anyhow::Result<Option<Lesson>>;

    // vocabulary
    async fn get_vocabulary_by_lesson_id(&self, lesson_id: i64) -> anyhow::Result<Vec<Vocabulary>>;
    async fn get_vocabulary(&self, id: i64) -> anyhow::Result<Option<Vocabulary>>;
    async fn create_vocabulary(&self, vocabulary: NewVocabulary) -> anyhow::Result<Vocabulary>;

    // quiz
    async fn get_quiz_questions_by_lesson_id(
        &self,
        lesson_id: i64,
    ) -> anyhow::Result<Vec<QuizQuestion>>;
    async fn get_quiz_question(&self, id: i64) -> anyhow::Result<Option<QuizQuestion>>;
    async fn create_quiz_question(&self, question: NewQuizQuestion)
    -> anyhow::Result<QuizQuestion>;
    async fn get_quiz_options_by_question_id(
        &self,
        question_id: i64,
    ) -> anyhow::Result<Vec<QuizOption>>;
    /// Fails when the parent question does not exist.
    async fn create_quiz_option(&self, option: NewQuizOption) -> anyhow::Result<QuizOption>;

    // progress
    async fn get_user_progress_by_user_id(&self, user_id: i64)
    -> anyhow::Result<Vec<UserProgress>>;
    async fn get_user_progress_by_lesson_id(
        &self,
        user_id: i64,
        lesson_id: i64,
    ) -> anyhow::Result<Option<UserProgress>>;
    async fn upsert_user_progress(&self, completion: Completion) -> anyhow::Result<UserProgress>;
    /// Upserts the progress row, marks the lesson completed and awards `xp`
    /// to the user in one write. Nothing is written when any step fails.
    async fn complete_lesson(
        &self,
        completion: Completion,
        xp: i64,
    ) -> anyhow::Result<UserProgress>;

    // conversations
    /// All scenarios, grouped by lesson order.
    async fn get_conversation_scenarios(&self) -> anyhow::Result<Vec<ConversationScenario>>;
    async fn get_conversation_scenarios_by_lesson_id(
        &self,
        lesson_id: i64,
    ) -> anyhow::Result<Vec<ConversationScenario>>;
    async fn get_conversation_scenario(&self, id: i64)
    -> anyhow::Result<Option<ConversationScenario>>;
    async fn create_conversation_scenario(
        &self,
        scenario: NewConversationScenario,
    ) -> anyhow::Result<ConversationScenario>;
    /// Ordered by `order`.
    async fn get_conversation_dialogues_by_scenario_id(
        &self,
        scenario_id: i64,
    ) -> anyhow::Result<Vec<ConversationDialogue>>;
    async fn create_conversation_dialogue(
        &self,
        dialogue: NewConversationDialogue,
    ) -> anyhow::Result<ConversationDialogue>;

    // practice
    async fn get_user_conversation_practice_by_user_id(
        &self,
        user_id: i64,
    ) -> anyhow::Result<Vec<UserConversationPractice>>;
    async fn get_user_conversation_practice_by_scenario_id(
        &self,
        user_id: i64,
        scenario_id: i64,
    ) -> anyhow::Result<Option<UserConversationPractice>>;
    async fn upsert_user_conversation_practice(
        &self,
        completion: Completion,
    ) -> anyhow::Result<UserConversationPractice>;

    /// Completed lessons over all lessons, rounded; `0` without lessons.
    async fn calculate_user_progress_percentage(&self, user_id: i64) -> anyhow::Result<i64> {
        let total = self.get_lessons().await?.len();
        let completed = self
            .get_user_progress_by_user_id(user_id)
            .await?
            .iter()
            .filter(|p| p.completed)
            .count();
        Ok(percentage(completed, total))
    }
}

/// A per-user completion row that is created on first submission and
/// overwritten on every later one.
pub trait CompletionRecord: Clone + Send {
    const TABLE: &'static str;
    /// Column holding the lesson or scenario id
    const ENTITY_COLUMN: &'static str;
    /// Column holding the score or accuracy
    const VALUE_COLUMN: &'static str;

    fn id(&self) -> i64;
    fn key(&self) -> (i64, i64);
    fn create(id: i64, completion: &Completion) -> Self;
    fn apply(&mut self, completion: &Completion);
}

impl CompletionRecord for UserProgress {
    const TABLE: &'static str = "user_progress";
    const ENTITY_COLUMN: &'static str = "lesson_id";
    const VALUE_COLUMN: &'static str = "score";

    fn id(&self) -> i64 {
        self.id
    }
    fn key(&self) -> (i64, i64) {
        (self.user_id, self.lesson_id)
    }
    fn create(id: i64, completion: &Completion) -> Self {
        Self {
            id,
            user_id: completion.user_id,
            lesson_id: completion.entity_id,
            completed: true,
            score: Some(completion.value),
            completed_at: Some(completion.completed_at),
        }
    }
    fn apply(&mut self, completion: &Completion) {
        self.completed = true;
        self.score = Some(completion.value);
        self.completed_at = Some(completion.completed_at);
    }
}

impl CompletionRecord for UserConversationPractice {
    const TABLE: &'static str = "user_conversation_practice";
    const ENTITY_COLUMN: &'static str = "scenario_id";
    const VALUE_COLUMN: &'static str = "accuracy";

    fn id(&self) -> i64 {
        self.id
    }
    fn key(&self) -> (i64, i64) {
        (self.user_id, self.scenario_id)
    }
    fn create(id: i64, completion: &Completion) -> Self {
        Self {
            id,
            user_id: completion.user_id,
            scenario_id: completion.entity_id,
            completed: true,
            accuracy: Some(completion.value),
            completed_at: Some(completion.completed_at),
        }
    }
    fn apply(&mut self, completion: &Completion) {
        self.completed = true;
        self.accuracy = Some(completion.value);
        self.completed_at = Some(completion.completed_at);
    }
}
