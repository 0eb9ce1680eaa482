use std::collections::BTreeMap;

use anyhow::{Context, bail};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::{CompletionRecord, DuplicateUsername, Storage, total_xp};
use crate::models::{
    Completion, ConversationDialogue, ConversationScenario, Lesson, LessonStatus,
    NewConversationDialogue, NewConversationScenario, NewLesson, NewQuizOption, NewQuizQuestion,
    NewUser, NewVocabulary, QuizOption, QuizQuestion, User, UserConversationPractice,
    UserProgress, Vocabulary, level_for_xp,
};

/// Rows keyed by id, ids handed out from 1.
#[derive(Debug)]
struct Table<R> {
    rows: BTreeMap<i64, R>,
    next_id: i64,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<R: Clone> Table<R> {
    fn insert_with(&mut self, build: impl FnOnce(i64) -> R) -> R {
        let id = self.next_id;
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        row
    }

    fn get(&self, id: i64) -> Option<R> {
        self.rows.get(&id).cloned()
    }

    fn filter(&self, mut keep: impl FnMut(&R) -> bool) -> Vec<R> {
        self.rows.values().filter(|r| keep(r)).cloned().collect()
    }
}

impl<R: CompletionRecord> Table<R> {
    /// Update the row for `completion`'s key in place, or create it.
    fn upsert(&mut self, completion: &Completion) -> R {
        let key = (completion.user_id, completion.entity_id);
        if let Some(row) = self.rows.values_mut().find(|r| r.key() == key) {
            row.apply(completion);
            return row.clone();
        }
        self.insert_with(|id| R::create(id, completion))
    }
}

#[derive(Debug, Clone)]
struct StoredDialogue {
    id: i64,
    dialogue: NewConversationDialogue,
}

impl From<StoredDialogue> for ConversationDialogue {
    fn from(stored: StoredDialogue) -> Self {
        let d = stored.dialogue;
        ConversationDialogue {
            id: stored.id,
            scenario_id: d.scenario_id,
            speaker_role: d.speaker_role,
            portuguese: d.portuguese,
            english: d.english,
            audio_url: d.audio_url,
            order: d.order,
            hints: d.hints.into_vec(),
            accepted_responses: d.accepted_responses.into_vec(),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: Table<User>,
    lessons: Table<Lesson>,
    vocabulary: Table<Vocabulary>,
    quiz_questions: Table<QuizQuestion>,
    quiz_options: Table<QuizOption>,
    user_progress: Table<UserProgress>,
    scenarios: Table<ConversationScenario>,
    dialogues: Table<StoredDialogue>,
    practice: Table<UserConversationPractice>,
}

/// Map-backed store for demos and tests. One lock covers every table, so
/// multi-table writes are atomic.
#[derive(Debug, Default)]
pub struct MemStorage {
    tables: RwLock<Tables>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with the demo curriculum.
    pub async fn with_sample_data() -> anyhow::Result<Self> {
        let storage = Self::new();
        crate::seed::seed_demo(&storage).await?;
        Ok(storage)
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.tables.read().users.get(id))
    }

    async fn get_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let tables = self.tables.read();
        Ok(tables
            .users
            .rows
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> anyhow::Result<User> {
        let mut tables = self.tables.write();
        if tables.users.rows.values().any(|u| u.username == user.username) {
            return Err(DuplicateUsername(user.username).into());
        }
        Ok(tables.users.insert_with(|id| User {
            id,
            username: user.username,
            password: user.password,
            display_name: user.display_name,
            level: 1,
            xp: 0,
        }))
    }

    async fn add_user_xp(&self, id: i64, xp: i64) -> anyhow::Result<Option<User>> {
        let mut tables = self.tables.write();
        let Some(user) = tables.users.rows.get_mut(&id) else {
            return Ok(None);
        };
        user.xp = total_xp(user.xp, xp)?;
        user.level = level_for_xp(user.xp);
        Ok(Some(user.clone()))
    }

    async fn get_lessons(&self) -> anyhow::Result<Vec<Lesson>> {
        let mut lessons = self.tables.read().lessons.filter(|_| true);
        lessons.sort_by_key(|l| (l.order, l.id));
        Ok(lessons)
    }

    async fn get_lesson(&self, id: i64) -> anyhow::Result<Option<Lesson>> {
        Ok(self.tables.read().lessons.get(id))
    }

    async fn create_lesson(&self, lesson: NewLesson) -> anyhow::Result<Lesson> {
        Ok(self.tables.write().lessons.insert_with(|id| Lesson {
            id,
            title: lesson.title,
            description: lesson.description,
            image_url: lesson.image_url,
            duration: lesson.duration,
            order: lesson.order,
            word_count: lesson.word_count,
            status: lesson.status,
        }))
    }

    async fn update_lesson_status(
        &self,
        id: i64,
        status: LessonStatus,
    ) -> anyhow::Result<Option<Lesson>> {
        let mut tables = self.tables.write();
        Ok(tables.lessons.rows.get_mut(&id).map(|lesson| {
            lesson.status = status;
            lesson.clone()
        }))
    }

    async fn get_vocabulary_by_lesson_id(&self, lesson_id: i64) -> anyhow::Result<Vec<Vocabulary>> {
        Ok(self
            .tables
            .read()
            .vocabulary
            .filter(|v| v.lesson_id == lesson_id))
    }

    async fn get_vocabulary(&self, id: i64) -> anyhow::Result<Option<Vocabulary>> {
        Ok(self.tables.read().vocabulary.get(id))
    }

    async fn create_vocabulary(&self, vocabulary: NewVocabulary) -> anyhow::Result<Vocabulary> {
        Ok(self.tables.write().vocabulary.insert_with(|id| Vocabulary {
            id,
            lesson_id: vocabulary.lesson_id,
            portuguese: vocabulary.portuguese,
            english: vocabulary.english,
            image_url: vocabulary.image_url,
            audio_url: vocabulary.audio_url,
            pronunciation: vocabulary.pronunciation,
            usage: vocabulary.usage,
        }))
    }

    async fn get_quiz_questions_by_lesson_id(
        &self,
        lesson_id: i64,
    ) -> anyhow::Result<Vec<QuizQuestion>> {
        Ok(self
            .tables
            .read()
            .quiz_questions
            .filter(|q| q.lesson_id == lesson_id))
    }

    async fn get_quiz_question(&self, id: i64) -> anyhow::Result<Option<QuizQuestion>> {
        Ok(self.tables.read().quiz_questions.get(id))
    }

    async fn create_quiz_question(
        &self,
        question: NewQuizQuestion,
    ) -> anyhow::Result<QuizQuestion> {
        Ok(self.tables.write().quiz_questions.insert_with(|id| QuizQuestion {
            id,
            lesson_id: question.lesson_id,
            question: question.question,
            correct_answer: question.correct_answer,
            explanation: question.explanation,
        }))
    }

    async fn get_quiz_options_by_question_id(
        &self,
        question_id: i64,
    ) -> anyhow::Result<Vec<QuizOption>> {
        Ok(self
            .tables
            .read()
            .quiz_options
            .filter(|o| o.question_id == question_id))
    }

    async fn create_quiz_option(&self, option: NewQuizOption) -> anyhow::Result<QuizOption> {
        let mut tables = self.tables.write();
        let question = tables
            .quiz_questions
            .get(option.question_id)
            .with_context(|| format!("quiz question {} not found", option.question_id))?;
        Ok(tables.quiz_options.insert_with(|id| QuizOption {
            id,
            question_id: option.question_id,
            is_correct: crate::quiz::is_correct_answer(&question, &option.option),
            option: option.option,
        }))
    }

    async fn get_user_progress_by_user_id(
        &self,
        user_id: i64,
    ) -> anyhow::Result<Vec<UserProgress>> {
        Ok(self
            .tables
            .read()
            .user_progress
            .filter(|p| p.user_id == user_id))
    }

    async fn get_user_progress_by_lesson_id(
        &self,
        user_id: i64,
        lesson_id: i64,
    ) -> anyhow::Result<Option<UserProgress>> {
        let tables = self.tables.read();
        Ok(tables
            .user_progress
            .rows
            .values()
            .find(|p| p.key() == (user_id, lesson_id))
            .cloned())
    }

    async fn upsert_user_progress(&self, completion: Completion) -> anyhow::Result<UserProgress> {
        Ok(self.tables.write().user_progress.upsert(&completion))
    }

    async fn complete_lesson(
        &self,
        completion: Completion,
        xp: i64,
    ) -> anyhow::Result<UserProgress> {
        let mut tables = self.tables.write();
        // validate everything before the first mutation
        if !tables.lessons.rows.contains_key(&completion.entity_id) {
            bail!("lesson {} not found", completion.entity_id);
        }
        let Some(user) = tables.users.rows.get_mut(&completion.user_id) else {
            bail!("user {} not found", completion.user_id);
        };
        let total = total_xp(user.xp, xp)?;
        user.xp = total;
        user.level = level_for_xp(total);
        if let Some(lesson) = tables.lessons.rows.get_mut(&completion.entity_id) {
            lesson.status = LessonStatus::Completed;
        }
        Ok(tables.user_progress.upsert(&completion))
    }

    async fn get_conversation_scenarios(&self) -> anyhow::Result<Vec<ConversationScenario>> {
        let tables = self.tables.read();
        let mut lessons: Vec<&Lesson> = tables.lessons.rows.values().collect();
        lessons.sort_by_key(|l| (l.order, l.id));
        Ok(lessons
            .into_iter()
            .flat_map(|l| tables.scenarios.filter(|s| s.lesson_id == l.id))
            .collect())
    }

    async fn get_conversation_scenarios_by_lesson_id(
        &self,
        lesson_id: i64,
    ) -> anyhow::Result<Vec<ConversationScenario>> {
        Ok(self
            .tables
            .read()
            .scenarios
            .filter(|s| s.lesson_id == lesson_id))
    }

    async fn get_conversation_scenario(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<ConversationScenario>> {
        Ok(self.tables.read().scenarios.get(id))
    }

    async fn create_conversation_scenario(
        &self,
        scenario: NewConversationScenario,
    ) -> anyhow::Result<ConversationScenario> {
        Ok(self.tables.write().scenarios.insert_with(|id| ConversationScenario {
            id,
            lesson_id: scenario.lesson_id,
            title: scenario.title,
            description: scenario.description,
            context: scenario.context,
            image_url: scenario.image_url,
            difficulty: scenario.difficulty,
            category: scenario.category,
        }))
    }

    async fn get_conversation_dialogues_by_scenario_id(
        &self,
        scenario_id: i64,
    ) -> anyhow::Result<Vec<ConversationDialogue>> {
        let mut dialogues: Vec<ConversationDialogue> = self
            .tables
            .read()
            .dialogues
            .filter(|d| d.dialogue.scenario_id == scenario_id)
            .into_iter()
            .map(Into::into)
            .collect();
        dialogues.sort_by_key(|d| (d.order, d.id));
        Ok(dialogues)
    }

    async fn create_conversation_dialogue(
        &self,
        dialogue: NewConversationDialogue,
    ) -> anyhow::Result<ConversationDialogue> {
        let stored = self
            .tables
            .write()
            .dialogues
            .insert_with(|id| StoredDialogue { id, dialogue });
        Ok(stored.into())
    }

    async fn get_user_conversation_practice_by_user_id(
        &self,
        user_id: i64,
    ) -> anyhow::Result<Vec<UserConversationPractice>> {
        Ok(self.tables.read().practice.filter(|p| p.user_id == user_id))
    }

    async fn get_user_conversation_practice_by_scenario_id(
        &self,
        user_id: i64,
        scenario_id: i64,
    ) -> anyhow::Result<Option<UserConversationPractice>> {
        let tables = self.tables.read();
        Ok(tables
            .practice
            .rows
            .values()
            .find(|p| p.key() == (user_id, scenario_id))
            .cloned())
    }

    async fn upsert_user_conversation_practice(
        &self,
        completion: Completion,
    ) -> anyhow::Result<UserConversationPractice> {
        Ok(self.tables.write().practice.upsert(&completion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PhraseList, SpeakerRole};

    fn lesson(title: &str, order: i64) -> NewLesson {
        NewLesson {
            title: title.to_string(),
            description: String::new(),
            image_url: None,
            duration: 10,
            order,
            word_count: 5,
            status: LessonStatus::Available,
        }
    }

    #[tokio::test]
    async fn lessons_come_back_in_order() {
        let storage = MemStorage::new();
        storage.create_lesson(lesson("second", 2)).await.unwrap();
        storage.create_lesson(lesson("first", 1)).await.unwrap();
        let titles: Vec<_> = storage
            .get_lessons()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.title)
            .collect();
        assert_eq!(titles, ["first", "second"]);
    }

    #[tokio::test]
    async fn vocabulary_is_scoped_to_its_lesson() {
        let storage = MemStorage::with_sample_data().await.unwrap();
        for lesson in storage.get_lessons().await.unwrap() {
            for word in storage.get_vocabulary_by_lesson_id(lesson.id).await.unwrap() {
                assert_eq!(word.lesson_id, lesson.id);
            }
        }
    }

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            password: "hash".into(),
            display_name: username.into(),
        }
    }

    #[tokio::test]
    async fn progress_percentage() {
        let storage = MemStorage::new();
        storage.create_user(new_user("ana")).await.unwrap();
        assert_eq!(storage.calculate_user_progress_percentage(1).await.unwrap(), 0);

        let a = storage.create_lesson(lesson("a", 1)).await.unwrap();
        let b = storage.create_lesson(lesson("b", 2)).await.unwrap();
        let c = storage.create_lesson(lesson("c", 3)).await.unwrap();
        storage.complete_lesson(Completion::now(1, a.id, 3), 30).await.unwrap();
        assert_eq!(storage.calculate_user_progress_percentage(1).await.unwrap(), 33);
        storage.complete_lesson(Completion::now(1, b.id, 3), 30).await.unwrap();
        storage.complete_lesson(Completion::now(1, c.id, 3), 30).await.unwrap();
        assert_eq!(storage.calculate_user_progress_percentage(1).await.unwrap(), 100);
        // other users are unaffected
        assert_eq!(storage.calculate_user_progress_percentage(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn resubmission_overwrites_single_row() {
        let storage = MemStorage::new();
        let user = storage.create_user(new_user("ana")).await.unwrap();
        let l = storage.create_lesson(lesson("a", 1)).await.unwrap();
        let first = storage
            .complete_lesson(Completion::now(user.id, l.id, 2), 20)
            .await
            .unwrap();
        let second = storage
            .complete_lesson(Completion::now(user.id, l.id, 5), 50)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        let rows = storage.get_user_progress_by_user_id(user.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, Some(5));
        assert!(rows[0].completed);
        let lesson = storage.get_lesson(l.id).await.unwrap().unwrap();
        assert_eq!(lesson.status, LessonStatus::Completed);
        let user = storage.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.xp, 70);
    }

    #[tokio::test]
    async fn completing_unknown_lesson_writes_nothing() {
        let storage = MemStorage::new();
        storage.create_user(new_user("ana")).await.unwrap();
        assert!(storage.complete_lesson(Completion::now(1, 42, 1), 10).await.is_err());
        assert!(storage.get_user_progress_by_user_id(1).await.unwrap().is_empty());
        assert_eq!(storage.get_user(1).await.unwrap().unwrap().xp, 0);
    }

    #[tokio::test]
    async fn xp_overflow_leaves_lesson_and_progress_untouched() {
        let storage = MemStorage::new();
        let user = storage.create_user(new_user("ana")).await.unwrap();
        let l = storage.create_lesson(lesson("a", 1)).await.unwrap();
        storage.add_user_xp(user.id, i64::MAX - 5).await.unwrap();

        assert!(storage
            .complete_lesson(Completion::now(user.id, l.id, 1), 10)
            .await
            .is_err());
        assert!(storage.get_user_progress_by_user_id(user.id).await.unwrap().is_empty());
        let lesson = storage.get_lesson(l.id).await.unwrap().unwrap();
        assert_eq!(lesson.status, LessonStatus::Available);
        assert_eq!(storage.get_user(user.id).await.unwrap().unwrap().xp, i64::MAX - 5);

        // unknown user
        assert!(storage.complete_lesson(Completion::now(99, l.id, 1), 10).await.is_err());
        assert!(storage.get_user_progress_by_user_id(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn practice_upsert() {
        let storage = MemStorage::new();
        storage
            .upsert_user_conversation_practice(Completion::now(1, 3, 40))
            .await
            .unwrap();
        let updated = storage
            .upsert_user_conversation_practice(Completion::now(1, 3, 90))
            .await
            .unwrap();
        assert_eq!(updated.accuracy, Some(90));
        assert_eq!(
            storage.get_user_conversation_practice_by_user_id(1).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn quiz_option_correctness_comes_from_question() {
        let storage = MemStorage::new();
        let q = storage
            .create_quiz_question(NewQuizQuestion {
                lesson_id: 1,
                question: "What does 'Olá' mean?".into(),
                correct_answer: "Hello".into(),
                explanation: None,
            })
            .await
            .unwrap();
        let right = storage
            .create_quiz_option(NewQuizOption { question_id: q.id, option: "Hello".into() })
            .await
            .unwrap();
        let wrong = storage
            .create_quiz_option(NewQuizOption { question_id: q.id, option: "hello".into() })
            .await
            .unwrap();
        assert!(right.is_correct);
        assert!(!wrong.is_correct);
        assert!(storage
            .create_quiz_option(NewQuizOption { question_id: 99, option: "x".into() })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn dialogues_are_ordered_and_normalized() {
        let storage = MemStorage::new();
        for (order, role) in [(2, SpeakerRole::User), (1, SpeakerRole::NativeSpeaker)] {
            storage
                .create_conversation_dialogue(NewConversationDialogue {
                    scenario_id: 1,
                    speaker_role: role,
                    portuguese: format!("line {order}"),
                    english: String::new(),
                    audio_url: None,
                    order,
                    hints: PhraseList::Encoded(r#"["hint"]"#.into()),
                    accepted_responses: PhraseList::List(vec!["sim".into()]),
                })
                .await
                .unwrap();
        }
        let dialogues = storage.get_conversation_dialogues_by_scenario_id(1).await.unwrap();
        assert_eq!(dialogues[0].order, 1);
        assert_eq!(dialogues[1].hints, vec!["hint".to_string()]);
        assert_eq!(dialogues[1].accepted_responses, vec!["sim".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let storage = MemStorage::new();
        let new_user = || NewUser {
            username: "ana".into(),
            password: "hash".into(),
            display_name: "Ana".into(),
        };
        storage.create_user(new_user()).await.unwrap();
        let err = storage.create_user(new_user()).await.unwrap_err();
        assert!(err.downcast_ref::<DuplicateUsername>().is_some());
        let user = storage.add_user_xp(1, 120).await.unwrap().unwrap();
        assert_eq!((user.xp, user.level), (120, 2));
        assert!(storage.add_user_xp(5, 10).await.unwrap().is_none());
        assert!(storage.add_user_xp(1, i64::MAX).await.is_err());
        assert_eq!(storage.get_user(1).await.unwrap().unwrap().xp, 120);
    }
}
