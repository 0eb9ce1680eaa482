use std::path::Path;

use anyhow::bail;
use async_trait::async_trait;
use sqlx::{
    FromRow, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
};
use tracing::info;

use super::{CompletionRecord, DuplicateUsername, Storage, total_xp};
use crate::models::{
    Completion, ConversationDialogue, ConversationScenario, Lesson, LessonStatus,
    NewConversationDialogue, NewConversationScenario, NewLesson, NewQuizOption, NewQuizQuestion,
    NewUser, NewVocabulary, PhraseList, QuizOption, QuizQuestion, SpeakerRole, User,
    UserConversationPractice, UserProgress, Vocabulary, level_for_xp,
};
use crate::utils::percentage;

const SCHEMA: &[&str] = &[
    r#"create table if not exists user (
        id integer primary key autoincrement,
        username text not null unique,
        password text not null,
        display_name text not null,
        level integer not null default 1,
        xp integer not null default 0
    )"#,
    r#"create table if not exists lesson (
        id integer primary key autoincrement,
        title text not null,
        description text not null,
        image_url text,
        duration integer not null,
        lesson_order integer not null,
        word_count integer not null,
        status text not null default 'locked'
    )"#,
    r#"create table if not exists vocabulary (
        id integer primary key autoincrement,
        lesson_id integer not null references lesson(id),
        portuguese text not null,
        english text not null,
        image_url text,
        audio_url text,
        pronunciation text,
        usage text
    )"#,
    r#"create table if not exists quiz_question (
        id integer primary key autoincrement,
        lesson_id integer not null references lesson(id),
        question text not null,
        correct_answer text not null,
        explanation text
    )"#,
    r#"create table if not exists quiz_option (
        id integer primary key autoincrement,
        question_id integer not null references quiz_question(id),
        option text not null,
        is_correct integer not null default 0
    )"#,
    r#"create table if not exists user_progress (
        id integer primary key autoincrement,
        user_id integer not null references user(id),
        lesson_id integer not null references lesson(id),
        completed integer not null default 0,
        score integer,
        completed_at text,
        unique (user_id, lesson_id)
    )"#,
    r#"create table if not exists conversation_scenario (
        id integer primary key autoincrement,
        lesson_id integer not null references lesson(id),
        title text not null,
        description text not null,
        context text not null,
        image_url text,
        difficulty text not null,
        category text not null
    )"#,
    r#"create table if not exists conversation_dialogue (
        id integer primary key autoincrement,
        scenario_id integer not null references conversation_scenario(id),
        speaker_role text not null,
        portuguese text not null,
        english text not null,
        audio_url text,
        dialogue_order integer not null,
        hints text not null default '[]',
        accepted_responses text not null default '[]'
    )"#,
    r#"create table if not exists user_conversation_practice (
        id integer primary key autoincrement,
        user_id integer not null references user(id),
        scenario_id integer not null references conversation_scenario(id),
        completed integer not null default 0,
        accuracy integer,
        completed_at text,
        unique (user_id, scenario_id)
    )"#,
    "create index if not exists vocabulary_lesson on vocabulary (lesson_id)",
    "create index if not exists quiz_question_lesson on quiz_question (lesson_id)",
    "create index if not exists dialogue_scenario on conversation_dialogue (scenario_id)",
];

/// Dialogue as stored: the phrase lists are JSON text.
#[derive(FromRow)]
struct DialogueRow {
    id: i64,
    scenario_id: i64,
    speaker_role: SpeakerRole,
    portuguese: String,
    english: String,
    audio_url: Option<String>,
    dialogue_order: i64,
    hints: String,
    accepted_responses: String,
}

impl From<DialogueRow> for ConversationDialogue {
    fn from(row: DialogueRow) -> Self {
        ConversationDialogue {
            id: row.id,
            scenario_id: row.scenario_id,
            speaker_role: row.speaker_role,
            portuguese: row.portuguese,
            english: row.english,
            audio_url: row.audio_url,
            order: row.dialogue_order,
            hints: PhraseList::Encoded(row.hints).into_vec(),
            accepted_responses: PhraseList::Encoded(row.accepted_responses).into_vec(),
        }
    }
}

/// Insert or overwrite the completion row for `completion`'s (user, entity) key.
async fn upsert_completion<'e, R, E>(executor: E, completion: &Completion) -> anyhow::Result<R>
where
    R: CompletionRecord + for<'r> FromRow<'r, SqliteRow> + Unpin,
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "insert into {table} (user_id, {entity}, completed, {value}, completed_at) \
         values (?, ?, 1, ?, ?) \
         on conflict (user_id, {entity}) do update set \
         completed = 1, {value} = excluded.{value}, completed_at = excluded.completed_at \
         returning *",
        table = R::TABLE,
        entity = R::ENTITY_COLUMN,
        value = R::VALUE_COLUMN,
    );
    let row = sqlx::query_as::<_, R>(&sql)
        .bind(completion.user_id)
        .bind(completion.entity_id)
        .bind(completion.value)
        .bind(completion.completed_at)
        .fetch_one(executor)
        .await?;
    Ok(row)
}

async fn set_user_xp(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    id: i64,
    xp: i64,
) -> anyhow::Result<User> {
    let user = sqlx::query_as::<_, User>("update user set xp = ?, level = ? where id = ? returning *")
        .bind(xp)
        .bind(level_for_xp(xp))
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(user)
}

#[derive(Debug, Clone)]
pub struct SqliteStorage {
    database: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database file and its schema.
    pub async fn connect(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let newly_created = !path.exists();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let database = SqlitePoolOptions::new().connect_with(options).await?;
        if newly_created {
            info!("initialized new database: {}", path.display());
        } else {
            info!("opened existing database: {}", path.display());
        }
        Self::from_pool(database).await
    }

    /// Private database living as long as the storage.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        // every connection to :memory: is a separate database
        let database = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(database).await
    }

    pub async fn from_pool(database: SqlitePool) -> anyhow::Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&database).await?;
        }
        Ok(Self { database })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.database
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("select * from user where id = ?")
            .bind(id)
            .fetch_optional(&self.database)
            .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("select * from user where username = ?")
            .bind(username)
            .fetch_optional(&self.database)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> anyhow::Result<User> {
        let created = sqlx::query_as::<_, User>(
            "insert into user (username, password, display_name) values (?, ?, ?) returning *",
        )
        .bind(&user.username)
        .bind(user.password)
        .bind(user.display_name)
        .fetch_one(&self.database)
        .await;
        match created {
            Ok(created) => Ok(created),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(DuplicateUsername(user.username).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn add_user_xp(&self, id: i64, xp: i64) -> anyhow::Result<Option<User>> {
        let mut tx = self.database.begin().await?;
        let Some(current) = sqlx::query_scalar::<_, i64>("select xp from user where id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let user = set_user_xp(&mut tx, id, total_xp(current, xp)?).await?;
        tx.commit().await?;
        Ok(Some(user))
    }

    async fn get_lessons(&self) -> anyhow::Result<Vec<Lesson>> {
        let lessons = sqlx::query_as::<_, Lesson>("select * from lesson order by lesson_order, id")
            .fetch_all(&self.database)
            .await?;
        Ok(lessons)
    }

    async fn get_lesson(&self, id: i64) -> anyhow::Result<Option<Lesson>> {
        let lesson = sqlx::query_as::<_, Lesson>("select * from lesson where id = ?")
            .bind(id)
            .fetch_optional(&self.database)
            .await?;
        Ok(lesson)
    }

    async fn create_lesson(&self, lesson: NewLesson) -> anyhow::Result<Lesson> {
        let lesson = sqlx::query_as::<_, Lesson>(
            "insert into lesson (title, description, image_url, duration, lesson_order, word_count, status) \
             values (?, ?, ?, ?, ?, ?, ?) returning *",
        )
        .bind(lesson.title)
        .bind(lesson.description)
        .bind(lesson.image_url)
        .bind(lesson.duration)
        .bind(lesson.order)
        .bind(lesson.word_count)
        .bind(lesson.status)
        .fetch_one(&self.database)
        .await?;
        Ok(lesson)
    }

    async fn update_lesson_status(
        &self,
        id: i64,
        status: LessonStatus,
    ) -> anyhow::Result<Option<Lesson>> {
        let lesson =
            sqlx::query_as::<_, Lesson>("update lesson set status = ? where id = ? returning *")
                .bind(status)
                .bind(id)
                .fetch_optional(&self.database)
                .await?;
        Ok(lesson)
    }

    async fn get_vocabulary_by_lesson_id(&self, lesson_id: i64) -> anyhow::Result<Vec<Vocabulary>> {
        let words =
            sqlx::query_as::<_, Vocabulary>("select * from vocabulary where lesson_id = ? order by id")
                .bind(lesson_id)
                .fetch_all(&self.database)
                .await?;
        Ok(words)
    }

    async fn get_vocabulary(&self, id: i64) -> anyhow::Result<Option<Vocabulary>> {
        let word = sqlx::query_as::<_, Vocabulary>("select * from vocabulary where id = ?")
            .bind(id)
            .fetch_optional(&self.database)
            .await?;
        Ok(word)
    }

    async fn create_vocabulary(&self, vocabulary: NewVocabulary) -> anyhow::Result<Vocabulary> {
        let word = sqlx::query_as::<_, Vocabulary>(
            "insert into vocabulary (lesson_id, portuguese, english, image_url, audio_url, pronunciation, usage) \
             values (?, ?, ?, ?, ?, ?, ?) returning *",
        )
        .bind(vocabulary.lesson_id)
        .bind(vocabulary.portuguese)
        .bind(vocabulary.english)
        .bind(vocabulary.image_url)
        .bind(vocabulary.audio_url)
        .bind(vocabulary.pronunciation)
        .bind(vocabulary.usage)
        .fetch_one(&self.database)
        .await?;
        Ok(word)
    }

    async fn get_quiz_questions_by_lesson_id(
        &self,
        lesson_id: i64,
    ) -> anyhow::Result<Vec<QuizQuestion>> {
        let questions = sqlx::query_as::<_, QuizQuestion>(
            "select * from quiz_question where lesson_id = ? order by id",
        )
        .bind(lesson_id)
        .fetch_all(&self.database)
        .await?;
        Ok(questions)
    }

    async fn get_quiz_question(&self, id: i64) -> anyhow::Result<Option<QuizQuestion>> {
        let question = sqlx::query_as::<_, QuizQuestion>("select * from quiz_question where id = ?")
            .bind(id)
            .fetch_optional(&self.database)
            .await?;
        Ok(question)
    }

    async fn create_quiz_question(
        &self,
        question: NewQuizQuestion,
    ) -> anyhow::Result<QuizQuestion> {
        let question = sqlx::query_as::<_, QuizQuestion>(
            "insert into quiz_question (lesson_id, question, correct_answer, explanation) \
             values (?, ?, ?, ?) returning *",
        )
        .bind(question.lesson_id)
        .bind(question.question)
        .bind(question.correct_answer)
        .bind(question.explanation)
        .fetch_one(&self.database)
        .await?;
        Ok(question)
    }

    async fn get_quiz_options_by_question_id(
        &self,
        question_id: i64,
    ) -> anyhow::Result<Vec<QuizOption>> {
        let options = sqlx::query_as::<_, QuizOption>(
            "select * from quiz_option where question_id = ? order by id",
        )
        .bind(question_id)
        .fetch_all(&self.database)
        .await?;
        Ok(options)
    }

    async fn create_quiz_option(&self, option: NewQuizOption) -> anyhow::Result<QuizOption> {
        let Some(question) = self.get_quiz_question(option.question_id).await? else {
            bail!("quiz question {} not found", option.question_id);
        };
        let is_correct = crate::quiz::is_correct_answer(&question, &option.option);
        let option = sqlx::query_as::<_, QuizOption>(
            "insert into quiz_option (question_id, option, is_correct) values (?, ?, ?) returning *",
        )
        .bind(option.question_id)
        .bind(option.option)
        .bind(is_correct)
        .fetch_one(&self.database)
        .await?;
        Ok(option)
    }

    async fn get_user_progress_by_user_id(
        &self,
        user_id: i64,
    ) -> anyhow::Result<Vec<UserProgress>> {
        let progress = sqlx::query_as::<_, UserProgress>(
            "select * from user_progress where user_id = ? order by id",
        )
        .bind(user_id)
        .fetch_all(&self.database)
        .await?;
        Ok(progress)
    }

    async fn get_user_progress_by_lesson_id(
        &self,
        user_id: i64,
        lesson_id: i64,
    ) -> anyhow::Result<Option<UserProgress>> {
        let progress = sqlx::query_as::<_, UserProgress>(
            "select * from user_progress where user_id = ? and lesson_id = ?",
        )
        .bind(user_id)
        .bind(lesson_id)
        .fetch_optional(&self.database)
        .await?;
        Ok(progress)
    }

    async fn upsert_user_progress(&self, completion: Completion) -> anyhow::Result<UserProgress> {
        upsert_completion(&self.database, &completion).await
    }

    async fn complete_lesson(
        &self,
        completion: Completion,
        xp: i64,
    ) -> anyhow::Result<UserProgress> {
        let mut tx = self.database.begin().await?;
        let updated = sqlx::query("update lesson set status = ? where id = ?")
            .bind(LessonStatus::Completed)
            .bind(completion.entity_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            // dropping the transaction rolls it back
            bail!("lesson {} not found", completion.entity_id);
        }
        let Some(current) = sqlx::query_scalar::<_, i64>("select xp from user where id = ?")
            .bind(completion.user_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            bail!("user {} not found", completion.user_id);
        };
        set_user_xp(&mut tx, completion.user_id, total_xp(current, xp)?).await?;
        let progress = upsert_completion(&mut *tx, &completion).await?;
        tx.commit().await?;
        Ok(progress)
    }

    async fn calculate_user_progress_percentage(&self, user_id: i64) -> anyhow::Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("select count(*) from lesson")
            .fetch_one(&self.database)
            .await?;
        let completed = sqlx::query_scalar::<_, i64>(
            "select count(*) from user_progress where user_id = ? and completed = 1",
        )
        .bind(user_id)
        .fetch_one(&self.database)
        .await?;
        Ok(percentage(completed as usize, total as usize))
    }

    async fn get_conversation_scenarios(&self) -> anyhow::Result<Vec<ConversationScenario>> {
        let scenarios = sqlx::query_as::<_, ConversationScenario>(
            "select s.* from conversation_scenario s inner join lesson l on s.lesson_id = l.id \
             order by l.lesson_order, l.id, s.id",
        )
        .fetch_all(&self.database)
        .await?;
        Ok(scenarios)
    }

    async fn get_conversation_scenarios_by_lesson_id(
        &self,
        lesson_id: i64,
    ) -> anyhow::Result<Vec<ConversationScenario>> {
        let scenarios = sqlx::query_as::<_, ConversationScenario>(
            "select * from conversation_scenario where lesson_id = ? order by id",
        )
        .bind(lesson_id)
        .fetch_all(&self.database)
        .await?;
        Ok(scenarios)
    }

    async fn get_conversation_scenario(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<ConversationScenario>> {
        let scenario = sqlx::query_as::<_, ConversationScenario>(
            "select * from conversation_scenario where id = ?",
        )
        .bind(id)
        .fetch_optional(&self.database)
        .await?;
        Ok(scenario)
    }

    async fn create_conversation_scenario(
        &self,
        scenario: NewConversationScenario,
    ) -> anyhow::Result<ConversationScenario> {
        let scenario = sqlx::query_as::<_, ConversationScenario>(
            "insert into conversation_scenario (lesson_id, title, description, context, image_url, difficulty, category) \
             values (?, ?, ?, ?, ?, ?, ?) returning *",
        )
        .bind(scenario.lesson_id)
        .bind(scenario.title)
        .bind(scenario.description)
        .bind(scenario.context)
        .bind(scenario.image_url)
        .bind(scenario.difficulty)
        .bind(scenario.category)
        .fetch_one(&self.database)
        .await?;
        Ok(scenario)
    }

    async fn get_conversation_dialogues_by_scenario_id(
        &self,
        scenario_id: i64,
    ) -> anyhow::Result<Vec<ConversationDialogue>> {
        let rows = sqlx::query_as::<_, DialogueRow>(
            "select * from conversation_dialogue where scenario_id = ? order by dialogue_order, id",
        )
        .bind(scenario_id)
        .fetch_all(&self.database)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_conversation_dialogue(
        &self,
        dialogue: NewConversationDialogue,
    ) -> anyhow::Result<ConversationDialogue> {
        let row = sqlx::query_as::<_, DialogueRow>(
            "insert into conversation_dialogue \
             (scenario_id, speaker_role, portuguese, english, audio_url, dialogue_order, hints, accepted_responses) \
             values (?, ?, ?, ?, ?, ?, ?, ?) returning *",
        )
        .bind(dialogue.scenario_id)
        .bind(dialogue.speaker_role)
        .bind(dialogue.portuguese)
        .bind(dialogue.english)
        .bind(dialogue.audio_url)
        .bind(dialogue.order)
        .bind(dialogue.hints.to_column())
        .bind(dialogue.accepted_responses.to_column())
        .fetch_one(&self.database)
        .await?;
        Ok(row.into())
    }

    async fn get_user_conversation_practice_by_user_id(
        &self,
        user_id: i64,
    ) -> anyhow::Result<Vec<UserConversationPractice>> {
        let practice = sqlx::query_as::<_, UserConversationPractice>(
            "select * from user_conversation_practice where user_id = ? order by id",
        )
        .bind(user_id)
        .fetch_all(&self.database)
        .await?;
        Ok(practice)
    }

    async fn get_user_conversation_practice_by_scenario_id(
        &self,
        user_id: i64,
        scenario_id: i64,
    ) -> anyhow::Result<Option<UserConversationPractice>> {
        let practice = sqlx::query_as::<_, UserConversationPractice>(
            "select * from user_conversation_practice where user_id = ? and scenario_id = ?",
        )
        .bind(user_id)
        .bind(scenario_id)
        .fetch_optional(&self.database)
        .await?;
        Ok(practice)
    }

    async fn upsert_user_conversation_practice(
        &self,
        completion: Completion,
    ) -> anyhow::Result<UserConversationPractice> {
        upsert_completion(&self.database, &completion).await
    }
}
