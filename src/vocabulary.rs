use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Vocabulary;
use crate::storage::Storage;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyMatch {
    #[serde(flatten)]
    pub vocabulary: Vocabulary,
    pub lesson_title: String,
}

impl VocabularyMatch {
    fn is_exact(&self, term: &str) -> bool {
        self.vocabulary.portuguese.to_lowercase() == term
            || self.vocabulary.english.to_lowercase() == term
    }
}

/// Case-insensitive substring search over every lesson's vocabulary.
///
/// Exact matches on either language come first; each group is sorted by the
/// Portuguese word.
pub async fn search_vocabulary(
    storage: &dyn Storage,
    term: &str,
) -> anyhow::Result<Vec<VocabularyMatch>> {
    let term = term.to_lowercase();
    let mut results = Vec::new();
    for lesson in storage.get_lessons().await? {
        let words = storage.get_vocabulary_by_lesson_id(lesson.id).await?;
        results.extend(
            words
                .into_iter()
                .filter(|w| {
                    w.portuguese.to_lowercase().contains(&term)
                        || w.english.to_lowercase().contains(&term)
                })
                .map(|vocabulary| VocabularyMatch {
                    vocabulary,
                    lesson_title: lesson.title.clone(),
                }),
        );
    }
    results.sort_by(|a, b| match (a.is_exact(&term), b.is_exact(&term)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => compare_words(&a.vocabulary.portuguese, &b.vocabulary.portuguese),
    });
    Ok(results)
}

/// Alphabetical order that ignores case first.
fn compare_words(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LessonStatus, NewLesson, NewVocabulary};
    use crate::storage::MemStorage;

    async fn storage_with(words: &[(&str, &str)]) -> MemStorage {
        let storage = MemStorage::new();
        let lesson = storage
            .create_lesson(NewLesson {
                title: "Basic Greetings".into(),
                description: String::new(),
                image_url: None,
                duration: 10,
                order: 1,
                word_count: words.len() as i64,
                status: LessonStatus::Available,
            })
            .await
            .unwrap();
        for (pt, en) in words {
            storage
                .create_vocabulary(NewVocabulary {
                    lesson_id: lesson.id,
                    portuguese: pt.to_string(),
                    english: en.to_string(),
                    image_url: None,
                    audio_url: None,
                    pronunciation: None,
                    usage: None,
                })
                .await
                .unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn exact_match_comes_first() {
        let storage = storage_with(&[("Olá, amigo", "Hello, friend"), ("Olá", "Hello")]).await;
        let results = search_vocabulary(&storage, "olá").await.unwrap();
        let words: Vec<_> = results.iter().map(|r| r.vocabulary.portuguese.as_str()).collect();
        assert_eq!(words, ["Olá", "Olá, amigo"]);
        assert_eq!(results[0].lesson_title, "Basic Greetings");
    }

    #[tokio::test]
    async fn matches_english_and_sorts_partials() {
        let storage = storage_with(&[
            ("Boa tarde", "Good afternoon"),
            ("Bom dia", "Good morning"),
            ("Tchau", "Goodbye"),
        ])
        .await;
        let results = search_vocabulary(&storage, "GOOD").await.unwrap();
        let words: Vec<_> = results.iter().map(|r| r.vocabulary.portuguese.as_str()).collect();
        assert_eq!(words, ["Boa tarde", "Bom dia", "Tchau"]);
        assert!(search_vocabulary(&storage, "xyz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn result_carries_lesson_fields() {
        let storage = storage_with(&[("Sim", "Yes")]).await;
        let results = search_vocabulary(&storage, "yes").await.unwrap();
        let json = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(json["lessonTitle"], "Basic Greetings");
        assert_eq!(json["lessonId"], 1);
        assert_eq!(json["portuguese"], "Sim");
    }
}
