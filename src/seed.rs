//! Demo curriculum: lessons, vocabulary, quizzes and conversation scripts.

use tracing::{info, warn};

use crate::auth;
use crate::conversation::user_turn_count;
use crate::models::{
    ConversationDialogue, LessonStatus, NewConversationDialogue, NewConversationScenario,
    NewLesson, NewQuizOption, NewQuizQuestion, NewUser, NewVocabulary, PhraseList, SpeakerRole,
};
use crate::storage::Storage;

struct LessonSeed {
    title: &'static str,
    description: &'static str,
    duration: i64,
    status: LessonStatus,
    /// (portuguese, english, pronunciation, usage)
    words: &'static [(&'static str, &'static str, &'static str, &'static str)],
    quiz: &'static [QuizSeed],
    scenarios: &'static [ScenarioSeed],
}

struct QuizSeed {
    question: &'static str,
    correct: &'static str,
    explanation: &'static str,
    options: [&'static str; 4],
}

struct ScenarioSeed {
    title: &'static str,
    description: &'static str,
    context: &'static str,
    difficulty: &'static str,
    category: &'static str,
    turns: &'static [TurnSeed],
}

struct TurnSeed {
    role: SpeakerRole,
    portuguese: &'static str,
    english: &'static str,
    hints: &'static [&'static str],
    accepted: &'static [&'static str],
}

const fn native(portuguese: &'static str, english: &'static str) -> TurnSeed {
    TurnSeed {
        role: SpeakerRole::NativeSpeaker,
        portuguese,
        english,
        hints: &[],
        accepted: &[],
    }
}

const fn learner(
    portuguese: &'static str,
    english: &'static str,
    hints: &'static [&'static str],
    accepted: &'static [&'static str],
) -> TurnSeed {
    TurnSeed {
        role: SpeakerRole::User,
        portuguese,
        english,
        hints,
        accepted,
    }
}

const CURRICULUM: &[LessonSeed] = &[
    LessonSeed {
        title: "Basic Greetings",
        description: "Learn essential greetings to start conversations in Portuguese.",
        duration: 10,
        status: LessonStatus::InProgress,
        words: &[
            ("Olá", "Hello", "oh-LAH", "Greeting used any time of day"),
            ("Bom dia", "Good morning", "bohn DEE-ah", "Morning greeting until noon"),
            ("Boa tarde", "Good afternoon", "BOH-ah TAR-jay", "Afternoon greeting until sunset"),
            ("Boa noite", "Good night", "BOH-ah NOY-chay", "Evening greeting and farewell"),
            ("Como vai?", "How are you?", "KOH-moh vye", "Casual greeting"),
            ("Tchau", "Goodbye", "chow", "Casual goodbye"),
        ],
        quiz: &[
            QuizSeed {
                question: "What does 'Olá' mean?",
                correct: "Hello",
                explanation: "'Olá' is a generic greeting used at any time of day in Portuguese.",
                options: ["Hello", "Goodbye", "Thank you", "Please"],
            },
            QuizSeed {
                question: "What does 'Bom dia' mean?",
                correct: "Good morning",
                explanation: "'Bom dia' means 'Good morning' and is used until noon.",
                options: ["Good morning", "Good afternoon", "Good evening", "Good night"],
            },
            QuizSeed {
                question: "What does 'Boa tarde' mean?",
                correct: "Good afternoon",
                explanation: "'Boa tarde' means 'Good afternoon' and is used from noon until sunset.",
                options: ["Good morning", "Good afternoon", "Good evening", "Good night"],
            },
            QuizSeed {
                question: "What does 'Boa noite' mean?",
                correct: "Good night",
                explanation: "'Boa noite' can be used as both a greeting and farewell at night.",
                options: ["Good night", "Good evening", "Good afternoon", "Goodbye"],
            },
            QuizSeed {
                question: "What does 'Como vai?' mean?",
                correct: "How are you?",
                explanation: "'Como vai?' is a casual way to ask 'How are you?' in Portuguese.",
                options: ["How are you?", "What's your name?", "Where are you going?", "How old are you?"],
            },
        ],
        scenarios: &[ScenarioSeed {
            title: "Meeting a Neighbor",
            description: "Greet a new neighbor and ask how they are",
            context: "You just moved into a building in Lisbon and meet your neighbor in the hallway one morning.",
            difficulty: "beginner",
            category: "social",
            turns: &[
                native("Bom dia! Você é o novo vizinho?", "Good morning! Are you the new neighbor?"),
                learner(
                    "Bom dia! Sim, sou o novo vizinho.",
                    "Good morning! Yes, I'm the new neighbor.",
                    &["Return the greeting", "Say yes"],
                    &["Bom dia", "Sim", "Sou o novo vizinho", "Sou a nova vizinha"],
                ),
                native("Muito prazer! Como vai?", "Nice to meet you! How are you?"),
                learner(
                    "Muito prazer! Vou bem, obrigado.",
                    "Nice to meet you! I'm well, thank you.",
                    &["Say it's a pleasure", "Say you are well"],
                    &["Muito prazer", "Vou bem", "Obrigado", "Obrigada", "Tudo bem"],
                ),
            ],
        }],
    },
    LessonSeed {
        title: "Ordering Food",
        description: "Learn vocabulary for restaurants and cafes",
        duration: 15,
        status: LessonStatus::Available,
        words: &[
            ("O cardápio", "The menu", "oo kar-DAH-pee-oo", "Ask for it when you sit down"),
            ("A conta", "The bill", "ah KOHN-tah", "Ask for it at the end of the meal"),
            ("Um café", "A coffee", "oong kah-FEH", "Ordering coffee"),
            ("Água", "Water", "AH-gwah", "Still or sparkling"),
            ("Por favor", "Please", "poor fah-VOR", "Polite requests"),
            ("Obrigado", "Thank you", "oh-bree-GAH-doo", "Said by men; women say 'obrigada'"),
        ],
        quiz: &[
            QuizSeed {
                question: "How do you ask for the bill?",
                correct: "A conta, por favor",
                explanation: "'A conta' is the bill; add 'por favor' to be polite.",
                options: ["A conta, por favor", "O cardápio, por favor", "Um café", "Obrigado"],
            },
            QuizSeed {
                question: "What does 'Água' mean?",
                correct: "Water",
                explanation: "'Água' is water. 'Água com gás' is sparkling water.",
                options: ["Wine", "Water", "Juice", "Milk"],
            },
        ],
        scenarios: &[ScenarioSeed {
            title: "At the Café",
            description: "Order a coffee and pay the bill",
            context: "You sit down at a small café in São Paulo. The waiter comes over to take your order.",
            difficulty: "beginner",
            category: "food",
            turns: &[
                native("Boa tarde! O que vai querer?", "Good afternoon! What would you like?"),
                learner(
                    "Um café, por favor.",
                    "A coffee, please.",
                    &["Order a coffee", "Be polite"],
                    &["Um café", "Café", "Por favor"],
                ),
                native("Mais alguma coisa?", "Anything else?"),
                learner(
                    "Não, obrigado. A conta, por favor.",
                    "No, thank you. The bill, please.",
                    &["Say no thanks", "Ask for the bill"],
                    &["Não", "A conta", "Obrigado", "Obrigada"],
                ),
            ],
        }],
    },
    LessonSeed {
        title: "Getting Around",
        description: "Transportation and directions vocabulary",
        duration: 12,
        status: LessonStatus::Available,
        words: &[
            ("Onde fica", "Where is", "OHN-jee FEE-kah", "Asking for a location"),
            ("À esquerda", "To the left", "ah es-KEHR-dah", "Directions"),
            ("À direita", "To the right", "ah jee-RAY-tah", "Directions"),
            ("O ônibus", "The bus", "oo OH-nee-boos", "Brazilian Portuguese"),
        ],
        quiz: &[QuizSeed {
            question: "What does 'À direita' mean?",
            correct: "To the right",
            explanation: "'Direita' is right; 'esquerda' is left.",
            options: ["To the left", "To the right", "Straight ahead", "Behind"],
        }],
        scenarios: &[],
    },
    LessonSeed {
        title: "Shopping",
        description: "Essential vocabulary for shopping",
        duration: 15,
        status: LessonStatus::Available,
        words: &[
            ("Quanto custa?", "How much does it cost?", "KWAN-too KOOS-tah", "Asking a price"),
            ("Barato", "Cheap", "bah-RAH-too", "Describing prices"),
            ("Caro", "Expensive", "KAH-roo", "Describing prices"),
        ],
        quiz: &[QuizSeed {
            question: "What does 'Caro' mean?",
            correct: "Expensive",
            explanation: "'Caro' is expensive; 'barato' is cheap.",
            options: ["Cheap", "Expensive", "Free", "Closed"],
        }],
        scenarios: &[],
    },
    LessonSeed {
        title: "Work & Professional Settings",
        description: "Meetings, deadlines and workplace vocabulary",
        duration: 20,
        status: LessonStatus::Locked,
        words: &[
            ("A reunião", "The meeting", "ah heh-oo-nee-OWN", "Workplace"),
            ("O prazo", "The deadline", "oo PRAH-zoo", "Workplace"),
            ("O orçamento", "The budget", "oo or-sah-MEN-too", "Workplace"),
        ],
        quiz: &[QuizSeed {
            question: "What does 'O prazo' mean?",
            correct: "The deadline",
            explanation: "'Prazo' is a deadline or time limit.",
            options: ["The meeting", "The deadline", "The budget", "The office"],
        }],
        scenarios: &[ScenarioSeed {
            title: "Business Meeting",
            description: "Practice participating in a business meeting in Portuguese",
            context: "You're attending a team meeting at a Brazilian company. Practice discussing projects and deadlines with colleagues.",
            difficulty: "intermediate",
            category: "professional",
            turns: &[
                native(
                    "Bom dia a todos. Vamos começar a reunião. Primeiro, vamos falar sobre o projeto atual.",
                    "Good morning everyone. Let's start the meeting. First, let's talk about the current project.",
                ),
                learner(
                    "Bom dia. Tenho uma atualização sobre o projeto. Estamos progredindo bem, mas precisamos de mais tempo para a fase de testes.",
                    "Good morning. I have an update about the project. We're progressing well, but we need more time for the testing phase.",
                    &["Give a project update", "Mention you need more time", "Talk about testing"],
                    &["Bom dia", "Atualização", "Projeto", "Precisamos de mais tempo", "Fase de testes"],
                ),
                native(
                    "Entendo. Quanto tempo a mais você precisa para completar os testes?",
                    "I understand. How much more time do you need to complete the tests?",
                ),
                learner(
                    "Acredito que precisamos de mais duas semanas para garantir a qualidade do produto final.",
                    "I believe we need two more weeks to ensure the quality of the final product.",
                    &["Specify how much time", "Mention quality", "Be professional"],
                    &["Duas semanas", "Mais duas semanas", "Garantir a qualidade", "Produto final"],
                ),
                native(
                    "Certo. E como está o orçamento do projeto? Ainda estamos dentro do planejado?",
                    "Okay. And how is the project budget? Are we still within what was planned?",
                ),
                learner(
                    "Sim, estamos dentro do orçamento. Não prevejo custos adicionais para a extensão do prazo de testes.",
                    "Yes, we are within budget. I don't foresee additional costs for extending the testing deadline.",
                    &["Mention budget status", "Talk about costs", "Be reassuring"],
                    &["Sim", "Dentro do orçamento", "Não prevejo custos adicionais", "Extensão do prazo"],
                ),
            ],
        }],
    },
];

/// `/api/audio/<lowercase words joined by _>`
pub fn audio_url(portuguese: &str) -> String {
    format!("/api/audio/{}", portuguese.to_lowercase().replace(' ', "_"))
}

/// Logs scenarios that have no learner turns.
pub fn check_scenario(title: &str, dialogues: &[ConversationDialogue]) -> bool {
    if user_turn_count(dialogues) == 0 {
        warn!("scenario {} has no learner turns", title);
        return false;
    }
    true
}

/// Load the curriculum into `storage`. Returns the number of lessons written.
pub async fn seed_curriculum(storage: &dyn Storage) -> anyhow::Result<usize> {
    for (index, seed) in CURRICULUM.iter().enumerate() {
        let lesson = storage
            .create_lesson(NewLesson {
                title: seed.title.to_string(),
                description: seed.description.to_string(),
                image_url: None,
                duration: seed.duration,
                order: index as i64 + 1,
                word_count: seed.words.len() as i64,
                status: seed.status,
            })
            .await?;
        for (portuguese, english, pronunciation, usage) in seed.words {
            storage
                .create_vocabulary(NewVocabulary {
                    lesson_id: lesson.id,
                    portuguese: portuguese.to_string(),
                    english: english.to_string(),
                    image_url: None,
                    audio_url: Some(audio_url(portuguese)),
                    pronunciation: Some(pronunciation.to_string()),
                    usage: Some(usage.to_string()),
                })
                .await?;
        }
        for quiz in seed.quiz {
            let question = storage
                .create_quiz_question(NewQuizQuestion {
                    lesson_id: lesson.id,
                    question: quiz.question.to_string(),
                    correct_answer: quiz.correct.to_string(),
                    explanation: Some(quiz.explanation.to_string()),
                })
                .await?;
            for option in quiz.options {
                storage
                    .create_quiz_option(NewQuizOption {
                        question_id: question.id,
                        option: option.to_string(),
                    })
                    .await?;
            }
        }
        for scenario_seed in seed.scenarios {
            let scenario = storage
                .create_conversation_scenario(NewConversationScenario {
                    lesson_id: lesson.id,
                    title: scenario_seed.title.to_string(),
                    description: scenario_seed.description.to_string(),
                    context: scenario_seed.context.to_string(),
                    image_url: None,
                    difficulty: scenario_seed.difficulty.to_string(),
                    category: scenario_seed.category.to_string(),
                })
                .await?;
            let mut dialogues = Vec::with_capacity(scenario_seed.turns.len());
            for (order, turn) in scenario_seed.turns.iter().enumerate() {
                let audio = (turn.role == SpeakerRole::NativeSpeaker)
                    .then(|| audio_url(turn.portuguese));
                let dialogue = storage
                    .create_conversation_dialogue(NewConversationDialogue {
                        scenario_id: scenario.id,
                        speaker_role: turn.role,
                        portuguese: turn.portuguese.to_string(),
                        english: turn.english.to_string(),
                        audio_url: audio,
                        order: order as i64 + 1,
                        hints: PhraseList::from(turn.hints),
                        accepted_responses: PhraseList::from(turn.accepted),
                    })
                    .await?;
                dialogues.push(dialogue);
            }
            check_scenario(&scenario.title, &dialogues);
        }
        info!("seeded lesson {}-{}", lesson.id, lesson.title);
    }
    Ok(CURRICULUM.len())
}

/// Demo user "demo" / "demo123" plus the curriculum. Does nothing when
/// lessons already exist.
pub async fn seed_demo(storage: &dyn Storage) -> anyhow::Result<()> {
    if !storage.get_lessons().await?.is_empty() {
        info!("database already has lessons, skip seeding");
        return Ok(());
    }
    if storage.get_user_by_username("demo").await?.is_none() {
        let user = auth::register(
            storage,
            NewUser {
                username: "demo".to_string(),
                password: "demo123".to_string(),
                display_name: "Maria".to_string(),
            },
        )
        .await?;
        storage.add_user_xp(user.id, 250).await?;
    }
    seed_curriculum(storage).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemStorage, SqliteStorage};

    #[test]
    fn audio_urls() {
        assert_eq!(audio_url("Bom dia"), "/api/audio/bom_dia");
        assert_eq!(audio_url("Olá"), "/api/audio/olá");
    }

    #[test]
    fn every_seeded_question_lists_its_answer() {
        for lesson in CURRICULUM {
            for quiz in lesson.quiz {
                assert!(quiz.options.contains(&quiz.correct), "{}", quiz.question);
            }
            for scenario in lesson.scenarios {
                assert!(scenario.turns.iter().any(|t| t.role == SpeakerRole::User));
            }
        }
    }

    #[tokio::test]
    async fn demo_seed_into_memory() {
        let storage = MemStorage::with_sample_data().await.unwrap();
        let user = storage.get_user_by_username("demo").await.unwrap().unwrap();
        assert_eq!((user.level, user.xp), (3, 250));
        let lessons = storage.get_lessons().await.unwrap();
        assert_eq!(lessons.len(), CURRICULUM.len());
        assert_eq!(lessons[0].word_count, 6);
        let options = storage.get_quiz_options_by_question_id(1).await.unwrap();
        assert_eq!(options.iter().filter(|o| o.is_correct).count(), 1);

        // second run is a no-op
        seed_demo(&storage).await.unwrap();
        assert_eq!(storage.get_lessons().await.unwrap().len(), CURRICULUM.len());
    }

    #[tokio::test]
    async fn demo_seed_into_sqlite() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        seed_demo(&storage).await.unwrap();
        let scenarios = storage.get_conversation_scenarios().await.unwrap();
        assert_eq!(scenarios.len(), 3);
        let dialogues = storage
            .get_conversation_dialogues_by_scenario_id(scenarios[0].id)
            .await
            .unwrap();
        assert_eq!(dialogues.len(), 4);
        assert!(dialogues[0].audio_url.is_some());
        assert!(dialogues[1].audio_url.is_none());
        assert!(dialogues[1].accepted_responses.contains(&"Bom dia".to_string()));
    }

    #[test]
    fn listening_only_scenario_is_flagged() {
        let dialogue = ConversationDialogue {
            id: 1,
            scenario_id: 1,
            speaker_role: SpeakerRole::NativeSpeaker,
            portuguese: "Olá".into(),
            english: "Hello".into(),
            audio_url: None,
            order: 1,
            hints: vec![],
            accepted_responses: vec![],
        };
        assert!(!check_scenario("listening", &[dialogue]));
    }
}
