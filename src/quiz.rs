//! Quiz scoring.
//!
//! A question's `correct_answer` is the only authority on correctness: an
//! answer counts when it equals that text exactly, case included.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{QuizOption, QuizQuestion};

pub fn is_correct_answer(question: &QuizQuestion, answer: &str) -> bool {
    question.correct_answer == answer
}

/// Option as shown to learners; correctness is not included.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicOption {
    pub id: i64,
    pub option: String,
}

impl From<QuizOption> for PublicOption {
    fn from(option: QuizOption) -> Self {
        Self {
            id: option.id,
            option: option.option,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionWithOptions {
    #[serde(flatten)]
    pub question: QuizQuestion,
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    pub question_id: i64,
    pub answer: String,
    pub correct: bool,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuizResult {
    pub score: i64,
    pub total: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("the quiz has no questions")]
    Empty,
    #[error("question already answered")]
    AlreadyAnswered,
    #[error("answer the current question first")]
    NotAnswered,
    #[error("the quiz is finished")]
    Finished,
    #[error("the quiz still has unanswered questions")]
    Unfinished,
}

/// One pass through a lesson's questions: answer, see feedback, move on.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    current: usize,
    score: i64,
    answered: bool,
}

impl QuizSession {
    pub fn new(questions: Vec<QuizQuestion>) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::Empty);
        }
        Ok(Self {
            questions,
            current: 0,
            score: 0,
            answered: false,
        })
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current)
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn is_last_question(&self) -> bool {
        self.current + 1 == self.questions.len()
    }

    pub fn is_finished(&self) -> bool {
        self.is_last_question() && self.answered
    }

    pub fn answer(&mut self, answer: &str) -> Result<AnswerFeedback, QuizError> {
        if self.answered {
            return Err(QuizError::AlreadyAnswered);
        }
        let question = &self.questions[self.current];
        let correct = is_correct_answer(question, answer);
        if correct {
            self.score += 1;
        }
        self.answered = true;
        Ok(AnswerFeedback {
            question_id: question.id,
            answer: answer.to_string(),
            correct,
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
        })
    }

    /// Move to the next question after the current one was answered.
    pub fn next(&mut self) -> Result<&QuizQuestion, QuizError> {
        if !self.answered {
            return Err(QuizError::NotAnswered);
        }
        if self.is_last_question() {
            return Err(QuizError::Finished);
        }
        self.current += 1;
        self.answered = false;
        Ok(&self.questions[self.current])
    }

    pub fn finish(&self) -> Result<QuizResult, QuizError> {
        if !self.is_finished() {
            return Err(QuizError::Unfinished);
        }
        Ok(QuizResult {
            score: self.score,
            total: self.questions.len() as i64,
        })
    }
}
