//! Scripted conversation practice.
//!
//! A scenario is a fixed list of turns. Native-speaker turns only need a
//! confirmation; learner turns are checked against the turn's accepted
//! responses by substring containment in either direction.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{ConversationDialogue, SpeakerRole};
use crate::utils::percentage;

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// `input` matches when it contains an accepted phrase or is contained in one.
pub fn response_matches(input: &str, accepted: &[String]) -> bool {
    let input = normalize(input);
    if input.is_empty() {
        return false;
    }
    accepted.iter().any(|response| {
        let response = normalize(response);
        !response.is_empty() && (input.contains(&response) || response.contains(&input))
    })
}

/// Rounded share of correct learner turns. A scenario without learner turns
/// has nothing to get wrong and scores 100.
pub fn accuracy(correct: usize, user_turns: usize) -> i64 {
    if user_turns == 0 {
        return 100;
    }
    percentage(correct, user_turns)
}

pub fn user_turn_count(dialogues: &[ConversationDialogue]) -> usize {
    dialogues
        .iter()
        .filter(|d| d.speaker_role == SpeakerRole::User)
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PracticeState {
    ShowingContext,
    PlayingTurn { turn: usize },
    AwaitingInput { turn: usize },
    Feedback { turn: usize, correct: bool },
    Completed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PracticeError {
    #[error("the scenario has no dialogue")]
    Empty,
    #[error("action not allowed in state {0:?}")]
    InvalidAction(PracticeState),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TurnFeedback {
    pub correct: bool,
    /// The scripted line to show after a miss
    pub expected: String,
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSummary {
    pub correct_responses: usize,
    pub user_turns: usize,
    pub accuracy: i64,
}

/// Playback of one scenario, kept by whoever drives the session.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    dialogues: Vec<ConversationDialogue>,
    state: PracticeState,
    correct: usize,
}

impl ConversationSession {
    pub fn new(dialogues: Vec<ConversationDialogue>) -> Result<Self, PracticeError> {
        if dialogues.is_empty() {
            return Err(PracticeError::Empty);
        }
        Ok(Self {
            dialogues,
            state: PracticeState::ShowingContext,
            correct: 0,
        })
    }

    pub fn state(&self) -> PracticeState {
        self.state
    }

    pub fn correct_responses(&self) -> usize {
        self.correct
    }

    pub fn current_turn(&self) -> Option<&ConversationDialogue> {
        match self.state {
            PracticeState::PlayingTurn { turn }
            | PracticeState::AwaitingInput { turn }
            | PracticeState::Feedback { turn, .. } => self.dialogues.get(turn),
            _ => None,
        }
    }

    /// Leave the context screen and play the first turn.
    pub fn start(&mut self) -> Result<PracticeState, PracticeError> {
        match self.state {
            PracticeState::ShowingContext => self.enter_turn(0),
            state => Err(PracticeError::InvalidAction(state)),
        }
    }

    /// Confirm the current turn. Native-speaker turns advance to the next
    /// turn; learner turns start waiting for input.
    pub fn confirm(&mut self) -> Result<PracticeState, PracticeError> {
        match self.state {
            PracticeState::PlayingTurn { turn } => match self.dialogues[turn].speaker_role {
                SpeakerRole::NativeSpeaker => self.enter_turn(turn + 1),
                SpeakerRole::User => {
                    self.state = PracticeState::AwaitingInput { turn };
                    Ok(self.state)
                }
            },
            state => Err(PracticeError::InvalidAction(state)),
        }
    }

    pub fn respond(&mut self, input: &str) -> Result<TurnFeedback, PracticeError> {
        let PracticeState::AwaitingInput { turn } = self.state else {
            return Err(PracticeError::InvalidAction(self.state));
        };
        let dialogue = &self.dialogues[turn];
        let correct = response_matches(input, &dialogue.accepted_responses);
        if correct {
            self.correct += 1;
        }
        self.state = PracticeState::Feedback { turn, correct };
        Ok(TurnFeedback {
            correct,
            expected: dialogue.portuguese.clone(),
            hints: dialogue.hints.clone(),
        })
    }

    /// After a correct answer, move on.
    pub fn advance(&mut self) -> Result<PracticeState, PracticeError> {
        match self.state {
            PracticeState::Feedback {
                turn,
                correct: true,
            } => self.enter_turn(turn + 1),
            state => Err(PracticeError::InvalidAction(state)),
        }
    }

    /// After a miss, try the same turn again.
    pub fn retry(&mut self) -> Result<PracticeState, PracticeError> {
        match self.state {
            PracticeState::Feedback {
                turn,
                correct: false,
            } => {
                self.state = PracticeState::AwaitingInput { turn };
                Ok(self.state)
            }
            state => Err(PracticeError::InvalidAction(state)),
        }
    }

    /// After a miss, give up on the turn and move on.
    pub fn skip(&mut self) -> Result<PracticeState, PracticeError> {
        match self.state {
            PracticeState::Feedback {
                turn,
                correct: false,
            }
            | PracticeState::AwaitingInput { turn } => self.enter_turn(turn + 1),
            state => Err(PracticeError::InvalidAction(state)),
        }
    }

    pub fn summary(&self) -> Option<PracticeSummary> {
        if self.state != PracticeState::Completed {
            return None;
        }
        let user_turns = user_turn_count(&self.dialogues);
        Some(PracticeSummary {
            correct_responses: self.correct,
            user_turns,
            accuracy: accuracy(self.correct, user_turns),
        })
    }

    fn enter_turn(&mut self, turn: usize) -> Result<PracticeState, PracticeError> {
        self.state = if turn < self.dialogues.len() {
            PracticeState::PlayingTurn { turn }
        } else {
            PracticeState::Completed
        };
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(order: i64, role: SpeakerRole, accepted: &[&str]) -> ConversationDialogue {
        ConversationDialogue {
            id: order,
            scenario_id: 1,
            speaker_role: role,
            portuguese: format!("fala {order}"),
            english: format!("line {order}"),
            audio_url: None,
            order,
            hints: vec!["dica".to_string()],
            accepted_responses: accepted.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn cafe() -> Vec<ConversationDialogue> {
        vec![
            turn(1, SpeakerRole::NativeSpeaker, &[]),
            turn(2, SpeakerRole::User, &["Um café", "por favor"]),
            turn(3, SpeakerRole::NativeSpeaker, &[]),
            turn(4, SpeakerRole::User, &["Obrigado", "Obrigada"]),
        ]
    }

    #[test]
    fn containment_works_both_ways() {
        let accepted = vec!["Bom dia".to_string()];
        assert!(response_matches("  BOM DIA, senhor ", &accepted));
        assert!(response_matches("bom", &accepted));
        assert!(!response_matches("boa tarde", &accepted));
        assert!(!response_matches("   ", &accepted));
        assert!(!response_matches("bom dia", &[]));
    }

    #[test]
    fn accuracy_rounding_and_empty_scenarios() {
        assert_eq!(accuracy(1, 2), 50);
        assert_eq!(accuracy(2, 3), 67);
        assert_eq!(accuracy(0, 0), 100);
    }

    #[test]
    fn full_playback() {
        let mut session = ConversationSession::new(cafe()).unwrap();
        assert_eq!(session.state(), PracticeState::ShowingContext);
        assert_eq!(session.start().unwrap(), PracticeState::PlayingTurn { turn: 0 });
        assert_eq!(session.confirm().unwrap(), PracticeState::PlayingTurn { turn: 1 });
        assert_eq!(session.confirm().unwrap(), PracticeState::AwaitingInput { turn: 1 });

        let miss = session.respond("uma cerveja").unwrap();
        assert!(!miss.correct);
        assert_eq!(miss.expected, "fala 2");
        assert!(session.advance().is_err());
        assert_eq!(session.retry().unwrap(), PracticeState::AwaitingInput { turn: 1 });
        assert!(session.respond("um café, por favor").unwrap().correct);
        assert_eq!(session.advance().unwrap(), PracticeState::PlayingTurn { turn: 2 });

        session.confirm().unwrap();
        session.confirm().unwrap();
        assert!(!session.respond("tchau").unwrap().correct);
        assert_eq!(session.skip().unwrap(), PracticeState::Completed);

        let summary = session.summary().unwrap();
        assert_eq!(summary.correct_responses, 1);
        assert_eq!(summary.user_turns, 2);
        assert_eq!(summary.accuracy, 50);
    }

    #[test]
    fn listening_only_scenario_completes() {
        let mut session =
            ConversationSession::new(vec![turn(1, SpeakerRole::NativeSpeaker, &[])]).unwrap();
        session.start().unwrap();
        assert_eq!(session.confirm().unwrap(), PracticeState::Completed);
        assert_eq!(session.summary().unwrap().accuracy, 100);
        assert!(ConversationSession::new(vec![]).is_err());
    }

    #[test]
    fn actions_out_of_order_are_rejected() {
        let mut session = ConversationSession::new(cafe()).unwrap();
        assert!(session.respond("oi").is_err());
        assert!(session.confirm().is_err());
        session.start().unwrap();
        assert!(session.start().is_err());
        assert!(session.summary().is_none());
    }
}
