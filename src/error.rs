//! Error types for game operations.

use crate::games::avalon::{GameStatus, ParticipantId, Phase};
use crate::gateway::GatewayError;
use derive_more::Display;

/// Broad class of a [`GameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorCategory {
    /// The caller sent a request that cannot be applied. Nothing changed.
    #[display("validation")]
    Validation,
    /// The decision gateway failed. The in-progress step was abandoned.
    #[display("gateway")]
    Gateway,
    /// An internal rule was broken. Indicates a bug.
    #[display("invariant")]
    Invariant,
}

/// Error returned by game operations.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum GameError {
    /// The requested role is not one of the five roles.
    #[display("Unrecognized role: {_0}")]
    UnknownRole(String),

    /// No session exists under the given id.
    #[display("Session not found: {_0}")]
    SessionNotFound(String),

    /// The session already reached a terminal status.
    #[display("Game is already over ({_0})")]
    GameOver(GameStatus),

    /// The operation does not match the current phase.
    #[display("Operation requires phase {expected}, but the game is in {actual}")]
    WrongPhase {
        /// Phase the operation needs.
        expected: Phase,
        /// Phase the session is in.
        actual: Phase,
    },

    /// The human tried an action that belongs to another participant.
    #[display("Only {owner} may {action}")]
    NotYourDecision {
        /// What was attempted.
        action: &'static str,
        /// Who may do it.
        owner: ParticipantId,
    },

    /// The action belongs to the human and cannot be delegated.
    #[display("{action} must be decided by the human participant")]
    HumanMustDecide {
        /// What was attempted.
        action: &'static str,
    },

    /// Proposed team has the wrong size for the round.
    #[display("Round {round} needs a team of {expected}, got {actual}")]
    WrongTeamSize {
        /// Current round.
        round: u8,
        /// Required size.
        expected: usize,
        /// Submitted size.
        actual: usize,
    },

    /// A participant id does not belong to the session.
    #[display("Unknown participant: {_0}")]
    UnknownParticipant(ParticipantId),

    /// A team lists the same participant twice.
    #[display("Participant {_0} appears twice in the team")]
    DuplicateTeamMember(ParticipantId),

    /// A vote or card token could not be understood.
    #[display("Invalid {field}: {value:?}")]
    InvalidToken {
        /// Which input was malformed.
        field: &'static str,
        /// The raw value.
        value: String,
    },

    /// The human is an evil team member and must choose a card.
    #[display("A mission card is required from the human participant")]
    MissingHumanCard,

    /// Speech text was empty.
    #[display("Speech text must not be empty")]
    EmptySpeech,

    /// The current round already has a mission waiting for votes or cards.
    #[display("Round {_0} already has an unresolved mission")]
    MissionPending(u8),

    /// The decision gateway failed.
    #[display("{_0}")]
    Gateway(GatewayError),

    /// An internal rule was broken.
    #[display("Invariant violation: {_0}")]
    Invariant(String),
}

impl GameError {
    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            GameError::Gateway(_) => ErrorCategory::Gateway,
            GameError::Invariant(_) => ErrorCategory::Invariant,
            _ => ErrorCategory::Validation,
        }
    }
}

impl std::error::Error for GameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GameError::Gateway(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GatewayError> for GameError {
    fn from(err: GatewayError) -> Self {
        GameError::Gateway(err)
    }
}
