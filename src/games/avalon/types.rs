//! Core domain types for the five-player mission game.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumIter, EnumString, IntoEnumIterator};

/// Identifier of a participant, unique within a session.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Creates a participant id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Faction a role belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, StrumDisplay,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Faction {
    /// Merlin, Percival and the Servant.
    Good,
    /// Morgana and the Assassin.
    Evil,
}

/// The five roles; each appears exactly once per session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    StrumDisplay,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Role {
    /// Sees every evil participant.
    Merlin,
    /// Sees Merlin and Morgana without knowing which is which.
    Percival,
    /// Plain good participant.
    Servant,
    /// Evil; appears to Percival as a Merlin candidate.
    Morgana,
    /// Evil; names the assassination target when good completes three missions.
    Assassin,
}

impl Role {
    /// Returns the faction of this role. Fixed mapping.
    pub fn faction(self) -> Faction {
        match self {
            Role::Merlin | Role::Percival | Role::Servant => Faction::Good,
            Role::Morgana | Role::Assassin => Faction::Evil,
        }
    }

    /// All roles in canonical order.
    pub fn all() -> Vec<Role> {
        Role::iter().collect()
    }
}

/// A seat at the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    id: ParticipantId,
    name: String,
    role: Role,
    is_human: bool,
}

impl Participant {
    /// Creates a participant. Faction is derived from the role.
    pub fn new(id: ParticipantId, name: impl Into<String>, role: Role, is_human: bool) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            is_human,
        }
    }

    /// Returns the participant id.
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the faction derived from the role.
    pub fn faction(&self) -> Faction {
        self.role.faction()
    }

    /// Returns true for the single human seat.
    pub fn is_human(&self) -> bool {
        self.is_human
    }
}

/// Team approval vote.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    StrumDisplay,
    EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Vote {
    /// Approve the proposed team.
    Yes,
    /// Reject the proposed team.
    No,
}

/// Card played by a team member during a mission.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    StrumDisplay,
    EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum MissionCard {
    /// Support the mission.
    Success,
    /// Sabotage the mission. Evil only.
    Fail,
}

/// Outcome of a resolved mission.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, StrumDisplay,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionResult {
    /// No fail card was played.
    Success,
    /// At least one fail card was played.
    Fail,
}

/// Session status. `GoodWin` and `EvilWin` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, StrumDisplay,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Missions are still being played.
    Ongoing,
    /// Good completed three missions; the assassin names a target.
    AssassinPhase,
    /// Good won.
    GoodWin,
    /// Evil won.
    EvilWin,
}

impl GameStatus {
    /// Returns true for `GoodWin` and `EvilWin`.
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::GoodWin | GameStatus::EvilWin)
    }
}

/// Explicit phase of the session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, StrumDisplay,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// The leader must propose a team.
    TeamBuilding,
    /// A team is proposed and waits for votes.
    AwaitingVote,
    /// An approved team waits for mission cards.
    AwaitingCards,
    /// The assassin must name a target.
    Assassination,
    /// The game is over.
    Finished,
}

/// One entry of the free-text speech log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Speech {
    /// Round the speech was made in.
    pub round: u8,
    /// 1-based position in the whole log.
    pub order: usize,
    /// Speaker.
    pub from: ParticipantId,
    /// Free text.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_faction_mapping() {
        assert_eq!(Role::Merlin.faction(), Faction::Good);
        assert_eq!(Role::Percival.faction(), Faction::Good);
        assert_eq!(Role::Servant.faction(), Faction::Good);
        assert_eq!(Role::Morgana.faction(), Faction::Evil);
        assert_eq!(Role::Assassin.faction(), Faction::Evil);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_str("MERLIN").ok(), Some(Role::Merlin));
        assert_eq!(Role::from_str("assassin").ok(), Some(Role::Assassin));
        assert!(Role::from_str("OBERON").is_err());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&Role::Percival).unwrap();
        assert_eq!(json, "\"PERCIVAL\"");
        let status = serde_json::to_string(&GameStatus::AssassinPhase).unwrap();
        assert_eq!(status, "\"ASSASSIN_PHASE\"");
        let id = serde_json::to_string(&ParticipantId::from("BOT_1")).unwrap();
        assert_eq!(id, "\"BOT_1\"");
    }

    #[test]
    fn test_terminal_status() {
        assert!(!GameStatus::Ongoing.is_terminal());
        assert!(!GameStatus::AssassinPhase.is_terminal());
        assert!(GameStatus::GoodWin.is_terminal());
        assert!(GameStatus::EvilWin.is_terminal());
    }
}
