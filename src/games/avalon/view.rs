//! Per-viewer projection of the session.
//!
//! Roles and factions are stripped from every seat except the viewer's own.
//! Private knowledge is never part of a view.

use super::machine::GameSession;
use super::mission::Mission;
use super::types::{Faction, GameStatus, ParticipantId, Phase, Role, Speech};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

/// A seat as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicParticipant {
    /// Seat id.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// True for the human seat.
    pub is_human: bool,
    /// Present only on the viewer's own seat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Present only on the viewer's own seat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction: Option<Faction>,
}

/// Everything one viewer may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicView {
    /// Whose view this is.
    pub viewer: ParticipantId,
    /// Seats in roster order.
    pub players: Vec<PublicParticipant>,
    /// Index of the current leader in `players`.
    pub leader_index: usize,
    /// Id of the current leader.
    pub leader_id: ParticipantId,
    /// Current round, 1..=5.
    pub current_round: u8,
    /// Team size for the current round; `None` once missions are decided.
    pub required_team_size: Option<usize>,
    /// Explicit phase.
    pub phase: Phase,
    /// Every mission proposed so far.
    pub missions: Vec<Mission>,
    /// Successful missions.
    pub success_count: u8,
    /// Failed missions.
    pub fail_count: u8,
    /// Rejections since the last approved team.
    pub consecutive_rejects: u8,
    /// Session status.
    pub status: GameStatus,
    /// Speech log, oldest first.
    pub speech_log: Vec<Speech>,
}

impl PublicView {
    /// Returns the viewer's own seat.
    pub fn own_seat(&self) -> Option<&PublicParticipant> {
        self.players.iter().find(|p| p.id == self.viewer)
    }

    /// Returns the team of the mission awaiting votes or cards, if any.
    pub fn current_team(&self) -> Option<&[ParticipantId]> {
        match self.phase {
            Phase::AwaitingVote | Phase::AwaitingCards => {
                self.missions.last().map(|m| m.team())
            }
            _ => None,
        }
    }
}

/// Builds per-viewer views.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivacyProjector;

impl PrivacyProjector {
    /// Projects the session for `viewer`. Pure read.
    #[instrument(skip(session), fields(session_id = %session.id()))]
    pub fn project(session: &GameSession, viewer: &ParticipantId) -> PublicView {
        Self::project_with_log(session, viewer, session.speech_log())
    }

    /// Projects the session with a substitute speech log.
    ///
    /// Used while a batch of speeches is still being collected.
    pub(crate) fn project_with_log(
        session: &GameSession,
        viewer: &ParticipantId,
        speech_log: &[Speech],
    ) -> PublicView {
        let players = session
            .participants()
            .iter()
            .map(|p| {
                let own = p.id() == viewer;
                PublicParticipant {
                    id: p.id().clone(),
                    name: p.name().to_string(),
                    is_human: p.is_human(),
                    role: own.then(|| p.role()),
                    faction: own.then(|| p.faction()),
                }
            })
            .collect();

        let ledger = session.ledger();
        trace!(viewer = %viewer, "Projected view");

        PublicView {
            viewer: viewer.clone(),
            players,
            leader_index: session.leader_index(),
            leader_id: session.leader().id().clone(),
            current_round: session.current_round(),
            required_team_size: session.required_team_size(),
            phase: session.phase(),
            missions: ledger.missions().to_vec(),
            success_count: ledger.success_count(),
            fail_count: ledger.fail_count(),
            consecutive_rejects: ledger.consecutive_rejects(),
            status: session.status(),
            speech_log: speech_log.to_vec(),
        }
    }
}
