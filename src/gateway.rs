//! Decision gateway: how the engine asks automated participants for choices.
//!
//! The engine never trusts a reply. Every answer passes through
//! [`FallbackPolicy`] before it reaches the ledger.

use crate::games::avalon::{
    Faction, Knowledge, MissionCard, Participant, ParticipantId, PublicView, Vote,
};
use async_trait::async_trait;
use derive_more::{Display, Error};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Decision point the engine is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    /// Leader proposes a team.
    TeamProposal,
    /// Vote on the proposed team.
    Vote,
    /// Team member plays a mission card.
    MissionCard,
    /// Assassin names a target.
    Assassination,
    /// Free-text speech.
    Speech,
}

/// Everything a participant may know when making a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    /// Decision point.
    pub kind: DecisionKind,
    /// Participant deciding.
    pub viewer: ParticipantId,
    /// The viewer's projection of the session.
    pub view: PublicView,
    /// The viewer's own private knowledge.
    pub knowledge: Vec<Knowledge>,
}

impl DecisionRequest {
    /// Creates a request.
    pub fn new(
        kind: DecisionKind,
        viewer: ParticipantId,
        view: PublicView,
        knowledge: Vec<Knowledge>,
    ) -> Self {
        Self {
            kind,
            viewer,
            view,
            knowledge,
        }
    }

    /// The viewer's faction as shown on its own seat.
    pub fn faction(&self) -> Option<Faction> {
        self.view.own_seat().and_then(|seat| seat.faction)
    }
}

/// A gateway answer before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    /// The answer had the expected shape.
    Parsed(T),
    /// The raw answer could not be understood.
    Unparseable(String),
}

/// Kind of gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GatewayErrorKind {
    /// The oracle could not be reached or returned an error.
    #[display("unavailable")]
    Unavailable,
    /// The oracle answered with something that could not be read.
    #[display("unparseable")]
    Unparseable,
    /// The oracle answered with a value outside the allowed range.
    #[display("invalid response")]
    InvalidResponse,
}

/// Gateway error with location tracking.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Gateway error ({}): {} at {}:{}", kind, message, file, line)]
pub struct GatewayError {
    /// What went wrong.
    pub kind: GatewayErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl GatewayError {
    /// Creates a new gateway error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(kind = %kind, error_message = %message, "Gateway error created");
        Self {
            kind,
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Source of decisions for automated participants.
///
/// Implementations return the raw shape; the engine validates it.
#[async_trait]
pub trait DecisionGateway: Send + Sync {
    /// Asks the leader for a team.
    async fn propose_team(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<Vec<ParticipantId>>, GatewayError>;

    /// Asks for a vote on the current team.
    async fn vote(&self, request: &DecisionRequest) -> Result<Reply<Vote>, GatewayError>;

    /// Asks a team member for a mission card.
    async fn mission_card(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<MissionCard>, GatewayError>;

    /// Asks the assassin for a target.
    async fn assassinate(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<ParticipantId>, GatewayError>;

    /// Asks for a short speech.
    async fn speak(&self, request: &DecisionRequest) -> Result<String, GatewayError>;
}

/// What to do with an unreadable vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteFallback {
    /// Count it as YES.
    #[default]
    Yes,
    /// Count it as NO.
    No,
    /// Fail the operation.
    Error,
}

/// What to do with an unreadable card from an evil team member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardFallback {
    /// Play SUCCESS.
    #[default]
    Success,
    /// Play FAIL.
    Fail,
    /// Fail the operation.
    Error,
}

/// Validation and fallback applied to every gateway reply.
///
/// - Team: unknown ids, duplicates, wrong size or unreadable text fall back
///   to a uniform random team of the required size.
/// - Vote: unreadable replies follow `vote`.
/// - Card: good participants always play SUCCESS; unreadable replies from
///   evil participants follow `card`.
/// - Assassination: anything but a seated participant id is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackPolicy {
    /// Unreadable vote handling.
    pub vote: VoteFallback,
    /// Unreadable evil card handling.
    pub card: CardFallback,
}

impl FallbackPolicy {
    /// Accepts a proposed team or replaces it with a random one.
    #[instrument(skip(self, roster, rng))]
    pub fn team<R: Rng + ?Sized>(
        &self,
        reply: Reply<Vec<ParticipantId>>,
        roster: &[Participant],
        size: usize,
        rng: &mut R,
    ) -> Vec<ParticipantId> {
        if let Reply::Parsed(team) = &reply {
            let mut seen = HashSet::new();
            let valid = team.len() == size
                && team
                    .iter()
                    .all(|id| roster.iter().any(|p| p.id() == id) && seen.insert(id));
            if valid {
                debug!(team = ?team, "Accepted proposed team");
                return team.clone();
            }
        }

        warn!(reply = ?reply, size, "Invalid team proposal, choosing at random");
        let mut ids: Vec<ParticipantId> = roster.iter().map(|p| p.id().clone()).collect();
        ids.shuffle(rng);
        ids.truncate(size);
        ids
    }

    /// Resolves a vote reply.
    #[instrument(skip(self))]
    pub fn vote(&self, voter: &ParticipantId, reply: Reply<Vote>) -> Result<Vote, GatewayError> {
        match reply {
            Reply::Parsed(vote) => Ok(vote),
            Reply::Unparseable(raw) => match self.vote {
                VoteFallback::Yes => {
                    warn!(voter = %voter, raw = %raw, "Unreadable vote counted as YES");
                    Ok(Vote::Yes)
                }
                VoteFallback::No => {
                    warn!(voter = %voter, raw = %raw, "Unreadable vote counted as NO");
                    Ok(Vote::No)
                }
                VoteFallback::Error => Err(GatewayError::new(
                    GatewayErrorKind::Unparseable,
                    format!("unreadable vote from {}: {:?}", voter, raw),
                )),
            },
        }
    }

    /// Resolves a card reply. Good participants always play SUCCESS.
    #[instrument(skip(self, participant), fields(participant = %participant.id()))]
    pub fn card(
        &self,
        participant: &Participant,
        reply: Reply<MissionCard>,
    ) -> Result<MissionCard, GatewayError> {
        if participant.faction() == Faction::Good {
            if reply != Reply::Parsed(MissionCard::Success) {
                debug!(reply = ?reply, "Good participant forced to SUCCESS");
            }
            return Ok(MissionCard::Success);
        }
        match reply {
            Reply::Parsed(card) => Ok(card),
            Reply::Unparseable(raw) => match self.card {
                CardFallback::Success => {
                    warn!(raw = %raw, "Unreadable card played as SUCCESS");
                    Ok(MissionCard::Success)
                }
                CardFallback::Fail => {
                    warn!(raw = %raw, "Unreadable card played as FAIL");
                    Ok(MissionCard::Fail)
                }
                CardFallback::Error => Err(GatewayError::new(
                    GatewayErrorKind::Unparseable,
                    format!("unreadable card from {}: {:?}", participant.id(), raw),
                )),
            },
        }
    }

    /// Resolves an assassination target. No fallback.
    #[instrument(skip(self, roster))]
    pub fn target(
        &self,
        roster: &[Participant],
        reply: Reply<ParticipantId>,
    ) -> Result<ParticipantId, GatewayError> {
        match reply {
            Reply::Parsed(id) if roster.iter().any(|p| p.id() == &id) => Ok(id),
            Reply::Parsed(id) => Err(GatewayError::new(
                GatewayErrorKind::InvalidResponse,
                format!("assassination target {} is not seated", id),
            )),
            Reply::Unparseable(raw) => Err(GatewayError::new(
                GatewayErrorKind::Unparseable,
                format!("unreadable assassination target: {:?}", raw),
            )),
        }
    }
}

/// Gateway that decides uniformly at random. Used for offline play.
#[derive(Debug)]
pub struct RandomGateway {
    rng: Mutex<StdRng>,
}

impl RandomGateway {
    /// Creates a gateway seeded from entropy.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating random decision gateway");
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Creates a gateway with a fixed seed.
    #[instrument]
    pub fn seeded(seed: u64) -> Self {
        info!(seed, "Creating seeded random decision gateway");
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionGateway for RandomGateway {
    #[instrument(skip(self, request), fields(viewer = %request.viewer))]
    async fn propose_team(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<Vec<ParticipantId>>, GatewayError> {
        let size = request.view.required_team_size.ok_or_else(|| {
            GatewayError::new(
                GatewayErrorKind::InvalidResponse,
                "no team size outside of team building",
            )
        })?;
        let mut ids: Vec<ParticipantId> =
            request.view.players.iter().map(|p| p.id.clone()).collect();
        ids.shuffle(&mut *self.rng.lock().await);
        ids.truncate(size);
        Ok(Reply::Parsed(ids))
    }

    #[instrument(skip(self, request), fields(viewer = %request.viewer))]
    async fn vote(&self, request: &DecisionRequest) -> Result<Reply<Vote>, GatewayError> {
        let yes = self.rng.lock().await.gen_bool(0.5);
        Ok(Reply::Parsed(if yes { Vote::Yes } else { Vote::No }))
    }

    #[instrument(skip(self, request), fields(viewer = %request.viewer))]
    async fn mission_card(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<MissionCard>, GatewayError> {
        let sabotage =
            request.faction() == Some(Faction::Evil) && self.rng.lock().await.gen_bool(0.5);
        Ok(Reply::Parsed(if sabotage {
            MissionCard::Fail
        } else {
            MissionCard::Success
        }))
    }

    #[instrument(skip(self, request), fields(viewer = %request.viewer))]
    async fn assassinate(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<ParticipantId>, GatewayError> {
        let others: Vec<&ParticipantId> = request
            .view
            .players
            .iter()
            .map(|p| &p.id)
            .filter(|id| **id != request.viewer)
            .collect();
        let target = others
            .choose(&mut *self.rng.lock().await)
            .map(|id| (*id).clone())
            .ok_or_else(|| {
                GatewayError::new(GatewayErrorKind::InvalidResponse, "no one to assassinate")
            })?;
        Ok(Reply::Parsed(target))
    }

    #[instrument(skip(self, request), fields(viewer = %request.viewer))]
    async fn speak(&self, request: &DecisionRequest) -> Result<String, GatewayError> {
        const LINES: [&str; 4] = [
            "I have nothing to add yet.",
            "Let's watch the next vote closely.",
            "I trust the last team more than this one.",
            "Someone here is not who they claim to be.",
        ];
        let line = LINES
            .choose(&mut *self.rng.lock().await)
            .copied()
            .unwrap_or(LINES[0]);
        Ok(line.to_string())
    }
}
