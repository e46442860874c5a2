//! Mission records and the ledger that creates, tallies and resolves them.

use super::contracts::{Contract, ResolveContract, StartContract, TallyContract, TeamProposal};
use super::rules::is_majority;
use super::types::{MissionCard, MissionResult, Participant, ParticipantId, Vote};
use crate::error::GameError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Where a mission stands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionState {
    /// Team proposed; waiting for every vote.
    AwaitingVote,
    /// Team voted down. Concluded.
    Rejected,
    /// Team approved; waiting for cards from the team.
    AwaitingCards,
    /// Cards revealed. Concluded.
    Resolved,
}

impl MissionState {
    /// True while the mission still needs votes or cards.
    pub fn is_pending(self) -> bool {
        matches!(self, MissionState::AwaitingVote | MissionState::AwaitingCards)
    }
}

/// A vote cast by one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CastVote {
    /// Voter.
    pub participant: ParticipantId,
    /// Vote.
    pub vote: Vote,
}

impl CastVote {
    /// Creates a cast vote.
    pub fn new(participant: ParticipantId, vote: Vote) -> Self {
        Self { participant, vote }
    }
}

/// A card played by one team member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlayedCard {
    /// Team member.
    pub participant: ParticipantId,
    /// Card.
    pub card: MissionCard,
}

impl PlayedCard {
    /// Creates a played card.
    pub fn new(participant: ParticipantId, card: MissionCard) -> Self {
        Self { participant, card }
    }
}

/// One team proposal and what came of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    round: u8,
    team: Vec<ParticipantId>,
    state: MissionState,
    votes: Vec<CastVote>,
    approved: Option<bool>,
    cards: Vec<PlayedCard>,
    result: Option<MissionResult>,
}

impl Mission {
    fn new(round: u8, team: Vec<ParticipantId>) -> Self {
        Self {
            round,
            team,
            state: MissionState::AwaitingVote,
            votes: Vec::new(),
            approved: None,
            cards: Vec::new(),
            result: None,
        }
    }

    /// Round the mission was proposed in.
    pub fn round(&self) -> u8 {
        self.round
    }

    /// Team members in proposal order.
    pub fn team(&self) -> &[ParticipantId] {
        &self.team
    }

    /// Current state.
    pub fn state(&self) -> MissionState {
        self.state
    }

    /// Votes in roster order, empty until tallied.
    pub fn votes(&self) -> &[CastVote] {
        &self.votes
    }

    /// `None` until votes are tallied.
    pub fn approved(&self) -> Option<bool> {
        self.approved
    }

    /// Cards in team order, empty until resolved.
    pub fn cards(&self) -> &[PlayedCard] {
        &self.cards
    }

    /// `None` until cards are resolved.
    pub fn result(&self) -> Option<MissionResult> {
        self.result
    }

    /// Returns true if the participant is on the team.
    pub fn has_member(&self, id: &ParticipantId) -> bool {
        self.team.contains(id)
    }
}

/// Append-only mission history plus the counters derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionLedger {
    missions: Vec<Mission>,
    success_count: u8,
    fail_count: u8,
    consecutive_rejects: u8,
}

impl MissionLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// All missions, oldest first.
    pub fn missions(&self) -> &[Mission] {
        &self.missions
    }

    /// The most recent mission.
    pub fn latest(&self) -> Option<&Mission> {
        self.missions.last()
    }

    /// The most recent mission if it still needs votes or cards.
    pub fn pending(&self) -> Option<&Mission> {
        self.latest().filter(|m| m.state.is_pending())
    }

    /// Number of successful missions.
    pub fn success_count(&self) -> u8 {
        self.success_count
    }

    /// Number of failed missions.
    pub fn fail_count(&self) -> u8 {
        self.fail_count
    }

    /// Rejections since the last approval.
    pub fn consecutive_rejects(&self) -> u8 {
        self.consecutive_rejects
    }

    /// Records a team proposal for `round`.
    #[instrument(skip(self, roster))]
    pub fn start_mission(
        &mut self,
        roster: &[Participant],
        round: u8,
        team: Vec<ParticipantId>,
    ) -> Result<&Mission, GameError> {
        let proposal = TeamProposal { round, team: &team };
        <StartContract as Contract<TeamProposal<'_>>>::pre(roster, self, &proposal)?;

        #[cfg(debug_assertions)]
        let before = self.clone();

        self.missions.push(Mission::new(round, team));

        #[cfg(debug_assertions)]
        <StartContract as Contract<TeamProposal<'_>>>::post(&before, self)?;

        info!(round, "Mission proposed");
        self.missions
            .last()
            .ok_or_else(|| GameError::Invariant("mission vanished after push".to_string()))
    }

    /// Records one vote per participant and decides the proposal.
    ///
    /// Approval needs a strict majority of the roster. Approval clears the
    /// rejection streak; rejection extends it by one.
    #[instrument(skip(self, roster, votes))]
    pub fn tally_votes(
        &mut self,
        roster: &[Participant],
        votes: Vec<CastVote>,
    ) -> Result<bool, GameError> {
        <TallyContract as Contract<[CastVote]>>::pre(roster, self, &votes)?;

        #[cfg(debug_assertions)]
        let before = self.clone();

        let yes = votes.iter().filter(|v| v.vote == Vote::Yes).count();
        let approved = is_majority(yes, roster.len());

        let mission = self.pending_mut()?;
        mission.votes = votes;
        mission.approved = Some(approved);
        if approved {
            mission.state = MissionState::AwaitingCards;
            self.consecutive_rejects = 0;
        } else {
            mission.state = MissionState::Rejected;
            self.consecutive_rejects += 1;
        }

        #[cfg(debug_assertions)]
        <TallyContract as Contract<[CastVote]>>::post(&before, self)?;

        info!(
            yes,
            approved,
            consecutive_rejects = self.consecutive_rejects,
            "Votes tallied"
        );
        Ok(approved)
    }

    /// Records one card per team member and resolves the mission.
    ///
    /// A single fail card fails the mission.
    #[instrument(skip(self, roster, cards))]
    pub fn resolve_mission(
        &mut self,
        roster: &[Participant],
        cards: Vec<PlayedCard>,
    ) -> Result<MissionResult, GameError> {
        <ResolveContract as Contract<[PlayedCard]>>::pre(roster, self, &cards)?;

        #[cfg(debug_assertions)]
        let before = self.clone();

        let fails = cards.iter().filter(|c| c.card == MissionCard::Fail).count();
        let result = if fails > 0 {
            MissionResult::Fail
        } else {
            MissionResult::Success
        };

        let mission = self.pending_mut()?;
        mission.cards = cards;
        mission.result = Some(result);
        mission.state = MissionState::Resolved;
        match result {
            MissionResult::Success => self.success_count += 1,
            MissionResult::Fail => self.fail_count += 1,
        }

        #[cfg(debug_assertions)]
        <ResolveContract as Contract<[PlayedCard]>>::post(&before, self)?;

        debug!(fails, "Cards counted");
        info!(
            result = %result,
            successes = self.success_count,
            failures = self.fail_count,
            "Mission resolved"
        );
        Ok(result)
    }

    fn pending_mut(&mut self) -> Result<&mut Mission, GameError> {
        self.missions
            .last_mut()
            .filter(|m| m.state.is_pending())
            .ok_or_else(|| GameError::Invariant("no pending mission".to_string()))
    }
}
