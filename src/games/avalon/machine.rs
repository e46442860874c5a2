//! The session aggregate and its phase machine.
//!
//! ```text
//! TeamBuilding ──team──▶ AwaitingVote ──approved──▶ AwaitingCards
//!      ▲                     │                          │
//!      └──rejected (<5)──────┘                          │
//!      ▲                                                │
//!      └────────────next round──────────────────────────┤
//!                                                       ▼
//!              Finished ◀──assassination── Assassination
//! ```
//!
//! Every operation validates first and mutates last, so a rejected request
//! or a failed gateway call leaves the session untouched.

use super::mission::{CastVote, Mission, MissionLedger, PlayedCard};
use super::roles::{Knowledge, PrivateKnowledge, RoleAssigner};
use super::rules::{MAX_CONSECUTIVE_REJECTS, MissionTrack, evaluate_track, required_team_size};
use super::types::{
    Faction, GameStatus, MissionCard, MissionResult, Participant, ParticipantId, Phase, Role, Speech,
    Vote,
};
use super::view::{PrivacyProjector, PublicView};
use crate::error::GameError;
use crate::gateway::{DecisionGateway, DecisionKind, DecisionRequest, FallbackPolicy};
use rand::rngs::StdRng;
use std::time::Instant;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a game session.
pub type SessionId = String;

/// Result of proposing a team.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamOutcome {
    /// The new mission.
    pub mission: Mission,
    /// The human's view afterwards.
    pub public_view: PublicView,
}

/// Vote details returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VoteResult {
    /// Whether the team was approved.
    pub approved: bool,
    /// Every vote, roster order.
    pub votes: Vec<CastVote>,
}

/// Result of a vote.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    /// The voted mission.
    pub mission: Mission,
    /// Tally details.
    pub vote_result: VoteResult,
    /// The human's view afterwards.
    pub public_view: PublicView,
}

/// Short summary of a resolved mission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MissionSummary {
    /// Round of the mission.
    pub round: u8,
    /// Team that played.
    pub team: Vec<ParticipantId>,
    /// Outcome.
    pub result: MissionResult,
}

/// Result of playing mission cards.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MissionOutcome {
    /// What happened.
    pub mission_summary: MissionSummary,
    /// The human's view afterwards.
    pub public_view: PublicView,
}

/// Result of the assassination.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssassinationOutcome {
    /// Who was named.
    pub target: ParticipantId,
    /// Final status.
    pub status: GameStatus,
    /// The human's view afterwards.
    pub public_view: PublicView,
}

/// One game, from role assignment to a winner.
#[derive(Debug, Clone)]
pub struct GameSession {
    id: SessionId,
    participants: Vec<Participant>,
    knowledge: PrivateKnowledge,
    leader_index: usize,
    current_round: u8,
    ledger: MissionLedger,
    status: GameStatus,
    phase: Phase,
    speech_log: Vec<Speech>,
    policy: FallbackPolicy,
    rng: StdRng,
    finished_at: Option<Instant>,
}

impl GameSession {
    /// Starts a session with the human playing `human_role`.
    #[instrument(skip(policy, rng))]
    pub fn start(
        id: SessionId,
        human_role: Role,
        policy: FallbackPolicy,
        mut rng: StdRng,
    ) -> Self {
        let assignment = RoleAssigner::assign(human_role, &mut rng);
        info!(
            session_id = %id,
            leader = %assignment.participants[assignment.leader_index].id(),
            "Session started"
        );
        Self {
            id,
            participants: assignment.participants,
            knowledge: assignment.knowledge,
            leader_index: assignment.leader_index,
            current_round: 1,
            ledger: MissionLedger::new(),
            status: GameStatus::Ongoing,
            phase: Phase::TeamBuilding,
            speech_log: Vec::new(),
            policy,
            rng,
            finished_at: None,
        }
    }

    // ─────────────────────────────────────────────────────────
    //  Accessors
    // ─────────────────────────────────────────────────────────

    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Full roster, roles included. Never hand this to a participant.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Index of the current leader.
    pub fn leader_index(&self) -> usize {
        self.leader_index
    }

    /// Current leader.
    pub fn leader(&self) -> &Participant {
        &self.participants[self.leader_index]
    }

    /// The human seat.
    pub fn human(&self) -> &Participant {
        self.participants
            .iter()
            .find(|p| p.is_human())
            .unwrap_or(&self.participants[0])
    }

    /// Current round, 1..=5.
    pub fn current_round(&self) -> u8 {
        self.current_round
    }

    /// Mission history and counters.
    pub fn ledger(&self) -> &MissionLedger {
        &self.ledger
    }

    /// Session status.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// When the game reached a terminal status.
    pub fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Speech log, oldest first.
    pub fn speech_log(&self) -> &[Speech] {
        &self.speech_log
    }

    /// Team size for the current round while missions are still played.
    pub fn required_team_size(&self) -> Option<usize> {
        match self.status {
            GameStatus::Ongoing => required_team_size(self.current_round),
            _ => None,
        }
    }

    /// The human's view.
    pub fn view(&self) -> PublicView {
        PrivacyProjector::project(self, self.human().id())
    }

    /// The human's private knowledge.
    pub fn human_knowledge(&self) -> &[Knowledge] {
        self.knowledge.for_participant(self.human().id())
    }

    /// Looks up a seated participant. Unknown ids are an invariant violation.
    pub fn participant(&self, id: &ParticipantId) -> Result<&Participant, GameError> {
        self.participants
            .iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| GameError::Invariant(format!("unknown participant {}", id)))
    }

    // ─────────────────────────────────────────────────────────
    //  Operations
    // ─────────────────────────────────────────────────────────

    /// The human leader proposes a team.
    #[instrument(skip(self), fields(session_id = %self.id, round = self.current_round))]
    pub fn submit_team(&mut self, team: Vec<ParticipantId>) -> Result<TeamOutcome, GameError> {
        self.ensure_phase(Phase::TeamBuilding)?;
        let leader = self.leader();
        if !leader.is_human() {
            return Err(GameError::NotYourDecision {
                action: "propose the team",
                owner: leader.id().clone(),
            });
        }
        self.begin_mission(team)
    }

    /// An automated leader proposes a team through the gateway.
    #[instrument(skip(self, gateway), fields(session_id = %self.id, round = self.current_round))]
    pub async fn auto_team(
        &mut self,
        gateway: &dyn DecisionGateway,
    ) -> Result<TeamOutcome, GameError> {
        self.ensure_phase(Phase::TeamBuilding)?;
        let leader = self.leader().clone();
        if leader.is_human() {
            return Err(GameError::HumanMustDecide {
                action: "The team proposal",
            });
        }
        let size = self.required_team_size().ok_or_else(|| {
            GameError::Invariant(format!("no team size for round {}", self.current_round))
        })?;

        let request = self.request_for(leader.id(), DecisionKind::TeamProposal, None);
        let reply = gateway.propose_team(&request).await?;
        let team = self
            .policy
            .team(reply, &self.participants, size, &mut self.rng);

        info!(leader = %leader.id(), team = ?team, "Automated leader proposed team");
        self.begin_mission(team)
    }

    /// Collects every vote on the current team and applies the tally.
    ///
    /// The human votes first; automated seats follow in roster order.
    #[instrument(skip(self, gateway), fields(session_id = %self.id, round = self.current_round))]
    pub async fn submit_vote(
        &mut self,
        human_vote: Vote,
        gateway: &dyn DecisionGateway,
    ) -> Result<VoteOutcome, GameError> {
        self.ensure_phase(Phase::AwaitingVote)?;

        let mut votes = Vec::with_capacity(self.participants.len());
        for participant in &self.participants {
            let vote = if participant.is_human() {
                human_vote
            } else {
                let request = self.request_for(participant.id(), DecisionKind::Vote, None);
                let reply = gateway.vote(&request).await?;
                self.policy.vote(participant.id(), reply)?
            };
            debug!(participant = %participant.id(), vote = %vote, "Vote collected");
            votes.push(CastVote::new(participant.id().clone(), vote));
        }

        let approved = self.ledger.tally_votes(&self.participants, votes.clone())?;
        if approved {
            self.phase = Phase::AwaitingCards;
        } else if self.ledger.consecutive_rejects() >= MAX_CONSECUTIVE_REJECTS {
            warn!(
                rejects = self.ledger.consecutive_rejects(),
                "Too many rejected teams, evil wins"
            );
            self.finish(GameStatus::EvilWin);
        } else {
            self.advance_leader();
            self.phase = Phase::TeamBuilding;
        }

        let mission = self.latest_mission()?.clone();
        Ok(VoteOutcome {
            mission,
            vote_result: VoteResult { approved, votes },
            public_view: self.view(),
        })
    }

    /// Collects one card per team member and resolves the mission.
    ///
    /// `human_card` is required only when the human is an evil team member.
    /// A good human always plays SUCCESS whatever was sent.
    #[instrument(skip(self, gateway), fields(session_id = %self.id, round = self.current_round))]
    pub async fn submit_mission_card(
        &mut self,
        human_card: Option<MissionCard>,
        gateway: &dyn DecisionGateway,
    ) -> Result<MissionOutcome, GameError> {
        self.ensure_phase(Phase::AwaitingCards)?;
        let team = self.latest_mission()?.team().to_vec();

        let human = self.human();
        if team.contains(human.id()) {
            if human.faction() == Faction::Evil && human_card.is_none() {
                return Err(GameError::MissingHumanCard);
            }
        } else if human_card.is_some() {
            debug!("Human is not on the team, ignoring submitted card");
        }

        let mut cards = Vec::with_capacity(team.len());
        for id in &team {
            let participant = self.participant(id)?;
            let card = if participant.is_human() {
                match participant.faction() {
                    Faction::Good => MissionCard::Success,
                    Faction::Evil => human_card.ok_or(GameError::MissingHumanCard)?,
                }
            } else {
                let request = self.request_for(id, DecisionKind::MissionCard, None);
                let reply = gateway.mission_card(&request).await?;
                self.policy.card(participant, reply)?
            };
            cards.push(PlayedCard::new(id.clone(), card));
        }

        let result = self.ledger.resolve_mission(&self.participants, cards)?;
        match evaluate_track(self.ledger.success_count(), self.ledger.fail_count()) {
            MissionTrack::Decided(GameStatus::AssassinPhase) => {
                info!("Good completed three missions, assassination phase");
                self.status = GameStatus::AssassinPhase;
                self.phase = Phase::Assassination;
            }
            MissionTrack::Decided(status) => self.finish(status),
            MissionTrack::Continue => {
                self.current_round += 1;
                self.advance_leader();
                self.phase = Phase::TeamBuilding;
            }
        }

        Ok(MissionOutcome {
            mission_summary: MissionSummary {
                round: self.latest_mission()?.round(),
                team,
                result,
            },
            public_view: self.view(),
        })
    }

    /// Names the assassination target.
    ///
    /// The human passes `Some(target)` only when it holds the assassin role;
    /// otherwise the target comes from the gateway and `target` must be `None`.
    #[instrument(skip(self, gateway), fields(session_id = %self.id))]
    pub async fn submit_assassination_target(
        &mut self,
        target: Option<ParticipantId>,
        gateway: &dyn DecisionGateway,
    ) -> Result<AssassinationOutcome, GameError> {
        self.ensure_phase(Phase::Assassination)?;
        let assassin = self
            .participants
            .iter()
            .find(|p| p.role() == Role::Assassin)
            .cloned()
            .ok_or_else(|| GameError::Invariant("no assassin seated".to_string()))?;

        let target = match (assassin.is_human(), target) {
            (true, Some(target)) => {
                if !self.participants.iter().any(|p| p.id() == &target) {
                    return Err(GameError::UnknownParticipant(target));
                }
                target
            }
            (true, None) => {
                return Err(GameError::HumanMustDecide {
                    action: "The assassination target",
                });
            }
            (false, Some(_)) => {
                return Err(GameError::NotYourDecision {
                    action: "name the assassination target",
                    owner: assassin.id().clone(),
                });
            }
            (false, None) => {
                let request = self.request_for(assassin.id(), DecisionKind::Assassination, None);
                let reply = gateway.assassinate(&request).await?;
                self.policy.target(&self.participants, reply)?
            }
        };

        let victim = self.participant(&target)?;
        let status = if victim.role() == Role::Merlin {
            GameStatus::EvilWin
        } else {
            GameStatus::GoodWin
        };
        info!(assassin = %assassin.id(), target = %target, status = %status, "Assassination");
        self.finish(status);

        Ok(AssassinationOutcome {
            target,
            status,
            public_view: self.view(),
        })
    }

    /// The human speaks, then every automated seat answers in roster order.
    ///
    /// Each automated seat sees the speeches made before it in the same call.
    /// If any answer fails, none of the batch is kept.
    #[instrument(skip(self, text, gateway), fields(session_id = %self.id))]
    pub async fn speak(
        &mut self,
        text: &str,
        gateway: &dyn DecisionGateway,
    ) -> Result<PublicView, GameError> {
        self.ensure_active()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(GameError::EmptySpeech);
        }

        let mut log = self.speech_log.clone();
        let human_id = self.human().id().clone();
        self.push_speech(&mut log, human_id, text.to_string());

        for participant in self.participants.iter().filter(|p| !p.is_human()) {
            let request =
                self.request_for(participant.id(), DecisionKind::Speech, Some(log.as_slice()));
            let speech = gateway.speak(&request).await?;
            self.push_speech(&mut log, participant.id().clone(), speech.trim().to_string());
        }

        info!(entries = log.len() - self.speech_log.len(), "Speech round recorded");
        self.speech_log = log;
        Ok(self.view())
    }

    // ─────────────────────────────────────────────────────────
    //  Internals
    // ─────────────────────────────────────────────────────────

    fn ensure_active(&self) -> Result<(), GameError> {
        if self.status.is_terminal() {
            warn!(status = %self.status, "Operation after game over");
            return Err(GameError::GameOver(self.status));
        }
        Ok(())
    }

    fn ensure_phase(&self, expected: Phase) -> Result<(), GameError> {
        self.ensure_active()?;
        if self.phase != expected {
            warn!(expected = %expected, actual = %self.phase, "Operation out of phase");
            return Err(GameError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn begin_mission(&mut self, team: Vec<ParticipantId>) -> Result<TeamOutcome, GameError> {
        let mission = self
            .ledger
            .start_mission(&self.participants, self.current_round, team)?
            .clone();
        self.phase = Phase::AwaitingVote;
        Ok(TeamOutcome {
            mission,
            public_view: self.view(),
        })
    }

    fn latest_mission(&self) -> Result<&Mission, GameError> {
        self.ledger
            .latest()
            .ok_or_else(|| GameError::Invariant("no mission recorded".to_string()))
    }

    fn advance_leader(&mut self) {
        self.leader_index = (self.leader_index + 1) % self.participants.len();
        debug!(leader = %self.leader().id(), "Leader advanced");
    }

    fn finish(&mut self, status: GameStatus) {
        info!(status = %status, "Game over");
        self.status = status;
        self.phase = Phase::Finished;
        self.finished_at = Some(Instant::now());
    }

    fn push_speech(&self, log: &mut Vec<Speech>, from: ParticipantId, text: String) {
        let order = log.len() + 1;
        log.push(Speech {
            round: self.current_round,
            order,
            from,
            text,
        });
    }

    fn request_for(
        &self,
        viewer: &ParticipantId,
        kind: DecisionKind,
        speech_log: Option<&[Speech]>,
    ) -> DecisionRequest {
        let view = match speech_log {
            Some(log) => PrivacyProjector::project_with_log(self, viewer, log),
            None => PrivacyProjector::project(self, viewer),
        };
        DecisionRequest::new(
            kind,
            viewer.clone(),
            view,
            self.knowledge.for_participant(viewer).to_vec(),
        )
    }
}
