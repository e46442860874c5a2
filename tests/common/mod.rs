//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Mutex;
use strictly_avalon::{
    DecisionGateway, DecisionKind, DecisionRequest, FallbackPolicy, GameError, GameSession,
    GatewayError, GatewayErrorKind, MissionCard, ParticipantId, Reply, Role, TeamOutcome, Vote,
};

/// Gateway double with fixed answers that records every request.
#[derive(Debug)]
pub struct ScriptedGateway {
    vote: Reply<Vote>,
    card: Reply<MissionCard>,
    team: Option<Reply<Vec<ParticipantId>>>,
    target: Reply<ParticipantId>,
    failing: Option<DecisionKind>,
    requests: Mutex<Vec<DecisionRequest>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            vote: Reply::Parsed(Vote::Yes),
            card: Reply::Parsed(MissionCard::Success),
            team: None,
            target: Reply::Parsed(ParticipantId::from("HUMAN")),
            failing: None,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every automated vote.
    pub fn voting(mut self, vote: Reply<Vote>) -> Self {
        self.vote = vote;
        self
    }

    /// Every automated card.
    pub fn playing(mut self, card: Reply<MissionCard>) -> Self {
        self.card = card;
        self
    }

    /// Every team proposal. Without this the first seats in roster order are sent.
    pub fn proposing(mut self, team: Reply<Vec<ParticipantId>>) -> Self {
        self.team = Some(team);
        self
    }

    /// The assassination target.
    pub fn targeting(mut self, target: Reply<ParticipantId>) -> Self {
        self.target = target;
        self
    }

    /// Fails every request of one kind.
    pub fn failing_on(mut self, kind: DecisionKind) -> Self {
        self.failing = Some(kind);
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: &DecisionRequest) -> Result<(), GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing == Some(request.kind) {
            return Err(GatewayError::new(
                GatewayErrorKind::Unavailable,
                format!("scripted failure on {}", request.kind),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DecisionGateway for ScriptedGateway {
    async fn propose_team(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<Vec<ParticipantId>>, GatewayError> {
        self.record(request)?;
        if let Some(team) = &self.team {
            return Ok(team.clone());
        }
        let size = request.view.required_team_size.unwrap_or(0);
        Ok(Reply::Parsed(
            request
                .view
                .players
                .iter()
                .take(size)
                .map(|p| p.id.clone())
                .collect(),
        ))
    }

    async fn vote(&self, request: &DecisionRequest) -> Result<Reply<Vote>, GatewayError> {
        self.record(request)?;
        Ok(self.vote.clone())
    }

    async fn mission_card(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<MissionCard>, GatewayError> {
        self.record(request)?;
        Ok(self.card.clone())
    }

    async fn assassinate(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<ParticipantId>, GatewayError> {
        self.record(request)?;
        Ok(self.target.clone())
    }

    async fn speak(&self, request: &DecisionRequest) -> Result<String, GatewayError> {
        self.record(request)?;
        Ok(format!(
            "{} has heard {} speeches",
            request.viewer,
            request.view.speech_log.len()
        ))
    }
}

/// Starts a session with a fixed seed.
pub fn session(role: Role, seed: u64) -> GameSession {
    session_with(role, seed, FallbackPolicy::default())
}

/// Starts a session with a fixed seed and policy.
pub fn session_with(role: Role, seed: u64, policy: FallbackPolicy) -> GameSession {
    GameSession::start(
        format!("test-{}", seed),
        role,
        policy,
        StdRng::seed_from_u64(seed),
    )
}

/// First `size` seats in roster order. The human always sits first.
pub fn first_seats(session: &GameSession, size: usize) -> Vec<ParticipantId> {
    session
        .participants()
        .iter()
        .take(size)
        .map(|p| p.id().clone())
        .collect()
}

/// Id of the seat holding `role`.
pub fn seat_of(session: &GameSession, role: Role) -> ParticipantId {
    session
        .participants()
        .iter()
        .find(|p| p.role() == role)
        .map(|p| p.id().clone())
        .unwrap()
}

/// Proposes the first seats as a team, by hand or through the gateway.
pub async fn propose(
    session: &mut GameSession,
    gateway: &ScriptedGateway,
) -> Result<TeamOutcome, GameError> {
    if session.leader().is_human() {
        let size = session.required_team_size().unwrap();
        let team = first_seats(session, size);
        session.submit_team(team)
    } else {
        session.auto_team(gateway).await
    }
}

/// Plays one approved mission with the given human card.
pub async fn play_round(
    session: &mut GameSession,
    gateway: &ScriptedGateway,
    human_card: Option<MissionCard>,
) {
    propose(session, gateway).await.unwrap();
    let outcome = session.submit_vote(Vote::Yes, gateway).await.unwrap();
    assert!(outcome.vote_result.approved);
    session
        .submit_mission_card(human_card, gateway)
        .await
        .unwrap();
}
