//! Decision gateway backed by a language model.
//!
//! Each decision is one completion: a system prompt fixing the output
//! discipline, and a user message holding the participant's brief as JSON
//! plus an instruction naming the exact output format.

use crate::games::avalon::{
    Faction, Mission, MissionCard, ParticipantId, PublicParticipant, Role, Speech, Vote,
};
use crate::gateway::{
    DecisionGateway, DecisionKind, DecisionRequest, GatewayError, GatewayErrorKind, Reply,
};
use crate::llm_client::{LlmClient, LlmError};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument, warn};

const SYSTEM_PROMPT: &str = "You are a player in the board game Avalon. Answer strictly in the \
requested output format with no extra explanation. Reason from the game rules and from what the \
human and the other players have said, and always answer in the way that helps your side win.";

/// What a participant is told when asked for a decision.
#[derive(Debug, Serialize)]
struct Brief<'a> {
    player_id: &'a ParticipantId,
    role: Option<Role>,
    faction: Option<Faction>,
    phase: DecisionKind,
    round: u8,
    leader: &'a ParticipantId,
    required_team_size: Option<usize>,
    current_team: &'a [ParticipantId],
    all_players: &'a [PublicParticipant],
    mission_history: &'a [Mission],
    speech_log: &'a [Speech],
    private_info: Vec<String>,
    instruction: &'a str,
}

impl<'a> Brief<'a> {
    fn new(request: &'a DecisionRequest, instruction: &'a str) -> Self {
        let view = &request.view;
        let seat = view.own_seat();
        Self {
            player_id: &request.viewer,
            role: seat.and_then(|s| s.role),
            faction: seat.and_then(|s| s.faction),
            phase: request.kind,
            round: view.current_round,
            leader: &view.leader_id,
            required_team_size: view.required_team_size,
            current_team: view.current_team().unwrap_or(&[]),
            all_players: &view.players,
            mission_history: &view.missions,
            speech_log: &view.speech_log,
            private_info: request.knowledge.iter().map(ToString::to_string).collect(),
            instruction,
        }
    }
}

fn instruction_for(kind: DecisionKind) -> &'static str {
    match kind {
        DecisionKind::TeamProposal => {
            "You are the leader this round. Output only a JSON array of the player ids to send \
             on the mission, for example [\"HUMAN\",\"BOT_1\"]. Add no other text."
        }
        DecisionKind::Vote => "Vote on the current team. Output only YES or NO.",
        DecisionKind::MissionCard => {
            "You are on the mission. Good players may only play SUCCESS; evil players may play \
             SUCCESS or FAIL. Output only SUCCESS or FAIL."
        }
        DecisionKind::Assassination => {
            "You are the assassin. Good has completed three missions. Name the player you \
             believe is Merlin. Output only the player id, for example \"HUMAN\"."
        }
        DecisionKind::Speech => {
            "Make a short statement to the table. You may express suspicion, trust or strategy. \
             Keep it under 200 characters."
        }
    }
}

/// Extracts a list of ids from model output.
///
/// Tries the whole text as JSON, then a fenced code block, then the outermost
/// bracketed span.
pub fn parse_team(text: &str) -> Reply<Vec<ParticipantId>> {
    let candidates = [Some(text.trim()), fenced_block(text), bracketed(text)];
    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| serde_json::from_str::<Vec<ParticipantId>>(candidate).ok())
        .map(Reply::Parsed)
        .unwrap_or_else(|| Reply::Unparseable(text.to_string()))
}

/// Reads a vote. YES is checked first.
pub fn parse_vote(text: &str) -> Reply<Vote> {
    if text.contains("YES") {
        Reply::Parsed(Vote::Yes)
    } else if text.contains("NO") {
        Reply::Parsed(Vote::No)
    } else {
        Reply::Unparseable(text.to_string())
    }
}

/// Reads a mission card. FAIL is checked first.
pub fn parse_card(text: &str) -> Reply<MissionCard> {
    if text.contains("FAIL") {
        Reply::Parsed(MissionCard::Fail)
    } else if text.contains("SUCCESS") {
        Reply::Parsed(MissionCard::Success)
    } else {
        Reply::Unparseable(text.to_string())
    }
}

/// Reads an assassination target, dropping quotes and whitespace.
pub fn parse_target(text: &str) -> Reply<ParticipantId> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '"' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        Reply::Unparseable(text.to_string())
    } else {
        Reply::Parsed(ParticipantId::new(cleaned))
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

fn bracketed(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}

/// Gateway that asks a language model for every decision.
#[derive(Debug, Clone)]
pub struct LlmGateway {
    client: LlmClient,
}

impl LlmGateway {
    /// Wraps a client.
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, request), fields(viewer = %request.viewer, kind = %request.kind))]
    async fn ask(&self, request: &DecisionRequest) -> Result<String, GatewayError> {
        let brief = Brief::new(request, instruction_for(request.kind));
        let message = serde_json::to_string_pretty(&brief).map_err(|e| {
            GatewayError::new(
                GatewayErrorKind::InvalidResponse,
                format!("Failed to encode brief: {}", e),
            )
        })?;

        let text = self
            .client
            .generate(SYSTEM_PROMPT, &message)
            .await
            .map_err(|e: LlmError| GatewayError::new(GatewayErrorKind::Unavailable, e.message))?;
        let text = text.trim().to_string();
        debug!(reply = %text, "Model replied");
        Ok(text)
    }
}

#[async_trait]
impl DecisionGateway for LlmGateway {
    async fn propose_team(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<Vec<ParticipantId>>, GatewayError> {
        let text = self.ask(request).await?;
        let reply = parse_team(&text);
        if let Reply::Unparseable(_) = &reply {
            warn!(viewer = %request.viewer, "Team proposal could not be read");
        }
        Ok(reply)
    }

    async fn vote(&self, request: &DecisionRequest) -> Result<Reply<Vote>, GatewayError> {
        Ok(parse_vote(&self.ask(request).await?))
    }

    async fn mission_card(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<MissionCard>, GatewayError> {
        Ok(parse_card(&self.ask(request).await?))
    }

    async fn assassinate(
        &self,
        request: &DecisionRequest,
    ) -> Result<Reply<ParticipantId>, GatewayError> {
        Ok(parse_target(&self.ask(request).await?))
    }

    async fn speak(&self, request: &DecisionRequest) -> Result<String, GatewayError> {
        self.ask(request).await
    }
}
