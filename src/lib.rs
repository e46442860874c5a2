//! Strictly Avalon library - five-player hidden-role mission game
//!
//! One human plays against four automated participants whose decisions come
//! from a language model. The rules engine enforces every invariant; the
//! model is only ever asked for a shape, and every answer is validated.
//!
//! # Architecture
//!
//! - **Games**: role assignment, mission ledger and the phase machine
//! - **Gateway**: the boundary where automated seats are asked for decisions
//! - **LLM**: OpenAI, Anthropic and DeepSeek completion clients
//! - **Session**: per-session serialization behind an async mutex
//! - **Server**: axum JSON routes
//!
//! # Example
//!
//! ```no_run
//! use strictly_avalon::{RandomGateway, SessionManager, FallbackPolicy};
//!
//! # async fn example() -> Result<(), strictly_avalon::GameError> {
//! let sessions = SessionManager::new(FallbackPolicy::default(), Some(7));
//! let started = sessions.start("MERLIN").await?;
//! let gateway = RandomGateway::seeded(7);
//!
//! let handle = sessions.get(&started.session_id).await?;
//! let mut session = handle.lock().await;
//! if !session.leader().is_human() {
//!     session.auto_team(&gateway).await?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod error;
mod games;
mod gateway;
mod llm_client;
mod llm_gateway;
mod server;
mod session;

// Crate-level exports - Configuration
pub use config::{AvalonConfig, ConfigError, LlmSection, PolicySection, ServerSection};

// Crate-level exports - Errors
pub use error::{ErrorCategory, GameError};

// Crate-level exports - Decision gateway
pub use gateway::{
    CardFallback, DecisionGateway, DecisionKind, DecisionRequest, FallbackPolicy, GatewayError,
    GatewayErrorKind, RandomGateway, Reply, VoteFallback,
};

// Crate-level exports - LLM client and gateway
pub use llm_client::{LlmClient, LlmConfig, LlmError, LlmProvider};
pub use llm_gateway::{LlmGateway, parse_card, parse_target, parse_team, parse_vote};

// Crate-level exports - Server
pub use server::{
    ApiError, AppState, AssassinateRequest, ErrorBody, MissionRequest, SpeakRequest,
    StartRequest, TeamRequest, ViewResponse, VoteRequest, api_schemas, router,
};

// Crate-level exports - Session management
pub use session::{DEFAULT_RETENTION, SessionHandle, SessionManager, StartOutcome};

// Crate-level exports - Game types
pub use games::avalon::{
    AssassinationOutcome, BOT_IDS, CastVote, Faction, GameSession, GameStatus, HUMAN_ID,
    Knowledge, MAX_CONSECUTIVE_REJECTS, MISSIONS_TO_WIN, Mission, MissionCard, MissionLedger,
    MissionOutcome, MissionResult, MissionState, MissionSummary, PLAYER_COUNT, Participant,
    ParticipantId, Phase, PlayedCard, PrivacyProjector, PrivateKnowledge, PublicParticipant,
    PublicView, ROUND_COUNT, Role, RoleAssigner, RoleAssignment, SessionId, Speech, TEAM_SIZES,
    TeamOutcome, Vote, VoteOutcome, VoteResult, required_team_size,
};
