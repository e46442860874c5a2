//! JSON over HTTP transport.
//!
//! Each route locks one session, runs one operation and returns the result.
//! Token parsing happens here; every game rule lives in the session.

use crate::error::{ErrorCategory, GameError};
use crate::games::avalon::{
    AssassinationOutcome, MissionCard, MissionOutcome, ParticipantId, PublicView, TeamOutcome,
    Vote, VoteOutcome,
};
use crate::gateway::DecisionGateway;
use crate::session::{SessionManager, StartOutcome};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, instrument, warn};

/// Shared state of the HTTP server.
#[derive(Clone)]
pub struct AppState {
    sessions: SessionManager,
    gateway: Arc<dyn DecisionGateway>,
}

impl AppState {
    /// Creates the server state.
    pub fn new(sessions: SessionManager, gateway: Arc<dyn DecisionGateway>) -> Self {
        Self { sessions, gateway }
    }

    /// Session store.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}

/// Builds the router with request tracing and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/schema", get(get_schemas))
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/{id}", delete(end_session))
        .route("/api/sessions/{id}/state", get(get_state))
        .route("/api/sessions/{id}/speak", post(speak))
        .route("/api/sessions/{id}/team", post(submit_team))
        .route("/api/sessions/{id}/auto-team", post(auto_team))
        .route("/api/sessions/{id}/vote", post(submit_vote))
        .route("/api/sessions/{id}/mission", post(submit_mission_card))
        .route("/api/sessions/{id}/assassinate", post(submit_assassination))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────
//  Request and response bodies
// ─────────────────────────────────────────────────────────────

/// Body of `POST /api/sessions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct StartRequest {
    /// Role for the human seat.
    pub human_role: String,
}

/// Body of `POST /api/sessions/{id}/speak`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SpeakRequest {
    /// What the human says.
    pub text: String,
}

/// Body of `POST /api/sessions/{id}/team`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TeamRequest {
    /// Proposed members.
    pub team: Vec<ParticipantId>,
}

/// Body of `POST /api/sessions/{id}/vote`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct VoteRequest {
    /// `YES` or `NO`.
    pub human_vote: String,
}

/// Body of `POST /api/sessions/{id}/mission`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MissionRequest {
    /// `SUCCESS` or `FAIL`; required only from an evil team member.
    pub human_card: Option<String>,
}

/// Body of `POST /api/sessions/{id}/assassinate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AssassinateRequest {
    /// Target id; only when the human is the assassin.
    pub target_id: Option<ParticipantId>,
}

/// Response carrying only the human's view.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewResponse {
    /// The human's view.
    pub public_view: PublicView,
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// `validation`, `gateway` or `invariant`.
    pub category: String,
}

/// A [`GameError`] on its way to the client.
#[derive(Debug, derive_more::From)]
pub struct ApiError(GameError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match (&self.0, self.0.category()) {
            (GameError::SessionNotFound(_), _) => StatusCode::NOT_FOUND,
            (_, ErrorCategory::Validation) => StatusCode::BAD_REQUEST,
            (_, ErrorCategory::Gateway) => StatusCode::BAD_GATEWAY,
            (_, ErrorCategory::Invariant) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, status = %status, "Request failed");
        } else {
            warn!(error = %self.0, status = %status, "Request rejected");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            category: self.0.category().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// JSON schemas of every request and response body, keyed by type name.
pub fn api_schemas() -> BTreeMap<&'static str, Schema> {
    BTreeMap::from([
        ("StartRequest", schema_for!(StartRequest)),
        ("StartOutcome", schema_for!(StartOutcome)),
        ("SpeakRequest", schema_for!(SpeakRequest)),
        ("TeamRequest", schema_for!(TeamRequest)),
        ("TeamOutcome", schema_for!(TeamOutcome)),
        ("VoteRequest", schema_for!(VoteRequest)),
        ("VoteOutcome", schema_for!(VoteOutcome)),
        ("MissionRequest", schema_for!(MissionRequest)),
        ("MissionOutcome", schema_for!(MissionOutcome)),
        ("AssassinateRequest", schema_for!(AssassinateRequest)),
        ("AssassinationOutcome", schema_for!(AssassinationOutcome)),
        ("ViewResponse", schema_for!(ViewResponse)),
        ("ErrorBody", schema_for!(ErrorBody)),
    ])
}

fn parse_token<T: FromStr>(field: &'static str, value: &str) -> Result<T, GameError> {
    T::from_str(value.trim()).map_err(|_| GameError::InvalidToken {
        field,
        value: value.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────
//  Handlers
// ─────────────────────────────────────────────────────────────

#[instrument]
async fn get_schemas() -> Json<BTreeMap<&'static str, Schema>> {
    Json(api_schemas())
}

#[instrument(skip(state))]
async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<StartRequest>,
) -> ApiResult<StartOutcome> {
    Ok(Json(state.sessions.start(&body.human_role).await?))
}

#[instrument(skip(state))]
async fn get_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ViewResponse> {
    let handle = state.sessions.get(&id).await?;
    let session = handle.lock().await;
    Ok(Json(ViewResponse {
        public_view: session.view(),
    }))
}

#[instrument(skip(state))]
async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
async fn speak(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SpeakRequest>,
) -> ApiResult<ViewResponse> {
    let handle = state.sessions.get(&id).await?;
    let mut session = handle.lock().await;
    let public_view = session.speak(&body.text, state.gateway.as_ref()).await?;
    Ok(Json(ViewResponse { public_view }))
}

#[instrument(skip(state))]
async fn submit_team(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TeamRequest>,
) -> ApiResult<TeamOutcome> {
    let handle = state.sessions.get(&id).await?;
    let mut session = handle.lock().await;
    Ok(Json(session.submit_team(body.team)?))
}

#[instrument(skip(state))]
async fn auto_team(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TeamOutcome> {
    let handle = state.sessions.get(&id).await?;
    let mut session = handle.lock().await;
    Ok(Json(session.auto_team(state.gateway.as_ref()).await?))
}

#[instrument(skip(state))]
async fn submit_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<VoteRequest>,
) -> ApiResult<VoteOutcome> {
    let vote: Vote = parse_token("humanVote", &body.human_vote)?;
    let handle = state.sessions.get(&id).await?;
    let mut session = handle.lock().await;
    Ok(Json(session.submit_vote(vote, state.gateway.as_ref()).await?))
}

#[instrument(skip(state))]
async fn submit_mission_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MissionRequest>,
) -> ApiResult<MissionOutcome> {
    let card = body
        .human_card
        .as_deref()
        .map(|raw| parse_token::<MissionCard>("humanCard", raw))
        .transpose()?;
    let handle = state.sessions.get(&id).await?;
    let mut session = handle.lock().await;
    Ok(Json(
        session
            .submit_mission_card(card, state.gateway.as_ref())
            .await?,
    ))
}

#[instrument(skip(state))]
async fn submit_assassination(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AssassinateRequest>,
) -> ApiResult<AssassinationOutcome> {
    let handle = state.sessions.get(&id).await?;
    let mut session = handle.lock().await;
    Ok(Json(
        session
            .submit_assassination_target(body.target_id, state.gateway.as_ref())
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parsing() {
        assert_eq!(parse_token::<Vote>("humanVote", " yes ").ok(), Some(Vote::Yes));
        assert_eq!(
            parse_token::<MissionCard>("humanCard", "FAIL").ok(),
            Some(MissionCard::Fail)
        );
        assert!(matches!(
            parse_token::<Vote>("humanVote", "MAYBE"),
            Err(GameError::InvalidToken {
                field: "humanVote",
                ..
            })
        ));
    }

    #[test]
    fn test_schemas_cover_wire_bodies() {
        let schemas = api_schemas();
        assert_eq!(schemas.len(), 13);
        let view = serde_json::to_value(&schemas["ViewResponse"]).unwrap();
        assert!(view["properties"]["publicView"].is_object());
        let vote = serde_json::to_value(&schemas["VoteRequest"]).unwrap();
        assert!(vote["properties"]["humanVote"].is_object());
    }

    #[test]
    fn test_status_mapping() {
        let status = |err: GameError| ApiError(err).into_response().status();
        assert_eq!(
            status(GameError::SessionNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status(GameError::EmptySpeech), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(GameError::Invariant("broken".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(GameError::Gateway(crate::gateway::GatewayError::new(
                crate::gateway::GatewayErrorKind::Unavailable,
                "down"
            ))),
            StatusCode::BAD_GATEWAY
        );
    }
}
