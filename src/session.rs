//! Session store.
//!
//! Sessions are addressed by id. Each one sits behind its own async mutex so
//! operations on one session are serialized while different sessions run
//! independently. Finished sessions are kept for a retention window so the
//! client can read the final state, then dropped on the next start.

use crate::error::GameError;
use crate::games::avalon::{GameSession, Knowledge, PublicView, RoleAssigner, SessionId};
use crate::gateway::FallbackPolicy;
use rand::SeedableRng;
use rand::rngs::StdRng;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

/// Handle to one session.
pub type SessionHandle = Arc<Mutex<GameSession>>;

/// Result of starting a session.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    /// Id addressing the new session.
    pub session_id: SessionId,
    /// The human's view.
    pub public_view: PublicView,
    /// The human's private knowledge.
    pub private_info: Vec<Knowledge>,
}

/// How long a finished session stays readable by default.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(600);

/// Owns every live session.
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<SessionId, SessionHandle>>>,
    next_id: Arc<AtomicU64>,
    policy: FallbackPolicy,
    seed: Option<u64>,
    retention: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(FallbackPolicy::default(), None)
    }
}

impl SessionManager {
    /// Creates an empty manager.
    ///
    /// With a seed, session `n` draws its randomness from `seed + n`.
    #[instrument]
    pub fn new(policy: FallbackPolicy, seed: Option<u64>) -> Self {
        info!("Creating session manager");
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            policy,
            seed,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Sets how long finished sessions are kept.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Starts a session with the human playing `human_role`.
    #[instrument(skip(self))]
    pub async fn start(&self, human_role: &str) -> Result<StartOutcome, GameError> {
        let role = RoleAssigner::parse_role(human_role)?;
        self.prune_finished().await;
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = format!("avalon-{}", n);
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n)),
            None => StdRng::from_entropy(),
        };

        let session = GameSession::start(id.clone(), role, self.policy, rng);
        let outcome = StartOutcome {
            session_id: id.clone(),
            public_view: session.view(),
            private_info: session.human_knowledge().to_vec(),
        };

        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        info!(session_id = %id, "Session registered");
        Ok(outcome)
    }

    /// Returns the handle of a session.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<SessionHandle, GameError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| {
                warn!(session_id = id, "Session not found");
                GameError::SessionNotFound(id.to_string())
            })
    }

    /// Drops a session.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<(), GameError> {
        match self.sessions.write().await.remove(id) {
            Some(_) => {
                info!(session_id = id, "Session removed");
                Ok(())
            }
            None => Err(GameError::SessionNotFound(id.to_string())),
        }
    }

    /// Drops sessions that finished longer ago than the retention window.
    ///
    /// Sessions locked by a request in flight are skipped. Returns how many
    /// were dropped.
    #[instrument(skip(self))]
    pub async fn prune_finished(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => !session
                .finished_at()
                .is_some_and(|at| at.elapsed() >= self.retention),
            Err(_) => true,
        });
        let dropped = before - sessions.len();
        if dropped > 0 {
            info!(dropped, remaining = sessions.len(), "Pruned finished sessions");
        }
        dropped
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// True when no session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
