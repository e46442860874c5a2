//! Server configuration loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! API keys never live in the file; they come from the environment.

use crate::gateway::{CardFallback, FallbackPolicy, VoteFallback};
use crate::llm_client::{LlmConfig, LlmProvider};
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct AvalonConfig {
    /// HTTP listener settings.
    server: ServerSection,
    /// Language model settings.
    llm: LlmSection,
    /// Handling of unreadable gateway replies.
    policy: PolicySection,
    /// Seed for role assignment and fallbacks. Random when absent.
    seed: Option<u64>,
}

/// `[server]` table.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Bind address.
    host: String,
    /// Bind port.
    port: u16,
    /// Seconds a finished session stays readable.
    session_retention_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_retention_secs: default_session_retention_secs(),
        }
    }
}

/// `[llm]` table.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Provider.
    provider: LlmProvider,
    /// Model name.
    model: String,
    /// Completion token limit.
    max_tokens: u32,
    /// Base URL override.
    api_base: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            api_base: None,
        }
    }
}

/// `[policy]` table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    /// Unreadable vote handling.
    vote_fallback: VoteFallback,
    /// Unreadable evil card handling.
    card_fallback: CardFallback,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_session_retention_secs() -> u64 {
    600
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_max_tokens() -> u32 {
    300
}

impl AvalonConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        info!(
            provider = %config.llm.provider,
            model = %config.llm.model,
            port = config.server.port,
            "Config loaded"
        );
        Ok(config)
    }

    /// Replaces the listener address, keeping anything not given.
    pub fn with_listener(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// How long a finished session is kept.
    pub fn session_retention(&self) -> Duration {
        Duration::from_secs(self.server.session_retention_secs)
    }

    /// Fallback policy for gateway replies.
    pub fn fallback_policy(&self) -> FallbackPolicy {
        FallbackPolicy {
            vote: self.policy.vote_fallback,
            card: self.policy.card_fallback,
        }
    }

    /// Builds the LLM configuration, reading the provider's API key from the
    /// environment.
    #[instrument(skip(self), fields(provider = %self.llm.provider, model = %self.llm.model))]
    pub fn create_llm_config(&self) -> Result<LlmConfig, ConfigError> {
        let env = self.llm.provider.api_key_env();
        let api_key = std::env::var(env)
            .map_err(|_| ConfigError::new(format!("{} environment variable not set", env)))?;

        let config = LlmConfig::new(
            self.llm.provider,
            api_key,
            self.llm.model.clone(),
            self.llm.max_tokens,
        );
        Ok(match &self.llm.api_base {
            Some(base) => config.with_api_base(base.clone()),
            None => config,
        })
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
