//! Chat-completion client for the language models that drive automated seats.
//!
//! OpenAI and DeepSeek share the OpenAI wire format and go through
//! `async-openai`; Anthropic is called directly over `reqwest`.

use async_openai::{
    Client as OpenAIClient,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

/// Language model provider.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LlmProvider {
    /// OpenAI chat models.
    OpenAI,
    /// Anthropic Claude models.
    Anthropic,
    /// DeepSeek chat models, OpenAI-compatible.
    #[default]
    DeepSeek,
}

impl LlmProvider {
    /// Environment variable holding the API key for this provider.
    pub fn api_key_env(self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// Base URL used when none is configured.
    pub fn default_api_base(self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "https://api.openai.com/v1",
            LlmProvider::Anthropic => "https://api.anthropic.com/v1",
            LlmProvider::DeepSeek => "https://api.deepseek.com",
        }
    }
}

/// Connection settings for one provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    provider: LlmProvider,
    api_key: String,
    model: String,
    max_tokens: u32,
    api_base: String,
}

impl LlmConfig {
    /// Creates a configuration using the provider's default base URL.
    #[instrument(skip(api_key, model))]
    pub fn new(
        provider: LlmProvider,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        let model = model.into();
        debug!(model = %model, "Creating LLM config");
        Self {
            provider,
            api_key: api_key.into(),
            model,
            max_tokens,
            api_base: provider.default_api_base().to_string(),
        }
    }

    /// Overrides the base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Provider.
    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Completion token limit.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

/// Client over the configured provider. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
    openai: OpenAIClient<OpenAIConfig>,
}

impl LlmClient {
    /// Creates a client.
    #[instrument(skip(config), fields(provider = %config.provider(), api_base = %config.api_base()))]
    pub fn new(config: LlmConfig) -> Self {
        info!("Creating LLM client");
        let openai = OpenAIClient::with_config(
            OpenAIConfig::new()
                .with_api_key(config.api_key.clone())
                .with_api_base(config.api_base.clone()),
        );
        Self {
            config,
            http: reqwest::Client::new(),
            openai,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Generates a completion from a system prompt and one user message.
    #[instrument(
        skip(self, system_prompt, user_message),
        fields(provider = %self.config.provider, model = %self.config.model)
    )]
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        debug!(prompt_length = user_message.len(), "Generating completion");
        match self.config.provider {
            LlmProvider::OpenAI | LlmProvider::DeepSeek => {
                self.generate_openai_compatible(system_prompt, user_message)
                    .await
            }
            LlmProvider::Anthropic => self.generate_anthropic(system_prompt, user_message).await,
        }
    }

    #[instrument(skip(self, system_prompt, user_message))]
    async fn generate_anthropic(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        let request_body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": system_prompt,
            "messages": [
                {
                    "role": "user",
                    "content": user_message
                }
            ]
        });

        let url = format!("{}/messages", self.config.api_base.trim_end_matches('/'));
        debug!(url = %url, "Sending request to Anthropic");
        let response = self
            .http
            .post(&url)
            .header("x-api-key", self.config.api_key.as_str())
            .header("anthropic-version", "2023-06-01")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::new(format!("Anthropic request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::new(format!("Failed to read Anthropic response: {}", e)))?;

        if !status.is_success() {
            return Err(LlmError::new(format!(
                "Anthropic API error {}: {}",
                status, response_text
            )));
        }

        let response_json: serde_json::Value = serde_json::from_str(&response_text)
            .map_err(|e| LlmError::new(format!("Failed to parse Anthropic response: {}", e)))?;

        let content = response_json["content"][0]["text"]
            .as_str()
            .ok_or_else(|| LlmError::new("No text content in Anthropic response"))?
            .to_string();

        info!(content_length = content.len(), "Generated completion");
        Ok(content)
    }

    #[instrument(skip(self, system_prompt, user_message))]
    async fn generate_openai_compatible(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|e| LlmError::new(format!("Failed to build system message: {}", e)))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_message)
                    .build()
                    .map_err(|e| LlmError::new(format!("Failed to build user message: {}", e)))?,
            ),
        ];

        #[allow(deprecated)]
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(messages)
            .max_tokens(self.config.max_tokens)
            .build()
            .map_err(|e| LlmError::new(format!("Failed to build request: {}", e)))?;

        debug!("Sending chat completion request");
        let response = self
            .openai
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::new(format!("{} API error: {}", self.config.provider, e)))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::new("No content in chat completion response"))?;

        info!(content_length = content.len(), "Generated completion");
        Ok(content)
    }
}

/// LLM client error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("LLM error: {} at {}:{}", message, file, line)]
pub struct LlmError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl LlmError {
    /// Creates a new LLM error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "LLM error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
