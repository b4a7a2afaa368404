//! LLM Provider Abstraction
//!
//! Unified prompt interface over Rig's providers. The toolset core only
//! needs this seam for the summarization transformer; the investigation
//! loop itself lives outside this crate.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use rig::completion::Prompt;
use rig::providers::{anthropic, openai};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-3-haiku".to_string(),
            api_key: None,
        }
    }
}

impl LlmConfig {
    /// Same credentials, different model, used when a transformer selects
    /// its own fast model.
    pub fn for_model(&self, model: &str) -> Self {
        Self {
            provider: self.provider.clone(),
            model: model.to_string(),
            api_key: self.api_key.clone(),
        }
    }
}

/// Trait for LLM providers that can handle prompts
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a prompt to the LLM and get a response
    async fn prompt(&self, prompt: &str) -> Result<String>;
}

/// Anthropic Claude provider using Rig
pub struct AnthropicProvider {
    client: anthropic::Client,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<String>, model: &str) -> Result<Self> {
        let client = if let Some(key) = api_key {
            anthropic::Client::new(
                &key,
                "https://api.anthropic.com",
                None,
                anthropic::ANTHROPIC_VERSION_LATEST,
            )
        } else {
            // Reads ANTHROPIC_API_KEY
            anthropic::Client::from_env()
        };
        Ok(Self {
            client,
            model: model.to_string(),
        })
    }

    fn model_id(&self) -> &'static str {
        match self.model.as_str() {
            "claude-3-5-sonnet" | "claude-3-5-sonnet-20241022" => anthropic::CLAUDE_3_5_SONNET,
            "claude-3-opus" | "claude-3-opus-20240229" => anthropic::CLAUDE_3_OPUS,
            "claude-3-sonnet" | "claude-3-sonnet-20240229" => anthropic::CLAUDE_3_SONNET,
            // Summarization defaults to the cheapest tier.
            _ => anthropic::CLAUDE_3_HAIKU,
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn prompt(&self, prompt: &str) -> Result<String> {
        let agent = self.client.agent(self.model_id()).build();
        agent
            .prompt(prompt)
            .await
            .map_err(|e| anyhow::anyhow!("Anthropic API error: {:?}", e))
    }
}

/// OpenAI provider using Rig
pub struct OpenAiProvider {
    client: openai::Client,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>, model: &str) -> Result<Self> {
        let client = if let Some(key) = api_key {
            openai::Client::new(&key)
        } else {
            // Reads OPENAI_API_KEY
            openai::Client::from_env()
        };
        Ok(Self {
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn prompt(&self, prompt: &str) -> Result<String> {
        let agent = self.client.agent(&self.model).build();
        agent
            .prompt(prompt)
            .await
            .map_err(|e| anyhow::anyhow!("OpenAI API error: {:?}", e))
    }
}

/// Mock provider for tests: echoes a short digest of the prompt so
/// assertions can tell transformed output from raw output.
pub struct MockProvider;

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn prompt(&self, prompt: &str) -> Result<String> {
        let digest: String = prompt.chars().take(48).collect();
        Ok(format!("[summary] {}", digest))
    }
}

/// Create a provider from configuration
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "anthropic" | "claude" => Ok(Arc::new(AnthropicProvider::new(
            config.api_key.clone(),
            &config.model,
        )?)),
        "openai" => Ok(Arc::new(OpenAiProvider::new(
            config.api_key.clone(),
            &config.model,
        )?)),
        "mock" => Ok(Arc::new(MockProvider)),
        other => Err(anyhow::anyhow!("unknown LLM provider '{}'", other)),
    }
}
