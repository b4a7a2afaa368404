//! LLM Summarization Transformer
//!
//! Compresses oversized tool output through a cheap "fast" model before it
//! reaches the investigation context. The model is chosen per instance:
//! an explicit `fast_model` parameter wins, otherwise the operator-wide
//! fallback injected as `global_fast_model`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{Transformer, LLM_SUMMARIZE};
use crate::llm::{create_provider, LlmConfig, LlmProvider};

const DEFAULT_INPUT_THRESHOLD: usize = 1000;

const DEFAULT_PROMPT: &str = "Summarize the following tool output for an on-call engineer \
investigating an incident. Preserve resource names, error messages, timestamps and counts \
exactly; drop boilerplate.";

fn default_input_threshold() -> usize {
    DEFAULT_INPUT_THRESHOLD
}

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default = "default_input_threshold")]
    input_threshold: usize,
    #[serde(default)]
    fast_model: Option<String>,
    #[serde(default)]
    global_fast_model: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

pub struct LlmSummarize {
    config: LlmConfig,
    /// `None` when neither `fast_model` nor the injected fallback is set:
    /// the instance then reports itself not applicable.
    model: Option<String>,
    input_threshold: usize,
    prompt: String,
    // The underlying client is built on first use so that resolving a tool
    // never touches provider credentials.
    provider: OnceCell<Arc<dyn LlmProvider>>,
}

impl LlmSummarize {
    pub fn from_params(params: &Value, llm_config: &LlmConfig) -> anyhow::Result<Self> {
        let params: Params = serde_json::from_value(params.clone())?;
        let model = params.fast_model.or(params.global_fast_model);
        if model.is_none() {
            debug!("llm_summarize has no fast model configured and will not run");
        }
        Ok(Self {
            config: llm_config.clone(),
            model,
            input_threshold: params.input_threshold,
            prompt: params.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            provider: OnceCell::new(),
        })
    }

    async fn provider(&self, model: &str) -> anyhow::Result<&Arc<dyn LlmProvider>> {
        self.provider
            .get_or_try_init(|| async { create_provider(&self.config.for_model(model)) })
            .await
    }
}

#[async_trait]
impl Transformer for LlmSummarize {
    fn name(&self) -> &str {
        LLM_SUMMARIZE
    }

    fn applies(&self, output: &str) -> bool {
        self.model.is_some() && output.len() > self.input_threshold
    }

    async fn transform(&self, output: &str) -> anyhow::Result<String> {
        let model = self
            .model
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no fast model configured"))?;
        let provider = self.provider(model).await?;
        let prompt = format!("{}\n\n{}", self.prompt, output);
        let summary = provider.prompt(&prompt).await?;
        debug!(
            model = %model,
            input_chars = output.len(),
            output_chars = summary.len(),
            "summarized tool output"
        );
        Ok(summary)
    }
}
