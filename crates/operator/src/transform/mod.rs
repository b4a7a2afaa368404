//! Transformer Pipeline
//!
//! Resolves, instantiates, caches and chains output transformers per tool.
//! Raw tool output flows through the chain before it reaches the LLM; a
//! transformer failure falls back to the untransformed text and never turns
//! a successful tool call into an error.

pub mod llm_summarize;

pub use llm_summarize::LlmSummarize;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::llm::LlmConfig;
use crate::metrics::{TRANSFORMS_APPLIED_TOTAL, TRANSFORM_FAILURES_TOTAL};
use crate::toolset::{Tool, Toolset, ToolsetRegistry, TransformerSpec};

pub const LLM_SUMMARIZE: &str = "llm_summarize";
pub const PARAM_FAST_MODEL: &str = "fast_model";
pub const PARAM_GLOBAL_FAST_MODEL: &str = "global_fast_model";

/// Pluggable post-processing step applied to a tool's raw output.
#[async_trait]
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this instance should run for the given output (e.g. length
    /// above a threshold). Checked before every `transform` call.
    fn applies(&self, output: &str) -> bool;

    async fn transform(&self, output: &str) -> anyhow::Result<String>;
}

type TransformerFactory =
    Arc<dyn Fn(&Value) -> anyhow::Result<Arc<dyn Transformer>> + Send + Sync>;

/// Name-keyed factory table for declared transformers.
pub struct TransformerRegistry {
    factories: HashMap<String, TransformerFactory>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the bundled transformers.
    pub fn with_defaults(llm_config: LlmConfig) -> Self {
        let mut registry = Self::new();
        registry.register(LLM_SUMMARIZE, move |params| {
            let transformer = LlmSummarize::from_params(params, &llm_config)?;
            Ok(Arc::new(transformer) as Arc<dyn Transformer>)
        });
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Value) -> anyhow::Result<Arc<dyn Transformer>> + Send + Sync + 'static,
    ) {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Instantiate one declared transformer. Unknown names and bad
    /// parameters drop the spec with a warning, never fatal.
    pub fn instantiate(&self, spec: &TransformerSpec) -> Option<Arc<dyn Transformer>> {
        match self.factories.get(&spec.name) {
            None => {
                warn!(transformer = %spec.name, "unknown transformer, dropping");
                None
            }
            Some(factory) => match factory(&spec.config) {
                Ok(transformer) => Some(transformer),
                Err(e) => {
                    warn!(transformer = %spec.name, error = %e,
                        "failed to instantiate transformer, dropping");
                    None
                }
            },
        }
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Declarative resolution for one tool: a tool-level list wins, with each
/// named spec's parameters key-merged against a same-named toolset-level
/// spec (tool keys win, toolset keys fill gaps); otherwise the toolset-level
/// list is inherited verbatim.
pub fn resolve_specs(tool: &Tool, toolset: &Toolset) -> Vec<TransformerSpec> {
    match &tool.transformers {
        None => toolset.transformers.clone().unwrap_or_default(),
        Some(tool_specs) => tool_specs
            .iter()
            .map(|spec| {
                let inherited = toolset
                    .transformers
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .find(|t| t.name == spec.name);
                match inherited {
                    Some(base) => TransformerSpec {
                        name: spec.name.clone(),
                        config: merge_params(&spec.config, &base.config),
                    },
                    None => spec.clone(),
                }
            })
            .collect(),
    }
}

fn merge_params(tool_level: &Value, toolset_level: &Value) -> Value {
    match (tool_level, toolset_level) {
        (Value::Object(tool_map), Value::Object(toolset_map)) => {
            let mut merged = toolset_map.clone();
            for (key, value) in tool_map {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => tool_level.clone(),
    }
}

/// Second construction phase of a tool: the declarative value plus its
/// instantiated transformer chain, built exactly once and reused for every
/// invocation.
pub struct ResolvedTool {
    pub tool: Tool,
    pub toolset_name: String,
    transformers: Vec<Arc<dyn Transformer>>,
}

impl ResolvedTool {
    pub fn resolve(tool: &Tool, toolset: &Toolset, registry: &TransformerRegistry) -> Self {
        let transformers = resolve_specs(tool, toolset)
            .iter()
            .filter_map(|spec| registry.instantiate(spec))
            .collect();
        Self {
            tool: tool.clone(),
            toolset_name: toolset.name.clone(),
            transformers,
        }
    }

    pub fn transformer_names(&self) -> Vec<&str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    /// Run raw tool output through the cached chain in declared order.
    /// A failing step is logged and skipped; the pipeline continues with
    /// the prior text.
    pub async fn post_process(&self, raw: String) -> String {
        let mut current = raw;
        for transformer in &self.transformers {
            if !transformer.applies(&current) {
                continue;
            }
            match transformer.transform(&current).await {
                Ok(next) => {
                    TRANSFORMS_APPLIED_TOTAL.inc();
                    debug!(
                        tool = %self.tool.name,
                        transformer = %transformer.name(),
                        "applied output transformer"
                    );
                    current = next;
                }
                Err(e) => {
                    TRANSFORM_FAILURES_TOTAL.inc();
                    warn!(
                        tool = %self.tool.name,
                        transformer = %transformer.name(),
                        error = %e,
                        "transformer failed, keeping previous output"
                    );
                }
            }
        }
        current
    }
}

/// Fast-model injection: a post-pass over the fully resolved registry that
/// writes the global fallback model into every `llm_summarize` spec lacking
/// its own explicit model. Specs that opted into a model are untouched.
pub fn inject_fast_model(registry: &mut ToolsetRegistry, fallback_model: &str) {
    for toolset in registry.values_mut() {
        if let Some(specs) = toolset.transformers.as_mut() {
            for spec in specs.iter_mut() {
                inject_spec(spec, fallback_model);
            }
        }
        for tool in toolset.tools.iter_mut() {
            if let Some(specs) = tool.transformers.as_mut() {
                for spec in specs.iter_mut() {
                    inject_spec(spec, fallback_model);
                }
            }
        }
    }
}

fn inject_spec(spec: &mut TransformerSpec, fallback_model: &str) {
    if spec.name != LLM_SUMMARIZE {
        return;
    }
    if let Value::Object(params) = &mut spec.config {
        if !params.contains_key(PARAM_FAST_MODEL) {
            params.insert(
                PARAM_GLOBAL_FAST_MODEL.to_string(),
                Value::String(fallback_model.to_string()),
            );
        }
    }
}
