//! Placeholder rendering utilities using Tera
//!
//! Toolset configuration may embed `{{env.NAME}}` placeholders anywhere
//! inside string values, and command prerequisites may embed
//! `{{config.KEY}}` placeholders resolved from the toolset's own config.

use regex::Regex;
use serde_json::Value;
use tera::{Context, Tera};

use crate::{Error, Result};

fn has_placeholder(s: &str) -> bool {
    // Cheap check so plain strings never hit the template engine.
    // Only env./config. references are placeholders; other brace pairs
    // (e.g. PromQL selectors) must pass through untouched.
    let re = Regex::new(r"\{\{\s*(env|config)\.").unwrap();
    re.is_match(s)
}

/// Render a single string through Tera with the given context.
///
/// Rendering is strict: a placeholder referencing a variable that is not in
/// the context fails the whole load rather than silently producing an empty
/// string.
fn render_str(template: &str, context: &Context) -> Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template("placeholder", template)
        .map_err(|e| Error::Template(format!("failed to parse '{}': {}", template, e)))?;
    tera.render("placeholder", context)
        .map_err(|e| Error::Template(format!("failed to render '{}': {}", template, e)))
}

fn env_context() -> Context {
    let vars: std::collections::HashMap<String, String> = std::env::vars().collect();
    let mut context = Context::new();
    context.insert("env", &vars);
    context
}

/// Substitute `{{env.NAME}}` placeholders in every string reachable from
/// `value`, at any nesting depth. Values without placeholders are untouched.
pub fn substitute_env(value: &mut Value) -> Result<()> {
    let context = env_context();
    substitute_value(value, &context)
}

fn substitute_value(value: &mut Value, context: &Context) -> Result<()> {
    match value {
        Value::String(s) => {
            if has_placeholder(s) {
                *s = render_str(s, context)?;
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                substitute_value(item, context)?;
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                substitute_value(v, context)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Interpolate `{{config.KEY}}` placeholders in a command template from the
/// toolset's resolved config.
pub fn interpolate_config(template: &str, config: &Value) -> Result<String> {
    if !has_placeholder(template) {
        return Ok(template.to_string());
    }
    let mut context = Context::new();
    context.insert("config", config);
    render_str(template, &context)
}
