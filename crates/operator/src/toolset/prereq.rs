//! Prerequisite Checker
//!
//! Evaluates a toolset's ordered prerequisite list into a terminal status
//! for the run: `unknown -> enabled | disabled | failed`. Checks run
//! strictly sequentially per toolset so failure attribution stays
//! unambiguous.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Toolset, ToolsetStatus};
use crate::metrics::PREREQ_FAILURES_TOTAL;
use crate::template;

/// Injected health-check function. Receives the toolset's resolved config;
/// an `Err` is converted to a failed check at this boundary and never
/// propagates further.
pub type CallableCheck = Arc<dyn Fn(&Value) -> anyhow::Result<CheckOutcome> + Send + Sync>;

/// Result of evaluating a single prerequisite.
///
/// A passing outcome may still carry a reason: checks spanning several
/// independent sub-resources (e.g. a list of clusters) report partial
/// failures without failing the check outright. Those reasons are kept and
/// concatenated into the toolset error if a later prerequisite fails hard.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub ok: bool,
    pub reason: Option<String>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn pass_with(reason: impl Into<String>) -> Self {
        Self { ok: true, reason: Some(reason.into()) }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self { ok: false, reason: Some(reason.into()) }
    }
}

const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

/// Closed set of prerequisite variants.
///
/// `Callable` is only ever constructed in code (builtin definitions, MCP
/// probes, tests) and never round-trips through YAML.
#[derive(Clone)]
pub enum Prerequisite {
    /// Fixed verdict, useful for feature-flagged definitions.
    Static {
        enabled: bool,
        reason: Option<String>,
    },
    /// Named variables must be present in the process environment.
    Env { env: Vec<String> },
    /// Read-only subprocess with a bounded timeout. `{{config.*}}`
    /// placeholders are interpolated from the toolset's resolved config
    /// before execution.
    Command {
        command: String,
        expected_output: Option<String>,
        timeout_seconds: u64,
    },
    /// Injected function over the resolved config.
    Callable {
        description: String,
        check: CallableCheck,
    },
}

impl fmt::Debug for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prerequisite::Static { enabled, reason } => f
                .debug_struct("Static")
                .field("enabled", enabled)
                .field("reason", reason)
                .finish(),
            Prerequisite::Env { env } => f.debug_struct("Env").field("env", env).finish(),
            Prerequisite::Command {
                command,
                expected_output,
                timeout_seconds,
            } => f
                .debug_struct("Command")
                .field("command", command)
                .field("expected_output", expected_output)
                .field("timeout_seconds", timeout_seconds)
                .finish(),
            Prerequisite::Callable { description, .. } => f
                .debug_struct("Callable")
                .field("description", description)
                .finish(),
        }
    }
}

impl Prerequisite {
    pub fn callable(
        description: impl Into<String>,
        check: impl Fn(&Value) -> anyhow::Result<CheckOutcome> + Send + Sync + 'static,
    ) -> Self {
        Prerequisite::Callable {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    pub fn command(command: impl Into<String>) -> Self {
        Prerequisite::Command {
            command: command.into(),
            expected_output: None,
            timeout_seconds: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }

    pub fn command_expecting(command: impl Into<String>, expected: impl Into<String>) -> Self {
        Prerequisite::Command {
            command: command.into(),
            expected_output: Some(expected.into()),
            timeout_seconds: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }

    pub fn env(vars: Vec<String>) -> Self {
        Prerequisite::Env { env: vars }
    }
}

/// Deserializable subset of [`Prerequisite`], as written in custom toolset
/// files. The variants are discriminated by their required field.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PrerequisiteSpec {
    Command {
        command: String,
        #[serde(default)]
        expected_output: Option<String>,
        #[serde(default = "default_command_timeout")]
        timeout_seconds: u64,
    },
    Env { env: Vec<String> },
    Static {
        enabled: bool,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl From<PrerequisiteSpec> for Prerequisite {
    fn from(spec: PrerequisiteSpec) -> Self {
        match spec {
            PrerequisiteSpec::Command {
                command,
                expected_output,
                timeout_seconds,
            } => Prerequisite::Command {
                command,
                expected_output,
                timeout_seconds,
            },
            PrerequisiteSpec::Env { env } => Prerequisite::Env { env },
            PrerequisiteSpec::Static { enabled, reason } => {
                Prerequisite::Static { enabled, reason }
            }
        }
    }
}

/// Run the prerequisite state machine for one toolset.
///
/// A toolset whose resolved `enabled` is false is marked `disabled` without
/// running any checks. Otherwise prerequisites are evaluated in order; the
/// first hard failure stops evaluation and records the concatenation of
/// every failure reason observed so far. Success clears any previous error.
pub async fn check_toolset(toolset: &mut Toolset, default_enabled: bool) {
    if !toolset.resolved_enabled(default_enabled) {
        toolset.status = ToolsetStatus::Disabled;
        toolset.error = None;
        return;
    }

    let prerequisites = toolset.prerequisites.clone();
    let mut reasons: Vec<String> = Vec::new();

    for prerequisite in &prerequisites {
        let outcome = evaluate(prerequisite, &toolset.config).await;
        if let Some(reason) = &outcome.reason {
            reasons.push(reason.clone());
        }
        if !outcome.ok {
            PREREQ_FAILURES_TOTAL.inc();
            toolset.status = ToolsetStatus::Failed;
            toolset.error = Some(reasons.join("; "));
            warn!(
                toolset = %toolset.name,
                error = %toolset.error.as_deref().unwrap_or_default(),
                "prerequisite check failed"
            );
            return;
        }
    }

    debug!(toolset = %toolset.name, "prerequisites satisfied");
    toolset.status = ToolsetStatus::Enabled;
    toolset.error = None;
}

async fn evaluate(prerequisite: &Prerequisite, config: &Value) -> CheckOutcome {
    match prerequisite {
        Prerequisite::Static { enabled, reason } => CheckOutcome {
            ok: *enabled,
            reason: reason.clone(),
        },
        Prerequisite::Env { env } => {
            let missing: Vec<&str> = env
                .iter()
                .filter(|var| std::env::var(var.as_str()).is_err())
                .map(|var| var.as_str())
                .collect();
            if missing.is_empty() {
                CheckOutcome::pass()
            } else {
                CheckOutcome::fail(format!(
                    "missing environment variables: {}",
                    missing.join(", ")
                ))
            }
        }
        Prerequisite::Command {
            command,
            expected_output,
            timeout_seconds,
        } => run_command(command, expected_output.as_deref(), *timeout_seconds, config).await,
        Prerequisite::Callable { description, check } => match check(config) {
            Ok(outcome) => outcome,
            Err(e) => CheckOutcome::fail(format!("{}: {}", description, e)),
        },
    }
}

async fn run_command(
    command: &str,
    expected_output: Option<&str>,
    timeout_seconds: u64,
    config: &Value,
) -> CheckOutcome {
    let rendered = match template::interpolate_config(command, config) {
        Ok(rendered) => rendered,
        Err(e) => return CheckOutcome::fail(format!("command '{}': {}", command, e)),
    };

    let timeout = std::time::Duration::from_secs(timeout_seconds);
    let output = tokio::time::timeout(
        timeout,
        tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&rendered)
            .output(),
    )
    .await;

    match output {
        Err(_) => CheckOutcome::fail(format!(
            "command '{}' timed out after {}s",
            rendered, timeout_seconds
        )),
        Ok(Err(e)) => CheckOutcome::fail(format!("command '{}' failed to start: {}", rendered, e)),
        Ok(Ok(output)) => {
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return CheckOutcome::fail(format!(
                    "command '{}' exited with {}: {}",
                    rendered,
                    output.status,
                    stderr.trim()
                ));
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            match expected_output {
                Some(fragment) if !stdout.contains(fragment) => CheckOutcome::fail(format!(
                    "command '{}' output did not contain '{}'",
                    rendered, fragment
                )),
                _ => CheckOutcome::pass(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolset::{ToolsetKind, ToolsetStatus};
    use serde_json::json;

    fn toolset_with(prerequisites: Vec<Prerequisite>) -> Toolset {
        Toolset::new("test", "test toolset", ToolsetKind::Builtin)
            .with_prerequisites(prerequisites)
    }

    #[tokio::test]
    async fn test_disabled_toolset_skips_checks() {
        // A failing callable proves the checks never ran.
        let mut toolset = toolset_with(vec![Prerequisite::callable("boom", |_| {
            panic!("must not be called")
        })])
        .with_enabled(false);
        check_toolset(&mut toolset, true).await;
        assert_eq!(toolset.status, ToolsetStatus::Disabled);
        assert!(toolset.error.is_none());
    }

    #[tokio::test]
    async fn test_default_enabled_false_disables() {
        let mut toolset = toolset_with(vec![]);
        check_toolset(&mut toolset, false).await;
        assert_eq!(toolset.status, ToolsetStatus::Disabled);
    }

    #[tokio::test]
    async fn test_empty_prerequisites_enable() {
        let mut toolset = toolset_with(vec![]);
        check_toolset(&mut toolset, true).await;
        assert_eq!(toolset.status, ToolsetStatus::Enabled);
    }

    #[tokio::test]
    async fn test_static_false_fails_with_reason() {
        let mut toolset = toolset_with(vec![Prerequisite::Static {
            enabled: false,
            reason: Some("disabled by rollout flag".to_string()),
        }]);
        check_toolset(&mut toolset, true).await;
        assert_eq!(toolset.status, ToolsetStatus::Failed);
        assert_eq!(toolset.error.as_deref(), Some("disabled by rollout flag"));
    }

    #[tokio::test]
    async fn test_env_prerequisite() {
        std::env::set_var("SLEUTH_PREREQ_PRESENT", "1");
        let mut toolset = toolset_with(vec![Prerequisite::env(vec![
            "SLEUTH_PREREQ_PRESENT".to_string(),
            "SLEUTH_PREREQ_ABSENT_ONE".to_string(),
            "SLEUTH_PREREQ_ABSENT_TWO".to_string(),
        ])]);
        check_toolset(&mut toolset, true).await;
        assert_eq!(toolset.status, ToolsetStatus::Failed);
        let error = toolset.error.unwrap();
        assert!(error.contains("SLEUTH_PREREQ_ABSENT_ONE"));
        assert!(error.contains("SLEUTH_PREREQ_ABSENT_TWO"));
        assert!(!error.contains("SLEUTH_PREREQ_PRESENT,"));
    }

    #[tokio::test]
    async fn test_command_with_config_interpolation() {
        let mut toolset = toolset_with(vec![Prerequisite::command_expecting(
            "echo {{config.greeting}}",
            "hello",
        )])
        .with_config(json!({ "greeting": "hello world" }));
        check_toolset(&mut toolset, true).await;
        assert_eq!(toolset.status, ToolsetStatus::Enabled);
    }

    #[tokio::test]
    async fn test_command_unexpected_output_fails() {
        let mut toolset = toolset_with(vec![Prerequisite::command_expecting(
            "echo goodbye",
            "hello",
        )]);
        check_toolset(&mut toolset, true).await;
        assert_eq!(toolset.status, ToolsetStatus::Failed);
        assert!(toolset.error.unwrap().contains("did not contain"));
    }

    #[tokio::test]
    async fn test_command_nonzero_exit_fails() {
        let mut toolset = toolset_with(vec![Prerequisite::command("exit 3")]);
        check_toolset(&mut toolset, true).await;
        assert_eq!(toolset.status, ToolsetStatus::Failed);
    }

    #[tokio::test]
    async fn test_callable_error_is_contained() {
        let mut toolset = toolset_with(vec![Prerequisite::callable("rabbitmq api", |_| {
            anyhow::bail!("connection refused")
        })]);
        check_toolset(&mut toolset, true).await;
        assert_eq!(toolset.status, ToolsetStatus::Failed);
        assert_eq!(
            toolset.error.as_deref(),
            Some("rabbitmq api: connection refused")
        );
    }

    #[tokio::test]
    async fn test_failure_concatenates_all_reasons_seen() {
        // A passing check over several clusters reports a partial failure;
        // the later hard failure must carry both reasons.
        let mut toolset = toolset_with(vec![
            Prerequisite::callable("cluster sweep", |_| {
                Ok(CheckOutcome::pass_with("cluster-b: unreachable"))
            }),
            Prerequisite::callable("primary cluster", |_| {
                Ok(CheckOutcome::fail("cluster-a: auth rejected"))
            }),
        ]);
        check_toolset(&mut toolset, true).await;
        assert_eq!(toolset.status, ToolsetStatus::Failed);
        assert_eq!(
            toolset.error.as_deref(),
            Some("cluster-b: unreachable; cluster-a: auth rejected")
        );
    }

    #[tokio::test]
    async fn test_first_failure_stops_evaluation() {
        let mut toolset = toolset_with(vec![
            Prerequisite::callable("first", |_| Ok(CheckOutcome::fail("first failed"))),
            Prerequisite::callable("second", |_| panic!("must not be evaluated")),
        ]);
        check_toolset(&mut toolset, true).await;
        assert_eq!(toolset.status, ToolsetStatus::Failed);
        assert_eq!(toolset.error.as_deref(), Some("first failed"));
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let mut toolset = toolset_with(vec![]);
        toolset.status = ToolsetStatus::Failed;
        toolset.error = Some("stale failure from a previous run".to_string());
        check_toolset(&mut toolset, true).await;
        assert_eq!(toolset.status, ToolsetStatus::Enabled);
        assert!(toolset.error.is_none());
    }

    #[test]
    fn test_prerequisite_spec_deserialization() {
        let specs: Vec<PrerequisiteSpec> = serde_yaml::from_str(
            r#"
- command: "kubectl version --client"
  expected_output: "Client Version"
- env: ["PROMETHEUS_URL"]
- enabled: false
  reason: "not shipped yet"
"#,
        )
        .unwrap();
        assert!(matches!(specs[0], PrerequisiteSpec::Command { .. }));
        assert!(matches!(specs[1], PrerequisiteSpec::Env { .. }));
        assert!(matches!(
            specs[2],
            PrerequisiteSpec::Static { enabled: false, .. }
        ));
    }
}
