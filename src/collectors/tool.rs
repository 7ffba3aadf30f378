//! Shared driver for collectors that wrap an external analyzer binary.

use super::process::{detect_version, resolve_executable, run_process, ProcessOutcome, ProcessSpec};
use super::{Artifact, Collector, CollectorContext, CollectorResult, CollectorStatus};
use crate::errors::{Error, Result};
use crate::evidence::EvidenceDraft;
use std::time::{Duration, Instant};

/// An analyzer invoked as a subprocess.
///
/// Implementors describe the command line and how to parse its output; the
/// blanket [`Collector`] impl handles resolution, timeouts, artifacts and
/// status mapping.
pub trait ExternalTool: Send + Sync {
    /// Collector name as it appears in config and the manifest
    fn tool_name(&self) -> &'static str;

    /// Default executable name looked up on `PATH`
    fn executable(&self) -> &'static str;

    fn default_timeout(&self) -> Duration;

    /// Extension of the stdout artifact
    fn artifact_extension(&self) -> &'static str {
        "json"
    }

    /// Arguments for this run. Returning [`Error::ToolUnavailable`] skips the
    /// tool, e.g. when there is nothing for it to analyze.
    fn args(&self, ctx: &CollectorContext) -> Result<Vec<String>>;

    /// Exit codes that still mean a report was produced. Most analyzers exit
    /// non-zero when they find something.
    fn accepts_exit(&self, code: i32) -> bool {
        code == 0 || code == 1
    }

    fn parse(&self, stdout: &str, ctx: &CollectorContext) -> Result<Vec<EvidenceDraft>>;
}

impl<T: ExternalTool> Collector for T {
    fn name(&self) -> &str {
        self.tool_name()
    }

    fn run(&self, ctx: &CollectorContext) -> CollectorResult {
        let started = Instant::now();
        let mut result = run_tool(self, ctx);
        result.duration = started.elapsed();
        result
    }
}

fn run_tool<T: ExternalTool + ?Sized>(tool: &T, ctx: &CollectorContext) -> CollectorResult {
    let name = tool.tool_name();
    let executable = ctx.config.executable_for(name, tool.executable());

    let program = match resolve_executable(name, executable) {
        Ok(program) => program,
        Err(e) => {
            log::info!("{}: {}", name, e);
            return CollectorResult::not_found(name, e.to_string());
        }
    };

    let mut args = match tool.args(ctx) {
        Ok(args) => args,
        Err(e) => {
            log::info!("{}: {}", name, e);
            return CollectorResult::not_found(name, e.to_string());
        }
    };
    args.extend(ctx.config.extra_args(name).iter().cloned());

    let version = detect_version(&program, &ctx.target);
    let spec = ProcessSpec {
        program,
        args,
        cwd: ctx.target.clone(),
        timeout: ctx
            .config
            .timeout_for(name, Some(tool.default_timeout())),
    };
    log::info!("Running {}: {}", name, spec.display_command());

    let outcome = match run_process(&spec, &ctx.cancel) {
        Ok(outcome) => outcome,
        Err(e @ Error::ToolUnavailable { .. }) => {
            return CollectorResult::not_found(name, e.to_string()).with_version(version);
        }
        Err(e) => {
            return CollectorResult::new(name, CollectorStatus::Failed)
                .with_message(format!("failed to start: {}", e))
                .with_version(version);
        }
    };

    let stdout_artifact = format!("{}.{}", name, tool.artifact_extension());
    let stderr_artifact = format!("{}.stderr.log", name);
    let with_output = |mut result: CollectorResult, output: &super::process::ProcessOutput| {
        result.exit_code = output.exit_code;
        result.version = version.clone();
        if !output.stdout.is_empty() {
            result = result.with_artifact(Artifact::new(&stdout_artifact, output.stdout.clone()));
        }
        if !output.stderr.is_empty() {
            result = result.with_artifact(Artifact::new(&stderr_artifact, output.stderr.clone()));
        }
        result
    };

    match outcome {
        ProcessOutcome::TimedOut(output) => {
            let message = Error::ToolTimeout {
                tool: name.to_string(),
                seconds: spec.timeout.as_secs(),
            }
            .to_string();
            with_output(CollectorResult::new(name, CollectorStatus::Timeout), &output)
                .with_message(message)
        }
        ProcessOutcome::Cancelled(output) => {
            with_output(CollectorResult::cancelled(name), &output)
        }
        ProcessOutcome::Completed(output) => {
            let accepted = output.exit_code.is_some_and(|code| tool.accepts_exit(code));
            if !accepted {
                let stderr = output.stderr_text();
                let detail = stderr.trim().lines().last().unwrap_or("no stderr output");
                let message = format!(
                    "{} exited with {}: {}",
                    name,
                    output
                        .exit_code
                        .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    detail
                );
                return with_output(CollectorResult::new(name, CollectorStatus::Failed), &output)
                    .with_message(message);
            }

            match tool.parse(&output.stdout_text(), ctx) {
                Ok(drafts) => {
                    log::debug!("{} produced {} records", name, drafts.len());
                    with_output(CollectorResult::ok(name, drafts), &output)
                }
                Err(e) => {
                    log::warn!("{}", e);
                    with_output(CollectorResult::new(name, CollectorStatus::ParseError), &output)
                        .with_message(e.to_string())
                }
            }
        }
    }
}

/// Shorthand for a parse failure attributed to `tool`.
pub(crate) fn parse_error(tool: &str, message: impl std::fmt::Display) -> Error {
    Error::Parse {
        tool: tool.to_string(),
        message: message.to_string(),
    }
}
