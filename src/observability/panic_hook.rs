//! Panic hook producing a crash report on stderr.
//!
//! A panic inside a collector is caught by the orchestrator and recorded as a
//! failed collector, so the hook only logs a one-line note for those. Any
//! other panic gets the full report.

use super::context::{get_current_context, get_progress, RunContext};
use std::fmt::Write as _;
use std::panic::PanicHookInfo;
use tracing::Span;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const RULE_WIDTH: usize = 72;

pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let context = get_current_context();
        let message = payload_message(info.payload());
        if let Some(collector) = &context.collector {
            log::error!("collector {} panicked: {}", collector, message);
            return;
        }

        let location = info.location().map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
        let mut report = CrashReport::new(message, location, &context);
        report.span = Span::current().metadata().map(|m| m.name().to_string());
        eprintln!("\n{}", report.render());

        if std::env::var_os("RUST_BACKTRACE").is_some() {
            eprintln!("{}", std::backtrace::Backtrace::capture());
        }
    }));
}

/// Everything known about the process at the moment of a panic.
#[derive(Debug, Clone, PartialEq)]
struct CrashReport {
    message: String,
    location: Option<String>,
    phase: Option<String>,
    span: Option<String>,
    run_id: Option<String>,
    progress: (usize, usize),
}

impl CrashReport {
    fn new(message: String, location: Option<String>, context: &RunContext) -> Self {
        Self {
            message,
            location,
            phase: context.phase.map(|p| p.to_string()),
            span: None,
            run_id: context.run_id.clone(),
            progress: get_progress(),
        }
    }

    fn render(&self) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "riskmap {} crashed", VERSION);
        let _ = writeln!(out, "{}", rule);

        let mut field = |label: &str, value: &str| {
            let _ = writeln!(out, "{:>10}: {}", label, value);
        };
        field("panic", &self.message);
        if let Some(location) = &self.location {
            field("location", location);
        }
        field("platform", std::env::consts::OS);
        field(
            "time",
            &chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        field(
            "phase",
            self.phase.as_deref().unwrap_or("none (before the run started)"),
        );
        if let Some(span) = &self.span {
            field("span", span);
        }
        if let Some(run_id) = &self.run_id {
            field("run", run_id);
        }
        let (finished, total) = self.progress;
        if total > 0 {
            field("progress", &format!("{}/{} collectors finished", finished, total));
        }

        let _ = writeln!(out, "{}", rule);
        if let Some(run_id) = &self.run_id {
            let _ = writeln!(
                out,
                "Partial evidence is kept; inspect it with `riskmap show {}`.",
                run_id
            );
        }
        if std::env::var_os("RUST_BACKTRACE").is_none() {
            let _ = writeln!(out, "Set RUST_BACKTRACE=1 to print a backtrace.");
        }
        out
    }
}

/// Text of a panic payload (`&str` or `String`).
pub fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
