use crate::cli::OutputFormat;
use crate::collectors::CancellationToken;
use crate::config::{load_config, load_journeys_file};
use crate::output;
use crate::pipeline::{Pipeline, RunOptions};
use crate::run::RunStatus;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub struct AnalyzeConfig {
    pub path: PathBuf,
    pub config: Option<PathBuf>,
    pub journeys: Option<PathBuf>,
    pub runs_dir: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub format: OutputFormat,
    pub top: usize,
}

/// Run the pipeline and print the result. Returns the final run status.
pub fn handle_analyze(config: AnalyzeConfig) -> Result<RunStatus> {
    let loaded = load_config(&config.path, config.config.as_deref())?;
    match &loaded.source {
        Some(path) => log::info!("Using configuration from {}", path.display()),
        None => log::info!("No configuration file found; using defaults"),
    }

    let mut settings = loaded.config;
    if let Some(path) = &config.journeys {
        let journeys = load_journeys_file(path)?;
        settings = settings.with_journeys(journeys);
    }
    if let Some(jobs) = config.jobs {
        settings.collectors.parallelism = jobs;
    }

    let options = RunOptions {
        runs_dir: config.runs_dir.clone(),
        cancel: CancellationToken::new(),
    };
    let outcome = Pipeline::new(settings)
        .run(&config.path, &options)
        .with_context(|| format!("analysis of {} failed", config.path.display()))?;

    match config.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&output::outcome_json(&outcome))?
        ),
        OutputFormat::Terminal => print!("{}", output::render_outcome(&outcome, config.top)),
    }
    Ok(outcome.status())
}
