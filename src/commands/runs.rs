use crate::cli::OutputFormat;
use crate::output;
use crate::run::RunManager;
use anyhow::Result;
use std::path::Path;

pub fn list_runs(runs_dir: Option<&Path>, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let manager = RunManager::new(RunManager::resolve_base_dir(runs_dir)?);
    let mut runs = manager.list_runs()?;
    if let Some(limit) = limit {
        runs.truncate(limit);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&runs)?),
        OutputFormat::Terminal => println!("{}", output::render_runs(&runs)),
    }
    Ok(())
}
