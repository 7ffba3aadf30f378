use crate::cli::OutputFormat;
use crate::evidence::EvidenceKind;
use crate::output;
use crate::run::RunManager;
use anyhow::Result;
use std::path::Path;

/// Print the manifest, or every record of `kind`, for one run.
pub fn show_run(
    run_id: &str,
    kind: Option<EvidenceKind>,
    runs_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let manager = RunManager::new(RunManager::resolve_base_dir(runs_dir)?);
    let manifest = manager.load_run(run_id)?;

    match kind {
        None => match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&manifest)?),
            OutputFormat::Terminal => print!("{}", output::render_manifest(&manifest)),
        },
        Some(kind) => {
            let records = output::read_stream_values(&manager.evidence_dir(run_id), kind);
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&output::records_json(kind.stream_name(), records))?
                ),
                // one compact record per line, like the stream itself
                OutputFormat::Terminal => {
                    for record in &records {
                        println!("{}", serde_json::to_string(record)?);
                    }
                    if records.is_empty() {
                        eprintln!("No {} records in run {}", kind, run_id);
                    }
                }
            }
        }
    }
    Ok(())
}
