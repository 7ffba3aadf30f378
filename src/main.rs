use anyhow::Result;
use clap::Parser;
use riskmap::cli::{Cli, Commands};
use riskmap::commands::{self, AnalyzeConfig};
use riskmap::formatting::FormattingConfig;
use riskmap::observability::install_panic_hook;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    install_panic_hook();
    FormattingConfig::from_env().with_override(cli.color).apply();

    match cli.command {
        Commands::Analyze {
            path,
            config,
            journeys,
            runs_dir,
            jobs,
            format,
            top,
        } => {
            let status = commands::handle_analyze(AnalyzeConfig {
                path,
                config,
                journeys,
                runs_dir,
                jobs,
                format,
                top,
            })?;
            log::info!("Run finished with status {}", status.as_str());
        }
        Commands::Runs {
            limit,
            runs_dir,
            format,
        } => commands::list_runs(runs_dir.as_deref(), limit, format)?,
        Commands::Show {
            run_id,
            kind,
            runs_dir,
            format,
        } => commands::show_run(&run_id, kind, runs_dir.as_deref(), format)?,
        Commands::Init { force } => commands::init_config(&std::env::current_dir()?, force)?,
    }
    Ok(())
}

/// `RUST_LOG` wins; otherwise `-v` raises the default `warn` level.
fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("riskmap={}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
