use crate::evidence::EvidenceKind;
use crate::formatting::ColorMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "riskmap")]
#[command(about = "Local evidence pipeline for explainable code risk", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Colour output
    #[arg(long, value_enum, global = true)]
    pub color: Option<ColorMode>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every collector against a repository and score its components
    Analyze {
        /// Repository to analyze
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Configuration file (default: discover .riskmap.toml upwards)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Separate journeys file, replacing the [journeys] section
        #[arg(long)]
        journeys: Option<PathBuf>,

        /// Directory holding run directories
        #[arg(long)]
        runs_dir: Option<PathBuf>,

        /// Collectors run in parallel (0 = number of cores, capped at 4)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Risk rows shown in terminal output
        #[arg(long, default_value_t = crate::output::DEFAULT_TOP)]
        top: usize,
    },

    /// List stored runs, newest first
    Runs {
        /// Show at most this many runs
        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long)]
        runs_dir: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,
    },

    /// Show a run's manifest or one of its evidence streams
    Show {
        run_id: String,

        /// Evidence stream to print (findings, coverage, churn, risks, gaps, recommendations)
        #[arg(short, long)]
        kind: Option<EvidenceKind>,

        #[arg(long)]
        runs_dir: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,
    },

    /// Write a default .riskmap.toml in the current directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_parses_all_options() {
        let cli = Cli::try_parse_from([
            "riskmap",
            "-v",
            "analyze",
            "repo",
            "--config",
            "rm.toml",
            "--jobs",
            "2",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Analyze {
                path,
                config,
                jobs,
                format,
                ..
            } => {
                assert_eq!(path, PathBuf::from("repo"));
                assert_eq!(config, Some(PathBuf::from("rm.toml")));
                assert_eq!(jobs, Some(2));
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn show_parses_kind() {
        let cli =
            Cli::try_parse_from(["riskmap", "show", "20251024_120000Z", "--kind", "risks"]).unwrap();
        match cli.command {
            Commands::Show { run_id, kind, .. } => {
                assert_eq!(run_id, "20251024_120000Z");
                assert_eq!(kind, Some(EvidenceKind::Risks));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["riskmap", "show", "x", "--kind", "bogus"]).is_err());
    }
}
