//! Command handlers behind the `riskmap` binary.
//!
//! - **analyze**: run the pipeline against a repository
//! - **runs**: list stored runs
//! - **show**: print a run's manifest or one evidence stream
//! - **init**: write a starter `.riskmap.toml`

pub mod analyze;
pub mod init;
pub mod runs;
pub mod show;

pub use analyze::{handle_analyze, AnalyzeConfig};
pub use init::init_config;
pub use runs::list_runs;
pub use show::show_run;
