//! Configuration for a riskmap run.
//!
//! Everything lives in one `.riskmap.toml` (or `.riskmap.yaml`) discovered
//! from the target directory upwards:
//!
//! ```toml
//! [risk.weights]
//! security = 0.5
//! coverage = 0.3
//! churn = 0.2
//!
//! [collectors]
//! churn_window_days = 90
//!
//! [[journeys.journey]]
//! id = "checkout"
//! patterns = ["src/checkout/**"]
//! target = 80
//! ```
//!
//! Invalid configuration is a hard error raised before any collector runs.

mod collectors;
mod journeys;
mod loader;
mod risk;

pub use collectors::{CollectorsConfig, ToolOverride, KNOWN_COLLECTORS};
pub use journeys::{Averaging, Journey, JourneyConfig};
pub use loader::{
    directory_ancestors, discover_config, load_config, load_config_file, load_journeys_file,
    parse_config, ConfigFormat, LoadedConfig, CONFIG_FILE_NAMES,
};
pub use risk::{
    BandThresholds, CategoryWeights, ChurnScoring, ConfidenceConfig, FactorWeights, RiskConfig,
    SecurityScoring, SeverityWeights,
};

use crate::errors::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub risk: RiskConfig,
    pub journeys: JourneyConfig,
    pub collectors: CollectorsConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.risk.validate()?;
        self.journeys.validate()?;
        self.collectors.validate()
    }

    /// Replace the journeys section, e.g. with the contents of `--journeys`.
    pub fn with_journeys(mut self, journeys: JourneyConfig) -> Self {
        self.journeys = journeys;
        self
    }
}

/// Starter file written by `riskmap init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# riskmap configuration

[risk]
# Coverage sub-score for files with no measurable coverage
unknown_coverage_score = 0.6

[risk.weights]
security = 0.5
coverage = 0.3
churn = 0.2

[risk.bands]
p0 = 80
p1 = 65
p2 = 50

[collectors]
# 0 = number of cores, capped at 4
parallelism = 0
default_timeout_secs = 120
churn_window_days = 90
coverage_reports = ["coverage.xml", "lcov.info"]

# [collectors.tools.pylint]
# timeout_secs = 300
# extra_args = ["--disable=C0114"]

[journeys]
averaging = "mean"
min_gap_delta = 0.0

# [[journeys.journey]]
# id = "checkout"
# name = "Checkout"
# patterns = ["src/checkout/**"]
# target = 80
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_parses_to_defaults() {
        let config = parse_config(DEFAULT_CONFIG_TEMPLATE, ConfigFormat::Toml).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn with_journeys_replaces_section() {
        let journeys = JourneyConfig {
            min_gap_delta: 3.0,
            ..JourneyConfig::default()
        };
        let config = Config::default().with_journeys(journeys.clone());
        assert_eq!(config.journeys, journeys);
    }
}
