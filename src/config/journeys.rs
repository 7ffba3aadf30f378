//! Critical user journey definitions.
//!
//! A journey names a user-facing flow, the path globs of the components that
//! implement it and the coverage percentage the team wants for it.

use crate::errors::{Error, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How component ratios are combined into a journey's coverage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Averaging {
    /// Unweighted mean of component ratios
    #[default]
    Mean,
    /// Total covered / total measurable across matched components
    StatementWeighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub patterns: Vec<String>,
    /// Target coverage in percent (0-100)
    pub target: f64,
}

impl Journey {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JourneyConfig {
    pub averaging: Averaging,
    /// Gaps smaller than this many percentage points produce no recommendation
    pub min_gap_delta: f64,
    #[serde(rename = "journey", alias = "journeys")]
    pub journeys: Vec<Journey>,
}

impl JourneyConfig {
    pub fn is_empty(&self) -> bool {
        self.journeys.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        let mut seen = BTreeSet::new();

        if !(self.min_gap_delta.is_finite() && self.min_gap_delta >= 0.0) {
            problems.push("min_gap_delta must be non-negative".to_string());
        }

        for journey in &self.journeys {
            if journey.id.trim().is_empty() {
                problems.push("journey id must not be empty".to_string());
                continue;
            }
            if !seen.insert(journey.id.as_str()) {
                problems.push(format!("duplicate journey id '{}'", journey.id));
            }
            if journey.patterns.is_empty() {
                problems.push(format!("journey '{}' has no patterns", journey.id));
            }
            for pattern in &journey.patterns {
                if let Err(e) = Pattern::new(pattern) {
                    problems.push(format!(
                        "journey '{}' pattern '{}' is invalid: {}",
                        journey.id, pattern, e
                    ));
                }
            }
            if !(journey.target.is_finite() && (0.0..=100.0).contains(&journey.target)) {
                problems.push(format!(
                    "journey '{}' target {} must lie within 0..=100",
                    journey.id, journey.target
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::config(format!("journeys: {}", problems.join("; "))))
        }
    }
}
