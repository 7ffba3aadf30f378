//! Risk scoring configuration: factor weights, band thresholds and the knobs
//! behind each sub-score and the confidence value.

use crate::errors::{Error, Result};
use crate::evidence::{Band, Factor, FindingCategory, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub weights: FactorWeights,
    pub bands: BandThresholds,
    /// Coverage sub-score used when a component has no measurable coverage
    pub unknown_coverage_score: f64,
    pub security: SecurityScoring,
    pub churn: ChurnScoring,
    pub confidence: ConfidenceConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            bands: BandThresholds::default(),
            unknown_coverage_score: 0.6,
            security: SecurityScoring::default(),
            churn: ChurnScoring::default(),
            confidence: ConfidenceConfig::default(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        problems.extend(self.weights.problems());
        problems.extend(self.bands.problems());
        if !is_unit(self.unknown_coverage_score) {
            problems.push("unknown_coverage_score must be between 0.0 and 1.0".to_string());
        }
        problems.extend(self.security.problems());
        problems.extend(self.churn.problems());
        problems.extend(self.confidence.problems());

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::config(format!("risk: {}", problems.join("; "))))
        }
    }
}

/// Relative importance of each factor. Any non-negative values are accepted;
/// they are normalized to sum to 1 when scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    pub security: f64,
    pub coverage: f64,
    pub churn: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            security: 0.5,
            coverage: 0.3,
            churn: 0.2,
        }
    }
}

impl FactorWeights {
    pub fn raw(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Security => self.security,
            Factor::Coverage => self.coverage,
            Factor::Churn => self.churn,
        }
    }

    pub fn total(&self) -> f64 {
        Factor::ALL.iter().map(|f| self.raw(*f)).sum()
    }

    /// Weight scaled so all factors sum to 1.
    pub fn normalized(&self, factor: Factor) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.raw(factor) / total
        } else {
            0.0
        }
    }

    /// Factors that can influence the score at all.
    pub fn active(&self) -> Vec<Factor> {
        Factor::ALL
            .into_iter()
            .filter(|f| self.raw(*f) > 0.0)
            .collect()
    }

    fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = Factor::ALL
            .iter()
            .filter(|f| !(self.raw(**f).is_finite() && self.raw(**f) >= 0.0))
            .map(|f| format!("{} weight must be a non-negative number", f))
            .collect();
        if problems.is_empty() && self.total() <= 0.0 {
            problems.push("at least one factor weight must be positive".to_string());
        }
        problems
    }
}

/// Minimum composite score for each band; anything below `p2` is P3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandThresholds {
    pub p0: f64,
    pub p1: f64,
    pub p2: f64,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            p0: 80.0,
            p1: 65.0,
            p2: 50.0,
        }
    }
}

impl BandThresholds {
    pub fn band_for(&self, score: f64) -> Band {
        match score {
            s if s >= self.p0 => Band::P0,
            s if s >= self.p1 => Band::P1,
            s if s >= self.p2 => Band::P2,
            _ => Band::P3,
        }
    }

    fn problems(&self) -> Vec<String> {
        let in_range = [self.p0, self.p1, self.p2]
            .iter()
            .all(|t| t.is_finite() && (0.0..=100.0).contains(t));
        if !in_range {
            return vec!["band thresholds must lie within 0..=100".to_string()];
        }
        if !(self.p0 > self.p1 && self.p1 > self.p2) {
            return vec![format!(
                "band thresholds must be strictly descending (p0 {} > p1 {} > p2 {})",
                self.p0, self.p1, self.p2
            )];
        }
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityScoring {
    /// Weighted finding total at which the security sub-score reaches 1.0
    pub saturation: f64,
    pub severity_weights: SeverityWeights,
    pub category_weights: CategoryWeights,
}

impl Default for SecurityScoring {
    fn default() -> Self {
        Self {
            saturation: 2.0,
            severity_weights: SeverityWeights::default(),
            category_weights: CategoryWeights::default(),
        }
    }
}

impl SecurityScoring {
    /// Points one finding adds before saturation.
    pub fn finding_points(&self, severity: Severity, category: FindingCategory) -> f64 {
        self.severity_weights.weight(severity) * self.category_weights.weight(category)
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(self.saturation.is_finite() && self.saturation > 0.0) {
            problems.push("security.saturation must be positive".to_string());
        }
        let weights = [
            self.severity_weights.critical,
            self.severity_weights.high,
            self.severity_weights.medium,
            self.severity_weights.low,
            self.severity_weights.info,
            self.category_weights.security,
            self.category_weights.dependency,
            self.category_weights.quality,
        ];
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            problems.push("security severity/category weights must be non-negative".to_string());
        }
        problems
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub info: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: 1.0,
            high: 0.6,
            medium: 0.3,
            low: 0.1,
            info: 0.0,
        }
    }
}

impl SeverityWeights {
    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub security: f64,
    pub dependency: f64,
    pub quality: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            security: 1.0,
            dependency: 1.0,
            quality: 0.25,
        }
    }
}

impl CategoryWeights {
    pub fn weight(&self, category: FindingCategory) -> f64 {
        match category {
            FindingCategory::Security => self.security,
            FindingCategory::Dependency => self.dependency,
            FindingCategory::Quality => self.quality,
        }
    }
}

/// Raw churn = commits * commit_weight + ln(1 + lines changed) * line_weight.
/// The sub-score is the percentile of that raw value across the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnScoring {
    pub commit_weight: f64,
    pub line_weight: f64,
}

impl Default for ChurnScoring {
    fn default() -> Self {
        Self {
            commit_weight: 1.0,
            line_weight: 1.0,
        }
    }
}

impl ChurnScoring {
    pub fn raw(&self, commits: u32, lines_changed: u64) -> f64 {
        commits as f64 * self.commit_weight + (1.0 + lines_changed as f64).ln() * self.line_weight
    }

    fn problems(&self) -> Vec<String> {
        if [self.commit_weight, self.line_weight]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
        {
            Vec::new()
        } else {
            vec!["churn weights must be non-negative".to_string()]
        }
    }
}

/// Multipliers applied to the base confidence (populated factors / active
/// factors). They are combined independently and clamped once at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Bonus per corroborating finding beyond the first
    pub density_bonus: f64,
    /// Maximum number of corroborating findings that earn a bonus
    pub density_cap: u32,
    /// Bonus per additional distinct source tool
    pub diversity_bonus: f64,
    /// Age (days, relative to the newest commit in the run) at which churn
    /// evidence counts half
    pub recency_half_life_days: f64,
    /// Lower bound for the recency multiplier
    pub recency_floor: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            density_bonus: 0.05,
            density_cap: 4,
            diversity_bonus: 0.05,
            recency_half_life_days: 180.0,
            recency_floor: 0.5,
        }
    }
}

impl ConfidenceConfig {
    pub fn density_multiplier(&self, findings: usize) -> f64 {
        let extra = findings.saturating_sub(1).min(self.density_cap as usize);
        1.0 + self.density_bonus * extra as f64
    }

    pub fn diversity_multiplier(&self, sources: usize) -> f64 {
        1.0 + self.diversity_bonus * sources.saturating_sub(1) as f64
    }

    pub fn recency_multiplier(&self, age_days: f64) -> f64 {
        if age_days <= 0.0 {
            return 1.0;
        }
        0.5f64
            .powf(age_days / self.recency_half_life_days)
            .max(self.recency_floor)
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(self.density_bonus.is_finite() && self.density_bonus >= 0.0)
            || !(self.diversity_bonus.is_finite() && self.diversity_bonus >= 0.0)
        {
            problems.push("confidence bonuses must be non-negative".to_string());
        }
        if !(self.recency_half_life_days.is_finite() && self.recency_half_life_days > 0.0) {
            problems.push("confidence.recency_half_life_days must be positive".to_string());
        }
        if !is_unit(self.recency_floor) {
            problems.push("confidence.recency_floor must be between 0.0 and 1.0".to_string());
        }
        problems
    }
}

fn is_unit(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(RiskConfig::default().validate().is_ok());
    }

    #[test]
    fn normalized_weights_sum_to_one() {
        let weights = FactorWeights {
            security: 3.0,
            coverage: 2.0,
            churn: 0.0,
        };
        let sum: f64 = Factor::ALL.iter().map(|f| weights.normalized(*f)).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(weights.active(), vec![Factor::Security, Factor::Coverage]);
    }

    #[test]
    fn all_zero_weights_are_rejected() {
        let config = RiskConfig {
            weights: FactorWeights {
                security: 0.0,
                coverage: 0.0,
                churn: 0.0,
            },
            ..RiskConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("at least one factor weight"), "{err}");
    }

    #[test]
    fn bands_must_descend() {
        let config = RiskConfig {
            bands: BandThresholds {
                p0: 50.0,
                p1: 65.0,
                p2: 40.0,
            },
            ..RiskConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn band_for_uses_inclusive_minimums() {
        let bands = BandThresholds::default();
        assert_eq!(bands.band_for(80.0), Band::P0);
        assert_eq!(bands.band_for(79.99), Band::P1);
        assert_eq!(bands.band_for(65.0), Band::P1);
        assert_eq!(bands.band_for(50.0), Band::P2);
        assert_eq!(bands.band_for(0.0), Band::P3);
    }

    #[test]
    fn recency_multiplier_halves_at_half_life_and_respects_floor() {
        let config = ConfidenceConfig::default();
        assert_eq!(config.recency_multiplier(0.0), 1.0);
        assert!((config.recency_multiplier(180.0) - 0.5).abs() < 1e-9);
        assert_eq!(config.recency_multiplier(10_000.0), 0.5);
    }

    #[test]
    fn density_multiplier_is_capped() {
        let config = ConfidenceConfig::default();
        assert_eq!(config.density_multiplier(1), 1.0);
        assert!((config.density_multiplier(3) - 1.10).abs() < 1e-9);
        assert_eq!(config.density_multiplier(50), config.density_multiplier(5));
    }
}
