//! Points-based scorecards: model, scoring engine, script compiler and tabular importer.

mod engine;
mod import;
mod script;

pub use engine::{
    CharacteristicScore, FactorContribution, ReasonCode, ScoreDecision, ScoreResult,
    ScoringEngine, DEFAULT_MAX_REASON_CODES,
};
pub use import::{ImportedScorecard, TabularScorecardImporter};
pub use script::{generate_script, parse_script, ParsedScript};

use std::fmt;

use serde::{Deserialize, Serialize};

use super::applicant::FieldValue;

/// Lifecycle stage of a scorecard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorecardStatus {
    #[default]
    Draft,
    Validated,
    Shadow,
    Challenger,
    Champion,
    Retired,
}

impl ScorecardStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ScorecardStatus::Draft => "draft",
            ScorecardStatus::Validated => "validated",
            ScorecardStatus::Shadow => "shadow",
            ScorecardStatus::Challenger => "challenger",
            ScorecardStatus::Champion => "champion",
            ScorecardStatus::Retired => "retired",
        }
    }

    /// Live scorecards are scored on every application.
    pub const fn is_live(self) -> bool {
        matches!(
            self,
            ScorecardStatus::Shadow | ScorecardStatus::Challenger | ScorecardStatus::Champion
        )
    }
}

/// Named, versioned scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: u32,
    pub base_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_approve_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_review_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_decline_threshold: Option<f64>,
    /// Share of decisioning traffic (0-100) when running as a challenger.
    #[serde(default)]
    pub traffic_pct: f64,
    #[serde(default)]
    pub status: ScorecardStatus,
    #[serde(default)]
    pub characteristics: Vec<Characteristic>,
}

/// One scored input dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characteristic {
    pub code: String,
    pub name: String,
    pub field: String,
    #[serde(default = "default_weight")]
    pub weight_multiplier: f64,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub bins: Vec<Bin>,
}

fn default_weight() -> f64 {
    1.0
}

fn default_active() -> bool {
    true
}

impl Characteristic {
    pub fn new(code: &str, name: &str, field: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            field: field.to_string(),
            weight_multiplier: 1.0,
            is_active: true,
            bins: Vec::new(),
        }
    }

    pub fn with_bin(mut self, bin: Bin) -> Self {
        self.bins.push(bin);
        self
    }

    /// Range bins first (numeric values only), then categories, then the default bin.
    pub fn match_bin(&self, value: Option<&FieldValue>) -> Option<&Bin> {
        if let Some(value) = value {
            if let Some(number) = value.as_number() {
                let hit = self.bins.iter().find(|bin| match bin.matcher {
                    BinMatcher::Range { min, max } => {
                        min.map_or(true, |min| number >= min) && max.map_or(true, |max| number < max)
                    }
                    _ => false,
                });
                if hit.is_some() {
                    return hit;
                }
            }

            let text = value.to_string();
            let text = text.trim();
            let hit = self.bins.iter().find(|bin| match &bin.matcher {
                BinMatcher::Category { value } => value.trim().eq_ignore_ascii_case(text),
                _ => false,
            });
            if hit.is_some() {
                return hit;
            }
        }

        self.default_bin()
    }

    pub fn default_bin(&self) -> Option<&Bin> {
        self.bins
            .iter()
            .find(|bin| matches!(bin.matcher, BinMatcher::Default))
    }
}

/// Bin kind as persisted in `bin_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinType {
    Range,
    Category,
    Default,
}

impl BinType {
    pub const fn label(self) -> &'static str {
        match self {
            BinType::Range => "range",
            BinType::Category => "category",
            BinType::Default => "default",
        }
    }
}

/// Type-specific match data for a bin. Range bounds are half-open `[min, max)`; either
/// bound may be open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "bin_type", rename_all = "lowercase")]
pub enum BinMatcher {
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Category {
        value: String,
    },
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub label: String,
    pub points: f64,
    #[serde(flatten)]
    pub matcher: BinMatcher,
}

impl Bin {
    pub fn range(label: &str, min: Option<f64>, max: Option<f64>, points: f64) -> Self {
        Self {
            label: label.to_string(),
            points,
            matcher: BinMatcher::Range { min, max },
        }
    }

    pub fn category(label: &str, value: &str, points: f64) -> Self {
        Self {
            label: label.to_string(),
            points,
            matcher: BinMatcher::Category {
                value: value.to_string(),
            },
        }
    }

    pub fn fallback(label: &str, points: f64) -> Self {
        Self {
            label: label.to_string(),
            points,
            matcher: BinMatcher::Default,
        }
    }

    pub fn bin_type(&self) -> BinType {
        match self.matcher {
            BinMatcher::Range { .. } => BinType::Range,
            BinMatcher::Category { .. } => BinType::Category,
            BinMatcher::Default => BinType::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueLevel {
    Error,
    Warning,
}

/// Problem found in a scorecard definition, script or tabular import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationIssue {
    /// 1-based line or row number in the source text, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub level: IssueLevel,
    pub message: String,
}

impl ConfigurationIssue {
    pub fn error(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            line,
            level: IssueLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            line,
            level: IssueLevel::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == IssueLevel::Error
    }
}

impl fmt::Display for ConfigurationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Failure to turn script or tabular text into a scorecard.
#[derive(Debug, thiserror::Error)]
pub enum ScorecardImportError {
    #[error("failed to read scorecard source: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scorecard CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("scorecard definition has {} error(s): {}", .0.len(), summarize(.0))]
    Invalid(Vec<ConfigurationIssue>),
}

fn summarize(issues: &[ConfigurationIssue]) -> String {
    issues
        .iter()
        .take(3)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Scorecard {
    /// Score an applicant with the default reason-code cap.
    pub fn score(&self, applicant: &super::applicant::ApplicantData) -> ScoreResult {
        ScoringEngine::default().score(self, applicant)
    }

    /// Report every configuration problem at once.
    pub fn validate(&self) -> Vec<ConfigurationIssue> {
        let mut issues = Vec::new();

        if self.min_score > self.max_score {
            issues.push(ConfigurationIssue::error(
                None,
                format!(
                    "min_score {} exceeds max_score {}",
                    self.min_score, self.max_score
                ),
            ));
        } else if self.base_score < self.min_score || self.base_score > self.max_score {
            issues.push(ConfigurationIssue::error(
                None,
                format!(
                    "base_score {} outside score range {}-{}",
                    self.base_score, self.min_score, self.max_score
                ),
            ));
        }

        let ordered = [
            self.auto_decline_threshold,
            self.manual_review_threshold,
            self.auto_approve_threshold,
        ];
        let present: Vec<f64> = ordered.iter().flatten().copied().collect();
        if present.windows(2).any(|pair| pair[0] > pair[1]) {
            issues.push(ConfigurationIssue::error(
                None,
                "thresholds must satisfy auto_decline <= manual_review <= auto_approve",
            ));
        }

        if !(0.0..=100.0).contains(&self.traffic_pct) {
            issues.push(ConfigurationIssue::error(
                None,
                format!("traffic_pct {} outside 0-100", self.traffic_pct),
            ));
        }

        for characteristic in &self.characteristics {
            let code = &characteristic.code;
            if !characteristic.weight_multiplier.is_finite() || characteristic.weight_multiplier <= 0.0 {
                issues.push(ConfigurationIssue::error(
                    None,
                    format!(
                        "{code}: weight_multiplier must be positive, found {}",
                        characteristic.weight_multiplier
                    ),
                ));
            }

            let defaults = characteristic
                .bins
                .iter()
                .filter(|bin| bin.bin_type() == BinType::Default)
                .count();
            if defaults > 1 {
                issues.push(ConfigurationIssue::warning(
                    None,
                    format!("{code}: {defaults} default bins, only the first is used"),
                ));
            }

            for bin in &characteristic.bins {
                match &bin.matcher {
                    BinMatcher::Range {
                        min: Some(min),
                        max: Some(max),
                    } if min >= max => issues.push(ConfigurationIssue::error(
                        None,
                        format!("{code}: range bin '{}' has min {min} >= max {max}", bin.label),
                    )),
                    BinMatcher::Category { value } if value.trim().is_empty() => {
                        issues.push(ConfigurationIssue::error(
                            None,
                            format!("{code}: category bin '{}' has an empty value", bin.label),
                        ))
                    }
                    _ => {}
                }
                if !bin.points.is_finite() {
                    issues.push(ConfigurationIssue::error(
                        None,
                        format!("{code}: bin '{}' has non-finite points", bin.label),
                    ));
                }
            }
        }

        issues
    }
}
