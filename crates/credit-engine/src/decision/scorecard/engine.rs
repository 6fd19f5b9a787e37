
use serde::{Deserialize, Serialize};

use super::{BinType, Scorecard};
use crate::decision::applicant::{ApplicantData, FieldValue};

pub const DEFAULT_MAX_REASON_CODES: usize = 5;
const TOP_FACTORS: usize = 3;

/// Decision bucket for a clamped scorecard score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreDecision {
    AutoApprove,
    ManualReview,
    AutoDecline,
}

impl ScoreDecision {
    pub const fn label(self) -> &'static str {
        match self {
            ScoreDecision::AutoApprove => "AUTO_APPROVE",
            ScoreDecision::ManualReview => "MANUAL_REVIEW",
            ScoreDecision::AutoDecline => "AUTO_DECLINE",
        }
    }
}

/// Points contributed by one characteristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicScore {
    pub code: String,
    pub name: String,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_type: Option<BinType>,
    pub points: f64,
    pub weighted_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_label: Option<String>,
    pub weighted_points: f64,
}

/// Adverse-action reason drawn from the weakest characteristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonCode {
    /// `RC##_<characteristic-code>`.
    pub code: String,
    pub characteristic: String,
    pub description: String,
    pub weighted_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub scorecard_id: String,
    /// Sum before clamping.
    pub raw_score: f64,
    pub total_score: f64,
    pub decision: ScoreDecision,
    pub characteristic_scores: Vec<CharacteristicScore>,
    pub reason_codes: Vec<ReasonCode>,
    pub top_positive: Vec<FactorContribution>,
    pub top_negative: Vec<FactorContribution>,
}

/// Stateless scorer; the only knob is the reason-code cap.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    max_reason_codes: usize,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REASON_CODES)
    }
}

impl ScoringEngine {
    pub fn new(max_reason_codes: usize) -> Self {
        Self { max_reason_codes }
    }

    pub fn score(&self, scorecard: &Scorecard, applicant: &ApplicantData) -> ScoreResult {
        let characteristic_scores: Vec<CharacteristicScore> = scorecard
            .characteristics
            .iter()
            .filter(|characteristic| characteristic.is_active)
            .map(|characteristic| {
                let value = applicant.resolve(&characteristic.field);
                let bin = characteristic.match_bin(value.as_ref());
                let points = bin.map_or(0.0, |bin| bin.points);
                CharacteristicScore {
                    code: characteristic.code.clone(),
                    name: characteristic.name.clone(),
                    field: characteristic.field.clone(),
                    bin_label: bin.map(|bin| bin.label.clone()),
                    bin_type: bin.map(|bin| bin.bin_type()),
                    value,
                    points,
                    weighted_points: points * characteristic.weight_multiplier,
                }
            })
            .collect();

        let raw_score = scorecard.base_score
            + characteristic_scores
                .iter()
                .map(|score| score.weighted_points)
                .sum::<f64>();
        let total_score = raw_score.max(scorecard.min_score).min(scorecard.max_score);
        let decision = decide(scorecard, total_score);

        let mut negatives: Vec<&CharacteristicScore> = characteristic_scores
            .iter()
            .filter(|score| score.weighted_points < 0.0)
            .collect();
        negatives.sort_by(|a, b| a.weighted_points.total_cmp(&b.weighted_points));

        let mut positives: Vec<&CharacteristicScore> = characteristic_scores
            .iter()
            .filter(|score| score.weighted_points > 0.0)
            .collect();
        positives.sort_by(|a, b| b.weighted_points.total_cmp(&a.weighted_points));

        let reason_codes = if decision == ScoreDecision::AutoApprove {
            Vec::new()
        } else {
            reason_codes(&negatives, self.max_reason_codes)
        };

        ScoreResult {
            scorecard_id: scorecard.id.clone(),
            raw_score,
            total_score,
            decision,
            top_positive: contributions(&positives),
            top_negative: contributions(&negatives),
            reason_codes,
            characteristic_scores,
        }
    }
}

/// Approve at or above the approve threshold, decline below the decline threshold (the
/// review threshold stands in when no decline threshold is set), review otherwise.
pub(crate) fn decide(scorecard: &Scorecard, score: f64) -> ScoreDecision {
    if let Some(approve) = scorecard.auto_approve_threshold {
        if score >= approve {
            return ScoreDecision::AutoApprove;
        }
    }

    let decline = scorecard
        .auto_decline_threshold
        .or(scorecard.manual_review_threshold);
    match decline {
        Some(decline) if score < decline => ScoreDecision::AutoDecline,
        _ => ScoreDecision::ManualReview,
    }
}

/// Adverse action codes, drawn only from characteristics that pulled the score down.
/// `adverse` is already sorted most negative first.
fn reason_codes(adverse: &[&CharacteristicScore], limit: usize) -> Vec<ReasonCode> {
    adverse
        .iter()
        .take(limit)
        .enumerate()
        .map(|(index, score)| ReasonCode {
            code: format!("RC{:02}_{}", index + 1, score.code.to_ascii_uppercase()),
            characteristic: score.name.clone(),
            description: match &score.bin_label {
                Some(label) => format!("{}: {}", score.name, label),
                None => format!("{}: no matching attribute", score.name),
            },
            weighted_points: score.weighted_points,
        })
        .collect()
}

fn contributions(scores: &[&CharacteristicScore]) -> Vec<FactorContribution> {
    scores
        .iter()
        .take(TOP_FACTORS)
        .map(|score| FactorContribution {
            code: score.code.clone(),
            name: score.name.clone(),
            bin_label: score.bin_label.clone(),
            weighted_points: score.weighted_points,
        })
        .collect()
}
