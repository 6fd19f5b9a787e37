//! Champion/challenger routing across live scorecards.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::applicant::ApplicantData;
use super::scorecard::{ScoreResult, Scorecard, ScorecardStatus, ScoringEngine};

/// Pick the decisioning scorecard for one application.
///
/// One uniform draw in `[0, 100)` is compared against the challengers' cumulative traffic
/// in list order; the champion takes the remainder. Without a champion nothing is selected.
/// Shadow scorecards are never candidates.
pub fn select<'a, R: Rng>(scorecards: &'a [Scorecard], rng: &mut R) -> Option<&'a Scorecard> {
    let champion = scorecards
        .iter()
        .find(|scorecard| scorecard.status == ScorecardStatus::Champion)?;

    let draw: f64 = rng.gen_range(0.0..100.0);
    let mut cumulative = 0.0;
    for challenger in scorecards.iter().filter(|scorecard| {
        scorecard.status == ScorecardStatus::Challenger && scorecard.traffic_pct > 0.0
    }) {
        cumulative += challenger.traffic_pct;
        if draw < cumulative {
            return Some(challenger);
        }
    }

    Some(champion)
}

/// Score recorded for every live scorecard on an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub scorecard_id: String,
    pub status: ScorecardStatus,
    pub is_decisioning: bool,
    pub result: ScoreResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decisioning_id: Option<String>,
    pub model_scores: Vec<ModelScore>,
}

impl RoutingOutcome {
    pub fn decisioning(&self) -> Option<&ModelScore> {
        self.model_scores.iter().find(|score| score.is_decisioning)
    }
}

/// Select the decisioning scorecard and score the applicant on every live scorecard.
pub fn route<R: Rng>(
    scorecards: &[Scorecard],
    applicant: &ApplicantData,
    engine: &ScoringEngine,
    rng: &mut R,
) -> RoutingOutcome {
    let decisioning_id = select(scorecards, rng).map(|scorecard| scorecard.id.clone());

    let model_scores = scorecards
        .iter()
        .filter(|scorecard| scorecard.status.is_live())
        .map(|scorecard| ModelScore {
            scorecard_id: scorecard.id.clone(),
            status: scorecard.status,
            is_decisioning: decisioning_id.as_deref() == Some(scorecard.id.as_str()),
            result: engine.score(scorecard, applicant),
        })
        .collect::<Vec<_>>();

    info!(
        decisioning = decisioning_id.as_deref().unwrap_or("none"),
        live = model_scores.len(),
        "champion/challenger routed"
    );

    RoutingOutcome {
        decisioning_id,
        model_scores,
    }
}
