use super::{
    requested_amount, ConcentrationLimit, ExposureSnapshot, RoutingParams, ScoreBand,
    TermsAssignment,
};
use crate::decision::applicant::ApplicantData;
use crate::decision::rules::compare;

pub(crate) struct TermsOutcome {
    pub(crate) terms: TermsAssignment,
    pub(crate) detail: String,
    /// Set when routing forbids an automatic approval.
    pub(crate) blocked: bool,
}

/// Pick the band for `score` (or the forced tier) and apply routing caps and band conditions.
///
/// When no band matches, the requested amount is approved without pricing.
pub(crate) fn assign_terms(
    bands: &[ScoreBand],
    score: f64,
    applicant: &ApplicantData,
    routing: &RoutingParams,
) -> TermsOutcome {
    let requested = requested_amount(applicant);
    let band = match routing.force_tier.as_deref() {
        Some(tier) => bands
            .iter()
            .find(|band| band.tier.eq_ignore_ascii_case(tier))
            .or_else(|| bands.iter().find(|band| band.contains(score))),
        None => bands.iter().find(|band| band.contains(score)),
    };

    let mut notes = Vec::new();
    let mut terms = TermsAssignment {
        requested_amount: requested,
        approved_amount: requested,
        interest_rate: None,
        tier: None,
        down_payment_pct: None,
        max_tenure_months: None,
        conditions: Vec::new(),
    };

    match band {
        Some(band) => {
            notes.push(format!("tier {} at {:.2}%", band.tier, band.interest_rate));
            terms.interest_rate = Some(band.interest_rate);
            terms.tier = Some(band.tier.clone());
            terms.down_payment_pct = Some(band.down_payment_pct);
            terms.max_tenure_months = band.max_tenure_months;
            if let Some(cap) = band.max_amount {
                terms.approved_amount = terms.approved_amount.min(cap);
            }
            terms.conditions = band
                .conditions
                .iter()
                .filter(|condition| {
                    applicant
                        .resolve(&condition.field)
                        .and_then(|actual| compare(&actual, &condition.operator, &condition.threshold))
                        .unwrap_or(false)
                })
                .map(|condition| condition.requirement.clone())
                .collect();
        }
        None => notes.push(format!("no score band matched score {score:.0}")),
    }

    if let Some(cap) = routing.max_approved_amount {
        if cap < terms.approved_amount {
            notes.push(format!("amount capped at {cap:.2} by routing"));
            terms.approved_amount = cap;
        }
    }

    if routing.block_auto_approve {
        notes.push("auto-approval blocked by routing".to_string());
    }

    TermsOutcome {
        detail: notes.join("; "),
        terms,
        blocked: routing.block_auto_approve,
    }
}

/// Dimensions whose exposure would exceed the limit if `proposed` were booked.
pub(crate) fn concentration_breaches(
    limits: &[ConcentrationLimit],
    exposures: &[ExposureSnapshot],
    applicant: &ApplicantData,
    proposed: f64,
) -> Vec<String> {
    limits
        .iter()
        .filter_map(|limit| {
            let segment = applicant.text(&limit.field)?;
            let current = exposures
                .iter()
                .filter(|snapshot| {
                    snapshot.dimension.eq_ignore_ascii_case(&limit.dimension)
                        && snapshot.segment.eq_ignore_ascii_case(&segment)
                })
                .map(|snapshot| snapshot.current_exposure)
                .sum::<f64>();
            (current + proposed > limit.limit).then(|| {
                format!(
                    "{} '{}' exposure {:.2} + {:.2} exceeds limit {:.2}",
                    limit.dimension, segment, current, proposed, limit.limit
                )
            })
        })
        .collect()
}
