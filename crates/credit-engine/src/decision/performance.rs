//! Discrimination and stability statistics over a scored population.
//!
//! `outcomes[i] == true` means account `i` went bad. Higher scores are expected to be
//! better risks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Floor applied to empty bands before taking logarithms, as a percentage (0.01%).
const PCT_FLOOR: f64 = 0.01;

/// Signed Gini coefficient, `2 * AUC - 1`, with ties counting half.
///
/// AUC is the Mann-Whitney statistic over tie-averaged ranks, so one sort is enough.
/// Returns 0 for empty input, mismatched lengths, or when either class is absent.
pub fn gini(scores: &[f64], outcomes: &[bool]) -> f64 {
    let Some((goods, bads)) = split(scores, outcomes) else {
        return 0.0;
    };

    let mut ranked: Vec<(f64, bool)> = goods
        .iter()
        .map(|score| (*score, false))
        .chain(bads.iter().map(|score| (*score, true)))
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut good_rank_sum = 0.0;
    let mut start = 0;
    while start < ranked.len() {
        let pivot = ranked[start].0;
        let end = start
            + ranked[start..].partition_point(|(score, _)| score.total_cmp(&pivot).is_eq());
        // Ranks start + 1 ..= end share their mean.
        let mean_rank = (start + 1 + end) as f64 / 2.0;
        let tied_goods = ranked[start..end].iter().filter(|(_, bad)| !bad).count();
        good_rank_sum += mean_rank * tied_goods as f64;
        start = end;
    }

    let good_count = goods.len() as f64;
    let bad_count = bads.len() as f64;
    let auc = (good_rank_sum - good_count * (good_count + 1.0) / 2.0) / (good_count * bad_count);
    2.0 * auc - 1.0
}

/// Kolmogorov-Smirnov statistic: largest gap between the cumulative score distributions of
/// bads and goods.
pub fn ks(scores: &[f64], outcomes: &[bool]) -> f64 {
    let Some((mut goods, mut bads)) = split(scores, outcomes) else {
        return 0.0;
    };
    goods.sort_by(f64::total_cmp);
    bads.sort_by(f64::total_cmp);

    let mut cutpoints: Vec<f64> = goods.iter().chain(&bads).copied().collect();
    cutpoints.sort_by(f64::total_cmp);
    cutpoints.dedup();

    let cdf = |sorted: &[f64], at: f64| {
        sorted.partition_point(|score| *score <= at) as f64 / sorted.len() as f64
    };

    cutpoints
        .into_iter()
        .map(|at| (cdf(&bads, at) - cdf(&goods, at)).abs())
        .fold(0.0, f64::max)
}

fn split(scores: &[f64], outcomes: &[bool]) -> Option<(Vec<f64>, Vec<f64>)> {
    if scores.is_empty() || scores.len() != outcomes.len() {
        return None;
    }
    let (bads, goods): (Vec<(f64, bool)>, Vec<(f64, bool)>) = scores
        .iter()
        .copied()
        .zip(outcomes.iter().copied())
        .partition(|(_, bad)| *bad);
    if goods.is_empty() || bads.is_empty() {
        return None;
    }
    Some((
        goods.into_iter().map(|(score, _)| score).collect(),
        bads.into_iter().map(|(score, _)| score).collect(),
    ))
}

/// Population stability index between two percentage distributions over the same bands.
pub fn psi(expected_pct: &[f64], actual_pct: &[f64]) -> f64 {
    divergence(actual_pct, expected_pct)
}

/// Information value from the good and bad percentage distributions over the same bands.
pub fn iv(good_pct: &[f64], bad_pct: &[f64]) -> f64 {
    divergence(good_pct, bad_pct)
}

/// `sum((p - q) * ln(p / q))` over fractions, flooring empty bands. Extra bands on the
/// longer side are ignored.
fn divergence(p_pct: &[f64], q_pct: &[f64]) -> f64 {
    p_pct
        .iter()
        .zip(q_pct)
        .map(|(p, q)| {
            let p = p.max(PCT_FLOOR) / 100.0;
            let q = q.max(PCT_FLOOR) / 100.0;
            (p - q) * (p / q).ln()
        })
        .sum()
}

/// Percentage of `scores` in each band. `edges` must be ascending; `k` edges give `k + 1`
/// bands, the first open below and the last open above.
pub fn band_distribution(scores: &[f64], edges: &[f64]) -> Vec<f64> {
    let counts = band_counts(scores.iter().copied(), edges);
    to_pct(&counts, scores.len())
}

fn band_index(score: f64, edges: &[f64]) -> usize {
    edges.partition_point(|edge| *edge <= score)
}

fn band_counts(scores: impl Iterator<Item = f64>, edges: &[f64]) -> Vec<usize> {
    let mut counts = vec![0; edges.len() + 1];
    for score in scores {
        counts[band_index(score, edges)] += 1;
    }
    counts
}

fn to_pct(counts: &[usize], total: usize) -> Vec<f64> {
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts
        .iter()
        .map(|count| *count as f64 / total as f64 * 100.0)
        .collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PerformanceError {
    #[error("{scores} scores but {outcomes} outcomes")]
    LengthMismatch { scores: usize, outcomes: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    Stable,
    Moderate,
    Significant,
}

impl DriftStatus {
    pub fn from_psi(psi: f64) -> Self {
        if psi < 0.10 {
            DriftStatus::Stable
        } else if psi < 0.25 {
            DriftStatus::Moderate
        } else {
            DriftStatus::Significant
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DriftStatus::Stable => "stable",
            DriftStatus::Moderate => "moderate",
            DriftStatus::Significant => "significant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictiveStrength {
    Useless,
    Weak,
    Medium,
    Strong,
    /// Too good to be true; usually leakage.
    Suspicious,
}

impl PredictiveStrength {
    pub fn from_iv(iv: f64) -> Self {
        if iv < 0.02 {
            PredictiveStrength::Useless
        } else if iv < 0.1 {
            PredictiveStrength::Weak
        } else if iv < 0.3 {
            PredictiveStrength::Medium
        } else if iv < 0.5 {
            PredictiveStrength::Strong
        } else {
            PredictiveStrength::Suspicious
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PredictiveStrength::Useless => "useless",
            PredictiveStrength::Weak => "weak",
            PredictiveStrength::Medium => "medium",
            PredictiveStrength::Strong => "strong",
            PredictiveStrength::Suspicious => "suspicious",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStats {
    pub label: String,
    pub count: usize,
    pub pct: f64,
    pub bad_count: usize,
    pub good_pct: f64,
    pub bad_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub sample_size: usize,
    pub bad_count: usize,
    pub bad_rate: f64,
    pub gini: f64,
    pub ks: f64,
    pub iv: f64,
    pub strength: PredictiveStrength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift: Option<DriftStatus>,
    pub bands: Vec<BandStats>,
}

impl PerformanceReport {
    /// Build the full report. PSI is only computed when an expected distribution with one
    /// entry per band is supplied. Every score needs exactly one outcome.
    pub fn build(
        scores: &[f64],
        outcomes: &[bool],
        band_edges: &[f64],
        expected_band_pct: &[f64],
    ) -> Result<Self, PerformanceError> {
        if scores.len() != outcomes.len() {
            return Err(PerformanceError::LengthMismatch {
                scores: scores.len(),
                outcomes: outcomes.len(),
            });
        }

        let pairs: Vec<(f64, bool)> = scores
            .iter()
            .copied()
            .zip(outcomes.iter().copied())
            .collect();
        let bad_count = pairs.iter().filter(|(_, bad)| *bad).count();
        let good_count = pairs.len() - bad_count;

        let counts = band_counts(pairs.iter().map(|(score, _)| *score), band_edges);
        let bad_counts = band_counts(
            pairs.iter().filter(|(_, bad)| *bad).map(|(score, _)| *score),
            band_edges,
        );
        let good_counts: Vec<usize> = counts
            .iter()
            .zip(&bad_counts)
            .map(|(all, bad)| all - bad)
            .collect();

        let actual_pct = to_pct(&counts, pairs.len());
        let bad_pct = to_pct(&bad_counts, bad_count);
        let good_pct = to_pct(&good_counts, good_count);

        let iv = if bad_count == 0 || good_count == 0 {
            0.0
        } else {
            iv(&good_pct, &bad_pct)
        };

        let psi = (expected_band_pct.len() == actual_pct.len() && !pairs.is_empty())
            .then(|| psi(expected_band_pct, &actual_pct));

        let bands = (0..counts.len())
            .map(|index| BandStats {
                label: band_label(band_edges, index),
                count: counts[index],
                pct: actual_pct[index],
                bad_count: bad_counts[index],
                good_pct: good_pct[index],
                bad_pct: bad_pct[index],
            })
            .collect();

        Ok(Self {
            sample_size: pairs.len(),
            bad_count,
            bad_rate: if pairs.is_empty() {
                0.0
            } else {
                bad_count as f64 / pairs.len() as f64
            },
            gini: gini(scores, outcomes),
            ks: ks(scores, outcomes),
            iv,
            strength: PredictiveStrength::from_iv(iv),
            psi,
            drift: psi.map(DriftStatus::from_psi),
            bands,
        })
    }
}

fn band_label(edges: &[f64], index: usize) -> String {
    match (index.checked_sub(1).and_then(|i| edges.get(i)), edges.get(index)) {
        (None, Some(upper)) => format!("< {upper}"),
        (Some(lower), Some(upper)) => format!("{lower}-{upper}"),
        (Some(lower), None) => format!("{lower}+"),
        (None, None) => "all".to_string(),
    }
}
