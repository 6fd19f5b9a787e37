use tracing::{debug, info, warn};

use super::terms::{assign_terms, concentration_breaches};
use super::{
    requested_amount, DecisionContext, EvaluationMode, EvaluationStep, OutcomeDetail,
    OverlayAction, StepOutcome, StrategyConfig, StrategyOutcome, StrategyResult, StrategyRule,
    TermsAssignment,
};
use crate::decision::rules::{
    evaluate_rule, RuleEvaluator, RuleInput, RulesConfig, RulesOutcome, Severity,
};
use crate::decision::scorecard::{ScoreDecision, ScoringEngine};

pub const STEP_KNOCKOUT: &str = "Knock-out Rules";
pub const STEP_DATA_SUFFICIENCY: &str = "Data Sufficiency";
pub const STEP_SCORECARD: &str = "Scorecard Evaluation";
pub const STEP_SCORE_DECISION: &str = "Score Decision";
pub const STEP_OVERLAYS: &str = "Overlay Rules";
pub const STEP_CONCENTRATION: &str = "Concentration Check";
pub const STEP_TERMS: &str = "Terms Assignment";
pub const STEP_OUTPUT: &str = "Output";
pub const STEP_RULES: &str = "Rule Evaluation";
pub const STEP_WEIGHTED: &str = "Weighted Scoring";
pub const STEP_MODE: &str = "Mode Resolution";

/// Runs a strategy against one applicant and records every stage it reaches.
///
/// Holds no per-call state; concurrent calls only need their own context.
#[derive(Debug, Clone, Default)]
pub struct StrategyExecutor {
    rules: RulesConfig,
    scoring: ScoringEngine,
}

impl StrategyExecutor {
    pub fn new(rules: RulesConfig, scoring: ScoringEngine) -> Self {
        Self { rules, scoring }
    }

    pub fn execute(&self, strategy: &StrategyConfig, ctx: &DecisionContext<'_>) -> StrategyResult {
        let mut run = Run::default();

        let (outcome, detail, terms) = match &strategy.mode {
            EvaluationMode::Sequential => self.sequential(strategy, ctx, &mut run),
            EvaluationMode::DualPath => self.dual_path(strategy, ctx, &mut run),
            EvaluationMode::Scoring => self.scoring(strategy, ctx, &mut run),
            EvaluationMode::Hybrid => self.hybrid(strategy, ctx, &mut run),
            EvaluationMode::Unknown(raw) => {
                warn!(strategy_id = %strategy.id, mode = %raw, "unknown evaluation mode");
                run.record(
                    STEP_MODE,
                    StepOutcome::NotEvaluated,
                    format!("evaluation mode '{raw}' is not supported"),
                    Vec::new(),
                );
                run.reasons
                    .push(format!("strategy mode '{raw}' not evaluated"));
                (StrategyOutcome::Refer, OutcomeDetail::NotEvaluated, None)
            }
        };

        info!(
            strategy_id = %strategy.id,
            mode = strategy.mode.label(),
            outcome = outcome.label(),
            steps = run.steps.len(),
            "strategy evaluated"
        );

        StrategyResult {
            strategy_id: strategy.id.clone(),
            mode: strategy.mode.clone(),
            outcome,
            outcome_detail: detail,
            reason_codes: run.reason_codes,
            reasons: run.reasons,
            terms,
            steps: run.steps,
            scorecard_score: run.scorecard_score,
            weighted_score: run.weighted_score,
        }
    }

    fn sequential(
        &self,
        strategy: &StrategyConfig,
        ctx: &DecisionContext<'_>,
        run: &mut Run,
    ) -> Resolution {
        let score = ctx.scorecard.map(|scorecard| {
            let result = self.scoring.score(scorecard, ctx.applicant);
            run.scorecard_score = Some(result.total_score);
            result.total_score
        });

        let evaluator = RuleEvaluator::new(
            strategy
                .rules_config
                .clone()
                .unwrap_or_else(|| self.rules.clone()),
        );
        let output = evaluator.evaluate(
            &RuleInput {
                applicant: ctx.applicant.clone(),
                score,
            },
            ctx.registry,
        );

        let fired: Vec<String> = output
            .results
            .iter()
            .filter(|result| result.failed())
            .map(|result| result.rule_id.clone())
            .collect();
        let outcome = match output.outcome {
            RulesOutcome::AutoApprove => StrategyOutcome::Approve,
            RulesOutcome::AutoDecline => StrategyOutcome::Decline,
            RulesOutcome::ManualReview => StrategyOutcome::Refer,
        };
        run.record(
            STEP_RULES,
            outcome.into(),
            format!(
                "{} rule(s) evaluated, {} failed, outcome {}",
                output.results.len(),
                fired.len(),
                output.outcome.label()
            ),
            fired.clone(),
        );
        run.reason_codes.extend(fired);
        run.reasons.extend(output.reasons);

        if outcome != StrategyOutcome::Approve {
            return (outcome, detail_for(outcome), None);
        }

        let requested = requested_amount(ctx.applicant);
        let terms = TermsAssignment {
            requested_amount: requested,
            approved_amount: output
                .max_eligible_amount
                .map_or(requested, |max| requested.min(max)),
            interest_rate: output.suggested_rate,
            tier: None,
            down_payment_pct: None,
            max_tenure_months: None,
            conditions: Vec::new(),
        };
        (outcome, terms.detail(), Some(terms))
    }

    fn dual_path(
        &self,
        strategy: &StrategyConfig,
        ctx: &DecisionContext<'_>,
        run: &mut Run,
    ) -> Resolution {
        if knockouts(strategy, ctx, run) {
            return declined();
        }

        let missing: Vec<String> = strategy
            .data_requirements
            .iter()
            .filter(|field| ctx.applicant.resolve(field).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            run.record(
                STEP_DATA_SUFFICIENCY,
                StepOutcome::Refer,
                format!("missing required data: {}", missing.join(", ")),
                Vec::new(),
            );
            run.reasons
                .push(format!("insufficient data: {}", missing.join(", ")));
            return referred();
        }
        run.record(
            STEP_DATA_SUFFICIENCY,
            StepOutcome::Pass,
            format!("{} required field(s) present", strategy.data_requirements.len()),
            Vec::new(),
        );

        let Some(scorecard) = ctx.scorecard else {
            run.record(
                STEP_SCORECARD,
                StepOutcome::NotEvaluated,
                "no decisioning scorecard available",
                Vec::new(),
            );
            run.reasons.push("no decisioning scorecard available".to_string());
            return referred();
        };
        let score = self.scoring.score(scorecard, ctx.applicant);
        run.scorecard_score = Some(score.total_score);
        run.record(
            STEP_SCORECARD,
            StepOutcome::Pass,
            format!(
                "scorecard {} scored {:.0} (raw {:.0})",
                scorecard.id, score.total_score, score.raw_score
            ),
            Vec::new(),
        );

        let mut provisional = match score.decision {
            ScoreDecision::AutoApprove => StrategyOutcome::Approve,
            ScoreDecision::ManualReview => StrategyOutcome::Refer,
            ScoreDecision::AutoDecline => StrategyOutcome::Decline,
        };
        let codes: Vec<String> = score.reason_codes.iter().map(|code| code.code.clone()).collect();
        run.record(
            STEP_SCORE_DECISION,
            provisional.into(),
            format!("score {:.0} mapped to {}", score.total_score, score.decision.label()),
            codes.clone(),
        );
        run.reason_codes.extend(codes);
        if provisional == StrategyOutcome::Decline {
            run.reasons.extend(
                score
                    .reason_codes
                    .iter()
                    .map(|code| code.description.clone()),
            );
            return declined();
        }

        let overlay = overlays(&strategy.overlay_rules, ctx, run);
        if !overlay.declines.is_empty() {
            run.record(
                STEP_OVERLAYS,
                StepOutcome::Decline,
                format!("{} decline overlay(s) fired", overlay.declines.len()),
                overlay.declines.clone(),
            );
            run.reason_codes.extend(overlay.declines);
            return declined();
        }
        if !overlay.refers.is_empty() {
            run.record(
                STEP_OVERLAYS,
                StepOutcome::Refer,
                format!("{} refer overlay(s) fired", overlay.refers.len()),
                overlay.refers.clone(),
            );
            run.reason_codes.extend(overlay.refers);
            return referred();
        }
        if !overlay.upgrades.is_empty() && provisional == StrategyOutcome::Refer {
            provisional = StrategyOutcome::Approve;
            run.record(
                STEP_OVERLAYS,
                StepOutcome::Approve,
                "upgrade overlay restored approval",
                overlay.upgrades,
            );
        } else {
            run.record(
                STEP_OVERLAYS,
                StepOutcome::Pass,
                format!("{} overlay(s) checked", strategy.overlay_rules.len()),
                Vec::new(),
            );
        }

        if provisional == StrategyOutcome::Refer {
            run.reasons.extend(
                score
                    .reason_codes
                    .iter()
                    .map(|code| code.description.clone()),
            );
            run.record(STEP_OUTPUT, StepOutcome::Refer, "referred for manual review", Vec::new());
            return referred();
        }

        if strategy.concentration_limits.is_empty() {
            run.record(
                STEP_CONCENTRATION,
                StepOutcome::Pass,
                "no concentration limits configured",
                Vec::new(),
            );
        } else {
            let breaches = concentration_breaches(
                &strategy.concentration_limits,
                ctx.exposures,
                ctx.applicant,
                requested_amount(ctx.applicant),
            );
            if !breaches.is_empty() {
                run.record(
                    STEP_CONCENTRATION,
                    StepOutcome::Refer,
                    breaches.join("; "),
                    Vec::new(),
                );
                run.reasons.extend(breaches);
                return referred();
            }
            run.record(
                STEP_CONCENTRATION,
                StepOutcome::Pass,
                format!("{} limit(s) within bounds", strategy.concentration_limits.len()),
                Vec::new(),
            );
        }

        let assigned = assign_terms(
            &strategy.score_bands,
            score.total_score,
            ctx.applicant,
            ctx.routing,
        );
        let outcome = if assigned.blocked {
            StrategyOutcome::Refer
        } else {
            StrategyOutcome::Approve
        };
        run.record(STEP_TERMS, outcome.into(), assigned.detail, Vec::new());

        let detail = if assigned.blocked {
            run.reasons.push("auto-approval blocked by routing".to_string());
            OutcomeDetail::Referred
        } else {
            assigned.terms.detail()
        };
        run.record(
            STEP_OUTPUT,
            outcome.into(),
            format!("{} ({:?})", outcome, detail),
            Vec::new(),
        );
        (outcome, detail, Some(assigned.terms))
    }

    fn scoring(
        &self,
        strategy: &StrategyConfig,
        ctx: &DecisionContext<'_>,
        run: &mut Run,
    ) -> Resolution {
        let rules: Vec<&StrategyRule> = strategy
            .knockout_rules
            .iter()
            .chain(&strategy.overlay_rules)
            .collect();
        let total = weighted_total(&rules, ctx, run);
        run.weighted_score = Some(total);
        classify(strategy, total, run)
    }

    fn hybrid(
        &self,
        strategy: &StrategyConfig,
        ctx: &DecisionContext<'_>,
        run: &mut Run,
    ) -> Resolution {
        if knockouts(strategy, ctx, run) {
            return declined();
        }

        let rules: Vec<&StrategyRule> = strategy.overlay_rules.iter().collect();
        let mut total = weighted_total(&rules, ctx, run);
        if let Some(scorecard) = ctx.scorecard {
            let score = self.scoring.score(scorecard, ctx.applicant);
            run.scorecard_score = Some(score.total_score);
            total += score.total_score / 100.0;
        }
        run.weighted_score = Some(total);
        classify(strategy, total, run)
    }
}

type Resolution = (StrategyOutcome, OutcomeDetail, Option<TermsAssignment>);

fn declined() -> Resolution {
    (StrategyOutcome::Decline, OutcomeDetail::Declined, None)
}

fn referred() -> Resolution {
    (StrategyOutcome::Refer, OutcomeDetail::Referred, None)
}

fn detail_for(outcome: StrategyOutcome) -> OutcomeDetail {
    match outcome {
        StrategyOutcome::Approve => OutcomeDetail::ApprovedStandard,
        StrategyOutcome::Decline => OutcomeDetail::Declined,
        StrategyOutcome::Refer => OutcomeDetail::Referred,
    }
}

#[derive(Debug, Default)]
struct Run {
    steps: Vec<EvaluationStep>,
    reasons: Vec<String>,
    reason_codes: Vec<String>,
    scorecard_score: Option<f64>,
    weighted_score: Option<f64>,
}

impl Run {
    fn record(
        &mut self,
        name: &str,
        outcome: StepOutcome,
        detail: impl Into<String>,
        rules_fired: Vec<String>,
    ) {
        let step = EvaluationStep {
            step_number: self.steps.len() as u32 + 1,
            name: name.to_string(),
            outcome,
            detail: detail.into(),
            rules_fired,
        };
        debug!(
            step = step.step_number,
            name = %step.name,
            outcome = step.outcome.label(),
            detail = %step.detail,
            "evaluation step recorded"
        );
        self.steps.push(step);
    }
}

/// Strategy knock-outs plus the registry's hard rules. Returns true when any fired.
fn knockouts(strategy: &StrategyConfig, ctx: &DecisionContext<'_>, run: &mut Run) -> bool {
    let mut fired = Vec::new();
    let mut reasons = Vec::new();
    let mut checked = 0usize;

    for rule in &strategy.knockout_rules {
        checked += 1;
        if rule.holds(ctx.applicant) == Some(false) {
            fired.push(rule.id.clone());
            reasons.push(format!(
                "{}: {} fails {} {}",
                rule.name, rule.field, rule.operator, rule.threshold
            ));
        }
    }

    for rule in ctx
        .registry
        .rules()
        .iter()
        .filter(|rule| rule.is_active() && rule.severity == Severity::Hard)
    {
        checked += 1;
        let verdict = evaluate_rule(rule, ctx.applicant);
        if verdict.result.failed() {
            fired.push(rule.id.clone());
            reasons.push(verdict.result.message);
        }
    }

    if fired.is_empty() {
        run.record(
            STEP_KNOCKOUT,
            StepOutcome::Pass,
            format!("{checked} knock-out rule(s) passed or skipped"),
            Vec::new(),
        );
        return false;
    }

    run.record(
        STEP_KNOCKOUT,
        StepOutcome::Decline,
        format!("{} of {checked} knock-out rule(s) failed", fired.len()),
        fired.clone(),
    );
    run.reason_codes.extend(fired);
    run.reasons.extend(reasons);
    true
}

#[derive(Debug, Default)]
struct OverlayHits {
    declines: Vec<String>,
    refers: Vec<String>,
    upgrades: Vec<String>,
}

fn overlays(rules: &[StrategyRule], ctx: &DecisionContext<'_>, run: &mut Run) -> OverlayHits {
    let mut hits = OverlayHits::default();
    for rule in rules {
        let Some(holds) = rule.holds(ctx.applicant) else {
            continue;
        };
        match (rule.action, holds) {
            (OverlayAction::Decline, false) => {
                hits.declines.push(rule.id.clone());
                run.reasons.push(format!("{}: overlay decline", rule.name));
            }
            (OverlayAction::Refer, false) => {
                hits.refers.push(rule.id.clone());
                run.reasons.push(format!("{}: overlay refer", rule.name));
            }
            (OverlayAction::Upgrade, true) => hits.upgrades.push(rule.id.clone()),
            _ => {}
        }
    }
    hits
}

/// `+weight` for a satisfied rule, `-weight` for a failed one, nothing for missing data.
/// Upgrade rules only ever add.
fn weighted_total(rules: &[&StrategyRule], ctx: &DecisionContext<'_>, run: &mut Run) -> f64 {
    let mut total = 0.0;
    let mut failed = Vec::new();
    let mut skipped = 0usize;

    for rule in rules {
        match (rule.holds(ctx.applicant), rule.action) {
            (Some(true), _) => total += rule.weight,
            (Some(false), OverlayAction::Upgrade) => {}
            (Some(false), _) => {
                total -= rule.weight;
                failed.push(rule.id.clone());
            }
            (None, _) => skipped += 1,
        }
    }

    run.record(
        STEP_WEIGHTED,
        StepOutcome::Pass,
        format!(
            "{} rule(s) weighted to {total:.2}, {} failed, {skipped} skipped",
            rules.len(),
            failed.len()
        ),
        failed.clone(),
    );
    run.reason_codes.extend(failed);
    total
}

fn classify(strategy: &StrategyConfig, total: f64, run: &mut Run) -> Resolution {
    let outcome = if total >= strategy.cutoffs.approve {
        StrategyOutcome::Approve
    } else if total >= strategy.cutoffs.refer {
        StrategyOutcome::Refer
    } else {
        StrategyOutcome::Decline
    };
    run.record(
        STEP_OUTPUT,
        outcome.into(),
        format!(
            "weighted score {total:.2} against cut-offs approve {:.2} / refer {:.2}",
            strategy.cutoffs.approve, strategy.cutoffs.refer
        ),
        Vec::new(),
    );
    if outcome != StrategyOutcome::Approve {
        run.reasons
            .push(format!("weighted score {total:.2} below approval cut-off"));
    }
    (outcome, detail_for(outcome), None)
}
