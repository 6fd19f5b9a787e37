use std::collections::BTreeMap;

use super::common::*;
use crate::decision::applicant::ApplicantData;
use crate::decision::rules::{
    evaluate_rule, Operator, Rule, RuleCheck, RuleEvaluator, RuleInput, RuleOutcome,
    RuleOverride, RuleRegistry, RuleStatus, RulesConfig, RulesOutcome, Severity, Threshold,
};

fn input(applicant: ApplicantData) -> RuleInput {
    RuleInput {
        applicant,
        score: None,
    }
}

fn gig_rule(is_custom: bool) -> Rule {
    Rule {
        id: "X01".to_string(),
        name: "Gig work".to_string(),
        field: "employment_type".to_string(),
        operator: Operator::Eq,
        threshold: Threshold::Text("gig".to_string()),
        outcome: RuleOutcome::Decline,
        severity: Severity::Hard,
        enabled: true,
        is_custom,
        check: RuleCheck::Comparison,
    }
}

#[test]
fn clean_applicant_is_auto_approved_with_pricing() {
    let output = RuleEvaluator::default().evaluate(&input(clean_applicant()), &RuleRegistry::builtin());

    assert_eq!(output.outcome, RulesOutcome::AutoApprove);
    assert!(output.reasons.is_empty(), "{:?}", output.reasons);
    assert_eq!(output.results.len(), 21);
    assert_eq!(output.suggested_rate, Some(18.0));
    assert_eq!(output.max_eligible_amount, Some(720_000.0));
}

#[test]
fn hard_failure_declines_but_every_rule_is_recorded() {
    let applicant = clean_applicant().with("is_blacklisted", true).with("watchlist_hit", true);

    let output = RuleEvaluator::default().evaluate(&input(applicant), &RuleRegistry::builtin());

    assert_eq!(output.outcome, RulesOutcome::AutoDecline);
    assert_eq!(output.results.len(), 21);
    let failed: Vec<&str> = output
        .results
        .iter()
        .filter(|result| result.failed())
        .map(|result| result.rule_id.as_str())
        .collect();
    assert_eq!(failed, vec!["R13", "R14"]);
}

#[test]
fn refer_failure_routes_to_manual_review() {
    let applicant = clean_applicant().with("active_loans", 5.0);

    let output = RuleEvaluator::default().evaluate(&input(applicant), &RuleRegistry::builtin());

    assert_eq!(output.outcome, RulesOutcome::ManualReview);
}

#[test]
fn soft_failure_blocks_auto_approval() {
    let applicant = clean_applicant().with("inquiries_6m", 9.0);

    let output = RuleEvaluator::default().evaluate(&input(applicant), &RuleRegistry::builtin());

    assert_eq!(output.outcome, RulesOutcome::ManualReview);
}

#[test]
fn low_score_without_failures_is_reviewed() {
    let output = RuleEvaluator::new(RulesConfig {
        auto_approve_score: 750.0,
    })
    .evaluate(&input(clean_applicant()), &RuleRegistry::builtin());

    assert_eq!(output.outcome, RulesOutcome::ManualReview);
}

#[test]
fn missing_data_is_skipped_never_failed() {
    let output = RuleEvaluator::default().evaluate(&input(ApplicantData::new()), &RuleRegistry::builtin());

    assert!(output
        .results
        .iter()
        .all(|result| result.status == RuleStatus::Skipped));
    assert_eq!(output.outcome, RulesOutcome::ManualReview);
}

#[test]
fn custom_rules_fail_when_their_condition_matches() {
    let gig = ApplicantData::new().with("employment_type", "GIG");
    let regular = ApplicantData::new().with("employment_type", "regular");

    assert_eq!(evaluate_rule(&gig_rule(true), &gig).result.status, RuleStatus::Failed);
    assert_eq!(evaluate_rule(&gig_rule(true), &regular).result.status, RuleStatus::Passed);
    assert_eq!(evaluate_rule(&gig_rule(false), &gig).result.status, RuleStatus::Passed);
    assert_eq!(evaluate_rule(&gig_rule(false), &regular).result.status, RuleStatus::Failed);
}

#[test]
fn disabled_rules_are_recorded_as_skipped() {
    let mut overrides = BTreeMap::new();
    overrides.insert(
        "R13".to_string(),
        RuleOverride {
            outcome: Some(RuleOutcome::Disable),
            ..RuleOverride::default()
        },
    );
    let registry = RuleRegistry::builtin().with_overrides(&overrides);
    let applicant = clean_applicant().with("is_blacklisted", true);

    let output = RuleEvaluator::default().evaluate(&input(applicant), &registry);

    assert_eq!(output.results.len(), 21);
    let blacklist = output
        .results
        .iter()
        .find(|result| result.rule_id == "R13")
        .expect("R13 recorded");
    assert_eq!(blacklist.status, RuleStatus::Skipped);
    assert!(blacklist.message.contains("disabled"));
    assert_eq!(output.outcome, RulesOutcome::AutoApprove);
}

#[test]
fn unsupported_checks_are_not_evaluated() {
    let mut rule = gig_rule(false);
    rule.check = RuleCheck::from("velocity_window".to_string());

    let verdict = evaluate_rule(&rule, &ApplicantData::new().with("employment_type", "gig"));

    assert_eq!(verdict.result.status, RuleStatus::NotEvaluated);
    assert!(!verdict.result.failed());
}

#[test]
fn derived_dsr_drives_the_ceiling_rules() {
    let applicant = clean_applicant()
        .with("monthly_obligations", 20_000.0)
        .with("proposed_installment", 12_000.0);

    let output = RuleEvaluator::default().evaluate(&input(applicant), &RuleRegistry::builtin());

    assert_eq!(output.outcome, RulesOutcome::AutoDecline);
    let r06 = output
        .results
        .iter()
        .find(|result| result.rule_id == "R06")
        .expect("R06 recorded");
    assert_eq!(r06.status, RuleStatus::Failed);
}

#[test]
fn custom_rule_loaded_from_overrides_declines() {
    let mut overrides = BTreeMap::new();
    overrides.insert(
        "C01".to_string(),
        RuleOverride {
            name: Some("Block gig workers".to_string()),
            field: Some("employment_type".to_string()),
            operator: Some(Operator::Eq),
            threshold: Some(Threshold::Text("regular".to_string())),
            outcome: Some(RuleOutcome::Decline),
            severity: Some(Severity::Hard),
            enabled: None,
        },
    );
    let registry = RuleRegistry::builtin().with_overrides(&overrides);

    let output = RuleEvaluator::default().evaluate(&input(clean_applicant()), &registry);

    assert_eq!(output.outcome, RulesOutcome::AutoDecline);
    assert!(output.reasons.iter().any(|reason| reason.contains("triggered")));
}
