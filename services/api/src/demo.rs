use crate::infra::{
    parse_number_list, read_json, sample_scorecard, InMemoryConfigStore, InMemoryDecisionJournal,
    NumberList, SAMPLE_STRATEGY_ID,
};
use chrono::Utc;
use clap::Args;
use credit_engine::config::EngineConfig;
use credit_engine::decision::scorecard::ScorecardImportError;
use credit_engine::decision::{
    generate_script, parse_script, ApplicantData, CreditDecisionService, DecisionRequest,
    PerformanceReport, RoutingParams, Scorecard, ScoringEngine, StrategyOutcome,
    TabularScorecardImporter,
};
use credit_engine::error::AppError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DecideArgs {
    /// Applicant data as a JSON object of field -> value
    #[arg(long)]
    pub(crate) applicant: PathBuf,
    /// Strategy to run
    #[arg(long, default_value = SAMPLE_STRATEGY_ID)]
    pub(crate) strategy: String,
    /// Application identifier recorded in the journal
    #[arg(long, default_value = "CLI-0001")]
    pub(crate) application_id: String,
    /// Cap the approved amount
    #[arg(long)]
    pub(crate) max_amount: Option<f64>,
    /// Force a pricing tier by name
    #[arg(long)]
    pub(crate) force_tier: Option<String>,
    /// Refer instead of auto-approving
    #[arg(long)]
    pub(crate) block_auto_approve: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Applicant data as a JSON object of field -> value
    #[arg(long)]
    pub(crate) applicant: PathBuf,
    /// Scorecard JSON (defaults to the bundled retail scorecard)
    #[arg(long)]
    pub(crate) scorecard: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ScriptGenerateArgs {
    /// Scorecard JSON (defaults to the bundled retail scorecard)
    #[arg(long)]
    pub(crate) scorecard: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ScriptParseArgs {
    /// Script file to parse
    pub(crate) script: PathBuf,
    /// Scorecard JSON the parsed script is applied to
    #[arg(long)]
    pub(crate) scorecard: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ScriptImportArgs {
    /// CSV sheet with Characteristic, Attribute, Points and optional Notes columns
    pub(crate) csv: PathBuf,
    /// Scorecard JSON the imported characteristics replace
    #[arg(long)]
    pub(crate) scorecard: Option<PathBuf>,
    /// Print the result as a scoring script instead of JSON
    #[arg(long)]
    pub(crate) as_script: bool,
}

#[derive(Args, Debug)]
pub(crate) struct AnalyticsArgs {
    /// JSON file with `scores` and `outcomes` (true = bad) arrays
    #[arg(long)]
    pub(crate) sample: PathBuf,
    /// Score band edges, e.g. 500,600,700
    #[arg(long, value_parser = parse_number_list)]
    pub(crate) edges: Option<NumberList>,
    /// Baseline band distribution in percent, one value per band
    #[arg(long, value_parser = parse_number_list)]
    pub(crate) expected: Option<NumberList>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of synthetic applications to decide
    #[arg(long, default_value_t = 200)]
    pub(crate) applications: usize,
    /// Seed for applicant generation and champion/challenger routing
    #[arg(long, default_value_t = 42)]
    pub(crate) seed: u64,
    /// Print every decision instead of the portfolio summary only
    #[arg(long)]
    pub(crate) verbose: bool,
}

#[derive(Debug, Deserialize)]
struct PerformanceSample {
    scores: Vec<f64>,
    outcomes: Vec<bool>,
}

fn load_scorecard(path: Option<&Path>) -> Result<Scorecard, AppError> {
    match path {
        Some(path) => read_json(path),
        None => Ok(sample_scorecard()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn run_decide(args: DecideArgs) -> Result<(), AppError> {
    let applicant: ApplicantData = read_json(&args.applicant)?;
    let service = CreditDecisionService::new(
        Arc::new(InMemoryConfigStore::sample()),
        Arc::new(InMemoryDecisionJournal::default()),
        &EngineConfig::from_env()?,
    );

    let record = service.decide(DecisionRequest {
        application_id: args.application_id,
        strategy_id: args.strategy,
        applicant,
        routing: RoutingParams {
            max_approved_amount: args.max_amount,
            force_tier: args.force_tier,
            block_auto_approve: args.block_auto_approve,
        },
    })?;

    print_json(&record)
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let applicant: ApplicantData = read_json(&args.applicant)?;
    let scorecard = load_scorecard(args.scorecard.as_deref())?;
    let config = EngineConfig::from_env()?;

    let result = ScoringEngine::new(config.max_reason_codes).score(&scorecard, &applicant);
    print_json(&result)
}

pub(crate) fn run_script_generate(args: ScriptGenerateArgs) -> Result<(), AppError> {
    let scorecard = load_scorecard(args.scorecard.as_deref())?;
    print!("{}", generate_script(&scorecard));
    Ok(())
}

pub(crate) fn run_script_parse(args: ScriptParseArgs) -> Result<(), AppError> {
    let script = std::fs::read_to_string(&args.script)?;
    let base = load_scorecard(args.scorecard.as_deref())?;

    let scorecard = parse_script(&script)
        .apply_to(&base)
        .map_err(ScorecardImportError::Invalid)?;
    print_json(&scorecard)
}

pub(crate) fn run_script_import(args: ScriptImportArgs) -> Result<(), AppError> {
    let imported = TabularScorecardImporter::from_path(&args.csv)?;
    let base = load_scorecard(args.scorecard.as_deref())?;
    let scorecard = imported.apply_to(&base);

    for warning in &imported.warnings {
        eprintln!("warning: {warning}");
    }
    for issue in scorecard.validate() {
        eprintln!("{}: {issue}", if issue.is_error() { "error" } else { "warning" });
    }

    if args.as_script {
        print!("{}", generate_script(&scorecard));
        Ok(())
    } else {
        print_json(&scorecard)
    }
}

pub(crate) fn run_analytics(args: AnalyticsArgs) -> Result<(), AppError> {
    let sample: PerformanceSample = read_json(&args.sample)?;
    let edges = args.edges.unwrap_or_default();
    let expected = args.expected.unwrap_or_default();

    let report =
        PerformanceReport::build(&sample.scores, &sample.outcomes, &edges.0, &expected.0)?;
    render_report(&report);
    Ok(())
}

fn render_report(report: &PerformanceReport) {
    println!(
        "Sample: {} accounts | {} bad ({:.1}%)",
        report.sample_size,
        report.bad_count,
        report.bad_rate * 100.0
    );
    println!("Gini {:.3} | KS {:.3}", report.gini, report.ks);
    println!("IV {:.3} ({})", report.iv, report.strength.label());
    match (report.psi, report.drift) {
        (Some(psi), Some(drift)) => println!("PSI {:.3} ({})", psi, drift.label()),
        _ => println!("PSI not computed (no baseline distribution)"),
    }
    println!("Bands:");
    for band in &report.bands {
        println!(
            "  - {:>10}: {:>5} accounts ({:>5.1}%) | {:>4} bad",
            band.label, band.count, band.pct, band.bad_count
        );
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        applications,
        seed,
        verbose,
    } = args;

    let config = EngineConfig {
        router_seed: Some(seed),
        ..EngineConfig::default()
    };
    let service = CreditDecisionService::new(
        Arc::new(InMemoryConfigStore::sample()),
        Arc::new(InMemoryDecisionJournal::default()),
        &config,
    );
    let mut rng = StdRng::seed_from_u64(seed);

    println!(
        "Credit decision demo ({} applications, seed {}, {})",
        applications,
        seed,
        Utc::now().format("%Y-%m-%d")
    );

    let mut outcomes: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut routed: BTreeMap<String, usize> = BTreeMap::new();
    let mut scores = Vec::new();
    let mut bads = Vec::new();

    for index in 0..applications {
        let applicant = synthetic_applicant(&mut rng);
        let record = service.decide(DecisionRequest {
            application_id: format!("DEMO-{index:05}"),
            strategy_id: SAMPLE_STRATEGY_ID.to_string(),
            applicant,
            routing: RoutingParams::default(),
        })?;

        *outcomes.entry(record.result.outcome.label()).or_default() += 1;
        if let Some(id) = &record.decisioning_scorecard {
            *routed.entry(id.clone()).or_default() += 1;
        }
        if verbose {
            println!("- {} -> {}", record.application_id, record.result.summary());
        }

        // Simulated performance: default odds fall as the champion score rises.
        if record.result.outcome == StrategyOutcome::Approve {
            if let Some(champion) = record
                .model_scores
                .iter()
                .find(|score| score.scorecard_id == "retail-v1")
            {
                let score = champion.result.total_score;
                let bad_probability = ((700.0 - score) / 400.0).clamp(0.02, 0.6);
                scores.push(score);
                bads.push(rng.gen_bool(bad_probability));
            }
        }
    }

    println!("\nOutcomes:");
    for (outcome, count) in &outcomes {
        println!("  - {outcome}: {count}");
    }
    println!("Decisioning scorecards:");
    for (id, count) in &routed {
        println!(
            "  - {id}: {count} ({:.1}%)",
            *count as f64 / applications.max(1) as f64 * 100.0
        );
    }

    println!("\nApproved book monitoring (simulated outcomes)");
    let edges = [550.0, 600.0, 650.0];
    let report = PerformanceReport::build(&scores, &bads, &edges, &[10.0, 20.0, 40.0, 30.0])?;
    render_report(&report);
    Ok(())
}

fn synthetic_applicant(rng: &mut StdRng) -> ApplicantData {
    const OCCUPATIONS: [&str; 4] = ["Professional", "Self-Employed", "Clerk", "Driver"];
    const CHANNELS: [&str; 3] = ["Payroll", "Over the Counter", "Online"];
    const REGIONS: [&str; 3] = ["NCR", "Luzon", "Visayas"];

    let monthly_income = f64::from(rng.gen_range(12..150u32)) * 1_000.0;
    let term_months = f64::from([12u32, 24, 36, 48][rng.gen_range(0..4)]);
    let loan_amount = f64::from(rng.gen_range(20..900u32)) * 1_000.0;

    ApplicantData::new()
        .with("age", f64::from(rng.gen_range(19..64u32)))
        .with("term_months", term_months)
        .with("monthly_income", monthly_income)
        .with("years_employed", f64::from(rng.gen_range(0..25u32)))
        .with("monthly_obligations", monthly_income * rng.gen_range(0.0..0.3))
        .with("proposed_installment", loan_amount / term_months)
        .with("credit_score", f64::from(rng.gen_range(520..830u32)))
        .with("max_dpd", f64::from([0u32, 0, 0, 15, 45][rng.gen_range(0..5)]))
        .with("has_written_off_accounts", rng.gen_bool(0.03))
        .with("bankruptcy_flag", rng.gen_bool(0.01))
        .with("is_blacklisted", rng.gen_bool(0.01))
        .with("watchlist_hit", rng.gen_bool(0.02))
        .with("loan_amount", loan_amount)
        .with("employment_type", if rng.gen_bool(0.8) { "regular" } else { "contractual" })
        .with("residency_status", "citizen")
        .with("active_loans", f64::from(rng.gen_range(0..5u32)))
        .with("inquiries_6m", f64::from(rng.gen_range(0..7u32)))
        .with("occupation", OCCUPATIONS[rng.gen_range(0..OCCUPATIONS.len())])
        .with("payment_channel", CHANNELS[rng.gen_range(0..CHANNELS.len())])
        .with("region", REGIONS[rng.gen_range(0..REGIONS.len())])
}
