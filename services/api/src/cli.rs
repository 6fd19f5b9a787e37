use crate::demo::{
    run_analytics, run_decide, run_demo, run_score, run_script_generate, run_script_import,
    run_script_parse, AnalyticsArgs, DecideArgs, DemoArgs, ScoreArgs, ScriptGenerateArgs,
    ScriptImportArgs, ScriptParseArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use credit_engine::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Credit Decision Engine",
    about = "Run and exercise the credit decision engine from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Decide one application against the bundled strategy
    Decide(DecideArgs),
    /// Score an applicant on a scorecard without running a strategy
    Score(ScoreArgs),
    /// Author scorecards as scripts or tabular sheets
    Script {
        #[command(subcommand)]
        command: ScriptCommand,
    },
    /// Compute Gini, KS, IV and PSI for a scored sample
    Analytics(AnalyticsArgs),
    /// Run a synthetic book of applications through routing, decisioning and monitoring
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum ScriptCommand {
    /// Print the scoring script for a scorecard
    Generate(ScriptGenerateArgs),
    /// Parse a scoring script and print the resulting scorecard
    Parse(ScriptParseArgs),
    /// Import a Characteristic/Attribute/Points CSV sheet
    Import(ScriptImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Decide(args) => run_decide(args),
        Command::Score(args) => run_score(args),
        Command::Script {
            command: ScriptCommand::Generate(args),
        } => run_script_generate(args),
        Command::Script {
            command: ScriptCommand::Parse(args),
        } => run_script_parse(args),
        Command::Script {
            command: ScriptCommand::Import(args),
        } => run_script_import(args),
        Command::Analytics(args) => run_analytics(args),
        Command::Demo(args) => run_demo(args),
    }
}
