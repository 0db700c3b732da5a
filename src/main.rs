use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use judge_harness::config::Config;
use judge_harness::eval_log::EvaluationLog;
use judge_harness::output::{self, OutputFormat};
use judge_harness::rubric::Rubric;
use judge_harness::runner::Runner;

/// LLM-as-a-judge harness - grade answers against a rubric and log the scores
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML run file
    run_file: PathBuf,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - log every request and extracted score
    #[arg(short, long)]
    verbose: bool,

    /// Print the evaluation log instead of running the cases
    #[arg(long)]
    history: bool,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("judge_harness={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Config::from_file(&args.run_file)?;
    let rubric = Rubric::new(config.judge.rubric);

    if args.history {
        let log = EvaluationLog::new(&config.log_path, rubric.clone());
        let records = log.history()?;
        output::print_history(&records, &rubric, args.output);
        return Ok(());
    }

    let runner = Runner::from_config(config)?;
    let summary = runner.run_all().await?;

    output::print_summary(&summary, &rubric, args.output);

    Ok(())
}
