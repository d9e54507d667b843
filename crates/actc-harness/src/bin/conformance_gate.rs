use std::path::PathBuf;
use std::process::ExitCode;

use actc_error::HarnessError;
use actc_harness::process::{CommandSpec, ProcessEngine};
use actc_harness::reconcile::{HarnessMode, Policy};
use actc_harness::report::{build_report, write_report};
use actc_harness::runner::{SuiteRun, run_suite};
use actc_harness::suite::SuiteConfig;
use actc_harness::telemetry::init_tracing;
use clap::Parser;

/// Replay fixtures through the engine and grade its verdicts.
#[derive(Debug, Parser)]
#[command(name = "conformance_gate", version)]
struct Cli {
    /// Suite configuration (TOML).
    suite: PathBuf,

    /// Fail on stale annotations, unannotated lax matches and, in assisted
    /// mode, unresolved `cantTell` verdicts.
    #[arg(long)]
    strict: bool,

    /// Override the suite's harness mode.
    #[arg(long, value_enum)]
    mode: Option<HarnessMode>,

    /// Engine program speaking the JSON-lines protocol.
    #[arg(long, env = "ACTC_ENGINE")]
    engine: String,

    /// Extra argument for the engine (repeatable).
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Override the suite's report path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn run(cli: &Cli) -> Result<SuiteRun, HarnessError> {
    let suite = SuiteConfig::load(&cli.suite)?;
    let policy = Policy {
        strict: cli.strict,
        mode: cli.mode.unwrap_or(suite.mode),
    };
    let mut engine = ProcessEngine::spawn(&CommandSpec::new(cli.engine.clone(), cli.engine_args.clone()))?;
    let run = run_suite(&suite, &mut engine, &policy)?;
    engine.shutdown()?;

    if let Some(path) = cli.report.as_ref().or(suite.report.as_ref()) {
        let report = build_report(&suite.assertor, run.ledger.outcomes());
        write_report(path, &report)?;
    }
    Ok(run)
}

fn print_summary(run: &SuiteRun) {
    println!(
        "{:<10} {:>8} {:>8} {:>8} {:>12}",
        "rule", "passed", "failed", "skipped", "diagnostics"
    );
    for report in &run.reports {
        println!(
            "{:<10} {:>8} {:>8} {:>8} {:>12}",
            report.rule_id,
            report.passed(),
            report.failed(),
            report.skipped_failures(),
            report.diagnostic_count()
        );
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);
    match run(&cli) {
        Ok(run) => {
            print_summary(&run);
            if run.is_success() {
                ExitCode::SUCCESS
            } else {
                eprintln!("ERROR conformance_gate: {} test case(s) failed", run.failed());
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("ERROR conformance_gate failed: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
