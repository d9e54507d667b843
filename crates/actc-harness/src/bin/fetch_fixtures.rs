use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use actc_error::HarnessError;
use actc_harness::fetch::{FetchConfig, FetchPipeline, FetchReport};
use actc_harness::http::ReqwestClient;
use actc_harness::process::{CommandSpec, ProcessMarkupParser, ProcessScraperFactory};
use actc_harness::registry::select_sources;
use actc_harness::telemetry::init_tracing;
use clap::Parser;
use tracing::{error, info};

/// Freeze upstream ACT rules test cases into fixture files.
#[derive(Debug, Parser)]
#[command(name = "fetch_fixtures", version)]
struct Cli {
    /// Registries to fetch ("old", "new"); none means both.
    sources: Vec<String>,

    /// Fixture root; each source lands in `<out>/<source>`.
    #[arg(long, default_value = "test/fixtures")]
    out: PathBuf,

    /// Scraper program speaking the JSON-lines protocol.
    #[arg(long, env = "ACTC_SCRAPER")]
    scraper: String,

    /// Extra argument for the scraper (repeatable).
    #[arg(long = "scraper-arg", allow_hyphen_values = true)]
    scraper_args: Vec<String>,

    /// Markup parser program; defaults to the scraper program.
    #[arg(long, env = "ACTC_PARSER")]
    parser: Option<String>,

    /// Extra argument for the markup parser (repeatable).
    #[arg(long = "parser-arg", allow_hyphen_values = true)]
    parser_args: Vec<String>,

    /// Pause between two fetches, in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Keep existing fixtures instead of cleaning the output directories.
    #[arg(long)]
    no_clean: bool,

    /// Log as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn run(cli: &Cli) -> Result<FetchReport, HarnessError> {
    let sources = select_sources(&cli.sources)?;
    let http = ReqwestClient::new()?;
    let parser_command = match &cli.parser {
        Some(program) => CommandSpec::new(program.clone(), cli.parser_args.clone()),
        None => CommandSpec::new(cli.scraper.clone(), cli.scraper_args.clone()),
    };
    let mut parser = ProcessMarkupParser::spawn(&parser_command)?;
    let mut scrapers =
        ProcessScraperFactory::new(CommandSpec::new(cli.scraper.clone(), cli.scraper_args.clone()));
    let config = FetchConfig {
        delay: Duration::from_millis(cli.delay_ms),
        clean: !cli.no_clean,
    };

    let mut total = FetchReport::default();
    {
        let mut pipeline = FetchPipeline::new(&http, &mut parser, &mut scrapers, config);
        for source in &sources {
            info!(source = source.name, "fetching test cases");
            total.absorb(pipeline.fetch_source(source, &cli.out)?);
        }
    }
    parser.shutdown()?;
    Ok(total)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);
    match run(&cli) {
        Ok(report) if report.is_clean() => {
            info!(
                attempted = report.attempted,
                written = report.written.len(),
                recovered = report.first_pass_failures,
                "all test cases fetched"
            );
            ExitCode::SUCCESS
        }
        Ok(report) => {
            for failure in &report.unresolved {
                error!(
                    rule = %failure.item.descriptor.rule_id,
                    fixture = %failure.item.descriptor.fixture_id,
                    url = %failure.item.descriptor.url,
                    error = %failure.error,
                    "not fetched"
                );
            }
            eprintln!(
                "ERROR fetch_fixtures: {} of {} test cases still failing after two attempts",
                report.unresolved.len(),
                report.attempted
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("ERROR fetch_fixtures failed: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
