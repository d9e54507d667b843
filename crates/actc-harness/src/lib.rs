//! ACT rules conformance harness.
//!
//! - [`fetch`]: freezes upstream test cases into content-addressed fixtures,
//!   with a single batch retry against a fresh scraper.
//! - [`oracle`]: answers evaluation-time questions from pre-recorded data.
//! - [`reconcile`]: grades engine verdicts against expected verdicts under
//!   the fixture's annotations and the run's strictness.
//! - [`runner`] and [`report`]: drive a suite and emit an EARL report.

pub mod dom_path;
pub mod engine;
pub mod fetch;
pub mod fixture_store;
pub mod headers;
pub mod http;
pub mod oracle;
pub mod process;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod retry;
pub mod runner;
pub mod suite;
pub mod telemetry;

pub use dom_path::NodeIndex;
pub use engine::{Engine, EngineOutcome, reduce_outcomes};
pub use fetch::{
    FetchConfig, FetchItem, FetchPipeline, FetchReport, FetchStrategy, HttpClient, MarkupParser,
    Scraper, ScraperFactory,
};
pub use oracle::{FixtureOracle, Oracle, UnansweredQuestion, UnansweredReason};
pub use reconcile::{
    CaseDecision, Diagnostic, HarnessMode, Policy, Reconciled, classify, reconcile,
};
pub use registry::{RuleBatch, SOURCES, Source, TestCaseDescriptor};
pub use retry::{Failure, Phase, TwoPhaseReport, run_with_single_retry};
pub use runner::{
    CaseReport, OutcomeLedger, RecordedOutcome, RecordedResult, RuleReport, SuiteRun, run_rule,
    run_suite,
};
pub use suite::{RuleEntry, SuiteConfig};
