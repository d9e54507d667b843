//! Replays fixtures through the engine and reconciles each verdict.
//!
//! Every fixture processed lands in the [`OutcomeLedger`] regardless of its
//! decision, XML fixtures included (as unevaluable records). The ledger is
//! owned by whoever drives the run and is only appended to.

use std::collections::BTreeSet;
use std::path::Path;

use actc_error::Result;
use actc_types::{Fixture, FixtureId, FixtureKind, IgnoredFixture, Reconciliation, TestFixture, Verdict};
use tracing::{debug, info, info_span};

use crate::dom_path::NodeIndex;
use crate::engine::{Engine, reduce_outcomes};
use crate::fixture_store::{self, rule_dir};
use crate::oracle::{FixtureOracle, Oracle};
use crate::reconcile::{CaseDecision, Diagnostic, HarnessMode, Policy, reconcile};
use crate::suite::{RuleEntry, SuiteConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedResult {
    Evaluated {
        actual: Verdict,
        expected: Verdict,
        classification: Reconciliation,
        decision: CaseDecision,
    },
    /// Non-HTML fixture; reported as "cannot tell".
    Unevaluable,
}

/// One fixture as it will appear in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOutcome {
    pub rule_id: String,
    pub engine_rule: String,
    pub test_uri: String,
    pub fixture: FixtureId,
    pub page_url: Option<String>,
    pub result: RecordedResult,
}

/// Append-only record of every fixture processed in one run.
#[derive(Debug, Clone, Default)]
pub struct OutcomeLedger {
    outcomes: Vec<RecordedOutcome>,
}

impl OutcomeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: RecordedOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[RecordedOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    pub fixture: FixtureId,
    pub kind: FixtureKind,
    /// `None` for fixtures that are never evaluated.
    pub classification: Option<Reconciliation>,
    pub decision: CaseDecision,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    pub rule_id: String,
    pub cases: Vec<CaseReport>,
    /// Findings not tied to a present fixture (dangling annotations).
    pub diagnostics: Vec<Diagnostic>,
}

impl RuleReport {
    fn count(&self, decision: CaseDecision) -> usize {
        self.cases.iter().filter(|case| case.decision == decision).count()
    }

    pub fn passed(&self) -> usize {
        self.count(CaseDecision::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(CaseDecision::Fail)
    }

    pub fn skipped_failures(&self) -> usize {
        self.count(CaseDecision::SkippedFailure)
    }

    /// Diagnostics that call for attention, across cases and the rule.
    pub fn diagnostic_count(&self) -> usize {
        self.all_diagnostics()
            .filter(|diagnostic| !diagnostic.is_informational())
            .count()
    }

    pub fn all_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.cases
            .iter()
            .flat_map(|case| &case.diagnostics)
            .chain(&self.diagnostics)
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Evaluate every fixture of `rule` under `fixture_root`.
pub fn run_rule(
    fixture_root: &Path,
    rule: &RuleEntry,
    engine: &mut dyn Engine,
    policy: &Policy,
    ledger: &mut OutcomeLedger,
) -> Result<RuleReport> {
    let span = info_span!("rule", rule = %rule.id, engine_rule = %rule.engine_rule);
    let _guard = span.enter();

    let fixtures = fixture_store::list(&rule_dir(fixture_root, &rule.id))?;
    let test_uri = rule.test_uri();
    let mut cases = Vec::with_capacity(fixtures.len());
    for fixture in &fixtures {
        let case = match fixture {
            Fixture::Test(test) | Fixture::Redirect(test) => {
                evaluate_case(rule, &test_uri, fixture.kind(), test, engine, policy, ledger)?
            }
            Fixture::Xml(ignored) => record_unevaluable(rule, &test_uri, ignored, ledger),
        };
        for diagnostic in &case.diagnostics {
            diagnostic.emit(&rule.id);
        }
        cases.push(case);
    }

    let present: BTreeSet<&FixtureId> = fixtures.iter().map(Fixture::id).collect();
    let diagnostics: Vec<Diagnostic> = rule
        .options
        .referenced_ids()
        .into_iter()
        .filter(|id| !present.contains(id))
        .map(|id| Diagnostic::DanglingAnnotation { fixture: id.clone() })
        .collect();
    for diagnostic in &diagnostics {
        diagnostic.emit(&rule.id);
    }

    let report = RuleReport {
        rule_id: rule.id.clone(),
        cases,
        diagnostics,
    };
    info!(
        fixtures = report.cases.len(),
        passed = report.passed(),
        failed = report.failed(),
        skipped = report.skipped_failures(),
        diagnostics = report.diagnostic_count(),
        "rule finished"
    );
    Ok(report)
}

fn evaluate_case(
    rule: &RuleEntry,
    test_uri: &str,
    kind: FixtureKind,
    test: &TestFixture,
    engine: &mut dyn Engine,
    policy: &Policy,
    ledger: &mut OutcomeLedger,
) -> Result<CaseReport> {
    let nodes = NodeIndex::from_page(&test.page);
    let table = rule.options.answer_table(&test.id);
    let page_url = test.page.url().map(str::to_owned);
    let label = page_url.clone().unwrap_or_else(|| test.id.to_string());
    // an automated run only consults the oracle for fixtures that have answers
    let with_oracle = policy.mode == HarnessMode::Assisted || table.is_some();
    let mut oracle = FixtureOracle::new(label, table, &nodes);

    let outcomes = engine.evaluate(
        &test.page,
        &rule.engine_rule,
        with_oracle.then_some(&mut oracle as &mut dyn Oracle),
    )?;
    let actual = reduce_outcomes(&rule.engine_rule, &outcomes);
    let reconciled = reconcile(
        &test.id,
        actual,
        test.outcome,
        rule.options.annotations_for(&test.id),
        *policy,
    );
    debug!(
        fixture = %test.id,
        %actual,
        expected = %test.outcome,
        classification = %reconciled.classification,
        decision = reconciled.decision.as_str(),
        "case reconciled"
    );

    let mut diagnostics = reconciled.diagnostics;
    diagnostics.extend(oracle.unanswered().iter().map(|question| {
        Diagnostic::UnansweredQuestion {
            fixture: test.id.clone(),
            uri: question.uri.clone(),
            subject: question.subject.clone(),
        }
    }));
    diagnostics.extend(oracle.unused_entries().into_iter().map(|(uri, path)| {
        Diagnostic::UnusedAnswer {
            fixture: test.id.clone(),
            uri,
            path,
        }
    }));

    ledger.record(RecordedOutcome {
        rule_id: rule.id.clone(),
        engine_rule: rule.engine_rule.clone(),
        test_uri: test_uri.to_owned(),
        fixture: test.id.clone(),
        page_url,
        result: RecordedResult::Evaluated {
            actual,
            expected: test.outcome,
            classification: reconciled.classification,
            decision: reconciled.decision,
        },
    });

    Ok(CaseReport {
        fixture: test.id.clone(),
        kind,
        classification: Some(reconciled.classification),
        decision: reconciled.decision,
        diagnostics,
    })
}

fn record_unevaluable(
    rule: &RuleEntry,
    test_uri: &str,
    ignored: &IgnoredFixture,
    ledger: &mut OutcomeLedger,
) -> CaseReport {
    ledger.record(RecordedOutcome {
        rule_id: rule.id.clone(),
        engine_rule: rule.engine_rule.clone(),
        test_uri: test_uri.to_owned(),
        fixture: ignored.id.clone(),
        page_url: Some(ignored.url.clone()),
        result: RecordedResult::Unevaluable,
    });
    CaseReport {
        fixture: ignored.id.clone(),
        kind: FixtureKind::Xml,
        classification: None,
        decision: CaseDecision::Pass,
        diagnostics: vec![Diagnostic::Unevaluable {
            fixture: ignored.id.clone(),
            url: ignored.url.clone(),
        }],
    }
}

/// Result of running a whole suite.
#[derive(Debug, Clone, Default)]
pub struct SuiteRun {
    pub reports: Vec<RuleReport>,
    pub ledger: OutcomeLedger,
}

impl SuiteRun {
    pub fn failed(&self) -> usize {
        self.reports.iter().map(RuleReport::failed).sum()
    }

    pub fn is_success(&self) -> bool {
        self.reports.iter().all(RuleReport::is_success)
    }
}

/// Run every rule of `suite` in order, sharing one ledger.
pub fn run_suite(suite: &SuiteConfig, engine: &mut dyn Engine, policy: &Policy) -> Result<SuiteRun> {
    info!(
        suite = %suite.name,
        mode = %policy.mode,
        strict = policy.strict,
        rules = suite.rules.len(),
        "running suite"
    );
    let mut run = SuiteRun::default();
    for rule in &suite.rules {
        let report = run_rule(&suite.fixtures, rule, engine, policy, &mut run.ledger)?;
        run.reports.push(report);
    }
    Ok(run)
}
