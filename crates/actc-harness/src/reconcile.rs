//! Outcome reconciliation: engine verdict vs. registry verdict.
//!
//! [`classify`] is the fixed 4x4 mapping table. [`reconcile`] combines the
//! classification with the fixture's annotations and the run policy into a
//! pass/fail decision plus diagnostics. Nothing here returns an error; every
//! discrepancy is data so that one run surfaces all of them.

use std::fmt;

use actc_types::{Annotation, AnnotationFlags, FixtureId, Reconciliation, Verdict};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Classify an `(actual, expected)` verdict pair.
///
/// ```text
/// actual \ expected | inapplicable | passed | failed
/// inapplicable      | ok           | lax    | error
/// passed            | lax          | ok     | error
/// failed            | error        | error  | ok
/// cantTell          | manual       | manual | manual
/// ```
pub const fn classify(actual: Verdict, expected: Verdict) -> Reconciliation {
    match (actual, expected) {
        (Verdict::CantTell, _) => Reconciliation::Manual,
        (Verdict::Inapplicable, Verdict::Inapplicable)
        | (Verdict::Passed, Verdict::Passed)
        | (Verdict::Failed, Verdict::Failed) => Reconciliation::Ok,
        (Verdict::Inapplicable, Verdict::Passed) | (Verdict::Passed, Verdict::Inapplicable) => {
            Reconciliation::Lax
        }
        _ => Reconciliation::Error,
    }
}

/// Whether an oracle is expected to settle questions during the run.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum HarnessMode {
    /// `cantTell` is an inherent engine limitation.
    #[default]
    Automated,
    /// `cantTell` means the oracle is incomplete.
    Assisted,
}

impl HarnessMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Automated => "automated",
            Self::Assisted => "assisted",
        }
    }
}

impl fmt::Display for HarnessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy {
    pub strict: bool,
    pub mode: HarnessMode,
}

/// What the test framework records for one fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseDecision {
    Pass,
    Fail,
    /// A failure suppressed by a `skip` annotation: reported, not counted.
    SkippedFailure,
}

impl CaseDecision {
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Fail)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::SkippedFailure => "skipped failure",
        }
    }
}

/// Non-fatal finding about a fixture, its annotations or its oracle data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    MultipleAnnotations {
        fixture: FixtureId,
    },
    /// The case matches but is still annotated.
    StaleAnnotation {
        fixture: FixtureId,
        annotation: Annotation,
    },
    UnannotatedLax {
        fixture: FixtureId,
    },
    /// `cantTell` in an automated run on a fixture not marked manual.
    MissingOracle {
        fixture: FixtureId,
    },
    /// `cantTell` in an assisted run on a fixture not marked manual.
    IncompleteOracle {
        fixture: FixtureId,
    },
    Mismatch {
        fixture: FixtureId,
        actual: Verdict,
        expected: Verdict,
    },
    UnansweredQuestion {
        fixture: FixtureId,
        uri: String,
        subject: String,
    },
    UnusedAnswer {
        fixture: FixtureId,
        uri: String,
        path: Option<String>,
    },
    /// Annotation or answer for a fixture the rule does not have (anymore).
    DanglingAnnotation {
        fixture: FixtureId,
    },
    /// Non-HTML fixture, recorded without evaluation.
    Unevaluable {
        fixture: FixtureId,
        url: String,
    },
}

impl Diagnostic {
    pub const fn fixture(&self) -> &FixtureId {
        match self {
            Self::MultipleAnnotations { fixture }
            | Self::StaleAnnotation { fixture, .. }
            | Self::UnannotatedLax { fixture }
            | Self::MissingOracle { fixture }
            | Self::IncompleteOracle { fixture }
            | Self::Mismatch { fixture, .. }
            | Self::UnansweredQuestion { fixture, .. }
            | Self::UnusedAnswer { fixture, .. }
            | Self::DanglingAnnotation { fixture }
            | Self::Unevaluable { fixture, .. } => fixture,
        }
    }

    /// Notes that need no action from whoever maintains the annotations.
    pub const fn is_informational(&self) -> bool {
        matches!(self, Self::Unevaluable { .. })
    }

    /// Log through `tracing`, tagged with the rule under test.
    pub fn emit(&self, rule: &str) {
        if self.is_informational() {
            info!(rule, fixture = %self.fixture(), "{rule} / {self}");
        } else {
            warn!(rule, fixture = %self.fixture(), "{rule} / {self}");
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleAnnotations { fixture } => write!(
                f,
                "At most one of skip, manual, and lax should be set for {fixture}"
            ),
            Self::StaleAnnotation { fixture, annotation } => write!(
                f,
                "Test case {fixture} matches but is incorrectly marked as {}",
                annotation.as_str()
            ),
            Self::UnannotatedLax { fixture } => write!(
                f,
                "Test case {fixture} doesn't match perfectly, investigate and mark as lax"
            ),
            Self::MissingOracle { fixture } | Self::IncompleteOracle { fixture } => write!(
                f,
                "Test case {fixture} has no or incomplete oracle, mark as manual"
            ),
            Self::Mismatch {
                fixture,
                actual,
                expected,
            } => write!(f, "Test case {fixture} is {actual}, expected {expected}"),
            Self::UnansweredQuestion {
                fixture,
                uri,
                subject,
            } => write!(f, "Test case {fixture} is asking {uri} for {subject}"),
            Self::UnusedAnswer { fixture, uri, path } => match path {
                Some(path) => write!(f, "Answer {uri} at {path} for {fixture} was never asked"),
                None => write!(f, "Answer {uri} for {fixture} was never asked"),
            },
            Self::DanglingAnnotation { fixture } => {
                write!(f, "Test case {fixture} is annotated but no longer exists")
            }
            Self::Unevaluable { fixture, url } => {
                write!(f, "Test case {fixture} ({url}) is not HTML and was not evaluated")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub classification: Reconciliation,
    pub decision: CaseDecision,
    pub diagnostics: Vec<Diagnostic>,
}

/// Decide one fixture.
///
/// Overlapping annotations are diagnosed once and resolved by precedence
/// `skip > manual > lax`.
pub fn reconcile(
    fixture: &FixtureId,
    actual: Verdict,
    expected: Verdict,
    flags: AnnotationFlags,
    policy: Policy,
) -> Reconciled {
    let classification = classify(actual, expected);
    let effective = flags.effective();
    let mut diagnostics = Vec::new();
    if flags.count() > 1 {
        diagnostics.push(Diagnostic::MultipleAnnotations {
            fixture: fixture.clone(),
        });
    }

    // a failure the strict policy raises, softened by `skip`
    let strict_failure = if effective == Annotation::Skip {
        CaseDecision::SkippedFailure
    } else {
        CaseDecision::Fail
    };

    let decision = match classification {
        Reconciliation::Ok => {
            let set = [
                (flags.skip, Annotation::Skip),
                (flags.manual, Annotation::Manual),
                (flags.lax, Annotation::Lax),
            ];
            for (_, annotation) in set.into_iter().filter(|(on, _)| *on) {
                diagnostics.push(Diagnostic::StaleAnnotation {
                    fixture: fixture.clone(),
                    annotation,
                });
            }
            if policy.strict && flags.count() > 0 {
                CaseDecision::Fail
            } else {
                CaseDecision::Pass
            }
        }
        Reconciliation::Error => {
            if effective == Annotation::Skip {
                CaseDecision::SkippedFailure
            } else {
                diagnostics.push(Diagnostic::Mismatch {
                    fixture: fixture.clone(),
                    actual,
                    expected,
                });
                CaseDecision::Fail
            }
        }
        Reconciliation::Lax => {
            if effective == Annotation::Lax {
                CaseDecision::Pass
            } else {
                diagnostics.push(Diagnostic::UnannotatedLax {
                    fixture: fixture.clone(),
                });
                if policy.strict {
                    strict_failure
                } else {
                    CaseDecision::Pass
                }
            }
        }
        Reconciliation::Manual => {
            if effective == Annotation::Manual {
                CaseDecision::Pass
            } else {
                match policy.mode {
                    HarnessMode::Automated => {
                        diagnostics.push(Diagnostic::MissingOracle {
                            fixture: fixture.clone(),
                        });
                        CaseDecision::Pass
                    }
                    HarnessMode::Assisted => {
                        diagnostics.push(Diagnostic::IncompleteOracle {
                            fixture: fixture.clone(),
                        });
                        if policy.strict {
                            strict_failure
                        } else {
                            CaseDecision::Pass
                        }
                    }
                }
            }
        }
    };

    Reconciled {
        classification,
        decision,
        diagnostics,
    }
}
