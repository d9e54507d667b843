//! Shared data model of the ACT rules conformance harness: verdicts, fixture
//! records, per-rule annotations and oracle question/answer types.

pub mod fixture;
pub mod options;
pub mod oracle;
pub mod verdict;

pub use fixture::{
    FIXTURE_ID_LEN, Fixture, FixtureId, FixtureKind, IgnoredFixture, LEGACY_FIXTURE_ID_LEN,
    PageSnapshot, TestFixture,
};
pub use options::{Annotation, AnnotationFlags, AnswerMap, AnswerTable, PathAnswerMap, RuleOptions};
pub use oracle::{Answer, AnswerKind, AnswerValue, NodeLocator, NodePath, Question, Rgba, Subject};
pub use verdict::{Reconciliation, Verdict};
