//! Pre-recorded answers to the questions rules ask during evaluation.
//!
//! A [`FixtureOracle`] serves the answers registered for one fixture. Answers
//! are looked up by question URI, and for path-keyed tables additionally by
//! the structural path of the question's subject (or of its context when the
//! subject is not a node). Node answers are resolved against the page being
//! evaluated. A question with no registered answer is answered "unknown" and
//! recorded, so the engine falls back to `cantTell`.

use std::collections::BTreeSet;

use actc_error::{HarnessError, Result};
use actc_types::{Answer, AnswerKind, AnswerTable, AnswerValue, Question};
use tracing::{debug, warn};

use crate::dom_path::NodeIndex;

/// Answers questions on behalf of a human reviewer.
pub trait Oracle {
    /// `Ok(None)` means "don't know". Errors are configuration mistakes.
    fn answer(&mut self, question: &Question) -> Result<Option<Answer>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnansweredReason {
    /// No answer registered for the question (at the subject's path).
    NoEntry,
    /// Path-keyed lookup, but neither subject nor context is a node.
    NotANode,
}

/// A question the oracle could not answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnansweredQuestion {
    pub uri: String,
    /// Rendered subject, see [`actc_types::Subject::describe`].
    pub subject: String,
    pub reason: UnansweredReason,
}

/// `(question uri, subject path)` of a registered answer; the path is `None`
/// for plain tables.
pub type AnswerKey = (String, Option<String>);

pub struct FixtureOracle<'a> {
    label: String,
    table: Option<AnswerTable<'a>>,
    nodes: &'a NodeIndex,
    used: BTreeSet<AnswerKey>,
    unanswered: Vec<UnansweredQuestion>,
}

impl<'a> FixtureOracle<'a> {
    /// `label` names the page in diagnostics, usually its URL.
    pub fn new(label: impl Into<String>, table: Option<AnswerTable<'a>>, nodes: &'a NodeIndex) -> Self {
        Self {
            label: label.into(),
            table,
            nodes,
            used: BTreeSet::new(),
            unanswered: Vec::new(),
        }
    }

    /// Answers consumed so far.
    pub fn used(&self) -> &BTreeSet<AnswerKey> {
        &self.used
    }

    pub fn unanswered(&self) -> &[UnansweredQuestion] {
        &self.unanswered
    }

    /// Registered answers that were never asked for.
    pub fn unused_entries(&self) -> Vec<AnswerKey> {
        self.table
            .map(|table| table.entries().difference(&self.used).cloned().collect())
            .unwrap_or_default()
    }

    fn dont_know(&mut self, question: &Question, reason: UnansweredReason) -> Option<Answer> {
        let subject = question.subject.describe();
        match reason {
            UnansweredReason::NoEntry => warn!(
                url = %self.label,
                question = %question.uri,
                "{} is asking {} for {}",
                self.label,
                question.uri,
                subject
            ),
            UnansweredReason::NotANode => warn!(
                url = %self.label,
                question = %question.uri,
                "{} is asking {} for {} which is not a node",
                self.label,
                question.uri,
                subject
            ),
        }
        self.unanswered.push(UnansweredQuestion {
            uri: question.uri.clone(),
            subject,
            reason,
        });
        None
    }

    fn coerce(&self, question: &Question, value: &AnswerValue) -> Result<Answer> {
        let answer = match (question.kind, value) {
            (AnswerKind::Boolean, AnswerValue::Boolean(value)) => Answer::Boolean(*value),
            (AnswerKind::Node, AnswerValue::Node(locator)) => Answer::Node(self.nodes.resolve(locator)),
            (AnswerKind::NodeList, AnswerValue::NodeList(locators)) => Answer::NodeList(
                locators
                    .iter()
                    .filter_map(|locator| self.nodes.resolve(locator))
                    .collect(),
            ),
            (AnswerKind::ColorList, AnswerValue::ColorList(colors)) => Answer::ColorList(colors.clone()),
            (AnswerKind::String, AnswerValue::String(value)) => Answer::String(value.clone()),
            (declared, value) => {
                return Err(HarnessError::AnswerKindMismatch {
                    question: question.uri.clone(),
                    declared: declared.to_string(),
                    provided: value.kind().to_string(),
                });
            }
        };
        Ok(answer)
    }
}

impl Oracle for FixtureOracle<'_> {
    fn answer(&mut self, question: &Question) -> Result<Option<Answer>> {
        let (value, key) = match self.table {
            None => return Ok(self.dont_know(question, UnansweredReason::NoEntry)),
            Some(AnswerTable::Plain(map)) => match map.get(&question.uri) {
                Some(value) => (value, (question.uri.clone(), None)),
                None => return Ok(self.dont_know(question, UnansweredReason::NoEntry)),
            },
            Some(AnswerTable::WithPath(map)) => {
                let Some(path) = question.structural_path() else {
                    return Ok(self.dont_know(question, UnansweredReason::NotANode));
                };
                match map.get(&question.uri).and_then(|by_path| by_path.get(path.as_str())) {
                    Some(value) => (value, (question.uri.clone(), Some(path.to_string()))),
                    None => return Ok(self.dont_know(question, UnansweredReason::NoEntry)),
                }
            }
        };
        let answer = self.coerce(question, value)?;
        debug!(question = %question.uri, kind = %question.kind, "oracle answered");
        self.used.insert(key);
        Ok(Some(answer))
    }
}
