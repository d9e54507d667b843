//! Per-rule annotation bundle.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::fixture::FixtureId;
use crate::oracle::AnswerValue;

/// Answers keyed by question URI.
pub type AnswerMap = BTreeMap<String, AnswerValue>;

/// Answers keyed by question URI, then by the structural path of the
/// question's subject.
pub type PathAnswerMap = BTreeMap<String, BTreeMap<String, AnswerValue>>;

/// Annotations and oracle data for one rule under test.
///
/// `skip`, `manual` and `lax` are disjoint by convention; overlaps are
/// diagnosed, not rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleOptions {
    /// Known engine/registry mismatch; failures are recorded as skipped.
    pub skip: BTreeSet<FixtureId>,
    /// Known to need human judgment.
    pub manual: BTreeSet<FixtureId>,
    /// Every fixture of the rule needs human judgment. Exempt from stale and
    /// overlap diagnostics.
    #[serde(alias = "allManual")]
    pub all_manual: bool,
    /// Tolerated `inapplicable`/`passed` discrepancy.
    pub lax: BTreeSet<FixtureId>,
    pub answers: BTreeMap<FixtureId, AnswerMap>,
    #[serde(alias = "answersWithPath")]
    pub answers_with_path: BTreeMap<FixtureId, PathAnswerMap>,
}

/// Borrowed oracle data for a single fixture.
#[derive(Debug, Clone, Copy)]
pub enum AnswerTable<'a> {
    Plain(&'a AnswerMap),
    WithPath(&'a PathAnswerMap),
}

impl AnswerTable<'_> {
    /// Every registered `(question, path)` entry.
    pub fn entries(&self) -> BTreeSet<(String, Option<String>)> {
        match self {
            Self::Plain(map) => map.keys().map(|uri| (uri.clone(), None)).collect(),
            Self::WithPath(map) => map
                .iter()
                .flat_map(|(uri, by_path)| {
                    by_path
                        .keys()
                        .map(move |path| (uri.clone(), Some(path.clone())))
                })
                .collect(),
        }
    }
}

/// Raw annotation membership of one fixture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationFlags {
    pub skip: bool,
    pub manual: bool,
    pub lax: bool,
    /// Manual through the rule-wide `all_manual` switch. In force like
    /// `manual`, but never stale and never counted as an overlap.
    pub manual_by_rule: bool,
}

impl AnnotationFlags {
    /// Explicit per-fixture annotations.
    pub fn count(self) -> usize {
        usize::from(self.skip) + usize::from(self.manual) + usize::from(self.lax)
    }

    /// Single annotation in force, by precedence `skip > manual > lax`.
    pub const fn effective(self) -> Annotation {
        if self.skip {
            Annotation::Skip
        } else if self.manual || self.manual_by_rule {
            Annotation::Manual
        } else if self.lax {
            Annotation::Lax
        } else {
            Annotation::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    None,
    Skip,
    Manual,
    Lax,
}

impl Annotation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Skip => "skipped",
            Self::Manual => "manual",
            Self::Lax => "lax",
        }
    }
}

impl RuleOptions {
    pub fn annotations_for(&self, id: &FixtureId) -> AnnotationFlags {
        AnnotationFlags {
            skip: self.skip.contains(id),
            manual: self.manual.contains(id),
            lax: self.lax.contains(id),
            manual_by_rule: self.all_manual,
        }
    }

    /// Oracle data registered for `id`; path-keyed answers win when both
    /// forms are present.
    pub fn answer_table(&self, id: &FixtureId) -> Option<AnswerTable<'_>> {
        self.answers_with_path
            .get(id)
            .map(AnswerTable::WithPath)
            .or_else(|| self.answers.get(id).map(AnswerTable::Plain))
    }

    /// Every fixture id this bundle mentions anywhere.
    pub fn referenced_ids(&self) -> BTreeSet<&FixtureId> {
        self.skip
            .iter()
            .chain(&self.manual)
            .chain(&self.lax)
            .chain(self.answers.keys())
            .chain(self.answers_with_path.keys())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
