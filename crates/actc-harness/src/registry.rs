//! Upstream test-case registries and their manifests.
//!
//! A registry publishes `{ "testcases": [ { "ruleId", "url", "expected" } ] }`.
//! Each entry becomes a [`TestCaseDescriptor`] keyed by the digest of its
//! canonical URL, grouped per rule directory in first-seen order.

use std::path::{Path, PathBuf};

use actc_error::{HarnessError, Result};
use actc_types::{FixtureId, Verdict};
use reqwest::Url;
use serde::Deserialize;

use crate::fixture_store::rule_dir;

/// An upstream registry and where its fixtures are frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub name: &'static str,
    pub manifest_url: &'static str,
    /// Output directory, relative to the fixture root.
    pub out_dir: &'static str,
}

pub const SOURCES: [Source; 2] = [
    Source {
        name: "old",
        manifest_url: "https://act-rules.github.io/testcases.json",
        out_dir: "old",
    },
    Source {
        name: "new",
        manifest_url: "https://www.w3.org/WAI/content-assets/wcag-act-rules/testcases.json",
        out_dir: "new",
    },
];

/// Upstream rules with no engine implementation; their cases are not fetched.
pub const IGNORED_RULES: [&str; 16] = [
    // HTML images contain no text
    "0va7u6",
    // Link in context is descriptive
    "5effbb",
    // Device motion based changes to the content can also be created from the user interface
    "7677a9",
    // Focusable element has no keyboard trap
    "80af7b",
    // Content has alternative for visual reference
    "9bd38c",
    // Focusable element has no keyboard trap via standard navigation
    "a1b64e",
    // Link is descriptive
    "aizyf1",
    // Device motion based changes to the content can be disabled
    "c249d5",
    // Form field label is descriptive
    "cc0f0a",
    // Attribute is not duplicated
    "e6952f",
    // Image not in the accessibility tree is decorative
    "e88epe",
    // Focusable element has no keyboard trap via non-standard navigation
    "ebe86a",
    // Text content that changes automatically can be paused, stopped or hidden
    "efbfc7",
    // No keyboard shortcut uses only printable characters
    "ffbc54",
    // HTML element language subtag matches language
    "off6ek",
    // Image accessible name is descriptive
    "qt1vmo",
];

/// `(rule id, fixture id)` pairs whose resource redirects before any script
/// runs; a browser would follow the redirect and capture the wrong page.
pub const INSTANT_REDIRECTS: [(&str, &str); 2] = [("bc659a", "0ccdca"), ("bc659a", "d15d71")];

/// Resolve source selectors; no selector means every source.
pub fn select_sources(names: &[String]) -> Result<Vec<Source>> {
    if names.is_empty() {
        return Ok(SOURCES.to_vec());
    }
    let mut selected = Vec::new();
    for name in names {
        let source = SOURCES
            .iter()
            .find(|source| source.name == name.as_str())
            .ok_or_else(|| HarnessError::UnknownSource { name: name.clone() })?;
        if !selected.contains(source) {
            selected.push(*source);
        }
    }
    Ok(selected)
}

pub fn is_ignored_rule(rule_id: &str) -> bool {
    IGNORED_RULES.contains(&rule_id)
}

/// One upstream test case, ready to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseDescriptor {
    pub rule_id: String,
    /// Canonical (re-serialized) URL; the fixture id is its digest.
    pub url: String,
    pub expected: Verdict,
    pub fixture_id: FixtureId,
}

impl TestCaseDescriptor {
    pub fn new(rule_id: impl Into<String>, raw_url: &str, expected: Verdict) -> Result<Self> {
        let url = canonical_url(raw_url)?;
        Ok(Self {
            rule_id: rule_id.into(),
            fixture_id: FixtureId::from_url(&url),
            url,
            expected,
        })
    }

    pub fn is_xml(&self) -> bool {
        self.url.ends_with(".xml")
    }

    pub fn is_instant_redirect(&self) -> bool {
        INSTANT_REDIRECTS.iter().any(|(rule, fixture)| {
            rule.eq_ignore_ascii_case(&self.rule_id) && *fixture == self.fixture_id.as_str()
        })
    }
}

/// Test cases of one rule, fetched into one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleBatch {
    pub rule_id: String,
    pub directory: PathBuf,
    pub tests: Vec<TestCaseDescriptor>,
}

#[derive(Deserialize)]
struct Manifest {
    testcases: Vec<ManifestEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry {
    rule_id: String,
    url: String,
    expected: Verdict,
}

/// Parse a registry manifest, dropping ignored rules.
pub fn parse_manifest(json: &str) -> Result<Vec<TestCaseDescriptor>> {
    let manifest: Manifest =
        serde_json::from_str(json).map_err(|err| HarnessError::json("test case manifest", err))?;
    manifest
        .testcases
        .into_iter()
        .filter(|entry| !is_ignored_rule(&entry.rule_id))
        .map(|entry| TestCaseDescriptor::new(entry.rule_id, &entry.url, entry.expected))
        .collect()
}

/// Group descriptors per rule directory under `out`, in first-seen order.
pub fn group_by_rule(out: &Path, descriptors: Vec<TestCaseDescriptor>) -> Vec<RuleBatch> {
    let mut batches: Vec<RuleBatch> = Vec::new();
    for descriptor in descriptors {
        let directory = rule_dir(out, &descriptor.rule_id);
        match batches.iter_mut().find(|batch| batch.directory == directory) {
            Some(batch) => batch.tests.push(descriptor),
            None => batches.push(RuleBatch {
                rule_id: descriptor.rule_id.to_lowercase(),
                directory,
                tests: vec![descriptor],
            }),
        }
    }
    batches
}

fn canonical_url(raw: &str) -> Result<String> {
    Url::parse(raw)
        .map(String::from)
        .map_err(|err| HarnessError::json("test case manifest", format!("invalid URL '{raw}': {err}")))
}
