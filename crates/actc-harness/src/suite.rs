//! Suite configuration: which rules run against which fixture directories,
//! with their annotations and oracle answers.
//!
//! ```toml
//! name = "automated"
//! mode = "automated"
//! fixtures = "fixtures/new"
//! report = "reports/automated.json"
//!
//! [[rule]]
//! id = "23a2a8"
//! engine_rule = "R2"
//! options.lax = ["06ccd1", "3978fa"]
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use actc_error::{HarnessError, Result};
use actc_types::RuleOptions;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::reconcile::HarnessMode;

/// Assertor recorded in reports when the suite does not name one.
pub const DEFAULT_ASSERTOR: &str = "_:engine-under-test";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
    pub name: String,
    #[serde(default)]
    pub mode: HarnessMode,
    /// Fixture root; each rule reads `<fixtures>/<rule id>/`.
    pub fixtures: PathBuf,
    /// Where the EARL report is written, if anywhere.
    #[serde(default)]
    pub report: Option<PathBuf>,
    #[serde(default = "default_assertor")]
    pub assertor: String,
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleEntry>,
}

/// One rule under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    /// Upstream rule id, also the fixture directory name.
    pub id: String,
    /// Rule identifier the engine understands.
    pub engine_rule: String,
    /// EARL test IRI; defaults to the rule's page on the ACT rules site.
    #[serde(default)]
    pub test_uri: Option<String>,
    #[serde(default)]
    pub options: RuleOptions,
}

impl RuleEntry {
    pub fn new(id: impl Into<String>, engine_rule: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            engine_rule: engine_rule.into(),
            test_uri: None,
            options: RuleOptions::default(),
        }
    }

    pub fn test_uri(&self) -> String {
        self.test_uri
            .clone()
            .unwrap_or_else(|| format!("https://act-rules.github.io/rules/{}", self.id))
    }
}

fn default_assertor() -> String {
    DEFAULT_ASSERTOR.to_owned()
}

impl SuiteConfig {
    /// Parse and validate; paths are kept as written.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_from(text, "suite")
    }

    /// Load a suite file; relative paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let text = fs::read_to_string(path)
            .map_err(|err| HarnessError::config(format!("cannot read {origin}: {err}")))?;
        let mut suite = Self::parse_from(&text, &origin)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        suite.fixtures = base.join(&suite.fixtures);
        suite.report = suite.report.map(|report| base.join(report));
        debug!(suite = %suite.name, rules = suite.rules.len(), "suite loaded");
        Ok(suite)
    }

    fn parse_from(text: &str, origin: &str) -> Result<Self> {
        let suite: Self =
            toml::from_str(text).map_err(|err| HarnessError::config(format!("{origin}: {err}")))?;
        let mut seen = BTreeSet::new();
        for rule in &suite.rules {
            if rule.id.trim().is_empty() || rule.engine_rule.trim().is_empty() {
                return Err(HarnessError::config(format!(
                    "{origin}: rule entries need a non-empty id and engine_rule (got id '{}')",
                    rule.id
                )));
            }
            if !seen.insert(rule.id.to_lowercase()) {
                return Err(HarnessError::config(format!(
                    "{origin}: rule '{}' is listed twice",
                    rule.id
                )));
            }
        }
        Ok(suite)
    }
}
