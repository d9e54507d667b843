//! Content-addressed fixture records.
//!
//! A fixture freezes one upstream test case: its expected verdict plus the
//! page snapshot the scraper produced for it. Records are persisted as JSON
//! under `<root>/<rule id>/<fixture id>.json` and come in three variants:
//!
//! ```text
//! { "type": "test",     "id", "outcome", "page" }   normal scrape
//! { "type": "redirect", "id", "outcome", "page" }   instant-redirect workaround
//! { "type": "xml",      "id", "url", "data" }       non-HTML resource, not evaluated
//! ```
//!
//! Records written before the `type` tag existed carry no tag at all; they
//! decode as `test`.

use std::borrow::Borrow;
use std::fmt;

use actc_error::HarnessError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::verdict::Verdict;

/// Number of hex characters kept from the URL digest.
pub const FIXTURE_ID_LEN: usize = 6;

/// Digest length used by the first registry generation.
pub const LEGACY_FIXTURE_ID_LEN: usize = 4;

/// Short content address of a test case, derived from its canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureId(String);

impl FixtureId {
    /// Derive the id of a canonical test case URL.
    #[must_use]
    pub fn from_url(canonical_url: &str) -> Self {
        Self::from_url_with_len(canonical_url, FIXTURE_ID_LEN)
    }

    /// Derive an id truncated to `len` hex characters (at most 64).
    #[must_use]
    pub fn from_url_with_len(canonical_url: &str, len: usize) -> Self {
        let mut hex = sha256_hex(canonical_url.as_bytes());
        hex.truncate(len);
        Self(hex)
    }

    /// Wrap an id that is already known, e.g. from an annotation list.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name this fixture is stored under.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FixtureId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FixtureId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0F)]));
    }
    out
}

/// Serialized page snapshot (DOM, device, request and response metadata).
///
/// The harness treats the document model as opaque and only reaches into the
/// few well-known members it needs: request/response headers and URLs, and
/// the serialized `document` tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageSnapshot(Value);

impl PageSnapshot {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Final URL of the page: the response URL, else the request URL.
    pub fn url(&self) -> Option<&str> {
        self.0
            .pointer("/response/url")
            .and_then(Value::as_str)
            .or_else(|| self.0.pointer("/request/url").and_then(Value::as_str))
    }

    /// Serialized document tree, if present.
    pub fn document(&self) -> Option<&Value> {
        self.0.get("document")
    }
}

/// Variant tag of a persisted fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKind {
    Test,
    Redirect,
    Xml,
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => f.write_str("test"),
            Self::Redirect => f.write_str("redirect"),
            Self::Xml => f.write_str("xml"),
        }
    }
}

/// An evaluable test case: expected verdict plus the page to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct TestFixture {
    pub id: FixtureId,
    pub outcome: Verdict,
    pub page: PageSnapshot,
}

/// A non-HTML test case kept for audit only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredFixture {
    pub id: FixtureId,
    pub url: String,
    pub data: String,
}

/// A persisted fixture record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFixture", into = "RawFixture")]
pub enum Fixture {
    Test(TestFixture),
    Redirect(TestFixture),
    Xml(IgnoredFixture),
}

impl Fixture {
    pub fn id(&self) -> &FixtureId {
        match self {
            Self::Test(test) | Self::Redirect(test) => &test.id,
            Self::Xml(ignored) => &ignored.id,
        }
    }

    pub const fn kind(&self) -> FixtureKind {
        match self {
            Self::Test(_) => FixtureKind::Test,
            Self::Redirect(_) => FixtureKind::Redirect,
            Self::Xml(_) => FixtureKind::Xml,
        }
    }

    /// Expected verdict; `None` for records that are never evaluated.
    pub fn expected(&self) -> Option<Verdict> {
        match self {
            Self::Test(test) | Self::Redirect(test) => Some(test.outcome),
            Self::Xml(_) => None,
        }
    }

    /// The evaluable part of the record, if any.
    pub fn as_test(&self) -> Option<&TestFixture> {
        match self {
            Self::Test(test) | Self::Redirect(test) => Some(test),
            Self::Xml(_) => None,
        }
    }
}

/// On-disk shape shared by all variants; field order is the key order
/// written to disk.
#[derive(Serialize, Deserialize)]
struct RawFixture {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<FixtureKind>,
    id: FixtureId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    outcome: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page: Option<PageSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

impl TryFrom<RawFixture> for Fixture {
    type Error = HarnessError;

    fn try_from(raw: RawFixture) -> Result<Self, Self::Error> {
        let kind = raw.kind.unwrap_or(FixtureKind::Test);
        let missing = |field: &str| {
            HarnessError::json(
                format!("fixture {}", raw.id),
                format!("{kind} record is missing '{field}'"),
            )
        };
        match kind {
            FixtureKind::Test | FixtureKind::Redirect => {
                let test = TestFixture {
                    outcome: raw.outcome.ok_or_else(|| missing("outcome"))?,
                    page: raw.page.ok_or_else(|| missing("page"))?,
                    id: raw.id,
                };
                Ok(if kind == FixtureKind::Test {
                    Self::Test(test)
                } else {
                    Self::Redirect(test)
                })
            }
            FixtureKind::Xml => Ok(Self::Xml(IgnoredFixture {
                url: raw.url.ok_or_else(|| missing("url"))?,
                data: raw.data.ok_or_else(|| missing("data"))?,
                id: raw.id,
            })),
        }
    }
}

impl From<Fixture> for RawFixture {
    fn from(fixture: Fixture) -> Self {
        let kind = Some(fixture.kind());
        match fixture {
            Fixture::Test(test) | Fixture::Redirect(test) => Self {
                kind,
                id: test.id,
                outcome: Some(test.outcome),
                page: Some(test.page),
                url: None,
                data: None,
            },
            Fixture::Xml(ignored) => Self {
                kind,
                id: ignored.id,
                outcome: None,
                page: None,
                url: Some(ignored.url),
                data: Some(ignored.data),
            },
        }
    }
}
