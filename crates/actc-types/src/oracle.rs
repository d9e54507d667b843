//! Questions rules ask during evaluation and the pre-recorded answers that
//! resolve them.
//!
//! Node answers are stored as locators and resolved against whichever page is
//! loaded at evaluation time, since node identity does not survive
//! serialization.

use std::fmt;

use actc_error::HarnessError;
use serde::{Deserialize, Serialize};

/// Answer shape a question declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerKind {
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "node")]
    Node,
    #[serde(rename = "node[]")]
    NodeList,
    #[serde(rename = "color[]")]
    ColorList,
    #[serde(rename = "string")]
    String,
}

impl fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("boolean"),
            Self::Node => f.write_str("node"),
            Self::NodeList => f.write_str("node[]"),
            Self::ColorList => f.write_str("color[]"),
            Self::String => f.write_str("string"),
        }
    }
}

/// Structural path of a node within a page, e.g. `/html[1]/body[1]/p[2]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(String);

impl NodePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Late-bound reference to a node of whichever page is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLocator {
    /// Node at this structural path.
    Path(String),
    /// First element carrying this `id` attribute.
    Id(String),
    /// Deliberately no node.
    None,
}

impl NodeLocator {
    /// First `element` child of `<body>`.
    pub fn first(element: &str) -> Self {
        Self::Path(format!("/html[1]/body[1]/{element}[1]"))
    }
}

/// An sRGB color with 8-bit channels, written as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Rgba {
    /// Parse a hex color; a missing alpha channel means opaque.
    pub fn from_hex(hex: &str) -> Result<Self, HarnessError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let invalid = || HarnessError::config(format!("invalid hex color '{hex}'"));
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(invalid());
        }
        let channel = |index: usize| {
            u8::from_str_radix(&digits[index * 2..index * 2 + 2], 16).map_err(|_| invalid())
        };
        Ok(Self {
            red: channel(0)?,
            green: channel(1)?,
            blue: channel(2)?,
            alpha: if digits.len() == 8 { channel(3)? } else { 0xFF },
        })
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.red, self.green, self.blue, self.alpha
        )
    }
}

impl TryFrom<String> for Rgba {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        color.to_string()
    }
}

/// A pre-recorded answer as written in suite configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerValue {
    Boolean(bool),
    Node(NodeLocator),
    NodeList(Vec<NodeLocator>),
    ColorList(Vec<Rgba>),
    String(String),
}

impl AnswerValue {
    pub const fn kind(&self) -> AnswerKind {
        match self {
            Self::Boolean(_) => AnswerKind::Boolean,
            Self::Node(_) => AnswerKind::Node,
            Self::NodeList(_) => AnswerKind::NodeList,
            Self::ColorList(_) => AnswerKind::ColorList,
            Self::String(_) => AnswerKind::String,
        }
    }
}

/// An answer resolved against the loaded page, handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Boolean(bool),
    Node(Option<NodePath>),
    NodeList(Vec<NodePath>),
    ColorList(Vec<Rgba>),
    String(String),
}

impl Answer {
    pub const fn kind(&self) -> AnswerKind {
        match self {
            Self::Boolean(_) => AnswerKind::Boolean,
            Self::Node(_) => AnswerKind::Node,
            Self::NodeList(_) => AnswerKind::NodeList,
            Self::ColorList(_) => AnswerKind::ColorList,
            Self::String(_) => AnswerKind::String,
        }
    }
}

/// What a question is about.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Node(NodePath),
    Group(Vec<NodePath>),
    #[default]
    Other,
}

impl Subject {
    /// Human-readable rendering used in oracle diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Node(path) => path.to_string(),
            Self::Group(paths) if !paths.is_empty() => paths
                .iter()
                .map(NodePath::as_str)
                .collect::<Vec<_>>()
                .join(","),
            Self::Group(_) | Self::Other => "Unknown subject type".to_owned(),
        }
    }
}

/// A diagnostic question posed by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub uri: String,
    #[serde(rename = "type")]
    pub kind: AnswerKind,
    #[serde(default)]
    pub subject: Subject,
    /// Structural node the question was asked in, when the subject itself is
    /// not a node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<NodePath>,
}

impl Question {
    /// Path used by path-keyed answers: the subject's if it is a node, else
    /// the context's.
    pub fn structural_path(&self) -> Option<&NodePath> {
        match &self.subject {
            Subject::Node(path) => Some(path),
            Subject::Group(_) | Subject::Other => self.context.as_ref(),
        }
    }
}
