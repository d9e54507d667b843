//! Structural paths over the serialized document of a page snapshot.
//!
//! Paths follow the XPath-like scheme the evaluation engine reports for
//! question subjects: `/` for the document, then one `/segment` per level,
//! where a segment is `name[n]` for elements, `text()[n]` for text and
//! `comment()[n]` for comments, `n` being the 1-based index among siblings
//! of the same kind (and, for elements, the same name). Shadow roots and
//! nested content documents are not descended.

use std::collections::{BTreeMap, BTreeSet};

use actc_types::{NodeLocator, NodePath, PageSnapshot};
use serde_json::Value;

/// Every addressable node of one page, by path and by element `id`.
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    paths: BTreeSet<String>,
    ids: BTreeMap<String, String>,
}

impl NodeIndex {
    /// Index a page; a page without a `document` yields an empty index.
    pub fn from_page(page: &PageSnapshot) -> Self {
        page.document().map_or_else(Self::default, Self::from_document)
    }

    pub fn from_document(document: &Value) -> Self {
        let mut index = Self::default();
        index.paths.insert("/".to_owned());

        let mut stack: Vec<(String, &Value)> = Vec::new();
        push_children(&mut stack, "/", document);
        while let Some((path, node)) = stack.pop() {
            if node.get("type").and_then(Value::as_str) == Some("element") {
                if let Some(id) = element_id(node) {
                    // first element in document order wins
                    index.ids.entry(id.to_owned()).or_insert_with(|| path.clone());
                }
                push_children(&mut stack, &path, node);
            }
            index.paths.insert(path);
        }
        index
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Resolve a locator against this page. `None` means no such node, or
    /// the explicit "no node" locator.
    pub fn resolve(&self, locator: &NodeLocator) -> Option<NodePath> {
        match locator {
            NodeLocator::Path(path) => self.contains(path).then(|| NodePath::new(path.clone())),
            NodeLocator::Id(id) => self.ids.get(id).map(|path| NodePath::new(path.clone())),
            NodeLocator::None => None,
        }
    }
}

/// Push the indexed children of `parent` so they pop in document order.
fn push_children<'a>(stack: &mut Vec<(String, &'a Value)>, parent_path: &str, parent: &'a Value) {
    let Some(children) = parent.get("children").and_then(Value::as_array) else {
        return;
    };
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut segments = Vec::with_capacity(children.len());
    for child in children {
        let Some(key) = segment_key(child) else {
            continue;
        };
        let count = counts.entry(key.clone()).or_insert(0);
        *count += 1;
        segments.push((format!("{key}[{count}]"), child));
    }
    let prefix = if parent_path == "/" { "" } else { parent_path };
    for (segment, child) in segments.into_iter().rev() {
        stack.push((format!("{prefix}/{segment}"), child));
    }
}

/// Sibling-counting key of a node, `None` for nodes that have no path.
fn segment_key(node: &Value) -> Option<String> {
    match node.get("type").and_then(Value::as_str)? {
        "element" => node
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_owned),
        "text" => Some("text()".to_owned()),
        "comment" => Some("comment()".to_owned()),
        _ => None,
    }
}

fn element_id(element: &Value) -> Option<&str> {
    element
        .get("attributes")?
        .as_array()?
        .iter()
        .find(|attribute| attribute.get("name").and_then(Value::as_str) == Some("id"))?
        .get("value")
        .and_then(Value::as_str)
}
