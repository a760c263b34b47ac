//! Structured paths into a JSON document.
//!
//! A [`QueryPath`] is an ordered list of typed keys, so a field literally named
//! `"days.0"` and the path `days -> 0` can never collide. Paths render as
//! RFC 6901 JSON Pointers for logs and error messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step into a document: an object field or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathKey {
    Index(usize),
    Field(String),
}

impl From<&str> for PathKey {
    fn from(name: &str) -> Self {
        PathKey::Field(name.to_string())
    }
}

impl From<String> for PathKey {
    fn from(name: String) -> Self {
        PathKey::Field(name)
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        PathKey::Index(index)
    }
}

/// Ordered sequence of keys from the document root to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryPath(Vec<PathKey>);

impl QueryPath {
    /// The empty path, addressing the document root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn keys(&self) -> &[PathKey] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path extended by one key.
    pub fn child(&self, key: impl Into<PathKey>) -> Self {
        let mut keys = Vec::with_capacity(self.0.len() + 1);
        keys.extend_from_slice(&self.0);
        keys.push(key.into());
        Self(keys)
    }

    pub(crate) fn push(&mut self, key: PathKey) {
        self.0.push(key);
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }

    /// Nearest enclosing field name, skipping array indices.
    pub fn last_field(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|k| match k {
            PathKey::Field(name) => Some(name.as_str()),
            PathKey::Index(_) => None,
        })
    }

    /// Resolve against a document.
    pub fn resolve<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(doc, |node, key| match (key, node) {
            (PathKey::Field(name), Value::Object(map)) => map.get(name),
            (PathKey::Index(i), Value::Array(items)) => items.get(*i),
            _ => None,
        })
    }

    /// Resolve mutably against a document.
    pub fn resolve_mut<'a>(&self, doc: &'a mut Value) -> Option<&'a mut Value> {
        self.0.iter().try_fold(doc, |node, key| match (key, node) {
            (PathKey::Field(name), Value::Object(map)) => map.get_mut(name),
            (PathKey::Index(i), Value::Array(items)) => items.get_mut(*i),
            _ => None,
        })
    }
}

impl FromIterator<PathKey> for QueryPath {
    fn from_iter<I: IntoIterator<Item = PathKey>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The root renders as the empty pointer; "/" addresses the key "".
        for key in &self.0 {
            match key {
                PathKey::Index(i) => write!(f, "/{i}")?,
                PathKey::Field(name) => {
                    f.write_str("/")?;
                    f.write_str(&name.replace('~', "~0").replace('/', "~1"))?;
                }
            }
        }
        Ok(())
    }
}
