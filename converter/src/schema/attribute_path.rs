use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Predicate local names from the record root to a terminal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributePath(Vec<String>);

impl AttributePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" / "))
    }
}

/// Duplicate-free attribute paths in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePathSet(IndexSet<AttributePath>);

impl AttributePathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false` when the path was already present.
    pub fn insert(&mut self, path: AttributePath) -> bool {
        self.0.insert(path)
    }

    /// Fold another set into this one, keeping this set's order first.
    pub fn merge(&mut self, other: AttributePathSet) {
        self.0.extend(other.0);
    }

    pub fn contains(&self, path: &AttributePath) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributePath> {
        self.0.iter()
    }
}

impl FromIterator<AttributePath> for AttributePathSet {
    fn from_iter<T: IntoIterator<Item = AttributePath>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for AttributePathSet {
    type Item = AttributePath;
    type IntoIter = indexmap::set::IntoIter<AttributePath>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
