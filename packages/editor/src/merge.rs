//! # Merge Hints
//!
//! Lets a run of fine-grained edits collapse into a single undo step.
//!
//! A hint pairs a *tag* (the kind of edit, e.g. `"set_attribute:x"`) with a
//! small parameter bag. An incoming snapshot merges into the entry on top of
//! the stack when both carry the same tag, target the same address and their
//! parameters agree:
//!
//! - `query`: the two strings are equal
//! - `queries`: the two collections hold the same members, in any order
//!
//! Parameters carrying neither field cannot merge.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved tag that disables merging
pub const NO_MERGE: &str = "none";

const QUERY: &str = "query";
const QUERIES: &str = "queries";

/// Value stored in a [`MergeParams`] bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MergeValue {
    Text(String),
    Set(Vec<String>),
}

/// Key/value bag compared when deciding whether two edits coalesce
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeParams(BTreeMap<String, MergeValue>);

impl MergeParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Params identifying a single node
    pub fn query(query: impl Into<String>) -> Self {
        Self::new().with(QUERY, MergeValue::Text(query.into()))
    }

    /// Params identifying a set of nodes
    pub fn queries<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = queries.into_iter().map(Into::into).collect();
        Self::new().with(QUERIES, MergeValue::Set(set))
    }

    pub fn with(mut self, key: impl Into<String>, value: MergeValue) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MergeValue> {
        self.0.get(key)
    }

    /// Compare against the params of an earlier edit
    ///
    /// Returns `None` when these params carry neither `query` nor `queries`
    /// and so cannot take part in merging.
    pub fn coalesces_with(&self, earlier: &MergeParams) -> Option<bool> {
        if let Some(value) = self.get(QUERY) {
            return Some(matches!(
                (value, earlier.get(QUERY)),
                (MergeValue::Text(a), Some(MergeValue::Text(b))) if a == b
            ));
        }

        if let Some(value) = self.get(QUERIES) {
            return Some(match (value, earlier.get(QUERIES)) {
                (MergeValue::Set(a), Some(MergeValue::Set(b))) => same_members(a, b),
                _ => false,
            });
        }

        None
    }
}

fn same_members(a: &[String], b: &[String]) -> bool {
    if a.is_empty() || a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

/// Merge category plus the parameters used to test coalescing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeHint {
    pub tag: String,
    pub params: MergeParams,
}

impl MergeHint {
    pub fn new(tag: impl Into<String>, params: MergeParams) -> Self {
        Self {
            tag: tag.into(),
            params,
        }
    }

    /// Whether this hint allows merging at all
    pub fn is_mergeable(&self) -> bool {
        self.tag != NO_MERGE
    }
}
