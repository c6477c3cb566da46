//! # Node Addresses
//!
//! Recomputable string paths from the document root to a node.
//!
//! ```text
//! Path    := "." "/" Segment ("/" Segment)*
//! Segment := Name | Name '[' '@' Attr '="' Value '"' ']'
//! ```
//!
//! The first segment always names the root element. Key values are escaped
//! (`&` → `&amp;`, `"` → `&quot;`) so they may contain any character,
//! including `/`.

use crate::{AddressError, DomResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const PREFIX: &str = ".";

/// One step of a [`NodeAddress`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Element name that is unique among its siblings
    Singular(String),

    /// Repeatable element picked out by the value of a key attribute
    Keyed {
        name: String,
        attribute: String,
        key: String,
    },
}

impl Segment {
    pub fn singular(name: impl Into<String>) -> Self {
        Segment::Singular(name.into())
    }

    pub fn keyed(name: impl Into<String>, attribute: impl Into<String>, key: impl Into<String>) -> Self {
        Segment::Keyed {
            name: name.into(),
            attribute: attribute.into(),
            key: key.into(),
        }
    }

    /// Element name this segment selects
    pub fn name(&self) -> &str {
        match self {
            Segment::Singular(name) => name,
            Segment::Keyed { name, .. } => name,
        }
    }

    fn parse(raw: &str) -> DomResult<Self> {
        let malformed = || AddressError::Malformed(raw.to_string());

        let Some((name, predicate)) = raw.split_once('[') else {
            if raw.is_empty() || raw.contains(['"', ']']) {
                return Err(malformed());
            }
            return Ok(Segment::Singular(raw.to_string()));
        };

        let predicate = predicate
            .strip_prefix('@')
            .and_then(|p| p.strip_suffix("\"]"))
            .ok_or_else(malformed)?;
        let (attribute, quoted) = predicate.split_once("=\"").ok_or_else(malformed)?;

        if name.is_empty() || attribute.is_empty() || quoted.contains('"') {
            return Err(malformed());
        }

        Ok(Segment::Keyed {
            name: name.to_string(),
            attribute: attribute.to_string(),
            key: unescape(quoted),
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Singular(name) => write!(f, "{}", name),
            Segment::Keyed { name, attribute, key } => {
                write!(f, "{}[@{}=\"{}\"]", name, attribute, escape(key))
            }
        }
    }
}

/// Stable path to a node, valid across edits that keep its ancestry intact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeAddress(String);

impl NodeAddress {
    /// Build an address from its segments (root first)
    pub fn from_segments(segments: &[Segment]) -> Self {
        let mut path = String::from(PREFIX);
        for segment in segments {
            path.push('/');
            path.push_str(&segment.to_string());
        }
        Self(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the path back into segments
    pub fn segments(&self) -> DomResult<Vec<Segment>> {
        let rest = self
            .0
            .strip_prefix(PREFIX)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| AddressError::Malformed(self.0.clone()))?;

        split_unquoted(rest).into_iter().map(Segment::parse).collect()
    }

    /// Address of the parent, `None` for the root
    pub fn parent(&self) -> Option<NodeAddress> {
        let mut segments = self.segments().ok()?;
        segments.pop();
        if segments.is_empty() {
            return None;
        }
        Some(Self::from_segments(&segments))
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = NodeAddress(s.to_string());
        address.segments()?;
        Ok(address)
    }
}

impl TryFrom<String> for NodeAddress {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NodeAddress> for String {
    fn from(address: NodeAddress) -> Self {
        address.0
    }
}

/// Split on `/` outside of quoted key values
fn split_unquoted(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in path.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '/' if !in_quotes => {
                parts.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&path[start..]);
    parts
}

fn escape(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn unescape(value: &str) -> String {
    value.replace("&quot;", "\"").replace("&amp;", "&")
}
