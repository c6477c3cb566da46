//! # Document Tree
//!
//! Owned element tree edited by the host.
//!
//! Elements have no parent pointers. A node is reached through a [`Locator`],
//! the chain of child indices walked from the root. Locators are the "live"
//! handle to a node: cheap to compute, but only meaningful against the tree
//! shape they were taken from. Anything that must survive structural edits
//! goes through a [`NodeAddress`](crate::NodeAddress) instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A named node with attributes and ordered children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder: set an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder: append a child
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Attribute value, if set
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Set (or overwrite) an attribute, returning the previous value
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.attributes.insert(name.into(), value.into())
    }

    /// Position of the first child with the given element name
    pub fn child_position(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|c| c.name == name)
    }

    /// Position of the first child with the given element name, appending an
    /// empty one if absent
    pub fn obtain_child_position(&mut self, name: &str) -> usize {
        match self.child_position(name) {
            Some(index) => index,
            None => {
                self.children.push(Element::new(name));
                self.children.len() - 1
            }
        }
    }

    /// Position of the first child named `name` whose `key_attr` equals `key`
    pub fn keyed_child_position(&self, name: &str, key_attr: &str, key: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|c| c.name == name && c.attr(key_attr) == Some(key))
    }

    pub fn keyed_child(&self, name: &str, key_attr: &str, key: &str) -> Option<&Element> {
        self.keyed_child_position(name, key_attr, key)
            .map(|index| &self.children[index])
    }

    /// Node reached by walking `locator` from here
    pub fn get(&self, locator: &Locator) -> Option<&Element> {
        locator
            .indices()
            .iter()
            .try_fold(self, |node, &i| node.children.get(i))
    }

    pub fn get_mut(&mut self, locator: &Locator) -> Option<&mut Element> {
        locator
            .indices()
            .iter()
            .try_fold(self, |node, &i| node.children.get_mut(i))
    }

    /// Swap the node at `locator` for `replacement`, returning the old subtree
    ///
    /// The root itself can be replaced (empty locator).
    pub fn replace(&mut self, locator: &Locator, replacement: Element) -> Option<Element> {
        let slot = self.get_mut(locator)?;
        Some(std::mem::replace(slot, replacement))
    }
}

/// Child-index path from a root to one of its nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Locator(Vec<usize>);

impl Locator {
    /// The root
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Locator of the `index`-th child of this node
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Locator of the parent, `None` for the root
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    /// Index of this node within its parent, `None` for the root
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }
}

impl From<Vec<usize>> for Locator {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#")?;
        for i in &self.0 {
            write!(f, "/{}", i)?;
        }
        Ok(())
    }
}
