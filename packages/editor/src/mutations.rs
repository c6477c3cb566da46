//! # Tree Mutations
//!
//! Addressed editing operations on an element tree.
//!
//! Every mutation targets nodes by [`NodeAddress`], never by position, so a
//! mutation stays meaningful after unrelated structural edits. Each one also
//! knows which node must be snapshotted before it runs and whether rapid
//! repeats of it should merge into one undo step.
//!
//! ## Snapshot targets
//!
//! | Mutation          | Snapshotted node        | Merges                     |
//! |-------------------|-------------------------|----------------------------|
//! | `SetAttribute`    | target                  | same attribute, same node  |
//! | `RemoveAttribute` | target                  | no                         |
//! | `InsertChild`     | parent                  | no                         |
//! | `RemoveChild`     | parent of target        | no                         |
//! | `ReplaceChildren` | target                  | no                         |
//! | `SetAttributes`   | common parent           | same node set              |

use crate::merge::{MergeHint, MergeParams};
use serde::{Deserialize, Serialize};
use snaptree_dom::{AddressSchema, Element, NodeAddress};
use std::collections::BTreeMap;
use thiserror::Error;

/// Addressed edit of an element tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mutation {
    /// Set an attribute value
    SetAttribute {
        target: NodeAddress,
        name: String,
        value: String,
    },

    /// Remove an attribute
    RemoveAttribute { target: NodeAddress, name: String },

    /// Insert a child at index (clamped to the child count)
    InsertChild {
        parent: NodeAddress,
        index: usize,
        element: Element,
    },

    /// Remove a node and its subtree
    RemoveChild { target: NodeAddress },

    /// Replace all children of a node
    ReplaceChildren {
        target: NodeAddress,
        children: Vec<Element>,
    },

    /// Set attributes on several children of one parent at once
    SetAttributes {
        parent: NodeAddress,
        updates: Vec<(NodeAddress, BTreeMap<String, String>)>,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Target not found: {0}")]
    TargetNotFound(NodeAddress),

    #[error("Parent not found: {0}")]
    ParentNotFound(NodeAddress),

    #[error("Attribute {name} missing on {target}")]
    AttributeMissing { target: NodeAddress, name: String },

    #[error("Duplicate key {key} for <{name}> under {parent}")]
    DuplicateKey {
        parent: NodeAddress,
        name: String,
        key: String,
    },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
}

/// Result of applying a mutation to a document
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    /// Document version after the mutation
    pub version: u64,

    /// How the edit was recorded; `None` if history had no room for it
    pub recorded: Option<crate::SnapshotOutcome>,
}

impl Mutation {
    /// Address of the node to snapshot before applying
    pub fn snapshot_target(&self) -> Result<NodeAddress, MutationError> {
        match self {
            Mutation::SetAttribute { target, .. }
            | Mutation::RemoveAttribute { target, .. }
            | Mutation::ReplaceChildren { target, .. } => Ok(target.clone()),
            Mutation::InsertChild { parent, .. } | Mutation::SetAttributes { parent, .. } => {
                Ok(parent.clone())
            }
            Mutation::RemoveChild { target } => target.parent().ok_or_else(|| {
                MutationError::InvalidStructure("cannot remove the document root".to_string())
            }),
        }
    }

    /// Merge hint used when recording this mutation
    pub fn merge_hint(&self) -> Option<MergeHint> {
        match self {
            Mutation::SetAttribute { target, name, .. } => Some(MergeHint::new(
                format!("set_attribute:{}", name),
                MergeParams::query(target.as_str()),
            )),
            Mutation::SetAttributes { updates, .. } => Some(MergeHint::new(
                "set_attributes",
                MergeParams::queries(updates.iter().map(|(target, _)| target.as_str())),
            )),
            _ => None,
        }
    }

    /// Check the mutation against the tree without changing it
    pub fn validate(&self, schema: &AddressSchema, root: &Element) -> Result<(), MutationError> {
        match self {
            Mutation::SetAttribute { target, .. } | Mutation::ReplaceChildren { target, .. } => {
                require_write(schema, root, target)
            }

            Mutation::RemoveAttribute { target, name } => {
                let node = schema
                    .node(root, target)
                    .ok_or_else(|| MutationError::TargetNotFound(target.clone()))?;
                if node.attr(name).is_none() {
                    return Err(MutationError::AttributeMissing {
                        target: target.clone(),
                        name: name.clone(),
                    });
                }
                Ok(())
            }

            Mutation::InsertChild { parent, element, .. } => {
                if !schema.resolves_for_write(root, parent) {
                    return Err(MutationError::ParentNotFound(parent.clone()));
                }
                if schema.is_keyed(&element.name) {
                    let key = element.attr(&schema.key_attribute).unwrap_or_default();
                    let taken = schema
                        .node(root, parent)
                        .and_then(|p| p.keyed_child(&element.name, &schema.key_attribute, key))
                        .is_some();
                    if taken {
                        return Err(MutationError::DuplicateKey {
                            parent: parent.clone(),
                            name: element.name.clone(),
                            key: key.to_string(),
                        });
                    }
                }
                Ok(())
            }

            Mutation::RemoveChild { target } => {
                self.snapshot_target()?;
                schema
                    .locate(root, target)
                    .map(|_| ())
                    .ok_or_else(|| MutationError::TargetNotFound(target.clone()))
            }

            Mutation::SetAttributes { parent, updates } => {
                if schema.locate(root, parent).is_none() {
                    return Err(MutationError::ParentNotFound(parent.clone()));
                }
                for (target, _) in updates {
                    if target.parent().as_ref() != Some(parent) {
                        return Err(MutationError::InvalidStructure(format!(
                            "{} is not a child of {}",
                            target, parent
                        )));
                    }
                    if schema.locate(root, target).is_none() {
                        return Err(MutationError::TargetNotFound(target.clone()));
                    }
                }
                Ok(())
            }
        }
    }

    /// Apply the mutation to the tree with validation
    pub fn apply(&self, schema: &AddressSchema, root: &mut Element) -> Result<(), MutationError> {
        self.validate(schema, root)?;

        match self {
            Mutation::SetAttribute {
                target,
                name,
                value,
            } => {
                let node = write_node(schema, root, target)?;
                node.set_attr(name.as_str(), value.as_str());
                Ok(())
            }

            Mutation::RemoveAttribute { target, name } => {
                let node = write_node(schema, root, target)?;
                node.attributes.remove(name);
                Ok(())
            }

            Mutation::InsertChild {
                parent,
                index,
                element,
            } => {
                let node = schema
                    .node_mut(root, parent)
                    .ok_or_else(|| MutationError::ParentNotFound(parent.clone()))?;
                let insert_index = (*index).min(node.children.len());
                node.children.insert(insert_index, element.clone());
                Ok(())
            }

            Mutation::RemoveChild { target } => {
                let locator = schema
                    .locate(root, target)
                    .ok_or_else(|| MutationError::TargetNotFound(target.clone()))?;
                let (parent, index) = match (locator.parent(), locator.last()) {
                    (Some(parent), Some(index)) => (parent, index),
                    _ => {
                        return Err(MutationError::InvalidStructure(
                            "cannot remove the document root".to_string(),
                        ))
                    }
                };
                let parent_node = root
                    .get_mut(&parent)
                    .ok_or_else(|| MutationError::TargetNotFound(target.clone()))?;
                parent_node.children.remove(index);
                Ok(())
            }

            Mutation::ReplaceChildren { target, children } => {
                let node = write_node(schema, root, target)?;
                node.children = children.clone();
                Ok(())
            }

            Mutation::SetAttributes { updates, .. } => {
                // Resolve everything first: a keyed update may rename a sibling
                // that a later address refers to
                let mut located = Vec::with_capacity(updates.len());
                for (target, attributes) in updates {
                    let locator = schema
                        .locate(root, target)
                        .ok_or_else(|| MutationError::TargetNotFound(target.clone()))?;
                    located.push((locator, attributes));
                }
                for (locator, attributes) in located {
                    if let Some(node) = root.get_mut(&locator) {
                        for (name, value) in attributes {
                            node.set_attr(name.as_str(), value.as_str());
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn require_write(schema: &AddressSchema, root: &Element, target: &NodeAddress) -> Result<(), MutationError> {
    if schema.resolves_for_write(root, target) {
        Ok(())
    } else {
        Err(MutationError::TargetNotFound(target.clone()))
    }
}

fn write_node<'a>(
    schema: &AddressSchema,
    root: &'a mut Element,
    target: &NodeAddress,
) -> Result<&'a mut Element, MutationError> {
    schema
        .node_mut(root, target)
        .ok_or_else(|| MutationError::TargetNotFound(target.clone()))
}
