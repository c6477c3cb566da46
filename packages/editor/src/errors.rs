//! Error types for the editor

use crate::mutations::MutationError;
use snaptree_dom::AddressError;
use thiserror::Error;

/// Failures reported by a [`DiffStack`](crate::DiffStack)
///
/// Only conditions the caller may want to react to are surfaced here.
/// Unresolvable addresses during undo/redo, malformed merge params and
/// cross-source redo requests degrade silently (logged) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistoryError {
    #[error("History is full ({capacity} slots); edit not recorded")]
    CapacityExceeded { capacity: usize },

    #[error("Cannot address snapshot target: {0}")]
    Address(#[from] AddressError),
}

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),
}
