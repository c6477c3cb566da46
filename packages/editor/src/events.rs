//! History notifications.
//!
//! Dispatch is synchronous: listeners run on the caller's stack before the
//! triggering operation returns. Listeners only get shared references, so a
//! listener cannot reach back into the stack that is notifying it.

use snaptree_dom::{Element, NodeAddress};

/// Notification emitted by a [`DiffStack`](crate::DiffStack)
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEvent {
    /// An edit was recorded; `address` is `None` for marker entries
    EditRecorded {
        address: Option<NodeAddress>,
        merged: bool,
    },

    /// Undo or redo swapped a node; both sides are `None` for boundary steps
    UndoRedoApplied {
        old: Option<Element>,
        new: Option<Element>,
    },

    /// Undo availability flipped relative to the save point
    UndoAvailabilityChanged(bool),
}

pub trait HistoryListener {
    fn on_event(&mut self, event: &HistoryEvent);
}

impl<F> HistoryListener for F
where
    F: FnMut(&HistoryEvent),
{
    fn on_event(&mut self, event: &HistoryEvent) {
        self(event)
    }
}

/// One undo/redo step spanning both documents of a pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DualStep {
    pub primary_old: Option<Element>,
    pub primary_new: Option<Element>,
    pub metadata_old: Option<Element>,
    pub metadata_new: Option<Element>,
}

impl DualStep {
    /// Whether the primary tree changed in this step
    pub fn touches_primary(&self) -> bool {
        self.primary_old.is_some() || self.primary_new.is_some()
    }

    /// Whether the metadata tree changed in this step
    pub fn touches_metadata(&self) -> bool {
        self.metadata_old.is_some() || self.metadata_new.is_some()
    }
}

/// Notification emitted by a [`DualDocument`](crate::DualDocument)
#[derive(Debug, Clone, PartialEq)]
pub enum DualEvent {
    UndoRedo(DualStep),
    UndoAvailabilityChanged(bool),
}

pub trait DualListener {
    fn on_event(&mut self, event: &DualEvent);
}

impl<F> DualListener for F
where
    F: FnMut(&DualEvent),
{
    fn on_event(&mut self, event: &DualEvent) {
        self(event)
    }
}
