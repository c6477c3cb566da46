//! # Dual Document
//!
//! Pairs a primary document with a metadata document describing the same
//! entity, so that one user action is one undo step across both trees.
//!
//! ## Lockstep
//!
//! The two histories always have the same length. Whenever one side records
//! a new entry, the other side records a marker at the same position with its
//! listeners blocked. Undo and redo therefore move both cursors together:
//!
//! ```text
//! primary : [base] [edit] [mark] [edit]
//! metadata: [base] [mark] [edit] [edit]
//!                                  ^ current
//! ```
//!
//! Each undo/redo produces one [`DualEvent::UndoRedo`] carrying both trees'
//! old/new pairs. A side whose entry was a marker reports `(None, None)`.

use crate::events::{DualEvent, DualListener, DualStep};
use crate::guard::{RecordingSwitch, SnapshotSuppression};
use crate::merge::MergeHint;
use crate::{
    compute_undo_availability, Document, EditorConfig, EditorError, Mutation, MutationResult, Step,
};
use snaptree_dom::{Element, NodeAddress};
use std::fmt;
use tracing::{debug, instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Primary,
    Metadata,
}

type Pair = (Option<Element>, Option<Element>);

/// Steps collected while an undo/redo is dispatched to both sides
#[derive(Debug, Default)]
struct Pending {
    waiting_primary: bool,
    waiting_metadata: bool,
    primary: Option<Pair>,
    metadata: Option<Pair>,
}

impl Pending {
    fn arm(&mut self) {
        *self = Pending {
            waiting_primary: true,
            waiting_metadata: true,
            ..Pending::default()
        };
    }

    fn receive(&mut self, side: Side, step: Option<Step>) {
        let pair = step.map(Step::into_pair);
        match side {
            Side::Primary => {
                self.waiting_primary = false;
                self.primary = pair;
            }
            Side::Metadata => {
                self.waiting_metadata = false;
                self.metadata = pair;
            }
        }
    }

    /// Combined step once both sides reported; `None` if neither moved
    fn take(&mut self) -> Option<DualStep> {
        if self.waiting_primary || self.waiting_metadata {
            return None;
        }
        let pending = std::mem::take(self);
        if pending.primary.is_none() && pending.metadata.is_none() {
            return None;
        }

        let (primary_old, primary_new) = pending.primary.unwrap_or_default();
        let (metadata_old, metadata_new) = pending.metadata.unwrap_or_default();
        Some(DualStep {
            primary_old,
            primary_new,
            metadata_old,
            metadata_new,
        })
    }
}

/// Primary and metadata documents edited and undone as one unit
pub struct DualDocument {
    primary: Document,
    metadata: Document,
    pending: Pending,
    listeners: Vec<Box<dyn DualListener>>,
}

impl DualDocument {
    pub fn new(primary_root: Element, metadata_root: Element, config: &EditorConfig) -> Self {
        Self::from_documents(
            Document::new(primary_root, config.primary_schema.clone(), &config.history),
            Document::new(metadata_root, config.metadata_schema.clone(), &config.history),
        )
    }

    /// Pair two documents; both histories are reset to their current trees
    pub fn from_documents(mut primary: Document, mut metadata: Document) -> Self {
        let root = primary.root().clone();
        primary.history_mut().init(&root);
        let root = metadata.root().clone();
        metadata.history_mut().init(&root);

        Self {
            primary,
            metadata,
            pending: Pending::default(),
            listeners: Vec::new(),
        }
    }

    pub fn primary(&self) -> &Document {
        &self.primary
    }

    pub fn metadata(&self) -> &Document {
        &self.metadata
    }

    pub fn add_listener(&mut self, listener: impl DualListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Set the active source tag on both histories
    pub fn set_current_source(&mut self, source: &str) {
        self.primary.history_mut().set_current_source(source);
        self.metadata.history_mut().set_current_source(source);
    }

    pub fn apply_primary(&mut self, mutation: &Mutation) -> Result<MutationResult, EditorError> {
        self.track(|dual| dual.single(Side::Primary, |doc| doc.apply(mutation)))
    }

    pub fn apply_metadata(&mut self, mutation: &Mutation) -> Result<MutationResult, EditorError> {
        self.track(|dual| dual.single(Side::Metadata, |doc| doc.apply(mutation)))
    }

    pub fn edit_primary<F>(
        &mut self,
        address: &NodeAddress,
        hint: Option<MergeHint>,
        edit: F,
    ) -> Result<MutationResult, EditorError>
    where
        F: FnOnce(&mut Element),
    {
        self.track(|dual| dual.single(Side::Primary, |doc| doc.edit(address, hint, edit)))
    }

    pub fn edit_metadata<F>(
        &mut self,
        address: &NodeAddress,
        hint: Option<MergeHint>,
        edit: F,
    ) -> Result<MutationResult, EditorError>
    where
        F: FnOnce(&mut Element),
    {
        self.track(|dual| dual.single(Side::Metadata, |doc| doc.edit(address, hint, edit)))
    }

    /// Apply one logical action touching both trees
    ///
    /// Each tree records exactly one entry; a marker stands in for an absent
    /// side. Paired edits never merge. Both mutations are validated before
    /// either tree changes; nothing is rolled back once the primary side has
    /// applied.
    ///
    /// When the histories are full the edit still lands on both trees without
    /// being recorded, so the cursors only stay in lockstep if both sides share
    /// a capacity, as they do when built through [`DualDocument::new`].
    #[instrument(skip_all)]
    pub fn apply_paired(
        &mut self,
        primary: Option<&Mutation>,
        metadata: Option<&Mutation>,
    ) -> Result<(), EditorError> {
        if primary.is_none() && metadata.is_none() {
            return Ok(());
        }
        if let Some(mutation) = primary {
            self.primary.validate(mutation)?;
        }
        if let Some(mutation) = metadata {
            self.metadata.validate(mutation)?;
        }

        self.track(|dual| {
            let primary_blocked = dual.primary.history_mut().block_events(true);
            let metadata_blocked = dual.metadata.history_mut().block_events(true);

            let result = Self::apply_side(&mut dual.primary, primary)
                .and_then(|_| Self::apply_side(&mut dual.metadata, metadata));

            dual.primary.history_mut().block_events(primary_blocked);
            dual.metadata.history_mut().block_events(metadata_blocked);
            result
        })?;

        debug!(
            primary = primary.is_some(),
            metadata = metadata.is_some(),
            "paired edit recorded"
        );
        Ok(())
    }

    #[instrument(skip_all)]
    pub fn undo(&mut self) -> Option<DualStep> {
        self.track(|dual| {
            dual.pending.arm();
            let step = dual.metadata.undo();
            dual.pending.receive(Side::Metadata, step);
            let step = dual.primary.undo();
            dual.pending.receive(Side::Primary, step);
            dual.flush()
        })
    }

    #[instrument(skip_all)]
    pub fn redo(&mut self) -> Option<DualStep> {
        self.track(|dual| {
            dual.pending.arm();
            let step = dual.metadata.redo();
            dual.pending.receive(Side::Metadata, step);
            let step = dual.primary.redo();
            dual.pending.receive(Side::Primary, step);
            dual.flush()
        })
    }

    pub fn can_undo(&self) -> bool {
        self.primary.can_undo() || self.metadata.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.primary.can_redo() || self.metadata.can_redo()
    }

    /// Register the save state on both histories
    pub fn save(&mut self) {
        self.track(|dual| {
            dual.primary.mark_saved();
            dual.metadata.mark_saved();
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.primary.is_dirty() || self.metadata.is_dirty()
    }

    /// Run `f` with recording switched off on both histories
    pub fn replay<R>(&mut self, f: impl FnOnce(&mut DualDocument) -> R) -> R {
        let mut guard = SnapshotSuppression::new(self);
        f(&mut guard)
    }

    /// Run an edit on one side and keep the other side in lockstep
    fn single<F>(&mut self, side: Side, edit: F) -> Result<MutationResult, EditorError>
    where
        F: FnOnce(&mut Document) -> Result<MutationResult, EditorError>,
    {
        let (target, other) = match side {
            Side::Primary => (&mut self.primary, &mut self.metadata),
            Side::Metadata => (&mut self.metadata, &mut self.primary),
        };

        let result = edit(target)?;
        if result.recorded.map_or(false, |outcome| outcome.is_recorded()) {
            other.record_marker_silently();
            trace!(?side, "lockstep marker recorded");
        }
        Ok(result)
    }

    fn apply_side(doc: &mut Document, mutation: Option<&Mutation>) -> Result<(), EditorError> {
        match mutation {
            Some(mutation) => {
                doc.apply_with(mutation, None)?;
            }
            None => {
                doc.record_marker();
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Option<DualStep> {
        let step = self.pending.take()?;
        trace!(
            primary = step.touches_primary(),
            metadata = step.touches_metadata(),
            "combined step"
        );
        self.emit(DualEvent::UndoRedo(step.clone()));
        Some(step)
    }

    /// Run `op` and report how it moved the primary cursor relative to the save point
    fn track<R>(&mut self, op: impl FnOnce(&mut Self) -> R) -> R {
        let history = self.primary.history();
        let (current, saved) = (history.current(), history.saved());

        let result = op(self);

        let history = self.primary.history();
        let previous = if history.saved() != saved {
            saved
        } else {
            current
        };
        match compute_undo_availability(previous, history.current(), history.saved()) {
            1 => self.emit(DualEvent::UndoAvailabilityChanged(true)),
            -1 => self.emit(DualEvent::UndoAvailabilityChanged(false)),
            _ => {}
        }
        result
    }

    fn emit(&mut self, event: DualEvent) {
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }
}

impl RecordingSwitch for DualDocument {
    fn enable_snapshot(&mut self, enable: bool) -> bool {
        let previous = self.primary.enable_snapshot(enable);
        self.metadata.enable_snapshot(enable);
        previous
    }
}

impl fmt::Debug for DualDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualDocument")
            .field("primary", &self.primary)
            .field("metadata", &self.metadata)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
