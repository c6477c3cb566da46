//! # Document Handle
//!
//! A Document owns one element tree together with its undo history.
//!
//! Every edit goes through the same sequence:
//!
//! ```text
//! resolve target → snapshot → mutate in place → bump version
//!       ↓             ↓
//!   (containers   (merge or
//!    created)      append)
//! ```
//!
//! Undo and redo splice recorded subtrees back into the live tree. Side
//! effects that react to them run under [`Document::replay`] so they do not
//! record history of their own.

use crate::guard::{RecordingSwitch, SnapshotSuppression};
use crate::merge::MergeHint;
use crate::{
    DiffStack, EditorError, HistoryConfig, HistoryError, Mutation, MutationError, MutationResult,
    SnapshotOutcome, Step,
};
use snaptree_dom::{AddressSchema, Element, Locator, NodeAddress};
use std::fmt;
use tracing::{debug, instrument, warn};

/// Editable element tree with history
pub struct Document {
    root: Element,

    history: DiffStack,

    /// Current version number (increments on each change to the tree)
    version: u64,
}

impl Document {
    pub fn new(root: Element, schema: AddressSchema, config: &HistoryConfig) -> Self {
        let history = DiffStack::new(schema, config, &root);
        Self {
            root,
            history,
            version: 0,
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn schema(&self) -> &AddressSchema {
        self.history.schema()
    }

    pub fn history(&self) -> &DiffStack {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut DiffStack {
        &mut self.history
    }

    /// Node at `address`, if it resolves
    pub fn node(&self, address: &NodeAddress) -> Option<&Element> {
        self.history.schema().node(&self.root, address)
    }

    /// Apply a mutation, recording it with its own merge hint
    #[instrument(skip_all, fields(version = self.version))]
    pub fn apply(&mut self, mutation: &Mutation) -> Result<MutationResult, EditorError> {
        self.apply_with(mutation, mutation.merge_hint())
    }

    /// Apply a mutation, recording it under `hint` instead of its own
    pub(crate) fn apply_with(
        &mut self,
        mutation: &Mutation,
        hint: Option<MergeHint>,
    ) -> Result<MutationResult, EditorError> {
        self.validate(mutation)?;

        let target = mutation.snapshot_target()?;
        let locator = self
            .history
            .schema()
            .locate_for_write(&mut self.root, &target)
            .ok_or(MutationError::TargetNotFound(target))?;

        let recorded = self.record(&locator, hint)?;
        mutation.apply(self.history.schema(), &mut self.root)?;
        self.version += 1;

        Ok(MutationResult {
            version: self.version,
            recorded,
        })
    }

    /// Check a mutation against the current tree without applying it
    pub fn validate(&self, mutation: &Mutation) -> Result<(), MutationError> {
        mutation.validate(self.history.schema(), &self.root)
    }

    /// Record the node at `address` and hand it to `edit`
    ///
    /// For editor actions that are not expressed as a [`Mutation`].
    pub fn edit<F>(
        &mut self,
        address: &NodeAddress,
        hint: Option<MergeHint>,
        edit: F,
    ) -> Result<MutationResult, EditorError>
    where
        F: FnOnce(&mut Element),
    {
        let locator = self
            .history
            .schema()
            .locate_for_write(&mut self.root, address)
            .ok_or_else(|| MutationError::TargetNotFound(address.clone()))?;

        let recorded = self.record(&locator, hint)?;
        let node = self
            .root
            .get_mut(&locator)
            .ok_or_else(|| MutationError::TargetNotFound(address.clone()))?;
        edit(node);
        self.version += 1;

        Ok(MutationResult {
            version: self.version,
            recorded,
        })
    }

    /// Record a boundary entry that changes nothing in the tree
    pub fn record_marker(&mut self) -> Option<SnapshotOutcome> {
        match self.history.snapshot_marker() {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!(%err, "marker not recorded");
                None
            }
        }
    }

    /// Record a marker without notifying history listeners
    pub(crate) fn record_marker_silently(&mut self) -> Option<SnapshotOutcome> {
        let blocked = self.history.block_events(true);
        let outcome = self.record_marker();
        self.history.block_events(blocked);
        outcome
    }

    pub fn undo(&mut self) -> Option<Step> {
        let step = self.history.undo(&mut self.root);
        self.bump_on_change(step.as_ref());
        step
    }

    pub fn redo(&mut self) -> Option<Step> {
        let step = self.history.redo(&mut self.root);
        self.bump_on_change(step.as_ref());
        step
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Register the current state as saved
    pub fn mark_saved(&mut self) {
        self.history.register_save_state();
        debug!(version = self.version, saved = self.history.saved(), "document saved");
    }

    /// Check if document has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.history.is_modified()
    }

    /// Run `f` with history recording switched off
    ///
    /// Recording comes back on when `f` returns or unwinds.
    pub fn replay<R>(&mut self, f: impl FnOnce(&mut Document) -> R) -> R {
        let mut guard = SnapshotSuppression::new(self);
        f(&mut guard)
    }

    fn record(
        &mut self,
        locator: &Locator,
        hint: Option<MergeHint>,
    ) -> Result<Option<SnapshotOutcome>, EditorError> {
        match self.history.snapshot_with(&self.root, locator, hint) {
            Ok(outcome) => Ok(Some(outcome)),
            // the edit still goes through, it just cannot be undone
            Err(HistoryError::CapacityExceeded { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn bump_on_change(&mut self, step: Option<&Step>) {
        if let Some(Step::Replaced { .. }) = step {
            self.version += 1;
        }
    }
}

impl RecordingSwitch for Document {
    fn enable_snapshot(&mut self, enable: bool) -> bool {
        self.history.enable_snapshot(enable)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root.name)
            .field("version", &self.version)
            .field("history", &self.history)
            .finish()
    }
}
