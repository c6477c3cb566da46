//! # Diff Stack
//!
//! Snapshot-based undo/redo history for one element tree.
//!
//! ## Design
//!
//! - Before an edit, the editor calls [`DiffStack::snapshot`]: the target
//!   subtree is cloned and stored with its [`NodeAddress`]
//! - The edit is then applied in place by the editor; the stack never owns
//!   the live tree
//! - Undo re-resolves the address in the *current* tree, keeps the live
//!   subtree as the redo image and splices the stored clone back in
//! - Redo splices the redo image back in the same way
//! - Recording while not at the tip discards every entry past the new one
//! - Consecutive edits with matching [`MergeHint`]s collapse into one entry,
//!   keeping the before-image of the first edit of the run
//!
//! ## Positions
//!
//! ```text
//!  slot:   0         1        2        3
//!        baseline  edit     edit     edit
//!                           ▲        ▲
//!                        current   (redo)
//! ```
//!
//! Slot 0 is a full clone of the tree taken by [`DiffStack::init`]. `saved`
//! marks the slot matching the last save; undo is "available" whenever
//! `current != saved`.

use crate::events::{HistoryEvent, HistoryListener};
use crate::guard::{RecordingSwitch, SnapshotSuppression};
use crate::merge::MergeHint;
use crate::{HistoryConfig, HistoryError};
use snaptree_dom::{AddressSchema, Element, Locator, NodeAddress};
use std::fmt;
use tracing::{debug, instrument, trace, warn};

/// One recorded edit
#[derive(Debug, Clone)]
pub struct DiffEntry {
    /// Subtree before the edit; `None` for marker entries
    before: Option<Element>,

    /// Subtree captured by the last undo, replayed by redo
    after: Option<Element>,

    /// Where the edited node lives; `None` for marker entries
    address: Option<NodeAddress>,

    /// Position of the node when recorded, used as a fallback
    position: Locator,

    merge: Option<MergeHint>,

    source: String,
}

impl DiffEntry {
    fn marker(source: String) -> Self {
        Self {
            before: None,
            after: None,
            address: None,
            position: Locator::root(),
            merge: None,
            source,
        }
    }

    pub fn address(&self) -> Option<&NodeAddress> {
        self.address.as_ref()
    }

    pub fn before(&self) -> Option<&Element> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&Element> {
        self.after.as_ref()
    }

    pub fn merge_hint(&self) -> Option<&MergeHint> {
        self.merge.as_ref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether this entry stands for an event with no tree change
    pub fn is_marker(&self) -> bool {
        self.address.is_none()
    }
}

/// What a call to `snapshot` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// A new entry was written at `index`
    Recorded { index: usize },

    /// The edit coalesced into the existing entry at `index`
    Merged { index: usize },

    /// Recording is disabled
    Suppressed,
}

impl SnapshotOutcome {
    /// Whether the stack grew by one entry
    pub fn is_recorded(&self) -> bool {
        matches!(self, SnapshotOutcome::Recorded { .. })
    }
}

/// What an undo or redo applied to the live tree
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `old` was taken out of the tree and `new` put in its place
    Replaced { old: Element, new: Element },

    /// A marker entry was crossed; the tree is untouched
    Boundary,

    /// The entry's address no longer resolves; the tree is untouched
    Stale { address: NodeAddress },
}

impl Step {
    /// The (old, new) pair reported to listeners
    pub fn into_pair(self) -> (Option<Element>, Option<Element>) {
        match self {
            Step::Replaced { old, new } => (Some(old), Some(new)),
            Step::Boundary | Step::Stale { .. } => (None, None),
        }
    }
}

/// Transition of undo availability between two cursor positions
///
/// Returns `1` when undo became available (cursor left the save point),
/// `-1` when it became unavailable (cursor came back to it), `0` otherwise.
pub fn compute_undo_availability(previous: usize, current: usize, saved: usize) -> i32 {
    if previous != saved && current == saved {
        return -1;
    }
    if previous == saved && current != saved {
        return 1;
    }
    0
}

/// Undo/redo history for one document
pub struct DiffStack {
    schema: AddressSchema,

    /// Slot 0 is the baseline; slots past the last one are undefined
    entries: Vec<DiffEntry>,

    capacity: usize,

    current: usize,
    previous: usize,
    saved: usize,

    /// Availability transition produced by the last operation
    transition: i32,

    current_source: String,
    snapshot_enabled: bool,
    events_blocked: bool,

    listeners: Vec<Box<dyn HistoryListener>>,
}

impl DiffStack {
    /// Create a stack bound to `root`, which becomes the baseline
    pub fn new(schema: AddressSchema, config: &HistoryConfig, root: &Element) -> Self {
        let mut stack = Self {
            schema,
            entries: Vec::new(),
            capacity: config.capacity.max(1),
            current: 0,
            previous: 0,
            saved: 0,
            transition: 0,
            current_source: config.default_source.clone(),
            snapshot_enabled: true,
            events_blocked: false,
            listeners: Vec::new(),
        };
        stack.init(root);
        stack
    }

    /// Drop all history and take a fresh baseline of `root`
    pub fn init(&mut self, root: &Element) {
        let mut baseline = DiffEntry::marker(String::new());
        baseline.before = Some(root.clone());

        self.entries = Vec::with_capacity(self.capacity.min(64));
        self.entries.push(baseline);
        self.current = 0;
        self.previous = 0;
        self.saved = 0;
        self.transition = 0;
    }

    pub fn schema(&self) -> &AddressSchema {
        &self.schema
    }

    pub fn add_listener(&mut self, listener: impl HistoryListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Stop (or resume) notifying listeners, returning the previous setting
    ///
    /// Recording is unaffected.
    pub fn block_events(&mut self, block: bool) -> bool {
        std::mem::replace(&mut self.events_blocked, block)
    }

    /// Disable recording until the returned guard is dropped
    pub fn suppress(&mut self) -> SnapshotSuppression<'_, Self> {
        SnapshotSuppression::new(self)
    }

    pub fn is_snapshot_enabled(&self) -> bool {
        self.snapshot_enabled
    }

    pub fn current_source(&self) -> &str {
        &self.current_source
    }

    /// Set the editing context that new entries are tagged with
    pub fn set_current_source(&mut self, source: impl Into<String>) {
        self.current_source = source.into();
    }

    /// Record the node at `locator` before it is edited
    pub fn snapshot(
        &mut self,
        root: &Element,
        locator: &Locator,
    ) -> Result<SnapshotOutcome, HistoryError> {
        self.snapshot_with(root, locator, None)
    }

    /// Record the node at `locator`, merging into the top entry if `hint` allows
    pub fn snapshot_with(
        &mut self,
        root: &Element,
        locator: &Locator,
        hint: Option<MergeHint>,
    ) -> Result<SnapshotOutcome, HistoryError> {
        if !self.snapshot_enabled {
            return Ok(SnapshotOutcome::Suppressed);
        }

        let address = self.schema.address_of(root, locator)?;
        let node = root
            .get(locator)
            .ok_or_else(|| snaptree_dom::AddressError::Detached(locator.clone()))?;

        let hint = hint.filter(MergeHint::is_mergeable);
        if let Some(hint) = &hint {
            if self.merges_into_top(&address, hint) {
                self.previous = self.current;
                // a merge is still a new edit: the redo branch is gone
                self.entries.truncate(self.current + 1);
                debug!(address = %address, tag = %hint.tag, index = self.current, "edit merged");
                self.emit(HistoryEvent::EditRecorded {
                    address: Some(address),
                    merged: true,
                });
                self.update_availability(compute_undo_availability(
                    self.previous,
                    self.current,
                    self.saved,
                ));
                return Ok(SnapshotOutcome::Merged {
                    index: self.current,
                });
            }
        }

        let entry = DiffEntry {
            before: Some(node.clone()),
            after: None,
            address: Some(address.clone()),
            position: locator.clone(),
            merge: hint,
            source: self.current_source.clone(),
        };
        let previous = self.current;
        let index = self.push(entry)?;
        self.previous = previous;
        debug!(address = %address, index, "edit recorded");

        self.emit(HistoryEvent::EditRecorded {
            address: Some(address),
            merged: false,
        });
        self.update_availability(compute_undo_availability(
            self.previous,
            self.current,
            self.saved,
        ));
        Ok(SnapshotOutcome::Recorded { index })
    }

    /// Record an event that has no tree change of its own
    ///
    /// The entry takes part in undo/redo navigation but applies nothing.
    pub fn snapshot_marker(&mut self) -> Result<SnapshotOutcome, HistoryError> {
        if !self.snapshot_enabled {
            return Ok(SnapshotOutcome::Suppressed);
        }

        let previous = self.current;
        let index = self.push(DiffEntry::marker(self.current_source.clone()))?;
        self.previous = previous;
        trace!(index, "marker recorded");

        self.emit(HistoryEvent::EditRecorded {
            address: None,
            merged: false,
        });
        self.update_availability(compute_undo_availability(
            self.previous,
            self.current,
            self.saved,
        ));
        Ok(SnapshotOutcome::Recorded { index })
    }

    /// Revert the entry at the cursor
    ///
    /// Returns `None` when nothing was undone: the cursor is at the
    /// baseline or the entry belongs to another source.
    #[instrument(skip_all, fields(current = self.current, source = %self.current_source))]
    pub fn undo(&mut self, root: &mut Element) -> Option<Step> {
        self.previous = self.current;
        let step = self.undo_step(root);

        if let Some(step) = &step {
            self.emit_step(step);
        }
        self.update_availability(compute_undo_availability(
            self.previous,
            self.current,
            self.saved,
        ));
        step
    }

    fn undo_step(&mut self, root: &mut Element) -> Option<Step> {
        if self.current == 0 {
            return None;
        }

        let index = self.current;
        let entry = self.entries.get(index)?;
        if entry.source != self.current_source {
            trace!(entry_source = %entry.source, "undo rejected for foreign source");
            return None;
        }

        let step = match (entry.address.clone(), entry.before.clone()) {
            (Some(address), Some(before)) => {
                match self.resolve(root, &address, &entry.position) {
                    Some(locator) => match root.replace(&locator, before.clone()) {
                        Some(old) => {
                            self.entries[index].after = Some(old.clone());
                            Step::Replaced { old, new: before }
                        }
                        None => self.stale(index, address),
                    },
                    None => self.stale(index, address),
                }
            }
            _ => Step::Boundary,
        };

        self.current -= 1;
        trace!(current = self.current, "undo applied");
        Some(step)
    }

    /// Re-apply the entry just past the cursor
    ///
    /// Returns `None` when there is nothing to redo or the entry belongs to
    /// another source. Entries with an empty source are redoable from any
    /// source.
    #[instrument(skip_all, fields(current = self.current, source = %self.current_source))]
    pub fn redo(&mut self, root: &mut Element) -> Option<Step> {
        self.previous = self.current;
        let step = self.redo_step(root);

        if let Some(step) = &step {
            self.emit_step(step);
        }
        self.update_availability(compute_undo_availability(
            self.previous,
            self.current,
            self.saved,
        ));
        step
    }

    fn redo_step(&mut self, root: &mut Element) -> Option<Step> {
        let index = self.current + 1;
        let entry = self.entries.get(index)?;
        if entry.source != self.current_source && !entry.source.is_empty() {
            trace!(entry_source = %entry.source, "redo rejected for foreign source");
            return None;
        }

        let step = match (entry.address.clone(), entry.after.clone()) {
            (Some(address), Some(after)) => {
                match self.resolve(root, &address, &entry.position) {
                    Some(locator) => match root.replace(&locator, after.clone()) {
                        Some(old) => Step::Replaced { old, new: after },
                        None => self.stale(index, address),
                    },
                    None => self.stale(index, address),
                }
            }
            (Some(address), None) => self.stale(index, address),
            (None, _) => Step::Boundary,
        };

        self.current = index;
        trace!(current = self.current, "redo applied");
        Some(step)
    }

    /// Mark the current position as the saved state
    pub fn register_save_state(&mut self) {
        let old_saved = self.saved;
        self.previous = self.current;
        self.saved = self.current;
        // transition measured against the old save point
        self.update_availability(compute_undo_availability(
            old_saved,
            self.current,
            self.saved,
        ));
    }

    /// Drop every entry except the baseline
    pub fn clear(&mut self) {
        self.previous = self.current;
        self.entries.truncate(1);
        self.current = 0;
        self.update_availability(compute_undo_availability(
            self.previous,
            self.current,
            self.saved,
        ));
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current + 1 < self.entries.len()
    }

    /// Whether the cursor is away from the save point
    pub fn is_modified(&self) -> bool {
        self.current != self.saved
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn previous(&self) -> usize {
        self.previous
    }

    pub fn saved(&self) -> usize {
        self.saved
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of defined slots, baseline included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true: the baseline is always defined
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tree as it was when the stack was initialized
    pub fn baseline(&self) -> Option<&Element> {
        self.entries.first().and_then(DiffEntry::before)
    }

    pub fn entry(&self, index: usize) -> Option<&DiffEntry> {
        self.entries.get(index)
    }

    /// Availability transition of the last operation (-1, 0 or 1)
    pub fn undo_availability(&self) -> i32 {
        self.transition
    }

    fn merges_into_top(&self, address: &NodeAddress, hint: &MergeHint) -> bool {
        if self.current == 0 || self.current == self.saved {
            return false;
        }
        let Some(top) = self.entries.get(self.current) else {
            return false;
        };
        let Some(top_hint) = &top.merge else {
            return false;
        };
        if top.address.as_ref() != Some(address) || top_hint.tag != hint.tag {
            return false;
        }

        match hint.params.coalesces_with(&top_hint.params) {
            Some(merged) => merged,
            None => {
                warn!(tag = %hint.tag, "merge params carry no query; recording separately");
                false
            }
        }
    }

    fn push(&mut self, entry: DiffEntry) -> Result<usize, HistoryError> {
        let index = self.current + 1;
        if index >= self.capacity {
            warn!(capacity = self.capacity, "history full; edit will not be undoable");
            return Err(HistoryError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        self.entries.truncate(index);
        self.entries.push(entry);
        self.current = index;
        Ok(index)
    }

    /// Write-mode resolution only when it is certain to succeed, so a
    /// stale address never leaves new containers behind
    fn resolve(&self, root: &mut Element, address: &NodeAddress, position: &Locator) -> Option<Locator> {
        if self.schema.resolves_for_write(root, address) {
            return self.schema.locate_for_write(root, address);
        }
        self.schema.fallback(root, address, position)
    }

    fn stale(&mut self, index: usize, address: NodeAddress) -> Step {
        warn!(address = %address, index, "address no longer resolves; step skipped");
        if let Some(entry) = self.entries.get_mut(index) {
            entry.after = None;
        }
        Step::Stale { address }
    }

    fn emit_step(&mut self, step: &Step) {
        let (old, new) = step.clone().into_pair();
        self.emit(HistoryEvent::UndoRedoApplied { old, new });
    }

    fn update_availability(&mut self, transition: i32) {
        self.transition = transition;
        match transition {
            1 => self.emit(HistoryEvent::UndoAvailabilityChanged(true)),
            -1 => self.emit(HistoryEvent::UndoAvailabilityChanged(false)),
            _ => {}
        }
    }

    fn emit(&mut self, event: HistoryEvent) {
        if self.events_blocked {
            return;
        }
        trace!(?event, listeners = self.listeners.len(), "dispatching history event");
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }
}

impl RecordingSwitch for DiffStack {
    fn enable_snapshot(&mut self, enable: bool) -> bool {
        std::mem::replace(&mut self.snapshot_enabled, enable)
    }
}

impl fmt::Debug for DiffStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffStack")
            .field("len", &self.entries.len())
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("saved", &self.saved)
            .field("source", &self.current_source)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl fmt::Display for DiffStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[diff stack] size={}, saved={}, current={}, previous={}, undo_available={}",
            self.entries.len(),
            self.saved,
            self.current,
            self.previous,
            self.transition
        )
    }
}
