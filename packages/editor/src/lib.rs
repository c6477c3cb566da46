//! # Snaptree Editor
//!
//! Reversible editing for element trees.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ dom: element tree + NodeAddress resolver    │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ DiffStack: snapshot / undo / redo / merge   │
//! │  - whole-subtree clones, keyed by address   │
//! │  - save point + availability edges          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ Document / DualDocument                     │
//! │  - addressed mutations                      │
//! │  - paired trees undone as one step          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Addresses, not references**: history re-resolves paths against the
//!    live tree on every undo/redo
//! 2. **Snapshots, not patches**: each entry owns a clone of the edited subtree
//! 3. **One action, one step**: fine-grained edits merge, paired trees move
//!    together
//! 4. **Degrade, don't fail**: stale entries and a full history reduce what
//!    can be undone but never corrupt the tree
//!
//! ## Usage
//!
//! ```rust,ignore
//! use snaptree_editor::{Document, HistoryConfig, Mutation};
//! use snaptree_dom::AddressSchema;
//!
//! let mut doc = Document::new(root, AddressSchema::project(), &HistoryConfig::default());
//!
//! doc.apply(&Mutation::SetAttribute {
//!     target: "./vle_project/structures/model[@name=\"top\"]".parse()?,
//!     name: "width".to_string(),
//!     value: "120".to_string(),
//! })?;
//!
//! doc.undo();
//! doc.redo();
//! doc.mark_saved();
//! ```

mod config;
mod diff_stack;
mod document;
mod dual_document;
mod errors;
mod events;
mod guard;
mod merge;
mod mutations;

pub use config::{EditorConfig, HistoryConfig, DEFAULT_CAPACITY, DEFAULT_CONFIG_NAME};
pub use diff_stack::{compute_undo_availability, DiffEntry, DiffStack, SnapshotOutcome, Step};
pub use document::Document;
pub use dual_document::DualDocument;
pub use errors::{EditorError, HistoryError};
pub use events::{DualEvent, DualListener, DualStep, HistoryEvent, HistoryListener};
pub use guard::{RecordingSwitch, SnapshotSuppression};
pub use merge::{MergeHint, MergeParams, MergeValue, NO_MERGE};
pub use mutations::{Mutation, MutationError, MutationResult};

// Re-export common types for convenience
pub use snaptree_dom::{AddressSchema, Element, Locator, NodeAddress};
