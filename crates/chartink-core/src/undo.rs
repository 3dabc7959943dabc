//! Local undo/redo coordinator.
//!
//! Wraps the substrate's undo primitive. The manager only tracks transactions
//! committed by this peer, so a local undo can never revert another client's
//! edit. Layer transactions (origin prefix `layers:`) are excluded from the
//! scope entirely: that keeps layer create/delete/reorder off the local stack
//! and also keeps a cascade delete from being partially resurrected.

use crate::crdt::{MapDocument, ORIGIN_LAYERS_PREFIX};
use loro::UndoManager;

/// Maximum tracked undo steps.
pub const MAX_UNDO_STEPS: usize = 100;

/// Undo/redo over the feature collections of a [`MapDocument`].
pub struct UndoCoordinator {
    manager: UndoManager,
}

impl UndoCoordinator {
    /// Create a coordinator for a document.
    ///
    /// Must be constructed before the transactions it should track.
    pub fn new(doc: &MapDocument) -> Self {
        let mut manager = UndoManager::new(doc.loro_doc());
        manager.set_max_undo_steps(MAX_UNDO_STEPS);
        // Every committed transaction becomes its own undo entry.
        manager.set_merge_interval(0);
        manager.add_exclude_origin_prefix(ORIGIN_LAYERS_PREFIX);
        Self { manager }
    }

    /// Undo the most recent local feature transaction.
    /// Returns true if an entry was popped and applied.
    pub fn undo(&mut self) -> bool {
        self.manager.undo().unwrap_or(false)
    }

    /// Re-apply the most recently undone transaction.
    /// Returns true if an entry was popped and applied.
    pub fn redo(&mut self) -> bool {
        self.manager.redo().unwrap_or(false)
    }

    /// Whether the undo stack is non-empty (UI gating).
    pub fn can_undo(&self) -> bool {
        self.manager.can_undo()
    }

    /// Whether the redo stack is non-empty (UI gating).
    pub fn can_redo(&self) -> bool {
        self.manager.can_redo()
    }

    /// Number of available undo steps.
    pub fn undo_count(&self) -> usize {
        self.manager.undo_count()
    }

    /// Number of available redo steps.
    pub fn redo_count(&self) -> usize {
        self.manager.redo_count()
    }

    /// Drop both stacks. Called on reconnect: history recorded against a
    /// stale replica must not be replayed onto freshly merged state.
    pub fn clear(&self) {
        self.manager.clear();
    }
}
