//! Editor facade wiring the store, drawing tools, selection, and undo.
//!
//! `MapEditor` is the imperative surface exposed to rendering/UI
//! collaborators. All writes go through the store's atomic operations; the
//! drawing and selection components only ever read store snapshots, so no
//! component can interleave a partial write with another's read.

use crate::crdt::MapDocument;
use crate::error::{DrawError, EditError, StoreResult};
use crate::features::{
    Feature, FeatureId, FeaturePatch, Layer, LayerId, LayerPatch, StylePatch,
};
use crate::selection::{SelectionBox, SelectionEngine};
use crate::tools::{DrawingController, PendingCommit, SessionState, ToolKind};
use crate::undo::UndoCoordinator;
use kurbo::Point;

/// The annotation/layer editing engine for one client.
pub struct MapEditor {
    doc: MapDocument,
    drawing: DrawingController,
    selection: SelectionEngine,
    undo: UndoCoordinator,
    active_layer: Option<LayerId>,
    local_user: String,
}

impl MapEditor {
    /// Create an editor over a fresh document.
    pub fn new(local_user: &str) -> Self {
        let doc = MapDocument::new();
        let undo = UndoCoordinator::new(&doc);
        Self {
            doc,
            drawing: DrawingController::new(),
            selection: SelectionEngine::new(),
            undo,
            active_layer: None,
            local_user: local_user.to_string(),
        }
    }

    /// Create an editor over a document snapshot received from the substrate.
    pub fn from_snapshot(bytes: &[u8], local_user: &str) -> loro::LoroResult<Self> {
        let doc = MapDocument::from_snapshot(bytes)?;
        let undo = UndoCoordinator::new(&doc);
        Ok(Self {
            doc,
            drawing: DrawingController::new(),
            selection: SelectionEngine::new(),
            undo,
            active_layer: None,
            local_user: local_user.to_string(),
        })
    }

    /// Underlying store.
    pub fn doc(&self) -> &MapDocument {
        &self.doc
    }

    /// Create the default layer if the document has none and make sure some
    /// layer is active. Called once the substrate signals it is synchronized.
    pub fn ensure_active_layer(&mut self) -> StoreResult<Layer> {
        let layer = self.doc.ensure_default_layer(&self.local_user)?;
        if self.active_layer.is_none() {
            self.active_layer = Some(layer.id);
        }
        Ok(layer)
    }

    // --- Snapshots ---

    /// Layer snapshot in list order.
    pub fn layers(&self) -> Vec<Layer> {
        self.doc.layers()
    }

    /// Feature snapshot in list order.
    pub fn features(&self) -> Vec<Feature> {
        self.doc.features()
    }

    /// Live preview geometry of the in-progress drawing, if any.
    pub fn preview_geometry(&self) -> Option<crate::features::Geometry> {
        self.drawing.preview_geometry()
    }

    /// Current drawing interaction state.
    pub fn drawing_state(&self) -> &SessionState {
        &self.drawing.state
    }

    /// Selection engine (read access for UI).
    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    /// Subscribe to store changes; one notification per committed
    /// transaction. Call [`reconcile_selection`](Self::reconcile_selection)
    /// from the notification before re-rendering.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> loro::Subscription {
        self.doc.subscribe(callback)
    }

    // --- Tools and style ---

    /// Currently active tool.
    pub fn current_tool(&self) -> ToolKind {
        self.drawing.current_tool
    }

    /// Switch tools. Switching mid-draw cancels the session; switching to a
    /// drawing tool clears the selection.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.drawing.set_tool(tool);
        if tool.is_drawing_tool() {
            self.selection.clear();
        }
    }

    /// Merge a partial style update for newly drawn features.
    pub fn set_style(&mut self, patch: &StylePatch) {
        self.drawing.set_style(patch);
    }

    /// Whether a drawing session is in progress.
    pub fn is_drawing(&self) -> bool {
        self.drawing.is_drawing()
    }

    // --- Layers ---

    /// Active layer id, if one is set.
    pub fn active_layer(&self) -> Option<LayerId> {
        self.active_layer
    }

    /// Make a layer active. Returns false if the id is not in the store.
    pub fn set_active_layer(&mut self, id: LayerId) -> bool {
        if self.doc.layer(id).is_some() {
            self.active_layer = Some(id);
            true
        } else {
            log::warn!("set_active_layer: layer {id} is not in the store");
            false
        }
    }

    /// Create a layer; it becomes active if no layer is.
    pub fn create_layer(&mut self, name: &str) -> StoreResult<Layer> {
        let layer = self.doc.create_layer(name, None, &self.local_user)?;
        if self.active_layer.is_none() {
            self.active_layer = Some(layer.id);
        }
        Ok(layer)
    }

    /// Update a layer in place.
    pub fn update_layer(&mut self, id: LayerId, patch: &LayerPatch) -> StoreResult<()> {
        self.doc.update_layer(id, patch)
    }

    /// Delete a layer and its features. Fails on the last remaining layer.
    pub fn delete_layer(&mut self, id: LayerId) -> StoreResult<()> {
        self.doc.delete_layer(id)?;
        if self.active_layer == Some(id) {
            self.active_layer = self.doc.layers().first().map(|l| l.id);
        }
        self.reconcile_selection();
        Ok(())
    }

    /// Move a layer to a new stacking position.
    pub fn reorder_layer(&mut self, id: LayerId, new_index: usize) -> StoreResult<()> {
        self.doc.reorder_layer(id, new_index)
    }

    // --- Drawing ---

    /// Handle a pointer click in geographic coordinates.
    ///
    /// Returns the committed feature id when the click completed a geometry.
    /// Committing without an active layer is refused and any in-progress
    /// session is preserved.
    pub fn handle_click(&mut self, point: Point) -> Result<Option<FeatureId>, EditError> {
        match self.drawing.click(point) {
            Some(pending) => Ok(Some(self.commit_pending(pending)?)),
            None => Ok(None),
        }
    }

    /// Handle a double-click, committing a line/polygon session.
    pub fn handle_double_click(&mut self, point: Point) -> Result<FeatureId, EditError> {
        let pending = self.drawing.double_click(point)?;
        self.commit_pending(pending)
    }

    /// Track pointer movement for the live preview.
    pub fn handle_pointer_move(&mut self, point: Point) {
        self.drawing.pointer_move(point);
    }

    /// Cancel the in-progress drawing session (Escape) with zero persisted
    /// side effects.
    pub fn cancel_drawing(&mut self) {
        self.drawing.cancel();
    }

    fn commit_pending(&mut self, pending: PendingCommit) -> Result<FeatureId, EditError> {
        let layer_id = self.require_active_layer()?;
        let feature = Feature::from_parts(
            pending.feature_type,
            pending.geometry,
            self.drawing.current_style.clone(),
            layer_id,
            &self.local_user,
        );
        self.doc.create_feature(&feature)?;
        self.drawing.finish();
        Ok(feature.id)
    }

    fn require_active_layer(&mut self) -> Result<LayerId, DrawError> {
        match self.active_layer {
            Some(id) if self.doc.layer(id).is_some() => Ok(id),
            Some(id) => {
                log::warn!("active layer {id} is gone (concurrent delete)");
                self.active_layer = None;
                Err(DrawError::NoActiveLayer)
            }
            None => Err(DrawError::NoActiveLayer),
        }
    }

    // --- Feature edits ---

    /// Update a feature's properties or geometry.
    pub fn update_feature(&mut self, id: FeatureId, patch: &FeaturePatch) -> StoreResult<()> {
        self.doc.update_feature(id, patch)
    }

    /// Delete one feature.
    pub fn delete_feature(&mut self, id: FeatureId) -> StoreResult<()> {
        self.doc.delete_feature(id)?;
        self.reconcile_selection();
        Ok(())
    }

    /// Delete every selected feature in one transaction.
    /// Returns the number of features removed.
    pub fn delete_selection(&mut self) -> StoreResult<usize> {
        let ids = self.selection.ids().clone();
        if ids.is_empty() {
            return Ok(0);
        }
        self.doc.delete_features(&ids)?;
        self.selection.clear();
        Ok(ids.len())
    }

    /// Remove every feature from every layer.
    pub fn clear_annotations(&mut self) -> StoreResult<()> {
        self.doc.clear_features()?;
        self.selection.clear();
        Ok(())
    }

    // --- Selection ---

    /// Pick the topmost feature under the pointer and apply point-select
    /// semantics. `tolerance` is in degrees (derived from zoom by the caller).
    pub fn select_at(
        &mut self,
        point: Point,
        tolerance: f64,
        additive: bool,
    ) -> Option<FeatureId> {
        let features = self.doc.features();
        let layers = self.doc.layers();
        self.selection
            .select_at(point, tolerance, additive, &features, &layers)
    }

    /// Select a known feature id (for example from a rendered hit test).
    pub fn point_select(&mut self, id: FeatureId, additive: bool) {
        if self.doc.feature(id).is_none() {
            log::warn!("point_select: feature {id} is gone (concurrent delete)");
            return;
        }
        self.selection.point_select(id, additive);
    }

    /// Box-select. Only acts while the Select tool is active; returns the
    /// number of matched features.
    pub fn box_select(&mut self, bbox: &SelectionBox, additive: bool) -> usize {
        if self.drawing.current_tool != ToolKind::Select {
            return 0;
        }
        let features = self.doc.features();
        let layers = self.doc.layers();
        self.selection.box_select(bbox, additive, &features, &layers)
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Drop selected ids that a remote peer has deleted. Call from the store
    /// change notification.
    pub fn reconcile_selection(&mut self) {
        let features = self.doc.features();
        self.selection.reconcile(&features);
    }

    // --- Undo/redo ---

    /// Undo the most recent local feature transaction.
    pub fn undo(&mut self) -> bool {
        let undone = self.undo.undo();
        if undone {
            self.reconcile_selection();
        }
        undone
    }

    /// Re-apply the most recently undone transaction.
    pub fn redo(&mut self) -> bool {
        let redone = self.undo.redo();
        if redone {
            self.reconcile_selection();
        }
        redone
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Reset per-connection state after the substrate reconnects: both undo
    /// stacks are dropped and the selection is reconciled against the merged
    /// document.
    pub fn handle_reconnect(&mut self) {
        self.undo.clear();
        self.reconcile_selection();
        if let Some(id) = self.active_layer {
            if self.doc.layer(id).is_none() {
                self.active_layer = self.doc.layers().first().map(|l| l.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureType, Geometry};

    fn editor_with_layer() -> (MapEditor, Layer) {
        let mut editor = MapEditor::new("alice");
        let layer = editor.create_layer("L1").expect("layer");
        (editor, layer)
    }

    #[test]
    fn test_draw_point_undo_redo_end_to_end() {
        let (mut editor, layer) = editor_with_layer();
        editor.set_tool(ToolKind::Point);

        let id = editor
            .handle_click(Point::new(10.0, 20.0))
            .expect("commit")
            .expect("feature id");

        let features = editor.features();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, id);
        assert_eq!(features[0].geometry, Geometry::Point(Point::new(10.0, 20.0)));
        assert_eq!(features[0].properties.layer_id, layer.id);
        assert_eq!(features[0].properties.feature_type, FeatureType::Point);

        assert!(editor.undo());
        assert_eq!(editor.features().len(), 0);

        assert!(editor.redo());
        let restored = editor.features();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].id, id);
        assert_eq!(restored[0].geometry, Geometry::Point(Point::new(10.0, 20.0)));
    }

    #[test]
    fn test_commit_without_layer_preserves_session() {
        let mut editor = MapEditor::new("alice");
        editor.set_tool(ToolKind::Line);
        editor.handle_click(Point::new(0.0, 0.0)).expect("vertex");
        editor.handle_click(Point::new(1.0, 1.0)).expect("vertex");

        let err = editor
            .handle_double_click(Point::new(1.0, 1.0))
            .expect_err("refused without a layer");
        assert!(matches!(err, EditError::Draw(DrawError::NoActiveLayer)));
        assert!(editor.is_drawing(), "session must survive the refusal");
        assert_eq!(editor.features().len(), 0);

        // Selecting a layer lets the same session commit.
        editor.create_layer("L1").expect("layer");
        let id = editor
            .handle_double_click(Point::new(1.0, 1.0))
            .expect("commit");
        assert!(!editor.is_drawing());
        assert_eq!(editor.features()[0].id, id);
    }

    #[test]
    fn test_point_click_without_layer_is_refused() {
        let mut editor = MapEditor::new("alice");
        editor.set_tool(ToolKind::Point);
        let err = editor
            .handle_click(Point::new(0.0, 0.0))
            .expect_err("refused");
        assert!(matches!(err, EditError::Draw(DrawError::NoActiveLayer)));
        assert_eq!(editor.features().len(), 0);
    }

    #[test]
    fn test_ensure_active_layer_creates_default_once() {
        let mut editor = MapEditor::new("alice");
        let first = editor.ensure_active_layer().expect("default");
        let second = editor.ensure_active_layer().expect("reuse");
        assert_eq!(first.id, second.id);
        assert_eq!(editor.active_layer(), Some(first.id));
        assert_eq!(editor.layers().len(), 1);
    }

    #[test]
    fn test_switching_to_drawing_tool_clears_selection() {
        let (mut editor, _layer) = editor_with_layer();
        editor.set_tool(ToolKind::Point);
        let id = editor
            .handle_click(Point::new(1.0, 1.0))
            .expect("commit")
            .expect("id");

        editor.set_tool(ToolKind::Select);
        editor.point_select(id, false);
        assert!(editor.selection().is_selected(id));

        editor.set_tool(ToolKind::Polygon);
        assert!(editor.selection().is_empty());
    }

    #[test]
    fn test_box_select_requires_select_tool() {
        let (mut editor, _layer) = editor_with_layer();
        editor.set_tool(ToolKind::Point);
        editor.handle_click(Point::new(1.0, 1.0)).expect("commit");

        let bbox = SelectionBox {
            screen_start: Point::new(0.0, 0.0),
            screen_end: Point::new(100.0, 100.0),
            geo_start: Point::new(0.0, 0.0),
            geo_end: Point::new(2.0, 2.0),
        };
        assert_eq!(editor.box_select(&bbox, false), 0);

        editor.set_tool(ToolKind::Select);
        assert_eq!(editor.box_select(&bbox, false), 1);
    }

    #[test]
    fn test_delete_selection_batches() {
        let (mut editor, _layer) = editor_with_layer();
        editor.set_tool(ToolKind::Point);
        let a = editor.handle_click(Point::new(1.0, 1.0)).expect("c").expect("id");
        let b = editor.handle_click(Point::new(2.0, 2.0)).expect("c").expect("id");
        let c = editor.handle_click(Point::new(3.0, 3.0)).expect("c").expect("id");

        editor.set_tool(ToolKind::Select);
        editor.point_select(a, false);
        editor.point_select(c, true);

        let removed = editor.delete_selection().expect("delete");
        assert_eq!(removed, 2);
        let remaining: Vec<_> = editor.features().iter().map(|f| f.id).collect();
        assert_eq!(remaining, vec![b]);
        assert!(editor.selection().is_empty());
    }

    #[test]
    fn test_delete_layer_heals_active_layer() {
        let mut editor = MapEditor::new("alice");
        let first = editor.create_layer("First").expect("layer");
        let second = editor.create_layer("Second").expect("layer");
        assert_eq!(editor.active_layer(), Some(first.id));

        editor.delete_layer(first.id).expect("delete");
        assert_eq!(editor.active_layer(), Some(second.id));
    }

    #[test]
    fn test_remote_edit_not_undoable_end_to_end() {
        let (mut alice, layer) = editor_with_layer();
        alice.set_tool(ToolKind::Point);
        alice.handle_click(Point::new(1.0, 1.0)).expect("commit");

        let mut bob =
            MapEditor::from_snapshot(&alice.doc().export_snapshot(), "bob").expect("join");
        assert_eq!(bob.features().len(), 1);
        assert!(!bob.can_undo());
        assert!(!bob.undo());
        assert_eq!(bob.features().len(), 1);

        // Bob's own edit is undoable and scoped to his feature only.
        bob.set_active_layer(layer.id);
        bob.set_tool(ToolKind::Point);
        let bob_id = bob
            .handle_click(Point::new(2.0, 2.0))
            .expect("commit")
            .expect("id");
        assert!(bob.undo());
        assert_eq!(bob.features().len(), 1);
        assert!(bob.features().iter().all(|f| f.id != bob_id));
    }

    #[test]
    fn test_remote_delete_reconciles_selection() {
        let (mut alice, _layer) = editor_with_layer();
        alice.set_tool(ToolKind::Point);
        let id = alice
            .handle_click(Point::new(1.0, 1.0))
            .expect("commit")
            .expect("id");

        let mut bob =
            MapEditor::from_snapshot(&alice.doc().export_snapshot(), "bob").expect("join");
        bob.set_tool(ToolKind::Select);
        bob.point_select(id, false);
        assert!(bob.selection().is_selected(id));

        // Alice deletes the feature; Bob merges and reconciles.
        let bob_version = bob.doc().version();
        alice.delete_feature(id).expect("delete");
        bob.doc()
            .import(&alice.doc().export_updates(&bob_version))
            .expect("merge");
        bob.reconcile_selection();
        assert!(bob.selection().is_empty());
    }

    #[test]
    fn test_reconnect_clears_undo_stacks() {
        let (mut editor, _layer) = editor_with_layer();
        editor.set_tool(ToolKind::Point);
        editor.handle_click(Point::new(1.0, 1.0)).expect("commit");
        assert!(editor.can_undo());

        editor.handle_reconnect();
        assert!(!editor.can_undo());
        assert!(!editor.can_redo());
    }

    #[test]
    fn test_escape_cancels_with_no_side_effects() {
        let (mut editor, _layer) = editor_with_layer();
        editor.set_tool(ToolKind::Polygon);
        editor.handle_click(Point::new(0.0, 0.0)).expect("vertex");
        editor.handle_click(Point::new(1.0, 0.0)).expect("vertex");
        assert!(editor.preview_geometry().is_some());

        editor.cancel_drawing();
        assert!(!editor.is_drawing());
        assert!(editor.preview_geometry().is_none());
        assert_eq!(editor.features().len(), 0);
        assert!(!editor.can_undo());
    }

    #[test]
    fn test_set_style_applies_to_new_features() {
        let (mut editor, _layer) = editor_with_layer();
        editor.set_style(&StylePatch {
            stroke_color: Some("#FF0000".into()),
            ..StylePatch::default()
        });
        editor.set_tool(ToolKind::Point);
        editor.handle_click(Point::new(1.0, 1.0)).expect("commit");

        assert_eq!(editor.features()[0].properties.style.stroke_color, "#FF0000");
    }
}
