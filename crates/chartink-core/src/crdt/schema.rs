//! Replicated document schema and store operations.

use super::convert;
use crate::error::{StoreError, StoreResult};
use crate::features::{Feature, FeatureId, FeaturePatch, Layer, LayerId, LayerPatch};
use loro::{CommitOptions, ExportMode, LoroDoc, LoroList, LoroResult, ValueOrContainer};
use std::collections::HashSet;
use std::sync::Arc;

/// Key for the layers list in the document.
pub const LAYERS_KEY: &str = "layers";
/// Key for the features list in the document.
pub const FEATURES_KEY: &str = "features";

/// Origin prefix for layer transactions; excluded from the local undo scope.
pub const ORIGIN_LAYERS_PREFIX: &str = "layers:";
/// Origin prefix for feature transactions.
pub const ORIGIN_FEATURES_PREFIX: &str = "features:";

/// Name of the layer created on first connection.
pub const DEFAULT_LAYER_NAME: &str = "Default Layer";

/// A CRDT-backed store for layers and features.
///
/// Wraps a `LoroDoc` with two root lists holding one plain value per layer or
/// feature. Every exposed mutation batches its container edits and commits
/// once, so neither local nor remote observers ever see a partially applied
/// multi-step edit. Conflict resolution itself is the substrate's job: list
/// insertion order is preserved and concurrently replaced values converge by
/// the document's merge policy.
pub struct MapDocument {
    doc: LoroDoc,
}

impl MapDocument {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self { doc: LoroDoc::new() }
    }

    /// Create a document from a snapshot.
    pub fn from_snapshot(bytes: &[u8]) -> LoroResult<Self> {
        let doc = LoroDoc::new();
        doc.import(bytes)?;
        Ok(Self { doc })
    }

    /// Get the underlying Loro document.
    pub fn loro_doc(&self) -> &LoroDoc {
        &self.doc
    }

    fn layers_list(&self) -> LoroList {
        self.doc.get_list(LAYERS_KEY)
    }

    fn features_list(&self) -> LoroList {
        self.doc.get_list(FEATURES_KEY)
    }

    /// End the current transaction under the given origin.
    fn commit(&self, origin: &str) {
        self.doc.commit_with(CommitOptions::new().origin(origin));
    }

    /// Plain values of a list, in order.
    fn list_values(list: &LoroList) -> Vec<loro::LoroValue> {
        let mut out = Vec::with_capacity(list.len());
        for i in 0..list.len() {
            if let Some(ValueOrContainer::Value(v)) = list.get(i) {
                out.push(v);
            }
        }
        out
    }

    /// Index of the entry whose `id` field equals `id`.
    fn index_of(list: &LoroList, id: &str) -> Option<usize> {
        for i in 0..list.len() {
            if let Some(ValueOrContainer::Value(v)) = list.get(i) {
                if convert::value_id(&v) == Some(id) {
                    return Some(i);
                }
            }
        }
        None
    }

    /// Delete the given list indices highest-first.
    ///
    /// Computing every target index up front and deleting in descending order
    /// keeps earlier deletions from shifting later targets within the same
    /// transaction.
    fn delete_indices_desc(list: &LoroList, mut indices: Vec<usize>) -> LoroResult<()> {
        indices.sort_unstable_by(|a, b| b.cmp(a));
        for i in indices {
            list.delete(i, 1)?;
        }
        Ok(())
    }

    // --- Layer operations ---

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers_list().len()
    }

    /// Snapshot of all layers in list order. Malformed entries are skipped.
    pub fn layers(&self) -> Vec<Layer> {
        let list = self.layers_list();
        Self::list_values(&list)
            .iter()
            .filter_map(|v| match convert::from_loro_value::<Layer>(v) {
                Ok(layer) => Some(layer),
                Err(err) => {
                    log::warn!("skipping malformed layer entry: {err}");
                    None
                }
            })
            .collect()
    }

    /// Get a layer by id.
    pub fn layer(&self, id: LayerId) -> Option<Layer> {
        self.layers().into_iter().find(|l| l.id == id)
    }

    /// Create a layer with zIndex = current max + 1.
    ///
    /// `color` overrides the default stroke/fill color of the layer style.
    pub fn create_layer(&self, name: &str, color: Option<&str>, author: &str) -> StoreResult<Layer> {
        let mut layer = Layer::new(name, author);
        if let Some(color) = color {
            layer.style.stroke_color = color.to_string();
            layer.style.fill_color = Some(color.to_string());
        }
        layer.z_index = self
            .layers()
            .iter()
            .map(|l| l.z_index + 1)
            .max()
            .unwrap_or(0);
        self.layers_list().push(convert::to_loro_value(&layer)?)?;
        self.commit("layers:create");
        Ok(layer)
    }

    /// Create the default layer if the document has none, and return the
    /// layer that should become active.
    pub fn ensure_default_layer(&self, author: &str) -> StoreResult<Layer> {
        match self.layers().into_iter().next() {
            Some(layer) => Ok(layer),
            None => self.create_layer(DEFAULT_LAYER_NAME, None, author),
        }
    }

    /// Merge a patch into a layer, reinserting the merged value at the same
    /// position. A vanished id is a logged no-op.
    pub fn update_layer(&self, id: LayerId, patch: &LayerPatch) -> StoreResult<()> {
        let list = self.layers_list();
        let target = id.to_string();
        let Some(index) = Self::index_of(&list, &target) else {
            log::warn!("update_layer: layer {id} is gone (concurrent delete)");
            return Ok(());
        };
        let Some(ValueOrContainer::Value(value)) = list.get(index) else {
            return Ok(());
        };
        let mut layer: Layer = convert::from_loro_value(&value)?;
        layer.apply_patch(patch);
        list.delete(index, 1)?;
        list.insert(index, convert::to_loro_value(&layer)?)?;
        self.commit("layers:update");
        Ok(())
    }

    /// Delete a layer and every feature it owns, in one transaction.
    ///
    /// Rejected with [`StoreError::LastLayer`] if it is the only remaining
    /// layer. Feature entries are removed in strictly descending index order
    /// before the layer entry itself.
    pub fn delete_layer(&self, id: LayerId) -> StoreResult<()> {
        let layers = self.layers_list();
        let target = id.to_string();
        let Some(layer_index) = Self::index_of(&layers, &target) else {
            log::warn!("delete_layer: layer {id} is gone (concurrent delete)");
            return Ok(());
        };
        if layers.len() <= 1 {
            return Err(StoreError::LastLayer);
        }

        let features = self.features_list();
        let mut owned = Vec::new();
        for i in 0..features.len() {
            if let Some(ValueOrContainer::Value(v)) = features.get(i) {
                if convert::value_layer_id(&v) == Some(target.as_str()) {
                    owned.push(i);
                }
            }
        }
        Self::delete_indices_desc(&features, owned)?;
        layers.delete(layer_index, 1)?;
        self.commit("layers:delete");
        Ok(())
    }

    /// Move a layer to `new_index` and renumber zIndex densely `0..N-1`.
    ///
    /// The whole layer list is replaced in one transaction so observers only
    /// ever see a fully renumbered ordering.
    pub fn reorder_layer(&self, id: LayerId, new_index: usize) -> StoreResult<()> {
        let mut layers = self.layers();
        let Some(position) = layers.iter().position(|l| l.id == id) else {
            log::warn!("reorder_layer: layer {id} is gone (concurrent delete)");
            return Ok(());
        };
        let layer = layers.remove(position);
        let new_index = new_index.min(layers.len());
        layers.insert(new_index, layer);
        for (i, layer) in layers.iter_mut().enumerate() {
            layer.z_index = i as u32;
        }

        let list = self.layers_list();
        let len = list.len();
        if len > 0 {
            list.delete(0, len)?;
        }
        for layer in &layers {
            list.push(convert::to_loro_value(layer)?)?;
        }
        self.commit("layers:reorder");
        Ok(())
    }

    // --- Feature operations ---

    /// Number of features.
    pub fn feature_count(&self) -> usize {
        self.features_list().len()
    }

    /// Snapshot of all features in list order. Malformed entries are skipped.
    pub fn features(&self) -> Vec<Feature> {
        let list = self.features_list();
        Self::list_values(&list)
            .iter()
            .filter_map(|v| match convert::from_loro_value::<Feature>(v) {
                Ok(feature) => Some(feature),
                Err(err) => {
                    log::warn!("skipping malformed feature entry: {err}");
                    None
                }
            })
            .collect()
    }

    /// Get a feature by id.
    pub fn feature(&self, id: FeatureId) -> Option<Feature> {
        self.features().into_iter().find(|f| f.id == id)
    }

    /// Append a feature.
    pub fn create_feature(&self, feature: &Feature) -> StoreResult<()> {
        self.features_list().push(convert::to_loro_value(feature)?)?;
        self.commit("features:create");
        Ok(())
    }

    /// Merge a patch into a feature, reinserting the merged value at the same
    /// position. A vanished id is a logged no-op.
    pub fn update_feature(&self, id: FeatureId, patch: &FeaturePatch) -> StoreResult<()> {
        let list = self.features_list();
        let target = id.to_string();
        let Some(index) = Self::index_of(&list, &target) else {
            log::warn!("update_feature: feature {id} is gone (concurrent delete)");
            return Ok(());
        };
        let Some(ValueOrContainer::Value(value)) = list.get(index) else {
            return Ok(());
        };
        let mut feature: Feature = convert::from_loro_value(&value)?;
        feature.apply_patch(patch);
        list.delete(index, 1)?;
        list.insert(index, convert::to_loro_value(&feature)?)?;
        self.commit("features:update");
        Ok(())
    }

    /// Delete a feature. A vanished id is a logged no-op.
    pub fn delete_feature(&self, id: FeatureId) -> StoreResult<()> {
        let list = self.features_list();
        let target = id.to_string();
        let Some(index) = Self::index_of(&list, &target) else {
            log::warn!("delete_feature: feature {id} is gone (concurrent delete)");
            return Ok(());
        };
        list.delete(index, 1)?;
        self.commit("features:delete");
        Ok(())
    }

    /// Delete a set of features in one transaction.
    pub fn delete_features(&self, ids: &HashSet<FeatureId>) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let targets: HashSet<String> = ids.iter().map(|id| id.to_string()).collect();
        let list = self.features_list();
        let mut indices = Vec::new();
        for i in 0..list.len() {
            if let Some(ValueOrContainer::Value(v)) = list.get(i) {
                if convert::value_id(&v).is_some_and(|id| targets.contains(id)) {
                    indices.push(i);
                }
            }
        }
        if indices.is_empty() {
            return Ok(());
        }
        Self::delete_indices_desc(&list, indices)?;
        self.commit("features:delete");
        Ok(())
    }

    /// Remove every feature.
    pub fn clear_features(&self) -> StoreResult<()> {
        let list = self.features_list();
        let len = list.len();
        if len > 0 {
            list.delete(0, len)?;
            self.commit("features:clear");
        }
        Ok(())
    }

    // --- Observation and sync ---

    /// Subscribe to document changes. One notification fires per committed
    /// transaction; readers refresh snapshots via [`layers`](Self::layers) /
    /// [`features`](Self::features). Dropping the returned subscription
    /// unsubscribes.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> loro::Subscription {
        self.doc
            .subscribe_root(Arc::new(move |_diff: loro::event::DiffEvent| callback()))
    }

    /// Export the document as a full snapshot.
    pub fn export_snapshot(&self) -> Vec<u8> {
        self.doc.export(ExportMode::Snapshot).unwrap_or_default()
    }

    /// Export incremental updates since a version.
    pub fn export_updates(&self, since: &loro::VersionVector) -> Vec<u8> {
        self.doc.export(ExportMode::updates(since)).unwrap_or_default()
    }

    /// Import remote updates.
    pub fn import(&self, bytes: &[u8]) -> LoroResult<()> {
        self.doc.import(bytes)?;
        Ok(())
    }

    /// Current version vector.
    pub fn version(&self) -> loro::VersionVector {
        self.doc.oplog_vv()
    }
}

impl Default for MapDocument {
    fn default() -> Self {
        Self::new()
    }
}
