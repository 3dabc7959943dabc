//! Spatial selection engine.
//!
//! Both input modes are read-only against the store: callers pass the current
//! layer/feature snapshots, and the engine only mutates its local
//! [`SelectionState`]. Selection is never replicated.

use crate::features::{Feature, FeatureId, Geometry, Layer, LayerId};
use crate::geo;
use kurbo::{Point, Rect};
use std::collections::{HashMap, HashSet};

/// Minimum drag extent in screen pixels for a box-select to count.
///
/// Anything smaller is jitter from a sloppy click and is treated as a
/// non-event rather than a selection clear.
pub const MIN_BOX_SELECT_PX: f64 = 5.0;

/// A drag rectangle in both screen and geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionBox {
    /// Drag start in screen pixels.
    pub screen_start: Point,
    /// Drag end in screen pixels.
    pub screen_end: Point,
    /// Drag start as lng/lat.
    pub geo_start: Point,
    /// Drag end as lng/lat.
    pub geo_end: Point,
}

impl SelectionBox {
    /// Screen-space width of the drag.
    pub fn screen_width(&self) -> f64 {
        (self.screen_end.x - self.screen_start.x).abs()
    }

    /// Screen-space height of the drag.
    pub fn screen_height(&self) -> f64 {
        (self.screen_end.y - self.screen_start.y).abs()
    }

    /// Whether the drag is too small to act on.
    pub fn below_threshold(&self) -> bool {
        self.screen_width() <= MIN_BOX_SELECT_PX || self.screen_height() <= MIN_BOX_SELECT_PX
    }

    /// Normalized geographic extent of the box.
    pub fn geo_bounds(&self) -> Rect {
        Rect::new(
            self.geo_start.x.min(self.geo_end.x),
            self.geo_start.y.min(self.geo_end.y),
            self.geo_start.x.max(self.geo_end.x),
            self.geo_start.y.max(self.geo_end.y),
        )
    }
}

/// Locally-owned selection state.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    /// Selected feature ids.
    pub ids: HashSet<FeatureId>,
    /// Whether the selection is being property-edited.
    pub editing: bool,
}

/// Converts pointer and box events into selected-id sets.
#[derive(Debug, Clone, Default)]
pub struct SelectionEngine {
    state: SelectionState,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected ids.
    pub fn ids(&self) -> &HashSet<FeatureId> {
        &self.state.ids
    }

    pub fn is_selected(&self, id: FeatureId) -> bool {
        self.state.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.state.ids.is_empty()
    }

    pub fn is_editing(&self) -> bool {
        self.state.editing
    }

    pub fn set_editing(&mut self, editing: bool) {
        self.state.editing = editing;
    }

    /// Clear the selection.
    pub fn clear(&mut self) {
        self.state.ids.clear();
        self.state.editing = false;
    }

    /// Select a single feature id.
    ///
    /// With the multi-select modifier (`additive`) the id is toggled in the
    /// existing set. Without it the selection is replaced by the singleton —
    /// re-clicking an already-selected feature replaces it with itself rather
    /// than clearing.
    pub fn point_select(&mut self, id: FeatureId, additive: bool) {
        if additive {
            if !self.state.ids.remove(&id) {
                self.state.ids.insert(id);
            }
        } else {
            self.state.ids.clear();
            self.state.ids.insert(id);
        }
    }

    /// Resolve the topmost feature under the pointer.
    ///
    /// Features on invisible or locked layers are skipped. Priority follows
    /// draw order: highest layer zIndex first, later-drawn features first
    /// within a layer. `tolerance` is in degrees.
    pub fn pick(
        &self,
        point: Point,
        tolerance: f64,
        features: &[Feature],
        layers: &[Layer],
    ) -> Option<FeatureId> {
        let layer_map = layer_index(layers);
        let mut best: Option<(u32, usize, FeatureId)> = None;
        for (index, feature) in features.iter().enumerate() {
            let Some(layer) = layer_map.get(&feature.properties.layer_id) else {
                continue;
            };
            if !layer.visible || layer.locked {
                continue;
            }
            if !hit_test(&feature.geometry, point, tolerance) {
                continue;
            }
            let key = (layer.z_index, index);
            if best.is_none_or(|(z, i, _)| key > (z, i)) {
                best = Some((layer.z_index, index, feature.id));
            }
        }
        best.map(|(_, _, id)| id)
    }

    /// Pick under the pointer and apply point-select semantics.
    ///
    /// A miss on empty space clears the selection unless the modifier is
    /// held. Returns the picked id, if any.
    pub fn select_at(
        &mut self,
        point: Point,
        tolerance: f64,
        additive: bool,
        features: &[Feature],
        layers: &[Layer],
    ) -> Option<FeatureId> {
        match self.pick(point, tolerance, features, layers) {
            Some(id) => {
                self.point_select(id, additive);
                Some(id)
            }
            None => {
                if !additive {
                    self.clear();
                }
                None
            }
        }
    }

    /// Select every visible, unlocked feature intersecting the box.
    ///
    /// A drag below the pixel threshold is a non-event. With the modifier the
    /// matches are unioned into the existing selection; without it they
    /// replace it. Returns the number of matched features.
    pub fn box_select(
        &mut self,
        bbox: &SelectionBox,
        additive: bool,
        features: &[Feature],
        layers: &[Layer],
    ) -> usize {
        if bbox.below_threshold() {
            return 0;
        }
        let bounds = bbox.geo_bounds();
        let layer_map = layer_index(layers);
        let matched: HashSet<FeatureId> = features
            .iter()
            .filter(|f| {
                layer_map
                    .get(&f.properties.layer_id)
                    .is_some_and(|layer| layer.visible && !layer.locked)
            })
            .filter(|f| geo::feature_intersects_bounds(&f.geometry, bounds))
            .map(|f| f.id)
            .collect();

        let count = matched.len();
        if additive {
            self.state.ids.extend(matched);
        } else {
            self.state.ids = matched;
        }
        count
    }

    /// Drop selected ids that no longer exist in the store snapshot.
    ///
    /// Run after remote changes so the selection never references a feature a
    /// peer has deleted.
    pub fn reconcile(&mut self, features: &[Feature]) {
        if self.state.ids.is_empty() {
            return;
        }
        let live: HashSet<FeatureId> = features.iter().map(|f| f.id).collect();
        self.state.ids.retain(|id| live.contains(id));
        if self.state.ids.is_empty() {
            self.state.editing = false;
        }
    }
}

fn layer_index(layers: &[Layer]) -> HashMap<LayerId, &Layer> {
    layers.iter().map(|l| (l.id, l)).collect()
}

/// Kernel hit test for point-pick. `tolerance` is in degrees.
fn hit_test(geometry: &Geometry, point: Point, tolerance: f64) -> bool {
    match geometry {
        Geometry::Point(p) => {
            ((p.x - point.x).powi(2) + (p.y - point.y).powi(2)).sqrt() <= tolerance
        }
        Geometry::LineString(pts) => geo::point_to_polyline_dist(point, pts) <= tolerance,
        Geometry::Polygon(ring) => {
            geo::point_in_polygon(point, ring) || geo::point_to_polyline_dist(point, ring) <= tolerance
        }
    }
}
