//! Layer model and partial-update carriers.

use super::{now_ms, AnnotationStyle, Geometry, LayerId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named, ordered, toggleable grouping of features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    /// Default style for features drawn into this layer.
    pub style: AnnotationStyle,
    /// Stacking position; dense `0..N-1` after any reorder.
    pub z_index: u32,
    pub visible: bool,
    pub locked: bool,
    pub created_by: String,
    /// Creation time, ms since epoch.
    pub created_at: i64,
    /// Last update time, ms since epoch.
    pub updated_at: i64,
}

impl Layer {
    /// Create a layer. The store assigns the final `z_index`.
    pub fn new(name: &str, created_by: &str) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            style: AnnotationStyle::default(),
            z_index: 0,
            visible: true,
            locked: false,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update, bumping `updated_at`.
    pub fn apply_patch(&mut self, patch: &LayerPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(locked) = patch.locked {
            self.locked = locked;
        }
        if let Some(style) = &patch.style {
            self.style = style.clone();
        }
        self.updated_at = now_ms();
    }
}

/// Partial update for a layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerPatch {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub style: Option<AnnotationStyle>,
}

/// Partial update for a feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturePatch {
    pub name: Option<String>,
    pub geometry: Option<Geometry>,
    pub style: Option<AnnotationStyle>,
}
