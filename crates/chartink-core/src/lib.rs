//! ChartInk Core Library
//!
//! Platform-agnostic editing engine for the ChartInk shared map canvas:
//! geometry kernel, CRDT-backed feature/layer store, drawing state machine,
//! spatial selection, and locally-scoped undo/redo.

pub mod crdt;
pub mod editor;
pub mod error;
pub mod features;
pub mod geo;
pub mod selection;
pub mod tools;
pub mod undo;

pub use crdt::MapDocument;
pub use editor::MapEditor;
pub use error::{DrawError, EditError, StoreError};
pub use features::{
    AnnotationStyle, Feature, FeatureId, FeaturePatch, FeatureType, Geometry, Layer, LayerId,
    LayerPatch, StylePatch,
};
pub use selection::{SelectionBox, SelectionEngine, SelectionState};
pub use tools::{DrawingController, DrawingSession, PendingCommit, SessionState, ToolKind};
pub use undo::UndoCoordinator;
