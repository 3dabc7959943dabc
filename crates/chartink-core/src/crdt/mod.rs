//! CRDT-backed feature/layer store built on Loro.
//!
//! # Schema
//!
//! ```text
//! LoroDoc
//! ├── "layers":   LoroList<value map> (one entry per Layer)
//! └── "features": LoroList<value map> (one entry per Feature)
//! ```
//!
//! Entries are plain value maps; an update locates the entry by id, deletes
//! it, and reinserts the merged value at the same position inside one
//! transaction. Transactions commit under an origin (`layers:*` or
//! `features:*`); the undo coordinator uses the prefix to keep layer
//! mutations out of the local undo scope.

mod convert;
mod schema;

pub use convert::{from_loro_value, to_loro_value};
pub use schema::{
    MapDocument, DEFAULT_LAYER_NAME, FEATURES_KEY, LAYERS_KEY, ORIGIN_FEATURES_PREFIX,
    ORIGIN_LAYERS_PREFIX,
};

// Re-export Loro types that may be useful for sync collaborators
pub use loro::{ExportMode, VersionVector};
