//! Conversion between model types and Loro values.
//!
//! Layers and features are stored as plain value maps inside the replicated
//! lists. The model types already carry faithful GeoJSON serde, so the bridge
//! goes through their serde representation instead of hand-mapped fields.

use crate::error::StoreResult;
use loro::LoroValue;
use serde::{de::DeserializeOwned, Serialize};

/// Encode a model value into a plain Loro value.
pub fn to_loro_value<T: Serialize>(value: &T) -> StoreResult<LoroValue> {
    let json = serde_json::to_value(value)?;
    Ok(serde_json::from_value(json)?)
}

/// Decode a plain Loro value back into a model value.
pub fn from_loro_value<T: DeserializeOwned>(value: &LoroValue) -> StoreResult<T> {
    let json = serde_json::to_value(value)?;
    Ok(serde_json::from_value(json)?)
}

/// Read the `id` field of a stored layer/feature value.
pub fn value_id(value: &LoroValue) -> Option<&str> {
    match value {
        LoroValue::Map(map) => match map.get("id") {
            Some(LoroValue::String(s)) => Some(s.as_ref()),
            _ => None,
        },
        _ => None,
    }
}

/// Read the `properties.layer_id` field of a stored feature value.
pub fn value_layer_id(value: &LoroValue) -> Option<&str> {
    match value {
        LoroValue::Map(map) => match map.get("properties") {
            Some(LoroValue::Map(props)) => match props.get("layer_id") {
                Some(LoroValue::String(s)) => Some(s.as_ref()),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}
