use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::patch::{apply_patch, InvalidPatchError, PatchOperation};

/// The declarative map specification: layers, views, view state and
/// controls as plain ordered JSON data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Specification(Value);

impl Specification {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// An empty specification is `null` or `{}`; nothing to render yet.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Look up a value by JSON pointer.
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.0.pointer(pointer)
    }

    pub fn layers(&self) -> &[Value] {
        self.0
            .get("layers")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Position and body of the layer whose `id` equals `layer_id`.
    pub fn find_layer(&self, layer_id: &str) -> Option<(usize, &Map<String, Value>)> {
        self.layers().iter().enumerate().find_map(|(index, layer)| {
            let body = layer.as_object()?;
            (body.get("id").and_then(Value::as_str) == Some(layer_id)).then_some((index, body))
        })
    }

    /// Apply a batch, returning the new specification and the inverse batch.
    pub fn patched(
        &self,
        ops: &[PatchOperation],
    ) -> Result<(Specification, Vec<PatchOperation>), InvalidPatchError> {
        let (value, inverse) = apply_patch(&self.0, ops)?;
        Ok((Specification(value), inverse))
    }

    // ── Serialization ────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.0)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json).map(Self)
    }
}

impl Default for Specification {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl From<Value> for Specification {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
