//! Local edits to the specification, expressed as actions and compiled to
//! patch batches against the current document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::patch::PatchOperation;
use crate::pointer::JsonPointer;
use crate::spec::Specification;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SpecAction {
    /// Set one prop on the layer with the given id.
    UpdateLayerProp {
        layer_id: String,
        prop: String,
        value: Value,
    },
    /// Toggle the `visible` flag of several layers at once.
    UpdateVisibleLayers { layers: Vec<(String, bool)> },
    /// Switch the editing mode of a drawing layer.
    UpdateDrawingMode { layer_id: String, mode: String },
    SetViewState { view_state: Value },
}

impl SpecAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateLayerProp { .. } => "updateLayerProp",
            Self::UpdateVisibleLayers { .. } => "updateVisibleLayers",
            Self::UpdateDrawingMode { .. } => "updateDrawingMode",
            Self::SetViewState { .. } => "setViewState",
        }
    }

    /// Compile the action into a patch batch for `spec`.
    pub fn to_patch(&self, spec: &Specification) -> Result<Vec<PatchOperation>, StoreError> {
        match self {
            Self::UpdateLayerProp {
                layer_id,
                prop,
                value,
            } => Ok(vec![layer_prop_op(spec, layer_id, prop, value.clone())?]),
            Self::UpdateVisibleLayers { layers } => layers
                .iter()
                .map(|(layer_id, visible)| {
                    layer_prop_op(spec, layer_id, "visible", Value::Bool(*visible))
                })
                .collect(),
            Self::UpdateDrawingMode { layer_id, mode } => Ok(vec![layer_prop_op(
                spec,
                layer_id,
                "mode",
                Value::String(mode.clone()),
            )?]),
            Self::SetViewState { view_state } => {
                if !spec.as_value().is_object() {
                    return Err(StoreError::NotAnObject);
                }
                let path = JsonPointer::root().child("initialViewState").to_string();
                Ok(vec![PatchOperation::add(path, view_state.clone())])
            }
        }
    }
}

fn layer_prop_op(
    spec: &Specification,
    layer_id: &str,
    prop: &str,
    value: Value,
) -> Result<PatchOperation, StoreError> {
    if spec.get("/layers").and_then(Value::as_array).is_none() {
        return Err(StoreError::MissingLayers);
    }
    let (index, body) = spec
        .find_layer(layer_id)
        .ok_or_else(|| StoreError::UnknownLayer(layer_id.to_string()))?;
    let path = JsonPointer::root()
        .child("layers")
        .child(index.to_string())
        .child(prop)
        .to_string();
    Ok(if body.contains_key(prop) {
        PatchOperation::replace(path, value)
    } else {
        PatchOperation::add(path, value)
    })
}
