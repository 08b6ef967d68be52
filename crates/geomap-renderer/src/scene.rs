use serde::{Deserialize, Serialize};
use serde_json::Value;

use geomap_core::value::{Instance, Resolved, ResolvedMap};

use crate::viewport::ViewState;

/// A resolved layer, ready to be consumed by the rendering engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInstance {
    pub id: String,
    /// Layer class name, e.g. "ScatterplotLayer".
    pub class: String,
    pub props: ResolvedMap,
}

impl LayerInstance {
    pub fn prop(&self, name: &str) -> Option<&Resolved> {
        self.props.get(name)
    }

    /// Layers are visible unless `visible` is explicitly false.
    pub fn visible(&self) -> bool {
        self.prop("visible").and_then(Resolved::as_bool).unwrap_or(true)
    }

    /// The layer's `data` as plain JSON, when it is data.
    pub fn data(&self) -> Option<Value> {
        self.prop("data").and_then(Resolved::to_json)
    }
}

/// The converted scene description: everything a render session needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub layers: Vec<LayerInstance>,
    pub views: Vec<Instance>,
    /// Remaining top-level props (view state, controller flags, ...).
    pub props: ResolvedMap,
}

impl Scene {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn layer(&self, id: &str) -> Option<&LayerInstance> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn visible_layers(&self) -> impl Iterator<Item = &LayerInstance> {
        self.layers.iter().filter(|l| l.visible())
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The `initialViewState` prop, when it is present and well-formed.
    pub fn view_state(&self) -> Option<ViewState> {
        let json = self.props.get("initialViewState")?.to_json()?;
        serde_json::from_value(json).ok()
    }
}

/// Decorative content rendered alongside the map, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decoration {
    pub id: String,
    #[serde(default)]
    pub props: Value,
}

impl Decoration {
    pub fn new(id: &str, props: Value) -> Self {
        Self {
            id: id.to_string(),
            props,
        }
    }
}
