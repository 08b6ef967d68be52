use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use geomap_convert::ResourceTable;
use geomap_core::PatchEmitter;
use geomap_renderer::{Decoration, PickInfo, PointerEvent};

/// Caller hover callback; receives the pick and the pointer event unchanged.
pub type HoverCallback = Arc<dyn Fn(&PickInfo, &PointerEvent) + Send + Sync>;

/// Everything the host hands the map on each update.
///
/// `spec` and `resources` are compared by identity: a new `Arc` means new
/// content.
#[derive(Clone)]
pub struct MapProps {
    pub id: String,
    pub spec: Option<Arc<Value>>,
    pub resources: Arc<ResourceTable>,
    pub on_hover: Option<HoverCallback>,
    pub patch_spec: PatchEmitter,
    pub children: Vec<Decoration>,
}

impl MapProps {
    pub fn new(id: &str, patch_spec: PatchEmitter) -> Self {
        Self {
            id: id.to_string(),
            spec: None,
            resources: Arc::new(ResourceTable::new()),
            on_hover: None,
            patch_spec,
            children: Vec::new(),
        }
    }

    pub fn with_spec(mut self, spec: Value) -> Self {
        self.spec = Some(Arc::new(spec));
        self
    }

    pub fn with_resources(mut self, resources: ResourceTable) -> Self {
        self.resources = Arc::new(resources);
        self
    }

    pub fn with_on_hover<F>(mut self, on_hover: F) -> Self
    where
        F: Fn(&PickInfo, &PointerEvent) + Send + Sync + 'static,
    {
        self.on_hover = Some(Arc::new(on_hover));
        self
    }

    pub fn with_children(mut self, children: Vec<Decoration>) -> Self {
        self.children = children;
        self
    }

    /// The specification, unless it is absent, null or `{}`.
    pub fn non_empty_spec(&self) -> Option<&Value> {
        let spec = self.spec.as_deref()?;
        match spec {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            _ => Some(spec),
        }
    }
}

impl fmt::Debug for MapProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapProps")
            .field("id", &self.id)
            .field("spec", &self.spec)
            .field("resources", &self.resources.len())
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}
