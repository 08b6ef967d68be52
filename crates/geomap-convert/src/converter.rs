use std::sync::Arc;

use serde_json::Value;

use geomap_core::pointer::JsonPointer;
use geomap_core::value::{ClassKind, Instance, Resolved};
use geomap_renderer::scene::{LayerInstance, Scene};

use crate::reference::SpecNode;
use crate::resolve::{ConvertError, SymbolTable};
use crate::resources::ResourceTable;
use crate::schema::ConfigurationSchema;

const LAYERS_KEY: &str = "layers";
const VIEWS_KEY: &str = "views";

/// Converts specifications into scenes against a fixed base schema.
#[derive(Debug, Clone)]
pub struct Converter {
    schema: Arc<ConfigurationSchema>,
}

impl Converter {
    pub fn new(schema: Arc<ConfigurationSchema>) -> Self {
        Self { schema }
    }

    pub fn with_map_defaults() -> Self {
        Self::new(ConfigurationSchema::map_defaults())
    }

    pub fn schema(&self) -> &Arc<ConfigurationSchema> {
        &self.schema
    }

    /// Resolve `spec` against the schema merged with `resources`.
    ///
    /// Either the whole scene is produced or nothing is; the schema is only
    /// read.
    pub fn convert(&self, spec: &Value, resources: &ResourceTable) -> Result<Scene, ConvertError> {
        let Value::Object(root) = spec else {
            return Err(ConvertError::InvalidRoot);
        };
        let table = SymbolTable::new(&self.schema, resources);
        let mut scene = Scene::empty();

        for (key, value) in root {
            let path = JsonPointer::root().child(key.clone());
            match key.as_str() {
                LAYERS_KEY => scene.layers = convert_layers(&table, value, &path)?,
                VIEWS_KEY => scene.views = convert_views(&table, value, &path)?,
                _ => {
                    let resolved = table.resolve_at(&SpecNode::parse(value), &path)?;
                    scene.props.insert(key.clone(), resolved);
                }
            }
        }

        log::debug!(
            "Converted specification: {} layers, {} views, {} props",
            scene.layers.len(),
            scene.views.len(),
            scene.props.len()
        );
        Ok(scene)
    }
}

fn instance_of(
    table: &SymbolTable<'_>,
    value: &Value,
    path: &JsonPointer,
    kind: ClassKind,
) -> Result<Result<Instance, String>, ConvertError> {
    let resolved = table.resolve_at(&SpecNode::parse(value), path)?;
    Ok(match resolved {
        Resolved::Instance(instance) if instance.kind == kind => Ok(instance),
        Resolved::Instance(instance) => Err(format!("'{}' is a {:?} class", instance.class, instance.kind)),
        _ => Err("expected an object naming a class with 'type' or '@@type'".to_string()),
    })
}

fn convert_layers(
    table: &SymbolTable<'_>,
    value: &Value,
    path: &JsonPointer,
) -> Result<Vec<LayerInstance>, ConvertError> {
    let Value::Array(items) = value else {
        return Err(ConvertError::InvalidLayer {
            path: path.to_string(),
            reason: "'layers' must be an array".to_string(),
        });
    };
    let mut layers = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        // Holes left by conditional layer lists.
        if item.is_null() {
            continue;
        }
        let item_path = path.child(index.to_string());
        let instance = instance_of(table, item, &item_path, ClassKind::Layer)?.map_err(|reason| {
            ConvertError::InvalidLayer {
                path: item_path.to_string(),
                reason,
            }
        })?;
        let id = instance
            .props
            .get("id")
            .and_then(Resolved::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{}", instance.class, index));
        if layers.iter().any(|l: &LayerInstance| l.id == id) {
            log::warn!("Duplicate layer id '{}' at {}", id, item_path);
        }
        layers.push(LayerInstance {
            id,
            class: instance.class,
            props: instance.props,
        });
    }
    Ok(layers)
}

fn convert_views(table: &SymbolTable<'_>, value: &Value, path: &JsonPointer) -> Result<Vec<Instance>, ConvertError> {
    let items: Vec<(JsonPointer, &Value)> = match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| (path.child(i.to_string()), item))
            .collect(),
        other => vec![(path.clone(), other)],
    };
    items
        .into_iter()
        .map(|(item_path, item)| {
            instance_of(table, item, &item_path, ClassKind::View)?.map_err(|reason| ConvertError::InvalidView {
                path: item_path.to_string(),
                reason,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::schema::Symbol;

    fn converter() -> Converter {
        Converter::with_map_defaults()
    }

    #[test]
    fn test_scatterplot_with_resource_data() {
        let resources = ResourceTable::new().with_value("myData", json!([{"position": [-81.2, 42.2]}]));
        let spec = json!({"layers": [{"type": "@@#ScatterplotLayer", "data": "@@#myData"}]});
        let scene = converter().convert(&spec, &resources).unwrap();

        assert_eq!(scene.layer_count(), 1);
        let layer = &scene.layers[0];
        assert_eq!(layer.class, "ScatterplotLayer");
        assert_eq!(layer.id, "ScatterplotLayer-0");
        assert_eq!(layer.data(), Some(json!([{"position": [-81.2, 42.2]}])));
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let resources = ResourceTable::new().with_value("lakes", json!({"type": "FeatureCollection", "features": []}));
        let spec = json!({
            "initialViewState": {"longitude": -81.0, "latitude": 42.5, "zoom": 6},
            "views": {"@@type": "MapView", "repeat": true},
            "layers": [
                {"@@type": "GeoJsonLayer", "id": "lakes", "data": "@@#resources.lakes", "getFillColor": "@@#WHITE"},
                null,
                {"@@type": "PathLayer", "getPath": "@@=geometry.coordinates"}
            ]
        });
        let a = converter().convert(&spec, &resources).unwrap();
        let b = converter().convert(&spec, &resources).unwrap();
        assert_eq!(a, b);

        assert_eq!(a.views.len(), 1);
        assert_eq!(a.views[0].class, "MapView");
        let ids: Vec<_> = a.layers.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["lakes", "PathLayer-2"]);
        assert_eq!(a.view_state().unwrap().zoom, 6.0);
    }

    #[test]
    fn test_unresolved_symbol_yields_no_scene() {
        let spec = json!({"layers": [{"type": "@@#ScatterplotLayer", "data": "@@#nowhere"}]});
        let err = converter().convert(&spec, &ResourceTable::new()).unwrap_err();
        assert_eq!(
            err,
            ConvertError::UnresolvedSymbol {
                symbol: "nowhere".into(),
                path: "/layers/0/data".into()
            }
        );
        assert_eq!(err.to_string(), "Unresolved symbol 'nowhere' at '/layers/0/data'");
    }

    #[test]
    fn test_ambiguous_resource_name() {
        let resources = ResourceTable::new().with_value("BLACK", json!([1, 1, 1]));
        let spec = json!({"layers": [{"@@type": "LineLayer", "getColor": "@@#BLACK"}]});
        let err = converter().convert(&spec, &resources).unwrap_err();
        assert!(matches!(err, ConvertError::AmbiguousSymbol { ref path, .. } if path == "/layers/0/getColor"));

        let spec = json!({"layers": [{"@@type": "LineLayer", "getColor": "@@#resources.BLACK"}]});
        let scene = converter().convert(&spec, &resources).unwrap();
        assert_eq!(
            scene.layers[0].prop("getColor").and_then(Resolved::to_json),
            Some(json!([1, 1, 1]))
        );
    }

    #[test]
    fn test_top_level_props_keep_paths() {
        let spec = json!({"controller": true, "coordinateSystem": "@@#COORDINATE_SYSTEM.LNGLAT", "x": "@@#y"});
        let err = converter().convert(&spec, &ResourceTable::new()).unwrap_err();
        assert_eq!(
            err,
            ConvertError::UnresolvedSymbol {
                symbol: "y".into(),
                path: "/x".into()
            }
        );

        let spec = json!({"controller": true, "coordinateSystem": "@@#COORDINATE_SYSTEM.LNGLAT"});
        let scene = converter().convert(&spec, &ResourceTable::new()).unwrap();
        assert_eq!(scene.props.get("coordinateSystem").and_then(Resolved::as_f64), Some(1.0));
        assert_eq!(scene.props.get("controller").and_then(Resolved::as_bool), Some(true));
    }

    #[test]
    fn test_shape_errors() {
        let c = converter();
        let none = ResourceTable::new();
        assert_eq!(c.convert(&json!([1]), &none).unwrap_err(), ConvertError::InvalidRoot);

        let err = c.convert(&json!({"layers": {"@@type": "LineLayer"}}), &none).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidLayer { ref path, .. } if path == "/layers"));

        let err = c.convert(&json!({"layers": [{"@@type": "MapView"}]}), &none).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidLayer { ref path, .. } if path == "/layers/0"));

        let err = c.convert(&json!({"views": [{"@@type": "ScatterplotLayer"}]}), &none).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidView { ref path, .. } if path == "/views/0"));
    }

    #[test]
    fn test_resources_do_not_leak_into_schema() {
        let c = converter();
        let resources = ResourceTable::new().with_value("onlyHere", json!(7));
        c.convert(&json!({"n": "@@#onlyHere"}), &resources).unwrap();

        assert!(c.schema().lookup("onlyHere").is_none());
        let err = c.convert(&json!({"n": "@@#onlyHere"}), &ResourceTable::new()).unwrap_err();
        assert!(matches!(err, ConvertError::UnresolvedSymbol { .. }));
    }

    #[test]
    fn test_resource_classes_are_instantiable() {
        let custom = ConfigurationSchema::builder()
            .class("HeatLayer", ClassKind::Layer, json!({"intensity": 1}))
            .build()
            .unwrap();
        let resources = {
            let mut table = ResourceTable::new();
            table.insert("Overlay", Symbol::Class(custom.class("HeatLayer").unwrap().clone()));
            table
        };
        let scene = converter()
            .convert(&json!({"layers": [{"type": "@@#resources.Overlay", "id": "heat"}]}), &resources)
            .unwrap();
        assert_eq!(scene.layers[0].class, "HeatLayer");
        assert_eq!(scene.layers[0].prop("intensity").and_then(Resolved::as_f64), Some(1.0));
    }
}
