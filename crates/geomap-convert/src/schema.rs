use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde_json::{json, Map, Value};
use thiserror::Error;

use geomap_core::value::{ClassKind, Handle, NamedFunction, Resolved};

use crate::resolve::RESOURCES_NAMESPACE;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Symbol '{0}' is declared more than once")]
    DuplicateSymbol(String),

    #[error("Namespace '{0}' is reserved")]
    ReservedNamespace(String),

    #[error("Default props of class '{0}' must be a JSON object")]
    InvalidDefaults(String),
}

/// A class the specification can instantiate.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub kind: ClassKind,
    /// Props applied underneath the ones written in the specification.
    pub default_props: Map<String, Value>,
}

/// Anything a symbolic reference can resolve to.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Value(Value),
    Function(NamedFunction),
    Handle(Handle),
    Class(ClassDef),
}

impl Symbol {
    pub fn to_resolved(&self) -> Resolved {
        match self {
            Symbol::Value(value) => Resolved::from_json(value),
            Symbol::Function(f) => Resolved::Function(f.clone()),
            Symbol::Handle(h) => Resolved::Handle(h.clone()),
            Symbol::Class(def) => Resolved::Class {
                name: def.name.clone(),
                kind: def.kind,
            },
        }
    }
}

/// The static symbol table the converter resolves against.
///
/// Classes, functions and constants share one flat namespace; enumerations
/// are addressed as `namespace.name`.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationSchema {
    classes: BTreeMap<String, ClassDef>,
    functions: BTreeMap<String, NamedFunction>,
    constants: BTreeMap<String, Value>,
    enumerations: BTreeMap<String, BTreeMap<String, Symbol>>,
}

impl ConfigurationSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// The schema for the stock map layers, views and helpers, built once.
    pub fn map_defaults() -> Arc<ConfigurationSchema> {
        static DEFAULTS: OnceLock<Arc<ConfigurationSchema>> = OnceLock::new();
        DEFAULTS
            .get_or_init(|| Arc::new(build_map_defaults()))
            .clone()
    }

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    /// Flat lookup over classes, functions and constants.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        if let Some(def) = self.classes.get(name) {
            return Some(Symbol::Class(def.clone()));
        }
        if let Some(f) = self.functions.get(name) {
            return Some(Symbol::Function(f.clone()));
        }
        self.constants.get(name).cloned().map(Symbol::Value)
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.enumerations.contains_key(namespace)
    }

    pub fn enumeration(&self, namespace: &str, name: &str) -> Option<&Symbol> {
        self.enumerations.get(namespace)?.get(name)
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: ConfigurationSchema,
    errors: Vec<SchemaError>,
}

impl SchemaBuilder {
    fn claim(&mut self, name: &str) -> bool {
        let taken = self.schema.classes.contains_key(name)
            || self.schema.functions.contains_key(name)
            || self.schema.constants.contains_key(name);
        if taken {
            self.errors.push(SchemaError::DuplicateSymbol(name.to_string()));
        }
        !taken
    }

    pub fn class(mut self, name: &str, kind: ClassKind, default_props: Value) -> Self {
        let Value::Object(default_props) = default_props else {
            self.errors.push(SchemaError::InvalidDefaults(name.to_string()));
            return self;
        };
        if self.claim(name) {
            self.schema.classes.insert(
                name.to_string(),
                ClassDef {
                    name: name.to_string(),
                    kind,
                    default_props,
                },
            );
        }
        self
    }

    pub fn function(mut self, function: NamedFunction) -> Self {
        if self.claim(function.name()) {
            self.schema
                .functions
                .insert(function.name().to_string(), function);
        }
        self
    }

    pub fn constant(mut self, name: &str, value: Value) -> Self {
        if self.claim(name) {
            self.schema.constants.insert(name.to_string(), value);
        }
        self
    }

    pub fn enumeration<I>(mut self, namespace: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Symbol)>,
    {
        if namespace == RESOURCES_NAMESPACE {
            self.errors
                .push(SchemaError::ReservedNamespace(namespace.to_string()));
            return self;
        }
        if self.schema.enumerations.contains_key(namespace) {
            self.errors
                .push(SchemaError::DuplicateSymbol(namespace.to_string()));
            return self;
        }
        self.schema
            .enumerations
            .insert(namespace.to_string(), entries.into_iter().collect());
        self
    }

    pub fn build(self) -> Result<ConfigurationSchema, SchemaError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.schema),
        }
    }
}

fn enum_values(entries: &[(&str, i64)]) -> Vec<(String, Symbol)> {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), Symbol::Value(json!(value))))
        .collect()
}

fn hex_to_rgb(args: &[Value]) -> Value {
    let Some(hex) = args.first().and_then(Value::as_str) else {
        return Value::Null;
    };
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return Value::Null;
    }
    let channels: Option<Vec<u8>> = (0..3)
        .map(|i| u8::from_str_radix(hex.get(i * 2..i * 2 + 2)?, 16).ok())
        .collect();
    channels.map_or(Value::Null, |c| json!(c))
}

fn build_map_defaults() -> ConfigurationSchema {
    match stock_schema() {
        Ok(schema) => schema,
        Err(err) => {
            log::error!("Stock map schema is inconsistent: {}", err);
            ConfigurationSchema::default()
        }
    }
}

fn stock_schema() -> Result<ConfigurationSchema, SchemaError> {
    ConfigurationSchema::builder()
        // Layers
        .class("ScatterplotLayer", ClassKind::Layer, json!({"radiusScale": 1, "radiusMinPixels": 1}))
        .class("GeoJsonLayer", ClassKind::Layer, json!({"filled": true, "stroked": true}))
        .class("PathLayer", ClassKind::Layer, json!({"widthMinPixels": 1}))
        .class("LineLayer", ClassKind::Layer, json!({}))
        .class("BitmapLayer", ClassKind::Layer, json!({}))
        .class("ColumnLayer", ClassKind::Layer, json!({"extruded": true}))
        .class("DrawingLayer", ClassKind::Layer, json!({"mode": "view"}))
        // Views
        .class("MapView", ClassKind::View, json!({"controller": true}))
        .class("OrthographicView", ClassKind::View, json!({"controller": true}))
        // Widgets
        .class("ScaleWidget", ClassKind::Widget, json!({"placement": "bottom-left"}))
        .class("CompassWidget", ClassKind::Widget, json!({"placement": "top-right"}))
        // Functions
        .function(NamedFunction::new("hexToRgb", hex_to_rgb))
        .function(NamedFunction::new("linearEasing", |args| {
            args.first().cloned().unwrap_or(Value::Null)
        }))
        .function(NamedFunction::new("cubicInOutEasing", |args| {
            let t = args.first().and_then(Value::as_f64).unwrap_or(0.0).clamp(0.0, 1.0);
            let eased = if t < 0.5 {
                4.0 * t * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
            };
            json!(eased)
        }))
        // Constants
        .constant("WHITE", json!([255, 255, 255]))
        .constant("BLACK", json!([0, 0, 0]))
        .enumeration(
            "COORDINATE_SYSTEM",
            enum_values(&[
                ("DEFAULT", -1),
                ("LNGLAT", 1),
                ("METER_OFFSETS", 2),
                ("LNGLAT_OFFSETS", 3),
                ("CARTESIAN", 0),
            ]),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_defaults_is_shared_and_complete() {
        let a = ConfigurationSchema::map_defaults();
        let b = ConfigurationSchema::map_defaults();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.class("ScatterplotLayer").unwrap().kind, ClassKind::Layer);
        assert_eq!(a.class("MapView").unwrap().kind, ClassKind::View);
        assert!(matches!(a.lookup("hexToRgb"), Some(Symbol::Function(_))));
        assert_eq!(a.lookup("WHITE"), Some(Symbol::Value(json!([255, 255, 255]))));
        assert_eq!(
            a.enumeration("COORDINATE_SYSTEM", "LNGLAT"),
            Some(&Symbol::Value(json!(1)))
        );
    }

    #[test]
    fn test_stock_schema_builds_cleanly() {
        let schema = stock_schema().unwrap();
        assert!(schema.class("GeoJsonLayer").is_some());
        assert!(schema.has_namespace("COORDINATE_SYSTEM"));
    }

    #[test]
    fn test_builder_rejects_duplicates_and_reserved_namespace() {
        let err = ConfigurationSchema::builder()
            .class("A", ClassKind::Layer, json!({}))
            .constant("A", json!(1))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateSymbol("A".into()));

        let err = ConfigurationSchema::builder()
            .enumeration(RESOURCES_NAMESPACE, Vec::new())
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::ReservedNamespace("resources".into()));

        let err = ConfigurationSchema::builder()
            .class("B", ClassKind::View, json!([1]))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::InvalidDefaults("B".into()));
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb(&[json!("#ff8000")]), json!([255, 128, 0]));
        assert_eq!(hex_to_rgb(&[json!("#zz")]), Value::Null);
        assert_eq!(hex_to_rgb(&[]), Value::Null);
    }
}
