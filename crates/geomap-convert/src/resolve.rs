//! The resolution pass: `SpecNode` trees in, `Resolved` trees out.

use thiserror::Error;

use geomap_core::pointer::JsonPointer;
use geomap_core::value::{Accessor, Instance, Resolved, ResolvedMap};

use crate::reference::{SpecNode, SymbolRef};
use crate::resources::ResourceTable;
use crate::schema::{ClassDef, ConfigurationSchema, Symbol};

/// Namespace under which the resource table is merged.
pub const RESOURCES_NAMESPACE: &str = "resources";

/// Object member that instantiates a class when it references one.
pub const TYPE_MEMBER: &str = "type";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("Unresolved symbol '{symbol}' at '{path}'")]
    UnresolvedSymbol { symbol: String, path: String },

    #[error(
        "Symbol '{symbol}' at '{path}' is defined by both the configuration schema and the \
         resources; write '@@#resources.{symbol}' to use the resource"
    )]
    AmbiguousSymbol { symbol: String, path: String },

    #[error("Unknown class '{class}' at '{path}'")]
    UnknownClass { class: String, path: String },

    #[error("Symbol '{symbol}' at '{path}' is not a class")]
    NotAClass { symbol: String, path: String },

    #[error("Invalid accessor '@@={expr}' at '{path}'")]
    InvalidAccessor { expr: String, path: String },

    #[error("Specification root must be a plain object")]
    InvalidRoot,

    #[error("Invalid layer at '{path}': {reason}")]
    InvalidLayer { path: String, reason: String },

    #[error("Invalid view at '{path}': {reason}")]
    InvalidView { path: String, reason: String },
}

/// The base schema merged with a resource table, without copying either.
pub struct SymbolTable<'a> {
    schema: &'a ConfigurationSchema,
    resources: &'a ResourceTable,
}

impl<'a> SymbolTable<'a> {
    pub fn new(schema: &'a ConfigurationSchema, resources: &'a ResourceTable) -> Self {
        Self { schema, resources }
    }

    pub fn lookup(&self, reference: &SymbolRef, path: &JsonPointer) -> Result<Symbol, ConvertError> {
        let unresolved = || ConvertError::UnresolvedSymbol {
            symbol: reference.to_string(),
            path: path.to_string(),
        };
        match reference {
            SymbolRef::Unqualified(name) => self.lookup_unqualified(name, path),
            SymbolRef::Qualified { namespace, name } if namespace == RESOURCES_NAMESPACE => {
                self.resources.get(name).cloned().ok_or_else(unresolved)
            }
            SymbolRef::Qualified { namespace, name } if self.schema.has_namespace(namespace) => self
                .schema
                .enumeration(namespace, name)
                .cloned()
                .ok_or_else(unresolved),
            SymbolRef::Qualified { .. } => self.lookup_unqualified(&reference.to_string(), path),
        }
    }

    /// Names present in both the schema and the resources are rejected.
    fn lookup_unqualified(&self, name: &str, path: &JsonPointer) -> Result<Symbol, ConvertError> {
        match (self.schema.lookup(name), self.resources.get(name)) {
            (Some(_), Some(_)) => Err(ConvertError::AmbiguousSymbol {
                symbol: name.to_string(),
                path: path.to_string(),
            }),
            (Some(symbol), None) => Ok(symbol),
            (None, Some(symbol)) => Ok(symbol.clone()),
            (None, None) => Err(ConvertError::UnresolvedSymbol {
                symbol: name.to_string(),
                path: path.to_string(),
            }),
        }
    }

    fn class_def(&self, name: &str, path: &JsonPointer) -> Result<ClassDef, ConvertError> {
        match self.lookup(&SymbolRef::parse(name), path) {
            Ok(Symbol::Class(def)) => Ok(def),
            Ok(_) => Err(ConvertError::NotAClass {
                symbol: name.to_string(),
                path: path.to_string(),
            }),
            Err(ConvertError::UnresolvedSymbol { .. }) => Err(ConvertError::UnknownClass {
                class: name.to_string(),
                path: path.to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    pub fn resolve(&self, node: &SpecNode) -> Result<Resolved, ConvertError> {
        self.resolve_at(node, &JsonPointer::root())
    }

    /// Resolve a subtree that sits at `path` in the enclosing specification.
    pub fn resolve_at(&self, node: &SpecNode, path: &JsonPointer) -> Result<Resolved, ConvertError> {
        match node {
            SpecNode::Concrete(value) => Ok(Resolved::from_json(value)),
            SpecNode::Reference(reference) => Ok(self.lookup(reference, path)?.to_resolved()),
            SpecNode::Accessor(expr) => Accessor::parse(expr).map(Resolved::Accessor).ok_or_else(|| {
                ConvertError::InvalidAccessor {
                    expr: expr.clone(),
                    path: path.to_string(),
                }
            }),
            SpecNode::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.resolve_at(item, &path.child(i.to_string())))
                .collect::<Result<Vec<_>, _>>()
                .map(Resolved::Array),
            SpecNode::Object(props) => self.resolve_object(props, path),
            SpecNode::Typed { class, props } => {
                let def = self.class_def(class, &path.child(crate::reference::TYPE_KEY))?;
                let explicit = self.resolve_props(props, path)?;
                Ok(Resolved::Instance(instantiate(&def, explicit)))
            }
        }
    }

    fn resolve_props(&self, props: &[(String, SpecNode)], path: &JsonPointer) -> Result<ResolvedMap, ConvertError> {
        let mut map = ResolvedMap::new();
        for (key, node) in props {
            map.insert(key.clone(), self.resolve_at(node, &path.child(key.clone()))?);
        }
        Ok(map)
    }

    /// Plain object, or an instance when its `type` member references a class.
    fn resolve_object(&self, props: &[(String, SpecNode)], path: &JsonPointer) -> Result<Resolved, ConvertError> {
        let mut class = None;
        let mut map = ResolvedMap::new();
        for (key, node) in props {
            let child = path.child(key.clone());
            if let (TYPE_MEMBER, SpecNode::Reference(reference)) = (key.as_str(), node) {
                match self.lookup(reference, &child)? {
                    Symbol::Class(def) => class = Some(def),
                    other => map.insert(key.clone(), other.to_resolved()),
                }
                continue;
            }
            map.insert(key.clone(), self.resolve_at(node, &child)?);
        }
        Ok(match class {
            Some(def) => Resolved::Instance(instantiate(&def, map)),
            None => Resolved::Object(map),
        })
    }
}

/// Class defaults first, explicit props on top.
fn instantiate(def: &ClassDef, explicit: ResolvedMap) -> Instance {
    let mut props: ResolvedMap = def
        .default_props
        .iter()
        .map(|(k, v)| (k.clone(), Resolved::from_json(v)))
        .collect();
    for (key, value) in explicit.iter() {
        props.insert(key, value.clone());
    }
    Instance {
        class: def.name.clone(),
        kind: def.kind,
        props,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geomap_core::value::{ClassKind, NamedFunction};
    use serde_json::{json, Value};

    fn resolve(spec: Value, resources: &ResourceTable) -> Result<Resolved, ConvertError> {
        let schema = ConfigurationSchema::map_defaults();
        SymbolTable::new(&schema, resources).resolve(&SpecNode::parse(&spec))
    }

    #[test]
    fn test_type_member_instantiates_with_defaults() {
        let resources = ResourceTable::new().with_value("wells", json!([[0.0, 1.0]]));
        let resolved = resolve(
            json!({"type": "@@#ScatterplotLayer", "data": "@@#wells", "radiusScale": 5}),
            &resources,
        )
        .unwrap();
        let instance = resolved.as_instance().unwrap();
        assert_eq!(instance.class, "ScatterplotLayer");
        assert_eq!(instance.kind, ClassKind::Layer);
        assert_eq!(instance.props.get("radiusScale").and_then(Resolved::as_f64), Some(5.0));
        assert_eq!(instance.props.get("radiusMinPixels").and_then(Resolved::as_f64), Some(1.0));
        assert_eq!(instance.props.get("data").and_then(Resolved::to_json), Some(json!([[0.0, 1.0]])));
        assert!(!instance.props.contains_key("type"));
    }

    #[test]
    fn test_at_type_and_unknown_class() {
        let resolved = resolve(json!({"@@type": "MapView", "repeat": true}), &ResourceTable::new()).unwrap();
        assert_eq!(resolved.as_instance().unwrap().kind, ClassKind::View);

        let err = resolve(json!({"views": [{"@@type": "GlobeView"}]}), &ResourceTable::new()).unwrap_err();
        assert_eq!(
            err,
            ConvertError::UnknownClass {
                class: "GlobeView".into(),
                path: "/views/0/@@type".into()
            }
        );

        let err = resolve(json!({"@@type": "WHITE"}), &ResourceTable::new()).unwrap_err();
        assert!(matches!(err, ConvertError::NotAClass { .. }));
    }

    #[test]
    fn test_resource_class_by_either_spelling() {
        let mut resources = ResourceTable::new();
        resources.insert(
            "Overlay",
            Symbol::Class(ClassDef {
                name: "Overlay".into(),
                kind: ClassKind::Layer,
                default_props: serde_json::Map::new(),
            }),
        );
        let by_member = resolve(json!({"type": "@@#resources.Overlay"}), &resources).unwrap();
        let by_type_key = resolve(json!({"@@type": "resources.Overlay"}), &resources).unwrap();
        assert_eq!(by_member, by_type_key);
        assert_eq!(by_type_key.as_instance().unwrap().class, "Overlay");

        let err = resolve(json!({"@@type": "resources.Underlay"}), &resources).unwrap_err();
        assert_eq!(
            err,
            ConvertError::UnknownClass {
                class: "resources.Underlay".into(),
                path: "/@@type".into()
            }
        );
    }

    #[test]
    fn test_unresolved_symbol_reports_path() {
        let err = resolve(
            json!({"layers": [{"type": "@@#ScatterplotLayer", "data": "@@#missing"}]}),
            &ResourceTable::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConvertError::UnresolvedSymbol {
                symbol: "missing".into(),
                path: "/layers/0/data".into()
            }
        );
    }

    #[test]
    fn test_collision_is_rejected_unless_qualified() {
        let resources = ResourceTable::new().with_value("WHITE", json!([250, 250, 250]));
        let err = resolve(json!({"color": "@@#WHITE"}), &resources).unwrap_err();
        assert!(matches!(err, ConvertError::AmbiguousSymbol { ref symbol, .. } if symbol == "WHITE"));

        let ok = resolve(json!({"color": "@@#resources.WHITE"}), &resources).unwrap();
        assert_eq!(ok.to_json(), Some(json!({"color": [250, 250, 250]})));
    }

    #[test]
    fn test_enumerations_functions_and_accessors() {
        let resources = ResourceTable::new().with_function(NamedFunction::new("radiusOf", |_| json!(3)));
        let resolved = resolve(
            json!({
                "coordinateSystem": "@@#COORDINATE_SYSTEM.LNGLAT",
                "getRadius": "@@#radiusOf",
                "getPosition": "@@=geometry.coordinates"
            }),
            &resources,
        )
        .unwrap();
        let map = resolved.as_object().unwrap();
        assert_eq!(map.get("coordinateSystem").and_then(Resolved::as_f64), Some(1.0));
        assert!(matches!(map.get("getRadius"), Some(Resolved::Function(f)) if f.name() == "radiusOf"));
        assert_eq!(
            map.get("getPosition").and_then(Resolved::as_accessor).map(|a| a.source()),
            Some("geometry.coordinates")
        );

        let err = resolve(json!({"getPosition": "@@=x + 1"}), &resources).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidAccessor { .. }));

        let err = resolve(json!({"c": "@@#COORDINATE_SYSTEM.MERCATOR"}), &resources).unwrap_err();
        assert!(matches!(err, ConvertError::UnresolvedSymbol { ref symbol, .. } if symbol == "COORDINATE_SYSTEM.MERCATOR"));
    }

    #[test]
    fn test_concrete_values_pass_through() {
        let spec = json!({"title": "Lakes", "n": [1, 2, {"deep": null}], "flag": false});
        let resolved = resolve(spec.clone(), &ResourceTable::new()).unwrap();
        assert_eq!(resolved.to_json(), Some(spec));
    }
}
