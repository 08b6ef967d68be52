//! # Geomap Convert
//!
//! Turns a declarative map specification into a renderer-ready `Scene`.
//! Symbolic references (`"@@#name"`, `"@@#namespace.name"`), class
//! instantiation (`"@@type"` or a `type` member naming a class) and property
//! accessors (`"@@=path"`) are resolved against a `ConfigurationSchema`
//! merged with a caller-supplied `ResourceTable`.
//!
//! Conversion is a pure function of its inputs: same specification, same
//! resources, same schema, same scene.

pub mod schema;
pub mod resources;
pub mod reference;
pub mod resolve;
pub mod converter;

pub use schema::{ClassDef, ConfigurationSchema, SchemaBuilder, SchemaError, Symbol};
pub use resources::ResourceTable;
pub use reference::{SpecNode, SymbolRef};
pub use resolve::{ConvertError, SymbolTable, RESOURCES_NAMESPACE};
pub use converter::Converter;
