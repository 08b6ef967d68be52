use std::collections::BTreeMap;

use serde_json::Value;

use geomap_core::value::{Handle, NamedFunction};

use crate::schema::Symbol;

/// Caller-supplied runtime values, addressable from the specification as
/// `"@@#resources.name"` (or `"@@#name"` when unambiguous).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceTable {
    entries: BTreeMap<String, Symbol>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, symbol: Symbol) -> Option<Symbol> {
        self.entries.insert(name.to_string(), symbol)
    }

    pub fn with_value(mut self, name: &str, value: Value) -> Self {
        self.insert(name, Symbol::Value(value));
        self
    }

    pub fn with_function(mut self, function: NamedFunction) -> Self {
        let name = function.name().to_string();
        self.insert(&name, Symbol::Function(function));
        self
    }

    pub fn with_handle(mut self, handle: Handle) -> Self {
        let name = handle.name().to_string();
        self.insert(&name, Symbol::Handle(handle));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every member of a JSON object becomes a data resource.
    pub fn from_json(value: &Value) -> Self {
        value
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl FromIterator<(String, Value)> for ResourceTable {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k, Symbol::Value(v)))
                .collect(),
        }
    }
}
