//! Resolved values: the output vocabulary of specification conversion.
//!
//! A resolved tree is plain data plus the runtime things symbolic references
//! point at (functions, opaque handles, classes, accessors, instances).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// What a declared class instantiates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassKind {
    Layer,
    View,
    Widget,
}

type Function = dyn Fn(&[Value]) -> Value + Send + Sync;

/// A named callable exposed through the configuration schema or resources.
#[derive(Clone)]
pub struct NamedFunction {
    name: String,
    func: Arc<Function>,
}

impl NamedFunction {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.func)(args)
    }
}

impl PartialEq for NamedFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && std::ptr::addr_eq(Arc::as_ptr(&self.func), Arc::as_ptr(&other.func))
    }
}

impl fmt::Debug for NamedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamedFunction({})", self.name)
    }
}

/// An opaque runtime value (dataset handle, color ramp, texture, ...).
///
/// Equality is identity of the shared value.
#[derive(Clone)]
pub struct Handle {
    name: String,
    value: Arc<dyn Any + Send + Sync>,
}

impl Handle {
    pub fn new<T: Any + Send + Sync>(name: &str, value: T) -> Self {
        Self {
            name: name.to_string(),
            value: Arc::new(value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.value), Arc::as_ptr(&other.value))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.name)
    }
}

/// Dotted property path read from each datum, `-` reads the datum itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessor {
    source: String,
    path: Vec<String>,
}

impl Accessor {
    pub fn parse(source: &str) -> Option<Self> {
        let source = source.trim();
        if source == "-" {
            return Some(Self {
                source: source.to_string(),
                path: Vec::new(),
            });
        }
        let path: Vec<String> = source.split('.').map(str::to_string).collect();
        let valid = path.iter().all(|segment| {
            !segment.is_empty() && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
        });
        valid.then(|| Self {
            source: source.to_string(),
            path,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate<'a>(&self, datum: &'a Value) -> Option<&'a Value> {
        self.path.iter().try_fold(datum, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
            _ => None,
        })
    }
}

/// Insertion-ordered property map of resolved values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedMap {
    entries: Vec<(String, Resolved)>,
}

impl ResolvedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite in place, keeping first-insertion order.
    pub fn insert(&mut self, key: impl Into<String>, value: Resolved) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Resolved> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Resolved> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resolved)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Resolved)> for ResolvedMap {
    fn from_iter<I: IntoIterator<Item = (String, Resolved)>>(iter: I) -> Self {
        let mut map = ResolvedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// An instantiated class: a layer, a view or a widget with resolved props.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub class: String,
    pub kind: ClassKind,
    pub props: ResolvedMap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Resolved>),
    Object(ResolvedMap),
    Function(NamedFunction),
    Handle(Handle),
    Class { name: String, kind: ClassKind },
    Accessor(Accessor),
    Instance(Instance),
}

impl Resolved {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Resolved::Null,
            Value::Bool(b) => Resolved::Bool(*b),
            Value::Number(n) => Resolved::Number(n.clone()),
            Value::String(s) => Resolved::String(s.clone()),
            Value::Array(items) => Resolved::Array(items.iter().map(Resolved::from_json).collect()),
            Value::Object(map) => Resolved::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Resolved::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Back to plain JSON; `None` when the tree holds anything that is not data.
    pub fn to_json(&self) -> Option<Value> {
        Some(match self {
            Resolved::Null => Value::Null,
            Resolved::Bool(b) => Value::Bool(*b),
            Resolved::Number(n) => Value::Number(n.clone()),
            Resolved::String(s) => Value::String(s.clone()),
            Resolved::Array(items) => {
                Value::Array(items.iter().map(Resolved::to_json).collect::<Option<Vec<_>>>()?)
            }
            Resolved::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Some((k.to_string(), v.to_json()?)))
                    .collect::<Option<Map<String, Value>>>()?,
            ),
            _ => return None,
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Resolved::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Resolved::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Resolved::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Resolved]> {
        match self {
            Resolved::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ResolvedMap> {
        match self {
            Resolved::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Resolved::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_accessor(&self) -> Option<&Accessor> {
        match self {
            Resolved::Accessor(accessor) => Some(accessor),
            _ => None,
        }
    }
}

impl From<&Value> for Resolved {
    fn from(value: &Value) -> Self {
        Resolved::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_roundtrip_keeps_order() {
        let value = json!({"b": [1, 2.5, null], "a": {"z": true, "y": "s"}});
        let resolved = Resolved::from_json(&value);
        assert_eq!(resolved.to_json(), Some(value));
    }

    #[test]
    fn test_non_data_does_not_convert_to_json() {
        let resolved = Resolved::Array(vec![
            Resolved::Null,
            Resolved::Function(NamedFunction::new("noop", |_| Value::Null)),
        ]);
        assert!(resolved.to_json().is_none());
    }

    #[test]
    fn test_accessor_paths() {
        let datum = json!({"properties": {"name": "Lake Erie"}, "coordinates": [-81.2, 42.2]});
        let name = Accessor::parse("properties.name").unwrap();
        assert_eq!(name.evaluate(&datum), Some(&json!("Lake Erie")));
        let lng = Accessor::parse("coordinates.0").unwrap();
        assert_eq!(lng.evaluate(&datum), Some(&json!(-81.2)));
        assert_eq!(Accessor::parse("-").unwrap().evaluate(&datum), Some(&datum));
        assert!(Accessor::parse("a..b").is_none());
        assert!(Accessor::parse("x * 2").is_none());
    }

    #[test]
    fn test_function_and_handle_identity() {
        let f = NamedFunction::new("double", |args| json!(args[0].as_f64().unwrap_or(0.0) * 2.0));
        assert_eq!(f.call(&[json!(2)]), json!(4.0));
        assert_eq!(f, f.clone());
        assert_ne!(f, NamedFunction::new("double", |_| Value::Null));

        let h = Handle::new("ramp", vec![[0u8, 0, 0, 255]]);
        assert_eq!(h, h.clone());
        assert_eq!(h.downcast_ref::<Vec<[u8; 4]>>().unwrap().len(), 1);
        assert_ne!(h, Handle::new("ramp", vec![[0u8, 0, 0, 255]]));
    }

    #[test]
    fn test_resolved_map_insert_overwrites_in_place() {
        let mut map = ResolvedMap::new();
        map.insert("a", Resolved::Bool(true));
        map.insert("b", Resolved::Null);
        map.insert("a", Resolved::Bool(false));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&Resolved::Bool(false)));
    }
}
