//! Raw specification values classified into concrete data and symbolic
//! references before resolution.

use std::fmt;

use serde_json::Value;

pub const REFERENCE_PREFIX: &str = "@@#";
pub const ACCESSOR_PREFIX: &str = "@@=";
pub const TYPE_KEY: &str = "@@type";

/// A symbolic name written as `"@@#name"` or `"@@#namespace.name"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolRef {
    Unqualified(String),
    Qualified { namespace: String, name: String },
}

impl SymbolRef {
    pub fn parse(name: &str) -> Self {
        match name.split_once('.') {
            Some((namespace, rest)) if !namespace.is_empty() && !rest.is_empty() => {
                SymbolRef::Qualified {
                    namespace: namespace.to_string(),
                    name: rest.to_string(),
                }
            }
            _ => SymbolRef::Unqualified(name.to_string()),
        }
    }
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolRef::Unqualified(name) => f.write_str(name),
            SymbolRef::Qualified { namespace, name } => write!(f, "{}.{}", namespace, name),
        }
    }
}

/// A specification value before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecNode {
    Concrete(Value),
    Reference(SymbolRef),
    Accessor(String),
    Array(Vec<SpecNode>),
    Object(Vec<(String, SpecNode)>),
    /// An object carrying `"@@type": "ClassName"`.
    Typed {
        class: String,
        props: Vec<(String, SpecNode)>,
    },
}

impl SpecNode {
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::String(s) => {
                if let Some(name) = s.strip_prefix(REFERENCE_PREFIX) {
                    SpecNode::Reference(SymbolRef::parse(name))
                } else if let Some(expr) = s.strip_prefix(ACCESSOR_PREFIX) {
                    SpecNode::Accessor(expr.to_string())
                } else {
                    SpecNode::Concrete(value.clone())
                }
            }
            Value::Array(items) => SpecNode::Array(items.iter().map(SpecNode::parse).collect()),
            Value::Object(map) => {
                let class = map.get(TYPE_KEY).and_then(Value::as_str);
                let props = map
                    .iter()
                    .filter(|(k, _)| class.is_none() || k.as_str() != TYPE_KEY)
                    .map(|(k, v)| (k.clone(), SpecNode::parse(v)))
                    .collect();
                match class {
                    Some(class) => SpecNode::Typed {
                        class: class.to_string(),
                        props,
                    },
                    None => SpecNode::Object(props),
                }
            }
            _ => SpecNode::Concrete(value.clone()),
        }
    }

    /// True when no reference, accessor or class appears anywhere below.
    pub fn is_concrete(&self) -> bool {
        match self {
            SpecNode::Concrete(_) => true,
            SpecNode::Array(items) => items.iter().all(SpecNode::is_concrete),
            SpecNode::Object(props) => props.iter().all(|(_, v)| v.is_concrete()),
            _ => false,
        }
    }
}
