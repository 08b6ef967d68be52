//! Patch operations over the specification document.
//!
//! Operations follow RFC 6902 (`add`, `remove`, `replace`, `move`, `copy`,
//! `test`). A batch is applied to a working copy and only handed back when
//! every operation succeeded, together with the inverse batch that undoes it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::pointer::{JsonPointer, PointerError};

/// A single structural edit to the specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self::Add {
            path: path.into(),
            value,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self::Replace {
            path: path.into(),
            value,
        }
    }

    pub fn move_to(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Move {
            from: from.into(),
            path: path.into(),
        }
    }

    pub fn copy(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Copy {
            from: from.into(),
            path: path.into(),
        }
    }

    pub fn test(path: impl Into<String>, value: Value) -> Self {
        Self::Test {
            path: path.into(),
            value,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Move { .. } => "move",
            Self::Copy { .. } => "copy",
            Self::Test { .. } => "test",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }
}

/// Why an operation could not be applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchFault {
    #[error(transparent)]
    InvalidPointer(#[from] PointerError),

    #[error("no value exists at '{0}'")]
    PathNotFound(String),

    #[error("value at '{path}' is not a container, cannot address '{token}'")]
    NotAContainer { path: String, token: String },

    #[error("'{token}' is not a valid array index at '{path}'")]
    InvalidIndex { path: String, token: String },

    #[error("index {index} is out of bounds for array of length {len} at '{path}'")]
    IndexOutOfBounds { path: String, index: usize, len: usize },

    #[error("the document root cannot be removed")]
    RemoveRoot,

    #[error("cannot move '{from}' into its own descendant")]
    MoveIntoDescendant { from: String },

    #[error("test failed, value differs")]
    TestFailed,
}

/// A patch batch was rejected; the document is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid patch operation #{index} ({op} '{path}'): {reason}")]
pub struct InvalidPatchError {
    /// Position of the failing operation within the batch.
    pub index: usize,
    pub op: &'static str,
    pub path: String,
    pub reason: PatchFault,
}

/// Apply `ops` to a copy of `doc`.
///
/// Returns the patched document and the inverse batch, or the first failure.
pub fn apply_patch(
    doc: &Value,
    ops: &[PatchOperation],
) -> Result<(Value, Vec<PatchOperation>), InvalidPatchError> {
    let mut working = doc.clone();
    let mut inverse = Vec::new();
    for (index, op) in ops.iter().enumerate() {
        apply_operation(&mut working, op, &mut inverse).map_err(|reason| InvalidPatchError {
            index,
            op: op.name(),
            path: op.path().to_string(),
            reason,
        })?;
    }
    inverse.reverse();
    Ok((working, inverse))
}

fn apply_operation(
    doc: &mut Value,
    op: &PatchOperation,
    inverse: &mut Vec<PatchOperation>,
) -> Result<(), PatchFault> {
    match op {
        PatchOperation::Add { path, value } => {
            add_at(doc, &JsonPointer::parse(path)?, value.clone(), inverse)
        }
        PatchOperation::Remove { path } => {
            remove_at(doc, &JsonPointer::parse(path)?, inverse).map(|_| ())
        }
        PatchOperation::Replace { path, value } => {
            let pointer = JsonPointer::parse(path)?;
            let target = resolve_mut(doc, &pointer)?;
            let old = std::mem::replace(target, value.clone());
            inverse.push(PatchOperation::replace(pointer.to_string(), old));
            Ok(())
        }
        PatchOperation::Move { from, path } => {
            let from_ptr = JsonPointer::parse(from)?;
            let to_ptr = JsonPointer::parse(path)?;
            if from_ptr == to_ptr {
                resolve(doc, &from_ptr)?;
                return Ok(());
            }
            if to_ptr.is_descendant_of(&from_ptr) {
                return Err(PatchFault::MoveIntoDescendant { from: from.clone() });
            }
            let value = remove_at(doc, &from_ptr, inverse)?;
            add_at(doc, &to_ptr, value, inverse)
        }
        PatchOperation::Copy { from, path } => {
            let value = resolve(doc, &JsonPointer::parse(from)?)?.clone();
            add_at(doc, &JsonPointer::parse(path)?, value, inverse)
        }
        PatchOperation::Test { path, value } => {
            if resolve(doc, &JsonPointer::parse(path)?)? == value {
                Ok(())
            } else {
                Err(PatchFault::TestFailed)
            }
        }
    }
}

fn add_at(
    doc: &mut Value,
    pointer: &JsonPointer,
    value: Value,
    inverse: &mut Vec<PatchOperation>,
) -> Result<(), PatchFault> {
    let Some((parent, token)) = pointer.split_last() else {
        let old = std::mem::replace(doc, value);
        inverse.push(PatchOperation::replace("", old));
        return Ok(());
    };
    let parent_path = parent.to_string();
    match resolve_mut(doc, &parent)? {
        Value::Object(map) => {
            match map.insert(token.to_string(), value) {
                Some(old) => inverse.push(PatchOperation::replace(pointer.to_string(), old)),
                None => inverse.push(PatchOperation::remove(pointer.to_string())),
            }
            Ok(())
        }
        Value::Array(items) => {
            let index = if token == "-" {
                items.len()
            } else {
                parse_index(&parent_path, token)?
            };
            if index > items.len() {
                return Err(PatchFault::IndexOutOfBounds {
                    path: parent_path,
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value);
            inverse.push(PatchOperation::remove(parent.child(index.to_string()).to_string()));
            Ok(())
        }
        _ => Err(PatchFault::NotAContainer {
            path: parent_path,
            token: token.to_string(),
        }),
    }
}

fn remove_at(
    doc: &mut Value,
    pointer: &JsonPointer,
    inverse: &mut Vec<PatchOperation>,
) -> Result<Value, PatchFault> {
    let Some((parent, token)) = pointer.split_last() else {
        return Err(PatchFault::RemoveRoot);
    };
    let parent_path = parent.to_string();
    match resolve_mut(doc, &parent)? {
        Value::Object(map) => {
            if !map.contains_key(token) {
                return Err(PatchFault::PathNotFound(pointer.to_string()));
            }
            // Restoring the whole parent keeps key order intact on undo.
            inverse.push(PatchOperation::replace(parent_path, Value::Object(map.clone())));
            Ok(remove_ordered(map, token))
        }
        Value::Array(items) => {
            let index = parse_index(&parent_path, token)?;
            if index >= items.len() {
                return Err(PatchFault::IndexOutOfBounds {
                    path: parent_path,
                    index,
                    len: items.len(),
                });
            }
            let old = items.remove(index);
            inverse.push(PatchOperation::add(pointer.to_string(), old.clone()));
            Ok(old)
        }
        _ => Err(PatchFault::NotAContainer {
            path: parent_path,
            token: token.to_string(),
        }),
    }
}

/// Remove `key` without disturbing the order of the remaining members.
fn remove_ordered(map: &mut Map<String, Value>, key: &str) -> Value {
    let mut removed = Value::Null;
    let kept: Map<String, Value> = std::mem::take(map)
        .into_iter()
        .filter_map(|(k, v)| {
            if k == key {
                removed = v;
                None
            } else {
                Some((k, v))
            }
        })
        .collect();
    *map = kept;
    removed
}

fn parse_index(path: &str, token: &str) -> Result<usize, PatchFault> {
    let well_formed = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !well_formed {
        return Err(PatchFault::InvalidIndex {
            path: path.to_string(),
            token: token.to_string(),
        });
    }
    token.parse().map_err(|_| PatchFault::InvalidIndex {
        path: path.to_string(),
        token: token.to_string(),
    })
}

fn resolve<'a>(doc: &'a Value, pointer: &JsonPointer) -> Result<&'a Value, PatchFault> {
    let mut current = doc;
    let mut walked = JsonPointer::root();
    for token in pointer.tokens() {
        current = match current {
            Value::Object(map) => map.get(token),
            Value::Array(items) => items.get(parse_index(&walked.to_string(), token)?),
            _ => {
                return Err(PatchFault::NotAContainer {
                    path: walked.to_string(),
                    token: token.clone(),
                })
            }
        }
        .ok_or_else(|| PatchFault::PathNotFound(pointer.to_string()))?;
        walked = walked.child(token.clone());
    }
    Ok(current)
}

fn resolve_mut<'a>(doc: &'a mut Value, pointer: &JsonPointer) -> Result<&'a mut Value, PatchFault> {
    let mut current = doc;
    let mut walked = JsonPointer::root();
    for token in pointer.tokens() {
        current = match current {
            Value::Object(map) => map.get_mut(token),
            Value::Array(items) => items.get_mut(parse_index(&walked.to_string(), token)?),
            _ => {
                return Err(PatchFault::NotAContainer {
                    path: walked.to_string(),
                    token: token.clone(),
                })
            }
        }
        .ok_or_else(|| PatchFault::PathNotFound(pointer.to_string()))?;
        walked = walked.child(token.clone());
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "initialViewState": {"longitude": -81.0, "latitude": 42.2, "zoom": 6},
            "layers": [
                {"id": "lakes", "type": "@@#GeoJsonLayer", "visible": true},
                {"id": "wells", "type": "@@#ScatterplotLayer"}
            ]
        })
    }

    #[test]
    fn test_batch_applies_in_order() {
        let ops = vec![
            PatchOperation::replace("/layers/0/visible", json!(false)),
            PatchOperation::add("/layers/1/radiusScale", json!(3)),
            PatchOperation::add("/layers/-", json!({"id": "grid"})),
            PatchOperation::remove("/initialViewState/zoom"),
        ];
        let (patched, _) = apply_patch(&sample(), &ops).unwrap();
        assert_eq!(patched["layers"][0]["visible"], json!(false));
        assert_eq!(patched["layers"][1]["radiusScale"], json!(3));
        assert_eq!(patched["layers"][2]["id"], json!("grid"));
        assert!(patched["initialViewState"].get("zoom").is_none());
    }

    #[test]
    fn test_failed_batch_reports_index_and_leaves_input() {
        let doc = sample();
        let ops = vec![
            PatchOperation::replace("/layers/0/visible", json!(false)),
            PatchOperation::replace("/layers/7/visible", json!(false)),
        ];
        let err = apply_patch(&doc, &ops).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.op, "replace");
        assert_eq!(doc, sample());
    }

    #[test]
    fn test_child_of_scalar_is_rejected() {
        let err = apply_patch(
            &sample(),
            &[PatchOperation::add("/initialViewState/zoom/level", json!(1))],
        )
        .unwrap_err();
        assert!(matches!(err.reason, PatchFault::NotAContainer { .. }));
    }

    #[test]
    fn test_remove_root_and_bad_index() {
        let err = apply_patch(&sample(), &[PatchOperation::remove("")]).unwrap_err();
        assert_eq!(err.reason, PatchFault::RemoveRoot);

        let err = apply_patch(&sample(), &[PatchOperation::remove("/layers/01")]).unwrap_err();
        assert!(matches!(err.reason, PatchFault::InvalidIndex { .. }));

        let err = apply_patch(&sample(), &[PatchOperation::add("/layers/5", json!({}))]).unwrap_err();
        assert!(matches!(err.reason, PatchFault::IndexOutOfBounds { index: 5, len: 2, .. }));
    }

    #[test]
    fn test_inverse_restores_original_exactly() {
        let doc = sample();
        let ops = vec![
            PatchOperation::remove("/initialViewState/longitude"),
            PatchOperation::move_to("/layers/0", "/layers/1"),
            PatchOperation::copy("/layers/0/id", "/title"),
            PatchOperation::replace("/layers/1/visible", json!(false)),
        ];
        let (patched, inverse) = apply_patch(&doc, &ops).unwrap();
        let (restored, _) = apply_patch(&patched, &inverse).unwrap();
        assert_eq!(restored, doc);
        assert_eq!(
            serde_json::to_string(&restored).unwrap(),
            serde_json::to_string(&doc).unwrap()
        );
    }

    #[test]
    fn test_move_into_descendant_and_test_op() {
        let err = apply_patch(&sample(), &[PatchOperation::move_to("/layers", "/layers/0/children")])
            .unwrap_err();
        assert!(matches!(err.reason, PatchFault::MoveIntoDescendant { .. }));

        assert!(apply_patch(&sample(), &[PatchOperation::test("/layers/1/id", json!("wells"))]).is_ok());
        let err = apply_patch(&sample(), &[PatchOperation::test("/layers/1/id", json!("lakes"))])
            .unwrap_err();
        assert_eq!(err.reason, PatchFault::TestFailed);
    }

    #[test]
    fn test_operation_serde_shape() {
        let op: PatchOperation =
            serde_json::from_value(json!({"op": "replace", "path": "/a", "value": 1})).unwrap();
        assert_eq!(op, PatchOperation::replace("/a", json!(1)));
        let back = serde_json::to_value(PatchOperation::move_to("/a", "/b")).unwrap();
        assert_eq!(back, json!({"op": "move", "from": "/a", "path": "/b"}));
    }
}
