//! Path addressing over a JSON tree.
//!
//! Follows the realtime database conventions: `null` means absent, and objects
//! left empty by a removal disappear along with it.

use serde_json::{Map, Value};

use super::DatabaseError;

/// Characters the database refuses in keys.
const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// Split a slash-separated path into its keys. `""` and `"/"` are the root.
pub fn split_path(path: &str) -> Result<Vec<String>, DatabaseError> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if segment.contains(FORBIDDEN) {
                Err(DatabaseError::InvalidPath(path.to_string()))
            } else {
                Ok(segment.to_string())
            }
        })
        .collect()
}

/// Copy of the value at `segments`, or `null`.
pub fn value_at(root: &Value, segments: &[String]) -> Value {
    segments
        .iter()
        .try_fold(root, |node, key| node.get(key))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Replace the value at `segments`, creating intermediate objects.
pub fn set_at(root: &mut Value, segments: &[String], value: Value) {
    fn insert(node: &mut Value, segments: &[String], value: Value) {
        let Some((first, rest)) = segments.split_first() else {
            *node = value;
            return;
        };
        // Scalars and `null` on the way down become objects.
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        if let Value::Object(map) = node {
            insert(map.entry(first.clone()).or_insert(Value::Null), rest, value);
        }
    }

    if value.is_null() {
        remove_at(root, segments);
    } else {
        insert(root, segments, value);
    }
}

/// Merge the children of `patch` into the object at `segments`.
pub fn merge_at(root: &mut Value, segments: &[String], patch: Map<String, Value>) {
    for (key, value) in patch {
        let mut child = segments.to_vec();
        child.extend(key.split('/').filter(|s| !s.is_empty()).map(String::from));
        set_at(root, &child, value);
    }
}

/// Delete the value at `segments`, pruning parents left empty.
pub fn remove_at(root: &mut Value, segments: &[String]) {
    fn remove(node: &mut Value, segments: &[String]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return true;
        };
        let Value::Object(map) = node else {
            return false;
        };
        let child_gone =
            rest.is_empty() || map.get_mut(first).is_some_and(|child| remove(child, rest));
        if child_gone {
            map.remove(first);
        }
        map.is_empty()
    }

    if remove(root, segments) {
        *root = Value::Null;
    }
}
