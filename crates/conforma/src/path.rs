//! Dotted-path access into nested documents
//!
//! A path such as `"parent.child1"` descends left to right. Object segments
//! are keys; on arrays a segment must be a decimal index.
//!
//! Reads never create anything and yield `None` for missing paths. Writes
//! create every missing intermediate object; a scalar sitting where a
//! container is needed is replaced by an empty object.
//!
//! # Examples
//!
//! ```
//! use conforma::path;
//! use serde_json::json;
//!
//! let mut doc = json!({});
//! path::set(&mut doc, "a.b.c", json!(1));
//!
//! assert_eq!(doc, json!({"a": {"b": {"c": 1}}}));
//! assert_eq!(path::get(&doc, "a.b.c"), Some(&json!(1)));
//! assert_eq!(path::get(&doc, "a.x.c"), None);
//! ```

use serde_json::{Map, Value};

/// Reads the value at `path`.
pub fn get<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => index(segment).and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Mutable counterpart of [`get`]. Creates nothing.
pub fn get_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(index(segment)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Returns true if something is stored at `path`.
pub fn contains(doc: &Value, path: &str) -> bool {
    get(doc, path).is_some()
}

/// Writes `value` at `path`, creating intermediate objects.
///
/// Writing through an array with a non-index or out-of-range segment is a
/// no-op.
pub fn set(doc: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = doc;
    for segment in parents {
        match descend_or_create(current, segment) {
            Some(next) => current = next,
            None => return,
        }
    }

    match current {
        Value::Array(items) => {
            if let Some(slot) = index(last).and_then(|i| items.get_mut(i)) {
                *slot = value;
            }
        }
        other => {
            if !other.is_object() {
                *other = Value::Object(Map::new());
            }
            if let Value::Object(map) = other {
                map.insert((*last).to_string(), value);
            }
        }
    }
}

/// Removes the value at `path` and returns it.
///
/// A missing intermediate segment makes this a no-op.
pub fn delete(doc: &mut Value, path: &str) -> Option<Value> {
    let (parent, last) = match path.rsplit_once('.') {
        Some((parent, last)) => (get_mut(doc, parent)?, last),
        None => (doc, path),
    };

    match parent {
        Value::Object(map) => map.remove(last),
        Value::Array(items) => {
            let i = index(last).filter(|&i| i < items.len())?;
            Some(items.remove(i))
        }
        _ => None,
    }
}

/// Moves the value at `src` to `dest`, then deletes `src`.
///
/// - `dest` populated: an object is shallow-merged into an object dest, any
///   other combination replaces dest.
/// - `dest` missing: it is created and assigned.
/// - `dest` omitted: an object value is shallow-merged into the root.
///
/// A missing `src` leaves the document untouched.
pub fn move_path(doc: &mut Value, src: &str, dest: Option<&str>) {
    let Some(value) = delete(doc, src) else {
        return;
    };

    match dest {
        Some(dest) => match (get_mut(doc, dest), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                existing.extend(incoming);
            }
            (Some(existing), value) => *existing = value,
            (None, value) => set(doc, dest, value),
        },
        None => match (doc, value) {
            (Value::Object(root), Value::Object(incoming)) => root.extend(incoming),
            (_, value) => {
                tracing::debug!(
                    src,
                    kind = crate::value::value_type_name(&value),
                    "non-object value cannot be merged into the root; dropped"
                );
            }
        },
    }
}

fn descend_or_create<'a>(current: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    if !current.is_object() && !current.is_array() {
        *current = Value::Object(Map::new());
    }

    match current {
        Value::Array(items) => index(segment).and_then(move |i| items.get_mut(i)),
        Value::Object(map) => Some(
            map.entry(segment)
                .or_insert_with(|| Value::Object(Map::new())),
        ),
        _ => None,
    }
}

fn index(segment: &str) -> Option<usize> {
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn get_missing_intermediate_is_none() {
        let doc = json!({"a": {"b": 1}});
        assert_eq!(get(&doc, "x.y.z"), None);
        assert_eq!(get(&doc, "a.b.c"), None);
        assert_eq!(get(&doc, "a.b"), Some(&json!(1)));
    }

    #[test]
    fn get_into_arrays() {
        let doc = json!({"servers": [{"host": "web1"}, {"host": "web2"}]});
        assert_eq!(get(&doc, "servers.1.host"), Some(&json!("web2")));
        assert_eq!(get(&doc, "servers.2.host"), None);
        assert_eq!(get(&doc, "servers.first"), None);
    }

    #[test]
    fn set_creates_intermediates() {
        let mut doc = json!({"a": 1});
        set(&mut doc, "b.c.d", json!("x"));
        assert_eq!(doc, json!({"a": 1, "b": {"c": {"d": "x"}}}));
    }

    #[test]
    fn set_replaces_scalar_intermediate() {
        let mut doc = json!({"a": "text"});
        set(&mut doc, "a.b", json!(2));
        assert_eq!(doc, json!({"a": {"b": 2}}));
    }

    #[test]
    fn set_overwrites_leaf() {
        let mut doc = json!({"a": {"b": 1}});
        set(&mut doc, "a.b", json!([1, 2]));
        assert_eq!(doc, json!({"a": {"b": [1, 2]}}));
    }

    #[test]
    fn set_into_array_index() {
        let mut doc = json!({"list": [1, 2, 3]});
        set(&mut doc, "list.1", json!(20));
        set(&mut doc, "list.9", json!(90));
        assert_eq!(doc, json!({"list": [1, 20, 3]}));
    }

    #[test]
    fn delete_missing_is_noop() {
        let mut doc = json!({"a": {"b": 1}});
        assert_eq!(delete(&mut doc, "x.y"), None);
        assert_eq!(delete(&mut doc, "a.c"), None);
        assert_eq!(doc, json!({"a": {"b": 1}}));
    }

    #[test]
    fn delete_returns_value() {
        let mut doc = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(delete(&mut doc, "a.b"), Some(json!(1)));
        assert_eq!(doc, json!({"a": {"c": 2}}));
    }

    #[test]
    fn move_paths() {
        let mut doc = json!({
            "node1": {"data": [1, 2, 3]},
            "node2": {},
            "node3": {"child1": 1, "child2": {"bigNode": 123, "maxNode": 234}},
            "node": {"test": "TEST"}
        });

        move_path(&mut doc, "node1.data", Some("node2"));
        move_path(&mut doc, "node", Some("node4.child.sub"));
        move_path(&mut doc, "node3.child2", None);

        assert_eq!(
            doc,
            json!({
                "node1": {},
                "node2": [1, 2, 3],
                "node3": {"child1": 1},
                "node4": {"child": {"sub": {"test": "TEST"}}},
                "bigNode": 123,
                "maxNode": 234
            })
        );
    }

    #[test]
    fn move_merges_into_populated_object() {
        let mut doc = json!({"src": {"a": 1, "b": 2}, "dest": {"b": 0, "c": 3}});
        move_path(&mut doc, "src", Some("dest"));
        assert_eq!(doc, json!({"dest": {"a": 1, "b": 2, "c": 3}}));
    }

    #[test]
    fn move_missing_src_is_noop() {
        let mut doc = json!({"a": 1});
        move_path(&mut doc, "missing", Some("b"));
        assert_eq!(doc, json!({"a": 1}));
    }
}
