//! Structural merges between documents
//!
//! All functions are pure: inputs are borrowed, a new tree is returned.
//! Arrays are leaves; they are never merged element-wise.

use serde_json::{Map, Value};

/// Deep merge where `incoming` wins on conflicting leaves.
///
/// Objects recurse. Scalars, arrays and `null` from `incoming` overwrite.
///
/// # Examples
///
/// ```
/// use conforma::merge::merge_prefer_incoming;
/// use serde_json::json;
///
/// let merged = merge_prefer_incoming(
///     &json!({"a": 1, "n": {"x": 1, "y": 2}}),
///     &json!({"a": 2, "n": {"y": 3}}),
/// );
/// assert_eq!(merged, json!({"a": 2, "n": {"x": 1, "y": 3}}));
/// ```
pub fn merge_prefer_incoming(base: &Value, incoming: &Value) -> Value {
    merge(base, incoming, Prefer::Incoming)
}

/// Deep merge where `base` wins on conflicting leaves.
///
/// `incoming` only supplies keys that `base` lacks.
///
/// # Examples
///
/// ```
/// use conforma::merge::merge_keep_existing;
/// use serde_json::json;
///
/// let merged = merge_keep_existing(
///     &json!({"a": 1, "n": {"x": 1}}),
///     &json!({"a": 2, "b": 2, "n": {"x": 9, "y": 3}}),
/// );
/// assert_eq!(merged, json!({"a": 1, "b": 2, "n": {"x": 1, "y": 3}}));
/// ```
pub fn merge_keep_existing(base: &Value, incoming: &Value) -> Value {
    merge(base, incoming, Prefer::Existing)
}

#[derive(Clone, Copy)]
enum Prefer {
    Incoming,
    Existing,
}

fn merge(base: &Value, incoming: &Value, prefer: Prefer) -> Value {
    match (base, incoming) {
        (Value::Object(base), Value::Object(incoming)) => {
            let mut out = base.clone();
            for (key, value) in incoming {
                let merged = match out.get(key) {
                    Some(existing) => merge(existing, value, prefer),
                    None => value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        _ => match prefer {
            Prefer::Incoming => incoming.clone(),
            Prefer::Existing => base.clone(),
        },
    }
}

/// Copies `source` into the shape of `template`.
///
/// - An object template value recurses into `source[key]` when that is an
///   object, else into `{}`.
/// - An array template value is copied verbatim.
/// - A scalar template leaf takes `source[key]` when `source` has that key,
///   whatever its value (`0`, `false`, `null` and `""` included), else the
///   template value.
///
/// Keys not in `template` never appear in the result.
///
/// # Examples
///
/// ```
/// use conforma::merge::conform_shape;
/// use serde_json::json;
///
/// let out = conform_shape(
///     &json!({"name": "x", "extra": 1, "flags": {"on": false}}),
///     &json!({"name": "", "age": 18, "flags": {"on": true, "beta": false}}),
/// );
/// assert_eq!(out, json!({"name": "x", "age": 18, "flags": {"on": false, "beta": false}}));
/// ```
pub fn conform_shape(source: &Value, template: &Value) -> Value {
    let Value::Object(template) = template else {
        return template.clone();
    };
    let empty = Map::new();
    let source = source.as_object().unwrap_or(&empty);

    let shaped = template
        .iter()
        .map(|(key, shape)| {
            let value = match shape {
                Value::Object(_) => {
                    let nested = source.get(key).filter(|v| v.is_object());
                    conform_shape(nested.unwrap_or(&Value::Object(Map::new())), shape)
                }
                Value::Array(_) => shape.clone(),
                _ => source.get(key).unwrap_or(shape).clone(),
            };
            (key.clone(), value)
        })
        .collect();

    Value::Object(shaped)
}
