use serde_json::{Map, Value};

/// Flattens nested objects into a one-level-deep object keyed by dotted paths.
///
/// `{"a": {"b": 1, "c": {"d": 2}}}` becomes `{"a.b": 1, "a.c.d": 2}`. Arrays and scalars are
/// copied as-is. When two branches flatten to the same key the one visited last wins, in key
/// order. A non-object input flattens to an empty object.
pub fn flatten_json(original: &Value) -> Map<String, Value> {
    let mut flattened = Map::new();
    if let Value::Object(map) = original {
        flatten_into(&mut flattened, "", map);
    }
    flattened
}

fn flatten_into(flattened: &mut Map<String, Value>, parent: &str, original: &Map<String, Value>) {
    for (key, value) in original {
        let key = if parent.is_empty() { key.clone() } else { format!("{}.{}", parent, key) };
        match value {
            Value::Object(nested) => flatten_into(flattened, &key, nested),
            other => {
                flattened.insert(key, other.clone());
            }
        }
    }
}
