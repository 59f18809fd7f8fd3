use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::types::error::TypeError;

/// Location of a field inside a record's content, written as a JSON pointer (`/taskState/started`).
///
/// A path without a leading `/` is accepted and treated as if it had one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    tokens: Vec<String>,
}

impl FieldPath {
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Returns the value at this path, treating JSON `null` as absent.
    pub fn get<'a>(&self, content: &'a Value) -> Option<&'a Value> {
        let mut current = content;
        for token in &self.tokens {
            current = match current {
                Value::Object(map) => map.get(token)?,
                Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    /// Writes `value` at this path, creating (or replacing non-object) intermediate levels.
    pub fn set(&self, content: &mut Value, value: Value) {
        let Some((last, parents)) = self.tokens.split_last() else {
            *content = value;
            return;
        };

        let mut current = content;
        for token in parents {
            current = ensure_object(current).entry(token.clone()).or_insert_with(|| Value::Object(Map::new()));
        }
        ensure_object(current).insert(last.clone(), value);
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

impl FromStr for FieldPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        if trimmed.is_empty() {
            return Err(TypeError::InvalidFieldPath(s.to_string()));
        }
        let tokens = trimmed
            .split('/')
            .map(|token| {
                if token.is_empty() {
                    Err(TypeError::InvalidFieldPath(s.to_string()))
                } else {
                    // RFC 6901 escapes: ~1 is '/', ~0 is '~' (in that order)
                    Ok(token.replace("~1", "/").replace("~0", "~"))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tokens })
    }
}

impl TryFrom<String> for FieldPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{}", token.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}
