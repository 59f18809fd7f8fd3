use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::error::TypeError;
use crate::types::field_path::FieldPath;

/// Opaque token identifying the exact stored state of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a store record as observed by the last read, query or write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub revision: Revision,
    pub content: Value,
}

impl Record {
    pub fn new(id: impl Into<String>, revision: Revision, content: Value) -> Self {
        Self { id: id.into(), revision, content }
    }

    /// Fully qualified id: `<collection>/<id>`
    pub fn full_id(&self, collection: &str) -> String {
        format!("{}/{}", collection, self.id)
    }

    pub fn field(&self, path: &FieldPath) -> Option<&Value> {
        path.get(&self.content)
    }

    /// Reads a claim or completion marker.
    pub fn marker(&self, path: &FieldPath) -> Result<Option<DateTime<Utc>>, TypeError> {
        self.field(path).map(|value| parse_marker(path, value)).transpose()
    }
}

/// Formats a marker timestamp: RFC 3339, UTC, millisecond precision.
pub fn format_marker(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_marker(path: &FieldPath, value: &Value) -> Result<DateTime<Utc>, TypeError> {
    let invalid = |reason: String| TypeError::InvalidTimestamp {
        field: path.to_string(),
        value: value.to_string(),
        reason,
    };
    let raw = value.as_str().ok_or_else(|| invalid("not a string".to_string()))?;
    DateTime::parse_from_rfc3339(raw).map(|at| at.with_timezone(&Utc)).map_err(|e| invalid(e.to_string()))
}
