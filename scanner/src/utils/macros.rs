use chrono::{DateTime, Duration, Utc};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::trace;

use crate::types::record::format_marker;

static TIME_MACRO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*Time\.now\s*(?:([+-])\s*(\d+)\s*([smhdw]))?\s*\}").expect("time macro pattern is valid")
});

/// Expands `${Time.now}` and `${Time.now <+|-> <n><unit>}` inside every string of `params`.
///
/// Units are `s`, `m`, `h`, `d` and `w`. The replacement uses the marker timestamp format, so
/// expanded values compare directly against claim and completion markers. Other `${...}`
/// expressions are left untouched.
pub fn expand_time_macros(params: &mut Map<String, Value>, now: DateTime<Utc>) {
    for value in params.values_mut() {
        expand_value(value, now);
    }
}

fn expand_value(value: &mut Value, now: DateTime<Utc>) {
    match value {
        Value::String(raw) => {
            if let Some(expanded) = expand_str(raw, now) {
                trace!(from = %raw, to = %expanded, "Expanded time macro");
                *raw = expanded;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| expand_value(item, now)),
        Value::Object(map) => map.values_mut().for_each(|item| expand_value(item, now)),
        _ => {}
    }
}

fn expand_str(raw: &str, now: DateTime<Utc>) -> Option<String> {
    if !TIME_MACRO.is_match(raw) {
        return None;
    }
    let expanded = TIME_MACRO.replace_all(raw, |caps: &Captures<'_>| {
        match offset(caps).and_then(|offset| now.checked_add_signed(offset)) {
            Some(at) => format_marker(at),
            // Offset or resulting date out of range; keep the macro text as-is
            None => caps[0].to_string(),
        }
    });
    Some(expanded.into_owned())
}

fn offset(caps: &Captures<'_>) -> Option<Duration> {
    let (Some(sign), Some(amount), Some(unit)) = (caps.get(1), caps.get(2), caps.get(3)) else {
        return Some(Duration::zero());
    };
    let amount: i64 = amount.as_str().parse().ok()?;
    let magnitude = match unit.as_str() {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        _ => None,
    }?;
    Some(if sign.as_str() == "-" { -magnitude } else { magnitude })
}
