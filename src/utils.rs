// Utility functions and helpers
// Shared coercion rules: truthiness, stringification, ordering and paths

use std::cmp::Ordering;

use crate::datetime;
use crate::value::JValue;

/// JS truthiness: `false`, `0`, `NaN`, `""`, `null` and `undefined` are falsy.
/// Empty arrays and objects are truthy.
pub fn is_truthy(value: &JValue) -> bool {
    match value {
        JValue::Null | JValue::Undefined => false,
        JValue::Bool(b) => *b,
        JValue::Number(n) => *n != 0.0 && !n.is_nan(),
        JValue::String(s) => !s.is_empty(),
        JValue::Array(_) | JValue::Object(_) => true,
    }
}

/// Stringify a value the way string interpolation and joins do.
///
/// Strings are used as-is, nullish values become the empty string, numbers
/// use the shortest round-trip form and structures are rendered as JSON.
pub fn to_display_string(value: &JValue) -> String {
    match value {
        JValue::Null | JValue::Undefined => String::new(),
        JValue::Bool(b) => b.to_string(),
        JValue::Number(n) => number_to_string(*n),
        JValue::String(s) => s.to_string(),
        JValue::Array(_) | JValue::Object(_) => value.to_string(),
    }
}

/// Render a number like JS `String(n)`: plain decimals for magnitudes in
/// `[1e-6, 1e21)`, exponent notation (`1e+21`, `1.5e-7`) outside it.
pub fn number_to_string(n: f64) -> String {
    let abs = n.abs();
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if abs >= 1e21 || abs < 1e-6 {
        let formatted = format!("{:e}", n);
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{mantissa}e+{exponent}"),
            _ => formatted,
        }
    } else if n.fract() == 0.0 {
        format!("{}", n as i128)
    } else {
        format!("{}", n)
    }
}

/// Ordered comparison used by `gt` and `lt`.
///
/// Numbers compare numerically; two strings compare as instants when both
/// are ISO dates and lexicographically otherwise; a number and a numeric
/// string compare numerically. Anything else is unordered.
pub fn compare(left: &JValue, right: &JValue) -> Option<Ordering> {
    match (left, right) {
        (JValue::Number(a), JValue::Number(b)) => a.partial_cmp(b),
        (JValue::String(a), JValue::String(b)) => {
            match (datetime::parse_iso8601(a), datetime::parse_iso8601(b)) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(a.cmp(b)),
            }
        }
        (JValue::Number(a), JValue::String(s)) => a.partial_cmp(&s.trim().parse::<f64>().ok()?),
        (JValue::String(s), JValue::Number(b)) => s.trim().parse::<f64>().ok()?.partial_cmp(b),
        (JValue::Bool(a), JValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// One step of a property path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathKey {
    Name(String),
    /// Array position; negative values count from the end.
    Index(i64),
}

impl PathKey {
    /// Convert a definition value into a path step.
    pub fn from_value(value: &JValue) -> Option<PathKey> {
        match value {
            JValue::String(s) => Some(PathKey::Name(s.to_string())),
            JValue::Number(_) => value.as_i64().map(PathKey::Index),
            _ => None,
        }
    }
}

/// Split a dotted path (`a.b.0`) into steps.
pub fn split_path(path: &str) -> Vec<PathKey> {
    path.split('.').map(|segment| PathKey::Name(segment.to_string())).collect()
}

/// Walk `path` into `value`; any missing step yields `Undefined`.
pub fn get_path(value: &JValue, path: &[PathKey]) -> JValue {
    let mut current = value;
    for key in path {
        let next = match (current, key) {
            (JValue::Object(map), PathKey::Name(name)) => map.get(name.as_str()),
            (JValue::Object(map), PathKey::Index(i)) => map.get(i.to_string().as_str()),
            (JValue::Array(items), PathKey::Index(i)) => resolve_index(*i, items.len()).and_then(|i| items.get(i)),
            (JValue::Array(items), PathKey::Name(name)) => {
                if name == "length" {
                    return JValue::from(items.len());
                }
                name.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            (JValue::String(s), PathKey::Name(name)) if name == "length" => {
                return JValue::from(s.chars().count());
            }
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return JValue::Undefined,
        }
    }
    current.clone()
}

/// Resolve a possibly negative index against a collection length.
pub fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

/// Clamp JS `slice` bounds to `[0, len]`.
pub fn slice_bounds(start: i64, end: Option<i64>, len: usize) -> (usize, usize) {
    let len = len as i64;
    let clamp = |i: i64| -> usize {
        let i = if i < 0 { (len + i).max(0) } else { i.min(len) };
        i as usize
    };
    let from = clamp(start);
    let to = clamp(end.unwrap_or(len));
    (from, to.max(from))
}
