// JValue: Arc-wrapped value type flowing through every remapper step
// Thread-safe so compiled remappers and their literals can be shared freely

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Ordered key/value mapping used by `JValue::Object`.
pub type Map = IndexMap<String, JValue>;

/// A JSON-like value with O(1) clone semantics via Arc-wrapping.
///
/// `Undefined` is a first-class variant: it marks "no value" (a missing
/// property, an operator fallback) and is distinct from an explicit `null`.
/// It serializes as `null` inside arrays and is skipped inside objects.
#[derive(Clone, Debug, Default)]
pub enum JValue {
    Null,
    #[default]
    Undefined,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(Arc<Vec<JValue>>),
    Object(Arc<Map>),
}

// ── Type checks ──────────────────────────────────────────────────────────────

macro_rules! predicates {
    ($($name:ident => $pattern:pat),* $(,)?) => {
        $(
            #[inline]
            pub fn $name(&self) -> bool {
                matches!(self, $pattern)
            }
        )*
    };
}

impl JValue {
    predicates! {
        is_null => JValue::Null,
        is_undefined => JValue::Undefined,
        // Null or undefined, the two JS "nullish" values
        is_nullish => JValue::Null | JValue::Undefined,
        is_bool => JValue::Bool(_),
        is_number => JValue::Number(_),
        is_string => JValue::String(_),
        is_array => JValue::Array(_),
        is_object => JValue::Object(_),
    }

    /// Name of the value's type as reported by the `type` operator.
    pub fn type_name(&self) -> &'static str {
        match self {
            JValue::Null => "null",
            JValue::Undefined => "undefined",
            JValue::Bool(_) => "boolean",
            JValue::Number(_) => "number",
            JValue::String(_) => "string",
            JValue::Array(_) => "array",
            JValue::Object(_) => "object",
        }
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

impl JValue {
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JValue::Number(n) => {
                let f = *n;
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Some(f as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<&Vec<JValue>> {
        match self {
            JValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            JValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Get a mutable reference to the inner map, cloning if shared (Arc::make_mut).
    #[inline]
    pub fn as_object_mut(&mut self) -> Option<&mut Map> {
        match self {
            JValue::Object(map) => Some(Arc::make_mut(map)),
            _ => None,
        }
    }

    /// Index into an object by key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&JValue> {
        match self {
            JValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Object property or `Undefined`.
    pub fn property(&self, key: &str) -> JValue {
        self.get(key).cloned().unwrap_or(JValue::Undefined)
    }
}

// ── Constructors ─────────────────────────────────────────────────────────────

impl JValue {
    #[inline]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        JValue::String(s.into())
    }

    #[inline]
    pub fn array(v: Vec<JValue>) -> Self {
        JValue::Array(Arc::new(v))
    }

    #[inline]
    pub fn object(m: Map) -> Self {
        JValue::Object(Arc::new(m))
    }

    #[inline]
    pub fn empty_array() -> Self {
        JValue::array(Vec::new())
    }

    #[inline]
    pub fn empty_object() -> Self {
        JValue::object(Map::new())
    }
}

// ── From impls ───────────────────────────────────────────────────────────────

impl From<bool> for JValue {
    #[inline]
    fn from(b: bool) -> Self {
        JValue::Bool(b)
    }
}

macro_rules! from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for JValue {
                #[inline]
                fn from(n: $t) -> Self {
                    JValue::Number(n as f64)
                }
            }
        )*
    };
}

from_number!(i32, i64, u32, u64, usize, f64);

impl From<&str> for JValue {
    #[inline]
    fn from(s: &str) -> Self {
        JValue::String(s.into())
    }
}

impl From<String> for JValue {
    #[inline]
    fn from(s: String) -> Self {
        JValue::String(s.into())
    }
}

impl From<Vec<JValue>> for JValue {
    #[inline]
    fn from(v: Vec<JValue>) -> Self {
        JValue::Array(Arc::new(v))
    }
}

impl From<Map> for JValue {
    #[inline]
    fn from(m: Map) -> Self {
        JValue::Object(Arc::new(m))
    }
}

impl<T: Into<JValue>> From<Option<T>> for JValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(JValue::Undefined)
    }
}

// ── PartialEq ────────────────────────────────────────────────────────────────

/// Deep structural equality. Object comparison ignores key order, `NaN` is
/// never equal to itself and `null` is distinct from `undefined`.
impl PartialEq for JValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JValue::Null, JValue::Null) => true,
            (JValue::Undefined, JValue::Undefined) => true,
            (JValue::Bool(a), JValue::Bool(b)) => a == b,
            (JValue::Number(a), JValue::Number(b)) => a == b,
            (JValue::String(a), JValue::String(b)) => a == b,
            (JValue::Array(a), JValue::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (JValue::Object(a), JValue::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

// ── Display ──────────────────────────────────────────────────────────────────

/// Compact JSON, except that a bare `Undefined` reads as `undefined`.
impl fmt::Display for JValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            return f.write_str("undefined");
        }
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

// ── Serialization ────────────────────────────────────────────────────────────

impl Serialize for JValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            JValue::Null | JValue::Undefined => serializer.serialize_none(),
            JValue::Bool(b) => serializer.serialize_bool(*b),
            JValue::Number(n) => {
                if n.is_nan() || n.is_infinite() {
                    serializer.serialize_none()
                } else if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            JValue::String(s) => serializer.serialize_str(s),
            JValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr.iter() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            JValue::Object(map) => {
                let defined = map.values().filter(|v| !v.is_undefined()).count();
                let mut m = serializer.serialize_map(Some(defined))?;
                for (k, v) in map.iter().filter(|(_, v)| !v.is_undefined()) {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
        }
    }
}

// ── Deserialization (single-pass JSON→JValue) ────────────────────────────────

impl<'de> serde::Deserialize<'de> for JValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(JValueVisitor)
    }
}

struct JValueVisitor;

impl<'de> Visitor<'de> for JValueVisitor {
    type Value = JValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "any valid JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<JValue, E> {
        Ok(JValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<JValue, E> {
        Ok(JValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<JValue, E> {
        Ok(JValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<JValue, E> {
        Ok(JValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<JValue, E> {
        Ok(JValue::string(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<JValue, E> {
        Ok(JValue::String(v.into()))
    }

    fn visit_none<E: de::Error>(self) -> Result<JValue, E> {
        Ok(JValue::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<JValue, E> {
        Ok(JValue::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<JValue, A::Error> {
        let mut vec = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(elem) = seq.next_element()? {
            vec.push(elem);
        }
        Ok(JValue::array(vec))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<JValue, A::Error> {
        let mut m = Map::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((k, v)) = map.next_entry()? {
            m.insert(k, v);
        }
        Ok(JValue::object(m))
    }
}

// ── JSON string I/O ──────────────────────────────────────────────────────────

impl JValue {
    /// Serialize to a JSON string.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a JSON string into a JValue without an intermediate serde_json::Value.
    pub fn from_json_str(s: &str) -> Result<JValue, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// ── Conversion from serde_json::Value ────────────────────────────────────────

impl From<serde_json::Value> for JValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => JValue::Null,
            serde_json::Value::Bool(b) => JValue::Bool(b),
            serde_json::Value::Number(n) => JValue::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => JValue::String(s.into()),
            serde_json::Value::Array(arr) => {
                JValue::Array(Arc::new(arr.into_iter().map(JValue::from).collect()))
            }
            serde_json::Value::Object(map) => {
                let m: Map = map.into_iter().map(|(k, v)| (k, JValue::from(v))).collect();
                JValue::Object(Arc::new(m))
            }
        }
    }
}

// ── jvalue! macro ────────────────────────────────────────────────────────────

/// Macro for constructing JValue literals, similar to serde_json::json!
///
/// Usage:
///   jvalue!(null)           → JValue::Null
///   jvalue!(undefined)      → JValue::Undefined
///   jvalue!(true)           → JValue::Bool(true)
///   jvalue!(42)             → JValue::Number(42.0)
///   jvalue!("hello")        → JValue::String(Arc::from("hello"))
///   jvalue!([1, 2, 3])      → JValue::Array(Arc::new(vec![...]))
///   jvalue!({"k": v, ...})  → JValue::Object(Arc::new(IndexMap from pairs))
///   jvalue!(expr)           → JValue::from(expr)
#[macro_export]
macro_rules! jvalue {
    (null) => {
        $crate::value::JValue::Null
    };

    (undefined) => {
        $crate::value::JValue::Undefined
    };

    (true) => {
        $crate::value::JValue::Bool(true)
    };

    (false) => {
        $crate::value::JValue::Bool(false)
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::value::JValue::Array(std::sync::Arc::new(vec![ $( $crate::jvalue!($elem) ),* ]))
    };

    ({ $($key:tt : $val:tt),* $(,)? }) => {
        {
            #[allow(unused_mut)]
            let mut map = $crate::value::Map::new();
            $(
                map.insert(($key).to_string(), $crate::jvalue!($val));
            )*
            $crate::value::JValue::Object(std::sync::Arc::new(map))
        }
    };

    // Expression (fallback: numbers, variables, function calls)
    ($other:expr) => {
        $crate::value::JValue::from($other)
    };
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_is_cheap() {
        let arr = JValue::array(vec![JValue::from(1i64), JValue::from(2i64)]);
        let arr2 = arr.clone();
        if let (JValue::Array(a), JValue::Array(b)) = (&arr, &arr2) {
            assert!(Arc::ptr_eq(a, b));
        } else {
            panic!("expected arrays");
        }

        let s = JValue::string("hello");
        let s2 = s.clone();
        if let (JValue::String(a), JValue::String(b)) = (&s, &s2) {
            assert!(Arc::ptr_eq(a, b));
        } else {
            panic!("expected strings");
        }
    }

    #[test]
    fn test_value_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JValue>();
    }

    #[test]
    fn test_type_names() {
        assert_eq!(JValue::Null.type_name(), "null");
        assert_eq!(JValue::Undefined.type_name(), "undefined");
        assert_eq!(jvalue!(1).type_name(), "number");
        assert_eq!(jvalue!("x").type_name(), "string");
        assert_eq!(jvalue!([1]).type_name(), "array");
        assert_eq!(jvalue!({"a": 1}).type_name(), "object");
    }

    #[test]
    fn test_jvalue_macro() {
        let arr = jvalue!([1, 2, 3]);
        assert_eq!(arr.as_array().map(|a| a.len()), Some(3));

        let obj = jvalue!({"name": "Alice", "age": 30});
        assert_eq!(obj.get("name").and_then(|v| v.as_str()), Some("Alice"));
        assert_eq!(obj.get("age").and_then(|v| v.as_i64()), Some(30));
        assert_eq!(jvalue!(undefined), JValue::Undefined);
    }

    #[test]
    fn test_equality() {
        assert_ne!(JValue::Number(f64::NAN), JValue::Number(f64::NAN));
        assert_ne!(JValue::Null, JValue::Undefined);
        // Key order does not matter for objects
        assert_eq!(jvalue!({"a": 1, "b": 2}), jvalue!({"b": 2, "a": 1}));
        // Order matters for arrays
        assert_ne!(jvalue!([1, 2]), jvalue!([2, 1]));
    }

    #[test]
    fn test_undefined_fields_are_skipped_when_serialized() {
        let v = jvalue!({"item": "c", "nextItem": undefined});
        assert_eq!(v.to_json_string().unwrap(), r#"{"item":"c"}"#);
        assert_eq!(v.to_string(), r#"{"item":"c"}"#);

        let arr = jvalue!([1, undefined]);
        assert_eq!(arr.to_json_string().unwrap(), "[1,null]");
    }

    #[test]
    fn test_from_serde_json() {
        let jv = JValue::from(serde_json::json!({"name": "Alice", "scores": [1, 2, 3]}));
        assert_eq!(jv.get("name").and_then(|v| v.as_str()), Some("Alice"));
        assert_eq!(jv.get("scores").and_then(|v| v.as_array()).map(|a| a.len()), Some(3));
        // Object key order survives parsing
        let parsed = JValue::from_json_str(r#"{"z": 1, "a": 2}"#).unwrap();
        let keys: Vec<&String> = parsed.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a"]);
    }

    #[test]
    fn test_object_mut_copies_shared_map() {
        let mut obj = jvalue!({"a": 1});
        let shared = obj.clone();

        obj.as_object_mut().unwrap().insert("b".to_string(), JValue::from(2));

        assert_eq!(obj, jvalue!({"a": 1, "b": 2}));
        assert_eq!(shared, jvalue!({"a": 1}));
    }
}
