// Built-in operator helpers
// Pure value transformations used by the evaluator, grouped by family

use crate::value::{JValue, Map};

/// String operators
pub mod string {
    use super::*;
    use crate::ast::{Affix, Replacement, TextCase};
    use crate::utils::slice_bounds;

    pub fn change_case(s: &str, case: TextCase) -> String {
        match case {
            TextCase::Upper => s.to_uppercase(),
            TextCase::Lower => s.to_lowercase(),
        }
    }

    fn normalize<'a>(s: &'a str, affix: &'a Affix) -> (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>) {
        if affix.strict {
            (s.into(), affix.substring.as_str().into())
        } else {
            (s.to_lowercase().into(), affix.substring.to_lowercase().into())
        }
    }

    pub fn starts_with(s: &str, affix: &Affix) -> bool {
        let (haystack, needle) = normalize(s, affix);
        haystack.starts_with(needle.as_ref())
    }

    pub fn ends_with(s: &str, affix: &Affix) -> bool {
        let (haystack, needle) = normalize(s, affix);
        haystack.ends_with(needle.as_ref())
    }

    pub fn contains(s: &str, affix: &Affix) -> bool {
        let (haystack, needle) = normalize(s, affix);
        haystack.contains(needle.as_ref())
    }

    /// Apply every replacement globally, in declaration order.
    pub fn replace_all(s: &str, replacements: &[Replacement]) -> String {
        replacements.iter().fold(s.to_string(), |acc, r| {
            r.pattern.replace_all(&acc, r.replacement.as_str()).into_owned()
        })
    }

    /// Translate a JS replacement string (`$1`, `$&`, `$<name>`) into `regex` syntax.
    pub fn translate_replacement(js: &str) -> String {
        let chars: Vec<char> = js.chars().collect();
        let mut out = String::with_capacity(js.len());
        let mut i = 0;
        while i < chars.len() {
            if chars[i] != '$' {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            match chars.get(i + 1) {
                Some('$') => {
                    out.push_str("$$");
                    i += 2;
                }
                Some('&') => {
                    out.push_str("${0}");
                    i += 2;
                }
                Some(c) if c.is_ascii_digit() => {
                    let mut end = i + 1;
                    while end < chars.len() && end < i + 3 && chars[end].is_ascii_digit() {
                        end += 1;
                    }
                    let group: String = chars[i + 1..end].iter().collect();
                    out.push_str(&format!("${{{}}}", group));
                    i = end;
                }
                Some('<') => match chars[i + 2..].iter().position(|c| *c == '>') {
                    Some(len) => {
                        let name: String = chars[i + 2..i + 2 + len].iter().collect();
                        out.push_str(&format!("${{{}}}", name));
                        i += len + 3;
                    }
                    None => {
                        out.push_str("$$");
                        i += 1;
                    }
                },
                _ => {
                    out.push_str("$$");
                    i += 1;
                }
            }
        }
        out
    }

    /// JS `slice` on strings (by character) and lists; other values are `Undefined`.
    pub fn slice(value: &JValue, start: i64, end: Option<i64>) -> JValue {
        match value {
            JValue::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let (from, to) = slice_bounds(start, end, chars.len());
                JValue::string(chars[from..to].iter().collect::<String>())
            }
            JValue::Array(items) => {
                let (from, to) = slice_bounds(start, end, items.len());
                JValue::array(items[from..to].to_vec())
            }
            _ => JValue::Undefined,
        }
    }

    pub fn length(value: &JValue) -> JValue {
        match value {
            JValue::String(s) => JValue::from(s.chars().count()),
            JValue::Array(items) => JValue::from(items.len()),
            _ => JValue::Undefined,
        }
    }
}

/// Numeric operators
pub mod numeric {
    use super::*;
    use crate::ast::MathOp;

    /// Base languages that write decimals with a comma.
    const DECIMAL_COMMA_LANGUAGES: &[&str] = &[
        "nl", "de", "fr", "es", "it", "pt", "ru", "pl", "sv", "da", "fi", "nb", "no", "cs", "tr", "id", "uk",
    ];

    fn uses_decimal_comma(locale: &str) -> bool {
        let base = locale.split(['-', '_']).next().unwrap_or(locale).to_lowercase();
        DECIMAL_COMMA_LANGUAGES.contains(&base.as_str())
    }

    /// `Number(s)` from JS: surrounding whitespace ignored, empty is zero,
    /// hex/octal/binary prefixes and `Infinity` accepted.
    pub fn js_number(s: &str) -> Option<f64> {
        let s = s.trim();
        if s.is_empty() {
            return Some(0.0);
        }
        let radix = |prefix: &str, radix: u32| {
            s.get(..2)
                .filter(|p| p.eq_ignore_ascii_case(prefix))
                .and_then(|_| u64::from_str_radix(&s[2..], radix).ok())
                .map(|n| n as f64)
        };
        if let Some(n) = radix("0x", 16).or_else(|| radix("0o", 8)).or_else(|| radix("0b", 2)) {
            return Some(n);
        }
        match s {
            "Infinity" | "+Infinity" => return Some(f64::INFINITY),
            "-Infinity" => return Some(f64::NEG_INFINITY),
            _ => {}
        }
        // Rust also accepts "inf" and "nan", JS does not
        if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
            return None;
        }
        s.parse::<f64>().ok()
    }

    /// Coerce a value to a number; strings that cannot be read are returned unchanged.
    pub fn parse_number(value: &JValue, locale: &str) -> JValue {
        match value {
            JValue::Number(_) => value.clone(),
            JValue::Bool(b) => JValue::from(if *b { 1.0 } else { 0.0 }),
            JValue::Null => JValue::from(0.0),
            JValue::String(s) => {
                if let Some(n) = js_number(s) {
                    return JValue::from(n);
                }
                let normalized = if uses_decimal_comma(locale) {
                    s.replace('.', "").replace(',', ".")
                } else {
                    s.replace(',', "")
                };
                match js_number(&normalized) {
                    Some(n) => JValue::from(n),
                    None => value.clone(),
                }
            }
            _ => value.clone(),
        }
    }

    /// Arithmetic on two numbers; anything else, or a non-finite result, is `Undefined`.
    pub fn maths(a: &JValue, b: &JValue, op: MathOp) -> JValue {
        let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
            return JValue::Undefined;
        };
        let result = match op {
            MathOp::Add => a + b,
            MathOp::Subtract => a - b,
            MathOp::Multiply => a * b,
            MathOp::Divide => a / b,
            MathOp::Mod => a % b,
        };
        if result.is_finite() {
            JValue::from(result)
        } else {
            JValue::Undefined
        }
    }
}

/// Array operators
pub mod array {
    use super::*;
    use crate::utils::{resolve_index, to_display_string};

    pub fn flatten(items: &[JValue], depth: usize) -> Vec<JValue> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                JValue::Array(inner) if depth > 0 => out.extend(flatten(inner, depth - 1)),
                other => out.push(other.clone()),
            }
        }
        out
    }

    pub fn join(items: &[JValue], separator: &str) -> String {
        items.iter().map(to_display_string).collect::<Vec<_>>().join(separator)
    }

    /// Longest list `array.range` will build.
    pub const MAX_RANGE: usize = 1 << 20;

    /// `[0, 1, ..., n-1]`. Negative, non-finite and over-long counts give an empty list.
    pub fn range(n: f64) -> Vec<JValue> {
        if !n.is_finite() || n <= 0.0 || n.floor() > MAX_RANGE as f64 {
            return Vec::new();
        }
        (0..n.floor() as usize).map(JValue::from).collect()
    }

    /// Drop the elements at `indices`; negative indices count from the end.
    pub fn omit_indices(items: &[JValue], indices: &[i64]) -> Vec<JValue> {
        let drop: Vec<usize> = indices.iter().filter_map(|i| resolve_index(*i, items.len())).collect();
        items
            .iter()
            .enumerate()
            .filter(|(i, _)| !drop.contains(i))
            .map(|(_, item)| item.clone())
            .collect()
    }

    /// Keep the first element for every distinct key, in order.
    ///
    /// `keys[i]` is the dedup key of `items[i]`.
    pub fn unique_by(items: &[JValue], keys: &[JValue]) -> Vec<JValue> {
        let mut seen: Vec<&JValue> = Vec::new();
        let mut out = Vec::new();
        for (item, key) in items.iter().zip(keys) {
            if !seen.contains(&key) {
                seen.push(key);
                out.push(item.clone());
            }
        }
        out
    }

    /// `[{key, items}]` grouped on the `field` of each element, in first-seen order.
    pub fn group_by(items: &[JValue], field: &str) -> Vec<JValue> {
        let mut groups: Vec<(JValue, Vec<JValue>)> = Vec::new();
        for item in items {
            let key = item.property(field);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(item.clone()),
                None => groups.push((key, vec![item.clone()])),
            }
        }
        groups
            .into_iter()
            .map(|(key, members)| {
                let mut group = Map::new();
                group.insert("key".to_string(), key);
                group.insert("items".to_string(), JValue::array(members));
                JValue::object(group)
            })
            .collect()
    }
}

/// Object operators
pub mod object {
    use super::*;

    fn remove_path(value: &mut JValue, path: &[String]) {
        let Some(map) = value.as_object_mut() else {
            return;
        };
        match path {
            [] => {}
            [key] => {
                map.shift_remove(key);
            }
            [key, rest @ ..] => {
                if let Some(child) = map.get_mut(key) {
                    remove_path(child, rest);
                }
            }
        }
    }

    /// Remove top-level keys or nested paths from a copy of `value`.
    pub fn omit(value: &JValue, paths: &[Vec<String>]) -> JValue {
        let mut out = value.clone();
        for path in paths {
            remove_path(&mut out, path);
        }
        out
    }

    /// Unnest the list at `key`: one map per element, the element's fields
    /// merged over the parent's remaining fields.
    pub fn explode(value: &JValue, key: &str) -> Vec<JValue> {
        let Some(parent) = value.as_object() else {
            return Vec::new();
        };
        let Some(items) = parent.get(key).and_then(JValue::as_array) else {
            return Vec::new();
        };
        let mut base = parent.clone();
        base.shift_remove(key);

        items
            .iter()
            .map(|item| {
                let mut merged = base.clone();
                if let Some(fields) = item.as_object() {
                    for (k, v) in fields {
                        merged.insert(k.clone(), v.clone());
                    }
                }
                JValue::object(merged)
            })
            .collect()
    }

    fn diff_entry(path: &[String], kind: &str, fields: &[(&str, &JValue)]) -> JValue {
        let mut entry = Map::new();
        entry.insert(
            "path".to_string(),
            JValue::array(path.iter().map(|k| JValue::from(k.as_str())).collect()),
        );
        entry.insert("type".to_string(), JValue::from(kind));
        for (name, value) in fields {
            entry.insert(name.to_string(), (*value).clone());
        }
        JValue::object(entry)
    }

    fn diff_into(a: &JValue, b: &JValue, path: &mut Vec<String>, out: &mut Vec<JValue>) {
        match (a, b) {
            (JValue::Object(left), JValue::Object(right)) => {
                let mut nested = Vec::new();
                for (key, old) in left.iter() {
                    let Some(new) = right.get(key) else { continue };
                    path.push(key.clone());
                    if old.is_object() && new.is_object() {
                        diff_into(old, new, path, &mut nested);
                    } else if old != new {
                        out.push(diff_entry(path, "changed", &[("from", old), ("to", new)]));
                    }
                    path.pop();
                }
                out.append(&mut nested);

                for (key, old) in left.iter().filter(|(k, _)| !right.contains_key(*k)) {
                    path.push(key.clone());
                    out.push(diff_entry(path, "removed", &[("value", old)]));
                    path.pop();
                }
                for (key, new) in right.iter().filter(|(k, _)| !left.contains_key(*k)) {
                    path.push(key.clone());
                    out.push(diff_entry(path, "added", &[("value", new)]));
                    path.pop();
                }
            }
            _ if a == b => {}
            _ => out.push(diff_entry(path, "changed", &[("from", a), ("to", b)])),
        }
    }

    /// Deep diff of two values.
    ///
    /// At each level the changed scalars come first, then the diffs of nested
    /// objects, then keys only `a` has (`removed`) and keys only `b` has
    /// (`added`). Changes carry `from`/`to`, additions and removals `value`.
    pub fn compare(a: &JValue, b: &JValue) -> Vec<JValue> {
        let mut out = Vec::new();
        diff_into(a, b, &mut Vec::new(), &mut out);
        out
    }

    /// Drop null and undefined map entries, `depth` levels deep (unbounded when `None`).
    pub fn null_strip(value: &JValue, depth: Option<usize>) -> JValue {
        if depth == Some(0) {
            return value.clone();
        }
        let next = depth.map(|d| d - 1);
        match value {
            JValue::Object(map) => JValue::object(
                map.iter()
                    .filter(|(_, v)| !v.is_nullish())
                    .map(|(k, v)| (k.clone(), null_strip(v, next)))
                    .collect(),
            ),
            JValue::Array(items) => JValue::array(items.iter().map(|v| null_strip(v, next)).collect()),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Affix, MathOp, Replacement, TextCase};
    use crate::jvalue;
    use pretty_assertions::assert_eq;
    use regex::Regex;

    #[test]
    fn test_string_functions() {
        assert_eq!(string::change_case("Hello", TextCase::Upper), "HELLO");
        let affix = Affix { substring: "HEL".to_string(), strict: false };
        assert!(string::starts_with("hello", &affix));
        assert!(!string::starts_with("hello", &Affix { strict: true, ..affix.clone() }));
        assert!(string::contains("Say Hello", &Affix { substring: "hello".into(), strict: false }));
        assert!(string::ends_with("file.PDF", &Affix { substring: ".pdf".into(), strict: false }));
    }

    #[test]
    fn test_replacements() {
        assert_eq!(string::translate_replacement("$2-$1"), "${2}-${1}");
        assert_eq!(string::translate_replacement("[$&]"), "[${0}]");
        assert_eq!(string::translate_replacement("$$5"), "$$5");
        assert_eq!(string::translate_replacement("<$<word>>"), "<${word}>");

        let replacements = vec![Replacement {
            pattern: Regex::new(r"(\w+)@(\w+)").unwrap(),
            replacement: string::translate_replacement("$2 at $1"),
        }];
        assert_eq!(string::replace_all("me@home, you@work", &replacements), "home at me, work at you");
    }

    #[test]
    fn test_slice_and_length() {
        assert_eq!(string::slice(&jvalue!("abcdef"), 1, Some(3)), jvalue!("bc"));
        assert_eq!(string::slice(&jvalue!([1, 2, 3]), -2, None), jvalue!([2, 3]));
        assert_eq!(string::slice(&jvalue!(5), 0, None), JValue::Undefined);
        assert_eq!(string::length(&jvalue!("héllo")), jvalue!(5));
        assert_eq!(string::length(&jvalue!({})), JValue::Undefined);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(numeric::parse_number(&jvalue!(" 42 "), "en"), jvalue!(42));
        assert_eq!(numeric::parse_number(&jvalue!("0x10"), "en"), jvalue!(16));
        assert_eq!(numeric::parse_number(&jvalue!(""), "en"), jvalue!(0));
        assert_eq!(numeric::parse_number(&jvalue!("1,234.5"), "en"), jvalue!(1234.5));
        assert_eq!(numeric::parse_number(&jvalue!("1.234,5"), "nl-NL"), jvalue!(1234.5));
        assert_eq!(numeric::parse_number(&jvalue!("abc"), "en"), jvalue!("abc"));
        assert_eq!(numeric::parse_number(&jvalue!("nan"), "en"), jvalue!("nan"));
        assert_eq!(numeric::parse_number(&jvalue!(true), "en"), jvalue!(1));
    }

    #[test]
    fn test_maths() {
        assert_eq!(numeric::maths(&jvalue!(7), &jvalue!(2), MathOp::Mod), jvalue!(1));
        assert_eq!(numeric::maths(&jvalue!(1), &jvalue!(0), MathOp::Divide), JValue::Undefined);
        assert_eq!(numeric::maths(&jvalue!("1"), &jvalue!(2), MathOp::Add), JValue::Undefined);
    }

    #[test]
    fn test_array_functions() {
        let nested = jvalue!([1, [2, [3]], 4]);
        let items = nested.as_array().unwrap();
        assert_eq!(JValue::array(array::flatten(items, 1)), jvalue!([1, 2, [3], 4]));
        assert_eq!(JValue::array(array::flatten(items, 5)), jvalue!([1, 2, 3, 4]));
        assert_eq!(array::join(&[jvalue!("a"), jvalue!(1), jvalue!(null)], "-"), "a-1-");
        assert_eq!(JValue::array(array::range(3.7)), jvalue!([0, 1, 2]));
        assert!(array::range(-1.0).is_empty());
        assert_eq!(array::range(array::MAX_RANGE as f64).len(), array::MAX_RANGE);
        assert!(array::range(array::MAX_RANGE as f64 + 1.0).is_empty());
        assert!(array::range(1e19).is_empty());
        assert!(array::range(f64::INFINITY).is_empty());
        assert_eq!(
            JValue::array(array::omit_indices(&[jvalue!("a"), jvalue!("b"), jvalue!("c")], &[0, -1])),
            jvalue!(["b"])
        );
    }

    #[test]
    fn test_unique_and_group_by() {
        let values = [jvalue!(1), jvalue!(1), jvalue!(2), jvalue!(3)];
        assert_eq!(JValue::array(array::unique_by(&values, &values)), jvalue!([1, 2, 3]));

        let people = [
            jvalue!({"name": "a", "team": "x"}),
            jvalue!({"name": "b", "team": "y"}),
            jvalue!({"name": "c", "team": "x"}),
        ];
        assert_eq!(
            JValue::array(array::group_by(&people, "team")),
            jvalue!([
                {"key": "x", "items": [{"name": "a", "team": "x"}, {"name": "c", "team": "x"}]},
                {"key": "y", "items": [{"name": "b", "team": "y"}]}
            ])
        );
    }

    #[test]
    fn test_omit_and_explode() {
        let value = jvalue!({"a": 1, "b": {"c": 2, "d": 3}});
        let paths = vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]];
        let once = object::omit(&value, &paths);
        assert_eq!(once, jvalue!({"b": {"d": 3}}));
        assert_eq!(object::omit(&once, &paths), once);

        let owner = jvalue!({"ownerName": "John", "pets": [{"name": "Milka"}, {"name": "Rex"}]});
        assert_eq!(
            JValue::array(object::explode(&owner, "pets")),
            jvalue!([{"ownerName": "John", "name": "Milka"}, {"ownerName": "John", "name": "Rex"}])
        );
        assert!(object::explode(&jvalue!({"pets": 1}), "pets").is_empty());
    }

    #[test]
    fn test_compare_order() {
        let a = jvalue!({"name": "Alice", "age": 30, "address": {"city": "Paris"}, "gone": true});
        let b = jvalue!({"name": "Alice", "age": 31, "address": {"city": "Lyon"}, "pet": "cat"});
        assert_eq!(
            JValue::array(object::compare(&a, &b)),
            jvalue!([
                {"path": ["age"], "type": "changed", "from": 30, "to": 31},
                {"path": ["address", "city"], "type": "changed", "from": "Paris", "to": "Lyon"},
                {"path": ["gone"], "type": "removed", "value": true},
                {"path": ["pet"], "type": "added", "value": "cat"}
            ])
        );
        assert!(object::compare(&a, &a).is_empty());
    }

    #[test]
    fn test_compare_reports_changes_before_removals() {
        assert_eq!(
            JValue::array(object::compare(&jvalue!({"gone": 1, "age": 1}), &jvalue!({"age": 2}))),
            jvalue!([
                {"path": ["age"], "type": "changed", "from": 1, "to": 2},
                {"path": ["gone"], "type": "removed", "value": 1}
            ])
        );

        let a = jvalue!({"meta": {"x": 1, "old": 0}, "gone": true, "size": 1, "tags": [1]});
        let b = jvalue!({"meta": {"x": 2, "new": 0}, "size": 2, "tags": [1, 2]});
        assert_eq!(
            JValue::array(object::compare(&a, &b)),
            jvalue!([
                {"path": ["size"], "type": "changed", "from": 1, "to": 2},
                {"path": ["tags"], "type": "changed", "from": [1], "to": [1, 2]},
                {"path": ["meta", "x"], "type": "changed", "from": 1, "to": 2},
                {"path": ["meta", "old"], "type": "removed", "value": 0},
                {"path": ["meta", "new"], "type": "added", "value": 0},
                {"path": ["gone"], "type": "removed", "value": true}
            ])
        );
    }

    #[test]
    fn test_null_strip() {
        let value = jvalue!({"a": null, "b": {"c": null, "d": 1}, "e": [{"f": null}]});
        assert_eq!(object::null_strip(&value, None), jvalue!({"b": {"d": 1}, "e": [{}]}));
        assert_eq!(object::null_strip(&value, Some(1)), jvalue!({"b": {"c": null, "d": 1}, "e": [{"f": null}]}));
    }
}
