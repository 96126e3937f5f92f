// OData query builders
// String construction for `filter.from` and `order.from`

use crate::datetime;
use crate::utils::number_to_string;
use crate::value::JValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn from_name(name: &str) -> Option<Comparator> {
        match name {
            "eq" => Some(Comparator::Eq),
            "ne" => Some(Comparator::Ne),
            "lt" => Some(Comparator::Lt),
            "le" => Some(Comparator::Le),
            "gt" => Some(Comparator::Gt),
            "ge" => Some(Comparator::Ge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Eq => "eq",
            Comparator::Ne => "ne",
            Comparator::Lt => "lt",
            Comparator::Le => "le",
            Comparator::Gt => "gt",
            Comparator::Ge => "ge",
        }
    }
}

/// Declared type of a filter value; decides how the literal is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    String,
    Number,
    Boolean,
    Date,
}

impl FilterType {
    pub fn from_name(name: &str) -> Option<FilterType> {
        match name {
            "String" | "string" => Some(FilterType::String),
            "Number" | "number" => Some(FilterType::Number),
            "Boolean" | "boolean" => Some(FilterType::Boolean),
            "Date" | "date" => Some(FilterType::Date),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn from_name(name: &str) -> Option<SortDirection> {
        match name {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One evaluated `field comparator value` term.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTerm<'a> {
    pub field: &'a str,
    pub comparator: Comparator,
    pub kind: Option<FilterType>,
    pub value: JValue,
}

/// Write `value` as an OData literal.
///
/// Strings and dates are single-quoted with `''` escaping, nullish values
/// are the bare keyword `null`. Without a declared type the JSON type of
/// the value decides.
pub fn literal(kind: Option<FilterType>, value: &JValue) -> String {
    if value.is_nullish() {
        return "null".to_string();
    }
    match (kind, value) {
        (Some(FilterType::Date), _) => {
            let text = match datetime::to_datetime(value) {
                Some(dt) => datetime::format_iso8601(&dt),
                None => plain(value),
            };
            quote(&text)
        }
        (Some(FilterType::String), _) | (None, JValue::String(_)) => quote(&plain(value)),
        _ => plain(value),
    }
}

fn plain(value: &JValue) -> String {
    match value {
        JValue::String(s) => s.to_string(),
        JValue::Number(n) => number_to_string(*n),
        JValue::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// `field cmp literal` terms AND-joined in the given order.
pub fn build_filter(terms: &[FilterTerm<'_>]) -> String {
    terms
        .iter()
        .map(|term| format!("{} {} {}", term.field, term.comparator.as_str(), literal(term.kind, &term.value)))
        .collect::<Vec<_>>()
        .join(" and ")
}

/// `field dir` entries comma-joined in the given order.
pub fn build_order(entries: &[(String, SortDirection)]) -> String {
    entries
        .iter()
        .map(|(field, direction)| format!("{} {}", field, direction.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvalue;

    #[test]
    fn test_literals() {
        assert_eq!(literal(None, &jvalue!("O'Brien")), "'O''Brien'");
        assert_eq!(literal(Some(FilterType::String), &jvalue!(12)), "'12'");
        assert_eq!(literal(None, &jvalue!(3.5)), "3.5");
        assert_eq!(literal(Some(FilterType::Boolean), &jvalue!(true)), "true");
        assert_eq!(literal(Some(FilterType::String), &jvalue!(null)), "null");
        assert_eq!(literal(None, &JValue::Undefined), "null");
        assert_eq!(
            literal(Some(FilterType::Date), &jvalue!("2025-01-01T00:00:00Z")),
            "'2025-01-01T00:00:00.000Z'"
        );
    }

    #[test]
    fn test_build_filter() {
        let terms = [
            FilterTerm { field: "name", comparator: Comparator::Eq, kind: None, value: jvalue!("Bob") },
            FilterTerm { field: "age", comparator: Comparator::Ge, kind: Some(FilterType::Number), value: jvalue!(18) },
        ];
        assert_eq!(build_filter(&terms), "name eq 'Bob' and age ge 18");
        assert_eq!(build_filter(&[]), "");
    }

    #[test]
    fn test_build_order() {
        let entries = vec![
            ("name".to_string(), SortDirection::Asc),
            ("$created".to_string(), SortDirection::Desc),
        ];
        assert_eq!(build_order(&entries), "name asc,$created desc");
    }

    #[test]
    fn test_comparator_names() {
        for name in ["eq", "ne", "lt", "le", "gt", "ge"] {
            assert_eq!(Comparator::from_name(name).map(Comparator::as_str), Some(name));
        }
        assert_eq!(Comparator::from_name("like"), None);
    }
}
