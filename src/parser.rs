// Remapper definition parser
// Turns a JSON remapper definition into a `Remapper` tree, once, ahead of evaluation

use regex::RegexBuilder;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ast::{
    Affix, AppField, FilterClause, GroupField, IterationField, LogLevel, MatchCase, MathOp, Operator, Props,
    Remapper, Replacement, TextCase,
};
use crate::datetime::{DateField, DateUnit, Duration};
use crate::functions::string::translate_replacement;
use crate::odata::{Comparator, FilterType, SortDirection};
use crate::signature::{self, OperatorKind, SignatureError};
use crate::utils::{split_path, PathKey};
use crate::value::JValue;

/// Definitions nested deeper than this many path segments are cut off.
const MAX_NESTING: usize = 1024;

/// Problems found while parsing a definition.
///
/// The lenient parser records these and carries on with a fallback; strict
/// parsing and [`validate`] return them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseIssue {
    #[error("{path}: unknown operator '{name}'")]
    UnknownOperator { path: String, name: String },

    #[error("{path}: {source}")]
    Signature { path: String, source: SignatureError },

    #[error("{path}: invalid regular expression '{pattern}': {message}")]
    InvalidRegex {
        path: String,
        pattern: String,
        message: String,
    },

    #[error("{path}: {message}")]
    InvalidArgument { path: String, message: String },

    #[error("{path}: definition nested too deeply")]
    TooDeep { path: String },
}

/// Recursive-descent parser over a definition value.
#[derive(Debug, Default)]
pub struct Parser {
    path: Vec<String>,
    issues: Vec<ParseIssue>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues collected so far.
    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<ParseIssue> {
        self.issues
    }

    /// Parse `definition`. Never fails; problems are recorded as issues.
    pub fn parse(&mut self, definition: &JValue) -> Remapper {
        if self.path.len() > MAX_NESTING {
            let path = self.location();
            warn!(%path, "remapper definition nested too deeply");
            self.issues.push(ParseIssue::TooDeep { path });
            return Remapper::undefined();
        }

        match definition {
            JValue::Array(steps) => Remapper::Pipeline(
                steps
                    .iter()
                    .enumerate()
                    .map(|(i, step)| self.nested(i.to_string(), step))
                    .collect(),
            ),
            JValue::Object(map) if map.len() == 1 => match map.first() {
                Some((key, arg)) => {
                    self.path.push(key.clone());
                    let step = self.step(key, arg);
                    self.path.pop();
                    Remapper::step(step)
                }
                None => Remapper::Literal(definition.clone()),
            },
            other => Remapper::Literal(other.clone()),
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn location(&self) -> String {
        format!("/{}", self.path.join("/"))
    }

    fn invalid(&mut self, message: impl Into<String>) {
        let path = self.location();
        let message = message.into();
        warn!(%path, %message, "malformed remapper argument");
        self.issues.push(ParseIssue::InvalidArgument { path, message });
    }

    fn nested(&mut self, segment: impl Into<String>, definition: &JValue) -> Remapper {
        self.path.push(segment.into());
        let remapper = self.parse(definition);
        self.path.pop();
        remapper
    }

    /// Parse the remapper stored under `name` in an argument object; absent fields are `Undefined`.
    fn field(&mut self, arg: &JValue, name: &str) -> Remapper {
        match arg.get(name) {
            Some(value) => self.nested(name, value),
            None => Remapper::undefined(),
        }
    }

    fn list(&mut self, arg: &JValue) -> Vec<Remapper> {
        match arg.as_array() {
            Some(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.nested(i.to_string(), item))
                .collect(),
            None => Vec::new(),
        }
    }

    fn pair(&mut self, arg: &JValue) -> Option<(Remapper, Remapper)> {
        match arg.as_array().map(|items| items.as_slice()) {
            Some([a, b]) => Some((self.nested("0", a), self.nested("1", b))),
            _ => {
                self.invalid("expected exactly two operands");
                None
            }
        }
    }

    fn props(&mut self, arg: Option<&JValue>) -> Props {
        match arg.and_then(JValue::as_object) {
            Some(map) => map
                .iter()
                .map(|(key, value)| (key.clone(), self.nested(key.clone(), value)))
                .collect(),
            None => Vec::new(),
        }
    }

    fn optional(&mut self, arg: &JValue) -> Option<Remapper> {
        if arg.is_nullish() {
            None
        } else {
            Some(self.parse(arg))
        }
    }

    /// Decode a keyword argument; unknown keywords are reported and yield `None`.
    fn choice<T>(&mut self, arg: &JValue, what: &str, lookup: impl Fn(&str) -> Option<T>) -> Option<T> {
        let name = arg.as_str()?;
        let found = lookup(name);
        if found.is_none() {
            self.invalid(format!("unknown {} '{}'", what, name));
        }
        found
    }

    fn index(arg: Option<&JValue>) -> Option<usize> {
        arg.and_then(JValue::as_i64).and_then(|i| usize::try_from(i).ok())
    }

    fn text(arg: &JValue) -> Option<String> {
        arg.as_str().map(str::to_string)
    }

    fn key_paths(&mut self, arg: Option<&JValue>) -> Vec<Vec<String>> {
        let entries = match arg {
            Some(JValue::String(key)) => return vec![vec![key.to_string()]],
            Some(JValue::Array(entries)) => entries,
            _ => return Vec::new(),
        };
        let mut paths = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            match entry {
                JValue::String(key) => paths.push(vec![key.to_string()]),
                JValue::Array(steps) if steps.iter().all(JValue::is_string) => {
                    paths.push(steps.iter().filter_map(Self::text).collect());
                }
                other => self.invalid(format!("cannot omit key of type {}", other.type_name())),
            }
        }
        paths
    }

    // ── Operators ────────────────────────────────────────────────────────────

    fn step(&mut self, name: &str, arg: &JValue) -> Operator {
        let Some(kind) = OperatorKind::from_name(name) else {
            let path = self.location();
            debug!(operator = name, %path, "unknown remapper operator");
            self.issues.push(ParseIssue::UnknownOperator {
                path,
                name: name.to_string(),
            });
            return Operator::Unknown(name.to_string());
        };

        if let Err(source) = signature::check(kind, arg) {
            let path = self.location();
            warn!(%path, error = %source, "malformed remapper argument");
            self.issues.push(ParseIssue::Signature { path, source });
        }

        self.operator(kind, arg)
    }

    fn operator(&mut self, kind: OperatorKind, arg: &JValue) -> Operator {
        match kind {
            OperatorKind::Root => Operator::Root,
            OperatorKind::Prop => Operator::Prop(path_keys(arg)),
            OperatorKind::Context => Operator::Context(path_keys(arg)),
            OperatorKind::History => Operator::History(Self::index(Some(arg))),
            OperatorKind::Variable => Operator::Variable(Self::text(arg)),
            OperatorKind::App => Operator::App(self.choice(arg, "app field", |name| match name {
                "id" => Some(AppField::Id),
                "locale" => Some(AppField::Locale),
                "url" => Some(AppField::Url),
                _ => None,
            })),
            OperatorKind::AppMember => Operator::AppMember(Self::text(arg)),
            OperatorKind::Url => Operator::Url,
            OperatorKind::Group => Operator::Group(self.choice(arg, "group field", |name| match name {
                "id" => Some(GroupField::Id),
                "name" => Some(GroupField::Name),
                "role" => Some(GroupField::Role),
                _ => None,
            })),
            OperatorKind::Page => Operator::Page(Self::text(arg)),
            OperatorKind::Array => Operator::Array(self.choice(arg, "iteration field", |name| match name {
                "index" => Some(IterationField::Index),
                "length" => Some(IterationField::Length),
                "item" => Some(IterationField::Item),
                "prevItem" => Some(IterationField::PrevItem),
                "nextItem" => Some(IterationField::NextItem),
                _ => None,
            })),
            OperatorKind::Static => Operator::Static(arg.clone()),
            OperatorKind::Translate => Operator::Translate(Self::text(arg)),
            OperatorKind::Type => Operator::Type,
            OperatorKind::Defined => Operator::Defined,
            OperatorKind::Log => Operator::Log(
                self.choice(arg, "log level", |name| match name {
                    "debug" => Some(LogLevel::Debug),
                    "info" => Some(LogLevel::Info),
                    "warn" => Some(LogLevel::Warn),
                    "error" => Some(LogLevel::Error),
                    _ => None,
                })
                .unwrap_or(LogLevel::Info),
            ),

            OperatorKind::If => Operator::If {
                condition: self.field(arg, "condition"),
                then: self.field(arg, "then"),
                otherwise: self.field(arg, "else"),
            },
            OperatorKind::Match => {
                let mut cases = Vec::new();
                for (i, entry) in arg.as_array().into_iter().flatten().enumerate() {
                    self.path.push(i.to_string());
                    if entry.is_object() {
                        cases.push(MatchCase {
                            case: self.field(entry, "case"),
                            value: self.field(entry, "value"),
                        });
                    } else {
                        self.invalid("match entries must be objects with case and value");
                    }
                    self.path.pop();
                }
                Operator::Match(cases)
            }
            OperatorKind::Equals => Operator::Equals(self.list(arg)),
            OperatorKind::Not => Operator::Not(self.list(arg)),
            OperatorKind::Gt => Operator::Gt(self.pair(arg)),
            OperatorKind::Lt => Operator::Lt(self.pair(arg)),
            OperatorKind::And => Operator::And(self.list(arg)),
            OperatorKind::Or => Operator::Or(self.list(arg)),

            OperatorKind::ArrayMap => Operator::ArrayMap(self.parse(arg)),
            OperatorKind::ArrayFilter => Operator::ArrayFilter(self.parse(arg)),
            OperatorKind::ArrayFind => Operator::ArrayFind(self.parse(arg)),
            OperatorKind::ArrayFrom => Operator::ArrayFrom(self.list(arg)),
            OperatorKind::ArrayAppend => Operator::ArrayAppend(self.list(arg)),
            OperatorKind::ArrayOmit => Operator::ArrayOmit(self.list(arg)),
            OperatorKind::ArrayUnique => Operator::ArrayUnique(self.optional(arg)),
            OperatorKind::ArrayFlatten => Operator::ArrayFlatten(Self::index(Some(arg))),
            OperatorKind::ArrayJoin => Operator::ArrayJoin(Self::text(arg)),
            OperatorKind::ArrayRange => Operator::ArrayRange(self.parse(arg)),
            OperatorKind::ArrayGroupBy => Operator::ArrayGroupBy(Self::text(arg)),
            OperatorKind::ArrayToObject => Operator::ArrayToObject {
                key: self.field(arg, "key"),
                value: self.field(arg, "value"),
            },
            OperatorKind::ArrayContains => Operator::ArrayContains(self.parse(arg)),

            OperatorKind::ObjectFrom => Operator::ObjectFrom(self.props(Some(arg))),
            OperatorKind::ObjectAssign => Operator::ObjectAssign(self.props(Some(arg))),
            OperatorKind::ObjectOmit => Operator::ObjectOmit(self.key_paths(Some(arg))),
            OperatorKind::ObjectExplode => Operator::ObjectExplode(Self::text(arg)),
            OperatorKind::ObjectCompare => Operator::ObjectCompare(self.pair(arg)),
            OperatorKind::NullStrip => Operator::NullStrip(Self::index(arg.get("depth"))),
            OperatorKind::FromHistory => Operator::FromHistory {
                index: Self::index(arg.get("index")),
                props: self.props(arg.get("props")),
            },
            OperatorKind::AssignHistory => Operator::AssignHistory {
                index: Self::index(arg.get("index")),
                props: self.props(arg.get("props")),
            },
            OperatorKind::OmitHistory => Operator::OmitHistory {
                index: Self::index(arg.get("index")),
                keys: self.key_paths(arg.get("keys")),
            },

            OperatorKind::StringFormat => Operator::StringFormat {
                message_id: arg.get("messageId").and_then(Self::text),
                template: arg.get("template").and_then(Self::text),
                values: arg
                    .get("values")
                    .filter(|values| values.is_object())
                    .map(|values| self.props(Some(values))),
            },
            OperatorKind::StringCase => Operator::StringCase(self.choice(arg, "case", |name| match name {
                "upper" => Some(TextCase::Upper),
                "lower" => Some(TextCase::Lower),
                _ => None,
            })),
            OperatorKind::StringStartsWith => Operator::StringStartsWith(self.affix(arg)),
            OperatorKind::StringEndsWith => Operator::StringEndsWith(self.affix(arg)),
            OperatorKind::StringContains => Operator::StringContains(self.affix(arg)),
            OperatorKind::StringReplace => Operator::StringReplace(self.replacements(arg)),
            OperatorKind::Slice => Operator::Slice(match arg {
                JValue::Number(_) => arg.as_i64().map(|start| (start, None)),
                JValue::Array(bounds) => match bounds.as_slice() {
                    [start] => start.as_i64().map(|start| (start, None)),
                    [start, end] => start.as_i64().zip(end.as_i64()).map(|(s, e)| (s, Some(e))),
                    _ => None,
                },
                _ => None,
            }),
            OperatorKind::Len => Operator::Len,
            OperatorKind::NumberParse => Operator::NumberParse(self.optional(arg)),
            OperatorKind::Maths => Operator::Maths {
                a: self.field(arg, "a"),
                b: self.field(arg, "b"),
                operation: match arg.get("operation") {
                    Some(op) => self.choice(op, "maths operation", |name| match name {
                        "add" => Some(MathOp::Add),
                        "subtract" => Some(MathOp::Subtract),
                        "multiply" => Some(MathOp::Multiply),
                        "divide" => Some(MathOp::Divide),
                        "mod" => Some(MathOp::Mod),
                        _ => None,
                    }),
                    None => None,
                },
            },

            OperatorKind::DateNow => Operator::DateNow,
            OperatorKind::DateParse => Operator::DateParse(Self::text(arg)),
            OperatorKind::DateFormat => Operator::DateFormat(Self::text(arg)),
            OperatorKind::DateAdd => Operator::DateAdd(self.duration(arg)),
            OperatorKind::DateSub => Operator::DateSub(self.duration(arg)),
            OperatorKind::DateStartOf => Operator::DateStartOf(self.choice(arg, "date unit", DateUnit::from_name)),
            OperatorKind::DateEndOf => Operator::DateEndOf(self.choice(arg, "date unit", DateUnit::from_name)),
            OperatorKind::DateSet => {
                let mut fields = Vec::new();
                for (name, value) in arg.as_object().into_iter().flatten() {
                    match DateField::from_name(name) {
                        Some(field) => fields.push((field, self.nested(name.clone(), value))),
                        None => self.invalid(format!("unknown date field '{}'", name)),
                    }
                }
                Operator::DateSet(fields)
            }

            OperatorKind::FilterFrom => Operator::FilterFrom(self.filter_clauses(arg)),
            OperatorKind::OrderFrom => {
                let mut entries = Vec::new();
                for (field, direction) in arg.as_object().into_iter().flatten() {
                    self.path.push(field.clone());
                    let direction = if direction.is_string() {
                        self.choice(direction, "sort direction", SortDirection::from_name)
                    } else {
                        self.invalid("sort direction must be a string");
                        None
                    };
                    self.path.pop();
                    if let Some(direction) = direction {
                        entries.push((field.clone(), direction));
                    }
                }
                Operator::OrderFrom(entries)
            }
            OperatorKind::XmlParse => Operator::XmlParse(self.optional(arg)),

            OperatorKind::Focus => Operator::Focus {
                on: self.field(arg, "on"),
                body: self.field(arg, "do"),
            },
        }
    }

    fn affix(&mut self, arg: &JValue) -> Option<Affix> {
        match arg {
            JValue::String(s) => Some(Affix {
                substring: s.to_string(),
                strict: true,
            }),
            JValue::Object(options) => match options.get("substring").and_then(JValue::as_str) {
                Some(substring) => Some(Affix {
                    substring: substring.to_string(),
                    strict: options.get("strict").and_then(JValue::as_bool).unwrap_or(true),
                }),
                None => {
                    self.invalid("missing substring");
                    None
                }
            },
            _ => None,
        }
    }

    fn replacements(&mut self, arg: &JValue) -> Vec<Replacement> {
        let mut replacements = Vec::new();
        for (pattern, replacement) in arg.as_object().into_iter().flatten() {
            self.path.push(pattern.clone());
            let Some(replacement) = replacement.as_str() else {
                self.invalid("replacement must be a string");
                self.path.pop();
                continue;
            };
            match RegexBuilder::new(pattern).multi_line(true).build() {
                Ok(regex) => replacements.push(Replacement {
                    pattern: regex,
                    replacement: translate_replacement(replacement),
                }),
                Err(err) => {
                    let path = self.location();
                    warn!(%path, %pattern, "invalid regular expression in string.replace");
                    self.issues.push(ParseIssue::InvalidRegex {
                        path,
                        pattern: pattern.clone(),
                        message: err.to_string(),
                    });
                }
            }
            self.path.pop();
        }
        replacements
    }

    fn duration(&mut self, arg: &JValue) -> Option<Duration> {
        let text = arg.as_str()?;
        match Duration::parse(text) {
            Ok(duration) => Some(duration),
            Err(err) => {
                self.invalid(err.to_string());
                None
            }
        }
    }

    fn filter_clauses(&mut self, arg: &JValue) -> Vec<FilterClause> {
        let mut clauses = Vec::new();
        for (field, entry) in arg.as_object().into_iter().flatten() {
            self.path.push(field.clone());
            if !entry.is_object() {
                self.invalid("filter fields must be objects with type, comparator and value");
                self.path.pop();
                continue;
            }
            let comparator = entry
                .get("comparator")
                .and_then(JValue::as_str)
                .map_or(Some(Comparator::Eq), Comparator::from_name);
            match comparator {
                Some(comparator) => {
                    let kind = entry.get("type").and_then(|t| self.choice(t, "filter type", FilterType::from_name));
                    clauses.push(FilterClause {
                        field: field.clone(),
                        comparator,
                        kind,
                        value: self.field(entry, "value"),
                    });
                }
                None => debug!(field = field.as_str(), "skipping filter field with unsupported comparator"),
            }
            self.path.pop();
        }
        clauses
    }
}

fn path_keys(arg: &JValue) -> Option<Vec<PathKey>> {
    match arg {
        JValue::String(path) => Some(split_path(path)),
        JValue::Number(_) => PathKey::from_value(arg).map(|key| vec![key]),
        JValue::Array(keys) => keys.iter().map(PathKey::from_value).collect(),
        _ => None,
    }
}

/// Parse a definition leniently: malformed pieces degrade to their fallback.
pub fn parse(definition: &JValue) -> Remapper {
    Parser::new().parse(definition)
}

/// Parse a definition, failing on any unknown operator or malformed argument.
pub fn parse_strict(definition: &JValue) -> Result<Remapper, Vec<ParseIssue>> {
    let mut parser = Parser::new();
    let remapper = parser.parse(definition);
    if parser.issues.is_empty() {
        Ok(remapper)
    } else {
        Err(parser.into_issues())
    }
}

/// Check a definition against the operator registry without keeping the tree.
pub fn validate(definition: &JValue) -> Result<(), Vec<ParseIssue>> {
    parse_strict(definition).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvalue;

    #[test]
    fn test_literals_and_pipelines() {
        assert!(matches!(parse(&jvalue!(42)), Remapper::Literal(JValue::Number(n)) if n == 42.0));
        assert!(matches!(parse(&jvalue!({})), Remapper::Literal(_)));
        assert!(matches!(parse(&jvalue!({"a": 1, "b": 2})), Remapper::Literal(_)));
        match parse(&jvalue!([{"prop": "a"}, {"string.case": "upper"}])) {
            Remapper::Pipeline(steps) => assert_eq!(steps.len(), 2),
            other => panic!("expected pipeline, got {:?}", other),
        }
    }

    #[test]
    fn test_step_arguments_are_decoded() {
        match parse(&jvalue!({"prop": ["a", 0]})) {
            Remapper::Step(op) => match *op {
                Operator::Prop(Some(keys)) => {
                    assert_eq!(keys, vec![PathKey::Name("a".into()), PathKey::Index(0)])
                }
                other => panic!("unexpected operator {:?}", other),
            },
            other => panic!("expected step, got {:?}", other),
        }

        match parse(&jvalue!({"date.add": "1w 2d"})) {
            Remapper::Step(op) => assert!(matches!(*op, Operator::DateAdd(Some(_)))),
            other => panic!("expected step, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_operator_is_lenient() {
        let mut parser = Parser::new();
        let remapper = parser.parse(&jvalue!({"array.mapp": {"prop": "x"}}));
        assert!(matches!(remapper, Remapper::Step(ref op) if matches!(**op, Operator::Unknown(ref n) if n == "array.mapp")));
        assert_eq!(
            parser.issues(),
            &[ParseIssue::UnknownOperator {
                path: "/array.mapp".to_string(),
                name: "array.mapp".to_string()
            }]
        );
    }

    #[test]
    fn test_strict_reports_paths() {
        let issues = validate(&jvalue!([{"object.from": {"n": {"gt": [1]}}}])).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].to_string(), "/0/object.from/n/gt: expected exactly two operands");

        let issues = validate(&jvalue!({"string.case": 3})).unwrap_err();
        assert!(matches!(&issues[0], ParseIssue::Signature { path, .. } if path == "/string.case"));

        assert!(validate(&jvalue!({"array.map": {"object.from": {"x": {"array": "index"}}}})).is_ok());
    }

    #[test]
    fn test_invalid_regex_is_skipped() {
        let mut parser = Parser::new();
        let remapper = parser.parse(&jvalue!({"string.replace": {"(": "x", "a+": "b"}}));
        match remapper {
            Remapper::Step(op) => match *op {
                Operator::StringReplace(replacements) => assert_eq!(replacements.len(), 1),
                other => panic!("unexpected operator {:?}", other),
            },
            other => panic!("expected step, got {:?}", other),
        }
        assert!(matches!(parser.issues(), [ParseIssue::InvalidRegex { pattern, .. }] if pattern == "("));
    }

    #[test]
    fn test_filter_and_order_clauses() {
        let remapper = parse(&jvalue!({"filter.from": {
            "name": {"type": "String", "comparator": "eq", "value": "x"},
            "age": {"comparator": "like", "value": 1}
        }}));
        match remapper {
            Remapper::Step(op) => match *op {
                Operator::FilterFrom(clauses) => {
                    assert_eq!(clauses.len(), 1);
                    assert_eq!(clauses[0].field, "name");
                    assert_eq!(clauses[0].kind, Some(FilterType::String));
                }
                other => panic!("unexpected operator {:?}", other),
            },
            other => panic!("expected step, got {:?}", other),
        }

        let issues = validate(&jvalue!({"order.from": {"a": "asc", "b": "sideways"}})).unwrap_err();
        assert_eq!(issues.len(), 1);
    }
}
