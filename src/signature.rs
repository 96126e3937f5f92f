// Operator registry and argument signatures
// The closed set of operator names a remapper definition may use

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::value::JValue;

/// Signature validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignatureError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Type mismatch for {operator}: expected {expected}, found {found}")]
    TypeMismatch {
        operator: &'static str,
        expected: ParamType,
        found: &'static str,
    },
}

/// Shape an operator expects its argument to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// The argument is not inspected.
    Ignored,
    /// Any value; the argument is itself a remapper.
    Remapper,
    String,
    Number,
    /// A string, or null for the operator's default.
    OptionalString,
    /// A number, or null for the operator's default.
    OptionalNumber,
    /// A property path: string, number, or a list of those.
    Path,
    List,
    Object,
    /// An object, or null for the operator's default.
    OptionalObject,
    /// A string or an object with options.
    StringOrObject,
    /// A number or a two element list of numbers.
    Range,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Ignored => "anything",
            ParamType::Remapper => "a remapper",
            ParamType::String => "a string",
            ParamType::Number => "a number",
            ParamType::OptionalString => "a string or null",
            ParamType::OptionalNumber => "a number or null",
            ParamType::Path => "a string, number or list of keys",
            ParamType::List => "a list",
            ParamType::Object => "an object",
            ParamType::OptionalObject => "an object or null",
            ParamType::StringOrObject => "a string or an object",
            ParamType::Range => "a number or [start, end]",
        };
        f.write_str(name)
    }
}

impl ParamType {
    /// Whether `value` has this shape.
    pub fn accepts(self, value: &JValue) -> bool {
        match self {
            ParamType::Ignored | ParamType::Remapper => true,
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::OptionalString => value.is_string() || value.is_nullish(),
            ParamType::OptionalNumber => value.is_number() || value.is_nullish(),
            ParamType::Path => match value {
                JValue::String(_) | JValue::Number(_) => true,
                JValue::Array(keys) => keys.iter().all(|k| k.is_string() || k.is_number()),
                _ => false,
            },
            ParamType::List => value.is_array(),
            ParamType::Object => value.is_object(),
            ParamType::OptionalObject => value.is_object() || value.is_nullish(),
            ParamType::StringOrObject => value.is_string() || value.is_object(),
            ParamType::Range => match value {
                JValue::Number(_) => true,
                JValue::Array(bounds) => bounds.len() <= 2 && bounds.iter().all(|b| b.is_number()),
                _ => false,
            },
        }
    }
}

macro_rules! operators {
    ($($variant:ident => $name:literal : $param:ident),* $(,)?) => {
        /// Every operator the evaluator knows, in registry order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OperatorKind {
            $($variant),*
        }

        impl OperatorKind {
            /// All operators, usable to validate app definitions ahead of time.
            pub const ALL: &'static [OperatorKind] = &[$(OperatorKind::$variant),*];

            /// The key used for this operator in a remapper definition.
            pub fn name(self) -> &'static str {
                match self {
                    $(OperatorKind::$variant => $name),*
                }
            }

            /// Look an operator up by its definition key.
            pub fn from_name(name: &str) -> Option<OperatorKind> {
                match name {
                    $($name => Some(OperatorKind::$variant),)*
                    _ => None,
                }
            }

            /// The argument shape this operator expects.
            pub fn param_type(self) -> ParamType {
                match self {
                    $(OperatorKind::$variant => ParamType::$param),*
                }
            }
        }
    };
}

operators! {
    // Lookup & scope
    Root => "root": Ignored,
    Prop => "prop": Path,
    Context => "context": Path,
    History => "history": Number,
    Variable => "variable": String,
    App => "app": String,
    AppMember => "app.member": OptionalString,
    Url => "url": Ignored,
    Group => "group": String,
    Page => "page": OptionalString,
    Array => "array": String,
    Static => "static": Ignored,
    Translate => "translate": String,
    Type => "type": Ignored,
    Defined => "defined": Ignored,
    Log => "log": OptionalString,

    // Conditional & logical
    If => "if": Object,
    Match => "match": List,
    Equals => "equals": List,
    Not => "not": List,
    Gt => "gt": List,
    Lt => "lt": List,
    And => "and": List,
    Or => "or": List,

    // Array
    ArrayMap => "array.map": Remapper,
    ArrayFilter => "array.filter": Remapper,
    ArrayFind => "array.find": Remapper,
    ArrayFrom => "array.from": List,
    ArrayAppend => "array.append": List,
    ArrayOmit => "array.omit": List,
    ArrayUnique => "array.unique": Remapper,
    ArrayFlatten => "array.flatten": OptionalNumber,
    ArrayJoin => "array.join": OptionalString,
    ArrayRange => "array.range": Remapper,
    ArrayGroupBy => "array.groupBy": String,
    ArrayToObject => "array.toObject": Object,
    ArrayContains => "array.contains": Remapper,

    // Object
    ObjectFrom => "object.from": Object,
    ObjectAssign => "object.assign": Object,
    ObjectOmit => "object.omit": List,
    ObjectExplode => "object.explode": String,
    ObjectCompare => "object.compare": List,
    NullStrip => "null.strip": OptionalObject,
    FromHistory => "from.history": Object,
    AssignHistory => "assign.history": Object,
    OmitHistory => "omit.history": Object,

    // String & number
    StringFormat => "string.format": Object,
    StringCase => "string.case": String,
    StringStartsWith => "string.startsWith": StringOrObject,
    StringEndsWith => "string.endsWith": StringOrObject,
    StringContains => "string.contains": StringOrObject,
    StringReplace => "string.replace": Object,
    Slice => "slice": Range,
    Len => "len": Ignored,
    NumberParse => "number.parse": Remapper,
    Maths => "maths": Object,

    // Date
    DateNow => "date.now": Ignored,
    DateParse => "date.parse": OptionalString,
    DateFormat => "date.format": OptionalString,
    DateAdd => "date.add": String,
    DateSub => "date.sub": String,
    DateStartOf => "date.startOf": String,
    DateEndOf => "date.endOf": String,
    DateSet => "date.set": Object,

    // Builders
    FilterFrom => "filter.from": Object,
    OrderFrom => "order.from": Object,
    XmlParse => "xml.parse": Remapper,

    // Lens
    Focus => "focus": Object,
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperatorKind {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperatorKind::from_name(s).ok_or_else(|| SignatureError::UnknownOperator(s.to_string()))
    }
}

/// Check an operator argument against the registered signature.
pub fn check(kind: OperatorKind, arg: &JValue) -> Result<(), SignatureError> {
    let expected = kind.param_type();
    if expected.accepts(arg) {
        Ok(())
    } else {
        Err(SignatureError::TypeMismatch {
            operator: kind.name(),
            expected,
            found: arg.type_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvalue;

    #[test]
    fn test_registry_names_round_trip() {
        for kind in OperatorKind::ALL {
            assert_eq!(OperatorKind::from_name(kind.name()), Some(*kind));
        }
        assert!(OperatorKind::ALL.len() > 60);
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(OperatorKind::from_name("array.sortBy"), None);
        assert_eq!(
            "array.sortBy".parse::<OperatorKind>(),
            Err(SignatureError::UnknownOperator("array.sortBy".to_string()))
        );
    }

    #[test]
    fn test_signature_validation() {
        // Valid shapes
        assert!(check(OperatorKind::Prop, &jvalue!("a.b")).is_ok());
        assert!(check(OperatorKind::Prop, &jvalue!(["a", 0])).is_ok());
        assert!(check(OperatorKind::Slice, &jvalue!([1, 3])).is_ok());
        assert!(check(OperatorKind::ArrayJoin, &jvalue!(null)).is_ok());

        // Invalid shapes
        assert!(check(OperatorKind::If, &jvalue!("yes")).is_err());
        assert!(check(OperatorKind::Prop, &jvalue!({"a": 1})).is_err());
        assert_eq!(
            check(OperatorKind::History, &jvalue!("0")),
            Err(SignatureError::TypeMismatch {
                operator: "history",
                expected: ParamType::Number,
                found: "string",
            })
        );
    }
}
