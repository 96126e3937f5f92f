// Remapper definition tree
// A definition is parsed once into this tree and evaluated many times

use regex::Regex;

use crate::datetime::{DateField, DateUnit, Duration};
use crate::odata::{Comparator, FilterType, SortDirection};
use crate::signature::OperatorKind;
use crate::utils::PathKey;
use crate::value::JValue;

/// A compiled remapper.
///
/// Immutable after parsing and `Send + Sync`, so one tree can serve any
/// number of concurrent evaluations.
#[derive(Debug, Clone)]
pub enum Remapper {
    /// Returned as-is, whatever the input.
    Literal(JValue),

    /// A single `{ operator: argument }` step.
    Step(Box<Operator>),

    /// Steps applied left to right, each receiving the previous result.
    Pipeline(Vec<Remapper>),
}

impl Remapper {
    /// A remapper that always produces `Undefined`; stands in for absent arguments.
    pub fn undefined() -> Self {
        Remapper::Literal(JValue::Undefined)
    }

    pub fn step(operator: Operator) -> Self {
        Remapper::Step(Box::new(operator))
    }
}

/// Named key/remapper pairs in declaration order (`object.from`, `object.assign`, ...).
pub type Props = Vec<(String, Remapper)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppField {
    Id,
    Locale,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Id,
    Name,
    Role,
}

/// Fields of the iteration frame pushed by array operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationField {
    Index,
    Length,
    Item,
    PrevItem,
    NextItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCase {
    Upper,
    Lower,
}

/// Argument of `string.startsWith`, `string.endsWith` and `string.contains`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affix {
    pub substring: String,
    /// Case-sensitive when true.
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct MatchCase {
    pub case: Remapper,
    pub value: Remapper,
}

/// One `pattern -> replacement` pair of `string.replace`.
#[derive(Debug, Clone)]
pub struct Replacement {
    pub pattern: Regex,
    /// Replacement in `regex` crate syntax (`${1}`), translated from JS syntax.
    pub replacement: String,
}

/// One field of `filter.from`.
#[derive(Debug, Clone)]
pub struct FilterClause {
    pub field: String,
    pub comparator: Comparator,
    pub kind: Option<FilterType>,
    pub value: Remapper,
}

/// An operator with its argument already decoded.
///
/// Arguments that could not be decoded are stored as `None` (or empty
/// lists) and make the operator produce its fallback value.
#[derive(Debug, Clone)]
pub enum Operator {
    // Lookup & scope
    Root,
    Prop(Option<Vec<PathKey>>),
    Context(Option<Vec<PathKey>>),
    History(Option<usize>),
    Variable(Option<String>),
    App(Option<AppField>),
    AppMember(Option<String>),
    Url,
    Group(Option<GroupField>),
    Page(Option<String>),
    Array(Option<IterationField>),
    Static(JValue),
    Translate(Option<String>),
    Type,
    Defined,
    Log(LogLevel),

    // Conditional & logical
    If {
        condition: Remapper,
        then: Remapper,
        otherwise: Remapper,
    },
    Match(Vec<MatchCase>),
    Equals(Vec<Remapper>),
    Not(Vec<Remapper>),
    Gt(Option<(Remapper, Remapper)>),
    Lt(Option<(Remapper, Remapper)>),
    /// True when every operand is truthy; no operands is `true`.
    And(Vec<Remapper>),
    /// True when any operand is truthy. No operands is also `true`, so an
    /// empty condition list never filters anything out.
    Or(Vec<Remapper>),

    // Array
    ArrayMap(Remapper),
    ArrayFilter(Remapper),
    ArrayFind(Remapper),
    ArrayFrom(Vec<Remapper>),
    ArrayAppend(Vec<Remapper>),
    ArrayOmit(Vec<Remapper>),
    ArrayUnique(Option<Remapper>),
    ArrayFlatten(Option<usize>),
    ArrayJoin(Option<String>),
    ArrayRange(Remapper),
    ArrayGroupBy(Option<String>),
    ArrayToObject {
        key: Remapper,
        value: Remapper,
    },
    ArrayContains(Remapper),

    // Object
    ObjectFrom(Props),
    ObjectAssign(Props),
    ObjectOmit(Vec<Vec<String>>),
    ObjectExplode(Option<String>),
    ObjectCompare(Option<(Remapper, Remapper)>),
    NullStrip(Option<usize>),
    FromHistory {
        index: Option<usize>,
        props: Props,
    },
    AssignHistory {
        index: Option<usize>,
        props: Props,
    },
    OmitHistory {
        index: Option<usize>,
        keys: Vec<Vec<String>>,
    },

    // String & number
    StringFormat {
        message_id: Option<String>,
        template: Option<String>,
        values: Option<Props>,
    },
    StringCase(Option<TextCase>),
    StringStartsWith(Option<Affix>),
    StringEndsWith(Option<Affix>),
    StringContains(Option<Affix>),
    StringReplace(Vec<Replacement>),
    Slice(Option<(i64, Option<i64>)>),
    Len,
    NumberParse(Option<Remapper>),
    Maths {
        a: Remapper,
        b: Remapper,
        operation: Option<MathOp>,
    },

    // Date
    DateNow,
    DateParse(Option<String>),
    DateFormat(Option<String>),
    DateAdd(Option<Duration>),
    DateSub(Option<Duration>),
    DateStartOf(Option<DateUnit>),
    DateEndOf(Option<DateUnit>),
    DateSet(Vec<(DateField, Remapper)>),

    // Builders
    FilterFrom(Vec<FilterClause>),
    OrderFrom(Vec<(String, SortDirection)>),
    XmlParse(Option<Remapper>),

    // Lens
    Focus {
        on: Remapper,
        body: Remapper,
    },

    /// A key that is not a registered operator; evaluates to `Undefined`.
    Unknown(String),
}

impl Operator {
    /// The registry entry of this operator, `None` for unknown keys.
    pub fn kind(&self) -> Option<OperatorKind> {
        let kind = match self {
            Operator::Root => OperatorKind::Root,
            Operator::Prop(_) => OperatorKind::Prop,
            Operator::Context(_) => OperatorKind::Context,
            Operator::History(_) => OperatorKind::History,
            Operator::Variable(_) => OperatorKind::Variable,
            Operator::App(_) => OperatorKind::App,
            Operator::AppMember(_) => OperatorKind::AppMember,
            Operator::Url => OperatorKind::Url,
            Operator::Group(_) => OperatorKind::Group,
            Operator::Page(_) => OperatorKind::Page,
            Operator::Array(_) => OperatorKind::Array,
            Operator::Static(_) => OperatorKind::Static,
            Operator::Translate(_) => OperatorKind::Translate,
            Operator::Type => OperatorKind::Type,
            Operator::Defined => OperatorKind::Defined,
            Operator::Log(_) => OperatorKind::Log,
            Operator::If { .. } => OperatorKind::If,
            Operator::Match(_) => OperatorKind::Match,
            Operator::Equals(_) => OperatorKind::Equals,
            Operator::Not(_) => OperatorKind::Not,
            Operator::Gt(_) => OperatorKind::Gt,
            Operator::Lt(_) => OperatorKind::Lt,
            Operator::And(_) => OperatorKind::And,
            Operator::Or(_) => OperatorKind::Or,
            Operator::ArrayMap(_) => OperatorKind::ArrayMap,
            Operator::ArrayFilter(_) => OperatorKind::ArrayFilter,
            Operator::ArrayFind(_) => OperatorKind::ArrayFind,
            Operator::ArrayFrom(_) => OperatorKind::ArrayFrom,
            Operator::ArrayAppend(_) => OperatorKind::ArrayAppend,
            Operator::ArrayOmit(_) => OperatorKind::ArrayOmit,
            Operator::ArrayUnique(_) => OperatorKind::ArrayUnique,
            Operator::ArrayFlatten(_) => OperatorKind::ArrayFlatten,
            Operator::ArrayJoin(_) => OperatorKind::ArrayJoin,
            Operator::ArrayRange(_) => OperatorKind::ArrayRange,
            Operator::ArrayGroupBy(_) => OperatorKind::ArrayGroupBy,
            Operator::ArrayToObject { .. } => OperatorKind::ArrayToObject,
            Operator::ArrayContains(_) => OperatorKind::ArrayContains,
            Operator::ObjectFrom(_) => OperatorKind::ObjectFrom,
            Operator::ObjectAssign(_) => OperatorKind::ObjectAssign,
            Operator::ObjectOmit(_) => OperatorKind::ObjectOmit,
            Operator::ObjectExplode(_) => OperatorKind::ObjectExplode,
            Operator::ObjectCompare(_) => OperatorKind::ObjectCompare,
            Operator::NullStrip(_) => OperatorKind::NullStrip,
            Operator::FromHistory { .. } => OperatorKind::FromHistory,
            Operator::AssignHistory { .. } => OperatorKind::AssignHistory,
            Operator::OmitHistory { .. } => OperatorKind::OmitHistory,
            Operator::StringFormat { .. } => OperatorKind::StringFormat,
            Operator::StringCase(_) => OperatorKind::StringCase,
            Operator::StringStartsWith(_) => OperatorKind::StringStartsWith,
            Operator::StringEndsWith(_) => OperatorKind::StringEndsWith,
            Operator::StringContains(_) => OperatorKind::StringContains,
            Operator::StringReplace(_) => OperatorKind::StringReplace,
            Operator::Slice(_) => OperatorKind::Slice,
            Operator::Len => OperatorKind::Len,
            Operator::NumberParse(_) => OperatorKind::NumberParse,
            Operator::Maths { .. } => OperatorKind::Maths,
            Operator::DateNow => OperatorKind::DateNow,
            Operator::DateParse(_) => OperatorKind::DateParse,
            Operator::DateFormat(_) => OperatorKind::DateFormat,
            Operator::DateAdd(_) => OperatorKind::DateAdd,
            Operator::DateSub(_) => OperatorKind::DateSub,
            Operator::DateStartOf(_) => OperatorKind::DateStartOf,
            Operator::DateEndOf(_) => OperatorKind::DateEndOf,
            Operator::DateSet(_) => OperatorKind::DateSet,
            Operator::FilterFrom(_) => OperatorKind::FilterFrom,
            Operator::OrderFrom(_) => OperatorKind::OrderFrom,
            Operator::XmlParse(_) => OperatorKind::XmlParse,
            Operator::Focus { .. } => OperatorKind::Focus,
            Operator::Unknown(_) => return None,
        };
        Some(kind)
    }
}
