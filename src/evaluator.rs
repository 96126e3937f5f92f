// Remapper evaluator
// Tree-walking dispatcher over compiled remappers

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::ast::{
    Affix, AppField, GroupField, IterationField, LogLevel, MatchCase, Operator, Props, Remapper,
};
use crate::context::EvaluationContext;
use crate::datetime;
use crate::functions::{array, numeric, object, string};
use crate::messages::{MessageDescriptor, MessageTemplate};
use crate::odata::{self, FilterTerm};
use crate::parser::{self, ParseIssue};
use crate::signature::OperatorKind;
use crate::utils::{compare, get_path, is_truthy, to_display_string};
use crate::value::{JValue, Map};
use crate::xml;

/// Errors surfaced to the caller.
///
/// Data-shape problems never produce these; they degrade to fallback
/// values instead. Only misuse of the engine does.
#[derive(Error, Debug)]
pub enum RemapError {
    #[error("No {0} resolver configured in the evaluation context")]
    MissingResolver(&'static str),

    #[error("Maximum remapper depth ({0}) exceeded")]
    DepthExceeded(usize),

    #[error("Invalid remapper definition: {0}")]
    InvalidDefinition(String),

    #[error("Remapper definition failed validation: {}", join_issues(.0))]
    Validation(Vec<ParseIssue>),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn join_issues(issues: &[ParseIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Evaluator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluatorOptions {
    /// Deepest allowed chain of nested operator evaluations.
    pub max_depth: usize,
    /// Reject definitions with unknown operators or malformed arguments at compile time.
    pub strict_validation: bool,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        EvaluatorOptions {
            max_depth: 256,
            strict_validation: false,
        }
    }
}

// ── Scope ────────────────────────────────────────────────────────────────────

struct Frame {
    value: JValue,
    next: History,
}

/// Persistent stack of ancestor roots, most recent first.
///
/// Pushing shares the tail, so sibling scopes never see each other's entries.
#[derive(Clone, Default)]
struct History(Option<Arc<Frame>>);

impl History {
    fn seeded(values: &[JValue]) -> History {
        values.iter().rev().fold(History::default(), |history, value| history.push(value.clone()))
    }

    fn push(&self, value: JValue) -> History {
        History(Some(Arc::new(Frame {
            value,
            next: self.clone(),
        })))
    }

    fn get(&self, index: usize) -> Option<&JValue> {
        let mut frame = self.0.as_deref()?;
        for _ in 0..index {
            frame = frame.next.0.as_deref()?;
        }
        Some(&frame.value)
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        let mut frame = self.0.as_deref();
        while let Some(current) = frame {
            list.entry(&current.value);
            frame = current.next.0.as_deref();
        }
        list.finish()
    }
}

/// Position of the element being processed by an array operator.
#[derive(Debug, Clone)]
struct Iteration {
    items: Arc<Vec<JValue>>,
    index: usize,
}

impl Iteration {
    fn field(&self, field: IterationField) -> JValue {
        match field {
            IterationField::Index => JValue::from(self.index),
            IterationField::Length => JValue::from(self.items.len()),
            IterationField::Item => self.items.get(self.index).cloned().unwrap_or_default(),
            IterationField::PrevItem => self
                .index
                .checked_sub(1)
                .and_then(|i| self.items.get(i))
                .cloned()
                .unwrap_or_default(),
            IterationField::NextItem => self.items.get(self.index + 1).cloned().unwrap_or_default(),
        }
    }
}

/// Everything an operator sees besides its input.
#[derive(Debug, Clone)]
struct Scope<'a> {
    ctx: &'a EvaluationContext,
    root: JValue,
    history: History,
    iteration: Option<Iteration>,
    depth: usize,
}

impl<'a> Scope<'a> {
    /// A nested scope rooted at `value`. The enclosing root becomes `history 0`.
    fn enter(&self, value: &JValue) -> Scope<'a> {
        Scope {
            ctx: self.ctx,
            root: value.clone(),
            history: self.history.push(self.root.clone()),
            iteration: self.iteration.clone(),
            depth: self.depth,
        }
    }

    /// The scope for element `index` of `items`.
    fn element(&self, items: &Arc<Vec<JValue>>, index: usize) -> Scope<'a> {
        let mut scope = self.enter(&items[index]);
        scope.iteration = Some(Iteration {
            items: Arc::clone(items),
            index,
        });
        scope
    }
}

// ── Evaluator ────────────────────────────────────────────────────────────────

/// Evaluates compiled remappers.
///
/// Holds configuration only, so one instance can be shared by all threads.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    options: EvaluatorOptions,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EvaluatorOptions) -> Self {
        Evaluator { options }
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    /// Parse a definition, honouring `strict_validation`.
    pub fn compile(&self, definition: &JValue) -> Result<Remapper, RemapError> {
        if self.options.strict_validation {
            parser::parse_strict(definition).map_err(RemapError::Validation)
        } else {
            Ok(parser::parse(definition))
        }
    }

    /// Parse a definition from JSON text.
    pub fn compile_str(&self, definition: &str) -> Result<Remapper, RemapError> {
        let definition =
            JValue::from_json_str(definition).map_err(|e| RemapError::InvalidDefinition(e.to_string()))?;
        self.compile(&definition)
    }

    /// Evaluate `remapper` against `input`.
    pub fn evaluate(&self, remapper: &Remapper, input: &JValue, ctx: &EvaluationContext) -> Result<JValue, RemapError> {
        let scope = Scope {
            ctx,
            root: input.clone(),
            history: History::seeded(ctx.history()),
            iteration: None,
            depth: 0,
        };
        self.eval(remapper, input, &scope)
    }

    /// Compile and evaluate a definition in one go.
    pub fn evaluate_definition(
        &self,
        definition: &JValue,
        input: &JValue,
        ctx: &EvaluationContext,
    ) -> Result<JValue, RemapError> {
        let remapper = self.compile(definition)?;
        self.evaluate(&remapper, input, ctx)
    }

    fn eval(&self, remapper: &Remapper, input: &JValue, scope: &Scope<'_>) -> Result<JValue, RemapError> {
        match remapper {
            Remapper::Literal(value) => Ok(value.clone()),
            Remapper::Pipeline(steps) => {
                let mut current = input.clone();
                for step in steps {
                    current = self.eval(step, &current, scope)?;
                }
                Ok(current)
            }
            Remapper::Step(op) => {
                if scope.depth >= self.options.max_depth {
                    return Err(RemapError::DepthExceeded(self.options.max_depth));
                }
                let mut inner = scope.clone();
                inner.depth += 1;
                trace!(
                    operator = op.kind().map_or("unknown", OperatorKind::name),
                    depth = inner.depth,
                    "remapper step"
                );
                self.apply(op, input, &inner)
            }
        }
    }

    fn eval_all(&self, remappers: &[Remapper], input: &JValue, scope: &Scope<'_>) -> Result<Vec<JValue>, RemapError> {
        remappers.iter().map(|r| self.eval(r, input, scope)).collect()
    }

    fn eval_props(&self, props: &Props, input: &JValue, scope: &Scope<'_>) -> Result<Map, RemapError> {
        let mut map = Map::with_capacity(props.len());
        for (key, remapper) in props {
            map.insert(key.clone(), self.eval(remapper, input, scope)?);
        }
        Ok(map)
    }

    /// Evaluate `body` once per element, each in its own element scope.
    fn per_element(
        &self,
        items: &Arc<Vec<JValue>>,
        body: &Remapper,
        scope: &Scope<'_>,
    ) -> Result<Vec<JValue>, RemapError> {
        (0..items.len())
            .map(|i| self.eval(body, &items[i], &scope.element(items, i)))
            .collect()
    }

    fn apply(&self, op: &Operator, input: &JValue, scope: &Scope<'_>) -> Result<JValue, RemapError> {
        let ctx = scope.ctx;
        let value = match op {
            // ── Lookup & scope ──
            Operator::Root => scope.root.clone(),
            Operator::Prop(path) => path.as_ref().map_or(JValue::Undefined, |p| get_path(input, p)),
            Operator::Context(path) => path.as_ref().map_or(JValue::Undefined, |p| get_path(ctx.context(), p)),
            Operator::History(index) => index
                .and_then(|i| scope.history.get(i))
                .cloned()
                .unwrap_or_default(),
            Operator::Variable(name) => match name {
                Some(name) => ctx.variable(name)?,
                None => JValue::Undefined,
            },
            Operator::App(field) => match field {
                Some(AppField::Id) => JValue::from(ctx.app_id()),
                Some(AppField::Locale) => JValue::from(ctx.locale()),
                Some(AppField::Url) => JValue::from(ctx.app_url()),
                None => JValue::Undefined,
            },
            Operator::AppMember(field) => match field {
                Some(field) => ctx.app_member_info().property(field),
                None => ctx.app_member_info().clone(),
            },
            Operator::Url => JValue::from(ctx.url()),
            Operator::Group(field) => match field {
                Some(GroupField::Id) => ctx.group().property("id"),
                Some(GroupField::Name) => ctx.group().property("name"),
                Some(GroupField::Role) => ctx.group().property("role"),
                None => JValue::Undefined,
            },
            Operator::Page(field) => match field.as_deref() {
                None | Some("data") => ctx.page_data().clone(),
                Some(field) => ctx.page_data().property(field),
            },
            Operator::Array(field) => match (field, &scope.iteration) {
                (Some(field), Some(iteration)) => iteration.field(*field),
                _ => JValue::Undefined,
            },
            Operator::Static(value) => value.clone(),
            Operator::Translate(id) => match id {
                Some(id) => ctx
                    .message(&MessageDescriptor { id, default_message: None })?
                    .format(&JValue::Undefined)
                    .into(),
                None => JValue::Undefined,
            },
            Operator::Type => JValue::from(input.type_name()),
            Operator::Defined => JValue::Bool(!input.is_nullish()),
            Operator::Log(level) => {
                log_value(*level, input, scope);
                input.clone()
            }

            // ── Conditional & logical ──
            Operator::If {
                condition,
                then,
                otherwise,
            } => {
                let branch = if is_truthy(&self.eval(condition, input, scope)?) {
                    then
                } else {
                    otherwise
                };
                self.eval(branch, input, scope)?
            }
            Operator::Match(cases) => self.eval_match(cases, input, scope)?,
            Operator::Equals(operands) => JValue::Bool(self.all_equal(operands, input, scope)?),
            Operator::Not(operands) => match operands.as_slice() {
                [] => JValue::Bool(false),
                [single] => JValue::Bool(!is_truthy(&self.eval(single, input, scope)?)),
                _ => JValue::Bool(!self.all_equal(operands, input, scope)?),
            },
            Operator::Gt(pair) | Operator::Lt(pair) => {
                let wanted = if matches!(op, Operator::Gt(_)) {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Less
                };
                let result = match pair {
                    Some((a, b)) => {
                        compare(&self.eval(a, input, scope)?, &self.eval(b, input, scope)?) == Some(wanted)
                    }
                    None => false,
                };
                JValue::Bool(result)
            }
            Operator::And(operands) => {
                for operand in operands {
                    if !is_truthy(&self.eval(operand, input, scope)?) {
                        return Ok(JValue::Bool(false));
                    }
                }
                JValue::Bool(true)
            }
            Operator::Or(operands) => {
                if operands.is_empty() {
                    return Ok(JValue::Bool(true));
                }
                for operand in operands {
                    if is_truthy(&self.eval(operand, input, scope)?) {
                        return Ok(JValue::Bool(true));
                    }
                }
                JValue::Bool(false)
            }

            // ── Array ──
            Operator::ArrayMap(body) => match input {
                JValue::Array(items) => JValue::array(self.per_element(items, body, scope)?),
                _ => JValue::empty_array(),
            },
            Operator::ArrayFilter(predicate) => match input {
                JValue::Array(items) => {
                    let verdicts = self.per_element(items, predicate, scope)?;
                    JValue::array(
                        items
                            .iter()
                            .zip(verdicts)
                            .filter(|(_, keep)| is_truthy(keep))
                            .map(|(item, _)| item.clone())
                            .collect(),
                    )
                }
                _ => JValue::empty_array(),
            },
            Operator::ArrayFind(predicate) => match input {
                JValue::Array(items) => {
                    for i in 0..items.len() {
                        if is_truthy(&self.eval(predicate, &items[i], &scope.element(items, i))?) {
                            return Ok(items[i].clone());
                        }
                    }
                    JValue::Undefined
                }
                _ => JValue::Undefined,
            },
            Operator::ArrayFrom(entries) => JValue::array(self.eval_all(entries, input, scope)?),
            Operator::ArrayAppend(entries) => match input {
                JValue::Array(items) => {
                    let mut out = items.to_vec();
                    out.extend(self.eval_all(entries, input, scope)?);
                    JValue::array(out)
                }
                _ => JValue::empty_array(),
            },
            Operator::ArrayOmit(entries) => match input {
                JValue::Array(items) => {
                    let indices: Vec<i64> = self
                        .eval_all(entries, input, scope)?
                        .iter()
                        .filter_map(JValue::as_i64)
                        .collect();
                    JValue::array(array::omit_indices(items, &indices))
                }
                _ => JValue::empty_array(),
            },
            Operator::ArrayUnique(key) => match input {
                JValue::Array(items) => {
                    let keys = match key {
                        Some(key) => self.per_element(items, key, scope)?,
                        None => items.to_vec(),
                    };
                    JValue::array(array::unique_by(items, &keys))
                }
                _ => input.clone(),
            },
            Operator::ArrayFlatten(depth) => match input {
                JValue::Array(items) => JValue::array(array::flatten(items, depth.unwrap_or(1))),
                _ => input.clone(),
            },
            Operator::ArrayJoin(separator) => match input {
                JValue::Array(items) => JValue::from(array::join(items, separator.as_deref().unwrap_or(","))),
                _ => JValue::Undefined,
            },
            Operator::ArrayRange(count) => {
                let count = self.eval(count, input, scope)?;
                JValue::array(count.as_f64().map(array::range).unwrap_or_default())
            }
            Operator::ArrayGroupBy(field) => match (input, field) {
                (JValue::Array(items), Some(field)) => JValue::array(array::group_by(items, field)),
                _ => JValue::empty_array(),
            },
            Operator::ArrayToObject { key, value } => match input {
                JValue::Array(items) => {
                    let mut map = Map::new();
                    for i in 0..items.len() {
                        let element = scope.element(items, i);
                        let k = self.eval(key, &items[i], &element)?;
                        if k.is_nullish() {
                            continue;
                        }
                        map.insert(to_display_string(&k), self.eval(value, &items[i], &element)?);
                    }
                    JValue::object(map)
                }
                _ => JValue::Undefined,
            },
            Operator::ArrayContains(needle) => {
                let needle = self.eval(needle, input, scope)?;
                JValue::Bool(input.as_array().is_some_and(|items| items.contains(&needle)))
            }

            // ── Object ──
            Operator::ObjectFrom(props) => JValue::object(self.eval_props(props, input, scope)?),
            Operator::ObjectAssign(props) => {
                let mut base = input.as_object().cloned().unwrap_or_default();
                base.extend(self.eval_props(props, input, scope)?);
                JValue::object(base)
            }
            Operator::ObjectOmit(paths) => object::omit(input, paths),
            Operator::ObjectExplode(key) => match key {
                Some(key) => JValue::array(object::explode(input, key)),
                None => JValue::empty_array(),
            },
            Operator::ObjectCompare(pair) => match pair {
                Some((a, b)) => JValue::array(object::compare(&self.eval(a, input, scope)?, &self.eval(b, input, scope)?)),
                None => JValue::empty_array(),
            },
            Operator::NullStrip(depth) => object::null_strip(input, *depth),
            Operator::FromHistory { index, props } => {
                let source = index.and_then(|i| scope.history.get(i)).cloned().unwrap_or_default();
                JValue::object(self.eval_props(props, &source, scope)?)
            }
            Operator::AssignHistory { index, props } => {
                let source = index.and_then(|i| scope.history.get(i)).cloned().unwrap_or_default();
                let mut base = input.as_object().cloned().unwrap_or_default();
                base.extend(self.eval_props(props, &source, scope)?);
                JValue::object(base)
            }
            Operator::OmitHistory { index, keys } => match index.and_then(|i| scope.history.get(i)) {
                Some(source) => object::omit(source, keys),
                None => JValue::Undefined,
            },

            // ── String & number ──
            Operator::StringFormat {
                message_id,
                template,
                values,
            } => {
                let values = match values {
                    Some(props) => JValue::object(self.eval_props(props, input, scope)?),
                    None => input.clone(),
                };
                let template = match (message_id, template) {
                    (Some(id), default_message) => ctx.message(&MessageDescriptor {
                        id,
                        default_message: default_message.as_deref(),
                    })?,
                    (None, Some(template)) => Arc::new(MessageTemplate::compile(template)),
                    (None, None) => return Ok(JValue::Undefined),
                };
                JValue::from(template.format(&values))
            }
            Operator::StringCase(case) => match (input, case) {
                (JValue::String(s), Some(case)) => JValue::from(string::change_case(s, *case)),
                _ => input.clone(),
            },
            Operator::StringStartsWith(affix) => affix_test(input, affix.as_ref(), string::starts_with),
            Operator::StringEndsWith(affix) => affix_test(input, affix.as_ref(), string::ends_with),
            Operator::StringContains(affix) => affix_test(input, affix.as_ref(), string::contains),
            Operator::StringReplace(replacements) => match input {
                JValue::String(s) => JValue::from(string::replace_all(s, replacements)),
                _ => input.clone(),
            },
            Operator::Slice(range) => match range {
                Some((start, end)) => string::slice(input, *start, *end),
                None => JValue::Undefined,
            },
            Operator::Len => string::length(input),
            Operator::NumberParse(source) => {
                let value = match source {
                    Some(source) => self.eval(source, input, scope)?,
                    None => input.clone(),
                };
                numeric::parse_number(&value, ctx.locale())
            }
            Operator::Maths { a, b, operation } => match operation {
                Some(operation) => numeric::maths(&self.eval(a, input, scope)?, &self.eval(b, input, scope)?, *operation),
                None => JValue::Undefined,
            },

            // ── Date ──
            Operator::DateNow => datetime::now(),
            Operator::DateParse(pattern) => {
                let parsed = match input {
                    JValue::String(s) => datetime::parse(s, pattern.as_deref()).ok(),
                    other => datetime::to_datetime(other),
                };
                parsed.as_ref().map_or(JValue::Undefined, datetime::to_value)
            }
            Operator::DateFormat(pattern) => datetime::to_datetime(input)
                .and_then(|dt| datetime::format(&dt, pattern.as_deref()).ok())
                .map_or(JValue::Undefined, JValue::from),
            Operator::DateAdd(duration) | Operator::DateSub(duration) => match duration {
                Some(duration) => {
                    let shifted = datetime::to_datetime(input).and_then(|dt| {
                        if matches!(op, Operator::DateAdd(_)) {
                            duration.add_to(&dt)
                        } else {
                            duration.sub_from(&dt)
                        }
                    });
                    shifted.as_ref().map_or(JValue::Undefined, datetime::to_value)
                }
                None => input.clone(),
            },
            Operator::DateStartOf(unit) | Operator::DateEndOf(unit) => {
                let boundary = unit.zip(datetime::to_datetime(input)).and_then(|(unit, dt)| {
                    if matches!(op, Operator::DateStartOf(_)) {
                        datetime::start_of(&dt, unit)
                    } else {
                        datetime::end_of(&dt, unit)
                    }
                });
                boundary.as_ref().map_or(JValue::Undefined, datetime::to_value)
            }
            Operator::DateSet(fields) => match datetime::to_datetime(input) {
                Some(dt) => {
                    let mut values = Vec::with_capacity(fields.len());
                    for (field, remapper) in fields {
                        if let Some(v) = self.eval(remapper, input, scope)?.as_i64() {
                            values.push((*field, v));
                        }
                    }
                    datetime::set(&dt, &values).as_ref().map_or(JValue::Undefined, datetime::to_value)
                }
                None => JValue::Undefined,
            },

            // ── Builders ──
            Operator::FilterFrom(clauses) => {
                let mut terms = Vec::with_capacity(clauses.len());
                for clause in clauses {
                    terms.push(FilterTerm {
                        field: &clause.field,
                        comparator: clause.comparator,
                        kind: clause.kind,
                        value: self.eval(&clause.value, input, scope)?,
                    });
                }
                JValue::from(odata::build_filter(&terms))
            }
            Operator::OrderFrom(entries) => JValue::from(odata::build_order(entries)),
            Operator::XmlParse(source) => {
                let source = match source {
                    Some(source) => self.eval(source, input, scope)?,
                    None => JValue::Undefined,
                };
                match source.as_str().or_else(|| input.as_str()) {
                    Some(text) => xml::parse(text).unwrap_or_else(|err| {
                        debug!(error = %err, "xml.parse failed");
                        JValue::Undefined
                    }),
                    None => JValue::Undefined,
                }
            }

            // ── Lens ──
            Operator::Focus { on, body } => {
                let focused = self.eval(on, input, scope)?;
                self.eval(body, &focused, &scope.enter(&focused))?
            }

            Operator::Unknown(name) => {
                debug!(operator = name.as_str(), "unknown remapper operator evaluated to undefined");
                JValue::Undefined
            }
        };
        Ok(value)
    }

    fn eval_match(&self, cases: &[MatchCase], input: &JValue, scope: &Scope<'_>) -> Result<JValue, RemapError> {
        for case in cases {
            if is_truthy(&self.eval(&case.case, input, scope)?) {
                return self.eval(&case.value, input, scope);
            }
        }
        Ok(JValue::Undefined)
    }

    /// Deep equality of every operand with the first; fewer than two operands are trivially equal.
    fn all_equal(&self, operands: &[Remapper], input: &JValue, scope: &Scope<'_>) -> Result<bool, RemapError> {
        let Some((first, rest)) = operands.split_first() else {
            return Ok(true);
        };
        let first = self.eval(first, input, scope)?;
        for operand in rest {
            if self.eval(operand, input, scope)? != first {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn affix_test(input: &JValue, affix: Option<&Affix>, test: fn(&str, &Affix) -> bool) -> JValue {
    match (input.as_str(), affix) {
        (Some(s), Some(affix)) => JValue::Bool(test(s, affix)),
        _ => JValue::Bool(false),
    }
}

fn log_value(level: LogLevel, input: &JValue, scope: &Scope<'_>) {
    let history = &scope.history;
    match level {
        LogLevel::Debug => debug!(input = %input, ?history, "remapper log"),
        LogLevel::Info => info!(input = %input, ?history, "remapper log"),
        LogLevel::Warn => warn!(input = %input, ?history, "remapper log"),
        LogLevel::Error => error!(input = %input, ?history, "remapper log"),
    }
}

/// Compile and evaluate a definition with default options.
pub fn evaluate(definition: &JValue, input: &JValue, ctx: &EvaluationContext) -> Result<JValue, RemapError> {
    Evaluator::new().evaluate_definition(definition, input, ctx)
}
