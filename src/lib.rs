// remapper - JSON-in, JSON-out data transformation engine
// Copyright (c) 2025 remapper contributors
// Licensed under the MIT License

//! # remapper
//!
//! Evaluates declarative remapper definitions: JSON documents that describe
//! how to reshape an input value, in the style of low-code app definitions.
//!
//! A definition is a literal, a single `{ operator: argument }` step, or a
//! list of steps forming a pipeline. Definitions are parsed once into an
//! immutable [`Remapper`] tree and can then be evaluated concurrently
//! against many inputs.
//!
//! ## Architecture
//!
//! - `value` - The `JValue` data model and the `jvalue!` macro
//! - `signature` - Operator registry and argument shapes
//! - `ast` - Compiled remapper tree
//! - `parser` - Definition to tree conversion and validation
//! - `evaluator` - Tree-walking dispatcher, scope and history
//! - `context` - Per-call evaluation context
//! - `messages` - Message catalog and compiled templates
//! - `functions` - Pure operator helpers
//! - `datetime` - Date parsing, formatting and arithmetic
//! - `odata` - Filter and order string builders
//! - `xml` - XML to value conversion
//! - `utils` - Truthiness, ordering and path helpers

pub mod ast;
pub mod context;
pub mod datetime;
pub mod evaluator;
pub mod functions;
pub mod messages;
pub mod odata;
pub mod parser;
pub mod signature;
pub mod utils;
pub mod value;
pub mod xml;

pub use ast::{Operator, Remapper};
pub use context::{EvaluationContext, EvaluationContextBuilder, VariableResolver};
pub use evaluator::{evaluate, Evaluator, EvaluatorOptions, RemapError};
pub use messages::{CachedCatalog, MessageCatalog, MessageDescriptor, MessageTemplate};
pub use parser::{validate, ParseIssue};
pub use signature::OperatorKind;
pub use value::{JValue, Map};

/// A remapper definition compiled for repeated evaluation.
///
/// ```
/// use remapper::{jvalue, CompiledRemapper, EvaluationContext};
///
/// let remapper = CompiledRemapper::compile(&jvalue!({"prop": "name"})).unwrap();
/// let ctx = EvaluationContext::default();
/// let name = remapper.evaluate(&jvalue!({"name": "Alice"}), &ctx).unwrap();
/// assert_eq!(name, jvalue!("Alice"));
/// ```
#[derive(Debug, Clone)]
pub struct CompiledRemapper {
    remapper: Remapper,
    evaluator: Evaluator,
}

impl CompiledRemapper {
    /// Compile with default options.
    pub fn compile(definition: &JValue) -> Result<Self, RemapError> {
        Self::with_options(definition, EvaluatorOptions::default())
    }

    pub fn with_options(definition: &JValue, options: EvaluatorOptions) -> Result<Self, RemapError> {
        let evaluator = Evaluator::with_options(options);
        let remapper = evaluator.compile(definition)?;
        Ok(CompiledRemapper { remapper, evaluator })
    }

    /// Compile a definition given as JSON text.
    pub fn compile_str(definition: &str) -> Result<Self, RemapError> {
        let evaluator = Evaluator::new();
        let remapper = evaluator.compile_str(definition)?;
        Ok(CompiledRemapper { remapper, evaluator })
    }

    pub fn remapper(&self) -> &Remapper {
        &self.remapper
    }

    pub fn evaluate(&self, input: &JValue, ctx: &EvaluationContext) -> Result<JValue, RemapError> {
        self.evaluator.evaluate(&self.remapper, input, ctx)
    }

    /// Evaluate with JSON text in and out.
    ///
    /// An undefined result serializes as `null`.
    pub fn evaluate_json(&self, input: &str, ctx: &EvaluationContext) -> Result<String, RemapError> {
        let input = JValue::from_json_str(input)?;
        let result = self.evaluate(&input, ctx)?;
        Ok(result.to_json_string()?)
    }
}
