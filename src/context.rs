// Evaluation context
// Read-only, per-call bundle of everything a remapper may consult besides its input

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::evaluator::RemapError;
use crate::messages::{MessageCatalog, MessageDescriptor, MessageTemplate};
use crate::value::{JValue, Map};

/// Resolves named, externally managed variables for the `variable` operator.
pub trait VariableResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<JValue>;
}

impl VariableResolver for Map {
    fn resolve(&self, name: &str) -> Option<JValue> {
        self.get(name).cloned()
    }
}

impl VariableResolver for HashMap<String, JValue> {
    fn resolve(&self, name: &str) -> Option<JValue> {
        self.get(name).cloned()
    }
}

struct FnResolver<F>(F);

impl<F> VariableResolver for FnResolver<F>
where
    F: Fn(&str) -> Option<JValue> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Option<JValue> {
        (self.0)(name)
    }
}

/// Context for one evaluation.
///
/// Nothing in here is mutated by operators, so a context can be shared
/// between concurrent evaluations of different remappers.
#[derive(Clone, Default)]
pub struct EvaluationContext {
    locale: String,
    app_id: Option<i64>,
    app_url: String,
    url: String,
    history: Vec<JValue>,
    page_data: JValue,
    group: JValue,
    app_member_info: JValue,
    context: JValue,
    variables: Option<Arc<dyn VariableResolver>>,
    messages: Option<Arc<dyn MessageCatalog>>,
}

impl EvaluationContext {
    pub fn builder() -> EvaluationContextBuilder {
        EvaluationContextBuilder::default()
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn app_id(&self) -> Option<i64> {
        self.app_id
    }

    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    /// URL of the page the evaluation happens for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ancestor values supplied by the caller, most recent first.
    pub fn history(&self) -> &[JValue] {
        &self.history
    }

    pub fn page_data(&self) -> &JValue {
        &self.page_data
    }

    pub fn group(&self) -> &JValue {
        &self.group
    }

    pub fn app_member_info(&self) -> &JValue {
        &self.app_member_info
    }

    /// The implicit-parameter bag read by the `context` operator.
    pub fn context(&self) -> &JValue {
        &self.context
    }

    /// Resolve a named variable; unknown names are `Undefined`.
    pub fn variable(&self, name: &str) -> Result<JValue, RemapError> {
        let resolver = self
            .variables
            .as_ref()
            .ok_or(RemapError::MissingResolver("variables"))?;
        Ok(resolver.resolve(name).unwrap_or(JValue::Undefined))
    }

    /// Fetch a message template for the current locale.
    pub fn message(&self, descriptor: &MessageDescriptor<'_>) -> Result<Arc<MessageTemplate>, RemapError> {
        let catalog = self
            .messages
            .as_ref()
            .ok_or(RemapError::MissingResolver("messages"))?;
        Ok(catalog.get_message(descriptor, &self.locale))
    }
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("locale", &self.locale)
            .field("app_id", &self.app_id)
            .field("app_url", &self.app_url)
            .field("url", &self.url)
            .field("history", &self.history.len())
            .field("has_variables", &self.variables.is_some())
            .field("has_messages", &self.messages.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`EvaluationContext`].
#[derive(Default)]
pub struct EvaluationContextBuilder {
    inner: EvaluationContext,
}

impl EvaluationContextBuilder {
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.inner.locale = locale.into();
        self
    }

    pub fn app_id(mut self, id: i64) -> Self {
        self.inner.app_id = Some(id);
        self
    }

    pub fn app_url(mut self, url: impl Into<String>) -> Self {
        self.inner.app_url = url.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.inner.url = url.into();
        self
    }

    pub fn history(mut self, history: Vec<JValue>) -> Self {
        self.inner.history = history;
        self
    }

    pub fn page_data(mut self, data: JValue) -> Self {
        self.inner.page_data = data;
        self
    }

    pub fn group(mut self, group: JValue) -> Self {
        self.inner.group = group;
        self
    }

    pub fn app_member_info(mut self, member: JValue) -> Self {
        self.inner.app_member_info = member;
        self
    }

    pub fn context(mut self, context: JValue) -> Self {
        self.inner.context = context;
        self
    }

    pub fn variables(mut self, resolver: Arc<dyn VariableResolver>) -> Self {
        self.inner.variables = Some(resolver);
        self
    }

    pub fn variables_fn<F>(self, resolve: F) -> Self
    where
        F: Fn(&str) -> Option<JValue> + Send + Sync + 'static,
    {
        self.variables(Arc::new(FnResolver(resolve)))
    }

    pub fn messages(mut self, catalog: Arc<dyn MessageCatalog>) -> Self {
        self.inner.messages = Some(catalog);
        self
    }

    pub fn build(self) -> EvaluationContext {
        self.inner
    }
}
