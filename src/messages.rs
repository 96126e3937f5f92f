//! Localized message lookup for `string.format` and `translate`.
//!
//! A [`MessageCatalog`] resolves a message id for a locale into a compiled
//! [`MessageTemplate`]. [`CachedCatalog`] is the stock implementation: the
//! message tables are immutable once built and templates are compiled lazily
//! into a concurrent cache, so one catalog can serve every evaluation in the
//! process. Reloading means building a new catalog and swapping it in.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::utils::{get_path, split_path, to_display_string};
use crate::value::JValue;

/// What a caller asks the catalog for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDescriptor<'a> {
    pub id: &'a str,
    /// Template used when the catalog has no translation for `id`.
    pub default_message: Option<&'a str>,
}

/// Source of localized, compiled message templates.
pub trait MessageCatalog: Send + Sync {
    fn get_message(&self, descriptor: &MessageDescriptor<'_>, locale: &str) -> Arc<MessageTemplate>;
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A message compiled into literal text and `{name}` placeholders.
///
/// Apostrophes quote braces the way ICU messages do: `'{'` is a literal
/// brace and `''` is a literal apostrophe. Anything after a comma inside a
/// placeholder (`{count, number}`) is accepted and ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageTemplate {
    segments: Vec<Segment>,
}

impl MessageTemplate {
    pub fn compile(source: &str) -> MessageTemplate {
        let chars: Vec<char> = source.chars().collect();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '\'' if chars.get(i + 1) == Some(&'\'') => {
                    literal.push('\'');
                    i += 2;
                }
                '\'' if matches!(chars.get(i + 1).copied(), Some('{') | Some('}')) => {
                    i += 1;
                    while i < chars.len() && chars[i] != '\'' {
                        literal.push(chars[i]);
                        i += 1;
                    }
                    i += 1;
                }
                '{' => match chars[i + 1..].iter().position(|c| *c == '}') {
                    Some(len) => {
                        let inner: String = chars[i + 1..i + 1 + len].iter().collect();
                        let name = inner.split(',').next().unwrap_or_default().trim().to_string();
                        if !literal.is_empty() {
                            segments.push(Segment::Literal(std::mem::take(&mut literal)));
                        }
                        segments.push(Segment::Placeholder(name));
                        i += len + 2;
                    }
                    None => {
                        literal.extend(&chars[i..]);
                        i = chars.len();
                    }
                },
                c => {
                    literal.push(c);
                    i += 1;
                }
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        MessageTemplate { segments }
    }

    /// Substitute placeholders from `values`; missing values render empty.
    pub fn format(&self, values: &JValue) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = match values.get(name) {
                        Some(v) => v.clone(),
                        None => get_path(values, &split_path(name)),
                    };
                    out.push_str(&to_display_string(&value));
                }
            }
        }
        out
    }

    /// Names of the placeholders, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

/// Message tables keyed by locale, compiled on first use.
#[derive(Debug, Default)]
pub struct CachedCatalog {
    messages: HashMap<String, HashMap<String, String>>,
    default_locale: Option<String>,
    compiled: DashMap<(String, String), Arc<MessageTemplate>>,
}

impl CachedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the messages of one locale.
    pub fn with_messages<I, K, V>(mut self, locale: impl Into<String>, messages: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let table = messages.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.messages.insert(locale.into(), table);
        self
    }

    /// Locale consulted when neither the requested locale nor its base language has the message.
    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = Some(locale.into());
        self
    }

    /// Number of templates compiled so far.
    pub fn compiled_count(&self) -> usize {
        self.compiled.len()
    }

    fn lookup(&self, id: &str, locale: &str) -> Option<(&str, &str)> {
        let base = locale.split(['-', '_']).next().unwrap_or(locale);
        [Some(locale), Some(base), self.default_locale.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|candidate| {
                let (key, table) = self.messages.get_key_value(candidate)?;
                table.get(id).map(|message| (key.as_str(), message.as_str()))
            })
    }
}

impl MessageCatalog for CachedCatalog {
    fn get_message(&self, descriptor: &MessageDescriptor<'_>, locale: &str) -> Arc<MessageTemplate> {
        let (cache_locale, source) = match self.lookup(descriptor.id, locale) {
            Some(found) => found,
            // Untranslated messages fall back to the default, then to the id itself
            None => ("", descriptor.default_message.unwrap_or(descriptor.id)),
        };

        let key = (cache_locale.to_string(), source.to_string());
        if let Some(template) = self.compiled.get(&key) {
            return Arc::clone(template.value());
        }
        debug!(id = descriptor.id, locale = cache_locale, "compiling message template");
        let template = Arc::new(MessageTemplate::compile(source));
        self.compiled.insert(key, Arc::clone(&template));
        template
    }
}
