// XML to value conversion
// Backs the `xml.parse` operator

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;

use crate::value::{JValue, Map};

/// Key holding an element's text when it also has attributes or children.
pub const TEXT_KEY: &str = "text";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XmlError {
    #[error("Malformed XML: {0}")]
    Malformed(String),

    #[error("XML document has no root element")]
    NoRootElement,

    #[error("XML document has more than one root element")]
    MultipleRoots,
}

fn malformed(err: impl std::fmt::Display) -> XmlError {
    XmlError::Malformed(err.to_string())
}

/// An element whose end tag has not been seen yet.
struct OpenElement {
    name: String,
    attributes: Map,
    children: IndexMap<String, Vec<JValue>>,
    text: String,
}

impl OpenElement {
    fn start(tag: &BytesStart<'_>) -> Result<OpenElement, XmlError> {
        let name = std::str::from_utf8(tag.name().as_ref()).map_err(malformed)?.to_string();
        let mut attributes = Map::new();
        for attr in tag.attributes() {
            let attr = attr.map_err(malformed)?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(malformed)?.to_string();
            let value = attr.unescape_value().map_err(malformed)?;
            attributes.insert(key, JValue::string(value.as_ref()));
        }
        Ok(OpenElement {
            name,
            attributes,
            children: IndexMap::new(),
            text: String::new(),
        })
    }

    fn add_child(&mut self, name: String, value: JValue) {
        self.children.entry(name).or_default().push(value);
    }

    /// Collapse into a value: text-only elements become strings, repeated
    /// children become lists.
    fn finish(self) -> (String, JValue) {
        if self.attributes.is_empty() && self.children.is_empty() {
            let value = if self.text.is_empty() {
                JValue::empty_object()
            } else {
                JValue::string(self.text)
            };
            return (self.name, value);
        }

        let mut map = self.attributes;
        for (name, values) in self.children {
            merge_entry(&mut map, &self.name, name, values);
        }
        if !self.text.is_empty() {
            merge_entry(&mut map, &self.name, TEXT_KEY.to_string(), vec![JValue::string(self.text)]);
        }
        (self.name, JValue::object(map))
    }
}

/// Store `values` under `key`. A key already taken by an attribute turns
/// into a list with the attribute first.
fn merge_entry(map: &mut Map, element: &str, key: String, mut values: Vec<JValue>) {
    if let Some(existing) = map.get_mut(&key) {
        debug!(element, key = key.as_str(), "xml content shares its name with an attribute");
        values.insert(0, std::mem::take(existing));
        *existing = JValue::array(values);
        return;
    }
    let value = if values.len() == 1 {
        values.remove(0)
    } else {
        JValue::array(values)
    };
    map.insert(key, value);
}

/// Parse an XML document into `{ rootName: element }`.
pub fn parse(source: &str) -> Result<JValue, XmlError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Option<(String, JValue)> = None;

    let mut close = |element: OpenElement, stack: &mut Vec<OpenElement>| -> Result<(), XmlError> {
        let (name, value) = element.finish();
        match stack.last_mut() {
            Some(parent) => parent.add_child(name, value),
            None if root.is_some() => return Err(XmlError::MultipleRoots),
            None => root = Some((name, value)),
        }
        Ok(())
    };

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(tag) => stack.push(OpenElement::start(&tag)?),
            Event::Empty(tag) => {
                let element = OpenElement::start(&tag)?;
                close(element, &mut stack)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| XmlError::Malformed("unexpected end tag".to_string()))?;
                close(element, &mut stack)?;
            }
            Event::Text(text) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&text.unescape().map_err(malformed)?);
                }
            }
            Event::CData(data) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Malformed("unclosed element".to_string()));
    }
    let (name, value) = root.ok_or(XmlError::NoRootElement)?;
    let mut document = Map::new();
    document.insert(name, value);
    Ok(JValue::object(document))
}
