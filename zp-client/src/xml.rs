//! Conversion of ZonePlayer XML documents into JSON values.
//!
//! Descriptions, SCPDs and event bodies are displayed rather than
//! interpreted, so instead of a serde model per document this module maps
//! any element tree onto a [`serde_json::Value`]:
//!
//! - namespace prefixes are dropped (`e:property` becomes `property`);
//! - an element named `...List` becomes an array of its children, unless
//!   it only holds text (`<ZoneList>Kitchen,Office</ZoneList>` stays a string);
//! - repeated child names become arrays, in document order;
//! - a leaf carrying only a `val` attribute becomes that value
//!   (`<Volume val="10"/>` is `10`);
//! - canonical integers become numbers, everything else stays a string;
//! - text that is itself an XML document (`LastChange`) is converted too.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::{Result, ZpError};

/// Key used for text content of an element that also has children.
const TEXT_KEY: &str = "#text";

/// How element and attribute names become JSON keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XmlOptions {
    /// Lower-camel-case names (`SCPDURL` to `scpdUrl`, `UDN` to `udn`).
    pub normalize_keys: bool,
}

impl XmlOptions {
    /// Options for device descriptions and SCPDs.
    pub fn description() -> Self {
        Self {
            normalize_keys: true,
        }
    }

    /// Options for event bodies: names are kept as the device sent them.
    pub fn event() -> Self {
        Self {
            normalize_keys: false,
        }
    }

    fn key(&self, name: &str) -> String {
        if self.normalize_keys {
            normalize_key(name)
        } else {
            name.to_string()
        }
    }
}

struct Element {
    name: String,
    attributes: Vec<(String, Value)>,
    children: Vec<(String, Value)>,
    text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>, options: XmlOptions) -> Result<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();

        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| malformed(&e))?;
            if attribute.key.as_ref().starts_with(b"xmlns") {
                continue;
            }
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(|e| malformed(&e))?;
            attributes.push((options.key(&key), scalar(value.into_owned())));
        }

        Ok(Self {
            name: options.key(&name),
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    fn finish(self, options: XmlOptions) -> (String, Value) {
        let Element {
            name,
            mut attributes,
            children,
            text,
        } = self;

        let is_list =
            name.ends_with("List") && attributes.is_empty() && (!children.is_empty() || text.is_empty());

        let value = if is_list {
            Value::Array(children.into_iter().map(|(_, value)| value).collect())
        } else if children.is_empty() && attributes.is_empty() {
            leaf(text, options)
        } else if children.is_empty() && attributes.len() == 1 && attributes[0].0 == "val" {
            attributes.pop().map(|(_, value)| value).unwrap_or(Value::Null)
        } else {
            let mut map = Map::new();
            for (key, value) in attributes.into_iter().chain(children) {
                insert_child(&mut map, key, value);
            }
            if !text.is_empty() {
                map.insert(TEXT_KEY.to_string(), leaf(text, options));
            }
            Value::Object(map)
        };

        (name, value)
    }
}

/// Convert an XML document into the JSON value of its root element.
///
/// # Errors
///
/// `ZpError::Protocol` when the document is not well-formed.
///
/// # Example
///
/// ```
/// use zp_client::xml::{to_json, XmlOptions};
///
/// let value = to_json("<root><major>1</major></root>", XmlOptions::description()).unwrap();
/// assert_eq!(value, serde_json::json!({ "major": 1 }));
/// ```
pub fn to_json(xml: &str, options: XmlOptions) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event().map_err(|e| malformed(&e))? {
            Event::Start(start) => stack.push(Element::open(&start, options)?),
            Event::Empty(start) => {
                let element = Element::open(&start, options)?;
                if let Some(root) = attach(&mut stack, element, options) {
                    return Ok(root);
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ZpError::Protocol("unbalanced XML document".to_string()))?;
                if let Some(root) = attach(&mut stack, element, options) {
                    return Ok(root);
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| malformed(&e))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => {
                return Err(ZpError::Protocol("XML document has no root element".to_string()))
            }
            _ => {}
        }
    }
}

/// Close `element` into its parent; returns the value once the root closes.
fn attach(stack: &mut Vec<Element>, element: Element, options: XmlOptions) -> Option<Value> {
    let (name, value) = element.finish(options);
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push((name, value));
            None
        }
        None => Some(value),
    }
}

fn insert_child(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

fn leaf(text: String, options: XmlOptions) -> Value {
    let trimmed = text.trim();
    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        if let Ok(nested) = to_json(trimmed, options) {
            return nested;
        }
    }
    scalar(text)
}

fn scalar(text: String) -> Value {
    match text.parse::<i64>() {
        Ok(number) if number.to_string() == text => Value::from(number),
        _ => Value::String(text),
    }
}

/// Lower-camel-case an XML name, treating a trailing `URL` as a word.
///
/// `SCPDURL` becomes `scpdUrl`, `controlURL` becomes `controlUrl`, `UDN`
/// becomes `udn`, `MACAddress` becomes `macAddress`.
pub fn normalize_key(name: &str) -> String {
    match name.strip_suffix("URL") {
        Some(head) if !head.is_empty() => format!("{}Url", lower_camel(head)),
        _ => lower_camel(name),
    }
}

fn lower_camel(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let upper_run = chars.iter().take_while(|c| c.is_uppercase()).count();
    let lower_until = if upper_run == chars.len() || upper_run <= 1 {
        upper_run
    } else {
        upper_run - 1
    };

    chars
        .iter()
        .enumerate()
        .flat_map(|(i, c)| {
            let lowered: Vec<char> = if i < lower_until {
                c.to_lowercase().collect()
            } else {
                vec![*c]
            };
            lowered
        })
        .collect()
}

fn malformed(error: &dyn std::fmt::Display) -> ZpError {
    ZpError::Protocol(format!("malformed XML: {error}"))
}
