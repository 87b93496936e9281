//! # Type Serialization
//!
//! Types are persisted as nested `<type>` elements:
//!
//! ```text
//! <type type="literal" name="list">         list<A>
//!   <type type="var" var="A"/>
//! </type>
//!
//! <type type="function">                    Number -> Bool
//!   <type type="literal" name="Number"/>
//!   <type type="literal" name="Bool"/>
//! </type>
//! ```
//!
//! [`to_dom`] and [`from_dom`] convert between [`Type`] and a minimal element
//! tree; [`to_xml_string`] and [`from_xml_str`] add the text layer on top
//! using `quick-xml`. `from_dom(&to_dom(t)) == t` for every type.

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use thiserror::Error;

use super::ty::Type;

const TYPE_ELEMENT: &str = "type";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error(transparent)]
    Attribute(#[from] AttrError),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("malformed type element: {0}")]
    Malformed(String),
}

/// A detached XML element: name, attributes in document order, children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn required(&self, key: &str) -> Result<&str, XmlError> {
        self.attribute(key)
            .ok_or_else(|| XmlError::Malformed(format!("missing attribute `{}`", key)))
    }
}

pub fn to_dom(ty: &Type) -> Element {
    let element = Element::new(TYPE_ELEMENT);
    match ty {
        Type::Var(v) => element
            .with_attribute("type", "var")
            .with_attribute("var", v.name()),
        Type::Lit(name, children) => children.iter().fold(
            element
                .with_attribute("type", "literal")
                .with_attribute("name", name.as_str()),
            |el, child| el.with_child(to_dom(child)),
        ),
        Type::Func(arg, result) => element
            .with_attribute("type", "function")
            .with_child(to_dom(arg))
            .with_child(to_dom(result)),
    }
}

pub fn from_dom(element: &Element) -> Result<Type, XmlError> {
    if element.name != TYPE_ELEMENT {
        return Err(XmlError::Malformed(format!(
            "expected <{}>, found <{}>",
            TYPE_ELEMENT, element.name
        )));
    }
    match element.required("type")? {
        "var" => {
            if !element.children.is_empty() {
                return Err(XmlError::Malformed("type variable with children".to_string()));
            }
            Ok(Type::var(element.required("var")?))
        }
        "literal" => {
            let children = element
                .children
                .iter()
                .map(from_dom)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Type::con(element.required("name")?, children))
        }
        "function" => match element.children.as_slice() {
            [arg, result] => Ok(Type::func(from_dom(arg)?, from_dom(result)?)),
            other => Err(XmlError::Malformed(format!(
                "function type with {} children",
                other.len()
            ))),
        },
        kind => Err(XmlError::Malformed(format!("unknown type kind `{}`", kind))),
    }
}

pub fn to_xml_string(ty: &Type) -> Result<String, XmlError> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, &to_dom(ty))?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

/// Parses the first `<type>` element of `source`.
pub fn from_xml_str(source: &str) -> Result<Type, XmlError> {
    let root = parse_element(source)?;
    from_dom(&root)
}

fn parse_element(source: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(source);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => {
                let element = element_from(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlError::Malformed("unbalanced end tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Eof => {
                return Err(XmlError::Malformed("unexpected end of document".to_string()));
            }
            _ => {}
        }
    }
}

fn element_from(start: &BytesStart) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}
