use std::collections::{HashMap, VecDeque};

use quick_xml::Reader;
use quick_xml::escape::{resolve_xml_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};

use crate::{Error, EventSource, StartElement, XmlEvent};

/// Strict XML tokenizer over an in-memory document.
///
/// Predefined entities and character references are expanded in place;
/// references to entities declared in the DOCTYPE are reported as
/// [`XmlEvent::EntityRef`].
pub struct XmlSource<'a> {
    reader: Reader<&'a [u8]>,
    entities: HashMap<String, String>,
    pending: VecDeque<XmlEvent>,
}

impl<'a> XmlSource<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut reader = Reader::from_str(input);
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            entities: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, Error> {
        Ok(self
            .reader
            .decoder()
            .decode(bytes)
            .map_err(quick_xml::Error::from)?
            .into_owned())
    }

    fn resolve_entity(&self, name: &str) -> Option<&str> {
        resolve_xml_entity(name).or_else(|| self.entities.get(name).map(String::as_str))
    }

    fn start_element(&self, start: &BytesStart<'_>) -> Result<StartElement, Error> {
        let mut element = StartElement::new(self.decode(start.name().as_ref())?);
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::InvalidAttr)?;
            let name = self.decode(attribute.key.as_ref())?;
            let value = attribute
                .decode_and_unescape_value_with(self.reader.decoder(), |e| self.resolve_entity(e))?
                .into_owned();

            if name == "xmlns" {
                element.namespaces.push((String::new(), value));
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                element.namespaces.push((prefix.to_owned(), value));
            } else {
                element.attributes.push((name, value));
            }
        }
        Ok(element)
    }

    /// Splits raw character data at entity references.
    fn push_text(&mut self, raw: &str) -> Result<(), Error> {
        let mut text = String::new();
        let mut rest = raw;
        while let Some(amp) = rest.find('&') {
            text.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            let Some(semicolon) = after.find(';') else {
                return Err(Error::grammar("Unterminated entity reference"));
            };
            let name = &after[..semicolon];
            rest = &after[semicolon + 1..];

            if let Some(number) = name.strip_prefix('#') {
                text.push(parse_char_reference(number)?);
            } else if let Some(value) = resolve_xml_entity(name) {
                text.push_str(value);
            } else if let Some(value) = self.entities.get(name) {
                if !text.is_empty() {
                    self.pending
                        .push_back(XmlEvent::Characters(std::mem::take(&mut text)));
                }
                self.pending.push_back(XmlEvent::EntityRef {
                    name: name.to_owned(),
                    value: value.clone(),
                });
            } else {
                return Err(Error::grammar(format!("Undeclared entity '&{name};'")));
            }
        }
        text.push_str(rest);
        if !text.is_empty() {
            self.pending.push_back(XmlEvent::Characters(text));
        }
        Ok(())
    }

    /// Collects `<!ENTITY name "value">` declarations.
    fn parse_doctype(&mut self, doctype: &str) -> Result<(), Error> {
        for declaration in doctype.split('<').skip(1) {
            let Some(declaration) = declaration.strip_prefix("!ENTITY") else {
                continue;
            };
            let declaration = declaration.trim_start();
            let (name, rest) = declaration
                .split_once(|c: char| c.is_ascii_whitespace())
                .ok_or_else(|| {
                    Error::grammar("<!ENTITY declarations need both a name and a value")
                })?;
            let (value, rest) = rest
                .trim_start()
                .strip_prefix('"')
                .and_then(|rest| rest.split_once('"'))
                .ok_or_else(|| Error::grammar("<!ENTITY values must be enclosed in double quotes"))?;
            if !rest.trim_start().starts_with('>') {
                return Err(Error::grammar("<!ENTITY declarations must end with '>'"));
            }

            let value = unescape_with(value, |e| self.resolve_entity(e))
                .map_err(quick_xml::Error::from)?
                .into_owned();
            self.entities.insert(name.to_owned(), value);
        }
        Ok(())
    }
}

fn parse_char_reference(number: &str) -> Result<char, Error> {
    let code = match number.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => number.parse(),
    };
    code.ok()
        .and_then(char::from_u32)
        .ok_or_else(|| Error::grammar(format!("Invalid character reference '&#{number};'")))
}

impl EventSource for XmlSource<'_> {
    fn next_event(&mut self) -> Result<Option<XmlEvent>, Error> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            match self.reader.read_event()? {
                Event::Start(start) => {
                    return Ok(Some(XmlEvent::ElementStart(self.start_element(&start)?)));
                }
                Event::Empty(start) => {
                    // only reachable if empty-element expansion is off
                    let element = self.start_element(&start)?;
                    self.pending
                        .push_back(XmlEvent::ElementEnd(element.name.clone()));
                    return Ok(Some(XmlEvent::ElementStart(element)));
                }
                Event::End(end) => {
                    return Ok(Some(XmlEvent::ElementEnd(
                        self.decode(end.name().as_ref())?,
                    )));
                }
                Event::Text(text) => {
                    let raw = self.decode(&text)?;
                    self.push_text(&raw)?;
                }
                Event::CData(cdata) => {
                    return Ok(Some(XmlEvent::Characters(self.decode(&cdata)?)));
                }
                Event::Comment(comment) => {
                    return Ok(Some(XmlEvent::Comment(self.decode(&comment)?)));
                }
                Event::PI(pi) => {
                    return Ok(Some(XmlEvent::ProcessingInstruction {
                        target: self.decode(pi.target())?,
                        data: self.decode(pi.content())?.trim_start().to_owned(),
                    }));
                }
                Event::DocType(doctype) => {
                    let doctype = self.decode(&doctype)?;
                    self.parse_doctype(&doctype)?;
                }
                Event::Decl(_) => {}
                Event::Eof => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(input: &str) -> Vec<XmlEvent> {
        let mut source = XmlSource::new(input);
        let mut events = Vec::new();
        while let Some(event) = source.next_event().unwrap() {
            events.push(event);
        }
        events
    }

    #[test]
    fn namespace_declarations_are_split_out() {
        let events = events(r#"<a xmlns="http://d/" xmlns:x="http://x/" x:b="1 &amp; 2"/>"#);
        assert_eq!(
            events,
            vec![
                XmlEvent::ElementStart(
                    StartElement::new("a")
                        .with_namespace("", "http://d/")
                        .with_namespace("x", "http://x/")
                        .with_attribute("x:b", "1 & 2")
                ),
                XmlEvent::ElementEnd("a".to_owned()),
            ]
        );
    }

    #[test]
    fn declared_entities_become_entity_events() {
        let events = events(
            r#"<!DOCTYPE a [<!ENTITY me "Alice">]><a>Hi &me;&#33;</a>"#,
        );
        assert_eq!(
            events[1..4],
            [
                XmlEvent::Characters("Hi ".to_owned()),
                XmlEvent::EntityRef {
                    name: "me".to_owned(),
                    value: "Alice".to_owned()
                },
                XmlEvent::Characters("!".to_owned()),
            ]
        );
    }

    #[test]
    fn undeclared_entity_is_fatal() {
        let mut source = XmlSource::new("<a>&nope;</a>");
        assert!(source.next_event().is_ok());
        assert!(source.next_event().is_err());
    }
}
