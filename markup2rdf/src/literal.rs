use std::mem;

use indexmap::IndexMap;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesPI, BytesStart, BytesText, Event};

use crate::{Error, StartElement};

/// What a literal capture produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Captured {
    Text(String),
    Xml(String),
}

/// Accumulates the content of a literal-valued element.
///
/// Character data is kept both as plain text and as escaped XML, so the
/// decision between a plain and an XML literal can be made at the end.
#[derive(Default)]
pub(crate) struct LiteralCapture {
    text: String,
    xml: Vec<u8>,
    depth: usize,
    has_markup: bool,
}

impl LiteralCapture {
    /// Depth of the currently open captured element, 0 when outside any.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Writes a start tag. Top-level captured elements also get every
    /// namespace in `inherited` that they do not redeclare themselves.
    pub fn start_element(
        &mut self,
        element: &StartElement,
        inherited: &IndexMap<String, String>,
    ) -> Result<(), Error> {
        let mut start = BytesStart::new(element.name.as_str());
        for (prefix, namespace) in &element.namespaces {
            start.push_attribute((xmlns_attribute(prefix).as_str(), namespace.as_str()));
        }
        if self.depth == 0 {
            for (prefix, namespace) in inherited {
                if prefix != "xml" && !element.namespaces.iter().any(|(p, _)| p == prefix) {
                    start.push_attribute((xmlns_attribute(prefix).as_str(), namespace.as_str()));
                }
            }
        }
        for (name, value) in &element.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }

        self.write(Event::Start(start))?;
        self.depth += 1;
        self.has_markup = true;
        Ok(())
    }

    pub fn end_element(&mut self, name: &str) -> Result<(), Error> {
        self.write(Event::End(BytesEnd::new(name)))?;
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    pub fn text(&mut self, text: &str) -> Result<(), Error> {
        if text.is_empty() {
            return Ok(());
        }
        self.text.push_str(text);
        self.write(Event::Text(BytesText::new(text)))
    }

    pub fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), Error> {
        let content = if data.is_empty() {
            target.to_owned()
        } else {
            format!("{target} {data}")
        };
        self.write(Event::PI(BytesPI::new(content)))?;
        self.has_markup = true;
        Ok(())
    }

    pub fn comment(&mut self, text: &str) -> Result<(), Error> {
        self.write(Event::Comment(BytesText::from_escaped(text)))?;
        self.has_markup = true;
        Ok(())
    }

    /// Plain text collected so far, ignoring markup.
    pub fn plain_text(&self) -> &str {
        &self.text
    }

    /// Ends the capture. Markup always yields XML; so does `force_xml`.
    pub fn take(&mut self, force_xml: bool) -> Captured {
        let captured = if self.has_markup || force_xml {
            Captured::Xml(String::from_utf8_lossy(&self.xml).into_owned())
        } else {
            Captured::Text(mem::take(&mut self.text))
        };
        self.clear();
        captured
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.xml.clear();
        self.depth = 0;
        self.has_markup = false;
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), Error> {
        Writer::new(&mut self.xml)
            .write_event(event)
            .map_err(|e| Error::grammar(format!("Unable to serialize XML literal: {e}")))
    }
}

fn xmlns_attribute(prefix: &str) -> String {
    if prefix.is_empty() {
        "xmlns".to_owned()
    } else {
        format!("xmlns:{prefix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_capture_is_plain() {
        let mut capture = LiteralCapture::default();
        capture.text("a < b").unwrap();
        assert_eq!(capture.take(false), Captured::Text("a < b".to_owned()));
    }

    #[test]
    fn forced_xml_escapes_text() {
        let mut capture = LiteralCapture::default();
        capture.text("a < b").unwrap();
        assert_eq!(capture.take(true), Captured::Xml("a &lt; b".to_owned()));
    }

    #[test]
    fn top_level_elements_repeat_inherited_namespaces() {
        let mut inherited = IndexMap::new();
        inherited.insert("ex".to_owned(), "http://example.org/".to_owned());
        inherited.insert("xml".to_owned(), crate::namespace::XML_NAMESPACE.to_owned());

        let mut capture = LiteralCapture::default();
        capture.text("x").unwrap();
        capture
            .start_element(&StartElement::new("ex:b").with_attribute("a", "1"), &inherited)
            .unwrap();
        capture.text("y").unwrap();
        capture
            .start_element(&StartElement::new("ex:i"), &inherited)
            .unwrap();
        capture.end_element("ex:i").unwrap();
        capture.end_element("ex:b").unwrap();
        assert_eq!(capture.depth(), 0);

        assert_eq!(
            capture.take(false),
            Captured::Xml(
                r#"x<ex:b xmlns:ex="http://example.org/" a="1">y<ex:i></ex:i></ex:b>"#.to_owned()
            )
        );
    }
}
