use scraper::node::Node;
use scraper::{ElementRef, Html};

use crate::{Error, EventSource, StartElement, XmlEvent};

/// HTML-tolerant tokenizer.
///
/// The document is parsed with the HTML5 tree-building rules (so
/// unclosed tags and other tag soup are repaired) and the resulting tree
/// is replayed as a balanced event stream.
pub struct HtmlSource {
    events: std::vec::IntoIter<XmlEvent>,
}

impl HtmlSource {
    pub fn new(input: &str) -> Self {
        let document = Html::parse_document(input);
        for error in &document.errors {
            tracing::debug!(%error, "HTML parse error (recovered)");
        }

        Self {
            events: replay(document.root_element()).into_iter(),
        }
    }
}

impl EventSource for HtmlSource {
    fn next_event(&mut self) -> Result<Option<XmlEvent>, Error> {
        Ok(self.events.next())
    }
}

fn replay(root: ElementRef<'_>) -> Vec<XmlEvent> {
    enum Step<'a> {
        Open(ElementRef<'a>),
        Emit(XmlEvent),
    }

    let mut events = Vec::new();
    let mut stack = vec![Step::Open(root)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Emit(event) => events.push(event),
            Step::Open(element) => {
                let start = start_element(element);
                stack.push(Step::Emit(XmlEvent::ElementEnd(start.name.clone())));
                events.push(XmlEvent::ElementStart(start));

                for child in element.children().rev() {
                    match child.value() {
                        Node::Element(_) => {
                            if let Some(child) = ElementRef::wrap(child) {
                                stack.push(Step::Open(child));
                            }
                        }
                        Node::Text(text) => {
                            stack.push(Step::Emit(XmlEvent::Characters((**text).to_owned())));
                        }
                        Node::Comment(comment) => {
                            stack.push(Step::Emit(XmlEvent::Comment((**comment).to_owned())));
                        }
                        Node::ProcessingInstruction(pi) => {
                            stack.push(Step::Emit(XmlEvent::ProcessingInstruction {
                                target: (*pi.target).to_owned(),
                                data: (*pi.data).to_owned(),
                            }));
                        }
                        Node::Document | Node::Fragment | Node::Doctype(_) => {}
                    }
                }
            }
        }
    }
    events
}

fn start_element(element: ElementRef<'_>) -> StartElement {
    let el = element.value();
    let mut start = StartElement::new(el.name());
    for (qn, value) in el.attrs.iter() {
        let value = String::from(&**value);
        match (qn.prefix.as_deref(), &*qn.local) {
            (Some("xmlns"), prefix) => start.namespaces.push((prefix.to_owned(), value)),
            (None, "xmlns") => start.namespaces.push((String::new(), value)),
            // HTML elements keep `xmlns:foo` as a plain attribute name
            (None, local) if local.starts_with("xmlns:") => {
                start.namespaces.push((local["xmlns:".len()..].to_owned(), value));
            }
            (Some(prefix), local) => start.attributes.push((format!("{prefix}:{local}"), value)),
            (None, local) => start.attributes.push((local.to_owned(), value)),
        }
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_soup_is_balanced() {
        let mut source = HtmlSource::new(
            r#"<html xmlns:dc="http://purl.org/dc/terms/"><body><p property="dc:title">Hi<p>there</body></html>"#,
        );
        let mut starts = 0;
        let mut ends = 0;
        let mut texts = Vec::new();
        let mut root = None;
        while let Some(event) = source.next_event().unwrap() {
            match event {
                XmlEvent::ElementStart(start) => {
                    if root.is_none() {
                        root = Some(start);
                    }
                    starts += 1;
                }
                XmlEvent::ElementEnd(_) => ends += 1,
                XmlEvent::Characters(text) => texts.push(text),
                _ => {}
            }
        }
        assert_eq!(starts, ends);
        assert_eq!(texts, vec!["Hi", "there"]);

        let root = root.unwrap();
        assert_eq!(root.name, "html");
        assert_eq!(
            root.namespaces,
            vec![("dc".to_owned(), "http://purl.org/dc/terms/".to_owned())]
        );
    }
}
