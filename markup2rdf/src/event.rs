use crate::Error;

/// An element start tag, with namespace declarations split out of the attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartElement {
    /// The qualified name as written, e.g. `rdf:Description`.
    pub name: String,
    /// Attributes other than `xmlns`/`xmlns:*`, in document order.
    pub attributes: Vec<(String, String)>,
    /// `(prefix, namespace)` pairs; the default namespace uses the empty prefix.
    pub namespaces: Vec<(String, String)>,
}

impl StartElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.namespaces.push((prefix.into(), namespace.into()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    ElementStart(StartElement),
    ElementEnd(String),
    Characters(String),
    /// A reference to a declared entity, with its replacement text.
    EntityRef {
        name: String,
        value: String,
    },
    ProcessingInstruction {
        target: String,
        data: String,
    },
    Comment(String),
}

/// Anything that can produce a well-formed stream of [`XmlEvent`]s.
///
/// Implementations are responsible for well-formedness: every
/// `ElementStart` is eventually matched by an `ElementEnd`.
pub trait EventSource {
    fn next_event(&mut self) -> Result<Option<XmlEvent>, Error>;
}

impl EventSource for std::vec::IntoIter<XmlEvent> {
    fn next_event(&mut self) -> Result<Option<XmlEvent>, Error> {
        Ok(self.next())
    }
}
