//! Triples that are waiting for one of their ends.

use std::fmt;
use std::rc::Rc;

use oxiri::Iri;
use oxrdf::vocab::rdf;
use oxrdf::{BlankNode, Literal, NamedNode, NamedOrBlankNode, Term, Triple};

use crate::Error;
use crate::namespace::resolve_iri;

/// An RDFa subject, object, predicate or datatype before base resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resource {
    /// An IRI reference, possibly relative; resolved when the triple is emitted.
    Iri(String),
    Blank(BlankNode),
}

impl Resource {
    pub fn document() -> Self {
        Self::Iri(String::new())
    }

    pub fn is_iri(&self, iri: &str) -> bool {
        matches!(self, Self::Iri(i) if i == iri)
    }

    pub fn resolve(&self, base: Option<&Iri<String>>) -> Result<NamedOrBlankNode, Error> {
        match self {
            Self::Blank(node) => Ok(node.clone().into()),
            Self::Iri(iri) => {
                let iri = resolve_iri(base, iri)?;
                Ok(NamedNode::new_unchecked(iri.into_inner()).into())
            }
        }
    }

    fn resolve_named(&self, base: Option<&Iri<String>>) -> Result<NamedNode, Error> {
        match self.resolve(base)? {
            NamedOrBlankNode::NamedNode(node) => Ok(node),
            NamedOrBlankNode::BlankNode(_) => Err(Error::grammar(
                "A blank node can not be used as a predicate or datatype",
            )),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => f.write_str(iri),
            Self::Blank(_) => f.write_str("(blank node)"),
        }
    }
}

/// The side of an incomplete triple that is not the left-hand subject.
#[derive(Debug, Clone)]
pub(crate) enum Pending {
    /// `rel`, `rev` and `typeof`. A reverse link is emitted object first.
    Link {
        reverse: bool,
        object: Option<Rc<Resource>>,
    },
    /// `property`, waiting for the element content unless `content` was given.
    Literal {
        value: Option<String>,
        datatype: Option<Resource>,
        language: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct IncompleteTriple {
    pub left: Rc<Resource>,
    pub predicate: Resource,
    pub pending: Pending,
    /// Copied into a completed triple for a descendant's subject; such a
    /// record is dropped silently if it never completes itself.
    pub used_as_template: bool,
}

impl IncompleteTriple {
    pub fn link(left: Rc<Resource>, predicate: Resource, reverse: bool, object: Option<Rc<Resource>>) -> Self {
        Self {
            left,
            predicate,
            pending: Pending::Link { reverse, object },
            used_as_template: false,
        }
    }

    pub fn literal(
        left: Rc<Resource>,
        predicate: Resource,
        value: Option<String>,
        datatype: Option<Resource>,
        language: Option<String>,
    ) -> Self {
        Self {
            left,
            predicate,
            pending: Pending::Literal {
                value,
                datatype,
                language,
            },
            used_as_template: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        match &self.pending {
            Pending::Link { object, .. } => object.is_some(),
            Pending::Literal { value, .. } => value.is_some(),
        }
    }

    /// A copy of an open `rel`/`rev` link, completed with `object`.
    fn completed_with(&self, object: Rc<Resource>) -> Option<Self> {
        match &self.pending {
            Pending::Link {
                reverse,
                object: None,
            } => Some(Self::link(
                self.left.clone(),
                self.predicate.clone(),
                *reverse,
                Some(object),
            )),
            _ => None,
        }
    }

    /// Resolves every part against `base`. `Ok(None)` if still incomplete.
    pub fn to_triple(&self, base: Option<&Iri<String>>) -> Result<Option<Triple>, Error> {
        if !self.is_complete() {
            return Ok(None);
        }
        let left = self.left.resolve(base)?;
        let predicate = self.predicate.resolve_named(base)?;
        let triple = match &self.pending {
            Pending::Link { object: None, .. } | Pending::Literal { value: None, .. } => {
                return Ok(None);
            }
            Pending::Link {
                reverse,
                object: Some(object),
            } => {
                let object = object.resolve(base)?;
                if *reverse {
                    Triple::new(object, predicate, left)
                } else {
                    Triple::new(left, predicate, object)
                }
            }
            Pending::Literal {
                value: Some(value),
                datatype,
                language,
            } => {
                let literal = match (datatype, language) {
                    (Some(datatype), _) => {
                        Literal::new_typed_literal(value.as_str(), datatype.resolve_named(base)?)
                    }
                    (None, Some(language)) => {
                        Literal::new_language_tagged_literal_unchecked(value.as_str(), language.as_str())
                    }
                    (None, None) => Literal::new_simple_literal(value.as_str()),
                };
                Triple::new(left, predicate, Term::from(literal))
            }
        };
        Ok(Some(triple))
    }

    /// The warning for a record that is dropped without completing.
    pub fn unresolved_message(&self) -> String {
        match &self.pending {
            Pending::Link { reverse: true, .. } => format!(
                "Predicate {} with object {} has no subject",
                self.predicate, self.left
            ),
            _ => format!(
                "Property {} of subject {} has no value",
                self.predicate, self.left
            ),
        }
    }
}

/// Per-scope buffer of [`IncompleteTriple`]s.
#[derive(Debug, Default)]
pub(crate) struct IncompleteBuffer {
    records: Vec<IncompleteTriple>,
}

impl IncompleteBuffer {
    pub fn push(&mut self, record: IncompleteTriple) {
        self.records.push(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Moves every record to the end of `parent`.
    pub fn transfer_into(&mut self, parent: &mut IncompleteBuffer) {
        parent.records.append(&mut self.records);
    }

    /// Completes a copy of every open link with `object`, marking the
    /// originals as templates.
    pub fn instantiate_links(&mut self, object: &Rc<Resource>) -> Vec<IncompleteTriple> {
        self.records
            .iter_mut()
            .rev()
            .filter_map(|record| {
                let copy = record.completed_with(object.clone())?;
                record.used_as_template = true;
                Some(copy)
            })
            .collect()
    }

    pub fn has_open_literals(&self) -> bool {
        self.records
            .iter()
            .any(|r| matches!(r.pending, Pending::Literal { value: None, .. }))
    }

    /// Gives every property record still waiting for content `value`.
    /// XML content also replaces the datatype with `rdf:XMLLiteral`.
    pub fn fill_literals(&mut self, content: &str, xml: bool) {
        for record in &mut self.records {
            if let Pending::Literal {
                value: value @ None,
                datatype,
                language,
            } = &mut record.pending
            {
                *value = Some(content.to_owned());
                if xml {
                    *datatype = Some(Resource::Iri(rdf::XML_LITERAL.as_str().to_owned()));
                    *language = None;
                }
            }
        }
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, IncompleteTriple> {
        self.records.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Resource {
        Resource::Iri(s.to_owned())
    }

    #[test]
    fn open_links_become_templates() {
        let mut buffer = IncompleteBuffer::default();
        let subject = Rc::new(iri("#a"));
        buffer.push(IncompleteTriple::link(subject.clone(), iri("http://ex/p"), false, None));
        buffer.push(IncompleteTriple::literal(subject, iri("http://ex/name"), None, None, None));

        let object = Rc::new(iri("#b"));
        let copies = buffer.instantiate_links(&object);
        assert_eq!(copies.len(), 1);

        let base = Iri::parse("http://example.org/doc".to_owned()).unwrap();
        let triple = copies[0].to_triple(Some(&base)).unwrap().unwrap();
        assert_eq!(
            triple.to_string(),
            "<http://example.org/doc#a> <http://ex/p> <http://example.org/doc#b>"
        );

        let records: Vec<_> = buffer.drain().collect();
        assert!(records[0].used_as_template);
        assert!(!records[0].is_complete());
        assert_eq!(
            records[1].unresolved_message(),
            "Property http://ex/name of subject #a has no value"
        );
    }

    #[test]
    fn reverse_links_swap_ends() {
        let record = IncompleteTriple::link(
            Rc::new(iri("http://ex/s")),
            iri("http://ex/p"),
            true,
            Some(Rc::new(iri("http://ex/o"))),
        );
        let triple = record.to_triple(None).unwrap().unwrap();
        assert_eq!(
            triple.to_string(),
            "<http://ex/o> <http://ex/p> <http://ex/s>"
        );
    }

    #[test]
    fn xml_content_overrides_datatype_and_language() {
        let mut buffer = IncompleteBuffer::default();
        buffer.push(IncompleteTriple::literal(
            Rc::new(iri("http://ex/s")),
            iri("http://ex/p"),
            None,
            None,
            Some("en".to_owned()),
        ));
        assert!(buffer.has_open_literals());
        buffer.fill_literals("<b>hi</b>", true);
        assert!(!buffer.has_open_literals());

        let record = buffer.drain().next().unwrap();
        let triple = record.to_triple(None).unwrap().unwrap();
        assert_eq!(
            triple.to_string(),
            "<http://ex/s> <http://ex/p> \"<b>hi</b>\"^^<http://www.w3.org/1999/02/22-rdf-syntax-ns#XMLLiteral>"
        );
    }

    #[test]
    fn relative_iri_without_base_is_an_error() {
        let record = IncompleteTriple::literal(
            Rc::new(iri("#x")),
            iri("http://ex/p"),
            Some("v".to_owned()),
            None,
            None,
        );
        assert!(record.to_triple(None).is_err());
    }
}
