//! The RDF/XML grammar.
//!
//! Every element gets a [`RdfXmlScope`] whose [`ParseType`] is decided from
//! the element name, the *outer* scope's parse type and the element's
//! attributes. Triples are emitted as soon as both ends are known: typed
//! node and property-attribute triples at element start, everything else
//! at element end.

use std::collections::HashMap;
use std::str::FromStr;

use icu::locale::LanguageIdentifier;
use oxiri::Iri;
use oxrdf::vocab::rdf;
use oxrdf::{BlankNode, Literal, NamedNode, NamedOrBlankNode, TripleRef};

use crate::driver::{DocumentGrammar, Output};
use crate::literal::{Captured, LiteralCapture};
use crate::namespace::{ExpandedName, FrameId, NamespaceResolver, XML_NAMESPACE, resolve_iri};
use crate::scope::{Recycle, ScopeStack};
use crate::{Error, StartElement, rdf_vocab};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ParseType {
    /// Outside any RDF content, or directly in the document root.
    #[default]
    TopLevel,
    /// Inside `rdf:RDF`: children are node elements.
    Resource,
    /// A node element: children are property elements.
    PropList,
    /// A property element that has not yet seen either a node or text.
    ResOrLit,
    /// A property element whose object came from its attributes.
    EmptyProp,
    Literal,
    Collection,
}

/// A value inherited from the outer scope that may be overridden at most
/// once per element.
struct Inheritable<T> {
    value: Option<T>,
    set_here: bool,
}

impl<T> Default for Inheritable<T> {
    fn default() -> Self {
        Self {
            value: None,
            set_here: false,
        }
    }
}

impl<T: Clone> Inheritable<T> {
    fn inherit(&mut self, outer: &Self) {
        self.value = outer.value.clone();
        self.set_here = false;
    }

    fn set(&mut self, value: Option<T>, raw_name: &str) -> Result<(), Error> {
        if self.set_here {
            return Err(Error::grammar(format!("Attribute '{raw_name}' is used twice")));
        }
        self.value = value;
        self.set_here = true;
        Ok(())
    }

    fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

fn check_ncname(value: &str, attribute: &str) -> Result<(), Error> {
    if rxml_validation::validate_ncname(value).is_err() {
        return Err(Error::grammar(format!(
            "Value '{value}' of attribute '{attribute}' is not a valid XML name"
        )));
    }
    Ok(())
}

fn set_once<T>(slot: &mut Option<T>, value: T, message: &'static str) -> Result<(), Error> {
    if slot.is_some() {
        return Err(Error::grammar(message));
    }
    *slot = Some(value);
    Ok(())
}

#[derive(Default)]
struct RdfXmlScope {
    parse_type: ParseType,
    frame: Option<FrameId>,
    base: Inheritable<Iri<String>>,
    language: Inheritable<String>,
    /// The node described by a node element, or the object of a property element.
    subject: Option<NamedOrBlankNode>,
    predicate: Option<NamedNode>,
    datatype: Option<NamedNode>,
    reification: Option<NamedNode>,
    collection: Vec<NamedOrBlankNode>,
    li_counter: u32,
    literal: LiteralCapture,
    /// Set by `rdf:parseType="Literal"`, which always yields an XML literal.
    explicit_literal: bool,
    /// Whitespace seen while the parse type was still undecided.
    whitespace: String,
}

impl Recycle for RdfXmlScope {
    fn recycle(&mut self) {
        self.parse_type = ParseType::TopLevel;
        self.frame = None;
        self.base = Inheritable::default();
        self.language = Inheritable::default();
        self.subject = None;
        self.predicate = None;
        self.datatype = None;
        self.reification = None;
        self.collection.clear();
        self.li_counter = 0;
        self.literal.clear();
        self.explicit_literal = false;
        self.whitespace.clear();
    }
}

/// Where an element sits, judged from its outer scope.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Position {
    Node,
    Property,
}

pub(crate) struct RdfXmlGrammar {
    scopes: ScopeStack<RdfXmlScope>,
    namespaces: NamespaceResolver,
    node_ids: HashMap<String, BlankNode>,
}

impl RdfXmlGrammar {
    pub fn new(base: Option<Iri<String>>) -> Self {
        Self {
            scopes: ScopeStack::new(|root: &mut RdfXmlScope| root.base.value = base),
            namespaces: NamespaceResolver::new(),
            node_ids: HashMap::new(),
        }
    }

    fn start_literal_child(&mut self, element: &StartElement) -> Result<(), Error> {
        let top = self.scopes.top();
        let inherited = if top.literal.depth() == 0 {
            self.namespaces.in_scope(top.frame)
        } else {
            Default::default()
        };
        self.scopes.top_mut().literal.start_element(element, &inherited)
    }

    /// Switches a `RES_OR_LIT` scope to literal content.
    fn become_literal(&mut self) -> Result<(), Error> {
        let scope = self.scopes.top_mut();
        if scope.subject.is_some() {
            return Err(Error::grammar(
                "Conflicting content: property value can not be a node and a literal simultaneously",
            ));
        }
        scope.parse_type = ParseType::Literal;
        let whitespace = std::mem::take(&mut scope.whitespace);
        scope.literal.text(&whitespace)
    }

    fn classify(
        &mut self,
        element: &StartElement,
        name: &ExpandedName,
        outer_type: ParseType,
    ) -> Result<(ParseType, Option<NamedNode>, Option<NamedNode>), Error> {
        let in_proplist = outer_type == ParseType::PropList;
        if name.namespace == rdf_vocab::NAMESPACE {
            match name.local.as_str() {
                "RDF" => {
                    if outer_type != ParseType::TopLevel {
                        return Err(Error::grammar("Element rdf:RDF can appear only at top level"));
                    }
                    return Ok((ParseType::Resource, None, None));
                }
                "Description" => {
                    if in_proplist {
                        return Err(Error::grammar(
                            "Element rdf:Description can not appear in list of properties",
                        ));
                    }
                    return Ok((ParseType::PropList, None, None));
                }
                "li" if in_proplist => {
                    let outer = self.scopes.top_mut();
                    outer.li_counter += 1;
                    let predicate = NamedNode::new_unchecked(format!(
                        "{}_{}",
                        rdf_vocab::NAMESPACE,
                        outer.li_counter
                    ));
                    return Ok((ParseType::ResOrLit, Some(predicate), None));
                }
                _ if in_proplist => {}
                "Property" | "Bag" | "Seq" | "Alt" | "List" | "Statement" => {}
                _ => {
                    return Err(Error::grammar(format!(
                        "Unknown element '{}' in RDF namespace",
                        element.name
                    )));
                }
            }
        }

        let iri = name.iri();
        let node = NamedNode::new(iri.as_str()).map_err(|source| Error::iri(source, iri))?;
        if in_proplist {
            Ok((ParseType::ResOrLit, Some(node), None))
        } else {
            Ok((ParseType::PropList, None, Some(node)))
        }
    }

    fn emit_reification(
        out: &mut Output<'_>,
        statement: &NamedNode,
        subject: &NamedOrBlankNode,
        predicate: &NamedNode,
        object: impl Into<oxrdf::Term>,
    ) {
        let object = object.into();
        out.emit(TripleRef::new(statement, rdf::SUBJECT, subject).into_owned());
        out.emit(TripleRef::new(statement, rdf::PREDICATE, predicate).into_owned());
        out.emit(TripleRef::new(statement, rdf::OBJECT, &object).into_owned());
        out.emit(TripleRef::new(statement, rdf::TYPE, rdf::STATEMENT).into_owned());
    }

    /// Emits the triple linking a property element to its object, plus
    /// reification if the property carried `rdf:ID`.
    fn emit_property(
        out: &mut Output<'_>,
        subject: Option<&NamedOrBlankNode>,
        predicate: &NamedNode,
        object: oxrdf::Term,
        reification: Option<&NamedNode>,
    ) -> Result<(), Error> {
        let Some(subject) = subject else {
            return Err(Error::grammar(format!(
                "Property <{}> has no subject",
                predicate.as_str()
            )));
        };
        out.emit(TripleRef::new(subject, predicate, &object).into_owned());
        if let Some(statement) = reification {
            Self::emit_reification(out, statement, subject, predicate, object);
        }
        Ok(())
    }

    fn end_literal(&mut self, out: &mut Output<'_>) -> Result<(), Error> {
        let Some((inner, outer)) = self.scopes.top_and_parent_mut() else {
            return Ok(());
        };
        let Some(predicate) = inner.predicate.as_ref() else {
            return Ok(());
        };

        let literal = match inner.literal.take(inner.explicit_literal) {
            Captured::Xml(xml) => match &inner.datatype {
                Some(datatype) if !inner.explicit_literal => {
                    Literal::new_typed_literal(xml, datatype.clone())
                }
                _ => Literal::new_typed_literal(xml, rdf::XML_LITERAL),
            },
            Captured::Text(text) => match (&inner.datatype, inner.language.get()) {
                (Some(datatype), _) => Literal::new_typed_literal(text, datatype.clone()),
                (None, Some(language)) => {
                    Literal::new_language_tagged_literal_unchecked(text, language.as_str())
                }
                (None, None) => Literal::new_simple_literal(text),
            },
        };
        Self::emit_property(
            out,
            outer.subject.as_ref(),
            predicate,
            literal.into(),
            inner.reification.as_ref(),
        )
    }

    fn end_collection(&mut self, out: &mut Output<'_>) -> Result<(), Error> {
        let Some((inner, outer)) = self.scopes.top_and_parent_mut() else {
            return Ok(());
        };
        let Some(predicate) = inner.predicate.as_ref() else {
            return Ok(());
        };

        let cells: Vec<BlankNode> = inner.collection.iter().map(|_| BlankNode::default()).collect();
        for (i, (cell, item)) in cells.iter().zip(&inner.collection).enumerate() {
            out.emit(TripleRef::new(cell, rdf::FIRST, item).into_owned());
            match cells.get(i + 1) {
                Some(next) => out.emit(TripleRef::new(cell, rdf::REST, next).into_owned()),
                None => out.emit(TripleRef::new(cell, rdf::REST, rdf::NIL).into_owned()),
            }
        }

        let head: oxrdf::Term = match cells.first() {
            Some(head) => head.clone().into(),
            None => rdf::NIL.into_owned().into(),
        };
        Self::emit_property(
            out,
            outer.subject.as_ref(),
            predicate,
            head,
            inner.reification.as_ref(),
        )
    }
}

impl DocumentGrammar for RdfXmlGrammar {
    fn element_start(&mut self, element: &StartElement, out: &mut Output<'_>) -> Result<(), Error> {
        let outer_type = self.scopes.top().parse_type;
        match outer_type {
            ParseType::Literal => return self.start_literal_child(element),
            ParseType::EmptyProp => {
                return Err(Error::grammar(
                    "Sub-element in a predicate element with object node attribute",
                ));
            }
            ParseType::ResOrLit => self.scopes.top_mut().whitespace.clear(),
            _ => {}
        }

        let outer_frame = self.scopes.top().frame;
        let frame = self.namespaces.push(outer_frame, &element.namespaces);
        let name = self.namespaces.resolve(Some(frame), &element.name, true)?;
        if name.namespace.is_empty() {
            return Err(Error::grammar(format!(
                "Element '{}' has no namespace",
                element.name
            )));
        }

        let (mut parse_type, predicate, node_type) = self.classify(element, &name, outer_type)?;
        let position = if predicate.is_some() {
            Position::Property
        } else {
            Position::Node
        };
        let is_rdf_root = parse_type == ParseType::Resource;

        let (inner, outer) = {
            self.scopes.push();
            match self.scopes.top_and_parent_mut() {
                Some(pair) => pair,
                None => return Err(Error::grammar("Scope stack is empty")),
            }
        };
        inner.frame = Some(frame);
        inner.base.inherit(&outer.base);
        inner.language.inherit(&outer.language);
        inner.predicate = predicate;

        // xml:* attributes first, so xml:base applies to every other attribute
        for (raw, value) in &element.attributes {
            let Some(local) = raw.strip_prefix("xml:") else {
                continue;
            };
            match local {
                "lang" if value.is_empty() => inner.language.set(None, raw)?,
                "lang" => match LanguageIdentifier::from_str(value) {
                    Ok(language) => inner.language.set(Some(language.to_string()), raw)?,
                    Err(e) => out.warn(format!("Invalid language identifier ({value}): {e}")),
                },
                "base" => {
                    let base = resolve_iri(inner.base.get(), value)?;
                    inner.base.set(Some(base), raw)?;
                }
                "space" => {}
                _ => out.warn(
                    "Unsupported 'xml:...' attribute, only 'xml:lang', 'xml:base' and 'xml:space' are supported",
                ),
            }
        }

        let mut property_attributes = Vec::new();
        let mut has_datatype = false;
        let mut resource_parse_type = false;
        let mut collection = false;
        for (raw, value) in &element.attributes {
            if raw.starts_with("xml:") {
                continue;
            }
            if is_rdf_root {
                out.warn(format!("Unsupported attribute '{raw}' on rdf:RDF"));
                continue;
            }
            let attribute = self.namespaces.resolve(Some(frame), raw, false)?;
            if attribute.namespace.is_empty() {
                out.warn(format!("Attribute '{raw}' has no namespace and is ignored"));
                continue;
            }
            if attribute.namespace == XML_NAMESPACE {
                continue;
            }
            if attribute.namespace != rdf_vocab::NAMESPACE {
                property_attributes.push((attribute, value));
                continue;
            }

            match attribute.local.as_str() {
                "about" => {
                    if position == Position::Property {
                        return Err(Error::grammar(
                            "Attribute 'rdf:about' can not appear in element that is supposed to be property name",
                        ));
                    }
                    let iri = resolve_iri(inner.base.get(), value)?;
                    set_once(
                        &mut inner.subject,
                        NamedNode::new_unchecked(iri.into_inner()).into(),
                        "Attribute 'rdf:about' conflicts with other attribute that set the subject",
                    )?;
                }
                "resource" => {
                    if position == Position::Node {
                        return Err(Error::grammar(
                            "Attribute 'rdf:resource' can appear only in element that is supposed to be property name",
                        ));
                    }
                    let iri = resolve_iri(inner.base.get(), value)?;
                    set_once(
                        &mut inner.subject,
                        NamedNode::new_unchecked(iri.into_inner()).into(),
                        "Attribute 'rdf:resource' conflicts with other attribute that set the subject",
                    )?;
                }
                "nodeID" => {
                    check_ncname(value, raw)?;
                    let node = self.node_ids.entry(value.clone()).or_default().clone();
                    set_once(
                        &mut inner.subject,
                        node.into(),
                        "Attribute 'rdf:nodeID' conflicts with other attribute that set the subject",
                    )?;
                }
                "ID" => {
                    check_ncname(value, raw)?;
                    let iri = resolve_iri(inner.base.get(), &format!("#{value}"))?;
                    let node = NamedNode::new_unchecked(iri.into_inner());
                    if position == Position::Property {
                        set_once(
                            &mut inner.reification,
                            node,
                            "Reification ID of the statement is set twice by 'rdf:ID' attribute of a property element",
                        )?;
                    } else {
                        set_once(
                            &mut inner.subject,
                            node.into(),
                            "Attribute 'rdf:ID' conflicts with other attribute that set node ID",
                        )?;
                    }
                }
                "datatype" => {
                    if position == Position::Node {
                        return Err(Error::grammar(
                            "Attribute 'rdf:datatype' can appear only in property elements",
                        ));
                    }
                    let iri = resolve_iri(inner.base.get(), value)?;
                    set_once(
                        &mut inner.datatype,
                        NamedNode::new_unchecked(iri.into_inner()),
                        "Attribute 'rdf:datatype' is used twice",
                    )?;
                    has_datatype = true;
                }
                "parseType" => {
                    if position == Position::Node {
                        return Err(Error::grammar(
                            "Attribute 'rdf:parseType' can appear only in property elements",
                        ));
                    }
                    match value.as_str() {
                        "Resource" => resource_parse_type = true,
                        "Literal" => inner.explicit_literal = true,
                        "Collection" => collection = true,
                        _ => {
                            return Err(Error::grammar(format!("Unknown parseType '{value}'")));
                        }
                    }
                }
                "type" | "value" => property_attributes.push((attribute, value)),
                _ => {
                    out.warn(format!("Unsupported '{raw}' attribute"));
                    property_attributes.push((attribute, value));
                }
            }
        }

        if position == Position::Property {
            let has_node = inner.subject.is_some() || !property_attributes.is_empty();
            parse_type = if collection {
                if has_node || has_datatype {
                    return Err(Error::grammar(
                        "Attribute parseType='Collection' can not be combined with an object node",
                    ));
                }
                ParseType::Collection
            } else if has_datatype || inner.explicit_literal {
                if has_node || resource_parse_type {
                    return Err(Error::grammar(
                        "Conflicting attributes: property value can not be a node and a literal simultaneously",
                    ));
                }
                ParseType::Literal
            } else if resource_parse_type {
                set_once(
                    &mut inner.subject,
                    BlankNode::default().into(),
                    "Attribute parseType='Resource' can not be used if object is set by other attribute",
                )?;
                if !property_attributes.is_empty() {
                    return Err(Error::grammar(
                        "Attribute parseType='Resource' can not be combined with property attributes",
                    ));
                }
                ParseType::PropList
            } else if has_node {
                if inner.subject.is_none() {
                    inner.subject = Some(BlankNode::default().into());
                }
                ParseType::EmptyProp
            } else {
                ParseType::ResOrLit
            };
        } else if position == Position::Node && parse_type == ParseType::PropList {
            if inner.subject.is_none() {
                inner.subject = Some(BlankNode::default().into());
            }
        }
        inner.parse_type = parse_type;
        tracing::trace!(element = %element.name, ?parse_type, "scope pushed");

        // a node element nested in a property element becomes its object
        if position == Position::Node && outer.parse_type == ParseType::ResOrLit {
            if let Some(subject) = &inner.subject {
                set_once(
                    &mut outer.subject,
                    subject.clone(),
                    "A property can not have two object values",
                )?;
            }
        }

        let Some(subject) = inner.subject.clone() else {
            return Ok(());
        };
        if let Some(node_type) = node_type {
            out.emit(TripleRef::new(&subject, rdf::TYPE, &node_type).into_owned());
        }
        for (attribute, value) in property_attributes {
            let iri = attribute.iri();
            let predicate = NamedNode::new(iri.as_str()).map_err(|source| Error::iri(source, iri))?;
            let object = match inner.language.get() {
                Some(language) => {
                    Literal::new_language_tagged_literal_unchecked(value.as_str(), language.as_str())
                }
                None => Literal::new_simple_literal(value.as_str()),
            };
            out.emit(TripleRef::new(&subject, &predicate, &object).into_owned());
        }

        // parseType="Resource": link now, children describe the fresh node
        if position == Position::Property && parse_type == ParseType::PropList {
            if let Some(predicate) = inner.predicate.take() {
                Self::emit_property(
                    out,
                    outer.subject.as_ref(),
                    &predicate,
                    subject.into(),
                    inner.reification.as_ref(),
                )?;
            }
        }
        Ok(())
    }

    fn element_end(&mut self, name: &str, out: &mut Output<'_>) -> Result<(), Error> {
        let (parse_type, literal_depth) = {
            let top = self.scopes.top();
            (top.parse_type, top.literal.depth())
        };
        if parse_type == ParseType::Literal && literal_depth > 0 {
            return self.scopes.top_mut().literal.end_element(name);
        }

        let outer_type = self.scopes.parent().map(|outer| outer.parse_type);
        match parse_type {
            ParseType::Literal => self.end_literal(out)?,
            ParseType::Collection => self.end_collection(out)?,
            _ if outer_type == Some(ParseType::Collection) => {
                if let Some((inner, outer)) = self.scopes.top_and_parent_mut() {
                    let item = inner
                        .subject
                        .take()
                        .unwrap_or_else(|| BlankNode::default().into());
                    outer.collection.push(item);
                }
            }
            _ => {
                if let Some((inner, outer)) = self.scopes.top_and_parent_mut() {
                    if let Some(predicate) = inner.predicate.as_ref() {
                        let object = inner
                            .subject
                            .get_or_insert_with(|| BlankNode::default().into())
                            .clone();
                        Self::emit_property(
                            out,
                            outer.subject.as_ref(),
                            predicate,
                            object.into(),
                            inner.reification.as_ref(),
                        )?;
                    }
                }
            }
        }

        if let Some(frame) = self.scopes.top().frame {
            self.namespaces.pop(frame);
        }
        tracing::trace!(element = %name, "scope popped");
        self.scopes.pop();
        Ok(())
    }

    fn characters(&mut self, text: &str, _out: &mut Output<'_>) -> Result<(), Error> {
        let is_blank = text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
        match self.scopes.top().parse_type {
            ParseType::Literal => self.scopes.top_mut().literal.text(text),
            ParseType::ResOrLit if is_blank => {
                self.scopes.top_mut().whitespace.push_str(text);
                Ok(())
            }
            ParseType::ResOrLit => {
                self.become_literal()?;
                self.scopes.top_mut().literal.text(text)
            }
            _ if is_blank => Ok(()),
            _ => Err(Error::grammar(
                "Non-whitespace character found instead of XML element",
            )),
        }
    }

    fn entity_ref(&mut self, _name: &str, value: &str, _out: &mut Output<'_>) -> Result<(), Error> {
        match self.scopes.top().parse_type {
            ParseType::Literal => self.scopes.top_mut().literal.text(value),
            ParseType::ResOrLit => {
                self.become_literal()?;
                self.scopes.top_mut().literal.text(value)
            }
            _ => Err(Error::grammar("Entity found instead of XML element")),
        }
    }

    fn processing_instruction(
        &mut self,
        target: &str,
        data: &str,
        _out: &mut Output<'_>,
    ) -> Result<(), Error> {
        match self.scopes.top().parse_type {
            ParseType::Literal => self
                .scopes
                .top_mut()
                .literal
                .processing_instruction(target, data),
            ParseType::TopLevel => Ok(()),
            ParseType::ResOrLit => {
                self.become_literal()?;
                self.scopes
                    .top_mut()
                    .literal
                    .processing_instruction(target, data)
            }
            _ => Err(Error::grammar(
                "Processing instruction found instead of XML element",
            )),
        }
    }

    fn comment(&mut self, text: &str, _out: &mut Output<'_>) -> Result<(), Error> {
        if self.scopes.top().parse_type == ParseType::Literal {
            self.scopes.top_mut().literal.comment(text)?;
        }
        Ok(())
    }

    fn finish(&mut self, _out: &mut Output<'_>) -> Result<(), Error> {
        if self.scopes.depth() > 1 {
            return Err(Error::grammar("Unexpected end of input inside an open element"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inheritable_values_are_set_once_per_scope() {
        let mut outer = Inheritable::default();
        outer.set(Some("en".to_owned()), "xml:lang").unwrap();

        let mut inner = Inheritable::default();
        inner.inherit(&outer);
        assert_eq!(inner.get().map(String::as_str), Some("en"));
        inner.set(None, "xml:lang").unwrap();
        assert_eq!(inner.get(), None);

        let error = inner.set(Some("de".to_owned()), "xml:lang").unwrap_err();
        assert_eq!(error.to_string(), "Attribute 'xml:lang' is used twice");
    }
}
