//! The RDFa grammar.
//!
//! Only elements that carry RDFa attributes, namespace declarations or
//! document structure (`html`, `head`, `body`, `base`) get a scope of
//! their own; every other element just bumps its parent's `boring`
//! counter. A scope's subject may be the very same `Rc` as its parent's
//! object, and pointer identity is what decides whether an element
//! introduced a new subject.
//!
//! Triples whose object is not known yet, or whose references cannot be
//! resolved until the head's `<base>` has been seen, wait in the scope's
//! [`IncompleteBuffer`].

mod incomplete;
mod place;
mod token;

use std::collections::HashMap;
use std::rc::Rc;
use std::str::FromStr;

use curie::Curie;
use icu::locale::LanguageIdentifier;
use itertools::Itertools;
use oxiri::Iri;
use oxrdf::BlankNode;
use oxrdf::vocab::rdf;
use vec1::Vec1;

use crate::driver::{DocumentGrammar, Output};
use crate::literal::{Captured, LiteralCapture};
use crate::namespace::{FrameId, NamespaceResolver, resolve_iri};
use crate::scope::{Recycle, ScopeStack};
use crate::{Error, StartElement, initial_context_prefixes, xhv_vocab};

use incomplete::{IncompleteBuffer, IncompleteTriple, Resource};
use place::{LiteralMode, Place};
use token::{AttrSyntax, Token, Tokens, tokenize};

/// Attributes that make an element worth a scope.
const RDFA_ATTRIBUTES: [&str; 14] = [
    "about", "content", "datatype", "href", "lang", "prefix", "property", "rel", "resource",
    "rev", "src", "typeof", "xml:base", "xml:lang",
];

enum Attr<T> {
    Missing,
    Empty,
    Value(T),
}

impl<T> Attr<T> {
    fn is_present(&self) -> bool {
        !matches!(self, Attr::Missing)
    }

    fn value(&self) -> Option<&T> {
        match self {
            Attr::Value(v) => Some(v),
            Attr::Missing | Attr::Empty => None,
        }
    }

    fn into_value(self) -> Option<T> {
        match self {
            Attr::Value(v) => Some(v),
            Attr::Missing | Attr::Empty => None,
        }
    }
}

impl Attr<Vec<Resource>> {
    fn into_list(self) -> Attr<Vec1<Resource>> {
        match self {
            Attr::Missing => Attr::Missing,
            Attr::Empty => Attr::Empty,
            Attr::Value(v) => Vec1::try_from_vec(v).map_or(Attr::Empty, Attr::Value),
        }
    }

    /// The first value. An attribute whose only token could not be
    /// expanded counts as missing.
    fn into_single(self) -> Attr<Resource> {
        match self {
            Attr::Missing => Attr::Missing,
            Attr::Empty => Attr::Empty,
            Attr::Value(v) => v.into_iter().next().map_or(Attr::Missing, Attr::Value),
        }
    }
}

fn same(a: Option<&Rc<Resource>>, b: Option<&Rc<Resource>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

#[derive(Default)]
struct RdfaScope {
    place: Place,
    frame: Option<FrameId>,
    base: Option<Iri<String>>,
    subject: Option<Rc<Resource>>,
    object: Option<Rc<Resource>>,
    language: Option<String>,
    /// Open descendants that have no scope of their own.
    boring: usize,
    incomplete: IncompleteBuffer,
    /// Literal content, or the text of a `<base>` without `href`.
    literal: LiteralCapture,
}

impl Recycle for RdfaScope {
    fn recycle(&mut self) {
        self.place = Place::default();
        self.frame = None;
        self.base = None;
        self.subject = None;
        self.object = None;
        self.language = None;
        self.boring = 0;
        self.incomplete.clear();
        self.literal.clear();
    }
}

/// How attribute values of one element are turned into resources.
struct Expansion<'a> {
    frame: FrameId,
    base: Option<&'a Iri<String>>,
    /// Outside `<head>`, references are resolved against the element's
    /// base straight away.
    resolve_now: bool,
}

pub(crate) struct RdfaGrammar {
    scopes: ScopeStack<RdfaScope>,
    namespaces: NamespaceResolver,
    blank_nodes: HashMap<String, BlankNode>,
    initial_context: bool,
}

impl RdfaGrammar {
    pub fn new(base: Option<Iri<String>>, initial_context: bool) -> Self {
        Self {
            scopes: ScopeStack::new(|root: &mut RdfaScope| root.base = base),
            namespaces: NamespaceResolver::new(),
            blank_nodes: HashMap::new(),
            initial_context,
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

    /// Binds the `prefix="p: uri ..."` pairs in `frame`.
    fn bind_prefixes(&mut self, frame: FrameId, value: &str, out: &mut Output<'_>) {
        let mut pairs = value.split_ascii_whitespace().tuples();
        for (prefix, namespace) in pairs.by_ref() {
            match prefix.strip_suffix(':') {
                Some(prefix) if !prefix.is_empty() && prefix != "_" => {
                    self.namespaces.bind(frame, prefix, namespace)
                }
                _ => out.warn(format!(
                    "Malformed prefix declaration \"{prefix} {namespace}\" in attribute \"prefix\""
                )),
            }
        }
        if pairs.into_buffer().next().is_some() {
            out.warn("Attribute \"prefix\" ends with a prefix that has no namespace");
        }
    }

    /// Replaces the base of the scope at `depth` and of every ancestor
    /// still inside `<html>`.
    fn set_base(&mut self, depth: usize, base: &Iri<String>) {
        for depth in (0..=depth).rev() {
            let scope = self.scopes.at_mut(depth);
            if !scope.place.in_html {
                break;
            }
            scope.base = Some(base.clone());
        }
    }

    fn expand_curie(&self, frame: FrameId, prefix: &str, local: &str) -> Option<String> {
        if let Some(namespace) = self.namespaces.lookup(Some(frame), prefix) {
            return Some(format!("{namespace}{local}"));
        }
        if !self.initial_context {
            return None;
        }
        initial_context_prefixes()
            .expand_curie(&Curie::new(Some(prefix), local))
            .ok()
    }

    fn expand_token(
        &mut self,
        token: Token<'_>,
        attribute: &str,
        ctx: &Expansion<'_>,
        out: &mut Output<'_>,
    ) -> Option<Resource> {
        let resource = match token {
            Token::Curie { prefix: "", local } => {
                Resource::Iri(format!("{}{local}", xhv_vocab::NAMESPACE))
            }
            Token::Reserved(word) => Resource::Iri(format!("{}{word}", xhv_vocab::NAMESPACE)),
            Token::Curie { prefix, local } => match self.expand_curie(ctx.frame, prefix, local) {
                Some(iri) => Resource::Iri(iri),
                None => {
                    out.warn(format!(
                        "Bad token in the value of attribute \"{attribute}\" (undeclared namespace?)"
                    ));
                    return None;
                }
            },
            Token::Blank(label) => {
                Resource::Blank(self.blank_nodes.entry(label.to_owned()).or_default().clone())
            }
            Token::EmptySafe => self
                .scopes
                .ancestors()
                .find_map(|scope| scope.subject.as_deref().cloned())
                .unwrap_or_else(Resource::document),
            Token::Uri(uri) => Resource::Iri(uri.to_owned()),
            Token::Empty => Resource::document(),
        };

        match resource {
            Resource::Iri(iri) if ctx.resolve_now => match resolve_iri(ctx.base, &iri) {
                Ok(iri) => Some(Resource::Iri(iri.into_inner())),
                Err(error) => {
                    out.warn(format!("{error} in attribute \"{attribute}\""));
                    None
                }
            },
            resource => Some(resource),
        }
    }

    fn attribute(
        &mut self,
        element: &StartElement,
        name: &str,
        syntax: AttrSyntax,
        ctx: &Expansion<'_>,
        out: &mut Output<'_>,
    ) -> Attr<Vec<Resource>> {
        let Some(value) = element.attribute(name) else {
            return Attr::Missing;
        };
        let Tokens { tokens, problems } = tokenize(name, value, syntax);
        for problem in problems {
            out.warn(problem);
        }
        if tokens == [Token::Empty] {
            return Attr::Empty;
        }
        let resources = tokens
            .into_iter()
            .filter_map(|token| self.expand_token(token, name, ctx, out))
            .collect();
        Attr::Value(resources)
    }

    /// Emits `record` if the scope at `depth` may emit and the record is
    /// complete; buffers it otherwise.
    fn feed_or_make(&mut self, depth: usize, record: IncompleteTriple, out: &mut Output<'_>) {
        let scope = self.scopes.at_mut(depth);
        if !scope.place.emits_immediately() || !record.is_complete() {
            scope.incomplete.push(record);
            return;
        }
        match record.to_triple(scope.base.as_ref()) {
            Ok(Some(triple)) => out.emit(triple),
            Ok(None) => scope.incomplete.push(record),
            Err(error) => out.warn(error.to_string()),
        }
    }

    fn finalize(buffer: &mut IncompleteBuffer, base: Option<&Iri<String>>, out: &mut Output<'_>) {
        for record in buffer.drain() {
            match record.to_triple(base) {
                Ok(Some(triple)) => out.emit(triple),
                Ok(None) if record.used_as_template => {}
                Ok(None) => out.warn(record.unresolved_message()),
                Err(error) => out.warn(error.to_string()),
            }
        }
    }
}

impl DocumentGrammar for RdfaGrammar {
    fn element_start(&mut self, element: &StartElement, out: &mut Output<'_>) -> Result<(), Error> {
        let outer_depth = self.scopes.depth() - 1;
        let outer = self.scopes.top_mut();
        match outer.place.literal {
            Some(LiteralMode::Content | LiteralMode::String) => {
                outer.boring += 1;
                return Ok(());
            }
            Some(LiteralMode::Pending | LiteralMode::Xml) => {
                outer.place.literal = Some(LiteralMode::Xml);
                return self.start_literal_child(element);
            }
            None => {}
        }

        let (mut place, mut structural) = match outer.place.enter(element.local_name()) {
            Ok(entered) => entered,
            Err((place, error)) => {
                out.warn(error.to_string());
                (place, true)
            }
        };
        structural |= !element.namespaces.is_empty()
            || element
                .attributes
                .iter()
                .any(|(name, _)| RDFA_ATTRIBUTES.contains(&name.as_str()));
        if !structural {
            outer.boring += 1;
            return Ok(());
        }

        let outer_frame = outer.frame;
        let outer_subject = outer.subject.clone();
        let outer_object = outer.object.clone();
        let mut base = outer.base.clone();
        let mut language = outer.language.clone();

        let frame = self.namespaces.push(outer_frame, &element.namespaces);
        if let Some(prefixes) = element.attribute("prefix") {
            self.bind_prefixes(frame, prefixes, out);
        }

        if !place.in_html {
            if let Some(value) = element.attribute("xml:base") {
                match resolve_iri(base.as_ref(), value) {
                    Ok(iri) => base = Some(iri),
                    Err(error) => out.warn(error.to_string()),
                }
            }
        }
        if place.in_base {
            if let Some(href) = element.attribute("href") {
                place.base_from_href = true;
                match resolve_iri(base.as_ref(), href.trim()) {
                    Ok(iri) => {
                        self.set_base(outer_depth, &iri);
                        base = Some(iri);
                    }
                    Err(error) => out.warn(error.to_string()),
                }
            }
        }

        if let Some(lang) = element
            .attribute("xml:lang")
            .or_else(|| element.attribute("lang"))
        {
            if lang.is_empty() {
                language = None;
            } else {
                match LanguageIdentifier::from_str(lang) {
                    Ok(lang) => language = Some(lang.to_string()),
                    Err(e) => out.warn(format!("Invalid language identifier ({lang}): {e}")),
                }
            }
        }

        let ctx = Expansion {
            frame,
            base: base.as_ref(),
            resolve_now: place.emits_immediately(),
        };
        let about = self
            .attribute(element, "about", AttrSyntax::ABOUT, &ctx, out)
            .into_single();
        let src = self
            .attribute(element, "src", AttrSyntax::SRC, &ctx, out)
            .into_single();
        let resource = self
            .attribute(element, "resource", AttrSyntax::RESOURCE, &ctx, out)
            .into_single();
        let href = if place.base_from_href {
            Attr::Missing
        } else {
            self.attribute(element, "href", AttrSyntax::HREF, &ctx, out)
                .into_single()
        };
        let datatype = self
            .attribute(element, "datatype", AttrSyntax::DATATYPE, &ctx, out)
            .into_single();
        let property = self
            .attribute(element, "property", AttrSyntax::PROPERTY, &ctx, out)
            .into_list();
        let rel = self
            .attribute(element, "rel", AttrSyntax::REL, &ctx, out)
            .into_list();
        let rev = self
            .attribute(element, "rev", AttrSyntax::REV, &ctx, out)
            .into_list();
        let type_of = self
            .attribute(element, "typeof", AttrSyntax::TYPEOF, &ctx, out)
            .into_list();
        let content = element.attribute("content");

        // an empty `about`/`resource` is the document itself
        let pick = |attr: Attr<Resource>| match attr {
            Attr::Empty => Some(Resource::document()),
            attr => attr.into_value(),
        };
        let src_value = pick(about).or_else(|| pick(src)).map(Rc::new);
        let href_value = pick(resource).or_else(|| pick(href)).map(Rc::new);
        let rel_rev_present = rel.is_present() || rev.is_present();

        let new_subject = if let Some(subject) = src_value {
            Some(subject)
        } else if let (false, Some(href)) = (rel_rev_present, &href_value) {
            Some(href.clone())
        } else if self.scopes.top().place.enters_document_part(place) {
            Some(Rc::new(Resource::document()))
        } else if type_of.is_present() {
            Some(Rc::new(Resource::Blank(BlankNode::default())))
        } else {
            None
        };

        if property.value().is_some() {
            place.literal = Some(if content.is_some() {
                LiteralMode::Content
            } else {
                match &datatype {
                    Attr::Value(dt) if dt.is_iri(rdf::XML_LITERAL.as_str()) => LiteralMode::Xml,
                    Attr::Value(_) | Attr::Empty => LiteralMode::String,
                    Attr::Missing => LiteralMode::Pending,
                }
            });
        }

        let mut parent_object_should_be_set = false;
        // the parent's subject, carried through while its `rel`/`rev` is still open
        let mut passes_through = false;
        let subject = match (&new_subject, &outer_object) {
            (Some(subject), _) => Some(subject.clone()),
            (None, Some(object)) => Some(object.clone()),
            (None, None) if rel_rev_present || property.value().is_some() => {
                parent_object_should_be_set = true;
                Some(Rc::new(Resource::Blank(BlankNode::default())))
            }
            (None, None) => {
                passes_through = true;
                outer_subject.clone()
            }
        };
        let mut object = if rel_rev_present {
            href_value
        } else if !parent_object_should_be_set && new_subject.is_none() {
            outer_object.clone()
        } else {
            None
        };

        // complete the open links of ancestors that were waiting for this subject
        if let (Some(subject), false) = (subject.as_ref(), passes_through) {
            if !same(Some(subject), outer_object.as_ref()) {
                let mut depth = outer_depth;
                loop {
                    let copies = self.scopes.at_mut(depth).incomplete.instantiate_links(subject);
                    for copy in copies {
                        self.feed_or_make(depth, copy, out);
                    }
                    if parent_object_should_be_set {
                        self.scopes.at_mut(depth).object = Some(subject.clone());
                    }
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    let ancestor = self.scopes.at(depth);
                    if !same(outer_object.as_ref(), ancestor.object.as_ref())
                        || !same(outer_subject.as_ref(), ancestor.subject.as_ref())
                    {
                        break;
                    }
                }
            }
        }

        let inner = self.scopes.push();
        inner.place = place;
        inner.frame = Some(frame);
        inner.base = base;
        inner.subject = subject.clone();
        inner.language = language.clone();
        let depth = outer_depth + 1;
        tracing::trace!(element = %element.name, ?place, "scope pushed");

        if let Some(subject) = subject {
            let type_predicate = Resource::Iri(rdf::TYPE.as_str().to_owned());
            for type_iri in type_of.into_value().into_iter().flatten() {
                let record = IncompleteTriple::link(
                    subject.clone(),
                    type_predicate.clone(),
                    false,
                    Some(Rc::new(type_iri)),
                );
                self.feed_or_make(depth, record, out);
            }
            for predicate in rel.into_value().into_iter().flatten() {
                let record = IncompleteTriple::link(subject.clone(), predicate, false, object.clone());
                self.feed_or_make(depth, record, out);
            }
            for predicate in rev.into_value().into_iter().flatten() {
                let record = IncompleteTriple::link(subject.clone(), predicate, true, object.clone());
                self.feed_or_make(depth, record, out);
            }

            let (datatype, language) = match datatype {
                Attr::Value(datatype) => (Some(datatype), None),
                Attr::Missing | Attr::Empty => (None, language),
            };
            for predicate in property.into_value().into_iter().flatten() {
                let record = IncompleteTriple::literal(
                    subject.clone(),
                    predicate,
                    content.map(str::to_owned),
                    datatype.clone(),
                    language.clone(),
                );
                self.feed_or_make(depth, record, out);
            }

            if object.is_none() && !rel_rev_present && !passes_through {
                object = Some(subject);
            }
        }
        self.scopes.top_mut().object = object;
        Ok(())
    }

    fn element_end(&mut self, name: &str, out: &mut Output<'_>) -> Result<(), Error> {
        let depth = self.scopes.depth() - 1;
        let scope = self.scopes.top_mut();
        if scope.place.literal == Some(LiteralMode::Xml) && scope.literal.depth() > 0 {
            return scope.literal.end_element(name);
        }
        if scope.boring > 0 {
            scope.boring -= 1;
            return Ok(());
        }
        if depth == 0 {
            return Err(Error::grammar(format!("Unexpected closing tag '{name}'")));
        }

        if scope.place.in_base && !scope.place.base_from_href {
            let text = scope.literal.plain_text().trim().to_owned();
            scope.literal.clear();
            if !text.is_empty() {
                match resolve_iri(scope.base.as_ref(), &text) {
                    Ok(iri) => self.set_base(depth, &iri),
                    Err(error) => out.warn(error.to_string()),
                }
            }
        }

        let scope = self.scopes.top_mut();
        match scope.place.literal {
            Some(LiteralMode::Content) | None => {}
            Some(mode) if scope.incomplete.has_open_literals() => {
                match scope.literal.take(mode == LiteralMode::Xml) {
                    Captured::Xml(xml) => scope.incomplete.fill_literals(&xml, true),
                    Captured::Text(text) => scope.incomplete.fill_literals(&text, false),
                }
            }
            Some(_) => scope.literal.clear(),
        }

        if scope.place.in_head {
            if let Some((inner, outer)) = self.scopes.top_and_parent_mut() {
                inner.incomplete.transfer_into(&mut outer.incomplete);
            }
        } else {
            Self::finalize(&mut scope.incomplete, scope.base.as_ref(), out);
        }

        if let Some(frame) = self.scopes.top().frame {
            self.namespaces.pop(frame);
        }
        self.scopes.pop();
        tracing::trace!(element = %name, "scope popped");
        Ok(())
    }

    fn characters(&mut self, text: &str, _out: &mut Output<'_>) -> Result<(), Error> {
        let scope = self.scopes.top_mut();
        let captured = match scope.place.literal {
            Some(LiteralMode::Content) => false,
            Some(_) => true,
            None => scope.place.in_base && !scope.place.base_from_href,
        };
        if captured {
            scope.literal.text(text)?;
        }
        Ok(())
    }

    fn entity_ref(&mut self, _name: &str, value: &str, _out: &mut Output<'_>) -> Result<(), Error> {
        let scope = self.scopes.top_mut();
        match scope.place.literal {
            Some(LiteralMode::String) => Err(Error::grammar(
                "Entities are not supported in string literal object",
            )),
            Some(LiteralMode::Xml | LiteralMode::Pending) => scope.literal.text(value),
            Some(LiteralMode::Content) => Ok(()),
            None if scope.place.in_base && !scope.place.base_from_href => {
                scope.literal.text(value)
            }
            None => Ok(()),
        }
    }

    fn processing_instruction(
        &mut self,
        target: &str,
        data: &str,
        _out: &mut Output<'_>,
    ) -> Result<(), Error> {
        let scope = self.scopes.top_mut();
        if scope.place.literal == Some(LiteralMode::Xml) {
            scope.literal.processing_instruction(target, data)?;
        }
        Ok(())
    }

    fn comment(&mut self, text: &str, _out: &mut Output<'_>) -> Result<(), Error> {
        let scope = self.scopes.top_mut();
        if scope.place.literal == Some(LiteralMode::Xml) {
            scope.literal.comment(text)?;
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Output<'_>) -> Result<(), Error> {
        let root = self.scopes.top_mut();
        Self::finalize(&mut root.incomplete, root.base.as_ref(), out);
        Ok(())
    }
}
