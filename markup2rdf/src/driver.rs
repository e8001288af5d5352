use std::io::Read;

use oxiri::{Iri, IriParseError};
use oxrdf::{Graph, NamedNode, Triple, TripleRef};

use crate::rdfa::RdfaGrammar;
use crate::rdfxml::RdfXmlGrammar;
use crate::source::{HtmlSource, XmlSource};
use crate::{
    Error, EventSource, GraphSink, ParseError, StartElement, TripleSink, Warning, XmlEvent,
    dc_vocab, rdfa_vocab,
};

/// Which grammar turns events into triples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Grammar {
    #[default]
    RdfXml,
    /// RDFa attributes on host-language (usually HTML) markup.
    Rdfa,
}

/// How forgiving the tokenizer is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarkupSyntax {
    /// Well-formed XML; anything else is a fatal error.
    #[default]
    Xml,
    /// HTML5 parsing rules, which repair tag soup instead of rejecting it.
    Html,
}

/// Parser configuration.
///
/// ```
/// use markup2rdf::MarkupParser;
///
/// let mut graph = oxrdf::Graph::new();
/// let report = MarkupParser::new()
///     .with_source_name("people.rdf")
///     .parse_into_graph(
///         r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
///                     xmlns:ex="http://example/">
///              <rdf:Description rdf:about="urn:a"><ex:name>Bob</ex:name></rdf:Description>
///            </rdf:RDF>"#,
///         &mut graph,
///     )
///     .unwrap();
/// assert_eq!(report.triple_count(), 1);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct MarkupParser {
    grammar: Grammar,
    syntax: MarkupSyntax,
    omit_rdf_wrapper: bool,
    base: Option<Iri<String>>,
    default_graph: Option<NamedNode>,
    source_name: String,
    initial_context: bool,
}

impl Default for MarkupParser {
    fn default() -> Self {
        Self {
            grammar: Grammar::default(),
            syntax: MarkupSyntax::default(),
            omit_rdf_wrapper: false,
            base: None,
            default_graph: None,
            source_name: "input".to_owned(),
            initial_context: true,
        }
    }
}

impl MarkupParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn with_syntax(mut self, syntax: MarkupSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    /// Accepts a fragment: several top-level elements, no `rdf:RDF` wrapper.
    pub fn omit_rdf_wrapper(mut self) -> Self {
        self.omit_rdf_wrapper = true;
        self
    }

    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Result<Self, IriParseError> {
        self.base = Some(Iri::parse(base_iri.into())?);
        Ok(self)
    }

    /// The graph announced to the sink before the first triple.
    pub fn with_default_graph(mut self, graph: NamedNode) -> Self {
        self.default_graph = Some(graph);
        self
    }

    /// Name of the document, used as the prefix of error messages.
    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }

    /// Stops RDFa from falling back to the RDFa 1.1 initial context for
    /// undeclared CURIE prefixes.
    pub fn without_initial_context(mut self) -> Self {
        self.initial_context = false;
        self
    }

    pub fn parse_str(
        &self,
        input: &str,
        sink: &mut impl TripleSink,
    ) -> Result<ParseReport, ParseError> {
        match self.syntax {
            MarkupSyntax::Xml => self.parse_events(&mut XmlSource::new(input), sink),
            MarkupSyntax::Html => self.parse_events(&mut HtmlSource::new(input), sink),
        }
    }

    pub fn parse_read(
        &self,
        mut read: impl Read,
        sink: &mut impl TripleSink,
    ) -> Result<ParseReport, ParseError> {
        let mut input = String::new();
        read.read_to_string(&mut input)
            .map_err(|e| ParseError::new(&self.source_name, e.into()))?;
        self.parse_str(&input, sink)
    }

    pub fn parse_into_graph(
        &self,
        input: &str,
        graph: &mut Graph,
    ) -> Result<ParseReport, ParseError> {
        self.parse_str(input, &mut GraphSink::new(graph))
    }

    /// Runs the configured grammar over an arbitrary event stream.
    ///
    /// On success the sink is committed; on a fatal error it is rolled
    /// back and the error returned.
    pub fn parse_events(
        &self,
        source: &mut dyn EventSource,
        sink: &mut dyn TripleSink,
    ) -> Result<ParseReport, ParseError> {
        tracing::debug!(source = %self.source_name, grammar = ?self.grammar, "parsing");
        sink.start(self.default_graph.as_ref());

        let mut out = Output::new(sink);
        let result = self.drive(source, &mut out);
        let Output {
            warnings, triples, ..
        } = out;

        match result {
            Ok(()) => {
                sink.commit();
                Ok(ParseReport { triples, warnings })
            }
            Err(error) => {
                tracing::debug!(%error, "parse failed, rolling back");
                sink.rollback();
                Err(ParseError::new(&self.source_name, error))
            }
        }
    }

    fn drive(&self, source: &mut dyn EventSource, out: &mut Output<'_>) -> Result<(), Error> {
        let mut grammar: Box<dyn DocumentGrammar> = match self.grammar {
            Grammar::RdfXml => Box::new(RdfXmlGrammar::new(self.base.clone())),
            Grammar::Rdfa => Box::new(RdfaGrammar::new(self.base.clone(), self.initial_context)),
        };

        let mut depth = 0usize;
        let mut roots = 0usize;
        while let Some(event) = source.next_event()? {
            match event {
                XmlEvent::ElementStart(element) => {
                    if depth == 0 {
                        roots += 1;
                        if roots > 1 && !self.omit_rdf_wrapper {
                            return Err(Error::grammar(
                                "More than one top-level element in a document that is not a fragment",
                            ));
                        }
                    }
                    depth += 1;
                    grammar.element_start(&element, out)?;
                }
                XmlEvent::ElementEnd(name) => {
                    if depth == 0 {
                        return Err(Error::grammar(format!("Unexpected closing tag '{name}'")));
                    }
                    depth -= 1;
                    grammar.element_end(&name, out)?;
                }
                XmlEvent::Characters(text) => grammar.characters(&text, out)?,
                XmlEvent::EntityRef { name, value } => grammar.entity_ref(&name, &value, out)?,
                XmlEvent::ProcessingInstruction { target, data } => {
                    grammar.processing_instruction(&target, &data, out)?
                }
                XmlEvent::Comment(text) => grammar.comment(&text, out)?,
            }
        }

        if depth != 0 {
            return Err(Error::grammar("Unexpected end of input inside an open element"));
        }
        grammar.finish(out)
    }
}

/// The event-handler contract shared by the RDF/XML and RDFa machines.
pub(crate) trait DocumentGrammar {
    fn element_start(&mut self, element: &StartElement, out: &mut Output<'_>)
    -> Result<(), Error>;

    fn element_end(&mut self, name: &str, out: &mut Output<'_>) -> Result<(), Error>;

    fn characters(&mut self, text: &str, out: &mut Output<'_>) -> Result<(), Error>;

    fn entity_ref(&mut self, name: &str, value: &str, out: &mut Output<'_>) -> Result<(), Error>;

    fn processing_instruction(
        &mut self,
        target: &str,
        data: &str,
        out: &mut Output<'_>,
    ) -> Result<(), Error>;

    fn comment(&mut self, text: &str, out: &mut Output<'_>) -> Result<(), Error>;

    /// Called once the event stream is exhausted.
    fn finish(&mut self, out: &mut Output<'_>) -> Result<(), Error>;
}

/// Where grammars send triples and warnings.
pub(crate) struct Output<'s> {
    sink: &'s mut dyn TripleSink,
    warnings: Vec<Warning>,
    triples: usize,
}

impl<'s> Output<'s> {
    fn new(sink: &'s mut dyn TripleSink) -> Self {
        Self {
            sink,
            warnings: Vec::new(),
            triples: 0,
        }
    }

    pub fn emit(&mut self, triple: Triple) {
        tracing::trace!("emitting {triple}");
        self.triples += 1;
        self.sink.emit(triple);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(Warning { message });
    }
}

/// What a successful parse produced besides the triples themselves.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    triples: usize,
    warnings: Vec<Warning>,
}

impl ParseReport {
    /// Number of triples handed to the sink (including duplicates).
    pub fn triple_count(&self) -> usize {
        self.triples
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// The warnings as an RDFa processor graph: one `rdfa:Warning` node
    /// with a `dc:description` per warning.
    pub fn processor_graph(&self) -> Graph {
        let mut pg = Graph::new();
        for warning in &self.warnings {
            let warning_subj = oxrdf::BlankNode::default();
            pg.insert(TripleRef::new(
                &warning_subj,
                oxrdf::vocab::rdf::TYPE,
                rdfa_vocab::WARNING,
            ));
            pg.insert(TripleRef::new(
                &warning_subj,
                dc_vocab::DESCRIPTION,
                oxrdf::LiteralRef::new_simple_literal(&warning.message),
            ));
        }
        pg
    }
}
