//! Extracts RDF triples from markup.
//!
//! Two grammars are supported over the same stream of XML events:
//! RDF/XML, where triples are spelled out as dedicated XML structure,
//! and RDFa, where they are carried by attributes on host-language
//! markup (usually HTML). Events come either from a strict XML tokenizer
//! or from an HTML5 tree builder; see [`MarkupSyntax`].
//!
//! ```
//! use markup2rdf::{Grammar, MarkupParser};
//!
//! let mut graph = oxrdf::Graph::new();
//! MarkupParser::new()
//!     .with_grammar(Grammar::Rdfa)
//!     .with_base_iri("http://example.org/")
//!     .unwrap()
//!     .parse_into_graph(
//!         r##"<div about="#me" property="foaf:name">Alice</div>"##,
//!         &mut graph,
//!     )
//!     .unwrap();
//! assert_eq!(graph.len(), 1);
//! ```

use curie::PrefixMapping;

mod driver;
mod error;
mod event;
mod literal;
mod namespace;
mod rdfa;
mod rdfxml;
mod scope;
mod sink;
pub mod source;

pub use driver::{Grammar, MarkupParser, MarkupSyntax, ParseReport};
pub use error::{Error, ParseError, Warning};
pub use event::{EventSource, StartElement, XmlEvent};
pub use sink::{DatasetSink, GraphSink, TripleSink};

pub(crate) mod dc_vocab {
    pub static DESCRIPTION: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://purl.org/dc/terms/description");
}

pub(crate) mod xhv_vocab {
    pub const NAMESPACE: &str = "http://www.w3.org/1999/xhtml/vocab#";
}

pub(crate) mod rdfa_vocab {
    pub static WARNING: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#Warning");
}

pub(crate) mod rdf_vocab {
    pub const NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
}

/// The prefixes of the RDFa 1.1 initial context.
///
/// RDFa uses these when a CURIE prefix has no in-scope declaration.
pub fn initial_context_prefixes() -> &'static PrefixMapping {
    static INITIAL_CONTEXT: std::sync::OnceLock<PrefixMapping> = std::sync::OnceLock::new();
    // https://www.w3.org/2011/rdfa-context/rdfa-1.1
    // Vocabulary prefixes
    INITIAL_CONTEXT.get_or_init(|| {
        let mut mapping = PrefixMapping::default();
        for (prefix, iri) in [
            // W3C documents
            ("as", "https://www.w3.org/ns/activitystreams#"),
            ("csvw", "http://www.w3.org/ns/csvw#"),
            ("dcat", "http://www.w3.org/ns/dcat#"),
            ("dqv", "http://www.w3.org/ns/dqv#"),
            ("duv", "http://www.w3.org/ns/duv#"),
            ("grddl", "http://www.w3.org/2003/g/data-view#"),
            ("jsonld", "http://json-ld.org/vocab#"),
            ("ma", "http://www.w3.org/ns/ma-ont#"),
            ("org", "http://www.w3.org/ns/org#"),
            ("owl", "http://www.w3.org/2002/07/owl#"),
            ("prov", "http://www.w3.org/ns/prov#"),
            ("qb", "http://purl.org/linked-data/cube#"),
            ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
            ("rdfa", "http://www.w3.org/ns/rdfa#"),
            ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
            ("rif", "http://www.w3.org/2007/rif#"),
            ("rr", "http://www.w3.org/ns/r2rml#"),
            ("sd", "http://www.w3.org/ns/sparql-service-description#"),
            ("skos", "http://www.w3.org/2004/02/skos/core#"),
            ("skosxl", "http://www.w3.org/2008/05/skos-xl#"),
            ("sosa", "http://www.w3.org/ns/sosa/"),
            ("ssn", "http://www.w3.org/ns/ssn/"),
            ("time", "http://www.w3.org/2006/time#"),
            ("void", "http://rdfs.org/ns/void#"),
            ("wdr", "http://www.w3.org/2007/05/powder#"),
            ("wdrs", "http://www.w3.org/2007/05/powder-s#"),
            ("xhv", "http://www.w3.org/1999/xhtml/vocab#"),
            ("xml", "http://www.w3.org/XML/1998/namespace"),
            ("xsd", "http://www.w3.org/2001/XMLSchema#"),
            // "widely used"
            ("cc", "http://creativecommons.org/ns#"),
            ("ctag", "http://commontag.org/ns#"),
            ("dc", "http://purl.org/dc/terms/"),
            ("dc11", "http://purl.org/dc/elements/1.1/"),
            ("dcterms", "http://purl.org/dc/terms/"),
            ("foaf", "http://xmlns.com/foaf/0.1/"),
            ("gr", "http://purl.org/goodrelations/v1#"),
            ("ical", "http://www.w3.org/2002/12/cal/icaltzd#"),
            ("og", "http://ogp.me/ns#"),
            ("rev", "http://purl.org/stuff/rev#"),
            ("schema", "http://schema.org/"),
            ("schemas", "https://schema.org/"),
            ("sioc", "http://rdfs.org/sioc/ns#"),
            ("v", "http://rdf.data-vocabulary.org/#"),
            ("vcard", "http://www.w3.org/2006/vcard/ns#"),
        ] {
            mapping.add_prefix(prefix, iri).unwrap();
        }
        mapping
    })
}
