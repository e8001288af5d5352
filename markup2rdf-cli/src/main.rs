use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use markup2rdf::{Grammar, MarkupParser, MarkupSyntax};
use tracing_subscriber::EnvFilter;

/// Extracts RDF triples from RDF/XML or RDFa documents and prints them as Turtle.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Read RDFa attributes instead of RDF/XML.
    #[arg(long)]
    rdfa: bool,

    /// Parse with HTML5 rules instead of strict XML.
    #[arg(long)]
    html: bool,

    /// Accept several top-level elements without an `rdf:RDF` wrapper.
    #[arg(long)]
    omit_rdf_wrapper: bool,

    /// Base IRI; defaults to the location of the input.
    #[arg(long, value_name = "IRI")]
    base: Option<String>,

    /// Graph name handed to the output.
    #[arg(long, value_name = "IRI")]
    graph: Option<String>,

    /// Do not fall back to the RDFa initial context for undeclared prefixes.
    #[arg(long)]
    no_initial_context: bool,

    #[arg(value_name = "FILE|URL")]
    target: String,
}

struct Input {
    content: String,
    location: url::Url,
    is_html: bool,
}

fn fetch(target: &str) -> Result<Input, Box<dyn std::error::Error>> {
    if let Ok(url) = url::Url::parse(target) {
        if matches!(url.scheme(), "http" | "https") {
            let response = reqwest::blocking::get(url.clone())?.error_for_status()?;
            let is_html = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("text/html"));
            tracing::debug!(%url, is_html, "fetched");
            return Ok(Input {
                content: response.text()?,
                location: url,
                is_html,
            });
        }
    }

    let path = std::path::absolute(PathBuf::from(target))?;
    let location = url::Url::from_file_path(&path)
        .map_err(|()| format!("cannot turn {} into a file URL", path.display()))?;
    Ok(Input {
        content: std::fs::read_to_string(&path)?,
        location,
        is_html: false,
    })
}

fn write_turtle(graph: &oxrdf::Graph, base: &str) -> Result<(), Box<dyn std::error::Error>> {
    // only declare the prefixes the output actually uses
    let mut used = BTreeSet::new();
    let mut add_prefix = |iri: &str| {
        if let Some(mapping) = markup2rdf::initial_context_prefixes()
            .mappings()
            .find(|(prefix, namespace)| !prefix.is_empty() && iri.starts_with(*namespace))
        {
            used.insert(mapping);
        }
    };
    for triple in graph.iter() {
        if let oxrdf::SubjectRef::NamedNode(n) = triple.subject {
            add_prefix(n.as_str());
        }
        add_prefix(triple.predicate.as_str());
        match triple.object {
            oxrdf::TermRef::NamedNode(n) => add_prefix(n.as_str()),
            oxrdf::TermRef::Literal(l) if !l.is_plain() => add_prefix(l.datatype().as_str()),
            _ => {}
        }
    }

    let serializer = used.into_iter().try_fold(
        oxttl::TurtleSerializer::new().with_base_iri(base)?,
        |serializer, (prefix, namespace)| serializer.with_prefix(prefix, namespace),
    )?;

    let mut locked_out = std::io::stdout().lock();
    let mut writer = serializer.for_writer(&mut locked_out);
    for triple in graph.iter() {
        writer.serialize_triple(triple)?;
    }
    writer.finish()?;
    Ok(())
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let input = fetch(&args.target)?;
    let base = match args.base {
        Some(base) => base,
        None => input.location.to_string(),
    };

    let mut parser = MarkupParser::new()
        .with_source_name(args.target.as_str())
        .with_base_iri(base.as_str())?;
    if args.rdfa || input.is_html {
        parser = parser.with_grammar(Grammar::Rdfa);
    }
    if args.html || input.is_html {
        parser = parser.with_syntax(MarkupSyntax::Html);
    }
    if args.omit_rdf_wrapper {
        parser = parser.omit_rdf_wrapper();
    }
    if let Some(graph) = args.graph {
        parser = parser.with_default_graph(oxrdf::NamedNode::new(graph)?);
    }
    if args.no_initial_context {
        parser = parser.without_initial_context();
    }

    let mut output_graph = oxrdf::Graph::new();
    let report = match parser.parse_into_graph(&input.content, &mut output_graph) {
        Ok(report) => report,
        Err(error) => {
            eprintln!("Error: {error}");
            return Ok(ExitCode::FAILURE);
        }
    };

    {
        // output any warnings
        let processor_graph = report.processor_graph();
        let mut locked_err = std::io::stderr().lock();
        let mut writer = oxttl::TurtleSerializer::new().for_writer(&mut locked_err);
        for triple in processor_graph.iter() {
            writer.serialize_triple(triple)?;
        }
        writer.finish()?;
    }

    write_turtle(&output_graph, &base)?;
    Ok(ExitCode::SUCCESS)
}
