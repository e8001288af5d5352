use markup2rdf::{DatasetSink, Grammar, MarkupParser, MarkupSyntax};
use oxrdf::{Dataset, GraphNameRef, NamedNode, NamedNodeRef, vocab::rdf};
use rstest::rstest;

mod utils;

fn parser() -> MarkupParser {
    MarkupParser::new()
        .with_grammar(Grammar::Rdfa)
        .with_base_iri("http://example.org/doc")
        .unwrap()
}

#[test]
fn property_with_relative_about() {
    let report = utils::assert_graph(
        &parser(),
        r##"<div xmlns:dc="http://purl.org/dc/terms/"><span about="#x" property="dc:title">Hello</span></div>"##,
        r#"<http://example.org/doc#x> <http://purl.org/dc/terms/title> "Hello" ."#,
    );
    assert!(report.warnings().is_empty());
}

#[test]
fn head_links_use_the_final_base() {
    let input = r#"
        <html xmlns="http://www.w3.org/1999/xhtml">
            <head>
                <link rel="next" href="p2"/>
                <base href="http://other.example/dir/"/>
            </head>
            <body><a rel="prev" href="p0">previous</a></body>
        </html>
    "#;
    utils::assert_graph(
        &parser(),
        input,
        r#"
        @prefix xhv: <http://www.w3.org/1999/xhtml/vocab#> .
        <http://other.example/dir/> xhv:next <http://other.example/dir/p2> ;
            xhv:prev <http://other.example/dir/p0> .
        "#,
    );
}

#[test]
fn base_text_is_used_without_href() {
    let input = r#"
        <html>
            <head>
                <base>http://other.example/</base>
                <link rel="next" href="p2"/>
            </head>
        </html>
    "#;
    utils::assert_graph(
        &parser(),
        input,
        "<http://other.example/> <http://www.w3.org/1999/xhtml/vocab#next> <http://other.example/p2> .",
    );
}

#[test]
fn xml_base_applies_outside_html() {
    utils::assert_graph(
        &parser(),
        r#"<div xml:base="http://other.example/" about="x" property="dc:title">T</div>"#,
        r#"<http://other.example/x> <http://purl.org/dc/terms/title> "T" ."#,
    );
    utils::assert_graph(
        &parser(),
        r#"<html xml:base="http://ignored.example/"><body><span about="y" property="dc:title">U</span></body></html>"#,
        r#"<http://example.org/y> <http://purl.org/dc/terms/title> "U" ."#,
    );
}

#[test]
fn misplaced_document_parts_are_reported() {
    let input = "<html><head><body></body></head><body><html></html></body></html>";
    let (graph, report) = utils::parse(&parser(), input);
    assert!(graph.is_empty());
    insta::assert_debug_snapshot!(utils::warnings(&report), @r#"
    [
        "Element \"body\" can not appear inside \"head\" element",
        "Element \"html\" can not appear inside other \"html\" element",
    ]
    "#);
}

#[test]
fn rel_is_completed_by_a_typed_child() {
    let input = r#"
        <div xmlns:foaf="http://xmlns.com/foaf/0.1/" about="http://ex/alice" rel="foaf:knows">
            <span typeof="foaf:Person" property="foaf:name">Bob</span>
        </div>
    "#;
    let report = utils::assert_graph(
        &parser(),
        input,
        r#"
        @prefix foaf: <http://xmlns.com/foaf/0.1/> .
        <http://ex/alice> foaf:knows [ a foaf:Person ; foaf:name "Bob" ] .
        "#,
    );
    assert!(report.warnings().is_empty());
}

#[rstest]
#[case::language(r#"<p lang="en">"#, "</p>")]
#[case::namespace(r#"<p xmlns:x="http://x/">"#, "</p>")]
#[case::prefix(r#"<p prefix="y: http://y/">"#, "</p>")]
#[case::two_levels(r#"<p lang="en"><em xml:lang="fr">"#, "</em></p>")]
fn rel_is_completed_through_scopes_without_subjects(#[case] open: &str, #[case] close: &str) {
    let input = format!(
        r#"<div xmlns:ex="http://ex/" about="http://ex/a" rel="ex:p">{open}<span about="http://ex/b"></span>{close}</div>"#
    );
    let report = utils::assert_graph(&parser(), &input, "<http://ex/a> <http://ex/p> <http://ex/b> .");
    assert!(report.warnings().is_empty());
}

#[test]
fn rev_reverses_the_link() {
    let input = r#"
        <div xmlns:foaf="http://xmlns.com/foaf/0.1/" about="http://ex/alice">
            <a rev="foaf:made" href="http://ex/doc">the document</a>
        </div>
    "#;
    utils::assert_graph(
        &parser(),
        input,
        "<http://ex/doc> <http://xmlns.com/foaf/0.1/made> <http://ex/alice> .",
    );
}

#[test]
fn literal_kinds() {
    let input = r#"
        <div xmlns:dc="http://purl.org/dc/terms/" xmlns:xsd="http://www.w3.org/2001/XMLSchema#"
             about="http://ex/s" xml:lang="en">
            <span property="dc:title" content="Title">ignored</span>
            <span property="dc:date" datatype="xsd:date">2024-01-01</span>
            <span property="dc:description" datatype="">Plain <b>bold</b></span>
            <span property="dc:subject">Text</span>
        </div>
    "#;
    utils::assert_graph(
        &parser(),
        input,
        r#"
        @prefix dc: <http://purl.org/dc/terms/> .
        @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
        <http://ex/s> dc:title "Title"@en ;
            dc:date "2024-01-01"^^xsd:date ;
            dc:description "Plain bold"@en ;
            dc:subject "Text"@en .
        "#,
    );
}

#[test]
fn properties_share_one_value() {
    utils::assert_graph(
        &parser(),
        r#"<span about="http://ex/s" property="dc:title dc:alternative">T</span>"#,
        r#"
        @prefix dc: <http://purl.org/dc/terms/> .
        <http://ex/s> dc:title "T" ;
            dc:alternative "T" .
        "#,
    );
}

#[test]
fn markup_makes_an_xml_literal() {
    let input = r#"<div xmlns:dc="http://purl.org/dc/terms/" about="http://ex/s"><span property="dc:description">Some <em>emphasis</em></span></div>"#;
    utils::assert_graph(
        &parser(),
        input,
        r#"
        @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
        <http://ex/s> <http://purl.org/dc/terms/description>
            'Some <em xmlns:dc="http://purl.org/dc/terms/">emphasis</em>'^^rdf:XMLLiteral .
        "#,
    );
}

#[rstest]
#[case::plain("license", "license")]
#[case::synonym("top", "start")]
#[case::empty_prefix(":next", "next")]
fn reserved_rel_words(#[case] rel: &str, #[case] local: &str) {
    let input = format!(r#"<a about="http://ex/s" rel="{rel}" href="http://ex/o">link</a>"#);
    utils::assert_graph(
        &parser(),
        &input,
        &format!("<http://ex/s> <http://www.w3.org/1999/xhtml/vocab#{local}> <http://ex/o> ."),
    );
}

#[test]
fn blank_nodes_are_shared_by_label() {
    let input = r#"
        <div xmlns:foaf="http://xmlns.com/foaf/0.1/">
            <span about="[_:a]" property="foaf:name">A</span>
            <span about="http://ex/s" rel="foaf:knows" resource="[_:a]"></span>
        </div>
    "#;
    utils::assert_graph(
        &parser(),
        input,
        r#"
        @prefix foaf: <http://xmlns.com/foaf/0.1/> .
        <http://ex/s> foaf:knows _:a .
        _:a foaf:name "A" .
        "#,
    );
}

#[test]
fn initial_context_prefixes_are_optional() {
    let input = r#"<span about="http://ex/s" property="foaf:name">Bob</span>"#;
    utils::assert_graph(
        &parser(),
        input,
        r#"<http://ex/s> <http://xmlns.com/foaf/0.1/name> "Bob" ."#,
    );

    let (graph, report) = utils::parse(&parser().without_initial_context(), input);
    assert!(graph.is_empty());
    assert_eq!(
        utils::warnings(&report),
        vec![r#"Bad token in the value of attribute "property" (undeclared namespace?)"#]
    );
}

#[test]
fn unused_rel_is_reported() {
    let input = r#"<div xmlns:foaf="http://xmlns.com/foaf/0.1/" about="http://ex/s" rel="foaf:knows">nobody</div>"#;
    let (graph, report) = utils::parse(&parser(), input);
    assert!(graph.is_empty());
    insta::assert_debug_snapshot!(utils::warnings(&report), @r#"
    [
        "Property http://xmlns.com/foaf/0.1/knows of subject http://ex/s has no value",
    ]
    "#);

    let processor_graph = report.processor_graph();
    assert_eq!(processor_graph.len(), 2);
    assert_eq!(
        processor_graph
            .subjects_for_predicate_object(
                rdf::TYPE,
                NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#Warning"),
            )
            .count(),
        1
    );
}

#[test]
fn html_tag_soup() {
    let input = r#"
        <html>
        <head><title>T</title></head>
        <body>
            <p about="http://ex/s" property="dc:title">Hello<p>unrelated
        </body>
        </html>
    "#;
    utils::assert_graph(
        &parser().with_syntax(MarkupSyntax::Html),
        input,
        r#"<http://ex/s> <http://purl.org/dc/terms/title> "Hello" ."#,
    );
}

#[test]
fn string_literal_rejects_entities() {
    let input = r#"<!DOCTYPE div [<!ENTITY n "x">]><div xmlns:xsd="http://www.w3.org/2001/XMLSchema#" about="http://ex/s" property="dc:title" datatype="xsd:string">&n;</div>"#;
    let error = parser()
        .parse_into_graph(input, &mut oxrdf::Graph::new())
        .unwrap_err();
    insta::assert_snapshot!(error, @"input: Entities are not supported in string literal object");
}

#[test]
fn dataset_sink_uses_the_default_graph() {
    let mut dataset = Dataset::new();
    let graph = NamedNode::new_unchecked("http://ex/g");
    parser()
        .with_default_graph(graph.clone())
        .parse_str(
            r#"<span about="http://ex/s" property="dc:title">Hi</span>"#,
            &mut DatasetSink::new(&mut dataset),
        )
        .unwrap();

    assert_eq!(dataset.len(), 1);
    let quad = dataset.iter().next().unwrap();
    assert_eq!(quad.graph_name, GraphNameRef::NamedNode(graph.as_ref()));
}
