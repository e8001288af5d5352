use oxrdf::{Dataset, GraphName, NamedNode, Quad, Triple};

/// Receives triples as they are resolved.
///
/// A parse calls [`start`](TripleSink::start) once, then
/// [`emit`](TripleSink::emit) once per triple, and finally either
/// [`commit`](TripleSink::commit) or, if the document turned out to be
/// malformed, [`rollback`](TripleSink::rollback).
pub trait TripleSink {
    /// Announces the graph the following triples belong to.
    fn start(&mut self, graph: Option<&NamedNode>) {
        let _ = graph;
    }

    fn emit(&mut self, triple: Triple);

    fn commit(&mut self) {}

    /// Forgets every triple emitted since [`start`](TripleSink::start).
    fn rollback(&mut self) {}
}

/// Inserts into an [`oxrdf::Graph`], remembering what it added so a
/// failed parse leaves the graph as it was.
pub struct GraphSink<'g> {
    graph: &'g mut oxrdf::Graph,
    inserted: Vec<Triple>,
}

impl<'g> GraphSink<'g> {
    pub fn new(graph: &'g mut oxrdf::Graph) -> Self {
        Self {
            graph,
            inserted: Vec::new(),
        }
    }
}

impl TripleSink for GraphSink<'_> {
    fn start(&mut self, _graph: Option<&NamedNode>) {
        self.inserted.clear();
    }

    fn emit(&mut self, triple: Triple) {
        if self.graph.insert(&triple) {
            self.inserted.push(triple);
        }
    }

    fn commit(&mut self) {
        self.inserted.clear();
    }

    fn rollback(&mut self) {
        for triple in self.inserted.drain(..) {
            self.graph.remove(&triple);
        }
    }
}

/// Inserts into an [`oxrdf::Dataset`], in the graph announced by
/// [`TripleSink::start`] or the default graph.
pub struct DatasetSink<'d> {
    dataset: &'d mut Dataset,
    graph_name: GraphName,
    inserted: Vec<Quad>,
}

impl<'d> DatasetSink<'d> {
    pub fn new(dataset: &'d mut Dataset) -> Self {
        Self {
            dataset,
            graph_name: GraphName::DefaultGraph,
            inserted: Vec::new(),
        }
    }
}

impl TripleSink for DatasetSink<'_> {
    fn start(&mut self, graph: Option<&NamedNode>) {
        self.graph_name = match graph {
            Some(graph) => graph.clone().into(),
            None => GraphName::DefaultGraph,
        };
        self.inserted.clear();
    }

    fn emit(&mut self, triple: Triple) {
        let quad = Quad::new(
            triple.subject,
            triple.predicate,
            triple.object,
            self.graph_name.clone(),
        );
        if self.dataset.insert(&quad) {
            self.inserted.push(quad);
        }
    }

    fn commit(&mut self) {
        self.inserted.clear();
    }

    fn rollback(&mut self) {
        for quad in self.inserted.drain(..) {
            self.dataset.remove(&quad);
        }
    }
}
