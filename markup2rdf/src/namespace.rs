use indexmap::IndexMap;
use oxiri::Iri;

use crate::Error;
use crate::scope::{Arena, Recycle, SlotId};

pub(crate) const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Resolves `value` against `base`; without a base it must already be absolute.
pub(crate) fn resolve_iri(base: Option<&Iri<String>>, value: &str) -> Result<Iri<String>, Error> {
    match base {
        Some(base) => base.resolve(value),
        None => Iri::parse(value.to_owned()),
    }
    .map_err(|source| Error::iri(source, value))
}

/// The namespace bindings declared on one open element.
#[derive(Default)]
struct Frame {
    bindings: IndexMap<String, String>,
    parent: Option<FrameId>,
}

impl Recycle for Frame {
    fn recycle(&mut self) {
        self.bindings.clear();
        self.parent = None;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FrameId(SlotId);

/// A name split into its namespace and local part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExpandedName {
    pub namespace: String,
    pub local: String,
}

impl ExpandedName {
    pub fn iri(&self) -> String {
        format!("{}{}", self.namespace, self.local)
    }
}

/// Resolves prefixes by walking the chain of open element frames.
pub(crate) struct NamespaceResolver {
    frames: Arena<Frame>,
}

impl NamespaceResolver {
    pub fn new() -> Self {
        Self {
            frames: Arena::new(),
        }
    }

    pub fn push<'a>(
        &mut self,
        parent: Option<FrameId>,
        declarations: impl IntoIterator<Item = &'a (String, String)>,
    ) -> FrameId {
        let id = self.frames.alloc();
        let frame = self.frames.get_mut(id);
        frame.parent = parent;
        for (prefix, namespace) in declarations {
            frame.bindings.insert(prefix.clone(), namespace.clone());
        }
        FrameId(id)
    }

    /// Adds a binding to a frame that is already open.
    pub fn bind(&mut self, frame: FrameId, prefix: &str, namespace: &str) {
        self.frames
            .get_mut(frame.0)
            .bindings
            .insert(prefix.to_owned(), namespace.to_owned());
    }

    pub fn pop(&mut self, frame: FrameId) {
        self.frames.release(frame.0);
    }

    /// The namespace bound to `prefix` by the innermost declaring frame.
    pub fn lookup(&self, frame: Option<FrameId>, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }

        let mut current = frame;
        while let Some(id) = current {
            let frame = self.frames.get(id.0);
            if let Some(namespace) = frame.bindings.get(prefix) {
                return Some(namespace.as_str());
            }
            current = frame.parent;
        }
        None
    }

    /// Splits `name` at its first colon and resolves the prefix.
    ///
    /// Unprefixed names take the default namespace only when
    /// `use_default` is set (elements, but not attributes).
    pub fn resolve(
        &self,
        frame: Option<FrameId>,
        name: &str,
        use_default: bool,
    ) -> Result<ExpandedName, Error> {
        match name.split_once(':') {
            Some((prefix, local)) => match self.lookup(frame, prefix) {
                Some(namespace) => Ok(ExpandedName {
                    namespace: namespace.to_owned(),
                    local: local.to_owned(),
                }),
                None => Err(Error::UndefinedPrefix {
                    name: name.to_owned(),
                }),
            },
            None => {
                let namespace = if use_default {
                    self.lookup(frame, "").unwrap_or_default()
                } else {
                    ""
                };
                Ok(ExpandedName {
                    namespace: namespace.to_owned(),
                    local: name.to_owned(),
                })
            }
        }
    }

    /// Every binding visible from `frame`, innermost declarations winning.
    pub fn in_scope(&self, frame: Option<FrameId>) -> IndexMap<String, String> {
        let mut visible = IndexMap::new();
        let mut current = frame;
        while let Some(id) = current {
            let frame = self.frames.get(id.0);
            for (prefix, namespace) in &frame.bindings {
                visible
                    .entry(prefix.clone())
                    .or_insert_with(|| namespace.clone());
            }
            current = frame.parent;
        }
        visible
    }
}
