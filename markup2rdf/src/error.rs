use std::borrow::Cow;

/// A fatal error. Any of these aborts the parse and nothing is committed.
#[derive(derive_more::Error, derive_more::Display, derive_more::From, Debug)]
pub enum Error {
    #[display("XML syntax error: {_0}")]
    #[from]
    Xml(quick_xml::Error),

    #[display("IRI parse error: `{iri}`")]
    IriParseError {
        source: oxiri::IriParseError,
        iri: String,
    },

    #[display("Name '{name}' contains undefined namespace prefix")]
    UndefinedPrefix {
        #[error(not(source))]
        name: String,
    },

    #[display("{_0}")]
    Grammar(#[error(not(source))] Cow<'static, str>),

    #[display("I/O error: {_0}")]
    #[from]
    Io(std::io::Error),
}

impl Error {
    pub(crate) fn grammar(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Grammar(message.into())
    }

    pub(crate) fn iri(source: oxiri::IriParseError, iri: impl Into<String>) -> Self {
        Self::IriParseError {
            source,
            iri: iri.into(),
        }
    }
}

/// A fatal [`Error`] together with the name of the document it was found in.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("{source_name}: {source}")]
pub struct ParseError {
    source_name: String,
    source: Error,
}

impl ParseError {
    pub(crate) fn new(source_name: impl Into<String>, source: Error) -> Self {
        Self {
            source_name: source_name.into(),
            source,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn error(&self) -> &Error {
        &self.source
    }

    pub fn into_error(self) -> Error {
        self.source
    }
}

/// A recoverable problem. The offending construct is skipped and parsing continues.
#[derive(derive_more::Display, Debug, Clone, PartialEq, Eq)]
#[display("{message}")]
pub struct Warning {
    pub message: String,
}
