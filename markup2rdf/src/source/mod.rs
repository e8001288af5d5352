//! Event sources: tokenizers that turn markup into [`XmlEvent`](crate::XmlEvent)s.

mod html;
mod xml;

pub use html::HtmlSource;
pub use xml::XmlSource;
