/// How the content of a `property` element is being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LiteralMode {
    /// No `content` or `datatype`: plain text until a child element shows
    /// up, then an XML literal.
    Pending,
    /// The value came from `content`; the element's content is ignored.
    Content,
    /// A typed literal built from the text content only.
    String,
    /// An `rdf:XMLLiteral` of the element's content.
    Xml,
}

/// Where an element sits in the host document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Place {
    pub in_html: bool,
    pub in_head: bool,
    pub in_body: bool,
    pub in_base: bool,
    /// A `<base href>`: its text content is not the base.
    pub base_from_href: bool,
    pub literal: Option<LiteralMode>,
}

#[derive(Debug, derive_more::Display)]
#[display("Element \"{element}\" can not appear inside {container}")]
pub(crate) struct PlaceError {
    element: &'static str,
    container: &'static str,
}

impl Place {
    fn inherited(self) -> Self {
        Self {
            base_from_href: false,
            literal: None,
            ..self
        }
    }

    /// The place of a child element called `local`, and whether that element
    /// is structurally significant by itself.
    ///
    /// On error the child keeps the inherited place.
    pub fn enter(self, local: &str) -> Result<(Self, bool), (Self, PlaceError)> {
        let mut inner = self.inherited();
        let error = |element, container| Err((self.inherited(), PlaceError { element, container }));

        match local {
            "base" if self.in_head => {
                if self.in_base {
                    return error("base", "other \"base\" element");
                }
                inner.in_base = true;
            }
            "head" if self.in_html => {
                if self.in_head {
                    return error("head", "other \"head\" element");
                }
                if self.in_body {
                    return error("head", "\"body\" element");
                }
                inner.in_head = true;
            }
            "body" if self.in_html => {
                if self.in_body {
                    return error("body", "other \"body\" element");
                }
                if self.in_head {
                    return error("body", "\"head\" element");
                }
                inner.in_body = true;
            }
            "html" => {
                if self.in_html {
                    return error("html", "other \"html\" element");
                }
                inner.in_html = true;
            }
            _ => return Ok((inner, false)),
        }
        Ok((inner, true))
    }

    /// Whether `head` or `body` is entered right now, from `html`.
    pub fn enters_document_part(self, inner: Self) -> bool {
        self.in_html && !self.in_head && !self.in_body && (inner.in_head || inner.in_body)
    }

    /// Triples may be emitted straight away instead of waiting for the
    /// head's `<base>`.
    pub fn emits_immediately(self) -> bool {
        self.in_body || !self.in_html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_structure() {
        let (html, structural) = Place::default().enter("html").unwrap();
        assert!(structural && html.in_html);

        let (head, _) = html.enter("head").unwrap();
        assert!(html.enters_document_part(head));
        let (base, _) = head.enter("base").unwrap();
        assert!(base.in_base && base.in_head);

        let (div, structural) = html.enter("body").unwrap().0.enter("div").unwrap();
        assert!(!structural);
        assert!(div.in_body && div.emits_immediately());
        assert!(!head.emits_immediately());
    }

    #[test]
    fn misplaced_elements_keep_the_outer_place() {
        let (html, _) = Place::default().enter("html").unwrap();
        let (body, _) = html.enter("body").unwrap();
        let (place, error) = body.enter("head").unwrap_err();
        assert_eq!(place, body);
        assert_eq!(
            error.to_string(),
            "Element \"head\" can not appear inside \"body\" element"
        );
        assert!(html.enter("html").is_err());
    }

    #[test]
    fn base_outside_head_is_ordinary() {
        let (base, structural) = Place::default().enter("base").unwrap();
        assert!(!structural && !base.in_base);
    }
}
