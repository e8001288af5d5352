//! Splits RDFa attribute values into CURIE/URI tokens.
//!
//! Expansion against namespace bindings happens in the caller; this module
//! only decides what each token *is* under an attribute's syntax profile.

/// Which token forms an attribute accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttrSyntax(u8);

impl AttrSyntax {
    const URI: Self = Self(0x01);
    const SAFE_CURIE: Self = Self(0x02);
    const CURIE: Self = Self(0x04);
    const RESERVED: Self = Self(0x08);
    const LIST: Self = Self(0x10);
    const EMPTY: Self = Self(0x20);

    pub const ABOUT: Self = Self(Self::URI.0 | Self::SAFE_CURIE.0 | Self::EMPTY.0);
    pub const SRC: Self = Self(Self::URI.0 | Self::EMPTY.0);
    pub const HREF: Self = Self::SRC;
    pub const RESOURCE: Self = Self::ABOUT;
    pub const DATATYPE: Self = Self(Self::CURIE.0 | Self::EMPTY.0);
    pub const PROPERTY: Self = Self(Self::CURIE.0 | Self::LIST.0);
    pub const TYPEOF: Self = Self::PROPERTY;
    pub const REL: Self = Self(Self::CURIE.0 | Self::RESERVED.0 | Self::LIST.0);
    pub const REV: Self = Self::REL;

    fn allows(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    /// `prefix:local`. An empty prefix means the XHTML vocabulary.
    Curie { prefix: &'a str, local: &'a str },
    /// `_:label`
    Blank(&'a str),
    /// A reserved `rel`/`rev` word, as its local name in the XHTML vocabulary.
    Reserved(&'static str),
    /// `[]`, the subject of the nearest ancestor that has one.
    EmptySafe,
    /// Anything else, taken as a (possibly relative) URI reference.
    Uri(&'a str),
    /// The whole value is empty.
    Empty,
}

/// The tokens of one attribute value, plus what was wrong with it.
#[derive(Debug, Default)]
pub(crate) struct Tokens<'a> {
    pub tokens: Vec<Token<'a>>,
    pub problems: Vec<String>,
}

// sorted for binary search
static RESERVED_WORDS: [(&str, &str); 25] = [
    ("alternate", "alternate"),
    ("appendix", "appendix"),
    ("bookmark", "bookmark"),
    ("chapter", "chapter"),
    ("cite", "cite"),
    ("contents", "contents"),
    ("copyright", "copyright"),
    ("first", "first"),
    ("glossary", "glossary"),
    ("help", "help"),
    ("icon", "icon"),
    ("index", "index"),
    ("last", "last"),
    ("license", "license"),
    ("meta", "meta"),
    ("next", "next"),
    ("p3pv1", "p3pv1"),
    ("prev", "prev"),
    ("role", "role"),
    ("section", "section"),
    ("start", "start"),
    ("stylesheet", "stylesheet"),
    ("subsection", "subsection"),
    // "top" is a synonym of "start"
    ("top", "start"),
    ("up", "up"),
];

pub(crate) fn reserved_word(word: &str) -> Option<&'static str> {
    RESERVED_WORDS
        .binary_search_by_key(&word, |(w, _)| *w)
        .ok()
        .map(|i| RESERVED_WORDS[i].1)
}

fn is_space(c: char) -> bool {
    c.is_ascii_whitespace()
}

/// Byte offset of the first char in `s` matching `stop`, or `s.len()`.
fn scan(s: &str, stop: impl Fn(char) -> bool) -> usize {
    s.find(stop).unwrap_or(s.len())
}

pub(crate) fn tokenize<'a>(attribute: &str, value: &'a str, syntax: AttrSyntax) -> Tokens<'a> {
    let list = syntax.allows(AttrSyntax::LIST);
    let mut result = Tokens::default();
    let mut rest = value;

    loop {
        if rest.starts_with(is_space) {
            if !list {
                result
                    .problems
                    .push(format!("Whitespaces are not allowed for attribute {attribute}"));
            }
            rest = rest.trim_start_matches(is_space);
        }

        if rest.is_empty() {
            if result.tokens.is_empty() && !list {
                if !syntax.allows(AttrSyntax::EMPTY) {
                    result
                        .problems
                        .push(format!("Empty value is not allowed for attribute {attribute}"));
                }
                result.tokens.push(Token::Empty);
            }
            return result;
        }

        if result.tokens.len() == 1 && !list {
            result
                .problems
                .push(format!("Multiple values are not allowed for attribute {attribute}"));
            return result;
        }

        let safe = match rest.strip_prefix('[') {
            Some(after) => {
                if !syntax.allows(AttrSyntax::SAFE_CURIE) {
                    result.problems.push(format!(
                        "\"Safe CURIE\" syntax is not allowed for attribute \"{attribute}\", ignored"
                    ));
                }
                rest = after;
                true
            }
            None => false,
        };

        let curie_syntax = syntax.allows(AttrSyntax::CURIE)
            || (safe && syntax.allows(AttrSyntax::SAFE_CURIE));
        let mut colon = None;
        let end = if curie_syntax {
            let prefix_end = scan(rest, |c| matches!(c, '[' | ']' | ':') || is_space(c));
            if rest[prefix_end..].starts_with(':') {
                colon = Some(prefix_end);
                let local = &rest[prefix_end + 1..];
                prefix_end + 1 + scan(local, |c| c == ']' || is_space(c))
            } else {
                let after = &rest[prefix_end..];
                // a CURIE without a colon is skipped silently
                if safe && after.starts_with(']') && prefix_end > 0 {
                    rest = &after[1..];
                    continue;
                }
                if !safe
                    && !syntax.allows(AttrSyntax::RESERVED)
                    && (after.is_empty() || after.starts_with(is_space))
                {
                    rest = after;
                    continue;
                }
                prefix_end
            }
        } else {
            scan(rest, |c| matches!(c, '[' | ']') || is_space(c))
        };

        let text = &rest[..end];
        let mut after = &rest[end..];
        match after.chars().next() {
            Some('[') if safe => result.problems.push(format!(
                "Unterminated \"safe CURIE\" before '[' in the value of attribute \"{attribute}\""
            )),
            Some('[') => result.problems.push(format!(
                "Character '[' is not allowed inside token in the value of attribute \"{attribute}\""
            )),
            Some(']') => {
                if !safe {
                    result.problems.push(format!(
                        "Unexpected character ']' in the value of attribute \"{attribute}\""
                    ));
                }
                after = &after[1..];
            }
            _ if safe => result.problems.push(format!(
                "No closing ']' found at the end of \"safe CURIE\" in the value of attribute \"{attribute}\""
            )),
            _ => {}
        }
        rest = after;

        let token = match colon {
            Some(colon) => {
                let (prefix, local) = (&text[..colon], &text[colon + 1..]);
                if prefix == "_" {
                    Token::Blank(local)
                } else {
                    Token::Curie { prefix, local }
                }
            }
            None if syntax.allows(AttrSyntax::RESERVED) => match reserved_word(text) {
                Some(word) => Token::Reserved(word),
                None => continue,
            },
            None if safe && text.is_empty() => Token::EmptySafe,
            None => Token::Uri(text),
        };
        result.tokens.push(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_table_is_sorted() {
        assert!(RESERVED_WORDS.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(reserved_word("top"), Some("start"));
        assert_eq!(reserved_word("nope"), None);
    }

    #[test]
    fn rel_mixes_curies_and_reserved_words() {
        let tokens = tokenize("rel", "  next foaf:knows  bogus :x _:b1 ", AttrSyntax::REL);
        assert!(tokens.problems.is_empty());
        assert_eq!(
            tokens.tokens,
            vec![
                Token::Reserved("next"),
                Token::Curie {
                    prefix: "foaf",
                    local: "knows"
                },
                Token::Curie {
                    prefix: "",
                    local: "x"
                },
                Token::Blank("b1"),
            ]
        );
    }

    #[test]
    fn property_skips_words_without_colon() {
        let tokens = tokenize("property", "title dc:title", AttrSyntax::PROPERTY);
        assert_eq!(
            tokens.tokens,
            vec![Token::Curie {
                prefix: "dc",
                local: "title"
            }]
        );
    }

    #[test]
    fn about_takes_uris_and_safe_curies() {
        let uri = tokenize("about", "http://example.org/a#b", AttrSyntax::ABOUT);
        assert_eq!(uri.tokens, vec![Token::Uri("http://example.org/a#b")]);

        let safe = tokenize("about", "[ex:a]", AttrSyntax::ABOUT);
        assert_eq!(
            safe.tokens,
            vec![Token::Curie {
                prefix: "ex",
                local: "a"
            }]
        );

        let empty_safe = tokenize("about", "[]", AttrSyntax::ABOUT);
        assert_eq!(empty_safe.tokens, vec![Token::EmptySafe]);

        let empty = tokenize("about", "", AttrSyntax::ABOUT);
        assert_eq!(empty.tokens, vec![Token::Empty]);
        assert!(empty.problems.is_empty());
    }

    #[test]
    fn single_valued_attributes_report_extra_tokens() {
        let tokens = tokenize("href", "a b", AttrSyntax::HREF);
        assert_eq!(tokens.tokens, vec![Token::Uri("a")]);
        assert_eq!(
            tokens.problems,
            vec![
                "Whitespaces are not allowed for attribute href",
                "Multiple values are not allowed for attribute href",
            ]
        );
    }

    #[test]
    fn unterminated_safe_curie_is_reported() {
        let tokens = tokenize("resource", "[ex:a", AttrSyntax::RESOURCE);
        assert_eq!(
            tokens.tokens,
            vec![Token::Curie {
                prefix: "ex",
                local: "a"
            }]
        );
        assert_eq!(tokens.problems.len(), 1);
        assert!(tokens.problems[0].starts_with("No closing ']'"));
    }

    #[test]
    fn stray_bracket_does_not_stall() {
        let tokens = tokenize("typeof", "a]b ex:T", AttrSyntax::TYPEOF);
        assert_eq!(
            tokens.tokens,
            vec![
                Token::Uri("a"),
                Token::Curie {
                    prefix: "ex",
                    local: "T"
                }
            ]
        );
        assert_eq!(
            tokens.problems,
            vec!["Unexpected character ']' in the value of attribute \"typeof\""]
        );
    }
}
