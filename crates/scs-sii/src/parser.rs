//! Recursive descent parser.
//!
//! ```text
//! sii      := "SiiNunit" "{" (include | object)* "}" | object* | ε
//! include  := "@include" string
//! object   := ident ":" (ident | string) "{" (include | object | property)* "}"
//! property := ident ("[" number? "]")? ":" value
//! value    := nil | string | number | hex | binary-float | ident
//!           | tuple | tuple tuple
//! tuple    := "(" number (("," | ";") number)* ")"
//! ```
//!
//! Telling an object from a property needs four tokens of lookahead:
//! `ident ":" ident "{"`.

use crate::cst::{Include, Index, Item, NumberLit, Object, Property, PropertyValue, SiiFile};
use crate::error::{LexError, ParseError, Span};
use crate::lexer::{tokenize, Token, TokenKind};

const WRAPPER: &str = "SiiNunit";

/// Result of [`parse_sii`]. A tree is only present when there were no errors.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub tree: Option<SiiFile>,
    pub lex_errors: Vec<LexError>,
    pub parse_errors: Vec<ParseError>,
}

impl ParseOutcome {
    pub fn ok(&self) -> bool {
        self.tree.is_some()
    }

    /// The tree, or the first error as a [`crate::Error`].
    pub fn into_result(self) -> crate::Result<SiiFile> {
        if let Some(err) = self.lex_errors.into_iter().next() {
            return Err(err.into());
        }
        if let Some(err) = self.parse_errors.into_iter().next() {
            return Err(err.into());
        }
        self.tree
            .ok_or_else(|| crate::Error::Parse(ParseError {
                message: "no tree produced".into(),
                span: Span::default(),
            }))
    }
}

/// Tokenize and parse SII source text.
pub fn parse_sii(text: &str) -> ParseOutcome {
    let lexed = tokenize(text);
    if !lexed.errors.is_empty() {
        return ParseOutcome {
            tree: None,
            lex_errors: lexed.errors,
            parse_errors: Vec::new(),
        };
    }
    match Parser::new(&lexed.tokens, text.len()).file() {
        Ok(tree) => ParseOutcome {
            tree: Some(tree),
            ..Default::default()
        },
        Err(err) => ParseOutcome {
            tree: None,
            lex_errors: Vec::new(),
            parse_errors: vec![err],
        },
    }
}

type PResult<T> = Result<T, ParseError>;

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    eof: Span,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token], len: usize) -> Self {
        let eof = match tokens.last() {
            Some(last) => Span {
                start: last.span.end,
                end: len,
                ..last.span
            },
            None => Span {
                start: len,
                end: len,
                line: 1,
                column: 1,
            },
        };
        Self {
            tokens,
            pos: 0,
            eof,
        }
    }

    fn kind(&self, ahead: usize) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos + ahead).map(|t| &t.kind)
    }

    fn found(&self) -> (String, Span) {
        match self.tokens.get(self.pos) {
            Some(t) => (t.kind.describe(), t.span),
            None => ("end of input".into(), self.eof),
        }
    }

    fn unexpected<T>(&self, expected: &str) -> PResult<T> {
        let (found, span) = self.found();
        Err(ParseError {
            message: format!("expected {expected}, found {found}"),
            span,
        })
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> PResult<&'t Token> {
        match self.tokens.get(self.pos) {
            Some(t) if &t.kind == kind => {
                self.pos += 1;
                Ok(t)
            }
            _ => self.unexpected(expected),
        }
    }

    fn is_object_start(&self) -> bool {
        matches!(self.kind(0), Some(TokenKind::Ident(_)))
            && matches!(self.kind(1), Some(TokenKind::Colon))
            && matches!(self.kind(2), Some(TokenKind::Ident(_) | TokenKind::Str(_)))
            && matches!(self.kind(3), Some(TokenKind::LBrace))
    }

    fn file(mut self) -> PResult<SiiFile> {
        let span = Span {
            start: 0,
            end: self.eof.end,
            line: 1,
            column: 1,
        };

        let wrapped = matches!(self.kind(0), Some(TokenKind::Ident(w)) if w == WRAPPER)
            && matches!(self.kind(1), Some(TokenKind::LBrace));

        let mut items = Vec::new();
        if wrapped {
            self.pos += 1;
            let open = self.expect(&TokenKind::LBrace, "`{`")?.span;
            loop {
                match self.kind(0) {
                    Some(TokenKind::RBrace) => {
                        self.pos += 1;
                        break;
                    }
                    Some(TokenKind::Include) => items.push(Item::Include(self.include()?)),
                    Some(_) if self.is_object_start() => items.push(Item::Object(self.object()?)),
                    Some(_) => return self.unexpected("an object or `@include`"),
                    None => {
                        return Err(ParseError {
                            message: format!(
                                "unterminated `{WRAPPER}` block opened on line {}",
                                open.line
                            ),
                            span: open,
                        })
                    }
                }
            }
            if self.pos < self.tokens.len() {
                return self.unexpected(&format!("end of input after `{WRAPPER}`"));
            }
        } else {
            while self.pos < self.tokens.len() {
                if !self.is_object_start() {
                    return self.unexpected("an object");
                }
                items.push(Item::Object(self.object()?));
            }
        }

        Ok(SiiFile {
            wrapped,
            items,
            span,
        })
    }

    fn include(&mut self) -> PResult<Include> {
        let start = self.expect(&TokenKind::Include, "`@include`")?.span;
        match self.tokens.get(self.pos) {
            Some(Token {
                kind: TokenKind::Str(path),
                span,
            }) => {
                self.pos += 1;
                Ok(Include {
                    path: path.clone(),
                    span: Span {
                        end: span.end,
                        ..start
                    },
                })
            }
            _ => self.unexpected("an include path string"),
        }
    }

    fn ident(&mut self, expected: &str) -> PResult<(&'t str, Span)> {
        match self.tokens.get(self.pos) {
            Some(Token {
                kind: TokenKind::Ident(name),
                span,
            }) => {
                self.pos += 1;
                Ok((name.as_str(), *span))
            }
            _ => self.unexpected(expected),
        }
    }

    fn object(&mut self) -> PResult<Object> {
        let (class, start) = self.ident("a class name")?;
        self.expect(&TokenKind::Colon, "`:`")?;
        let name = match self.kind(0) {
            Some(TokenKind::Ident(name) | TokenKind::Str(name)) => name.clone(),
            _ => return self.unexpected("an object name"),
        };
        self.pos += 1;
        let open = self.expect(&TokenKind::LBrace, "`{`")?.span;

        let mut body = Vec::new();
        let end = loop {
            match self.kind(0) {
                Some(TokenKind::RBrace) => {
                    let close = self.tokens[self.pos].span;
                    self.pos += 1;
                    break close.end;
                }
                Some(TokenKind::Include) => body.push(Item::Include(self.include()?)),
                Some(TokenKind::Ident(_)) if self.is_object_start() => {
                    body.push(Item::Object(self.object()?))
                }
                Some(TokenKind::Ident(_)) => body.push(Item::Property(self.property()?)),
                Some(_) => return self.unexpected("a property, object, `@include` or `}`"),
                None => {
                    return Err(ParseError {
                        message: format!(
                            "unterminated object `{name}` opened on line {}",
                            open.line
                        ),
                        span: open,
                    })
                }
            }
        };

        Ok(Object {
            class: class.to_string(),
            name,
            body,
            span: Span { end, ..start },
        })
    }

    fn property(&mut self) -> PResult<Property> {
        let (key, start) = self.ident("a property name")?;
        let mut index = None;
        if matches!(self.kind(0), Some(TokenKind::LBracket)) {
            self.pos += 1;
            index = Some(match self.kind(0) {
                Some(TokenKind::RBracket) => Index::Append,
                Some(TokenKind::Number(n)) => match n.parse::<u32>() {
                    Ok(i) => {
                        self.pos += 1;
                        Index::Explicit(i)
                    }
                    Err(_) => return self.unexpected("an array index"),
                },
                _ => return self.unexpected("an array index or `]`"),
            });
            self.expect(&TokenKind::RBracket, "`]`")?;
        }
        self.expect(&TokenKind::Colon, "`:`")?;
        let value = self.value()?;
        let end = self.tokens[self.pos - 1].span.end;
        Ok(Property {
            key: key.to_string(),
            index,
            value,
            span: Span { end, ..start },
        })
    }

    fn number(&mut self) -> PResult<NumberLit> {
        let lit = match self.kind(0) {
            Some(TokenKind::Number(n)) => NumberLit::Decimal(n.clone()),
            Some(TokenKind::Hex(h)) => NumberLit::Hex(h.clone()),
            Some(TokenKind::BinaryFloat(bits)) => NumberLit::BinaryFloat(*bits),
            _ => return self.unexpected("a number"),
        };
        self.pos += 1;
        Ok(lit)
    }

    /// `( n (, n)* )`; the flag is set when a `;` separator was used.
    fn tuple(&mut self) -> PResult<(Vec<NumberLit>, bool)> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut items = vec![self.number()?];
        let mut aux = false;
        loop {
            match self.kind(0) {
                Some(TokenKind::RParen) => {
                    self.pos += 1;
                    return Ok((items, aux));
                }
                Some(TokenKind::Comma) => self.pos += 1,
                Some(TokenKind::Semicolon) => {
                    aux = true;
                    self.pos += 1;
                }
                _ => return self.unexpected("`,`, `;` or `)`"),
            }
            items.push(self.number()?);
        }
    }

    fn value(&mut self) -> PResult<PropertyValue> {
        let value = match self.kind(0) {
            Some(TokenKind::Nil) => PropertyValue::Nil,
            Some(TokenKind::Str(s)) => PropertyValue::String(s.clone()),
            Some(TokenKind::Ident(i)) => PropertyValue::Ident(i.clone()),
            Some(TokenKind::Number(_) | TokenKind::Hex(_) | TokenKind::BinaryFloat(_)) => {
                return Ok(PropertyValue::Number(self.number()?))
            }
            Some(TokenKind::LParen) => {
                let (first, aux) = self.tuple()?;
                if matches!(self.kind(0), Some(TokenKind::LParen)) {
                    let (rotation, _) = self.tuple()?;
                    return Ok(PropertyValue::Placement {
                        position: first,
                        rotation,
                    });
                }
                return Ok(if aux {
                    PropertyValue::AuxTuple(first)
                } else {
                    PropertyValue::Tuple(first)
                });
            }
            _ => return self.unexpected("a value"),
        };
        self.pos += 1;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SiiFile {
        let outcome = parse_sii(text);
        assert!(
            outcome.ok(),
            "{:?} {:?}",
            outcome.lex_errors,
            outcome.parse_errors
        );
        outcome.tree.unwrap()
    }

    fn objects(file: &SiiFile) -> Vec<&Object> {
        file.items
            .iter()
            .filter_map(|i| match i {
                Item::Object(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_wrapper() {
        let file = parse("SiiNunit{}");
        assert!(file.wrapped);
        assert!(file.items.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let outcome = parse_sii("  // nothing here\n");
        assert!(outcome.ok());
        assert!(outcome.tree.unwrap().items.is_empty());
    }

    #[test]
    fn test_unwrapped_object() {
        let file = parse("a.b.c : foo.bar { x: 1 }");
        assert!(!file.wrapped);
        let object = objects(&file)[0];
        assert_eq!(object.class, "a.b.c");
        assert_eq!(object.name, "foo.bar");
        match &object.body[0] {
            Item::Property(p) => {
                assert_eq!(p.key, "x");
                assert_eq!(p.value, PropertyValue::Number(NumberLit::Decimal("1".into())));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_brace_reports_line() {
        let outcome = parse_sii("SiiNunit\n{\ncity_data: city.a {\n  x: 1\n\n");
        assert!(!outcome.ok());
        assert!(outcome.tree.is_none());
        let err = &outcome.parse_errors[0];
        assert_eq!(err.span.line, 3);
        assert!(err.message.contains("unterminated object `city.a`"));
    }

    #[test]
    fn test_error_line_of_offending_token() {
        let outcome = parse_sii("SiiNunit {\nx : y {\n  a: 1\n  b: }\n}\n}");
        assert_eq!(outcome.parse_errors[0].span.line, 4);
        assert!(outcome.parse_errors[0].message.contains("expected a value"));
    }

    #[test]
    fn test_lex_errors_block_tree() {
        let outcome = parse_sii("SiiNunit { a : b { x: $ } }");
        assert!(!outcome.ok());
        assert_eq!(outcome.lex_errors.len(), 1);
        assert!(outcome.parse_errors.is_empty());
    }

    #[test]
    fn test_nested_objects_and_includes() {
        let file = parse(
            r#"SiiNunit
{
@include "base.sui"
outer : .o {
    @include "inner.sui"
    inner : .i { v: nil }
    list[]: a
    list[5]: b
}
}"#,
        );
        assert!(matches!(&file.items[0], Item::Include(i) if i.path == "base.sui"));
        let outer = objects(&file)[0];
        assert!(matches!(&outer.body[0], Item::Include(_)));
        assert!(matches!(&outer.body[1], Item::Object(o) if o.class == "inner"));
        match (&outer.body[2], &outer.body[3]) {
            (Item::Property(a), Item::Property(b)) => {
                assert_eq!(a.index, Some(Index::Append));
                assert_eq!(b.index, Some(Index::Explicit(5)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tuples() {
        let file = parse("a : b { p: (1, 2, 3) q: (&3f800000; 0, 0, 0) r: (1, 2, 3) (1; 0, 0, 0) }");
        let body = &objects(&file)[0].body;
        let values: Vec<&PropertyValue> = body
            .iter()
            .map(|i| match i {
                Item::Property(p) => &p.value,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert!(matches!(values[0], PropertyValue::Tuple(v) if v.len() == 3));
        assert!(matches!(values[1], PropertyValue::AuxTuple(v) if v.len() == 4));
        assert!(matches!(
            values[2],
            PropertyValue::Placement { position, rotation } if position.len() == 3 && rotation.len() == 4
        ));
    }

    #[test]
    fn test_string_object_name() {
        let file = parse(r#"SiiNunit { mat : "ui.mat" { texture: "/a.tobj" } }"#);
        assert_eq!(objects(&file)[0].name, "ui.mat");
    }

    #[test]
    fn test_property_at_top_level_is_rejected() {
        let outcome = parse_sii("SiiNunit { x: 1 }");
        assert!(outcome.parse_errors[0]
            .message
            .contains("expected an object or `@include`"));
    }

    #[test]
    fn test_trailing_tokens() {
        let outcome = parse_sii("SiiNunit { } extra");
        assert!(!outcome.ok());
    }
}
