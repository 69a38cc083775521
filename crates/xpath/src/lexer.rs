//! Expression tokenizer.
//!
//! Lexemes are recognized with `nom`; the surrounding loop applies the XPath
//! 1.0 disambiguation rules (section 3.7): after a token that ends an operand,
//! `*` is multiplication and `and`/`or`/`div`/`mod` are operators, and `-` is
//! binary. A name followed by `(` is a function name or a node type.

use crate::error::XPathError;
use crate::token::{Token, TokenKind};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0},
    combinator::{opt, recognize},
    sequence::{delimited, pair, preceded},
};

// --- Lexemes ---

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn ncname(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_name_start), take_while(is_name_char))).parse(input)
}

/// `name`, `prefix:name` or `prefix:*`.
fn qname(input: &str) -> IResult<&str, &str> {
    recognize(pair(ncname, opt(preceded(char(':'), alt((tag("*"), ncname)))))).parse(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(pair(digit1, opt(pair(char('.'), digit0)))),
        recognize(pair(char('.'), digit1)),
    ))
    .parse(input)
}

/// A quoted literal without escapes.
fn literal(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(delimited(char('\''), take_while(|c| c != '\''), char('\''))),
        recognize(delimited(char('"'), take_while(|c| c != '"'), char('"'))),
    ))
    .parse(input)
}

fn symbol(input: &str) -> IResult<&str, TokenKind> {
    alt((
        tag("//").map(|_| TokenKind::DoubleSlash),
        tag("..").map(|_| TokenKind::DotDot),
        tag("!=").map(|_| TokenKind::NotEqual),
        tag("<=").map(|_| TokenKind::LessEqual),
        tag(">=").map(|_| TokenKind::GreaterEqual),
        char('/').map(|_| TokenKind::Slash),
        char('.').map(|_| TokenKind::Dot),
        char('@').map(|_| TokenKind::At),
        char('(').map(|_| TokenKind::ParenOpen),
        char(')').map(|_| TokenKind::ParenClose),
        char('[').map(|_| TokenKind::BracketOpen),
        char(']').map(|_| TokenKind::BracketClose),
        char(',').map(|_| TokenKind::Comma),
        char('|').map(|_| TokenKind::Union),
        char('+').map(|_| TokenKind::Plus),
        char('=').map(|_| TokenKind::Equal),
        char('<').map(|_| TokenKind::Less),
        char('>').map(|_| TokenKind::Greater),
    ))
    .parse(input)
}

fn skip_ws(input: &str) -> &str {
    multispace0::<&str, nom::error::Error<&str>>(input)
        .map(|(rest, _)| rest)
        .unwrap_or(input)
}

// --- Tokenizer ---

fn syntax(offset: usize, message: impl Into<String>) -> XPathError {
    XPathError::Syntax {
        offset,
        message: message.into(),
    }
}

fn unsupported(offset: usize, construct: impl Into<String>) -> XPathError {
    XPathError::Unsupported {
        offset,
        construct: construct.into(),
    }
}

struct Lexer<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    /// Open brackets and parentheses with their offsets.
    open: Vec<(TokenKind, usize)>,
}

impl<'s> Lexer<'s> {
    fn offset_of(&self, rest: &str) -> usize {
        self.source.len() - rest.len()
    }

    fn after_operand(&self) -> bool {
        self.tokens.last().is_some_and(|t| t.kind.ends_operand())
    }

    fn push(&mut self, kind: TokenKind, offset: usize, len: usize) {
        self.tokens.push(Token {
            kind,
            offset,
            len,
            repeat: Vec::new(),
        });
    }

    fn track_brackets(&mut self, kind: TokenKind, offset: usize) -> Result<(), XPathError> {
        match kind {
            TokenKind::ParenOpen | TokenKind::BracketOpen => self.open.push((kind, offset)),
            TokenKind::ParenClose | TokenKind::BracketClose => {
                let expected = if kind == TokenKind::ParenClose {
                    TokenKind::ParenOpen
                } else {
                    TokenKind::BracketOpen
                };
                match self.open.pop() {
                    Some((open, _)) if open == expected => {}
                    _ => return Err(syntax(offset, format!("unbalanced '{kind}'"))),
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Classifies a name once its extent is known.
    fn name(&mut self, name: &str, offset: usize, rest: &'s str) -> Result<(), XPathError> {
        let len = name.len();
        if self.after_operand() {
            let op = match name {
                "and" => Some(TokenKind::And),
                "or" => Some(TokenKind::Or),
                "div" => Some(TokenKind::Div),
                "mod" => Some(TokenKind::Mod),
                _ => None,
            };
            if let Some(op) = op {
                self.push(op, offset, len);
                return Ok(());
            }
        }

        let next = skip_ws(rest);
        if next.starts_with("::") {
            return Err(unsupported(offset, format!("{name}::")));
        }
        if next.starts_with('(') {
            let kind = match name {
                "node" | "text" => TokenKind::NodeType,
                "comment" | "processing-instruction" | "id" => {
                    return Err(unsupported(offset, format!("{name}()")));
                }
                _ => TokenKind::FunctionName,
            };
            self.push(kind, offset, len);
            return Ok(());
        }
        self.push(TokenKind::NameTest, offset, len);
        Ok(())
    }

    fn run(mut self) -> Result<Vec<Token>, XPathError> {
        let mut rest = skip_ws(self.source);
        while let Some(c) = rest.chars().next() {
            let offset = self.offset_of(rest);
            let next = rest[c.len_utf8()..].chars().next();

            if c == '\'' || c == '"' {
                let (after, lit) =
                    literal(rest).map_err(|_| syntax(offset, "unterminated literal"))?;
                self.push(TokenKind::Literal, offset, lit.len());
                rest = after;
            } else if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
                let (after, num) = number(rest).map_err(|_| syntax(offset, "invalid number"))?;
                self.push(TokenKind::Number, offset, num.len());
                rest = after;
            } else if c == '*' {
                let kind = if self.after_operand() {
                    TokenKind::Multiply
                } else {
                    TokenKind::NameTest
                };
                self.push(kind, offset, 1);
                rest = &rest[1..];
            } else if c == '-' {
                let kind = if self.after_operand() {
                    TokenKind::Minus
                } else {
                    TokenKind::Negate
                };
                self.push(kind, offset, 1);
                rest = &rest[1..];
            } else if c == '$' {
                return Err(unsupported(offset, "variable reference"));
            } else if is_name_start(c) {
                let (after, name) = qname(rest).map_err(|_| syntax(offset, "invalid name"))?;
                self.name(name, offset, after)?;
                rest = after;
            } else if let Ok((after, kind)) = symbol(rest) {
                self.track_brackets(kind, offset)?;
                self.push(kind, offset, rest.len() - after.len());
                rest = after;
            } else {
                return Err(syntax(offset, format!("unexpected character '{c}'")));
            }
            rest = skip_ws(rest);
        }

        if let Some((kind, offset)) = self.open.pop() {
            return Err(syntax(offset, format!("unclosed '{kind}'")));
        }
        if self.tokens.is_empty() {
            return Err(syntax(0, "empty expression"));
        }
        Ok(self.tokens)
    }
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, XPathError> {
    Lexer {
        source,
        tokens: Vec::new(),
        open: Vec::new(),
    }
    .run()
}
