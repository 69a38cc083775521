//! Tokens and compiled expressions.

use crate::error::XPathError;
use crate::{lexer, reparse};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    Dot,
    DotDot,
    At,
    Comma,
    /// `name`, `prefix:name`, `*` or `prefix:*`.
    NameTest,
    /// `node` or `text` directly followed by `(`.
    NodeType,
    FunctionName,
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    /// Unary minus.
    Negate,
    Multiply,
    Div,
    Mod,
    Union,
    Slash,
    DoubleSlash,
    Literal,
    Number,
}

impl TokenKind {
    /// Tokens after which `*` multiplies and `and`/`or`/`div`/`mod` are operators.
    pub(crate) fn ends_operand(self) -> bool {
        matches!(
            self,
            TokenKind::ParenClose
                | TokenKind::BracketClose
                | TokenKind::Dot
                | TokenKind::DotDot
                | TokenKind::NameTest
                | TokenKind::Literal
                | TokenKind::Number
        )
    }

    /// Tokens that may start a location step.
    pub(crate) fn starts_step(self) -> bool {
        matches!(
            self,
            TokenKind::NameTest | TokenKind::NodeType | TokenKind::Dot | TokenKind::DotDot | TokenKind::At
        )
    }

    pub(crate) fn is_binary_operator(self) -> bool {
        matches!(
            self,
            TokenKind::Or
                | TokenKind::And
                | TokenKind::Equal
                | TokenKind::NotEqual
                | TokenKind::Less
                | TokenKind::LessEqual
                | TokenKind::Greater
                | TokenKind::GreaterEqual
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Multiply
                | TokenKind::Div
                | TokenKind::Mod
                | TokenKind::Union
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::ParenOpen => "(",
            TokenKind::ParenClose => ")",
            TokenKind::BracketOpen => "[",
            TokenKind::BracketClose => "]",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::At => "@",
            TokenKind::Comma => ",",
            TokenKind::NameTest => "name test",
            TokenKind::NodeType => "node type",
            TokenKind::FunctionName => "function name",
            TokenKind::Or => "or",
            TokenKind::And => "and",
            TokenKind::Equal => "=",
            TokenKind::NotEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Negate => "unary -",
            TokenKind::Multiply => "*",
            TokenKind::Div => "div",
            TokenKind::Mod => "mod",
            TokenKind::Union => "|",
            TokenKind::Slash => "/",
            TokenKind::DoubleSlash => "//",
            TokenKind::Literal => "literal",
            TokenKind::Number => "number",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset in the source text.
    pub offset: usize,
    /// Byte length in the source text.
    pub len: usize,
    /// Indices of the later operator tokens whose left operand starts here.
    pub repeat: Vec<usize>,
}

/// A compiled expression: the source text and its annotated token stream.
///
/// Immutable once built; share it freely between threads and evaluations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    source: String,
    tokens: Vec<Token>,
}

impl Expr {
    /// Tokenizes and validates `text`.
    pub fn parse(text: &str) -> Result<Self, XPathError> {
        let mut tokens = lexer::tokenize(text)?;
        reparse::check(text, &mut tokens)?;
        log::debug!("Compiled XPath '{}' into {} tokens", text, tokens.len());
        Ok(Self {
            source: text.to_string(),
            tokens,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Source text of token `index`. Literals are returned without quotes.
    pub fn text(&self, index: usize) -> &str {
        let token = &self.tokens[index];
        let raw = &self.source[token.offset..token.offset + token.len];
        if token.kind == TokenKind::Literal {
            &raw[1..raw.len() - 1]
        } else {
            raw
        }
    }

    pub(crate) fn kind(&self, index: usize) -> Option<TokenKind> {
        self.tokens.get(index).map(|t| t.kind)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(expr: &Expr) -> Vec<TokenKind> {
        expr.tokens().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_parse_twice_is_identical() {
        let a = Expr::parse("/ex:a/b[c = 'x'] | ../d").unwrap();
        let b = Expr::parse("/ex:a/b[c = 'x'] | ../d").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_repeat_annotations() {
        let expr = Expr::parse("/ *[key1 and key2 or key1 < key2]").unwrap();
        assert_eq!(expr.tokens()[3].repeat, vec![4, 6]);
        assert_eq!(expr.tokens()[7].repeat, vec![8]);
        assert!(expr.tokens()[0].repeat.is_empty());
    }

    #[test]
    fn test_literal_text_is_unquoted() {
        let expr = Expr::parse("concat('a b', \"c\")").unwrap();
        assert_eq!(expr.text(2), "a b");
        assert_eq!(expr.text(4), "c");
        assert_eq!(expr.text(0), "concat");
    }

    #[test]
    fn test_offsets_and_lengths() {
        let expr = Expr::parse("a  !=  12.5").unwrap();
        let t = expr.tokens();
        assert_eq!((t[1].offset, t[1].len), (3, 2));
        assert_eq!((t[2].offset, t[2].len), (7, 4));
        assert_eq!(kinds(&expr), vec![TokenKind::NameTest, TokenKind::NotEqual, TokenKind::Number]);
    }
}
