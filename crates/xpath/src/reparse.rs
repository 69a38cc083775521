//! Grammar check over the token stream.
//!
//! Walks the same grammar the evaluator walks, without evaluating anything:
//! rejects invalid token sequences, unknown functions and wrong arities, and
//! records on the first token of every operand chain the indices of the
//! operators that follow it (the `repeat` annotation).

use crate::error::XPathError;
use crate::functions;
use crate::token::{Token, TokenKind};

const OR: &[TokenKind] = &[TokenKind::Or];
const AND: &[TokenKind] = &[TokenKind::And];
const EQUALITY: &[TokenKind] = &[TokenKind::Equal, TokenKind::NotEqual];
const RELATIONAL: &[TokenKind] = &[
    TokenKind::Less,
    TokenKind::LessEqual,
    TokenKind::Greater,
    TokenKind::GreaterEqual,
];
const ADDITIVE: &[TokenKind] = &[TokenKind::Plus, TokenKind::Minus];
const MULTIPLICATIVE: &[TokenKind] = &[TokenKind::Multiply, TokenKind::Div, TokenKind::Mod];
const UNION: &[TokenKind] = &[TokenKind::Union];

pub(crate) fn check(source: &str, tokens: &mut [Token]) -> Result<(), XPathError> {
    let mut reparser = Reparser {
        source,
        tokens,
        idx: 0,
    };
    reparser.expr()?;
    if reparser.idx < reparser.tokens.len() {
        return Err(reparser.unexpected());
    }
    Ok(())
}

struct Reparser<'a> {
    source: &'a str,
    tokens: &'a mut [Token],
    idx: usize,
}

impl Reparser<'_> {
    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.idx).map(|t| t.kind)
    }

    fn text(&self, index: usize) -> &str {
        let token = &self.tokens[index];
        &self.source[token.offset..token.offset + token.len]
    }

    fn unexpected(&self) -> XPathError {
        match self.tokens.get(self.idx) {
            Some(token) if token.kind.is_binary_operator() => XPathError::Syntax {
                offset: token.offset,
                message: format!("expected an operand before '{}'", self.text(self.idx)),
            },
            Some(token) => XPathError::Syntax {
                offset: token.offset,
                message: format!("unexpected '{}'", self.text(self.idx)),
            },
            None => XPathError::Syntax {
                offset: self.source.len(),
                message: "unexpected end of expression".to_string(),
            },
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), XPathError> {
        if self.peek() == Some(kind) {
            self.idx += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn binary(&mut self, ops: &[TokenKind], operand: fn(&mut Self) -> Result<(), XPathError>) -> Result<(), XPathError> {
        let start = self.idx;
        operand(self)?;
        while let Some(kind) = self.peek() {
            if !ops.contains(&kind) {
                break;
            }
            let op = self.idx;
            self.tokens[start].repeat.push(op);
            self.idx += 1;
            operand(self)?;
        }
        Ok(())
    }

    // --- Expression levels ---

    fn expr(&mut self) -> Result<(), XPathError> {
        self.binary(OR, Self::and_expr)
    }

    fn and_expr(&mut self) -> Result<(), XPathError> {
        self.binary(AND, Self::equality_expr)
    }

    fn equality_expr(&mut self) -> Result<(), XPathError> {
        self.binary(EQUALITY, Self::relational_expr)
    }

    fn relational_expr(&mut self) -> Result<(), XPathError> {
        self.binary(RELATIONAL, Self::additive_expr)
    }

    fn additive_expr(&mut self) -> Result<(), XPathError> {
        self.binary(ADDITIVE, Self::multiplicative_expr)
    }

    fn multiplicative_expr(&mut self) -> Result<(), XPathError> {
        self.binary(MULTIPLICATIVE, Self::unary_expr)
    }

    fn unary_expr(&mut self) -> Result<(), XPathError> {
        while self.peek() == Some(TokenKind::Negate) {
            self.idx += 1;
        }
        self.binary(UNION, Self::path_expr)
    }

    // --- Paths ---

    fn path_expr(&mut self) -> Result<(), XPathError> {
        match self.peek() {
            Some(TokenKind::ParenOpen | TokenKind::Literal | TokenKind::Number | TokenKind::FunctionName) => {
                self.primary_expr()?;
                self.predicates()?;
                if matches!(self.peek(), Some(TokenKind::Slash | TokenKind::DoubleSlash)) {
                    self.idx += 1;
                    self.relative_path()?;
                }
                Ok(())
            }
            Some(TokenKind::Slash) => {
                self.idx += 1;
                if self.peek().is_some_and(TokenKind::starts_step) {
                    self.relative_path()?;
                }
                Ok(())
            }
            Some(TokenKind::DoubleSlash) => {
                self.idx += 1;
                self.relative_path()
            }
            Some(kind) if kind.starts_step() => self.relative_path(),
            _ => Err(self.unexpected()),
        }
    }

    fn relative_path(&mut self) -> Result<(), XPathError> {
        self.step()?;
        while matches!(self.peek(), Some(TokenKind::Slash | TokenKind::DoubleSlash)) {
            self.idx += 1;
            self.step()?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), XPathError> {
        match self.peek() {
            Some(TokenKind::Dot | TokenKind::DotDot) => {
                self.idx += 1;
                Ok(())
            }
            Some(TokenKind::At) => {
                self.idx += 1;
                self.node_test()?;
                self.predicates()
            }
            Some(TokenKind::NameTest | TokenKind::NodeType) => {
                self.node_test()?;
                self.predicates()
            }
            _ => Err(self.unexpected()),
        }
    }

    fn node_test(&mut self) -> Result<(), XPathError> {
        match self.peek() {
            Some(TokenKind::NameTest) => {
                self.idx += 1;
                Ok(())
            }
            Some(TokenKind::NodeType) => {
                self.idx += 1;
                self.expect(TokenKind::ParenOpen)?;
                self.expect(TokenKind::ParenClose)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn predicates(&mut self) -> Result<(), XPathError> {
        while self.peek() == Some(TokenKind::BracketOpen) {
            self.idx += 1;
            self.expr()?;
            self.expect(TokenKind::BracketClose)?;
        }
        Ok(())
    }

    fn primary_expr(&mut self) -> Result<(), XPathError> {
        match self.peek() {
            Some(TokenKind::ParenOpen) => {
                self.idx += 1;
                self.expr()?;
                self.expect(TokenKind::ParenClose)
            }
            Some(TokenKind::Literal | TokenKind::Number) => {
                self.idx += 1;
                Ok(())
            }
            Some(TokenKind::FunctionName) => self.function_call(),
            _ => Err(self.unexpected()),
        }
    }

    fn function_call(&mut self) -> Result<(), XPathError> {
        let name_idx = self.idx;
        let name = self.text(name_idx).to_string();
        let offset = self.tokens[name_idx].offset;
        let signature = functions::signature(&name).ok_or_else(|| XPathError::UnknownFunction {
            name: name.clone(),
            offset,
        })?;
        self.idx += 1;
        self.expect(TokenKind::ParenOpen)?;

        let mut found = 0;
        if self.peek() != Some(TokenKind::ParenClose) {
            self.expr()?;
            found += 1;
            while self.peek() == Some(TokenKind::Comma) {
                self.idx += 1;
                self.expr()?;
                found += 1;
            }
        }
        self.expect(TokenKind::ParenClose)?;

        if !signature.accepts(found) {
            return Err(XPathError::Arity {
                function: name,
                expected: signature.to_string(),
                found,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::XPathError;
    use crate::token::Expr;

    #[test]
    fn test_valid_expressions() {
        for text in [
            "/",
            "//a",
            "/ex:a/b[1]/@ex:attr",
            "../b[. = current()/../c]",
            "count(//a) > 2 and not(b)",
            "-(-1) + 2 * 3 div 4 mod 5",
            "(a | b)[2]/c",
            "concat('a', \"b\", 1)",
            "deref(../ref)/../x",
            "a//text()",
            "@*",
        ] {
            assert!(Expr::parse(text).is_ok(), "failed to parse {text}");
        }
    }

    #[test]
    fn test_leading_operator_is_rejected() {
        let err = Expr::parse("= 1").unwrap_err();
        assert!(matches!(err, XPathError::Syntax { offset: 0, message } if message.contains("operand")));
    }

    #[test]
    fn test_trailing_operator_is_rejected() {
        let err = Expr::parse("1 +").unwrap_err();
        assert_eq!(
            err,
            XPathError::Syntax {
                offset: 3,
                message: "unexpected end of expression".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_sequences() {
        assert!(Expr::parse("a b").is_err());
        assert!(Expr::parse("a/").is_err());
        assert!(Expr::parse("[1]").is_err());
        assert!(Expr::parse("f()").is_err());
        assert!(Expr::parse("./[1]").is_err());
        assert!(Expr::parse("()").is_err());
    }

    #[test]
    fn test_unknown_function() {
        let err = Expr::parse("a and frobnicate(1)").unwrap_err();
        assert_eq!(
            err,
            XPathError::UnknownFunction {
                name: "frobnicate".to_string(),
                offset: 6
            }
        );
    }

    #[test]
    fn test_wrong_arity() {
        let err = Expr::parse("count()").unwrap_err();
        assert_eq!(
            err,
            XPathError::Arity {
                function: "count".to_string(),
                expected: "1".to_string(),
                found: 0
            }
        );
        assert!(matches!(Expr::parse("concat('a')"), Err(XPathError::Arity { found: 1, .. })));
        assert!(matches!(Expr::parse("substring('a', 1, 2, 3)"), Err(XPathError::Arity { .. })));
        assert!(Expr::parse("substring('a', 1, 2)").is_ok());
    }

    #[test]
    fn test_repeat_spans_levels() {
        let expr = Expr::parse("1 + 2 = 3 or a | b").unwrap();
        // 0:1 1:+ 2:2 3:= 4:3 5:or 6:a 7:| 8:b
        assert_eq!(expr.tokens()[0].repeat, vec![1, 3, 5]);
        assert_eq!(expr.tokens()[6].repeat, vec![7]);
    }
}
