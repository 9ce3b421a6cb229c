// Parser core: token cursor helpers shared by the statement, expression,
// type and directive sub-modules.

use crate::ParseError;
use vcl_ast::*;
use vcl_lexer::{Token, TokenKind, TokenStream};

mod directives;
mod expressions;
mod statements;
mod types;

pub struct Parser<'source> {
    pub(crate) tokens: TokenStream<'source>,
    /// Span of the most recently consumed token; closes statement spans.
    pub(crate) last_span: Span,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            tokens: TokenStream::new(source),
            last_span: Span::default(),
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        while !self.at_eof()? {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    // ==================== Cursor helpers ====================

    pub(crate) fn peek(&mut self) -> Result<Token, ParseError> {
        Ok(self.tokens.peek()?.clone())
    }

    pub(crate) fn peek_kind(&mut self) -> Result<TokenKind, ParseError> {
        Ok(self.tokens.peek()?.kind.clone())
    }

    pub(crate) fn peek_kind_n(&mut self, n: usize) -> Result<TokenKind, ParseError> {
        Ok(self.tokens.peek_n(n)?.kind.clone())
    }

    pub(crate) fn advance(&mut self) -> Result<Token, ParseError> {
        let token = self.tokens.next_token()?;
        self.last_span = Span::from(token.span.clone());
        Ok(token)
    }

    pub(crate) fn at_eof(&mut self) -> Result<bool, ParseError> {
        Ok(self.tokens.peek()?.kind == TokenKind::EndOfFile)
    }

    /// Does the current token have the same discriminant as `kind`?
    pub(crate) fn check(&mut self, kind: &TokenKind) -> Result<bool, ParseError> {
        let current = &self.tokens.peek()?.kind;
        Ok(std::mem::discriminant(current) == std::mem::discriminant(kind))
    }

    /// Consume the current token if it matches `kind`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> Result<bool, ParseError> {
        if self.check(kind)? {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consume a token of the given kind or fail naming what was expected.
    pub(crate) fn expect(
        &mut self,
        kind: &TokenKind,
        expected: &str,
    ) -> Result<Token, ParseError> {
        if self.check(kind)? {
            self.advance()
        } else {
            Err(self.error_here(expected))
        }
    }

    pub(crate) fn expect_ident(&mut self, expected: &str) -> Result<(String, Span), ParseError> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance()?;
                Ok((name, Span::from(token.span)))
            }
            _ => Err(self.error_here(expected)),
        }
    }

    /// Build a syntax error pointing at the current token.
    pub(crate) fn error_here(&mut self, expected: &str) -> ParseError {
        match self.peek() {
            Ok(token) => ParseError::Syntax {
                found: token.kind.describe(),
                expected: expected.to_string(),
                span: Span::from(token.span),
            },
            Err(err) => err,
        }
    }

    pub(crate) fn span_here(&mut self) -> Result<Span, ParseError> {
        Ok(Span::from(self.tokens.peek()?.span.clone()))
    }
}
