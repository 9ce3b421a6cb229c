// Recursive-descent parser for VCL. The parser does not recover: the first
// error aborts the parse and is surfaced to the driver as a diagnostic.

mod parser;

pub use parser::Parser;

use vcl_diagnostics::{Diagnostic, DiagnosticCode, Span};
use vcl_lexer::{LexError, LexErrorKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("unexpected token {found}: expecting {expected}")]
    Syntax {
        found: String,
        expected: String,
        span: Span,
    },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Lex(err) => Span::new(err.span.start, err.span.end),
            ParseError::Syntax { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = match self {
            ParseError::Lex(err) => match err.kind {
                LexErrorKind::InvalidCharacter => DiagnosticCode::InvalidCharacter,
                LexErrorKind::UnterminatedString => DiagnosticCode::UnterminatedString,
                LexErrorKind::NumericTooManyDots => DiagnosticCode::NumericTooManyDots,
            },
            ParseError::Syntax { .. } => DiagnosticCode::UnexpectedToken,
        };
        Diagnostic::error(code, self.to_string()).with_span(self.span())
    }
}

/// Parse a whole source buffer.
pub fn parse_source(source: &str) -> Result<vcl_ast::Program, ParseError> {
    Parser::new(source).parse_program()
}
