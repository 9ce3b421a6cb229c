// Directive grammar. Directives are parsed into structured nodes here and
// executed later during emission; the parser never evaluates them.

use super::Parser;
use crate::ParseError;
use vcl_ast::*;
use vcl_lexer::{Number, TokenKind};

impl<'source> Parser<'source> {
    pub(crate) fn parse_directive_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span_here()?;
        self.advance()?; // @

        let node = match self.peek_kind()? {
            TokenKind::If => {
                self.advance()?;
                self.parse_conditional_directive()?
            }
            TokenKind::Ident(name) => {
                self.advance()?;
                match name.as_str() {
                    "import" => self.parse_import_directive()?,
                    "define" => self.parse_define_directive()?,
                    _ => self.parse_custom_directive(name)?,
                }
            }
            _ => return Err(self.error_here("directive name after `@`")),
        };

        Ok(Stmt::new(
            StmtKind::Directive(node),
            start.to(self.last_span),
        ))
    }

    fn parse_import_directive(&mut self) -> Result<DirectiveNode, ParseError> {
        let token = self.peek()?;
        let path = match token.kind {
            TokenKind::StringLiteral(path) => {
                self.advance()?;
                path
            }
            _ => return Err(self.error_here("path string after `@import`")),
        };
        self.expect(&TokenKind::Semicolon, "semicolon after `@import`")?;
        Ok(DirectiveNode::Import { path })
    }

    fn parse_define_directive(&mut self) -> Result<DirectiveNode, ParseError> {
        let (name, _) = self.expect_ident("name after `@define`")?;
        let value = if self.eat(&TokenKind::Assign)? {
            Some(self.parse_define_value()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon, "semicolon after `@define`")?;
        Ok(DirectiveNode::Define { name, value })
    }

    fn parse_define_value(&mut self) -> Result<DefineValue, ParseError> {
        let negative = self.eat(&TokenKind::Minus)?;
        match self.peek_kind()? {
            TokenKind::Number(Number::Int(value)) => {
                self.advance()?;
                Ok(DefineValue::Int(if negative { -value } else { value }))
            }
            TokenKind::Number(Number::Float(value)) => {
                self.advance()?;
                Ok(DefineValue::Float(if negative { -value } else { value }))
            }
            _ => Err(self.error_here("literal value after `=`")),
        }
    }

    /// `@if expr branch [@else (@if … | branch)]`; a branch is a compound
    /// or a single statement.
    fn parse_conditional_directive(&mut self) -> Result<DirectiveNode, ParseError> {
        let condition = self.parse_expression()?;
        let then_branch = self.parse_directive_branch()?;

        let else_branch = if self.at_directive_else()? {
            self.advance()?; // @
            self.advance()?; // else
            if self.at_directive_if()? {
                let start = self.span_here()?;
                self.advance()?; // @
                self.advance()?; // if
                let nested = self.parse_conditional_directive()?;
                Some(vec![Stmt::new(
                    StmtKind::Directive(nested),
                    start.to(self.last_span),
                )])
            } else {
                Some(self.parse_directive_branch()?)
            }
        } else {
            None
        };

        Ok(DirectiveNode::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_directive_branch(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if self.check(&TokenKind::LBrace)? {
            let compound = self.parse_compound_statement()?;
            match compound.kind {
                StmtKind::Compound(statements) => Ok(statements),
                _ => Ok(vec![compound]),
            }
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    fn at_directive_else(&mut self) -> Result<bool, ParseError> {
        Ok(self.check(&TokenKind::At)? && self.peek_kind_n(1)? == TokenKind::Else)
    }

    fn at_directive_if(&mut self) -> Result<bool, ParseError> {
        Ok(self.check(&TokenKind::At)? && self.peek_kind_n(1)? == TokenKind::If)
    }

    /// Host-registered directives keep their arguments as expressions.
    fn parse_custom_directive(&mut self, name: String) -> Result<DirectiveNode, ParseError> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::Semicolon)? {
            loop {
                args.push(self.parse_expression()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(&TokenKind::Semicolon, "semicolon after directive")?;
        Ok(DirectiveNode::Custom { name, args })
    }
}
