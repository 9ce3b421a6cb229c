// Statement grammar. A semicolon terminates every statement that is not a
// compound, a function body, a struct declaration, or control flow with a
// body.

use super::Parser;
use crate::ParseError;
use vcl_ast::*;
use vcl_lexer::TokenKind;

impl<'source> Parser<'source> {
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind()? {
            TokenKind::At => self.parse_directive_statement(),
            TokenKind::Struct => self.parse_struct_declaration(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Break => self.parse_break_statement(),
            TokenKind::LBrace => self.parse_compound_statement(),
            _ => {
                if self.statement_starts_declaration()? {
                    self.parse_declaration()
                } else {
                    self.parse_expression_statement()
                }
            }
        }
    }

    /// Type keywords always open a declaration. A leading identifier only
    /// does when it is followed by (optionally templated) another
    /// identifier, which is decided by bounded lookahead.
    fn statement_starts_declaration(&mut self) -> Result<bool, ParseError> {
        if self.at_type_keyword()? {
            return Ok(true);
        }
        if !matches!(self.peek_kind()?, TokenKind::Ident(_)) {
            return Ok(false);
        }
        self.tokens.save();
        let looks_like_declaration = self.declaration_lookahead();
        self.tokens.restore();
        Ok(looks_like_declaration.unwrap_or(false))
    }

    fn declaration_lookahead(&mut self) -> Result<bool, ParseError> {
        self.advance()?; // custom type name
        if self.check(&TokenKind::Less)? && self.parse_template_args().is_err() {
            return Ok(false);
        }
        Ok(matches!(self.peek_kind()?, TokenKind::Ident(_)))
    }

    /// type name `(`…  → function; type name `<`… → function template;
    /// otherwise a variable declaration.
    fn parse_declaration(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span_here()?;
        let ty = self.parse_type_info()?;
        let (name, name_span) = self.expect_ident("identifier after type")?;

        match self.peek_kind()? {
            TokenKind::LParen => self.parse_function(start, ty, name, name_span),
            TokenKind::Less => self.parse_function_template(start, ty, name, name_span),
            _ => {
                let initializer = if self.eat(&TokenKind::Assign)? {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                self.expect(&TokenKind::Semicolon, "semicolon after declaration")?;
                Ok(Stmt::new(
                    StmtKind::VariableDeclaration {
                        ty,
                        name,
                        initializer,
                    },
                    start.to(self.last_span),
                ))
            }
        }
    }

    fn parse_parameter_list(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen)? {
            loop {
                let param_start = self.span_here()?;
                let ty = self.parse_type_info()?;
                let (name, _) = self.expect_ident("parameter name")?;
                params.push(Param {
                    name,
                    ty,
                    span: param_start.to(self.last_span),
                });
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "closing parenthesis after parameters")?;
        Ok(params)
    }

    fn parse_function(
        &mut self,
        start: Span,
        return_type: TypeInfo,
        name: String,
        name_span: Span,
    ) -> Result<Stmt, ParseError> {
        let params = self.parse_parameter_list()?;
        let prototype = FunctionPrototype {
            return_type,
            name,
            params,
            span: start.to(name_span),
        };

        if self.check(&TokenKind::LBrace)? {
            let body = self.parse_compound_statement()?;
            Ok(Stmt::new(
                StmtKind::FunctionDeclaration {
                    prototype,
                    body: Box::new(body),
                },
                start.to(self.last_span),
            ))
        } else {
            self.expect(&TokenKind::Semicolon, "semicolon after function prototype")?;
            Ok(Stmt::new(
                StmtKind::FunctionPrototype(prototype),
                start.to(self.last_span),
            ))
        }
    }

    fn parse_function_template(
        &mut self,
        start: Span,
        return_type: TypeInfo,
        name: String,
        name_span: Span,
    ) -> Result<Stmt, ParseError> {
        let template_params = self.parse_template_params()?;
        let params = self.parse_parameter_list()?;
        let prototype = FunctionPrototype {
            return_type,
            name,
            params,
            span: start.to(name_span),
        };
        if !self.check(&TokenKind::LBrace)? {
            return Err(self.error_here("function template body"));
        }
        let body = self.parse_compound_statement()?;
        Ok(Stmt::new(
            StmtKind::FunctionTemplateDeclaration {
                prototype,
                params: template_params,
                body: Box::new(body),
            },
            start.to(self.last_span),
        ))
    }

    fn parse_struct_declaration(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span_here()?;
        self.advance()?; // struct
        let (name, _) = self.expect_ident("struct name")?;

        let template_params = if self.check(&TokenKind::Less)? {
            Some(self.parse_template_params()?)
        } else {
            None
        };

        self.expect(&TokenKind::LBrace, "`{` after struct name")?;
        let mut fields = Vec::new();
        while !self.eat(&TokenKind::RBrace)? {
            let field_start = self.span_here()?;
            let ty = self.parse_type_info()?;
            let (field_name, _) = self.expect_ident("field name")?;
            self.expect(&TokenKind::Semicolon, "semicolon after field")?;
            fields.push(FieldDecl {
                name: field_name,
                ty,
                span: field_start.to(self.last_span),
            });
        }

        let kind = match template_params {
            Some(params) => StmtKind::StructTemplateDeclaration {
                name,
                params,
                fields,
            },
            None => StmtKind::StructDeclaration { name, fields },
        };
        Ok(Stmt::new(kind, start.to(self.last_span)))
    }

    pub(crate) fn parse_compound_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span_here()?;
        self.expect(&TokenKind::LBrace, "`{`")?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace)? {
            if self.at_eof()? {
                return Err(self.error_here("`}`"));
            }
            statements.push(self.parse_statement()?);
        }
        self.advance()?; // }
        Ok(Stmt::new(
            StmtKind::Compound(statements),
            start.to(self.last_span),
        ))
    }

    fn parse_return_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span_here()?;
        self.advance()?; // return
        let value = if self.check(&TokenKind::Semicolon)? {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon, "semicolon after return")?;
        Ok(Stmt::new(StmtKind::Return(value), start.to(self.last_span)))
    }

    /// Body of `if`/`while`/`for`: a compound or a single statement.
    fn parse_branch(&mut self) -> Result<Stmt, ParseError> {
        if self.check(&TokenKind::LBrace)? {
            self.parse_compound_statement()
        } else {
            self.parse_statement()
        }
    }

    fn parse_if_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span_here()?;
        self.advance()?; // if
        self.expect(&TokenKind::LParen, "opening parenthesis after `if`")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "closing parenthesis after condition")?;
        let then_branch = self.parse_branch()?;
        let else_branch = if self.eat(&TokenKind::Else)? {
            Some(Box::new(self.parse_branch()?))
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch: Box::new(then_branch),
                else_branch,
            },
            start.to(self.last_span),
        ))
    }

    fn parse_while_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span_here()?;
        self.advance()?; // while
        self.expect(&TokenKind::LParen, "opening parenthesis after `while`")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "closing parenthesis after condition")?;
        let body = self.parse_branch()?;
        Ok(Stmt::new(
            StmtKind::While {
                condition,
                body: Box::new(body),
            },
            start.to(self.last_span),
        ))
    }

    fn parse_for_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span_here()?;
        self.advance()?; // for
        self.expect(&TokenKind::LParen, "opening parenthesis after `for`")?;
        let init = self.parse_statement()?; // consumes its own semicolon
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon, "semicolon after loop condition")?;
        let step_start = self.span_here()?;
        let step_expr = self.parse_expression()?;
        let step = Stmt::new(
            StmtKind::Expression(step_expr),
            step_start.to(self.last_span),
        );
        self.expect(&TokenKind::RParen, "closing parenthesis after loop step")?;
        let body = self.parse_branch()?;
        Ok(Stmt::new(
            StmtKind::For {
                init: Box::new(init),
                condition,
                step: Box::new(step),
                body: Box::new(body),
            },
            start.to(self.last_span),
        ))
    }

    fn parse_break_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span_here()?;
        self.advance()?; // break
        self.expect(&TokenKind::Semicolon, "semicolon after `break`")?;
        Ok(Stmt::new(StmtKind::Break, start.to(self.last_span)))
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span_here()?;
        let expr = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon, "semicolon after expression")?;
        Ok(Stmt::new(
            StmtKind::Expression(expr),
            start.to(self.last_span),
        ))
    }
}
