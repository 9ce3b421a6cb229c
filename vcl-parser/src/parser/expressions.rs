// Expression grammar: precedence climbing over a primary parser with a
// postfix loop. `+`/`-` are unary when they appear at a primary position
// and binary between two primaries.

use super::Parser;
use crate::ParseError;
use vcl_ast::*;
use vcl_lexer::{Number, TokenKind};

/// Binding powers; higher binds tighter. Assignment is the only
/// right-associative operator.
fn binary_precedence(kind: &TokenKind) -> Option<u8> {
    Some(match kind {
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 60,
        TokenKind::Plus | TokenKind::Minus => 50,
        TokenKind::Greater
        | TokenKind::Less
        | TokenKind::GreaterEqual
        | TokenKind::LessEqual => 40,
        TokenKind::EqualEqual | TokenKind::NotEqual => 35,
        TokenKind::AndAnd => 30,
        TokenKind::OrOr => 25,
        TokenKind::Assign => 10,
        _ => return None,
    })
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Rem,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Greater => BinaryOp::Gt,
        TokenKind::Less => BinaryOp::Lt,
        TokenKind::GreaterEqual => BinaryOp::Ge,
        TokenKind::LessEqual => BinaryOp::Le,
        TokenKind::EqualEqual => BinaryOp::Eq,
        TokenKind::NotEqual => BinaryOp::Ne,
        TokenKind::AndAnd => BinaryOp::And,
        TokenKind::OrOr => BinaryOp::Or,
        _ => return None,
    })
}

impl<'source> Parser<'source> {
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_primary()?;
        self.parse_binary_rhs(0, lhs)
    }

    fn parse_binary_rhs(&mut self, min_precedence: u8, mut lhs: Expr) -> Result<Expr, ParseError> {
        loop {
            let kind = self.peek_kind()?;
            let Some(precedence) = binary_precedence(&kind) else {
                return Ok(lhs);
            };
            if precedence < min_precedence {
                return Ok(lhs);
            }
            self.advance()?; // operator

            let mut rhs = self.parse_primary()?;

            let next = self.peek_kind()?;
            if let Some(next_precedence) = binary_precedence(&next) {
                // Right-associativity for `=`; left for everything else.
                let climbs = if kind == TokenKind::Assign {
                    next_precedence >= precedence
                } else {
                    next_precedence > precedence
                };
                if climbs {
                    rhs = self.parse_binary_rhs(precedence + u8::from(kind != TokenKind::Assign), rhs)?;
                }
            }

            let span = lhs.span.to(rhs.span);
            lhs = if kind == TokenKind::Assign {
                Expr::new(
                    ExprKind::Assignment {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    span,
                )
            } else {
                let op = binary_op(&kind).ok_or_else(|| ParseError::Syntax {
                    found: kind.describe(),
                    expected: "binary operator".to_string(),
                    span,
                })?;
                Expr::new(
                    ExprKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    span,
                )
            };
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.span_here()?;
        let expr = match self.peek_kind()? {
            TokenKind::Plus => self.parse_prefix(PrefixOp::Plus)?,
            TokenKind::Minus => self.parse_prefix(PrefixOp::Minus)?,
            TokenKind::Not => self.parse_prefix(PrefixOp::Not)?,
            TokenKind::PlusPlus => self.parse_prefix(PrefixOp::Increment)?,
            TokenKind::MinusMinus => self.parse_prefix(PrefixOp::Decrement)?,
            TokenKind::Number(Number::Int(value)) => {
                self.advance()?;
                Expr::new(ExprKind::IntLiteral(value), start)
            }
            TokenKind::Number(Number::Float(value)) => {
                self.advance()?;
                Expr::new(ExprKind::FloatLiteral(value), start)
            }
            TokenKind::Ident(name) => self.parse_name_expression(name, start)?,
            TokenKind::LParen => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "closing parenthesis")?;
                inner
            }
            TokenKind::LBrace => self.parse_aggregate(start)?,
            _ => return Err(self.error_here("expression")),
        };
        self.parse_postfix(expr)
    }

    fn parse_prefix(&mut self, op: PrefixOp) -> Result<Expr, ParseError> {
        let start = self.span_here()?;
        self.advance()?; // operator
        let operand = self.parse_primary()?;
        let span = start.to(operand.span);
        Ok(Expr::new(
            ExprKind::Prefix {
                op,
                expr: Box::new(operand),
            },
            span,
        ))
    }

    /// Identifier, plain call, or templated call. `name<…>` only becomes a
    /// call when a valid template argument list is directly followed by
    /// `(`; otherwise the `<` is comparison and we backtrack.
    fn parse_name_expression(&mut self, name: String, start: Span) -> Result<Expr, ParseError> {
        self.advance()?; // identifier

        match self.peek_kind()? {
            TokenKind::LParen => {
                let args = self.parse_call_args()?;
                Ok(Expr::new(
                    ExprKind::Call {
                        callee: name,
                        template_args: Vec::new(),
                        args,
                    },
                    start.to(self.last_span),
                ))
            }
            TokenKind::Less => {
                self.tokens.save();
                match self.parse_template_args() {
                    Ok(template_args) if self.check(&TokenKind::LParen)? => {
                        self.tokens.commit();
                        let args = self.parse_call_args()?;
                        Ok(Expr::new(
                            ExprKind::Call {
                                callee: name,
                                template_args,
                                args,
                            },
                            start.to(self.last_span),
                        ))
                    }
                    _ => {
                        self.tokens.restore();
                        Ok(Expr::new(ExprKind::Identifier(name), start))
                    }
                }
            }
            _ => Ok(Expr::new(ExprKind::Identifier(name), start)),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen)? {
            loop {
                args.push(self.parse_expression()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "closing parenthesis after arguments")?;
        Ok(args)
    }

    fn parse_aggregate(&mut self, start: Span) -> Result<Expr, ParseError> {
        self.advance()?; // {
        let mut values = Vec::new();
        if !self.check(&TokenKind::RBrace)? {
            loop {
                values.push(self.parse_expression()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace, "`}` after aggregate values")?;
        Ok(Expr::new(
            ExprKind::Aggregate(values),
            start.to(self.last_span),
        ))
    }

    /// Left-associative postfix loop: `++` `--` `.field` `[index]`.
    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            match self.peek_kind()? {
                TokenKind::PlusPlus => {
                    self.advance()?;
                    let span = expr.span.to(self.last_span);
                    expr = Expr::new(
                        ExprKind::Postfix {
                            op: PostfixOp::Increment,
                            expr: Box::new(expr),
                        },
                        span,
                    );
                }
                TokenKind::MinusMinus => {
                    self.advance()?;
                    let span = expr.span.to(self.last_span);
                    expr = Expr::new(
                        ExprKind::Postfix {
                            op: PostfixOp::Decrement,
                            expr: Box::new(expr),
                        },
                        span,
                    );
                }
                TokenKind::Dot => {
                    self.advance()?;
                    let (field, field_span) = self.expect_ident("field name after `.`")?;
                    let span = expr.span.to(field_span);
                    expr = Expr::new(
                        ExprKind::FieldAccess {
                            base: Box::new(expr),
                            field,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance()?;
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RBracket, "`]` after subscript")?;
                    let span = expr.span.to(self.last_span);
                    expr = Expr::new(
                        ExprKind::Subscript {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }
}
