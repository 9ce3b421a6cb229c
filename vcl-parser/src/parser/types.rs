// Type syntax: `[const|in|out]* name [<template-args>]`.

use super::Parser;
use crate::ParseError;
use vcl_ast::*;
use vcl_lexer::{Number, TokenKind};

impl<'source> Parser<'source> {
    /// Is the current token able to start a type? Identifiers only count
    /// when the shape around them looks like a declaration; callers that
    /// need that distinction speculate with save/restore instead.
    pub(crate) fn at_type_keyword(&mut self) -> Result<bool, ParseError> {
        Ok(matches!(
            self.peek_kind()?,
            TokenKind::Const
                | TokenKind::In
                | TokenKind::Out
                | TokenKind::Float
                | TokenKind::Bool
                | TokenKind::Int
                | TokenKind::Void
                | TokenKind::VFloat
                | TokenKind::VBool
                | TokenKind::VInt
                | TokenKind::Array
                | TokenKind::Span
        ))
    }

    pub(crate) fn parse_type_info(&mut self) -> Result<TypeInfo, ParseError> {
        let mut qualifiers = Qualifiers::default();
        loop {
            match self.peek_kind()? {
                TokenKind::Const => {
                    self.advance()?;
                    qualifiers.is_const = true;
                }
                TokenKind::In => {
                    self.advance()?;
                    qualifiers.is_in = true;
                }
                TokenKind::Out => {
                    self.advance()?;
                    qualifiers.is_out = true;
                }
                _ => break,
            }
        }

        let token = self.peek()?;
        let mut info = match token.kind {
            TokenKind::Float => TypeInfo::simple(TypeKind::Float),
            TokenKind::Bool => TypeInfo::simple(TypeKind::Bool),
            TokenKind::Int => TypeInfo::simple(TypeKind::Int),
            TokenKind::Void => TypeInfo::simple(TypeKind::Void),
            TokenKind::VFloat => TypeInfo::simple(TypeKind::VectorFloat),
            TokenKind::VBool => TypeInfo::simple(TypeKind::VectorBool),
            TokenKind::VInt => TypeInfo::simple(TypeKind::VectorInt),
            TokenKind::Array => TypeInfo::simple(TypeKind::Array),
            TokenKind::Span => TypeInfo::simple(TypeKind::Span),
            TokenKind::Ident(ref name) => TypeInfo::custom(name.clone()),
            _ => return Err(self.error_here("type name")),
        };
        self.advance()?;
        info.qualifiers = qualifiers;

        // Only parameterised kinds accept an argument list.
        let takes_args = matches!(
            info.kind,
            TypeKind::Array | TypeKind::Span | TypeKind::Custom
        );
        if takes_args && self.check(&TokenKind::Less)? {
            info.template_args = self.parse_template_args()?;
        }

        Ok(info)
    }

    /// `<arg, …>` where each arg is a type or an integer constant.
    pub(crate) fn parse_template_args(&mut self) -> Result<Vec<TemplateArg>, ParseError> {
        self.expect(&TokenKind::Less, "`<`")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::Greater)? {
            loop {
                args.push(self.parse_template_arg()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(&TokenKind::Greater, "`>` after template arguments")?;
        Ok(args)
    }

    fn parse_template_arg(&mut self) -> Result<TemplateArg, ParseError> {
        match self.peek_kind()? {
            TokenKind::Number(Number::Int(value)) => {
                self.advance()?;
                Ok(TemplateArg::Int(value))
            }
            TokenKind::Number(Number::Float(_)) => {
                Err(self.error_here("typename or integer template argument"))
            }
            _ => Ok(TemplateArg::Typename(self.parse_type_info()?)),
        }
    }

    /// `<typename T, int N, …>` in a template declaration.
    pub(crate) fn parse_template_params(&mut self) -> Result<Vec<TemplateParam>, ParseError> {
        self.expect(&TokenKind::Less, "`<`")?;
        let mut params = Vec::new();
        loop {
            let kind = match self.peek_kind()? {
                TokenKind::Typename => {
                    self.advance()?;
                    TemplateParamKind::Typename
                }
                TokenKind::Int => {
                    self.advance()?;
                    TemplateParamKind::Int
                }
                _ => return Err(self.error_here("`typename` or `int` template parameter")),
            };
            let (name, _) = self.expect_ident("template parameter name")?;
            params.push(TemplateParam { name, kind });
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(&TokenKind::Greater, "`>` after template parameters")?;
        Ok(params)
    }
}
