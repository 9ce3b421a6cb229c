// Directive execution. Directives are parsed into structured nodes by the
// parser and run here during emission: `@import` splices another source's
// top-level statements into the module, `@define` feeds the preprocessor
// state, and `@if` statically evaluates a restricted expression language.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

use crate::codegen::CodeGen;
use crate::CompileError;
use vcl_ast::{DefineValue, DirectiveNode, Expr, ExprKind, PrefixOp};
use vcl_diagnostics::{DiagnosticCode, Span};

/// Preprocessor state: imported paths (cycle breaking) and defines.
#[derive(Debug, Default)]
pub struct DirectiveState {
    imported: HashSet<PathBuf>,
    defines: HashMap<String, Option<DefineValue>>,
}

impl DirectiveState {
    /// Returns `true` when the path was already imported.
    pub fn track_import(&mut self, path: PathBuf) -> bool {
        !self.imported.insert(path)
    }

    /// Later defines of the same name win.
    pub fn add_define(&mut self, name: String, value: Option<DefineValue>) {
        self.defines.insert(name, value);
    }

    pub fn defined(&self, name: &str) -> bool {
        self.defines.contains_key(name)
    }

    pub fn get_define(&self, name: &str) -> Option<&Option<DefineValue>> {
        self.defines.get(name)
    }
}

/// Host extension point for `@name …;` directives beyond the built-ins.
pub trait DirectiveHandler {
    fn name(&self) -> &str;
    fn run(
        &self,
        cx: &mut CodeGen,
        args: &[Expr],
        span: Span,
    ) -> Result<(), CompileError>;
}

#[derive(Default)]
pub struct DirectiveRegistry {
    handlers: HashMap<String, Rc<dyn DirectiveHandler>>,
}

impl DirectiveRegistry {
    pub fn register(&mut self, handler: Box<dyn DirectiveHandler>) {
        self.handlers
            .insert(handler.name().to_string(), Rc::from(handler));
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn DirectiveHandler>> {
        self.handlers.get(name).cloned()
    }
}

/// Outcome of statically evaluating one `@if` subexpression, together with
/// whether the expression referred to a defined name.
#[derive(Debug, Clone, Copy, PartialEq)]
enum StaticValue {
    None,
    Int(i32),
    Float(f32),
    Flag(bool),
}

fn truthy(value: StaticValue) -> bool {
    match value {
        StaticValue::None => false,
        StaticValue::Int(v) => v != 0,
        StaticValue::Float(v) => v != 0.0,
        StaticValue::Flag(v) => v,
    }
}

impl<'ctx> CodeGen<'ctx> {
    pub(crate) fn run_directive(
        &mut self,
        node: &DirectiveNode,
        span: Span,
    ) -> Result<(), CompileError> {
        match node {
            DirectiveNode::Import { path } => self.run_import(path, span),
            DirectiveNode::Define { name, value } => {
                self.directive_state.add_define(name.clone(), value.clone());
                Ok(())
            }
            DirectiveNode::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let (value, _) = self.static_eval(condition)?;
                let branch = if truthy(value) {
                    Some(then_branch)
                } else {
                    else_branch.as_ref()
                };
                if let Some(statements) = branch {
                    for stmt in statements {
                        self.emit_statement(stmt)?;
                    }
                }
                Ok(())
            }
            DirectiveNode::Custom { name, args } => {
                let handler = self.directive_registry.get(name).ok_or_else(|| {
                    CompileError::new(
                        DiagnosticCode::UndefinedName,
                        format!("unknown directive `@{}`", name),
                    )
                    .with_span(span)
                })?;
                handler.run(self, args, span)
            }
        }
    }

    /// Load, parse and splice another source file; a path that was already
    /// imported (by its canonical form) is a no-op.
    fn run_import(&mut self, path: &str, span: Span) -> Result<(), CompileError> {
        let mut full = PathBuf::from(path);
        if full.is_relative() {
            if let Some(dir) = &self.source_dir {
                full = dir.join(full);
            }
        }
        let canonical = std::fs::canonicalize(&full).unwrap_or_else(|_| full.clone());
        if self.directive_state.track_import(canonical) {
            return Ok(());
        }

        let source = self.sources.load_from_disk(&full).map_err(|_| {
            CompileError::new(
                DiagnosticCode::FileNotFound,
                format!("@import error: file not found: `{}`", path),
            )
            .with_span(span)
        })?;
        let program = vcl_parser::parse_source(source.text())?;

        // Nested relative imports resolve against the imported file.
        let saved_dir = self.source_dir.take();
        self.source_dir = full.parent().map(|p| p.to_path_buf());
        let mut result = Ok(());
        for stmt in &program.statements {
            result = self.emit_statement(stmt);
            if result.is_err() {
                break;
            }
        }
        self.source_dir = saved_dir;
        result
    }

    /// The restricted static expression language: literals, identifiers
    /// read from the define state, `defined(name)`, and `!`. Everything
    /// else is rejected.
    fn static_eval(&self, expr: &Expr) -> Result<(StaticValue, bool), CompileError> {
        let reject = |what: &str| {
            Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!("{} cannot be used in a static expression", what),
            )
            .with_span(expr.span))
        };

        match &expr.kind {
            ExprKind::IntLiteral(value) => Ok((StaticValue::Int(*value), false)),
            ExprKind::FloatLiteral(value) => Ok((StaticValue::Float(*value), false)),
            ExprKind::Identifier(name) => match self.directive_state.get_define(name) {
                Some(Some(DefineValue::Int(value))) => Ok((StaticValue::Int(*value), true)),
                Some(Some(DefineValue::Float(value))) => {
                    Ok((StaticValue::Float(*value), true))
                }
                Some(None) => Ok((StaticValue::Flag(true), true)),
                None => Ok((StaticValue::None, false)),
            },
            ExprKind::Prefix {
                op: PrefixOp::Not,
                expr: operand,
            } => {
                let (value, defined) = self.static_eval(operand)?;
                Ok((StaticValue::Flag(!truthy(value)), !defined))
            }
            ExprKind::Call {
                callee,
                template_args,
                args,
            } if callee == "defined" => {
                if !template_args.is_empty() {
                    return reject("a templated call");
                }
                if args.len() != 1 {
                    return Err(CompileError::new(
                        DiagnosticCode::WrongArgCount,
                        "`defined` takes exactly one argument",
                    )
                    .with_span(expr.span));
                }
                let (_, defined) = self.static_eval(&args[0])?;
                Ok((StaticValue::Flag(defined), false))
            }
            ExprKind::Assignment { .. } => reject("the assignment operator"),
            ExprKind::Subscript { .. } => reject("the subscript operator"),
            ExprKind::FieldAccess { .. } => reject("the field access operator"),
            ExprKind::Aggregate(_) => reject("an aggregate value"),
            ExprKind::Call { .. } => reject("a function call"),
            ExprKind::Binary { .. } | ExprKind::Prefix { .. } | ExprKind::Postfix { .. } => {
                reject("an arithmetic operator")
            }
        }
    }
}
