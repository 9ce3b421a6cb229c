// Semantic frontend for VCL: lowers a parsed AST into LLVM IR through
// inkwell, then hands the module to the in-process JIT. The pipeline is
// single-threaded; one `VclModule` owns all state for one compilation.

pub mod codegen;
pub mod directives;
pub mod intrinsics;
pub mod scope;
pub mod session;
pub mod structs;
pub mod target;
pub mod templates;
pub mod types;
pub mod value;
pub mod verifier;

use inkwell::context::Context;
use std::path::PathBuf;

use vcl_ast::{DefineValue, Program};
use vcl_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticsEngine, Span};

pub use codegen::CodeGen;
pub use directives::DirectiveHandler;
pub use session::{ExecutionSession, SessionError};
pub use verifier::VerifierSettings;

/// A semantic error. Every diagnosable failure carries its taxonomy code and
/// the offending source span when one is known.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Option<Span>,
}

impl CompileError {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.code, self.message.clone());
        if let Some(span) = self.span {
            diag = diag.with_span(span);
        }
        diag
    }
}

impl From<inkwell::builder::BuilderError> for CompileError {
    fn from(err: inkwell::builder::BuilderError) -> Self {
        CompileError::new(
            DiagnosticCode::TypeMismatch,
            format!("IR builder failure: {}", err),
        )
    }
}

impl From<vcl_parser::ParseError> for CompileError {
    fn from(err: vcl_parser::ParseError) -> Self {
        let diag = err.to_diagnostic();
        CompileError {
            code: diag.code,
            message: diag.message,
            span: diag.span,
        }
    }
}

/// One compilation unit: wraps the code generator and exposes the host
/// surface (emit, verify, dump, submit).
#[derive(Debug)]
pub struct VclModule<'ctx> {
    cg: CodeGen<'ctx>,
}

impl<'ctx> VclModule<'ctx> {
    pub fn new(context: &'ctx Context, name: &str) -> Result<Self, CompileError> {
        Ok(Self {
            cg: CodeGen::new(context, name)?,
        })
    }

    /// Base directory for resolving relative `@import` paths.
    pub fn set_source_dir(&mut self, dir: PathBuf) {
        self.cg.set_source_dir(dir);
    }

    /// Host-side `@define`, visible to `@if` in subsequently emitted source.
    pub fn define(&mut self, name: impl Into<String>, value: Option<DefineValue>) {
        self.cg.directive_state.add_define(name.into(), value);
    }

    /// Register a host directive handler for `@name …;` forms.
    pub fn register_directive(&mut self, handler: Box<dyn DirectiveHandler>) {
        self.cg.directive_registry.register(handler);
    }

    /// Lower a parsed program into the module. May be called several times;
    /// later programs see the earlier ones' globals. The first semantic
    /// error halts emission and is recorded in the diagnostics engine.
    pub fn emit(&mut self, program: &Program) -> Result<(), CompileError> {
        self.cg.emit_program(program).map_err(|err| {
            self.cg.diagnostics.report(err.to_diagnostic());
            err
        })
    }

    /// Run LLVM's verifier plus the select-recursion check.
    pub fn verify(&mut self, settings: VerifierSettings) -> Result<(), CompileError> {
        verifier::verify_module(&mut self.cg, settings)
    }

    pub fn print_ir(&self) -> String {
        self.cg.module.print_to_string().to_string()
    }

    pub fn diagnostics(&self) -> &DiagnosticsEngine {
        &self.cg.diagnostics
    }

    /// Sources pulled in through `@import`, for diagnostics rendering.
    pub fn sources(&self) -> &[vcl_diagnostics::Source] {
        self.cg.sources.sources()
    }

    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticsEngine {
        &mut self.cg.diagnostics
    }

    /// Hand the finished module to the JIT.
    pub fn submit(self) -> Result<ExecutionSession<'ctx>, SessionError> {
        ExecutionSession::submit(self.cg.into_module())
    }
}

/// Convenience wrapper: parse and emit a source string into a fresh module.
pub fn compile_source<'ctx>(
    context: &'ctx Context,
    source: &str,
    name: &str,
) -> Result<VclModule<'ctx>, CompileError> {
    let program = vcl_parser::parse_source(source)?;
    let mut module = VclModule::new(context, name)?;
    module.emit(&program)?;
    Ok(module)
}
