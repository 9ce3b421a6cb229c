// Diagnostics for the VCL compiler: source buffers, spans, and a severity
// policy engine. Rendering follows the rustc style with colored headers and
// a caret underline under the offending range.

use colored::Colorize;
use std::fmt;

pub mod source;
pub use source::{Source, SourceError, SourceManager};

/// Half-open byte range into a [`Source`] buffer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize,
)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Smallest span covering both operands.
    pub fn to(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(r: std::ops::Range<usize>) -> Self {
        Span {
            start: r.start,
            end: r.end,
        }
    }
}

/// Severity levels, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ignored,
    Note,
    Remark,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Ignored => write!(f, "ignored"),
            Severity::Note => write!(f, "{}", "note".cyan().bold()),
            Severity::Remark => write!(f, "{}", "remark".blue().bold()),
            Severity::Warning => write!(f, "{}", "warning".yellow().bold()),
            Severity::Error => write!(f, "{}", "error".red().bold()),
        }
    }
}

/// The full diagnostic taxonomy. Codes are stable; messages carry the
/// offending tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    FileNotFound,
    InvalidCharacter,
    UnterminatedString,
    NumericTooManyDots,
    UnexpectedToken,
    UndefinedName,
    Redefinition,
    TypeMismatch,
    ImplicitPrecisionLoss,
    NotCallable,
    WrongArgCount,
    WrongArgType,
    NotAnLValue,
    AssignToConst,
    MissingReturn,
    BreakOutsideLoop,
    MissingTemplateArg,
    TemplateArgKindMismatch,
    InferenceFailure,
    NonConstantInitializer,
    UnsupportedCast,
    UnsupportedAggregate,
    SelectRecursion,
}

impl DiagnosticCode {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticCode::FileNotFound => "E0001",
            DiagnosticCode::InvalidCharacter => "E0002",
            DiagnosticCode::UnterminatedString => "E0003",
            DiagnosticCode::NumericTooManyDots => "E0004",
            DiagnosticCode::UnexpectedToken => "E0005",
            DiagnosticCode::UndefinedName => "E0010",
            DiagnosticCode::Redefinition => "E0011",
            DiagnosticCode::TypeMismatch => "E0020",
            DiagnosticCode::ImplicitPrecisionLoss => "E0021",
            DiagnosticCode::NotCallable => "E0022",
            DiagnosticCode::WrongArgCount => "E0023",
            DiagnosticCode::WrongArgType => "E0024",
            DiagnosticCode::NotAnLValue => "E0025",
            DiagnosticCode::AssignToConst => "E0026",
            DiagnosticCode::MissingReturn => "E0027",
            DiagnosticCode::BreakOutsideLoop => "E0028",
            DiagnosticCode::MissingTemplateArg => "E0030",
            DiagnosticCode::TemplateArgKindMismatch => "E0031",
            DiagnosticCode::InferenceFailure => "E0032",
            DiagnosticCode::NonConstantInitializer => "E0040",
            DiagnosticCode::UnsupportedCast => "E0041",
            DiagnosticCode::UnsupportedAggregate => "E0042",
            DiagnosticCode::SelectRecursion => "W0100",
        }
    }
}

/// One diagnostic record.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Render in rustc style against the source the span points into.
    pub fn render(&self, source: &Source) -> String {
        let mut out = format!(
            "{}[{}]: {}\n",
            self.severity,
            self.code.code(),
            self.message.bold()
        );

        if let Some(span) = self.span {
            let (line, column) = source.line_col(span.start);
            out.push_str(&format!(
                " {} {}:{}:{}\n",
                "-->".cyan().bold(),
                source.name(),
                line,
                column
            ));
            if let Some(text) = source.line_text(line) {
                let width = line.to_string().len().max(2);
                out.push_str(&format!(
                    " {} {} {}\n",
                    format!("{:>width$}", line, width = width).cyan().bold(),
                    "|".cyan().bold(),
                    text.trim_end()
                ));
                let underline = "^".repeat(span.len().max(1).min(text.len().max(1)));
                out.push_str(&format!(
                    " {} {} {}{}\n",
                    " ".repeat(width),
                    "|".cyan().bold(),
                    " ".repeat(column.saturating_sub(1)),
                    underline.red().bold()
                ));
            }
        }

        for note in &self.notes {
            out.push_str(&format!(" {} {}\n", "=".cyan().bold(), note));
        }

        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code.code(), self.message)
    }
}

/// Escalation / suppression policy applied before a diagnostic is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticsPolicy {
    pub treat_warning_as_error: bool,
    pub ignore_all_warning: bool,
    pub ignore_all_remark: bool,
    pub ignore_all_note: bool,
}

/// Receives diagnostics, applies the policy, and keeps what survives.
/// `report` returns `false` iff the diagnostic is fatal after escalation so
/// callers can short-circuit.
#[derive(Debug, Default)]
pub struct DiagnosticsEngine {
    policy: DiagnosticsPolicy,
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticsEngine {
    pub fn new(policy: DiagnosticsPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    fn bump(&self, severity: Severity) -> Severity {
        match severity {
            Severity::Warning if self.policy.treat_warning_as_error => Severity::Error,
            Severity::Warning if self.policy.ignore_all_warning => Severity::Ignored,
            Severity::Remark if self.policy.ignore_all_remark => Severity::Ignored,
            Severity::Note if self.policy.ignore_all_note => Severity::Ignored,
            other => other,
        }
    }

    pub fn report(&mut self, mut diagnostic: Diagnostic) -> bool {
        diagnostic.severity = self.bump(diagnostic.severity);
        match diagnostic.severity {
            Severity::Ignored => return true,
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            _ => {}
        }
        let fatal = diagnostic.severity == Severity::Error;
        self.diagnostics.push(diagnostic);
        !fatal
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        self.error_count = 0;
        self.warning_count = 0;
        std::mem::take(&mut self.diagnostics)
    }

    /// Print everything collected so far against the given source.
    pub fn print_all(&self, source: &Source) {
        for diag in &self.diagnostics {
            eprintln!("{}", diag.render(source));
        }
    }
}

/// Thin convenience wrapper over an engine.
pub struct DiagnosticReporter<'e> {
    engine: &'e mut DiagnosticsEngine,
}

impl<'e> DiagnosticReporter<'e> {
    pub fn new(engine: &'e mut DiagnosticsEngine) -> Self {
        Self { engine }
    }

    pub fn error(&mut self, code: DiagnosticCode, message: impl Into<String>) -> bool {
        self.engine.report(Diagnostic::error(code, message))
    }

    pub fn warn(&mut self, code: DiagnosticCode, message: impl Into<String>) -> bool {
        self.engine.report(Diagnostic::warning(code, message))
    }

    pub fn remark(&mut self, code: DiagnosticCode, message: impl Into<String>) -> bool {
        self.engine
            .report(Diagnostic::new(Severity::Remark, code, message))
    }

    pub fn note(&mut self, code: DiagnosticCode, message: impl Into<String>) -> bool {
        self.engine
            .report(Diagnostic::new(Severity::Note, code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_returns_false_on_error() {
        let mut engine = DiagnosticsEngine::default();
        assert!(engine.report(Diagnostic::warning(
            DiagnosticCode::SelectRecursion,
            "warning"
        )));
        assert!(!engine.report(Diagnostic::error(
            DiagnosticCode::TypeMismatch,
            "error"
        )));
        assert_eq!(engine.error_count(), 1);
        assert_eq!(engine.warning_count(), 1);
    }

    #[test]
    fn warnings_escalate_per_policy() {
        let mut engine = DiagnosticsEngine::new(DiagnosticsPolicy {
            treat_warning_as_error: true,
            ..Default::default()
        });
        assert!(!engine.report(Diagnostic::warning(
            DiagnosticCode::SelectRecursion,
            "escalated"
        )));
        assert!(engine.has_errors());
    }

    #[test]
    fn ignored_diagnostics_are_dropped() {
        let mut engine = DiagnosticsEngine::new(DiagnosticsPolicy {
            ignore_all_warning: true,
            ..Default::default()
        });
        assert!(engine.report(Diagnostic::warning(
            DiagnosticCode::SelectRecursion,
            "dropped"
        )));
        assert!(engine.diagnostics().is_empty());
    }
}
