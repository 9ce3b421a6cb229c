// Abstract syntax tree for VCL. Statements and expressions are tagged sum
// types; every node carries its source span. Type syntax is captured as
// `TypeInfo` values which the compiler later lowers to LLVM types.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use vcl_diagnostics::Span;

/// Root of a parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Type qualifier set. `const` makes storage read-only after initialization,
/// `in`/`out` bind a symbol to host memory (external linkage at global
/// scope, by-value/by-reference at parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_in: bool,
    pub is_out: bool,
}

impl Qualifiers {
    pub fn is_extern(&self) -> bool {
        self.is_in || self.is_out
    }

    pub fn is_empty(&self) -> bool {
        !(self.is_const || self.is_in || self.is_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    None,
    Custom,
    Callable,
    Aggregate,
    Float,
    Bool,
    Int,
    Void,
    VectorFloat,
    VectorBool,
    VectorInt,
    Array,
    Span,
}

/// Semantic type descriptor as written in source. `name` is only meaningful
/// for `Custom`; `template_args` for `Custom`, `Array` and `Span`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub kind: TypeKind,
    pub qualifiers: Qualifiers,
    pub name: String,
    pub template_args: Vec<TemplateArg>,
}

impl TypeInfo {
    pub fn simple(kind: TypeKind) -> Self {
        Self {
            kind,
            qualifiers: Qualifiers::default(),
            name: String::new(),
            template_args: Vec::new(),
        }
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::Custom,
            qualifiers: Qualifiers::default(),
            name: name.into(),
            template_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<TemplateArg>) -> Self {
        self.template_args = args;
        self
    }

    pub fn with_qualifiers(mut self, qualifiers: Qualifiers) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    pub fn is_vector(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::VectorFloat | TypeKind::VectorBool | TypeKind::VectorInt
        )
    }

    pub fn is_extern(&self) -> bool {
        self.qualifiers.is_extern()
    }

    pub fn is_const(&self) -> bool {
        self.qualifiers.is_const
    }

    /// The element kind of a vector, or the kind itself for scalars.
    pub fn scalar_kind(&self) -> TypeKind {
        match self.kind {
            TypeKind::VectorFloat => TypeKind::Float,
            TypeKind::VectorBool => TypeKind::Bool,
            TypeKind::VectorInt => TypeKind::Int,
            other => other,
        }
    }

    /// Parameter passing convention. Aggregates and `out` parameters travel
    /// by reference; everything else (and anything `in`) by value.
    pub fn is_given_by_value(&self) -> bool {
        (!self.qualifiers.is_out
            && self.kind != TypeKind::Custom
            && self.kind != TypeKind::Array)
            || self.qualifiers.is_in
    }

    pub fn is_given_by_reference(&self) -> bool {
        !self.is_given_by_value()
    }

    /// Flat name used for mangled symbols: `array<float, 8>` renders as
    /// `array_float_8`.
    pub fn mangle(&self) -> String {
        let mut out = String::new();
        match self.kind {
            TypeKind::Custom => out.push_str(&self.name),
            other => out.push_str(kind_name(other)),
        }
        for arg in &self.template_args {
            out.push('_');
            out.push_str(&arg.mangle());
        }
        out
    }
}

fn kind_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::None => "none",
        TypeKind::Custom => "custom",
        TypeKind::Callable => "callable",
        TypeKind::Aggregate => "aggregate",
        TypeKind::Float => "float",
        TypeKind::Bool => "bool",
        TypeKind::Int => "int",
        TypeKind::Void => "void",
        TypeKind::VectorFloat => "vfloat",
        TypeKind::VectorBool => "vbool",
        TypeKind::VectorInt => "vint",
        TypeKind::Array => "array",
        TypeKind::Span => "span",
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.qualifiers.is_const {
            write!(f, "const ")?;
        }
        if self.qualifiers.is_in {
            write!(f, "in ")?;
        }
        if self.qualifiers.is_out {
            write!(f, "out ")?;
        }
        match self.kind {
            TypeKind::Custom => write!(f, "{}", self.name)?,
            other => write!(f, "{}", kind_name(other))?,
        }
        if !self.template_args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.template_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// A template argument is either a type or a compile-time integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateArg {
    Typename(TypeInfo),
    Int(i32),
}

impl TemplateArg {
    pub fn kind(&self) -> TemplateParamKind {
        match self {
            TemplateArg::Typename(_) => TemplateParamKind::Typename,
            TemplateArg::Int(_) => TemplateParamKind::Int,
        }
    }

    pub fn mangle(&self) -> String {
        match self {
            TemplateArg::Typename(info) => info.mangle(),
            TemplateArg::Int(value) => value.to_string(),
        }
    }
}

impl fmt::Display for TemplateArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateArg::Typename(info) => write!(f, "{}", info),
            TemplateArg::Int(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateParamKind {
    Typename,
    Int,
}

impl fmt::Display for TemplateParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateParamKind::Typename => write!(f, "typename"),
            TemplateParamKind::Int => write!(f, "int"),
        }
    }
}

/// `typename T` or `int N` in a template parameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: String,
    pub kind: TemplateParamKind,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeInfo,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionPrototype {
    pub return_type: TypeInfo,
    pub name: String,
    pub params: Vec<Param>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeInfo,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Compound(Vec<Stmt>),
    VariableDeclaration {
        ty: TypeInfo,
        name: String,
        initializer: Option<Expr>,
    },
    FunctionPrototype(FunctionPrototype),
    FunctionDeclaration {
        prototype: FunctionPrototype,
        body: Box<Stmt>,
    },
    StructDeclaration {
        name: String,
        fields: Vec<FieldDecl>,
    },
    StructTemplateDeclaration {
        name: String,
        params: Vec<TemplateParam>,
        fields: Vec<FieldDecl>,
    },
    FunctionTemplateDeclaration {
        prototype: FunctionPrototype,
        params: Vec<TemplateParam>,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Box<Stmt>,
        condition: Expr,
        step: Box<Stmt>,
        body: Box<Stmt>,
    },
    Break,
    Directive(DirectiveNode),
    Expression(Expr),
}

// ---------------------------------------------------------------------------
// Directives
// ---------------------------------------------------------------------------

/// Literal value attached to `@define`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefineValue {
    Int(i32),
    Float(f32),
}

/// Parsed form of a `@name …;` directive. Built-ins are structural; anything
/// else is kept verbatim for host-registered handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DirectiveNode {
    Import {
        path: String,
    },
    Define {
        name: String,
        value: Option<DefineValue>,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    Custom {
        name: String,
        args: Vec<Expr>,
    },
}

impl DirectiveNode {
    pub fn name(&self) -> &str {
        match self {
            DirectiveNode::Import { .. } => "import",
            DirectiveNode::Define { .. } => "define",
            DirectiveNode::If { .. } => "if",
            DirectiveNode::Custom { name, .. } => name,
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Syntactic l-value check used before emission: only names, fields and
    /// subscripts can denote storage.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Identifier(_)
                | ExprKind::FieldAccess { .. }
                | ExprKind::Subscript { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    IntLiteral(i32),
    FloatLiteral(f32),
    Identifier(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assignment {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Prefix {
        op: PrefixOp,
        expr: Box<Expr>,
    },
    Postfix {
        op: PostfixOp,
        expr: Box<Expr>,
    },
    FieldAccess {
        base: Box<Expr>,
        field: String,
    },
    Subscript {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: String,
        template_args: Vec<TemplateArg>,
        args: Vec<Expr>,
    },
    Aggregate(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefixOp {
    Plus,
    Minus,
    Not,
    Increment,
    Decrement,
}

impl PrefixOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            PrefixOp::Plus => "+",
            PrefixOp::Minus => "-",
            PrefixOp::Not => "!",
            PrefixOp::Increment => "++",
            PrefixOp::Decrement => "--",
        }
    }
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

impl PostfixOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            PostfixOp::Increment => "++",
            PostfixOp::Decrement => "--",
        }
    }
}

impl fmt::Display for PostfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_display() {
        let mut info = TypeInfo::simple(TypeKind::Array).with_args(vec![
            TemplateArg::Typename(TypeInfo::simple(TypeKind::Float)),
            TemplateArg::Int(8),
        ]);
        info.qualifiers.is_const = true;
        assert_eq!(info.to_string(), "const array<float, 8>");
        assert_eq!(info.mangle(), "array_float_8");
    }

    #[test]
    fn passing_convention() {
        let by_value = TypeInfo::simple(TypeKind::Float);
        assert!(by_value.is_given_by_value());

        let mut out_float = TypeInfo::simple(TypeKind::Float);
        out_float.qualifiers.is_out = true;
        assert!(out_float.is_given_by_reference());

        let custom = TypeInfo::custom("Vec3");
        assert!(custom.is_given_by_reference());

        let mut in_array = TypeInfo::simple(TypeKind::Array);
        in_array.qualifiers.is_in = true;
        assert!(in_array.is_given_by_value());
    }

    #[test]
    fn ast_round_trips_through_serde() {
        let program = Program {
            statements: vec![Stmt::new(
                StmtKind::Expression(Expr::new(ExprKind::IntLiteral(3), Span::new(0, 1))),
                Span::new(0, 2),
            )],
        };
        let json = serde_json::to_string(&program).unwrap();
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(program, back);
    }
}
