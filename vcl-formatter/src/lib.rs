// Deterministic source rendering of a VCL AST. Used by `vclc fmt` and by
// the round-trip golden tests: parsing the printed output must produce an
// AST that prints identically.

use vcl_ast::*;

pub struct PrettyPrinter {
    out: String,
    indent: usize,
}

/// Render a whole program.
pub fn print_program(program: &Program) -> String {
    let mut printer = PrettyPrinter::new();
    for stmt in &program.statements {
        printer.write_statement(stmt);
    }
    printer.out
}

/// Binding powers mirroring the parser; used to decide parenthesisation.
fn precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Assignment { .. } => 10,
        ExprKind::Binary { op, .. } => match op {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 60,
            BinaryOp::Add | BinaryOp::Sub => 50,
            BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => 40,
            BinaryOp::Eq | BinaryOp::Ne => 35,
            BinaryOp::And => 30,
            BinaryOp::Or => 25,
        },
        _ => 100,
    }
}

impl PrettyPrinter {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn write_statement(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Compound(statements) => {
                self.line("{");
                self.indent += 1;
                for inner in statements {
                    self.write_statement(inner);
                }
                self.indent -= 1;
                self.line("}");
            }
            StmtKind::VariableDeclaration {
                ty,
                name,
                initializer,
            } => match initializer {
                Some(init) => {
                    let text = format!("{} {} = {};", ty, name, self.expr(init));
                    self.line(&text);
                }
                None => self.line(&format!("{} {};", ty, name)),
            },
            StmtKind::FunctionPrototype(prototype) => {
                let text = format!("{};", self.prototype(prototype, None));
                self.line(&text);
            }
            StmtKind::FunctionDeclaration { prototype, body } => {
                let header = self.prototype(prototype, None);
                self.write_braced(&header, body);
            }
            StmtKind::StructDeclaration { name, fields } => {
                self.line(&format!("struct {} {{", name));
                self.write_fields(fields);
                self.line("}");
            }
            StmtKind::StructTemplateDeclaration {
                name,
                params,
                fields,
            } => {
                self.line(&format!("struct {}{} {{", name, template_params(params)));
                self.write_fields(fields);
                self.line("}");
            }
            StmtKind::FunctionTemplateDeclaration {
                prototype,
                params,
                body,
            } => {
                let header = self.prototype(prototype, Some(params));
                self.write_braced(&header, body);
            }
            StmtKind::Return(value) => match value {
                Some(expr) => {
                    let text = format!("return {};", self.expr(expr));
                    self.line(&text);
                }
                None => self.line("return;"),
            },
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let header = format!("if ({})", self.expr(condition));
                self.write_braced(&header, then_branch);
                if let Some(else_branch) = else_branch {
                    self.write_braced("else", else_branch);
                }
            }
            StmtKind::While { condition, body } => {
                let header = format!("while ({})", self.expr(condition));
                self.write_braced(&header, body);
            }
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => {
                let init_text = self.inline_statement(init);
                let step_text = match &step.kind {
                    StmtKind::Expression(expr) => self.expr(expr),
                    _ => self.inline_statement(step).trim_end_matches(';').to_string(),
                };
                let header = format!(
                    "for ({} {}; {})",
                    init_text,
                    self.expr(condition),
                    step_text
                );
                self.write_braced(&header, body);
            }
            StmtKind::Break => self.line("break;"),
            StmtKind::Directive(node) => self.write_directive(node),
            StmtKind::Expression(expr) => {
                let text = format!("{};", self.expr(expr));
                self.line(&text);
            }
        }
    }

    fn write_fields(&mut self, fields: &[FieldDecl]) {
        self.indent += 1;
        for field in fields {
            self.line(&format!("{} {};", field.ty, field.name));
        }
        self.indent -= 1;
    }

    /// `header { body }` where a non-compound body still gets braces so the
    /// output reparses to a canonical tree.
    fn write_braced(&mut self, header: &str, body: &Stmt) {
        self.line(&format!("{} {{", header));
        self.indent += 1;
        match &body.kind {
            StmtKind::Compound(statements) => {
                for inner in statements {
                    self.write_statement(inner);
                }
            }
            _ => self.write_statement(body),
        }
        self.indent -= 1;
        self.line("}");
    }

    fn prototype(&mut self, prototype: &FunctionPrototype, params: Option<&[TemplateParam]>) -> String {
        let mut out = format!("{} {}", prototype.return_type, prototype.name);
        if let Some(params) = params {
            out.push_str(&template_params(params));
        }
        out.push('(');
        for (i, param) in prototype.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{} {}", param.ty, param.name));
        }
        out.push(')');
        out
    }

    fn write_directive(&mut self, node: &DirectiveNode) {
        match node {
            DirectiveNode::Import { path } => self.line(&format!("@import \"{}\";", path)),
            DirectiveNode::Define { name, value } => match value {
                Some(DefineValue::Int(v)) => self.line(&format!("@define {} = {};", name, v)),
                Some(DefineValue::Float(v)) => {
                    let text = format!("@define {} = {};", name, float_text(*v));
                    self.line(&text);
                }
                None => self.line(&format!("@define {};", name)),
            },
            DirectiveNode::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let header = format!("@if {} {{", self.expr(condition));
                self.line(&header);
                self.indent += 1;
                for stmt in then_branch {
                    self.write_statement(stmt);
                }
                self.indent -= 1;
                match else_branch {
                    Some(else_branch) => {
                        self.line("} @else {");
                        self.indent += 1;
                        for stmt in else_branch {
                            self.write_statement(stmt);
                        }
                        self.indent -= 1;
                        self.line("}");
                    }
                    None => self.line("}"),
                }
            }
            DirectiveNode::Custom { name, args } => {
                let rendered: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                if rendered.is_empty() {
                    self.line(&format!("@{};", name));
                } else {
                    self.line(&format!("@{} {};", name, rendered.join(", ")));
                }
            }
        }
    }

    /// Single-line rendering used for `for` headers.
    fn inline_statement(&mut self, stmt: &Stmt) -> String {
        match &stmt.kind {
            StmtKind::VariableDeclaration {
                ty,
                name,
                initializer: Some(init),
            } => format!("{} {} = {};", ty, name, self.expr(init)),
            StmtKind::VariableDeclaration {
                ty,
                name,
                initializer: None,
            } => format!("{} {};", ty, name),
            StmtKind::Expression(expr) => format!("{};", self.expr(expr)),
            _ => String::new(),
        }
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::IntLiteral(value) => value.to_string(),
            ExprKind::FloatLiteral(value) => float_text(*value),
            ExprKind::Identifier(name) => name.clone(),
            ExprKind::Binary { op, lhs, rhs } => {
                let parent = precedence(expr);
                let left = self.child(lhs, precedence(lhs) < parent);
                let right = self.child(rhs, precedence(rhs) <= parent);
                format!("{} {} {}", left, op, right)
            }
            ExprKind::Assignment { lhs, rhs } => {
                let left = self.child(lhs, precedence(lhs) <= 10);
                let right = self.child(rhs, precedence(rhs) < 10);
                format!("{} = {}", left, right)
            }
            ExprKind::Prefix { op, expr: operand } => {
                let needs_parens = matches!(
                    operand.kind,
                    ExprKind::Binary { .. } | ExprKind::Assignment { .. } | ExprKind::Prefix { .. }
                );
                format!("{}{}", op, self.child(operand, needs_parens))
            }
            ExprKind::Postfix { op, expr: operand } => {
                let needs_parens = matches!(
                    operand.kind,
                    ExprKind::Binary { .. } | ExprKind::Assignment { .. } | ExprKind::Prefix { .. }
                );
                format!("{}{}", self.child(operand, needs_parens), op)
            }
            ExprKind::FieldAccess { base, field } => {
                let needs_parens = precedence(base) < 100;
                format!("{}.{}", self.child(base, needs_parens), field)
            }
            ExprKind::Subscript { base, index } => {
                let needs_parens = precedence(base) < 100;
                let index_text = self.expr(index);
                format!("{}[{}]", self.child(base, needs_parens), index_text)
            }
            ExprKind::Call {
                callee,
                template_args,
                args,
            } => {
                let mut out = callee.clone();
                if !template_args.is_empty() {
                    let rendered: Vec<String> =
                        template_args.iter().map(|a| a.to_string()).collect();
                    out.push_str(&format!("<{}>", rendered.join(", ")));
                }
                let rendered: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                out.push_str(&format!("({})", rendered.join(", ")));
                out
            }
            ExprKind::Aggregate(values) => {
                let rendered: Vec<String> = values.iter().map(|v| self.expr(v)).collect();
                format!("{{{}}}", rendered.join(", "))
            }
        }
    }

    fn child(&mut self, expr: &Expr, needs_parens: bool) -> String {
        let text = self.expr(expr);
        if needs_parens {
            format!("({})", text)
        } else {
            text
        }
    }
}

fn template_params(params: &[TemplateParam]) -> String {
    let rendered: Vec<String> = params
        .iter()
        .map(|p| format!("{} {}", p.kind, p.name))
        .collect();
    format!("<{}>", rendered.join(", "))
}

/// Float rendering that always reparses as a float literal.
fn float_text(value: f32) -> String {
    let mut text = format!("{}", value);
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcl_ast::Span;

    #[test]
    fn float_literals_keep_their_dot() {
        assert_eq!(float_text(1.0), "1.0");
        assert_eq!(float_text(2.5), "2.5");
    }

    #[test]
    fn nested_precedence_gets_parenthesised() {
        let span = Span::default();
        // (a + b) * c
        let sum = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expr::new(ExprKind::Identifier("a".into()), span)),
                rhs: Box::new(Expr::new(ExprKind::Identifier("b".into()), span)),
            },
            span,
        );
        let product = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Mul,
                lhs: Box::new(sum),
                rhs: Box::new(Expr::new(ExprKind::Identifier("c".into()), span)),
            },
            span,
        );
        let mut printer = PrettyPrinter::new();
        assert_eq!(printer.expr(&product), "(a + b) * c");
    }
}
