use vcl_ast::*;
use vcl_parser::{parse_source, ParseError};

fn parse_ok(source: &str) -> Program {
    match parse_source(source) {
        Ok(program) => program,
        Err(err) => panic!("parse failed: {} in {:?}", err, source),
    }
}

#[test]
fn parses_factorial_program() {
    let program = parse_ok(
        r#"
        in int input;
        out int output;

        int fact(int n) {
            if (n <= 1)
                return 1;
            return n * fact(n - 1);
        }

        void Main() {
            output = fact(input);
        }
        "#,
    );
    assert_eq!(program.statements.len(), 4);

    match &program.statements[0].kind {
        StmtKind::VariableDeclaration { ty, name, .. } => {
            assert_eq!(name, "input");
            assert!(ty.qualifiers.is_in);
            assert_eq!(ty.kind, TypeKind::Int);
        }
        other => panic!("expected variable declaration, got {:?}", other),
    }

    match &program.statements[2].kind {
        StmtKind::FunctionDeclaration { prototype, .. } => {
            assert_eq!(prototype.name, "fact");
            assert_eq!(prototype.params.len(), 1);
        }
        other => panic!("expected function declaration, got {:?}", other),
    }
}

#[test]
fn parses_function_template() {
    let program = parse_ok("float max<typename T>(T a, T b) { if (a > b) return a; return b; }");
    match &program.statements[0].kind {
        StmtKind::FunctionTemplateDeclaration {
            prototype, params, ..
        } => {
            assert_eq!(prototype.name, "max");
            assert_eq!(params.len(), 1);
            assert_eq!(params[0].name, "T");
            assert_eq!(params[0].kind, TemplateParamKind::Typename);
            assert_eq!(prototype.params[0].ty, TypeInfo::custom("T"));
        }
        other => panic!("expected function template, got {:?}", other),
    }
}

#[test]
fn parses_struct_template() {
    let program = parse_ok("struct Vec3<typename T> { T x; T y; T z; }");
    match &program.statements[0].kind {
        StmtKind::StructTemplateDeclaration {
            name,
            params,
            fields,
        } => {
            assert_eq!(name, "Vec3");
            assert_eq!(params.len(), 1);
            assert_eq!(fields.len(), 3);
            assert_eq!(fields[0].name, "x");
        }
        other => panic!("expected struct template, got {:?}", other),
    }
}

#[test]
fn parses_templated_types() {
    let program = parse_ok("array<float, 8> samples;");
    match &program.statements[0].kind {
        StmtKind::VariableDeclaration { ty, .. } => {
            assert_eq!(ty.kind, TypeKind::Array);
            assert_eq!(
                ty.template_args,
                vec![
                    TemplateArg::Typename(TypeInfo::simple(TypeKind::Float)),
                    TemplateArg::Int(8),
                ]
            );
        }
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn template_call_versus_comparison() {
    // `max<float>(…)` is a templated call
    let program = parse_ok("void Main() { float r = max<float>(1.0, 2.0); }");
    let StmtKind::FunctionDeclaration { body, .. } = &program.statements[0].kind else {
        panic!("expected function");
    };
    let StmtKind::Compound(stmts) = &body.kind else {
        panic!("expected compound body");
    };
    let StmtKind::VariableDeclaration {
        initializer: Some(init),
        ..
    } = &stmts[0].kind
    else {
        panic!("expected declaration with initializer");
    };
    match &init.kind {
        ExprKind::Call {
            callee,
            template_args,
            args,
        } => {
            assert_eq!(callee, "max");
            assert_eq!(template_args.len(), 1);
            assert_eq!(args.len(), 2);
        }
        other => panic!("expected call, got {:?}", other),
    }

    // `a < b` stays a comparison even though it starts the same way
    let program = parse_ok("void Main() { bool r = a < b; }");
    let StmtKind::FunctionDeclaration { body, .. } = &program.statements[0].kind else {
        panic!("expected function");
    };
    let StmtKind::Compound(stmts) = &body.kind else {
        panic!("expected compound body");
    };
    let StmtKind::VariableDeclaration {
        initializer: Some(init),
        ..
    } = &stmts[0].kind
    else {
        panic!("expected declaration");
    };
    assert!(matches!(
        init.kind,
        ExprKind::Binary {
            op: BinaryOp::Lt,
            ..
        }
    ));
}

#[test]
fn unary_binary_disambiguation() {
    let program = parse_ok("void Main() { int x = -a + b; }");
    let StmtKind::FunctionDeclaration { body, .. } = &program.statements[0].kind else {
        panic!("expected function");
    };
    let StmtKind::Compound(stmts) = &body.kind else {
        panic!("expected compound");
    };
    let StmtKind::VariableDeclaration {
        initializer: Some(init),
        ..
    } = &stmts[0].kind
    else {
        panic!("expected declaration");
    };
    // (-a) + b
    let ExprKind::Binary { op, lhs, .. } = &init.kind else {
        panic!("expected binary, got {:?}", init.kind);
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(
        lhs.kind,
        ExprKind::Prefix {
            op: PrefixOp::Minus,
            ..
        }
    ));
}

#[test]
fn postfix_chain() {
    let program = parse_ok("void Main() { points[2].y++; }");
    let StmtKind::FunctionDeclaration { body, .. } = &program.statements[0].kind else {
        panic!("expected function");
    };
    let StmtKind::Compound(stmts) = &body.kind else {
        panic!("expected compound");
    };
    let StmtKind::Expression(expr) = &stmts[0].kind else {
        panic!("expected expression statement");
    };
    let ExprKind::Postfix { op, expr: inner } = &expr.kind else {
        panic!("expected postfix, got {:?}", expr.kind);
    };
    assert_eq!(*op, PostfixOp::Increment);
    assert!(matches!(inner.kind, ExprKind::FieldAccess { .. }));
}

#[test]
fn parses_for_loop() {
    let program = parse_ok("void Main() { for (int i = 0; i < 8; i++) { output = i; } }");
    let StmtKind::FunctionDeclaration { body, .. } = &program.statements[0].kind else {
        panic!("expected function");
    };
    let StmtKind::Compound(stmts) = &body.kind else {
        panic!("expected compound");
    };
    assert!(matches!(stmts[0].kind, StmtKind::For { .. }));
}

#[test]
fn parses_directives() {
    let program = parse_ok(
        r#"
        @define DEBUG;
        @define GAIN = 2.5;
        @if defined(DEBUG) {
            out float debugValue;
        } @else {
            in float gain;
        }
        "#,
    );
    assert_eq!(program.statements.len(), 3);
    assert!(matches!(
        program.statements[0].kind,
        StmtKind::Directive(DirectiveNode::Define { ref name, value: None }) if name == "DEBUG"
    ));
    assert!(matches!(
        program.statements[1].kind,
        StmtKind::Directive(DirectiveNode::Define {
            value: Some(DefineValue::Float(_)),
            ..
        })
    ));
    match &program.statements[2].kind {
        StmtKind::Directive(DirectiveNode::If {
            then_branch,
            else_branch,
            ..
        }) => {
            assert_eq!(then_branch.len(), 1);
            assert_eq!(else_branch.as_ref().map(Vec::len), Some(1));
        }
        other => panic!("expected conditional directive, got {:?}", other),
    }
}

#[test]
fn parses_import_directive() {
    let program = parse_ok("@import \"lib/util.vcl\";");
    assert!(matches!(
        program.statements[0].kind,
        StmtKind::Directive(DirectiveNode::Import { ref path }) if path == "lib/util.vcl"
    ));
}

#[test]
fn parses_aggregates() {
    let program = parse_ok("void Main() { array<int, 3> xs = {1, 2, 3}; }");
    let StmtKind::FunctionDeclaration { body, .. } = &program.statements[0].kind else {
        panic!("expected function");
    };
    let StmtKind::Compound(stmts) = &body.kind else {
        panic!("expected compound");
    };
    let StmtKind::VariableDeclaration {
        initializer: Some(init),
        ..
    } = &stmts[0].kind
    else {
        panic!("expected declaration");
    };
    assert!(matches!(&init.kind, ExprKind::Aggregate(values) if values.len() == 3));
}

#[test]
fn missing_semicolon_is_an_error() {
    let err = parse_source("int x = 1").unwrap_err();
    match err {
        ParseError::Syntax { expected, .. } => {
            assert!(expected.contains("semicolon"), "got {:?}", expected)
        }
        other => panic!("expected syntax error, got {:?}", other),
    }
}

#[test]
fn error_carries_span() {
    let err = parse_source("void Main() { return 1.2.3; }").unwrap_err();
    assert!(err.span().start > 0);
}
