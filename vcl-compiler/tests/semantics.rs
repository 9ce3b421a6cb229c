// Semantic checks that do not need to run compiled code: error taxonomy,
// terminator properties, template memoisation.

use inkwell::context::Context;
use vcl_compiler::{compile_source, CompileError, VclModule, VerifierSettings};
use vcl_diagnostics::DiagnosticCode;

fn compile_err(source: &str) -> CompileError {
    let context = Context::create();
    match compile_source(&context, source, "test") {
        Ok(_) => panic!("expected a compile error for: {}", source),
        Err(err) => err,
    }
}

fn compile_ok(source: &str) {
    let context = Context::create();
    let mut module = compile_source(&context, source, "test").expect("compile");
    module
        .verify(VerifierSettings::default())
        .expect("verification");
}

#[test]
fn const_write_is_rejected() {
    let err = compile_err("const int x = 0; void Main() { x = 1; }");
    assert_eq!(err.code, DiagnosticCode::AssignToConst);
}

#[test]
fn assignment_needs_an_lvalue() {
    let err = compile_err("void Main() { 1 = 2; }");
    assert_eq!(err.code, DiagnosticCode::NotAnLValue);
}

#[test]
fn undefined_name_is_reported() {
    let err = compile_err("void Main() { int y = missing; }");
    assert_eq!(err.code, DiagnosticCode::UndefinedName);
}

#[test]
fn redefinition_in_same_scope_is_rejected() {
    let err = compile_err("void Main() { int x = 1; int x = 2; }");
    assert_eq!(err.code, DiagnosticCode::Redefinition);
}

#[test]
fn shadowing_in_inner_scope_is_allowed() {
    compile_ok("void Main() { int x = 1; { int x = 2; x = 3; } x = 4; }");
}

#[test]
fn missing_return_is_rejected() {
    let err = compile_err("int f() { int x = 1; }");
    assert_eq!(err.code, DiagnosticCode::MissingReturn);
}

#[test]
fn void_functions_get_an_implicit_return() {
    compile_ok("void Main() { int x = 1; }");
}

#[test]
fn break_outside_a_loop_is_rejected() {
    let err = compile_err("void Main() { break; }");
    assert_eq!(err.code, DiagnosticCode::BreakOutsideLoop);
}

#[test]
fn break_inside_a_loop_is_accepted() {
    compile_ok("void Main() { while (1 < 2) { break; } }");
}

#[test]
fn implicit_float_narrowing_is_rejected() {
    // The scalar side follows the vector side; float -> vint would narrow.
    let err = compile_err("void Main() { vint v; float f = 0.5; vint w = v + f; }");
    assert_eq!(err.code, DiagnosticCode::ImplicitPrecisionLoss);
}

#[test]
fn int_operands_promote_toward_float() {
    compile_ok("void Main() { int x = 2; float y = 1.5; float z = x + y; }");
}

#[test]
fn calling_a_variable_is_rejected() {
    let err = compile_err("void Main() { int x = 1; x(); }");
    assert_eq!(err.code, DiagnosticCode::NotCallable);
}

#[test]
fn wrong_argument_count_is_rejected() {
    let err = compile_err("int id(int x) { return x; } void Main() { int y = id(1, 2); }");
    assert_eq!(err.code, DiagnosticCode::WrongArgCount);
}

#[test]
fn intrinsic_argument_policy_is_enforced() {
    // sqrt is float-only
    let err = compile_err("void Main() { int x = 4; float y = sqrt(x); }");
    assert_eq!(err.code, DiagnosticCode::WrongArgType);
}

#[test]
fn span_must_be_extern() {
    let err = compile_err("void Main() { span<float> s; }");
    assert_eq!(err.code, DiagnosticCode::TypeMismatch);
}

#[test]
fn qualifier_conflicts_are_rejected() {
    let err = compile_err("in out float x;");
    assert_eq!(err.code, DiagnosticCode::TypeMismatch);
    let err = compile_err("const out float y;");
    assert_eq!(err.code, DiagnosticCode::TypeMismatch);
}

#[test]
fn global_initializer_must_be_constant() {
    let err = compile_err("in int a; int b = a;");
    assert_eq!(err.code, DiagnosticCode::NonConstantInitializer);
}

#[test]
fn zero_length_arrays_are_accepted() {
    compile_ok("array<float, 0> empty; void Main() { }");
}

#[test]
fn empty_structs_are_accepted() {
    compile_ok("struct Empty { } void Main() { Empty e; }");
}

#[test]
fn unknown_field_is_rejected() {
    let err = compile_err(
        "struct P { float x; } void Main() { P p; p.y = 1.0; }",
    );
    assert_eq!(err.code, DiagnosticCode::TypeMismatch);
    assert!(err.message.contains("`y`"));
}

#[test]
fn subscript_on_scalar_is_rejected() {
    let err = compile_err("void Main() { int x = 1; x[0] = 2; }");
    assert_eq!(err.code, DiagnosticCode::TypeMismatch);
}

#[test]
fn missing_template_argument_is_reported() {
    let err = compile_err(
        "struct Box<typename T> { T value; } void Main() { Box b; }",
    );
    assert_eq!(err.code, DiagnosticCode::MissingTemplateArg);
}

#[test]
fn template_int_parameters_reach_the_body() {
    compile_ok(
        r#"
        int scaled<int N>(int x) {
            return x * N;
        }
        out int r;
        void Main() {
            r = scaled<3>(5);
        }
        "#,
    );
}

#[test]
fn dynamic_aggregates_are_unsupported() {
    let err = compile_err(
        "void Main() { int n = 3; array<int, 2> xs = {n, 1}; }",
    );
    assert_eq!(err.code, DiagnosticCode::UnsupportedAggregate);
}

#[test]
fn every_emitted_block_has_a_terminator() {
    let context = Context::create();
    let module = compile_source(
        &context,
        r#"
        int fact(int n) {
            if (n <= 1)
                return 1;
            return n * fact(n - 1);
        }
        void Main() {
            int i = 0;
            while (i < 3) {
                i++;
                if (i > 1)
                    break;
            }
        }
        "#,
        "terminators",
    )
    .expect("compile");

    let ir = module.print_ir();
    // The LLVM verifier would reject dangling blocks; run it to be sure.
    let mut module = module;
    module.verify(VerifierSettings::default()).expect("verify");
    assert!(ir.contains("define"));
}

#[test]
fn template_instantiation_is_memoised() {
    let context = Context::create();
    let module = compile_source(
        &context,
        r#"
        float twice<typename T>(T x) {
            return x + x;
        }
        out float r;
        void Main() {
            r = twice<float>(1.0) + twice<float>(2.0) + twice(3.0);
        }
        "#,
        "memo",
    )
    .expect("compile");

    let ir = module.print_ir();
    let definitions = ir.matches("define float @twice_float").count();
    assert_eq!(definitions, 1, "expected a single instantiation:\n{}", ir);
}

#[test]
fn struct_template_instantiation_is_memoised() {
    let context = Context::create();
    let module = compile_source(
        &context,
        r#"
        struct Pair<typename T> { T a; T b; }
        void Main() {
            Pair<float> x;
            Pair<float> y;
            Pair<int> z;
            x.a = 1.0;
            y.b = 2.0;
            z.a = 3;
        }
        "#,
        "structs",
    )
    .expect("compile");

    let ir = module.print_ir();
    assert_eq!(ir.matches("%Pair_float = type").count(), 1, "{}", ir);
    assert_eq!(ir.matches("%Pair_int = type").count(), 1, "{}", ir);
}

#[test]
fn repeated_emits_share_one_module() {
    let context = Context::create();
    let mut module = VclModule::new(&context, "multi").expect("module");
    let first = vcl_parser::parse_source("in float gain;").expect("parse");
    let second =
        vcl_parser::parse_source("out float r; void Main() { r = gain * 2.0; }").expect("parse");
    module.emit(&first).expect("emit first");
    module.emit(&second).expect("emit second");
    module.verify(VerifierSettings::default()).expect("verify");
}

#[test]
fn defines_control_conditional_emission() {
    let context = Context::create();
    let mut module = VclModule::new(&context, "defines").expect("module");
    let program = vcl_parser::parse_source(
        r#"
        @define FAST;
        @if defined(FAST) {
            out float fastPath;
        } @else {
            out float slowPath;
        }
        @if defined(MISSING) {
            out float never;
        }
        "#,
    )
    .expect("parse");
    module.emit(&program).expect("emit");
    let ir = module.print_ir();
    assert!(ir.contains("@fastPath"));
    assert!(!ir.contains("@slowPath"));
    assert!(!ir.contains("@never"));
}

#[test]
fn host_defines_are_visible_to_if() {
    let context = Context::create();
    let mut module = VclModule::new(&context, "hostdef").expect("module");
    module.define("CHANNELS", Some(vcl_ast::DefineValue::Int(2)));
    let program = vcl_parser::parse_source(
        "@if CHANNELS { out float stereo; } @else { out float mono; }",
    )
    .expect("parse");
    module.emit(&program).expect("emit");
    let ir = module.print_ir();
    assert!(ir.contains("@stereo"));
}

#[test]
fn static_expressions_reject_assignment() {
    let context = Context::create();
    let mut module = VclModule::new(&context, "static").expect("module");
    let program =
        vcl_parser::parse_source("@define A = 1; @if A = 2 { out float x; }").expect("parse");
    let err = module.emit(&program).unwrap_err();
    assert!(err.message.contains("static expression"), "{}", err.message);
}
