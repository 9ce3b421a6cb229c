// `@import` splices another file's top-level statements into the module;
// re-importing the same canonical path is a no-op, which also breaks
// import cycles.

use inkwell::context::Context;
use std::fs;
use vcl_compiler::{VclModule, VerifierSettings};
use vcl_diagnostics::DiagnosticCode;

#[test]
fn import_brings_in_definitions() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("util.vcl"),
        "float gain(float x) { return x * 2.0; }\n",
    )
    .expect("write util");

    let context = Context::create();
    let mut module = VclModule::new(&context, "imports").expect("module");
    module.set_source_dir(dir.path().to_path_buf());

    let program = vcl_parser::parse_source(
        r#"
        @import "util.vcl";
        out float r;
        void Main() {
            r = gain(3.0);
        }
        "#,
    )
    .expect("parse");
    module.emit(&program).expect("emit");
    module.verify(VerifierSettings::default()).expect("verify");
    assert!(module.print_ir().contains("define float @gain"));
}

#[test]
fn importing_the_same_file_twice_is_a_noop() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("defs.vcl"), "out float shared;\n").expect("write defs");

    let context = Context::create();
    let mut module = VclModule::new(&context, "twice").expect("module");
    module.set_source_dir(dir.path().to_path_buf());

    // A second import would otherwise redefine `shared`.
    let program = vcl_parser::parse_source(
        r#"
        @import "defs.vcl";
        @import "defs.vcl";
        void Main() {
            shared = 1.0;
        }
        "#,
    )
    .expect("parse");
    module.emit(&program).expect("emit");
    module.verify(VerifierSettings::default()).expect("verify");
}

#[test]
fn import_cycles_terminate() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("a.vcl"),
        "@import \"b.vcl\";\nout float fromA;\n",
    )
    .expect("write a");
    fs::write(
        dir.path().join("b.vcl"),
        "@import \"a.vcl\";\nout float fromB;\n",
    )
    .expect("write b");

    let context = Context::create();
    let mut module = VclModule::new(&context, "cycle").expect("module");
    module.set_source_dir(dir.path().to_path_buf());

    let program = vcl_parser::parse_source("@import \"a.vcl\";").expect("parse");
    module.emit(&program).expect("emit");
    let ir = module.print_ir();
    assert!(ir.contains("@fromA"));
    assert!(ir.contains("@fromB"));
}

#[test]
fn missing_import_is_reported() {
    let context = Context::create();
    let mut module = VclModule::new(&context, "missing").expect("module");
    let program = vcl_parser::parse_source("@import \"nope/nothing.vcl\";").expect("parse");
    let err = module.emit(&program).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::FileNotFound);
}
