// End-to-end scenarios: compile, verify, hand off to the JIT, bind host
// memory to the extern globals, and invoke `Main` through its address.

use inkwell::context::Context;
use vcl_compiler::{compile_source, ExecutionSession, VerifierSettings};
use vcl_diagnostics::DiagnosticCode;

/// Backing store for vector globals; 64 bytes covers every supported
/// vector width.
#[repr(C, align(64))]
#[derive(Clone, Copy)]
struct VectorBuf {
    data: [f32; 16],
}

impl VectorBuf {
    fn zeroed() -> Self {
        Self { data: [0.0; 16] }
    }
}

fn lanes() -> usize {
    vcl_compiler::target::max_vector_element_width() as usize
}

fn jit(source: &str, name: &str) -> (ExecutionSession<'static>, &'static Context) {
    // Tests keep the context alive for the duration of the process.
    let context = Box::leak(Box::new(Context::create()));
    let mut module = compile_source(context, source, name).expect("compile");
    module
        .verify(VerifierSettings::default())
        .expect("verification");
    let session = module.submit().expect("submit");
    (session, context)
}

fn call_main(session: &ExecutionSession) {
    let address = session.lookup("Main").expect("lookup Main");
    let main: extern "C" fn() = unsafe { std::mem::transmute(address) };
    main();
}

#[test]
fn factorial() {
    let (session, _context) = jit(
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
        "factorial",
    );

    let mut input: i32 = 5;
    let mut output: i32 = 0;
    unsafe {
        session
            .define_extern_symbol_ptr("input", &mut input as *mut i32 as *mut _)
            .expect("bind input");
        session
            .define_extern_symbol_ptr("output", &mut output as *mut i32 as *mut _)
            .expect("bind output");
    }

    call_main(&session);
    assert_eq!(output, 120);
}

#[test]
fn in_out_pass_through() {
    let (session, _context) = jit(
        r#"
        in float inFloat;
        out float outFloat;
        in vfloat inVF;
        out vfloat outVF;

        void Main() {
            outFloat = inFloat;
            outVF = inVF;
        }
        "#,
        "inout",
    );

    let mut in_float: f32 = 12.0;
    let mut out_float: f32 = 0.0;
    let mut in_vf = VectorBuf::zeroed();
    let mut out_vf = VectorBuf::zeroed();
    for (i, lane) in in_vf.data.iter_mut().take(lanes()).enumerate() {
        *lane = (i + 1) as f32;
    }

    unsafe {
        session
            .define_extern_symbol_ptr("inFloat", &mut in_float as *mut f32 as *mut _)
            .expect("bind inFloat");
        session
            .define_extern_symbol_ptr("outFloat", &mut out_float as *mut f32 as *mut _)
            .expect("bind outFloat");
        session
            .define_extern_symbol_ptr("inVF", in_vf.data.as_mut_ptr() as *mut _)
            .expect("bind inVF");
        session
            .define_extern_symbol_ptr("outVF", out_vf.data.as_mut_ptr() as *mut _)
            .expect("bind outVF");
    }

    call_main(&session);
    assert_eq!(out_float, 12.0);
    for i in 0..lanes() {
        assert_eq!(out_vf.data[i], in_vf.data[i], "lane {}", i);
    }
}

#[test]
fn generic_max() {
    let (session, _context) = jit(
        r#"
        float max<typename T>(T a, T b) {
            if (a > b)
                return a;
            return b;
        }

        in float a;
        in float b;
        out float r;

        void Main() {
            r = max<float>(a, b);
        }
        "#,
        "genericmax",
    );

    let mut a: f32 = 2.0;
    let mut b: f32 = 4.0;
    let mut r: f32 = 0.0;
    unsafe {
        session
            .define_extern_symbol_ptr("a", &mut a as *mut f32 as *mut _)
            .expect("bind a");
        session
            .define_extern_symbol_ptr("b", &mut b as *mut f32 as *mut _)
            .expect("bind b");
        session
            .define_extern_symbol_ptr("r", &mut r as *mut f32 as *mut _)
            .expect("bind r");
    }

    call_main(&session);
    assert_eq!(r, 4.0);
}

#[test]
fn vec3_distance() {
    let (session, _context) = jit(
        r#"
        struct Vec3<typename T> {
            T x;
            T y;
            T z;
        }

        out float r;

        void Main() {
            Vec3<float> a = {0.0, 10.0, 3.0};
            Vec3<float> b = {-2.0, 0.0, 4.0};
            r = sqrt(pow(b.x - a.x, 2) + pow(b.y - a.y, 2.0) + pow(b.z - a.z, 2.0));
        }
        "#,
        "distance",
    );

    let mut r: f32 = 0.0;
    unsafe {
        session
            .define_extern_symbol_ptr("r", &mut r as *mut f32 as *mut _)
            .expect("bind r");
    }

    call_main(&session);
    assert!((r - 10.246951).abs() < 1e-4, "got {}", r);
}

#[test]
fn const_write_is_a_semantic_error() {
    let context = Context::create();
    let err = compile_source(
        &context,
        "const int x = 0; void Main() { x = 1; }",
        "constwrite",
    )
    .unwrap_err();
    assert_eq!(err.code, DiagnosticCode::AssignToConst);
}

#[test]
fn select_recursion_is_flagged() {
    let source = r#"
        float f(float x) {
            return select(x > 0, f(x - 1), 0);
        }
    "#;

    // Default: a warning.
    let context = Context::create();
    let mut module = compile_source(&context, source, "selectwarn").expect("compile");
    module
        .verify(VerifierSettings::default())
        .expect("warning mode must not fail");
    assert!(module.diagnostics().warning_count() > 0);

    // Strict: an error.
    let context = Context::create();
    let mut module = compile_source(&context, source, "selecterr").expect("compile");
    let err = module
        .verify(VerifierSettings {
            enable_select_recursion_check: true,
            select_recursion_as_error: true,
        })
        .unwrap_err();
    assert_eq!(err.code, DiagnosticCode::SelectRecursion);
}

#[test]
fn loops_and_buffers() {
    let (session, _context) = jit(
        r#"
        out float total;

        void Main() {
            array<float, 8> window = {1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0};
            total = 0.0;
            for (int i = 0; i < len(window); i++) {
                total = total + window[i];
            }
        }
        "#,
        "buffers",
    );

    let mut total: f32 = -1.0;
    unsafe {
        session
            .define_extern_symbol_ptr("total", &mut total as *mut f32 as *mut _)
            .expect("bind total");
    }

    call_main(&session);
    assert_eq!(total, 36.0);
}

#[test]
fn vector_intrinsics() {
    let (session, _context) = jit(
        r#"
        out vfloat ramp;
        out float firstLane;

        void Main() {
            vfloat base = step() * 2;
            insert(base, 0, 100.0);
            ramp = reverse(base);
            firstLane = extract(base, 0);
        }
        "#,
        "vectors",
    );

    let mut ramp = VectorBuf::zeroed();
    let mut first: f32 = 0.0;
    unsafe {
        session
            .define_extern_symbol_ptr("ramp", ramp.data.as_mut_ptr() as *mut _)
            .expect("bind ramp");
        session
            .define_extern_symbol_ptr("firstLane", &mut first as *mut f32 as *mut _)
            .expect("bind firstLane");
    }

    call_main(&session);
    assert_eq!(first, 100.0);
    let n = lanes();
    // base = [100, 2, 4, …]; ramp is base reversed.
    assert_eq!(ramp.data[n - 1], 100.0);
    if n >= 2 {
        assert_eq!(ramp.data[0], ((n - 1) * 2) as f32);
    }
}

#[test]
fn span_access() {
    let (session, _context) = jit(
        r#"
        in span<float> samples;
        out float sum;

        void Main() {
            sum = 0.0;
            for (int i = 0; i < len(samples); i++) {
                sum = sum + samples[i];
            }
        }
        "#,
        "spans",
    );

    #[repr(C)]
    struct HostSpan {
        data: *const f32,
        length: i32,
    }

    let samples: [f32; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];
    let mut host_span = HostSpan {
        data: samples.as_ptr(),
        length: samples.len() as i32,
    };
    let mut sum: f32 = 0.0;
    unsafe {
        session
            .define_extern_symbol_ptr("samples", &mut host_span as *mut HostSpan as *mut _)
            .expect("bind samples");
        session
            .define_extern_symbol_ptr("sum", &mut sum as *mut f32 as *mut _)
            .expect("bind sum");
    }

    call_main(&session);
    assert_eq!(sum, 15.0);
}
