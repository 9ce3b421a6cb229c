// Golden property: printing a parsed program and reparsing it must reach a
// fixpoint — the second print equals the first.

use vcl_formatter::print_program;
use vcl_parser::parse_source;

fn assert_roundtrip(source: &str) {
    let first = parse_source(source).expect("initial parse");
    let printed = print_program(&first);
    let second = parse_source(&printed)
        .unwrap_or_else(|e| panic!("reparse failed: {}\n--- printed ---\n{}", e, printed));
    let reprinted = print_program(&second);
    assert_eq!(printed, reprinted, "printer is not a fixpoint");
}

#[test]
fn roundtrip_globals_and_functions() {
    assert_roundtrip(
        r#"
        in float inFloat;
        out float outFloat;
        const int blockSize = 64;

        float gain(float x, float amount) {
            return x * amount;
        }

        void Main() {
            outFloat = gain(inFloat, 2.0);
        }
        "#,
    );
}

#[test]
fn roundtrip_control_flow() {
    assert_roundtrip(
        r#"
        int fact(int n) {
            if (n <= 1)
                return 1;
            return n * fact(n - 1);
        }

        void Main() {
            int total = 0;
            for (int i = 0; i < 10; i++) {
                while (total < 100) {
                    total = total + fact(i);
                    if (total > 50)
                        break;
                }
            }
        }
        "#,
    );
}

#[test]
fn roundtrip_templates() {
    assert_roundtrip(
        r#"
        struct Vec3<typename T> {
            T x;
            T y;
            T z;
        }

        float max<typename T>(T a, T b) {
            if (a > b)
                return a;
            return b;
        }

        void Main() {
            Vec3<float> v;
            v.x = max<float>(1.0, 2.0);
        }
        "#,
    );
}

#[test]
fn roundtrip_vectors_and_buffers() {
    assert_roundtrip(
        r#"
        in vfloat samples;
        out vfloat processed;
        in span<float> history;
        array<float, 8> window;

        void Main() {
            window[0] = extract(samples, 0);
            processed = samples * 0.5;
        }
        "#,
    );
}

#[test]
fn roundtrip_directives() {
    assert_roundtrip(
        r#"
        @import "lib/util.vcl";
        @define DEBUG;
        @define GAIN = 1.5;
        @if defined(DEBUG) {
            out float probe;
        } @else {
            in float silent;
        }
        "#,
    );
}

#[test]
fn roundtrip_expression_shapes() {
    assert_roundtrip(
        r#"
        void Main() {
            int a = 1;
            int b = 2;
            int c = -a + b * (a - b);
            bool p = a < b && b >= c;
            c++;
            --c;
            a = b = c;
        }
        "#,
    );
}
