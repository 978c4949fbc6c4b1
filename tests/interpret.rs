//! Interpreter integration tests
//!
//! Tests the full pipeline: source → lex → parse → interpret

use std::cell::RefCell;
use std::rc::Rc;

use culebra::interp::{Environment, Interpreter, Value, prelude};
use culebra::{EvalError, Parser, RunError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Helper to interpret source code in a fresh environment
fn interpret(source: &str) -> Result<Value, RunError> {
    let env = Environment::new();
    culebra::run(&Parser::new(), "test.cul", &env, source)
}

/// Helper to check the result renders as `expected`
fn assert_renders(source: &str, expected: &str) {
    match interpret(source) {
        Ok(value) => assert_eq!(value.to_string(), expected, "for {:?}", source),
        Err(e) => panic!("Interpretation failed: {}", e),
    }
}

/// Helper to check the result is a number
fn assert_result_int(source: &str, expected: i64) {
    match interpret(source) {
        Ok(Value::Number(n)) => assert_eq!(n, expected, "for {:?}", source),
        Ok(v) => panic!("Expected Number({}), got {:?}", expected, v),
        Err(e) => panic!("Interpretation failed: {}", e),
    }
}

/// Helper to check the result is a boolean
fn assert_result_bool(source: &str, expected: bool) {
    match interpret(source) {
        Ok(Value::Bool(b)) => assert_eq!(b, expected, "for {:?}", source),
        Ok(v) => panic!("Expected Bool({}), got {:?}", expected, v),
        Err(e) => panic!("Interpretation failed: {}", e),
    }
}

/// Helper to extract the evaluation failure
fn eval_error(source: &str) -> EvalError {
    match interpret(source) {
        Ok(v) => panic!("Expected failure, got {:?}", v),
        Err(RunError::Eval(e)) => e,
        Err(e) => panic!("Expected evaluation failure, got {}", e),
    }
}

/// Run with a captured `puts` sink, returning the result and the output
fn interpret_captured(source: &str) -> (Result<Value, RunError>, String) {
    let buffer = Rc::new(RefCell::new(Vec::new()));
    let env = Environment::new();
    prelude::install(&env, buffer.clone());
    let result = culebra::run(&Parser::new(), "test.cul", &env, source);
    let output = String::from_utf8(buffer.borrow().clone()).unwrap();
    (result, output)
}

// ==================== Arithmetic ====================

#[test]
fn test_interpret_precedence() {
    assert_result_int("1 + 2 * 3", 7);
    assert_result_int("(1 + 2) * 3", 9);
    assert_result_int("10 - 4 - 3", 3);
    assert_result_int("7 / 2", 3);
    assert_result_int("7 % 3", 1);
    assert_result_int("-2 * 3 + 10", 4);
    assert_result_int("+5", 5);
}

#[test]
fn test_interpret_overflow_wraps() {
    assert_result_int("9223372036854775807 + 1", i64::MIN);
    assert_result_int("-9223372036854775807 - 2", i64::MAX);
}

#[test]
fn test_interpret_division_by_zero() {
    assert_eq!(eval_error("1 / 0"), EvalError::DivisionByZero);
    assert_eq!(eval_error("x = 0; 5 % x"), EvalError::DivisionByZero);
}

#[test]
fn test_interpret_arithmetic_requires_numbers() {
    assert_eq!(
        eval_error("1 + true"),
        EvalError::TypeMismatch {
            expected: "number",
            found: "boolean"
        }
    );
    assert_eq!(
        eval_error("+\"a\""),
        EvalError::TypeMismatch {
            expected: "number",
            found: "string"
        }
    );
}

#[test]
fn test_interpret_literal_out_of_range() {
    assert_eq!(
        eval_error("99999999999999999999"),
        EvalError::InvalidNumber {
            text: "99999999999999999999".to_string()
        }
    );
}

proptest! {
    #[test]
    fn prop_addition_wraps(a in 0..=i64::MAX, b in 0..=i64::MAX) {
        let value = interpret(&format!("{} + {}", a, b)).unwrap();
        prop_assert_eq!(value, Value::Number(a.wrapping_add(b)));
    }

    #[test]
    fn prop_multiplication_wraps(a in 0..=i64::MAX, b in 0..=i64::MAX) {
        let value = interpret(&format!("{} * {}", a, b)).unwrap();
        prop_assert_eq!(value, Value::Number(a.wrapping_mul(b)));
    }
}

// ==================== Comparison and Logic ====================

#[test]
fn test_interpret_comparisons() {
    assert_result_bool("1 < 2", true);
    assert_result_bool("2 <= 2", true);
    assert_result_bool("3 > 4", false);
    assert_result_bool("\"abc\" < \"abd\"", true);
    assert_result_bool("true > false", true);
    assert_result_bool("\"ab\" == \"ab\"", true);
    assert_result_bool("1 != 2", true);
}

#[test]
fn test_interpret_compare_different_kinds_fails() {
    assert_eq!(
        eval_error("1 == \"1\""),
        EvalError::TypeMismatch {
            expected: "number",
            found: "string"
        }
    );
}

#[test]
fn test_interpret_containers_compare_by_identity() {
    assert_result_bool("a = [1]; b = [1]; a == b", false);
    assert_result_bool("a = [1]; b = a; a == b", true);
    assert_result_bool("o = {}; o == o", true);
    assert_result_bool("f = fn() {}; f == f", true);
}

#[test]
fn test_interpret_logic_short_circuits() {
    assert_result_bool("false && missing", false);
    assert_result_bool("true || missing", true);
    assert_result_bool("true && !false", true);
    assert_result_bool("false || false || true", true);
}

#[test]
fn test_interpret_logic_requires_booleans() {
    assert_eq!(
        eval_error("1 && true"),
        EvalError::TypeMismatch {
            expected: "boolean",
            found: "number"
        }
    );
    assert!(matches!(eval_error("!1"), EvalError::TypeMismatch { .. }));
}

// ==================== Bindings ====================

#[test]
fn test_interpret_assignment_yields_value() {
    assert_result_int("x = 5", 5);
    assert_result_int("a = b = 3; a + b", 6);
}

#[test]
fn test_interpret_mutable_reassignment() {
    assert_result_int("mut x = 1; x = x + 1; x", 2);
}

#[test]
fn test_interpret_immutable_reassignment_fails() {
    assert_eq!(
        eval_error("x = 1; x = 2"),
        EvalError::ImmutableBinding {
            name: "x".to_string()
        }
    );
}

#[test]
fn test_interpret_unbound_name() {
    assert_eq!(
        eval_error("y + 1"),
        EvalError::UnboundName {
            name: "y".to_string()
        }
    );
}

#[test]
fn test_interpret_statements_yield_last_value() {
    assert_result_int("1; 2; 3", 3);
    assert_eq!(interpret("").unwrap(), Value::Unit);
    assert_renders("", "()");
}

// ==================== Control Flow ====================

#[test]
fn test_interpret_if_else_chain() {
    let source = r#"
classify = fn(n) {
    if n < 0 { "neg" } else if n == 0 { "zero" } else { "pos" }
}
[classify(-5), classify(0), classify(7)]
"#;
    assert_renders(source, r#"["neg", "zero", "pos"]"#);
}

#[test]
fn test_interpret_parenthesized_conditions() {
    assert_result_int("if (false) { 1 } else if (true) { 2 } else { 3 }", 2);
    assert_eq!(
        interpret("if (false) { 1 } else if (false) { 2 }").unwrap(),
        Value::Unit
    );
}

#[test]
fn test_interpret_if_without_match_is_unit() {
    assert_eq!(interpret("if false { 1 }").unwrap(), Value::Unit);
    assert!(matches!(eval_error("if 1 { 2 }"), EvalError::TypeMismatch { .. }));
}

#[test]
fn test_interpret_while_loop() {
    let source = r#"
mut i = 0
mut sum = 0
while i < 5 {
    sum = sum + i
    i = i + 1
}
sum
"#;
    assert_result_int(source, 10);
    assert_eq!(interpret("while false { 1 }").unwrap(), Value::Unit);
    assert!(matches!(eval_error("while 0 { 1 }"), EvalError::TypeMismatch { .. }));
}

// ==================== Functions ====================

#[test]
fn test_interpret_function_call() {
    assert_result_int("add = fn(a, b) { a + b }; add(2, 3)", 5);
    assert_result_int("fn(x) { x * x }(7)", 49);
}

#[test]
fn test_interpret_self_recursion() {
    let source = r#"
fib = fn(n) { if n < 2 { n } else { self(n - 1) + self(n - 2) } }
fib(15)
"#;
    assert_result_int(source, 610);
}

#[test]
fn test_interpret_closure_counter() {
    let source = r#"
make = fn() {
    mut n = 0
    fn() { n = n + 1; n }
}
counter = make()
counter()
counter()
"#;
    assert_result_int(source, 2);
}

#[test]
fn test_interpret_independent_closures() {
    let source = r#"
make = fn() {
    mut n = 0
    fn() { n = n + 1 }
}
a = make()
b = make()
a(); a(); b()
a() * 10 + b()
"#;
    assert_result_int(source, 32);
}

#[test]
fn test_interpret_parameter_shadows_capture() {
    assert_result_int("x = 10; f = fn(x) { x * 2 }; f(3)", 6);
}

#[test]
fn test_interpret_scoping_is_lexical() {
    let source = r#"
x = 10
f = fn() { x }
g = fn(x) { f() }
g(99)
"#;
    assert_result_int(source, 10);
}

#[test]
fn test_interpret_locals_do_not_leak() {
    assert_eq!(
        eval_error("f = fn() { local = 1 }; f(); local"),
        EvalError::UnboundName {
            name: "local".to_string()
        }
    );
}

#[test]
fn test_interpret_captured_immutable_cannot_change() {
    assert_eq!(
        eval_error("x = 1; f = fn() { x = 2 }; f()"),
        EvalError::ImmutableBinding {
            name: "x".to_string()
        }
    );
}

#[test]
fn test_interpret_mutable_parameter() {
    assert_result_int("f = fn(mut n) { n = n * 2; n }; f(4)", 8);
    assert!(matches!(
        eval_error("f = fn(n) { n = 1 }; f(4)"),
        EvalError::ImmutableBinding { .. }
    ));
}

#[test]
fn test_interpret_extra_arguments_not_evaluated() {
    assert_result_int("f = fn(a) { a }; f(1, missing)", 1);
    assert_result_int("mut hits = 0; f = fn(a) { a }; f(1, hits = 1); hits", 0);
}

#[test]
fn test_interpret_too_few_arguments() {
    assert_eq!(
        eval_error("f = fn(a, b) { a }\nf(1)"),
        EvalError::ArgumentError {
            expected: 2,
            found: 1,
            line: 2,
            column: 1
        }
    );
}

#[test]
fn test_interpret_call_non_function() {
    assert_eq!(
        eval_error("1()"),
        EvalError::TypeMismatch {
            expected: "function",
            found: "number"
        }
    );
}

#[test]
fn test_interpret_call_site_position() {
    assert_result_int("f = fn() { __LINE__ * 100 + __COLUMN__ }\n\n   f()", 304);
}

#[test]
fn test_interpret_function_renders_params() {
    assert_renders("fn(a, mut b) { a }", "<fn(a, mut b)>");
}

// ==================== Arrays and Objects ====================

#[test]
fn test_interpret_array_index() {
    assert_result_int("a = [1, 2, 3]; a[1]", 2);
    assert_result_int("[[1, 2], [3]][0][1]", 2);
}

#[test]
fn test_interpret_index_out_of_range_keeps_value() {
    assert_result_bool("a = [1, 2]; a[5] == a", true);
    assert_result_bool("a = [1, 2]; a[-1] == a", true);
}

#[test]
fn test_interpret_index_requires_array() {
    assert_eq!(
        eval_error("x = 1; x[0]"),
        EvalError::TypeMismatch {
            expected: "array",
            found: "number"
        }
    );
}

#[test]
fn test_interpret_array_methods() {
    assert_result_int("[].push(1).push(2).size()", 2);
    assert_result_int("a = [1]; b = a; b.push(2); a.size()", 2);
    assert_renders("a = [1]; a.push(\"x\"); a", r#"[1, "x"]"#);
}

#[test]
fn test_interpret_object_properties() {
    assert_result_int("o = { x: 1, y: 2 }; o.x + o.y", 3);
    assert_result_int("o = { a: { b: 7 } }; o.a.b", 7);
    assert_result_int("o = { x: 1, y: 2 }; o.size()", 2);
    assert_result_int("o = { size: 9 }; o.size", 9);
    assert_result_int("{ a: 1, a: 2 }.a", 2);
    assert_renders("{ a: 1, b: \"s\" }", r#"{a: 1, b: "s"}"#);
}

#[test]
fn test_interpret_unknown_property() {
    assert_eq!(
        eval_error("o = { x: 1 }; o.z"),
        EvalError::UnknownProperty {
            name: "z".to_string(),
            receiver: "object"
        }
    );
    for (source, found) in [
        ("n = 1; n.size", "number"),
        ("true.x", "boolean"),
        ("(fn() {}).x", "function"),
        ("(if false { 1 }).x", "unit"),
    ] {
        assert_eq!(
            eval_error(source),
            EvalError::TypeMismatch {
                expected: "object, array or string",
                found
            },
            "for {:?}",
            source
        );
    }
}

#[test]
fn test_interpret_self_containing_array_renders_placeholder() {
    assert_renders(r#"a = []; a.push(a); "${a}""#, "[[...]]");
    assert_renders("a = [1]; a.push(a); a", "[1, [...]]");
}

#[test]
fn test_interpret_self_containing_object_renders_placeholder() {
    let source = r#"
o = { n: 1, me: 0, link: fn() { me = this } }
o.link()
"${o}"
"#;
    assert_renders(source, "{n: 1, me: {...}, link: <fn()>}");
}

#[test]
fn test_interpret_shared_element_is_not_a_cycle() {
    assert_renders("a = [1]; [a, a]", "[[1], [1]]");
}

#[test]
fn test_interpret_method_sees_this() {
    let source = r#"
o = { n: 41, get: fn() { this.n + 1 } }
o.get()
"#;
    assert_result_int(source, 42);
}

#[test]
fn test_interpret_method_mutation_visible_through_alias() {
    let source = r#"
o = { n: 1, bump: fn() { n = n + 1 } }
alias = o
alias.bump()
alias.bump()
o.n
"#;
    assert_result_int(source, 3);
}

#[test]
fn test_interpret_method_pushes_to_own_array() {
    let source = r#"
stack = { items: [], add: fn(x) { this.items.push(x) } }
stack.add(1)
stack.add(2)
stack.items.size()
"#;
    assert_result_int(source, 2);
}

// ==================== Strings ====================

#[test]
fn test_interpret_string_interpolation() {
    assert_renders(r#""x=${1+2}""#, "x=3");
    assert_renders(r#"name = "bob"; "hi ${name}!""#, "hi bob!");
    assert_renders(r#""outer ${"inner ${1}"}""#, "outer inner 1");
    assert_renders(r#""${[1, "a"]}""#, r#"[1, "a"]"#);
    assert_renders(r#""${if false { 1 }}""#, "()");
}

#[test]
fn test_interpret_string_escapes() {
    assert_renders(r#""a\tb\"c""#, "a\tb\"c");
}

#[test]
fn test_interpret_string_size_counts_chars() {
    assert_result_int(r#""héllo".size()"#, 5);
}

// ==================== Limits ====================

#[test]
fn test_interpret_unbounded_recursion_overflows() {
    assert_eq!(
        eval_error("f = fn() { self() }\nf()"),
        EvalError::StackOverflow {
            limit: culebra::interp::DEFAULT_MAX_DEPTH
        }
    );
}

#[test]
fn test_interpret_configured_depth_limit() {
    let env = Environment::new();
    let mut interpreter = Interpreter::new().with_max_depth(64);
    let err = culebra::run_with(
        &mut interpreter,
        &Parser::new(),
        "test.cul",
        &env,
        "count = fn(n) { if n == 0 { 0 } else { 1 + self(n - 1) } }\ncount(1000)",
    )
    .unwrap_err();
    assert_eq!(err.as_eval(), Some(&EvalError::StackOverflow { limit: 64 }));

    // The interpreter stays usable after the failure
    let value = culebra::run_with(&mut interpreter, &Parser::new(), "test.cul", &env, "count(3)")
        .unwrap();
    assert_eq!(value, Value::Number(3));
}

#[test]
fn test_interpret_deeply_nested_array_is_released() {
    let source = r#"
mut a = []
mut i = 0
while i < 100000 {
    a = [a]
    i = i + 1
}
a.size()
"#;
    assert_result_int(source, 1);
}

#[test]
fn test_interpret_deeply_nested_object_is_released() {
    let source = r#"
mut o = {}
mut i = 0
while i < 100000 {
    o = { next: o }
    i = i + 1
}
o.size()
"#;
    assert_result_int(source, 1);
}

// ==================== Prelude ====================

#[test]
fn test_interpret_puts_writes_rendered_values() {
    let (result, output) = interpret_captured("puts(\"a\"); puts([1, \"b\"]); puts(42)");
    assert_eq!(result.unwrap(), Value::Unit);
    assert_eq!(output, "a\n[1, \"b\"]\n42\n");
}

#[test]
fn test_interpret_assert() {
    let (result, _) = interpret_captured("assert(1 < 2)");
    assert_eq!(result.unwrap(), Value::Unit);

    let (result, _) = interpret_captured("x = 1\n  assert(x == 2)");
    let err = result.unwrap_err();
    assert_eq!(
        err.as_eval(),
        Some(&EvalError::AssertionFailed { line: 2, column: 3 })
    );
}

#[test]
fn test_interpret_error_messages() {
    insta::assert_snapshot!(eval_error("1 / 0").to_string(), @"division by zero");
    insta::assert_snapshot!(
        eval_error("x = 1; x = 2").to_string(),
        @"immutable variable 'x'"
    );
    insta::assert_snapshot!(
        eval_error("f = fn(a) { a }\nf()").to_string(),
        @"arguments error: expected at least 1, got 0 at 2:1"
    );
    insta::assert_snapshot!(
        eval_error("[].pop").to_string(),
        @"undefined property 'pop' on array"
    );
    insta::assert_snapshot!(
        eval_error("true + 1").to_string(),
        @"type mismatch: expected number, found boolean"
    );
}
