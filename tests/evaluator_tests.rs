use abc_lang::evaluator::{self, EvalError};
use abc_lang::lexer::Lexer;
use abc_lang::parser::Parser;
use abc_lang::value::{Environment, Value};
use std::sync::Arc;

fn run(source: &str) -> Result<Value, EvalError> {
    let env = Environment::new();
    run_in(&env, source)
}

fn run_in(env: &Arc<Environment>, source: &str) -> Result<Value, EvalError> {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();
    assert!(
        parser.errors().is_empty(),
        "parse errors: {:?}",
        parser.errors()
    );
    evaluator::eval_program(&program, env)
}

// ============================================================================
// Variables and arithmetic
// ============================================================================

#[test]
fn test_set_and_add() {
    let result = run("set x to forty two\nreturn x plus one").unwrap();
    assert_eq!(result, Value::Integer(43));
}

#[test]
fn test_increase_and_decrease() {
    let result = run("set x to 10\nincrease x by 5\ndecrease x by 2\nreturn x").unwrap();
    assert_eq!(result, Value::Integer(13));
}

#[test]
fn test_division_truncates_toward_zero() {
    assert_eq!(run("return 7 divided by 2").unwrap(), Value::Integer(3));
    assert_eq!(
        run("return 7 divided by minus 2").unwrap(),
        Value::Integer(-3)
    );
    assert_eq!(
        run("return minus 7 divided by 2").unwrap(),
        Value::Integer(-3)
    );
}

#[test]
fn test_division_by_zero() {
    let err = run("say 10 divided by 0").unwrap_err();
    assert_eq!(err, EvalError::DivisionByZero);
    assert!(err.to_string().contains("division by zero"));
}

#[test]
fn test_unary_minus() {
    assert_eq!(run("return minus 5 plus 3").unwrap(), Value::Integer(-2));
}

#[test]
fn test_arithmetic_rejects_non_integers() {
    let err = run("return 1 plus true").unwrap_err();
    assert_eq!(
        err,
        EvalError::Type("arithmetic operations require integers, got BOOLEAN".to_string())
    );
}

#[test]
fn test_string_concatenation_uses_textual_forms() {
    assert_eq!(
        run("return \"n=\" plus 7").unwrap(),
        Value::String("n=7".to_string())
    );
    assert_eq!(
        run("return 7 plus \"!\"").unwrap(),
        Value::String("7!".to_string())
    );
    assert_eq!(
        run("set xs to a list of 1 and 2\nreturn \"xs=\" plus xs").unwrap(),
        Value::String("xs=[1, 2]".to_string())
    );
}

#[test]
fn test_undefined_variable() {
    let err = run("say y").unwrap_err();
    assert_eq!(
        err,
        EvalError::Undefined("undefined variable: y".to_string())
    );
}

// ============================================================================
// Comparison and logic
// ============================================================================

#[test]
fn test_equals() {
    assert_eq!(run("return 1 equals 1").unwrap(), Value::Boolean(true));
    assert_eq!(
        run("return \"a\" equals \"a\"").unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(run("return null equals null").unwrap(), Value::Boolean(true));
}

#[test]
fn test_equals_mixed_types_are_false() {
    assert_eq!(run("return 0 equals null").unwrap(), Value::Boolean(false));
    assert_eq!(run("return 1 equals \"1\"").unwrap(), Value::Boolean(false));
    assert_eq!(run("return true equals 1").unwrap(), Value::Boolean(false));
}

#[test]
fn test_greater_and_less() {
    assert_eq!(
        run("return 2 is greater than 1").unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(run("return 2 is less than 1").unwrap(), Value::Boolean(false));
    let err = run("return \"a\" is less than 1").unwrap_err();
    assert_eq!(
        err,
        EvalError::Type("comparison requires integers, got STRING".to_string())
    );
}

#[test]
fn test_logical_operators_return_booleans() {
    assert_eq!(run("return 1 and 2").unwrap(), Value::Boolean(true));
    assert_eq!(run("return 0 or 3").unwrap(), Value::Boolean(true));
    assert_eq!(run("return 0 or 0").unwrap(), Value::Boolean(false));
    assert_eq!(run("return not 0").unwrap(), Value::Boolean(true));
    assert_eq!(run("return not \"text\"").unwrap(), Value::Boolean(false));
}

#[test]
fn test_and_short_circuits() {
    // the undefined right side is never evaluated
    assert_eq!(run("return 0 and missing").unwrap(), Value::Boolean(false));
    assert_eq!(run("return 1 or missing").unwrap(), Value::Boolean(true));
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn test_if_branches() {
    assert_eq!(
        run("if 1 equals 1 then return \"yes\" done otherwise return \"no\" done").unwrap(),
        Value::String("yes".to_string())
    );
    assert_eq!(
        run("if 1 equals 2 then return \"yes\" done otherwise return \"no\" done").unwrap(),
        Value::String("no".to_string())
    );
}

#[test]
fn test_if_without_otherwise_yields_null() {
    assert_eq!(run("if 1 equals 2 then say 1 done").unwrap(), Value::Null);
}

#[test]
fn test_while_false_condition_runs_zero_times() {
    let result = run("set x to 0\nwhile x is greater than 5 do increase x by 1 done\nreturn x")
        .unwrap();
    assert_eq!(result, Value::Integer(0));
}

#[test]
fn test_while_loop_counts() {
    let result = run("set x to 0\nwhile x is less than 5 do increase x by 1 done\nreturn x")
        .unwrap();
    assert_eq!(result, Value::Integer(5));
}

#[test]
fn test_for_each_iterates_in_order() {
    let source = "set total to 0\n\
                  set xs to a list of 1 and 2 and 3\n\
                  for each v in xs do\n\
                  set total to total times 10 plus v\n\
                  done\n\
                  return total";
    assert_eq!(run(source).unwrap(), Value::Integer(123));
}

#[test]
fn test_for_each_requires_list() {
    let err = run("for each v in 5 do say v done").unwrap_err();
    assert_eq!(
        err,
        EvalError::Type("for each requires a list, got INTEGER".to_string())
    );
}

// ============================================================================
// Lists and strings
// ============================================================================

#[test]
fn test_list_literal_and_length() {
    assert_eq!(
        run("set xs to a list of 1 and 2 and 3\nreturn length of xs").unwrap(),
        Value::Integer(3)
    );
}

#[test]
fn test_item_is_one_indexed() {
    assert_eq!(
        run("set xs to a list of 10 and 20 and 30\nreturn item 1 from xs").unwrap(),
        Value::Integer(10)
    );
    assert_eq!(
        run("set xs to a list of 10 and 20 and 30\nreturn item 3 from xs").unwrap(),
        Value::Integer(30)
    );
}

#[test]
fn test_item_out_of_bounds() {
    let err = run("set xs to a list of 1 and 2\nreturn item 3 from xs").unwrap_err();
    assert_eq!(
        err,
        EvalError::IndexOutOfBounds("index out of bounds: 3 (list has 2 elements)".to_string())
    );
    let err = run("set xs to a list of 1 and 2\nreturn item 0 from xs").unwrap_err();
    assert!(matches!(err, EvalError::IndexOutOfBounds(_)));
}

#[test]
fn test_empty_list_boundaries() {
    let env = Environment::new();
    env.set("xs", Value::list(Vec::new()));
    assert_eq!(run_in(&env, "return length of xs").unwrap(), Value::Integer(0));
    assert!(matches!(
        run_in(&env, "return item 1 from xs").unwrap_err(),
        EvalError::IndexOutOfBounds(_)
    ));
}

#[test]
fn test_append_mutates_through_shared_binding() {
    let source = "set xs to a list of 1 and 2\n\
                  set ys to xs\n\
                  append 3 to ys\n\
                  return length of xs";
    assert_eq!(run(source).unwrap(), Value::Integer(3));
}

#[test]
fn test_string_length_and_index() {
    assert_eq!(run("set s to \"hi\"\nreturn length of s").unwrap(), Value::Integer(2));
    assert_eq!(
        run("return item 2 from \"hi\"").unwrap(),
        Value::String("i".to_string())
    );
    assert!(matches!(
        run("return item 3 from \"hi\"").unwrap_err(),
        EvalError::IndexOutOfBounds(_)
    ));
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_recursive_factorial() {
    let source = "to fact with n\n\
                  if n equals 0 then return 1 done\n\
                  return n times fact with n minus 1\n\
                  done\n\
                  return fact with 5";
    assert_eq!(run(source).unwrap(), Value::Integer(120));
}

#[test]
fn test_function_captures_definition_environment() {
    let source = "set base to 100\n\
                  to offset with x\n\
                  return base plus x\n\
                  done\n\
                  return offset with 5";
    assert_eq!(run(source).unwrap(), Value::Integer(105));
}

#[test]
fn test_pure_function_is_referentially_transparent() {
    let env = Environment::new();
    run_in(&env, "to double with n\nreturn n times 2\ndone").unwrap();
    let first = run_in(&env, "return double with 21").unwrap();
    let second = run_in(&env, "return double with 21").unwrap();
    assert_eq!(first, second);
    assert_eq!(first, Value::Integer(42));
}

#[test]
fn test_extra_arguments_are_ignored() {
    let source = "to first with a\nreturn a\ndone\nreturn first with 1 and 2 and 3";
    assert_eq!(run(source).unwrap(), Value::Integer(1));
}

#[test]
fn test_missing_argument_errors_at_first_use() {
    let source = "to pair with a and b\nreturn b\ndone\nreturn pair with 1";
    let err = run(source).unwrap_err();
    assert_eq!(
        err,
        EvalError::Undefined("undefined variable: b".to_string())
    );
}

#[test]
fn test_calling_a_non_function() {
    let err = run("set f to 5\nreturn f with 1").unwrap_err();
    assert_eq!(err, EvalError::Type("f is not a function".to_string()));
}

#[test]
fn test_call_of_undefined_function() {
    let err = run("return g with 1").unwrap_err();
    assert_eq!(
        err,
        EvalError::Undefined("function not defined: g".to_string())
    );
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn test_parse_json_and_field_access() {
    let source = "set j to \"{\\\"a\\\":{\\\"b\\\":7}}\"\n\
                  parse j as json into d\n\
                  return field \"a.b\" from d";
    assert_eq!(run(source).unwrap(), Value::Integer(7));
}

#[test]
fn test_field_miss_yields_null() {
    let source = "set j to \"{\\\"a\\\":1}\"\n\
                  parse j as json into d\n\
                  return field \"a.b.c\" from d";
    assert_eq!(run(source).unwrap(), Value::Null);
}

#[test]
fn test_field_lifts_arrays_to_lists() {
    let source = "set j to \"{\\\"xs\\\":[1,2,3]}\"\n\
                  parse j as json into d\n\
                  return length of field \"xs\" from d";
    assert_eq!(run(source).unwrap(), Value::Integer(3));
}

#[test]
fn test_json_numbers_truncate() {
    let source = "set j to \"{\\\"n\\\":3.9}\"\n\
                  parse j as json into d\n\
                  return field \"n\" from d";
    assert_eq!(run(source).unwrap(), Value::Integer(3));
}

#[test]
fn test_invalid_json_errors() {
    let err = run("parse \"not json\" as json into d").unwrap_err();
    assert!(matches!(err, EvalError::Json(_)));
    assert!(err.to_string().starts_with("invalid JSON:"));
}

#[test]
fn test_encode_list() {
    let source = "set xs to a list of 1 and 2\nencode xs as json into s\nreturn s";
    assert_eq!(run(source).unwrap(), Value::String("[1,2]".to_string()));
}

#[test]
fn test_encode_scalars_round_trip() {
    for (literal, expected) in [
        ("5", "5"),
        ("\"hi\"", "\"hi\""),
        ("true", "true"),
        ("null", "null"),
    ] {
        let source = format!("set v to {}\nencode v as json into s\nreturn s", literal);
        assert_eq!(
            run(&source).unwrap(),
            Value::String(expected.to_string()),
            "encoding {}",
            literal
        );
    }
}

#[test]
fn test_parse_then_encode_round_trips() {
    let source = "set j to \"[1,\\\"a\\\",null,true]\"\n\
                  parse j as json into d\n\
                  encode d as json into s\n\
                  return s";
    assert_eq!(
        run(source).unwrap(),
        Value::String("[1,\"a\",null,true]".to_string())
    );
}

#[test]
fn test_encode_rejects_functions() {
    let source = "to f return 1 done\nencode f as json into s";
    let err = run(source).unwrap_err();
    assert_eq!(
        err,
        EvalError::Type("cannot encode FUNCTION as json".to_string())
    );
}

// ============================================================================
// Reply values
// ============================================================================

#[test]
fn test_reply_defaults() {
    let result = run("reply with \"hi\"").unwrap();
    match result {
        Value::Reply(reply) => {
            assert_eq!(reply.status, 200);
            assert_eq!(reply.body, "hi");
            assert!(reply.headers.is_empty());
        }
        other => panic!("expected reply value, got {:?}", other),
    }
}

#[test]
fn test_reply_with_status_and_headers() {
    let result =
        run("reply with \"created\" with status 201 with header \"X-Id\" as \"7\"").unwrap();
    match result {
        Value::Reply(reply) => {
            assert_eq!(reply.status, 201);
            assert_eq!(reply.headers.get("X-Id"), Some(&"7".to_string()));
        }
        other => panic!("expected reply value, got {:?}", other),
    }
}

#[test]
fn test_reply_as_json_sets_content_type() {
    let result = run("set xs to a list of 1 and 2\nreply with xs as json").unwrap();
    match result {
        Value::Reply(reply) => {
            assert_eq!(reply.body, "[1,2]");
            assert_eq!(
                reply.headers.get("Content-Type"),
                Some(&"application/json".to_string())
            );
        }
        other => panic!("expected reply value, got {:?}", other),
    }
}

#[test]
fn test_reply_with_non_string_body_uses_textual_form() {
    let result = run("reply with 42").unwrap();
    match result {
        Value::Reply(reply) => assert_eq!(reply.body, "42"),
        other => panic!("expected reply value, got {:?}", other),
    }
}
