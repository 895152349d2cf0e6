// Integration tests for Parser + Evaluator
//
// These tests verify that the parser and evaluator work together correctly
// to process complete expressions against caller-supplied variables.

use edl_expr::{
    evaluator::{Evaluator, EvaluatorOptions},
    functions::to_number,
    parser::parse,
    value::{Value, ValueType},
};
use indexmap::IndexMap;
use serde_json::json;

fn evaluator_with(variables: serde_json::Value) -> Evaluator {
    let options: EvaluatorOptions = serde_json::from_value(json!({ "variables": variables })).unwrap();
    Evaluator::with_options(options)
}

#[test]
fn test_nested_field_access() {
    let evaluator = evaluator_with(json!({
        "user": {
            "profile": {
                "name": "Bob"
            }
        }
    }));

    let result = evaluator.evaluate("user.profile.name");
    assert_eq!(result.value, Value::from(json!("Bob")));
    assert_eq!(result.value_type, ValueType::String);
}

#[test]
fn test_arithmetic_expression() {
    let evaluator = evaluator_with(json!({
        "price": 100,
        "quantity": 5
    }));

    assert_eq!(evaluator.evaluate("price * quantity").value, Value::from(json!(500)));
    assert_eq!(evaluator.evaluate("(price + 10) * quantity").value, Value::from(json!(550)));
}

#[test]
fn test_precedence() {
    let evaluator = Evaluator::new();
    assert_eq!(evaluator.evaluate("1 + 2 * 3").value, Value::from(7));
    assert_eq!(evaluator.evaluate("(1 + 2) * 3").value, Value::from(9));
    assert_eq!(evaluator.evaluate("-5 + 3").value, Value::from(-2));
    assert_eq!(evaluator.evaluate("2 + 3 > 4 && 1 < 2").value, Value::Bool(true));
}

#[test]
fn test_division_by_zero_is_not_a_parse_error() {
    assert!(parse("10 / 0").is_ok());
    let result = Evaluator::new().evaluate("10 / 0");
    assert_eq!(result.error, None);
    assert_eq!(result.value, Value::Number(f64::INFINITY));
}

#[test]
fn test_parse_errors() {
    for source in ["", "(1 + 2", "1 +", "* 2", "a ? b"] {
        assert!(parse(source).is_err(), "{source}");
        let result = Evaluator::new().evaluate(source);
        assert!(result.error.is_some(), "{source}");
        assert_eq!(result.value_type, ValueType::Undefined);
    }
}

#[test]
fn test_short_circuit_with_undefined_variable() {
    let evaluator = evaluator_with(json!({ "value": 10 }));
    let result = evaluator.evaluate("value ?? unknownVar");
    assert_eq!(result.error, None);
    assert_eq!(result.value, Value::from(10));
}

#[test]
fn test_null_coalescing_keeps_falsy_values() {
    for x in [json!(0), json!(""), json!(false), json!(5), json!("text")] {
        let evaluator = evaluator_with(json!({ "x": x, "y": "fallback" }));
        let result = evaluator.evaluate("x ?? y");
        assert_eq!(result.value, Value::from(&x), "{x}");
    }

    let evaluator = evaluator_with(json!({ "x": null, "y": "fallback" }));
    assert_eq!(evaluator.evaluate("x ?? y").value, Value::from("fallback"));
}

#[test]
fn test_security_denylist() {
    let evaluator = evaluator_with(json!({ "obj": { "a": 1 }, "constructor": "bad" }));
    for source in ["obj.constructor", "obj[\"constructor\"]", "constructor", "obj.__proto__", "obj.prototype"] {
        let error = evaluator.evaluate(source).error.unwrap_or_default();
        assert!(error.contains("not allowed"), "{source}: {error}");
    }
}

#[test]
fn test_depth_bound() {
    let shallow = Evaluator::with_options(EvaluatorOptions {
        max_depth: 5,
        ..Default::default()
    });
    let nested = format!("{}1{}", "(".repeat(10), ")".repeat(10));
    let error = shallow.evaluate(&nested).error.unwrap_or_default();
    assert!(error.contains("depth"), "{error}");

    let deep = Evaluator::with_options(EvaluatorOptions {
        max_depth: 100,
        ..Default::default()
    });
    let result = deep.evaluate("((1 + 2) * (3 + 4))");
    assert_eq!(result.error, None);
    assert_eq!(result.value, Value::from(21));
}

#[test]
fn test_real_world_order_total() {
    let evaluator = evaluator_with(json!({
        "order": {
            "items": [
                { "price": 5, "quantity": 2 },
                { "price": 11, "quantity": 1 }
            ]
        }
    }));
    let result = evaluator.evaluate(
        "order.items[0].price * order.items[0].quantity + order.items[1].price * order.items[1].quantity",
    );
    assert_eq!(result.value, Value::from(21));
}

#[test]
fn test_real_world_name_and_response() {
    let evaluator = evaluator_with(json!({
        "user": { "firstName": "John", "lastName": "Doe" },
        "response": { "data": [1, 2] }
    }));
    assert_eq!(
        evaluator.evaluate("concat(user.firstName, ' ', user.lastName)").value,
        Value::from("John Doe")
    );
    assert_eq!(evaluator.evaluate("response.data.length > 0").value, Value::Bool(true));
    assert_eq!(
        evaluator.evaluate("user.middleName ?? 'n/a'").value,
        Value::from("n/a")
    );
}

#[test]
fn test_custom_functions_and_array_builtins() {
    let mut evaluator = evaluator_with(json!({ "numbers": [1, 2, 3, 4, 5] }));
    evaluator
        .register_function("double", |args| Ok(Value::Number(to_number(&args[0]) * 2.0)))
        .unwrap();
    evaluator
        .register_function("isOdd", |args| Ok(Value::Bool(to_number(&args[0]) % 2.0 == 1.0)))
        .unwrap();

    assert_eq!(evaluator.evaluate("double(21)").value, Value::from(42));
    assert_eq!(
        evaluator.evaluate("map(filter(numbers, isOdd), double)").value,
        Value::from(json!([2, 6, 10]))
    );
    assert_eq!(evaluator.evaluate("some(numbers, isOdd)").value, Value::Bool(true));
    assert_eq!(evaluator.evaluate("every(numbers, isOdd)").value, Value::Bool(false));
    assert_eq!(
        evaluator.evaluate("reverse(numbers)").value,
        Value::from(json!([5, 4, 3, 2, 1]))
    );
    assert_eq!(evaluator.evaluate("pop(numbers)").value, Value::from(json!([1, 2, 3, 4])));
    assert_eq!(evaluator.evaluate("length(numbers)").value, Value::from(5));

    let error = evaluator.register_function("map", |_| Ok(Value::Null)).unwrap_err();
    assert!(error.to_string().contains("Cannot override built-in function"));
}

#[test]
fn test_instances_are_independent() {
    let mut first = Evaluator::new();
    first.register_function("only_here", |_| Ok(Value::from(1))).unwrap();
    first.set_variable("x", 1);

    let second = Evaluator::new();
    assert_eq!(first.evaluate("only_here() + x").value, Value::from(2));
    assert_eq!(
        second.evaluate("only_here()").error.as_deref(),
        Some("Undefined function: only_here")
    );
    assert_eq!(second.evaluate("x").error.as_deref(), Some("Undefined variable: x"));
}

#[test]
fn test_shared_across_threads() {
    let evaluator = std::sync::Arc::new(evaluator_with(json!({ "base": 10 })));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let evaluator = evaluator.clone();
            std::thread::spawn(move || {
                let mut overlay = IndexMap::new();
                overlay.insert("i".to_string(), Value::from(i));
                evaluator.evaluate_with("base + i", &overlay).value
            })
        })
        .collect();
    let results: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, (10..14).map(Value::from).collect::<Vec<_>>());
}

#[test]
fn test_result_serializes_for_callers() {
    let evaluator = Evaluator::new();
    let ok = serde_json::to_value(evaluator.evaluate("toUpperCase('abc')")).unwrap();
    assert_eq!(ok, json!({ "value": "ABC", "type": "string" }));

    let failed = serde_json::to_value(evaluator.evaluate("missing")).unwrap();
    assert_eq!(
        failed,
        json!({ "value": null, "type": "undefined", "error": "Undefined variable: missing" })
    );
}
