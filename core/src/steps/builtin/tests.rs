use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::COMPARE_OPERATOR;
use crate::errors::ErrorBuilder;
use crate::freeze::{FreezableStep, FreezableStepProperty};
use crate::runtime::{ExternalContext, ProcessOutput, ProcessRunner, RootState, PROCESS_RUNNER};
use crate::test_helpers::{arg, array, freeze_with, get, ints, list, run, sequence, set, step, sum, var};
use crate::types::{Entity, Value};

fn get_variable(name: &str) -> FreezableStep {
    step("GetVariable", [("Variable", get(name))])
}

fn numbers(name: &str, terms: Vec<FreezableStep>) -> FreezableStep {
    step(name, [("Terms", list(terms))])
}

fn compare(left: FreezableStep, right: FreezableStep, operator: &str) -> FreezableStep {
    step(
        "Compare",
        [
            ("Left", arg(left)),
            ("Right", arg(right)),
            ("Operator", arg(FreezableStep::enum_constant(COMPARE_OPERATOR, operator))),
        ],
    )
}

// ============================================================================
// Numbers and logic
// ============================================================================

#[test]
fn test_integer_arithmetic() {
    assert_eq!(run(&sum(ints(&[1, 2, 3]))).unwrap(), Value::Int(6));
    assert_eq!(run(&numbers("Subtract", ints(&[10, 3, 2]))).unwrap(), Value::Int(5));
    assert_eq!(run(&numbers("Product", ints(&[2, 3, 4]))).unwrap(), Value::Int(24));
    assert_eq!(run(&numbers("Divide", ints(&[7, 2]))).unwrap(), Value::Int(3));
    assert_eq!(run(&numbers("Modulo", ints(&[7, 3]))).unwrap(), Value::Int(1));
}

#[test]
fn test_integer_overflow_wraps() {
    assert_eq!(run(&sum(ints(&[i64::MAX, 1]))).unwrap(), Value::Int(i64::MIN));
}

#[test]
fn test_mixed_terms_use_doubles() {
    let terms = vec![FreezableStep::double(7.0), FreezableStep::int(2)];
    assert_eq!(run(&numbers("Divide", terms)).unwrap(), Value::Double(3.5));
}

#[test]
fn test_divide_by_zero() {
    let err = run(&numbers("Divide", ints(&[1, 0]))).unwrap_err();
    assert_eq!(err.codes(), vec!["DivideByZero"]);
    assert_eq!(err.errors()[0].location.step_name.as_deref(), Some("Divide"));

    let err = run(&numbers("Modulo", vec![FreezableStep::double(1.5), FreezableStep::double(0.0)]))
        .unwrap_err();
    assert_eq!(err.codes(), vec!["DivideByZero"]);
}

#[test]
fn test_compare() {
    let cases = [
        (1, 2, "LessThan", true),
        (2, 2, "LessThanOrEqual", true),
        (3, 2, "GreaterThan", true),
        (2, 2, "GreaterThanOrEqual", true),
        (2, 2, "Equals", true),
        (1, 2, "NotEquals", true),
        (1, 2, "greaterthan", false),
    ];

    for (left, right, operator, expected) in cases {
        let tree = compare(FreezableStep::int(left), FreezableStep::int(right), operator);
        assert_eq!(run(&tree).unwrap(), Value::Bool(expected), "{} {} {}", left, operator, right);
    }
}

#[test]
fn test_compare_mixed_numbers_and_strings() {
    let tree = compare(FreezableStep::int(2), FreezableStep::double(2.5), "LessThan");
    assert_eq!(run(&tree).unwrap(), Value::Bool(true));

    let tree = compare(FreezableStep::string("abc"), FreezableStep::string("abd"), "LessThan");
    assert_eq!(run(&tree).unwrap(), Value::Bool(true));

    let tree = compare(FreezableStep::string("abc"), FreezableStep::int(1), "Equals");
    assert_eq!(run(&tree).unwrap(), Value::Bool(false));

    let tree = compare(FreezableStep::string("abc"), FreezableStep::int(1), "LessThan");
    assert_eq!(run(&tree).unwrap_err().codes(), vec!["InvalidCast"]);
}

#[test]
fn test_unknown_operator_fails_to_freeze() {
    let tree = compare(FreezableStep::int(1), FreezableStep::int(2), "Sideways");
    let err = freeze_with(&tree, false).unwrap_err();
    assert_eq!(err.codes(), vec!["UnexpectedEnumValue"]);
}

#[test]
fn test_boolean_logic() {
    let bools = |values: &[bool]| values.iter().map(|b| FreezableStep::bool(*b)).collect::<Vec<_>>();

    assert_eq!(run(&numbers("And", bools(&[true, true]))).unwrap(), Value::Bool(true));
    assert_eq!(run(&numbers("And", bools(&[true, false]))).unwrap(), Value::Bool(false));
    assert_eq!(run(&numbers("Or", bools(&[false, true]))).unwrap(), Value::Bool(true));
    assert_eq!(run(&numbers("Or", bools(&[false, false]))).unwrap(), Value::Bool(false));

    let not = step("Not", [("Boolean", arg(FreezableStep::bool(false)))]);
    assert_eq!(run(&not).unwrap(), Value::Bool(true));
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn test_sequence_returns_final_step() {
    let tree = sequence(vec![set("x", arg(FreezableStep::int(4)))], get_variable("x"));
    assert_eq!(run(&tree).unwrap(), Value::Int(4));

    let only_initial = step("Sequence", [("Steps", list(vec![set("x", arg(FreezableStep::int(4)))]))]);
    assert_eq!(run(&only_initial).unwrap(), Value::Unit);
}

#[test]
fn test_if_runs_one_branch() {
    let tree = sequence(
        vec![
            set("x", arg(FreezableStep::int(0))),
            step(
                "If",
                [
                    ("Condition", arg(FreezableStep::bool(false))),
                    ("Then", arg(set("x", arg(FreezableStep::int(1))))),
                    ("Else", arg(set("x", arg(FreezableStep::int(2))))),
                ],
            ),
        ],
        get_variable("x"),
    );
    assert_eq!(run(&tree).unwrap(), Value::Int(2));
}

#[test]
fn test_value_if_widens_to_common_type() {
    let tree = step(
        "ValueIf",
        [
            ("Condition", arg(FreezableStep::bool(true))),
            ("Then", arg(FreezableStep::int(1))),
            ("Else", arg(FreezableStep::double(2.5))),
        ],
    );
    assert_eq!(run(&tree).unwrap(), Value::Double(1.0));
}

#[test]
fn test_assert_true() {
    let passing = step(
        "AssertTrue",
        [("Boolean", arg(compare(FreezableStep::int(1), FreezableStep::int(1), "Equals")))],
    );
    assert_eq!(run(&passing).unwrap(), Value::Unit);

    let failing = step(
        "AssertTrue",
        [("Boolean", arg(compare(FreezableStep::int(1), FreezableStep::int(2), "Equals")))],
    );
    let err = run(&failing).unwrap_err();
    assert_eq!(err.codes(), vec!["AssertionFailed"]);
    assert!(err.to_string().contains("Compare"));
}

#[test]
fn test_log_returns_unit() {
    let tree = step("Log", [("Value", arg(FreezableStep::string("hello")))]);
    assert_eq!(run(&tree).unwrap(), Value::Unit);
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_string_steps() {
    let join = step(
        "StringJoin",
        [("Strings", list(vec![FreezableStep::string("a"), FreezableStep::string("b")]))],
    );
    assert_eq!(run(&join).unwrap(), Value::string("ab"));

    let join = step(
        "StringJoin",
        [
            ("Strings", list(vec![FreezableStep::string("a"), FreezableStep::string("b")])),
            ("Delimiter", arg(FreezableStep::string(", "))),
        ],
    );
    assert_eq!(run(&join).unwrap(), Value::string("a, b"));

    let length = step("StringLength", [("String", arg(FreezableStep::string("héllo")))]);
    assert_eq!(run(&length).unwrap(), Value::Int(5));
}

#[test]
fn test_string_to_case() {
    let to_case = |case: &str| {
        step(
            "StringToCase",
            [
                ("String", arg(FreezableStep::string("hello wORLD"))),
                ("Case", arg(FreezableStep::enum_constant(super::TEXT_CASE, case))),
            ],
        )
    };

    assert_eq!(run(&to_case("Upper")).unwrap(), Value::string("HELLO WORLD"));
    assert_eq!(run(&to_case("lower")).unwrap(), Value::string("hello world"));
    assert_eq!(run(&to_case("Title")).unwrap(), Value::string("Hello World"));
}

#[test]
fn test_date_to_string() {
    let date = || arg(FreezableStep::string("2024-03-01T10:00:00Z"));

    let formatted = step(
        "DateToString",
        [("Date", date()), ("Format", arg(FreezableStep::string("%Y-%m-%d")))],
    );
    assert_eq!(run(&formatted).unwrap(), Value::string("2024-03-01"));

    let default = step("DateToString", [("Date", date())]);
    assert_eq!(run(&default).unwrap(), Value::string("2024-03-01T10:00:00Z"));

    let bad_format = step(
        "DateToString",
        [("Date", date()), ("Format", arg(FreezableStep::string("%Q")))],
    );
    assert_eq!(run(&bad_format).unwrap_err().codes(), vec!["InvalidCast"]);

    let bad_date = step("DateToString", [("Date", arg(FreezableStep::string("yesterday")))]);
    assert_eq!(freeze_with(&bad_date, false).unwrap_err().codes(), vec!["InvalidCast"]);
}

// ============================================================================
// Arrays
// ============================================================================

#[test]
fn test_array_steps() {
    let length = step("ArrayLength", [("Array", arg(array(ints(&[1, 2, 3]))))]);
    assert_eq!(run(&length).unwrap(), Value::Int(3));

    let concat = step(
        "ArrayConcat",
        [("Arrays", list(vec![array(ints(&[1])), array(ints(&[2, 3]))]))],
    );
    assert_eq!(
        run(&concat).unwrap(),
        Value::array([Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn test_element_at_index() {
    let at = |index: i64| {
        step(
            "ElementAtIndex",
            [("Array", arg(array(ints(&[10, 20])))), ("Index", arg(FreezableStep::int(index)))],
        )
    };

    assert_eq!(run(&at(0)).unwrap(), Value::Int(10));
    assert_eq!(run(&at(1)).unwrap(), Value::Int(20));
    assert_eq!(run(&at(2)).unwrap_err().codes(), vec!["IndexOutOfBounds"]);
    assert_eq!(run(&at(-1)).unwrap_err().codes(), vec!["IndexOutOfBounds"]);
}

#[test]
fn test_map_with_implicit_variable() {
    let body = sum(vec![get_variable("item"), FreezableStep::int(1)]);
    let tree = step("Map", [("Array", arg(array(ints(&[1, 2, 3])))), ("Function", arg(body))]);

    assert_eq!(
        run(&tree).unwrap(),
        Value::array([Value::Int(2), Value::Int(3), Value::Int(4)])
    );
}

#[test]
fn test_map_with_automatic_variable() {
    let automatic = step("GetAutomaticVariable", Vec::<(&str, FreezableStepProperty)>::new());
    let body = sum(vec![automatic, FreezableStep::int(10)]);
    let tree = step("Map", [("Array", arg(array(ints(&[1, 2])))), ("Function", arg(body))]);

    assert_eq!(run(&tree).unwrap(), Value::array([Value::Int(11), Value::Int(12)]));
}

#[test]
fn test_for_each_updates_outer_variable() {
    let body = set("total", arg(sum(vec![get_variable("total"), get_variable("n")])));
    let tree = sequence(
        vec![
            set("total", arg(FreezableStep::int(0))),
            step(
                "ForEach",
                [
                    ("Array", arg(array(ints(&[1, 2, 3])))),
                    ("Action", FreezableStepProperty::lambda(Some(var("n")), body)),
                ],
            ),
        ],
        get_variable("total"),
    );

    assert_eq!(run(&tree).unwrap(), Value::Int(6));
}

#[test]
fn test_for_each_stops_when_cancelled() {
    let tree = step(
        "ForEach",
        [
            ("Array", arg(array(ints(&[1, 2])))),
            ("Action", arg(step("Log", [("Value", arg(get_variable("item")))]))),
        ],
    );
    let frozen = freeze_with(&tree, false).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut state = RootState::empty();
    assert_eq!(frozen.run(&mut state, &cancel).unwrap_err().codes(), vec!["Cancelled"]);
}

// ============================================================================
// Entities
// ============================================================================

#[test]
fn test_entity_steps() {
    let person = || {
        FreezableStep::entity([
            ("name".to_string(), arg(FreezableStep::string("Ada"))),
            ("age".to_string(), arg(FreezableStep::int(36))),
        ])
    };
    let get_value = |property: &str| {
        step(
            "EntityGetValue",
            [("Entity", arg(person())), ("Property", arg(FreezableStep::string(property)))],
        )
    };

    assert_eq!(run(&get_value("name")).unwrap(), Value::string("Ada"));
    assert_eq!(run(&get_value("missing")).unwrap(), Value::Unit);

    let combined = step(
        "EntityCombine",
        [(
            "Terms",
            list(vec![
                person(),
                FreezableStep::entity([("age".to_string(), arg(FreezableStep::int(37)))]),
            ]),
        )],
    );
    let expected = Entity::from_pairs([
        ("name".to_string(), Value::string("Ada")),
        ("age".to_string(), Value::Int(37)),
    ]);
    assert_eq!(run(&combined).unwrap(), Value::Entity(expected));
}

// ============================================================================
// External processes
// ============================================================================

struct ScriptedRunner {
    exit_code: i32,
}

impl ProcessRunner for ScriptedRunner {
    fn run(
        &self,
        _path: &str,
        _arguments: &[String],
        _cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ErrorBuilder> {
        Ok(ProcessOutput {
            exit_code: Some(self.exit_code),
            stdout: "out".to_string(),
            stderr: "err".to_string(),
        })
    }
}

fn run_external(context: ExternalContext) -> Result<Value, crate::errors::Error> {
    let tree = step("RunExternalProcess", [("Path", arg(FreezableStep::string("tool")))]);
    let frozen = freeze_with(&tree, false).unwrap();
    let mut state = RootState::new(Arc::new(crate::Config::default()), Arc::new(context));
    frozen.run(&mut state, &CancellationToken::new())
}

#[test]
fn test_external_process_results() {
    let runner = |exit_code| Arc::new(ScriptedRunner { exit_code }) as Arc<dyn ProcessRunner>;

    let ok = run_external(ExternalContext::new().with(PROCESS_RUNNER, runner(0))).unwrap();
    assert_eq!(ok, Value::string("out"));

    let err = run_external(ExternalContext::new().with(PROCESS_RUNNER, runner(2))).unwrap_err();
    assert_eq!(err.codes(), vec!["ExternalProcessError"]);
    assert!(err.to_string().contains("exit code 2"));

    let err = run_external(ExternalContext::new()).unwrap_err();
    assert_eq!(err.codes(), vec!["MissingContext"]);
    assert_eq!(err.errors()[0].location.step_name.as_deref(), Some("RunExternalProcess"));
}
