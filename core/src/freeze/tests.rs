use super::*;

use crate::errors::{ErrorCode, TextLocation};
use crate::test_helpers::{arg, array, freeze, freeze_with, get, ints, list, run, sequence, set, step, store, sum};
use crate::types::{SerializeMode, TypeReference, Value};

fn compound(step: &FreezableStep) -> &CompoundFreezableStep {
    match step {
        FreezableStep::Compound(compound) => compound,
        other => panic!("expected a compound step, got {:?}", other),
    }
}

// ============================================================================
// Binding
// ============================================================================

#[test]
fn test_binding_errors_are_accumulated() {
    let tree = step(
        "Log",
        [("Word", arg(FreezableStep::string("a"))), ("Term", arg(FreezableStep::string("b")))],
    );
    let err = freeze(&tree).unwrap_err();

    assert_eq!(
        err.errors().iter().map(|e| e.code.clone()).collect::<Vec<_>>(),
        vec![
            ErrorCode::UnexpectedParameter {
                step: "Log".to_string(),
                parameter: "Word".to_string()
            },
            ErrorCode::UnexpectedParameter {
                step: "Log".to_string(),
                parameter: "Term".to_string()
            },
            ErrorCode::MissingParameter {
                step: "Log".to_string(),
                parameter: "Value".to_string()
            },
        ]
    );
}

#[test]
fn test_positional_and_duplicate_arguments() {
    let positional = step("Log", [(1usize, arg(FreezableStep::string("hi")))]);
    assert!(freeze(&positional).is_ok());

    let duplicate = step(
        "Log",
        [
            (ParameterKey::from(1), arg(FreezableStep::string("a"))),
            (ParameterKey::from("value"), arg(FreezableStep::string("b"))),
        ],
    );
    assert_eq!(freeze(&duplicate).unwrap_err().codes(), vec!["DuplicateParameter"]);
}

#[test]
fn test_unknown_step() {
    let err = freeze(&step("Launch", [("Rocket", arg(FreezableStep::int(1)))])).unwrap_err();
    assert_eq!(
        err.errors()[0].code,
        ErrorCode::StepDoesNotExist("Launch".to_string())
    );
}

#[test]
fn test_errors_carry_the_node_location() {
    let location = TextLocation::new("Log Word: 1", 0, 11).with_lines(2, 4, 2, 15);
    let tree = step("Log", [("Word", arg(FreezableStep::int(1)))]).with_location(location.clone());

    let err = freeze(&tree).unwrap_err();
    for error in err.errors() {
        assert_eq!(error.location.step_name.as_deref(), Some("Log"));
        assert_eq!(error.location.text_location.as_ref(), Some(&location));
    }
    assert!(err.render().contains("line 3, col 5"));
}

// ============================================================================
// Type checking
// ============================================================================

#[test]
fn test_wrong_type_names_the_caller() {
    let tree = step("Not", [("Boolean", arg(FreezableStep::string("yes")))]);
    let err = freeze(&tree).unwrap_err();

    assert_eq!(
        err.errors()[0].code,
        ErrorCode::WrongType {
            step: "Not".to_string(),
            parameter: "Boolean".to_string(),
            expected: "Bool".to_string(),
            actual: "String".to_string(),
        }
    );
}

#[test]
fn test_sibling_type_errors_are_all_reported() {
    let tree = sequence(
        vec![
            step("Not", [("Boolean", arg(FreezableStep::string("a")))]),
            step("Not", [("Boolean", arg(FreezableStep::int(1)))]),
        ],
        step("Log", [("Value", arg(FreezableStep::int(1)))]),
    );
    assert_eq!(freeze(&tree).unwrap_err().codes(), vec!["WrongType", "WrongType"]);
}

#[test]
fn test_nested_step_output_is_checked() {
    let tree = step("StringLength", [("String", arg(sum(ints(&[1, 2]))))]);
    let err = freeze(&tree).unwrap_err();
    assert_eq!(err.codes(), vec!["WrongType"]);
    assert_eq!(err.errors()[0].location.step_name.as_deref(), Some("Sum"));
}

#[test]
fn test_literal_conversions() {
    let date = step("DateToString", [("Date", arg(FreezableStep::string("2024-01-02")))]);
    assert!(freeze(&date).is_ok());

    let bad = step("DateToString", [("Date", arg(FreezableStep::string("not a date")))]);
    let err = freeze(&bad).unwrap_err();
    assert_eq!(err.codes(), vec!["InvalidCast"]);

    let number = step("ElementAtIndex", [("Array", arg(array(ints(&[5, 6])))), ("Index", arg(FreezableStep::string("1")))]);
    assert_eq!(run(&number).unwrap(), Value::Int(6));
}

#[test]
fn test_enum_constants() {
    let to_case = |enum_type: &str, value: &str| {
        step(
            "StringToCase",
            [
                ("String", arg(FreezableStep::string("abc"))),
                ("Case", arg(FreezableStep::enum_constant(enum_type, value))),
            ],
        )
    };

    assert_eq!(run(&to_case("textcase", "UPPER")).unwrap(), Value::string("ABC"));

    let err = freeze(&to_case("TextCase", "Shouting")).unwrap_err();
    assert_eq!(
        err.errors()[0].code,
        ErrorCode::UnexpectedEnumValue {
            enum_type: "TextCase".to_string(),
            value: "Shouting".to_string()
        }
    );
}

#[test]
fn test_automatic_variable_outside_lambda() {
    let tree = step("GetAutomaticVariable", Vec::<(&str, FreezableStepProperty)>::new());
    assert_eq!(freeze(&tree).unwrap_err().codes(), vec!["CannotInferType"]);
}

#[test]
fn test_unset_variable_fails_to_freeze() {
    let tree = step("Log", [("Value", get("missing"))]);
    assert_eq!(freeze(&tree).unwrap_err().codes(), vec!["CouldNotResolveVariable"]);
}

#[test]
fn test_variable_types_flow_into_steps() {
    let tree = sequence(
        vec![set("name", arg(FreezableStep::string("Ada")))],
        step("StringLength", [("String", get("name"))]),
    );
    assert_eq!(run(&tree).unwrap(), Value::Int(3));

    let wrong = sequence(
        vec![set("flag", arg(FreezableStep::bool(true)))],
        step("StringLength", [("String", get("flag"))]),
    );
    assert_eq!(freeze(&wrong).unwrap_err().codes(), vec!["WrongType"]);
}

// ============================================================================
// Options
// ============================================================================

fn plus(left: FreezableStep, right: FreezableStep) -> FreezableStep {
    FreezableStep::options(vec![
        sum(vec![left.clone(), right.clone()]),
        step("ArrayConcat", [("Arrays", list(vec![left, right]))]),
    ])
}

#[test]
fn test_constant_folding() {
    let tree = plus(FreezableStep::int(123), FreezableStep::int(456));

    let folded = freeze_with(&tree, true).unwrap();
    assert_eq!(folded.name(), "Constant");
    assert_eq!(folded.constant_value(), Some(&Value::Int(579)));

    let unfolded = freeze_with(&tree, false).unwrap();
    assert_eq!(unfolded.name(), "Sum");
    assert_eq!(unfolded.constant_value(), None);
    assert_eq!(run(&tree).unwrap(), Value::Int(579));
}

#[test]
fn test_impure_steps_are_not_folded() {
    let tree = step("Log", [("Value", arg(sum(ints(&[1, 2]))))]);
    let frozen = freeze_with(&tree, true).unwrap();
    assert_eq!(frozen.name(), "Log");
    assert_eq!(frozen.serialize(SerializeMode::Source), "Log Value: 3");
}

#[test]
fn test_failing_fold_is_left_for_run_time() {
    let tree = step("Divide", [("Terms", list(ints(&[1, 0])))]);
    let frozen = freeze_with(&tree, true).unwrap();
    assert_eq!(frozen.name(), "Divide");
}

#[test]
fn test_options_choose_first_that_freezes() {
    let tree = plus(array(ints(&[1, 2])), array(ints(&[3])));

    let frozen = freeze_with(&tree, false).unwrap();
    assert_eq!(frozen.name(), "ArrayConcat");
    assert_eq!(
        run(&tree).unwrap(),
        Value::array([Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn test_options_report_the_relaxed_failure() {
    // Neither option yields a String; only Sum would freeze without that constraint
    let options = FreezableStep::options(vec![
        step("ArrayConcat", [("Arrays", list(ints(&[1, 2])))]),
        sum(ints(&[1, 2])),
    ]);
    let tree = step("StringLength", [("String", arg(options))]);

    let err = freeze(&tree).unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(
        err.errors()[0].code,
        ErrorCode::WrongType {
            step: "StringLength".to_string(),
            parameter: "String".to_string(),
            expected: "String".to_string(),
            actual: "Integer".to_string(),
        }
    );
}

#[test]
fn test_options_report_first_failure_otherwise() {
    let tree = FreezableStep::options(vec![
        step("Nope", [("A", arg(FreezableStep::int(1)))]),
        step("Log", [("B", arg(FreezableStep::int(1)))]),
    ]);
    assert_eq!(freeze(&tree).unwrap_err().codes(), vec!["StepDoesNotExist"]);

    let empty = FreezableStep::options(Vec::new());
    assert_eq!(freeze(&empty).unwrap_err().codes(), vec!["CannotInferType"]);
}

#[test]
fn test_options_output_type_skips_failing_alternatives() {
    let store = store();
    let resolver = crate::types::TypeResolver::new(&store);
    let tree = plus(FreezableStep::int(1), FreezableStep::int(2));

    assert_eq!(
        tree.output_type_reference(&resolver).unwrap(),
        TypeReference::Actual(crate::types::ActualKind::Integer)
    );
}

// ============================================================================
// Entities
// ============================================================================

#[test]
fn test_constant_entity_is_folded() {
    let tree = FreezableStep::entity([
        ("a".to_string(), arg(FreezableStep::int(1))),
        ("b".to_string(), arg(sum(ints(&[1, 1])))),
    ]);

    let folded = freeze_with(&tree, true).unwrap();
    assert_eq!(folded.name(), "Constant");
    assert_eq!(folded.serialize(SerializeMode::Source), "('a': 1 'b': 2)");

    let unfolded = freeze_with(&tree, false).unwrap();
    assert_eq!(unfolded.name(), "CreateEntity");
}

// ============================================================================
// Reorganization
// ============================================================================

#[test]
fn test_misplaced_argument_moves_to_declaring_step() {
    let misplaced = step(
        "StringJoin",
        [(
            "Strings",
            arg(step(
                "ArrayNew",
                [
                    ("Elements", list(vec![FreezableStep::string("a"), FreezableStep::string("b")])),
                    ("Delimiter", arg(FreezableStep::string("-"))),
                ],
            )),
        )],
    );

    let reorganized = reorganize_named_arguments(&misplaced, &store());
    let outer = compound(&reorganized);
    assert_eq!(outer.properties.len(), 2);
    assert_eq!(outer.properties[1].key, ParameterKey::named("Delimiter"));

    assert_eq!(run(&misplaced).unwrap(), Value::string("a-b"));
}

#[test]
fn test_argument_already_supplied_is_not_moved() {
    let tree = step(
        "StringJoin",
        [
            (
                "Strings",
                arg(step(
                    "ArrayNew",
                    [
                        ("Elements", list(vec![FreezableStep::string("a")])),
                        ("Delimiter", arg(FreezableStep::string("-"))),
                    ],
                )),
            ),
            ("Delimiter", arg(FreezableStep::string("+"))),
        ],
    );

    let reorganized = reorganize_named_arguments(&tree, &store());
    assert_eq!(reorganized, tree);
    assert_eq!(freeze(&tree).unwrap_err().codes(), vec!["UnexpectedParameter"]);
}

#[test]
fn test_argument_moves_past_intermediate_steps() {
    let tree = step(
        "StringJoin",
        [(
            "Strings",
            arg(step(
                "ArrayConcat",
                [(
                    "Arrays",
                    list(vec![step(
                        "ArrayNew",
                        [
                            ("Elements", list(vec![FreezableStep::string("x"), FreezableStep::string("y")])),
                            ("Delimiter", arg(FreezableStep::string("/"))),
                        ],
                    )]),
                )],
            )),
        )],
    );

    assert_eq!(run(&tree).unwrap(), Value::string("x/y"));
}

// ============================================================================
// Wire format
// ============================================================================

#[test]
fn test_deserialize_tree_from_json() {
    let json = r#"{
        "t": "Compound",
        "name": "Sequence",
        "properties": [
            { "key": "InitialSteps", "value": { "t": "StepList", "steps": [
                { "t": "Compound", "name": "SetVariable", "properties": [
                    { "key": "Variable", "value": { "t": "Variable", "name": "x" } },
                    { "key": "Value", "value": { "t": "Step", "step": { "t": "Constant", "value": { "t": "Int", "v": 40 } } } }
                ] }
            ] } },
            { "key": "FinalStep", "value": { "t": "Step", "step": {
                "t": "Compound", "name": "Sum", "properties": [
                    { "key": 1, "value": { "t": "StepList", "steps": [
                        { "t": "Compound", "name": "GetVariable", "properties": [
                            { "key": "Variable", "value": { "t": "Variable", "name": "X" } }
                        ] },
                        { "t": "Constant", "value": { "t": "Int", "v": 2 } }
                    ] } }
                ]
            } } }
        ]
    }"#;

    let tree: FreezableStep = serde_json::from_str(json).unwrap();
    assert_eq!(tree.step_name(), "Sequence");
    assert_eq!(run(&tree).unwrap(), Value::Int(42));
}

#[test]
fn test_reserved_variable_name_is_rejected() {
    let json = r#"{ "t": "Variable", "name": "true" }"#;
    assert!(serde_json::from_str::<FreezableStepProperty>(json).is_err());
}
