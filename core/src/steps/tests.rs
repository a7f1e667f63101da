use super::*;

use crate::config::{Config, ConnectorSettings, CORE_CONNECTOR};
use crate::freeze::{freeze_top_level, FreezableStep, ParameterKey};
use crate::runtime::RootState;
use crate::test_helpers::{arg, freeze_with, list, step, store};
use crate::types::{ActualKind, TypeResolver};

fn echo(name: &str) -> Arc<dyn StepFactory> {
    Arc::new(
        StepDefinition::new(name, OutputRule::SameAs("Value".to_string()), |step, state, cancel| {
            step.value("Value", state, cancel)
        })
        .parameter(ParameterDef::scalar("Value", TypeReference::Any)),
    )
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_store_lookup_ignores_case() {
    let store = store();
    assert!(store.get("sum").is_some());
    assert!(store.get("SUM").is_some());
    assert!(store.get("NoSuchStep").is_none());
    assert!(store.enum_definition("compareoperator").is_some());
    assert!(!store.is_empty());
}

#[test]
fn test_duplicate_step_names_are_all_reported() {
    let err = StepFactoryStore::from_factories(vec![echo("Echo"), echo("echo"), echo("ECHO")])
        .unwrap_err();
    assert_eq!(err.codes(), vec!["DuplicateStepName", "DuplicateStepName"]);
}

struct TestConnector;

impl Connector for TestConnector {
    fn name(&self) -> &str {
        "Testing"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn step_factories(&self, settings: &ConnectorSettings) -> Vec<Arc<dyn StepFactory>> {
        let mut factories = vec![echo("Echo")];
        if settings.has_feature("loud") {
            factories.push(echo("Shout"));
        }
        factories
    }
}

#[test]
fn test_connector_steps_follow_settings() {
    let plain = StepFactoryStore::build(&Config::default(), vec![Box::new(TestConnector)]).unwrap();
    assert!(plain.get("Echo").is_some());
    assert!(plain.get("Shout").is_none());

    let config = Config::default()
        .with_connector("testing", ConnectorSettings::new("1.0").with_feature("Loud"));
    let loud = StepFactoryStore::build(&config, vec![Box::new(TestConnector)]).unwrap();
    assert!(loud.get("Shout").is_some());
    assert_eq!(loud.len(), plain.len() + 1);
}

#[test]
fn test_disabled_connector_contributes_nothing() {
    let mut disabled = ConnectorSettings::new("1.0");
    disabled.enabled = false;
    let config = Config::default().with_connector(CORE_CONNECTOR, disabled);

    let store = StepFactoryStore::build(&config, Vec::new()).unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_connector_step_with_core_steps_clashes() {
    let err = StepFactoryStore::from_factories(
        builtin::all_factories().into_iter().chain([echo("Log")]),
    )
    .unwrap_err();
    assert_eq!(err.codes(), vec!["DuplicateStepName"]);
}

// ============================================================================
// Parameters and output rules
// ============================================================================

#[test]
fn test_parameter_positions_and_aliases() {
    let mut table = ParameterTable::new();
    table.push(ParameterDef::list("InitialSteps", TypeReference::Any).alias("Steps"));
    table.push(ParameterDef::scalar("FinalStep", TypeReference::Any).optional());

    assert_eq!(table.len(), 2);
    assert_eq!(table.find(&ParameterKey::from("steps")).unwrap().name, "InitialSteps");
    assert_eq!(table.find(&ParameterKey::from(2)).unwrap().name, "FinalStep");
    assert!(table.find(&ParameterKey::from(3)).is_none());
    assert!(!table.get("FinalStep").unwrap().required);
    assert_eq!(
        table.get("InitialSteps").unwrap().declared_type(),
        TypeReference::array(TypeReference::Any)
    );
}

#[test]
fn test_output_rules() {
    let store = store();
    let resolver = TypeResolver::new(&store);
    let int = TypeReference::Actual(ActualKind::Integer);
    let string = TypeReference::Actual(ActualKind::String);

    let args = |name: &str| match name {
        "Ints" => Some(TypeReference::array(int.clone())),
        "Text" => Some(string.clone()),
        "Anything" => Some(TypeReference::array(TypeReference::Any)),
        _ => None,
    };

    assert_eq!(OutputRule::MemberOf("Ints".into()).evaluate(args, &resolver).unwrap(), int);
    assert_eq!(
        OutputRule::SameAsOrUnit("Missing".into()).evaluate(args, &resolver).unwrap(),
        TypeReference::Unit
    );
    assert_eq!(
        OutputRule::NumericMemberOf("Anything".into()).evaluate(args, &resolver).unwrap(),
        TypeReference::number()
    );
    assert_eq!(
        OutputRule::CommonOf("Text".into(), "Missing".into()).evaluate(args, &resolver).unwrap(),
        string
    );
    assert_eq!(
        OutputRule::ArrayOfLambda("Text".into()).evaluate(args, &resolver).unwrap(),
        TypeReference::array(string.clone())
    );
    assert!(OutputRule::MemberOf("Text".into()).evaluate(args, &resolver).is_err());

    assert_eq!(
        OutputRule::AutomaticVariable.evaluate(args, &resolver).unwrap(),
        TypeReference::AutomaticVariable
    );
    let inside = resolver.with_automatic_variable(VariableName::item());
    assert_eq!(
        OutputRule::AutomaticVariable.evaluate(args, &inside).unwrap(),
        TypeReference::Variable(VariableName::item())
    );
}

#[test]
fn test_enum_definition_find() {
    let definition = EnumDefinition::new("Colour", &["Red", "Green"]);
    assert_eq!(definition.find("green"), Some("Green"));
    assert_eq!(definition.find("Blue"), None);
}

#[test]
fn test_requirement_display() {
    let requirement = Requirement::connector("Core")
        .min_version("1.2")
        .feature("a")
        .feature("b");
    assert_eq!(requirement.to_string(), "Core >= 1.2 [a, b]");
}

// ============================================================================
// Frozen steps
// ============================================================================

#[test]
fn test_constant_step() {
    let constant = ConstantStep::new(Value::Int(3), None);
    assert_eq!(constant.output_type(), &ConcreteType::Actual(ActualKind::Integer));
    assert_eq!(constant.constant_value(), Some(&Value::Int(3)));
    assert_eq!(constant.name(), "Constant");

    let widened = ConstantStep::typed(Value::Int(3), ConcreteType::Actual(ActualKind::Double), None);
    assert_eq!(widened.output_type(), &ConcreteType::Actual(ActualKind::Double));

    let mut state = RootState::empty();
    let value = constant.run(&mut state, &CancellationToken::new()).unwrap();
    assert_eq!(value, Value::Int(3));
}

#[test]
fn test_frozen_argument_types() {
    let empty = FrozenArgument::StepList(Vec::new());
    assert_eq!(empty.type_reference(), TypeReference::array(TypeReference::Any));
    assert_eq!(empty.constant_value(), Some(Value::Array(Vec::new())));

    let mixed = FrozenArgument::StepList(vec![
        Box::new(ConstantStep::new(Value::Int(1), None)),
        Box::new(ConstantStep::new(Value::string("a"), None)),
    ]);
    assert_eq!(
        mixed.type_reference(),
        TypeReference::array(TypeReference::multiple([
            TypeReference::Actual(ActualKind::Integer),
            TypeReference::Actual(ActualKind::String),
        ]))
    );
    assert_eq!(mixed.children().len(), 2);

    let variable = FrozenArgument::VariableName(VariableName::item());
    assert_eq!(variable.type_reference(), TypeReference::Variable(VariableName::item()));
    assert_eq!(variable.constant_value(), None);
}

#[test]
fn test_compound_serialization() {
    let tree = step(
        "StringJoin",
        [
            ("Strings", list(vec![FreezableStep::string("a"), FreezableStep::string("b")])),
            ("Delimiter", arg(FreezableStep::string("-"))),
        ],
    );
    let frozen = freeze_with(&tree, false).unwrap();
    assert_eq!(
        frozen.serialize(SerializeMode::Source),
        "StringJoin Strings: ['a', 'b'] Delimiter: '-'"
    );
    assert_eq!(frozen.children().len(), 3);

    let nested = step("StringLength", [("String", arg(tree))]);
    let frozen = freeze_with(&nested, false).unwrap();
    assert_eq!(
        frozen.serialize(SerializeMode::Source),
        "StringLength String: (StringJoin Strings: ['a', 'b'] Delimiter: '-')"
    );
}

#[test]
fn test_create_entity_step() {
    let entity = CreateEntityStep::new(
        vec![
            ("name".to_string(), Box::new(ConstantStep::new(Value::string("Ada"), None)) as Box<dyn Step>),
            ("age".to_string(), Box::new(ConstantStep::new(Value::Int(36), None))),
        ],
        None,
    );
    assert_eq!(entity.serialize(SerializeMode::Source), "('name': 'Ada' 'age': 36)");

    let mut state = RootState::empty();
    let value = entity.run(&mut state, &CancellationToken::new()).unwrap();
    let value = value.as_entity().unwrap();
    assert_eq!(value.get("age"), Some(&Value::Int(36)));
}

#[test]
fn test_custom_step_runs_after_freezing() {
    let store = StepFactoryStore::build(&Config::default(), vec![Box::new(TestConnector)]).unwrap();
    let tree = step("Echo", [("Value", arg(FreezableStep::int(5)))]);

    let frozen = freeze_top_level(&tree, &store, &Config { constant_folding: false, ..Config::default() })
        .unwrap();
    assert_eq!(frozen.output_type(), &ConcreteType::Actual(ActualKind::Integer));

    let mut state = RootState::empty();
    assert_eq!(frozen.run(&mut state, &CancellationToken::new()).unwrap(), Value::Int(5));
}
