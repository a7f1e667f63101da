//! Helpers shared by the end-to-end tests

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::freeze::FreezableStep;
use crate::runtime::{self, ExternalContext, RootState};
use crate::{freeze_top_level, Config, Error, Step, StepFactoryStore, Value};

/// Parse a JSON tree, round-tripping it through serde_json
pub fn parse_tree(json: &str) -> FreezableStep {
    let tree: FreezableStep = serde_json::from_str(json).expect("tree parses");
    let text = serde_json::to_string(&tree).expect("tree serializes");
    serde_json::from_str(&text).expect("tree round-trips")
}

pub fn freeze_tree(tree: &FreezableStep, config: &Config) -> Result<Box<dyn Step>, Error> {
    let store = StepFactoryStore::build(config, Vec::new())?;
    freeze_top_level(tree, &store, config)
}

/// Freeze, verify and run `json` under default settings
pub fn run_json(json: &str) -> Result<Value, Error> {
    let config = Config::default();
    let step = freeze_tree(&parse_tree(json), &config)?;
    runtime::run_in_new_state(
        step.as_ref(),
        Arc::new(config),
        Arc::new(ExternalContext::new()),
        &CancellationToken::new(),
    )
}

/// Run `json` in `state`, leaving the store for inspection
pub fn run_json_in(json: &str, state: &mut RootState) -> Result<Value, Error> {
    let step = freeze_tree(&parse_tree(json), &Config::default())?;
    runtime::run_step(step.as_ref(), state, &CancellationToken::new())
}

pub fn int(value: i64) -> String {
    format!(r#"{{ "t": "Constant", "value": {{ "t": "Int", "v": {} }} }}"#, value)
}

pub fn string(value: &str) -> String {
    format!(r#"{{ "t": "Constant", "value": {{ "t": "String", "v": "{}" }} }}"#, value)
}

/// A compound node from `(key, property)` pairs already in JSON
pub fn compound(name: &str, properties: &[(&str, String)]) -> String {
    let properties: Vec<String> = properties
        .iter()
        .map(|(key, value)| format!(r#"{{ "key": "{}", "value": {} }}"#, key, value))
        .collect();
    format!(
        r#"{{ "t": "Compound", "name": "{}", "properties": [{}] }}"#,
        name,
        properties.join(", ")
    )
}

pub fn step(node: String) -> String {
    format!(r#"{{ "t": "Step", "step": {} }}"#, node)
}

pub fn steps(nodes: Vec<String>) -> String {
    format!(r#"{{ "t": "StepList", "steps": [{}] }}"#, nodes.join(", "))
}

pub fn variable(name: &str) -> String {
    format!(r#"{{ "t": "Variable", "name": "{}" }}"#, name)
}
