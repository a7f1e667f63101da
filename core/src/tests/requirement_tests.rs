//! Requirement verification against connector settings

use maplit::btreemap;

use super::helpers::*;
use crate::config::{ConnectorSettings, CORE_CONNECTOR, EXTERNAL_PROCESS_FEATURE};
use crate::runtime::{self, RootState};
use crate::{Config, StepFactoryStore};

fn external_process() -> String {
    compound("RunExternalProcess", &[("Path", step(string("true")))])
}

fn config(core: ConnectorSettings) -> Config {
    Config {
        constant_folding: true,
        connectors: btreemap! { CORE_CONNECTOR.to_string() => core },
    }
}

#[test]
fn test_requirements_met_by_default() {
    let step = freeze_tree(&parse_tree(&external_process()), &Config::default()).unwrap();
    assert!(runtime::verify(step.as_ref(), &Config::default()).is_ok());
}

#[test]
fn test_missing_feature_fails_verification() {
    let without_feature = config(ConnectorSettings::new(env!("CARGO_PKG_VERSION")));
    let step = freeze_tree(&parse_tree(&external_process()), &without_feature).unwrap();

    let err = runtime::verify(step.as_ref(), &without_feature).unwrap_err();
    assert_eq!(err.codes(), vec!["RequirementsNotMet"]);
    assert!(err.to_string().contains(EXTERNAL_PROCESS_FEATURE));
}

#[test]
fn test_run_step_verifies_first() {
    let without_feature = config(ConnectorSettings::new("0.0.1"));
    let step = freeze_tree(&parse_tree(&external_process()), &Config::default()).unwrap();

    let mut state = RootState::new(
        std::sync::Arc::new(without_feature),
        std::sync::Arc::new(crate::runtime::ExternalContext::with_defaults()),
    );
    let err = runtime::run_step(step.as_ref(), &mut state, &tokio_util::sync::CancellationToken::new())
        .unwrap_err();
    assert_eq!(err.codes(), vec!["RequirementsNotMet"]);
}

#[test]
fn test_disabled_core_registers_no_steps() {
    let mut disabled = ConnectorSettings::new("1.0");
    disabled.enabled = false;
    let config = config(disabled);

    let store = StepFactoryStore::build(&config, Vec::new()).unwrap();
    assert!(store.is_empty());

    let err = freeze_tree(&parse_tree(&external_process()), &config).unwrap_err();
    assert_eq!(err.codes(), vec!["StepDoesNotExist"]);
}

#[test]
fn test_settings_override_from_toml() {
    let text = r#"
        constant_folding = false

        [connectors.Core]
        version = "9.9.9"
        features = ["ExternalProcess"]
    "#;
    let config: Config = toml::from_str(text).unwrap();

    assert!(!config.constant_folding);
    let core = config.connector("core").unwrap();
    assert_eq!(core.version, "9.9.9");
    assert!(core.enabled);
}
