//! External processes

use std::sync::Arc;
use tracing::warn;

use super::string;
use crate::config::{CORE_CONNECTOR, EXTERNAL_PROCESS_FEATURE};
use crate::errors::ErrorCode;
use crate::steps::{OutputRule, ParameterDef, Requirement, StepDefinition, StepFactory};
use crate::types::Value;

pub(super) fn factories() -> Vec<Arc<dyn StepFactory>> {
    vec![Arc::new(
        StepDefinition::new("RunExternalProcess", OutputRule::Fixed(string()), |step, state, cancel| {
            let path = step.value("Path", state, cancel)?;
            let path = path.as_str().map_err(|e| step.fail(e))?.to_string();

            let mut arguments = Vec::new();
            if step.is_supplied("Arguments") {
                for argument in step.list("Arguments", state, cancel)? {
                    arguments.push(argument.as_str().map_err(|e| step.fail(e))?.to_string());
                }
            }

            let runner = state.external_context().process_runner().map_err(|e| step.fail(e))?;
            let output = runner.run(&path, &arguments, cancel).map_err(|e| step.fail(e))?;

            if !output.stderr.trim().is_empty() {
                warn!(path = %path, stderr = %output.stderr.trim(), "external process wrote to stderr");
            }

            if !output.success() {
                let status = output
                    .exit_code
                    .map(|code| format!("exit code {}", code))
                    .unwrap_or_else(|| "terminated by signal".to_string());
                return Err(step.fail(ErrorCode::ExternalProcessError {
                    path,
                    message: format!("{}: {}", status, output.stderr.trim()),
                }));
            }

            Ok(Value::String(output.stdout))
        })
        .description("Run an external program and return what it wrote to stdout")
        .parameter(ParameterDef::scalar("Path", string()))
        .parameter(ParameterDef::list("Arguments", string()).optional())
        .requirement(Requirement::connector(CORE_CONNECTOR).feature(EXTERNAL_PROCESS_FEATURE))
        .impure(),
    )]
}
