//! Execution core
//!
//! - `StateMonad` stores (root and scoped) owning runtime values
//! - `ExternalContext` capability lookup
//! - `verify` requirement checks
//! - `run_step`, the runner entry point

mod context;
mod state;
mod verify;

pub use context::{
    ExternalContext, ProcessOutput, ProcessRunner, SystemProcessRunner, PROCESS_RUNNER,
};
pub use state::{RootState, ScopedState, StateMonad};
pub use verify::verify;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::errors::Error;
use crate::steps::Step;
use crate::types::Value;

/// Verify `step` against the store's settings, then run it
pub fn run_step(
    step: &dyn Step,
    state: &mut dyn StateMonad,
    cancel: &CancellationToken,
) -> Result<Value, Error> {
    verify(step, state.settings())?;
    step.run(state, cancel)
}

/// Run `step` in a fresh root store, disposed when the run ends
pub fn run_in_new_state(
    step: &dyn Step,
    settings: Arc<Config>,
    context: Arc<ExternalContext>,
    cancel: &CancellationToken,
) -> Result<Value, Error> {
    let mut state = RootState::new(settings, context);
    let result = run_step(step, &mut state, cancel);
    info!(
        step = %step.name(),
        success = result.is_ok(),
        variables = state.len(),
        "run finished"
    );
    result
}
