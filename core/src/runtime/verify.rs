//! Requirement verification over a frozen tree

use tracing::debug;

use crate::config::Config;
use crate::errors::{Error, ErrorCollector};
use crate::steps::Step;

/// Check every step's requirements against `settings`, reporting every
/// unmet requirement rather than the first.
pub fn verify(step: &dyn Step, settings: &Config) -> Result<(), Error> {
    let mut errors = ErrorCollector::new();
    let mut checked = 0;
    visit(step, settings, &mut errors, &mut checked);
    debug!(steps = checked, failed = errors.has_errors(), "verified requirements");
    errors.finish()
}

fn visit(step: &dyn Step, settings: &Config, errors: &mut ErrorCollector, checked: &mut usize) {
    *checked += 1;
    for requirement in step.requirements() {
        if let Err(builder) = settings.check_requirement(step.name(), &requirement) {
            errors.push(builder.into_error(step.error_location()));
        }
    }
    for child in step.children() {
        visit(child, settings, errors, checked);
    }
}
