//! Named-argument reorganization
//!
//! The grammar cannot always tell which step a trailing named argument
//! belongs to: in `StringJoin Strings: (ArrayNew Elements: ['a', 'b'] Delimiter: '-')`
//! the parser attaches `Delimiter` to `ArrayNew`. Before freezing, a named
//! property that its step does not declare moves up to the nearest
//! enclosing step that declares it and has not been given it yet.

use super::ast::{EntityProperty, FreezableStep, FreezableStepProperty, ParameterKey, StepProperty};
use crate::steps::{StepFactory, StepFactoryStore};

/// Lower-cased names and aliases a step still accepts
type AcceptSet = Vec<String>;

fn accepts(set: &AcceptSet, key: &ParameterKey) -> bool {
    key.as_name()
        .is_some_and(|name| set.iter().any(|n| n.eq_ignore_ascii_case(name)))
}

fn unsupplied(factory: &dyn StepFactory, properties: &[StepProperty]) -> AcceptSet {
    factory
        .parameters()
        .iter()
        .filter(|def| {
            !properties.iter().any(|p| match &p.key {
                ParameterKey::Named(name) => def.matches_name(name),
                ParameterKey::Index(position) => def.position == *position,
            })
        })
        .flat_map(|def| std::iter::once(&def.name).chain(def.aliases.iter()))
        .map(|name| name.to_lowercase())
        .collect()
}

/// Move misplaced named properties to the steps that declare them
pub fn reorganize_named_arguments(step: &FreezableStep, store: &StepFactoryStore) -> FreezableStep {
    let (step, unclaimed) = relocate(step, store, &[]);
    // A property only moves when some ancestor accepts it, and the root has none
    debug_assert!(unclaimed.is_empty());
    step
}

/// Rewrite `step`, returning it with the properties that must move further up
fn relocate(
    step: &FreezableStep,
    store: &StepFactoryStore,
    ancestors: &[AcceptSet],
) -> (FreezableStep, Vec<StepProperty>) {
    match step {
        FreezableStep::Compound(compound) => {
            let factory = store.get(&compound.name);
            let own = factory
                .map(|f| unsupplied(f.as_ref(), &compound.properties))
                .unwrap_or_default();

            let mut inner = ancestors.to_vec();
            inner.push(own.clone());

            let mut kept = Vec::with_capacity(compound.properties.len());
            let mut absorbed = Vec::new();
            let mut moving = Vec::new();

            for property in &compound.properties {
                let (value, from_below) = relocate_property(&property.value, store, &inner);
                for candidate in from_below {
                    if accepts(&own, &candidate.key) {
                        absorbed.push(candidate);
                    } else {
                        moving.push(candidate);
                    }
                }

                let declared = factory.map_or(true, |f| f.parameters().find(&property.key).is_some());
                let wanted_above = ancestors.iter().any(|set| accepts(set, &property.key));
                let relocated = StepProperty {
                    key: property.key.clone(),
                    value,
                };
                if !declared && wanted_above {
                    moving.push(relocated);
                } else {
                    kept.push(relocated);
                }
            }

            kept.extend(absorbed);
            let mut rewritten = compound.clone();
            rewritten.properties = kept;
            (FreezableStep::Compound(rewritten), moving)
        }
        FreezableStep::Options { options, location } => {
            let mut moving: Vec<StepProperty> = Vec::new();
            let mut rewritten = Vec::with_capacity(options.len());
            for option in options {
                let (option, from_option) = relocate(option, store, ancestors);
                rewritten.push(option);
                for candidate in from_option {
                    let seen = moving.iter().any(|m| match (&m.key, &candidate.key) {
                        (ParameterKey::Named(a), ParameterKey::Named(b)) => a.eq_ignore_ascii_case(b),
                        _ => false,
                    });
                    if !seen {
                        moving.push(candidate);
                    }
                }
            }
            (
                FreezableStep::Options {
                    options: rewritten,
                    location: location.clone(),
                },
                moving,
            )
        }
        FreezableStep::CreateEntity {
            properties,
            location,
        } => {
            let mut moving = Vec::new();
            let properties = properties
                .iter()
                .map(|EntityProperty { key, value }| {
                    let (value, from_below) = relocate_property(value, store, ancestors);
                    moving.extend(from_below);
                    EntityProperty {
                        key: key.clone(),
                        value,
                    }
                })
                .collect();
            (
                FreezableStep::CreateEntity {
                    properties,
                    location: location.clone(),
                },
                moving,
            )
        }
        FreezableStep::Constant { .. } | FreezableStep::EnumConstant { .. } => {
            (step.clone(), Vec::new())
        }
    }
}

fn relocate_property(
    property: &FreezableStepProperty,
    store: &StepFactoryStore,
    ancestors: &[AcceptSet],
) -> (FreezableStepProperty, Vec<StepProperty>) {
    match property {
        FreezableStepProperty::Variable { .. } => (property.clone(), Vec::new()),
        FreezableStepProperty::Step { step } => {
            let (step, moving) = relocate(step, store, ancestors);
            (FreezableStepProperty::step(step), moving)
        }
        FreezableStepProperty::StepList { steps, location } => {
            let mut moving = Vec::new();
            let steps = steps
                .iter()
                .map(|s| {
                    let (s, from_below) = relocate(s, store, ancestors);
                    moving.extend(from_below);
                    s
                })
                .collect();
            (
                FreezableStepProperty::StepList {
                    steps,
                    location: location.clone(),
                },
                moving,
            )
        }
        FreezableStepProperty::Lambda {
            variable,
            body,
            location,
        } => {
            let (body, moving) = relocate(body, store, ancestors);
            (
                FreezableStepProperty::Lambda {
                    variable: variable.clone(),
                    body: Box::new(body),
                    location: location.clone(),
                },
                moving,
            )
        }
    }
}
