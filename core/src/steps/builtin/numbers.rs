//! Arithmetic, comparison and boolean logic
//!
//! Arithmetic steps take a list of terms. When every term is an integer and
//! the step was frozen as Integer the result is an integer (wrapping on
//! overflow); otherwise every term is widened to Double.

use std::cmp::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{boolean, TypeReference};
use crate::errors::{Error, ErrorCode};
use crate::runtime::StateMonad;
use crate::steps::{CompoundStep, EnumDefinition, OutputRule, ParameterDef, StepDefinition, StepFactory};
use crate::types::{ActualKind, ConcreteType, Value};

pub const COMPARE_OPERATOR: &str = "CompareOperator";

enum Terms {
    Integers(Vec<i64>),
    Doubles(Vec<f64>),
}

fn terms(
    step: &CompoundStep,
    state: &mut dyn StateMonad,
    cancel: &CancellationToken,
) -> Result<Terms, Error> {
    let values = step.list("Terms", state, cancel)?;
    let integral = step.output_type != ConcreteType::Actual(ActualKind::Double)
        && values.iter().all(|v| matches!(v, Value::Int(_)));

    if integral {
        values
            .iter()
            .map(|v| v.as_int().map_err(|e| step.fail(e)))
            .collect::<Result<_, _>>()
            .map(Terms::Integers)
    } else {
        values
            .iter()
            .map(|v| v.as_double().map_err(|e| step.fail(e)))
            .collect::<Result<_, _>>()
            .map(Terms::Doubles)
    }
}

type IntOp = fn(i64, i64) -> i64;
type DoubleOp = fn(f64, f64) -> f64;

/// Left fold over the terms. With `identity` the fold starts from it,
/// otherwise from the first term (and an empty list gives zero).
fn arithmetic(
    name: &'static str,
    identity: Option<(i64, f64)>,
    checks_zero: bool,
    int_op: IntOp,
    double_op: DoubleOp,
) -> StepDefinition {
    StepDefinition::new(name, OutputRule::NumericMemberOf("Terms".into()), move |step, state, cancel| {
        let divide_by_zero = || step.fail(ErrorCode::DivideByZero);

        match terms(step, state, cancel)? {
            Terms::Integers(values) => {
                let mut iter = values.into_iter();
                let mut total = match identity {
                    Some((start, _)) => start,
                    None => match iter.next() {
                        Some(first) => first,
                        None => return Ok(Value::Int(0)),
                    },
                };
                for value in iter {
                    if checks_zero && value == 0 {
                        return Err(divide_by_zero());
                    }
                    total = int_op(total, value);
                }
                Ok(Value::Int(total))
            }
            Terms::Doubles(values) => {
                let mut iter = values.into_iter();
                let mut total = match identity {
                    Some((_, start)) => start,
                    None => match iter.next() {
                        Some(first) => first,
                        None => return Ok(Value::Double(0.0)),
                    },
                };
                for value in iter {
                    if checks_zero && value == 0.0 {
                        return Err(divide_by_zero());
                    }
                    total = double_op(total, value);
                }
                Ok(Value::Double(total))
            }
        }
    })
    .parameter(ParameterDef::list("Terms", TypeReference::number()))
}

/// Order two values of comparable kinds
pub(crate) fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            left.as_double().ok()?.partial_cmp(&right.as_double().ok()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

fn compare(step: &CompoundStep, state: &mut dyn StateMonad, cancel: &CancellationToken) -> Result<Value, Error> {
    let left = step.value("Left", state, cancel)?;
    let right = step.value("Right", state, cancel)?;
    let operator = step.value("Operator", state, cancel)?;
    let operator = operator.as_enum().map_err(|e| step.fail(e))?.value.to_lowercase();

    let ordering = compare_values(&left, &right);
    let result = match operator.as_str() {
        "equals" => ordering == Some(Ordering::Equal),
        "notequals" => ordering != Some(Ordering::Equal),
        other => {
            let ordering = ordering.ok_or_else(|| {
                step.fail(ErrorCode::InvalidCast {
                    value: right.to_string(),
                    target: left.value_type().to_string(),
                })
            })?;
            match other {
                "lessthan" => ordering == Ordering::Less,
                "lessthanorequal" => ordering != Ordering::Greater,
                "greaterthan" => ordering == Ordering::Greater,
                "greaterthanorequal" => ordering != Ordering::Less,
                _ => {
                    return Err(step.fail(ErrorCode::UnexpectedEnumValue {
                        enum_type: COMPARE_OPERATOR.to_string(),
                        value: other.to_string(),
                    }))
                }
            }
        }
    };
    Ok(Value::Bool(result))
}

fn logic(name: &'static str, short_circuit_on: bool) -> StepDefinition {
    StepDefinition::new(name, OutputRule::Fixed(boolean()), move |step, state, cancel| {
        for value in step.list("Terms", state, cancel)? {
            if value.as_bool().map_err(|e| step.fail(e))? == short_circuit_on {
                return Ok(Value::Bool(short_circuit_on));
            }
        }
        Ok(Value::Bool(!short_circuit_on))
    })
    .parameter(ParameterDef::list("Terms", boolean()))
}

pub(super) fn factories() -> Vec<Arc<dyn StepFactory>> {
    vec![
        Arc::new(
            arithmetic("Sum", Some((0, 0.0)), false, i64::wrapping_add, |a, b| a + b)
                .description("Add numbers together"),
        ),
        Arc::new(
            arithmetic("Subtract", None, false, i64::wrapping_sub, |a, b| a - b)
                .description("Subtract later terms from the first"),
        ),
        Arc::new(
            arithmetic("Product", Some((1, 1.0)), false, i64::wrapping_mul, |a, b| a * b)
                .description("Multiply numbers together"),
        ),
        Arc::new(
            arithmetic("Divide", None, true, i64::wrapping_div, |a, b| a / b)
                .description("Divide the first term by the later terms"),
        ),
        Arc::new(
            arithmetic("Modulo", None, true, i64::wrapping_rem, |a, b| a % b)
                .description("Remainder of dividing the first term by the later terms"),
        ),
        Arc::new(
            StepDefinition::new("Compare", OutputRule::Fixed(boolean()), compare)
                .parameter(ParameterDef::scalar("Left", TypeReference::Any))
                .parameter(ParameterDef::scalar("Right", TypeReference::Any))
                .parameter(ParameterDef::scalar(
                    "Operator",
                    TypeReference::Enum(COMPARE_OPERATOR.to_string()),
                ))
                .enum_type(EnumDefinition::new(
                    COMPARE_OPERATOR,
                    &[
                        "Equals",
                        "NotEquals",
                        "LessThan",
                        "LessThanOrEqual",
                        "GreaterThan",
                        "GreaterThanOrEqual",
                    ],
                )),
        ),
        Arc::new(
            StepDefinition::new("Not", OutputRule::Fixed(boolean()), |step, state, cancel| {
                let value = step.value("Boolean", state, cancel)?;
                Ok(Value::Bool(!value.as_bool().map_err(|e| step.fail(e))?))
            })
            .parameter(ParameterDef::scalar("Boolean", boolean())),
        ),
        Arc::new(logic("And", false).description("True when every term is true")),
        Arc::new(logic("Or", true).description("True when any term is true")),
    ]
}
