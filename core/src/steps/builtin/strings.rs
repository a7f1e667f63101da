//! Strings and dates

use chrono::format::{Item, StrftimeItems};
use std::sync::Arc;

use super::{integer, string, TypeReference};
use crate::errors::ErrorCode;
use crate::steps::{EnumDefinition, OutputRule, ParameterDef, StepDefinition, StepFactory};
use crate::types::{ActualKind, SerializeMode, Value};

pub const TEXT_CASE: &str = "TextCase";

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut start = true;
    for c in text.chars() {
        if c.is_whitespace() {
            start = true;
            out.push(c);
        } else if start {
            out.extend(c.to_uppercase());
            start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

pub(super) fn factories() -> Vec<Arc<dyn StepFactory>> {
    vec![
        Arc::new(
            StepDefinition::new("StringJoin", OutputRule::Fixed(string()), |step, state, cancel| {
                let strings = step.list("Strings", state, cancel)?;
                let delimiter = match step.optional_value("Delimiter", state, cancel)? {
                    Some(value) => value.as_str().map_err(|e| step.fail(e))?.to_string(),
                    None => String::new(),
                };
                let parts: Vec<String> = strings.iter().map(|s| s.serialize(SerializeMode::Primitive)).collect();
                Ok(Value::String(parts.join(&delimiter)))
            })
            .description("Join strings with an optional delimiter")
            .parameter(ParameterDef::list("Strings", string()))
            .parameter(ParameterDef::scalar("Delimiter", string()).optional()),
        ),
        Arc::new(
            StepDefinition::new("StringLength", OutputRule::Fixed(integer()), |step, state, cancel| {
                let value = step.value("String", state, cancel)?;
                let text = value.as_str().map_err(|e| step.fail(e))?;
                Ok(Value::Int(text.chars().count() as i64))
            })
            .parameter(ParameterDef::scalar("String", string())),
        ),
        Arc::new(
            StepDefinition::new("StringToCase", OutputRule::Fixed(string()), |step, state, cancel| {
                let value = step.value("String", state, cancel)?;
                let text = value.as_str().map_err(|e| step.fail(e))?;
                let case = step.value("Case", state, cancel)?;
                let case = case.as_enum().map_err(|e| step.fail(e))?;
                let converted = match case.value.to_lowercase().as_str() {
                    "upper" => text.to_uppercase(),
                    "lower" => text.to_lowercase(),
                    "title" => title_case(text),
                    _ => {
                        return Err(step.fail(ErrorCode::UnexpectedEnumValue {
                            enum_type: TEXT_CASE.to_string(),
                            value: case.value.clone(),
                        }))
                    }
                };
                Ok(Value::String(converted))
            })
            .parameter(ParameterDef::scalar("String", string()))
            .parameter(ParameterDef::scalar("Case", TypeReference::Enum(TEXT_CASE.to_string())))
            .enum_type(EnumDefinition::new(TEXT_CASE, &["Upper", "Lower", "Title"])),
        ),
        Arc::new(
            StepDefinition::new("DateToString", OutputRule::Fixed(string()), |step, state, cancel| {
                let value = step.value("Date", state, cancel)?;
                let date = value.as_date().map_err(|e| step.fail(e))?;
                let format = match step.optional_value("Format", state, cancel)? {
                    Some(format) => format.as_str().map_err(|e| step.fail(e))?.to_string(),
                    None => return Ok(Value::String(value.serialize(SerializeMode::Primitive))),
                };

                let items: Vec<Item> = StrftimeItems::new(&format).collect();
                if items.iter().any(|item| matches!(item, Item::Error)) {
                    return Err(step.fail(ErrorCode::InvalidCast {
                        value: format.clone(),
                        target: "a date format".to_string(),
                    }));
                }
                Ok(Value::String(
                    date.format_with_items(items.into_iter()).to_string(),
                ))
            })
            .description("Format a date; RFC 3339 when no format is given")
            .parameter(ParameterDef::scalar("Date", TypeReference::Actual(ActualKind::Date)))
            .parameter(ParameterDef::scalar("Format", string()).optional()),
        ),
    ]
}
