//! Array type and size validator

use crate::error::{ValidationMessage, ValidationOutcome};
use crate::traits::{AttributeLookup, Validator};
use crate::validators::template;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Validator that requires a JSON array, optionally bounded in size
#[derive(Debug, Clone, Default)]
pub struct ArrayValidator {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Message overrides keyed by failure code (`not_array`, `too_few`, `too_many`)
    pub messages: BTreeMap<String, String>,
}

impl ArrayValidator {
    pub const MESSAGE: &'static str = "{attribute} - must be an array";
    pub const MESSAGE_MIN_LENGTH: &'static str =
        "{attribute} - has not enough elements in the array (minimum is {count})";
    pub const MESSAGE_MAX_LENGTH: &'static str =
        "{attribute} - has too many elements in the array (maximum is {count})";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn message(mut self, code: impl Into<String>, template: impl Into<String>) -> Self {
        self.messages.insert(code.into(), template.into());
        self
    }

    fn fail(&self, code: &str, default: &str, attribute: &str) -> ValidationMessage {
        ValidationMessage::for_attribute(code, template(&self.messages, code, default), attribute)
    }
}

#[async_trait]
impl Validator for ArrayValidator {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        _model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        let items = match value {
            Value::Null => return Ok(None),
            Value::Array(items) => items,
            _ => return Err(self.fail("not_array", Self::MESSAGE, attribute)),
        };

        if let Some(min) = self.min_length {
            if items.len() < min {
                return Err(self
                    .fail("too_few", Self::MESSAGE_MIN_LENGTH, attribute)
                    .bind("count", min));
            }
        }

        if let Some(max) = self.max_length {
            if items.len() > max {
                return Err(self
                    .fail("too_many", Self::MESSAGE_MAX_LENGTH, attribute)
                    .bind("count", max));
            }
        }

        Ok(None)
    }

    fn rule_name(&self) -> &'static str {
        "array"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "min_length": self.min_length,
            "max_length": self.max_length,
            "messages": self.messages,
        }))
    }
}
