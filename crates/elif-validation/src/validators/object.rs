//! Object type validator

use crate::error::{ValidationMessage, ValidationOutcome};
use crate::traits::{AttributeLookup, Validator};
use async_trait::async_trait;
use serde_json::Value;

/// Validator that requires a JSON object
#[derive(Debug, Clone, Default)]
pub struct ObjectValidator {
    /// Custom message template
    pub message: Option<String>,
}

impl ObjectValidator {
    pub const MESSAGE: &'static str = "{attribute} - must be an object";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[async_trait]
impl Validator for ObjectValidator {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        _model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        match value {
            Value::Null | Value::Object(_) => Ok(None),
            _ => {
                let template = self.message.as_deref().unwrap_or(Self::MESSAGE);
                Err(ValidationMessage::for_attribute("not_object", template, attribute))
            }
        }
    }

    fn rule_name(&self) -> &'static str {
        "object"
    }

    fn parameters(&self) -> Option<Value> {
        Some(serde_json::json!({ "message": self.message }))
    }
}
