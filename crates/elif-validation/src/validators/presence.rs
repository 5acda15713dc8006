//! Presence validator

use crate::error::{ValidationMessage, ValidationOutcome};
use crate::traits::{AttributeLookup, Validator};
use crate::validators::is_empty;
use async_trait::async_trait;
use serde_json::Value;

/// Validator that ensures an attribute is present and not blank
#[derive(Debug, Clone, Default)]
pub struct PresenceValidator {
    /// Custom message template
    pub message: Option<String>,
    /// Accept empty strings, arrays and objects; only reject missing values
    pub allow_empty: bool,
}

impl PresenceValidator {
    pub const MESSAGE: &'static str = "{attribute} - can't be blank";

    /// Create a new presence validator with the default message
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a presence validator with a custom message
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Only reject null values
    pub fn allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }
}

#[async_trait]
impl Validator for PresenceValidator {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        _model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        let missing = if self.allow_empty {
            value.is_null()
        } else {
            is_empty(value)
        };

        if missing {
            let template = self.message.as_deref().unwrap_or(Self::MESSAGE);
            return Err(ValidationMessage::for_attribute("blank", template, attribute));
        }

        Ok(None)
    }

    fn rule_name(&self) -> &'static str {
        "presence"
    }

    fn parameters(&self) -> Option<Value> {
        Some(serde_json::json!({
            "message": self.message,
            "allow_empty": self.allow_empty,
        }))
    }

    fn is_required(&self) -> bool {
        true
    }
}
