//! String validator: type, length and pattern constraints

use crate::error::{ConfigError, ValidationMessage, ValidationOutcome};
use crate::traits::{AttributeLookup, Validator};
use crate::validators::template;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Validator for string values
#[derive(Debug, Clone, Default)]
pub struct StringValidator {
    /// Minimum length in characters (inclusive)
    pub min_length: Option<usize>,
    /// Maximum length in characters (inclusive)
    pub max_length: Option<usize>,
    /// Pattern that must be found somewhere in the value
    pattern: Option<Regex>,
    /// Message overrides keyed by failure code
    pub messages: BTreeMap<String, String>,
}

impl StringValidator {
    pub const MESSAGE_NOT_STRING: &'static str = "{attribute} - must be a string";
    pub const MESSAGE_MIN_LENGTH: &'static str =
        "{attribute} - is too short (minimum is {count} characters)";
    pub const MESSAGE_MAX_LENGTH: &'static str =
        "{attribute} - is too long (maximum is {count} characters)";
    pub const MESSAGE_PATTERN: &'static str = "{attribute} - is invalid";

    /// Create a new string validator with no constraints
    pub fn new() -> Self {
        Self::default()
    }

    /// Set minimum length constraint
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Set maximum length constraint
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Require the value to contain a match of `pattern`
    pub fn pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Case-insensitive variant of [`StringValidator::pattern`]
    pub fn pattern_case_insensitive(self, pattern: &str) -> Result<Self, ConfigError> {
        self.pattern(&format!("(?i){}", pattern))
    }

    /// Use an already compiled pattern
    pub fn regex(mut self, regex: Regex) -> Self {
        self.pattern = Some(regex);
        self
    }

    /// Override the message template for a failure code
    /// (`not_string`, `too_short`, `too_long`, `pattern`)
    pub fn message(mut self, code: impl Into<String>, template: impl Into<String>) -> Self {
        self.messages.insert(code.into(), template.into());
        self
    }

    /// Get the pattern string
    pub fn pattern_string(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    fn fail(&self, code: &str, default: &str, attribute: &str) -> ValidationMessage {
        ValidationMessage::for_attribute(code, template(&self.messages, code, default), attribute)
    }
}

#[async_trait]
impl Validator for StringValidator {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        _model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        let text = match value {
            Value::Null => return Ok(None),
            Value::String(text) => text,
            _ => return Err(self.fail("not_string", Self::MESSAGE_NOT_STRING, attribute)),
        };

        // Unicode-aware length
        let length = text.chars().count();

        if let Some(min) = self.min_length {
            if length < min {
                return Err(self
                    .fail("too_short", Self::MESSAGE_MIN_LENGTH, attribute)
                    .bind("count", min));
            }
        }

        if let Some(max) = self.max_length {
            if length > max {
                return Err(self
                    .fail("too_long", Self::MESSAGE_MAX_LENGTH, attribute)
                    .bind("count", max));
            }
        }

        if let Some(ref pattern) = self.pattern {
            if !pattern.is_match(text) {
                return Err(self.fail("pattern", Self::MESSAGE_PATTERN, attribute));
            }
        }

        Ok(None)
    }

    fn rule_name(&self) -> &'static str {
        "string"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "min_length": self.min_length,
            "max_length": self.max_length,
            "pattern": self.pattern_string(),
            "messages": self.messages,
        }))
    }
}
