//! Email format validator

use crate::error::{ValidationMessage, ValidationOutcome};
use crate::traits::{AttributeLookup, Validator};
use crate::validators::is_empty;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const EMAIL_PATTERN: &str = r"(?i)^[a-z0-9\x{7F}-\x{FFFF}!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9\x{7F}-\x{FFFF}!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}$";

fn email_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

/// Validator for email address format
#[derive(Debug, Clone, Default)]
pub struct EmailValidator {
    /// Custom message template
    pub message: Option<String>,
}

impl EmailValidator {
    pub const MESSAGE: &'static str = "{attribute} - is not a valid email";

    /// Create a new email validator with the default message
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom message template
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Validate email format
    fn is_valid_email(&self, email: &str) -> bool {
        // Local part length limit from RFC 5321
        match email.split_once('@') {
            Some((local, _)) if local.len() <= 64 => {}
            _ => return false,
        }

        email_regex().is_some_and(|regex| regex.is_match(email))
    }
}

#[async_trait]
impl Validator for EmailValidator {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        _model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        if is_empty(value) {
            return Ok(None);
        }

        let valid = value.as_str().is_some_and(|email| self.is_valid_email(email));

        if !valid {
            let template = self.message.as_deref().unwrap_or(Self::MESSAGE);
            return Err(ValidationMessage::for_attribute("email", template, attribute));
        }

        Ok(None)
    }

    fn rule_name(&self) -> &'static str {
        "email"
    }

    fn parameters(&self) -> Option<Value> {
        self.message
            .as_ref()
            .map(|message| serde_json::json!({ "message": message }))
    }
}
