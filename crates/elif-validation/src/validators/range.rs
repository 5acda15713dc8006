//! Inclusion / exclusion validator

use crate::error::{ConfigError, ValidationMessage, ValidationOutcome};
use crate::traits::{AttributeLookup, Validator};
use crate::validators::{is_empty, template};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Validator that checks a value against a list of allowed and/or
/// forbidden values. Values are compared structurally.
#[derive(Debug, Clone)]
pub struct RangeValidator {
    pub in_range: Option<Vec<Value>>,
    pub except_range: Option<Vec<Value>>,
    /// Message overrides keyed by failure code (`in_range`, `except_range`)
    pub messages: BTreeMap<String, String>,
}

impl RangeValidator {
    pub const MESSAGE_IN_RANGE: &'static str = "{attribute} - must be in range";
    pub const MESSAGE_EXCEPT_RANGE: &'static str = "{attribute} - must not be in range";

    /// Create a validator from optional allowed and forbidden lists; at least
    /// one of them must be given
    pub fn new(
        in_range: Option<Vec<Value>>,
        except_range: Option<Vec<Value>>,
    ) -> Result<Self, ConfigError> {
        if in_range.is_none() && except_range.is_none() {
            return Err(ConfigError::EmptyRange);
        }

        Ok(Self {
            in_range,
            except_range,
            messages: BTreeMap::new(),
        })
    }

    /// Only accept one of `values`
    pub fn within<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            in_range: Some(values.into_iter().map(Into::into).collect()),
            except_range: None,
            messages: BTreeMap::new(),
        }
    }

    /// Reject any of `values`
    pub fn except<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            in_range: None,
            except_range: Some(values.into_iter().map(Into::into).collect()),
            messages: BTreeMap::new(),
        }
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
impl Validator for RangeValidator {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        _model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        if is_empty(value) {
            return Ok(None);
        }

        if let Some(ref allowed) = self.in_range {
            if !allowed.contains(value) {
                return Err(self.fail("in_range", Self::MESSAGE_IN_RANGE, attribute));
            }
        }

        if let Some(ref forbidden) = self.except_range {
            if forbidden.contains(value) {
                return Err(self.fail("except_range", Self::MESSAGE_EXCEPT_RANGE, attribute));
            }
        }

        Ok(None)
    }

    fn rule_name(&self) -> &'static str {
        "range"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "in_range": self.in_range,
            "except_range": self.except_range,
            "messages": self.messages,
        }))
    }
}
