//! Comparison validator against a fixed value or another attribute

use crate::error::{ConfigError, ValidationMessage, ValidationOutcome};
use crate::traits::{AttributeLookup, Validator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;

/// Comparison applied between the validated value and the reference value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOperator {
    #[default]
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOperator {
    fn default_message(self) -> &'static str {
        match self {
            Self::Eq => "{attribute} - must equals \"{value}\" value",
            Self::Ne => "{attribute} - must not equal \"{value}\"",
            Self::Gt => "{attribute} - must be greater than \"{value}\"",
            Self::Gte => "{attribute} - must be greater than or equal to \"{value}\"",
            Self::Lt => "{attribute} - must be less than \"{value}\"",
            Self::Lte => "{attribute} - must be less than or equal to \"{value}\"",
        }
    }

    /// Numbers compare numerically, strings lexically; anything else only
    /// supports (in)equality
    fn holds(self, left: &Value, right: &Value) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            _ => match ordering(left, right) {
                Some(order) => match self {
                    Self::Gt => order == Ordering::Greater,
                    Self::Gte => order != Ordering::Less,
                    Self::Lt => order == Ordering::Less,
                    _ => order != Ordering::Greater,
                },
                None => false,
            },
        }
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Validator comparing a value with a constant or with a sibling attribute
#[derive(Debug, Clone)]
pub struct CompareValidator {
    pub compare_attribute: Option<String>,
    pub compare_value: Option<Value>,
    pub operator: CompareOperator,
    /// Custom message template
    pub message: Option<String>,
}

impl CompareValidator {
    /// Create a validator from an optional attribute path and an optional
    /// constant; the attribute wins when both are given
    pub fn new(
        compare_attribute: Option<String>,
        compare_value: Option<Value>,
    ) -> Result<Self, ConfigError> {
        if compare_attribute.is_none() && compare_value.is_none() {
            return Err(ConfigError::MissingComparison);
        }

        Ok(Self {
            compare_attribute,
            compare_value,
            operator: CompareOperator::default(),
            message: None,
        })
    }

    /// Compare with the attribute stored at `path`
    pub fn with_attribute(path: impl Into<String>) -> Self {
        Self {
            compare_attribute: Some(path.into()),
            compare_value: None,
            operator: CompareOperator::default(),
            message: None,
        }
    }

    /// Compare with a constant
    pub fn with_value(value: impl Into<Value>) -> Self {
        Self {
            compare_attribute: None,
            compare_value: Some(value.into()),
            operator: CompareOperator::default(),
            message: None,
        }
    }

    pub fn operator(mut self, operator: CompareOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn reference(&self, model: &dyn AttributeLookup) -> Value {
        match self.compare_attribute {
            Some(ref path) => model.attribute(path),
            None => self.compare_value.clone().unwrap_or(Value::Null),
        }
    }
}

#[async_trait]
impl Validator for CompareValidator {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        if value.is_null() {
            return Ok(None);
        }

        let reference = self.reference(model);

        if !self.operator.holds(value, &reference) {
            let template = self
                .message
                .as_deref()
                .unwrap_or(self.operator.default_message());
            return Err(ValidationMessage::for_attribute("compare", template, attribute)
                .bind("value", reference));
        }

        Ok(None)
    }

    fn rule_name(&self) -> &'static str {
        "compare"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "compare_attribute": self.compare_attribute,
            "compare_value": self.compare_value,
            "operator": self.operator,
            "message": self.message,
        }))
    }
}
