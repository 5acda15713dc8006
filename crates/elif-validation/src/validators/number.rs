//! Numeric value validator

use crate::error::{ValidationMessage, ValidationOutcome};
use crate::traits::{AttributeLookup, Validator};
use crate::validators::{is_empty, template};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn integer_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^(0|[1-9]\d*)$").ok()).as_ref()
}

fn decimal_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^(0|[1-9]\d*)(\.\d+)?$").ok()).as_ref()
}

/// Validator for numeric constraints.
///
/// Numeric strings are coerced; with `strict` they must also look like a
/// plain decimal number (`12`, `0.5`, no signs, no leading zeros).
#[derive(Debug, Clone, Default)]
pub struct NumberValidator {
    pub strict: bool,
    pub only_integer: bool,
    pub greater_than: Option<f64>,
    pub greater_than_or_equal_to: Option<f64>,
    pub equal_to: Option<f64>,
    pub less_than: Option<f64>,
    pub less_than_or_equal_to: Option<f64>,
    pub divisible_by: Option<f64>,
    pub odd: bool,
    pub even: bool,
    /// Message overrides keyed by failure code
    pub messages: BTreeMap<String, String>,
}

impl NumberValidator {
    pub const MESSAGE_NOT_NUMBER: &'static str = "{attribute} - must be a valid number";
    pub const MESSAGE_ONLY_INTEGER: &'static str = "{attribute} - must be an integer";
    pub const MESSAGE_GREATER_THAN: &'static str = "{attribute} - must be greater than {count}";
    pub const MESSAGE_GREATER_THAN_OR_EQUAL_TO: &'static str =
        "{attribute} - must be greater than or equal to {count}";
    pub const MESSAGE_EQUAL_TO: &'static str = "{attribute} - must be equal to {count}";
    pub const MESSAGE_LESS_THAN: &'static str = "{attribute} - must be less than {count}";
    pub const MESSAGE_LESS_THAN_OR_EQUAL_TO: &'static str =
        "{attribute} - must be less than or equal to {count}";
    pub const MESSAGE_DIVISIBLE_BY: &'static str = "{attribute} - must be divisible by {count}";
    pub const MESSAGE_NOT_ODD: &'static str = "{attribute} - must be odd";
    pub const MESSAGE_NOT_EVEN: &'static str = "{attribute} - must be even";

    /// Create a new numeric validator with no constraints
    pub fn new() -> Self {
        Self::default()
    }

    /// Require numeric strings to be well-formed
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Require integer values only
    pub fn only_integer(mut self, only_integer: bool) -> Self {
        self.only_integer = only_integer;
        self
    }

    pub fn greater_than(mut self, bound: f64) -> Self {
        self.greater_than = Some(bound);
        self
    }

    pub fn greater_than_or_equal_to(mut self, bound: f64) -> Self {
        self.greater_than_or_equal_to = Some(bound);
        self
    }

    pub fn equal_to(mut self, bound: f64) -> Self {
        self.equal_to = Some(bound);
        self
    }

    pub fn less_than(mut self, bound: f64) -> Self {
        self.less_than = Some(bound);
        self
    }

    pub fn less_than_or_equal_to(mut self, bound: f64) -> Self {
        self.less_than_or_equal_to = Some(bound);
        self
    }

    pub fn divisible_by(mut self, divisor: f64) -> Self {
        self.divisible_by = Some(divisor);
        self
    }

    pub fn odd(mut self, odd: bool) -> Self {
        self.odd = odd;
        if odd {
            self.even = false;
        }
        self
    }

    pub fn even(mut self, even: bool) -> Self {
        self.even = even;
        if even {
            self.odd = false;
        }
        self
    }

    /// Override the message template for a failure code
    /// (`not_number`, `not_integer`, `greater_than`, `odd`, ...)
    pub fn message(mut self, code: impl Into<String>, template: impl Into<String>) -> Self {
        self.messages.insert(code.into(), template.into());
        self
    }

    fn is_well_formed(&self, text: &str) -> bool {
        let regex = if self.only_integer {
            integer_regex()
        } else {
            decimal_regex()
        };
        regex.is_some_and(|re| re.is_match(text))
    }

    fn fail(&self, code: &str, default: &str, attribute: &str) -> ValidationMessage {
        ValidationMessage::for_attribute(code, template(&self.messages, code, default), attribute)
    }

    fn fail_bound(&self, code: &str, default: &str, attribute: &str, bound: f64) -> ValidationMessage {
        self.fail(code, default, attribute).bind("count", json!(bound))
    }
}

#[async_trait]
impl Validator for NumberValidator {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        _model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        if is_empty(value) {
            return Ok(None);
        }

        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                if self.strict && !self.is_well_formed(s) {
                    return Err(self.fail("not_number", Self::MESSAGE_NOT_NUMBER, attribute));
                }
                s.trim().parse::<f64>().ok()
            }
            _ => None,
        };

        let number = match number {
            Some(n) if n.is_finite() => n,
            _ => return Err(self.fail("not_number", Self::MESSAGE_NOT_NUMBER, attribute)),
        };

        if self.only_integer && number.fract() != 0.0 {
            return Err(self.fail("not_integer", Self::MESSAGE_ONLY_INTEGER, attribute));
        }

        if let Some(bound) = self.greater_than {
            if number <= bound {
                return Err(self.fail_bound("greater_than", Self::MESSAGE_GREATER_THAN, attribute, bound));
            }
        }

        if let Some(bound) = self.greater_than_or_equal_to {
            if number < bound {
                return Err(self.fail_bound(
                    "greater_than_or_equal_to",
                    Self::MESSAGE_GREATER_THAN_OR_EQUAL_TO,
                    attribute,
                    bound,
                ));
            }
        }

        if let Some(bound) = self.equal_to {
            if number != bound {
                return Err(self.fail_bound("equal_to", Self::MESSAGE_EQUAL_TO, attribute, bound));
            }
        }

        if let Some(bound) = self.less_than {
            if number >= bound {
                return Err(self.fail_bound("less_than", Self::MESSAGE_LESS_THAN, attribute, bound));
            }
        }

        if let Some(bound) = self.less_than_or_equal_to {
            if number > bound {
                return Err(self.fail_bound(
                    "less_than_or_equal_to",
                    Self::MESSAGE_LESS_THAN_OR_EQUAL_TO,
                    attribute,
                    bound,
                ));
            }
        }

        if let Some(divisor) = self.divisible_by {
            if divisor != 0.0 && number % divisor != 0.0 {
                return Err(self.fail_bound("divisible_by", Self::MESSAGE_DIVISIBLE_BY, attribute, divisor));
            }
        }

        if self.odd && number.rem_euclid(2.0) != 1.0 {
            return Err(self.fail("odd", Self::MESSAGE_NOT_ODD, attribute));
        }

        if self.even && number.rem_euclid(2.0) != 0.0 {
            return Err(self.fail("even", Self::MESSAGE_NOT_EVEN, attribute));
        }

        Ok(None)
    }

    fn rule_name(&self) -> &'static str {
        "number"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "strict": self.strict,
            "only_integer": self.only_integer,
            "greater_than": self.greater_than,
            "greater_than_or_equal_to": self.greater_than_or_equal_to,
            "equal_to": self.equal_to,
            "less_than": self.less_than,
            "less_than_or_equal_to": self.less_than_or_equal_to,
            "divisible_by": self.divisible_by,
            "odd": self.odd,
            "even": self.even,
            "messages": self.messages,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn passes(validator: &NumberValidator, value: Value) -> bool {
        validator.validate(&value, "test", &Value::Null).await.is_ok()
    }

    #[tokio::test]
    async fn test_greater_than() {
        let validator = NumberValidator::new().greater_than(0.0);
        assert!(!passes(&validator, json!(0)).await);
        assert!(!passes(&validator, json!(-1)).await);
        assert!(passes(&validator, json!(1)).await);
    }

    #[tokio::test]
    async fn test_greater_than_or_equal() {
        let validator = NumberValidator::new().greater_than_or_equal_to(0.0);
        assert!(passes(&validator, json!(0)).await);
        assert!(!passes(&validator, json!(-1)).await);
        assert!(passes(&validator, json!(1)).await);
    }

    #[tokio::test]
    async fn test_less_than() {
        let validator = NumberValidator::new().less_than(0.0);
        assert!(!passes(&validator, json!(0)).await);
        assert!(passes(&validator, json!(-1)).await);
        assert!(!passes(&validator, json!(1)).await);
    }

    #[tokio::test]
    async fn test_less_than_or_equal() {
        let validator = NumberValidator::new().less_than_or_equal_to(0.0);
        assert!(passes(&validator, json!(0)).await);
        assert!(passes(&validator, json!(-1)).await);
        assert!(!passes(&validator, json!(1)).await);
    }

    #[tokio::test]
    async fn test_equal_to() {
        let validator = NumberValidator::new().equal_to(0.0);
        assert!(passes(&validator, json!(0)).await);
        assert!(!passes(&validator, json!(-1)).await);
        assert!(!passes(&validator, json!(1)).await);
    }

    #[tokio::test]
    async fn test_divisible_by() {
        let validator = NumberValidator::new().divisible_by(3.0);
        assert!(passes(&validator, json!(9)).await);
        assert!(!passes(&validator, json!(10)).await);
    }

    #[tokio::test]
    async fn test_odd_and_even() {
        let odd = NumberValidator::new().odd(true);
        assert!(passes(&odd, json!(3)).await);
        assert!(passes(&odd, json!(-3)).await);
        assert!(!passes(&odd, json!(4)).await);

        let even = NumberValidator::new().even(true);
        assert!(passes(&even, json!(4)).await);
        assert!(!passes(&even, json!(3)).await);
    }

    #[tokio::test]
    async fn test_only_integer() {
        let validator = NumberValidator::new().only_integer(true);
        assert!(passes(&validator, json!(10)).await);
        assert!(!passes(&validator, json!(10.5)).await);
    }

    #[tokio::test]
    async fn test_string_coercion_and_strict() {
        let loose = NumberValidator::new();
        assert!(passes(&loose, json!("12.5")).await);
        assert!(!passes(&loose, json!("abc")).await);

        let strict = NumberValidator::new().strict(true);
        assert!(passes(&strict, json!("12.5")).await);
        assert!(!passes(&strict, json!("012")).await);
        assert!(!passes(&strict, json!("-1")).await);

        let strict_integer = NumberValidator::new().strict(true).only_integer(true);
        for _ in 0..3 {
            assert!(passes(&strict_integer, json!("40")).await);
            assert!(!passes(&strict_integer, json!("4.0")).await);
        }
        assert!(passes(&strict, json!("4.0")).await);
    }

    #[tokio::test]
    async fn test_empty_values_pass() {
        let validator = NumberValidator::new().greater_than(10.0);
        assert!(passes(&validator, Value::Null).await);
        assert!(passes(&validator, json!("")).await);
    }

    #[tokio::test]
    async fn test_non_numeric_types_fail() {
        let validator = NumberValidator::new();
        assert!(!passes(&validator, json!(true)).await);
        assert!(!passes(&validator, json!({"a": 1})).await);
    }

    #[tokio::test]
    async fn test_message_override() {
        let validator = NumberValidator::new()
            .less_than(5.0)
            .message("less_than", "{attribute} is too big, keep it under {count}");
        let error = validator.validate(&json!(7), "age", &Value::Null).await.unwrap_err();
        assert_eq!(error.code, "less_than");
        assert_eq!(error.to_string(), "age is too big, keep it under 5.0");
    }
}
