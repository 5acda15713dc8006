//! Date validator

use crate::error::{ConfigError, ValidationMessage, ValidationOutcome};
use crate::traits::{AttributeLookup, Validator};
use crate::validators::template;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC)
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| Utc.from_utc_datetime(&datetime))
}

/// Validator for date values with optional bounds (both inclusive)
#[derive(Debug, Clone, Default)]
pub struct DateValidator {
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
    /// Message overrides keyed by failure code (`not_date`, `min_date`, `max_date`)
    pub messages: BTreeMap<String, String>,
}

impl DateValidator {
    pub const MESSAGE_NOT_DATE: &'static str = "{attribute} - must be a date";
    pub const MESSAGE_MIN_DATE: &'static str = "{attribute} - must be later than {date}";
    pub const MESSAGE_MAX_DATE: &'static str = "{attribute} - must be earlier than {date}";

    /// Create a date validator without bounds
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_date(mut self, min: DateTime<Utc>) -> Self {
        self.min_date = Some(min);
        self
    }

    pub fn max_date(mut self, max: DateTime<Utc>) -> Self {
        self.max_date = Some(max);
        self
    }

    /// Create a date validator accepting `min..=max`
    pub fn between(min: DateTime<Utc>, max: DateTime<Utc>) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidDateBounds {
                min: min.to_rfc3339(),
                max: max.to_rfc3339(),
            });
        }
        Ok(Self::new().min_date(min).max_date(max))
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
impl Validator for DateValidator {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        _model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        if value.is_null() {
            return Ok(None);
        }

        let date = match value.as_str().and_then(parse_date) {
            Some(date) => date,
            None => return Err(self.fail("not_date", Self::MESSAGE_NOT_DATE, attribute)),
        };

        if let Some(min) = self.min_date {
            if date < min {
                return Err(self
                    .fail("min_date", Self::MESSAGE_MIN_DATE, attribute)
                    .bind("date", min.to_rfc3339()));
            }
        }

        if let Some(max) = self.max_date {
            if date > max {
                return Err(self
                    .fail("max_date", Self::MESSAGE_MAX_DATE, attribute)
                    .bind("date", max.to_rfc3339()));
            }
        }

        Ok(None)
    }

    fn rule_name(&self) -> &'static str {
        "date"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "min_date": self.min_date.map(|date| date.to_rfc3339()),
            "max_date": self.max_date.map(|date| date.to_rfc3339()),
            "messages": self.messages,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    async fn check(validator: &DateValidator, value: Value) -> ValidationOutcome {
        validator.validate(&value, "birthday", &Value::Null).await
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(parse_date("2024-02-29"), Some(day(2024, 2, 29)));
        assert_eq!(parse_date("2024-02-29T00:00:00Z"), Some(day(2024, 2, 29)));
        assert_eq!(parse_date("2024-02-29T02:00:00+02:00"), Some(day(2024, 2, 29)));
        assert!(parse_date("2023-02-29").is_none());
        assert!(parse_date("yesterday").is_none());
    }

    #[tokio::test]
    async fn test_not_a_date() {
        let validator = DateValidator::new();
        assert_eq!(check(&validator, json!("nope")).await.unwrap_err().code, "not_date");
        assert_eq!(check(&validator, json!(20240101)).await.unwrap_err().code, "not_date");
        assert!(check(&validator, Value::Null).await.is_ok());
    }

    #[tokio::test]
    async fn test_bounds_are_inclusive() {
        let validator = DateValidator::between(day(2020, 1, 1), day(2020, 12, 31)).unwrap();
        assert!(check(&validator, json!("2020-01-01")).await.is_ok());
        assert!(check(&validator, json!("2020-12-31")).await.is_ok());

        let early = check(&validator, json!("2019-12-31")).await.unwrap_err();
        assert_eq!(early.code, "min_date");
        assert_eq!(
            early.to_string(),
            "birthday - must be later than 2020-01-01T00:00:00+00:00"
        );

        let late = check(&validator, json!("2021-01-01")).await.unwrap_err();
        assert_eq!(late.code, "max_date");
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let result = DateValidator::between(day(2021, 1, 1), day(2020, 1, 1));
        assert!(matches!(result, Err(ConfigError::InvalidDateBounds { .. })));
    }
}
