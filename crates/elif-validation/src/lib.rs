//! # elif-validation
//!
//! Asynchronous attribute validators for elif models.
//!
//! A [`Validator`] checks one value and resolves to a success, a warning or an
//! error [`ValidationMessage`]. Validators compare structurally (rule name plus
//! declared parameters) so that a model can reuse a previous result while
//! neither the value nor the validator changed.

pub mod cache;
pub mod error;
pub mod traits;
pub mod validators;

// Re-exports for easy access
pub use cache::{validators_equal, Throttle, Uncached, ValidatorExt};
pub use error::{ConfigError, ValidationMessage, ValidationOutcome};
pub use traits::{AttributeLookup, SharedValidator, Validator};

// Built-in validators
pub use validators::{
    multi::MultiMode, ArrayValidator, CompareOperator, CompareValidator, CustomValidator,
    DateValidator, EmailValidator, MultiValidator, NumberValidator, ObjectValidator,
    PresenceValidator, RangeValidator, SafeValidator, StringValidator, UnsafeValidator,
    UrlValidator,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_shared_validators_compose() {
        let validator = MultiValidator::all(vec![
            PresenceValidator::new().shared(),
            StringValidator::new().max_length(5).shared(),
        ])
        .shared();

        assert!(validator.validate(&json!("short"), "name", &Value::Null).await.is_ok());
        assert!(validator.validate(&json!("too long"), "name", &Value::Null).await.is_err());
        assert!(validator.is_required());
    }
}
