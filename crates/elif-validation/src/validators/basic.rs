//! Trivial validators that always succeed

use crate::error::ValidationOutcome;
use crate::traits::{AttributeLookup, Validator};
use async_trait::async_trait;
use serde_json::Value;

/// Always succeeds. Used for attributes without an explicit rule and to
/// mark an attribute as writable through safe assignment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeValidator;

#[async_trait]
impl Validator for SafeValidator {
    async fn validate(&self, _: &Value, _: &str, _: &dyn AttributeLookup) -> ValidationOutcome {
        Ok(None)
    }

    fn rule_name(&self) -> &'static str {
        "safe"
    }
}

/// Always succeeds but forbids safe assignment of the attribute it guards
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsafeValidator;

#[async_trait]
impl Validator for UnsafeValidator {
    async fn validate(&self, _: &Value, _: &str, _: &dyn AttributeLookup) -> ValidationOutcome {
        Ok(None)
    }

    fn rule_name(&self) -> &'static str {
        "unsafe"
    }

    fn is_safe(&self) -> bool {
        false
    }
}
