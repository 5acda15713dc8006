//! Core validation traits

use crate::error::ValidationOutcome;
use crate::cache::Throttle;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Read access to the attributes of the model being validated.
///
/// Validators such as `CompareValidator` look at sibling attributes through
/// this trait, so they stay independent of how the model stores its data.
pub trait AttributeLookup: Send + Sync {
    /// Value at `path`, or `Value::Null` when nothing is stored there
    fn attribute(&self, path: &str) -> Value;
}

/// Dotted/bracketed lookup straight into a JSON document.
impl AttributeLookup for Value {
    fn attribute(&self, path: &str) -> Value {
        let mut current = self;
        for segment in path.split(['.', '[']) {
            let segment = segment.trim_end_matches(']');
            if segment.is_empty() {
                continue;
            }
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Value::Null,
            }
        }
        current.clone()
    }
}

/// The validator capability every rule implements
#[async_trait]
pub trait Validator: Send + Sync {
    /// Validate `value` stored at `attribute`
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        model: &dyn AttributeLookup,
    ) -> ValidationOutcome;

    /// Rule name; validators of different kinds never compare equal
    fn rule_name(&self) -> &'static str;

    /// Declared configuration of this validator. Together with `rule_name`
    /// this is the structural key used for cache comparisons.
    fn parameters(&self) -> Option<Value> {
        None
    }

    /// Whether the attribute guarded by this validator may be written
    /// through a safe (mass) assignment
    fn is_safe(&self) -> bool {
        true
    }

    /// Whether this validator requires a value to be present
    fn is_required(&self) -> bool {
        false
    }

    /// Whether results produced by this validator may be reused
    fn is_cached(&self) -> bool {
        true
    }

    /// Window that limits how often an uncached validator reports a change
    fn throttle(&self) -> Option<&Throttle> {
        None
    }
}

#[async_trait]
impl<V: Validator + ?Sized> Validator for Arc<V> {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        (**self).validate(value, attribute, model).await
    }

    fn rule_name(&self) -> &'static str {
        (**self).rule_name()
    }

    fn parameters(&self) -> Option<Value> {
        (**self).parameters()
    }

    fn is_safe(&self) -> bool {
        (**self).is_safe()
    }

    fn is_required(&self) -> bool {
        (**self).is_required()
    }

    fn is_cached(&self) -> bool {
        (**self).is_cached()
    }

    fn throttle(&self) -> Option<&Throttle> {
        (**self).throttle()
    }
}

/// Shared, type-erased validator
pub type SharedValidator = Arc<dyn Validator>;
