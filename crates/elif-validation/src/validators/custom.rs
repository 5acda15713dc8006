//! Validators backed by user supplied functions

use crate::error::ValidationOutcome;
use crate::traits::{AttributeLookup, Validator};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// Asynchronous validation function
pub type AsyncValidationFn = Arc<
    dyn for<'a> Fn(&'a Value, &'a str, &'a dyn AttributeLookup) -> BoxFuture<'a, ValidationOutcome>
        + Send
        + Sync,
>;

/// Synchronous validation function
pub type SyncValidationFn =
    Arc<dyn Fn(&Value, &str, &dyn AttributeLookup) -> ValidationOutcome + Send + Sync>;

#[derive(Clone)]
enum CustomFn {
    Async(AsyncValidationFn),
    Sync(SyncValidationFn),
}

impl CustomFn {
    /// Address of the shared function, stable across clones
    fn identity(&self) -> usize {
        match self {
            CustomFn::Async(func) => Arc::as_ptr(func) as *const () as usize,
            CustomFn::Sync(func) => Arc::as_ptr(func) as *const () as usize,
        }
    }
}

/// Custom validator that delegates to a function.
///
/// Two custom validators are structurally equal when they share a name and
/// the same function instance (clones of one validator). A freshly built
/// closure never equals an earlier one, even when it captures the same
/// values. Use [`CustomValidator::keyed_by_name`] when the name alone fully
/// determines what the function checks.
#[derive(Clone)]
pub struct CustomValidator {
    /// Name/identifier for this custom validator
    pub name: String,
    func: CustomFn,
    keyed_by_name: bool,
}

impl CustomValidator {
    /// Create a custom validator from an asynchronous function
    ///
    /// ```ignore
    /// CustomValidator::new("unique_login", |value, _attribute, _model| {
    ///     Box::pin(async move { lookup(value).await })
    /// })
    /// ```
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: for<'a> Fn(&'a Value, &'a str, &'a dyn AttributeLookup) -> BoxFuture<'a, ValidationOutcome>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: CustomFn::Async(Arc::new(func)),
            keyed_by_name: false,
        }
    }

    /// Create a custom validator from a synchronous function
    pub fn sync<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value, &str, &dyn AttributeLookup) -> ValidationOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: CustomFn::Sync(Arc::new(func)),
            keyed_by_name: false,
        }
    }

    /// Compare by name only, so rebuilt instances keep their cached results.
    /// Only sound when the function captures nothing that varies between
    /// rebuilds.
    pub fn keyed_by_name(mut self) -> Self {
        self.keyed_by_name = true;
        self
    }

    /// Get the validator name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomValidator")
            .field("name", &self.name)
            .field("is_async", &matches!(self.func, CustomFn::Async(_)))
            .finish()
    }
}

#[async_trait]
impl Validator for CustomValidator {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        match self.func {
            CustomFn::Async(ref func) => func(value, attribute, model).await,
            CustomFn::Sync(ref func) => func(value, attribute, model),
        }
    }

    fn rule_name(&self) -> &'static str {
        "custom"
    }

    fn parameters(&self) -> Option<Value> {
        if self.keyed_by_name {
            Some(serde_json::json!({ "name": self.name }))
        } else {
            Some(serde_json::json!({ "name": self.name, "function": self.func.identity() }))
        }
    }
}
