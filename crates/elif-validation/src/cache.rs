//! Structural validator comparison and cache controls
//!
//! A validation result can be reused while the validated value and the
//! validator stay the same. Validators are compared structurally: same rule
//! name, same declared parameters. A validator can opt out of reuse with
//! [`ValidatorExt::uncached`], optionally limited to one forced revalidation
//! per time window with [`ValidatorExt::uncached_for`].

use crate::error::ValidationOutcome;
use crate::traits::{AttributeLookup, SharedValidator, Validator};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reports "changed" at most once per window.
#[derive(Debug)]
pub struct Throttle {
    window: Duration,
    opened_at: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            opened_at: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// `true` while the current window is open. The first call after a window
    /// has elapsed returns `false` and opens a new one.
    pub fn is_open(&self) -> bool {
        let mut opened_at = self.opened_at.lock();
        match *opened_at {
            Some(at) if at.elapsed() < self.window => true,
            _ => {
                *opened_at = Some(Instant::now());
                false
            }
        }
    }
}

/// Structural equality of two validators.
///
/// Validators of different kinds or with different parameters are never
/// equal. Equal validators stay equal unless one of them is uncached: then
/// they compare unequal, or, when a throttle window is attached, unequal only
/// once per window.
pub fn validators_equal(a: &dyn Validator, b: &dyn Validator) -> bool {
    if a.rule_name() != b.rule_name() || a.parameters() != b.parameters() {
        return false;
    }

    if a.is_cached() && b.is_cached() {
        return true;
    }

    match a.throttle().or_else(|| b.throttle()) {
        Some(throttle) => throttle.is_open(),
        None => false,
    }
}

/// Wrapper that disables result reuse for the inner validator
pub struct Uncached<V> {
    inner: V,
    throttle: Option<Throttle>,
}

impl<V: Validator> Uncached<V> {
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            throttle: None,
        }
    }

    pub fn with_window(inner: V, window: Duration) -> Self {
        Self {
            inner,
            throttle: Some(Throttle::new(window)),
        }
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }
}

#[async_trait]
impl<V: Validator> Validator for Uncached<V> {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        self.inner.validate(value, attribute, model).await
    }

    fn rule_name(&self) -> &'static str {
        self.inner.rule_name()
    }

    fn parameters(&self) -> Option<Value> {
        self.inner.parameters()
    }

    fn is_safe(&self) -> bool {
        self.inner.is_safe()
    }

    fn is_required(&self) -> bool {
        self.inner.is_required()
    }

    fn is_cached(&self) -> bool {
        false
    }

    fn throttle(&self) -> Option<&Throttle> {
        self.throttle.as_ref()
    }
}

/// Convenience combinators available on every validator
pub trait ValidatorExt: Validator + Sized + 'static {
    /// Never reuse results of this validator
    fn uncached(self) -> Uncached<Self> {
        Uncached::new(self)
    }

    /// Reuse results, but force a revalidation once per `window`
    fn uncached_for(self, window: Duration) -> Uncached<Self> {
        Uncached::with_window(self, window)
    }

    /// Type-erase into a shared validator
    fn shared(self) -> SharedValidator {
        Arc::new(self)
    }
}

impl<V: Validator + Sized + 'static> ValidatorExt for V {}
