//! Per-attribute validation tracking
//!
//! The tracker owns the validation state of every attribute, the last
//! validated `(value, validator)` pair per attribute, and the cancel handle
//! of the job in flight per attribute.
//!
//! Per attribute the published states form chains: either a single cached
//! terminal state, or an optional `Pending` followed by exactly one terminal
//! state. A job superseded by a newer one for the same attribute never
//! publishes nor caches anything.

use crate::state::{CancelHandle, StateKind, ValidationState};
use crate::stream::{EventStream, Subscription};
use elif_validation::{validators_equal, AttributeLookup, SharedValidator};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, trace};

struct CacheEntry {
    value: Value,
    validator: SharedValidator,
    state: ValidationState,
}

#[derive(Default)]
struct TrackerState {
    states: HashMap<String, ValidationState>,
    cache: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, CancelHandle>,
}

pub struct ValidationTracker {
    inner: Mutex<TrackerState>,
    stream: EventStream<ValidationState>,
    pending_message: String,
}

impl ValidationTracker {
    pub fn new(pending_message: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(TrackerState::default()),
            stream: EventStream::new(),
            pending_message: pending_message.into(),
        }
    }

    /// Current state, `Pristine` when never validated
    pub fn state(&self, attribute: &str) -> ValidationState {
        self.inner
            .lock()
            .states
            .get(attribute)
            .cloned()
            .unwrap_or_else(|| ValidationState::pristine(attribute))
    }

    /// Every recorded state
    pub fn states(&self) -> Vec<ValidationState> {
        self.inner.lock().states.values().cloned().collect()
    }

    pub fn subscribe_filtered<F>(&self, accepts: F) -> Subscription<ValidationState>
    where
        F: Fn(&ValidationState) -> bool + Send + Sync + 'static,
    {
        self.stream.subscribe_filtered(accepts)
    }

    fn publish(&self, state: ValidationState) {
        trace!("Validation state {}", state);
        self.stream.publish(state);
    }

    /// Validate `value` of `attribute` with `validator`.
    ///
    /// Resolves to the state reached: the cached terminal state when neither
    /// the value nor the validator changed since the last settled run, the
    /// new terminal state otherwise, or the job's `Pending` state when a
    /// newer validation of the same attribute superseded it.
    pub async fn validate_attribute(
        &self,
        attribute: &str,
        value: Value,
        validator: SharedValidator,
        model: &dyn AttributeLookup,
    ) -> ValidationState {
        let cancel = CancelHandle::new();

        {
            let mut inner = self.inner.lock();

            let cached = inner.cache.get(attribute).and_then(|entry| {
                let unchanged = entry.value == value
                    && validators_equal(entry.validator.as_ref(), validator.as_ref());
                unchanged.then(|| entry.state.clone())
            });

            if let Some(previous) = inner.in_flight.remove(attribute) {
                previous.cancel();
            }

            if let Some(state) = cached {
                debug!("Validation cache hit for {}", attribute);
                inner.states.insert(attribute.to_string(), state.clone());
                drop(inner);
                self.publish(state.clone());
                return state;
            }

            inner.in_flight.insert(attribute.to_string(), cancel.clone());
        }

        let pending =
            ValidationState::pending(attribute, self.pending_message.as_str(), cancel.clone());

        let outcome = {
            let job = validator.validate(&value, attribute, model);
            tokio::pin!(job);

            tokio::select! {
                biased;
                outcome = &mut job => outcome,
                _ = tokio::task::yield_now() => {
                    self.mark_pending(attribute, &pending, &cancel);
                    job.await
                }
            }
        };

        let state = ValidationState::from_outcome(attribute, outcome);

        {
            let mut inner = self.inner.lock();
            if cancel.is_canceled() {
                trace!("Dropping superseded validation of {}", attribute);
                return pending;
            }

            if inner
                .in_flight
                .get(attribute)
                .is_some_and(|current| current.same_job(&cancel))
            {
                inner.in_flight.remove(attribute);
            }

            inner.cache.insert(
                attribute.to_string(),
                CacheEntry {
                    value,
                    validator,
                    state: state.clone(),
                },
            );
            inner.states.insert(attribute.to_string(), state.clone());
        }

        self.publish(state.clone());
        state
    }

    /// Record a job as pending. A state already pending belongs to a
    /// superseded job; it is replaced silently so that no two `Pending`
    /// states are published back to back.
    fn mark_pending(&self, attribute: &str, pending: &ValidationState, cancel: &CancelHandle) {
        let publish = {
            let mut inner = self.inner.lock();
            if cancel.is_canceled() {
                return;
            }
            let previous = inner.states.insert(attribute.to_string(), pending.clone());
            !previous.is_some_and(|state| state.is_pending())
        };

        if publish {
            self.publish(pending.clone());
        }
    }

    /// Mark every validated attribute `Unvalidated`, dropping jobs in flight.
    /// Cached results stay; an unchanged validator will reuse them.
    pub fn invalidate(&self) {
        let changed: Vec<ValidationState> = {
            let mut inner = self.inner.lock();

            for (_, cancel) in inner.in_flight.drain() {
                cancel.cancel();
            }

            inner
                .states
                .iter_mut()
                .filter(|(_, state)| !matches!(state.kind, StateKind::Pristine))
                .map(|(attribute, state)| {
                    *state = ValidationState::unvalidated(attribute.as_str());
                    state.clone()
                })
                .collect()
        };

        debug!("Invalidated {} validation states", changed.len());
        for state in changed {
            self.publish(state);
        }
    }
}

impl std::fmt::Debug for ValidationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ValidationTracker")
            .field("states", &inner.states.len())
            .field("cached", &inner.cache.len())
            .field("in_flight", &inner.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ValidationStatus;
    use async_trait::async_trait;
    use elif_validation::{PresenceValidator, ValidationOutcome, Validator, ValidatorExt};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Counts runs; waits for a notification before settling when gated
    struct Counting {
        runs: Arc<AtomicUsize>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl Validator for Counting {
        async fn validate(
            &self,
            value: &Value,
            attribute: &str,
            _: &dyn AttributeLookup,
        ) -> ValidationOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if let Some(ref gate) = self.gate {
                gate.notified().await;
            }
            if value.is_null() {
                Err(format!("{attribute} missing").into())
            } else {
                Ok(None)
            }
        }

        fn rule_name(&self) -> &'static str {
            "counting"
        }
    }

    fn counting(runs: &Arc<AtomicUsize>) -> SharedValidator {
        Arc::new(Counting {
            runs: runs.clone(),
            gate: None,
        })
    }

    fn statuses(subscription: &mut Subscription<ValidationState>) -> Vec<ValidationStatus> {
        subscription.drain().iter().map(ValidationState::status).collect()
    }

    #[tokio::test]
    async fn test_synchronous_validator_never_publishes_pending() {
        let tracker = ValidationTracker::new("Verification");
        let mut events = tracker.subscribe_filtered(|_| true);

        let state = tracker
            .validate_attribute("name", json!(""), PresenceValidator::new().shared(), &Value::Null)
            .await;

        assert_eq!(state.status(), ValidationStatus::Error);
        assert_eq!(statuses(&mut events), vec![ValidationStatus::Error]);
        assert_eq!(tracker.state("name").status(), ValidationStatus::Error);
    }

    #[tokio::test]
    async fn test_cache_hit_reuses_state() {
        let tracker = ValidationTracker::new("Verification");
        let runs = Arc::new(AtomicUsize::new(0));

        let first = tracker.validate_attribute("a", json!(1), counting(&runs), &Value::Null).await;
        let second = tracker.validate_attribute("a", json!(1), counting(&runs), &Value::Null).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(first.status(), second.status());

        tracker.validate_attribute("a", json!(2), counting(&runs), &Value::Null).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_uncached_validator_always_runs() {
        let tracker = ValidationTracker::new("Verification");
        let runs = Arc::new(AtomicUsize::new(0));
        let validator = || {
            Counting {
                runs: runs.clone(),
                gate: None,
            }
            .uncached()
            .shared()
        };

        tracker.validate_attribute("a", json!(1), validator(), &Value::Null).await;
        tracker.validate_attribute("a", json!(1), validator(), &Value::Null).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_validator_publishes_pending_then_terminal() {
        let tracker = Arc::new(ValidationTracker::new("Verification"));
        let mut events = tracker.subscribe_filtered(|_| true);
        let gate = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let validator: SharedValidator = Arc::new(Counting {
            runs: runs.clone(),
            gate: Some(gate.clone()),
        });

        let job = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                tracker.validate_attribute("a", json!(1), validator, &Value::Null).await
            })
        };

        while !tracker.state("a").is_pending() {
            tokio::task::yield_now().await;
        }
        assert_eq!(tracker.state("a").to_string(), "a: Verification");

        gate.notify_one();
        let state = job.await.unwrap();

        assert_eq!(state.status(), ValidationStatus::Success);
        assert_eq!(
            statuses(&mut events),
            vec![ValidationStatus::Pending, ValidationStatus::Success]
        );
    }

    #[tokio::test]
    async fn test_superseded_job_is_dropped() {
        let tracker = Arc::new(ValidationTracker::new("Verification"));
        let mut events = tracker.subscribe_filtered(|_| true);
        let gate = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let slow: SharedValidator = Arc::new(Counting {
            runs: runs.clone(),
            gate: Some(gate.clone()),
        });

        let first = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                tracker.validate_attribute("a", Value::Null, slow, &Value::Null).await
            })
        };

        while !tracker.state("a").is_pending() {
            tokio::task::yield_now().await;
        }

        let second = tracker
            .validate_attribute("a", json!("fresh"), counting(&runs), &Value::Null)
            .await;
        assert_eq!(second.status(), ValidationStatus::Success);

        gate.notify_one();
        let first = first.await.unwrap();
        assert!(first.is_pending());

        assert_eq!(tracker.state("a").status(), ValidationStatus::Success);
        assert_eq!(
            statuses(&mut events),
            vec![ValidationStatus::Pending, ValidationStatus::Success]
        );

        // The superseded run never reached the cache
        tracker.validate_attribute("a", json!("fresh"), counting(&runs), &Value::Null).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_marks_validated_attributes() {
        let tracker = ValidationTracker::new("Verification");
        let runs = Arc::new(AtomicUsize::new(0));
        tracker.validate_attribute("a", json!(1), counting(&runs), &Value::Null).await;

        let mut events = tracker.subscribe_filtered(|_| true);
        tracker.invalidate();

        assert_eq!(tracker.state("a").status(), ValidationStatus::Unvalidated);
        assert_eq!(tracker.state("b").status(), ValidationStatus::Pristine);
        assert_eq!(statuses(&mut events), vec![ValidationStatus::Unvalidated]);

        // Same value and validator: the cached result comes back
        let state = tracker.validate_attribute("a", json!(1), counting(&runs), &Value::Null).await;
        assert_eq!(state.status(), ValidationStatus::Success);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
