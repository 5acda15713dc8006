//! Form wrapper around a model
//!
//! A [`Form`] adds what an editing UI needs on top of a [`Model`]: free-form
//! UI state, dirty tracking, and validation limited to the attributes the
//! user has touched.

use crate::error::RuleResult;
use crate::events::StateMutation;
use crate::model::Model;
use crate::state::ValidationStatus;
use crate::stream::{EventStream, Subscription};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

struct FormInner {
    state: RwLock<Map<String, Value>>,
    initial_state: Map<String, Value>,
    dirty: Mutex<Vec<String>>,
    state_mutations: EventStream<StateMutation>,
}

/// A model plus form state. Clones share the same state; the wrapped model
/// is reachable through `Deref`.
#[derive(Clone)]
pub struct Form {
    model: Model,
    inner: Arc<FormInner>,
}

impl Form {
    pub fn new(model: Model) -> Self {
        Self::with_state(model, Map::new())
    }

    pub fn with_state(model: Model, initial_state: Map<String, Value>) -> Self {
        Self {
            model,
            inner: Arc::new(FormInner {
                state: RwLock::new(initial_state.clone()),
                initial_state,
                dirty: Mutex::new(Vec::new()),
                state_mutations: EventStream::new(),
            }),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    // UI state

    pub fn get_state_value(&self, name: &str) -> Value {
        self.inner.state.read().get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn get_state(&self) -> Map<String, Value> {
        self.inner.state.read().clone()
    }

    pub fn set_state_value(&self, name: impl Into<String>, value: Value) {
        self.set_state(StateMutation::single(name, value).values);
    }

    /// Merge `values` into the form state. Only entries that actually change
    /// are published.
    pub fn set_state(&self, values: Map<String, Value>) {
        let mut changed = Map::new();
        {
            let mut state = self.inner.state.write();
            for (name, value) in values {
                if state.get(&name) != Some(&value) {
                    state.insert(name.clone(), value.clone());
                    changed.insert(name, value);
                }
            }
        }

        if !changed.is_empty() {
            self.inner.state_mutations.publish(StateMutation::new(changed));
        }
    }

    /// State changes touching any of `names`, or all changes when empty
    pub fn subscribe_state<I, S>(&self, names: I) -> Subscription<StateMutation>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.inner.state_mutations.subscribe_filtered(move |mutation| {
            names.is_empty() || names.iter().any(|name| mutation.contains(name))
        })
    }

    pub fn is_form_changed(&self) -> bool {
        *self.inner.state.read() != self.inner.initial_state
    }

    // Dirty tracking

    pub fn mark_as_dirty(&self, attribute: impl Into<String>) {
        let attribute = attribute.into();
        let mut dirty = self.inner.dirty.lock();
        if !dirty.contains(&attribute) {
            dirty.push(attribute);
        }
    }

    /// Attributes marked dirty, in marking order
    pub fn dirty_attributes(&self) -> Vec<String> {
        self.inner.dirty.lock().clone()
    }

    /// Changed since construction or explicitly marked dirty
    pub fn is_attribute_dirty(&self, attribute: &str) -> bool {
        self.model.is_attribute_changed(attribute)
            || self.inner.dirty.lock().iter().any(|a| a == attribute)
    }

    pub fn is_form_dirty(&self) -> bool {
        !self.inner.dirty.lock().is_empty() || self.model.is_model_changed()
    }

    pub fn is_form_valid(&self) -> bool {
        self.model.is_model_valid()
    }

    // Writes

    /// Safe write that marks the attribute dirty when applied
    pub fn set_attribute(&self, attribute: &str, value: Value) -> RuleResult<bool> {
        let applied = self.model.set(attribute, value)?;
        if applied {
            self.mark_as_dirty(attribute);
        }
        Ok(applied)
    }

    pub async fn set_attribute_and_validate(&self, attribute: &str, value: Value) -> RuleResult<bool> {
        if !self.set_attribute(attribute, value)? {
            return Ok(false);
        }
        self.model.validate(&[attribute]).await
    }

    /// Safe writes in order. Returns whether all were applied.
    pub fn set_attributes<I, K>(&self, values: I) -> RuleResult<bool>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut applied = true;
        for (attribute, value) in values {
            applied &= self.set_attribute(attribute.as_ref(), value)?;
        }
        Ok(applied)
    }

    /// Apply the writes, then validate the attributes that were written
    pub async fn set_attributes_and_validate<I, K>(&self, values: I) -> RuleResult<bool>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut written = Vec::new();
        let mut applied = true;
        for (attribute, value) in values {
            let attribute = attribute.as_ref();
            if self.set_attribute(attribute, value)? {
                written.push(attribute.to_string());
            } else {
                applied = false;
            }
        }

        let paths: Vec<&str> = written.iter().map(String::as_str).collect();
        let valid = paths.is_empty() || self.model.validate(&paths).await?;
        Ok(applied && valid)
    }

    // Validation

    /// Validate `attributes` and mark them dirty. When empty, every attribute
    /// with a rule is marked dirty and the whole model is validated.
    pub async fn validate(&self, attributes: &[&str]) -> RuleResult<bool> {
        if attributes.is_empty() {
            let table = self.model.get_validators()?;
            for path in table.expand(&self.model.attribute_store()) {
                self.mark_as_dirty(path.to_string());
            }
        } else {
            for attribute in attributes {
                self.mark_as_dirty(*attribute);
            }
        }
        self.model.validate(attributes).await
    }

    /// Validate `attributes`, keeping only the dirty ones when `only_dirty`
    pub async fn validate_attributes(&self, attributes: &[&str], only_dirty: bool) -> RuleResult<bool> {
        let selected: Vec<&str> = attributes
            .iter()
            .copied()
            .filter(|attribute| !only_dirty || self.is_attribute_dirty(attribute))
            .collect();

        if selected.is_empty() {
            return Ok(true);
        }
        self.model.validate(&selected).await
    }

    pub async fn validate_dirty_attributes(&self) -> RuleResult<bool> {
        let dirty = self.dirty_attributes();
        if dirty.is_empty() {
            return Ok(true);
        }
        let paths: Vec<&str> = dirty.iter().map(String::as_str).collect();
        self.model.validate(&paths).await
    }

    /// Re-run validation for dirty attributes left `Unvalidated` by a rule
    /// change. Returns whether they are all valid afterwards.
    pub async fn revalidate_unvalidated(&self) -> RuleResult<bool> {
        let stale: Vec<String> = self
            .dirty_attributes()
            .into_iter()
            .filter(|attribute| {
                self.model.get_validation_state(attribute).status() == ValidationStatus::Unvalidated
            })
            .collect();

        if stale.is_empty() {
            return Ok(true);
        }
        debug!("Revalidating {} attributes", stale.len());
        let paths: Vec<&str> = stale.iter().map(String::as_str).collect();
        self.model.validate(&paths).await
    }
}

impl Deref for Form {
    type Target = Model;

    fn deref(&self) -> &Self::Target {
        &self.model
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("model", &self.model)
            .field("state", &*self.inner.state.read())
            .field("dirty", &*self.inner.dirty.lock())
            .finish()
    }
}
