//! Events published by models and forms, and the filters used to subscribe

use crate::path::{AttributePath, Segment};
use crate::state::{ValidationState, ValidationStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A leaf write into the attribute store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMutation {
    pub attribute: String,
    pub value: Value,
}

impl AttributeMutation {
    pub fn new(attribute: impl Into<String>, value: Value) -> Self {
        Self {
            attribute: attribute.into(),
            value,
        }
    }
}

/// A change of form UI state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMutation {
    pub values: Map<String, Value>,
}

impl StateMutation {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn single(name: impl Into<String>, value: Value) -> Self {
        let mut values = Map::new();
        values.insert(name.into(), value);
        Self { values }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

/// An attribute criterion: exact path, or any element when written with `[]`
#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMatcher {
    path: AttributePath,
    wildcard: bool,
}

impl AttributeMatcher {
    fn new(attribute: &str) -> Self {
        let path = AttributePath::parse(attribute);
        let wildcard = path.segments().iter().any(|s| matches!(s, Segment::Wildcard));
        Self { path, wildcard }
    }

    fn matches(&self, attribute: &str) -> bool {
        let candidate = AttributePath::parse(attribute);
        if self.wildcard {
            candidate.normalized() == self.path
        } else {
            candidate == self.path
        }
    }
}

fn any_attribute(matchers: &[AttributeMatcher], attribute: &str) -> bool {
    matchers.is_empty() || matchers.iter().any(|m| m.matches(attribute))
}

/// Selects validation states by attribute and by status.
///
/// Criteria of one kind are alternatives; the attribute and status criteria
/// must both hold. An empty filter accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationFilter {
    attributes: Vec<AttributeMatcher>,
    statuses: Vec<ValidationStatus>,
}

impl ValidationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only states of these attributes
    pub fn when<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.attributes
            .extend(attributes.into_iter().map(|a| AttributeMatcher::new(a.as_ref())));
        self
    }

    pub fn when_status(mut self, status: ValidationStatus) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    pub fn when_success(self) -> Self {
        self.when_status(ValidationStatus::Success)
    }

    pub fn when_warning(self) -> Self {
        self.when_status(ValidationStatus::Warning)
    }

    pub fn when_error(self) -> Self {
        self.when_status(ValidationStatus::Error)
    }

    pub fn when_pending(self) -> Self {
        self.when_status(ValidationStatus::Pending)
    }

    pub fn when_pristine(self) -> Self {
        self.when_status(ValidationStatus::Pristine)
    }

    pub fn when_unvalidated(self) -> Self {
        self.when_status(ValidationStatus::Unvalidated)
    }

    /// Success or warning
    pub fn when_valid(self) -> Self {
        self.when_success().when_warning()
    }

    pub fn matches(&self, state: &ValidationState) -> bool {
        any_attribute(&self.attributes, &state.attribute)
            && (self.statuses.is_empty() || self.statuses.contains(&state.status()))
    }
}

/// Selects attribute mutations by attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationFilter {
    attributes: Vec<AttributeMatcher>,
}

impl MutationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.attributes
            .extend(attributes.into_iter().map(|a| AttributeMatcher::new(a.as_ref())));
        self
    }

    pub fn matches(&self, mutation: &AttributeMutation) -> bool {
        any_attribute(&self.attributes, &mutation.attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CancelHandle;
    use serde_json::json;

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = ValidationFilter::new();
        assert!(filter.matches(&ValidationState::success("a")));
        assert!(filter.matches(&ValidationState::pristine("b")));
    }

    #[test]
    fn test_attribute_and_status_are_combined() {
        let filter = ValidationFilter::new().when(["email", "name"]).when_error();

        assert!(filter.matches(&ValidationState::error("email", "bad".into())));
        assert!(!filter.matches(&ValidationState::success("email")));
        assert!(!filter.matches(&ValidationState::error("phone", "bad".into())));
    }

    #[test]
    fn test_when_valid() {
        let filter = ValidationFilter::new().when_valid();
        assert!(filter.matches(&ValidationState::success("a")));
        assert!(filter.matches(&ValidationState::warning("a", "hm".into())));
        assert!(!filter.matches(&ValidationState::pending("a", "...", CancelHandle::new())));
        assert!(!filter.matches(&ValidationState::unvalidated("a")));
    }

    #[test]
    fn test_wildcard_attribute() {
        let filter = ValidationFilter::new().when(["items[].name"]);
        assert!(filter.matches(&ValidationState::success("items[3].name")));
        assert!(!filter.matches(&ValidationState::success("items[3].price")));

        let exact = ValidationFilter::new().when(["items[1].name"]);
        assert!(!exact.matches(&ValidationState::success("items[3].name")));
    }

    #[test]
    fn test_mutation_filter() {
        let filter = MutationFilter::new().when(["name"]);
        assert!(filter.matches(&AttributeMutation::new("name", json!("Ann"))));
        assert!(!filter.matches(&AttributeMutation::new("email", json!("a@b.co"))));
        assert!(MutationFilter::new().matches(&AttributeMutation::new("x", json!(1))));
    }

    #[test]
    fn test_state_mutation() {
        let mutation = StateMutation::single("submitting", json!(true));
        assert!(mutation.contains("submitting"));
        assert!(!mutation.contains("other"));
    }
}
