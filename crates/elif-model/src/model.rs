//! Reactive data model
//!
//! A [`Model`] owns a persistent attribute store, the rules its schema
//! declares for the active scenarios, and the validation state of every
//! attribute. Writes and validation results are published as events.

use crate::config::ModelConfig;
use crate::error::RuleResult;
use crate::events::{AttributeMutation, MutationFilter, ValidationFilter};
use crate::path::AttributePath;
use crate::rules::{normalize, RuleContext, RuleSet, RuleTable};
use crate::session::{InvalidationTriggers, Session, SessionScope};
use crate::state::ValidationState;
use crate::store::AttributeStore;
use crate::stream::{EventStream, Subscription};
use crate::tracker::ValidationTracker;
use elif_validation::{SafeValidator, SharedValidator, ValidationMessage};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Declares the rules and lifecycle hooks of a model type
pub trait ModelSchema: Send + Sync + 'static {
    /// Rules for the given scenarios, context and attributes. Validator
    /// constructors that reject their configuration propagate here with `?`.
    fn rules(&self, context: &RuleContext<'_>) -> RuleResult<RuleSet>;

    /// Attributes reachable in each scenario. A scenario without an entry
    /// restricts nothing; when no active scenario has one, every rule applies.
    fn scenarios(&self) -> HashMap<String, Vec<String>> {
        HashMap::new()
    }

    /// Attributes whose writes make the current rules stale
    fn invalidate_when(&self) -> InvalidationTriggers {
        InvalidationTriggers::None
    }

    /// Called at the start of every session. Tasks spawned on `scope` that
    /// hold a clone of `model` keep it alive until [`Model::close`].
    fn prepare(&self, _model: &Model, _scope: &mut SessionScope) {}

    /// Applied to the initial data before it is stored
    fn prepare_source_data(&self, data: Value) -> Value {
        data
    }

    /// Applied to the attributes returned by [`Model::get_attributes`]
    fn prepare_result_data(&self, data: Value) -> Value {
        data
    }
}

/// Builder for [`Model`]
pub struct ModelBuilder {
    schema: Box<dyn ModelSchema>,
    data: Value,
    scenarios: Option<Vec<String>>,
    context: Value,
    config: ModelConfig,
}

impl ModelBuilder {
    pub fn new<S: ModelSchema>(schema: S) -> Self {
        Self {
            schema: Box::new(schema),
            data: Value::Object(Map::new()),
            scenarios: None,
            context: Value::Object(Map::new()),
            config: ModelConfig::default(),
        }
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn scenario(self, scenario: impl Into<String>) -> Self {
        self.scenarios([scenario])
    }

    pub fn scenarios<I, S>(mut self, scenarios: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scenarios = Some(dedup(scenarios.into_iter().map(Into::into)));
        self
    }

    pub fn context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the model and start its first session
    pub fn build(self) -> Model {
        let data = self.schema.prepare_source_data(self.data);
        let attributes = AttributeStore::new(data);
        let scenarios = self
            .scenarios
            .unwrap_or_else(|| vec![self.config.get_default_scenario().clone()]);

        let model = Model {
            inner: Arc::new(ModelInner {
                tracker: ValidationTracker::new(self.config.get_pending_message().clone()),
                schema: self.schema,
                config: self.config,
                initial: attributes.clone(),
                attributes: RwLock::new(attributes),
                scenarios: RwLock::new(scenarios),
                context: RwLock::new(self.context),
                validators: RwLock::new(None),
                generation: AtomicU64::new(0),
                mutations: EventStream::new(),
                session: Mutex::new(None),
                sessions: AtomicU64::new(0),
            }),
        };

        model.start_session();
        model
    }
}

fn dedup(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut unique = Vec::new();
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    unique
}

struct ModelInner {
    schema: Box<dyn ModelSchema>,
    config: ModelConfig,
    initial: AttributeStore,
    attributes: RwLock<AttributeStore>,
    scenarios: RwLock<Vec<String>>,
    context: RwLock<Value>,
    validators: RwLock<Option<Arc<RuleTable>>>,
    /// Bumped whenever the memoized rules are dropped
    generation: AtomicU64,
    tracker: ValidationTracker,
    mutations: EventStream<AttributeMutation>,
    session: Mutex<Option<Session>>,
    sessions: AtomicU64,
}

/// A reactive data model. Clones share the same state.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    pub fn builder<S: ModelSchema>(schema: S) -> ModelBuilder {
        ModelBuilder::new(schema)
    }

    /// Model over `data` in the default scenario
    pub fn new<S: ModelSchema>(schema: S, data: Value) -> Self {
        ModelBuilder::new(schema).data(data).build()
    }

    pub fn config(&self) -> &ModelConfig {
        &self.inner.config
    }

    pub fn schema(&self) -> &dyn ModelSchema {
        self.inner.schema.as_ref()
    }

    // Sessions

    fn start_session(&self) {
        let id = self.inner.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        let mut scope = SessionScope::new();
        self.inner.schema.prepare(self, &mut scope);

        let triggers = self.inner.schema.invalidate_when().resolve(&self.get_scenarios());
        let previous = self
            .inner
            .session
            .lock()
            .replace(Session::new(id, scope, triggers));
        // Only reachable if `prepare` itself restarted the session
        drop(previous);
    }

    fn end_session(&self) {
        let session = self.inner.session.lock().take();
        drop(session);
    }

    fn restart_session(&self) {
        self.end_session();
        self.start_session();
        self.invalidate_validators();
    }

    /// End the current session, releasing everything it holds.
    /// The next scenario or context change starts a new one.
    pub fn close(&self) {
        self.end_session();
    }

    // Scenarios and context

    pub fn get_scenarios(&self) -> Vec<String> {
        self.inner.scenarios.read().clone()
    }

    pub fn is_scenario(&self, scenario: &str) -> bool {
        self.inner.scenarios.read().iter().any(|s| s == scenario)
    }

    pub fn add_scenario(&self, scenario: impl Into<String>) {
        let scenario = scenario.into();
        {
            let mut scenarios = self.inner.scenarios.write();
            if scenarios.contains(&scenario) {
                return;
            }
            scenarios.push(scenario.clone());
        }
        debug!("Scenario {} added", scenario);
        self.restart_session();
    }

    pub fn remove_scenario(&self, scenario: &str) {
        {
            let mut scenarios = self.inner.scenarios.write();
            let before = scenarios.len();
            scenarios.retain(|s| s != scenario);
            if scenarios.len() == before {
                return;
            }
        }
        debug!("Scenario {} removed", scenario);
        self.restart_session();
    }

    pub fn set_scenarios<I, S>(&self, scenarios: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scenarios = dedup(scenarios.into_iter().map(Into::into));
        {
            let mut current = self.inner.scenarios.write();
            if *current == scenarios {
                return;
            }
            *current = scenarios;
        }
        debug!("Scenarios set to {:?}", self.get_scenarios());
        self.restart_session();
    }

    pub fn get_context(&self) -> Value {
        self.inner.context.read().clone()
    }

    pub fn set_context(&self, context: Value) {
        *self.inner.context.write() = context;
        self.restart_session();
    }

    /// Attributes reachable in the active scenarios, empty when unrestricted
    fn accessible_attributes(&self, scenarios: &[String]) -> Vec<AttributePath> {
        let declared = self.inner.schema.scenarios();
        let mut accessible: Vec<AttributePath> = Vec::new();
        for attribute in scenarios.iter().filter_map(|s| declared.get(s)).flatten() {
            let path = AttributePath::parse(attribute);
            if !accessible.contains(&path) {
                accessible.push(path);
            }
        }
        accessible
    }

    // Rules

    /// Rules for the current scenarios, context and attributes.
    /// Memoized until invalidated.
    pub fn get_validators(&self) -> RuleResult<Arc<RuleTable>> {
        if let Some(table) = self.inner.validators.read().as_ref() {
            return Ok(table.clone());
        }

        let generation = self.inner.generation.load(Ordering::Acquire);
        let scenarios = self.get_scenarios();
        let context = self.get_context();
        let attributes = self.attribute_store();

        let rule_context = RuleContext::new(&scenarios, &context, &attributes);
        let rules = self.inner.schema.rules(&rule_context)?;
        let table = Arc::new(normalize(
            rules,
            &rule_context,
            &self.accessible_attributes(&scenarios),
            *self.inner.config.get_max_rule_depth(),
        )?);

        let mut memo = self.inner.validators.write();
        // Rules invalidated while normalizing are not memoized
        if self.inner.generation.load(Ordering::Acquire) == generation {
            *memo = Some(table.clone());
        }
        Ok(table)
    }

    /// Drop the memoized rules and mark every validated attribute
    /// `Unvalidated`
    pub fn invalidate_validators(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        *self.inner.validators.write() = None;
        self.inner.tracker.invalidate();
        debug!("Validators invalidated");
    }

    // Attributes

    /// Snapshot of the attribute store
    pub fn attribute_store(&self) -> AttributeStore {
        self.inner.attributes.read().clone()
    }

    pub fn get(&self, path: &str) -> Value {
        self.inner.attributes.read().value(&AttributePath::parse(path))
    }

    pub fn get_initial_attribute(&self, path: &str) -> Value {
        self.inner.initial.value(&AttributePath::parse(path))
    }

    /// All attributes, passed through the schema's result hook
    pub fn get_attributes(&self) -> Value {
        let data = self.inner.attributes.read().to_value();
        self.inner.schema.prepare_result_data(data)
    }

    /// Safe write: rejected unless the attribute is safe under the current
    /// rules. Returns whether the write was applied.
    pub fn set(&self, path: &str, value: Value) -> RuleResult<bool> {
        self.write([(path, value)], true)
    }

    /// Write regardless of safety
    pub fn set_unchecked(&self, path: &str, value: Value) -> RuleResult<bool> {
        self.write([(path, value)], false)
    }

    /// Safe writes applied in order. Returns whether all were applied.
    pub fn set_attributes<I, K>(&self, values: I) -> RuleResult<bool>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        self.write(values, true)
    }

    pub fn set_attributes_unchecked<I, K>(&self, values: I) -> RuleResult<bool>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        self.write(values, false)
    }

    fn write<I, K>(&self, values: I, safe: bool) -> RuleResult<bool>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let table = self.get_validators()?;
        let mut mutations = Vec::new();
        let mut accepted = true;

        {
            let mut attributes = self.inner.attributes.write();
            for (path, value) in values {
                let path = AttributePath::parse(path.as_ref());
                // Each entry lands on a scratch snapshot and is committed whole
                let mut staged = attributes.clone();
                let mut changes = Vec::new();
                if assign(&table, &mut staged, &path, value, safe, &mut changes) {
                    *attributes = staged;
                    mutations.append(&mut changes);
                } else {
                    accepted = false;
                }
            }
        }

        let stale = {
            let session = self.inner.session.lock();
            session.as_ref().is_some_and(|session| {
                mutations
                    .iter()
                    .any(|m| session.is_trigger(&AttributePath::parse(&m.attribute)))
            })
        };

        for mutation in mutations {
            trace!("Attribute {} set to {}", mutation.attribute, mutation.value);
            self.inner.mutations.publish(mutation);
        }

        if stale {
            self.invalidate_validators();
        }
        Ok(accepted)
    }

    // Validation

    /// Validate `paths`, or every attribute covered by the rules when empty.
    ///
    /// An explicit path with nested rules also validates the attributes
    /// below it; a path without any rule validates against
    /// [`SafeValidator`]. Resolves to whether every resulting state is
    /// valid.
    pub async fn validate(&self, paths: &[&str]) -> RuleResult<bool> {
        let table = self.get_validators()?;
        let attributes = self.attribute_store();

        let mut targets: Vec<AttributePath> = Vec::new();
        if paths.is_empty() {
            targets = table.expand(&attributes);
        } else {
            for path in paths.iter().map(|p| AttributePath::parse(p)) {
                let nested = table.expand_from(&path, &attributes);
                if nested.is_empty() {
                    targets.push(path);
                } else {
                    targets.extend(nested);
                }
            }
        }

        let mut jobs = Vec::with_capacity(targets.len());
        for path in dedup_paths(targets) {
            let validator: SharedValidator = match table.get(&path) {
                Some(validator) => validator.clone(),
                None => Arc::new(SafeValidator),
            };
            let value = attributes.value(&path);
            let tracker = &self.inner.tracker;
            let model = &attributes;
            jobs.push(async move {
                let attribute = path.to_string();
                tracker.validate_attribute(&attribute, value, validator, model).await
            });
        }

        let states = join_all(jobs).await;
        debug!("Validated {} attributes", states.len());
        Ok(states.iter().all(ValidationState::is_valid))
    }

    pub async fn validate_all(&self) -> RuleResult<bool> {
        self.validate(&[]).await
    }

    // Queries

    pub fn get_validation_state(&self, path: &str) -> ValidationState {
        self.inner.tracker.state(path)
    }

    pub fn get_attribute_state(&self, path: &str) -> ValidationState {
        self.get_validation_state(path)
    }

    pub fn get_validation_error(&self, path: &str) -> Option<ValidationMessage> {
        self.get_validation_state(path).error_message().cloned()
    }

    pub fn get_validation_warning(&self, path: &str) -> Option<ValidationMessage> {
        self.get_validation_state(path).warning_message().cloned()
    }

    /// Error or warning message of `path`
    pub fn get_validation_message(&self, path: &str) -> Option<ValidationMessage> {
        self.get_validation_state(path).message().cloned()
    }

    /// Error states ordered by rule declaration, then by path
    pub fn get_validation_errors(&self) -> RuleResult<Vec<ValidationState>> {
        let table = self.get_validators()?;
        let mut errors: Vec<(usize, AttributePath, ValidationState)> = self
            .inner
            .tracker
            .states()
            .into_iter()
            .filter(ValidationState::is_error)
            .map(|state| {
                let path = AttributePath::parse(&state.attribute);
                (table.position(&path).unwrap_or(usize::MAX), path, state)
            })
            .collect();
        errors.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        Ok(errors.into_iter().map(|(_, _, state)| state).collect())
    }

    pub fn get_first_error(&self) -> RuleResult<Option<ValidationState>> {
        Ok(self.get_validation_errors()?.into_iter().next())
    }

    pub fn has_errors(&self) -> bool {
        self.inner.tracker.states().iter().any(ValidationState::is_error)
    }

    pub fn is_model_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn is_model_changed(&self) -> bool {
        *self.inner.attributes.read() != self.inner.initial
    }

    pub fn is_attribute_changed(&self, path: &str) -> bool {
        self.get(path) != self.get_initial_attribute(path)
    }

    /// Whether `path` itself accepts safe writes. A value that would replace
    /// unsafe nested attributes is still rejected by [`Model::set`].
    pub fn is_attribute_safe(&self, path: &str) -> RuleResult<bool> {
        let table = self.get_validators()?;
        Ok(is_safe(&table, &AttributePath::parse(path)))
    }

    pub fn is_attribute_required(&self, path: &str) -> RuleResult<bool> {
        let table = self.get_validators()?;
        Ok(table
            .get(&AttributePath::parse(path))
            .is_some_and(|validator| validator.is_required()))
    }

    // Events

    pub fn subscribe_validation(&self, filter: ValidationFilter) -> Subscription<ValidationState> {
        self.inner
            .tracker
            .subscribe_filtered(move |state| filter.matches(state))
    }

    pub fn subscribe_mutations(&self, filter: MutationFilter) -> Subscription<AttributeMutation> {
        self.inner
            .mutations
            .subscribe_filtered(move |mutation| filter.matches(mutation))
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("scenarios", &*self.inner.scenarios.read())
            .field("attributes", self.inner.attributes.read().as_value())
            .finish()
    }
}

fn dedup_paths(paths: Vec<AttributePath>) -> Vec<AttributePath> {
    let mut unique: Vec<AttributePath> = Vec::with_capacity(paths.len());
    for path in paths {
        if !unique.contains(&path) {
            unique.push(path);
        }
    }
    unique
}

/// An attribute is safe when its own rule says so, or when it has no rule
/// but rules exist below it
fn is_safe(table: &RuleTable, path: &AttributePath) -> bool {
    match table.get(path) {
        Some(validator) => validator.is_safe(),
        None => table.has_nested(path),
    }
}

/// Write `value` at `path`. Arrays and objects are expanded into their
/// elements only where rules address those elements; everything else is
/// stored as a single leaf. Returns false as soon as any part is rejected,
/// leaving `attributes` partially written; callers stage on a copy.
fn assign(
    table: &RuleTable,
    attributes: &mut AttributeStore,
    path: &AttributePath,
    value: Value,
    safe: bool,
    mutations: &mut Vec<AttributeMutation>,
) -> bool {
    if safe && !is_safe(table, path) {
        warn!("Rejected unsafe write to {}", path);
        return false;
    }

    let expands = match &value {
        Value::Object(map) => !map.is_empty() && table.has_key_rule(path),
        _ => false,
    };
    // Replacing a subtree would discard attributes only unsafe writes may touch
    if safe && !expands && table.has_unsafe_nested(path) {
        warn!("Rejected write to {} over unsafe nested attributes", path);
        return false;
    }

    match value {
        Value::Array(items) if !items.is_empty() && table.has_element_rule(path) => {
            attributes.set(path, Value::Array(Vec::new()));
            let mut accepted = true;
            for (index, item) in items.into_iter().enumerate() {
                accepted &= assign(table, attributes, &path.index(index), item, safe, mutations);
            }
            accepted
        }
        Value::Object(map) if expands => {
            if !attributes.get(path).is_some_and(Value::is_object) {
                attributes.set(path, Value::Object(Map::new()));
            }
            let mut accepted = true;
            for (key, item) in map {
                accepted &= assign(table, attributes, &path.key(key), item, safe, mutations);
            }
            accepted
        }
        value => {
            if !attributes.set(path, value.clone()) {
                return false;
            }
            mutations.push(AttributeMutation::new(path.to_string(), value));
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;
    use crate::scenario::Scenario;
    use crate::state::ValidationStatus;
    use crate::error::RuleError;
    use elif_validation::{
        ConfigError, PresenceValidator, RangeValidator, StringValidator, UnsafeValidator,
        UrlValidator,
    };
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct Profile;

    impl ModelSchema for Profile {
        fn rules(&self, _context: &RuleContext<'_>) -> RuleResult<RuleSet> {
            Ok(RuleSet::new()
                .validator("name", PresenceValidator::new())
                .validator("site", UrlValidator::new())
                .validator("role", UnsafeValidator)
                .validator("tags[].label", StringValidator::new().max_length(8))
                .validator("meta.title", PresenceValidator::new()))
        }
    }

    fn profile() -> Model {
        Model::new(Profile, json!({"name": "", "site": "", "role": "user"}))
    }

    #[test]
    fn test_default_scenario() {
        let model = profile();
        assert_eq!(model.get_scenarios(), vec!["default"]);
        assert!(model.is_scenario("default"));
    }

    #[test]
    fn test_safe_write_rules() {
        let model = profile();

        assert!(model.set("name", json!("Ann")).unwrap());
        assert!(!model.set("role", json!("admin")).unwrap());
        assert!(!model.set("unknown", json!(1)).unwrap());
        assert_eq!(model.get("role"), json!("user"));
        assert_eq!(model.get("unknown"), Value::Null);

        assert!(model.set_unchecked("role", json!("admin")).unwrap());
        assert_eq!(model.get("role"), json!("admin"));
    }

    #[test]
    fn test_nested_expansion() {
        let model = profile();

        assert!(model
            .set("tags", json!([{"label": "a"}, {"label": "b"}]))
            .unwrap());
        assert_eq!(model.get("tags[1].label"), json!("b"));

        assert!(model.set("meta", json!({"title": "Hello"})).unwrap());
        assert_eq!(model.get("meta.title"), json!("Hello"));

        // A key without a rule rejects the whole write
        assert!(!model.set("meta", json!({"title": "Hi", "extra": 1})).unwrap());
        assert_eq!(model.get("meta"), json!({"title": "Hello"}));
    }

    struct Misconfigured;

    impl ModelSchema for Misconfigured {
        fn rules(&self, _context: &RuleContext<'_>) -> RuleResult<RuleSet> {
            Ok(RuleSet::new().validator("age", RangeValidator::new(None, None)?))
        }
    }

    #[tokio::test]
    async fn test_validator_config_errors_propagate() {
        let model = Model::new(Misconfigured, json!({"age": 3}));

        assert!(matches!(
            model.get_validators(),
            Err(RuleError::Config(ConfigError::EmptyRange))
        ));
        assert!(matches!(model.validate_all().await, Err(RuleError::Config(_))));
        assert!(matches!(model.set("age", json!(4)), Err(RuleError::Config(_))));
    }

    struct Vault;

    impl ModelSchema for Vault {
        fn rules(&self, _context: &RuleContext<'_>) -> RuleResult<RuleSet> {
            Ok(RuleSet::new()
                .validator("ids[]", UnsafeValidator)
                .validator("secret.flag", UnsafeValidator)
                .validator("secret.note", StringValidator::new()))
        }
    }

    fn vault() -> Model {
        Model::new(Vault, json!({"ids": [1, 2], "secret": {"flag": true, "note": "n"}}))
    }

    #[test]
    fn test_rejected_array_write_keeps_elements() {
        let model = vault();
        let mut mutations = model.subscribe_mutations(MutationFilter::new());

        assert!(!model.set("ids", json!([3])).unwrap());
        assert!(!model.set("ids", json!([])).unwrap());
        assert_eq!(model.get("ids"), json!([1, 2]));
        assert!(!model.is_model_changed());
        assert!(mutations.drain().is_empty());
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let model = vault();
        assert!(!model.set_unchecked("ids[18446744073709551615]", json!(1)).unwrap());
        assert!(!model.set_unchecked("ids[9]", json!(1)).unwrap());
        assert!(model.set_unchecked("ids[2]", json!(3)).unwrap());
        assert_eq!(model.get("ids"), json!([1, 2, 3]));
    }

    #[test]
    fn test_parent_write_cannot_replace_unsafe_children() {
        let model = vault();

        assert!(!model.set("secret", json!({})).unwrap());
        assert!(!model.set("secret", json!("gone")).unwrap());
        assert!(!model.set("secret", json!({"flag": false})).unwrap());
        assert_eq!(model.get("secret"), json!({"flag": true, "note": "n"}));

        assert!(model.set("secret", json!({"note": "m"})).unwrap());
        assert_eq!(model.get("secret"), json!({"flag": true, "note": "m"}));

        assert!(model.set_unchecked("secret", json!({})).unwrap());
        assert_eq!(model.get("secret"), json!({}));
    }

    #[test]
    fn test_batch_keeps_accepted_entries() {
        let model = vault();

        let accepted = model
            .set_attributes([
                ("secret.note", json!("x")),
                ("ids", json!([9])),
                ("secret", json!({"note": "y", "flag": false})),
            ])
            .unwrap();

        assert!(!accepted);
        assert_eq!(model.get("secret"), json!({"flag": true, "note": "x"}));
        assert_eq!(model.get("ids"), json!([1, 2]));
    }

    #[test]
    fn test_mutations_are_published() {
        let model = profile();
        let mut mutations = model.subscribe_mutations(MutationFilter::new());

        model.set("tags", json!([{"label": "a"}])).unwrap();
        model.set("role", json!("admin")).unwrap();

        let written: Vec<String> = mutations.drain().into_iter().map(|m| m.attribute).collect();
        assert_eq!(written, vec!["tags[0].label"]);
    }

    #[test]
    fn test_change_tracking() {
        let model = profile();
        assert!(!model.is_model_changed());

        model.set("name", json!("Ann")).unwrap();
        assert!(model.is_model_changed());
        assert!(model.is_attribute_changed("name"));
        assert!(!model.is_attribute_changed("site"));
        assert_eq!(model.get_initial_attribute("name"), json!(""));

        model.set("name", json!("")).unwrap();
        assert!(!model.is_model_changed());
    }

    #[test]
    fn test_attribute_queries() {
        let model = profile();
        assert!(model.is_attribute_required("name").unwrap());
        assert!(!model.is_attribute_required("site").unwrap());
        assert!(model.is_attribute_safe("tags").unwrap());
        assert!(model.is_attribute_safe("tags[4].label").unwrap());
        assert!(!model.is_attribute_safe("role").unwrap());
        assert!(!model.is_attribute_safe("unknown").unwrap());
    }

    #[tokio::test]
    async fn test_validate_and_errors() {
        let model = profile();
        model.set("site", json!("not a url")).unwrap();

        assert!(!model.validate(&["name", "site"]).await.unwrap());
        assert_eq!(model.get_validation_state("name").status(), ValidationStatus::Error);
        assert_eq!(model.get_validation_state("site").status(), ValidationStatus::Error);
        assert!(model.has_errors());

        let first = model.get_first_error().unwrap().unwrap();
        assert_eq!(first.attribute, "name");
        assert_eq!(model.get_validation_error("site").unwrap().code, "url");

        model.set("name", json!("Ann")).unwrap();
        model.set("site", json!("https://example.com")).unwrap();
        model.set("meta", json!({"title": "Home"})).unwrap();
        assert!(model.validate_all().await.unwrap());
        assert!(model.is_model_valid());
    }

    #[tokio::test]
    async fn test_unruled_path_validates_as_safe() {
        let model = profile();
        assert!(model.validate(&["nothing"]).await.unwrap());
        assert_eq!(model.get_validation_state("nothing").status(), ValidationStatus::Success);
    }

    #[tokio::test]
    async fn test_validate_compound_path() {
        let model = profile();
        model
            .set("tags", json!([{"label": "short"}, {"label": "far too long"}]))
            .unwrap();

        assert!(!model.validate(&["tags"]).await.unwrap());
        assert!(model.get_validation_state("tags[0].label").is_valid());
        assert!(model.get_validation_state("tags[1].label").is_error());
        assert_eq!(
            model.get_validation_state("tags").status(),
            ValidationStatus::Pristine
        );
    }

    struct Checkout;

    impl ModelSchema for Checkout {
        fn rules(&self, context: &RuleContext<'_>) -> RuleResult<RuleSet> {
            let delivery = context.get("delivery");
            Ok(RuleSet::new()
                .validator("delivery", PresenceValidator::new())
                .rule(
                    "address",
                    Rule::factory(move |_| {
                        if delivery == json!("courier") {
                            Rule::validator(PresenceValidator::new())
                        } else {
                            Rule::Disabled
                        }
                    }),
                )
                .rule(
                    "coupon",
                    Scenario::only(["promo"], Rule::validator(StringValidator::new())),
                ))
        }

        fn invalidate_when(&self) -> InvalidationTriggers {
            InvalidationTriggers::paths(["delivery"])
        }
    }

    #[tokio::test]
    async fn test_invalidation_trigger_recomputes_rules() {
        let model = Model::new(Checkout, json!({"delivery": "pickup", "address": ""}));
        assert!(!model.get_validators().unwrap().contains(&"address".into()));

        assert!(model.validate_all().await.unwrap());
        model.set("delivery", json!("courier")).unwrap();
        assert_eq!(
            model.get_validation_state("delivery").status(),
            ValidationStatus::Unvalidated
        );

        assert!(model.get_validators().unwrap().contains(&"address".into()));
        assert!(!model.validate_all().await.unwrap());
        assert!(model.get_validation_state("address").is_error());
    }

    #[test]
    fn test_scenario_changes_recompute_rules() {
        let model = Model::new(Checkout, json!({}));
        assert!(!model.is_attribute_safe("coupon").unwrap());

        model.add_scenario("promo");
        assert_eq!(model.get_scenarios(), vec!["default", "promo"]);
        assert!(model.is_attribute_safe("coupon").unwrap());

        model.remove_scenario("promo");
        assert!(!model.is_attribute_safe("coupon").unwrap());
    }

    struct Counted(Arc<AtomicUsize>);

    impl ModelSchema for Counted {
        fn rules(&self, _context: &RuleContext<'_>) -> RuleResult<RuleSet> {
            Ok(RuleSet::new())
        }

        fn prepare(&self, _model: &Model, scope: &mut SessionScope) {
            let cleanups = self.0.clone();
            scope.on_cleanup(move || {
                cleanups.fetch_add(1, Ordering::SeqCst);
            });
        }
    }

    #[test]
    fn test_session_restart_and_close() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let model = Model::new(Counted(cleanups.clone()), json!({}));

        model.set_context(json!({"locale": "en"}));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(model.get_context(), json!({"locale": "en"}));

        // Same scenarios: no restart
        model.set_scenarios(["default"]);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);

        model.close();
        assert_eq!(cleanups.load(Ordering::SeqCst), 2);
    }

    struct Trimmed;

    impl ModelSchema for Trimmed {
        fn rules(&self, _context: &RuleContext<'_>) -> RuleResult<RuleSet> {
            Ok(RuleSet::new())
        }

        fn prepare_source_data(&self, mut data: Value) -> Value {
            if let Some(map) = data.as_object_mut() {
                map.remove("password");
            }
            data
        }

        fn prepare_result_data(&self, mut data: Value) -> Value {
            if let Some(map) = data.as_object_mut() {
                map.insert("kind".to_string(), json!("user"));
            }
            data
        }
    }

    #[test]
    fn test_data_hooks() {
        let model = Model::new(Trimmed, json!({"name": "Ann", "password": "secret"}));
        assert_eq!(model.get("password"), Value::Null);
        assert_eq!(model.get_attributes(), json!({"name": "Ann", "kind": "user"}));
    }
}
