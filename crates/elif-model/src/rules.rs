//! Declarative rules and the rule table they normalize into
//!
//! A model declares its rules as an ordered [`RuleSet`]: attribute path to
//! [`Rule`]. Rules may be validators, factories evaluated against the current
//! [`RuleContext`], scenario-conditional rules, lists (all must pass), JSON
//! descriptions, or explicitly disabled. [`normalize`] resolves them into a
//! [`RuleTable`] holding one concrete validator per normalized path, in
//! declaration order.

use crate::error::{RuleError, RuleResult};
use crate::path::{AttributePath, Segment};
use crate::scenario::{Scenario, ScenarioApply};
use crate::store::AttributeStore;
use elif_validation::{
    ArrayValidator, DateValidator, EmailValidator, MultiValidator, NumberValidator,
    ObjectValidator, PresenceValidator, SafeValidator, SharedValidator, StringValidator,
    UnsafeValidator, UrlValidator, Validator,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What rule factories can look at
pub struct RuleContext<'a> {
    scenarios: &'a [String],
    context: &'a Value,
    attributes: &'a AttributeStore,
}

impl<'a> RuleContext<'a> {
    pub fn new(scenarios: &'a [String], context: &'a Value, attributes: &'a AttributeStore) -> Self {
        Self {
            scenarios,
            context,
            attributes,
        }
    }

    /// Active scenarios, in activation order
    pub fn scenarios(&self) -> &[String] {
        self.scenarios
    }

    pub fn is_scenario(&self, scenario: &str) -> bool {
        self.scenarios.iter().any(|s| s == scenario)
    }

    /// Model context set by the caller
    pub fn context(&self) -> &Value {
        self.context
    }

    /// Current value of an attribute
    pub fn get(&self, path: &str) -> Value {
        self.attributes.value(&AttributePath::parse(path))
    }
}

pub type RuleFactory = Arc<dyn Fn(&RuleContext<'_>) -> Rule + Send + Sync>;

/// A declared rule
#[derive(Clone)]
pub enum Rule {
    Validator(SharedValidator),
    /// Evaluated on every normalization
    Factory(RuleFactory),
    Scenario(Scenario),
    /// Every entry must pass; disabled entries are dropped
    All(Vec<Rule>),
    /// JSON description, see [`Rule::from_json`]
    Json(Value),
    /// No rule
    Disabled,
}

impl Rule {
    pub fn validator<V: Validator + 'static>(validator: V) -> Self {
        Rule::Validator(Arc::new(validator))
    }

    pub fn shared(validator: SharedValidator) -> Self {
        Rule::Validator(validator)
    }

    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&RuleContext<'_>) -> Rule + Send + Sync + 'static,
    {
        Rule::Factory(Arc::new(factory))
    }

    pub fn all<I, R>(rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Rule>,
    {
        Rule::All(rules.into_iter().map(Into::into).collect())
    }

    /// Convert a JSON rule description.
    ///
    /// * `false` disables the rule
    /// * a string names a built-in rule with default options: `presence`,
    ///   `url`, `number`, `string`, `email`, `date`, `object`, `array`,
    ///   `safe`, `unsafe`
    /// * an array combines its entries, all of which must pass
    /// * `{"apply": "in" | "except", "scenarios": [..], "rule": ..}` is a
    ///   scenario rule
    pub fn from_json(description: &Value) -> RuleResult<Self> {
        let unknown = || RuleError::UnknownValidatorDescription {
            attribute: String::new(),
            description: description.to_string(),
        };

        match description {
            Value::Bool(false) => Ok(Rule::Disabled),
            Value::String(name) => builtin(name).ok_or_else(unknown),
            Value::Array(items) => items
                .iter()
                .map(Rule::from_json)
                .collect::<RuleResult<Vec<_>>>()
                .map(Rule::All),
            Value::Object(map) => {
                let apply = map.get("apply").and_then(Value::as_str).ok_or_else(unknown)?;
                let apply: ScenarioApply = apply.parse()?;
                let scenarios = map
                    .get("scenarios")
                    .and_then(Value::as_array)
                    .ok_or_else(unknown)?
                    .iter()
                    .map(|s| s.as_str().map(str::to_string).ok_or_else(unknown))
                    .collect::<RuleResult<Vec<_>>>()?;
                let rule = Rule::from_json(map.get("rule").ok_or_else(unknown)?)?;
                Ok(Rule::Scenario(Scenario::new(apply, scenarios, rule)))
            }
            _ => Err(unknown()),
        }
    }
}

fn builtin(name: &str) -> Option<Rule> {
    let rule = match name {
        "presence" => Rule::validator(PresenceValidator::new()),
        "url" => Rule::validator(UrlValidator::new()),
        "number" => Rule::validator(NumberValidator::new()),
        "string" => Rule::validator(StringValidator::new()),
        "email" => Rule::validator(EmailValidator::new()),
        "date" => Rule::validator(DateValidator::new()),
        "object" => Rule::validator(ObjectValidator::new()),
        "array" => Rule::validator(ArrayValidator::new()),
        "safe" => Rule::validator(SafeValidator),
        "unsafe" => Rule::validator(UnsafeValidator),
        _ => return None,
    };
    Some(rule)
}

impl From<SharedValidator> for Rule {
    fn from(validator: SharedValidator) -> Self {
        Rule::Validator(validator)
    }
}

impl From<Scenario> for Rule {
    fn from(scenario: Scenario) -> Self {
        Rule::Scenario(scenario)
    }
}

impl From<Vec<Rule>> for Rule {
    fn from(rules: Vec<Rule>) -> Self {
        Rule::All(rules)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Validator(v) => write!(f, "Validator({})", v.rule_name()),
            Rule::Factory(_) => f.write_str("Factory"),
            Rule::Scenario(s) => fmt::Debug::fmt(s, f),
            Rule::All(rules) => f.debug_tuple("All").field(rules).finish(),
            Rule::Json(value) => write!(f, "Json({})", value),
            Rule::Disabled => f.write_str("Disabled"),
        }
    }
}

/// Ordered attribute rules. Declaring a path twice replaces the earlier rule
/// but keeps its position.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<(String, Rule)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, attribute: impl Into<String>, rule: impl Into<Rule>) -> Self {
        self.insert(attribute, rule);
        self
    }

    pub fn validator<V: Validator + 'static>(self, attribute: impl Into<String>, validator: V) -> Self {
        self.rule(attribute, Rule::validator(validator))
    }

    pub fn disabled(self, attribute: impl Into<String>) -> Self {
        self.rule(attribute, Rule::Disabled)
    }

    pub fn insert(&mut self, attribute: impl Into<String>, rule: impl Into<Rule>) {
        let attribute = attribute.into();
        let rule = rule.into();
        match self.rules.iter_mut().find(|(a, _)| *a == attribute) {
            Some(entry) => entry.1 = rule,
            None => self.rules.push((attribute, rule)),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.rules.iter().map(|(a, r)| (a.as_str(), r))
    }
}

impl IntoIterator for RuleSet {
    type Item = (String, Rule);
    type IntoIter = std::vec::IntoIter<(String, Rule)>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.into_iter()
    }
}

/// A resolved rule
#[derive(Clone)]
pub struct RuleEntry {
    /// Normalized path, array elements written as `[]`
    pub path: AttributePath,
    pub validator: SharedValidator,
}

impl fmt::Debug for RuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.path, self.validator.rule_name())
    }
}

/// One validator per normalized path, in declaration order
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    entries: Vec<RuleEntry>,
    index: HashMap<AttributePath, usize>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, path: AttributePath, validator: SharedValidator) {
        match self.index.get(&path) {
            Some(&position) => self.entries[position].validator = validator,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push(RuleEntry { path, validator });
            }
        }
    }

    /// Validator for a concrete or normalized path
    pub fn get(&self, path: &AttributePath) -> Option<&SharedValidator> {
        self.position(path).map(|position| &self.entries[position].validator)
    }

    /// Declaration position of the rule matching `path`
    pub fn position(&self, path: &AttributePath) -> Option<usize> {
        self.index.get(&path.normalized()).copied()
    }

    pub fn contains(&self, path: &AttributePath) -> bool {
        self.position(path).is_some()
    }

    fn has_child_rule(&self, path: &AttributePath, accepts: impl Fn(&Segment) -> bool) -> bool {
        let prefix = path.normalized();
        self.entries.iter().any(|entry| {
            entry.path.len() > prefix.len()
                && entry.path.starts_with(&prefix)
                && accepts(&entry.path.segments()[prefix.len()])
        })
    }

    /// Whether any rule lies below `path`
    pub fn has_nested(&self, path: &AttributePath) -> bool {
        self.has_child_rule(path, |_| true)
    }

    /// Whether a rule below `path` refuses safe writes
    pub fn has_unsafe_nested(&self, path: &AttributePath) -> bool {
        let prefix = path.normalized();
        self.entries.iter().any(|entry| {
            entry.path.len() > prefix.len()
                && entry.path.starts_with(&prefix)
                && !entry.validator.is_safe()
        })
    }

    /// Whether a rule addresses elements of the array at `path`
    pub fn has_element_rule(&self, path: &AttributePath) -> bool {
        self.has_child_rule(path, |segment| matches!(segment, Segment::Wildcard))
    }

    /// Whether a rule addresses keys of the object at `path`
    pub fn has_key_rule(&self, path: &AttributePath) -> bool {
        self.has_child_rule(path, |segment| matches!(segment, Segment::Key(_)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleEntry> {
        self.entries.iter()
    }

    /// Concrete paths covered by the rules, given the current attributes.
    /// Wildcards expand over the elements actually stored.
    pub fn expand(&self, attributes: &AttributeStore) -> Vec<AttributePath> {
        let mut targets = Vec::new();
        for entry in &self.entries {
            expand_into(&entry.path, 0, AttributePath::root(), attributes, &mut targets);
        }
        targets
    }

    /// Concrete paths of the rules at or below `path`
    pub fn expand_from(&self, path: &AttributePath, attributes: &AttributeStore) -> Vec<AttributePath> {
        let prefix = path.normalized();
        let mut targets = Vec::new();
        for entry in self.entries.iter().filter(|entry| entry.path.starts_with(&prefix)) {
            expand_into(&entry.path, prefix.len(), path.clone(), attributes, &mut targets);
        }
        targets
    }
}

fn expand_into(
    pattern: &AttributePath,
    position: usize,
    prefix: AttributePath,
    attributes: &AttributeStore,
    targets: &mut Vec<AttributePath>,
) {
    let Some(segment) = pattern.segments().get(position) else {
        if !targets.contains(&prefix) {
            targets.push(prefix);
        }
        return;
    };

    match segment {
        Segment::Wildcard => {
            let count = attributes
                .get(&prefix)
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            for index in 0..count {
                expand_into(pattern, position + 1, prefix.index(index), attributes, targets);
            }
        }
        other => {
            let next = prefix.child(other.clone());
            expand_into(pattern, position + 1, next, attributes, targets);
        }
    }
}

/// Whether `path` is visible under the accessible attribute list
fn is_accessible(path: &AttributePath, accessible: &[AttributePath]) -> bool {
    accessible.is_empty()
        || accessible
            .iter()
            .any(|allowed| path.starts_with(&allowed.normalized()))
}

/// Resolve a rule set into a rule table.
///
/// Rules outside `accessible` are skipped (an empty list means no
/// restriction). Factories are followed at most `max_depth` levels deep.
pub fn normalize(
    rules: RuleSet,
    context: &RuleContext<'_>,
    accessible: &[AttributePath],
    max_depth: usize,
) -> RuleResult<RuleTable> {
    let mut table = RuleTable::new();

    for (attribute, rule) in rules {
        let path = AttributePath::parse(&attribute).normalized();
        if !is_accessible(&path, accessible) {
            continue;
        }

        if let Some(validator) = resolve(rule, &attribute, context, 0, max_depth)? {
            table.push(path, validator);
        }
    }

    debug!("Normalized {} rules for scenarios {:?}", table.len(), context.scenarios());
    Ok(table)
}

fn resolve(
    rule: Rule,
    attribute: &str,
    context: &RuleContext<'_>,
    depth: usize,
    max_depth: usize,
) -> RuleResult<Option<SharedValidator>> {
    match rule {
        Rule::Validator(validator) => Ok(Some(validator)),
        Rule::Factory(factory) => {
            if depth >= max_depth {
                return Err(RuleError::RuleNestingTooDeep {
                    attribute: attribute.to_string(),
                    max_depth,
                });
            }
            resolve(factory(context), attribute, context, depth + 1, max_depth)
        }
        Rule::Scenario(scenario) => {
            if scenario.applies_to(context.scenarios()) {
                resolve(*scenario.rule, attribute, context, depth, max_depth)
            } else {
                Ok(None)
            }
        }
        Rule::All(rules) => {
            let mut validators = Vec::with_capacity(rules.len());
            for rule in rules {
                if let Some(validator) = resolve(rule, attribute, context, depth, max_depth)? {
                    validators.push(validator);
                }
            }
            Ok(Some(Arc::new(MultiValidator::all(validators))))
        }
        Rule::Json(description) => {
            let rule = Rule::from_json(&description).map_err(|error| match error {
                RuleError::UnknownValidatorDescription { description, .. } => {
                    RuleError::UnknownValidatorDescription {
                        attribute: attribute.to_string(),
                        description,
                    }
                }
                other => other,
            })?;
            resolve(rule, attribute, context, depth, max_depth)
        }
        Rule::Disabled => Ok(None),
    }
}
