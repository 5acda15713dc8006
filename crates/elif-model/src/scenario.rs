//! Scenario-conditional rules

use crate::error::{RuleError, RuleResult};
use crate::rules::Rule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a scenario rule applies inside or outside its scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioApply {
    In,
    Except,
}

impl FromStr for ScenarioApply {
    type Err = RuleError;

    fn from_str(apply: &str) -> Result<Self, Self::Err> {
        match apply {
            "in" => Ok(Self::In),
            "except" => Ok(Self::Except),
            other => Err(RuleError::InvalidScenarioApply(other.to_string())),
        }
    }
}

impl fmt::Display for ScenarioApply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::In => "in",
            Self::Except => "except",
        })
    }
}

/// A rule that is only selected for some scenarios.
///
/// `In` selects the rule when an active scenario is listed, `Except` when
/// none is. A scenario rule that is not selected leaves its attribute without
/// a rule.
#[derive(Clone)]
pub struct Scenario {
    pub apply: ScenarioApply,
    pub scenarios: Vec<String>,
    pub rule: Box<Rule>,
}

impl Scenario {
    pub fn new<I, S>(apply: ScenarioApply, scenarios: I, rule: impl Into<Rule>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            apply,
            scenarios: scenarios.into_iter().map(Into::into).collect(),
            rule: Box::new(rule.into()),
        }
    }

    /// Rule selected while one of `scenarios` is active
    pub fn only<I, S>(scenarios: I, rule: impl Into<Rule>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ScenarioApply::In, scenarios, rule)
    }

    /// Rule selected while none of `scenarios` is active
    pub fn except<I, S>(scenarios: I, rule: impl Into<Rule>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ScenarioApply::Except, scenarios, rule)
    }

    /// Build from a textual apply mode (`"in"` or `"except"`)
    pub fn parse<I, S>(apply: &str, scenarios: I, rule: impl Into<Rule>) -> RuleResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::new(apply.parse()?, scenarios, rule))
    }

    /// Whether the wrapped rule is selected for the active scenarios
    pub fn applies_to(&self, active: &[String]) -> bool {
        let intersects = self.scenarios.iter().any(|s| active.contains(s));
        match self.apply {
            ScenarioApply::In => intersects,
            ScenarioApply::Except => !intersects,
        }
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("apply", &self.apply)
            .field("scenarios", &self.scenarios)
            .finish()
    }
}
