//! Composite validator over an ordered list of validators

use crate::cache::Throttle;
use crate::error::{ValidationMessage, ValidationOutcome};
use crate::traits::{AttributeLookup, SharedValidator, Validator};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};

/// How child outcomes are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiMode {
    /// Every child must succeed
    All,
    /// At least one child must succeed
    Any,
}

/// Ordered combination of validators.
///
/// All children run concurrently. In `All` mode the first failure in
/// declaration order is reported, otherwise the first warning. In `Any` mode
/// the first success wins; when every child fails the first failure is
/// reported.
#[derive(Clone)]
pub struct MultiValidator {
    validators: Vec<SharedValidator>,
    mode: MultiMode,
}

impl MultiValidator {
    pub const MESSAGE_ANY: &'static str = "{attribute} - does not match any rule";

    /// All children must succeed
    pub fn all(validators: Vec<SharedValidator>) -> Self {
        Self {
            validators,
            mode: MultiMode::All,
        }
    }

    /// At least one child must succeed
    pub fn any(validators: Vec<SharedValidator>) -> Self {
        Self {
            validators,
            mode: MultiMode::Any,
        }
    }

    pub fn validators(&self) -> &[SharedValidator] {
        &self.validators
    }

    pub fn mode(&self) -> MultiMode {
        self.mode
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl std::fmt::Debug for MultiValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiValidator")
            .field("mode", &self.mode)
            .field(
                "validators",
                &self.validators.iter().map(|v| v.rule_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[async_trait]
impl Validator for MultiValidator {
    async fn validate(
        &self,
        value: &Value,
        attribute: &str,
        model: &dyn AttributeLookup,
    ) -> ValidationOutcome {
        let outcomes = join_all(
            self.validators
                .iter()
                .map(|validator| validator.validate(value, attribute, model)),
        )
        .await;

        match self.mode {
            MultiMode::All => {
                let mut warning = None;
                for outcome in outcomes {
                    match outcome {
                        Err(error) => return Err(error),
                        Ok(Some(message)) if warning.is_none() => warning = Some(message),
                        Ok(_) => {}
                    }
                }
                Ok(warning)
            }
            MultiMode::Any => {
                let mut first_error = None;
                for outcome in outcomes {
                    match outcome {
                        Ok(message) => return Ok(message),
                        Err(error) if first_error.is_none() => first_error = Some(error),
                        Err(_) => {}
                    }
                }
                Err(first_error.unwrap_or_else(|| {
                    ValidationMessage::for_attribute("any", Self::MESSAGE_ANY, attribute)
                }))
            }
        }
    }

    fn rule_name(&self) -> &'static str {
        "multi"
    }

    fn parameters(&self) -> Option<Value> {
        let children: Vec<Value> = self
            .validators
            .iter()
            .map(|validator| {
                json!({
                    "rule": validator.rule_name(),
                    "parameters": validator.parameters(),
                })
            })
            .collect();

        Some(json!({
            "any": self.mode == MultiMode::Any,
            "validators": children,
        }))
    }

    /// Safe only when non-empty and every child is safe
    fn is_safe(&self) -> bool {
        !self.validators.is_empty() && self.validators.iter().all(|v| v.is_safe())
    }

    fn is_required(&self) -> bool {
        match self.mode {
            MultiMode::All => self.validators.iter().any(|v| v.is_required()),
            MultiMode::Any => {
                !self.validators.is_empty() && self.validators.iter().all(|v| v.is_required())
            }
        }
    }

    fn is_cached(&self) -> bool {
        self.validators.iter().all(|v| v.is_cached())
    }

    fn throttle(&self) -> Option<&Throttle> {
        self.validators.iter().find_map(|v| v.throttle())
    }
}
