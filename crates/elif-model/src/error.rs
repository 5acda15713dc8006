//! Rule configuration errors

use elif_validation::ConfigError;
use thiserror::Error;

/// Errors raised while turning declared rules into validators.
///
/// These are programmer errors. Failed validations never surface here; they
/// become `Error` validation states.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("unknown validator description for `{attribute}`: {description}")]
    UnknownValidatorDescription {
        attribute: String,
        description: String,
    },

    #[error("invalid scenario apply mode `{0}`, expected `in` or `except`")]
    InvalidScenarioApply(String),

    #[error("rule for `{attribute}` is nested deeper than {max_depth} factories")]
    RuleNestingTooDeep { attribute: String, max_depth: usize },

    #[error("invalid validator configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for rule operations
pub type RuleResult<T> = Result<T, RuleError>;
