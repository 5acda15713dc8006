//! Model configuration types and builders

use serde::{Deserialize, Serialize};
use service_builder::builder;

/// Configuration shared by every model instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[builder]
pub struct ModelConfig {
    /// Scenario active when none is given at construction
    #[builder(default = "\"default\".to_string()", getter)]
    pub default_scenario: String,

    /// Message carried by `Pending` validation states
    #[builder(default = "\"Verification\".to_string()", getter)]
    pub pending_message: String,

    /// How many factory rules may return further factories
    #[builder(default = "16", getter)]
    pub max_rule_depth: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_scenario: "default".to_string(),
            pending_message: "Verification".to_string(),
            max_rule_depth: 16,
        }
    }
}

impl ModelConfigBuilder {
    /// Development configuration with deep factory chains allowed
    pub fn development() -> Self {
        ModelConfigBuilder::new().max_rule_depth(64)
    }

    /// Testing configuration that fails fast on runaway factories
    pub fn testing() -> Self {
        ModelConfigBuilder::new()
            .max_rule_depth(4)
            .pending_message("Pending".to_string())
    }
}
