//! Validation messages and configuration errors

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Outcome of a single validator run.
///
/// `Ok(None)` is a plain success, `Ok(Some(_))` a success annotated with a
/// warning, and `Err(_)` a failed validation.
pub type ValidationOutcome = Result<Option<ValidationMessage>, ValidationMessage>;

/// A validation message: a template with `{name}` placeholders plus the
/// bindings that fill them in. Rendering happens lazily through `Display`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMessage {
    /// Machine-readable code, e.g. `"blank"` or `"too_short"`
    pub code: String,
    /// Message template
    pub template: String,
    /// Named values substituted into the template
    pub bindings: BTreeMap<String, Value>,
}

impl ValidationMessage {
    /// Create a message from a code and a template
    pub fn new(code: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            template: template.into(),
            bindings: BTreeMap::new(),
        }
    }

    /// Create a message for an attribute, binding `{attribute}`
    pub fn for_attribute(
        code: impl Into<String>,
        template: impl Into<String>,
        attribute: &str,
    ) -> Self {
        Self::new(code, template).bind("attribute", attribute)
    }

    /// Add a named binding
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// The attribute this message was produced for, if bound
    pub fn attribute(&self) -> Option<&str> {
        self.bindings.get("attribute").and_then(Value::as_str)
    }

    /// Render the template with its bindings
    pub fn render(&self) -> String {
        let mut rendered = self.template.clone();
        for (name, value) in &self.bindings {
            let placeholder = format!("{{{}}}", name);
            let replacement = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            rendered = rendered.replace(&placeholder, &replacement);
        }
        rendered
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for ValidationMessage {
    fn from(text: &str) -> Self {
        Self::new("custom", text)
    }
}

impl From<String> for ValidationMessage {
    fn from(text: String) -> Self {
        Self::new("custom", text)
    }
}

/// Programmer errors raised while constructing a validator
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("either an in-range or an except-range list must be set")]
    EmptyRange,

    #[error("either a compare attribute or a compare value must be set")]
    MissingComparison,

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("minimum date {min} is later than maximum date {max}")]
    InvalidDateBounds { min: String, max: String },
}
