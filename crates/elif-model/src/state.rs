//! Validation states

use elif_validation::{ValidationMessage, ValidationOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Marks an in-flight validation as superseded. Cloned handles share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    canceled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The job's eventual result will be dropped
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    pub fn same_job(&self, other: &CancelHandle) -> bool {
        Arc::ptr_eq(&self.canceled, &other.canceled)
    }
}

/// Status discriminant of a validation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pristine,
    Pending,
    Success,
    Warning,
    Error,
    Unvalidated,
}

impl ValidationStatus {
    /// Success or warning
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Success | Self::Warning)
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pristine => "pristine",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Unvalidated => "unvalidated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum StateKind {
    /// Never validated
    Pristine,
    /// Validation in flight
    Pending { message: String, cancel: CancelHandle },
    Success,
    /// Valid, with an advisory message
    Warning(ValidationMessage),
    Error(ValidationMessage),
    /// Validated once, stale since the rules changed
    Unvalidated,
}

/// Validation state of a single attribute
#[derive(Debug, Clone)]
pub struct ValidationState {
    pub attribute: String,
    pub kind: StateKind,
}

impl ValidationState {
    pub fn pristine(attribute: impl Into<String>) -> Self {
        Self::with_kind(attribute, StateKind::Pristine)
    }

    pub fn pending(attribute: impl Into<String>, message: impl Into<String>, cancel: CancelHandle) -> Self {
        Self::with_kind(
            attribute,
            StateKind::Pending {
                message: message.into(),
                cancel,
            },
        )
    }

    pub fn success(attribute: impl Into<String>) -> Self {
        Self::with_kind(attribute, StateKind::Success)
    }

    pub fn warning(attribute: impl Into<String>, message: ValidationMessage) -> Self {
        Self::with_kind(attribute, StateKind::Warning(message))
    }

    pub fn error(attribute: impl Into<String>, message: ValidationMessage) -> Self {
        Self::with_kind(attribute, StateKind::Error(message))
    }

    pub fn unvalidated(attribute: impl Into<String>) -> Self {
        Self::with_kind(attribute, StateKind::Unvalidated)
    }

    fn with_kind(attribute: impl Into<String>, kind: StateKind) -> Self {
        Self {
            attribute: attribute.into(),
            kind,
        }
    }

    /// Terminal state for a settled validator outcome
    pub fn from_outcome(attribute: impl Into<String>, outcome: ValidationOutcome) -> Self {
        match outcome {
            Ok(None) => Self::success(attribute),
            Ok(Some(warning)) => Self::warning(attribute, warning),
            Err(error) => Self::error(attribute, error),
        }
    }

    pub fn status(&self) -> ValidationStatus {
        match self.kind {
            StateKind::Pristine => ValidationStatus::Pristine,
            StateKind::Pending { .. } => ValidationStatus::Pending,
            StateKind::Success => ValidationStatus::Success,
            StateKind::Warning(_) => ValidationStatus::Warning,
            StateKind::Error(_) => ValidationStatus::Error,
            StateKind::Unvalidated => ValidationStatus::Unvalidated,
        }
    }

    /// Error or warning message
    pub fn message(&self) -> Option<&ValidationMessage> {
        match self.kind {
            StateKind::Warning(ref message) | StateKind::Error(ref message) => Some(message),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&ValidationMessage> {
        match self.kind {
            StateKind::Error(ref message) => Some(message),
            _ => None,
        }
    }

    pub fn warning_message(&self) -> Option<&ValidationMessage> {
        match self.kind {
            StateKind::Warning(ref message) => Some(message),
            _ => None,
        }
    }

    /// Cancel capability of a pending state
    pub fn cancel_handle(&self) -> Option<&CancelHandle> {
        match self.kind {
            StateKind::Pending { ref cancel, .. } => Some(cancel),
            _ => None,
        }
    }

    /// Invoke the cancel capability, if any
    pub fn abort(&self) {
        if let Some(cancel) = self.cancel_handle() {
            cancel.cancel();
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status().is_valid()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == ValidationStatus::Pending
    }

    pub fn is_error(&self) -> bool {
        self.status() == ValidationStatus::Error
    }

    /// Success, warning or error
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status(),
            ValidationStatus::Success | ValidationStatus::Warning | ValidationStatus::Error
        )
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StateKind::Pending { ref message, .. } => write!(f, "{}: {}", self.attribute, message),
            StateKind::Warning(ref message) | StateKind::Error(ref message) => {
                write!(f, "{}: {}", self.attribute, message)
            }
            _ => write!(f, "{}: {}", self.attribute, self.status()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_outcome() {
        assert_eq!(
            ValidationState::from_outcome("a", Ok(None)).status(),
            ValidationStatus::Success
        );

        let warning = ValidationState::from_outcome("a", Ok(Some("careful".into())));
        assert_eq!(warning.status(), ValidationStatus::Warning);
        assert!(warning.is_valid());
        assert_eq!(warning.warning_message().map(|m| m.to_string()), Some("careful".into()));
        assert!(warning.error_message().is_none());

        let error = ValidationState::from_outcome("a", Err("broken".into()));
        assert!(error.is_error());
        assert!(!error.is_valid());
        assert_eq!(error.message().map(|m| m.to_string()), Some("broken".into()));
    }

    #[test]
    fn test_pending_abort() {
        let cancel = CancelHandle::new();
        let state = ValidationState::pending("a", "Verification", cancel.clone());
        assert!(state.is_pending());
        assert!(!state.is_terminal());

        state.abort();
        assert!(cancel.is_canceled());
        assert!(state.cancel_handle().is_some_and(|c| c.same_job(&cancel)));
    }

    #[test]
    fn test_display() {
        assert_eq!(ValidationState::pristine("name").to_string(), "name: pristine");
        assert_eq!(
            ValidationState::pending("name", "Verification", CancelHandle::new()).to_string(),
            "name: Verification"
        );
    }
}
