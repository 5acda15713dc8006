//! # elif-model
//!
//! Reactive data models with asynchronous, scenario-aware validation.
//!
//! ## Features
//!
//! - **Persistent attributes**: snapshots share data until written
//! - **Scenario rules**: rules selected by the active scenarios and context
//! - **Cached validation**: unchanged values are not validated twice
//! - **Cancellation**: a newer validation of an attribute supersedes older ones
//! - **Event streams**: filterable subscriptions to writes and validation states
//! - **Forms**: UI state and dirty tracking on top of a model
//!
//! ## Quick Start
//!
//! ```rust
//! use elif_model::{Model, ModelSchema, RuleContext, RuleResult, RuleSet, ValidationStatus};
//! use elif_validation::{PresenceValidator, UrlValidator};
//! use serde_json::json;
//!
//! struct Bookmark;
//!
//! impl ModelSchema for Bookmark {
//!     fn rules(&self, _context: &RuleContext<'_>) -> RuleResult<RuleSet> {
//!         Ok(RuleSet::new()
//!             .validator("title", PresenceValidator::new())
//!             .validator("link", UrlValidator::new()))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let model = Model::new(Bookmark, json!({"title": "Docs", "link": "nowhere"}));
//!
//! assert!(!model.validate_all().await.unwrap());
//! assert_eq!(model.get_validation_state("title").status(), ValidationStatus::Success);
//! assert_eq!(model.get_first_error().unwrap().unwrap().attribute, "link");
//!
//! model.set("link", json!("https://docs.rs")).unwrap();
//! assert!(model.validate_all().await.unwrap());
//! # });
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod form;
pub mod model;
pub mod path;
pub mod rules;
pub mod scenario;
pub mod session;
pub mod state;
pub mod store;
pub mod stream;
pub mod tracker;

// Re-exports for easy access
pub use config::{ModelConfig, ModelConfigBuilder};
pub use error::{RuleError, RuleResult};
pub use events::{AttributeMutation, MutationFilter, StateMutation, ValidationFilter};
pub use form::Form;
pub use model::{Model, ModelBuilder, ModelSchema};
pub use path::{AttributePath, Segment};
pub use rules::{normalize, Rule, RuleContext, RuleEntry, RuleFactory, RuleSet, RuleTable};
pub use scenario::{Scenario, ScenarioApply};
pub use session::{InvalidationTriggers, SessionScope};
pub use state::{CancelHandle, StateKind, ValidationState, ValidationStatus};
pub use store::AttributeStore;
pub use stream::{EventStream, Subscription};
pub use tracker::ValidationTracker;
