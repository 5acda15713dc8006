//! Model sessions
//!
//! A session spans one scenario/context configuration of a model. The
//! schema's `prepare` hook registers whatever it sets up (subscriptions,
//! spawned listeners, cleanup callbacks) on a [`SessionScope`]; everything is
//! released when the session ends, before the next one is prepared.

use crate::path::AttributePath;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use tracing::debug;

/// Attributes whose writes invalidate the model's rules
#[derive(Debug, Clone, Default)]
pub enum InvalidationTriggers {
    #[default]
    None,
    /// Same attributes in every scenario
    Paths(Vec<String>),
    /// Attributes per scenario, merged across active scenarios
    PerScenario(HashMap<String, Vec<String>>),
}

impl InvalidationTriggers {
    pub fn paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Paths(paths.into_iter().map(Into::into).collect())
    }

    /// Normalized trigger paths for the active scenarios
    pub fn resolve(&self, scenarios: &[String]) -> Vec<AttributePath> {
        let raw: Vec<&String> = match self {
            Self::None => Vec::new(),
            Self::Paths(paths) => paths.iter().collect(),
            Self::PerScenario(map) => scenarios
                .iter()
                .filter_map(|scenario| map.get(scenario))
                .flatten()
                .collect(),
        };

        let mut resolved: Vec<AttributePath> = Vec::with_capacity(raw.len());
        for path in raw {
            let path = AttributePath::parse(path).normalized();
            if !resolved.contains(&path) {
                resolved.push(path);
            }
        }
        resolved
    }
}

/// Resources owned by the current session
#[derive(Default)]
pub struct SessionScope {
    cleanups: Vec<Box<dyn FnOnce() + Send>>,
    resources: Vec<Box<dyn Any + Send>>,
}

impl SessionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `cleanup` when the session ends
    pub fn on_cleanup<F>(&mut self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanups.push(Box::new(cleanup));
    }

    /// Keep `resource` alive until the session ends, e.g. a subscription
    pub fn keep<T: Send + 'static>(&mut self, resource: T) {
        self.resources.push(Box::new(resource));
    }

    /// Spawn a task that is aborted when the session ends.
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.on_cleanup(move || handle.abort());
    }

    fn release(&mut self) {
        // Reverse registration order
        while let Some(cleanup) = self.cleanups.pop() {
            cleanup();
        }
        while self.resources.pop().is_some() {}
    }
}

impl fmt::Debug for SessionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionScope")
            .field("cleanups", &self.cleanups.len())
            .field("resources", &self.resources.len())
            .finish()
    }
}

/// A running session. Dropping it releases its scope.
#[derive(Debug)]
pub(crate) struct Session {
    id: u64,
    scope: SessionScope,
    invalidation: Vec<AttributePath>,
}

impl Session {
    pub(crate) fn new(id: u64, scope: SessionScope, invalidation: Vec<AttributePath>) -> Self {
        debug!("Session {} started with {} invalidation triggers", id, invalidation.len());
        Self {
            id,
            scope,
            invalidation,
        }
    }

    /// Whether a write to `path` invalidates the rules: the path is a
    /// trigger, lies below one, or contains one
    pub(crate) fn is_trigger(&self, path: &AttributePath) -> bool {
        let path = path.normalized();
        self.invalidation
            .iter()
            .any(|trigger| path.starts_with(trigger) || trigger.starts_with(&path))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.scope.release();
        debug!("Session {} torn down", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_cleanups_run_in_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut scope = SessionScope::new();
        for n in 1..=3 {
            let order = order.clone();
            scope.on_cleanup(move || order.lock().unwrap().push(n));
        }

        drop(Session::new(1, scope, Vec::new()));
        assert_eq!(*order.lock().unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn test_kept_resources_are_dropped() {
        struct Guard(Arc<AtomicUsize>);
        impl Drop for Guard {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicUsize::new(0));
        let mut scope = SessionScope::new();
        scope.keep(Guard(dropped.clone()));

        let session = Session::new(1, scope, Vec::new());
        assert_eq!(dropped.load(Ordering::SeqCst), 0);
        drop(session);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spawned_tasks_are_aborted() {
        let (sender, receiver) = tokio::sync::oneshot::channel::<()>();
        let mut scope = SessionScope::new();
        scope.spawn(async move {
            let _sender = sender;
            std::future::pending::<()>().await;
        });

        drop(Session::new(1, scope, Vec::new()));
        // The aborted task drops its sender
        assert!(receiver.await.is_err());
    }

    #[test]
    fn test_trigger_resolution() {
        let triggers = InvalidationTriggers::PerScenario(HashMap::from([
            ("a".to_string(), vec!["type".to_string()]),
            ("b".to_string(), vec!["type".to_string(), "items[0].kind".to_string()]),
        ]));

        let resolved = triggers.resolve(&["a".to_string(), "b".to_string()]);
        let resolved: Vec<String> = resolved.iter().map(ToString::to_string).collect();
        assert_eq!(resolved, vec!["type", "items[].kind"]);

        assert!(InvalidationTriggers::None.resolve(&["a".to_string()]).is_empty());
    }

    #[test]
    fn test_is_trigger() {
        let session = Session::new(
            1,
            SessionScope::new(),
            InvalidationTriggers::paths(["profile.type"]).resolve(&[]),
        );

        assert!(session.is_trigger(&AttributePath::parse("profile.type")));
        assert!(session.is_trigger(&AttributePath::parse("profile")));
        assert!(!session.is_trigger(&AttributePath::parse("profile.name")));
        assert!(!session.is_trigger(&AttributePath::parse("type")));
    }
}
