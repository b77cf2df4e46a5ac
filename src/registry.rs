//! Operation registry
//!
//! An explicit table from operation name to handler, filled once at
//! startup and shared read-only by every consumer afterwards.

use crate::arguments::Arguments;
use crate::error::OperationError;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// Result of a single handler invocation.
pub type OperationResult = Result<Value, OperationError>;

/// A registered handler.
pub type Handler = Arc<dyn Fn(Arguments) -> BoxFuture<'static, OperationResult> + Send + Sync>;

#[derive(Default, Clone)]
pub struct OperationRegistry {
    handlers: HashMap<String, Handler>,
}

impl OperationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous entry.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        let name = name.into();
        let handler: Handler = Arc::new(move |args| Box::pin(handler(args)));
        if self.handlers.insert(name.clone(), handler).is_some() {
            warn!(operation = %name, "Replaced existing handler");
        }
    }

    /// Register an existing handler under a second name.
    pub fn alias(&mut self, alias: impl Into<String>, target: &str) -> bool {
        match self.handlers.get(target).cloned() {
            Some(handler) => {
                self.handlers.insert(alias.into(), handler);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Invoke the handler registered for `name`.
    ///
    /// # Errors
    ///
    /// [`OperationError::UnknownOperation`] if nothing is registered,
    /// otherwise whatever the handler returns.
    pub async fn invoke(&self, name: &str, args: Arguments) -> OperationResult {
        let handler = self
            .get(name)
            .ok_or_else(|| OperationError::UnknownOperation(name.to_string()))?;
        handler(args).await
    }

    /// Registered operation names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.names())
            .finish()
    }
}
