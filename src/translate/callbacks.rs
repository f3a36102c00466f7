//! User callbacks bound to `@populatedBy` attributes.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::errors::TranslateError;
use crate::request::RequestContext;

/// Result of a populated-by callback.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackValue {
    /// Stored after coercion against the attribute kind
    Value(Value),
    /// Removes the stored property
    Null,
    /// Leaves the stored property untouched
    Undefined,
}

/// `(parent, args, context) -> value`, evaluated once per written record.
pub trait PopulatedByCallback: Send + Sync {
    fn call(
        &self,
        parent: &Map<String, Value>,
        args: &Value,
        context: &RequestContext,
    ) -> CallbackValue;
}

impl<F> PopulatedByCallback for F
where
    F: Fn(&Map<String, Value>, &Value, &RequestContext) -> CallbackValue + Send + Sync,
{
    fn call(
        &self,
        parent: &Map<String, Value>,
        args: &Value,
        context: &RequestContext,
    ) -> CallbackValue {
        self(parent, args, context)
    }
}

/// Callback name to implementation, injected at engine construction.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, Arc<dyn PopulatedByCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        CallbackRegistry::default()
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        callback: impl PopulatedByCallback + 'static,
    ) -> Self {
        self.callbacks.insert(name.into(), Arc::new(callback));
        self
    }

    pub fn get(&self, name: &str) -> Result<&dyn PopulatedByCallback, TranslateError> {
        self.callbacks
            .get(name)
            .map(|cb| cb.as_ref())
            .ok_or_else(|| TranslateError::MissingCallback(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.callbacks.keys().collect();
        names.sort();
        f.debug_struct("CallbackRegistry").field("callbacks", &names).finish()
    }
}
