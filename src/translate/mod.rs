//! Translation of client operations into the Cypher AST.
//!
//! A [`Translation`] lives for exactly one operation. It borrows the shared
//! schema model, configuration and callbacks, and carries the request's
//! authentication context plus a recursion-depth counter.

pub mod aggregation;
pub mod authorization;
pub mod callbacks;
pub mod coercion;
pub mod errors;
pub mod filter;
pub mod mutation;
pub mod planner;
pub mod projection;
pub mod read;

use std::cell::Cell;

use crate::config::EngineConfig;
use crate::cypher::Query;
use crate::request::{Operation, RequestContext};
use crate::schema_model::{EntityRef, Node, SchemaModel};

pub use callbacks::{CallbackRegistry, CallbackValue, PopulatedByCallback};
pub use errors::TranslateError;

pub struct Translation<'a> {
    pub model: &'a SchemaModel,
    pub config: &'a EngineConfig,
    pub callbacks: &'a CallbackRegistry,
    pub request: &'a RequestContext,
    depth: Cell<usize>,
}

impl<'a> Translation<'a> {
    pub fn new(
        model: &'a SchemaModel,
        config: &'a EngineConfig,
        callbacks: &'a CallbackRegistry,
        request: &'a RequestContext,
    ) -> Self {
        Translation {
            model,
            config,
            callbacks,
            request,
            depth: Cell::new(0),
        }
    }

    /// Enter one level of recursive translation; released when the guard drops.
    pub fn enter(&self) -> Result<DepthGuard<'_>, TranslateError> {
        let depth = self.depth.get() + 1;
        if depth > self.config.max_depth {
            log::warn!("Translation depth {} exceeds max_depth", depth);
            return Err(TranslateError::MaxDepthExceeded(self.config.max_depth));
        }
        self.depth.set(depth);
        Ok(DepthGuard { depth: &self.depth })
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    pub fn entity(&self, name: &str) -> Result<EntityRef<'a>, TranslateError> {
        self.model
            .entity(name)
            .ok_or_else(|| TranslateError::UnknownType(name.to_string()))
    }

    pub fn node(&self, name: &str) -> Result<&'a Node, TranslateError> {
        self.model
            .node(name)
            .ok_or_else(|| TranslateError::UnknownType(name.to_string()))
    }

    /// Build the AST for one operation.
    pub fn translate(&self, operation: &Operation) -> Result<Query, TranslateError> {
        log::debug!(
            "Translating {} operation on '{}'",
            operation.kind(),
            operation.target()
        );
        match operation {
            Operation::Read { target, selection } => read::translate_read(self, target, selection),
            Operation::Aggregate { target, selection } => {
                read::translate_aggregate(self, target, selection)
            }
            Operation::Create {
                target,
                input,
                selection,
            } => mutation::translate_create(self, target, input, selection),
            Operation::Update {
                target,
                filter,
                update,
                selection,
            } => mutation::translate_update(self, target, filter.as_ref(), update, selection),
            Operation::Delete { target, filter } => {
                mutation::translate_delete(self, target, filter.as_ref())
            }
        }
    }
}

pub struct DepthGuard<'t> {
    depth: &'t Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}
