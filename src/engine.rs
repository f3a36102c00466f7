//! Translation engine facade.
//!
//! Owns the immutable schema model, the engine configuration and the
//! callback registry. Every call builds a fresh [`Translation`], so one
//! engine serves any number of concurrent requests.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::cypher::{CypherQuery, Query};
use crate::executor::{CypherExecutor, ExecutorError};
use crate::request::{Operation, RequestContext};
use crate::schema_model::SchemaModel;
use crate::translate::{CallbackRegistry, TranslateError, Translation};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

pub struct TranslationEngine {
    model: Arc<SchemaModel>,
    config: EngineConfig,
    callbacks: CallbackRegistry,
}

impl TranslationEngine {
    pub fn new(model: Arc<SchemaModel>, config: EngineConfig) -> Self {
        TranslationEngine {
            model,
            config,
            callbacks: CallbackRegistry::new(),
        }
    }

    pub fn with_callbacks(mut self, callbacks: CallbackRegistry) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn model(&self) -> &SchemaModel {
        &self.model
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the unrendered AST for one operation.
    pub fn plan(
        &self,
        operation: &Operation,
        request: &RequestContext,
    ) -> Result<Query, TranslateError> {
        Translation::new(&self.model, &self.config, &self.callbacks, request).translate(operation)
    }

    /// Translate one operation into query text plus parameters.
    pub fn translate(
        &self,
        operation: &Operation,
        request: &RequestContext,
    ) -> Result<CypherQuery, TranslateError> {
        let query = self.plan(operation, request)?.render();
        log::info!(
            "Translated {} on '{}' ({} params)",
            operation.kind(),
            operation.target(),
            query.params.len()
        );
        log::debug!("Cypher:\n{}", query.text);
        Ok(query)
    }

    /// Translate and run through `executor`. Translation completes before
    /// the first await.
    pub async fn execute(
        &self,
        executor: &dyn CypherExecutor,
        operation: &Operation,
        request: &RequestContext,
    ) -> Result<Vec<Value>, EngineError> {
        let query = self.translate(operation, request)?;
        match executor.run(&query).await {
            Ok(records) => Ok(records),
            Err(e) => {
                log::warn!(
                    "Execution of {} on '{}' failed: {}",
                    operation.kind(),
                    operation.target(),
                    e
                );
                Err(e.into())
            }
        }
    }
}
