//! Pipeline discovery.

use super::{data_explorer_chain, Chain};
use crate::config::Settings;
use crate::errors::{ContractErrorInfo, DatabyError, PipelineValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// A pipeline's name and stage order, for introspection endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDescriptor {
    /// The pipeline name.
    pub name: String,
    /// Stage names in execution order.
    pub stages: Vec<String>,
}

/// Maps pipeline names to pre-built chains.
///
/// Populated once at start-up through `&mut self`, then shared read-only.
#[derive(Debug, Clone, Default)]
pub struct PipelineRegistry {
    pipelines: BTreeMap<String, Arc<Chain>>,
}

impl PipelineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in pipelines.
    pub fn with_defaults(settings: &Settings) -> Result<Self, DatabyError> {
        let mut registry = Self::new();
        registry.register(data_explorer_chain(settings)?)?;
        Ok(registry)
    }

    /// Registers a chain under its own name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already taken.
    pub fn register(&mut self, chain: Chain) -> Result<(), PipelineValidationError> {
        if self.pipelines.contains_key(chain.name()) {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{}' is already registered",
                chain.name()
            ))
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-003-DUPLICATE_PIPELINE",
                    format!("Duplicate pipeline '{}'", chain.name()),
                )
                .with_fix_hint("Register each pipeline once at start-up."),
            ));
        }

        info!(pipeline = chain.name(), stages = chain.len(), "registered pipeline");
        self.pipelines.insert(chain.name().to_string(), Arc::new(chain));
        Ok(())
    }

    /// Returns the chain registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<Chain>, DatabyError> {
        self.pipelines
            .get(name)
            .cloned()
            .ok_or_else(|| DatabyError::PipelineNotFound(name.to_string()))
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    /// Returns all pipeline names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        self.pipelines.keys().map(String::as_str).collect()
    }

    /// Describes the pipeline registered under `name`.
    pub fn describe(&self, name: &str) -> Result<PipelineDescriptor, DatabyError> {
        let chain = self.get(name)?;
        Ok(PipelineDescriptor {
            name: chain.name().to_string(),
            stages: chain.stage_names(),
        })
    }

    /// Returns the number of registered pipelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
