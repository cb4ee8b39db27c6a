//! Model registry - runtime storage for model and relationship metadata
//!
//! The registry is populated at startup and read-only during compilation.
//! It is safe to share across threads; compilation never writes to it.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{WhereHasError, WhereHasResult};
use super::types::{ModelDef, RelationshipMetadata};

/// Thread-safe store of declared models and their relationships
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    /// Map of model name -> model definition
    models: Arc<DashMap<String, ModelDef>>,
    /// Map of model name -> relationship name -> metadata
    relationships: Arc<DashMap<String, HashMap<String, RelationshipMetadata>>>,
}

impl ModelRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model definition
    pub fn register_model(&self, model: ModelDef) -> WhereHasResult<()> {
        model.validate()?;
        self.models.insert(model.name.clone(), model);
        Ok(())
    }

    /// Register a relationship on an already-registered model
    pub fn register_relationship(
        &self,
        model_name: &str,
        metadata: RelationshipMetadata,
    ) -> WhereHasResult<()> {
        metadata.validate()?;

        if !self.models.contains_key(model_name) {
            return Err(WhereHasError::Configuration(format!(
                "Cannot register relationship '{}': model '{}' is not registered",
                metadata.name, model_name
            )));
        }

        let mut model_relationships = self
            .relationships
            .entry(model_name.to_string())
            .or_default();
        model_relationships.insert(metadata.name.clone(), metadata);

        Ok(())
    }

    /// Look up a model definition by name
    pub fn model(&self, name: &str) -> Option<ModelDef> {
        self.models.get(name).map(|entry| entry.clone())
    }

    /// Look up a relationship by model and relationship name
    pub fn relationship(&self, model_name: &str, name: &str) -> Option<RelationshipMetadata> {
        self.relationships.get(model_name)?.get(name).cloned()
    }

    /// Check if a relationship is declared
    pub fn has_relationship(&self, model_name: &str, name: &str) -> bool {
        self.relationships
            .get(model_name)
            .map(|relationships| relationships.contains_key(name))
            .unwrap_or(false)
    }

    /// All relationship names declared on a model
    pub fn relationship_names(&self, model_name: &str) -> Vec<String> {
        self.relationships
            .get(model_name)
            .map(|relationships| relationships.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships
            .iter()
            .map(|entry| entry.value().len())
            .sum()
    }
}
