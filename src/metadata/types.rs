//! Relationship metadata - declared links between record models
//!
//! These types are the read-only reflection data the compiler walks. Models
//! and relationships are declared ahead of time in a [`ModelRegistry`];
//! nothing here is derived at query time.
//!
//! [`ModelRegistry`]: super::registry::ModelRegistry

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{WhereHasError, WhereHasResult};
use crate::query::{OrderDirection, ScopeFn};

/// The cardinality of a primitive relationship step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    /// To-one link owned by the source (foreign key on the source table)
    BelongsTo,
    /// To-one link owned by the target (foreign key on the target table)
    HasOne,
    /// To-many link (foreign key on the target table)
    HasMany,
    /// To-many link through a join table
    ManyToMany,
}

impl RelationshipKind {
    /// Returns true if this kind can match more than one row
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::ManyToMany)
    }

    /// Returns true if this kind requires a pivot table
    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::ManyToMany)
    }
}

/// Join-table configuration for many-to-many relationships
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotConfig {
    /// The pivot table name
    pub table: String,
    /// Pivot column referencing the source model
    pub local_key: String,
    /// Pivot column referencing the target model
    pub foreign_key: String,
}

impl PivotConfig {
    pub fn new(table: &str, local_key: &str, foreign_key: &str) -> Self {
        Self {
            table: table.to_string(),
            local_key: local_key.to_string(),
            foreign_key: foreign_key.to_string(),
        }
    }

    pub fn validate(&self) -> WhereHasResult<()> {
        if self.table.is_empty() {
            return Err(WhereHasError::Configuration(
                "Pivot table name cannot be empty".to_string(),
            ));
        }
        if self.local_key.is_empty() || self.foreign_key.is_empty() {
            return Err(WhereHasError::Configuration(
                "Pivot key columns cannot be empty".to_string(),
            ));
        }
        if self.local_key == self.foreign_key {
            return Err(WhereHasError::Configuration(
                "Pivot local key and foreign key must be different".to_string(),
            ));
        }
        Ok(())
    }
}

/// Discriminator configuration for polymorphic relationships
///
/// On a belongs-to, both columns live on the source table and the target type
/// varies per row. On a has-one/has-many back-reference, both columns live on
/// the target table and the discriminator must equal the source model's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolymorphicConfig {
    /// Column storing the model-type name
    pub type_column: String,
    /// Column storing the foreign key
    pub id_column: String,
    /// Legal target types for the discriminator; empty means unconstrained
    pub candidate_types: Vec<String>,
}

impl PolymorphicConfig {
    pub fn new(type_column: &str, id_column: &str) -> Self {
        Self {
            type_column: type_column.to_string(),
            id_column: id_column.to_string(),
            candidate_types: Vec::new(),
        }
    }

    pub fn with_candidate_types(mut self, types: Vec<String>) -> Self {
        self.candidate_types = types;
        self
    }

    pub fn validate(&self) -> WhereHasResult<()> {
        if self.type_column.is_empty() || self.id_column.is_empty() {
            return Err(WhereHasError::Configuration(
                "Polymorphic type and id columns cannot be empty".to_string(),
            ));
        }
        if self.type_column == self.id_column {
            return Err(WhereHasError::Configuration(
                "Polymorphic type column and id column must be different".to_string(),
            ));
        }
        Ok(())
    }
}

/// Composition of two other relationships into a through link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughConfig {
    /// Relationship on the declaring model to pass through
    pub through: String,
    /// Relationship on the through target that supplies the rows
    pub source: String,
}

impl ThroughConfig {
    pub fn new(through: &str, source: &str) -> Self {
        Self {
            through: through.to_string(),
            source: source.to_string(),
        }
    }

    pub fn validate(&self) -> WhereHasResult<()> {
        if self.through.is_empty() || self.source.is_empty() {
            return Err(WhereHasError::Configuration(
                "Through configuration must name both halves".to_string(),
            ));
        }
        Ok(())
    }
}

/// One declared relationship on a model
#[derive(Clone)]
pub struct RelationshipMetadata {
    /// Cardinality of the link
    pub kind: RelationshipKind,
    /// Name of the relationship (the path segment callers use)
    pub name: String,
    /// Target model name; None only for a polymorphic belongs-to
    pub target_model: Option<String>,
    /// Foreign key column (on the target table for has-*, on the source table
    /// for belongs-to; ignored for many-to-many, which uses the pivot pair)
    pub foreign_key: String,
    /// Owner-side key column the foreign key references (defaults to "id")
    pub local_key: String,
    /// Join-table pairing for many-to-many
    pub pivot: Option<PivotConfig>,
    /// Discriminator configuration for polymorphic links
    pub polymorphic: Option<PolymorphicConfig>,
    /// Through-composition; when set the relationship is not primitive
    pub through: Option<ThroughConfig>,
    /// Declared scopes, applied in order under last-equality-wins
    pub scopes: Vec<ScopeFn>,
    /// Declared truncation on the relationship itself
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order_by: Vec<(String, OrderDirection)>,
}

impl fmt::Debug for RelationshipMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipMetadata")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("target_model", &self.target_model)
            .field("foreign_key", &self.foreign_key)
            .field("local_key", &self.local_key)
            .field("pivot", &self.pivot)
            .field("polymorphic", &self.polymorphic)
            .field("through", &self.through)
            .field("scopes", &format_args!("<{} scope fns>", self.scopes.len()))
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("order_by", &self.order_by)
            .finish()
    }
}

impl RelationshipMetadata {
    fn base(kind: RelationshipKind, name: &str, target_model: Option<&str>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            target_model: target_model.map(str::to_string),
            foreign_key: String::new(),
            local_key: "id".to_string(),
            pivot: None,
            polymorphic: None,
            through: None,
            scopes: Vec::new(),
            limit: None,
            offset: None,
            order_by: Vec::new(),
        }
    }

    /// Declare a has-many link; `foreign_key` is the column on the target table
    pub fn has_many(name: &str, target_model: &str, foreign_key: &str) -> Self {
        let mut metadata = Self::base(RelationshipKind::HasMany, name, Some(target_model));
        metadata.foreign_key = foreign_key.to_string();
        metadata
    }

    /// Declare a has-one link; `foreign_key` is the column on the target table
    pub fn has_one(name: &str, target_model: &str, foreign_key: &str) -> Self {
        let mut metadata = Self::base(RelationshipKind::HasOne, name, Some(target_model));
        metadata.foreign_key = foreign_key.to_string();
        metadata
    }

    /// Declare a belongs-to link; `foreign_key` is the column on the source table
    pub fn belongs_to(name: &str, target_model: &str, foreign_key: &str) -> Self {
        let mut metadata = Self::base(RelationshipKind::BelongsTo, name, Some(target_model));
        metadata.foreign_key = foreign_key.to_string();
        metadata
    }

    /// Declare a polymorphic belongs-to; the target model varies per row
    pub fn belongs_to_polymorphic(name: &str, polymorphic: PolymorphicConfig) -> Self {
        let mut metadata = Self::base(RelationshipKind::BelongsTo, name, None);
        metadata.foreign_key = polymorphic.id_column.clone();
        metadata.polymorphic = Some(polymorphic);
        metadata
    }

    /// Declare a many-to-many link through a pivot table
    pub fn many_to_many(name: &str, target_model: &str, pivot: PivotConfig) -> Self {
        let mut metadata = Self::base(RelationshipKind::ManyToMany, name, Some(target_model));
        metadata.pivot = Some(pivot);
        metadata
    }

    /// Declare a has-many composed from two other relationships
    pub fn has_many_through(name: &str, through: &str, source: &str) -> Self {
        let mut metadata = Self::base(RelationshipKind::HasMany, name, None);
        metadata.through = Some(ThroughConfig::new(through, source));
        metadata
    }

    /// Declare a has-one composed from two other relationships
    pub fn has_one_through(name: &str, through: &str, source: &str) -> Self {
        let mut metadata = Self::base(RelationshipKind::HasOne, name, None);
        metadata.through = Some(ThroughConfig::new(through, source));
        metadata
    }

    /// Set the owner-side key column the foreign key references
    pub fn with_local_key(mut self, local_key: &str) -> Self {
        self.local_key = local_key.to_string();
        self
    }

    /// Attach a declared scope; scopes apply in declaration order
    pub fn with_scope(mut self, scope: ScopeFn) -> Self {
        self.scopes.push(scope);
        self
    }

    /// Mark a has-one/has-many as a polymorphic back-reference
    pub fn with_polymorphic(mut self, polymorphic: PolymorphicConfig) -> Self {
        self.polymorphic = Some(polymorphic);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    /// Returns true for a polymorphic belongs-to (target model varies per row)
    pub fn is_polymorphic_owner(&self) -> bool {
        self.kind == RelationshipKind::BelongsTo && self.polymorphic.is_some()
    }

    /// Validate the relationship metadata for consistency
    pub fn validate(&self) -> WhereHasResult<()> {
        if self.name.is_empty() {
            return Err(WhereHasError::Configuration(
                "Relationship name cannot be empty".to_string(),
            ));
        }

        if let Some(ref through) = self.through {
            through.validate()?;
            if self.pivot.is_some() || self.polymorphic.is_some() {
                return Err(WhereHasError::Configuration(format!(
                    "Through-relationship '{}' cannot carry pivot or polymorphic configuration",
                    self.name
                )));
            }
            return Ok(());
        }

        if self.kind.requires_pivot() {
            match self.pivot {
                Some(ref pivot) => pivot.validate()?,
                None => {
                    return Err(WhereHasError::Configuration(format!(
                        "Relationship '{}' of kind {:?} requires pivot configuration",
                        self.name, self.kind
                    )))
                }
            }
        } else if self.foreign_key.is_empty() {
            return Err(WhereHasError::Configuration(format!(
                "Relationship '{}' must declare a foreign key column",
                self.name
            )));
        }

        if let Some(ref polymorphic) = self.polymorphic {
            polymorphic.validate()?;
            if self.kind == RelationshipKind::ManyToMany {
                return Err(WhereHasError::Configuration(format!(
                    "Relationship '{}' cannot be both many-to-many and polymorphic",
                    self.name
                )));
            }
        }

        if self.target_model.is_none() && !self.is_polymorphic_owner() {
            return Err(WhereHasError::Configuration(format!(
                "Relationship '{}' must declare a target model",
                self.name
            )));
        }

        Ok(())
    }
}

/// One registered record model
#[derive(Clone)]
pub struct ModelDef {
    /// Model name used in association paths and discriminator columns
    pub name: String,
    /// Backing table name
    pub table: String,
    /// Optional schema/database qualifier; disables derived-table aliasing
    pub schema: Option<String>,
    /// Primary key column
    pub primary_key: String,
    /// Default filter applied to every scope of this model
    pub default_scope: Option<ScopeFn>,
}

impl fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDef")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("schema", &self.schema)
            .field("primary_key", &self.primary_key)
            .field("default_scope", &self.default_scope.is_some())
            .finish()
    }
}

impl ModelDef {
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            schema: None,
            primary_key: "id".to_string(),
            default_scope: None,
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    pub fn with_primary_key(mut self, primary_key: &str) -> Self {
        self.primary_key = primary_key.to_string();
        self
    }

    pub fn with_default_scope(mut self, scope: ScopeFn) -> Self {
        self.default_scope = Some(scope);
        self
    }

    /// The table name as it appears in FROM clauses
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.table),
            None => self.table.clone(),
        }
    }

    /// Whether the table carries a schema/database qualifier
    pub fn has_qualified_table(&self) -> bool {
        self.schema.is_some()
    }

    pub fn validate(&self) -> WhereHasResult<()> {
        if self.name.is_empty() || self.table.is_empty() {
            return Err(WhereHasError::Configuration(
                "Model name and table cannot be empty".to_string(),
            ));
        }
        if self.primary_key.is_empty() {
            return Err(WhereHasError::Configuration(format!(
                "Model '{}' must declare a primary key",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{scope_fn, Scope};

    #[test]
    fn test_kind_properties() {
        assert!(RelationshipKind::HasMany.is_collection());
        assert!(RelationshipKind::ManyToMany.is_collection());
        assert!(!RelationshipKind::HasOne.is_collection());
        assert!(!RelationshipKind::BelongsTo.is_collection());

        assert!(RelationshipKind::ManyToMany.requires_pivot());
        assert!(!RelationshipKind::HasMany.requires_pivot());
    }

    #[test]
    fn test_has_many_builder() {
        let metadata = RelationshipMetadata::has_many("comments", "Comment", "post_id")
            .with_scope(scope_fn(|s: Scope| s.where_eq("spam", false)))
            .with_limit(5);
        assert_eq!(metadata.kind, RelationshipKind::HasMany);
        assert_eq!(metadata.target_model.as_deref(), Some("Comment"));
        assert_eq!(metadata.local_key, "id");
        assert_eq!(metadata.scopes.len(), 1);
        assert_eq!(metadata.limit, Some(5));
        assert!(metadata.validate().is_ok());
    }

    #[test]
    fn test_many_to_many_requires_pivot() {
        let mut metadata = RelationshipMetadata::many_to_many(
            "tags",
            "Tag",
            PivotConfig::new("post_tags", "post_id", "tag_id"),
        );
        assert!(metadata.validate().is_ok());

        metadata.pivot = None;
        assert!(metadata.validate().is_err());
    }

    #[test]
    fn test_pivot_key_collision_rejected() {
        let pivot = PivotConfig::new("post_tags", "post_id", "post_id");
        assert!(pivot.validate().is_err());
    }

    #[test]
    fn test_polymorphic_belongs_to() {
        let metadata = RelationshipMetadata::belongs_to_polymorphic(
            "imageable",
            PolymorphicConfig::new("imageable_type", "imageable_id"),
        );
        assert!(metadata.is_polymorphic_owner());
        assert_eq!(metadata.target_model, None);
        assert_eq!(metadata.foreign_key, "imageable_id");
        assert!(metadata.validate().is_ok());
    }

    #[test]
    fn test_polymorphic_column_collision_rejected() {
        let config = PolymorphicConfig::new("imageable_id", "imageable_id");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_through_relationship() {
        let metadata = RelationshipMetadata::has_many_through("comments", "posts", "comments");
        assert!(metadata.through.is_some());
        assert!(metadata.validate().is_ok());
    }

    #[test]
    fn test_model_def() {
        let model = ModelDef::new("User", "users");
        assert_eq!(model.qualified_table(), "users");
        assert!(!model.has_qualified_table());

        let model = ModelDef::new("Audit", "audits").with_schema("admin");
        assert_eq!(model.qualified_table(), "admin.audits");
        assert!(model.has_qualified_table());
    }
}
