//! Relationship reflection metadata - models, links and their registry

pub mod registry;
pub mod types;

pub use registry::ModelRegistry;
pub use types::{
    ModelDef, PivotConfig, PolymorphicConfig, RelationshipKind, RelationshipMetadata,
    ThroughConfig,
};
