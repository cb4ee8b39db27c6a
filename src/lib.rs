//! # where-has: association filters as correlated subqueries
//!
//! Filters parent records by conditions on their associated records without
//! loading those records: an arbitrary chain of declared relationships
//! (direct links, polymorphic links, many-to-many junctions, through
//! compositions) compiles into a single correlated subquery with EXISTS,
//! NOT EXISTS or COUNT-comparison semantics, reproducing the filtering,
//! ordering and limiting an ORM would apply if the association were actually
//! traversed.
//!
//! Compilation is a pure, synchronous function of the registered metadata;
//! the only optional I/O is the discriminator probe of the `Probe`
//! polymorphic strategy.

pub mod compiler;
pub mod error;
pub mod metadata;
pub mod operators;
pub mod options;
pub mod query;

// Re-export the public surface
pub use compiler::TypeProbe;
pub use error::{WhereHasError, WhereHasResult};
pub use metadata::{
    ModelDef, ModelRegistry, PivotConfig, PolymorphicConfig, RelationshipKind,
    RelationshipMetadata, ThroughConfig,
};
pub use operators::{Compiler, CountSide};
pub use options::{CompileOptions, DialectCapabilities, PolymorphicStrategy};
pub use query::{scope_fn, Condition, OrderDirection, QueryOperator, Scope, ScopeFn};
