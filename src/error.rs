//! Error types for association-subquery compilation
//!
//! Every failure here is a deterministic compile-time failure: either the
//! association graph is misconfigured, the caller asked for something the
//! target dialect cannot express, or a polymorphic step was left ambiguous.
//! Nothing is retried.

use std::fmt;

/// Result type alias for compilation operations
pub type WhereHasResult<T> = Result<T, WhereHasError>;

/// Error types for association-subquery compilation
#[derive(Debug, Clone, PartialEq)]
pub enum WhereHasError {
    /// A name in the association path is not declared on the current model
    AssociationNotFound { model: String, association: String },
    /// A polymorphic belongs-to step was reached without a resolution strategy
    UnsupportedPolymorphicOwn(String),
    /// The dialect cannot express a row-limited correlated subquery
    UnsupportedLimitInSubquery(String),
    /// A through-relationship's own scope declares a limit
    LimitFromThroughScope(String),
    /// A through-relationship's own scope declares an offset
    OffsetFromThroughScope(String),
    /// A polymorphic candidate type has no registered backing table
    PolymorphicTargetHasNoTable(String),
    /// Invalid relationship or model configuration
    Configuration(String),
    /// Invalid count-comparison operator or operand
    Comparison(String),
    /// The discriminator-probe read failed
    Probe(String),
}

impl fmt::Display for WhereHasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereHasError::AssociationNotFound { model, association } => {
                write!(f, "Association '{}' not found on model '{}'", association, model)
            }
            WhereHasError::UnsupportedPolymorphicOwn(msg) => {
                write!(f, "Polymorphic belongs-to needs a resolution strategy: {}", msg)
            }
            WhereHasError::UnsupportedLimitInSubquery(msg) => {
                write!(f, "Dialect does not support limits in correlated subqueries: {}", msg)
            }
            WhereHasError::LimitFromThroughScope(msg) => {
                write!(f, "Through-relationship scope may not declare a limit: {}", msg)
            }
            WhereHasError::OffsetFromThroughScope(msg) => {
                write!(f, "Through-relationship scope may not declare an offset: {}", msg)
            }
            WhereHasError::PolymorphicTargetHasNoTable(model) => {
                write!(f, "Polymorphic candidate '{}' has no registered table", model)
            }
            WhereHasError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            WhereHasError::Comparison(msg) => write!(f, "Comparison error: {}", msg),
            WhereHasError::Probe(msg) => write!(f, "Discriminator probe failed: {}", msg),
        }
    }
}

impl std::error::Error for WhereHasError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WhereHasError::AssociationNotFound {
            model: "User".to_string(),
            association: "postz".to_string(),
        };
        assert_eq!(err.to_string(), "Association 'postz' not found on model 'User'");

        let err = WhereHasError::PolymorphicTargetHasNoTable("Widget".to_string());
        assert!(err.to_string().contains("Widget"));
    }
}
