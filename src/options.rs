//! Compilation options and dialect capabilities
//!
//! Options are an explicit struct threaded through the operator surface and
//! defaulted at the call boundary. There is no global mutable default state.

use crate::query::Condition;

/// How a polymorphic belongs-to step resolves its candidate target types
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PolymorphicStrategy {
    /// Fail immediately; the caller must pick a strategy
    #[default]
    Raise,
    /// Discover candidate types with a distinct-values probe of the discriminator column
    Probe,
    /// Use exactly these target model names, no probe
    Explicit(Vec<String>),
    /// As `Explicit`, but AND each candidate's fragment with its own condition
    Mapping(Vec<(String, Condition)>),
}

impl PolymorphicStrategy {
    /// Returns true when the step can be compiled without further caller input
    pub fn is_resolved(&self) -> bool {
        !matches!(self, PolymorphicStrategy::Raise)
    }
}

/// What the target SQL dialect can express, queried once per compile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectCapabilities {
    /// Whether a correlated subquery may carry LIMIT/OFFSET
    pub supports_limited_correlated_subquery: bool,
    /// Whether `(a, b) = (c, d)` row constructors are accepted in join predicates
    pub supports_row_constructor_composite_keys: bool,
}

impl Default for DialectCapabilities {
    fn default() -> Self {
        Self::postgres()
    }
}

impl DialectCapabilities {
    pub fn postgres() -> Self {
        Self {
            supports_limited_correlated_subquery: true,
            supports_row_constructor_composite_keys: true,
        }
    }

    pub fn sqlite() -> Self {
        Self {
            supports_limited_correlated_subquery: true,
            supports_row_constructor_composite_keys: false,
        }
    }

    /// MySQL rejects LIMIT inside IN/ALL/ANY subqueries
    pub fn mysql() -> Self {
        Self {
            supports_limited_correlated_subquery: false,
            supports_row_constructor_composite_keys: true,
        }
    }
}

/// Per-call compilation options
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Drop limit/offset-derived truncation entirely (needed when the dialect
    /// cannot express row-limited correlated subqueries)
    pub ignore_limit: bool,
    /// Always wrap position-restricted fragments with the primary-key IN-list
    /// strategy, even when aliasing a derived table would be legal
    pub never_alias_limit: bool,
    /// Resolution strategy for polymorphic belongs-to steps
    pub poly_belongs_to: PolymorphicStrategy,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore_limit(mut self, ignore_limit: bool) -> Self {
        self.ignore_limit = ignore_limit;
        self
    }

    pub fn with_never_alias_limit(mut self, never_alias_limit: bool) -> Self {
        self.never_alias_limit = never_alias_limit;
        self
    }

    pub fn with_poly_belongs_to(mut self, strategy: PolymorphicStrategy) -> Self {
        self.poly_belongs_to = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategy_is_raise() {
        let options = CompileOptions::new();
        assert_eq!(options.poly_belongs_to, PolymorphicStrategy::Raise);
        assert!(!options.poly_belongs_to.is_resolved());
        assert!(!options.ignore_limit);
    }

    #[test]
    fn test_options_builder() {
        let options = CompileOptions::new()
            .with_ignore_limit(true)
            .with_poly_belongs_to(PolymorphicStrategy::Explicit(vec!["Post".to_string()]));
        assert!(options.ignore_limit);
        assert!(options.poly_belongs_to.is_resolved());
    }

    #[test]
    fn test_dialect_capabilities() {
        assert!(DialectCapabilities::postgres().supports_limited_correlated_subquery);
        assert!(!DialectCapabilities::mysql().supports_limited_correlated_subquery);
    }
}
