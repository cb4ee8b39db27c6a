//! Polymorphic belongs-to dispatch
//!
//! A polymorphic owning step has no fixed target type; the discriminator
//! column names it per row. Dispatch expands such a step into one correlated
//! fragment per candidate type, each carrying its own key equality plus a
//! discriminator equality against that type's name. The caller picks how
//! candidates are found via [`PolymorphicStrategy`].

use tracing::warn;

use crate::error::{WhereHasError, WhereHasResult};
use crate::metadata::ModelRegistry;
use crate::options::{CompileOptions, DialectCapabilities, PolymorphicStrategy};
use crate::query::{Condition, Scope};

use super::resolver::ChainStep;
use super::step::{build_step_scope, CallerInput};

/// Blocking read of the distinct type names stored in a discriminator column
pub trait TypeProbe: Send + Sync {
    fn distinct_values(&self, table: &str, column: &str) -> WhereHasResult<Vec<String>>;
}

/// Expand a polymorphic belongs-to step into per-candidate fragments
pub fn dispatch(
    step: &ChainStep,
    registry: &ModelRegistry,
    caller: Option<&CallerInput<'_>>,
    options: &CompileOptions,
    capabilities: &DialectCapabilities,
    probe: Option<&dyn TypeProbe>,
) -> WhereHasResult<Vec<Scope>> {
    let polymorphic = step.rel.polymorphic.as_ref().ok_or_else(|| {
        WhereHasError::Configuration(format!(
            "Relationship '{}' dispatched as polymorphic without a discriminator",
            step.rel.name
        ))
    })?;

    let candidates: Vec<(String, Option<Condition>)> = match &options.poly_belongs_to {
        PolymorphicStrategy::Raise => {
            return Err(WhereHasError::UnsupportedPolymorphicOwn(format!(
                "association '{}' on model '{}'",
                step.rel.name, step.source_model
            )));
        }
        PolymorphicStrategy::Probe => {
            let probe = probe.ok_or_else(|| {
                WhereHasError::Configuration(
                    "Probe strategy selected but no type probe configured".to_string(),
                )
            })?;
            let source = registry.model(&step.source_model).ok_or_else(|| {
                WhereHasError::Configuration(format!(
                    "Source model '{}' is not registered",
                    step.source_model
                ))
            })?;
            let mut discovered =
                probe.distinct_values(&source.qualified_table(), &polymorphic.type_column)?;
            // Deterministic candidate order regardless of probe row order.
            discovered.sort();
            discovered.dedup();
            discovered.into_iter().map(|name| (name, None)).collect()
        }
        PolymorphicStrategy::Explicit(types) => {
            types.iter().map(|name| (name.clone(), None)).collect()
        }
        PolymorphicStrategy::Mapping(pairs) => pairs
            .iter()
            .map(|(name, condition)| (name.clone(), Some(condition.clone())))
            .collect(),
    };

    let mut fragments = Vec::with_capacity(candidates.len());
    for (type_name, extra) in candidates {
        if !polymorphic.candidate_types.is_empty()
            && !polymorphic.candidate_types.contains(&type_name)
        {
            // The fragment still compiles; it can never match a row, so it is
            // a no-op at runtime. Flag the likely misconfiguration.
            warn!(
                association = %step.rel.name,
                candidate = %type_name,
                "polymorphic candidate is outside the declared candidate types"
            );
        }

        let target = registry
            .model(&type_name)
            .ok_or_else(|| WhereHasError::PolymorphicTargetHasNoTable(type_name.clone()))?;

        let alias = if target.qualified_table() == step.parent_effective {
            Some(format!("{}_sub", target.table))
        } else {
            None
        };

        let extra_conditions = extra.into_iter().collect();
        fragments.push(build_step_scope(
            step,
            &target,
            alias,
            extra_conditions,
            None,
            caller,
            options,
            capabilities,
        )?);
    }

    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ModelDef, PolymorphicConfig, RelationshipMetadata};

    struct FixedProbe(Vec<&'static str>);

    impl TypeProbe for FixedProbe {
        fn distinct_values(&self, _table: &str, _column: &str) -> WhereHasResult<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    fn poly_step(registry: &ModelRegistry) -> ChainStep {
        registry.register_model(ModelDef::new("Picture", "pictures")).unwrap();
        registry.register_model(ModelDef::new("Post", "posts")).unwrap();
        registry.register_model(ModelDef::new("Product", "products")).unwrap();
        let rel = RelationshipMetadata::belongs_to_polymorphic(
            "imageable",
            PolymorphicConfig::new("imageable_type", "imageable_id"),
        );
        ChainStep {
            source_model: "Picture".to_string(),
            rel,
            target: None,
            alias: None,
            parent_effective: "pictures".to_string(),
            carried_scopes: Vec::new(),
            force_single: false,
        }
    }

    fn dispatch_with(
        registry: &ModelRegistry,
        step: &ChainStep,
        strategy: PolymorphicStrategy,
        probe: Option<&dyn TypeProbe>,
    ) -> WhereHasResult<Vec<Scope>> {
        let options = CompileOptions::new().with_poly_belongs_to(strategy);
        dispatch(
            step,
            registry,
            None,
            &options,
            &DialectCapabilities::postgres(),
            probe,
        )
    }

    #[test]
    fn test_explicit_candidates() {
        let registry = ModelRegistry::new();
        let step = poly_step(&registry);
        let fragments = dispatch_with(
            &registry,
            &step,
            PolymorphicStrategy::Explicit(vec!["Post".to_string(), "Product".to_string()]),
            None,
        )
        .unwrap();

        assert_eq!(fragments.len(), 2);
        assert_eq!(
            fragments[0].to_sql(),
            "SELECT * FROM posts WHERE posts.id = pictures.imageable_id \
             AND pictures.imageable_type = 'Post'"
        );
        assert_eq!(
            fragments[1].to_sql(),
            "SELECT * FROM products WHERE products.id = pictures.imageable_id \
             AND pictures.imageable_type = 'Product'"
        );
    }

    #[test]
    fn test_empty_candidate_set_yields_no_fragments() {
        let registry = ModelRegistry::new();
        let step = poly_step(&registry);
        let fragments =
            dispatch_with(&registry, &step, PolymorphicStrategy::Explicit(vec![]), None).unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_probe_discovers_and_sorts_candidates() {
        let registry = ModelRegistry::new();
        let step = poly_step(&registry);
        let probe = FixedProbe(vec!["Product", "Post", "Product"]);
        let fragments =
            dispatch_with(&registry, &step, PolymorphicStrategy::Probe, Some(&probe)).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].to_sql().contains("FROM posts"));
        assert!(fragments[1].to_sql().contains("FROM products"));
    }

    #[test]
    fn test_probe_strategy_without_probe_fails() {
        let registry = ModelRegistry::new();
        let step = poly_step(&registry);
        let err = dispatch_with(&registry, &step, PolymorphicStrategy::Probe, None).unwrap_err();
        assert!(matches!(err, WhereHasError::Configuration(_)));
    }

    #[test]
    fn test_unregistered_candidate_fails() {
        let registry = ModelRegistry::new();
        let step = poly_step(&registry);
        let err = dispatch_with(
            &registry,
            &step,
            PolymorphicStrategy::Explicit(vec!["Widget".to_string()]),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            WhereHasError::PolymorphicTargetHasNoTable("Widget".to_string())
        );
    }

    #[test]
    fn test_mapping_attaches_per_type_condition() {
        let registry = ModelRegistry::new();
        let step = poly_step(&registry);
        let fragments = dispatch_with(
            &registry,
            &step,
            PolymorphicStrategy::Mapping(vec![(
                "Post".to_string(),
                Condition::eq("published", true),
            )]),
            None,
        )
        .unwrap();
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].to_sql().ends_with("AND published = true"));
    }

    #[test]
    fn test_raise_strategy_fails() {
        let registry = ModelRegistry::new();
        let step = poly_step(&registry);
        let err = dispatch_with(&registry, &step, PolymorphicStrategy::Raise, None).unwrap_err();
        assert!(matches!(err, WhereHasError::UnsupportedPolymorphicOwn(_)));
    }
}
