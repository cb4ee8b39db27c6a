//! Per-step scope building
//!
//! For one primitive relationship step this produces the correlated fragment:
//! target default scope, declared relationship scopes (last-equality-wins),
//! the join predicate back to the parent step, and - when the step is
//! position-restricted - the limit/offset/order baked into a wrapping
//! subquery so it cannot leak into outer nesting levels.

use crate::error::{WhereHasError, WhereHasResult};
use crate::metadata::{ModelDef, RelationshipKind};
use crate::options::{CompileOptions, DialectCapabilities};
use crate::query::{Condition, Scope, ScopeFn};

use super::resolver::ChainStep;

/// Caller-supplied condition and block, applied only at the target-most step
pub struct CallerInput<'a> {
    pub condition: Option<&'a Condition>,
    pub block: Option<&'a ScopeFn>,
}

/// How a position-restricted fragment gets wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WrapStrategy {
    /// Restrict the outer scope to the primary keys of the truncated query;
    /// valid for any table name
    KeyList,
    /// Use the truncated query as a derived table aliased to the plain table
    /// name; faster, but illegal for qualified tables and fused joins
    DerivedTable,
}

/// Build the correlated fragment for one step.
///
/// `target` is the resolved target model (the step's own target, or the
/// candidate a polymorphic dispatcher substitutes), `alias` its effective
/// alias, `extra_conditions` candidate-specific predicates, and `nested` the
/// already-serialized deeper fragment to embed after truncation is baked in.
pub fn build_step_scope(
    step: &ChainStep,
    target: &ModelDef,
    alias: Option<String>,
    extra_conditions: Vec<Condition>,
    nested: Option<Condition>,
    caller: Option<&CallerInput<'_>>,
    options: &CompileOptions,
    capabilities: &DialectCapabilities,
) -> WhereHasResult<Scope> {
    let mut scope = Scope::new(&target.qualified_table());
    if let Some(alias) = alias {
        scope = scope.with_alias(&alias);
    }
    let effective = scope.effective_table().to_string();

    // 1. Target default filter (its ordering may position-restrict).
    if let Some(default_scope) = &target.default_scope {
        scope = scope.apply(default_scope, true);
    }

    // 2. Fuse the join-table half of a many-to-many up front; limiting only
    // one half of the pair would produce wrong cardinality.
    if let Some(pivot) = &step.rel.pivot {
        scope = scope.join_raw(&format!(
            "INNER JOIN {} ON {}.{} = {}.{}",
            pivot.table, pivot.table, pivot.foreign_key, effective, target.primary_key
        ));
    }

    // 3. Declared scopes in order, last-equality-wins; only the relationship's
    // own designated limit/offset/order may position-restrict, so each scope's
    // ordering is stripped before merging.
    for declared in &step.rel.scopes {
        scope = scope.apply(declared, false);
    }
    for (column, direction) in &step.rel.order_by {
        scope = scope.order_by(column, *direction);
    }
    if step.rel.limit.is_some() {
        scope.limit = step.rel.limit;
    }
    if step.rel.offset.is_some() {
        scope.offset = step.rel.offset;
    }
    for carried in &step.carried_scopes {
        scope = scope.apply(carried, false);
    }

    // 4. Join predicate linking this step's rows to the parent step's rows.
    scope = attach_join_predicate(scope, step, target, &effective);
    for condition in extra_conditions {
        scope = scope.where_condition(condition);
    }

    // 5. Cardinality-specific truncation.
    match step.rel.kind {
        RelationshipKind::BelongsTo => {
            // A to-one-owned link is never position-restricted.
            scope = scope.strip_ordering();
        }
        RelationshipKind::HasOne => {
            scope.limit = Some(1);
        }
        RelationshipKind::HasMany | RelationshipKind::ManyToMany => {}
    }
    if step.force_single {
        scope.limit = Some(1);
    }

    scope = if scope.has_truncation() {
        if options.ignore_limit {
            scope.strip_ordering()
        } else if !capabilities.supports_limited_correlated_subquery {
            return Err(WhereHasError::UnsupportedLimitInSubquery(format!(
                "association '{}'; pass ignore_limit to drop the truncation",
                step.rel.name
            )));
        } else {
            wrap_truncated(scope, target, &effective, options)
        }
    } else {
        // Ordering without limit/offset cannot affect EXISTS or COUNT.
        scope.strip_ordering()
    };

    // 6. The deeper fragment and the caller's condition/block apply outside
    // the truncation wrapping: they test the rows the association selects.
    if let Some(nested) = nested {
        scope = scope.where_condition(nested);
    }
    if let Some(caller) = caller {
        if let Some(condition) = caller.condition {
            scope = scope.where_condition(condition.clone());
        }
        if let Some(block) = caller.block {
            scope = scope.apply(block, false);
        }
    }

    // 7. Residual ordering is meaningless once restriction is baked in.
    Ok(scope.strip_ordering())
}

fn attach_join_predicate(
    scope: Scope,
    step: &ChainStep,
    target: &ModelDef,
    effective: &str,
) -> Scope {
    let parent = &step.parent_effective;
    let rel = &step.rel;

    match rel.kind {
        RelationshipKind::HasMany | RelationshipKind::HasOne => {
            let mut scope = scope.where_condition(Condition::column_eq(
                &format!("{}.{}", effective, rel.foreign_key),
                &format!("{}.{}", parent, rel.local_key),
            ));
            // Polymorphic back-reference: the target row must also record the
            // parent's type in its discriminator column.
            if let Some(polymorphic) = &rel.polymorphic {
                scope = scope.where_condition(Condition::eq(
                    &format!("{}.{}", effective, polymorphic.type_column),
                    step.source_model.as_str(),
                ));
            }
            scope
        }
        RelationshipKind::BelongsTo => {
            let mut scope = scope.where_condition(Condition::column_eq(
                &format!("{}.{}", effective, rel.local_key),
                &format!("{}.{}", parent, rel.foreign_key),
            ));
            // Polymorphic owner: the parent row's discriminator must name
            // this candidate's type.
            if let Some(polymorphic) = &rel.polymorphic {
                scope = scope.where_condition(Condition::eq(
                    &format!("{}.{}", parent, polymorphic.type_column),
                    target.name.as_str(),
                ));
            }
            scope
        }
        RelationshipKind::ManyToMany => match &rel.pivot {
            Some(pivot) => scope.where_condition(Condition::column_eq(
                &format!("{}.{}", pivot.table, pivot.local_key),
                &format!("{}.{}", parent, rel.local_key),
            )),
            None => scope,
        },
    }
}

/// Bake limit/offset/order into a position-restricting wrapper and return a
/// truncation-free outer scope over the same effective name
fn wrap_truncated(
    scope: Scope,
    target: &ModelDef,
    effective: &str,
    options: &CompileOptions,
) -> Scope {
    let strategy = if options.never_alias_limit
        || target.has_qualified_table()
        || !scope.joins.is_empty()
    {
        WrapStrategy::KeyList
    } else {
        WrapStrategy::DerivedTable
    };

    let alias = scope.alias.clone();
    match strategy {
        WrapStrategy::KeyList => {
            let inner = scope
                .clone()
                .select(&format!("{}.{}", effective, target.primary_key));
            let mut outer = Scope::new(&target.qualified_table());
            outer.alias = alias;
            outer.where_condition(Condition::raw(&format!(
                "{}.{} IN ({})",
                effective,
                target.primary_key,
                inner.to_sql()
            )))
        }
        WrapStrategy::DerivedTable => {
            let mut outer = Scope::new(&target.qualified_table());
            outer.from_override = Some(format!("({}) {}", scope.to_sql(), effective));
            outer.alias = Some(effective.to_string());
            outer
        }
    }
}
