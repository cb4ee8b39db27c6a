//! Association-path resolution
//!
//! Expands a named path of relationships into an ordered chain of primitive
//! steps. Through-relationships flatten recursively (source half after the
//! through half, walking outward from the origin); many-to-many links stay a
//! single fused step so their pivot pair is never split from the target half.

use std::fmt;

use tracing::debug;

use crate::error::{WhereHasError, WhereHasResult};
use crate::metadata::{ModelDef, ModelRegistry, RelationshipKind, RelationshipMetadata};
use crate::options::CompileOptions;
use crate::query::{Scope, ScopeFn};

/// One primitive step of a resolved chain
#[derive(Clone)]
pub struct ChainStep {
    /// Model on the origin side of this step
    pub source_model: String,
    /// The primitive relationship walked
    pub rel: RelationshipMetadata,
    /// Target model definition; None for a polymorphic belongs-to
    pub target: Option<ModelDef>,
    /// Alias for the target table when it collides with the parent's name
    pub alias: Option<String>,
    /// Effective name of the parent step's table, for correlation predicates
    pub parent_effective: String,
    /// Scopes carried down from enclosing through-relationships
    pub carried_scopes: Vec<ScopeFn>,
    /// A has-one-through link caps its target step at one row
    pub force_single: bool,
}

impl fmt::Debug for ChainStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainStep")
            .field("source_model", &self.source_model)
            .field("rel", &self.rel)
            .field("target", &self.target)
            .field("alias", &self.alias)
            .field("parent_effective", &self.parent_effective)
            .field(
                "carried_scopes",
                &format_args!("<{} scope fns>", self.carried_scopes.len()),
            )
            .field("force_single", &self.force_single)
            .finish()
    }
}

impl ChainStep {
    /// The name this step's columns qualify against
    pub fn effective_table(&self) -> String {
        match (&self.alias, &self.target) {
            (Some(alias), _) => alias.clone(),
            (None, Some(target)) => target.qualified_table(),
            // Polymorphic step: table depends on the candidate; the
            // dispatcher substitutes per-candidate names.
            (None, None) => String::new(),
        }
    }
}

/// An association path resolved to primitive steps, ordered target-most first
#[derive(Debug, Clone)]
pub struct ResolvedChain {
    pub steps: Vec<ChainStep>,
    pub origin_model: String,
}

impl ResolvedChain {
    /// The deepest step - the association target the caller's condition applies to
    pub fn target_step(&self) -> &ChainStep {
        &self.steps[0]
    }
}

/// Resolve an association path on `origin` into a chain of primitive steps
pub fn resolve(
    registry: &ModelRegistry,
    origin: &str,
    path: &[&str],
    options: &CompileOptions,
) -> WhereHasResult<ResolvedChain> {
    if path.is_empty() {
        return Err(WhereHasError::Configuration(
            "Association path cannot be empty".to_string(),
        ));
    }

    let origin_def = registry.model(origin).ok_or_else(|| {
        WhereHasError::Configuration(format!("Origin model '{}' is not registered", origin))
    })?;

    // Build in walk order (origin outward), then reverse into chain order.
    let mut walked: Vec<ChainStep> = Vec::new();
    let mut current_model = origin.to_string();

    for (index, name) in path.iter().enumerate() {
        let rel = registry.relationship(&current_model, name).ok_or_else(|| {
            WhereHasError::AssociationNotFound {
                model: current_model.clone(),
                association: name.to_string(),
            }
        })?;

        let expanded = expand(registry, &current_model, rel)?;
        let Some(last) = expanded.last() else {
            return Err(WhereHasError::Configuration(format!(
                "Association '{}' resolved to an empty chain",
                name
            )));
        };

        if last.rel.is_polymorphic_owner() {
            // The target type varies per row, so later path names would have
            // no fixed model to resolve against.
            if index + 1 != path.len() {
                return Err(WhereHasError::UnsupportedPolymorphicOwn(format!(
                    "association '{}' on model '{}' must be the final step of a path",
                    last.rel.name, last.source_model
                )));
            }
            if !options.poly_belongs_to.is_resolved() {
                return Err(WhereHasError::UnsupportedPolymorphicOwn(format!(
                    "association '{}' on model '{}'",
                    last.rel.name, last.source_model
                )));
            }
        } else if let Some(target) = &last.target {
            current_model = target.name.clone();
        }

        walked.extend(expanded);
    }

    assign_aliases(&origin_def, &mut walked);

    debug!(
        origin = origin,
        path = ?path,
        steps = walked.len(),
        "resolved association chain"
    );

    walked.reverse();
    Ok(ResolvedChain {
        steps: walked,
        origin_model: origin.to_string(),
    })
}

/// Expand one declared relationship into primitive steps, in walk order
fn expand(
    registry: &ModelRegistry,
    source_model: &str,
    rel: RelationshipMetadata,
) -> WhereHasResult<Vec<ChainStep>> {
    let mut expanding = Vec::new();
    expand_guarded(registry, source_model, rel, &mut expanding)
}

/// `expanding` holds the through-relationships currently being flattened;
/// re-entering one of them means the declaration graph is cyclic
fn expand_guarded(
    registry: &ModelRegistry,
    source_model: &str,
    rel: RelationshipMetadata,
    expanding: &mut Vec<String>,
) -> WhereHasResult<Vec<ChainStep>> {
    let Some(through) = rel.through.clone() else {
        return Ok(vec![primitive_step(registry, source_model, rel)?]);
    };

    let key = format!("{}.{}", source_model, rel.name);
    if expanding.contains(&key) {
        return Err(WhereHasError::Configuration(format!(
            "Through-relationship cycle detected at '{}' on model '{}'",
            rel.name, source_model
        )));
    }
    expanding.push(key);

    // A through-relationship's own scopes may filter but never position-restrict.
    check_through_truncation(&rel)?;

    let through_rel = registry
        .relationship(source_model, &through.through)
        .ok_or_else(|| WhereHasError::AssociationNotFound {
            model: source_model.to_string(),
            association: through.through.clone(),
        })?;

    let mut steps = expand_guarded(registry, source_model, through_rel, expanding)?;
    let through_target = steps
        .last()
        .and_then(|step| step.target.as_ref())
        .ok_or_else(|| {
            WhereHasError::Configuration(format!(
                "Through half '{}' of '{}' must resolve to a fixed target model",
                through.through, rel.name
            ))
        })?
        .name
        .clone();

    let source_rel = registry
        .relationship(&through_target, &through.source)
        .ok_or_else(|| WhereHasError::AssociationNotFound {
            model: through_target.clone(),
            association: through.source.clone(),
        })?;

    let mut source_steps = expand_guarded(registry, &through_target, source_rel, expanding)?;

    // The through link's own scopes apply at the target-most step of its
    // source half, ordering stripped; a has-one-through caps that step at one.
    if let Some(target_step) = source_steps.last_mut() {
        target_step.carried_scopes.extend(rel.scopes.iter().cloned());
        if rel.kind == RelationshipKind::HasOne {
            target_step.force_single = true;
        }
    }

    steps.extend(source_steps);
    expanding.pop();
    Ok(steps)
}

fn primitive_step(
    registry: &ModelRegistry,
    source_model: &str,
    rel: RelationshipMetadata,
) -> WhereHasResult<ChainStep> {
    let target = match &rel.target_model {
        Some(model_name) => Some(registry.model(model_name).ok_or_else(|| {
            WhereHasError::Configuration(format!(
                "Relationship '{}' targets unregistered model '{}'",
                rel.name, model_name
            ))
        })?),
        None => None,
    };

    Ok(ChainStep {
        source_model: source_model.to_string(),
        rel,
        target,
        alias: None,
        parent_effective: String::new(),
        carried_scopes: Vec::new(),
        force_single: false,
    })
}

/// Reject a through-relationship whose own declaration carries limit/offset
fn check_through_truncation(rel: &RelationshipMetadata) -> WhereHasResult<()> {
    let mut has_limit = rel.limit.is_some();
    let mut has_offset = rel.offset.is_some();
    for scope in &rel.scopes {
        let probe = scope(Scope::new(&rel.name));
        has_limit = has_limit || probe.limit.is_some();
        has_offset = has_offset || probe.offset.is_some();
    }
    if has_limit {
        return Err(WhereHasError::LimitFromThroughScope(rel.name.clone()));
    }
    if has_offset {
        return Err(WhereHasError::OffsetFromThroughScope(rel.name.clone()));
    }
    Ok(())
}

/// Walk origin-outward, recording each step's parent name and aliasing a
/// step's table when it would shadow that parent in the nested subquery
fn assign_aliases(origin: &ModelDef, walked: &mut [ChainStep]) {
    let mut parent_effective = origin.qualified_table();
    for step in walked.iter_mut() {
        step.parent_effective = parent_effective.clone();
        if let Some(target) = &step.target {
            if target.qualified_table() == parent_effective {
                step.alias = Some(format!("{}_sub", target.table));
            }
        }
        // Polymorphic steps are always chain-final; their per-candidate
        // names are resolved by the dispatcher.
        parent_effective = step.effective_table();
    }
}
