//! Chain nesting
//!
//! Walks a resolved chain from the target-most step back to the step adjacent
//! to the origin record, building each step's fragment and nesting the deeper
//! fragment inside it: as an `EXISTS (SELECT 1 ...)` predicate for existence
//! templates, or as a `SUM((<count subquery>))` projection so counts
//! aggregate correctly across multi-hop chains.

use crate::error::{WhereHasError, WhereHasResult};
use crate::metadata::ModelRegistry;
use crate::options::{CompileOptions, DialectCapabilities};
use crate::query::{Condition, Scope};

use super::polymorphic::{dispatch, TypeProbe};
use super::resolver::ResolvedChain;
use super::step::{build_step_scope, CallerInput};

/// Which SQL template wraps deeper fragments into their parent step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestTemplate {
    /// `EXISTS (SELECT 1 FROM <fragment>)`
    Exists,
    /// `SELECT SUM((<fragment as count subquery>))`
    Count,
}

/// Nest a resolved chain into its top-level correlated fragment(s).
///
/// The result has more than one fragment only when the chain is a single
/// polymorphic belongs-to step: each candidate type keeps its own fragment,
/// and the operator surface OR-combines (exists) or adds (count) them.
pub fn nest_chain(
    chain: &ResolvedChain,
    registry: &ModelRegistry,
    caller: Option<&CallerInput<'_>>,
    template: NestTemplate,
    options: &CompileOptions,
    capabilities: &DialectCapabilities,
    probe: Option<&dyn TypeProbe>,
) -> WhereHasResult<Vec<Scope>> {
    let mut fragments: Vec<Scope> = Vec::new();

    for (depth, step) in chain.steps.iter().enumerate() {
        let step_caller = if depth == 0 { caller } else { None };

        if depth == 0 {
            if step.rel.is_polymorphic_owner() {
                fragments = dispatch(step, registry, step_caller, options, capabilities, probe)?;
            } else {
                let target = step.target.as_ref().ok_or_else(|| {
                    WhereHasError::Configuration(format!(
                        "Step '{}' has no resolved target model",
                        step.rel.name
                    ))
                })?;
                fragments = vec![build_step_scope(
                    step,
                    target,
                    step.alias.clone(),
                    Vec::new(),
                    None,
                    step_caller,
                    options,
                    capabilities,
                )?];
            }
            fragments = match template {
                NestTemplate::Exists => {
                    fragments.into_iter().map(|f| f.select("1")).collect()
                }
                NestTemplate::Count => {
                    fragments.into_iter().map(|f| f.select("COUNT(*)")).collect()
                }
            };
            continue;
        }

        let target = step.target.as_ref().ok_or_else(|| {
            WhereHasError::Configuration(format!(
                "Step '{}' has no resolved target model",
                step.rel.name
            ))
        })?;

        let nested = match template {
            NestTemplate::Exists => Some(existence_of(&fragments)),
            NestTemplate::Count => None,
        };

        let mut scope = build_step_scope(
            step,
            target,
            step.alias.clone(),
            Vec::new(),
            nested,
            None,
            options,
            capabilities,
        )?;

        scope = match template {
            NestTemplate::Exists => scope.select("1"),
            NestTemplate::Count => scope.select(&sum_of(&fragments)),
        };

        fragments = vec![scope];
    }

    Ok(fragments)
}

/// OR-combination of EXISTS over each deeper fragment; empty is constant false
fn existence_of(fragments: &[Scope]) -> Condition {
    Condition::Any(
        fragments
            .iter()
            .map(|fragment| Condition::exists(fragment.to_sql()))
            .collect(),
    )
}

/// SUM projection aggregating the deeper count subqueries per current row
fn sum_of(fragments: &[Scope]) -> String {
    match fragments {
        [] => "0".to_string(),
        [single] => format!("SUM(({}))", single.to_sql()),
        _ => {
            let added: Vec<String> = fragments
                .iter()
                .map(|fragment| format!("COALESCE(({}), 0)", fragment.to_sql()))
                .collect();
            format!("SUM({})", added.join(" + "))
        }
    }
}
