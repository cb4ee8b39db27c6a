//! Operator surface - the public association filters
//!
//! Three operators, each compiling an association path into one composable
//! SQL predicate insertable into any WHERE clause: existence, absence, and
//! count comparison. `*_sql` variants return the serialized string for
//! embedding in hand-written SQL.

use std::sync::Arc;

use tracing::debug;

use crate::compiler::nester::{nest_chain, NestTemplate};
use crate::compiler::polymorphic::TypeProbe;
use crate::compiler::resolver::resolve;
use crate::compiler::step::CallerInput;
use crate::error::{WhereHasError, WhereHasResult};
use crate::metadata::ModelRegistry;
use crate::options::{CompileOptions, DialectCapabilities};
use crate::query::{Condition, Scope, ScopeFn};

/// One side of a count comparison
#[derive(Debug, Clone, PartialEq)]
pub enum CountSide {
    /// A literal count
    Value(i64),
    /// A range of counts; `exclusive_end` marks a half-open upper bound
    Range {
        start: Option<i64>,
        end: Option<i64>,
        exclusive_end: bool,
    },
    /// The association path whose leaf rows are counted
    Assoc(Vec<String>),
}

impl CountSide {
    /// Shorthand for the association side of a comparison
    pub fn assoc(path: &[&str]) -> Self {
        CountSide::Assoc(path.iter().map(|s| s.to_string()).collect())
    }
}

impl From<i64> for CountSide {
    fn from(value: i64) -> Self {
        CountSide::Value(value)
    }
}

impl From<std::ops::Range<i64>> for CountSide {
    fn from(range: std::ops::Range<i64>) -> Self {
        CountSide::Range {
            start: Some(range.start),
            end: Some(range.end),
            exclusive_end: true,
        }
    }
}

impl From<std::ops::RangeInclusive<i64>> for CountSide {
    fn from(range: std::ops::RangeInclusive<i64>) -> Self {
        CountSide::Range {
            start: Some(*range.start()),
            end: Some(*range.end()),
            exclusive_end: false,
        }
    }
}

impl From<std::ops::RangeFrom<i64>> for CountSide {
    fn from(range: std::ops::RangeFrom<i64>) -> Self {
        CountSide::Range {
            start: Some(range.start),
            end: None,
            exclusive_end: false,
        }
    }
}

impl From<std::ops::RangeTo<i64>> for CountSide {
    fn from(range: std::ops::RangeTo<i64>) -> Self {
        CountSide::Range {
            start: None,
            end: Some(range.end),
            exclusive_end: true,
        }
    }
}

impl From<std::ops::RangeToInclusive<i64>> for CountSide {
    fn from(range: std::ops::RangeToInclusive<i64>) -> Self {
        CountSide::Range {
            start: None,
            end: Some(range.end),
            exclusive_end: false,
        }
    }
}

/// Association-filter compiler over a model registry
#[derive(Clone)]
pub struct Compiler<'a> {
    registry: &'a ModelRegistry,
    capabilities: DialectCapabilities,
    probe: Option<Arc<dyn TypeProbe>>,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self {
            registry,
            capabilities: DialectCapabilities::default(),
            probe: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: DialectCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Supply the discriminator probe the `Probe` polymorphic strategy uses
    pub fn with_type_probe(mut self, probe: Arc<dyn TypeProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Predicate matching origin rows with at least one qualifying chain
    pub fn where_has(
        &self,
        origin: &str,
        path: &[&str],
        condition: Option<Condition>,
        block: Option<&ScopeFn>,
        options: &CompileOptions,
    ) -> WhereHasResult<Condition> {
        debug!(origin, ?path, "compiling association-exists predicate");
        let fragments = self.compile(origin, path, condition, block, NestTemplate::Exists, options)?;
        Ok(Condition::Any(
            fragments
                .iter()
                .map(|fragment| Condition::exists(fragment.to_sql()))
                .collect(),
        ))
    }

    /// Predicate matching origin rows with no qualifying chain
    pub fn where_doesnt_have(
        &self,
        origin: &str,
        path: &[&str],
        condition: Option<Condition>,
        block: Option<&ScopeFn>,
        options: &CompileOptions,
    ) -> WhereHasResult<Condition> {
        debug!(origin, ?path, "compiling association-not-exists predicate");
        let fragments = self.compile(origin, path, condition, block, NestTemplate::Exists, options)?;
        Ok(Condition::All(
            fragments
                .iter()
                .map(|fragment| Condition::not_exists(fragment.to_sql()))
                .collect(),
        ))
    }

    /// Predicate comparing the number of qualifying leaf rows to a literal or
    /// range. Either side may be the association; the comparison is normalized
    /// so the literal ends up on the left, flipping the operator as needed.
    pub fn where_has_count(
        &self,
        origin: &str,
        left: CountSide,
        operator: &str,
        right: CountSide,
        condition: Option<Condition>,
        block: Option<&ScopeFn>,
        options: &CompileOptions,
    ) -> WhereHasResult<Condition> {
        let (literal, operator, path) = normalize_sides(left, operator, right)?;
        let path_refs: Vec<&str> = path.iter().map(String::as_str).collect();
        debug!(origin, ?path_refs, operator, "compiling association-count predicate");

        let fragments =
            self.compile(origin, &path_refs, condition, block, NestTemplate::Count, options)?;
        let count_expr = count_expression(&fragments);

        let sql = match literal {
            CountSide::Value(value) => format!("{} {} {}", value, operator, count_expr),
            CountSide::Range { start, end, exclusive_end } => {
                range_predicate(&count_expr, &operator, start, end, exclusive_end)?
            }
            CountSide::Assoc(_) => {
                return Err(WhereHasError::Comparison(
                    "Exactly one side of a count comparison must be an association".to_string(),
                ))
            }
        };
        Ok(Condition::raw(&sql))
    }

    /// SQL-string variant of [`Compiler::where_has`]
    pub fn where_has_sql(
        &self,
        origin: &str,
        path: &[&str],
        condition: Option<Condition>,
        options: &CompileOptions,
    ) -> WhereHasResult<String> {
        Ok(self.where_has(origin, path, condition, None, options)?.to_sql())
    }

    /// SQL-string variant of [`Compiler::where_doesnt_have`]
    pub fn where_doesnt_have_sql(
        &self,
        origin: &str,
        path: &[&str],
        condition: Option<Condition>,
        options: &CompileOptions,
    ) -> WhereHasResult<String> {
        Ok(self
            .where_doesnt_have(origin, path, condition, None, options)?
            .to_sql())
    }

    /// SQL-string variant of [`Compiler::where_has_count`]
    pub fn where_has_count_sql(
        &self,
        origin: &str,
        left: CountSide,
        operator: &str,
        right: CountSide,
        condition: Option<Condition>,
        options: &CompileOptions,
    ) -> WhereHasResult<String> {
        Ok(self
            .where_has_count(origin, left, operator, right, condition, None, options)?
            .to_sql())
    }

    fn compile(
        &self,
        origin: &str,
        path: &[&str],
        condition: Option<Condition>,
        block: Option<&ScopeFn>,
        template: NestTemplate,
        options: &CompileOptions,
    ) -> WhereHasResult<Vec<Scope>> {
        let chain = resolve(self.registry, origin, path, options)?;
        let caller = CallerInput {
            condition: condition.as_ref(),
            block,
        };
        nest_chain(
            &chain,
            self.registry,
            Some(&caller),
            template,
            options,
            &self.capabilities,
            self.probe.as_deref(),
        )
    }

}

/// Put the literal side on the left, flipping the operator when the caller
/// gave the association first, and normalize operator symbols
fn normalize_sides(
    left: CountSide,
    operator: &str,
    right: CountSide,
) -> WhereHasResult<(CountSide, String, Vec<String>)> {
    let normalized = normalize_operator(operator)?;
    match (left, right) {
        (CountSide::Assoc(path), literal @ (CountSide::Value(_) | CountSide::Range { .. })) => {
            Ok((literal, flip_operator(&normalized), path))
        }
        (literal @ (CountSide::Value(_) | CountSide::Range { .. }), CountSide::Assoc(path)) => {
            Ok((literal, normalized, path))
        }
        _ => Err(WhereHasError::Comparison(
            "Exactly one side of a count comparison must be an association".to_string(),
        )),
    }
}

fn normalize_operator(operator: &str) -> WhereHasResult<String> {
    match operator {
        "=" | "==" => Ok("=".to_string()),
        "!=" | "<>" => Ok("<>".to_string()),
        "<" | "<=" | ">" | ">=" => Ok(operator.to_string()),
        other => Err(WhereHasError::Comparison(format!(
            "Unsupported count operator '{}'",
            other
        ))),
    }
}

fn flip_operator(operator: &str) -> String {
    match operator {
        "<" => ">".to_string(),
        "<=" => ">=".to_string(),
        ">" => "<".to_string(),
        ">=" => "<=".to_string(),
        symmetric => symmetric.to_string(),
    }
}

/// The COALESCE-wrapped count expression; an empty aggregate is NULL and must
/// compare as zero
fn count_expression(fragments: &[Scope]) -> String {
    match fragments {
        [] => "0".to_string(),
        [single] => format!("COALESCE(({}), 0)", single.to_sql()),
        _ => {
            let added: Vec<String> = fragments
                .iter()
                .map(|fragment| format!("COALESCE(({}), 0)", fragment.to_sql()))
                .collect();
            format!("({})", added.join(" + "))
        }
    }
}

/// Rewrite a range comparand into BETWEEN / NOT BETWEEN / open-ended bounds.
/// Counts are integral, so an exclusive end folds into `end - 1`.
fn range_predicate(
    count_expr: &str,
    operator: &str,
    start: Option<i64>,
    end: Option<i64>,
    exclusive_end: bool,
) -> WhereHasResult<String> {
    if operator != "=" && operator != "<>" {
        return Err(WhereHasError::Comparison(format!(
            "Ranges only support equality comparisons, got '{}'",
            operator
        )));
    }
    let negated = operator == "<>";
    let end = if exclusive_end { end.map(|e| e - 1) } else { end };

    Ok(match (start, end) {
        (Some(start), Some(end)) => {
            let keyword = if negated { "NOT BETWEEN" } else { "BETWEEN" };
            format!("{} {} {} AND {}", count_expr, keyword, start, end)
        }
        (Some(start), None) => {
            let op = if negated { "<" } else { ">=" };
            format!("{} {} {}", count_expr, op, start)
        }
        (None, Some(end)) => {
            let op = if negated { ">" } else { "<=" };
            format!("{} {} {}", count_expr, op, end)
        }
        (None, None) => (if negated { "1=0" } else { "1=1" }).to_string(),
    })
}
