//! Scope - the filtered-query value correlated fragments are built from
//!
//! A `Scope` is one target table plus predicates, ordering and truncation.
//! Relationship scopes, model default scopes and caller blocks are all
//! `ScopeFn` callables transforming a fresh scope; their contributions are
//! combined with [`Scope::merge`], which implements the last-equality-wins
//! rule: a later equality on a column replaces an earlier equality on the
//! same column instead of conjoining into an unsatisfiable predicate.

use std::sync::Arc;

use serde_json::Value;

use super::types::{Condition, OrderDirection, QueryOperator};

/// A predicate-producing callable applied to a fresh scope of the target table
pub type ScopeFn = Arc<dyn Fn(Scope) -> Scope + Send + Sync>;

/// Wrap a closure as a [`ScopeFn`]
pub fn scope_fn<F>(f: F) -> ScopeFn
where
    F: Fn(Scope) -> Scope + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A filtered query over one table
#[derive(Debug, Clone)]
pub struct Scope {
    pub(crate) table: String,
    /// Replaces the FROM source entirely (derived-table wrapping)
    pub(crate) from_override: Option<String>,
    /// FROM alias; when set, columns qualify against it instead of the table
    pub(crate) alias: Option<String>,
    /// Projection override; None selects `*`
    pub(crate) select: Option<String>,
    /// Raw join clauses (fused many-to-many pairs)
    pub(crate) joins: Vec<String>,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl Scope {
    /// Create a scope selecting everything from `table`
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            from_override: None,
            alias: None,
            select: None,
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// The name outer predicates should qualify this scope's columns with
    pub fn effective_table(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    /// Qualify a column against this scope's effective table name
    pub fn qualified(&self, column: &str) -> String {
        format!("{}.{}", self.effective_table(), column)
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn select(mut self, projection: &str) -> Self {
        self.select = Some(projection.to_string());
        self
    }

    pub fn join_raw(mut self, clause: &str) -> Self {
        self.joins.push(clause.to_string());
        self
    }

    /// Push an arbitrary condition (conjoined with existing ones)
    pub fn where_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_condition(Condition::eq(column, value))
    }

    pub fn where_ne<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_condition(Condition::ne(column, value))
    }

    pub fn where_gt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_condition(Condition::compare(column, QueryOperator::GreaterThan, value))
    }

    pub fn where_lt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_condition(Condition::compare(column, QueryOperator::LessThan, value))
    }

    pub fn where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.where_condition(Condition::is_in(column, values))
    }

    pub fn where_null(self, column: &str) -> Self {
        self.where_condition(Condition::Null { column: column.to_string(), negated: false })
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.where_condition(Condition::Null { column: column.to_string(), negated: true })
    }

    pub fn where_raw(self, sql: &str) -> Self {
        self.where_condition(Condition::raw(sql))
    }

    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn has_truncation(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }

    /// Drop ordering and truncation; used for to-one-owned links, for
    /// non-canonical scopes, and after position-restriction has been baked in
    pub fn strip_ordering(mut self) -> Self {
        self.order_by.clear();
        self.limit = None;
        self.offset = None;
        self
    }

    /// Merge another scope's contributions into this one, later-wins.
    ///
    /// Equalities replace earlier equalities on the same column; every other
    /// predicate shape conjoins. Ordering appends; limit/offset/projection
    /// override when the later scope sets them.
    pub fn merge(mut self, other: Scope) -> Self {
        for condition in other.conditions {
            if let Some(column) = condition.equality_column().map(str::to_string) {
                self.conditions
                    .retain(|existing| existing.equality_column() != Some(column.as_str()));
            }
            self.conditions.push(condition);
        }
        self.joins.extend(other.joins);
        self.order_by.extend(other.order_by);
        if other.limit.is_some() {
            self.limit = other.limit;
        }
        if other.offset.is_some() {
            self.offset = other.offset;
        }
        if other.select.is_some() {
            self.select = other.select;
        }
        self
    }

    /// Apply a scope callable to a fresh scope of the same table and merge
    /// its contributions. `keep_ordering: false` strips any limit/offset/order
    /// the callable produced before merging.
    pub fn apply(self, f: &ScopeFn, keep_ordering: bool) -> Self {
        let mut fresh = Scope::new(&self.table);
        fresh.alias = self.alias.clone();
        let mut contributed = f(fresh);
        if !keep_ordering {
            contributed = contributed.strip_ordering();
        }
        self.merge(contributed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_builder_chain() {
        let scope = Scope::new("comments")
            .where_eq("spam", false)
            .where_gt("score", 3)
            .limit(5);
        assert_eq!(scope.conditions.len(), 2);
        assert_eq!(scope.limit, Some(5));
        assert!(scope.has_truncation());
    }

    #[test]
    fn test_effective_table_uses_alias() {
        let scope = Scope::new("comments").with_alias("comments_1");
        assert_eq!(scope.effective_table(), "comments_1");
        assert_eq!(scope.qualified("id"), "comments_1.id");
    }

    #[test]
    fn test_merge_last_equality_wins() {
        let base = Scope::new("comments").where_eq("status", "pending");
        let merged = base.merge(Scope::new("comments").where_eq("status", "approved"));
        assert_eq!(merged.conditions.len(), 1);
        assert_eq!(merged.conditions[0], Condition::eq("status", "approved"));
    }

    #[test]
    fn test_merge_conjoins_non_equalities() {
        let base = Scope::new("comments").where_gt("score", 1);
        let merged = base.merge(Scope::new("comments").where_gt("score", 5));
        assert_eq!(merged.conditions.len(), 2);
    }

    #[test]
    fn test_merge_overrides_truncation() {
        let base = Scope::new("comments").limit(10).offset(2);
        let merged = base.merge(Scope::new("comments").limit(3));
        assert_eq!(merged.limit, Some(3));
        // Offset untouched when the later scope does not set one
        assert_eq!(merged.offset, Some(2));
    }

    #[test]
    fn test_apply_strips_ordering_when_asked() {
        let f = scope_fn(|s: Scope| s.where_eq("spam", false).limit(7));
        let scope = Scope::new("comments").apply(&f, false);
        assert_eq!(scope.limit, None);
        assert_eq!(scope.conditions.len(), 1);

        let scope = Scope::new("comments").apply(&f, true);
        assert_eq!(scope.limit, Some(7));
    }

    #[test]
    fn test_within_one_scope_equalities_conjoin() {
        // The replace rule applies across merges, not within a single chain
        let scope = Scope::new("comments").where_eq("a", 1).where_eq("a", 2);
        assert_eq!(scope.conditions.len(), 2);
    }
}
