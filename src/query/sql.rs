//! Scope SQL serialization

use super::scope::Scope;
use super::types::Condition;

impl Scope {
    /// Serialize this scope to a SELECT statement
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();

        sql.push_str("SELECT ");
        match &self.select {
            Some(projection) => sql.push_str(projection),
            None => sql.push('*'),
        }

        sql.push_str(" FROM ");
        match &self.from_override {
            Some(from) => sql.push_str(from),
            None => {
                sql.push_str(&self.table);
                if let Some(alias) = &self.alias {
                    sql.push(' ');
                    sql.push_str(alias);
                }
            }
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            let rendered: Vec<String> = self.conditions.iter().map(render_conjunct).collect();
            sql.push_str(&rendered.join(" AND "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order_clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(&order_clauses.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }
}

/// Render one condition for use in an AND-joined WHERE list, parenthesizing
/// OR-combinations so precedence survives
fn render_conjunct(condition: &Condition) -> String {
    match condition {
        Condition::Any(parts) if parts.len() > 1 => format!("({})", condition.to_sql()),
        _ => condition.to_sql(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::OrderDirection;

    #[test]
    fn test_plain_select() {
        let scope = Scope::new("comments");
        assert_eq!(scope.to_sql(), "SELECT * FROM comments");
    }

    #[test]
    fn test_full_select() {
        let scope = Scope::new("comments")
            .select("1")
            .where_eq("spam", false)
            .where_raw("comments.post_id = posts.id")
            .order_by("created_at", OrderDirection::Desc)
            .limit(1)
            .offset(2);
        assert_eq!(
            scope.to_sql(),
            "SELECT 1 FROM comments WHERE spam = false AND comments.post_id = posts.id \
             ORDER BY created_at DESC LIMIT 1 OFFSET 2"
        );
    }

    #[test]
    fn test_alias_in_from() {
        let scope = Scope::new("comments").with_alias("comments_1").select("1");
        assert_eq!(scope.to_sql(), "SELECT 1 FROM comments comments_1");
    }

    #[test]
    fn test_from_override() {
        let mut scope = Scope::new("comments").select("1");
        scope.from_override = Some("(SELECT * FROM comments LIMIT 1) comments".to_string());
        assert_eq!(
            scope.to_sql(),
            "SELECT 1 FROM (SELECT * FROM comments LIMIT 1) comments"
        );
    }

    #[test]
    fn test_joins_render_between_from_and_where() {
        let scope = Scope::new("tags")
            .join_raw("INNER JOIN post_tags ON post_tags.tag_id = tags.id")
            .where_eq("visible", true);
        assert_eq!(
            scope.to_sql(),
            "SELECT * FROM tags INNER JOIN post_tags ON post_tags.tag_id = tags.id \
             WHERE visible = true"
        );
    }

    #[test]
    fn test_or_combination_parenthesized_in_where_list() {
        let scope = Scope::new("comments")
            .where_eq("spam", false)
            .where_condition(Condition::Any(vec![
                Condition::eq("kind", "note"),
                Condition::eq("kind", "reply"),
            ]));
        assert_eq!(
            scope.to_sql(),
            "SELECT * FROM comments WHERE spam = false AND ((kind = 'note') OR (kind = 'reply'))"
        );
    }
}
