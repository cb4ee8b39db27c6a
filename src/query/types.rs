//! Query scope types - operators, ordering and the condition tree

use std::fmt;

use serde_json::Value;

/// Comparison operators usable in scope conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    NotLike,
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::Like => write!(f, "LIKE"),
            QueryOperator::NotLike => write!(f, "NOT LIKE"),
        }
    }
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// A boolean predicate over one scope's rows
///
/// Conditions nest: `Any` is an OR-combination, `All` an AND-combination.
/// `ColumnEq` is the correlation form - both sides are column references, the
/// right one usually belonging to the enclosing query's current row.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Binary {
        column: String,
        operator: QueryOperator,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    Null {
        column: String,
        negated: bool,
    },
    /// Column-to-column equality, used for join/correlation predicates
    ColumnEq {
        left: String,
        right: String,
    },
    /// Pre-serialized SQL boolean expression, passed through untouched
    Raw(String),
    /// EXISTS over an already-serialized subquery
    Exists {
        subquery: String,
        negated: bool,
    },
    /// OR-combination; empty combines to constant false
    Any(Vec<Condition>),
    /// AND-combination; empty combines to constant true
    All(Vec<Condition>),
}

impl Condition {
    pub fn eq<T: Into<Value>>(column: &str, value: T) -> Self {
        Condition::Binary {
            column: column.to_string(),
            operator: QueryOperator::Equal,
            value: value.into(),
        }
    }

    pub fn ne<T: Into<Value>>(column: &str, value: T) -> Self {
        Condition::Binary {
            column: column.to_string(),
            operator: QueryOperator::NotEqual,
            value: value.into(),
        }
    }

    pub fn compare<T: Into<Value>>(column: &str, operator: QueryOperator, value: T) -> Self {
        Condition::Binary {
            column: column.to_string(),
            operator,
            value: value.into(),
        }
    }

    pub fn is_in<T: Into<Value>>(column: &str, values: Vec<T>) -> Self {
        Condition::In {
            column: column.to_string(),
            values: values.into_iter().map(|v| v.into()).collect(),
            negated: false,
        }
    }

    pub fn column_eq(left: &str, right: &str) -> Self {
        Condition::ColumnEq {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub fn raw(sql: &str) -> Self {
        Condition::Raw(sql.to_string())
    }

    pub fn exists(subquery: String) -> Self {
        Condition::Exists { subquery, negated: false }
    }

    pub fn not_exists(subquery: String) -> Self {
        Condition::Exists { subquery, negated: true }
    }

    /// The column constrained by this condition when it is a plain equality.
    /// Used by the last-equality-wins merge rule.
    pub fn equality_column(&self) -> Option<&str> {
        match self {
            Condition::Binary { column, operator: QueryOperator::Equal, .. } => Some(column),
            _ => None,
        }
    }

    /// Serialize to a SQL boolean expression
    pub fn to_sql(&self) -> String {
        match self {
            Condition::Binary { column, operator, value } => {
                format!("{} {} {}", column, operator, format_value(value))
            }
            Condition::In { column, values, negated } => {
                let keyword = if *negated { "NOT IN" } else { "IN" };
                let rendered: Vec<String> = values.iter().map(format_value).collect();
                format!("{} {} ({})", column, keyword, rendered.join(", "))
            }
            Condition::Between { column, low, high, negated } => {
                let keyword = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                format!(
                    "{} {} {} AND {}",
                    column,
                    keyword,
                    format_value(low),
                    format_value(high)
                )
            }
            Condition::Null { column, negated } => {
                if *negated {
                    format!("{} IS NOT NULL", column)
                } else {
                    format!("{} IS NULL", column)
                }
            }
            Condition::ColumnEq { left, right } => format!("{} = {}", left, right),
            Condition::Raw(sql) => sql.clone(),
            Condition::Exists { subquery, negated } => {
                if *negated {
                    format!("NOT EXISTS ({})", subquery)
                } else {
                    format!("EXISTS ({})", subquery)
                }
            }
            Condition::Any(parts) => combine(parts, " OR ", "1=0"),
            Condition::All(parts) => combine(parts, " AND ", "1=1"),
        }
    }
}

fn combine(parts: &[Condition], separator: &str, empty: &str) -> String {
    match parts {
        [] => empty.to_string(),
        [single] => single.to_sql(),
        _ => {
            let rendered: Vec<String> = parts.iter().map(|c| format!("({})", c.to_sql())).collect();
            rendered.join(separator)
        }
    }
}

/// Format a literal value for SQL, escaping single quotes in strings
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "NULL".to_string(),
        _ => "NULL".to_string(), // Arrays and objects not supported as literals
    }
}
