//! # Filter Expression AST
//!
//! Request-supplied filters and how each operator lowers into WHERE
//! predicates on a [`QueryBuilder`].

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

use super::builder::QueryBuilder;
use crate::core::{ApiError, ApiResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equals, also the fallback for unknown names
    Eq,
    Like,
    Gt,
    Gte,
    Lt,
    Lte,
    /// `MATCH(field) AGAINST(? IN BOOLEAN MODE)` with a prefix wildcard
    Fulltext,
    /// Whole-day range `[v, v + 1 day)`
    Date,
    /// Comma-separated value list
    In,
}

impl FilterOperator {
    /// Parse an operator name, case-insensitively. Unknown names mean equality.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "LIKE" => FilterOperator::Like,
            ">" => FilterOperator::Gt,
            ">=" => FilterOperator::Gte,
            "<" => FilterOperator::Lt,
            "<=" => FilterOperator::Lte,
            "FULLTEXT" => FilterOperator::Fulltext,
            "DATE" => FilterOperator::Date,
            "IN" => FilterOperator::In,
            _ => FilterOperator::Eq,
        }
    }

    /// Get the operator string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Like => "LIKE",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
            FilterOperator::Fulltext => "FULLTEXT",
            FilterOperator::Date => "date",
            FilterOperator::In => "IN",
        }
    }
}

/// A filter expression
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    /// Column to filter on
    pub field: String,

    /// Comparison operator
    pub operator: FilterOperator,

    /// Value to compare against
    pub value: Value,
}

impl FilterExpr {
    /// Create a new filter expression
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality filter
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    /// Object form entry: `"title": {"value": "x", "type": "LIKE"}`.
    /// The operator key may also be `filter`; a bare scalar is equality.
    pub fn from_entry(field: &str, definition: &Value) -> Self {
        match definition {
            Value::Object(map) => {
                let operator = map
                    .get("type")
                    .or_else(|| map.get("filter"))
                    .and_then(Value::as_str)
                    .map(FilterOperator::parse)
                    .unwrap_or(FilterOperator::Eq);
                let value = map.get("value").cloned().unwrap_or(Value::Null);
                Self::new(field, operator, value)
            }
            scalar => Self::eq(field, scalar.clone()),
        }
    }

    /// Array form item: `{"name": "title", "value": "x", "type": "LIKE"}`
    pub fn from_item(item: &Value) -> ApiResult<Self> {
        let field = item
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::bad_request("filter item requires a name"))?;
        Ok(Self::from_entry(field, item))
    }

    /// Append this filter's predicates and binds to `builder`
    pub fn apply(&self, builder: &mut QueryBuilder) -> ApiResult<()> {
        validate_identifier(&self.field)?;
        let field = &self.field;

        match self.operator {
            FilterOperator::Eq => {
                builder.where_clause(format!("{} = ?", field), [self.value.clone()]);
            }
            FilterOperator::Like
            | FilterOperator::Gt
            | FilterOperator::Gte
            | FilterOperator::Lt
            | FilterOperator::Lte => {
                builder.where_clause(
                    format!("{} {} ?", field, self.operator.as_str()),
                    [self.value.clone()],
                );
            }
            FilterOperator::Fulltext => {
                builder.where_clause(
                    format!("MATCH({}) AGAINST(? IN BOOLEAN MODE)", field),
                    [Value::String(format!("{}*", value_text(&self.value)))],
                );
            }
            FilterOperator::Date => {
                let text = value_text(&self.value);
                let day = NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).map_err(|_| {
                    ApiError::bad_request(format!("invalid date filter for {}: {}", field, text))
                })?;
                let next = day.succ_opt().ok_or_else(|| {
                    ApiError::bad_request(format!("date out of range for {}: {}", field, text))
                })?;
                builder.where_clause(
                    format!("{} >= ?", field),
                    [Value::String(day.format(DATE_FORMAT).to_string())],
                );
                builder.where_clause(
                    format!("{} < ?", field),
                    [Value::String(next.format(DATE_FORMAT).to_string())],
                );
            }
            FilterOperator::In => {
                let values = in_values(&self.value);
                if values.is_empty() {
                    return Err(ApiError::bad_request(format!(
                        "IN filter for {} has no values",
                        field
                    )));
                }
                let slots = vec!["?"; values.len()].join(", ");
                builder.where_clause(format!("{} IN ({})", field, slots), values);
            }
        }
        Ok(())
    }
}

fn identifier_pattern() -> &'static Regex {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("identifier regex is valid")
    })
}

/// Reject anything that is not a plain or qualified column name
pub fn validate_identifier(field: &str) -> ApiResult<()> {
    if identifier_pattern().is_match(field) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("invalid field name: {}", field)))
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `"a, b,c"` or `["a", "b"]` into trimmed, non-empty binds
fn in_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
        other => value_text(other)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
    }
}
