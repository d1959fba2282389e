//! Statement kind detection.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::builder::QueryBuilder;
use crate::core::{ApiError, ApiResult};

/// What a query template does, decided once at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Row list
    Select,
    /// Single row; a SELECT whose LIMIT count is the literal 1
    Get,
    Insert,
    Update,
    Delete,
}

fn leading_keyword() -> &'static Regex {
    static LEADING: OnceLock<Regex> = OnceLock::new();
    LEADING.get_or_init(|| {
        Regex::new(r"^\s*\(?\s*([A-Za-z]+)\b").expect("leading keyword regex is valid")
    })
}

impl QueryKind {
    /// Detect the kind from the template's first keyword
    pub fn detect(sql: &str) -> ApiResult<Self> {
        let keyword = leading_keyword()
            .captures(sql)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_ascii_uppercase())
            .ok_or_else(|| ApiError::construction(format!("unrecognised query: {}", sql)))?;

        match keyword.as_str() {
            "SELECT" => {
                if QueryBuilder::parse(sql).is_single_row() {
                    Ok(QueryKind::Get)
                } else {
                    Ok(QueryKind::Select)
                }
            }
            "INSERT" => Ok(QueryKind::Insert),
            "UPDATE" => Ok(QueryKind::Update),
            "DELETE" => Ok(QueryKind::Delete),
            other => Err(ApiError::construction(format!(
                "unsupported query type {}: {}",
                other, sql
            ))),
        }
    }

    /// True for kinds that read rows through the builder
    pub fn is_read(&self) -> bool {
        matches!(self, QueryKind::Select | QueryKind::Get)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Select => "SELECT",
            QueryKind::Get => "GET",
            QueryKind::Insert => "INSERT",
            QueryKind::Update => "UPDATE",
            QueryKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
