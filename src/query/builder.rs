//! # Query Builder
//!
//! Mutable clause set seeded from a parsed SELECT template. An action keeps
//! one immutable builder and clones it for every execution, so per-request
//! filters never leak between requests.
//!
//! ## Bind ordering
//!
//! Template placeholders are positional over the whole statement. Appended
//! predicates land at the end of the WHERE clause, so their binds are spliced
//! in right after the template's head and WHERE placeholders. Later clauses
//! (HAVING, ORDER BY) keep their template binds after them.

use std::fmt;

use serde_json::Value;

use super::template::{count_placeholders, split_select};

/// MySQL idiom for "no upper bound" when only an offset is known
const UNBOUNDED_COUNT: u64 = u64::MAX;

/// LIMIT clause values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limit {
    pub offset: u64,
    pub count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LimitClause {
    None,
    Fixed(Limit),
    /// Non-numeric template limit (`LIMIT ?`), left untouched
    Raw(String),
}

/// A rendered statement with its positional bind values
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Clause accumulator for SELECT statements
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    head: String,
    template_where: Option<String>,
    predicates: Vec<String>,
    group_by: Option<String>,
    having: Option<String>,
    order_by: Vec<String>,
    /// Leading ORDER BY fragments that carry binds and cannot be replaced
    fixed_order: usize,
    limit: LimitClause,
    tail: Option<String>,
    split: usize,
    binds: Vec<Value>,
}

impl QueryBuilder {
    /// Parse a SELECT template
    pub fn parse(sql: &str) -> Self {
        let clauses = split_select(sql);

        if clauses.compound {
            return Self {
                split: count_placeholders(&clauses.head),
                head: format!("SELECT * FROM ({}) AS q", clauses.head),
                template_where: None,
                predicates: Vec::new(),
                group_by: None,
                having: None,
                order_by: Vec::new(),
                fixed_order: 0,
                limit: LimitClause::None,
                tail: None,
                binds: Vec::new(),
            };
        }

        let split = count_placeholders(&clauses.head)
            + clauses
                .where_clause
                .as_deref()
                .map(count_placeholders)
                .unwrap_or(0);
        let fixed_order = clauses
            .order_by
            .as_deref()
            .map(|o| usize::from(count_placeholders(o) > 0))
            .unwrap_or(0);

        Self {
            head: clauses.head,
            template_where: clauses.where_clause,
            predicates: Vec::new(),
            group_by: clauses.group_by,
            having: clauses.having,
            order_by: clauses.order_by.into_iter().collect(),
            fixed_order,
            limit: clauses
                .limit
                .as_deref()
                .map(parse_limit)
                .unwrap_or(LimitClause::None),
            tail: clauses.tail,
            split,
            binds: Vec::new(),
        }
    }

    /// Append a WHERE predicate together with the values for its placeholders
    pub fn where_clause(
        &mut self,
        predicate: impl Into<String>,
        binds: impl IntoIterator<Item = Value>,
    ) -> &mut Self {
        self.predicates.push(predicate.into());
        self.binds.extend(binds);
        self
    }

    /// Replace the ORDER BY fragments
    pub fn order_by(&mut self, fragments: Vec<String>) -> &mut Self {
        self.order_by.truncate(self.fixed_order);
        self.order_by.extend(fragments);
        self
    }

    /// Current numeric limit, if the template's LIMIT is numeric or was set
    pub fn limit(&self) -> Option<Limit> {
        match &self.limit {
            LimitClause::Fixed(limit) => Some(*limit),
            _ => None,
        }
    }

    /// True when the template's LIMIT binds parameters and cannot be changed
    pub fn has_raw_limit(&self) -> bool {
        matches!(self.limit, LimitClause::Raw(_))
    }

    /// True when the LIMIT row count is the literal `1`, whatever the offset
    /// (`LIMIT 1`, `LIMIT 10, 1`, `LIMIT ?, 1`, `LIMIT 1 OFFSET ?`)
    pub fn is_single_row(&self) -> bool {
        match &self.limit {
            LimitClause::None => false,
            LimitClause::Fixed(limit) => limit.count == Some(1),
            LimitClause::Raw(raw) => limit_count_token(raw) == Some("1"),
        }
    }

    /// Set the row offset
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.update_limit(|limit| limit.offset = offset)
    }

    /// Set the row count
    pub fn count(&mut self, count: u64) -> &mut Self {
        self.update_limit(|limit| limit.count = Some(count))
    }

    /// Apply `count` only if no row count is known yet
    pub fn ensure_count(&mut self, count: u64) -> &mut Self {
        if self.limit().and_then(|l| l.count).is_none() {
            self.count(count);
        }
        self
    }

    /// Force exactly one row, keeping any offset
    pub fn force_single_row(&mut self) -> &mut Self {
        self.count(1)
    }

    fn update_limit(&mut self, f: impl FnOnce(&mut Limit)) -> &mut Self {
        match &mut self.limit {
            LimitClause::Raw(_) => {}
            LimitClause::Fixed(limit) => f(limit),
            LimitClause::None => {
                let mut limit = Limit::default();
                f(&mut limit);
                self.limit = LimitClause::Fixed(limit);
            }
        }
        self
    }

    /// Values bound by appended predicates, in append order
    pub fn binds(&self) -> &[Value] {
        &self.binds
    }

    /// Number of template placeholders that precede appended predicates
    pub fn placeholder_split(&self) -> usize {
        self.split
    }

    /// Render the SQL text
    pub fn to_sql(&self) -> String {
        let mut sql = self.head.clone();

        let mut conditions = Vec::with_capacity(self.predicates.len() + 1);
        if let Some(template_where) = &self.template_where {
            if self.predicates.is_empty() {
                conditions.push(template_where.clone());
            } else {
                conditions.push(format!("({})", template_where));
            }
        }
        conditions.extend(self.predicates.iter().cloned());
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if let Some(group_by) = &self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }
        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(having);
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        match &self.limit {
            LimitClause::None => {}
            LimitClause::Raw(raw) => {
                sql.push_str(" LIMIT ");
                sql.push_str(raw);
            }
            LimitClause::Fixed(limit) => {
                let count = limit.count.unwrap_or(UNBOUNDED_COUNT);
                if limit.offset > 0 {
                    sql.push_str(&format!(" LIMIT {}, {}", limit.offset, count));
                } else {
                    sql.push_str(&format!(" LIMIT {}", count));
                }
            }
        }
        if let Some(tail) = &self.tail {
            sql.push(' ');
            sql.push_str(tail);
        }
        sql
    }

    /// Render SQL and merge the template's positional values with appended binds
    pub fn render(&self, template_args: &[Value]) -> Rendered {
        let split = self.split.min(template_args.len());
        let mut args = Vec::with_capacity(template_args.len() + self.binds.len());
        args.extend_from_slice(&template_args[..split]);
        args.extend(self.binds.iter().cloned());
        args.extend_from_slice(&template_args[split..]);
        Rendered {
            sql: self.to_sql(),
            args,
        }
    }
}

impl fmt::Display for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

fn limit_tokens(body: &str) -> Vec<&str> {
    body.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect()
}

/// The token holding the row count: first before `OFFSET`, otherwise last
fn limit_count_token(body: &str) -> Option<&str> {
    let tokens = limit_tokens(body);
    match tokens.as_slice() {
        [count, keyword, _] if keyword.eq_ignore_ascii_case("OFFSET") => Some(*count),
        [.., count] => Some(*count),
        [] => None,
    }
}

/// Parse `n`, `offset, n`, `offset n` or `n OFFSET offset`
fn parse_limit(body: &str) -> LimitClause {
    let tokens = limit_tokens(body);

    let number = |t: &str| t.parse::<u64>().ok();
    let parsed = match tokens.as_slice() {
        [count] => number(count).map(|count| Limit {
            offset: 0,
            count: Some(count),
        }),
        [count, keyword, offset] if keyword.eq_ignore_ascii_case("OFFSET") => {
            match (number(count), number(offset)) {
                (Some(count), Some(offset)) => Some(Limit {
                    offset,
                    count: Some(count),
                }),
                _ => None,
            }
        }
        [offset, count] => match (number(offset), number(count)) {
            (Some(offset), Some(count)) => Some(Limit {
                offset,
                count: Some(count),
            }),
            _ => None,
        },
        _ => None,
    };

    match parsed {
        Some(limit) => LimitClause::Fixed(limit),
        None => LimitClause::Raw(body.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_without_changes() {
        let builder = QueryBuilder::parse("SELECT id FROM books WHERE author_id = ? ORDER BY id");
        assert_eq!(
            builder.to_sql(),
            "SELECT id FROM books WHERE author_id = ? ORDER BY id"
        );
    }

    #[test]
    fn test_appended_predicates_wrap_template_where() {
        let mut builder = QueryBuilder::parse("SELECT * FROM books WHERE a = ? OR b = ?");
        builder.where_clause("title LIKE ?", [json!("%rust%")]);
        assert_eq!(
            builder.to_sql(),
            "SELECT * FROM books WHERE (a = ? OR b = ?) AND title LIKE ?"
        );
    }

    #[test]
    fn test_binds_spliced_after_where() {
        let mut builder = QueryBuilder::parse(
            "SELECT author_id, COUNT(*) c FROM books WHERE shelf = ? GROUP BY author_id HAVING c > ?",
        );
        builder.where_clause("year >= ?", [json!(2020)]);

        let rendered = builder.render(&[json!("A"), json!(3)]);
        assert_eq!(
            rendered.sql,
            "SELECT author_id, COUNT(*) c FROM books WHERE (shelf = ?) AND year >= ? \
             GROUP BY author_id HAVING c > ?"
        );
        assert_eq!(rendered.args, vec![json!("A"), json!(2020), json!(3)]);
    }

    #[test]
    fn test_limit_forms() {
        assert_eq!(
            QueryBuilder::parse("SELECT * FROM t LIMIT 10").limit(),
            Some(Limit { offset: 0, count: Some(10) })
        );
        assert_eq!(
            QueryBuilder::parse("SELECT * FROM t LIMIT 5, 1").limit(),
            Some(Limit { offset: 5, count: Some(1) })
        );
        assert_eq!(
            QueryBuilder::parse("SELECT * FROM t LIMIT 7 1").limit(),
            Some(Limit { offset: 7, count: Some(1) })
        );
        assert_eq!(
            QueryBuilder::parse("SELECT * FROM t limit 10 offset 20").limit(),
            Some(Limit { offset: 20, count: Some(10) })
        );
        let raw = QueryBuilder::parse("SELECT * FROM t LIMIT ?");
        assert!(raw.has_raw_limit());
        assert!(!raw.is_single_row());
        assert_eq!(raw.to_sql(), "SELECT * FROM t LIMIT ?");
    }

    #[test]
    fn test_single_row_with_bound_offset() {
        assert!(QueryBuilder::parse("SELECT * FROM t LIMIT ?, 1").is_single_row());
        assert!(QueryBuilder::parse("SELECT * FROM t LIMIT ? 1").is_single_row());
        assert!(QueryBuilder::parse("SELECT * FROM t LIMIT 1 OFFSET ?").is_single_row());
        assert!(!QueryBuilder::parse("SELECT * FROM t LIMIT ? OFFSET 1").is_single_row());
        assert!(!QueryBuilder::parse("SELECT * FROM t LIMIT 1, ?").is_single_row());
        assert!(!QueryBuilder::parse("SELECT * FROM t").is_single_row());
    }

    #[test]
    fn test_offset_and_count() {
        let mut builder = QueryBuilder::parse("SELECT * FROM t");
        builder.offset(50).count(25);
        assert_eq!(builder.to_sql(), "SELECT * FROM t LIMIT 50, 25");

        let mut builder = QueryBuilder::parse("SELECT * FROM t LIMIT 3");
        builder.ensure_count(1000);
        assert_eq!(builder.to_sql(), "SELECT * FROM t LIMIT 3");

        let mut builder = QueryBuilder::parse("SELECT * FROM t");
        builder.ensure_count(1000);
        assert_eq!(builder.to_sql(), "SELECT * FROM t LIMIT 1000");
    }

    #[test]
    fn test_force_single_row_keeps_offset() {
        let mut builder = QueryBuilder::parse("SELECT * FROM t LIMIT 20, 1");
        builder.count(40).force_single_row();
        assert_eq!(builder.to_sql(), "SELECT * FROM t LIMIT 20, 1");
    }

    #[test]
    fn test_order_replaced_unless_bound() {
        let mut builder = QueryBuilder::parse("SELECT * FROM t ORDER BY id");
        builder.order_by(vec!["name DESC".to_string()]);
        assert_eq!(builder.to_sql(), "SELECT * FROM t ORDER BY name DESC");

        let mut builder = QueryBuilder::parse("SELECT * FROM t ORDER BY FIELD(id, ?)");
        builder.order_by(vec!["name ASC".to_string()]);
        assert_eq!(
            builder.to_sql(),
            "SELECT * FROM t ORDER BY FIELD(id, ?), name ASC"
        );
    }

    #[test]
    fn test_compound_template_becomes_derived_table() {
        let mut builder = QueryBuilder::parse("SELECT id FROM a WHERE x = ? UNION SELECT id FROM b");
        builder.where_clause("id > ?", [json!(10)]);
        let rendered = builder.render(&[json!(1)]);
        assert_eq!(
            rendered.sql,
            "SELECT * FROM (SELECT id FROM a WHERE x = ? UNION SELECT id FROM b) AS q WHERE id > ?"
        );
        assert_eq!(rendered.args, vec![json!(1), json!(10)]);
    }

    #[test]
    fn test_clone_isolation() {
        let template = QueryBuilder::parse("SELECT * FROM t");
        let mut first = template.clone();
        first.where_clause("a = ?", [json!(1)]);

        assert_eq!(template.to_sql(), "SELECT * FROM t");
        assert!(template.binds().is_empty());
        assert_eq!(first.binds(), &[json!(1)]);
    }
}
