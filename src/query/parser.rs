//! # Query Parameter Parser
//!
//! Reads the `filters`, `sort` and `page` keys of a JSON request body and
//! applies them to a cloned [`QueryBuilder`].
//!
//! ```json
//! {
//!   "filters": {"title": {"value": "Programming", "type": "FULLTEXT"}},
//!   "sort": {"active": "created_at", "direction": "desc"},
//!   "page": {"location": 2, "length": 50}
//! }
//! ```

use serde_json::Value;

use super::builder::QueryBuilder;
use super::filter::{validate_identifier, FilterExpr};
use super::kind::QueryKind;
use crate::core::{ApiError, ApiResult};

/// Default row count for SELECT when neither the caller nor the template sets one
pub const DEFAULT_SELECT_LIMIT: u64 = 1000;

/// Order by clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub ascending: bool,
}

impl OrderBy {
    fn render(&self) -> String {
        let direction = if self.ascending { "ASC" } else { "DESC" };
        format!("{} {}", self.field, direction)
    }
}

/// Paging request. Zero values count as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub offset: Option<u64>,
    pub count: Option<u64>,
    /// 1-indexed page number
    pub location: Option<u64>,
    pub length: Option<u64>,
}

/// Parsed filter/sort/page parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    /// Filter expressions, in request order
    pub filters: Vec<FilterExpr>,

    /// Order by clauses
    pub order: Vec<OrderBy>,

    pub page: Page,
}

impl QueryParams {
    /// Parse from a request body. Non-object bodies carry no parameters.
    pub fn from_body(body: &Value) -> ApiResult<Self> {
        let filters = match body.get("filters").or_else(|| body.get("filter")) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => parse_filters(value)?,
        };
        let order = match body.get("sort") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => parse_sort(value)?,
        };
        let page = match body.get("page") {
            None | Some(Value::Null) => Page::default(),
            Some(value) => parse_page(value)?,
        };
        Ok(Self {
            filters,
            order,
            page,
        })
    }

    /// True when nothing would change the template
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.order.is_empty() && self.page == Page::default()
    }

    /// Apply filters, order and paging, then the row-count rule for `kind`
    pub fn apply(
        &self,
        builder: &mut QueryBuilder,
        kind: QueryKind,
        default_limit: u64,
    ) -> ApiResult<()> {
        for filter in &self.filters {
            filter.apply(builder)?;
        }

        if !self.order.is_empty() {
            builder.order_by(self.order.iter().map(OrderBy::render).collect());
        }

        match kind {
            // Paging never applies to single-row reads; only the template's
            // own offset survives
            QueryKind::Get => {
                builder.force_single_row();
            }
            QueryKind::Select => {
                self.apply_page(builder, default_limit);
                builder.ensure_count(default_limit);
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_page(&self, builder: &mut QueryBuilder, default_limit: u64) {
        let count = self.page.count.or(self.page.length);
        if let Some(count) = count {
            builder.count(count);
        }

        let offset = match self.page.location {
            Some(location) => {
                let per_page = count
                    .or_else(|| builder.limit().and_then(|l| l.count))
                    .unwrap_or(default_limit);
                Some((location - 1).saturating_mul(per_page))
            }
            None => self.page.offset,
        };
        if let Some(offset) = offset.filter(|o| *o > 0) {
            builder.offset(offset);
        }
    }
}

fn parse_filters(value: &Value) -> ApiResult<Vec<FilterExpr>> {
    match value {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(field, definition)| FilterExpr::from_entry(field, definition))
            .collect()),
        Value::Array(items) => items.iter().map(FilterExpr::from_item).collect(),
        _ => Err(ApiError::bad_request("filters must be an object or an array")),
    }
}

/// Parse `{"active", "direction"}` or an array of them
fn parse_sort(value: &Value) -> ApiResult<Vec<OrderBy>> {
    let items: Vec<&Value> = match value {
        Value::Object(_) => vec![value],
        Value::Array(items) => items.iter().collect(),
        _ => return Err(ApiError::bad_request("sort must be an object or an array")),
    };

    let mut orders = Vec::with_capacity(items.len());
    for item in items {
        let field = match item.get("active").and_then(Value::as_str) {
            Some(field) if !field.is_empty() => field,
            _ => continue,
        };
        validate_identifier(field)?;

        let direction = item
            .get("direction")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .unwrap_or("asc");
        let ascending = match direction.to_lowercase().as_str() {
            "asc" => true,
            "desc" => false,
            _ => {
                return Err(ApiError::bad_request(format!(
                    "invalid sort direction: {}",
                    direction
                )))
            }
        };
        orders.push(OrderBy {
            field: field.to_string(),
            ascending,
        });
    }
    Ok(orders)
}

fn parse_page(value: &Value) -> ApiResult<Page> {
    if !value.is_object() {
        return Err(ApiError::bad_request("page must be an object"));
    }
    Ok(Page {
        offset: page_number(value, "offset")?,
        count: page_number(value, "count")?,
        location: page_number(value, "location")?,
        length: page_number(value, "length")?,
    })
}

/// Accepts JSON numbers and numeric strings; zero is treated as absent
fn page_number(page: &Value, key: &str) -> ApiResult<Option<u64>> {
    let parsed = match page.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(0) => Ok(None),
        Some(n) => Ok(Some(n)),
        None => Err(ApiError::bad_request(format!("invalid page {}", key))),
    }
}
