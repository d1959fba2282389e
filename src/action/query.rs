//! # Query Action
//!
//! A declarative SQL action. SELECT templates are parsed once into a
//! [`QueryBuilder`]; each execution clones it and applies the request's
//! filters, sort and page before rendering. Modifying statements run the
//! raw template.

use serde_json::Value;

use super::param::{parse_params, Param};
use crate::core::json::get_path;
use crate::core::{ApiError, ApiResult, Context};
use crate::query::{QueryBuilder, QueryKind, QueryParams};
use crate::route::EngineConfig;

#[derive(Debug, Clone)]
pub struct QueryAction {
    sql: String,
    kind: QueryKind,
    params: Vec<Param>,
    array_name: Option<String>,
    /// Immutable template, cloned per execution. Read kinds only.
    builder: Option<QueryBuilder>,
}

impl QueryAction {
    /// Parse a template and its comma-separated parameter list
    pub fn new(sql: &str, params: &str) -> ApiResult<Self> {
        let sql = sql.trim();
        let kind = QueryKind::detect(sql)?;
        let (params, array_name) = parse_params(params)?;
        let builder = kind.is_read().then(|| QueryBuilder::parse(sql));
        Ok(Self {
            sql: sql.to_string(),
            kind,
            params,
            array_name,
            builder,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn array_name(&self) -> Option<&str> {
        self.array_name.as_deref()
    }

    /// Run the action, once or once per array element
    pub async fn execute(&self, ctx: &Context, config: &EngineConfig) -> ApiResult<Value> {
        let query_params = if self.kind.is_read() {
            Some(QueryParams::from_body(ctx.request().body())?)
        } else {
            None
        };

        let array_name = match &self.array_name {
            Some(name) => name,
            None => {
                let values = self.resolve(ctx, None)?;
                return self
                    .execute_item(ctx, values, query_params.as_ref(), config)
                    .await;
            }
        };

        let elements = match self.array_elements(ctx, array_name)? {
            Some(elements) => elements,
            None => return Ok(Value::Array(Vec::new())),
        };

        let mut results = Vec::with_capacity(elements.len());
        for element in &elements {
            let values = self.resolve(ctx, Some(element))?;
            let result = self
                .execute_item(ctx, values, query_params.as_ref(), config)
                .await?;
            match result {
                Value::Array(rows) if self.kind == QueryKind::Select => results.extend(rows),
                other => results.push(other),
            }
        }
        Ok(Value::Array(results))
    }

    /// The driving array: request body first, then vars
    fn array_elements(&self, ctx: &Context, name: &str) -> ApiResult<Option<Vec<Value>>> {
        let found = get_path(ctx.request().body(), name)
            .filter(|v| !v.is_null())
            .or_else(|| ctx.var(name).filter(|v| !v.is_null()));
        match found {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items.clone())),
            Some(_) => Err(ApiError::bad_request(format!("{} must be an array", name))),
        }
    }

    fn resolve(&self, ctx: &Context, element: Option<&Value>) -> ApiResult<Vec<Value>> {
        self.params
            .iter()
            .map(|param| param.resolve(ctx, element))
            .collect()
    }

    async fn execute_item(
        &self,
        ctx: &Context,
        values: Vec<Value>,
        query_params: Option<&QueryParams>,
        config: &EngineConfig,
    ) -> ApiResult<Value> {
        match self.kind {
            QueryKind::Select | QueryKind::Get => {
                let rendered = match (&self.builder, query_params) {
                    (Some(template), Some(query_params)) => {
                        let mut builder = template.clone();
                        query_params.apply(&mut builder, self.kind, config.default_select_limit)?;
                        builder.render(&values)
                    }
                    _ => {
                        return Err(ApiError::internal(format!(
                            "read query without a parsed template: {}",
                            self.sql
                        )))
                    }
                };
                tracing::debug!(sql = %rendered.sql, args = rendered.args.len(), "select");

                let rows = ctx.select(&rendered.sql, &rendered.args).await?;
                if self.kind == QueryKind::Select {
                    return Ok(Value::Array(rows.into_iter().map(Value::Object).collect()));
                }
                Ok(match rows.into_iter().next() {
                    None => Value::Null,
                    Some(row) if row.len() == 1 => {
                        row.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null)
                    }
                    Some(row) => Value::Object(row),
                })
            }
            QueryKind::Insert => {
                let result = ctx.exec(&self.sql, &values).await?;
                Ok(Value::from(result.last_insert_id))
            }
            QueryKind::Update | QueryKind::Delete => {
                let result = ctx.exec(&self.sql, &values).await?;
                Ok(Value::from(result.rows_affected))
            }
        }
    }
}
