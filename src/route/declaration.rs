//! # Route Declarations
//!
//! Routes declared as data, under a `paths` object:
//!
//! ```json
//! {
//!   "GET /books": {"query": "SELECT * FROM books"},
//!   "GET /authors": "SELECT * FROM authors",
//!   "GET,POST /books/search": [
//!     {"query": "SELECT COUNT(*) FROM books", "output": "total"},
//!     {"query": "SELECT * FROM books", "output": "data"}
//!   ],
//!   "POST /orders": {
//!     "secure": true,
//!     "group": "shop",
//!     "actions": [
//!       {"query": "INSERT INTO orders (user_id) VALUES (?)", "params": "$session.user_id", "output": "$order_id"},
//!       {"func": "notify"}
//!     ]
//!   }
//! }
//! ```
//!
//! `output` defaults to `data`. `func` names a handler registered on the
//! engine builder.

use std::collections::HashMap;

use axum::http::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::action::{Action, SharedHandler, DEFAULT_PROPERTY};
use crate::core::{ApiError, ApiResult};

use super::route::Route;

/// Parameter list as a comma-separated string or an array of names
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ParamList {
    Joined(String),
    List(Vec<String>),
}

impl Default for ParamList {
    fn default() -> Self {
        ParamList::Joined(String::new())
    }
}

impl ParamList {
    fn joined(&self) -> String {
        match self {
            ParamList::Joined(s) => s.clone(),
            ParamList::List(items) => items.join(","),
        }
    }
}

fn default_output() -> String {
    DEFAULT_PROPERTY.to_string()
}

/// One declared action
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ActionDeclaration {
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub func: Option<String>,

    #[serde(default)]
    pub params: ParamList,

    #[serde(default = "default_output")]
    pub output: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteBody {
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    group: String,
    #[serde(default)]
    actions: Vec<ActionDeclaration>,
}

/// A parsed `paths` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDeclaration {
    pub methods: Vec<Method>,
    pub path: String,
    pub secure: bool,
    pub group: String,
    pub actions: Vec<ActionDeclaration>,
}

impl RouteDeclaration {
    /// Build the route, resolving `func` names against `functions`
    pub fn build(&self, functions: &HashMap<String, SharedHandler>) -> ApiResult<Route> {
        let mut route = Route::new().use_group(self.group.clone());
        if self.secure {
            route = route.secure();
        }
        for (index, decl) in self.actions.iter().enumerate() {
            let action = match (&decl.query, &decl.func) {
                (Some(sql), None) => Action::query(sql, &decl.params.joined())?,
                (None, Some(name)) => {
                    let handler = functions.get(name).ok_or_else(|| {
                        ApiError::construction(format!(
                            "{}: unknown function {} in action {}",
                            self.path, name, index
                        ))
                    })?;
                    Action::handler(handler.clone())
                }
                _ => {
                    return Err(ApiError::construction(format!(
                        "{}: action {} needs exactly one of query or func",
                        self.path, index
                    )))
                }
            };
            route = route.action(action.assign_to(decl.output.clone()));
        }
        Ok(route)
    }
}

/// Parse a `paths` object
pub fn parse_paths(paths: &Value) -> ApiResult<Vec<RouteDeclaration>> {
    let map = match paths {
        Value::Object(map) => map,
        Value::Null => return Ok(Vec::new()),
        _ => return Err(ApiError::construction("paths must be an object")),
    };

    let mut declarations = Vec::with_capacity(map.len());
    for (key, body) in map {
        let (methods, path) = parse_key(key)?;
        let body = parse_body(body)
            .map_err(|e| ApiError::construction(format!("{}: {}", key, e)))?;
        declarations.push(RouteDeclaration {
            methods,
            path,
            secure: body.secure,
            group: body.group,
            actions: body.actions,
        });
    }
    Ok(declarations)
}

fn parse_body(body: &Value) -> Result<RouteBody, serde_json::Error> {
    match body {
        Value::Array(_) => Ok(RouteBody {
            secure: false,
            group: String::new(),
            actions: serde_json::from_value(body.clone())?,
        }),
        Value::String(sql) => Ok(RouteBody {
            secure: false,
            group: String::new(),
            actions: vec![ActionDeclaration {
                query: Some(sql.clone()),
                func: None,
                params: ParamList::default(),
                output: default_output(),
            }],
        }),
        Value::Object(map) if map.contains_key("actions") => {
            serde_json::from_value(body.clone())
        }
        _ => Ok(RouteBody {
            secure: false,
            group: String::new(),
            actions: vec![serde_json::from_value(body.clone())?],
        }),
    }
}

/// `"GET /a"` or `"GET,POST /a"`
fn parse_key(key: &str) -> ApiResult<(Vec<Method>, String)> {
    let invalid = || ApiError::construction(format!("invalid route key: {}", key));

    let (methods, path) = key.trim().split_once(char::is_whitespace).ok_or_else(invalid)?;
    let path = path.trim();
    if !path.starts_with('/') {
        return Err(invalid());
    }

    let methods = methods
        .split(',')
        .map(|m| {
            let m = m.trim().to_ascii_uppercase();
            if m.is_empty() {
                return Err(invalid());
            }
            Method::from_bytes(m.as_bytes()).map_err(|_| invalid())
        })
        .collect::<ApiResult<Vec<_>>>()?;

    Ok((methods, path.to_string()))
}
