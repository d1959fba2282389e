//! Parameter descriptors
//!
//! A query action declares its positional values as a comma-separated list:
//!
//! | Form            | Source                                   |
//! |-----------------|------------------------------------------|
//! | `name`          | request body (dotted path), then query string |
//! | `$session.name` | session                                  |
//! | `$name`         | vars                                     |
//! | `array[field]`  | field of the current array element       |
//! | `array[]`       | the current array element itself         |

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::core::json::get_path;
use crate::core::{ApiError, ApiResult, Context};

const SESSION_PREFIX: &str = "$session.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Request(String),
    Session(String),
    Var(String),
    Element { array: String, field: String },
}

fn element_pattern() -> &'static Regex {
    static ELEMENT: OnceLock<Regex> = OnceLock::new();
    ELEMENT.get_or_init(|| {
        Regex::new(r"(?i)^([a-z0-9._]+)\[([a-z0-9._]*)\]$").expect("element regex is valid")
    })
}

impl Param {
    pub fn parse(raw: &str) -> ApiResult<Self> {
        if raw.is_empty() {
            return Err(ApiError::construction("empty parameter name"));
        }
        if let Some(name) = raw.strip_prefix(SESSION_PREFIX) {
            return Ok(Param::Session(name.to_string()));
        }
        if let Some(name) = raw.strip_prefix('$') {
            return Ok(Param::Var(name.to_string()));
        }
        if let Some(caps) = element_pattern().captures(raw) {
            return Ok(Param::Element {
                array: caps[1].to_string(),
                field: caps[2].to_string(),
            });
        }
        if raw.contains('[') || raw.contains(']') {
            return Err(ApiError::construction(format!("invalid parameter: {}", raw)));
        }
        Ok(Param::Request(raw.to_string()))
    }

    /// Resolve against the context; `element` is the current array item
    pub fn resolve(&self, ctx: &Context, element: Option<&Value>) -> ApiResult<Value> {
        match self {
            Param::Request(name) => ctx
                .request()
                .get(name)
                .ok_or_else(|| ApiError::MissingParameter(name.clone())),
            Param::Session(name) => Ok(ctx.session().get(name).cloned().unwrap_or(Value::Null)),
            Param::Var(name) => Ok(ctx.var(name).cloned().unwrap_or(Value::Null)),
            Param::Element { field, .. } => {
                let element = element.unwrap_or(&Value::Null);
                if field.is_empty() || !element.is_object() {
                    return Ok(element.clone());
                }
                Ok(get_path(element, field).cloned().unwrap_or(Value::Null))
            }
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Request(name) => write!(f, "{}", name),
            Param::Session(name) => write!(f, "{}{}", SESSION_PREFIX, name),
            Param::Var(name) => write!(f, "${}", name),
            Param::Element { array, field } => write!(f, "{}[{}]", array, field),
        }
    }
}

/// Parse a declaration list. Returns the descriptors and the single array
/// name they iterate over, if any.
pub fn parse_params(list: &str) -> ApiResult<(Vec<Param>, Option<String>)> {
    let compact: String = list.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Ok((Vec::new(), None));
    }

    let mut params = Vec::new();
    let mut array_name: Option<String> = None;
    for raw in compact.split(',') {
        let param = Param::parse(raw)?;
        if let Param::Element { array, .. } = &param {
            match &array_name {
                Some(existing) if existing != array => {
                    return Err(ApiError::construction(format!(
                        "multiple arrays in a single query are not allowed: {} and {}",
                        existing, array
                    )));
                }
                Some(_) => {}
                None => array_name = Some(array.clone()),
            }
        }
        params.push(param);
    }
    Ok((params, array_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Request;
    use axum::http::Method;
    use serde_json::json;

    #[test]
    fn test_parse_forms() {
        let (params, array) = parse_params("title, $session.user_id, $order_id, items[qty]").unwrap();
        assert_eq!(
            params,
            vec![
                Param::Request("title".into()),
                Param::Session("user_id".into()),
                Param::Var("order_id".into()),
                Param::Element {
                    array: "items".into(),
                    field: "qty".into()
                },
            ]
        );
        assert_eq!(array.as_deref(), Some("items"));
    }

    #[test]
    fn test_two_arrays_rejected() {
        assert!(parse_params("orders[id], orders[qty], $session.user").is_ok());
        let err = parse_params("orders[id], orders[qty], $session.user, items[id]").unwrap_err();
        assert!(matches!(err, ApiError::Construction(_)));
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(parse_params("a,,b").is_err());
        assert!(parse_params("items[id").is_err());
        assert_eq!(parse_params("  ").unwrap().0, vec![]);
    }

    #[test]
    fn test_display_round_trip() {
        for raw in ["title", "$session.user", "$x", "items[qty]", "ids[]"] {
            assert_eq!(Param::parse(raw).unwrap().to_string(), raw);
        }
    }

    #[test]
    fn test_resolve() {
        let req = Request::new(Method::POST, "/")
            .with_body(json!({"title": "Rust", "user": {"id": 5}}))
            .with_query("page", "2");
        let mut ctx = Context::new(req, None);
        ctx.session_mut().put("uid", json!(9));
        ctx.put("$total", json!(30));

        let resolve = |raw: &str, element: Option<&Value>| {
            Param::parse(raw).unwrap().resolve(&ctx, element)
        };
        assert_eq!(resolve("title", None).unwrap(), json!("Rust"));
        assert_eq!(resolve("user.id", None).unwrap(), json!(5));
        assert_eq!(resolve("page", None).unwrap(), json!("2"));
        assert_eq!(resolve("$session.uid", None).unwrap(), json!(9));
        assert_eq!(resolve("$session.none", None).unwrap(), Value::Null);
        assert_eq!(resolve("$total", None).unwrap(), json!(30));

        let item = json!({"qty": 3});
        assert_eq!(resolve("items[qty]", Some(&item)).unwrap(), json!(3));
        assert_eq!(resolve("items[]", Some(&item)).unwrap(), item);
        assert_eq!(resolve("ids[x]", Some(&json!(4))).unwrap(), json!(4));

        assert!(matches!(
            resolve("missing", None),
            Err(ApiError::MissingParameter(name)) if name == "missing"
        ));
    }
}
