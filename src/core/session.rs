//! Per-request session values, filled by middleware and read by
//! `$session.` parameters.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    values: Map<String, Value>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Dotted keys reach into nested objects
    pub fn get(&self, key: &str) -> Option<&Value> {
        super::json::get_path_in(&self.values, key)
    }

    /// String form of a value; numbers and booleans are stringified
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_values() {
        let mut session = Session::new();
        session.put("user_id", json!(42));
        session.put("profile", json!({"role": "admin"}));

        assert_eq!(session.get("user_id"), Some(&json!(42)));
        assert_eq!(session.get_string("user_id").as_deref(), Some("42"));
        assert_eq!(session.get_string("profile.role").as_deref(), Some("admin"));
        assert_eq!(session.get("missing"), None);

        session.remove("user_id");
        assert_eq!(session.get("user_id"), None);
    }
}
