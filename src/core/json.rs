//! Dotted-path helpers over `serde_json` values.

use serde_json::{Map, Value};

/// Look up `a.b.c` through nested objects
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |current, key| current.get(key))
}

/// Look up `a.b.c` starting from an object map
pub fn get_path_in<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let (first, rest) = match path.split_once('.') {
        Some((first, rest)) => (first, Some(rest)),
        None => (path, None),
    };
    let value = map.get(first)?;
    match rest {
        Some(rest) => get_path(value, rest),
        None => Some(value),
    }
}

/// Write `value` at `a.b.c`, creating intermediate objects and merging
/// into whatever is already there
pub fn put_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => match map.get_mut(path) {
            Some(existing) => merge(existing, value),
            None => {
                map.insert(path.to_string(), value);
            }
        },
        Some((first, rest)) => {
            let slot = map
                .entry(first.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                put_path(inner, rest, value);
            }
        }
    }
}

/// Merge `value` into `target`. Objects merge key by key, keeping keys the
/// new value does not mention; anything else replaces.
pub fn merge(target: &mut Value, value: Value) {
    match (target, value) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (target, value) => *target = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_path() {
        let v = json!({"user": {"id": 7, "tags": ["a"]}});
        assert_eq!(get_path(&v, "user.id"), Some(&json!(7)));
        assert_eq!(get_path(&v, "user.name"), None);
        assert_eq!(get_path(&v, "user.id.x"), None);
    }

    #[test]
    fn test_put_path_merges_objects() {
        let mut map = Map::new();
        put_path(&mut map, "book", json!({"id": 1, "title": "A"}));
        put_path(&mut map, "book", json!({"title": "B", "year": 2020}));
        put_path(&mut map, "meta.count", json!(3));

        assert_eq!(
            Value::Object(map),
            json!({"book": {"id": 1, "title": "B", "year": 2020}, "meta": {"count": 3}})
        );
    }

    #[test]
    fn test_put_path_replaces_scalars() {
        let mut map = Map::new();
        put_path(&mut map, "n", json!(1));
        put_path(&mut map, "n", json!([1, 2]));
        put_path(&mut map, "n.inner", json!(true));
        assert_eq!(Value::Object(map), json!({"n": {"inner": true}}));
    }
}
