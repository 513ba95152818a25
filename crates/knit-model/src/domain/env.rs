use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{KeyValue, ModelError, ModelResult};

/// Environment passed to the application master *and* every worker container.
///
/// Stored as an ordered list; later entries win on lookup. On the wire it is a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env(Vec<KeyValue>);

impl Env {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn single<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(vec![KeyValue::new(key, value)])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Last value pushed for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Reject entries a process environment cannot carry.
    ///
    /// Keys must be non-empty and free of `=`; neither side may contain NUL.
    pub fn validate(&self) -> ModelResult<()> {
        for kv in &self.0 {
            let reason = if kv.key().is_empty() {
                Some("empty key")
            } else if kv.key().contains('=') {
                Some("key contains '='")
            } else if kv.key().contains('\0') || kv.value().contains('\0') {
                Some("contains NUL byte")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ModelError::InvalidEnv {
                    key: kv.key().to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Collapse overrides into a key-sorted map.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|kv| (kv.key().to_string(), kv.value().to_string()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Env {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(KeyValue::from).collect())
    }
}

impl Serialize for Env {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Env {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, String>::deserialize(deserializer)?;
        Ok(map.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::Env;

    #[test]
    fn push_and_override_last_wins() {
        let mut env = Env::new();
        env.push("FOO", "one");
        env.push("BAR", "x");
        env.push("FOO", "two");

        assert_eq!(env.get("FOO"), Some("two"));
        assert_eq!(env.get("BAR"), Some("x"));
        assert!(env.get("BAZ").is_none());
        assert_eq!(env.to_map().len(), 2);
    }

    #[test]
    fn validate_rejects_bad_keys() {
        assert!(Env::single("", "x").validate().is_err());
        assert!(Env::single("A=B", "x").validate().is_err());
        assert!(Env::single("A", "x\0y").validate().is_err());
        assert!(Env::single("KNIT_LANG", "C.UTF-8").validate().is_ok());
    }

    #[test]
    fn serializes_as_flat_object() {
        let env: Env = [("FOO", "bar"), ("BAZ", "qux")].into_iter().collect();
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(json, r#"{"BAZ":"qux","FOO":"bar"}"#);

        let back: Env = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("FOO"), Some("bar"));
    }
}
