//! Redaction of sensitive fields.
//!
//! Any object key whose lowercase form contains a sensitive substring has
//! its value replaced with `[REDACTED]`, at any depth.

use std::collections::BTreeSet;
use std::sync::RwLock;

use serde_json::Value;

use crate::logging::entry::ContextMap;

pub const REDACTED: &str = "[REDACTED]";

pub const DEFAULT_SENSITIVE_KEYS: [&str; 10] = [
    "password",
    "passphrase",
    "secret",
    "token",
    "apiKey",
    "encryptionKey",
    "privateKey",
    "creditCard",
    "ssn",
    "taxId",
];

#[derive(Debug)]
pub struct LogFilter {
    keys: RwLock<BTreeSet<String>>,
}

impl LogFilter {
    /// Filter with the default sensitive substrings.
    pub fn new() -> Self {
        Self::with_keys(DEFAULT_SENSITIVE_KEYS)
    }

    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: RwLock::new(keys.into_iter().map(|k| k.as_ref().to_lowercase()).collect()),
        }
    }

    pub fn add_sensitive_key(&self, key: &str) {
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_lowercase());
    }

    pub fn remove_sensitive_key(&self, key: &str) {
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key.to_lowercase());
    }

    pub fn sensitive_keys(&self) -> Vec<String> {
        self.keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        Self::matches(&keys, key)
    }

    /// Redacted copy of `value`.
    pub fn filter(&self, value: &Value) -> Value {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        Self::walk(&keys, value)
    }

    /// Redact the top-level map of a log entry.
    pub fn filter_map(&self, map: &ContextMap) -> ContextMap {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        Self::walk_map(&keys, map)
    }

    fn matches(keys: &BTreeSet<String>, key: &str) -> bool {
        let lower = key.to_lowercase();
        keys.iter().any(|k| lower.contains(k.as_str()))
    }

    fn walk(keys: &BTreeSet<String>, value: &Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(items.iter().map(|v| Self::walk(keys, v)).collect()),
            Value::Object(map) => Value::Object(Self::walk_map(keys, map)),
            other => other.clone(),
        }
    }

    fn walk_map(keys: &BTreeSet<String>, map: &ContextMap) -> ContextMap {
        map.iter()
            .map(|(k, v)| {
                let value = if Self::matches(keys, k) {
                    Value::String(REDACTED.into())
                } else {
                    Self::walk(keys, v)
                };
                (k.clone(), value)
            })
            .collect()
    }
}

impl Default for LogFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LogFilter {
    fn clone(&self) -> Self {
        Self::with_keys(self.sensitive_keys())
    }
}
