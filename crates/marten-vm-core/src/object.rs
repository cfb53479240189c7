//! Property bag objects

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::value::Value;

/// A script object: string-keyed properties behind a lock
#[derive(Debug, Default)]
pub struct JsObject {
    properties: RwLock<FxHashMap<String, Value>>,
}

impl JsObject {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a property
    pub fn get(&self, key: &str) -> Option<Value> {
        self.properties.read().get(key).cloned()
    }

    /// Set a property
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.properties.write().insert(key.into(), value);
    }

    /// Check if a property exists
    pub fn has(&self, key: &str) -> bool {
        self.properties.read().contains_key(key)
    }
}
