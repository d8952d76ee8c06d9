//! # Global Store
//!
//! Write-once named values shared across components (category ids, locale,
//! feature switches). First write wins; later writes are logged and
//! rejected so a misbehaving component cannot silently repoint a value
//! another component already read.

use std::cell::RefCell;
use std::collections::HashMap;

use log::error;
use serde_json::Value;

#[derive(Default)]
pub struct GlobalStore {
    values: RefCell<HashMap<String, Value>>,
}

impl GlobalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`. Returns the stored value on success and
    /// `None` when the name was already taken (the existing value stays).
    pub fn set(&self, name: &str, value: Value) -> Option<Value> {
        let mut values = self.values.borrow_mut();
        if values.contains_key(name) {
            error!("global {name:?} is already set, ignoring new value");
            return None;
        }
        values.insert(name.to_string(), value.clone());
        Some(value)
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name)
            .and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(|v| v.as_u64())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }
}
