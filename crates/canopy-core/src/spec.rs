use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::value::Value;

/// Field name → value mapping for one resource instance.
///
/// Holds either what the user declared (desired state) or what the remote
/// system reported (observed state). Which fields are legal, required or
/// computed is decided by the resource kind's [`Schema`](crate::Schema).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceSpec {
    fields: BTreeMap<String, Value>,
}

impl ResourceSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: serde_json::Value) -> Result<Self, CoreError> {
        Ok(serde_json::from_value(json)?)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn get_list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_list)
    }

    /// First element of a single-block list (the `max_items = 1` shape).
    pub fn get_block(&self, name: &str) -> Option<&BTreeMap<String, Value>> {
        self.get_list(name)
            .and_then(|items| items.first())
            .and_then(Value::as_block)
    }

    /// Fetch a required string, for use after validation has passed.
    pub fn require_str(&self, name: &str) -> Result<&str, CoreError> {
        self.get_str(name)
            .ok_or_else(|| CoreError::MissingField(name.to_string()))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        let name = name.into();
        if value.is_null() {
            self.fields.remove(&name);
        } else {
            self.fields.insert(name, value);
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.fields
    }
}

impl From<BTreeMap<String, Value>> for ResourceSpec {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self {
            fields: fields.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ResourceSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut spec = ResourceSpec::new();
        for (k, v) in iter {
            spec.set(k, v);
        }
        spec
    }
}
