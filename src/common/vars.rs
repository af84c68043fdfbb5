//! JSON-object backed key/value bag.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// String-keyed map of JSON values.
///
/// Used for action result payloads, error context details and every scope of
/// the variable store. Serializes transparently as a JSON object.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Vars {
    inner: Map<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to any serializable value.
    ///
    /// Values that fail to serialize are stored as `null`.
    pub fn set<T: Serialize>(
        &mut self,
        key: &str,
        value: T,
    ) -> &mut Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.inner.insert(key.to_string(), value);
        self
    }

    /// Builder form of [`Vars::set`].
    pub fn with<T: Serialize>(
        mut self,
        key: &str,
        value: T,
    ) -> Self {
        self.set(key, value);
        self
    }

    /// Get `key` deserialized as `T`.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Option<T> {
        self.inner.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Borrow the raw JSON value stored under `key`.
    pub fn get_value(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.inner.get(key)
    }

    pub fn remove(
        &mut self,
        key: &str,
    ) -> Option<Value> {
        self.inner.remove(key)
    }

    pub fn contains_key(
        &self,
        key: &str,
    ) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }

    /// Copy every entry of `other` into `self`, overwriting existing keys.
    pub fn extend(
        &mut self,
        other: Vars,
    ) {
        self.inner.extend(other.inner);
    }
}

impl From<Value> for Vars {
    /// Non-object values produce an empty bag.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(inner) => Self {
                inner,
            },
            _ => Self::default(),
        }
    }
}

impl From<Map<String, Value>> for Vars {
    fn from(inner: Map<String, Value>) -> Self {
        Self {
            inner,
        }
    }
}

impl From<Vars> for Value {
    fn from(vars: Vars) -> Self {
        Value::Object(vars.inner)
    }
}

impl FromIterator<(String, Value)> for Vars {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}
