use crate::NodeError;
use crate::validation::type_name;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value store threaded through every node of one flow run.
///
/// No schema is enforced: nodes read the keys they expect and write the
/// keys downstream nodes expect.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedState {
    data: Map<String, Value>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Get a key or fail with [`NodeError::MissingInput`].
    pub fn require(&self, key: &str) -> Result<&Value, NodeError> {
        self.data
            .get(key)
            .ok_or_else(|| NodeError::MissingInput(key.to_string()))
    }

    pub fn require_str(&self, key: &str) -> Result<&str, NodeError> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: key.to_string(),
            expected: "string".to_string(),
            actual: type_name(value).to_string(),
        })
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.data.clone())
    }
}

impl From<Map<String, Value>> for SharedState {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for SharedState {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl TryFrom<Value> for SharedState {
    type Error = NodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(data) => Ok(Self { data }),
            other => Err(NodeError::InvalidInputType {
                field: "shared".to_string(),
                expected: "object".to_string(),
                actual: type_name(&other).to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_reports_missing_key() {
        let shared = SharedState::new();
        assert!(matches!(shared.require("cfg"), Err(NodeError::MissingInput(k)) if k == "cfg"));
    }

    #[test]
    fn require_str_reports_actual_type() {
        let mut shared = SharedState::new();
        shared.insert("path", 5);
        match shared.require_str("path") {
            Err(NodeError::InvalidInputType { actual, .. }) => assert_eq!(actual, "number"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn only_objects_convert() {
        assert!(SharedState::try_from(json!({"a": 1})).is_ok());
        assert!(SharedState::try_from(json!([1])).is_err());
    }
}
