use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque structured observation blob. Must be a JSON object (empty is
/// fine); null and non-object values are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct SubmissionData(Value);

impl SubmissionData {
    pub fn new(value: Value) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| format!("Invalid JSON payload: {e}"))?;
        Self::new(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Shallow merge of `patch` into the current object. Returns a new
    /// value; the original is untouched.
    pub fn merged_with(&self, patch: &Value) -> Result<Self, String> {
        let patch_map = patch
            .as_object()
            .ok_or_else(|| "Data patch must be a JSON object".to_string())?;
        let mut merged: Map<String, Value> = self
            .0
            .as_object()
            .cloned()
            .unwrap_or_default();
        for (key, value) in patch_map {
            merged.insert(key.clone(), value.clone());
        }
        Self::new(Value::Object(merged))
    }

    fn validate(value: &Value) -> Result<(), String> {
        if !value.is_object() {
            return Err("Submission data must be a JSON object".to_string());
        }
        Ok(())
    }
}

impl TryFrom<Value> for SubmissionData {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubmissionData> for Value {
    fn from(data: SubmissionData) -> Self {
        data.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_and_scalar_data_are_rejected() {
        assert!(SubmissionData::new(Value::Null).is_err());
        assert!(SubmissionData::new(json!(42)).is_err());
        assert!(SubmissionData::new(json!("auto")).is_err());
    }

    #[test]
    fn test_empty_object_is_accepted() {
        assert!(SubmissionData::new(json!({})).is_ok());
    }

    #[test]
    fn test_merge_overwrites_and_preserves() {
        let data = SubmissionData::new(json!({"auto": 3, "teleop": 5})).unwrap();
        let merged = data.merged_with(&json!({"teleop": 7, "endgame": 2})).unwrap();
        assert_eq!(merged.as_json(), &json!({"auto": 3, "teleop": 7, "endgame": 2}));
        // original untouched
        assert_eq!(data.as_json(), &json!({"auto": 3, "teleop": 5}));
    }
}
