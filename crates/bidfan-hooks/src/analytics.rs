use serde::Serialize;
use serde_json::Value;

/// Analytics tags a hook may attach to its invocation outcome. Emitted only
/// at verbose trace level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Analytics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub activities: Vec<Activity>,
}

impl Analytics {
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Activity {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<ActivityResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityResult {
    pub status: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub values: Value,
}
