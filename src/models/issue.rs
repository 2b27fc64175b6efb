use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 検索結果のIssue（フィールドは型付けせずにJSONのまま保持する）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawIssue {
    pub key: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RawIssue {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// フィールド値を取得する。存在しない場合は `None`
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
