use crate::field_rule::FieldRuleSet;
use crate::models::RawIssue;
use crate::projection::{ProjectionError, project};

/// ヘッダー行の先頭列の見出し
pub const KEY_COLUMN_HEADER: &str = "Key";

/// 値を空文字列に置き換えたフィールドの記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWarning {
    pub field: String,
    pub error: ProjectionError,
}

/// 1 Issue 分の出力行
///
/// `values[0]` は常にIssueキーで、以降はルールの宣言順に並ぶ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub values: Vec<String>,
    pub warnings: Vec<FieldWarning>,
}

impl ExportRow {
    pub fn key(&self) -> &str {
        self.values.first().map(String::as_str).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn join(&self, delimiter: &str) -> String {
        self.values.join(delimiter)
    }
}

/// Issueからルール順に列を組み立てる
///
/// 平坦化に失敗した列は空文字列にして警告を残す。行全体は失敗させない。
pub fn build_row(issue: &RawIssue, rules: &FieldRuleSet) -> ExportRow {
    let mut values = Vec::with_capacity(rules.len() + 1);
    let mut warnings = Vec::new();

    values.push(issue.key.clone());

    for rule in rules {
        let raw = issue.field(&rule.internal_name);
        match project(&rule.projection, raw) {
            Ok(value) => values.push(value),
            Err(error) => {
                tracing::warn!(
                    issue = %issue.key,
                    field = %rule.internal_name,
                    %error,
                    "field value does not match its configured shape, exporting empty value"
                );
                values.push(String::new());
                warnings.push(FieldWarning {
                    field: rule.internal_name.clone(),
                    error,
                });
            }
        }
    }

    ExportRow { values, warnings }
}

pub fn header_row(rules: &FieldRuleSet) -> Vec<String> {
    std::iter::once(KEY_COLUMN_HEADER.to_string())
        .chain(rules.display_names())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> FieldRuleSet {
        FieldRuleSet::from_entries([
            ("summary", "Issue Summary,single,plain,"),
            ("priority", "Priority,single,json,name"),
            ("labels", "Labels,multi,plain,"),
            ("components", "Component/s,multi,json,name"),
            ("customfield_40", "Si,cascade,json,value"),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_row_in_declared_order() {
        // Given: 全フィールドが埋まったIssue
        let issue = RawIssue::new("DUM-1")
            .with_field("labels", json!(["a", "b"]))
            .with_field("summary", json!("Fix bug"))
            .with_field("customfield_40", json!({"value": "P", "child": {"value": "C"}}))
            .with_field("priority", json!({"name": "High"}))
            .with_field("components", json!([{"name": "API"}, {"name": "UI"}]));

        // When: 行を組み立てる
        let row = build_row(&issue, &rules());

        // Then: キーが先頭で、宣言順に並ぶ
        assert_eq!(row.values, vec!["DUM-1", "Fix bug", "High", "a,b", "API,UI", "P -> C"]);
        assert_eq!(row.key(), "DUM-1");
        assert!(!row.has_warnings());
    }

    #[test]
    fn test_build_row_length_with_absent_fields() {
        let rules = rules();
        let issue = RawIssue::new("DUM-2");

        let row = build_row(&issue, &rules);

        assert_eq!(row.len(), 1 + rules.len());
        assert_eq!(row.join(";"), "DUM-2;;;;;");
    }

    #[test]
    fn test_build_row_substitutes_empty_on_shape_mismatch() {
        // Given: priority がオブジェクトでなく文字列
        let rules = rules();
        let issue = RawIssue::new("DUM-3")
            .with_field("summary", json!("Broken"))
            .with_field("priority", json!("High"));

        // When: 行を組み立てる
        let row = build_row(&issue, &rules);

        // Then: 該当列は空になり、警告が記録される
        assert_eq!(row.len(), 1 + rules.len());
        assert_eq!(row.values[1], "Broken");
        assert_eq!(row.values[2], "");
        assert_eq!(row.warnings.len(), 1);
        assert_eq!(row.warnings[0].field, "priority");
        assert!(matches!(
            row.warnings[0].error,
            ProjectionError::ShapeMismatch { expected: "object", .. }
        ));
    }

    #[test]
    fn test_header_row() {
        assert_eq!(
            header_row(&rules()),
            vec!["Key", "Issue Summary", "Priority", "Labels", "Component/s", "Si"]
        );
    }
}
