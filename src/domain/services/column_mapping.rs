//! # Column Mapping Service
//!
//! ソース行から Dataverse アップサート操作への変換

use anyhow::{anyhow, bail, Result};
use serde_json::{Map, Value};

use crate::domain::entities::source_row::SourceRow;
use crate::domain::entities::upsert_batch::{UpsertBatch, UpsertOperation};

/// ソースカラム → Dataverse 属性の1対応
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: String,
    pub target: String,
}

/// 変換できなかった行
#[derive(Debug, Clone)]
pub struct RejectedRow {
    /// チャンク内での行位置
    pub index: usize,
    pub reason: String,
}

/// カラムマッピング
///
/// 1テーブル → 1エンティティの対応を表す。値の変換は行わず、
/// ソースの値をそのまま文字列（NULL は `null`）として送る。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// エンティティセット名
    pub entity_set: String,
    /// 代替キー属性名
    pub alternate_key: String,
    /// 代替キーの値を持つソースカラム
    pub key_column: String,
    /// 更新日時カラム
    pub timestamp_column: String,
    pub fields: Vec<FieldMapping>,
}

impl ColumnMapping {
    /// `source:target,source:target` 形式のマッピング定義をパース
    ///
    /// # Errors
    ///
    /// 空の定義、`:` の無い要素、識別子として不正な名前があればエラーを返す
    pub fn parse_fields(definition: &str) -> Result<Vec<FieldMapping>> {
        let mut fields = Vec::new();

        for pair in definition.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (source, target) = pair
                .split_once(':')
                .ok_or_else(|| anyhow!("Column mapping '{}' must be 'source:target'", pair))?;
            let (source, target) = (source.trim(), target.trim());

            ensure_identifier(source)?;
            ensure_identifier(target)?;

            fields.push(FieldMapping {
                source: source.to_string(),
                target: target.to_string(),
            });
        }

        if fields.is_empty() {
            bail!("Column mapping must contain at least one 'source:target' pair");
        }

        Ok(fields)
    }

    /// すべての名前が識別子として安全かを検証
    pub fn validate(&self) -> Result<()> {
        ensure_identifier(&self.entity_set)?;
        ensure_identifier(&self.alternate_key)?;
        ensure_identifier(&self.key_column)?;
        ensure_identifier(&self.timestamp_column)?;
        for field in &self.fields {
            ensure_identifier(&field.source)?;
            ensure_identifier(&field.target)?;
        }
        Ok(())
    }

    /// SELECT すべきソースカラム（重複なし、定義順）
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        let candidates = self
            .fields
            .iter()
            .map(|f| f.source.as_str())
            .chain([self.key_column.as_str(), self.timestamp_column.as_str()]);

        for column in candidates {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
        columns
    }

    /// 代替キーの値（NULL・空文字は `None`）
    ///
    /// 値は加工しない。前後の空白も Dataverse 側のキーの一部として扱う
    pub fn key_value(&self, row: &SourceRow) -> Option<String> {
        row.get(&self.key_column)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// ページ継続用のキー
    ///
    /// ソースの `COALESCE(CAST(key AS STRING), '')` と同じ値（NULL は空文字）
    pub fn cursor_key(&self, row: &SourceRow) -> String {
        row.get(&self.key_column).unwrap_or_default().to_string()
    }

    /// 1行をアップサート操作に変換
    ///
    /// # Errors
    ///
    /// キーが NULL / 空の場合にエラーを返す
    pub fn to_operation(&self, row: &SourceRow) -> Result<UpsertOperation> {
        let key_value = self
            .key_value(row)
            .ok_or_else(|| anyhow!("Key column '{}' is NULL or empty", self.key_column))?;

        let mut body = Map::new();
        for field in &self.fields {
            let value = row
                .get(&field.source)
                .map(|v| Value::String(v.to_string()))
                .unwrap_or(Value::Null);
            body.insert(field.target.clone(), value);
        }

        Ok(UpsertOperation {
            entity_set: self.entity_set.clone(),
            key_name: self.alternate_key.clone(),
            key_value,
            body,
        })
    }

    /// 行のチャンクをバッチに変換
    ///
    /// 変換できない行はバッチから除外し、理由とともに返す
    pub fn to_batch(&self, rows: &[SourceRow]) -> (UpsertBatch, Vec<RejectedRow>) {
        let mut operations = Vec::with_capacity(rows.len());
        let mut rejected = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            match self.to_operation(row) {
                Ok(op) => operations.push(op),
                Err(e) => rejected.push(RejectedRow {
                    index,
                    reason: format!("{:#}", e),
                }),
            }
        }

        (UpsertBatch::new(operations), rejected)
    }
}

/// SQL・URL に埋め込める識別子か（`[A-Za-z_][A-Za-z0-9_]*`）
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn ensure_identifier(name: &str) -> Result<()> {
    if !is_identifier(name) {
        bail!("'{}' is not a valid column or attribute name", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_mapping() -> ColumnMapping {
        ColumnMapping {
            entity_set: "new_customers".to_string(),
            alternate_key: "externalid".to_string(),
            key_column: "externalid".to_string(),
            timestamp_column: "updated_at".to_string(),
            fields: ColumnMapping::parse_fields(
                "externalid:new_externalid,name:name,email:emailaddress1,phone:telephone1",
            )
            .unwrap(),
        }
    }

    fn create_test_row(key: Option<&str>) -> SourceRow {
        SourceRow::default()
            .with("externalid", key)
            .with("name", Some("Alice"))
            .with("email", Some("alice@example.com"))
            .with("phone", None)
            .with("updated_at", Some("2024-12-25T10:00:00Z"))
    }

    #[test]
    fn test_parse_fields() {
        let fields = ColumnMapping::parse_fields(" a:b , c:d ,").unwrap();
        assert_eq!(
            fields,
            vec![
                FieldMapping {
                    source: "a".to_string(),
                    target: "b".to_string()
                },
                FieldMapping {
                    source: "c".to_string(),
                    target: "d".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_fields_rejects_bad_input() {
        assert!(ColumnMapping::parse_fields("").is_err());
        assert!(ColumnMapping::parse_fields("name").is_err());
        assert!(ColumnMapping::parse_fields("name:").is_err());
        assert!(ColumnMapping::parse_fields("na me:name").is_err());
        assert!(ColumnMapping::parse_fields("name:x'; DROP").is_err());
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("updated_at"));
        assert!(is_identifier("_col1"));
        assert!(!is_identifier("1col"));
        assert!(!is_identifier("col-1"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_validate() {
        let mut mapping = create_test_mapping();
        assert!(mapping.validate().is_ok());

        mapping.entity_set = "new customers".to_string();
        assert!(mapping.validate().is_err());
    }

    #[test]
    fn test_source_columns_deduplicated() {
        let mapping = create_test_mapping();
        assert_eq!(
            mapping.source_columns(),
            vec!["externalid", "name", "email", "phone", "updated_at"]
        );
    }

    #[test]
    fn test_to_operation() {
        let mapping = create_test_mapping();
        let op = mapping.to_operation(&create_test_row(Some("CUST001"))).unwrap();

        assert_eq!(op.entity_set, "new_customers");
        assert_eq!(op.key_name, "externalid");
        assert_eq!(op.key_value, "CUST001");
        assert_eq!(
            serde_json::Value::Object(op.body),
            json!({
                "new_externalid": "CUST001",
                "name": "Alice",
                "emailaddress1": "alice@example.com",
                "telephone1": null
            })
        );
    }

    #[test]
    fn test_to_operation_missing_key() {
        let mapping = create_test_mapping();

        assert!(mapping.to_operation(&create_test_row(None)).is_err());
        assert!(mapping.to_operation(&create_test_row(Some(""))).is_err());
    }

    #[test]
    fn test_key_value_is_not_trimmed() {
        let mapping = create_test_mapping();
        let op = mapping.to_operation(&create_test_row(Some("A "))).unwrap();

        assert_eq!(op.key_value, "A ");
        assert_eq!(op.relative_url(), "new_customers(externalid='A%20')");
        assert_eq!(
            mapping.to_operation(&create_test_row(Some("  "))).unwrap().key_value,
            "  "
        );
    }

    #[test]
    fn test_cursor_key_uses_raw_value() {
        let mapping = create_test_mapping();

        assert_eq!(mapping.cursor_key(&create_test_row(Some(" K1 "))), " K1 ");
        assert_eq!(mapping.cursor_key(&create_test_row(Some(""))), "");
        assert_eq!(mapping.cursor_key(&create_test_row(None)), "");
    }

    #[test]
    fn test_to_batch_reports_rejected_rows() {
        let mapping = create_test_mapping();
        let rows = vec![
            create_test_row(Some("A")),
            create_test_row(None),
            create_test_row(Some("C")),
        ];

        let (batch, rejected) = mapping.to_batch(&rows);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.operations()[0].key_value, "A");
        assert_eq!(batch.operations()[1].key_value, "C");
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].index, 1);
        assert!(rejected[0].reason.contains("externalid"));
    }
}
