//! # UpsertBatch Value Object
//!
//! Dataverse へ送るアップサート操作とそのバッチ

use serde_json::{Map, Value};

/// アップサート操作
///
/// 代替キーで対象レコードを特定する `PATCH entity(key='value')` 1件分
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOperation {
    /// エンティティセット名（例: `new_customers`）
    pub entity_set: String,
    /// 代替キーの論理名
    pub key_name: String,
    /// 代替キーの値
    pub key_value: String,
    /// 送信するフィールド
    pub body: Map<String, Value>,
}

impl UpsertOperation {
    /// Web API ルートからの相対URL
    ///
    /// OData の文字列リテラル規則に従い `'` は `''` にエスケープし、
    /// URL に使えない文字はパーセントエンコードする
    ///
    /// ```
    /// use bq2dv::domain::entities::upsert_batch::UpsertOperation;
    ///
    /// let op = UpsertOperation {
    ///     entity_set: "new_customers".to_string(),
    ///     key_name: "externalid".to_string(),
    ///     key_value: "O'Brien 01".to_string(),
    ///     body: Default::default(),
    /// };
    ///
    /// assert_eq!(op.relative_url(), "new_customers(externalid='O''Brien%2001')");
    /// ```
    pub fn relative_url(&self) -> String {
        let escaped = self.key_value.replace('\'', "''");
        format!(
            "{}({}='{}')",
            self.entity_set,
            self.key_name,
            percent_encode_key(&escaped)
        )
    }
}

fn percent_encode_key(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'.'
            | b'_'
            | b'~'
            | b'\''
            | b'@'
            | b':'
            | b'!'
            | b'*'
            | b'('
            | b')'
            | b','
            | b';'
            | b'=' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// アップサートバッチ
///
/// 1回の `$batch` リクエストで送る操作の順序付きコレクション
#[derive(Debug, Clone, Default)]
pub struct UpsertBatch {
    operations: Vec<UpsertOperation>,
}

impl UpsertBatch {
    pub fn new(operations: Vec<UpsertOperation>) -> Self {
        Self { operations }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[UpsertOperation] {
        &self.operations
    }
}

impl From<Vec<UpsertOperation>> for UpsertBatch {
    fn from(operations: Vec<UpsertOperation>) -> Self {
        Self::new(operations)
    }
}
