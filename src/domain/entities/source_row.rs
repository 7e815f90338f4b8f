//! # SourceRow Entity
//!
//! ソーステーブルから取得した1行

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// ソース行
///
/// カラム名からスカラー値への写像。BigQuery REST API はスカラー値を
/// すべて文字列で返すため、値は `Option<String>`（NULL は `None`）で保持する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRow {
    columns: BTreeMap<String, Option<String>>,
}

impl SourceRow {
    pub fn new(columns: BTreeMap<String, Option<String>>) -> Self {
        Self { columns }
    }

    /// カラムを追加したソース行を返す（テスト・組み立て用）
    pub fn with(mut self, column: &str, value: Option<&str>) -> Self {
        self.columns
            .insert(column.to_string(), value.map(str::to_string));
        self
    }

    /// カラム値を取得
    ///
    /// カラムが存在しない場合と NULL の場合はどちらも `None`
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).and_then(|v| v.as_deref())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn columns(&self) -> &BTreeMap<String, Option<String>> {
        &self.columns
    }

    /// 更新日時カラムをUTCタイムスタンプとして解釈
    ///
    /// RFC 3339 と BigQuery の既定表記（`2024-01-01 00:00:00 UTC`）を受け付ける
    ///
    /// # Errors
    ///
    /// カラムが無い、NULL、または解釈できない場合にエラーを返す
    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>> {
        let raw = self
            .get(column)
            .ok_or_else(|| anyhow!("Column '{}' is missing or NULL", column))?;
        parse_timestamp(raw).with_context(|| format!("Column '{}' is not a timestamp", column))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    let naive = raw.strip_suffix(" UTC").unwrap_or(raw);
    let ts = NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f")
        .with_context(|| format!("Unrecognized timestamp: {}", raw))?;
    Ok(ts.and_utc())
}
