//! # Watermark Value Object
//!
//! 同期済みデータの上限タイムスタンプ

use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// ウォーターマーク
///
/// これ以下のタイムスタンプを持つ行は Dataverse へ反映済みであることを表す。
/// 値は単調非減少で、`advance` 以外では変化しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp)
    }

    /// RFC 3339 文字列からウォーターマークを作成
    ///
    /// # Errors
    ///
    /// RFC 3339 として解釈できない場合にエラーを返す
    pub fn parse(value: &str) -> Result<Self> {
        let timestamp = DateTime::parse_from_rfc3339(value.trim())
            .with_context(|| format!("Invalid RFC 3339 timestamp: {}", value))?;
        Ok(Self(timestamp.with_timezone(&Utc)))
    }

    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }

    /// `Z` 終端の ISO-8601 表現
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// ウォーターマークを進める
    ///
    /// 候補が現在値より新しい場合のみ更新し、更新したかどうかを返す
    pub fn advance(&mut self, candidate: DateTime<Utc>) -> bool {
        if candidate > self.0 {
            self.0 = candidate;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Watermark {
    fn from(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp)
    }
}
