//! # Source Repository Trait
//!
//! ソーステーブルからの行取得を抽象化

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::source_row::SourceRow;
use crate::domain::repositories::watermark_repository::WatermarkState;

/// 取得条件
///
/// 更新日時 `since` より後（`inclusive` なら以上）の行を、
/// (更新日時, キー) の昇順で取得する。キーは文字列として比較し、NULL は空文字とみなす。
/// `after_key` があれば `since` と同時刻の行のうちキーがそれより大きいものだけを対象とする。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFilter {
    pub since: DateTime<Utc>,
    pub inclusive: bool,
    pub after_key: Option<String>,
}

impl SourceFilter {
    /// 実行開始時の条件
    pub fn from_state(state: &WatermarkState) -> Self {
        Self {
            since: state.watermark.timestamp(),
            inclusive: state.is_default,
            after_key: None,
        }
    }

    /// ページ末尾の行の直後から続ける条件
    ///
    /// `key` は末尾の行のキーそのまま（NULL なら空文字）
    pub fn after(since: DateTime<Utc>, key: impl Into<String>) -> Self {
        Self {
            since,
            inclusive: false,
            after_key: Some(key.into()),
        }
    }
}

/// ソースリポジトリ
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// 条件に合う行を最大 `limit` 件取得する
    ///
    /// # Arguments
    ///
    /// * `filter` - 取得条件
    /// * `limit` - 最大件数
    ///
    /// # Errors
    ///
    /// 認証失敗、クエリ不正、クォータ超過などはそのまま返す
    async fn fetch_page(&self, filter: &SourceFilter, limit: usize) -> Result<Vec<SourceRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::watermark::Watermark;

    #[test]
    fn test_filter_from_default_state_is_inclusive() {
        let wm = Watermark::parse("2020-01-01T00:00:00Z").unwrap();
        let filter = SourceFilter::from_state(&WatermarkState::default_value(wm));

        assert!(filter.inclusive);
        assert_eq!(filter.since, wm.timestamp());
        assert!(filter.after_key.is_none());
    }

    #[test]
    fn test_filter_from_persisted_state_is_exclusive() {
        let wm = Watermark::parse("2024-06-01T00:00:00Z").unwrap();
        let filter = SourceFilter::from_state(&WatermarkState::persisted(wm));

        assert!(!filter.inclusive);
    }

    #[test]
    fn test_filter_after() {
        let wm = Watermark::parse("2024-06-01T00:00:00Z").unwrap();
        let filter = SourceFilter::after(wm.timestamp(), "K9");

        assert!(!filter.inclusive);
        assert_eq!(filter.after_key.as_deref(), Some("K9"));
    }
}
