//! # Watermark Policy Service
//!
//! ウォーターマークをどこまで進めてよいかの判定

use chrono::{DateTime, Utc};

/// ウォーターマーク判定サービス
///
/// ページ内の行は更新日時の昇順に並んでいる前提。
/// 次回実行は `更新日時 > ウォーターマーク` で取得するため、
/// 同じ更新日時を持つ行が未確定のまま残っている値まで進めてはならない。
pub struct WatermarkPolicy;

impl WatermarkPolicy {
    /// 先頭 `confirmed` 行が確定した時点で安全なウォーターマーク候補を返す
    ///
    /// # Arguments
    ///
    /// * `timestamps` - ページ内の行の更新日時（取得順）
    /// * `confirmed` - 確定済みの先頭行数
    /// * `page_full` - ページが上限まで埋まっていたか（次ページに同時刻の行が続く可能性）
    ///
    /// # Returns
    ///
    /// 未確定行と同時刻の行を除いた確定済み行の最大更新日時。候補が無ければ `None`
    pub fn safe_advance(
        timestamps: &[DateTime<Utc>],
        confirmed: usize,
        page_full: bool,
    ) -> Option<DateTime<Utc>> {
        let confirmed = confirmed.min(timestamps.len());
        if confirmed == 0 {
            return None;
        }

        let boundary = if confirmed < timestamps.len() {
            Some(timestamps[confirmed])
        } else if page_full {
            timestamps.last().copied()
        } else {
            None
        };

        timestamps[..confirmed]
            .iter()
            .copied()
            .filter(|ts| boundary.map_or(true, |b| *ts < b))
            .max()
    }

    /// ページ全体が確定したときの最大更新日時
    ///
    /// 後続ページが空だった場合、保留していた同時刻の行も確定とみなせる
    pub fn page_high(timestamps: &[DateTime<Utc>]) -> Option<DateTime<Utc>> {
        timestamps.iter().copied().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 25, 10, minute, 0).unwrap()
    }

    #[test]
    fn test_nothing_confirmed() {
        let timestamps = vec![ts(1), ts(2)];
        assert_eq!(WatermarkPolicy::safe_advance(&timestamps, 0, false), None);
        assert_eq!(WatermarkPolicy::safe_advance(&[], 3, false), None);
    }

    #[test]
    fn test_distinct_timestamps() {
        let timestamps = vec![ts(1), ts(2), ts(3), ts(4)];
        assert_eq!(
            WatermarkPolicy::safe_advance(&timestamps, 2, false),
            Some(ts(2))
        );
    }

    #[test]
    fn test_last_page_fully_confirmed() {
        let timestamps = vec![ts(1), ts(2), ts(3)];
        assert_eq!(
            WatermarkPolicy::safe_advance(&timestamps, 3, false),
            Some(ts(3))
        );
    }

    #[test]
    fn test_tie_with_unsent_row_is_held_back() {
        // rows 0..3 confirmed, row 3 shares ts(2) with row 2
        let timestamps = vec![ts(1), ts(1), ts(2), ts(2), ts(3)];
        assert_eq!(
            WatermarkPolicy::safe_advance(&timestamps, 3, false),
            Some(ts(1))
        );
    }

    #[test]
    fn test_whole_prefix_tied_with_unsent_row() {
        let timestamps = vec![ts(5), ts(5), ts(5)];
        assert_eq!(WatermarkPolicy::safe_advance(&timestamps, 2, false), None);
    }

    #[test]
    fn test_full_page_holds_back_last_timestamp() {
        let timestamps = vec![ts(1), ts(2), ts(3), ts(3)];
        assert_eq!(
            WatermarkPolicy::safe_advance(&timestamps, 4, true),
            Some(ts(2))
        );
    }

    #[test]
    fn test_confirmed_clamped_to_len() {
        let timestamps = vec![ts(1), ts(2)];
        assert_eq!(
            WatermarkPolicy::safe_advance(&timestamps, 10, false),
            Some(ts(2))
        );
    }

    #[test]
    fn test_page_high() {
        assert_eq!(WatermarkPolicy::page_high(&[ts(3), ts(9), ts(4)]), Some(ts(9)));
        assert_eq!(WatermarkPolicy::page_high(&[]), None);
    }
}
