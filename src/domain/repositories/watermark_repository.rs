//! # Watermark Repository Trait
//!
//! ウォーターマークの永続化を抽象化

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::entities::watermark::Watermark;

/// 読み込んだウォーターマーク
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkState {
    pub watermark: Watermark,
    /// 永続化された値が無く、既定値を使っているか
    ///
    /// 既定値はまだ何も同期していないことを意味するため、その時刻ちょうどの行も取得対象に含める
    pub is_default: bool,
}

impl WatermarkState {
    pub fn persisted(watermark: Watermark) -> Self {
        Self {
            watermark,
            is_default: false,
        }
    }

    pub fn default_value(watermark: Watermark) -> Self {
        Self {
            watermark,
            is_default: true,
        }
    }
}

/// ウォーターマークリポジトリ
///
/// 単一プロセス・単一書き込みを前提とし、ロックは行わない
#[async_trait]
pub trait WatermarkRepository: Send + Sync {
    /// ウォーターマークを読み込む
    ///
    /// 保存先が存在しない、または壊れている場合は既定値を返す
    async fn load(&self) -> Result<WatermarkState>;

    /// ウォーターマークを保存する（既存の値を置き換える）
    ///
    /// # Errors
    ///
    /// 書き込みに失敗した場合にエラーを返す
    async fn save(&self, watermark: &Watermark) -> Result<()>;
}
