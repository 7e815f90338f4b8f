//! # Sync Errors
//!
//! 同期ジョブのエラー種別

use thiserror::Error;

/// 同期処理のエラー
///
/// どの種別でも実行は中断され、ウォーターマークは最後に確定した値のまま残る。
/// `PartialBatch` のみ後続バッチの送信を止めず、実行終了時に返される。
#[derive(Debug, Error)]
pub enum SyncError {
    /// 必須の環境変数が無い、または値が不正
    #[error("configuration error: {0}")]
    Config(String),

    /// BigQuery / Dataverse どちらかの認証失敗
    #[error("authentication failed: {0}")]
    Auth(String),

    /// SQL不正、クォータ超過など
    #[error("query failed: {0}")]
    Query(String),

    /// ネットワーク / HTTP レベルの失敗
    #[error("transport error: {0}")]
    Transport(String),

    /// `$batch` 内の一部オペレーションが拒否された
    #[error("{failed} of {total} upsert operations were rejected by Dataverse")]
    PartialBatch { failed: usize, total: usize },

    /// ウォーターマークファイルの書き込み失敗
    #[error("watermark persistence failed: {0}")]
    Watermark(String),
}

impl SyncError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
