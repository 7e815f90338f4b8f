//! # Sink Repository Trait
//!
//! Dataverse へのアップサート送信を抽象化

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::entities::upsert_batch::UpsertBatch;

/// 1オペレーションの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    /// HTTP ステータスコード
    pub status: u16,
    /// 失敗時のエラーメッセージ
    pub error: Option<String>,
}

impl OperationOutcome {
    pub fn ok(status: u16) -> Self {
        Self {
            status,
            error: None,
        }
    }

    pub fn failed(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// バッチ送信結果
///
/// `outcomes` はリクエスト内のオペレーションと同じ順序
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub outcomes: Vec<OperationOutcome>,
}

impl BatchResult {
    pub fn new(outcomes: Vec<OperationOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.succeeded_count()
    }

    /// バッチ内の全オペレーションが成功したかチェックします。
    ///
    /// # 例
    ///
    /// ```
    /// use bq2dv::domain::repositories::sink_repository::{BatchResult, OperationOutcome};
    ///
    /// let success = BatchResult::new(vec![OperationOutcome::ok(204), OperationOutcome::ok(204)]);
    /// assert!(success.is_success());
    ///
    /// // 部分的な失敗
    /// let partial = BatchResult::new(vec![
    ///     OperationOutcome::ok(204),
    ///     OperationOutcome::failed(400, "Invalid property"),
    /// ]);
    /// assert!(!partial.is_success());
    /// assert_eq!(partial.failed_count(), 1);
    /// ```
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}

/// シンクリポジトリ
#[async_trait]
pub trait SinkRepository: Send + Sync {
    /// バッチを送信し、オペレーションごとの結果を返す
    ///
    /// 一部のオペレーションの失敗は `Ok` の中の結果として返り、他をロールバックしない
    ///
    /// # Errors
    ///
    /// 認証失敗やネットワークエラーなど、バッチ全体が処理されなかった場合にエラーを返す
    async fn send_batch(&self, batch: &UpsertBatch) -> Result<BatchResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_success_range() {
        assert!(OperationOutcome::ok(200).is_success());
        assert!(OperationOutcome::ok(204).is_success());
        assert!(!OperationOutcome::failed(412, "Precondition Failed").is_success());
        assert!(!OperationOutcome::failed(500, "boom").is_success());
    }

    #[test]
    fn test_empty_result_is_success() {
        let result = BatchResult::default();
        assert!(result.is_success());
        assert_eq!(result.succeeded_count(), 0);
    }
}
