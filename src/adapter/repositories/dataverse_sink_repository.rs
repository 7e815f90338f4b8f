//! Dataverse Sink Repository Implementation
//!
//! SinkRepositoryのDataverse実装

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::adapter::dataverse::client::BatchSender;
use crate::domain::entities::upsert_batch::UpsertBatch;
use crate::domain::repositories::sink_repository::{BatchResult, SinkRepository};

/// Dataverseシンクリポジトリ
pub struct DataverseSinkRepository {
    sender: Arc<dyn BatchSender>,
}

impl DataverseSinkRepository {
    /// 新しいリポジトリを作成
    pub fn new(sender: Arc<dyn BatchSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl SinkRepository for DataverseSinkRepository {
    async fn send_batch(&self, batch: &UpsertBatch) -> Result<BatchResult> {
        let outcomes = self.sender.post_batch(batch).await?;
        Ok(BatchResult::new(outcomes))
    }
}
