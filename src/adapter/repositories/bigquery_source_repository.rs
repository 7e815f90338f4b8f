//! BigQuery Source Repository Implementation
//!
//! SourceRepositoryのBigQuery実装

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::adapter::bigquery::client::{BigQueryClientFactory, BigQueryQuerier};
use crate::adapter::bigquery::query::build_select;
use crate::domain::entities::source_row::SourceRow;
use crate::domain::repositories::source_repository::{SourceFilter, SourceRepository};
use crate::domain::services::column_mapping::ColumnMapping;

/// BigQueryソースリポジトリ
///
/// クライアントは最初のページ取得時に一度だけ作成する
pub struct BigQuerySourceRepository {
    factory: Arc<dyn BigQueryClientFactory>,
    client: OnceCell<Box<dyn BigQueryQuerier>>,
    project_id: String,
    table: String,
    mapping: ColumnMapping,
}

impl BigQuerySourceRepository {
    /// 新しいリポジトリを作成
    ///
    /// # Arguments
    ///
    /// * `factory` - クライアントファクトリ
    /// * `project_id` - クエリを実行するプロジェクト
    /// * `table` - `dataset.table` 形式のテーブル名
    /// * `mapping` - 取得するカラムの定義
    pub fn new(
        factory: Arc<dyn BigQueryClientFactory>,
        project_id: impl Into<String>,
        table: impl Into<String>,
        mapping: ColumnMapping,
    ) -> Self {
        Self {
            factory,
            client: OnceCell::new(),
            project_id: project_id.into(),
            table: table.into(),
            mapping,
        }
    }

    async fn client(&self) -> Result<&dyn BigQueryQuerier> {
        let client = self
            .client
            .get_or_try_init(|| self.factory.create_client())
            .await
            .context("Failed to create BigQuery client")?;
        Ok(client.as_ref())
    }
}

#[async_trait]
impl SourceRepository for BigQuerySourceRepository {
    async fn fetch_page(&self, filter: &SourceFilter, limit: usize) -> Result<Vec<SourceRow>> {
        let query = build_select(&self.project_id, &self.table, &self.mapping, filter, limit);
        debug!("{}", query.sql);

        let rows = self
            .client()
            .await?
            .query_rows(&self.project_id, &query)
            .await?;

        debug!("Fetched {} rows", rows.len());
        Ok(rows)
    }
}
