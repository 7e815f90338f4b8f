//! BigQuery Client Abstractions
//!
//! クライアントの抽象化と実装

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use google_cloud_bigquery::client::Client;
use google_cloud_bigquery::http::job::query::QueryRequest;
use google_cloud_bigquery::query::row::Row;

#[cfg(test)]
use mockall::automock;

use crate::adapter::bigquery::query::SelectQuery;
use crate::domain::entities::source_row::SourceRow;
use crate::domain::errors::SyncError;

/// Trait for BigQuery query operations
/// This enables mocking in tests while using the real client in production
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BigQueryQuerier: Send + Sync {
    /// Run a parameterized standard SQL query and read its columns (in SELECT order) as nullable strings
    async fn query_rows(&self, project_id: &str, query: &SelectQuery) -> Result<Vec<SourceRow>>;
}

/// BigQuery client that owns the Client instance
pub struct OwnedBigQueryClient {
    client: Client,
}

impl OwnedBigQueryClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[async_trait]
impl BigQueryQuerier for OwnedBigQueryClient {
    async fn query_rows(&self, project_id: &str, query: &SelectQuery) -> Result<Vec<SourceRow>> {
        let request = QueryRequest {
            query: query.sql.clone(),
            parameter_mode: Some("NAMED".to_string()),
            query_parameters: query.parameters.clone(),
            ..Default::default()
        };

        let mut iter = self
            .client
            .query::<Row>(project_id, request)
            .await
            .map_err(|e| SyncError::Query(format!("BigQuery query failed: {}", e)))?;

        let mut rows = Vec::new();
        while let Some(row) = iter
            .next()
            .await
            .map_err(|e| SyncError::Query(format!("Failed to read query results: {}", e)))?
        {
            let mut values = BTreeMap::new();
            for (index, column) in query.columns.iter().enumerate() {
                let value = row
                    .column::<Option<String>>(index)
                    .with_context(|| format!("Failed to decode column '{}'", column))?;
                values.insert(column.clone(), value);
            }
            rows.push(SourceRow::new(values));
        }

        Ok(rows)
    }
}

/// Factory for creating BigQuery clients
#[async_trait]
pub trait BigQueryClientFactory: Send + Sync {
    async fn create_client(&self) -> Result<Box<dyn BigQueryQuerier>>;
}

/// Production implementation of BigQueryClientFactory
pub struct RealClientFactory {
    key_path: Option<String>,
}

impl RealClientFactory {
    pub fn new(key_path: Option<String>) -> Self {
        Self { key_path }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[async_trait]
impl BigQueryClientFactory for RealClientFactory {
    async fn create_client(&self) -> Result<Box<dyn BigQueryQuerier>> {
        let client = crate::adapter::auth::create_bigquery_client(self.key_path.as_deref()).await?;
        Ok(Box::new(OwnedBigQueryClient::new(client)))
    }
}
