//! Dataverse Web API Client
//!
//! `$batch` エンドポイントへの送信

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;

#[cfg(test)]
use mockall::automock;

use super::payload::{encode_batch, parse_batch_response};
use crate::adapter::auth::TokenProvider;
use crate::domain::entities::upsert_batch::UpsertBatch;
use crate::domain::errors::SyncError;
use crate::domain::repositories::sink_repository::OperationOutcome;

/// Trait for posting `$batch` requests
/// This enables mocking in tests while using the real client in production
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BatchSender: Send + Sync {
    /// Send every operation of `batch` in one request.
    ///
    /// Returns one outcome per operation, in request order.
    async fn post_batch(&self, batch: &UpsertBatch) -> Result<Vec<OperationOutcome>>;
}

pub struct DataverseClient {
    http: reqwest::Client,
    api_base_url: String,
    token_provider: Arc<dyn TokenProvider>,
}

impl DataverseClient {
    pub fn new(
        http: reqwest::Client,
        api_base_url: impl Into<String>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            token_provider,
        }
    }

    pub fn batch_url(&self) -> String {
        format!("{}/$batch", self.api_base_url)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[async_trait]
impl BatchSender for DataverseClient {
    async fn post_batch(&self, batch: &UpsertBatch) -> Result<Vec<OperationOutcome>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let token = self.token_provider.token().await?;
        let request = encode_batch(batch, &self.api_base_url)?;

        debug!(
            "POST {} ({} operations, boundary {})",
            self.batch_url(),
            batch.len(),
            request.boundary
        );

        let response = self
            .http
            .post(self.batch_url())
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(CONTENT_TYPE, request.content_type())
            .header(ACCEPT, "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .header("Prefer", "odata.continue-on-error")
            .body(request.body)
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("$batch request failed: {}", e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Transport(format!("Failed to read $batch response: {}", e)))?;

        check_status(status, &body)?;

        let outcomes = parse_batch_response(&content_type, &body)
            .map_err(|e| SyncError::Transport(format!("Unreadable $batch response: {:#}", e)))?;
        check_outcome_count(batch.len(), &outcomes)?;

        Ok(outcomes)
    }
}

/// Classify a whole-request failure
fn check_status(status: StatusCode, body: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    let detail: String = body.chars().take(500).collect();
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SyncError::Auth(format!("Dataverse rejected the token ({}): {}", status, detail))
        }
        _ => SyncError::Transport(format!("$batch returned {}: {}", status, detail)),
    };
    Err(err.into())
}

fn check_outcome_count(expected: usize, outcomes: &[OperationOutcome]) -> Result<()> {
    if outcomes.len() != expected {
        return Err(SyncError::Transport(format!(
            "$batch response has {} results for {} operations",
            outcomes.len(),
            expected
        ))
        .into());
    }
    Ok(())
}
