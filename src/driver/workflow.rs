//! Workflow Orchestration
//!
//! ワークフローのオーケストレーション

use anyhow::Result;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::auth::{ClientCredentialsTokenProvider, TokenProvider};
use crate::adapter::bigquery::client::RealClientFactory;
use crate::adapter::config::Config;
use crate::adapter::dataverse::DataverseClient;
use crate::adapter::repositories::{
    BigQuerySourceRepository, DataverseSinkRepository, JsonWatermarkRepository,
};
use crate::application::use_cases::sync_rows::{SyncRowsUseCase, SyncSummary};
use crate::domain::errors::SyncError;

use super::cli::Args;

/// Dataverse / token endpoint の HTTP タイムアウト
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// BigQuery → Dataverse Sync Workflow
pub struct SyncWorkflow {
    config: Config,
}

impl SyncWorkflow {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Execute one sync run
    ///
    /// 一部のオペレーションが失敗した場合、サマリーを表示したうえで
    /// `SyncError::PartialBatch` を返す
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn execute(&self, args: &Args) -> Result<SyncSummary> {
        info!("Starting BigQuery → Dataverse sync...");
        info!("Dry run: {}", args.dry_run);

        println!("✓ Using configuration:");
        println!("  Source: {}.{}", self.config.project_id, self.config.table);
        println!(
            "  Target: {}/{}",
            self.config.api_base_url(),
            self.config.mapping.entity_set
        );
        println!("  Watermark file: {}", self.config.watermark_file);
        println!(
            "  Page size: {} | Batch size: {}",
            self.config.page_size, self.config.batch_size
        );

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        let token_provider = Arc::new(ClientCredentialsTokenProvider::new(
            http.clone(),
            &self.config.authority_host,
            &self.config.tenant_id,
            self.config.client_id.clone(),
            self.config.client_secret.clone(),
            &self.config.dataverse_url,
        ));

        // 認証失敗は BigQuery を読む前に検出する
        if !args.dry_run {
            token_provider.token().await?;
            println!("✓ Authenticated to Dataverse");
        }

        let source_repo = Arc::new(BigQuerySourceRepository::new(
            Arc::new(RealClientFactory::new(self.config.credentials_path.clone())),
            self.config.project_id.clone(),
            self.config.table.clone(),
            self.config.mapping.clone(),
        ));
        let sink_repo = Arc::new(DataverseSinkRepository::new(Arc::new(
            DataverseClient::new(http, self.config.api_base_url(), token_provider),
        )));
        let watermark_repo = Arc::new(JsonWatermarkRepository::new(
            &self.config.watermark_file,
            self.config.default_watermark,
        ));

        let use_case = SyncRowsUseCase::new(source_repo, sink_repo, watermark_repo);
        let summary = use_case.execute(&self.config.sync_config(args.dry_run)).await?;

        print_summary(&summary, args.dry_run);
        check_summary(&summary)?;

        Ok(summary)
    }
}

fn print_summary(summary: &SyncSummary, dry_run: bool) {
    if dry_run {
        println!("✓ Dry-run mode (nothing was sent)");
    }
    println!(
        "✓ Fetched {} rows, sent {} batches",
        summary.rows_fetched, summary.batches_sent
    );
    println!(
        "✓ Upserted {} records ({} failed)",
        summary.succeeded_count, summary.failed_count
    );
    println!(
        "✓ Watermark: {} → {}",
        summary.initial_watermark, summary.final_watermark
    );
}

/// Turn rejected operations into a run failure
pub fn check_summary(summary: &SyncSummary) -> Result<()> {
    if summary.has_failures() {
        return Err(SyncError::PartialBatch {
            failed: summary.failed_count,
            total: summary.succeeded_count + summary.failed_count,
        }
        .into());
    }
    Ok(())
}
