//! # Sync Rows Use Case
//!
//! ソース行を Dataverse にアップサートし、ウォーターマークを進めるユースケース

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::application::dto::sync_config::SyncConfig;
use crate::domain::entities::watermark::Watermark;
use crate::domain::repositories::sink_repository::{BatchResult, OperationOutcome, SinkRepository};
use crate::domain::repositories::source_repository::{SourceFilter, SourceRepository};
use crate::domain::repositories::watermark_repository::WatermarkRepository;
use crate::domain::services::watermark_policy::WatermarkPolicy;

/// 同期結果のサマリー
#[derive(Debug, Clone)]
pub struct SyncSummary {
    /// ソースから取得した行数
    pub rows_fetched: usize,
    /// 送信したバッチ数
    pub batches_sent: usize,
    /// 成功したオペレーション数
    pub succeeded_count: usize,
    /// 失敗したオペレーション数（変換できなかった行を含む）
    pub failed_count: usize,
    /// 実行開始時のウォーターマーク
    pub initial_watermark: Watermark,
    /// 実行終了時のウォーターマーク
    pub final_watermark: Watermark,
}

impl SyncSummary {
    fn new(watermark: Watermark) -> Self {
        Self {
            rows_fetched: 0,
            batches_sent: 0,
            succeeded_count: 0,
            failed_count: 0,
            initial_watermark: watermark,
            final_watermark: watermark,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count > 0
    }
}

/// 同期ユースケース
///
/// ページ単位で行を取得し、バッチに分けて送信する。
/// ウォーターマークはバッチが完全に成功するたびに進めて保存する。
/// 一部失敗したバッチがあれば以降の送信は続けるが、ウォーターマークはその実行中もう進めない。
/// 送信自体が失敗した場合は直ちに中断する（それまでのウォーターマークは保存済み）。
pub struct SyncRowsUseCase<S: SourceRepository, K: SinkRepository, W: WatermarkRepository> {
    source_repository: Arc<S>,
    sink_repository: Arc<K>,
    watermark_repository: Arc<W>,
}

impl<S: SourceRepository, K: SinkRepository, W: WatermarkRepository> SyncRowsUseCase<S, K, W> {
    /// 新しいユースケースを作成
    ///
    /// # Arguments
    ///
    /// * `source_repository` - ソースリポジトリ
    /// * `sink_repository` - シンクリポジトリ
    /// * `watermark_repository` - ウォーターマークリポジトリ
    pub fn new(
        source_repository: Arc<S>,
        sink_repository: Arc<K>,
        watermark_repository: Arc<W>,
    ) -> Self {
        Self {
            source_repository,
            sink_repository,
            watermark_repository,
        }
    }

    /// 同期を1回実行
    ///
    /// # Returns
    ///
    /// 同期結果のサマリー。一部失敗したオペレーションがあっても `Ok` で返る
    ///
    /// # Errors
    ///
    /// 取得・送信・ウォーターマーク保存のいずれかが失敗した場合にエラーを返す
    pub async fn execute(&self, config: &SyncConfig) -> Result<SyncSummary> {
        let state = self.watermark_repository.load().await?;
        let mut watermark = state.watermark;
        info!(
            "Loaded watermark: {}{}",
            watermark,
            if state.is_default { " (default)" } else { "" }
        );

        let mut summary = SyncSummary::new(watermark);
        let mut filter = SourceFilter::from_state(&state);
        let batch_size = config.batch_size.max(1);
        let mut frozen = false;
        let mut held_back: Option<DateTime<Utc>> = None;

        loop {
            let limit = match config.max_rows_per_run {
                Some(max) => {
                    let remaining = max.saturating_sub(summary.rows_fetched);
                    if remaining == 0 {
                        info!("Reached MAX_ROWS_PER_RUN={}, stopping.", max);
                        if let Some(held) = held_back.take() {
                            if !frozen && self.next_row_is_newer(&filter, held, config).await? {
                                self.advance(&mut watermark, held, config.dry_run).await?;
                            }
                        }
                        break;
                    }
                    remaining.min(config.page_size)
                }
                None => config.page_size,
            };

            let rows = self
                .source_repository
                .fetch_page(&filter, limit)
                .await
                .context("Failed to fetch rows from source")?;

            if rows.is_empty() {
                info!("No more rows after {}.", filter.since.to_rfc3339());
                if let Some(held) = held_back.take() {
                    if !frozen {
                        self.advance(&mut watermark, held, config.dry_run).await?;
                    }
                }
                break;
            }

            summary.rows_fetched += rows.len();
            let page_full = rows.len() >= limit;
            info!(
                "Fetched {} rows from source (after {}).",
                rows.len(),
                filter.since.to_rfc3339()
            );

            let timestamps = rows
                .iter()
                .map(|row| row.timestamp(&config.mapping.timestamp_column))
                .collect::<Result<Vec<_>>>()
                .context("Source rows must carry a valid modification timestamp")?;

            // Rows tied with the previous page's tail are only safe once nothing at that time remains.
            if let Some(held) = held_back.take() {
                if !frozen && timestamps.first().is_some_and(|first| *first > held) {
                    self.advance(&mut watermark, held, config.dry_run).await?;
                }
            }

            for (chunk_index, chunk) in rows.chunks(batch_size).enumerate() {
                let start = chunk_index * batch_size;
                let end = start + chunk.len();

                let (batch, rejected) = config.mapping.to_batch(chunk);
                for row in &rejected {
                    warn!("Row {} skipped: {}", start + row.index + 1, row.reason);
                }

                let result = if batch.is_empty() {
                    BatchResult::default()
                } else if config.dry_run {
                    info!(
                        "DRY RUN - would post batch {}-{} ({} records)",
                        start + 1,
                        end,
                        batch.len()
                    );
                    for op in batch.operations() {
                        info!("  - PATCH {}", op.relative_url());
                    }
                    BatchResult::new(vec![OperationOutcome::ok(204); batch.len()])
                } else {
                    info!(
                        "Posting batch chunk {}-{} ({} records)...",
                        start + 1,
                        end,
                        batch.len()
                    );
                    self.sink_repository
                        .send_batch(&batch)
                        .await
                        .with_context(|| format!("Failed to send rows {}-{}", start + 1, end))?
                };

                if !batch.is_empty() {
                    summary.batches_sent += 1;
                }
                summary.succeeded_count += result.succeeded_count();
                summary.failed_count += result.failed_count() + rejected.len();

                for (op, outcome) in batch.operations().iter().zip(&result.outcomes) {
                    if !outcome.is_success() {
                        warn!(
                            "Upsert {} failed with {}: {}",
                            op.relative_url(),
                            outcome.status,
                            outcome.error.as_deref().unwrap_or("no error message")
                        );
                    }
                }

                let confirmed = rejected.is_empty()
                    && result.is_success()
                    && result.outcomes.len() == batch.len();
                if !confirmed {
                    if !frozen {
                        warn!(
                            "Batch {}-{} was not fully accepted; watermark stays at {} for the rest of this run",
                            start + 1,
                            end,
                            watermark
                        );
                        frozen = true;
                    }
                    continue;
                }

                if frozen {
                    continue;
                }

                if let Some(candidate) = WatermarkPolicy::safe_advance(&timestamps, end, page_full)
                {
                    self.advance(&mut watermark, candidate, config.dry_run)
                        .await?;
                }
            }

            if !page_full {
                debug!("Final page processed.");
                break;
            }

            if !frozen {
                held_back = WatermarkPolicy::page_high(&timestamps);
            }

            let last_ts = timestamps[timestamps.len() - 1];
            let last_key = rows
                .last()
                .map(|row| config.mapping.cursor_key(row))
                .unwrap_or_default();
            filter = SourceFilter::after(last_ts, last_key);
        }

        summary.final_watermark = watermark;
        info!(
            "Sync complete. Rows: {}, upserts: {} ok / {} failed, batches: {}. Final watermark: {}",
            summary.rows_fetched,
            summary.succeeded_count,
            summary.failed_count,
            summary.batches_sent,
            summary.final_watermark
        );

        Ok(summary)
    }

    /// 上限で止めるとき、保留中の更新日時を確定してよいかを1行先読みして判定する
    async fn next_row_is_newer(
        &self,
        filter: &SourceFilter,
        held: DateTime<Utc>,
        config: &SyncConfig,
    ) -> Result<bool> {
        let next = self
            .source_repository
            .fetch_page(filter, 1)
            .await
            .context("Failed to fetch rows from source")?;

        match next.first() {
            None => Ok(true),
            Some(row) => {
                let ts = row
                    .timestamp(&config.mapping.timestamp_column)
                    .context("Source rows must carry a valid modification timestamp")?;
                Ok(ts > held)
            }
        }
    }

    async fn advance(
        &self,
        watermark: &mut Watermark,
        candidate: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<()> {
        if !watermark.advance(candidate) {
            return Ok(());
        }

        if dry_run {
            info!("DRY RUN - watermark would advance to {}", watermark);
            return Ok(());
        }

        self.watermark_repository
            .save(watermark)
            .await
            .context("Failed to persist watermark")?;
        info!("Watermark advanced to {}", watermark);
        Ok(())
    }
}
