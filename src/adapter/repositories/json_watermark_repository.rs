//! JSON Watermark Repository Implementation
//!
//! WatermarkRepositoryのJSON実装（`{"watermark": "<RFC3339>"}` 形式のファイル）

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::entities::watermark::Watermark;
use crate::domain::errors::SyncError;
use crate::domain::repositories::watermark_repository::{WatermarkRepository, WatermarkState};

/// JSONファイルベースのウォーターマークリポジトリ
pub struct JsonWatermarkRepository {
    path: PathBuf,
    default_watermark: Watermark,
}

/// ウォーターマーク（JSON永続化用の内部表現）
#[derive(Debug, Deserialize, Serialize)]
struct WatermarkJson {
    #[serde(alias = "last")]
    watermark: String,
}

impl JsonWatermarkRepository {
    /// 新しいリポジトリを作成
    ///
    /// `path` の `~` と環境変数は展開される
    pub fn new(path: &str, default_watermark: Watermark) -> Self {
        let expanded = shellexpand::full(path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| path.to_string());

        Self {
            path: PathBuf::from(expanded),
            default_watermark,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ファイルからウォーターマークを読み込む（同期処理）
    fn load_sync(path: &Path, default_watermark: Watermark) -> WatermarkState {
        if !path.exists() {
            info!(
                "No watermark file at {}, starting from {}",
                path.display(),
                default_watermark
            );
            return WatermarkState::default_value(default_watermark);
        }

        match Self::read_file(path) {
            Ok(watermark) => {
                info!("Loaded watermark {} from {}", watermark, path.display());
                WatermarkState::persisted(watermark)
            }
            Err(e) => {
                warn!(
                    "Ignoring unreadable watermark file {}: {:#}. Starting from {}",
                    path.display(),
                    e,
                    default_watermark
                );
                WatermarkState::default_value(default_watermark)
            }
        }
    }

    fn read_file(path: &Path) -> Result<Watermark> {
        let content = fs::read_to_string(path).context("Failed to read watermark file")?;
        let json: WatermarkJson =
            serde_json::from_str(&content).context("Failed to parse watermark JSON")?;
        Watermark::parse(&json.watermark)
    }

    /// ファイルにウォーターマークを保存する（同期処理）
    ///
    /// 一時ファイルに書いてから rename するため、途中で落ちても前の値が残る
    fn save_sync(path: &Path, watermark: &Watermark) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                SyncError::Watermark(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let json = serde_json::to_string(&WatermarkJson {
            watermark: watermark.to_rfc3339(),
        })
        .context("Failed to serialize watermark")?;

        let tmp_path = tmp_path_for(path);
        fs::write(&tmp_path, json).map_err(|e| {
            SyncError::Watermark(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        fs::rename(&tmp_path, path).map_err(|e| {
            SyncError::Watermark(format!(
                "Failed to replace {} with {}: {}",
                path.display(),
                tmp_path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl WatermarkRepository for JsonWatermarkRepository {
    async fn load(&self) -> Result<WatermarkState> {
        let path = self.path.clone();
        let default_watermark = self.default_watermark;
        let state = tokio::task::spawn_blocking(move || Self::load_sync(&path, default_watermark))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to spawn blocking task: {}", e))?;

        Ok(state)
    }

    async fn save(&self, watermark: &Watermark) -> Result<()> {
        let path = self.path.clone();
        let watermark = *watermark;
        tokio::task::spawn_blocking(move || Self::save_sync(&path, &watermark))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to spawn blocking task: {}", e))??;

        info!("Watermark saved: {}", watermark);
        Ok(())
    }
}
