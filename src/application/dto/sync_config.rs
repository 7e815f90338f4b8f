//! # Sync Configuration DTO
//!
//! 同期ユースケースの設定のData Transfer Object

use crate::domain::services::column_mapping::ColumnMapping;

/// 同期設定
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 1回のクエリで取得する最大行数
    pub page_size: usize,
    /// 1回の `$batch` に含める最大オペレーション数
    pub batch_size: usize,
    /// 1回の実行で処理する最大行数（`None` は無制限）
    pub max_rows_per_run: Option<usize>,
    /// ソースカラムと Dataverse 属性の対応
    pub mapping: ColumnMapping,
    /// Dataverse へ送信せず、ウォーターマークも保存しない
    pub dry_run: bool,
}

impl SyncConfig {
    /// 新しい同期設定を作成します。
    ///
    /// # 例
    ///
    /// ```
    /// use bq2dv::application::dto::sync_config::SyncConfig;
    /// use bq2dv::domain::services::column_mapping::ColumnMapping;
    ///
    /// let mapping = ColumnMapping {
    ///     entity_set: "new_customers".to_string(),
    ///     alternate_key: "externalid".to_string(),
    ///     key_column: "externalid".to_string(),
    ///     timestamp_column: "updated_at".to_string(),
    ///     fields: ColumnMapping::parse_fields("name:name,email:emailaddress1").unwrap(),
    /// };
    ///
    /// let config = SyncConfig::new(5000, 50, mapping).with_max_rows(Some(20000));
    ///
    /// assert_eq!(config.page_size, 5000);
    /// assert_eq!(config.batch_size, 50);
    /// assert_eq!(config.max_rows_per_run, Some(20000));
    /// assert!(!config.dry_run);
    /// ```
    pub fn new(page_size: usize, batch_size: usize, mapping: ColumnMapping) -> Self {
        Self {
            page_size,
            batch_size,
            max_rows_per_run: None,
            mapping,
            dry_run: false,
        }
    }

    pub fn with_max_rows(mut self, max_rows_per_run: Option<usize>) -> Self {
        self.max_rows_per_run = max_rows_per_run;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
