//! # Domain Entities
//!
//! ビジネスエンティティとバリューオブジェクトを定義するモジュール
//!
//! ## エンティティ
//!
//! - **SourceRow**: BigQuery から取得した1行
//! - **UpsertBatch**: Dataverse へ送るアップサート操作のバッチ
//! - **Watermark**: 同期済みデータの上限タイムスタンプ

pub mod source_row;
pub mod upsert_batch;
pub mod watermark;
