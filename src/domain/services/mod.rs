//! # Domain Services
//!
//! 特定のエンティティに属さないビジネスルール
//!
//! - **ColumnMapping**: ソース行 → アップサート操作の変換
//! - **WatermarkPolicy**: ウォーターマークを進めてよい位置の判定

pub mod column_mapping;
pub mod watermark_policy;
