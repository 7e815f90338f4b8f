//! # Use Cases
//!
//! アプリケーションのビジネスフロー（ユースケース）
//!
//! ## ユースケース
//!
//! - **SyncRowsUseCase**: ソース行の取得、アップサート送信、ウォーターマーク更新

pub mod sync_rows;
