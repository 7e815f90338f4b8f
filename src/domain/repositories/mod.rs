//! # Domain Repositories
//!
//! Repository trait（インターフェース）定義
//!
//! ## 特徴
//!
//! - Domain層では実装を持たない（traitの定義のみ）
//! - Adapter層で具体的な実装を提供
//! - テストではネットワーク無しのフェイクに差し替える

pub mod sink_repository;
pub mod source_repository;
pub mod watermark_repository;
