//! # bq2dv
//!
//! BigQuery のテーブルを Dataverse のテーブルへ増分アップサートするバッチジョブ
//!
//! 更新日時カラムのウォーターマークより新しい行をページ単位で取得し、
//! 代替キー指定の `PATCH` を `$batch` にまとめて送信する。
//! ウォーターマークはバッチが完全に成功するたびにファイルへ保存される。
//!
//! このプロジェクトはクリーンアーキテクチャを採用しており、以下の4層で構成されています：
//!
//! - **Domain層**: ウォーターマーク、行、アップサート操作とその規則（外部依存なし）
//! - **Application層**: 同期ユースケース
//! - **Adapter層**: 外部システムとの統合（BigQuery, Dataverse, Entra ID, ファイルシステム）
//! - **Driver層**: CLI、依存性注入

// coverage_nightly cfg が設定されている場合のみ coverage_attribute を有効化
// カバレッジ計測時に外部サービス依存コードを除外するために使用
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// Domain層（純粋なビジネスロジック）
pub mod domain;

// Application層（ユースケース）
pub mod application;

// Adapter層（Infrastructure）
pub mod adapter;

// Driver層（Presentation）
pub mod driver;
