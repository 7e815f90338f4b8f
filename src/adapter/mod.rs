//! Adapter Layer
//!
//! 外部システム（BigQuery, Dataverse, Entra ID, ファイルシステム）との統合

pub mod auth;
pub mod bigquery;
pub mod config;
pub mod dataverse;
pub mod repositories;
