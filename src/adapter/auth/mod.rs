//! Authentication Module
//!
//! GCP / Microsoft Entra ID 認証関連の機能

pub mod entra_auth;
pub mod gcp_auth;

pub use entra_auth::{ClientCredentialsTokenProvider, TokenProvider};
pub use gcp_auth::create_bigquery_client;
