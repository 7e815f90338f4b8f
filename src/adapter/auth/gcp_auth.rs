//! GCP Authentication
//!
//! Google Cloud Platform認証機能

use anyhow::Result;
use google_cloud_bigquery::client::{Client, ClientConfig};
use log::info;

use crate::domain::errors::SyncError;

/// Expands tilde in path and returns the full path
pub fn expand_key_path(key_path: &str) -> String {
    shellexpand::tilde(key_path).to_string()
}

/// Creates a BigQuery client with service account authentication
///
/// `key_path` が指定されていればそのキーを使い、無ければ
/// Application Default Credentials（`GOOGLE_APPLICATION_CREDENTIALS` 等）に従う
pub async fn create_bigquery_client(key_path: Option<&str>) -> Result<Client> {
    if let Some(key_path) = key_path {
        let expanded_path = expand_key_path(key_path);
        if !std::path::Path::new(&expanded_path).exists() {
            return Err(SyncError::Auth(format!(
                "Service account key not found: {}",
                expanded_path
            ))
            .into());
        }
        std::env::set_var("GOOGLE_APPLICATION_CREDENTIALS", &expanded_path);
    }

    let (config, project_id) = ClientConfig::new_with_auth().await.map_err(|e| {
        SyncError::Auth(format!("Failed to authenticate with service account: {}", e))
    })?;
    if let Some(project_id) = project_id {
        info!("Authenticated to BigQuery (credential project: {})", project_id);
    }

    let client = Client::new(config)
        .await
        .map_err(|e| SyncError::Auth(format!("Failed to create BigQuery client: {}", e)))?;

    Ok(client)
}
