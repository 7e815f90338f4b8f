//! Integration tests for bq2dv
//!
//! These tests verify end-to-end functionality against fixtures.
//! Some tests require GCP and Dataverse credentials to run.

use bq2dv::adapter::config::Config;
use bq2dv::adapter::dataverse::payload::{encode_batch, parse_batch_response};
use bq2dv::domain::services::column_mapping::ColumnMapping;
use bq2dv::domain::entities::source_row::SourceRow;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Get the path to test fixtures
fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Read a dotenv file into a map without touching the process environment
fn read_env_fixture(name: &str) -> HashMap<String, String> {
    dotenv::from_path_iter(fixtures_path().join(name))
        .expect("Failed to open env fixture")
        .map(|item| item.expect("Invalid line in env fixture"))
        .collect()
}

#[test]
fn test_sample_env_loads_into_config() {
    let env = read_env_fixture("sample.env");
    let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();

    assert_eq!(config.project_id, "my-gcp-project");
    assert_eq!(config.table, "crm_ds.customers");
    assert_eq!(
        config.api_base_url(),
        "https://contoso.crm.dynamics.com/api/data/v9.2"
    );
    assert_eq!(config.watermark_file, "./state/watermark.json");
    assert_eq!(config.log_filter(), log::LevelFilter::Debug);
    assert_eq!(config.mapping.entity_set, "new_customers");
    assert!(config.max_rows_per_run.is_none());
}

#[test]
fn test_sample_env_without_secret_is_rejected() {
    let mut env = read_env_fixture("sample.env");
    env.remove("CLIENT_SECRET");

    let err = Config::from_lookup(|key| env.get(key).cloned()).unwrap_err();
    assert!(err.to_string().contains("CLIENT_SECRET"));
}

#[test]
fn test_dataverse_batch_response_fixture() {
    let body = fs::read_to_string(fixtures_path().join("batch_response.txt"))
        .expect("Failed to read batch_response.txt");
    let content_type =
        "multipart/mixed; boundary=batchresponse_6a1f3c2e-8d4b-4c1a-9f2e-1b7d5e0c9a41";

    let outcomes = parse_batch_response(content_type, &body).unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_success());
    assert_eq!(outcomes[1].status, 400);
    assert!(outcomes[1]
        .error
        .as_deref()
        .unwrap()
        .contains("emailaddress1 contains invalid characters"));
    assert!(outcomes[2].is_success());
}

#[test]
fn test_rows_to_batch_request() {
    let env = read_env_fixture("sample.env");
    let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();
    let mapping: &ColumnMapping = &config.mapping;

    let rows = vec![
        SourceRow::default()
            .with("externalid", Some("C-1"))
            .with("name", Some("Contoso"))
            .with("email", Some("info@contoso.com"))
            .with("phone", None)
            .with("updated_at", Some("2024-12-25T10:00:00.000000Z")),
        SourceRow::default()
            .with("externalid", Some("O'Neil"))
            .with("name", Some("O'Neil & Sons"))
            .with("email", None)
            .with("phone", Some("+1 555 0100"))
            .with("updated_at", Some("2024-12-25T10:00:01.000000Z")),
    ];

    let (batch, rejected) = mapping.to_batch(&rows);
    assert!(rejected.is_empty());

    let request = encode_batch(&batch, &config.api_base_url()).unwrap();

    assert_eq!(request.body.matches("Content-Type: application/http").count(), 2);
    assert!(request.body.contains(
        "PATCH https://contoso.crm.dynamics.com/api/data/v9.2/new_customers(externalid='C-1') HTTP/1.1"
    ));
    assert!(request
        .body
        .contains("new_customers(externalid='O''Neil') HTTP/1.1"));
    assert!(request.body.contains(r#""telephone1":"+1 555 0100""#));
    assert!(request.body.contains(r#""emailaddress1":null"#));
    assert!(request.body.ends_with(&format!("--{}--\r\n", request.boundary)));
}

/// Integration test that requires real credentials
/// Run with: cargo test --test integration_test -- --ignored
#[tokio::test]
#[ignore]
async fn test_dry_run_e2e() {
    // This test requires:
    // - GOOGLE_APPLICATION_CREDENTIALS env var set
    // - GOOGLE_PROJECT, DATAVERSE_URL, TENANT_ID, CLIENT_ID, CLIENT_SECRET env vars set
    use bq2dv::driver::{Args, SyncWorkflow};

    let config = Config::from_env().expect("bq2dv environment variables required for E2E test");

    println!("E2E test configuration:");
    println!("  Source: {}.{}", config.project_id, config.table);
    println!("  Target: {}", config.api_base_url());

    let args = Args {
        dry_run: true,
        env_file: None,
    };
    let summary = SyncWorkflow::new(config).execute(&args).await.unwrap();

    assert!(summary.final_watermark >= summary.initial_watermark);
    assert!(!summary.has_failures());
}
