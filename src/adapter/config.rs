//! Environment Configuration
//!
//! 環境変数からの設定読み込み

use anyhow::Result;
use log::LevelFilter;

use crate::application::dto::sync_config::SyncConfig;
use crate::domain::entities::watermark::Watermark;
use crate::domain::errors::SyncError;
use crate::domain::services::column_mapping::{is_identifier, ColumnMapping};

pub const DEFAULT_BQ_TABLE: &str = "crm_ds.customers";
pub const DEFAULT_PAGE_SIZE: usize = 5000;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_WATERMARK_FILE: &str = "watermark.json";
pub const DEFAULT_WATERMARK: &str = "2020-01-01T00:00:00Z";
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_DV_ENTITY: &str = "new_customers";
pub const DEFAULT_DV_ALT_KEY: &str = "externalid";
pub const DEFAULT_KEY_COLUMN: &str = "externalid";
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "updated_at";
pub const DEFAULT_COLUMN_MAP: &str =
    "externalid:new_externalid,name:name,email:emailaddress1,phone:telephone1";
pub const DEFAULT_API_VERSION: &str = "v9.2";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Job configuration, immutable once loaded.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_id: String,
    /// `dataset.table`
    pub table: String,
    /// Dataverse environment URL without trailing slash
    pub dataverse_url: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub page_size: usize,
    pub batch_size: usize,
    pub max_rows_per_run: Option<usize>,
    pub watermark_file: String,
    pub default_watermark: Watermark,
    pub log_level: String,
    /// Service account key; falls back to Application Default Credentials when unset
    pub credentials_path: Option<String>,
    pub mapping: ColumnMapping,
    pub api_version: String,
    pub authority_host: String,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| SyncError::config(format!("{} is required", key)))
        };
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let project_id = required("GOOGLE_PROJECT")?;
        let dataverse_url = required("DATAVERSE_URL")?.trim_end_matches('/').to_string();
        let tenant_id = required("TENANT_ID")?;
        let client_id = required("CLIENT_ID")?;
        let client_secret = required("CLIENT_SECRET")?;

        validate_project_id(&project_id)?;
        let table = or_default("BQ_TABLE", DEFAULT_BQ_TABLE);
        validate_table(&table)?;

        if !dataverse_url.starts_with("https://") && !dataverse_url.starts_with("http://") {
            return Err(SyncError::config(format!(
                "DATAVERSE_URL must be an http(s) URL, got '{}'",
                dataverse_url
            ))
            .into());
        }

        let page_size = parse_positive(get("PAGE_SIZE"), "PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let batch_size = parse_positive(get("BATCH_SIZE"), "BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        let max_rows_per_run = match get("MAX_ROWS_PER_RUN") {
            Some(raw) => Some(parse_positive(Some(raw), "MAX_ROWS_PER_RUN", 0)?),
            None => None,
        };

        let default_watermark_raw = or_default("DEFAULT_WATERMARK", DEFAULT_WATERMARK);
        let default_watermark = Watermark::parse(&default_watermark_raw).map_err(|e| {
            SyncError::config(format!("DEFAULT_WATERMARK is invalid: {:#}", e))
        })?;

        let mapping = ColumnMapping {
            entity_set: or_default("DV_ENTITY", DEFAULT_DV_ENTITY),
            alternate_key: or_default("DV_ALT_KEY", DEFAULT_DV_ALT_KEY),
            key_column: or_default("SOURCE_KEY_COLUMN", DEFAULT_KEY_COLUMN),
            timestamp_column: or_default("TIMESTAMP_COLUMN", DEFAULT_TIMESTAMP_COLUMN),
            fields: ColumnMapping::parse_fields(&or_default("COLUMN_MAP", DEFAULT_COLUMN_MAP))
                .map_err(|e| SyncError::config(format!("COLUMN_MAP is invalid: {:#}", e)))?,
        };
        mapping
            .validate()
            .map_err(|e| SyncError::config(format!("{:#}", e)))?;

        Ok(Self {
            project_id,
            table,
            dataverse_url,
            tenant_id,
            client_id,
            client_secret,
            page_size,
            batch_size,
            max_rows_per_run,
            watermark_file: or_default("WATERMARK_FILE", DEFAULT_WATERMARK_FILE),
            default_watermark,
            log_level: or_default("LOG_LEVEL", DEFAULT_LOG_LEVEL),
            credentials_path: get("GOOGLE_APPLICATION_CREDENTIALS"),
            mapping,
            api_version: or_default("API_VERSION", DEFAULT_API_VERSION),
            authority_host: or_default("AUTHORITY_HOST", DEFAULT_AUTHORITY_HOST)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Base URL of the Dataverse Web API, e.g. `https://org.crm.dynamics.com/api/data/v9.2`
    pub fn api_base_url(&self) -> String {
        format!("{}/api/data/{}", self.dataverse_url, self.api_version)
    }

    pub fn sync_config(&self, dry_run: bool) -> SyncConfig {
        SyncConfig::new(self.page_size, self.batch_size, self.mapping.clone())
            .with_max_rows(self.max_rows_per_run)
            .with_dry_run(dry_run)
    }

    pub fn log_filter(&self) -> LevelFilter {
        level_filter(&self.log_level)
    }
}

/// Map a `LOG_LEVEL` value onto a `log` filter; unknown values fall back to `Info`.
pub fn level_filter(level: &str) -> LevelFilter {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => LevelFilter::Trace,
        "DEBUG" => LevelFilter::Debug,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" | "CRITICAL" => LevelFilter::Error,
        "OFF" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

fn parse_positive(raw: Option<String>, key: &str, default: usize) -> Result<usize> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(0) | Err(_) => Err(SyncError::config(format!(
            "{} must be a positive integer, got '{}'",
            key, raw
        ))
        .into()),
        Ok(value) => Ok(value),
    }
}

/// Project ids (optionally domain-scoped, `example.com:proj`) go into a backtick table reference
fn validate_project_id(project_id: &str) -> Result<()> {
    let valid = project_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | ':'));
    if !valid {
        return Err(SyncError::config(format!(
            "GOOGLE_PROJECT is not a valid project id: '{}'",
            project_id
        ))
        .into());
    }
    Ok(())
}

fn validate_table(table: &str) -> Result<()> {
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() != 2 || !parts.iter().all(|p| is_identifier(p)) {
        return Err(SyncError::config(format!(
            "BQ_TABLE must be 'dataset.table', got '{}'",
            table
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("GOOGLE_PROJECT", "my-project"),
            ("DATAVERSE_URL", "https://org.crm.dynamics.com/"),
            ("TENANT_ID", "tenant-123"),
            ("CLIENT_ID", "client-abc"),
            ("CLIENT_SECRET", "s3cret"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    fn config_error(env: &HashMap<&'static str, &'static str>) -> String {
        let err = load(env).unwrap_err();
        assert!(
            matches!(err.downcast_ref::<SyncError>(), Some(SyncError::Config(_))),
            "expected a configuration error, got {:?}",
            err
        );
        err.to_string()
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.project_id, "my-project");
        assert_eq!(config.table, "crm_ds.customers");
        assert_eq!(config.dataverse_url, "https://org.crm.dynamics.com");
        assert_eq!(config.page_size, 5000);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_rows_per_run, None);
        assert_eq!(config.watermark_file, "watermark.json");
        assert_eq!(config.default_watermark.to_rfc3339(), "2020-01-01T00:00:00Z");
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.credentials_path, None);
        assert_eq!(config.mapping.entity_set, "new_customers");
        assert_eq!(config.mapping.alternate_key, "externalid");
        assert_eq!(config.mapping.fields.len(), 4);
        assert_eq!(
            config.api_base_url(),
            "https://org.crm.dynamics.com/api/data/v9.2"
        );
        assert_eq!(config.authority_host, "https://login.microsoftonline.com");
    }

    #[test]
    fn test_overrides() {
        let mut env = base_env();
        env.insert("BQ_TABLE", "sales.accounts");
        env.insert("PAGE_SIZE", "1000");
        env.insert("BATCH_SIZE", "25");
        env.insert("MAX_ROWS_PER_RUN", "20000");
        env.insert("WATERMARK_FILE", "/var/lib/bq2dv/wm.json");
        env.insert("DEFAULT_WATERMARK", "2023-06-01T00:00:00Z");
        env.insert("LOG_LEVEL", "debug");
        env.insert("GOOGLE_APPLICATION_CREDENTIALS", "~/.keys/sa.json");
        env.insert("DV_ENTITY", "accounts");
        env.insert("DV_ALT_KEY", "accountnumber");
        env.insert("SOURCE_KEY_COLUMN", "account_no");
        env.insert("TIMESTAMP_COLUMN", "modified");
        env.insert("COLUMN_MAP", "account_no:accountnumber,title:name");

        let config = load(&env).unwrap();

        assert_eq!(config.table, "sales.accounts");
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.max_rows_per_run, Some(20000));
        assert_eq!(config.watermark_file, "/var/lib/bq2dv/wm.json");
        assert_eq!(config.default_watermark.to_rfc3339(), "2023-06-01T00:00:00Z");
        assert_eq!(config.log_filter(), LevelFilter::Debug);
        assert_eq!(config.credentials_path.as_deref(), Some("~/.keys/sa.json"));
        assert_eq!(config.mapping.entity_set, "accounts");
        assert_eq!(config.mapping.key_column, "account_no");
        assert_eq!(config.mapping.timestamp_column, "modified");
        assert_eq!(config.mapping.fields[1].target, "name");

        let sync = config.sync_config(true);
        assert_eq!(sync.page_size, 1000);
        assert_eq!(sync.max_rows_per_run, Some(20000));
        assert!(sync.dry_run);
    }

    #[test]
    fn test_missing_required_values() {
        for key in [
            "GOOGLE_PROJECT",
            "DATAVERSE_URL",
            "TENANT_ID",
            "CLIENT_ID",
            "CLIENT_SECRET",
        ] {
            let mut env = base_env();
            env.remove(key);
            assert!(config_error(&env).contains(key));
        }
    }

    #[test]
    fn test_blank_required_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("CLIENT_SECRET", "   ");
        assert!(config_error(&env).contains("CLIENT_SECRET"));
    }

    #[test]
    fn test_invalid_numbers() {
        let mut env = base_env();
        env.insert("PAGE_SIZE", "lots");
        assert!(config_error(&env).contains("PAGE_SIZE"));

        let mut env = base_env();
        env.insert("BATCH_SIZE", "0");
        assert!(config_error(&env).contains("BATCH_SIZE"));
    }

    #[test]
    fn test_invalid_default_watermark() {
        let mut env = base_env();
        env.insert("DEFAULT_WATERMARK", "2020-01-01");
        assert!(config_error(&env).contains("DEFAULT_WATERMARK"));
    }

    #[test]
    fn test_invalid_table() {
        for table in ["customers", "a.b.c", "crm ds.customers", "crm_ds.cust`omers"] {
            let mut env = base_env();
            env.insert("BQ_TABLE", table);
            assert!(config_error(&env).contains("BQ_TABLE"));
        }
    }

    #[test]
    fn test_project_id_validation() {
        let mut env = base_env();
        env.insert("GOOGLE_PROJECT", "example.com:my-project");
        assert!(load(&env).is_ok());

        for project in ["My Project", "proj`; DROP", "proj/x"] {
            env.insert("GOOGLE_PROJECT", project);
            assert!(config_error(&env).contains("GOOGLE_PROJECT"));
        }
    }

    #[test]
    fn test_invalid_dataverse_url() {
        let mut env = base_env();
        env.insert("DATAVERSE_URL", "org.crm.dynamics.com");
        assert!(config_error(&env).contains("DATAVERSE_URL"));
    }

    #[test]
    fn test_invalid_mapping() {
        let mut env = base_env();
        env.insert("COLUMN_MAP", "name");
        assert!(config_error(&env).contains("COLUMN_MAP"));

        let mut env = base_env();
        env.insert("DV_ENTITY", "new customers");
        config_error(&env);
    }

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter("INFO"), LevelFilter::Info);
        assert_eq!(level_filter("debug"), LevelFilter::Debug);
        assert_eq!(level_filter("WARNING"), LevelFilter::Warn);
        assert_eq!(level_filter("ERROR"), LevelFilter::Error);
        assert_eq!(level_filter("verbose"), LevelFilter::Info);
    }
}
