//! bq2dv - BigQuery → Dataverse incremental upsert
//!
//! 環境変数で設定し、1回実行して終了する

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, LevelFilter};

use bq2dv::adapter::config::Config;
use bq2dv::driver::{Args, SyncWorkflow};
use bq2dv::domain::errors::SyncError;

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    load_env_file(args.env_file.as_deref())?;
    let config = Config::from_env()?;
    init_logger(config.log_filter());

    let workflow = SyncWorkflow::new(config);

    if let Err(e) = workflow.execute(&args).await {
        error!("Sync failed: {:#}", e);
        return Err(e);
    }

    Ok(())
}

/// `--env-file` は必須ファイル扱い、既定の `.env` は無くてもよい
#[cfg_attr(coverage_nightly, coverage(off))]
fn load_env_file(path: Option<&str>) -> Result<()> {
    match path {
        Some(path) => {
            dotenv::from_path(path)
                .map_err(|e| SyncError::config(format!("Failed to load {}: {}", path, e)))
                .context("Failed to load environment file")?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }
    Ok(())
}

/// `RUST_LOG` があればそれを優先し、無ければ設定の `LOG_LEVEL` を使う
#[cfg_attr(coverage_nightly, coverage(off))]
fn init_logger(level: LevelFilter) {
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::init();
        return;
    }

    env_logger::Builder::new().filter_level(level).init();
}
