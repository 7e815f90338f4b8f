//! CLI Argument Parsing
//!
//! CLIの引数解析

use clap::Parser;

/// BigQuery のテーブルを Dataverse に増分アップサートするCLI
///
/// 設定は環境変数（または `.env`）から読み込む
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "bq2dv", version)]
#[command(
    about = "Incrementally upsert BigQuery rows into a Dataverse table",
    long_about = None
)]
pub struct Args {
    /// Query and map rows, but don't send them or move the watermark
    #[arg(long)]
    pub dry_run: bool,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<String>,
}
