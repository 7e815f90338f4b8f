//! Repository Implementations
//!
//! Domain層のRepositoryトレイトの実装

pub mod bigquery_source_repository;
pub mod dataverse_sink_repository;
pub mod json_watermark_repository;

pub use bigquery_source_repository::BigQuerySourceRepository;
pub use dataverse_sink_repository::DataverseSinkRepository;
pub use json_watermark_repository::JsonWatermarkRepository;
