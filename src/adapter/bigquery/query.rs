//! BigQuery SQL Builder
//!
//! ウォーターマーク条件付きの SELECT 文とクエリパラメータを組み立てる

use google_cloud_bigquery::http::types::{QueryParameter, QueryParameterType, QueryParameterValue};

use crate::domain::repositories::source_repository::SourceFilter;
use crate::domain::services::column_mapping::ColumnMapping;

/// Format used for the timestamp column so it arrives as RFC 3339 text
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%E6SZ";

/// TIMESTAMP パラメータ値の形式
const PARAMETER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f+00:00";

/// A built query, its named parameters and the column order of its result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub sql: String,
    pub parameters: Vec<QueryParameter>,
    pub columns: Vec<String>,
}

/// Build the page query.
///
/// Identifiers are validated at config load time. The watermark and the
/// keyset key are bound as `@since` / `@after_key` and never spliced into SQL.
/// NULL keys compare as the empty string on both sides of the cursor.
pub fn build_select(
    project_id: &str,
    table: &str,
    mapping: &ColumnMapping,
    filter: &SourceFilter,
    limit: usize,
) -> SelectQuery {
    let columns = mapping.source_columns();
    let ts = &mapping.timestamp_column;
    let sort_key = format!("COALESCE(CAST(src.{} AS STRING), '')", mapping.key_column);

    let select_list = columns
        .iter()
        .map(|column| {
            if column == ts {
                format!(
                    "FORMAT_TIMESTAMP('{}', src.{}, 'UTC') AS {}",
                    TIMESTAMP_FORMAT, column, column
                )
            } else {
                format!("CAST(src.{} AS STRING) AS {}", column, column)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut parameters = vec![scalar_parameter(
        "since",
        "TIMESTAMP",
        filter.since.format(PARAMETER_TIMESTAMP_FORMAT).to_string(),
    )];

    let condition = match &filter.after_key {
        Some(after_key) => {
            parameters.push(scalar_parameter("after_key", "STRING", after_key.clone()));
            format!(
                "(src.{ts} > @since OR (src.{ts} = @since AND {sort_key} > @after_key))",
                ts = ts,
                sort_key = sort_key
            )
        }
        None => format!(
            "src.{} {} @since",
            ts,
            if filter.inclusive { ">=" } else { ">" }
        ),
    };

    let sql = format!(
        "SELECT {select_list} FROM `{project}.{table}` AS src WHERE {condition} \
         ORDER BY src.{ts}, {sort_key} LIMIT {limit}",
        select_list = select_list,
        project = project_id,
        table = table,
        condition = condition,
        ts = ts,
        sort_key = sort_key,
        limit = limit
    );

    SelectQuery {
        sql,
        parameters,
        columns,
    }
}

fn scalar_parameter(name: &str, parameter_type: &str, value: String) -> QueryParameter {
    QueryParameter {
        name: Some(name.to_string()),
        parameter_type: QueryParameterType {
            parameter_type: parameter_type.to_string(),
            ..Default::default()
        },
        parameter_value: QueryParameterValue {
            value: Some(value),
            ..Default::default()
        },
    }
}
