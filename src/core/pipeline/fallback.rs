//! The one-shot fallback query policy shared by both pipelines.

use std::time::Duration;
use tracing::warn;

use super::with_timeout;
use crate::error::AppError;
use crate::models::{GeneratedQuery, QueryType, SchemaInfo};
use crate::utils::datasource::{is_relational, DataSourceConnector, TabularResult};

pub const FALLBACK_ROW_LIMIT: usize = 100;

const FALLBACK_EXPLANATION: &str = "Fallback query (generated query failed to execute)";

/// Chooses the deterministic fallback query for a source, from its kind and
/// cached schema alone. Relational sources get a bounded scan of the first
/// schema table (or a constant `SELECT 1` when the schema lists none); flat
/// sources get the first rows in the frame language.
pub fn fallback_query(source_type: &str, schema: &SchemaInfo) -> GeneratedQuery {
    if is_relational(source_type) {
        let query = match schema.first_table() {
            Some(table) => format!(
                "SELECT * FROM \"{}\" LIMIT {}",
                table.name, FALLBACK_ROW_LIMIT
            ),
            None => "SELECT 1".to_string(),
        };
        GeneratedQuery {
            query,
            query_type: QueryType::Sql,
            explanation: FALLBACK_EXPLANATION.to_string(),
        }
    } else {
        GeneratedQuery {
            query: format!("head {}", FALLBACK_ROW_LIMIT),
            query_type: QueryType::Frame,
            explanation: FALLBACK_EXPLANATION.to_string(),
        }
    }
}

/// Runs the generated query, substituting the fallback exactly once if it
/// fails. A second failure propagates as the terminal error; there is no
/// further fallback level. Returns the result, the query that actually
/// produced it, and whether the fallback was used.
pub async fn execute_with_fallback(
    connector: &dyn DataSourceConnector,
    generated: GeneratedQuery,
    source_type: &str,
    schema: &SchemaInfo,
    timeout: Duration,
) -> Result<(TabularResult, GeneratedQuery, bool), AppError> {
    match with_timeout(timeout, "query execution", connector.execute_query(&generated.query)).await
    {
        Ok(result) => Ok((result, generated, false)),
        Err(primary_error) => {
            warn!(
                error = %primary_error,
                query = %generated.query,
                "generated query failed, trying fallback"
            );
            let fallback = fallback_query(source_type, schema);
            let result = with_timeout(
                timeout,
                "fallback query execution",
                connector.execute_query(&fallback.query),
            )
            .await?;
            Ok((result, fallback, true))
        }
    }
}
