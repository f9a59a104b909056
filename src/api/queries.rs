use salvo::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::core::pipeline::QueryExecutor;
use crate::error::AppError;
use crate::utils::middleware::get_app_state;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub data_source_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    20
}

/// Offset of the first item on `page`, saturating so arbitrary
/// caller-supplied page numbers cannot overflow.
fn page_offset(page: usize, page_size: usize) -> usize {
    page.saturating_sub(1).saturating_mul(page_size)
}

/// Runs the single-query pipeline end to end. Failed runs still return the
/// terminal record (status "failed") rather than an HTTP error.
#[handler]
pub async fn process_query(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let body: QueryRequest = req
        .parse_json()
        .await
        .map_err(|e| AppError::Precondition(format!("invalid request body: {}", e)))?;

    let data_source = state.resolve_data_source(body.data_source_id).await;
    let executor = QueryExecutor::new(&state.config, state.llm.clone(), state.connectors.clone());
    let record = executor.execute(&body.query, data_source.as_ref()).await;

    state.queries.write().await.push(record.clone());
    res.render(Json(record));
    Ok(())
}

#[handler]
pub async fn query_history(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let params: HistoryQuery = req.parse_queries().unwrap_or(HistoryQuery {
        page: default_page(),
        page_size: default_page_size(),
    });
    let page = params.page.max(1);
    let page_size = params.page_size.clamp(1, 100);

    let queries = state.queries.read().await;
    let total = queries.len();
    let items: Vec<_> = queries
        .iter()
        .rev()
        .skip(page_offset(page, page_size))
        .take(page_size)
        .cloned()
        .collect();

    res.render(Json(json!({
        "items": items,
        "total": total,
        "page": page,
        "page_size": page_size,
    })));
    Ok(())
}
