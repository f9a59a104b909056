use chrono::Utc;
use salvo::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::core::pipeline::with_timeout;
use crate::error::AppError;
use crate::models::{DataSource, SchemaInfo};
use crate::utils::middleware::get_app_state;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct CreateDataSourceRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source_type: String,
    pub connection_config: Value,
}

#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_info: Option<SchemaInfo>,
}

fn parse_id(req: &Request) -> Result<Uuid, AppError> {
    req.param::<Uuid>("id")
        .ok_or_else(|| AppError::Precondition("invalid data source id".into()))
}

#[handler]
pub async fn create_datasource(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let body: CreateDataSourceRequest = req
        .parse_json()
        .await
        .map_err(|e| AppError::Precondition(format!("invalid request body: {}", e)))?;

    // Reject unknown source types up front instead of at first use.
    state
        .connectors
        .create(&body.source_type, &body.connection_config)?;

    let data_source = DataSource {
        id: Uuid::new_v4(),
        name: body.name,
        description: body.description,
        source_type: body.source_type,
        connection_config: body.connection_config,
        schema_info: None,
        is_active: true,
        created_at: Utc::now(),
    };
    state
        .data_sources
        .write()
        .await
        .insert(data_source.id, data_source.clone());

    res.status_code(StatusCode::CREATED);
    res.render(Json(data_source));
    Ok(())
}

#[handler]
pub async fn list_datasources(depot: &mut Depot, res: &mut Response) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let sources = state.data_sources.read().await;
    let mut items: Vec<&DataSource> = sources.values().collect();
    items.sort_by_key(|ds| ds.created_at);
    let total = items.len();
    res.render(Json(json!({
        "items": items,
        "total": total,
    })));
    Ok(())
}

#[handler]
pub async fn get_datasource(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let id = parse_id(req)?;
    let sources = state.data_sources.read().await;
    let data_source = sources
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("data source {}", id)))?;
    res.render(Json(data_source));
    Ok(())
}

#[handler]
pub async fn delete_datasource(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let id = parse_id(req)?;
    let removed = state.data_sources.write().await.remove(&id);
    if removed.is_none() {
        return Err(AppError::NotFound(format!("data source {}", id)));
    }
    res.status_code(StatusCode::NO_CONTENT);
    Ok(())
}

/// Opens the connector, fetches the schema and caches it on the record.
#[handler]
pub async fn test_datasource(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let id = parse_id(req)?;
    let data_source = state
        .data_sources
        .read()
        .await
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("data source {}", id)))?;

    let timeout = Duration::from_secs(state.config.connector_timeout_secs);
    let mut connector = state
        .connectors
        .create(&data_source.source_type, &data_source.connection_config)?;

    let outcome = async {
        with_timeout(timeout, "connector open", connector.connect()).await?;
        with_timeout(timeout, "schema fetch", connector.get_schema()).await
    }
    .await;
    connector.disconnect().await;

    match outcome {
        Ok(schema) => {
            if let Some(stored) = state.data_sources.write().await.get_mut(&id) {
                stored.schema_info = Some(schema.clone());
            }
            res.render(Json(TestConnectionResponse {
                success: true,
                message: "connection successful".into(),
                schema_info: Some(schema),
            }));
        }
        Err(e) => {
            res.render(Json(TestConnectionResponse {
                success: false,
                message: e.to_string(),
                schema_info: None,
            }));
        }
    }
    Ok(())
}
