use chrono::Utc;
use salvo::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::core::pipeline::DashboardOrchestrator;
use crate::error::AppError;
use crate::models::{Dashboard, GenerateRequest};
use crate::utils::middleware::get_app_state;

#[derive(Debug, Deserialize)]
pub struct CreateDashboardRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub data_source_ids: Vec<Uuid>,
}

#[handler]
pub async fn create_dashboard(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let body: CreateDashboardRequest = req
        .parse_json()
        .await
        .map_err(|e| AppError::Precondition(format!("invalid request body: {}", e)))?;

    if body.title.trim().is_empty() {
        return Err(AppError::Precondition("dashboard title is required".into()));
    }

    let sources = state.data_sources.read().await;
    let mut data_sources = Vec::with_capacity(body.data_source_ids.len());
    for id in &body.data_source_ids {
        let source = sources
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("data source {} not found", id)))?;
        data_sources.push(source.clone());
    }
    drop(sources);

    let dashboard = Dashboard {
        id: Uuid::new_v4(),
        title: body.title,
        description: body.description,
        data_sources,
        created_at: Utc::now(),
    };

    state
        .dashboards
        .write()
        .await
        .insert(dashboard.id, dashboard.clone());

    res.status_code(StatusCode::CREATED);
    res.render(Json(dashboard));
    Ok(())
}

#[handler]
pub async fn list_dashboards(depot: &mut Depot, res: &mut Response) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let dashboards = state.dashboards.read().await;
    let mut items: Vec<_> = dashboards.values().cloned().collect();
    items.sort_by_key(|d| d.created_at);
    let total = items.len();
    res.render(Json(json!({ "items": items, "total": total })));
    Ok(())
}

#[handler]
pub async fn get_dashboard(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let id = parse_id(req)?;
    let dashboards = state.dashboards.read().await;
    let dashboard = dashboards
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("dashboard {} not found", id)))?;
    res.render(Json(dashboard));
    Ok(())
}

#[handler]
pub async fn delete_dashboard(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let id = parse_id(req)?;
    let removed = state.dashboards.write().await.remove(&id);
    if removed.is_none() {
        return Err(AppError::NotFound(format!("dashboard {} not found", id)));
    }
    res.status_code(StatusCode::NO_CONTENT);
    Ok(())
}

/// Generates a complete dashboard from every active data source. The request
/// body is optional; when present it carries the user question and
/// visualization preferences.
#[handler]
pub async fn generate_dashboard(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let id = parse_id(req)?;

    let dashboard = {
        let dashboards = state.dashboards.read().await;
        dashboards
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("dashboard {} not found", id)))?
    };

    let request: Option<GenerateRequest> = req.parse_json().await.ok();

    let orchestrator = DashboardOrchestrator::new(
        &state.config,
        state.llm.clone(),
        state.connectors.clone(),
    );
    let response = orchestrator.generate(&dashboard, request.as_ref()).await?;
    res.render(Json(response));
    Ok(())
}

fn parse_id(req: &Request) -> Result<Uuid, AppError> {
    req.param::<Uuid>("id")
        .ok_or_else(|| AppError::Precondition("invalid dashboard id".into()))
}
