use salvo::prelude::*;
use serde_json::json;

use crate::error::AppError;
use crate::utils::middleware::get_app_state;

#[handler]
pub async fn health(depot: &mut Depot, res: &mut Response) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let llm_healthy = state.llm.health_check().await;
    res.render(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "llm_healthy": llm_healthy,
    })));
    Ok(())
}
