pub mod dashboards;
pub mod datasources;
pub mod health;
pub mod queries;

use salvo::prelude::*;

/// Main API router that combines all modules
pub fn api_routes() -> Router {
    Router::new()
        .push(Router::with_path("/health").get(health::health))
        .push(datasource_routes())
        .push(query_routes())
        .push(dashboard_routes())
}

fn datasource_routes() -> Router {
    Router::new()
        .push(
            Router::with_path("/datasources")
                .get(datasources::list_datasources)
                .post(datasources::create_datasource),
        )
        .push(
            Router::with_path("/datasources/{id}")
                .get(datasources::get_datasource)
                .delete(datasources::delete_datasource),
        )
        .push(Router::with_path("/datasources/{id}/test").post(datasources::test_datasource))
}

fn query_routes() -> Router {
    Router::new()
        .push(Router::with_path("/query").post(queries::process_query))
        .push(Router::with_path("/query/history").get(queries::query_history))
}

fn dashboard_routes() -> Router {
    Router::new()
        .push(
            Router::with_path("/dashboards")
                .get(dashboards::list_dashboards)
                .post(dashboards::create_dashboard),
        )
        .push(
            Router::with_path("/dashboards/{id}")
                .get(dashboards::get_dashboard)
                .delete(dashboards::delete_dashboard),
        )
        .push(Router::with_path("/dashboards/{id}/generate").post(dashboards::generate_dashboard))
}
