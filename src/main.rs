use dotenv::dotenv;
use salvo::prelude::*;
use tokio::signal;

use insight_studio_backend::api;
use insight_studio_backend::utils::middleware::inject_state;
use insight_studio_backend::{AppState, Config};

/// Wait for shutdown signal (SIGTERM, SIGINT, or Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("Failed to install signal handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("insight_studio_backend=info".parse()?)
                .add_directive("salvo=info".parse()?)
                .add_directive("sqlx=warn".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let state = AppState::new(&config)?;

    let router = Router::new()
        .hoop(inject_state(state))
        .push(Router::with_path("/api").push(api::api_routes()));

    tracing::info!("Starting server on {}", config.server_address);
    let acceptor = TcpListener::new(&config.server_address).bind().await;
    let service = Service::new(router);
    let server = Server::new(acceptor);

    tokio::select! {
        _ = server.serve(service) => {
            tracing::info!("Server stopped");
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    Ok(())
}
