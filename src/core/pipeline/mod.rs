pub mod executor;
pub mod fallback;
pub mod orchestrator;

use std::future::Future;
use std::time::Duration;

pub use executor::QueryExecutor;
pub use orchestrator::DashboardOrchestrator;

use crate::error::AppError;

/// Bounds one potentially slow connector call. A timeout is reported as an
/// execution failure so it flows into the normal fallback policy.
pub(crate) async fn with_timeout<T, F>(
    duration: Duration,
    label: &str,
    future: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Execution(format!(
            "{} timed out after {}s",
            label,
            duration.as_secs()
        ))),
    }
}
