use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the storage backend and summarize the result for `/healthcheck`.
///
/// Unlike the degraded flag, which only tracks whether a store is installed,
/// this path actively pings the backend so a wedged connection surfaces
/// before the supervisor's next poll notices it.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(store) = state.challenge_store().await else {
        warn!("storage unavailable (degraded mode)");
        return HealthResponse::degraded("uninstalled");
    };

    match store.health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded("unreachable")
        }
    }
}
