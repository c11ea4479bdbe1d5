use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::health::HealthResponse, services::health_service, state::SharedState};

pub mod websocket;

/// Compose all route trees, wiring in shared state.
pub fn router(state: SharedState) -> Router<()> {
    Router::<SharedState>::new()
        .route("/healthcheck", get(healthcheck))
        .merge(websocket::router())
        .with_state(state)
}

/// Report service health after probing the storage backend.
async fn healthcheck(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(health_service::health_status(&state).await)
}
