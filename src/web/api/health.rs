use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::tle::ElementSetProvider;
use crate::web::auth::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Satellites in the current TLE snapshot
    pub satellites: usize,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health<P: ElementSetProvider + 'static>(
    State(state): State<AppState<P>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        satellites: state.store.len(),
    })
}
