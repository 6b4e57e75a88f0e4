//! Liveness probe.
//!
//! - GET /healthz -> "ok" plus the roles this process serves

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// Roles mounted on the router, reported by the probe.
#[derive(Clone, Debug, Default)]
pub struct HealthState {
    pub roles: Vec<&'static str>,
}

/// `GET /healthz`
///
/// Always returns 200 OK. Performs no storage I/O, so it stays cheap enough
/// for the platform's frequent probing.
pub async fn healthz(State(state): State<HealthState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
            roles: state.roles,
        }),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    roles: Vec<&'static str>,
}
