//! Defines routes for the upload front-end and the mover trigger.
//!
//! ## Structure
//! - **Web role** (authenticated via the identity header)
//!   - `GET  /`, `GET /Home/Index`: drop-zone page
//!   - `GET  /js/site.js`: page script
//!   - `POST /Home/Upload`: multipart upload, returns `[{time, message}]`
//!
//! - **Mover role**
//!   - `POST /runtime/webhooks/EventGrid`: Event Grid delivery endpoint
//!
//! - `GET /healthz` is mounted for every role.

use crate::{
    handlers::{
        event_handlers::receive_events,
        health_handlers::{HealthState, healthz},
        upload_handlers::{UploadState, index, site_js, upload},
    },
    services::mover_service::BlobToShareMover,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Routes of the upload front-end.
pub fn upload_routes() -> Router<UploadState> {
    Router::new()
        .route("/", get(index))
        .route("/Home/Index", get(index))
        .route("/js/site.js", get(site_js))
        // Files stream through in blocks, so no size cap applies.
        .route(
            "/Home/Upload",
            post(upload).layer(DefaultBodyLimit::disable()),
        )
}

/// Routes of the event-driven mover.
pub fn event_routes() -> Router<BlobToShareMover> {
    Router::new().route("/runtime/webhooks/EventGrid", post(receive_events))
}

/// Compose the application router from whichever roles are enabled.
pub fn app(upload: Option<UploadState>, mover: Option<BlobToShareMover>) -> Router {
    let mut roles = Vec::new();
    let mut router = Router::new();

    if let Some(state) = upload {
        router = router.merge(upload_routes().with_state(state));
        roles.push("web");
    }
    if let Some(mover) = mover {
        router = router.merge(event_routes().with_state(mover));
        roles.push("mover");
    }

    router
        .route("/healthz", get(healthz).with_state(HealthState { roles }))
        .layer(TraceLayer::new_for_http())
}
