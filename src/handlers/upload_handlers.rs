//! Upload front-end: the drop-zone page and the multipart intake.
//!
//! Sign-in is handled by the authentication proxy in front of the service;
//! it forwards the signed-in principal in a header (by default
//! `X-MS-CLIENT-PRINCIPAL-NAME`). Requests without it are rejected.

use crate::{
    errors::AppError,
    models::upload::UploadAck,
    services::upload_service::UploadService,
};
use axum::{
    Json,
    extract::{FromRef, FromRequestParts, Multipart, State},
    http::{HeaderName, header, request::Parts},
    response::{Html, IntoResponse},
};
use tracing::info;

const INDEX_HTML: &str = include_str!("../../assets/index.html");
const SITE_JS: &str = include_str!("../../assets/site.js");

/// Shared state of the upload routes.
#[derive(Clone)]
pub struct UploadState {
    pub service: UploadService,
    pub identity: IdentityHeader,
}

/// Header carrying the signed-in principal name.
#[derive(Clone, Debug)]
pub struct IdentityHeader(pub HeaderName);

impl FromRef<UploadState> for IdentityHeader {
    fn from_ref(state: &UploadState) -> Self {
        state.identity.clone()
    }
}

/// The signed-in principal, e.g. `john.doe@contoso.com`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    IdentityHeader: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let IdentityHeader(name) = IdentityHeader::from_ref(state);
        parts
            .headers
            .get(&name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| AuthenticatedUser(v.to_string()))
            .ok_or_else(|| AppError::unauthorized("sign-in required"))
    }
}

/// `GET /` and `GET /Home/Index`
pub async fn index(AuthenticatedUser(user): AuthenticatedUser) -> impl IntoResponse {
    Html(INDEX_HTML.replace("{{user}}", &html_escape(&user)))
}

/// `GET /js/site.js`
pub async fn site_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        SITE_JS,
    )
}

/// `POST /Home/Upload`: stream every file part into the user's container.
pub async fn upload(
    State(state): State<UploadState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadAck>>, AppError> {
    let container = state.service.prepare_container(&user).await?;

    let mut acks = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let ack = state
            .service
            .store_stream(&container, file_name, field)
            .await?;
        acks.push(ack);
    }

    info!("{} uploaded {} file(s) to {}", user, acks.len(), container);
    Ok(Json(acks))
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
