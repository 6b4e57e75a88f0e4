//! Event Grid webhook that drives the mover.
//!
//! Events are handled one after another in the order received, and every
//! event is attempted even when an earlier one fails. Any failed move
//! answers 500 so Event Grid redelivers the batch under its own retry policy;
//! otherwise a malformed envelope answers 400.

use crate::{
    errors::AppError,
    models::event::EventGridEvent,
    services::mover_service::{BlobToShareMover, MoveOutcome},
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    #[serde(rename = "functionName")]
    pub function_name: Option<String>,
}

#[derive(Serialize)]
struct ValidationResponse {
    #[serde(rename = "validationResponse")]
    validation_response: String,
}

/// `POST /runtime/webhooks/EventGrid`
pub async fn receive_events(
    State(mover): State<BlobToShareMover>,
    Query(query): Query<WebhookQuery>,
    Json(events): Json<Vec<EventGridEvent>>,
) -> Result<Response, AppError> {
    debug!(
        "received {} event(s) for {}",
        events.len(),
        query.function_name.as_deref().unwrap_or("default")
    );

    let mut failed_moves = 0;
    let mut first_failure = None;
    let mut last_malformed = None;

    for event in &events {
        if event.is_subscription_validation() {
            let code = event.validation_code()?;
            info!("answering subscription validation {}", event.id);
            return Ok(Json(ValidationResponse {
                validation_response: code,
            })
            .into_response());
        }

        debug!("event {} data: {}", event.id, event.data);
        let transfer = match event.transfer_event() {
            Ok(transfer) => transfer,
            Err(err) => {
                error!("event {} is malformed: {}", event.id, err);
                last_malformed = Some(err);
                continue;
            }
        };

        match mover.handle(&transfer).await {
            Ok(MoveOutcome::Moved { path, bytes }) => {
                info!(
                    "event {} moved {}/{} ({} bytes)",
                    event.id,
                    path.container,
                    path.blob_name(),
                    bytes
                );
            }
            Ok(MoveOutcome::Ignored { operation }) => {
                debug!("event {} ignored ({})", event.id, operation);
            }
            Err(err) => {
                match err.stage() {
                    Some(stage) => {
                        error!("event {} failed while {}: {}", event.id, stage, err)
                    }
                    None => error!("event {} failed: {}", event.id, err),
                }
                failed_moves += 1;
                first_failure.get_or_insert(err);
            }
        }
    }

    if let Some(err) = first_failure {
        return Err(AppError::internal(format!(
            "{} of {} event(s) failed to move, first: {}",
            failed_moves,
            events.len(),
            err
        )));
    }
    if let Some(err) = last_malformed {
        return Err(err.into());
    }
    Ok(StatusCode::OK.into_response())
}
