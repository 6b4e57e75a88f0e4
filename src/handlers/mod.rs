//! HTTP handlers, one module per surface.

pub mod event_handlers;
pub mod health_handlers;
pub mod upload_handlers;
