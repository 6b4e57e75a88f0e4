//! Storage-facing services.
//!
//! - [`store`]: the `BlobStore` / `ShareStore` contracts
//! - [`azure_blob`], [`azure_share`]: REST implementations of them
//! - [`mover_service`]: the blob-to-share move pipeline
//! - [`upload_service`]: per-user upload intake

pub mod azure_blob;
pub mod azure_client;
pub mod azure_share;
pub mod connection;
#[cfg(test)]
pub mod memory;
pub mod mover_service;
pub mod shared_key;
pub mod store;
pub mod upload_service;
