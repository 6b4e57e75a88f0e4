//! Per-user upload intake into the public account.
//!
//! Each signed-in user gets one container whose name is derived from the
//! identity alone, so the same user always lands in the same container and
//! the raw identity never appears in a storage address.

use super::store::{BlobStore, StorageError};
use crate::models::upload::UploadAck;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::{error::Error as StdError, io, pin::pin, sync::Arc};
use thiserror::Error;
use tracing::{debug, info};

/// Longest alias kept in front of the 32 character hash, keeping names
/// within the 63 character container limit.
const MAX_ALIAS_LEN: usize = 30;

/// Size of each staged block. A file that fits in one block is written with
/// a single Put Blob.
pub const BLOCK_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file name `{0}` has no base name")]
    InvalidFileName(String),
    #[error("reading upload body failed: {0}")]
    Body(#[source] io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Container name for an identity: `{alias}-{md5(identity)}`.
///
/// The alias is the local part of the identity, reduced to lowercase ASCII
/// letters and digits. An identity without a usable alias maps to the bare
/// hash.
pub fn container_name_for(identity: &str) -> String {
    let local_part = identity.split('@').next().unwrap_or_default();
    let alias: String = local_part
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_ALIAS_LEN)
        .collect();
    let hash = format!("{:x}", md5::compute(identity.as_bytes()));

    if alias.is_empty() {
        hash
    } else {
        format!("{alias}-{hash}")
    }
}

/// Strip any client-side directories, accepting both separators.
pub fn base_file_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

/// Block ids must share one length within a blob.
fn block_id(index: usize) -> String {
    BASE64_STANDARD.encode(format!("block-{index:06}"))
}

#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn BlobStore>,
}

impl UploadService {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Make sure the identity's container exists and return its name.
    pub async fn prepare_container(&self, identity: &str) -> Result<String, UploadError> {
        let container = container_name_for(identity);
        self.store.create_container_if_not_exists(&container).await?;
        Ok(container)
    }

    /// Store one file under its base name, replacing any previous blob.
    ///
    /// `body` is consumed as it arrives; at most one block is held in memory.
    /// Nothing is written when the name is rejected, and a body that fails
    /// part-way leaves only uncommitted blocks behind.
    pub async fn store_stream<S, E>(
        &self,
        container: &str,
        file_name: String,
        body: S,
    ) -> Result<UploadAck, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let name = base_file_name(&file_name);
        if name.is_empty() {
            return Err(UploadError::InvalidFileName(file_name));
        }

        let mut body = pin!(body);
        let mut pending = BytesMut::new();
        let mut block_ids = Vec::new();
        let mut size = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| UploadError::Body(io::Error::other(err)))?;
            size += chunk.len() as u64;
            pending.extend_from_slice(&chunk);

            while pending.len() >= BLOCK_BYTES {
                let block = pending.split_to(BLOCK_BYTES).freeze();
                self.stage_block(container, name, &mut block_ids, block)
                    .await?;
            }
        }

        if block_ids.is_empty() {
            self.store.put_blob(container, name, pending.freeze()).await?;
        } else {
            if !pending.is_empty() {
                self.stage_block(container, name, &mut block_ids, pending.freeze())
                    .await?;
            }
            let blocks = block_ids.len();
            self.store.put_block_list(container, name, block_ids).await?;
            debug!("committed {} block(s) for {}", blocks, name);
        }
        info!("stored {} ({} bytes) in {}", name, size, container);

        Ok(UploadAck::new(Utc::now(), file_name))
    }

    async fn stage_block(
        &self,
        container: &str,
        name: &str,
        block_ids: &mut Vec<String>,
        block: Bytes,
    ) -> Result<(), UploadError> {
        let id = block_id(block_ids.len());
        self.store.put_block(container, name, &id, block).await?;
        block_ids.push(id);
        Ok(())
    }
}
