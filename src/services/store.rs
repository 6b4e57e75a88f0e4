//! Storage contracts the mover and upload service are written against.
//!
//! [`BlobStore`] covers the flat object side (the public account) and
//! [`ShareStore`] the hierarchical file side (the private account). Both
//! work in terms of request-scoped identifiers only; implementations hold
//! nothing but immutable client configuration.

use crate::models::acl::AccessControlEntry;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::{future::Future, io, pin::Pin};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{resource} `{name}` not found")]
    NotFound { resource: &'static str, name: String },
    #[error("storage {operation} failed with HTTP {status} ({code}): {message}")]
    Service {
        operation: &'static str,
        status: u16,
        code: String,
        message: String,
    },
    #[error("storage {operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("storage {operation} response has no usable Content-Length")]
    MissingLength { operation: &'static str },
    #[error("invalid storage request: {0}")]
    InvalidRequest(String),
    #[error("credential error: {0}")]
    Credential(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StorageResult<T>> + Send + 'a>>;

/// An open read on a blob. `length` comes from the service response and is
/// known before the body is consumed.
pub struct BlobContent {
    pub length: u64,
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

impl std::fmt::Debug for BlobContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobContent")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Flat object storage: containers holding named blobs.
pub trait BlobStore: Send + Sync + 'static {
    /// Create `container` unless it already exists.
    fn create_container_if_not_exists(&self, container: &str) -> StoreFuture<'_, ()>;

    /// Write `data` to `container/name`, replacing any existing blob.
    fn put_blob(&self, container: &str, name: &str, data: Bytes) -> StoreFuture<'_, ()>;

    /// Stage one uncommitted block of `container/name`.
    fn put_block(
        &self,
        container: &str,
        name: &str,
        block_id: &str,
        data: Bytes,
    ) -> StoreFuture<'_, ()>;

    /// Commit the staged blocks in `block_ids` order as the new content of
    /// `container/name`, replacing any existing blob.
    fn put_block_list(
        &self,
        container: &str,
        name: &str,
        block_ids: Vec<String>,
    ) -> StoreFuture<'_, ()>;

    /// Open a streaming read on `container/name`.
    fn open_read(&self, container: &str, name: &str) -> StoreFuture<'_, BlobContent>;

    fn delete_blob(&self, container: &str, name: &str) -> StoreFuture<'_, ()>;

    /// Access control list of the container's root directory.
    fn root_access_control(&self, container: &str) -> StoreFuture<'_, Vec<AccessControlEntry>>;
}

/// Hierarchical file storage: shares holding directories and files.
///
/// `directory` arguments are relative to the share root without a leading
/// separator; the empty string addresses the root.
pub trait ShareStore: Send + Sync + 'static {
    fn create_share_if_not_exists(&self, share: &str) -> StoreFuture<'_, ()>;

    fn directory_exists(&self, share: &str, directory: &str) -> StoreFuture<'_, bool>;

    /// Create `directory`, creating missing ancestors first. An existing
    /// directory is not an error.
    fn create_directory(&self, share: &str, directory: &str) -> StoreFuture<'_, ()>;

    /// Current length of the file, or `None` when it does not exist.
    fn file_length(&self, share: &str, directory: &str, name: &str)
    -> StoreFuture<'_, Option<u64>>;

    /// Create an empty file of `length` bytes, replacing any existing one.
    fn create_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        length: u64,
    ) -> StoreFuture<'_, ()>;

    /// Change the length of an existing file.
    fn resize_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        length: u64,
    ) -> StoreFuture<'_, ()>;

    /// Write `content` into the file starting at offset zero. The file must
    /// already be at least `content.length` bytes long. Returns bytes written.
    fn upload_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        content: BlobContent,
    ) -> StoreFuture<'_, u64>;
}
