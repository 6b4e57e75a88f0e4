//! Moves a freshly written blob from the public account into the private
//! file share of the same name, then removes the source blob.
//!
//! The move is a fixed pipeline, each step short-circuiting the rest:
//!
//! 1. filter: only finalized writes proceed, deletions are dropped
//! 2. resolve: decompose the blob URL
//! 3. ensure destination: share, then directory (logging the source ACL when
//!    the directory is new)
//! 4. copy content: stream the blob into a file of the same length
//! 5. delete source
//!
//! A failure in step 5 leaves both copies behind; nothing is rolled back.

use super::store::{BlobStore, ShareStore, StorageError};
use crate::models::{
    event::TransferEvent,
    resource_path::{PathError, ResourcePath},
};
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStage {
    EnsureDestination,
    CopyContent,
    DeleteSource,
}

impl fmt::Display for MoveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EnsureDestination => "ensuring destination",
            Self::CopyContent => "copying content",
            Self::DeleteSource => "deleting source",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum MoveError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("{stage} failed for `{blob}`: {source}")]
    Storage {
        stage: MoveStage,
        blob: String,
        #[source]
        source: StorageError,
    },
}

impl MoveError {
    pub fn stage(&self) -> Option<MoveStage> {
        match self {
            Self::Path(_) => None,
            Self::Storage { stage, .. } => Some(*stage),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The event does not describe a completed write.
    Ignored { operation: String },
    Moved { path: ResourcePath, bytes: u64 },
}

/// Blob-to-share mover.
#[derive(Clone)]
pub struct BlobToShareMover {
    source: Arc<dyn BlobStore>,
    destination: Arc<dyn ShareStore>,
    /// Account the source store is bound to, used only to flag events from
    /// elsewhere.
    source_account: Option<String>,
}

impl BlobToShareMover {
    pub fn new(source: Arc<dyn BlobStore>, destination: Arc<dyn ShareStore>) -> Self {
        Self {
            source,
            destination,
            source_account: None,
        }
    }

    pub fn with_source_account(mut self, account: impl Into<String>) -> Self {
        self.source_account = Some(account.into());
        self
    }

    /// Run the whole pipeline for one event.
    pub async fn handle(&self, event: &TransferEvent) -> Result<MoveOutcome, MoveError> {
        if !Self::accepts(event) {
            debug!("ignoring {} on {}", event.operation, event.source_url);
            return Ok(MoveOutcome::Ignored {
                operation: event.operation.clone(),
            });
        }
        info!("moving {} after {}", event.source_url, event.operation);

        let path = self.resolve(event)?;
        self.ensure_destination(&path).await?;
        let bytes = self.copy_content(&path).await?;
        self.delete_source(&path).await?;

        info!(
            "moved {} bytes to {}/{}",
            bytes,
            path.container,
            path.blob_name()
        );
        Ok(MoveOutcome::Moved { path, bytes })
    }

    fn accepts(event: &TransferEvent) -> bool {
        !event.is_deletion() && event.is_finalized_write()
    }

    fn resolve(&self, event: &TransferEvent) -> Result<ResourcePath, MoveError> {
        let path = ResourcePath::from_url(&event.source_url)?;
        if let Some(expected) = &self.source_account {
            if !expected.eq_ignore_ascii_case(&path.account) {
                warn!(
                    "event account {} differs from configured source account {}",
                    path.account, expected
                );
            }
        }
        Ok(path)
    }

    async fn ensure_destination(&self, path: &ResourcePath) -> Result<(), MoveError> {
        let fail = failure(MoveStage::EnsureDestination, path);

        info!("ensuring share {}", path.container);
        self.destination
            .create_share_if_not_exists(&path.container)
            .await
            .map_err(&fail)?;

        if path.is_root() {
            return Ok(());
        }

        info!("checking directory {}", path.directory);
        let exists = self
            .destination
            .directory_exists(&path.container, path.relative_directory())
            .await
            .map_err(&fail)?;
        if exists {
            return Ok(());
        }

        self.destination
            .create_directory(&path.container, path.relative_directory())
            .await
            .map_err(&fail)?;

        info!("reading root ACL of container {}", path.container);
        let acl = self
            .source
            .root_access_control(&path.container)
            .await
            .map_err(&fail)?;
        for entry in acl.iter().filter(|e| e.is_user()) {
            info!(
                "assign acl: user={}, permissions={}",
                entry.principal_id, entry.permissions
            );
        }
        Ok(())
    }

    async fn copy_content(&self, path: &ResourcePath) -> Result<u64, MoveError> {
        let fail = failure(MoveStage::CopyContent, path);
        let directory = path.relative_directory();

        info!("opening source blob {}", path.blob_name());
        let content = self
            .source
            .open_read(&path.container, &path.blob_name())
            .await
            .map_err(&fail)?;
        let length = content.length;

        match self
            .destination
            .file_length(&path.container, directory, &path.file_name)
            .await
            .map_err(&fail)?
        {
            None => {
                info!("creating file {} ({} bytes)", path.file_name, length);
                self.destination
                    .create_file(&path.container, directory, &path.file_name, length)
                    .await
                    .map_err(&fail)?;
            }
            Some(existing) if existing != length => {
                info!(
                    "resizing file {} from {} to {} bytes",
                    path.file_name, existing, length
                );
                self.destination
                    .resize_file(&path.container, directory, &path.file_name, length)
                    .await
                    .map_err(&fail)?;
            }
            Some(_) => {}
        }

        info!("uploading content to {}", path.file_name);
        self.destination
            .upload_file(&path.container, directory, &path.file_name, content)
            .await
            .map_err(&fail)
    }

    async fn delete_source(&self, path: &ResourcePath) -> Result<(), MoveError> {
        info!("deleting source blob {}", path.blob_name());
        self.source
            .delete_blob(&path.container, &path.blob_name())
            .await
            .map_err(failure(MoveStage::DeleteSource, path))
    }
}

fn failure(stage: MoveStage, path: &ResourcePath) -> impl Fn(StorageError) -> MoveError + '_ {
    move |source| MoveError::Storage {
        stage,
        blob: format!("{}/{}", path.container, path.blob_name()),
        source,
    }
}
