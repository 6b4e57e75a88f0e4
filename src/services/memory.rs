//! In-memory [`BlobStore`] and [`ShareStore`] used by the tests.
//!
//! Every call is appended to a shared journal so tests can assert on the
//! exact order of storage operations, or on their absence.

use super::store::{BlobContent, BlobStore, ShareStore, StorageError, StoreFuture};
use crate::models::acl::AccessControlEntry;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    io,
    sync::Arc,
};
use tokio::sync::RwLock;

pub type Journal = Arc<RwLock<Vec<String>>>;

#[derive(Default)]
pub struct MemoryBlobStore {
    containers: RwLock<BTreeSet<String>>,
    blobs: RwLock<BTreeMap<(String, String), Bytes>>,
    staged: RwLock<HashMap<(String, String), HashMap<String, Bytes>>>,
    acls: RwLock<HashMap<String, Vec<AccessControlEntry>>>,
    fail_delete: bool,
    fail_read: bool,
    pub journal: Journal,
}

impl MemoryBlobStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn failing_read(mut self) -> Self {
        self.fail_read = true;
        self
    }

    pub async fn seed(&self, container: &str, name: &str, data: &'static [u8]) {
        self.containers.write().await.insert(container.to_string());
        self.blobs.write().await.insert(
            (container.to_string(), name.to_string()),
            Bytes::from_static(data),
        );
    }

    pub async fn set_acl(&self, container: &str, acl: Vec<AccessControlEntry>) {
        self.acls.write().await.insert(container.to_string(), acl);
    }

    pub async fn blob(&self, container: &str, name: &str) -> Option<Bytes> {
        self.blobs
            .read()
            .await
            .get(&(container.to_string(), name.to_string()))
            .cloned()
    }

    pub async fn has_container(&self, container: &str) -> bool {
        self.containers.read().await.contains(container)
    }

    async fn record(&self, entry: String) {
        self.journal.write().await.push(entry);
    }
}

impl BlobStore for MemoryBlobStore {
    fn create_container_if_not_exists(&self, container: &str) -> StoreFuture<'_, ()> {
        let container = container.to_string();
        Box::pin(async move {
            self.record(format!("create_container {container}")).await;
            self.containers.write().await.insert(container);
            Ok(())
        })
    }

    fn put_blob(&self, container: &str, name: &str, data: Bytes) -> StoreFuture<'_, ()> {
        let key = (container.to_string(), name.to_string());
        Box::pin(async move {
            self.record(format!("put_blob {}/{}", key.0, key.1)).await;
            if !self.containers.read().await.contains(&key.0) {
                return Err(StorageError::NotFound {
                    resource: "container",
                    name: key.0,
                });
            }
            self.blobs.write().await.insert(key, data);
            Ok(())
        })
    }

    fn put_block(
        &self,
        container: &str,
        name: &str,
        block_id: &str,
        data: Bytes,
    ) -> StoreFuture<'_, ()> {
        let key = (container.to_string(), name.to_string());
        let block_id = block_id.to_string();
        Box::pin(async move {
            self.record(format!("put_block {}/{} {}", key.0, key.1, block_id))
                .await;
            if !self.containers.read().await.contains(&key.0) {
                return Err(StorageError::NotFound {
                    resource: "container",
                    name: key.0,
                });
            }
            self.staged
                .write()
                .await
                .entry(key)
                .or_default()
                .insert(block_id, data);
            Ok(())
        })
    }

    fn put_block_list(
        &self,
        container: &str,
        name: &str,
        block_ids: Vec<String>,
    ) -> StoreFuture<'_, ()> {
        let key = (container.to_string(), name.to_string());
        Box::pin(async move {
            self.record(format!(
                "put_block_list {}/{} {}",
                key.0,
                key.1,
                block_ids.len()
            ))
            .await;
            let staged = self.staged.write().await.remove(&key).unwrap_or_default();
            let mut data = BytesMut::new();
            for id in &block_ids {
                let block = staged.get(id).ok_or_else(|| {
                    StorageError::InvalidRequest(format!("block {id} was never staged"))
                })?;
                data.extend_from_slice(block);
            }
            self.blobs.write().await.insert(key, data.freeze());
            Ok(())
        })
    }

    fn open_read(&self, container: &str, name: &str) -> StoreFuture<'_, BlobContent> {
        let key = (container.to_string(), name.to_string());
        Box::pin(async move {
            self.record(format!("open_read {}/{}", key.0, key.1)).await;
            if self.fail_read {
                return Err(StorageError::Io(io::Error::other("read refused")));
            }
            let data = self
                .blobs
                .read()
                .await
                .get(&key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound {
                    resource: "blob",
                    name: format!("{}/{}", key.0, key.1),
                })?;

            // Two chunks, so consumers cannot assume a single buffer.
            let mid = data.len() / 2;
            let chunks = vec![Ok(data.slice(..mid)), Ok(data.slice(mid..))];
            Ok(BlobContent {
                length: data.len() as u64,
                body: stream::iter(chunks).boxed(),
            })
        })
    }

    fn delete_blob(&self, container: &str, name: &str) -> StoreFuture<'_, ()> {
        let key = (container.to_string(), name.to_string());
        Box::pin(async move {
            self.record(format!("delete_blob {}/{}", key.0, key.1)).await;
            if self.fail_delete {
                return Err(StorageError::Service {
                    operation: "delete blob",
                    status: 403,
                    code: "AuthorizationPermissionMismatch".into(),
                    message: "delete refused".into(),
                });
            }
            self.blobs
                .write()
                .await
                .remove(&key)
                .map(|_| ())
                .ok_or_else(|| StorageError::NotFound {
                    resource: "blob",
                    name: format!("{}/{}", key.0, key.1),
                })
        })
    }

    fn root_access_control(&self, container: &str) -> StoreFuture<'_, Vec<AccessControlEntry>> {
        let container = container.to_string();
        Box::pin(async move {
            self.record(format!("root_access_control {container}")).await;
            Ok(self
                .acls
                .read()
                .await
                .get(&container)
                .cloned()
                .unwrap_or_default())
        })
    }
}

#[derive(Default)]
pub struct MemoryShareStore {
    shares: RwLock<BTreeSet<String>>,
    directories: RwLock<BTreeSet<(String, String)>>,
    files: RwLock<BTreeMap<String, BytesMut>>,
    pub journal: Journal,
}

impl MemoryShareStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub async fn add_directory(&self, share: &str, directory: &str) {
        self.shares.write().await.insert(share.to_string());
        self.directories
            .write()
            .await
            .insert((share.to_string(), directory.to_string()));
    }

    pub async fn add_file(&self, share: &str, directory: &str, name: &str, data: &[u8]) {
        self.files
            .write()
            .await
            .insert(file_key(share, directory, name), BytesMut::from(data));
    }

    pub async fn file(&self, share: &str, directory: &str, name: &str) -> Option<Bytes> {
        self.files
            .read()
            .await
            .get(&file_key(share, directory, name))
            .map(|data| data.clone().freeze())
    }

    pub async fn has_directory(&self, share: &str, directory: &str) -> bool {
        self.directories
            .read()
            .await
            .contains(&(share.to_string(), directory.to_string()))
    }

    async fn record(&self, entry: String) {
        self.journal.write().await.push(entry);
    }
}

fn file_key(share: &str, directory: &str, name: &str) -> String {
    if directory.is_empty() {
        format!("{share}/{name}")
    } else {
        format!("{share}/{directory}/{name}")
    }
}

impl ShareStore for MemoryShareStore {
    fn create_share_if_not_exists(&self, share: &str) -> StoreFuture<'_, ()> {
        let share = share.to_string();
        Box::pin(async move {
            self.record(format!("create_share {share}")).await;
            self.shares.write().await.insert(share);
            Ok(())
        })
    }

    fn directory_exists(&self, share: &str, directory: &str) -> StoreFuture<'_, bool> {
        let key = (share.to_string(), directory.to_string());
        Box::pin(async move {
            self.record(format!("directory_exists {}/{}", key.0, key.1))
                .await;
            Ok(self.directories.read().await.contains(&key))
        })
    }

    fn create_directory(&self, share: &str, directory: &str) -> StoreFuture<'_, ()> {
        let share = share.to_string();
        let directory = directory.to_string();
        Box::pin(async move {
            self.record(format!("create_directory {share}/{directory}"))
                .await;
            let mut dirs = self.directories.write().await;
            let mut current = String::new();
            for segment in directory.split('/').filter(|s| !s.is_empty()) {
                if !current.is_empty() {
                    current.push('/');
                }
                current.push_str(segment);
                dirs.insert((share.clone(), current.clone()));
            }
            Ok(())
        })
    }

    fn file_length(
        &self,
        share: &str,
        directory: &str,
        name: &str,
    ) -> StoreFuture<'_, Option<u64>> {
        let key = file_key(share, directory, name);
        Box::pin(async move {
            self.record(format!("file_length {key}")).await;
            Ok(self.files.read().await.get(&key).map(|f| f.len() as u64))
        })
    }

    fn create_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        length: u64,
    ) -> StoreFuture<'_, ()> {
        let key = file_key(share, directory, name);
        Box::pin(async move {
            self.record(format!("create_file {key} {length}")).await;
            self.files
                .write()
                .await
                .insert(key, BytesMut::zeroed(length as usize));
            Ok(())
        })
    }

    fn resize_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        length: u64,
    ) -> StoreFuture<'_, ()> {
        let key = file_key(share, directory, name);
        Box::pin(async move {
            self.record(format!("resize_file {key} {length}")).await;
            let mut files = self.files.write().await;
            let file = files.get_mut(&key).ok_or_else(|| StorageError::NotFound {
                resource: "file",
                name: key.clone(),
            })?;
            file.resize(length as usize, 0);
            Ok(())
        })
    }

    fn upload_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        content: BlobContent,
    ) -> StoreFuture<'_, u64> {
        let key = file_key(share, directory, name);
        Box::pin(async move {
            self.record(format!("upload_file {key}")).await;
            let mut body = content.body;
            let mut written = 0usize;
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                let mut files = self.files.write().await;
                let file = files.get_mut(&key).ok_or_else(|| StorageError::NotFound {
                    resource: "file",
                    name: key.clone(),
                })?;
                let end = written + chunk.len();
                if end > file.len() {
                    return Err(StorageError::InvalidRequest(format!(
                        "range {written}-{end} is beyond the end of {key}"
                    )));
                }
                file[written..end].copy_from_slice(&chunk);
                written = end;
            }
            Ok(written as u64)
        })
    }
}
