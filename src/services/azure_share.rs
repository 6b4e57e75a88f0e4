//! [`ShareStore`] over the Azure File REST API.

use super::{
    azure_client::{AzureClient, StorageRequest, declared_length, error_code, is_not_found},
    store::{BlobContent, ShareStore, StorageError, StorageResult, StoreFuture},
};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::{Method, StatusCode};
use tracing::debug;

/// Largest range accepted by a single Put Range call.
pub const MAX_RANGE_BYTES: usize = 4 * 1024 * 1024;

pub struct AzureShareStore {
    client: AzureClient,
}

impl AzureShareStore {
    pub fn new(client: AzureClient) -> Self {
        Self { client }
    }

    fn endpoint(&self) -> &str {
        &self.client.connection().file_endpoint
    }

    async fn put_range(&self, path: &str, offset: u64, data: Bytes) -> StorageResult<()> {
        let last = offset + data.len() as u64 - 1;
        let url = self
            .client
            .resource_url(self.endpoint(), path, &[("comp", "range")])?;
        let request = StorageRequest::new(Method::PUT, url)
            .header("x-ms-range", format!("bytes={}-{}", offset, last))
            .header("x-ms-write", "update")
            .body(data, "application/octet-stream");
        let resp = self.client.send("put range", request).await?;

        if resp.status() == StatusCode::CREATED {
            Ok(())
        } else {
            Err(AzureClient::service_error("put range", resp).await)
        }
    }
}

fn file_path(share: &str, directory: &str, name: &str) -> String {
    if directory.is_empty() {
        format!("{}/{}", share, name)
    } else {
        format!("{}/{}/{}", share, directory, name)
    }
}

/// `a/b/c` → `["a", "a/b", "a/b/c"]`.
fn directory_chain(directory: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = String::new();
    for segment in directory.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        chain.push(current.clone());
    }
    chain
}

impl ShareStore for AzureShareStore {
    fn create_share_if_not_exists(&self, share: &str) -> StoreFuture<'_, ()> {
        let share = share.to_string();
        Box::pin(async move {
            let url = self
                .client
                .resource_url(self.endpoint(), &share, &[("restype", "share")])?;
            let resp = self
                .client
                .send(
                    "create share",
                    StorageRequest::new(Method::PUT, url).empty_body(),
                )
                .await?;

            match resp.status() {
                StatusCode::CREATED => Ok(()),
                StatusCode::CONFLICT if error_code(&resp) == "ShareAlreadyExists" => {
                    debug!("share {} already exists", share);
                    Ok(())
                }
                _ => Err(AzureClient::service_error("create share", resp).await),
            }
        })
    }

    fn directory_exists(&self, share: &str, directory: &str) -> StoreFuture<'_, bool> {
        let path = format!("{}/{}", share, directory);
        Box::pin(async move {
            let url = self
                .client
                .resource_url(self.endpoint(), &path, &[("restype", "directory")])?;
            let resp = self
                .client
                .send(
                    "get directory properties",
                    StorageRequest::new(Method::HEAD, url),
                )
                .await?;

            if resp.status().is_success() {
                Ok(true)
            } else if is_not_found(resp.status()) {
                Ok(false)
            } else {
                Err(AzureClient::service_error("get directory properties", resp).await)
            }
        })
    }

    fn create_directory(&self, share: &str, directory: &str) -> StoreFuture<'_, ()> {
        let share = share.to_string();
        let chain = directory_chain(directory);
        Box::pin(async move {
            for dir in chain {
                let path = format!("{}/{}", share, dir);
                let url =
                    self.client
                        .resource_url(self.endpoint(), &path, &[("restype", "directory")])?;
                let resp = self
                    .client
                    .send(
                        "create directory",
                        StorageRequest::new(Method::PUT, url).empty_body(),
                    )
                    .await?;

                match resp.status() {
                    StatusCode::CREATED => debug!("created directory {}", path),
                    StatusCode::CONFLICT if error_code(&resp) == "ResourceAlreadyExists" => {
                        debug!("directory {} already exists", path);
                    }
                    _ => return Err(AzureClient::service_error("create directory", resp).await),
                }
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
        let path = file_path(share, directory, name);
        Box::pin(async move {
            let url = self.client.resource_url(self.endpoint(), &path, &[])?;
            let resp = self
                .client
                .send("get file properties", StorageRequest::new(Method::HEAD, url))
                .await?;

            if is_not_found(resp.status()) {
                return Ok(None);
            }
            if !resp.status().is_success() {
                return Err(AzureClient::service_error("get file properties", resp).await);
            }

            // HEAD responses carry the file length in the header only.
            declared_length("get file properties", &resp).map(Some)
        })
    }

    fn create_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        length: u64,
    ) -> StoreFuture<'_, ()> {
        let path = file_path(share, directory, name);
        Box::pin(async move {
            let url = self.client.resource_url(self.endpoint(), &path, &[])?;
            let request = StorageRequest::new(Method::PUT, url)
                .header("x-ms-type", "file")
                .header("x-ms-content-length", length.to_string())
                .empty_body();
            let resp = self.client.send("create file", request).await?;

            if resp.status() == StatusCode::CREATED {
                Ok(())
            } else {
                Err(AzureClient::service_error("create file", resp).await)
            }
        })
    }

    fn resize_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        length: u64,
    ) -> StoreFuture<'_, ()> {
        let path = file_path(share, directory, name);
        Box::pin(async move {
            let url = self
                .client
                .resource_url(self.endpoint(), &path, &[("comp", "properties")])?;
            let request = StorageRequest::new(Method::PUT, url)
                .header("x-ms-content-length", length.to_string())
                .empty_body();
            let resp = self.client.send("set file properties", request).await?;

            if is_not_found(resp.status()) {
                return Err(StorageError::NotFound {
                    resource: "file",
                    name: path,
                });
            }
            if resp.status().is_success() {
                Ok(())
            } else {
                Err(AzureClient::service_error("set file properties", resp).await)
            }
        })
    }

    fn upload_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        content: BlobContent,
    ) -> StoreFuture<'_, u64> {
        let path = file_path(share, directory, name);
        Box::pin(async move {
            let mut body = content.body;
            let mut offset: u64 = 0;
            let mut pending = BytesMut::with_capacity(MAX_RANGE_BYTES);

            while let Some(chunk) = body.next().await {
                let mut chunk = chunk?;
                while !chunk.is_empty() {
                    let take = chunk.len().min(MAX_RANGE_BYTES - pending.len());
                    pending.extend_from_slice(&chunk.split_to(take));
                    if pending.len() == MAX_RANGE_BYTES {
                        let range = pending.split().freeze();
                        let len = range.len() as u64;
                        self.put_range(&path, offset, range).await?;
                        offset += len;
                    }
                }
            }
            if !pending.is_empty() {
                let range = pending.freeze();
                let len = range.len() as u64;
                self.put_range(&path, offset, range).await?;
                offset += len;
            }

            debug!("wrote {} bytes to {}", offset, path);
            Ok(offset)
        })
    }
}
