//! [`BlobStore`] over the Azure Blob REST API, with the root directory ACL
//! read through the Data Lake endpoint of the same account.

use super::{
    azure_client::{AzureClient, StorageRequest, declared_length, error_code, is_not_found},
    store::{BlobContent, BlobStore, StorageError, StoreFuture},
};
use crate::models::acl::{AccessControlEntry, parse_acl};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Method, StatusCode};
use std::io;
use tracing::debug;

pub struct AzureBlobStore {
    client: AzureClient,
}

impl AzureBlobStore {
    pub fn new(client: AzureClient) -> Self {
        Self { client }
    }

    fn blob_endpoint(&self) -> &str {
        &self.client.connection().blob_endpoint
    }

    fn dfs_endpoint(&self) -> Result<&str, StorageError> {
        self.client
            .connection()
            .dfs_endpoint
            .as_deref()
            .ok_or_else(|| {
                StorageError::InvalidRequest(format!(
                    "account `{}` has no Data Lake endpoint to read ACLs from",
                    self.client.account()
                ))
            })
    }
}

impl BlobStore for AzureBlobStore {
    fn create_container_if_not_exists(&self, container: &str) -> StoreFuture<'_, ()> {
        let container = container.to_string();
        Box::pin(async move {
            let url = self.client.resource_url(
                self.blob_endpoint(),
                &container,
                &[("restype", "container")],
            )?;
            let resp = self
                .client
                .send(
                    "create container",
                    StorageRequest::new(Method::PUT, url).empty_body(),
                )
                .await?;

            match resp.status() {
                StatusCode::CREATED => Ok(()),
                StatusCode::CONFLICT if error_code(&resp) == "ContainerAlreadyExists" => {
                    debug!("container {} already exists", container);
                    Ok(())
                }
                _ => Err(AzureClient::service_error("create container", resp).await),
            }
        })
    }

    fn put_blob(&self, container: &str, name: &str, data: Bytes) -> StoreFuture<'_, ()> {
        let path = format!("{}/{}", container, name);
        Box::pin(async move {
            let url = self.client.resource_url(self.blob_endpoint(), &path, &[])?;
            let request = StorageRequest::new(Method::PUT, url)
                .header("x-ms-blob-type", "BlockBlob")
                .body(data, "application/octet-stream");
            let resp = self.client.send("put blob", request).await?;

            if resp.status().is_success() {
                Ok(())
            } else {
                Err(AzureClient::service_error("put blob", resp).await)
            }
        })
    }

    fn put_block(
        &self,
        container: &str,
        name: &str,
        block_id: &str,
        data: Bytes,
    ) -> StoreFuture<'_, ()> {
        let path = format!("{}/{}", container, name);
        let block_id = block_id.to_string();
        Box::pin(async move {
            let url = self.client.resource_url(
                self.blob_endpoint(),
                &path,
                &[("comp", "block"), ("blockid", block_id.as_str())],
            )?;
            let request =
                StorageRequest::new(Method::PUT, url).body(data, "application/octet-stream");
            let resp = self.client.send("put block", request).await?;

            if resp.status().is_success() {
                Ok(())
            } else {
                Err(AzureClient::service_error("put block", resp).await)
            }
        })
    }

    fn put_block_list(
        &self,
        container: &str,
        name: &str,
        block_ids: Vec<String>,
    ) -> StoreFuture<'_, ()> {
        let path = format!("{}/{}", container, name);
        Box::pin(async move {
            let url =
                self.client
                    .resource_url(self.blob_endpoint(), &path, &[("comp", "blocklist")])?;
            let request = StorageRequest::new(Method::PUT, url)
                .body(block_list_xml(&block_ids), "application/xml");
            let resp = self.client.send("put block list", request).await?;

            if resp.status().is_success() {
                Ok(())
            } else {
                Err(AzureClient::service_error("put block list", resp).await)
            }
        })
    }

    fn open_read(&self, container: &str, name: &str) -> StoreFuture<'_, BlobContent> {
        let path = format!("{}/{}", container, name);
        Box::pin(async move {
            let url = self.client.resource_url(self.blob_endpoint(), &path, &[])?;
            let resp = self
                .client
                .send("get blob", StorageRequest::new(Method::GET, url))
                .await?;

            if is_not_found(resp.status()) {
                return Err(StorageError::NotFound {
                    resource: "blob",
                    name: path,
                });
            }
            if !resp.status().is_success() {
                return Err(AzureClient::service_error("get blob", resp).await);
            }

            let length = declared_length("get blob", &resp)?;
            let body = resp.bytes_stream().map_err(io::Error::other).boxed();
            Ok(BlobContent { length, body })
        })
    }

    fn delete_blob(&self, container: &str, name: &str) -> StoreFuture<'_, ()> {
        let path = format!("{}/{}", container, name);
        Box::pin(async move {
            let url = self.client.resource_url(self.blob_endpoint(), &path, &[])?;
            let resp = self
                .client
                .send("delete blob", StorageRequest::new(Method::DELETE, url))
                .await?;

            if is_not_found(resp.status()) {
                return Err(StorageError::NotFound {
                    resource: "blob",
                    name: path,
                });
            }
            if resp.status().is_success() {
                Ok(())
            } else {
                Err(AzureClient::service_error("delete blob", resp).await)
            }
        })
    }

    fn root_access_control(&self, container: &str) -> StoreFuture<'_, Vec<AccessControlEntry>> {
        let root = format!("{}/", container);
        Box::pin(async move {
            let url = self.client.resource_url(
                self.dfs_endpoint()?,
                &root,
                &[("action", "getAccessControl"), ("upn", "false")],
            )?;
            let resp = self
                .client
                .send("get access control", StorageRequest::new(Method::HEAD, url))
                .await?;

            if is_not_found(resp.status()) {
                return Err(StorageError::NotFound {
                    resource: "file system",
                    name: root,
                });
            }
            if !resp.status().is_success() {
                return Err(AzureClient::service_error("get access control", resp).await);
            }

            let acl = resp
                .headers()
                .get("x-ms-acl")
                .and_then(|v| v.to_str().ok())
                .map(parse_acl)
                .unwrap_or_default();
            Ok(acl)
        })
    }
}

fn block_list_xml(block_ids: &[String]) -> Bytes {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<BlockList>\n");
    for id in block_ids {
        xml.push_str(&format!("  <Latest>{}</Latest>\n", id));
    }
    xml.push_str("</BlockList>");
    Bytes::from(xml)
}
