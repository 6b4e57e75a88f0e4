//! Authenticated REST plumbing shared by the Azure blob and share stores.

use super::{
    connection::{Credential, StorageConnection},
    shared_key::{self, SignedParts},
    store::{StorageError, StorageResult},
};
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Method, Response, StatusCode, header::CONTENT_LENGTH};
use std::time::{Duration, SystemTime};
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// REST API version sent with every request.
pub const API_VERSION: &str = "2023-11-03";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything except unreserved characters and `/` is escaped in resource
/// paths.
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// One outgoing storage request, built up before signing.
pub struct StorageRequest {
    method: Method,
    url: Url,
    ms_headers: Vec<(String, String)>,
    content_type: &'static str,
    body: Option<Bytes>,
}

impl StorageRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            ms_headers: Vec::new(),
            content_type: "",
            body: None,
        }
    }

    /// Add an `x-ms-*` header.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.ms_headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: Bytes, content_type: &'static str) -> Self {
        self.body = Some(body);
        self.content_type = content_type;
        self
    }

    /// Send an explicit zero-length body; the services reject body-less PUTs.
    pub fn empty_body(mut self) -> Self {
        self.body = Some(Bytes::new());
        self
    }
}

/// HTTP client bound to one storage account.
#[derive(Clone)]
pub struct AzureClient {
    http: reqwest::Client,
    connection: StorageConnection,
}

impl AzureClient {
    pub fn new(connection: StorageConnection) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| StorageError::Transport {
                operation: "client setup",
                source,
            })?;
        Ok(Self { http, connection })
    }

    pub fn connection(&self) -> &StorageConnection {
        &self.connection
    }

    pub fn account(&self) -> &str {
        &self.connection.account
    }

    /// Build `{endpoint}/{path}?{query}` with `path` percent-encoded.
    pub fn resource_url(
        &self,
        endpoint: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> StorageResult<Url> {
        let encoded = utf8_percent_encode(path.trim_start_matches('/'), PATH_ENCODE_SET);
        let mut url = Url::parse(&format!("{endpoint}/{encoded}"))
            .map_err(|err| StorageError::InvalidRequest(format!("{endpoint}/{path}: {err}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Sign and send `request`. The caller inspects the status; use
    /// [`AzureClient::service_error`] for unexpected ones.
    pub async fn send(
        &self,
        operation: &'static str,
        request: StorageRequest,
    ) -> StorageResult<Response> {
        let StorageRequest {
            method,
            mut url,
            mut ms_headers,
            content_type,
            body,
        } = request;

        ms_headers.push(("x-ms-date".into(), httpdate::fmt_http_date(SystemTime::now())));
        ms_headers.push(("x-ms-version".into(), API_VERSION.into()));
        ms_headers.push(("x-ms-client-request-id".into(), Uuid::new_v4().to_string()));

        let content_length = body.as_ref().map(|b| b.len() as u64).unwrap_or(0);
        let authorization = match &self.connection.credential {
            Credential::SharedKey { key } => {
                let parts = SignedParts {
                    method: method.as_str(),
                    url: &url,
                    content_length,
                    content_type,
                    ms_headers: &ms_headers,
                };
                Some(
                    shared_key::authorization(&self.connection.account, key, &parts)
                        .map_err(StorageError::Credential)?,
                )
            }
            Credential::Sas { token } => {
                let query = match url.query() {
                    Some(existing) => format!("{existing}&{token}"),
                    None => token.clone(),
                };
                url.set_query(Some(&query));
                None
            }
        };

        debug!("{} {} ({})", method, url.path(), operation);

        let mut builder = self.http.request(method, url);
        for (name, value) in &ms_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        if !content_type.is_empty() {
            builder = builder.header("Content-Type", content_type);
        }
        if let Some(body) = body {
            builder = builder.header("Content-Length", content_length).body(body);
        }

        builder
            .send()
            .await
            .map_err(|source| StorageError::Transport { operation, source })
    }

    /// Turn a non-success response into a `StorageError::Service`.
    pub async fn service_error(operation: &'static str, response: Response) -> StorageError {
        let status = response.status();
        let code = error_code(&response);
        let message = response.text().await.unwrap_or_default();
        StorageError::Service {
            operation,
            status: status.as_u16(),
            code,
            message,
        }
    }
}

/// Value of the `x-ms-error-code` header, if the service sent one.
pub fn error_code(response: &Response) -> String {
    response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Length the service declared in `Content-Length`.
pub fn declared_length(operation: &'static str, response: &Response) -> StorageResult<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or(StorageError::MissingLength { operation })
}

pub fn is_not_found(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND
}
