//! Azure storage connection strings.
//!
//! Accepts the `Key=Value;Key=Value` form produced by the portal, e.g.
//! `DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=...;EndpointSuffix=core.windows.net`,
//! plus `UseDevelopmentStorage=true` for the local emulator.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use thiserror::Error;

pub const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
pub const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("connection string segment `{0}` is not of the form Key=Value")]
    MalformedSegment(String),
    #[error("connection string has no AccountName")]
    MissingAccountName,
    #[error("connection string has neither AccountKey nor SharedAccessSignature")]
    MissingCredential,
    #[error("AccountKey is not valid base64")]
    InvalidAccountKey,
}

#[derive(Clone)]
pub enum Credential {
    SharedKey { key: Vec<u8> },
    Sas { token: String },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SharedKey { .. } => f.write_str("SharedKey(..)"),
            Self::Sas { .. } => f.write_str("Sas(..)"),
        }
    }
}

/// Parsed connection settings for one storage account.
#[derive(Debug, Clone)]
pub struct StorageConnection {
    pub account: String,
    pub credential: Credential,
    pub blob_endpoint: String,
    pub file_endpoint: String,
    /// `None` when the account has no Data Lake endpoint.
    pub dfs_endpoint: Option<String>,
}

impl StorageConnection {
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        let mut account = None;
        let mut key = None;
        let mut sas = None;
        let mut protocol = "https".to_string();
        let mut suffix = DEFAULT_ENDPOINT_SUFFIX.to_string();
        let mut blob_endpoint = None;
        let mut file_endpoint = None;
        let mut dfs_endpoint = None;
        let mut development = false;

        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;
            match name.to_ascii_lowercase().as_str() {
                "accountname" => account = Some(value.to_string()),
                "accountkey" => key = Some(value.to_string()),
                "sharedaccesssignature" => {
                    sas = Some(value.trim_start_matches('?').to_string());
                }
                "defaultendpointsprotocol" => protocol = value.to_string(),
                "endpointsuffix" => suffix = value.to_string(),
                "blobendpoint" => blob_endpoint = Some(trim_endpoint(value)),
                "fileendpoint" => file_endpoint = Some(trim_endpoint(value)),
                "dfsendpoint" => dfs_endpoint = Some(trim_endpoint(value)),
                "usedevelopmentstorage" => development = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if development {
            return Ok(Self::development());
        }

        let account = account.ok_or(ConnectionStringError::MissingAccountName)?;
        let credential = match (key, sas) {
            (Some(key), _) => Credential::SharedKey {
                key: BASE64_STANDARD
                    .decode(key)
                    .map_err(|_| ConnectionStringError::InvalidAccountKey)?,
            },
            (None, Some(token)) => Credential::Sas { token },
            (None, None) => return Err(ConnectionStringError::MissingCredential),
        };

        let derive = |service: &str| format!("{protocol}://{account}.{service}.{suffix}");
        Ok(Self {
            blob_endpoint: blob_endpoint.unwrap_or_else(|| derive("blob")),
            file_endpoint: file_endpoint.unwrap_or_else(|| derive("file")),
            dfs_endpoint: Some(dfs_endpoint.unwrap_or_else(|| derive("dfs"))),
            account,
            credential,
        })
    }

    /// Well-known emulator account on its default local ports. The emulator
    /// serves no file service, so `file_endpoint` only keeps the shape. It
    /// has no Data Lake service either, so ACL reads fail fast.
    pub fn development() -> Self {
        let key = BASE64_STANDARD.decode(DEV_ACCOUNT_KEY).unwrap_or_default();
        Self {
            account: DEV_ACCOUNT_NAME.to_string(),
            credential: Credential::SharedKey { key },
            blob_endpoint: format!("http://127.0.0.1:10000/{DEV_ACCOUNT_NAME}"),
            file_endpoint: format!("http://127.0.0.1:10004/{DEV_ACCOUNT_NAME}"),
            dfs_endpoint: None,
        }
    }
}

fn trim_endpoint(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}
