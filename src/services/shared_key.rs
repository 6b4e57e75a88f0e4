//! Shared Key request signing for the Blob, File and Data Lake services.
//!
//! `Authorization: SharedKey {account}:{base64(hmac_sha256(key, string_to_sign))}`
//!
//! ```text
//! VERB\n
//! Content-Encoding\n
//! Content-Language\n
//! Content-Length\n
//! Content-MD5\n
//! Content-Type\n
//! Date\n
//! If-Modified-Since\n
//! If-Match\n
//! If-None-Match\n
//! If-Unmodified-Since\n
//! Range\n
//! CanonicalizedHeaders\n
//! CanonicalizedResource
//! ```

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// The parts of an outgoing request that take part in the signature.
pub struct SignedParts<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    pub content_length: u64,
    pub content_type: &'a str,
    /// Every `x-ms-*` header that will be sent, including date and version.
    pub ms_headers: &'a [(String, String)],
}

pub fn string_to_sign(account: &str, parts: &SignedParts<'_>) -> String {
    // Zero length is signed as an empty line.
    let content_length = match parts.content_length {
        0 => String::new(),
        len => len.to_string(),
    };

    let mut headers: Vec<(String, String)> = parts
        .ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .filter(|(name, _)| name.starts_with("x-ms-"))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonicalized_headers = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}\n{}",
        parts.method,
        content_length,
        parts.content_type,
        canonicalized_headers,
        canonicalized_resource(account, parts.url)
    )
}

/// `/{account}{encoded path}` followed by one `\nname:v1,v2` line per query
/// parameter, names lowercased and sorted.
fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{}{}", account, url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        resource.push_str(&format!("\n{}:{}", name, values.join(",")));
    }
    resource
}

/// Compute the `Authorization` header value.
pub fn authorization(account: &str, key: &[u8], parts: &SignedParts<'_>) -> Result<String, String> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|err| format!("invalid HMAC key: {err}"))?;
    mac.update(string_to_sign(account, parts).as_bytes());
    let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());
    Ok(format!("SharedKey {account}:{signature}"))
}
