//! Decomposes a storage resource URL into account, container, directory and
//! file name.
//!
//! ```text
//! https://asecpublic.blob.core.windows.net/user1/sub/1.zip
//!         ^^^^^^^^^^                        ^^^^^ ^^^ ^^^^^
//!         account                       container dir file
//! ```

use percent_encoding::percent_decode_str;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Directory value used when a blob sits directly under its container.
pub const ROOT_DIRECTORY: &str = "/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("`{url}` is not a valid absolute url: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("host `{0}` does not start with an account label")]
    MissingAccount(String),
    #[error("url `{0}` has no container segment")]
    MissingContainer(String),
    #[error("url `{0}` has no file name")]
    MissingFileName(String),
    #[error("url `{0}` does not decode to valid UTF-8")]
    InvalidEncoding(String),
}

/// Location of a single blob, derived purely from its URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcePath {
    pub account: String,
    pub container: String,
    /// `/` for the container root, otherwise `/` followed by the parent
    /// segments, e.g. `/sub` or `/a/b`.
    pub directory: String,
    pub file_name: String,
}

impl ResourcePath {
    /// Parse `https://{account}.{suffix}/{container}/{dirs...}/{file}`.
    pub fn from_url(raw: &str) -> Result<Self, PathError> {
        let url = Url::parse(raw).map_err(|err| PathError::InvalidUrl {
            url: raw.to_string(),
            reason: err.to_string(),
        })?;

        let host = url.host_str().unwrap_or_default();
        let account = match host.split_once('.') {
            Some((label, _)) if !label.is_empty() => label.to_string(),
            _ => return Err(PathError::MissingAccount(host.to_string())),
        };

        let path = percent_decode_str(url.path())
            .decode_utf8()
            .map_err(|_| PathError::InvalidEncoding(raw.to_string()))?;
        let path = path.strip_prefix('/').unwrap_or(&path);

        let (container, rest) = match path.split_once('/') {
            Some((container, rest)) if !container.is_empty() => (container, rest),
            _ => return Err(PathError::MissingContainer(raw.to_string())),
        };

        let (directory, file_name) = match rest.rsplit_once('/') {
            Some((dir, file)) => (format!("/{dir}"), file),
            None => (ROOT_DIRECTORY.to_string(), rest),
        };

        if file_name.is_empty() {
            return Err(PathError::MissingFileName(raw.to_string()));
        }

        Ok(Self {
            account,
            container: container.to_string(),
            directory,
            file_name: file_name.to_string(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.directory == ROOT_DIRECTORY
    }

    /// Directory relative to the container, without the leading separator.
    /// Empty for the root.
    pub fn relative_directory(&self) -> &str {
        self.directory.trim_start_matches('/')
    }

    /// Name of the blob inside its container, e.g. `sub/1.zip`.
    pub fn blob_name(&self) -> String {
        if self.is_root() {
            self.file_name.clone()
        } else {
            format!("{}/{}", self.relative_directory(), self.file_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_at_container_root_uses_root_marker() {
        let path =
            ResourcePath::from_url("https://asecpublic.blob.core.windows.net/user1/1.zip").unwrap();
        assert_eq!(path.account, "asecpublic");
        assert_eq!(path.container, "user1");
        assert_eq!(path.directory, "/");
        assert_eq!(path.file_name, "1.zip");
        assert!(path.is_root());
        assert_eq!(path.blob_name(), "1.zip");
    }

    #[test]
    fn single_directory_segment() {
        let path = ResourcePath::from_url("https://acct.blob.core.windows.net/user1/sub/1.zip")
            .unwrap();
        assert_eq!(path.account, "acct");
        assert_eq!(path.container, "user1");
        assert_eq!(path.directory, "/sub");
        assert_eq!(path.file_name, "1.zip");
        assert_eq!(path.blob_name(), "sub/1.zip");
    }

    #[test]
    fn nested_directories_recombine_to_source_path() {
        let decoded = "user1/a/b c/d/report final.pdf";
        let url = "https://acct.blob.core.windows.net/user1/a/b%20c/d/report%20final.pdf";
        let path = ResourcePath::from_url(url).unwrap();

        assert_eq!(path.directory, "/a/b c/d");
        assert_eq!(path.file_name, "report final.pdf");
        assert_eq!(
            format!(
                "{}/{}/{}",
                path.container,
                path.relative_directory(),
                path.file_name
            ),
            decoded
        );
    }

    #[test]
    fn query_string_is_not_part_of_the_file_name() {
        let path =
            ResourcePath::from_url("https://acct.blob.core.windows.net/c/x/f.bin?sv=2020&sig=abc")
                .unwrap();
        assert_eq!(path.directory, "/x");
        assert_eq!(path.file_name, "f.bin");
    }

    #[test]
    fn rejects_host_without_dot() {
        let err = ResourcePath::from_url("http://localhost/c/f.bin").unwrap_err();
        assert_eq!(err, PathError::MissingAccount("localhost".into()));
    }

    #[test]
    fn rejects_path_without_container_separator() {
        assert!(matches!(
            ResourcePath::from_url("https://acct.blob.core.windows.net/onlycontainer"),
            Err(PathError::MissingContainer(_))
        ));
        assert!(matches!(
            ResourcePath::from_url("https://acct.blob.core.windows.net/"),
            Err(PathError::MissingContainer(_))
        ));
    }

    #[test]
    fn rejects_trailing_slash_and_garbage() {
        assert!(matches!(
            ResourcePath::from_url("https://acct.blob.core.windows.net/c/dir/"),
            Err(PathError::MissingFileName(_))
        ));
        assert!(matches!(
            ResourcePath::from_url("not a url"),
            Err(PathError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn rejects_invalid_utf8_escapes() {
        let url = "https://acct.blob.core.windows.net/c/sub/bad%FF%FE.bin";
        assert_eq!(
            ResourcePath::from_url(url),
            Err(PathError::InvalidEncoding(url.into()))
        );
    }
}
