//! Storage Account Connection Settings
//!
//! This module parses account connection strings and maps resources to and
//! from their service URIs.
//!
//! A connection string is a list of `Key=Value` pairs separated by `;`:
//!
//! ```text
//! DefaultEndpointsProtocol=https;AccountName=demo;AccountKey=<base64>;EndpointSuffix=core.windows.net
//! ```
//!
//! `FileEndpoint=` and `BlobEndpoint=` override the derived service endpoints.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::fmt;
use url::Url;

use crate::errors::{FileShareError, Result};
use crate::protocol::{split_path, validate_blob_name};

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// A resource addressed by a service URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocator {
    /// A file on a share
    File {
        /// Share name
        share: String,
        /// Path relative to the share root
        path: String,
    },
    /// A blob in a container
    Blob {
        /// Container name
        container: String,
        /// Blob name, possibly holding `/`
        blob: String,
    },
}

impl ResourceLocator {
    /// Path of the resource below its service endpoint, starting with `/`
    pub fn canonical_path(&self) -> String {
        match self {
            ResourceLocator::File { share, path } => format!("/{}/{}", share, path),
            ResourceLocator::Blob { container, blob } => format!("/{}/{}", container, blob),
        }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_path().trim_start_matches('/'))
    }
}

/// Credentials and endpoints of a storage account
#[derive(Clone)]
pub struct StorageAccount {
    name: String,
    key: Vec<u8>,
    file_endpoint: Url,
    blob_endpoint: Url,
}

impl fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("key", &"<redacted>")
            .field("file_endpoint", &self.file_endpoint.as_str())
            .field("blob_endpoint", &self.blob_endpoint.as_str())
            .finish()
    }
}

impl StorageAccount {
    /// Parses an account connection string
    ///
    /// Fails with `ConnectionConfiguration` when the string is empty,
    /// malformed, lacks `AccountName`/`AccountKey`, or carries a key that is
    /// not valid base64.
    pub fn parse(connection_string: &str) -> Result<Self> {
        let settings = parse_settings(connection_string)?;

        let name = required(&settings, "AccountName")?;
        let key = required(&settings, "AccountKey")?;
        let protocol = settings
            .get("DefaultEndpointsProtocol")
            .map(String::as_str)
            .unwrap_or(DEFAULT_PROTOCOL);
        let suffix = settings
            .get("EndpointSuffix")
            .map(String::as_str)
            .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);

        let file_endpoint = match settings.get("FileEndpoint") {
            Some(endpoint) => endpoint.clone(),
            None => format!("{}://{}.file.{}", protocol, name, suffix),
        };
        let blob_endpoint = match settings.get("BlobEndpoint") {
            Some(endpoint) => endpoint.clone(),
            None => format!("{}://{}.blob.{}", protocol, name, suffix),
        };

        Self::new(name, key, &file_endpoint, &blob_endpoint)
    }

    /// Creates an account from its parts
    ///
    /// `key` is the base64-encoded account key.
    pub fn new(name: &str, key: &str, file_endpoint: &str, blob_endpoint: &str) -> Result<Self> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
            return Err(FileShareError::ConnectionConfiguration(format!(
                "Invalid account name: {:?}",
                name
            )));
        }

        let key = BASE64.decode(key).map_err(|e| {
            FileShareError::ConnectionConfiguration(format!("Account key is not valid base64: {}", e))
        })?;
        if key.is_empty() {
            return Err(FileShareError::ConnectionConfiguration(
                "Account key is empty".to_string(),
            ));
        }

        Ok(Self {
            name: name.to_string(),
            key,
            file_endpoint: parse_endpoint(file_endpoint)?,
            blob_endpoint: parse_endpoint(blob_endpoint)?,
        })
    }

    /// Name of the account
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded account key used for signing
    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }

    /// Base URI of the file service
    pub fn file_endpoint(&self) -> &Url {
        &self.file_endpoint
    }

    /// Base URI of the blob service
    pub fn blob_endpoint(&self) -> &Url {
        &self.blob_endpoint
    }

    /// URI of a share, directory or file
    pub fn file_uri(&self, share: &str, path: &str) -> Result<Url> {
        let mut segments = vec![share.to_string()];
        segments.extend(split_path(path)?);
        append_segments(&self.file_endpoint, &segments)
    }

    /// URI of a blob
    pub fn blob_uri(&self, container: &str, blob: &str) -> Result<Url> {
        validate_blob_name(blob)?;
        let mut segments = vec![container.to_string()];
        segments.extend(blob.split('/').map(str::to_string));
        append_segments(&self.blob_endpoint, &segments)
    }

    /// Maps a service URI back to the file or blob it addresses
    ///
    /// Returns None when the URI belongs to neither endpoint of this account
    /// or does not name a file/blob.
    pub fn resolve(&self, uri: &Url) -> Option<ResourceLocator> {
        if let Some(segments) = strip_endpoint(&self.file_endpoint, uri) {
            let (share, path) = segments.split_first()?;
            if path.is_empty() {
                return None;
            }
            return Some(ResourceLocator::File {
                share: share.clone(),
                path: path.join("/"),
            });
        }

        if let Some(segments) = strip_endpoint(&self.blob_endpoint, uri) {
            let (container, blob) = segments.split_first()?;
            if blob.is_empty() {
                return None;
            }
            return Some(ResourceLocator::Blob {
                container: container.clone(),
                blob: blob.join("/"),
            });
        }

        None
    }
}

/// Splits a connection string into its settings
fn parse_settings(connection_string: &str) -> Result<HashMap<String, String>> {
    if connection_string.trim().is_empty() {
        return Err(FileShareError::ConnectionConfiguration(
            "Connection string is empty".to_string(),
        ));
    }

    let mut settings = HashMap::new();
    for pair in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            FileShareError::ConnectionConfiguration(format!("Malformed setting: {:?}", pair))
        })?;
        if key.is_empty() {
            return Err(FileShareError::ConnectionConfiguration(format!(
                "Malformed setting: {:?}",
                pair
            )));
        }
        settings.insert(key.trim().to_string(), value.trim().to_string());
    }

    Ok(settings)
}

fn required<'a>(settings: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    settings
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| FileShareError::ConnectionConfiguration(format!("{} is required", key)))
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint).map_err(|e| {
        FileShareError::ConnectionConfiguration(format!("Invalid endpoint {:?}: {}", endpoint, e))
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(FileShareError::ConnectionConfiguration(format!(
            "Endpoint must be an http(s) URI: {:?}",
            endpoint
        )));
    }
    Ok(url)
}

fn append_segments(endpoint: &Url, segments: &[String]) -> Result<Url> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| {
            FileShareError::ConnectionConfiguration(format!("Endpoint cannot be a base: {}", endpoint))
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Returns the decoded path segments of `uri` below `endpoint`
fn strip_endpoint(endpoint: &Url, uri: &Url) -> Option<Vec<String>> {
    if endpoint.scheme() != uri.scheme()
        || endpoint.host_str() != uri.host_str()
        || endpoint.port_or_known_default() != uri.port_or_known_default()
    {
        return None;
    }

    let base: Vec<&str> = endpoint.path_segments()?.filter(|s| !s.is_empty()).collect();
    let mut segments = uri.path_segments()?.filter(|s| !s.is_empty());
    for expected in base {
        if segments.next()? != expected {
            return None;
        }
    }

    segments
        .map(|s| percent_decode_str(s).decode_utf8().ok().map(|s| s.into_owned()))
        .collect()
}
