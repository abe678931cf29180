//! Shared Access Signatures
//!
//! A shared access signature is a time-bounded capability for one resource,
//! appended to the resource URI as query parameters:
//!
//! | Parameter | Meaning                                   |
//! |-----------|-------------------------------------------|
//! | `sv`      | signature version                         |
//! | `sr`      | resource kind, `f` (file) or `b` (blob)   |
//! | `sp`      | permissions in `rcwdl` order              |
//! | `st`      | optional start time (RFC 3339, UTC)       |
//! | `se`      | expiry time (RFC 3339, UTC)               |
//! | `sig`     | base64 HMAC-SHA256 over the string-to-sign |
//!
//! The string-to-sign is `sp\nst\nse\n/<service>/<account><path>\nsv`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use url::Url;

use crate::connection::{ResourceLocator, StorageAccount};
use crate::errors::{FileShareError, Result};
use crate::types::{SasPermissions, SharedAccessPolicy, SAS_VERSION};

type HmacSha256 = Hmac<Sha256>;

/// Names of the query parameters that make up a signature
const SAS_PARAMS: [&str; 6] = ["sv", "sr", "sp", "st", "se", "sig"];

fn resource_code(locator: &ResourceLocator) -> &'static str {
    match locator {
        ResourceLocator::File { .. } => "f",
        ResourceLocator::Blob { .. } => "b",
    }
}

fn service_name(locator: &ResourceLocator) -> &'static str {
    match locator {
        ResourceLocator::File { .. } => "file",
        ResourceLocator::Blob { .. } => "blob",
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|_| FileShareError::AuthenticationFailed(format!("Malformed signature time: {}", value)))
}

fn string_to_sign(
    account: &StorageAccount,
    locator: &ResourceLocator,
    permissions: &str,
    start: &str,
    expiry: &str,
    version: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n/{}/{}{}\n{}",
        permissions,
        start,
        expiry,
        service_name(locator),
        account.name(),
        locator.canonical_path(),
        version
    )
}

fn mac_for(account: &StorageAccount, message: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(account.key()).map_err(|e| {
        FileShareError::ConnectionConfiguration(format!("Unusable account key: {}", e))
    })?;
    mac.update(message.as_bytes());
    Ok(mac)
}

/// Issues a signature token for `locator` under `policy`
///
/// The returned token is a query string without the leading `?`.
pub fn generate_sas(
    account: &StorageAccount,
    locator: &ResourceLocator,
    policy: &SharedAccessPolicy,
) -> Result<String> {
    if policy.permissions.is_empty() {
        return Err(FileShareError::InvalidArgument(
            "Signature must grant at least one permission".to_string(),
        ));
    }

    let permissions = policy.permissions.to_permission_string();
    let start = policy.start.as_ref().map(format_time).unwrap_or_default();
    let expiry = format_time(&policy.expiry);

    let message = string_to_sign(account, locator, &permissions, &start, &expiry, SAS_VERSION);
    let signature = BASE64.encode(mac_for(account, &message)?.finalize().into_bytes());

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("sv", SAS_VERSION)
        .append_pair("sr", resource_code(locator))
        .append_pair("sp", &permissions);
    if !start.is_empty() {
        query.append_pair("st", &start);
    }
    query.append_pair("se", &expiry).append_pair("sig", &signature);

    Ok(query.finish())
}

/// Returns the resource URI with a signature token attached
pub fn sign_uri(
    account: &StorageAccount,
    locator: &ResourceLocator,
    policy: &SharedAccessPolicy,
) -> Result<Url> {
    let mut uri = match locator {
        ResourceLocator::File { share, path } => account.file_uri(share, path)?,
        ResourceLocator::Blob { container, blob } => account.blob_uri(container, blob)?,
    };
    uri.set_query(Some(&generate_sas(account, locator, policy)?));
    Ok(uri)
}

/// Checks the signature carried by `uri` at time `now`
///
/// On success returns the resource the signature was issued for and the
/// permissions it grants. Fails with `AuthenticationFailed` when the token
/// is missing, malformed, tampered with, issued for another resource, not
/// yet valid or expired.
pub fn verify_sas(
    account: &StorageAccount,
    uri: &Url,
    now: DateTime<Utc>,
) -> Result<(ResourceLocator, SasPermissions)> {
    let locator = account.resolve(uri).ok_or_else(|| {
        FileShareError::AuthenticationFailed(format!("{} is not a resource of account {}", strip_sas(uri), account.name()))
    })?;

    let params: HashMap<String, String> = uri.query_pairs().into_owned().collect();
    let param = |name: &str| {
        params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| FileShareError::AuthenticationFailed(format!("Signature parameter {} missing", name)))
    };

    let version = param("sv")?;
    let resource = param("sr")?;
    let permissions = param("sp")?;
    let expiry = param("se")?;
    let signature = param("sig")?;
    let start = params.get("st").map(String::as_str).unwrap_or("");

    if resource != resource_code(&locator) {
        return Err(FileShareError::AuthenticationFailed(format!(
            "Signature resource kind {} does not match {}",
            resource, locator
        )));
    }

    let granted = SasPermissions::from_permission_string(permissions).ok_or_else(|| {
        FileShareError::AuthenticationFailed(format!("Unknown signature permissions: {}", permissions))
    })?;

    let signature = BASE64
        .decode(signature)
        .map_err(|_| FileShareError::AuthenticationFailed("Signature is not valid base64".to_string()))?;
    let message = string_to_sign(account, &locator, permissions, start, expiry, version);
    mac_for(account, &message)?
        .verify_slice(&signature)
        .map_err(|_| FileShareError::AuthenticationFailed(format!("Signature mismatch for {}", locator)))?;

    if !start.is_empty() && parse_time(start)? > now {
        return Err(FileShareError::AuthenticationFailed(format!(
            "Signature for {} is not valid before {}",
            locator, start
        )));
    }
    if parse_time(expiry)? <= now {
        return Err(FileShareError::AuthenticationFailed(format!(
            "Signature for {} expired at {}",
            locator, expiry
        )));
    }

    Ok((locator, granted))
}

/// Renders `uri` without its signature parameters
pub fn strip_sas(uri: &Url) -> String {
    let mut stripped = uri.clone();
    let kept: Vec<(String, String)> = uri
        .query_pairs()
        .filter(|(name, _)| !SAS_PARAMS.iter().any(|param| name == param))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped.to_string()
}
