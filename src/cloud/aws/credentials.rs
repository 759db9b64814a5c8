//! Credential resolution.
//!
//! The caller's own credentials come from the standard AWS provider chain: environment
//! variables, `~/.aws/credentials` and `~/.aws/config` profiles (including
//! `role_arn`/`source_profile`, SSO and `credential_process`), web identity, container
//! credentials and instance metadata. Cross-account sessions are built from the
//! temporary keys returned by STS.

use crate::cloud::CloudApiError;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;
use std::time::SystemTime;
use tracing::debug;

pub use aws_credential_types::Credentials;

const ASSUMED_ROLE_PROVIDER: &str = "AssumeRole";

/// Resolve the caller's own credentials through the default provider chain.
///
/// `region` is only used by providers that call STS themselves (assume-role profiles,
/// web identity).
pub async fn ambient(region: &str) -> Result<Credentials, CloudApiError> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await;

    let provider = sdk_config.credentials_provider().ok_or_else(|| {
        CloudApiError::Credentials("no credentials provider is configured".to_string())
    })?;

    let credentials = provider
        .provide_credentials()
        .await
        .map_err(|e| CloudApiError::Credentials(error_chain(&e)))?;

    debug!(expiry = ?credentials.expiry(), "Resolved ambient credentials");
    Ok(credentials)
}

/// Temporary credentials returned by `AssumeRole`.
///
/// `expiration` is the RFC 3339 timestamp STS sends; an unparsable value leaves the
/// credentials without an expiry.
pub fn assumed(
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: Option<&str>,
) -> Credentials {
    let expiry = expiration
        .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
        .map(SystemTime::from);

    Credentials::new(
        access_key_id,
        secret_access_key,
        Some(session_token),
        expiry,
        ASSUMED_ROLE_PROVIDER,
    )
}

// The provider errors keep the useful detail in their sources.
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
