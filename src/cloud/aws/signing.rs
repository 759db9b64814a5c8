//! SigV4 request signing through `aws-sigv4`.

use crate::cloud::CloudApiError;
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SigningParams, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use std::time::SystemTime;

/// A fully built request, before authentication headers are added.
#[derive(Debug)]
pub struct OutgoingRequest<'a> {
    pub method: &'a str,
    /// Absolute URL with the path and query already percent-encoded.
    pub url: &'a str,
    /// Headers that must be covered by the signature besides `host`.
    pub headers: &'a [(&'a str, String)],
    pub payload: &'a [u8],
}

/// Headers (`authorization`, `x-amz-date` and, for temporary credentials,
/// `x-amz-security-token`) that authenticate `request`.
pub fn auth_headers(
    request: &OutgoingRequest<'_>,
    credentials: &Credentials,
    region: &str,
    service: &str,
    time: SystemTime,
) -> Result<Vec<(&'static str, String)>, CloudApiError> {
    let identity: Identity = credentials.clone().into();
    let params: SigningParams<'_> = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name(service)
        .time(time)
        .settings(SigningSettings::default())
        .build()
        .map_err(|e| CloudApiError::Signing(e.to_string()))?
        .into();

    let signable = SignableRequest::new(
        request.method,
        request.url,
        request
            .headers
            .iter()
            .map(|(name, value)| (*name, value.as_str())),
        SignableBody::Bytes(request.payload),
    )
    .map_err(|e| CloudApiError::Signing(e.to_string()))?;

    let (instructions, _signature) = sign(signable, &params)
        .map_err(|e| CloudApiError::Signing(e.to_string()))?
        .into_parts();
    let (headers, _query) = instructions.into_parts();

    Ok(headers
        .into_iter()
        .map(|header| (header.name(), header.value().to_string()))
        .collect())
}

/// Query string with every key and value percent-encoded, in the canonical order.
pub fn encode_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
pub fn uri_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
