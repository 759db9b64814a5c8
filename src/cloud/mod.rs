//! Cloud API abstractions.
//!
//! The scanner only talks to the cloud through [`CloudApi`], one value per
//! authenticated session. [`aws::AwsClient`] is the production implementation.

pub mod aws;

use crate::models::{
    AccountId, ComputeInstance, DatabaseInstance, FunctionInfo, FunctionTags, Region,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while calling a cloud API.
#[derive(Error, Debug)]
pub enum CloudApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("{service} API error ({status}) {code}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        code: String,
        message: String,
    },

    /// Request was denied or the credentials were rejected.
    #[error("Authorization error: {0}")]
    Auth(String),

    /// Response body could not be decoded.
    #[error("Failed to parse {service} response: {message}")]
    Parse {
        service: &'static str,
        message: String,
    },

    /// No usable credentials.
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Request could not be signed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Items from a paginated listing.
///
/// `truncated` is set when the page cap was reached before the listing ended.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub truncated: bool,
}

impl<T> Listing<T> {
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            truncated: false,
        }
    }
}

/// One authenticated view of a cloud account.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Regions enabled for the account, asked through `bootstrap`.
    async fn enabled_regions(&self, bootstrap: &Region) -> Result<Vec<Region>, CloudApiError>;

    /// Instances in the `running` state.
    async fn running_instances(
        &self,
        region: &Region,
    ) -> Result<Listing<ComputeInstance>, CloudApiError>;

    async fn database_instances(
        &self,
        region: &Region,
    ) -> Result<Listing<DatabaseInstance>, CloudApiError>;

    async fn functions(&self, region: &Region) -> Result<Listing<FunctionInfo>, CloudApiError>;

    async fn function_tags(
        &self,
        region: &Region,
        function: &FunctionInfo,
    ) -> Result<FunctionTags, CloudApiError>;

    /// Account-wide function count metric for the region.
    async fn function_count(&self, region: &Region) -> Result<u64, CloudApiError>;

    /// Member accounts of the caller's organization.
    async fn organization_accounts(&self) -> Result<Listing<AccountId>, CloudApiError>;

    async fn caller_account(&self) -> Result<AccountId, CloudApiError>;

    /// Assume `role_arn` and return a session bound to the temporary credentials.
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration: Duration,
    ) -> Result<Arc<dyn CloudApi>, CloudApiError>;
}
