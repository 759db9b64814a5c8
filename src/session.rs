//! Cross-account session broker.
//!
//! Lists the organization's member accounts and hands out one authenticated session per
//! account: the caller's own account keeps the ambient credentials, every other account
//! is entered by assuming the cross-account role. Sessions are opened one at a time,
//! right before the account is scanned, so temporary credentials do not run out while
//! earlier accounts are still being counted.

use crate::cloud::aws::role_arn;
use crate::cloud::{CloudApi, Listing};
use crate::config::AwsConfig;
use crate::display::Progress;
use crate::models::{AccountFailure, AccountId, FailureKind};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// An authenticated view of one member account.
pub struct AccountSession {
    pub account_id: AccountId,
    pub api: Arc<dyn CloudApi>,
    /// False when the session reuses the caller's ambient credentials.
    pub assumed: bool,
}

pub struct SessionBroker {
    ambient: Arc<dyn CloudApi>,
    partition: String,
    role_name: String,
    session_name: String,
    duration: Duration,
}

impl SessionBroker {
    pub fn new(ambient: Arc<dyn CloudApi>, config: &AwsConfig, role_name: impl Into<String>) -> Self {
        Self {
            ambient,
            partition: config.partition.clone(),
            role_name: role_name.into(),
            session_name: config.role_session_name.clone(),
            duration: Duration::from_secs(config.session_duration_secs),
        }
    }

    /// Member accounts of the caller's organization.
    pub async fn member_accounts(&self, progress: &Progress) -> Result<Listing<AccountId>> {
        let listing = self
            .ambient
            .organization_accounts()
            .await
            .context("Failed to list organization accounts")?;

        if listing.truncated {
            progress.warn("Organization account listing was truncated; some accounts are not scanned");
        }
        info!(accounts = listing.items.len(), "Listed organization accounts");
        Ok(listing)
    }

    pub async fn caller_account(&self) -> Result<AccountId> {
        self.ambient
            .caller_account()
            .await
            .context("Failed to resolve the caller's account id")
    }

    /// Open a session for `account`.
    ///
    /// A failed role assumption is returned as an [`AccountFailure`] so the caller can skip
    /// the account and carry on with the rest of the organization.
    pub async fn open(
        &self,
        account: &AccountId,
        caller: &AccountId,
        progress: &Progress,
    ) -> Result<AccountSession, AccountFailure> {
        if account == caller {
            progress.info(format!("Checking account: {account} (current account)"));
            return Ok(AccountSession {
                account_id: account.clone(),
                api: Arc::clone(&self.ambient),
                assumed: false,
            });
        }

        let arn = role_arn(&self.partition, account.as_str(), &self.role_name);
        progress.info(format!("Checking account: {account}"));
        progress.info(format!("Using role {arn} for STS Assume Role"));

        match self
            .ambient
            .assume_role(&arn, &self.session_name, self.duration)
            .await
        {
            Ok(api) => {
                info!(account = %account, role_arn = %arn, "Assumed cross-account role");
                Ok(AccountSession {
                    account_id: account.clone(),
                    api,
                    assumed: true,
                })
            }
            Err(e) => {
                warn!(account = %account, role_arn = %arn, error = %e, "Role assumption failed");
                progress.error(format!("Could not assume into account {account}"));
                progress.error(format!("Message: {e}"));
                Err(AccountFailure {
                    account_id: account.clone(),
                    kind: FailureKind::AssumeRole,
                    reason: e.to_string(),
                })
            }
        }
    }
}
