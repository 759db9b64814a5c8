//! Asset Scanning Engine
//!
//! Orchestrates the whole counting pipeline:
//!
//! 1. **Region enumeration**: one `describe regions` call through the bootstrap region,
//!    done once per run with the caller's own credentials
//! 2. **Resource counters**: compute, database and serverless listings for one region,
//!    classified by [`BillingRules`]
//! 3. **Region aggregation**: counters run region after region and are folded into the
//!    account's [`BillableCounts`]
//! 4. **Organization aggregation**: accounts are opened through the [`SessionBroker`]
//!    one at a time and folded into the organization total
//!
//! Everything is sequential: each API call completes before the next one is issued.
//! A failing call aborts the account it belongs to. In single-account mode that aborts
//! the run; in organization mode the account is recorded in the [`ScanOutcome`] and
//! the remaining accounts are still counted.

use crate::classify::BillingRules;
use crate::cloud::{CloudApi, CloudApiError, Listing};
use crate::config::Config;
use crate::display::Progress;
use crate::models::{
    AccountFailure, AccountId, BillableCounts, Classification, ComputeTally, FailureKind, Region,
    RunResult, ScanOutcome, ServerlessPolicy, TruncatedListing,
};
use crate::session::SessionBroker;
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, info_span, warn, Instrument};

/// Which accounts a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    SingleAccount,
    Organization { role_name: String },
}

impl ScanMode {
    /// Resolve the CLI flags. A role name on its own implies organization mode.
    pub fn from_flags(org_mode: bool, role_name: Option<String>, default_role: &str) -> Self {
        match (org_mode, role_name) {
            (_, Some(role_name)) => Self::Organization { role_name },
            (true, None) => Self::Organization {
                role_name: default_role.to_string(),
            },
            (false, None) => Self::SingleAccount,
        }
    }
}

pub struct AssetScanner {
    rules: BillingRules,
    bootstrap: Region,
    policy: ServerlessPolicy,
    progress: Progress,
    /// Listings cut short during the current run.
    truncated: Mutex<Vec<TruncatedListing>>,
}

impl AssetScanner {
    pub fn new(
        rules: BillingRules,
        bootstrap: Region,
        policy: ServerlessPolicy,
        progress: Progress,
    ) -> Self {
        Self {
            rules,
            bootstrap,
            policy,
            progress,
            truncated: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &Config, progress: Progress) -> Self {
        Self::new(
            BillingRules::from_config(&config.billing),
            Region::new(config.aws.bootstrap_region.clone()),
            config.billing.serverless_policy,
            progress,
        )
    }

    pub async fn enabled_regions(&self, api: &dyn CloudApi) -> Result<Vec<Region>, CloudApiError> {
        let regions = api.enabled_regions(&self.bootstrap).await?;
        info!(bootstrap = %self.bootstrap, regions = regions.len(), "Enumerated regions");
        Ok(regions)
    }

    /// Classify the running instances of one region.
    pub async fn count_compute(
        &self,
        api: &dyn CloudApi,
        region: &Region,
    ) -> Result<ComputeTally, CloudApiError> {
        let listing = api.running_instances(region).await?;
        self.note_truncation(&listing, "EC2 instance", region);

        let mut tally = ComputeTally::default();
        for instance in &listing.items {
            let classification = self.rules.classify_instance(instance);
            debug!(
                instance = %instance.instance_id,
                instance_type = %instance.instance_type,
                ?classification,
                "Classified instance"
            );
            tally.record(classification);
        }
        Ok(tally)
    }

    pub async fn count_databases(
        &self,
        api: &dyn CloudApi,
        region: &Region,
    ) -> Result<u64, CloudApiError> {
        let listing = api.database_instances(region).await?;
        self.note_truncation(&listing, "RDS instance", region);

        Ok(listing
            .items
            .iter()
            .filter(|db| self.rules.classify_database(db) == Classification::Billable)
            .count() as u64)
    }

    /// Raw serverless count for one region under the configured policy.
    pub async fn count_serverless(
        &self,
        api: &dyn CloudApi,
        region: &Region,
    ) -> Result<u64, CloudApiError> {
        match self.policy {
            ServerlessPolicy::Usage => api.function_count(region).await,
            ServerlessPolicy::Direct => {
                let listing = api.functions(region).await?;
                self.note_truncation(&listing, "Lambda function", region);

                let mut billable = 0;
                for function in &listing.items {
                    let tags = api.function_tags(region, function).await?;
                    if self.rules.classify_function(&tags) == Classification::Billable {
                        billable += 1;
                    } else {
                        debug!(function = %function.name, "Skipping platform-owned function");
                    }
                }
                Ok(billable)
            }
        }
    }

    /// Run every counter for one region.
    pub async fn scan_region(
        &self,
        api: &dyn CloudApi,
        region: &Region,
    ) -> Result<BillableCounts, CloudApiError> {
        let compute = self.count_compute(api, region).await?;
        let serverless_raw = self.count_serverless(api, region).await?;
        let database = self.count_databases(api, region).await?;

        debug!(
            region = %region,
            compute = compute.billable,
            excluded = compute.excluded,
            nodes = compute.nodes,
            database,
            serverless_raw,
            "Region counted"
        );

        Ok(BillableCounts {
            compute: compute.billable,
            database,
            serverless_raw,
            orchestration_nodes: compute.nodes,
            serverless_units: 0,
        })
    }

    /// Fold every region of one account. Any failure discards the account's counts.
    pub async fn scan_account(
        &self,
        api: &dyn CloudApi,
        regions: &[Region],
    ) -> Result<BillableCounts, CloudApiError> {
        let mut totals = BillableCounts::default();

        for region in regions {
            self.progress.info(format!("Checking region {region}"));
            totals += self.scan_region(api, region).await?;
        }

        if self.policy == ServerlessPolicy::Usage {
            totals.serverless_units = self.rules.serverless_units(totals.serverless_raw);
        }

        Ok(totals)
    }

    /// Count the caller's own account.
    pub async fn run_single_account(&self, api: &dyn CloudApi) -> Result<RunResult> {
        self.truncations().clear();
        let regions = self
            .enabled_regions(api)
            .await
            .context("Failed to enumerate regions")?;
        let totals = self
            .scan_account(api, &regions)
            .await
            .context("Failed to count assets")?;

        let mut result = self.rules.finalize(totals, self.policy, ScanOutcome::Complete);
        result.truncated_listings = self.take_truncated();
        Ok(result)
    }

    /// Count every member account of the caller's organization.
    pub async fn run_organization(
        &self,
        ambient: Arc<dyn CloudApi>,
        broker: &SessionBroker,
    ) -> Result<RunResult> {
        self.truncations().clear();
        let listing = broker.member_accounts(&self.progress).await?;
        if listing.truncated {
            self.record_truncated(TruncatedListing {
                listing: "organization account".to_string(),
                account_id: None,
                region: None,
            });
        }
        let accounts = listing.items;
        let caller = broker.caller_account().await?;
        let regions = self
            .enabled_regions(ambient.as_ref())
            .await
            .context("Failed to enumerate regions")?;

        let mut org_totals = BillableCounts::default();
        let mut failures = Vec::new();

        for account in &accounts {
            let session = match broker.open(account, &caller, &self.progress).await {
                Ok(session) => session,
                Err(failure) => {
                    failures.push(failure);
                    continue;
                }
            };

            let seen_truncations = self.truncated_len();
            let span = info_span!("account", account = %session.account_id, assumed = session.assumed);
            match self
                .scan_account(session.api.as_ref(), &regions)
                .instrument(span)
                .await
            {
                Ok(totals) => {
                    org_totals += totals;
                    self.attribute_truncated(seen_truncations, account);
                }
                Err(e) => {
                    self.discard_truncated(seen_truncations);
                    warn!(account = %account, error = %e, "Account scan failed, discarding its counts");
                    self.progress
                        .error(format!("Counting failed in account {account}: {e}"));
                    failures.push(AccountFailure {
                        account_id: account.clone(),
                        kind: FailureKind::Scan,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            accounts = accounts.len(),
            failed = failures.len(),
            "Organization scan finished"
        );

        let mut result =
            self.rules
                .finalize(org_totals, self.policy, ScanOutcome::from_failures(failures));
        result.truncated_listings = self.take_truncated();
        Ok(result)
    }

    fn note_truncation<T>(&self, listing: &Listing<T>, what: &str, region: &Region) {
        if listing.truncated {
            self.progress.warn(format!(
                "{what} listing in {region} was truncated; counts may be low"
            ));
            self.record_truncated(TruncatedListing {
                listing: what.to_string(),
                account_id: None,
                region: Some(region.clone()),
            });
        }
    }

    fn truncations(&self) -> MutexGuard<'_, Vec<TruncatedListing>> {
        self.truncated.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_truncated(&self, entry: TruncatedListing) {
        self.truncations().push(entry);
    }

    fn truncated_len(&self) -> usize {
        self.truncations().len()
    }

    /// Tag the entries recorded since `from` with the account they were listed in.
    fn attribute_truncated(&self, from: usize, account: &AccountId) {
        for entry in self.truncations().iter_mut().skip(from) {
            entry.account_id = Some(account.clone());
        }
    }

    /// Drop entries of an account whose counts were discarded.
    fn discard_truncated(&self, from: usize) {
        self.truncations().truncate(from);
    }

    fn take_truncated(&self) -> Vec<TruncatedListing> {
        std::mem::take(&mut *self.truncations())
    }
}
