//! Core Data Models
//!
//! This module defines the data structures that flow through the asset counting
//! pipeline, from raw resources returned by the cloud APIs to the final run result.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`ComputeInstance`], [`DatabaseInstance`], [`FunctionInfo`] - resources
//!    as listed for one region
//! 2. **Classification**: [`Classification`] - the billing outcome of one resource
//! 3. **Aggregation**: [`BillableCounts`] - folded per region, per account, per organization
//! 4. **Output**: [`RunResult`] - weighted totals, the [`ScanOutcome`] and any
//!    [`TruncatedListing`]s

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::AddAssign;

/// A region identifier such as `eu-west-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 12-digit account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A running compute instance.
#[derive(Debug, Clone)]
pub struct ComputeInstance {
    pub instance_id: String,
    pub instance_type: String,
    pub tags: Vec<Tag>,
}

/// A managed database instance.
#[derive(Debug, Clone)]
pub struct DatabaseInstance {
    pub identifier: String,
    pub instance_class: String,
}

/// A serverless function. Tags are fetched separately by ARN.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub arn: String,
}

pub type FunctionTags = HashMap<String, String>;

/// Billing outcome for a single observed resource. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Billable,
    Excluded,
    OrchestrationNode,
}

/// How serverless functions are turned into billable units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ServerlessPolicy {
    /// List every function and skip the ones owned by the platform's own tooling.
    /// The raw count is divided once, over the whole run, by the reporter.
    #[default]
    Direct,
    /// Read the per-region function count metric; the ratio is applied per account.
    Usage,
}

impl fmt::Display for ServerlessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Usage => write!(f, "usage"),
        }
    }
}

impl std::str::FromStr for ServerlessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "usage" => Ok(Self::Usage),
            other => Err(format!("unknown serverless mode '{other}' (expected direct or usage)")),
        }
    }
}

/// Result of the compute counter for one region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeTally {
    pub billable: u64,
    pub excluded: u64,
    pub nodes: u64,
}

impl ComputeTally {
    pub fn record(&mut self, classification: Classification) {
        match classification {
            Classification::Billable => self.billable += 1,
            Classification::Excluded => self.excluded += 1,
            Classification::OrchestrationNode => self.nodes += 1,
        }
    }

    pub fn observed(&self) -> u64 {
        self.billable + self.excluded + self.nodes
    }
}

/// Billable counts accumulated per region, per account and per organization.
///
/// Folding only ever adds, so every field is non-decreasing while a scan runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillableCounts {
    pub compute: u64,
    pub database: u64,
    pub serverless_raw: u64,
    pub orchestration_nodes: u64,
    /// Serverless billable units already derived per account (usage policy only).
    pub serverless_units: u64,
}

impl AddAssign for BillableCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.compute += rhs.compute;
        self.database += rhs.database;
        self.serverless_raw += rhs.serverless_raw;
        self.orchestration_nodes += rhs.orchestration_nodes;
        self.serverless_units += rhs.serverless_units;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The cross-account role could not be assumed.
    AssumeRole,
    /// A listing call failed while the account was being scanned.
    Scan,
}

/// An account that did not contribute to the totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountFailure {
    pub account_id: AccountId,
    pub kind: FailureKind,
    pub reason: String,
}

/// Whether every account in scope contributed to the totals.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    #[default]
    Complete,
    Partial { failures: Vec<AccountFailure> },
}

impl ScanOutcome {
    pub fn from_failures(failures: Vec<AccountFailure>) -> Self {
        if failures.is_empty() {
            Self::Complete
        } else {
            Self::Partial { failures }
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }

    pub fn failures(&self) -> &[AccountFailure] {
        match self {
            Self::Complete => &[],
            Self::Partial { failures } => failures,
        }
    }
}

/// A listing that stopped at the page cap, so its totals may be low.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncatedListing {
    pub listing: String,
    /// `None` for listings made with the caller's own credentials outside an account scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    /// `None` for global listings (organization accounts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

impl fmt::Display for TruncatedListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.listing)?;
        if let Some(region) = &self.region {
            write!(f, " in {region}")?;
        }
        if let Some(account) = &self.account_id {
            write!(f, " (account {account})")?;
        }
        Ok(())
    }
}

/// Final, weighted result of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub counts: BillableCounts,
    pub policy: ServerlessPolicy,
    pub serverless_units: u64,
    pub weighted_nodes: u64,
    pub grand_total: u64,
    pub outcome: ScanOutcome,
    pub truncated_listings: Vec<TruncatedListing>,
}
