//! Asset Counter Library
//!
//! Counts the billable assets of an AWS account or a whole AWS Organization for CSPM
//! license estimation: running EC2 instances, RDS instances, Lambda functions and EKS
//! worker nodes, across every enabled region.
//!
//! ## Architecture Overview
//!
//! - [`models`] - Resources, classifications, billable counts and the run result
//! - [`classify`] - Exclusion and weighting rules ([`classify::BillingRules`])
//! - [`cloud`] - The [`cloud::CloudApi`] seam and its AWS implementation
//! - [`session`] - Cross-account session broker for organization scans
//! - [`scanner`] - Counters, region aggregation and organization aggregation
//! - [`display`] - Progress lines and the final summary (text or JSON)
//! - [`config`] - Configuration management with environment variable support
//! - [`logging`] - Structured logging with JSON and pretty-print formats
//!
//! ## Main Entry Point
//!
//! ```rust,no_run
//! use asset_counter::cloud::aws::AwsClient;
//! use asset_counter::config::Config;
//! use asset_counter::display::{Progress, ProgressTarget, ReportDisplayManager};
//! use asset_counter::AssetScanner;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let api = AwsClient::from_ambient(&config.aws).await?;
//! let scanner = AssetScanner::from_config(&config, Progress::new(ProgressTarget::Stdout));
//!
//! let result = scanner.run_single_account(&api).await?;
//! ReportDisplayManager::new().display(&result, false);
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod cloud;
pub mod config;
pub mod display;
pub mod logging;
pub mod models;
pub mod scanner;
pub mod session;

pub use models::*;
pub use scanner::{AssetScanner, ScanMode};
