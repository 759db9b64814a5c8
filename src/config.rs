//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults matching the billing rules
//! - Validation and type safety

use crate::models::ServerlessPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Cloud access configuration
    pub aws: AwsConfig,

    /// Classification and weighting rules
    pub billing: BillingConfig,

    /// Paths configuration
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Region used to enumerate the enabled regions.
    pub bootstrap_region: String,
    pub partition: String,
    pub default_role_name: String,
    pub role_session_name: String,
    pub session_duration_secs: u64,
    /// Sends every service call to this endpoint instead of the public one.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    pub request_timeout_secs: u64,
    /// Upper bound on pages fetched per listing call.
    pub max_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub serverless_policy: ServerlessPolicy,
    pub excluded_size_markers: Vec<String>,
    pub node_tag_key: String,
    pub reserved_owner_tag_key: String,
    pub reserved_owner_tag_value: String,
    pub node_multiplier: u64,
    pub serverless_divisor: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub log_directory: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "WARN".to_string(),
                format: "pretty".to_string(),
                output: "console".to_string(),
            },
            aws: AwsConfig {
                bootstrap_region: "eu-west-1".to_string(),
                partition: "aws".to_string(),
                default_role_name: "OrganizationAccountAccessRole".to_string(),
                role_session_name: "CloudGuard_AssetCounter".to_string(),
                session_duration_secs: 1800,
                endpoint_url: None,
                request_timeout_secs: 30,
                max_pages: 100,
            },
            billing: BillingConfig {
                serverless_policy: ServerlessPolicy::Direct,
                excluded_size_markers: vec!["nano".to_string(), "micro".to_string()],
                node_tag_key: "eks:cluster-name".to_string(),
                reserved_owner_tag_key: "Owner".to_string(),
                reserved_owner_tag_value: "Cloudguard Serverless Security".to_string(),
                node_multiplier: 3,
                serverless_divisor: 60,
            },
            paths: PathsConfig {
                log_directory: dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("asset-counter")
                    .join("logs"),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let config_paths = [
            PathBuf::from("asset-counter.toml"),
            PathBuf::from(".asset-counter.toml"),
            dirs::config_dir()
                .map(|d| d.join("asset-counter").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Cloud overrides
        if let Ok(val) = env::var("ASSET_COUNTER_BOOTSTRAP_REGION") {
            self.aws.bootstrap_region = val;
        }
        if let Ok(val) = env::var("ASSET_COUNTER_PARTITION") {
            self.aws.partition = val;
        }
        if let Ok(val) = env::var("ASSET_COUNTER_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(val).filter(|v| !v.is_empty());
        }
        if let Ok(val) = env::var("ASSET_COUNTER_REQUEST_TIMEOUT_SECS") {
            self.aws.request_timeout_secs = val
                .parse()
                .context("Invalid ASSET_COUNTER_REQUEST_TIMEOUT_SECS")?;
        }
        if let Ok(val) = env::var("ASSET_COUNTER_MAX_PAGES") {
            self.aws.max_pages = val.parse().context("Invalid ASSET_COUNTER_MAX_PAGES")?;
        }

        // Billing overrides
        if let Ok(val) = env::var("ASSET_COUNTER_SERVERLESS_MODE") {
            self.billing.serverless_policy = val
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid ASSET_COUNTER_SERVERLESS_MODE")?;
        }

        // Path overrides
        if let Ok(val) = env::var("ASSET_COUNTER_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.aws.bootstrap_region.trim().is_empty() {
            return Err(anyhow::anyhow!("Bootstrap region must not be empty"));
        }

        if self.aws.default_role_name.trim().is_empty() {
            return Err(anyhow::anyhow!("Default role name must not be empty"));
        }

        // STS accepts 900 seconds up to the role's maximum session duration (12h cap)
        if !(900..=43_200).contains(&self.aws.session_duration_secs) {
            return Err(anyhow::anyhow!(
                "Session duration must be between 900 and 43200 seconds, got {}",
                self.aws.session_duration_secs
            ));
        }

        if self.aws.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Request timeout must be greater than 0"));
        }

        if self.aws.max_pages == 0 {
            return Err(anyhow::anyhow!("Max pages must be greater than 0"));
        }

        if self.billing.serverless_divisor == 0 {
            return Err(anyhow::anyhow!("Serverless divisor must be greater than 0"));
        }

        if self.billing.excluded_size_markers.iter().any(String::is_empty) {
            return Err(anyhow::anyhow!(
                "Excluded size markers must not contain an empty string"
            ));
        }

        if self.aws.max_pages == 1 {
            warn!("max_pages is 1, large listings will be reported as truncated");
        }

        if matches!(self.logging.output.as_str(), "file" | "both")
            && !self.paths.log_directory.exists()
        {
            fs::create_dir_all(&self.paths.log_directory)
                .context("Failed to create log directory")?;
        }

        Ok(())
    }
}
