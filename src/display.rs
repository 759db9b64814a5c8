//! Output Formatting and Display Management
//!
//! Handles everything the user sees on the terminal:
//!
//! - **Progress lines**: `[INFO]` / `[WARNING]` / `[ERROR]` lines emitted while accounts and
//!   regions are scanned ([`Progress`])
//! - **Summary report**: per-category totals and the weighted grand total
//!   ([`ReportDisplayManager`])
//! - **JSON output**: the whole [`RunResult`] serialized for programmatic consumption
//!
//! ### JSON Output
//! ```json
//! {
//!   "counts": {
//!     "compute": 10,
//!     "database": 5,
//!     "serverlessRaw": 121,
//!     "orchestrationNodes": 2,
//!     "serverlessUnits": 0
//!   },
//!   "policy": "direct",
//!   "serverlessUnits": 3,
//!   "weightedNodes": 6,
//!   "grandTotal": 24,
//!   "outcome": { "status": "complete" },
//!   "truncatedListings": []
//! }
//! ```

use crate::models::RunResult;
use colored::Colorize;
use std::fmt::Display;
use std::sync::{Arc, Mutex};

/// Where progress lines go.
#[derive(Debug, Clone)]
pub enum ProgressTarget {
    Stdout,
    /// Used with `--json` so stdout only carries the report.
    Stderr,
    Silent,
    /// Keeps the lines in memory.
    Capture(Arc<Mutex<Vec<String>>>),
}

#[derive(Debug, Clone)]
pub struct Progress {
    target: ProgressTarget,
}

impl Progress {
    pub fn new(target: ProgressTarget) -> Self {
        Self { target }
    }

    pub fn silent() -> Self {
        Self::new(ProgressTarget::Silent)
    }

    /// A progress sink that records lines instead of printing them, plus the buffer it
    /// writes to.
    pub fn capture() -> (Self, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        (Self::new(ProgressTarget::Capture(Arc::clone(&lines))), lines)
    }

    pub fn info(&self, message: impl Display) {
        self.emit(&format!("{} {message}", "[INFO]".bright_blue()));
    }

    pub fn warn(&self, message: impl Display) {
        self.emit(&format!("{} {message}", "[WARNING]".bright_yellow().bold()));
    }

    pub fn error(&self, message: impl Display) {
        self.emit(&format!("{} {message}", "[ERROR]".bright_red().bold()));
    }

    fn emit(&self, line: &str) {
        match &self.target {
            ProgressTarget::Stdout => println!("{line}"),
            ProgressTarget::Stderr => eprintln!("{line}"),
            ProgressTarget::Silent => {}
            ProgressTarget::Capture(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line.to_string());
                }
            }
        }
    }
}

pub struct ReportDisplayManager;

impl Default for ReportDisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportDisplayManager {
    pub fn new() -> Self {
        Self
    }

    pub fn display(&self, result: &RunResult, json_output: bool) {
        if json_output {
            match serde_json::to_string_pretty(result) {
                Ok(json_str) => println!("{json_str}"),
                Err(e) => eprintln!("Error serializing run result to JSON: {e}"),
            }
            return;
        }

        for line in self.summary_lines(result) {
            println!("{line}");
        }
    }

    /// Plain-text summary, one entry per printed line.
    pub fn summary_lines(&self, result: &RunResult) -> Vec<String> {
        let info = "[INFO]".bright_blue();
        let counts = &result.counts;

        let mut lines = vec![
            format!("{info} {}", "*** Asset count complete ***".bright_white().bold()),
            format!(
                "{info} Total EC2 instances (excluding micro and nano): {}",
                counts.compute
            ),
            format!("{info} Total RDS instances / databases: {}", counts.database),
            format!("{info} Total Lambda functions: {}", counts.serverless_raw),
            format!(
                "{info} Total EKS nodes: {} (weighted {})",
                counts.orchestration_nodes, result.weighted_nodes
            ),
            format!(
                "{info} Total billable assets (including above plus 60:1 Lambda, 1:3 EKS nodes): {}",
                result.grand_total.to_string().bright_green().bold()
            ),
        ];

        if result.outcome.is_partial() {
            let skipped: Vec<String> = result
                .outcome
                .failures()
                .iter()
                .map(|f| f.account_id.to_string())
                .collect();
            lines.push(format!(
                "{} Errors were encountered - please see above output. Results may not be accurate.",
                "[WARNING]".bright_yellow().bold()
            ));
            lines.push(format!(
                "{} Accounts not counted: {}",
                "[WARNING]".bright_yellow().bold(),
                skipped.join(", ")
            ));
        }

        if !result.truncated_listings.is_empty() {
            let truncated: Vec<String> = result
                .truncated_listings
                .iter()
                .map(ToString::to_string)
                .collect();
            lines.push(format!(
                "{} Listings cut short at the page limit, totals may be low: {}",
                "[WARNING]".bright_yellow().bold(),
                truncated.join(", ")
            ));
        }

        lines
    }
}
