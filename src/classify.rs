//! Billing classification rules.
//!
//! Decides, for every observed resource, whether it counts toward the bill, and turns
//! folded counts into the weighted grand total.
//!
//! Compute instances are classified by priority:
//!
//! 1. tagged as a member of a managed container cluster -> [`Classification::OrchestrationNode`]
//! 2. size class contains an exclusion marker -> [`Classification::Excluded`]
//! 3. everything else -> [`Classification::Billable`]
//!
//! Marker matching is case-sensitive substring containment, so `t3.nanox` is excluded
//! just like `t3.nano`.

use crate::config::BillingConfig;
use crate::models::{
    BillableCounts, Classification, ComputeInstance, DatabaseInstance, FunctionTags, RunResult,
    ScanOutcome, ServerlessPolicy,
};

#[derive(Debug, Clone)]
pub struct BillingRules {
    excluded_markers: Vec<String>,
    node_tag_key: String,
    reserved_owner_key: String,
    reserved_owner_value: String,
    node_multiplier: u64,
    serverless_divisor: u64,
}

impl Default for BillingRules {
    fn default() -> Self {
        Self::from_config(&crate::config::Config::default().billing)
    }
}

impl BillingRules {
    pub fn from_config(config: &BillingConfig) -> Self {
        Self {
            excluded_markers: config.excluded_size_markers.clone(),
            node_tag_key: config.node_tag_key.clone(),
            reserved_owner_key: config.reserved_owner_tag_key.clone(),
            reserved_owner_value: config.reserved_owner_tag_value.clone(),
            node_multiplier: config.node_multiplier,
            // a zero divisor from an unvalidated config counts every function
            serverless_divisor: config.serverless_divisor.max(1),
        }
    }

    /// True when the size class contains any exclusion marker.
    pub fn is_excluded_size(&self, size_class: &str) -> bool {
        self.excluded_markers
            .iter()
            .any(|marker| size_class.contains(marker.as_str()))
    }

    pub fn classify_instance(&self, instance: &ComputeInstance) -> Classification {
        if instance.tags.iter().any(|t| t.key == self.node_tag_key) {
            Classification::OrchestrationNode
        } else if self.is_excluded_size(&instance.instance_type) {
            Classification::Excluded
        } else {
            Classification::Billable
        }
    }

    pub fn classify_database(&self, database: &DatabaseInstance) -> Classification {
        if self.is_excluded_size(&database.instance_class) {
            Classification::Excluded
        } else {
            Classification::Billable
        }
    }

    pub fn classify_function(&self, tags: &FunctionTags) -> Classification {
        match tags.get(&self.reserved_owner_key) {
            Some(owner) if *owner == self.reserved_owner_value => Classification::Excluded,
            _ => Classification::Billable,
        }
    }

    /// Raw function count to billable units, rounding up.
    pub fn serverless_units(&self, raw: u64) -> u64 {
        raw.div_ceil(self.serverless_divisor)
    }

    pub fn weighted_nodes(&self, nodes: u64) -> u64 {
        nodes * self.node_multiplier
    }

    /// Apply the weights to the final counts.
    ///
    /// Under [`ServerlessPolicy::Usage`] the ratio was already applied per account, so the
    /// accumulated units are used as-is instead of dividing the raw count again.
    pub fn finalize(
        &self,
        counts: BillableCounts,
        policy: ServerlessPolicy,
        outcome: ScanOutcome,
    ) -> RunResult {
        let serverless_units = match policy {
            ServerlessPolicy::Direct => self.serverless_units(counts.serverless_raw),
            ServerlessPolicy::Usage => counts.serverless_units,
        };
        let weighted_nodes = self.weighted_nodes(counts.orchestration_nodes);
        let grand_total = counts.compute + counts.database + weighted_nodes + serverless_units;

        RunResult {
            counts,
            policy,
            serverless_units,
            weighted_nodes,
            grand_total,
            outcome,
            truncated_listings: Vec::new(),
        }
    }
}
