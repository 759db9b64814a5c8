#![allow(dead_code)]

use asset_counter::cloud::{CloudApi, CloudApiError, Listing};
use asset_counter::models::{
    AccountId, ComputeInstance, DatabaseInstance, FunctionInfo, FunctionTags, Region, Tag,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CALLER: &str = "111111111111";

pub fn instance(instance_type: &str) -> ComputeInstance {
    ComputeInstance {
        instance_id: format!("i-{instance_type}"),
        instance_type: instance_type.to_string(),
        tags: Vec::new(),
    }
}

pub fn node(instance_type: &str) -> ComputeInstance {
    ComputeInstance {
        tags: vec![Tag::new("eks:cluster-name", "prod")],
        ..instance(instance_type)
    }
}

pub fn database(instance_class: &str) -> DatabaseInstance {
    DatabaseInstance {
        identifier: format!("db-{instance_class}"),
        instance_class: instance_class.to_string(),
    }
}

pub fn function(name: &str, owner: Option<&str>) -> (FunctionInfo, FunctionTags) {
    let mut tags = FunctionTags::new();
    if let Some(owner) = owner {
        tags.insert("Owner".to_string(), owner.to_string());
    }
    (
        FunctionInfo {
            name: name.to_string(),
            arn: format!("arn:aws:lambda:eu-west-1:{CALLER}:function:{name}"),
        },
        tags,
    )
}

/// Resources of one account in one region.
#[derive(Debug, Clone, Default)]
pub struct FakeRegion {
    pub instances: Vec<ComputeInstance>,
    pub databases: Vec<DatabaseInstance>,
    pub functions: Vec<(FunctionInfo, FunctionTags)>,
    /// Value reported by the account usage metric.
    pub function_count: u64,
    pub fail: bool,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeAccount {
    pub regions: HashMap<String, FakeRegion>,
}

impl FakeAccount {
    pub fn with_region(mut self, region: &str, contents: FakeRegion) -> Self {
        self.regions.insert(region.to_string(), contents);
        self
    }
}

/// Every account of a fake organization plus the behavior of the control-plane calls.
#[derive(Debug, Default)]
pub struct FakeWorld {
    pub regions: Vec<String>,
    /// Accounts in organization listing order.
    pub accounts: Vec<(String, FakeAccount)>,
    pub denied: HashSet<String>,
    pub fail_region_listing: bool,
    /// Report the organization account listing as cut short at the page cap.
    pub truncated_accounts: bool,
    pub assumed_roles: Mutex<Vec<String>>,
}

impl FakeWorld {
    pub fn new(regions: &[&str]) -> Self {
        Self {
            regions: regions.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_account(mut self, id: &str, account: FakeAccount) -> Self {
        self.accounts.push((id.to_string(), account));
        self
    }

    pub fn deny(mut self, id: &str) -> Self {
        self.denied.insert(id.to_string());
        self
    }

    pub fn assumed_roles(&self) -> Vec<String> {
        self.assumed_roles.lock().unwrap().clone()
    }
}

/// A session bound to one account of a [`FakeWorld`].
pub struct FakeCloud {
    account: String,
    world: Arc<FakeWorld>,
}

impl FakeCloud {
    /// The caller's own session.
    pub fn ambient(world: Arc<FakeWorld>) -> Self {
        Self {
            account: CALLER.to_string(),
            world,
        }
    }

    fn region(&self, region: &Region) -> Result<FakeRegion, CloudApiError> {
        let contents = self
            .world
            .accounts
            .iter()
            .find(|(id, _)| *id == self.account)
            .and_then(|(_, account)| account.regions.get(region.as_str()))
            .cloned()
            .unwrap_or_default();

        if contents.fail {
            return Err(CloudApiError::Api {
                service: "ec2",
                status: 503,
                code: "RequestLimitExceeded".to_string(),
                message: format!("throttled in {region}"),
            });
        }
        Ok(contents)
    }
}

fn listing<T>(items: Vec<T>, truncated: bool) -> Listing<T> {
    Listing { items, truncated }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn enabled_regions(&self, _bootstrap: &Region) -> Result<Vec<Region>, CloudApiError> {
        if self.world.fail_region_listing {
            return Err(CloudApiError::Auth(
                "UnauthorizedOperation: ec2:DescribeRegions".to_string(),
            ));
        }
        Ok(self.world.regions.iter().map(Region::new).collect())
    }

    async fn running_instances(
        &self,
        region: &Region,
    ) -> Result<Listing<ComputeInstance>, CloudApiError> {
        let r = self.region(region)?;
        Ok(listing(r.instances, r.truncated))
    }

    async fn database_instances(
        &self,
        region: &Region,
    ) -> Result<Listing<DatabaseInstance>, CloudApiError> {
        let r = self.region(region)?;
        Ok(listing(r.databases, false))
    }

    async fn functions(&self, region: &Region) -> Result<Listing<FunctionInfo>, CloudApiError> {
        let r = self.region(region)?;
        Ok(listing(
            r.functions.into_iter().map(|(f, _)| f).collect(),
            false,
        ))
    }

    async fn function_tags(
        &self,
        region: &Region,
        function: &FunctionInfo,
    ) -> Result<FunctionTags, CloudApiError> {
        let r = self.region(region)?;
        Ok(r.functions
            .into_iter()
            .find(|(f, _)| f.arn == function.arn)
            .map(|(_, tags)| tags)
            .unwrap_or_default())
    }

    async fn function_count(&self, region: &Region) -> Result<u64, CloudApiError> {
        Ok(self.region(region)?.function_count)
    }

    async fn organization_accounts(&self) -> Result<Listing<AccountId>, CloudApiError> {
        Ok(listing(
            self.world
                .accounts
                .iter()
                .map(|(id, _)| AccountId::new(id.clone()))
                .collect(),
            self.world.truncated_accounts,
        ))
    }

    async fn caller_account(&self) -> Result<AccountId, CloudApiError> {
        Ok(AccountId::new(self.account.clone()))
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        _session_name: &str,
        duration: Duration,
    ) -> Result<Arc<dyn CloudApi>, CloudApiError> {
        assert_eq!(duration, Duration::from_secs(1800));
        self.world
            .assumed_roles
            .lock()
            .unwrap()
            .push(role_arn.to_string());

        let account = role_arn.split(':').nth(4).unwrap_or_default().to_string();
        if self.world.denied.contains(&account) {
            return Err(CloudApiError::Auth(format!(
                "AccessDenied: not authorized to perform sts:AssumeRole on {role_arn}"
            )));
        }

        Ok(Arc::new(FakeCloud {
            account,
            world: Arc::clone(&self.world),
        }))
    }
}
