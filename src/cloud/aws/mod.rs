//! AWS (Amazon Web Services) implementation of [`CloudApi`](crate::cloud::CloudApi).
//!
//! ## Services
//!
//! - **EC2** - regions and running instances (EKS nodes are recognised by tag)
//! - **RDS** - database instances
//! - **Lambda** - functions, function tags and the account function count
//! - **Organizations** - member accounts
//! - **STS** - caller identity and cross-account role assumption

mod client;
pub mod credentials;
mod models;
pub mod signing;

pub use client::AwsClient;
pub use credentials::Credentials;

/// Role ARN for `role_name` in `account` within `partition`.
pub fn role_arn(partition: &str, account: &str, role_name: &str) -> String {
    format!("arn:{partition}:iam::{account}:role/{role_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_arn() {
        assert_eq!(
            role_arn("aws", "111122223333", "OrganizationAccountAccessRole"),
            "arn:aws:iam::111122223333:role/OrganizationAccountAccessRole"
        );
        assert_eq!(
            role_arn("aws-us-gov", "111122223333", "Audit"),
            "arn:aws-us-gov:iam::111122223333:role/Audit"
        );
    }
}
