//! AWS API response models.
//!
//! Query-protocol services (EC2, RDS, STS) answer in XML and are decoded with
//! `quick-xml`; Lambda and Organizations answer in JSON. The root element of an
//! XML document maps onto the top-level struct, so only its children are named.

use serde::Deserialize;
use std::collections::HashMap;

// ============================================================================
// EC2
// ============================================================================

/// EC2 `DescribeRegions` response.
#[derive(Debug, Deserialize)]
pub struct DescribeRegionsResponse {
    #[serde(rename = "regionInfo", default)]
    pub region_info: ItemSet<RegionItem>,
}

#[derive(Debug, Deserialize)]
pub struct RegionItem {
    #[serde(rename = "regionName")]
    pub region_name: String,
}

/// EC2 `DescribeInstances` response.
#[derive(Debug, Deserialize)]
pub struct DescribeInstancesResponse {
    #[serde(rename = "reservationSet", default)]
    pub reservation_set: ItemSet<Reservation>,
    #[serde(rename = "nextToken", default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Reservation {
    #[serde(rename = "instancesSet", default)]
    pub instances_set: ItemSet<Ec2Instance>,
}

#[derive(Debug, Deserialize)]
pub struct Ec2Instance {
    #[serde(rename = "instanceId")]
    pub instance_id: String,
    #[serde(rename = "instanceType")]
    pub instance_type: String,
    #[serde(rename = "tagSet", default)]
    pub tag_set: ItemSet<Ec2Tag>,
}

#[derive(Debug, Deserialize)]
pub struct Ec2Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// EC2's `<xxxSet><item/>...</xxxSet>` list wrapper.
#[derive(Debug, Deserialize)]
pub struct ItemSet<T> {
    #[serde(rename = "item", default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Default for ItemSet<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

// ============================================================================
// RDS
// ============================================================================

/// RDS `DescribeDBInstances` response.
#[derive(Debug, Deserialize)]
pub struct DescribeDbInstancesResponse {
    #[serde(rename = "DescribeDBInstancesResult")]
    pub result: DescribeDbInstancesResult,
}

#[derive(Debug, Deserialize)]
pub struct DescribeDbInstancesResult {
    #[serde(rename = "DBInstances", default)]
    pub db_instances: DbInstanceList,
    #[serde(rename = "Marker", default)]
    pub marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DbInstanceList {
    #[serde(rename = "DBInstance", default)]
    pub items: Vec<RdsInstance>,
}

#[derive(Debug, Deserialize)]
pub struct RdsInstance {
    #[serde(rename = "DBInstanceIdentifier")]
    pub identifier: String,
    #[serde(rename = "DBInstanceClass")]
    pub instance_class: String,
}

// ============================================================================
// STS
// ============================================================================

/// STS `GetCallerIdentity` response.
#[derive(Debug, Deserialize)]
pub struct GetCallerIdentityResponse {
    #[serde(rename = "GetCallerIdentityResult")]
    pub result: CallerIdentity,
}

#[derive(Debug, Deserialize)]
pub struct CallerIdentity {
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Arn", default)]
    pub arn: Option<String>,
}

/// STS `AssumeRole` response.
#[derive(Debug, Deserialize)]
pub struct AssumeRoleResponse {
    #[serde(rename = "AssumeRoleResult")]
    pub result: AssumeRoleResult,
}

#[derive(Debug, Deserialize)]
pub struct AssumeRoleResult {
    #[serde(rename = "Credentials")]
    pub credentials: StsCredentials,
}

#[derive(Debug, Deserialize)]
pub struct StsCredentials {
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "SessionToken")]
    pub session_token: String,
    #[serde(rename = "Expiration", default)]
    pub expiration: Option<String>,
}

// ============================================================================
// Lambda
// ============================================================================

/// Lambda `ListFunctions` response.
#[derive(Debug, Deserialize)]
pub struct ListFunctionsResponse {
    #[serde(rename = "Functions", default)]
    pub functions: Vec<LambdaFunction>,
    #[serde(rename = "NextMarker", default)]
    pub next_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LambdaFunction {
    #[serde(rename = "FunctionName")]
    pub function_name: String,
    #[serde(rename = "FunctionArn")]
    pub function_arn: String,
}

/// Lambda `ListTags` response.
#[derive(Debug, Deserialize)]
pub struct ListTagsResponse {
    #[serde(rename = "Tags", default)]
    pub tags: HashMap<String, String>,
}

/// Lambda `GetAccountSettings` response.
#[derive(Debug, Deserialize)]
pub struct AccountSettingsResponse {
    #[serde(rename = "AccountUsage")]
    pub account_usage: AccountUsage,
}

#[derive(Debug, Deserialize)]
pub struct AccountUsage {
    #[serde(rename = "FunctionCount")]
    pub function_count: u64,
}

// ============================================================================
// Organizations
// ============================================================================

/// Organizations `ListAccounts` response.
#[derive(Debug, Deserialize)]
pub struct ListAccountsResponse {
    #[serde(rename = "Accounts", default)]
    pub accounts: Vec<OrgAccount>,
    #[serde(rename = "NextToken", default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrgAccount {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// EC2 error body: `<Response><Errors><Error>...`.
#[derive(Debug, Deserialize)]
struct Ec2ErrorResponse {
    #[serde(rename = "Errors")]
    errors: Ec2Errors,
}

#[derive(Debug, Deserialize)]
struct Ec2Errors {
    #[serde(rename = "Error")]
    error: XmlError,
}

/// Query-protocol error body used by STS and RDS: `<ErrorResponse><Error>...`.
#[derive(Debug, Deserialize)]
struct QueryErrorResponse {
    #[serde(rename = "Error")]
    error: XmlError,
}

#[derive(Debug, Deserialize)]
struct XmlError {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

/// Extract `(code, message)` from an error body of any of the supported protocols.
pub fn parse_error_body(body: &str) -> Option<(String, String)> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        if let Ok(resp) = quick_xml::de::from_str::<Ec2ErrorResponse>(trimmed) {
            return Some((resp.errors.error.code, resp.errors.error.message));
        }
        if let Ok(resp) = quick_xml::de::from_str::<QueryErrorResponse>(trimmed) {
            return Some((resp.error.code, resp.error.message));
        }
        return None;
    }

    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    let code = value
        .get("__type")
        .or_else(|| value.get("Type"))
        .or_else(|| value.get("code"))
        .and_then(|v| v.as_str())?;
    // JSON 1.1 error types may carry a namespace prefix
    let code = code.rsplit('#').next().unwrap_or(code).to_string();
    let message = value
        .get("message")
        .or_else(|| value.get("Message"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    Some((code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_describe_instances() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<DescribeInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
    <requestId>8f7724cf-496f-496e-8fe3-example</requestId>
    <reservationSet>
        <item>
            <reservationId>r-1234567890abcdef0</reservationId>
            <instancesSet>
                <item>
                    <instanceId>i-1</instanceId>
                    <instanceType>t3.micro</instanceType>
                    <instanceState><code>16</code><name>running</name></instanceState>
                </item>
                <item>
                    <instanceId>i-2</instanceId>
                    <instanceType>m5.large</instanceType>
                    <tagSet>
                        <item><key>eks:cluster-name</key><value>prod</value></item>
                        <item><key>Name</key><value>worker</value></item>
                    </tagSet>
                </item>
            </instancesSet>
        </item>
    </reservationSet>
    <nextToken>page-2</nextToken>
</DescribeInstancesResponse>"#;

        let resp: DescribeInstancesResponse = quick_xml::de::from_str(xml).unwrap();
        let instances: Vec<&Ec2Instance> = resp
            .reservation_set
            .items
            .iter()
            .flat_map(|r| r.instances_set.items.iter())
            .collect();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].instance_type, "t3.micro");
        assert!(instances[0].tag_set.items.is_empty());
        assert_eq!(instances[1].tag_set.items[0].key, "eks:cluster-name");
        assert_eq!(resp.next_token.as_deref(), Some("page-2"));
    }

    #[test]
    fn test_parse_describe_regions() {
        let xml = r#"<DescribeRegionsResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
    <requestId>59dbff89-35bd-4eac-99ed-be587EXAMPLE</requestId>
    <regionInfo>
        <item><regionName>eu-west-1</regionName><regionEndpoint>ec2.eu-west-1.amazonaws.com</regionEndpoint></item>
        <item><regionName>us-east-1</regionName><regionEndpoint>ec2.us-east-1.amazonaws.com</regionEndpoint></item>
    </regionInfo>
</DescribeRegionsResponse>"#;

        let resp: DescribeRegionsResponse = quick_xml::de::from_str(xml).unwrap();
        let names: Vec<&str> = resp
            .region_info
            .items
            .iter()
            .map(|r| r.region_name.as_str())
            .collect();
        assert_eq!(names, vec!["eu-west-1", "us-east-1"]);
    }

    #[test]
    fn test_parse_db_instances() {
        let xml = r#"<DescribeDBInstancesResponse xmlns="http://rds.amazonaws.com/doc/2014-10-31/">
  <DescribeDBInstancesResult>
    <DBInstances>
      <DBInstance>
        <DBInstanceIdentifier>orders</DBInstanceIdentifier>
        <DBInstanceClass>db.r5.large</DBInstanceClass>
      </DBInstance>
      <DBInstance>
        <DBInstanceIdentifier>scratch</DBInstanceIdentifier>
        <DBInstanceClass>db.t3.micro</DBInstanceClass>
      </DBInstance>
    </DBInstances>
  </DescribeDBInstancesResult>
  <ResponseMetadata><RequestId>abc</RequestId></ResponseMetadata>
</DescribeDBInstancesResponse>"#;

        let resp: DescribeDbInstancesResponse = quick_xml::de::from_str(xml).unwrap();
        assert_eq!(resp.result.db_instances.items.len(), 2);
        assert_eq!(resp.result.db_instances.items[1].instance_class, "db.t3.micro");
        assert!(resp.result.marker.is_none());
    }

    #[test]
    fn test_parse_assume_role() {
        let xml = r#"<AssumeRoleResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleResult>
    <AssumedRoleUser>
      <Arn>arn:aws:sts::111122223333:assumed-role/OrganizationAccountAccessRole/CloudGuard_AssetCounter</Arn>
      <AssumedRoleId>AROA:CloudGuard_AssetCounter</AssumedRoleId>
    </AssumedRoleUser>
    <Credentials>
      <AccessKeyId>ASIAEXAMPLE</AccessKeyId>
      <SecretAccessKey>secret</SecretAccessKey>
      <SessionToken>token</SessionToken>
      <Expiration>2026-10-16T12:30:00Z</Expiration>
    </Credentials>
  </AssumeRoleResult>
</AssumeRoleResponse>"#;

        let resp: AssumeRoleResponse = quick_xml::de::from_str(xml).unwrap();
        assert_eq!(resp.result.credentials.access_key_id, "ASIAEXAMPLE");
        assert_eq!(resp.result.credentials.session_token, "token");
    }

    #[test]
    fn test_parse_caller_identity() {
        let xml = r#"<GetCallerIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <GetCallerIdentityResult>
    <Arn>arn:aws:iam::123456789012:user/auditor</Arn>
    <UserId>AIDAEXAMPLE</UserId>
    <Account>123456789012</Account>
  </GetCallerIdentityResult>
</GetCallerIdentityResponse>"#;

        let resp: GetCallerIdentityResponse = quick_xml::de::from_str(xml).unwrap();
        assert_eq!(resp.result.account, "123456789012");
    }

    #[test]
    fn test_parse_lambda_json() {
        let body = r#"{"Functions":[{"FunctionName":"f1","FunctionArn":"arn:aws:lambda:eu-west-1:1:function:f1","Runtime":"python3.12"}],"NextMarker":null}"#;
        let resp: ListFunctionsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.functions.len(), 1);
        assert!(resp.next_marker.is_none());

        let settings = r#"{"AccountLimit":{"ConcurrentExecutions":1000},"AccountUsage":{"TotalCodeSize":1024,"FunctionCount":121}}"#;
        let resp: AccountSettingsResponse = serde_json::from_str(settings).unwrap();
        assert_eq!(resp.account_usage.function_count, 121);
    }

    #[test]
    fn test_parse_error_bodies() {
        let ec2 = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response><Errors><Error><Code>UnauthorizedOperation</Code><Message>You are not authorized</Message></Error></Errors><RequestID>x</RequestID></Response>"#;
        assert_eq!(
            parse_error_body(ec2),
            Some((
                "UnauthorizedOperation".to_string(),
                "You are not authorized".to_string()
            ))
        );

        let sts = r#"<ErrorResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <Error><Type>Sender</Type><Code>AccessDenied</Code><Message>not authorized to perform sts:AssumeRole</Message></Error>
  <RequestId>y</RequestId>
</ErrorResponse>"#;
        assert_eq!(parse_error_body(sts).map(|(c, _)| c).as_deref(), Some("AccessDenied"));

        let orgs = r#"{"__type":"com.amazonaws#AWSOrganizationsNotInUseException","message":"not in an organization"}"#;
        assert_eq!(
            parse_error_body(orgs).map(|(c, _)| c).as_deref(),
            Some("AWSOrganizationsNotInUseException")
        );

        assert_eq!(parse_error_body("Service Unavailable"), None);
    }
}
