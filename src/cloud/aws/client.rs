//! AWS API client implementation.
//!
//! Talks to the public service endpoints over HTTPS with SigV4-signed requests.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::credentials::{self, Credentials};
use super::models::{
    parse_error_body, AccountSettingsResponse, AssumeRoleResponse, DescribeDbInstancesResponse,
    DescribeInstancesResponse, DescribeRegionsResponse, GetCallerIdentityResponse,
    ListAccountsResponse, ListFunctionsResponse, ListTagsResponse,
};
use super::signing::{self, OutgoingRequest};
use crate::cloud::{CloudApi, CloudApiError, Listing};
use crate::config::AwsConfig;
use crate::models::{
    AccountId, ComputeInstance, DatabaseInstance, FunctionInfo, FunctionTags, Region, Tag,
};

const EC2_VERSION: &str = "2016-11-15";
const RDS_VERSION: &str = "2014-10-31";
const STS_VERSION: &str = "2011-06-15";

/// Page sizes per listing call.
const EC2_PAGE_SIZE: &str = "1000";
const RDS_PAGE_SIZE: &str = "100";
const LAMBDA_PAGE_SIZE: &str = "50";

const ORGANIZATIONS_TARGET_PREFIX: &str = "AWSOrganizationsV20161128";

/// Error codes that mean the caller is not allowed to do what it asked.
const AUTH_ERROR_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "AuthFailure",
    "UnauthorizedOperation",
    "InvalidClientTokenId",
    "ExpiredToken",
    "ExpiredTokenException",
    "UnrecognizedClientException",
    "SignatureDoesNotMatch",
];

#[derive(Debug, Clone, Copy)]
enum Service {
    Ec2,
    Rds,
    Lambda,
    Sts,
    Organizations,
}

impl Service {
    fn signing_name(self) -> &'static str {
        match self {
            Self::Ec2 => "ec2",
            Self::Rds => "rds",
            Self::Lambda => "lambda",
            Self::Sts => "sts",
            Self::Organizations => "organizations",
        }
    }
}

/// Settings shared by every session of a run.
#[derive(Debug)]
struct Settings {
    partition: String,
    /// Region used for STS.
    home_region: String,
    endpoint_override: Option<Url>,
    max_pages: usize,
}

/// One AWS session: an HTTP client plus the credentials every request is signed with.
#[derive(Clone)]
pub struct AwsClient {
    http: Client,
    credentials: Credentials,
    settings: Arc<Settings>,
}

impl AwsClient {
    /// Create a client from the configuration and explicit credentials.
    ///
    /// # Errors
    /// Returns error if the endpoint override is not a valid URL or the HTTP client
    /// cannot be created.
    pub fn new(config: &AwsConfig, credentials: Credentials) -> Result<Self, CloudApiError> {
        let endpoint_override = config
            .endpoint_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| CloudApiError::Config(format!("invalid endpoint_url {raw}: {e}")))
            })
            .transpose()?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(CloudApiError::Http)?;

        Ok(Self {
            http,
            credentials,
            settings: Arc::new(Settings {
                partition: config.partition.clone(),
                home_region: config.bootstrap_region.clone(),
                endpoint_override,
                max_pages: config.max_pages,
            }),
        })
    }

    /// Create a client using the caller's credentials from the default provider chain.
    ///
    /// The credentials are resolved once and reused for the whole run.
    pub async fn from_ambient(config: &AwsConfig) -> Result<Self, CloudApiError> {
        let credentials = credentials::ambient(&config.bootstrap_region).await?;
        Self::new(config, credentials)
    }

    fn with_credentials(&self, credentials: Credentials) -> Self {
        Self {
            http: self.http.clone(),
            credentials,
            settings: Arc::clone(&self.settings),
        }
    }

    fn dns_suffix(&self) -> &'static str {
        if self.settings.partition == "aws-cn" {
            "amazonaws.com.cn"
        } else {
            "amazonaws.com"
        }
    }

    fn organizations_region(&self) -> &'static str {
        match self.settings.partition.as_str() {
            "aws-cn" => "cn-northwest-1",
            "aws-us-gov" => "us-gov-west-1",
            _ => "us-east-1",
        }
    }

    /// Base URL (scheme, host, port) for a service in a region.
    fn endpoint(&self, service: Service, region: &str) -> Result<Url, CloudApiError> {
        if let Some(url) = &self.settings.endpoint_override {
            return Ok(url.clone());
        }
        let raw = format!(
            "https://{}.{}.{}",
            service.signing_name(),
            region,
            self.dns_suffix()
        );
        Url::parse(&raw).map_err(|e| CloudApiError::Config(format!("invalid endpoint {raw}: {e}")))
    }

    /// Sign and execute a request, returning the response body on success.
    #[allow(clippy::too_many_arguments)]
    async fn send(
        &self,
        service: Service,
        region: &str,
        method: Method,
        path: &str,
        query: &[(String, String)],
        headers: &[(&str, String)],
        payload: Vec<u8>,
    ) -> Result<String, CloudApiError> {
        let base = self.endpoint(service, region)?;
        if base.host_str().is_none() {
            return Err(CloudApiError::Config(format!("endpoint {base} has no host")));
        }

        let query_string = signing::encode_query(query);
        let mut raw_url = format!("{}{}", base.origin().ascii_serialization(), path);
        if !query_string.is_empty() {
            raw_url.push('?');
            raw_url.push_str(&query_string);
        }
        let url = Url::parse(&raw_url)
            .map_err(|e| CloudApiError::Config(format!("invalid request URL {raw_url}: {e}")))?;

        let auth_headers = signing::auth_headers(
            &OutgoingRequest {
                method: method.as_str(),
                url: url.as_str(),
                headers,
                payload: &payload,
            },
            &self.credentials,
            region,
            service.signing_name(),
            SystemTime::now(),
        )?;

        debug!(service = service.signing_name(), region, method = %method, path, "AWS request");

        let mut request = self.http.request(method, url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        for (name, value) in auth_headers {
            request = request.header(name, value);
        }
        if !payload.is_empty() {
            request = request.body(payload);
        }

        let response = request.send().await?;
        Self::handle_response(service, response).await
    }

    /// Handle API response.
    async fn handle_response(
        service: Service,
        response: reqwest::Response,
    ) -> Result<String, CloudApiError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        let (code, message) =
            parse_error_body(&text).unwrap_or_else(|| (status.to_string(), text.clone()));

        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || AUTH_ERROR_CODES.contains(&code.as_str())
        {
            Err(CloudApiError::Auth(format!("{code}: {message}")))
        } else {
            Err(CloudApiError::Api {
                service: service.signing_name(),
                status: status.as_u16(),
                code,
                message,
            })
        }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        service: Service,
        region: &str,
        params: Vec<(String, String)>,
    ) -> Result<T, CloudApiError> {
        let body = self
            .send(service, region, Method::GET, "/", &params, &[], Vec::new())
            .await?;
        quick_xml::de::from_str(&body).map_err(|e| {
            warn!(error = %e, "Failed to parse response");
            CloudApiError::Parse {
                service: service.signing_name(),
                message: e.to_string(),
            }
        })
    }

    async fn rest_json<T: DeserializeOwned>(
        &self,
        service: Service,
        region: &str,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, CloudApiError> {
        let body = self
            .send(service, region, Method::GET, path, query, &[], Vec::new())
            .await?;
        parse_json(service, &body)
    }

    async fn organizations_call<T: DeserializeOwned>(
        &self,
        operation: &str,
        input: serde_json::Value,
    ) -> Result<T, CloudApiError> {
        let payload = serde_json::to_vec(&input).map_err(|e| CloudApiError::Parse {
            service: "organizations",
            message: e.to_string(),
        })?;
        let headers = [
            ("content-type", "application/x-amz-json-1.1".to_string()),
            (
                "x-amz-target",
                format!("{ORGANIZATIONS_TARGET_PREFIX}.{operation}"),
            ),
        ];
        let body = self
            .send(
                Service::Organizations,
                self.organizations_region(),
                Method::POST,
                "/",
                &[],
                &headers,
                payload,
            )
            .await?;
        parse_json(Service::Organizations, &body)
    }

    fn warn_truncated(&self, what: &str, region: &str) {
        warn!(
            what,
            region,
            max_pages = self.settings.max_pages,
            "Listing truncated at page limit, counts may be low"
        );
    }
}

fn parse_json<T: DeserializeOwned>(service: Service, body: &str) -> Result<T, CloudApiError> {
    serde_json::from_str(body).map_err(|e| CloudApiError::Parse {
        service: service.signing_name(),
        message: e.to_string(),
    })
}

fn param(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

#[async_trait]
impl CloudApi for AwsClient {
    async fn enabled_regions(&self, bootstrap: &Region) -> Result<Vec<Region>, CloudApiError> {
        let resp: DescribeRegionsResponse = self
            .query(
                Service::Ec2,
                bootstrap.as_str(),
                vec![param("Action", "DescribeRegions"), param("Version", EC2_VERSION)],
            )
            .await?;

        Ok(resp
            .region_info
            .items
            .into_iter()
            .map(|r| Region::new(r.region_name))
            .collect())
    }

    async fn running_instances(
        &self,
        region: &Region,
    ) -> Result<Listing<ComputeInstance>, CloudApiError> {
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;

        for _ in 0..self.settings.max_pages {
            let mut params = vec![
                param("Action", "DescribeInstances"),
                param("Version", EC2_VERSION),
                param("Filter.1.Name", "instance-state-name"),
                param("Filter.1.Value.1", "running"),
                param("MaxResults", EC2_PAGE_SIZE),
            ];
            if let Some(token) = &next_token {
                params.push(param("NextToken", token.as_str()));
            }

            let resp: DescribeInstancesResponse =
                self.query(Service::Ec2, region.as_str(), params).await?;

            items.extend(
                resp.reservation_set
                    .items
                    .into_iter()
                    .flat_map(|r| r.instances_set.items)
                    .map(|i| ComputeInstance {
                        instance_id: i.instance_id,
                        instance_type: i.instance_type,
                        tags: i
                            .tag_set
                            .items
                            .into_iter()
                            .map(|t| Tag::new(t.key, t.value))
                            .collect(),
                    }),
            );

            next_token = non_empty(resp.next_token);
            if next_token.is_none() {
                return Ok(Listing::complete(items));
            }
        }

        self.warn_truncated("ec2 instances", region.as_str());
        Ok(Listing {
            items,
            truncated: true,
        })
    }

    async fn database_instances(
        &self,
        region: &Region,
    ) -> Result<Listing<DatabaseInstance>, CloudApiError> {
        let mut items = Vec::new();
        let mut marker: Option<String> = None;

        for _ in 0..self.settings.max_pages {
            let mut params = vec![
                param("Action", "DescribeDBInstances"),
                param("Version", RDS_VERSION),
                param("MaxRecords", RDS_PAGE_SIZE),
            ];
            if let Some(m) = &marker {
                params.push(param("Marker", m.as_str()));
            }

            let resp: DescribeDbInstancesResponse =
                self.query(Service::Rds, region.as_str(), params).await?;

            items.extend(
                resp.result
                    .db_instances
                    .items
                    .into_iter()
                    .map(|db| DatabaseInstance {
                        identifier: db.identifier,
                        instance_class: db.instance_class,
                    }),
            );

            marker = non_empty(resp.result.marker);
            if marker.is_none() {
                return Ok(Listing::complete(items));
            }
        }

        self.warn_truncated("rds instances", region.as_str());
        Ok(Listing {
            items,
            truncated: true,
        })
    }

    async fn functions(&self, region: &Region) -> Result<Listing<FunctionInfo>, CloudApiError> {
        let mut items = Vec::new();
        let mut marker: Option<String> = None;

        for _ in 0..self.settings.max_pages {
            let mut query = vec![param("MaxItems", LAMBDA_PAGE_SIZE)];
            if let Some(m) = &marker {
                query.push(param("Marker", m.as_str()));
            }

            let resp: ListFunctionsResponse = self
                .rest_json(Service::Lambda, region.as_str(), "/2015-03-31/functions/", &query)
                .await?;

            items.extend(resp.functions.into_iter().map(|f| FunctionInfo {
                name: f.function_name,
                arn: f.function_arn,
            }));

            marker = non_empty(resp.next_marker);
            if marker.is_none() {
                return Ok(Listing::complete(items));
            }
        }

        self.warn_truncated("lambda functions", region.as_str());
        Ok(Listing {
            items,
            truncated: true,
        })
    }

    async fn function_tags(
        &self,
        region: &Region,
        function: &FunctionInfo,
    ) -> Result<FunctionTags, CloudApiError> {
        let path = format!("/2017-03-31/tags/{}", signing::uri_encode(&function.arn));
        let resp: ListTagsResponse = self
            .rest_json(Service::Lambda, region.as_str(), &path, &[])
            .await?;
        Ok(resp.tags)
    }

    async fn function_count(&self, region: &Region) -> Result<u64, CloudApiError> {
        let resp: AccountSettingsResponse = self
            .rest_json(
                Service::Lambda,
                region.as_str(),
                "/2016-08-19/account-settings/",
                &[],
            )
            .await?;
        Ok(resp.account_usage.function_count)
    }

    async fn organization_accounts(&self) -> Result<Listing<AccountId>, CloudApiError> {
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;

        for _ in 0..self.settings.max_pages {
            let input = match &next_token {
                Some(token) => serde_json::json!({ "NextToken": token }),
                None => serde_json::json!({}),
            };
            let resp: ListAccountsResponse =
                self.organizations_call("ListAccounts", input).await?;

            for account in resp.accounts {
                debug!(account = %account.id, status = ?account.status, "Organization member");
                items.push(AccountId::new(account.id));
            }

            next_token = non_empty(resp.next_token);
            if next_token.is_none() {
                return Ok(Listing::complete(items));
            }
        }

        self.warn_truncated("organization accounts", self.organizations_region());
        Ok(Listing {
            items,
            truncated: true,
        })
    }

    async fn caller_account(&self) -> Result<AccountId, CloudApiError> {
        let resp: GetCallerIdentityResponse = self
            .query(
                Service::Sts,
                &self.settings.home_region,
                vec![
                    param("Action", "GetCallerIdentity"),
                    param("Version", STS_VERSION),
                ],
            )
            .await?;
        debug!(arn = ?resp.result.arn, "Resolved caller identity");
        Ok(AccountId::new(resp.result.account))
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration: Duration,
    ) -> Result<Arc<dyn CloudApi>, CloudApiError> {
        let resp: AssumeRoleResponse = self
            .query(
                Service::Sts,
                &self.settings.home_region,
                vec![
                    param("Action", "AssumeRole"),
                    param("Version", STS_VERSION),
                    param("RoleArn", role_arn),
                    param("RoleSessionName", session_name),
                    param("DurationSeconds", duration.as_secs().to_string()),
                ],
            )
            .await?;

        let creds = resp.result.credentials;
        debug!(role_arn, expiration = ?creds.expiration, "Assumed role");

        Ok(Arc::new(self.with_credentials(credentials::assumed(
            creds.access_key_id,
            creds.secret_access_key,
            creds.session_token,
            creds.expiration.as_deref(),
        ))))
    }
}
