//! Provider configuration
//!
//! Settings come from (highest priority first) explicit builder values, the
//! `provider.huaweicloud` block of the configuration file and `HW_*` environment
//! variables. [`ConfigBuilder::build`] validates the merged result and prepares the
//! shared HTTP client.

use std::collections::{BTreeMap, HashMap};

use hwcloud_sdk::catalog::{self, DEFAULT_CLOUD, ensure_trailing_slash};
use hwcloud_sdk::extract::path_search_str;
use hwcloud_sdk::pagination::set_query_params;
use hwcloud_sdk::{Credentials, DEFAULT_MAX_RETRIES, ServiceClient, Signer, create_http_client};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{ProviderError, ProviderResult, ResultExt};
use crate::resource_data::ResourceData;

/// One layer of provider settings. Unset fields fall through to the next layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub security_token: Option<String>,
    pub auth_token: Option<String>,
    pub project_id: Option<String>,
    pub domain_id: Option<String>,
    pub domain_name: Option<String>,
    pub cloud: Option<String>,
    pub auth_url: Option<String>,
    pub insecure: Option<bool>,
    pub max_retries: Option<i64>,
    pub enterprise_project_id: Option<String>,
    pub endpoints: Option<HashMap<String, String>>,
    pub default_tags: Option<BTreeMap<String, String>>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

impl ProviderSettings {
    /// Read `HW_*` variables through `var`.
    pub fn from_env_with(var: impl Fn(&str) -> Option<String>) -> Self {
        let get = |k: &str| non_empty(var(k));
        Self {
            region: get("HW_REGION_NAME"),
            access_key: get("HW_ACCESS_KEY"),
            secret_key: get("HW_SECRET_KEY"),
            security_token: get("HW_SECURITY_TOKEN"),
            auth_token: get("HW_AUTH_TOKEN"),
            project_id: get("HW_PROJECT_ID"),
            domain_id: get("HW_DOMAIN_ID"),
            domain_name: get("HW_DOMAIN_NAME"),
            cloud: get("HW_CLOUD"),
            auth_url: get("HW_AUTH_URL"),
            insecure: get("HW_INSECURE").map(|v| v == "true" || v == "1"),
            max_retries: get("HW_MAX_RETRIES").and_then(|v| v.parse().ok()),
            enterprise_project_id: get("HW_ENTERPRISE_PROJECT_ID"),
            endpoints: None,
            default_tags: None,
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Parse a `provider.huaweicloud` block.
    pub fn from_block(block: &Value) -> ProviderResult<Self> {
        serde_json::from_value(block.clone())
            .map_err(|e| ProviderError::Config(format!("provider block: {e}")))
    }

    /// Fill unset fields of `self` from `lower`.
    #[must_use]
    pub fn or(self, lower: Self) -> Self {
        Self {
            region: non_empty(self.region).or(lower.region),
            access_key: non_empty(self.access_key).or(lower.access_key),
            secret_key: non_empty(self.secret_key).or(lower.secret_key),
            security_token: non_empty(self.security_token).or(lower.security_token),
            auth_token: non_empty(self.auth_token).or(lower.auth_token),
            project_id: non_empty(self.project_id).or(lower.project_id),
            domain_id: non_empty(self.domain_id).or(lower.domain_id),
            domain_name: non_empty(self.domain_name).or(lower.domain_name),
            cloud: non_empty(self.cloud).or(lower.cloud),
            auth_url: non_empty(self.auth_url).or(lower.auth_url),
            insecure: self.insecure.or(lower.insecure),
            max_retries: self.max_retries.or(lower.max_retries),
            enterprise_project_id: non_empty(self.enterprise_project_id).or(lower.enterprise_project_id),
            endpoints: self.endpoints.or(lower.endpoints),
            default_tags: self.default_tags.or(lower.default_tags),
        }
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    explicit: ProviderSettings,
    block: ProviderSettings,
    env: ProviderSettings,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn settings(mut self, settings: ProviderSettings) -> Self {
        self.explicit = settings;
        self
    }

    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.explicit.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.explicit.access_key = Some(access_key.into());
        self.explicit.secret_key = Some(secret_key.into());
        self
    }

    #[must_use]
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.explicit.project_id = Some(project_id.into());
        self
    }

    #[must_use]
    pub fn provider_block(mut self, block: ProviderSettings) -> Self {
        self.block = block;
        self
    }

    #[must_use]
    pub fn env(mut self, env: ProviderSettings) -> Self {
        self.env = env;
        self
    }

    /// Merge layers, validate and build.
    pub fn build(self) -> ProviderResult<Config> {
        let merged = self.explicit.or(self.block).or(self.env);
        Config::load_and_validate(merged)
    }
}

/// Validated provider configuration shared by every handler.
#[derive(Debug)]
pub struct Config {
    pub region: String,
    pub cloud: String,
    pub domain_id: String,
    pub domain_name: String,
    pub auth_url: String,
    pub insecure: bool,
    pub max_retries: u32,
    pub enterprise_project_id: String,
    /// Custom endpoints per catalog service, each ending in `/`.
    pub endpoints: HashMap<String, String>,
    pub default_tags: BTreeMap<String, String>,
    credentials: Credentials,
    http: reqwest::Client,
    /// Region → project ID, filled lazily from IAM.
    projects: Mutex<HashMap<String, String>>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    fn load_and_validate(s: ProviderSettings) -> ProviderResult<Self> {
        let max_retries = s.max_retries.map_or(Ok(DEFAULT_MAX_RETRIES), |n| {
            u32::try_from(n).map_err(|_| ProviderError::Config(format!("max_retries should be a positive value, got {n}")))
        })?;

        let region = s
            .region
            .ok_or_else(|| ProviderError::Config("region is required (HW_REGION_NAME)".to_string()))?;

        let credentials = match (s.auth_token, s.access_key, s.secret_key) {
            (Some(token), _, _) => Credentials::Token(token),
            (None, Some(ak), Some(sk)) => Credentials::AkSk {
                signer: Signer::new(ak, sk),
                security_token: s.security_token,
            },
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(ProviderError::Config(
                    "access_key and secret_key must be set together".to_string(),
                ));
            }
            (None, None, None) => {
                return Err(ProviderError::Config(
                    "no credentials: set auth_token or access_key/secret_key".to_string(),
                ));
            }
        };

        let mut endpoints = HashMap::new();
        for (service, url) in s.endpoints.unwrap_or_default() {
            catalog::lookup(&service).context("endpoints")?;
            endpoints.insert(service, ensure_trailing_slash(&url));
        }

        let cloud = s.cloud.unwrap_or_else(|| DEFAULT_CLOUD.to_string());
        let auth_url = s
            .auth_url
            .unwrap_or_else(|| format!("https://iam.{region}.{cloud}/v3"));

        let mut projects = HashMap::new();
        if let Some(project_id) = s.project_id {
            projects.insert(region.clone(), project_id);
        }

        let insecure = s.insecure.unwrap_or(false);
        Ok(Self {
            http: create_http_client(insecure)?,
            region,
            cloud,
            domain_id: s.domain_id.unwrap_or_default(),
            domain_name: s.domain_name.unwrap_or_default(),
            auth_url,
            insecure,
            max_retries,
            enterprise_project_id: s.enterprise_project_id.unwrap_or_default(),
            endpoints,
            default_tags: s.default_tags.unwrap_or_default(),
            credentials,
            projects: Mutex::new(projects),
        })
    }

    /// The resource's `region` argument, or the provider region.
    pub fn get_region(&self, d: &ResourceData) -> String {
        d.get_ok("region")
            .and_then(Value::as_str)
            .map_or_else(|| self.region.clone(), ToString::to_string)
    }

    /// The resource's `enterprise_project_id`, or the provider default.
    pub fn get_enterprise_project_id(&self, d: &ResourceData) -> String {
        d.get_ok("enterprise_project_id")
            .and_then(Value::as_str)
            .map_or_else(|| self.enterprise_project_id.clone(), ToString::to_string)
    }

    /// Provider default tags overlaid with the resource's own tags.
    pub fn merge_default_tags(&self, tags: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = self.default_tags.clone();
        merged.extend(tags);
        merged
    }

    fn identity_endpoint(&self) -> String {
        let trimmed = self.auth_url.trim_end_matches('/');
        trimmed.strip_suffix("/v3").unwrap_or(trimmed).to_string()
    }

    /// Project ID of `region`, queried from IAM on first use and cached.
    pub async fn get_project_id(&self, region: &str) -> ProviderResult<String> {
        let mut projects = self.projects.lock().await;
        if let Some(id) = projects.get(region) {
            return Ok(id.clone());
        }

        let iam = ServiceClient::builder("identity", self.credentials.clone())
            .region(region)
            .domain_id(self.domain_id.clone())
            .endpoint(Some(self.identity_endpoint()))
            .max_retries(self.max_retries)
            .http_client(self.http.clone())
            .build()?;
        let url = set_query_params(&iam.service_url(&["projects"]), &[("name", region.to_string())])
            .ok_or_else(|| ProviderError::Config(format!("invalid IAM endpoint {}", self.auth_url)))?;
        let body = iam.get(&url).await.context("error querying IAM projects")?;
        let id = path_search_str("projects[0].id", &body).ok_or_else(|| {
            ProviderError::Config(format!("no project found for region {region}"))
        })?;
        log::debug!("project ID of region {region}: {id}");
        projects.insert(region.to_string(), id.clone());
        Ok(id)
    }

    /// Signed client for `service` in `region`.
    pub async fn new_service_client(&self, service: &str, region: &str) -> ProviderResult<ServiceClient> {
        let entry = catalog::lookup(service)?;
        let project_id = if entry.admin {
            String::new()
        } else {
            self.get_project_id(region).await?
        };
        Ok(ServiceClient::builder(service, self.credentials.clone())
            .region(region)
            .project_id(project_id)
            .domain_id(self.domain_id.clone())
            .cloud(self.cloud.clone())
            .endpoint(self.endpoints.get(service).cloned())
            .max_retries(self.max_retries)
            .http_client(self.http.clone())
            .build()?)
    }
}
