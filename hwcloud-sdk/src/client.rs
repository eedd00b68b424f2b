//! Signed REST client for one service in one region

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, Url};
use serde_json::Value;

use crate::catalog::{self, DEFAULT_CLOUD, ensure_trailing_slash};
use crate::error::{Result, SdkError};
use crate::extract::{flatten_response, path_search_str};
use crate::http_client::{DEFAULT_MAX_RETRIES, HttpUtils};
use crate::pagination::PageFetcher;
use crate::sign::{HEADER_SDK_DATE, SDK_DATE_FORMAT, Signer};
use crate::utils::log_sanitizer::{header_for_log, truncate_for_log};

/// Connect timeout.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Whole-request timeout.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Build the shared HTTP client.
pub fn create_http_client(insecure: bool) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
        .danger_accept_invalid_certs(insecure)
        .build()
        .map_err(|e| SdkError::NetworkError {
            service: "http".to_string(),
            detail: format!("Failed to create HTTP client: {e}"),
        })
}

/// How requests are authenticated.
#[derive(Clone)]
pub enum Credentials {
    /// AK/SK signing, with a security token for temporary credentials.
    AkSk {
        signer: Signer,
        security_token: Option<String>,
    },
    /// A pre-issued IAM token sent as `X-Auth-Token`.
    Token(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AkSk {
                signer,
                security_token,
            } => f
                .debug_struct("AkSk")
                .field("signer", signer)
                .field("security_token", &security_token.as_ref().map(|_| "***"))
                .finish(),
            Self::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
        }
    }
}

impl Credentials {
    pub fn aksk(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self::AkSk {
            signer: Signer::new(access_key, secret_key),
            security_token: None,
        }
    }
}

/// Status accepted when the caller does not override it.
pub fn default_ok_codes(method: &Method) -> &'static [u16] {
    match *method {
        Method::POST | Method::PUT => &[201, 202],
        Method::PATCH => &[200, 202, 204],
        Method::DELETE => &[202, 204],
        _ => &[200],
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOpts {
    pub json_body: Option<Value>,
    /// Overrides [`default_ok_codes`].
    pub ok_codes: Option<Vec<u16>>,
    pub more_headers: Vec<(String, String)>,
}

impl RequestOpts {
    pub fn json(body: Value) -> Self {
        Self {
            json_body: Some(body),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ok_codes(mut self, codes: &[u16]) -> Self {
        self.ok_codes = Some(codes.to_vec());
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.more_headers.push((name.into(), value.into()));
        self
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Parsed body; `{}` when the body was empty.
    pub body: Value,
}

/// Error code and message pulled out of an error body.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawApiError {
    pub code: Option<String>,
    pub message: String,
}

impl RawApiError {
    /// Accepts `{error_code, error_msg}`, `{code, message}` and `{error: {code, message}}`.
    pub fn from_body(body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return Self {
                code: None,
                message: body.to_string(),
            };
        };
        let first = |paths: &[&str]| paths.iter().find_map(|p| path_search_str(p, &value));
        Self {
            code: first(&["error_code", "code", "error.code", "errorCode"]),
            message: first(&["error_msg", "message", "error.message", "errorMessage"])
                .unwrap_or_else(|| body.to_string()),
        }
    }
}

/// Request details carried into error mapping.
#[derive(Debug, Clone)]
pub(crate) struct ErrorContext<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub status: u16,
    pub expected: &'a [u16],
    pub body: &'a str,
}

/// Maps non-OK responses to [`SdkError`].
pub(crate) trait ErrorMapper {
    fn service_name(&self) -> &str;

    fn map_error(&self, raw: RawApiError, ctx: &ErrorContext<'_>) -> SdkError {
        let service = self.service_name().to_string();
        match raw.code.as_deref() {
            Some("APIGW.0301" | "APIGW.0101" | "APIGW.0303" | "APIGW.0305") => {
                return SdkError::InvalidCredentials {
                    service,
                    raw_message: Some(raw.message),
                };
            }
            Some("APIGW.0302" | "APIGW.0306") => {
                return SdkError::PermissionDenied {
                    service,
                    raw_message: Some(raw.message),
                };
            }
            Some("APIGW.0308") => {
                return SdkError::RateLimited {
                    service,
                    retry_after: None,
                    raw_message: Some(raw.message),
                };
            }
            Some("APIGW.0201") => {
                return SdkError::NetworkError {
                    service,
                    detail: raw.message,
                };
            }
            _ => {}
        }

        if ctx.status == 404 {
            return SdkError::ResourceNotFound {
                service,
                url: ctx.url.to_string(),
                raw_message: Some(raw.message),
            };
        }

        SdkError::UnexpectedStatus {
            service,
            method: ctx.method.to_string(),
            url: ctx.url.to_string(),
            status: ctx.status,
            expected: ctx.expected.to_vec(),
            error_code: raw.code,
            body: ctx.body.to_string(),
        }
    }
}

/// Client for one service type in one region.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    credentials: Credentials,
    max_retries: u32,
    send_domain_id: bool,
    /// Catalog name, e.g. `vpc`.
    pub service: String,
    /// Endpoint ending in `/`.
    pub endpoint: String,
    /// Endpoint + version [+ project] [+ resource base], ending in `/`.
    pub resource_base: String,
    pub region: String,
    pub project_id: String,
    pub domain_id: String,
}

/// Builder for [`ServiceClient`].
#[derive(Debug, Clone)]
pub struct ServiceClientBuilder {
    service: String,
    credentials: Credentials,
    http: Option<Client>,
    region: String,
    project_id: String,
    domain_id: String,
    cloud: String,
    endpoint: Option<String>,
    max_retries: u32,
}

impl ServiceClientBuilder {
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    #[must_use]
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    #[must_use]
    pub fn domain_id(mut self, domain_id: impl Into<String>) -> Self {
        self.domain_id = domain_id.into();
        self
    }

    /// Cloud domain (default `myhuaweicloud.com`).
    #[must_use]
    pub fn cloud(mut self, cloud: impl Into<String>) -> Self {
        self.cloud = cloud.into();
        self
    }

    /// Custom endpoint replacing the catalog one.
    #[must_use]
    pub fn endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint.filter(|e| !e.is_empty());
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Share an existing HTTP client (connection pool).
    #[must_use]
    pub fn http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn build(self) -> Result<ServiceClient> {
        let catalog = catalog::lookup(&self.service)?;
        let endpoint = match self.endpoint {
            Some(custom) => ensure_trailing_slash(&custom),
            None => catalog.endpoint(&self.region, &self.cloud),
        };
        let resource_base = catalog.resource_base_url(&endpoint, &self.project_id);
        let http = match self.http {
            Some(client) => client,
            None => create_http_client(false)?,
        };

        Ok(ServiceClient {
            http,
            credentials: self.credentials,
            max_retries: self.max_retries,
            send_domain_id: catalog.admin,
            service: self.service,
            endpoint,
            resource_base,
            region: self.region,
            project_id: self.project_id,
            domain_id: self.domain_id,
        })
    }
}

impl ErrorMapper for ServiceClient {
    fn service_name(&self) -> &str {
        &self.service
    }
}

impl ServiceClient {
    pub fn builder(service: impl Into<String>, credentials: Credentials) -> ServiceClientBuilder {
        ServiceClientBuilder {
            service: service.into(),
            credentials,
            http: None,
            region: String::new(),
            project_id: String::new(),
            domain_id: String::new(),
            cloud: DEFAULT_CLOUD.to_string(),
            endpoint: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Resolve a path template against the endpoint.
    ///
    /// `{project_id}` is always substituted; other `{name}` placeholders come from
    /// `params` and are percent-encoded.
    pub fn url_for(&self, template: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!("{}{}", self.endpoint, template.trim_start_matches('/'));
        url = url.replace("{project_id}", &self.project_id);
        for (name, value) in params {
            url = url.replace(&format!("{{{name}}}"), &urlencoding::encode(value));
        }
        url
    }

    /// `resource_base` joined with path segments.
    pub fn service_url(&self, parts: &[&str]) -> String {
        format!("{}{}", self.resource_base, parts.join("/"))
    }

    fn signed_headers(&self, url: &Url, extra: &[(String, String)]) -> Vec<(String, String)> {
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            _ => String::new(),
        };
        let mut headers = vec![
            ("Host".to_string(), host),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        if self.send_domain_id {
            if !self.domain_id.is_empty() {
                headers.push(("X-Domain-Id".to_string(), self.domain_id.clone()));
            }
        } else if !self.project_id.is_empty() {
            headers.push(("X-Project-Id".to_string(), self.project_id.clone()));
        }
        headers.extend(extra.iter().cloned());
        headers
    }

    /// Sign, send (with retries) and check the status against the OK codes.
    pub async fn request(&self, method: Method, url: &str, opts: RequestOpts) -> Result<Response> {
        let parsed = Url::parse(url).map_err(|e| SdkError::InvalidParameter {
            service: self.service.clone(),
            param: "url".to_string(),
            detail: format!("{url}: {e}"),
        })?;

        let payload = match &opts.json_body {
            Some(body) => serde_json::to_string(body).map_err(|e| SdkError::SerializationError {
                service: self.service.clone(),
                detail: e.to_string(),
            })?,
            None => String::new(),
        };
        if !payload.is_empty() {
            log::debug!("[{}] Request Body: {}", self.service, truncate_for_log(&payload));
        }

        let mut headers = self.signed_headers(&parsed, &opts.more_headers);
        match &self.credentials {
            Credentials::AkSk {
                signer,
                security_token,
            } => {
                if let Some(token) = security_token.as_ref().filter(|t| !t.is_empty()) {
                    headers.push(("X-Security-Token".to_string(), token.clone()));
                }
                let timestamp = Utc::now().format(SDK_DATE_FORMAT).to_string();
                headers.push((HEADER_SDK_DATE.to_string(), timestamp.clone()));
                let authorization = signer.sign(
                    method.as_str(),
                    parsed.path(),
                    parsed.query().unwrap_or(""),
                    &headers,
                    &payload,
                    &timestamp,
                );
                headers.push(("Authorization".to_string(), authorization));
            }
            Credentials::Token(token) => {
                headers.push(("X-Auth-Token".to_string(), token.clone()));
            }
        }

        let mut builder = self.http.request(method.clone(), parsed.clone());
        for (name, value) in &headers {
            log::trace!("[{}] {name}: {}", self.service, header_for_log(name, value));
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !payload.is_empty() {
            builder = builder.body(payload);
        }

        let raw = HttpUtils::execute_request_with_retry(
            builder,
            &self.service,
            method.as_str(),
            url,
            self.max_retries,
        )
        .await?;

        let expected = opts
            .ok_codes
            .clone()
            .unwrap_or_else(|| default_ok_codes(&method).to_vec());
        if !expected.contains(&raw.status) {
            let ctx = ErrorContext {
                method: method.as_str(),
                url,
                status: raw.status,
                expected: &expected,
                body: &raw.body,
            };
            let err = self.map_error(RawApiError::from_body(&raw.body), &ctx);
            if err.is_expected() {
                log::warn!("{err}");
            } else {
                log::error!("{err}");
            }
            return Err(err);
        }

        Ok(Response {
            status: raw.status,
            body: flatten_response(&self.service, &raw.body)?,
        })
    }

    pub async fn get(&self, url: &str) -> Result<Value> {
        Ok(self.request(Method::GET, url, RequestOpts::default()).await?.body)
    }

    pub async fn post(&self, url: &str, body: Value) -> Result<Value> {
        Ok(self.request(Method::POST, url, RequestOpts::json(body)).await?.body)
    }

    pub async fn put(&self, url: &str, body: Value) -> Result<Value> {
        Ok(self.request(Method::PUT, url, RequestOpts::json(body)).await?.body)
    }

    pub async fn patch(&self, url: &str, body: Value) -> Result<Value> {
        Ok(self.request(Method::PATCH, url, RequestOpts::json(body)).await?.body)
    }

    pub async fn delete(&self, url: &str) -> Result<Value> {
        Ok(self.request(Method::DELETE, url, RequestOpts::default()).await?.body)
    }
}

#[async_trait]
impl PageFetcher for ServiceClient {
    async fn fetch_page(&self, url: &str) -> Result<Value> {
        self.get(url).await
    }
}
