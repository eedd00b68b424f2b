//! APIG v2 API: request throttling policies of dedicated instances

use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};

use crate::client::{RequestOpts, ServiceClient};
use crate::error::{Result, SdkError};
use crate::request::{FieldRule, RequestBody, build_request_body};

/// Wire value of the policy type: `1` exclusive, `2` shared.
pub fn policy_type_code(name: &str) -> Result<i64> {
    match name {
        "API-based" | "API" => Ok(1),
        "API-shared" | "API_SHARED" => Ok(2),
        other => Err(SdkError::InvalidParameter {
            service: "apig".to_string(),
            param: "type".to_string(),
            detail: format!("invalid throttling policy type: {other}"),
        }),
    }
}

/// User-facing policy type for a wire value.
pub fn policy_type_name(code: i64) -> &'static str {
    if code == 2 { "API-shared" } else { "API-based" }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ThrottlingPolicyOpts {
    pub name: String,
    pub time_interval: i64,
    /// `SECOND`, `MINUTE`, `HOUR` or `DAY`.
    pub time_unit: String,
    pub api_call_limits: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_call_limits: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_call_limits: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_call_limits: Option<i64>,
    #[serde(rename = "type")]
    pub policy_type: i64,
    #[serde(rename = "remark", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RequestBody for ThrottlingPolicyOpts {
    fn rules() -> &'static [FieldRule] {
        &[
            FieldRule::Required("name"),
            FieldRule::Required("time_interval"),
            FieldRule::Required("time_unit"),
            FieldRule::Required("api_call_limits"),
        ]
    }
}

pub fn throttles_url(client: &ServiceClient, instance_id: &str) -> String {
    client.service_url(&["instances", instance_id, "throttles"])
}

pub fn throttle_url(client: &ServiceClient, instance_id: &str, id: &str) -> String {
    client.service_url(&["instances", instance_id, "throttles", id])
}

pub async fn create_policy(
    client: &ServiceClient,
    instance_id: &str,
    opts: &ThrottlingPolicyOpts,
) -> Result<Value> {
    let body = build_request_body(opts, None)?;
    client.post(&throttles_url(client, instance_id), body).await
}

pub async fn get_policy(client: &ServiceClient, instance_id: &str, id: &str) -> Result<Value> {
    client.get(&throttle_url(client, instance_id, id)).await
}

pub async fn update_policy(
    client: &ServiceClient,
    instance_id: &str,
    id: &str,
    opts: &ThrottlingPolicyOpts,
) -> Result<Value> {
    let body = build_request_body(opts, None)?;
    let resp = client
        .request(
            Method::PUT,
            &throttle_url(client, instance_id, id),
            RequestOpts::json(body).ok_codes(&[200]),
        )
        .await?;
    Ok(resp.body)
}

pub async fn delete_policy(client: &ServiceClient, instance_id: &str, id: &str) -> Result<()> {
    client.delete(&throttle_url(client, instance_id, id)).await?;
    Ok(())
}

fn specials_url(client: &ServiceClient, instance_id: &str, policy_id: &str) -> String {
    client.service_url(&["instances", instance_id, "throttles", policy_id, "throttle-specials"])
}

/// Add a special (per user or per app) limit to a policy. `object_type` is `USER` or `APP`.
pub async fn create_special_throttle(
    client: &ServiceClient,
    instance_id: &str,
    policy_id: &str,
    object_type: &str,
    object_id: &str,
    call_limits: i64,
) -> Result<Value> {
    let body = json!({
        "object_type": object_type,
        "object_id": object_id,
        "call_limits": call_limits,
    });
    client.post(&specials_url(client, instance_id, policy_id), body).await
}

pub async fn list_special_throttles(client: &ServiceClient, instance_id: &str, policy_id: &str) -> Result<Vec<Value>> {
    let body = client.get(&specials_url(client, instance_id, policy_id)).await?;
    Ok(crate::extract::path_search_list("throttle_specials", &body))
}

pub async fn update_special_throttle(
    client: &ServiceClient,
    instance_id: &str,
    policy_id: &str,
    special_id: &str,
    call_limits: i64,
) -> Result<()> {
    let url = format!("{}/{special_id}", specials_url(client, instance_id, policy_id));
    client.put(&url, json!({ "call_limits": call_limits })).await?;
    Ok(())
}

pub async fn delete_special_throttle(
    client: &ServiceClient,
    instance_id: &str,
    policy_id: &str,
    special_id: &str,
) -> Result<()> {
    let url = format!("{}/{special_id}", specials_url(client, instance_id, policy_id));
    client.delete(&url).await?;
    Ok(())
}

/// Policies of an instance whose name matches exactly.
pub async fn find_policies_by_name(
    client: &ServiceClient,
    instance_id: &str,
    name: &str,
) -> Result<Vec<Value>> {
    let url = format!(
        "{}?name={}",
        throttles_url(client, instance_id),
        urlencoding::encode(name)
    );
    let body = client.get(&url).await?;
    Ok(crate::extract::path_search_list("throttles", &body)
        .into_iter()
        .filter(|p| p.get("name").and_then(Value::as_str) == Some(name))
        .collect())
}
