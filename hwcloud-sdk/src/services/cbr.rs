//! CBR v3 API: backup vaults

use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};

use super::take_member;
use crate::client::{RequestOpts, ServiceClient};
use crate::error::Result;
use crate::request::{FieldRule, RequestBody, build_query_string, build_request_body};
use crate::services::tags::ResourceTag;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BillingCreate {
    /// `public` or `hybrid`.
    pub cloud_type: String,
    /// `server`, `disk`, `turbo` or `workspace`.
    pub object_type: String,
    /// `backup` or `replication`.
    pub protect_type: String,
    /// `crash_consistent` or `app_consistent`.
    pub consistent_level: String,
    /// Capacity in GB.
    pub size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_multi_az: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BindRules {
    pub tags: Vec<ResourceTag>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateVaultOpts {
    pub name: String,
    pub billing: BillingCreate,
    /// Always sent, possibly empty.
    pub resources: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_expand: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_bind: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_rules: Option<BindRules>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ResourceTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_name_prefix: Option<String>,
}

impl RequestBody for CreateVaultOpts {
    fn rules() -> &'static [FieldRule] {
        &[
            FieldRule::Required("name"),
            FieldRule::Required("billing.cloud_type"),
            FieldRule::Required("billing.object_type"),
            FieldRule::Required("billing.protect_type"),
            FieldRule::Required("billing.size"),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BillingUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateVaultOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing: Option<BillingUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_expand: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_bind: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_rules: Option<BindRules>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
}

impl RequestBody for UpdateVaultOpts {}

/// Query for `GET vaults`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListVaultOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<String>,
    pub limit: u32,
}

impl RequestBody for ListVaultOpts {}

pub fn vault_url(client: &ServiceClient, id: &str) -> String {
    client.service_url(&["vaults", id])
}

pub fn list_vaults_url(client: &ServiceClient, opts: &ListVaultOpts) -> Result<String> {
    Ok(format!(
        "{}{}",
        client.service_url(&["vaults"]),
        build_query_string(opts)?
    ))
}

pub async fn create_vault(client: &ServiceClient, opts: &CreateVaultOpts) -> Result<Value> {
    let body = build_request_body(opts, Some("vault"))?;
    let resp = client
        .request(
            Method::POST,
            &client.service_url(&["vaults"]),
            RequestOpts::json(body).ok_codes(&[200]),
        )
        .await?;
    take_member(&client.service, resp.body, "vault")
}

pub async fn get_vault(client: &ServiceClient, id: &str) -> Result<Value> {
    let body = client.get(&vault_url(client, id)).await?;
    take_member(&client.service, body, "vault")
}

pub async fn update_vault(client: &ServiceClient, id: &str, opts: &UpdateVaultOpts) -> Result<()> {
    let body = build_request_body(opts, Some("vault"))?;
    client
        .request(
            Method::PUT,
            &vault_url(client, id),
            RequestOpts::json(body).ok_codes(&[200]),
        )
        .await?;
    Ok(())
}

pub async fn delete_vault(client: &ServiceClient, id: &str) -> Result<()> {
    client
        .request(
            Method::DELETE,
            &vault_url(client, id),
            RequestOpts::default().ok_codes(&[200, 202, 204]),
        )
        .await?;
    Ok(())
}

/// Attach resources (`{id, type, extra_info?}`) to a vault.
pub async fn add_resources(client: &ServiceClient, id: &str, resources: Vec<Value>) -> Result<()> {
    client
        .request(
            Method::POST,
            &format!("{}/addresources", vault_url(client, id)),
            RequestOpts::json(json!({ "resources": resources })).ok_codes(&[200]),
        )
        .await?;
    Ok(())
}

pub async fn remove_resources(client: &ServiceClient, id: &str, resource_ids: &[String]) -> Result<()> {
    client
        .request(
            Method::POST,
            &format!("{}/removeresources", vault_url(client, id)),
            RequestOpts::json(json!({ "resource_ids": resource_ids })).ok_codes(&[200]),
        )
        .await?;
    Ok(())
}

/// Tag base of a vault (`v3/{project_id}/vault/{id}`).
pub fn vault_tags_base(client: &ServiceClient, id: &str) -> String {
    client.url_for("v3/{project_id}/vault/{id}", &[("id", id)])
}

/// Capacity figures come back in MB; state carries GB.
pub fn mb_to_gb(mb: f64) -> f64 {
    mb / 1024.0
}
