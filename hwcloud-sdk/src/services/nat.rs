//! NAT v2 API: public NAT gateways

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::take_member;
use crate::client::{RequestOpts, ServiceClient};
use crate::error::Result;
use crate::request::{FieldRule, RequestBody, build_request_body};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateGatewayOpts {
    pub name: String,
    /// `"1"` (small) to `"4"` (extra-large).
    pub spec: String,
    pub router_id: String,
    pub internal_network_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<String>,
}

impl RequestBody for CreateGatewayOpts {
    fn rules() -> &'static [FieldRule] {
        &[
            FieldRule::Required("name"),
            FieldRule::Required("spec"),
            FieldRule::Required("router_id"),
            FieldRule::Required("internal_network_id"),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateGatewayOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RequestBody for UpdateGatewayOpts {
    fn rules() -> &'static [FieldRule] {
        &[FieldRule::Or(&["name", "spec", "description"])]
    }
}

pub fn gateway_url(client: &ServiceClient, id: &str) -> String {
    client.service_url(&["nat_gateways", id])
}

pub async fn create_gateway(client: &ServiceClient, opts: &CreateGatewayOpts) -> Result<Value> {
    let body = build_request_body(opts, Some("nat_gateway"))?;
    let body = client
        .post(&client.service_url(&["nat_gateways"]), body)
        .await?;
    take_member(&client.service, body, "nat_gateway")
}

pub async fn get_gateway(client: &ServiceClient, id: &str) -> Result<Value> {
    let body = client.get(&gateway_url(client, id)).await?;
    take_member(&client.service, body, "nat_gateway")
}

pub async fn update_gateway(
    client: &ServiceClient,
    id: &str,
    opts: &UpdateGatewayOpts,
) -> Result<()> {
    let body = build_request_body(opts, Some("nat_gateway"))?;
    client
        .request(
            Method::PUT,
            &gateway_url(client, id),
            RequestOpts::json(body).ok_codes(&[200]),
        )
        .await?;
    Ok(())
}

pub async fn delete_gateway(client: &ServiceClient, id: &str) -> Result<()> {
    client.delete(&gateway_url(client, id)).await?;
    Ok(())
}
