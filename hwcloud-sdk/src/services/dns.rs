//! DNS v2 API: zones and record sets
//!
//! Public zones are served by the global `dns` endpoint, private zones by the
//! regional `dns_region` one. Record sets of public zones use the `v2.1` paths.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::{RequestOpts, ServiceClient};
use crate::error::{Result, SdkError};
use crate::request::{FieldRule, RequestBody, build_request_body};

/// VPC bound to a private zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    pub router_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub router_region: String,
    /// Association status, only present in responses.
    #[serde(default, skip_serializing)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateZoneOpts {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// `public` or `private`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router: Option<Router>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_pattern: Option<String>,
}

impl RequestBody for CreateZoneOpts {
    fn rules() -> &'static [FieldRule] {
        &[FieldRule::Required("name")]
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateZoneOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RequestBody for UpdateZoneOpts {}

/// Zone as returned by `GET zones/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub email: String,
    pub description: String,
    pub ttl: i64,
    pub zone_type: String,
    /// `PENDING_CREATE`, `ACTIVE`, `DISABLE`, `FREEZE`, `ERROR`, ...
    pub status: String,
    pub record_num: i64,
    pub pool_id: String,
    pub masters: Vec<String>,
    pub router: Option<Router>,
    pub routers: Vec<Router>,
    pub enterprise_project_id: String,
    pub proxy_pattern: String,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::utils::datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Zone {
    pub fn from_value(service: &str, value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| SdkError::ParseError {
            service: service.to_string(),
            detail: format!("zone: {e}"),
        })
    }
}

pub fn zone_url(client: &ServiceClient, id: &str) -> String {
    client.service_url(&["zones", id])
}

/// Query for `GET zones`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListZoneOpts {
    /// `public` or `private`.
    #[serde(rename = "type")]
    pub zone_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// `key1,value1|key2,value2`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<String>,
    /// `like` (default) or `equal`, applied to `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_dir: Option<String>,
    pub limit: u32,
}

impl RequestBody for ListZoneOpts {}

/// First page URL of a zone listing; later pages follow `links.next`.
pub fn list_zones_url(client: &ServiceClient, opts: &ListZoneOpts) -> Result<String> {
    Ok(format!(
        "{}{}",
        client.service_url(&["zones"]),
        crate::request::build_query_string(opts)?
    ))
}

pub async fn create_zone(client: &ServiceClient, opts: &CreateZoneOpts) -> Result<Zone> {
    let body = build_request_body(opts, None)?;
    let resp = client.post(&client.service_url(&["zones"]), body).await?;
    Zone::from_value(&client.service, resp)
}

pub async fn get_zone(client: &ServiceClient, id: &str) -> Result<Zone> {
    let body = client.get(&zone_url(client, id)).await?;
    Zone::from_value(&client.service, body)
}

pub async fn update_zone(client: &ServiceClient, id: &str, opts: &UpdateZoneOpts) -> Result<()> {
    let body = build_request_body(opts, None)?;
    client.patch(&zone_url(client, id), body).await?;
    Ok(())
}

/// Enable or disable a zone (`ENABLE` / `DISABLE`).
pub async fn set_zone_status(client: &ServiceClient, id: &str, status: &str) -> Result<()> {
    client
        .request(
            Method::PUT,
            &format!("{}/statuses", zone_url(client, id)),
            RequestOpts::json(json!({ "status": status })).ok_codes(&[200, 202]),
        )
        .await?;
    Ok(())
}

/// Bind another VPC to a private zone.
pub async fn associate_router(client: &ServiceClient, id: &str, router: &Router) -> Result<()> {
    client
        .request(
            Method::POST,
            &format!("{}/associaterouter", zone_url(client, id)),
            RequestOpts::json(json!({ "router": router })).ok_codes(&[200, 202]),
        )
        .await?;
    Ok(())
}

pub async fn disassociate_router(client: &ServiceClient, id: &str, router: &Router) -> Result<()> {
    client
        .request(
            Method::POST,
            &format!("{}/disassociaterouter", zone_url(client, id)),
            RequestOpts::json(json!({ "router": router })).ok_codes(&[200, 202]),
        )
        .await?;
    Ok(())
}

pub async fn delete_zone(client: &ServiceClient, id: &str) -> Result<()> {
    client.delete(&zone_url(client, id)).await?;
    Ok(())
}

fn tags_base(client: &ServiceClient, resource_type: &str, id: &str) -> String {
    client.url_for(
        "v2/{project_id}/{resource_type}/{id}",
        &[("resource_type", resource_type), ("id", id)],
    )
}

/// Tag base of a zone, with `DNS-public_zone` or `DNS-private_zone` as the type.
pub fn zone_tags_base(client: &ServiceClient, zone_type: &str, id: &str) -> String {
    let resource_type = if zone_type == "private" {
        "DNS-private_zone"
    } else {
        "DNS-public_zone"
    };
    tags_base(client, resource_type, id)
}

/// Tag base of a record set, typed by the zone it belongs to.
pub fn recordset_tags_base(client: &ServiceClient, zone_type: &str, id: &str) -> String {
    let resource_type = if zone_type == "private" {
        "DNS-private_recordset"
    } else {
        "DNS-public_recordset"
    };
    tags_base(client, resource_type, id)
}

/// Status reported by the zone APIs mapped to the user-facing value.
pub fn zone_status_to_state(status: &str) -> &str {
    match status {
        "ACTIVE" => "ENABLE",
        other => other,
    }
}

// ============ Record sets ============

fn recordset_version(private: bool) -> &'static str {
    if private { "v2" } else { "v2.1" }
}

pub fn recordsets_url(client: &ServiceClient, private: bool, zone_id: &str) -> String {
    client.url_for(
        &format!("{}/zones/{{zone_id}}/recordsets", recordset_version(private)),
        &[("zone_id", zone_id)],
    )
}

pub fn recordset_url(client: &ServiceClient, private: bool, zone_id: &str, id: &str) -> String {
    format!(
        "{}/{}",
        recordsets_url(client, private, zone_id),
        urlencoding::encode(id)
    )
}

/// Split a `zone_id/recordset_id` resource ID.
pub fn parse_recordset_id(id: &str) -> Result<(String, String)> {
    match id.split_once('/') {
        Some((zone, recordset)) if !zone.is_empty() && !recordset.is_empty() => {
            Ok((zone.to_string(), recordset.to_string()))
        }
        _ => Err(SdkError::InvalidParameter {
            service: "dns".to_string(),
            param: "id".to_string(),
            detail: format!("invalid ID format {id:?}, want <zone_id>/<recordset_id>"),
        }),
    }
}

pub async fn create_recordset(
    client: &ServiceClient,
    private: bool,
    zone_id: &str,
    body: Value,
) -> Result<Value> {
    let resp = client
        .request(
            Method::POST,
            &recordsets_url(client, private, zone_id),
            RequestOpts::json(body).ok_codes(&[202]),
        )
        .await?;
    Ok(resp.body)
}

pub async fn get_recordset(
    client: &ServiceClient,
    private: bool,
    zone_id: &str,
    id: &str,
) -> Result<Value> {
    client.get(&recordset_url(client, private, zone_id, id)).await
}

pub async fn update_recordset(
    client: &ServiceClient,
    private: bool,
    zone_id: &str,
    id: &str,
    body: Value,
) -> Result<()> {
    client
        .request(
            Method::PUT,
            &recordset_url(client, private, zone_id, id),
            RequestOpts::json(body).ok_codes(&[202]),
        )
        .await?;
    Ok(())
}

/// Enable or disable a public record set.
pub async fn set_recordset_status(client: &ServiceClient, id: &str, status: &str) -> Result<()> {
    client
        .request(
            Method::PUT,
            &client.url_for("v2.1/recordsets/{id}/statuses/set", &[("id", id)]),
            RequestOpts::json(json!({ "status": status })).ok_codes(&[202]),
        )
        .await?;
    Ok(())
}

pub async fn delete_recordset(
    client: &ServiceClient,
    private: bool,
    zone_id: &str,
    id: &str,
) -> Result<()> {
    client
        .request(
            Method::DELETE,
            &recordset_url(client, private, zone_id, id),
            RequestOpts::default().ok_codes(&[202]),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Credentials;

    fn client() -> ServiceClient {
        ServiceClient::builder("dns", Credentials::Token("t".into()))
            .region("cn-north-4")
            .project_id("p1")
            .http_client(reqwest::Client::new())
            .build()
            .unwrap()
    }

    #[test]
    fn zone_parses_timestamps_and_router() {
        let zone = Zone::from_value(
            "dns",
            json!({
                "id": "z1",
                "name": "example.com.",
                "ttl": 300,
                "zone_type": "private",
                "status": "ACTIVE",
                "routers": [{"router_id": "vpc-1", "router_region": "cn-north-4"}],
                "created_at": "2024-03-01T08:00:00.123",
                "updated_at": null
            }),
        )
        .unwrap();
        assert_eq!(zone.routers[0].router_id, "vpc-1");
        assert_eq!(
            serde_json::to_value(&zone.routers[0]).unwrap(),
            json!({"router_id": "vpc-1", "router_region": "cn-north-4"})
        );
        assert_eq!(
            zone.created_at.map(|t| t.timestamp()),
            Some(1_709_280_000)
        );
        assert!(zone.updated_at.is_none());
        assert_eq!(zone_status_to_state(&zone.status), "ENABLE");
    }

    #[test]
    fn recordset_paths_by_zone_type() {
        let c = client();
        assert_eq!(
            recordset_url(&c, false, "z1", "r1"),
            "https://dns.myhuaweicloud.com/v2.1/zones/z1/recordsets/r1"
        );
        assert_eq!(
            recordsets_url(&c, true, "z1"),
            "https://dns.myhuaweicloud.com/v2/zones/z1/recordsets"
        );
    }

    #[test]
    fn recordset_id_split() {
        assert_eq!(
            parse_recordset_id("z1/r1").ok(),
            Some(("z1".to_string(), "r1".to_string()))
        );
        assert!(parse_recordset_id("z1").is_err());
        assert!(parse_recordset_id("/r1").is_err());
    }

    #[test]
    fn zone_tag_types() {
        let c = client();
        assert!(zone_tags_base(&c, "private", "z1").ends_with("/v2/p1/DNS-private_zone/z1"));
        assert!(zone_tags_base(&c, "public", "z1").ends_with("/v2/p1/DNS-public_zone/z1"));
        assert!(recordset_tags_base(&c, "private", "r1").ends_with("/v2/p1/DNS-private_recordset/r1"));
    }
}
