//! VPC v1 API: VPCs and subnets

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::take_member;
use crate::client::{RequestOpts, ServiceClient};
use crate::error::Result;
use crate::request::{FieldRule, RequestBody, build_query_string, build_request_body};

// ============ VPC ============

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateVpcOpts {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<String>,
}

impl RequestBody for CreateVpcOpts {
    fn rules() -> &'static [FieldRule] {
        &[FieldRule::Required("name")]
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateVpcOpts {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    /// `Some("")` clears the description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RequestBody for UpdateVpcOpts {
    fn rules() -> &'static [FieldRule] {
        &[FieldRule::Required("name")]
    }
}

pub fn vpc_url(client: &ServiceClient, id: &str) -> String {
    client.service_url(&["vpcs", id])
}

/// `POST vpcs`, returning the `vpc` object.
pub async fn create_vpc(client: &ServiceClient, opts: &CreateVpcOpts) -> Result<Value> {
    let body = build_request_body(opts, Some("vpc"))?;
    let resp = client
        .request(
            Method::POST,
            &client.service_url(&["vpcs"]),
            RequestOpts::json(body).ok_codes(&[200]),
        )
        .await?;
    take_member(&client.service, resp.body, "vpc")
}

pub async fn get_vpc(client: &ServiceClient, id: &str) -> Result<Value> {
    let body = client.get(&vpc_url(client, id)).await?;
    take_member(&client.service, body, "vpc")
}

pub async fn update_vpc(client: &ServiceClient, id: &str, opts: &UpdateVpcOpts) -> Result<Value> {
    let body = build_request_body(opts, Some("vpc"))?;
    let resp = client
        .request(
            Method::PUT,
            &vpc_url(client, id),
            RequestOpts::json(body).ok_codes(&[200]),
        )
        .await?;
    take_member(&client.service, resp.body, "vpc")
}

pub async fn delete_vpc(client: &ServiceClient, id: &str) -> Result<()> {
    client
        .request(
            Method::DELETE,
            &vpc_url(client, id),
            RequestOpts::default().ok_codes(&[204]),
        )
        .await?;
    Ok(())
}

// ============ Subnet ============

/// One `extra_dhcp_opts` entry. `opt_name` is `addresstime`, `ntp` or `domainname`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraDhcpOpt {
    pub opt_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opt_value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateSubnetOpts {
    pub name: String,
    pub cidr: String,
    pub gateway_ip: String,
    pub vpc_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_dns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_dns: Option<String>,
    #[serde(rename = "dnsList", skip_serializing_if = "Vec::is_empty")]
    pub dns_list: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_dhcp_opts: Vec<ExtraDhcpOpt>,
}

impl RequestBody for CreateSubnetOpts {
    fn rules() -> &'static [FieldRule] {
        &[
            FieldRule::Required("name"),
            FieldRule::Required("cidr"),
            FieldRule::Required("gateway_ip"),
            FieldRule::Required("vpc_id"),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSubnetOpts {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_dns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_dns: Option<String>,
    #[serde(rename = "dnsList", skip_serializing_if = "Option::is_none")]
    pub dns_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_dhcp_opts: Option<Vec<ExtraDhcpOpt>>,
}

impl RequestBody for UpdateSubnetOpts {
    fn rules() -> &'static [FieldRule] {
        &[FieldRule::Required("name")]
    }
}

/// Query for `GET subnets`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListSubnetOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl RequestBody for ListSubnetOpts {}

pub fn subnet_url(client: &ServiceClient, id: &str) -> String {
    client.service_url(&["subnets", id])
}

/// Update and delete live below the owning VPC.
pub fn vpc_subnet_url(client: &ServiceClient, vpc_id: &str, id: &str) -> String {
    client.service_url(&["vpcs", vpc_id, "subnets", id])
}

/// First page URL for a subnet listing.
pub fn list_subnets_url(client: &ServiceClient, opts: &ListSubnetOpts) -> Result<String> {
    Ok(format!(
        "{}{}",
        client.service_url(&["subnets"]),
        build_query_string(opts)?
    ))
}

/// `POST subnets`, returning the `subnet` object.
pub async fn create_subnet(client: &ServiceClient, opts: &CreateSubnetOpts) -> Result<Value> {
    let body = build_request_body(opts, Some("subnet"))?;
    let resp = client
        .request(
            Method::POST,
            &client.service_url(&["subnets"]),
            RequestOpts::json(body).ok_codes(&[200]),
        )
        .await?;
    take_member(&client.service, resp.body, "subnet")
}

pub async fn get_subnet(client: &ServiceClient, id: &str) -> Result<Value> {
    let body = client.get(&subnet_url(client, id)).await?;
    take_member(&client.service, body, "subnet")
}

pub async fn update_subnet(
    client: &ServiceClient,
    vpc_id: &str,
    id: &str,
    opts: &UpdateSubnetOpts,
) -> Result<()> {
    let body = build_request_body(opts, Some("subnet"))?;
    client
        .request(
            Method::PUT,
            &vpc_subnet_url(client, vpc_id, id),
            RequestOpts::json(body).ok_codes(&[200]),
        )
        .await?;
    Ok(())
}

pub async fn delete_subnet(client: &ServiceClient, vpc_id: &str, id: &str) -> Result<()> {
    client
        .request(
            Method::DELETE,
            &vpc_subnet_url(client, vpc_id, id),
            RequestOpts::default().ok_codes(&[204]),
        )
        .await?;
    Ok(())
}

/// Tag base for a VPC resource (`vpcs` or `subnets`) on the v2.0 tag API.
pub fn tags_base(client: &ServiceClient, resource_type: &str, id: &str) -> String {
    client.url_for(
        "v2.0/{project_id}/{resource_type}/{id}",
        &[("resource_type", resource_type), ("id", id)],
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::Credentials;
    use crate::error::SdkError;

    fn client() -> ServiceClient {
        ServiceClient::builder("vpc", Credentials::Token("t".into()))
            .region("cn-north-4")
            .project_id("p1")
            .http_client(reqwest::Client::new())
            .build()
            .unwrap()
    }

    #[test]
    fn subnet_body_uses_api_names() {
        let opts = CreateSubnetOpts {
            name: "subnet-1".into(),
            cidr: "192.168.0.0/24".into(),
            gateway_ip: "192.168.0.1".into(),
            vpc_id: "vpc-1".into(),
            dhcp_enable: Some(true),
            dns_list: vec!["100.125.1.250".into()],
            extra_dhcp_opts: vec![ExtraDhcpOpt {
                opt_name: "ntp".into(),
                opt_value: Some("10.0.0.1".into()),
            }],
            ..Default::default()
        };
        let body = build_request_body(&opts, Some("subnet")).unwrap();
        assert_eq!(body["subnet"]["dnsList"], json!(["100.125.1.250"]));
        assert_eq!(body["subnet"]["extra_dhcp_opts"][0]["opt_name"], "ntp");
        assert!(body["subnet"].get("description").is_none());
    }

    #[test]
    fn subnet_requires_gateway() {
        let opts = CreateSubnetOpts {
            name: "s".into(),
            cidr: "10.0.0.0/24".into(),
            vpc_id: "v".into(),
            ..Default::default()
        };
        assert!(matches!(
            build_request_body(&opts, Some("subnet")),
            Err(SdkError::MissingRequiredField { field }) if field == "gateway_ip"
        ));
    }

    #[test]
    fn urls() {
        let c = client();
        assert_eq!(
            vpc_subnet_url(&c, "v1", "s1"),
            "https://vpc.cn-north-4.myhuaweicloud.com/v1/p1/vpcs/v1/subnets/s1"
        );
        assert_eq!(
            list_subnets_url(
                &c,
                &ListSubnetOpts {
                    vpc_id: Some("v1".into()),
                    limit: Some(100),
                    marker: None,
                }
            )
            .unwrap(),
            "https://vpc.cn-north-4.myhuaweicloud.com/v1/p1/subnets?limit=100&vpc_id=v1"
        );
        assert_eq!(
            tags_base(&c, "subnets", "s1"),
            "https://vpc.cn-north-4.myhuaweicloud.com/v2.0/p1/subnets/s1"
        );
    }
}
