//! `huaweicloud_vpc_subnet`

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::services::vpc::{self, CreateSubnetOpts, ExtraDhcpOpt, UpdateSubnetOpts};
use hwcloud_sdk::services::tags;
use serde_json::Value;

use crate::common::{check_deleted, string_map, tags_value};
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult, ResultExt};
use crate::resource_data::{ResourceData, TimeoutKind, Timeouts};
use crate::schema::{Schema, SchemaMap, Validator, region_schema};
use crate::traits::Resource;
use crate::wait::{RefreshResult, StateChangeConf};

pub struct VpcSubnet;

const PUBLIC_DNS: &[&str] = &["8.8.8.8", "114.114.114.114"];

/// Private DNS servers of each region.
fn private_dns(region: &str) -> Option<&'static [&'static str]> {
    let servers: &[&str] = match region {
        "cn-north-1" => &["100.125.1.250", "100.125.21.250"],
        "cn-north-4" | "cn-southwest-2" => &["100.125.1.250", "100.125.129.250"],
        "cn-north-9" => &["100.125.1.250", "100.125.107.250"],
        "cn-east-2" => &["100.125.17.29", "100.125.135.29"],
        "cn-east-3" => &["100.125.1.250", "100.125.64.250"],
        "cn-south-1" => &["100.125.1.250", "100.125.136.29"],
        "cn-south-4" => &["100.125.0.167"],
        "ap-southeast-1" => &["100.125.1.250", "100.125.3.250"],
        "ap-southeast-2" => &["100.125.1.250", "100.125.1.251"],
        "ap-southeast-3" => &["100.125.1.250", "100.125.128.250"],
        "af-south-1" => &["100.125.1.250", "100.125.1.14"],
        "tr-west-1" => &["100.125.2.250", "100.125.2.251"],
        "sa-brazil-1" | "na-mexico-1" => &["100.125.1.22", "100.125.1.90"],
        "la-north-2" => &["100.125.1.250", "100.125.1.242"],
        "la-south-2" | "sa-chile-1" => &["100.125.1.250", "100.125.0.250"],
        _ => return None,
    };
    Some(servers)
}

/// DNS list for a new subnet.
///
/// An explicit `dns_list` wins. With only `primary_dns` set the API picks the list.
/// Otherwise the region's private DNS servers are used, falling back to public ones.
fn build_dns_list(d: &ResourceData, region: &str) -> Vec<String> {
    let explicit = d.get_string_list("dns_list");
    if !explicit.is_empty() {
        return explicit;
    }
    if d.get_ok("primary_dns").is_some() {
        return Vec::new();
    }
    let servers = private_dns(region).unwrap_or_else(|| {
        log::warn!("no private DNS servers known for {region}, using {PUBLIC_DNS:?}");
        PUBLIC_DNS
    });
    servers.iter().map(ToString::to_string).collect()
}

/// DHCP extra options. On update, cleared `ntp` and `domainname` are sent without value.
fn build_dhcp_opts(d: &ResourceData, update: bool) -> Vec<ExtraDhcpOpt> {
    let mut opts = Vec::new();
    for (key, name, clear_on_update) in [
        ("dhcp_lease_time", "addresstime", false),
        ("dhcp_ipv6_lease_time", "ipv6_addresstime", false),
        ("ntp_server_address", "ntp", true),
        ("dhcp_domain_name", "domainname", true),
    ] {
        let value = d.get_string(key);
        if !value.is_empty() {
            opts.push(ExtraDhcpOpt {
                opt_name: name.to_string(),
                opt_value: Some(value),
            });
        } else if update && clear_on_update {
            opts.push(ExtraDhcpOpt {
                opt_name: name.to_string(),
                opt_value: None,
            });
        }
    }
    opts
}

fn build_create_opts(d: &ResourceData, region: &str) -> CreateSubnetOpts {
    let non_empty = |key: &str| Some(d.get_string(key)).filter(|s| !s.is_empty());
    CreateSubnetOpts {
        name: d.get_string("name"),
        cidr: d.get_string("cidr"),
        gateway_ip: d.get_string("gateway_ip"),
        vpc_id: d.get_string("vpc_id"),
        description: non_empty("description"),
        availability_zone: non_empty("availability_zone"),
        ipv6_enable: Some(d.get_bool("ipv6_enable")),
        dhcp_enable: Some(d.get_bool("dhcp_enable")),
        primary_dns: non_empty("primary_dns"),
        secondary_dns: non_empty("secondary_dns"),
        dns_list: build_dns_list(d, region),
        extra_dhcp_opts: build_dhcp_opts(d, false),
    }
}

fn build_update_opts(d: &ResourceData) -> ProviderResult<UpdateSubnetOpts> {
    let mut opts = UpdateSubnetOpts {
        name: d.get_string("name"),
        // Always sent: an omitted flag would turn DHCP off.
        dhcp_enable: Some(d.get_bool("dhcp_enable")),
        ..UpdateSubnetOpts::default()
    };
    if d.has_change("ipv6_enable") {
        if !d.get_bool("ipv6_enable") {
            return Err(ProviderError::Validation(
                "parameter cannot be disabled after IPv6 enable".to_string(),
            ));
        }
        opts.ipv6_enable = Some(true);
    }
    if d.has_change("description") {
        opts.description = Some(d.get_string("description"));
    }
    if d.has_change("primary_dns") {
        opts.primary_dns = Some(d.get_string("primary_dns"));
    }
    if d.has_change("secondary_dns") {
        opts.secondary_dns = Some(d.get_string("secondary_dns"));
    }
    if d.has_change("dns_list") {
        opts.dns_list = Some(d.get_string_list("dns_list"));
    }
    if d.has_changes(&["dhcp_lease_time", "ntp_server_address", "dhcp_ipv6_lease_time", "dhcp_domain_name"]) {
        opts.extra_dhcp_opts = Some(build_dhcp_opts(d, true));
    }
    Ok(opts)
}

async fn subnet_active_state(client: &ServiceClient, id: &str) -> RefreshResult {
    let subnet = vpc::get_subnet(client, id).await?;
    let status = subnet["status"].as_str().unwrap_or_default().to_string();
    match status.as_str() {
        "ACTIVE" => Ok(Some((subnet, status))),
        "DOWN" | "ERROR" => Err(ProviderError::UnexpectedState {
            state: status,
            target: vec!["ACTIVE".to_string()],
        }),
        _ => Ok(Some((subnet, "UNKNOWN".to_string()))),
    }
}

/// Delete and poll in one step; the API rejects deletion while ports are still detaching.
async fn subnet_delete_state(client: &ServiceClient, vpc_id: &str, id: &str) -> RefreshResult {
    let deleted = || -> RefreshResult { Ok(Some((Value::Null, "DELETED".to_string()))) };
    let retry = || -> RefreshResult { Ok(Some((Value::Null, "ACTIVE".to_string()))) };

    match vpc::get_subnet(client, id).await {
        Ok(_) => {}
        Err(e) if e.is_not_found() => {
            log::info!("successfully deleted subnet {id}");
            return deleted();
        }
        // Flow control (500) and transient enterprise project permission errors (403).
        Err(e) if matches!(e.status_code(), Some(403 | 500)) => {
            log::debug!("got {:?} when deleting subnet {id}, try again later", e.status_code());
            return retry();
        }
        Err(e) => return Err(e.into()),
    }

    match vpc::delete_subnet(client, vpc_id, id).await {
        Ok(()) => retry(),
        Err(e) if e.is_not_found() || e.status_code() == Some(400) => deleted(),
        Err(e) if matches!(e.status_code(), Some(409 | 500)) => retry(),
        Err(e) => Err(e.into()),
    }
}

fn flatten_dhcp_opts(d: &mut ResourceData, subnet: &Value) -> ProviderResult<()> {
    let opts = subnet["extra_dhcp_opts"].as_array().cloned().unwrap_or_default();
    for opt in opts {
        let key = match opt["opt_name"].as_str() {
            Some("ntp") => "ntp_server_address",
            Some("addresstime") => "dhcp_lease_time",
            Some("ipv6_addresstime") => "dhcp_ipv6_lease_time",
            Some("domainname") => "dhcp_domain_name",
            _ => continue,
        };
        d.set(key, opt["opt_value"].clone())?;
    }
    Ok(())
}

#[async_trait]
impl Resource for VpcSubnet {
    fn type_name(&self) -> &'static str {
        "huaweicloud_vpc_subnet"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            ("name", Schema::string().required()),
            ("cidr", Schema::string().required().force_new().validate(Validator::Cidr)),
            ("gateway_ip", Schema::string().required().force_new().validate(Validator::IpAddress)),
            ("vpc_id", Schema::string().required().force_new()),
            ("availability_zone", Schema::string().optional().computed().force_new()),
            ("description", Schema::string().optional()),
            ("ipv6_enable", Schema::bool().optional()),
            ("dhcp_enable", Schema::bool().optional().default_value(true)),
            ("primary_dns", Schema::string().optional().computed().validate(Validator::IpAddress)),
            ("secondary_dns", Schema::string().optional().computed().validate(Validator::IpAddress)),
            ("dns_list", Schema::list(Schema::string().validate(Validator::IpAddress)).optional().computed()),
            ("ntp_server_address", Schema::string().optional()),
            ("dhcp_lease_time", Schema::string().optional().computed()),
            ("dhcp_ipv6_lease_time", Schema::string().optional().computed()),
            ("dhcp_domain_name", Schema::string().optional()),
            ("tags", Schema::map().optional()),
            ("subnet_id", Schema::string().computed().description("Deprecated, use ipv4_subnet_id.")),
            ("ipv4_subnet_id", Schema::string().computed()),
            ("ipv6_subnet_id", Schema::string().computed()),
            ("ipv6_cidr", Schema::string().computed()),
            ("ipv6_gateway", Schema::string().computed()),
        ])
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            create: Duration::from_secs(5 * 60),
            ..Timeouts::default()
        }
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        if d.get_ok("secondary_dns").is_some() && d.get_ok("primary_dns").is_none() {
            return Err(ProviderError::Validation(
                "secondary_dns requires primary_dns to be set".to_string(),
            ));
        }
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("vpc", &region)
            .await
            .context("error creating networking client")?;

        let opts = build_create_opts(d, &region);
        log::debug!("create VPC subnet options: {opts:?}");
        let subnet = vpc::create_subnet(&client, &opts).await.context("error creating VPC subnet")?;
        let id = subnet["id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Serialization("error creating VPC subnet: ID is not found in API response".to_string()))?
            .to_string();
        d.set_id(id.clone());
        log::info!("VPC subnet ID: {id}");

        StateChangeConf::new(&["UNKNOWN"], &["ACTIVE"], d.timeout(TimeoutKind::Create), || {
            subnet_active_state(&client, &id).boxed()
        })
        .delay(Duration::from_secs(5))
        .poll_interval(Duration::from_secs(5))
        .wait_for_state()
        .await
        .context(format!("error waiting for subnet ({id}) to become ACTIVE"))?;

        let tags = cfg.merge_default_tags(d.get_map("tags"));
        if !tags.is_empty() {
            let base = vpc::tags_base(&client, "subnets", &id);
            tags::update_tags(&client, &base, &BTreeMap::new(), &tags)
                .await
                .context(format!("error setting tags of VPC subnet {id}"))?;
        }
        Ok(())
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("vpc", &region)
            .await
            .context("error creating networking client")?;
        let subnet = match vpc::get_subnet(&client, d.id()).await {
            Ok(subnet) => subnet,
            Err(e) => return check_deleted(d, e, "error retrieving VPC subnet"),
        };

        d.set("region", region)?;
        for (key, field) in [
            ("name", "name"),
            ("description", "description"),
            ("cidr", "cidr"),
            ("dns_list", "dnsList"),
            ("gateway_ip", "gateway_ip"),
            ("ipv6_enable", "ipv6_enable"),
            ("dhcp_enable", "dhcp_enable"),
            ("primary_dns", "primary_dns"),
            ("secondary_dns", "secondary_dns"),
            ("availability_zone", "availability_zone"),
            ("vpc_id", "vpc_id"),
            ("subnet_id", "neutron_subnet_id"),
            ("ipv4_subnet_id", "neutron_subnet_id"),
            ("ipv6_subnet_id", "neutron_subnet_id_v6"),
            ("ipv6_cidr", "cidr_v6"),
            ("ipv6_gateway", "gateway_ip_v6"),
        ] {
            d.set(key, subnet[field].clone())?;
        }
        flatten_dhcp_opts(d, &subnet)?;

        let base = vpc::tags_base(&client, "subnets", d.id());
        match tags::list_tags(&client, &base).await {
            Ok(tags) => d.set("tags", tags_value(&tags))?,
            Err(e) => log::warn!("error fetching tags of subnet ({}): {e}", d.id()),
        }
        Ok(())
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = cfg
            .new_service_client("vpc", &cfg.get_region(d))
            .await
            .context("error creating networking client")?;
        let id = d.id().to_string();

        if d.has_changes(&[
            "name",
            "description",
            "dhcp_enable",
            "primary_dns",
            "secondary_dns",
            "dns_list",
            "ipv6_enable",
            "dhcp_lease_time",
            "ntp_server_address",
            "dhcp_ipv6_lease_time",
            "dhcp_domain_name",
        ]) {
            let opts = build_update_opts(d)?;
            log::debug!("update VPC subnet options: {opts:?}");
            vpc::update_subnet(&client, &d.get_string("vpc_id"), &id, &opts)
                .await
                .context("error updating VPC subnet")?;
        }

        if d.has_change("tags") {
            let base = vpc::tags_base(&client, "subnets", &id);
            let old = string_map(d.get_change("tags").0);
            let new = cfg.merge_default_tags(d.get_map("tags"));
            tags::update_tags(&client, &base, &old, &new)
                .await
                .context(format!("error updating tags of VPC subnet {id}"))?;
        }
        Ok(())
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = cfg
            .new_service_client("vpc", &cfg.get_region(d))
            .await
            .context("error creating networking client")?;
        let id = d.id().to_string();
        let vpc_id = d.get_string("vpc_id");

        StateChangeConf::new(&["ACTIVE"], &["DELETED"], d.timeout(TimeoutKind::Delete), || {
            subnet_delete_state(&client, &vpc_id, &id).boxed()
        })
        .delay(Duration::from_secs(5))
        .poll_interval(Duration::from_secs(5))
        .wait_for_state()
        .await
        .context(format!("error deleting subnet {id}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::{changed_data, new_data};

    fn base() -> Value {
        json!({
            "name": "subnet-1",
            "cidr": "192.168.0.0/24",
            "gateway_ip": "192.168.0.1",
            "vpc_id": "vpc-1",
        })
    }

    #[test]
    fn dns_list_prefers_explicit_then_region() {
        let mut raw = base();
        raw["dns_list"] = json!(["1.1.1.1"]);
        let d = new_data(VpcSubnet.schema(), &raw);
        assert_eq!(build_dns_list(&d, "cn-north-4"), vec!["1.1.1.1"]);

        let mut raw = base();
        raw["primary_dns"] = json!("100.125.1.250");
        let d = new_data(VpcSubnet.schema(), &raw);
        assert!(build_dns_list(&d, "cn-north-4").is_empty());

        let d = new_data(VpcSubnet.schema(), &base());
        assert_eq!(build_dns_list(&d, "cn-north-4"), vec!["100.125.1.250", "100.125.129.250"]);
        assert_eq!(build_dns_list(&d, "eu-west-101"), vec!["8.8.8.8", "114.114.114.114"]);
    }

    #[test]
    fn create_opts_enable_dhcp_by_default() {
        let mut raw = base();
        raw["dhcp_lease_time"] = json!("24h");
        let d = new_data(VpcSubnet.schema(), &raw);
        let opts = build_create_opts(&d, "cn-north-4");
        assert_eq!(opts.dhcp_enable, Some(true));
        assert_eq!(opts.ipv6_enable, Some(false));
        assert_eq!(
            opts.extra_dhcp_opts,
            vec![ExtraDhcpOpt {
                opt_name: "addresstime".to_string(),
                opt_value: Some("24h".to_string()),
            }]
        );
    }

    #[test]
    fn update_clears_ntp_and_domain_name() {
        let mut prior = base();
        prior["ntp_server_address"] = json!("10.0.0.2");
        let d = changed_data(VpcSubnet.schema(), "s1", &prior, &base());
        let opts = build_update_opts(&d).unwrap();
        let names: Vec<_> = opts
            .extra_dhcp_opts
            .unwrap_or_default()
            .into_iter()
            .map(|o| (o.opt_name, o.opt_value))
            .collect();
        assert_eq!(names, vec![("ntp".to_string(), None), ("domainname".to_string(), None)]);
        assert_eq!(opts.description, None);
    }

    #[test]
    fn ipv6_cannot_be_disabled() {
        let mut prior = base();
        prior["ipv6_enable"] = json!(true);
        let mut planned = base();
        planned["ipv6_enable"] = json!(false);
        let d = changed_data(VpcSubnet.schema(), "s1", &prior, &planned);
        assert!(matches!(build_update_opts(&d), Err(ProviderError::Validation(_))));
    }
}
