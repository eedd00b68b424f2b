//! `data.huaweicloud_vpc_subnets`

use std::collections::BTreeMap;

use async_trait::async_trait;
use hwcloud_sdk::pagination::{MarkerPage, Pager};
use hwcloud_sdk::services::vpc::{self, ListSubnetOpts};
use serde_json::{Value, json};

use super::query_id;
use crate::config::Config;
use crate::error::{ProviderResult, ResultExt};
use crate::filters::filter_by_fields;
use crate::resource_data::ResourceData;
use crate::schema::{Schema, SchemaMap, Validator, region_schema};
use crate::traits::DataSource;

pub struct VpcSubnets;

const PAGE_SIZE: u32 = 100;

/// (state key, API field)
const SUBNET_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("description", "description"),
    ("cidr", "cidr"),
    ("gateway_ip", "gateway_ip"),
    ("vpc_id", "vpc_id"),
    ("status", "status"),
    ("availability_zone", "availability_zone"),
    ("primary_dns", "primary_dns"),
    ("secondary_dns", "secondary_dns"),
    ("dhcp_enable", "dhcp_enable"),
    ("ipv6_enable", "ipv6_enable"),
    ("ipv6_cidr", "cidr_v6"),
    ("ipv6_gateway", "gateway_ip_v6"),
    ("ipv4_subnet_id", "neutron_subnet_id"),
];

fn flatten_subnet(s: &Value) -> Value {
    let mut out = serde_json::Map::new();
    for (key, field) in SUBNET_FIELDS {
        out.insert((*key).to_string(), s[*field].clone());
    }
    out.insert("dns_list".to_string(), json!(s["dnsList"].as_array().cloned().unwrap_or_default()));
    Value::Object(out)
}

fn filter_subnets(items: Vec<Value>, d: &ResourceData) -> Vec<Value> {
    filter_by_fields(
        items,
        &[
            ("id", d.get("id").clone()),
            ("name", d.get("name").clone()),
            ("cidr", d.get("cidr").clone()),
            ("status", d.get("status").clone()),
            ("gateway_ip", d.get("gateway_ip").clone()),
            ("availability_zone", d.get("availability_zone").clone()),
        ],
    )
}

#[async_trait]
impl DataSource for VpcSubnets {
    fn type_name(&self) -> &'static str {
        "huaweicloud_vpc_subnets"
    }

    fn schema(&self) -> SchemaMap {
        let subnet = BTreeMap::from_iter(
            SUBNET_FIELDS
                .iter()
                .map(|(key, _)| match *key {
                    "dhcp_enable" | "ipv6_enable" => (*key, Schema::bool().computed()),
                    _ => (*key, Schema::string().computed()),
                })
                .chain([("dns_list", Schema::list(Schema::string()).computed())]),
        );
        BTreeMap::from([
            ("region", region_schema()),
            ("id", Schema::string().optional()),
            ("vpc_id", Schema::string().optional()),
            ("name", Schema::string().optional()),
            ("cidr", Schema::string().optional().validate(Validator::Cidr)),
            ("gateway_ip", Schema::string().optional()),
            (
                "status",
                Schema::string()
                    .optional()
                    .validate(Validator::StringInSlice(&["ACTIVE", "UNKNOWN", "ERROR"])),
            ),
            ("availability_zone", Schema::string().optional()),
            ("subnets", Schema::block_list(subnet).computed()),
        ])
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("vpc", &region)
            .await
            .context("error creating VPC client")?;

        let opts = ListSubnetOpts {
            vpc_id: Some(d.get_string("vpc_id")).filter(|s| !s.is_empty()),
            limit: Some(PAGE_SIZE),
            marker: None,
        };
        let url = vpc::list_subnets_url(&client, &opts)?;
        let items = Pager::new(&client, url, MarkerPage::new("subnets").limit(PAGE_SIZE as usize))
            .all_items()
            .await
            .context("unable to retrieve subnets")?;
        let subnets = filter_subnets(items, d);
        log::debug!("retrieved {} subnets", subnets.len());

        d.set_id(query_id());
        d.set("region", region)?;
        d.set("subnets", subnets.iter().map(flatten_subnet).collect::<Vec<_>>())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::new_data;

    #[test]
    fn flatten_renames_ipv6_fields() {
        let subnet = flatten_subnet(&json!({
            "id": "s1", "cidr_v6": "2407:c080::/64", "dnsList": ["100.125.1.250"], "dhcp_enable": true
        }));
        assert_eq!(subnet["ipv6_cidr"], "2407:c080::/64");
        assert_eq!(subnet["dns_list"], json!(["100.125.1.250"]));
        assert_eq!(subnet["dhcp_enable"], true);
        assert_eq!(subnet["name"], Value::Null);
    }

    #[test]
    fn filters_by_name_and_cidr() {
        let d = new_data(VpcSubnets.schema(), &json!({"name": "web", "cidr": "10.0.0.0/24"}));
        let items = vec![
            json!({"id": "s1", "name": "web", "cidr": "10.0.0.0/24"}),
            json!({"id": "s2", "name": "web", "cidr": "10.0.1.0/24"}),
            json!({"id": "s3", "name": "db", "cidr": "10.0.0.0/24"}),
        ];
        let out = filter_subnets(items, &d);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], "s1");
    }
}
