//! `data.huaweicloud_dns_zones`

use std::collections::BTreeMap;

use async_trait::async_trait;
use hwcloud_sdk::pagination::{LinkedPage, Pager};
use hwcloud_sdk::services::dns::{self, ListZoneOpts};
use serde_json::{Value, json};

use super::query_id;
use crate::config::Config;
use crate::error::{ProviderResult, ResultExt};
use crate::resource_data::ResourceData;
use crate::schema::{Schema, SchemaMap, Validator, region_schema};
use crate::traits::DataSource;

pub struct DnsZones;

/// `key1,value1|key2,value2`, the form the zone list API takes.
fn tags_query(tags: &BTreeMap<String, String>) -> Option<String> {
    (!tags.is_empty()).then(|| {
        tags.iter()
            .map(|(k, v)| format!("{k},{v}"))
            .collect::<Vec<_>>()
            .join("|")
    })
}

fn build_list_opts(cfg: &Config, d: &ResourceData) -> ListZoneOpts {
    let non_empty = |s: String| Some(s).filter(|s| !s.is_empty());
    ListZoneOpts {
        zone_type: d.get_string("zone_type"),
        name: non_empty(d.get_string("name")),
        status: non_empty(d.get_string("status")),
        tags: tags_query(&d.get_map("tags")),
        enterprise_project_id: non_empty(cfg.get_enterprise_project_id(d)),
        search_mode: non_empty(d.get_string("search_mode")),
        sort_key: non_empty(d.get_string("sort_key")),
        sort_dir: non_empty(d.get_string("sort_dir")),
        limit: 500,
    }
}

/// Narrow listed zones by ID, and by exact name in `equal` mode.
///
/// Names are compared without the trailing dot the API appends. In the default `like`
/// mode the API's own fuzzy match stands.
fn filter_zones(zones: Vec<Value>, zone_id: &str, name: &str, search_mode: &str) -> Vec<Value> {
    let exact = search_mode == "equal" && !name.is_empty();
    let want = name.trim_end_matches('.');
    zones
        .into_iter()
        .filter(|z| zone_id.is_empty() || z["id"].as_str() == Some(zone_id))
        .filter(|z| !exact || z["name"].as_str().map(|n| n.trim_end_matches('.')) == Some(want))
        .collect()
}

fn flatten_zone(z: &Value) -> Value {
    json!({
        "id": z["id"],
        "name": z["name"],
        "email": z["email"],
        "zone_type": z["zone_type"],
        "ttl": z["ttl"],
        "description": z["description"],
        "status": z["status"],
        "record_num": z["record_num"],
        "enterprise_project_id": z["enterprise_project_id"],
        "masters": z["masters"].as_array().cloned().unwrap_or_default(),
    })
}

#[async_trait]
impl DataSource for DnsZones {
    fn type_name(&self) -> &'static str {
        "huaweicloud_dns_zones"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            (
                "zone_type",
                Schema::string()
                    .optional()
                    .default_value("public")
                    .validate(Validator::StringInSlice(&["public", "private"])),
            ),
            ("zone_id", Schema::string().optional()),
            ("name", Schema::string().optional()),
            (
                "search_mode",
                Schema::string()
                    .optional()
                    .validate(Validator::StringInSlice(&["like", "equal"])),
            ),
            ("status", Schema::string().optional()),
            (
                "sort_key",
                Schema::string()
                    .optional()
                    .validate(Validator::StringInSlice(&["name", "created_at", "updated_at"])),
            ),
            (
                "sort_dir",
                Schema::string()
                    .optional()
                    .validate(Validator::StringInSlice(&["asc", "desc"])),
            ),
            ("tags", Schema::map().optional()),
            ("enterprise_project_id", Schema::string().optional()),
            (
                "zones",
                Schema::block_list(BTreeMap::from([
                    ("id", Schema::string().computed()),
                    ("name", Schema::string().computed()),
                    ("email", Schema::string().computed()),
                    ("zone_type", Schema::string().computed()),
                    ("ttl", Schema::int().computed()),
                    ("description", Schema::string().computed()),
                    ("status", Schema::string().computed()),
                    ("record_num", Schema::int().computed()),
                    ("enterprise_project_id", Schema::string().computed()),
                    ("masters", Schema::list(Schema::string()).computed()),
                ]))
                .computed(),
            ),
        ])
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let service = if d.get_string("zone_type") == "private" { "dns_region" } else { "dns" };
        let client = cfg
            .new_service_client(service, &region)
            .await
            .context("error creating DNS client")?;

        let url = dns::list_zones_url(&client, &build_list_opts(cfg, d))?;
        let zones = Pager::new(&client, url, LinkedPage::new("zones"))
            .all_items()
            .await
            .context("error retrieving DNS zones")?;
        let zones = filter_zones(
            zones,
            &d.get_string("zone_id"),
            &d.get_string("name"),
            &d.get_string("search_mode"),
        );
        log::debug!("{} DNS zones matched", zones.len());

        d.set_id(query_id());
        d.set("region", region)?;
        d.set("zones", zones.iter().map(flatten_zone).collect::<Vec<_>>())?;
        Ok(())
    }
}
