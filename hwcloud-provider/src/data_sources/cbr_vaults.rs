//! `data.huaweicloud_cbr_vaults`

use std::collections::BTreeMap;

use async_trait::async_trait;
use hwcloud_sdk::pagination::{OffsetPage, Pager};
use hwcloud_sdk::services::cbr::{self, ListVaultOpts};
use serde_json::{Value, json};

use super::query_id;
use crate::common::{flatten_tag_list, tags_value};
use crate::config::Config;
use crate::error::{ProviderResult, ResultExt};
use crate::filters::{filter_by_fields, filter_by_tags};
use crate::resource_data::ResourceData;
use crate::schema::{Schema, SchemaMap, Validator, region_schema};
use crate::traits::DataSource;

pub struct CbrVaults;

const PAGE_SIZE: u32 = 100;

fn build_list_opts(cfg: &Config, d: &ResourceData) -> ListVaultOpts {
    let non_empty = |s: String| Some(s).filter(|s| !s.is_empty());
    ListVaultOpts {
        name: non_empty(d.get_string("name")),
        object_type: non_empty(d.get_string("type")),
        protect_type: non_empty(d.get_string("protection_type")),
        status: non_empty(d.get_string("status")),
        enterprise_project_id: non_empty(cfg.get_enterprise_project_id(d)),
        limit: PAGE_SIZE,
    }
}

fn flatten_vault(v: &Value) -> Value {
    let billing = &v["billing"];
    json!({
        "id": v["id"],
        "name": v["name"],
        "type": billing["object_type"],
        "protection_type": billing["protect_type"],
        "consistent_level": billing["consistent_level"],
        "size": billing["size"],
        "allocated": billing["allocated"].as_f64().map(cbr::mb_to_gb),
        "used": billing["used"].as_f64().map(cbr::mb_to_gb),
        "status": billing["status"],
        "auto_bind": v["auto_bind"],
        "auto_expand": v["auto_expand"],
        "enterprise_project_id": v["enterprise_project_id"],
        "tags": tags_value(&flatten_tag_list(&v["tags"])),
    })
}

#[async_trait]
impl DataSource for CbrVaults {
    fn type_name(&self) -> &'static str {
        "huaweicloud_cbr_vaults"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            ("name", Schema::string().optional()),
            (
                "type",
                Schema::string()
                    .optional()
                    .validate(Validator::StringInSlice(&["server", "disk", "turbo", "workspace"])),
            ),
            (
                "protection_type",
                Schema::string()
                    .optional()
                    .validate(Validator::StringInSlice(&["backup", "replication"])),
            ),
            ("consistent_level", Schema::string().optional()),
            ("status", Schema::string().optional()),
            ("enterprise_project_id", Schema::string().optional()),
            ("tags", Schema::map().optional()),
            (
                "vaults",
                Schema::block_list(BTreeMap::from([
                    ("id", Schema::string().computed()),
                    ("name", Schema::string().computed()),
                    ("type", Schema::string().computed()),
                    ("protection_type", Schema::string().computed()),
                    ("consistent_level", Schema::string().computed()),
                    ("size", Schema::int().computed()),
                    ("allocated", Schema::float().computed()),
                    ("used", Schema::float().computed()),
                    ("status", Schema::string().computed()),
                    ("auto_bind", Schema::bool().computed()),
                    ("auto_expand", Schema::bool().computed()),
                    ("enterprise_project_id", Schema::string().computed()),
                    ("tags", Schema::map().computed()),
                ]))
                .computed(),
            ),
        ])
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("cbr", &region)
            .await
            .context("error creating CBR client")?;

        let url = cbr::list_vaults_url(&client, &build_list_opts(cfg, d))?;
        let items = Pager::new(&client, url, OffsetPage::new("vaults", PAGE_SIZE as usize).total_path("count"))
            .all_items()
            .await
            .context("error retrieving vaults")?;
        let items = filter_by_fields(
            items,
            &[
                ("name", d.get("name").clone()),
                ("billing.consistent_level", d.get("consistent_level").clone()),
            ],
        );
        let vaults = filter_by_tags(items, "tags", &d.get_map("tags"));

        d.set_id(query_id());
        d.set("region", region)?;
        d.set("vaults", vaults.iter().map(flatten_vault).collect::<Vec<_>>())?;
        Ok(())
    }
}
