//! `data.huaweicloud_asm_meshes`

use std::collections::BTreeMap;

use async_trait::async_trait;
use hwcloud_sdk::extract::path_search_or;
use hwcloud_sdk::pagination::{Pager, SinglePage};
use hwcloud_sdk::services::asm;
use serde_json::{Value, json};

use super::query_id;
use crate::config::Config;
use crate::error::{ProviderResult, ResultExt};
use crate::filters::filter_by_fields;
use crate::resource_data::ResourceData;
use crate::schema::{Schema, SchemaMap, region_schema};
use crate::traits::DataSource;

pub struct AsmMeshes;

fn flatten_mesh(m: &Value) -> Value {
    let get = |path: &str| path_search_or(path, m, Value::Null);
    json!({
        "id": get("metadata.uid"),
        "name": get("metadata.name"),
        "type": get("spec.type"),
        "version": get("spec.version"),
        "status": get("status.phase"),
        "created_at": get("metadata.creationTimestamp"),
    })
}

fn filter_meshes(items: Vec<Value>, d: &ResourceData) -> Vec<Value> {
    filter_by_fields(
        items,
        &[
            ("metadata.uid", d.get("mesh_id").clone()),
            ("metadata.name", d.get("name").clone()),
            ("spec.type", d.get("type").clone()),
            ("spec.version", d.get("version").clone()),
        ],
    )
}

#[async_trait]
impl DataSource for AsmMeshes {
    fn type_name(&self) -> &'static str {
        "huaweicloud_asm_meshes"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            ("mesh_id", Schema::string().optional()),
            ("name", Schema::string().optional()),
            ("type", Schema::string().optional()),
            ("version", Schema::string().optional()),
            (
                "meshes",
                Schema::block_list(BTreeMap::from([
                    ("id", Schema::string().computed()),
                    ("name", Schema::string().computed()),
                    ("type", Schema::string().computed()),
                    ("version", Schema::string().computed()),
                    ("status", Schema::string().computed()),
                    ("created_at", Schema::string().computed()),
                ]))
                .computed(),
            ),
        ])
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("asm", &region)
            .await
            .context("error creating ASM client")?;

        let items = Pager::new(&client, asm::meshes_url(&client), SinglePage::new("items"))
            .all_items()
            .await
            .context("error retrieving meshes")?;
        let meshes = filter_meshes(items, d);

        d.set_id(query_id());
        d.set("region", region)?;
        d.set("meshes", meshes.iter().map(flatten_mesh).collect::<Vec<_>>())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::new_data;

    fn mesh(uid: &str, name: &str, mesh_type: &str) -> Value {
        json!({
            "metadata": {"uid": uid, "name": name, "creationTimestamp": "2024-01-02T03:04:05Z"},
            "spec": {"type": mesh_type, "version": "1.18.7-r5"},
            "status": {"phase": "Running"},
        })
    }

    #[test]
    fn filters_on_nested_fields() {
        let d = new_data(AsmMeshes.schema(), &json!({"type": "InCluster"}));
        let out = filter_meshes(
            vec![mesh("m1", "a", "InCluster"), mesh("m2", "b", "Managed")],
            &d,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(flatten_mesh(&out[0])["id"], "m1");
    }

    #[test]
    fn flatten_reads_phase_and_timestamp() {
        let m = flatten_mesh(&mesh("m1", "a", "InCluster"));
        assert_eq!(m["status"], "Running");
        assert_eq!(m["created_at"], "2024-01-02T03:04:05Z");
        assert_eq!(m["version"], "1.18.7-r5");
    }
}
