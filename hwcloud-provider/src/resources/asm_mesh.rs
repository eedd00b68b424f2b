//! `huaweicloud_asm_mesh`

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::extract::path_search;
use hwcloud_sdk::request::{remove_nil, value_ignore_empty};
use hwcloud_sdk::services::asm;
use serde_json::{Value, json};

use crate::common::{check_deleted, expand_resource_tags};
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult, ResultExt};
use crate::resource_data::{ResourceData, TimeoutKind, Timeouts};
use crate::schema::{Schema, SchemaMap, enable_force_new_schema, region_schema};
use crate::traits::Resource;
use crate::wait::{RefreshResult, StateChangeConf};

pub struct AsmMesh;

fn selector_schema() -> Schema {
    Schema::block_list(BTreeMap::from([
        ("key", Schema::string().required()),
        ("operator", Schema::string().required()),
        ("values", Schema::list(Schema::string()).required()),
    ]))
    .required()
    .max_items(1)
}

/// `{field_selector}` wrapper used by both `nodes` and `namespaces`.
fn field_selector_block() -> Schema {
    Schema::block_list(BTreeMap::from([("field_selector", selector_schema())]))
        .required()
        .max_items(1)
}

fn clusters_schema() -> Schema {
    Schema::block_list(BTreeMap::from([
        ("cluster_id", Schema::string().required()),
        (
            "installation",
            Schema::block_list(BTreeMap::from([("nodes", field_selector_block())]))
                .required()
                .max_items(1),
        ),
        (
            "injection",
            Schema::block_list(BTreeMap::from([("namespaces", field_selector_block())]))
                .optional()
                .max_items(1),
        ),
    ]))
    .required()
}

fn first(v: &Value) -> Option<&Value> {
    v.as_array().and_then(|a| a.first())
}

fn build_field_selector(raw: &Value) -> Value {
    let Some(sel) = first(raw) else {
        return Value::Null;
    };
    json!({
        "key": sel["key"],
        "operator": sel["operator"],
        "values": sel["values"],
    })
}

/// `[{field_selector: [...]}]` → `{"fieldSelector": {...}}`.
fn build_selector_wrapper(raw: &Value) -> Value {
    match first(raw) {
        Some(inner) => json!({"fieldSelector": build_field_selector(&inner["field_selector"])}),
        None => Value::Null,
    }
}

fn build_clusters(clusters: &[Value], project_id: &str) -> Value {
    clusters
        .iter()
        .map(|c| {
            json!({
                "clusterID": c["cluster_id"],
                "projectID": project_id,
                "installation": first(&c["installation"])
                    .map_or(Value::Null, |i| json!({"nodes": build_selector_wrapper(&i["nodes"])})),
                "injection": first(&c["injection"])
                    .map_or(Value::Null, |i| json!({"namespaces": build_selector_wrapper(&i["namespaces"])})),
            })
        })
        .collect()
}

fn build_create_body(d: &ResourceData, project_id: &str) -> Value {
    let clusters = d.get_list("extend_params.0.clusters");
    let tags = expand_resource_tags(&d.get_map("tags"));
    remove_nil(json!({
        "apiVersion": "v1",
        "kind": "mesh",
        "metadata": {
            "name": d.get("name"),
            "annotations": value_ignore_empty(d.get("annotations").clone()),
            "labels": value_ignore_empty(d.get("labels").clone()),
        },
        "spec": {
            "type": d.get("type"),
            "version": d.get("version"),
            "tags": tags,
            "extendParams": {"clusters": build_clusters(&clusters, project_id)},
        },
    }))
}

/// Report `COMPLETE` once the mesh phase is in `targets`. A missing mesh has phase `Deleted`.
async fn mesh_state(client: &ServiceClient, id: &str, targets: &[&str]) -> RefreshResult {
    let (body, phase) = match asm::get_mesh(client, id).await {
        Ok(body) => {
            let phase = asm::mesh_phase(&body).ok_or_else(|| {
                ProviderError::Serialization("error parsing status.phase from response body".to_string())
            })?;
            (body, phase)
        }
        Err(e) if e.is_not_found() => (Value::Null, "Deleted".to_string()),
        Err(e) => return Err(ProviderError::from(e).with_context("error retrieving ASM mesh")),
    };

    if asm::FAILURE_PHASES.contains(&phase.as_str()) {
        return Err(ProviderError::UnexpectedState {
            state: phase,
            target: targets.iter().map(ToString::to_string).collect(),
        });
    }
    let state = if targets.contains(&phase.as_str()) { "COMPLETE" } else { "PENDING" };
    Ok(Some((body, state.to_string())))
}

async fn wait_for_phase(client: &ServiceClient, id: &str, targets: &[&str], timeout: Duration) -> ProviderResult<Value> {
    StateChangeConf::new(&["PENDING"], &["COMPLETE"], timeout, || {
        mesh_state(client, id, targets).boxed()
    })
    .delay(Duration::from_secs(20))
    .poll_interval(Duration::from_secs(10))
    .wait_for_state()
    .await
}

#[async_trait]
impl Resource for AsmMesh {
    fn type_name(&self) -> &'static str {
        "huaweicloud_asm_mesh"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            ("name", Schema::string().required().description("Specifies mesh name.")),
            ("type", Schema::string().required().description("Specifies the mesh type.")),
            ("version", Schema::string().required().description("Specifies the mesh version.")),
            ("annotations", Schema::map().optional()),
            ("labels", Schema::map().optional()),
            (
                "extend_params",
                Schema::block_list(BTreeMap::from([("clusters", clusters_schema())]))
                    .required()
                    .max_items(1),
            ),
            ("tags", Schema::map().optional()),
            ("enable_force_new", enable_force_new_schema()),
            ("status", Schema::string().computed()),
            ("created_at", Schema::string().computed()),
        ])
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            create: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(30 * 60),
            ..Timeouts::default()
        }
    }

    fn non_updatable_params(&self) -> &'static [&'static str] {
        &["name", "type", "version", "annotations", "labels", "tags", "extend_params"]
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("asm", &region)
            .await
            .context("error creating ASM client")?;

        let body = build_create_body(d, &client.project_id);
        let resp = asm::create_mesh(&client, body).await.context("error creating mesh")?;
        let id = asm::mesh_id(&resp).ok_or_else(|| {
            ProviderError::Serialization("error creating mesh: ID is not found in API response".to_string())
        })?;
        d.set_id(id.clone());

        wait_for_phase(&client, &id, &["Running"], d.timeout(TimeoutKind::Create))
            .await
            .context(format!("error waiting for the status of mesh ({id}) to become running"))?;
        Ok(())
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("asm", &region)
            .await
            .context("error creating ASM client")?;

        let body = match asm::get_mesh(&client, d.id()).await {
            Ok(body) => body,
            Err(e) => return check_deleted(d, e, "error retrieving ASM mesh"),
        };

        // extend_params, annotations, labels and tags are not returned by the API.
        let get = |expr: &str| path_search(expr, &body).unwrap_or(Value::Null);
        d.set("region", region)?;
        d.set("name", get("metadata.name"))?;
        d.set("created_at", get("metadata.creationTimestamp"))?;
        d.set("type", get("spec.type"))?;
        d.set("version", get("spec.version"))?;
        d.set("status", get("status.phase"))?;
        Ok(())
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("asm", &region)
            .await
            .context("error creating ASM client")?;

        let id = d.id().to_string();
        asm::delete_mesh(&client, &id).await.context("error deleting mesh")?;
        wait_for_phase(&client, &id, &["Deleted"], d.timeout(TimeoutKind::Delete))
            .await
            .context(format!("error waiting for the mesh ({id}) to be deleted"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::prepare_config;

    #[test]
    fn create_body_maps_nested_blocks() {
        let raw = json!({
            "name": "mesh-1",
            "type": "InCluster",
            "version": "1.18.7-r5",
            "tags": {"env": "test"},
            "extend_params": [{
                "clusters": [{
                    "cluster_id": "cce-1",
                    "installation": [{"nodes": [{"field_selector": [{
                        "key": "kubernetes.io/hostname",
                        "operator": "In",
                        "values": ["192.168.0.10"]
                    }]}]}]
                }]
            }]
        });
        let config = prepare_config(&AsmMesh.schema(), raw.as_object().unwrap_or(&serde_json::Map::new()))
            .unwrap();
        let d = ResourceData::new(AsmMesh.schema(), config, Timeouts::default());

        let body = build_create_body(&d, "p1");
        assert_eq!(body["metadata"], json!({"name": "mesh-1"}));
        assert_eq!(body["spec"]["tags"], json!([{"key": "env", "value": "test"}]));
        let cluster = &body["spec"]["extendParams"]["clusters"][0];
        assert_eq!(cluster["clusterID"], "cce-1");
        assert_eq!(cluster["projectID"], "p1");
        assert_eq!(cluster["installation"]["nodes"]["fieldSelector"]["operator"], "In");
        assert!(cluster.get("injection").is_none());
    }
}
