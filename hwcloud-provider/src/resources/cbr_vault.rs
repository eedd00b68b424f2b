//! `huaweicloud_cbr_vault`
//!
//! Pay-per-use backup vaults. The `resources` block lists the protected objects: server and workspace
//! vaults carry one entry per server (with volume `excludes`), disk and turbo vaults carry a single
//! entry whose `includes` lists the protected IDs.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use hwcloud_sdk::{SdkError, ServiceClient};
use hwcloud_sdk::services::cbr::{self, BillingCreate, BillingUpdate, BindRules, CreateVaultOpts, UpdateVaultOpts};
use hwcloud_sdk::services::tags;
use serde_json::{Value, json};

use crate::common::{check_deleted, convert_expected_error_into_404, expand_resource_tags, flatten_tag_list, string_map, tags_value};
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult, ResultExt};
use crate::resource_data::{ResourceData, TimeoutKind, Timeouts};
use crate::schema::{Schema, SchemaMap, Validator, region_schema};
use crate::traits::Resource;
use crate::wait::{RefreshResult, StateChangeConf};

pub struct CbrVault;

const VAULT_TYPES: &[&str] = &["server", "disk", "turbo", "workspace"];

/// API resource type for a vault type.
fn resource_type(vault_type: &str) -> ProviderResult<&'static str> {
    match vault_type {
        "server" => Ok("OS::Nova::Server"),
        "disk" => Ok("OS::Cinder::Volume"),
        "turbo" => Ok("OS::Sfs::Turbo"),
        "workspace" => Ok("OS::Workspace::DesktopV2"),
        other => Err(ProviderError::Validation(format!("invalid vault type: {other}"))),
    }
}

fn is_server_like(vault_type: &str) -> bool {
    matches!(vault_type, "server" | "workspace")
}

fn strings(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|a| a.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Request items for `resources` blocks.
fn build_associate_resources(vault_type: &str, blocks: &[Value]) -> ProviderResult<Vec<Value>> {
    let rtype = resource_type(vault_type)?;
    if is_server_like(vault_type) {
        let mut out = Vec::with_capacity(blocks.len());
        for block in blocks {
            let server_id = block["server_id"].as_str().unwrap_or_default();
            if server_id.is_empty() {
                continue;
            }
            if !strings(&block["includes"]).is_empty() {
                return Err(ProviderError::Validation(
                    "server type vaults does not support 'includes'".to_string(),
                ));
            }
            let mut item = json!({"id": server_id, "type": rtype});
            let excludes = strings(&block["excludes"]);
            if !excludes.is_empty() {
                item["extra_info"] = json!({"exclude_volumes": excludes});
            }
            out.push(item);
        }
        return Ok(out);
    }

    match blocks {
        [] => Ok(Vec::new()),
        [block] => {
            if !strings(&block["excludes"]).is_empty() {
                return Err(ProviderError::Validation(
                    "disk-type and turbo-type vaults does not support 'excludes'".to_string(),
                ));
            }
            Ok(strings(&block["includes"])
                .into_iter()
                .map(|id| json!({"id": id, "type": rtype}))
                .collect())
        }
        _ => Err(ProviderError::Validation(
            "the size of resources cannot be greater than one for disk and turbo vaults".to_string(),
        )),
    }
}

/// Resource IDs to detach for removed `resources` blocks.
fn build_dissociate_ids(vault_type: &str, blocks: &[Value]) -> Vec<String> {
    if is_server_like(vault_type) {
        blocks
            .iter()
            .filter_map(|b| b["server_id"].as_str().filter(|s| !s.is_empty()).map(str::to_string))
            .collect()
    } else {
        blocks.first().map(|b| strings(&b["includes"])).unwrap_or_default()
    }
}

fn flatten_resources(vault_type: &str, resources: &Value) -> Value {
    let items = resources.as_array().cloned().unwrap_or_default();
    if is_server_like(vault_type) {
        return Value::Array(
            items
                .iter()
                .map(|r| {
                    let includes: Vec<Value> = r["extra_info"]["include_volumes"]
                        .as_array()
                        .map(|vols| vols.iter().map(|v| v["id"].clone()).collect())
                        .unwrap_or_default();
                    json!({
                        "server_id": r["id"],
                        "includes": includes,
                        "excludes": r["extra_info"]["exclude_volumes"].as_array().cloned().unwrap_or_default(),
                    })
                })
                .collect(),
        );
    }
    if items.is_empty() {
        return Value::Array(Vec::new());
    }
    let ids: Vec<Value> = items.iter().map(|r| r["id"].clone()).collect();
    json!([{ "includes": ids }])
}

fn bind_rules(d: &ResourceData) -> Option<BindRules> {
    let rules = d.get_map("bind_rules");
    (!rules.is_empty()).then(|| BindRules {
        tags: expand_resource_tags(&rules),
    })
}

fn optional_bool(d: &ResourceData, key: &str) -> Option<bool> {
    d.get_ok(key).and_then(Value::as_bool)
}

fn build_create_opts(cfg: &Config, d: &ResourceData) -> ProviderResult<CreateVaultOpts> {
    let non_empty = |s: String| Some(s).filter(|s| !s.is_empty());
    let vault_type = d.get_string("type");
    Ok(CreateVaultOpts {
        name: d.get_string("name"),
        billing: BillingCreate {
            cloud_type: non_empty(d.get_string("cloud_type")).unwrap_or_else(|| "public".to_string()),
            object_type: vault_type.clone(),
            protect_type: d.get_string("protection_type"),
            consistent_level: d.get_string("consistent_level"),
            size: d.get_int("size"),
            is_multi_az: optional_bool(d, "is_multi_az"),
        },
        resources: build_associate_resources(&vault_type, &d.get_list("resources"))?,
        enterprise_project_id: non_empty(cfg.get_enterprise_project_id(d)),
        auto_expand: optional_bool(d, "auto_expand"),
        auto_bind: optional_bool(d, "auto_bind"),
        bind_rules: bind_rules(d),
        tags: expand_resource_tags(&cfg.merge_default_tags(d.get_map("tags"))),
        locked: optional_bool(d, "locked"),
        backup_name_prefix: non_empty(d.get_string("backup_name_prefix")),
    })
}

fn build_update_opts(d: &ResourceData) -> UpdateVaultOpts {
    let billing = d.has_changes(&["consistent_level", "size"]).then(|| BillingUpdate {
        consistent_level: d
            .has_change("consistent_level")
            .then(|| d.get_string("consistent_level")),
        size: d.has_change("size").then(|| d.get_int("size")),
    });
    UpdateVaultOpts {
        name: d.has_change("name").then(|| d.get_string("name")),
        billing,
        auto_expand: d.has_change("auto_expand").then(|| d.get_bool("auto_expand")),
        auto_bind: d.has_change("auto_bind").then(|| d.get_bool("auto_bind")),
        bind_rules: d
            .has_change("bind_rules")
            .then(|| bind_rules(d).unwrap_or_default()),
        locked: d.has_change("locked").then(|| d.get_bool("locked")),
    }
}

/// Set difference on JSON arrays (`a - b`).
fn difference(a: &Value, b: &Value) -> Vec<Value> {
    let b = b.as_array().cloned().unwrap_or_default();
    a.as_array()
        .map(|items| items.iter().filter(|v| !b.contains(v)).cloned().collect())
        .unwrap_or_default()
}

fn attached_ids(vault: &Value) -> Vec<String> {
    vault["resources"]
        .as_array()
        .map(|rs| rs.iter().filter_map(|r| r["id"].as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Error codes CBR answers with (HTTP 400) when a vault no longer exists.
const VAULT_NOT_FOUND_CODES: &[&str] = &["BackupService.6302"];

/// `cbr::get_vault` with the vault-gone codes reported as not-found.
async fn get_vault(client: &ServiceClient, id: &str) -> hwcloud_sdk::Result<Value> {
    cbr::get_vault(client, id).await.map_err(not_found_codes)
}

fn not_found_codes(err: SdkError) -> SdkError {
    convert_expected_error_into_404(err, VAULT_NOT_FOUND_CODES)
}

async fn vault_state(client: &ServiceClient, id: &str) -> RefreshResult {
    match get_vault(client, id).await {
        Ok(vault) => {
            let status = vault["billing"]["status"].as_str().unwrap_or("STATUS_NOT_FOUND").to_string();
            Ok(Some((vault, status)))
        }
        Err(e) if e.is_not_found() => Ok(Some((Value::Null, "DELETED".to_string()))),
        Err(e) => Err(e.into()),
    }
}

/// COMPLETED once `done` holds for the attached resource IDs.
async fn resources_state(client: &ServiceClient, id: &str, done: impl Fn(&[String]) -> bool) -> RefreshResult {
    let vault = cbr::get_vault(client, id)
        .await
        .context(format!("error getting vault by ID ({id})"))?;
    let state = if done(&attached_ids(&vault)) { "COMPLETED" } else { "PENDING" };
    Ok(Some((vault, state.to_string())))
}

async fn wait_for_resources(
    client: &ServiceClient,
    id: &str,
    timeout: Duration,
    done: impl Fn(&[String]) -> bool + Send + Sync,
) -> ProviderResult<()> {
    StateChangeConf::new(&["PENDING"], &["COMPLETED"], timeout, || {
        resources_state(client, id, &done).boxed()
    })
    .delay(Duration::from_secs(5))
    .poll_interval(Duration::from_secs(10))
    .wait_for_state()
    .await?;
    Ok(())
}

async fn update_resources(client: &ServiceClient, d: &ResourceData) -> ProviderResult<()> {
    let id = d.id().to_string();
    let vault_type = d.get_string("type");
    let (old, new) = d.get_change("resources");
    let removed = difference(old, new);
    let added = difference(new, old);
    let timeout = d.timeout(TimeoutKind::Update);

    let remove_ids = build_dissociate_ids(&vault_type, &removed);
    if !remove_ids.is_empty() {
        cbr::remove_resources(client, &id, &remove_ids)
            .await
            .context(format!("error updating CBR vault ({id})"))?;
        wait_for_resources(client, &id, timeout, |attached| {
            !attached.iter().any(|a| remove_ids.contains(a))
        })
        .await
        .context("timeout waiting for dissociate resources to complete")?;
    }

    let resources = build_associate_resources(&vault_type, &added)?;
    if !resources.is_empty() {
        let want: Vec<String> = resources
            .iter()
            .filter_map(|r| r["id"].as_str().map(str::to_string))
            .collect();
        cbr::add_resources(client, &id, resources)
            .await
            .context(format!("error updating CBR vault ({id})"))?;
        wait_for_resources(client, &id, timeout, |attached| {
            want.iter().all(|w| attached.contains(w))
        })
        .await
        .context("timeout waiting for associate resources to complete")?;
    }
    Ok(())
}

#[async_trait]
impl Resource for CbrVault {
    fn type_name(&self) -> &'static str {
        "huaweicloud_cbr_vault"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            (
                "cloud_type",
                Schema::string()
                    .optional()
                    .computed()
                    .force_new()
                    .validate(Validator::StringInSlice(&["public", "hybrid"])),
            ),
            (
                "type",
                Schema::string()
                    .required()
                    .force_new()
                    .validate(Validator::StringInSlice(VAULT_TYPES))
                    .description("The object type of the vault: server, disk, turbo or workspace."),
            ),
            ("name", Schema::string().required()),
            (
                "protection_type",
                Schema::string()
                    .required()
                    .force_new()
                    .validate(Validator::StringInSlice(&["backup", "replication"])),
            ),
            (
                "size",
                Schema::int()
                    .required()
                    .validate(Validator::IntBetween(1, 10_485_760))
                    .description("The vault capacity, in GB."),
            ),
            (
                "consistent_level",
                Schema::string()
                    .optional()
                    .default_value("crash_consistent")
                    .validate(Validator::StringInSlice(&["crash_consistent", "app_consistent"])),
            ),
            ("auto_expand", Schema::bool().optional().computed()),
            ("auto_bind", Schema::bool().optional().computed()),
            ("bind_rules", Schema::map().optional()),
            ("enterprise_project_id", Schema::string().optional().computed()),
            (
                "resources",
                Schema::block_set(BTreeMap::from([
                    ("server_id", Schema::string().optional()),
                    ("excludes", Schema::set(Schema::string()).optional()),
                    ("includes", Schema::set(Schema::string()).optional()),
                ]))
                .optional(),
            ),
            ("backup_name_prefix", Schema::string().optional().force_new()),
            ("is_multi_az", Schema::bool().optional().computed().force_new()),
            ("locked", Schema::bool().optional().computed()),
            ("tags", Schema::map().optional()),
            ("allocated", Schema::float().computed()),
            ("used", Schema::float().computed()),
            ("spec_code", Schema::string().computed()),
            ("status", Schema::string().computed()),
            ("storage", Schema::string().computed()),
        ])
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            create: Duration::from_secs(10 * 60),
            delete: Duration::from_secs(5 * 60),
            ..Timeouts::default()
        }
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("cbr", &region)
            .await
            .context("error creating CBR client")?;
        let opts = build_create_opts(cfg, d).context("error building vault create options")?;
        log::debug!("create CBR vault options: {opts:?}");

        let vault = cbr::create_vault(&client, &opts).await.context("error creating vault")?;
        let id = vault["id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Serialization("unable to find the vault ID from the API response".to_string()))?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("cbr", &region)
            .await
            .context("error creating CBR client")?;
        let vault = match get_vault(&client, d.id()).await {
            Ok(v) => v,
            Err(e) => return check_deleted(d, e, "error retrieving vault"),
        };
        let billing = &vault["billing"];
        let vault_type = billing["object_type"].as_str().unwrap_or_default().to_string();

        d.set("region", region)?;
        d.set("name", vault["name"].clone())?;
        d.set("cloud_type", billing["cloud_type"].clone())?;
        d.set("type", vault_type.clone())?;
        d.set("protection_type", billing["protect_type"].clone())?;
        d.set("consistent_level", billing["consistent_level"].clone())?;
        d.set("size", billing["size"].clone())?;
        d.set("is_multi_az", billing["is_multi_az"].clone())?;
        d.set("auto_bind", vault["auto_bind"].clone())?;
        d.set("auto_expand", vault["auto_expand"].clone())?;
        d.set("enterprise_project_id", vault["enterprise_project_id"].clone())?;
        d.set("locked", vault["locked"].clone())?;
        d.set("backup_name_prefix", vault["backup_name_prefix"].clone())?;
        d.set("resources", flatten_resources(&vault_type, &vault["resources"]))?;
        d.set("bind_rules", tags_value(&flatten_tag_list(&vault["bind_rules"]["tags"])))?;
        d.set("tags", tags_value(&flatten_tag_list(&vault["tags"])))?;
        d.set("allocated", billing["allocated"].as_f64().map(cbr::mb_to_gb))?;
        d.set("used", billing["used"].as_f64().map(cbr::mb_to_gb))?;
        d.set("spec_code", billing["spec_code"].clone())?;
        d.set("status", billing["status"].clone())?;
        d.set("storage", billing["storage_unit"].clone())?;
        Ok(())
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("cbr", &region)
            .await
            .context("error creating CBR client")?;
        let id = d.id().to_string();

        if d.has_changes(&["name", "consistent_level", "size", "auto_expand", "auto_bind", "bind_rules", "locked"]) {
            cbr::update_vault(&client, &id, &build_update_opts(d))
                .await
                .context(format!("error updating the vault ({id})"))?;
        }
        if d.has_change("resources") {
            update_resources(&client, d).await?;
        }
        if d.has_change("tags") {
            let base = cbr::vault_tags_base(&client, &id);
            let old = string_map(d.get_change("tags").0);
            let new = cfg.merge_default_tags(d.get_map("tags"));
            tags::update_tags(&client, &base, &old, &new)
                .await
                .context(format!("error updating tags of vault ({id})"))?;
        }
        Ok(())
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("cbr", &region)
            .await
            .context("error creating CBR client")?;
        let id = d.id().to_string();

        if let Err(e) = cbr::delete_vault(&client, &id).await {
            return check_deleted(d, e, "error deleting CBR vault");
        }
        StateChangeConf::new(&["available", "deleting"], &["DELETED"], d.timeout(TimeoutKind::Delete), || {
            vault_state(&client, &id).boxed()
        })
        .delay(Duration::from_secs(5))
        .poll_interval(Duration::from_secs(20))
        .wait_for_state()
        .await
        .context("timeout waiting for vault deletion to complete")?;
        Ok(())
    }
}
