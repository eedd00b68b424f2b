//! `huaweicloud_dds_instance`

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::services::dds::{self, BackupStrategy, CreateInstanceOpts, DataStore, Flavor};
use serde_json::{Value, json};

use crate::common::check_deleted;
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult, ResultExt};
use crate::resource_data::{ResourceData, TimeoutKind, Timeouts};
use crate::schema::{Schema, SchemaMap, Validator, region_schema};
use crate::traits::Resource;
use crate::wait::{RefreshResult, StateChangeConf};

pub struct DdsInstance;

const DEFAULT_BACKUP_WINDOW: &str = "00:00-01:00";
const DEFAULT_KEEP_DAYS: i64 = 7;

async fn dds_client(cfg: &Config, d: &ResourceData) -> ProviderResult<ServiceClient> {
    cfg.new_service_client("dds", &cfg.get_region(d))
        .await
        .context("error creating DDS client")
}

/// `normal` with pending actions still counts as `updating`; a missing instance is `deleted`.
fn instance_status(instance: &Value) -> String {
    let status = instance["status"].as_str().unwrap_or_default();
    let busy = instance["actions"].as_array().is_some_and(|a| !a.is_empty());
    if status == "normal" && busy {
        "updating".to_string()
    } else {
        status.to_string()
    }
}

async fn instance_state(client: &ServiceClient, id: &str) -> RefreshResult {
    match dds::find_instance(client, id).await? {
        Some(instance) => {
            let status = instance_status(&instance);
            Ok(Some((instance, status)))
        }
        None => Ok(Some((Value::Null, "deleted".to_string()))),
    }
}

async fn wait_for_instance(
    client: &ServiceClient,
    id: &str,
    pending: &[&str],
    target: &[&str],
    timeout: Duration,
    delay: Duration,
) -> ProviderResult<()> {
    StateChangeConf::new(pending, target, timeout, || instance_state(client, id).boxed())
        .delay(delay)
        .min_timeout(Duration::from_secs(20))
        .wait_for_state()
        .await?;
    Ok(())
}

fn build_flavors(d: &ResourceData) -> Vec<Flavor> {
    d.get_list("flavor")
        .iter()
        .map(|f| Flavor {
            flavor_type: f["type"].as_str().unwrap_or_default().to_string(),
            num: f["num"].as_i64().unwrap_or_default(),
            storage: f["storage"].as_str().filter(|s| !s.is_empty()).map(str::to_string),
            size: f["size"].as_i64().filter(|s| *s > 0),
            spec_code: f["spec_code"].as_str().unwrap_or_default().to_string(),
        })
        .collect()
}

fn build_backup_strategy(d: &ResourceData) -> BackupStrategy {
    let raw = d.get_list("backup_strategy");
    match raw.first() {
        Some(b) => BackupStrategy {
            start_time: b["start_time"].as_str().unwrap_or(DEFAULT_BACKUP_WINDOW).to_string(),
            keep_days: b["keep_days"].as_i64(),
        },
        None => BackupStrategy {
            start_time: DEFAULT_BACKUP_WINDOW.to_string(),
            keep_days: Some(DEFAULT_KEEP_DAYS),
        },
    }
}

fn build_create_opts(cfg: &Config, d: &ResourceData) -> CreateInstanceOpts {
    let store = d.get_list("datastore");
    let store = store.first().cloned().unwrap_or(Value::Null);
    let non_empty = |s: String| Some(s).filter(|s| !s.is_empty());
    CreateInstanceOpts {
        name: d.get_string("name"),
        datastore: DataStore {
            store_type: store["type"].as_str().unwrap_or_default().to_string(),
            version: store["version"].as_str().unwrap_or_default().to_string(),
            storage_engine: store["storage_engine"].as_str().unwrap_or_default().to_string(),
        },
        region: cfg.get_region(d),
        availability_zone: d.get_string("availability_zone"),
        vpc_id: d.get_string("vpc_id"),
        subnet_id: d.get_string("subnet_id"),
        security_group_id: d.get_string("security_group_id"),
        password: d.get_string("password"),
        mode: d.get_string("mode"),
        flavor: build_flavors(d),
        port: d.get_ok("port").and_then(Value::as_i64).map(|p| p.to_string()),
        disk_encryption_id: non_empty(d.get_string("disk_encryption_id")),
        backup_strategy: Some(build_backup_strategy(d)),
        enterprise_project_id: non_empty(cfg.get_enterprise_project_id(d)),
        ssl_option: if d.get_bool("ssl") { "1" } else { "0" }.to_string(),
    }
}

fn flatten_nodes(instance: &Value) -> Value {
    let groups = instance["groups"].as_array().cloned().unwrap_or_default();
    let nodes: Vec<Value> = groups
        .iter()
        .flat_map(|g| {
            let group_type = g["type"].clone();
            g["nodes"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(move |n| {
                    json!({
                        "type": group_type,
                        "id": n["id"],
                        "name": n["name"],
                        "role": n["role"],
                        "status": n["status"],
                        "private_ip": n["private_ip"],
                        "public_ip": n["public_ip"],
                    })
                })
        })
        .collect();
    Value::Array(nodes)
}

#[async_trait]
impl Resource for DdsInstance {
    fn type_name(&self) -> &'static str {
        "huaweicloud_dds_instance"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            ("name", Schema::string().required()),
            (
                "datastore",
                Schema::block_list(BTreeMap::from([
                    (
                        "type",
                        Schema::string()
                            .required()
                            .validate(Validator::StringInSlice(&["DDS-Community", "DDS-Enhanced"])),
                    ),
                    ("version", Schema::string().required()),
                    ("storage_engine", Schema::string().optional().computed()),
                ]))
                .required()
                .force_new()
                .max_items(1),
            ),
            ("availability_zone", Schema::string().required().force_new()),
            ("vpc_id", Schema::string().required().force_new()),
            ("subnet_id", Schema::string().required().force_new()),
            ("security_group_id", Schema::string().required().force_new()),
            ("port", Schema::int().optional().computed().force_new()),
            ("password", Schema::string().required().sensitive()),
            ("disk_encryption_id", Schema::string().optional().force_new()),
            (
                "mode",
                Schema::string()
                    .required()
                    .force_new()
                    .validate(Validator::StringInSlice(&["Sharding", "ReplicaSet", "Single"])),
            ),
            (
                "flavor",
                Schema::block_list(BTreeMap::from([
                    (
                        "type",
                        Schema::string()
                            .required()
                            .validate(Validator::StringInSlice(&["mongos", "shard", "config", "replica", "single"])),
                    ),
                    ("num", Schema::int().required()),
                    ("storage", Schema::string().optional()),
                    ("size", Schema::int().optional()),
                    ("spec_code", Schema::string().required()),
                ]))
                .required()
                .force_new(),
            ),
            (
                "backup_strategy",
                Schema::block_list(BTreeMap::from([
                    ("start_time", Schema::string().required()),
                    ("keep_days", Schema::int().required().validate(Validator::IntBetween(0, 732))),
                ]))
                .optional()
                .computed()
                .force_new()
                .max_items(1),
            ),
            ("ssl", Schema::bool().optional().default_value(true).force_new()),
            ("description", Schema::string().optional()),
            ("enterprise_project_id", Schema::string().optional().computed().force_new()),
            ("db_username", Schema::string().computed()),
            ("status", Schema::string().computed()),
            (
                "nodes",
                Schema::block_list(BTreeMap::from([
                    ("type", Schema::string().computed()),
                    ("id", Schema::string().computed()),
                    ("name", Schema::string().computed()),
                    ("role", Schema::string().computed()),
                    ("status", Schema::string().computed()),
                    ("private_ip", Schema::string().computed()),
                    ("public_ip", Schema::string().computed()),
                ]))
                .computed(),
            ),
            ("created_at", Schema::string().computed()),
            ("updated_at", Schema::string().computed()),
        ])
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            create: Duration::from_secs(30 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(30 * 60),
            ..Timeouts::default()
        }
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = dds_client(cfg, d).await?;
        let opts = build_create_opts(cfg, d);
        log::debug!(
            "create DDS instance {} in {} ({} mode)",
            opts.name,
            opts.availability_zone,
            opts.mode
        );

        let created = dds::create_instance(&client, &opts)
            .await
            .context("error creating DDS instance")?;
        let id = created["id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Serialization("error creating DDS instance: ID is not found in API response".to_string()))?
            .to_string();
        d.set_id(id.clone());

        let description = d.get_string("description");
        if !description.is_empty() {
            dds::set_remark(&client, &id, &description)
                .await
                .context(format!("error adding description of the DDS instance ({id})"))?;
        }

        wait_for_instance(
            &client,
            &id,
            &["creating", "updating"],
            &["normal"],
            d.timeout(TimeoutKind::Create),
            Duration::from_secs(120),
        )
        .await
        .context(format!("error waiting for instance ({id}) to become ready"))?;
        Ok(())
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = dds_client(cfg, d).await?;
        let instance = match dds::find_instance(&client, d.id()).await {
            Ok(Some(instance)) => instance,
            Ok(None) => {
                log::warn!("DDS instance ({}) was not found", d.id());
                d.set_id("");
                return Ok(());
            }
            Err(e) => return check_deleted(d, e, "error retrieving DDS instance"),
        };

        d.set("region", instance["region"].clone())?;
        d.set("name", instance["name"].clone())?;
        d.set("vpc_id", instance["vpc_id"].clone())?;
        d.set("subnet_id", instance["subnet_id"].clone())?;
        d.set("security_group_id", instance["security_group_id"].clone())?;
        d.set("disk_encryption_id", instance["disk_encryption_id"].clone())?;
        d.set("mode", instance["mode"].clone())?;
        d.set("db_username", instance["db_user_name"].clone())?;
        d.set("status", instance["status"].clone())?;
        d.set("enterprise_project_id", instance["enterprise_project_id"].clone())?;
        d.set("description", instance["remark"].clone())?;
        d.set("created_at", instance["created"].clone())?;
        d.set("updated_at", instance["updated"].clone())?;
        d.set("nodes", flatten_nodes(&instance))?;

        match instance["port"].as_str().map(str::parse::<i64>) {
            Some(Ok(port)) => d.set("port", port)?,
            Some(Err(e)) => log::warn!("port {} invalid: {e}", instance["port"]),
            None => {}
        }
        d.set("ssl", instance["ssl"].as_i64().is_some_and(|s| s != 0))?;
        d.set(
            "datastore",
            json!([{
                "type": instance["datastore"]["type"],
                "version": instance["datastore"]["version"],
                "storage_engine": instance["engine"],
            }]),
        )?;
        if let Some(policy) = instance.get("backup_strategy").filter(|v| v.is_object()) {
            d.set(
                "backup_strategy",
                json!([{"start_time": policy["start_time"], "keep_days": policy["keep_days"]}]),
            )?;
        }
        Ok(())
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = dds_client(cfg, d).await?;
        let id = d.id().to_string();
        let timeout = d.timeout(TimeoutKind::Update);

        if d.has_change("description") {
            dds::set_remark(&client, &id, &d.get_string("description"))
                .await
                .context(format!("error updating description of the DDS instance ({id})"))?;
        }
        if d.has_change("name") {
            dds::rename_instance(&client, &id, &d.get_string("name"))
                .await
                .context(format!("error updating name of the DDS instance ({id})"))?;
        }
        if d.has_change("password") {
            dds::reset_password(&client, &id, &d.get_string("password"))
                .await
                .context(format!("error updating password of the DDS instance ({id})"))?;
        }
        if d.has_changes(&["name", "password"]) {
            wait_for_instance(&client, &id, &["updating"], &["normal"], timeout, Duration::from_secs(15))
                .await
                .context(format!("error waiting for instance ({id}) to become ready"))?;
        }
        Ok(())
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = dds_client(cfg, d).await?;
        let id = d.id().to_string();

        if let Err(e) = dds::delete_instance(&client, &id).await {
            return check_deleted(d, e, "error deleting DDS instance");
        }
        wait_for_instance(
            &client,
            &id,
            &["normal", "abnormal", "frozen", "createfail", "enlargefail", "data_disk_full"],
            &["deleted"],
            d.timeout(TimeoutKind::Delete),
            Duration::from_secs(15),
        )
        .await
        .context(format!("error waiting for instance ({id}) to be deleted"))?;
        Ok(())
    }
}
