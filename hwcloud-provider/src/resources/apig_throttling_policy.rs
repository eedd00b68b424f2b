//! `huaweicloud_apig_throttling_policy`

use std::collections::BTreeMap;

use async_trait::async_trait;
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::services::apig::{self, ThrottlingPolicyOpts};
use serde_json::{Value, json};

use crate::common::{check_deleted, split_id};
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult, ResultExt};
use crate::resource_data::ResourceData;
use crate::schema::{Schema, SchemaMap, Validator, region_schema};
use crate::traits::Resource;

pub struct ApigThrottlingPolicy;

const SPECIAL_USER: &str = "USER";
const SPECIAL_APP: &str = "APP";

async fn apig_client(cfg: &Config, d: &ResourceData) -> ProviderResult<ServiceClient> {
    cfg.new_service_client("apig", &cfg.get_region(d))
        .await
        .context("error creating APIG v2 client")
}

fn special_throttle_schema() -> Schema {
    Schema::block_set(BTreeMap::from([
        ("max_api_requests", Schema::int().required()),
        ("throttling_object_id", Schema::string().required()),
        ("throttling_object_name", Schema::string().computed()),
        ("id", Schema::string().computed()),
    ]))
    .optional()
    .max_items(30)
}

/// Zero limits are left out of the request.
fn positive(d: &ResourceData, key: &str) -> Option<i64> {
    Some(d.get_int(key)).filter(|v| *v > 0)
}

fn build_policy_opts(d: &ResourceData) -> ProviderResult<ThrottlingPolicyOpts> {
    Ok(ThrottlingPolicyOpts {
        name: d.get_string("name"),
        time_interval: d.get_int("period"),
        time_unit: d.get_string("period_unit"),
        api_call_limits: d.get_int("max_api_requests"),
        user_call_limits: positive(d, "max_user_requests"),
        app_call_limits: positive(d, "max_app_requests"),
        ip_call_limits: positive(d, "max_ip_requests"),
        policy_type: apig::policy_type_code(&d.get_string("type"))?,
        description: Some(d.get_string("description")).filter(|s| !s.is_empty()),
    })
}

/// `throttling_object_id` → (special throttle ID, limit).
fn specials_by_object(raw: &Value) -> BTreeMap<String, (String, i64)> {
    raw.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|t| {
                    let object = t["throttling_object_id"].as_str()?.to_string();
                    let id = t["id"].as_str().unwrap_or_default().to_string();
                    Some((object, (id, t["max_api_requests"].as_i64().unwrap_or_default())))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SpecialChanges {
    /// (object ID, limit)
    add: Vec<(String, i64)>,
    /// (special throttle ID, new limit)
    update: Vec<(String, i64)>,
    /// special throttle IDs
    remove: Vec<String>,
}

/// Entries keep their special throttle when only the limit changes.
fn special_changes(old: &Value, new: &Value) -> SpecialChanges {
    let old = specials_by_object(old);
    let new = specials_by_object(new);
    let mut changes = SpecialChanges::default();
    for (object, (id, limit)) in &old {
        match new.get(object) {
            None => changes.remove.push(id.clone()),
            Some((_, new_limit)) if new_limit != limit => changes.update.push((id.clone(), *new_limit)),
            Some(_) => {}
        }
    }
    for (object, (_, limit)) in &new {
        if !old.contains_key(object) {
            changes.add.push((object.clone(), *limit));
        }
    }
    changes
}

async fn apply_special_changes(
    client: &ServiceClient,
    instance_id: &str,
    policy_id: &str,
    object_type: &str,
    changes: SpecialChanges,
) -> ProviderResult<()> {
    for id in &changes.remove {
        apig::delete_special_throttle(client, instance_id, policy_id, id).await?;
    }
    for (id, limit) in &changes.update {
        apig::update_special_throttle(client, instance_id, policy_id, id, *limit).await?;
    }
    for (object, limit) in &changes.add {
        apig::create_special_throttle(client, instance_id, policy_id, object_type, object, *limit).await?;
    }
    Ok(())
}

/// Split special throttles into (user, app) lists for state.
fn flatten_specials(specials: &[Value]) -> ProviderResult<(Vec<Value>, Vec<Value>)> {
    let mut users = Vec::new();
    let mut apps = Vec::new();
    for s in specials {
        let item = json!({
            "max_api_requests": s["call_limits"],
            "throttling_object_id": s["object_id"],
            "throttling_object_name": s["object_name"],
            "id": s["id"],
        });
        match s["object_type"].as_str() {
            Some(SPECIAL_USER) => users.push(item),
            Some(SPECIAL_APP) => apps.push(item),
            other => {
                return Err(ProviderError::Serialization(format!(
                    "invalid policy type, want '{SPECIAL_APP}' or '{SPECIAL_USER}', but '{}'",
                    other.unwrap_or_default()
                )));
            }
        }
    }
    Ok((users, apps))
}

#[async_trait]
impl Resource for ApigThrottlingPolicy {
    fn type_name(&self) -> &'static str {
        "huaweicloud_apig_throttling_policy"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            (
                "instance_id",
                Schema::string()
                    .required()
                    .force_new()
                    .description("The ID of the dedicated instance to which the throttling policy belongs."),
            ),
            ("name", Schema::string().required()),
            ("period", Schema::int().required()),
            ("max_api_requests", Schema::int().required()),
            ("max_app_requests", Schema::int().optional()),
            ("max_ip_requests", Schema::int().optional()),
            ("max_user_requests", Schema::int().optional()),
            (
                "type",
                Schema::string()
                    .optional()
                    .default_value("API-based")
                    .validate(Validator::StringInSlice(&["API-based", "API-shared"])),
            ),
            ("description", Schema::string().optional()),
            (
                "period_unit",
                Schema::string()
                    .optional()
                    .default_value("MINUTE")
                    .validate(Validator::StringInSlice(&["SECOND", "MINUTE", "HOUR", "DAY"])),
            ),
            ("user_throttles", special_throttle_schema()),
            ("app_throttles", special_throttle_schema()),
            ("created_at", Schema::string().computed()),
        ])
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = apig_client(cfg, d).await?;
        let instance_id = d.get_string("instance_id");
        let opts = build_policy_opts(d).context("unable to get the create option of the throttling policy")?;

        let created = apig::create_policy(&client, &instance_id, &opts)
            .await
            .context("error creating throttling policy")?;
        let id = created["id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Serialization("unable to find the throttling policy ID".to_string()))?
            .to_string();
        d.set_id(id.clone());

        let none = json!([]);
        apply_special_changes(&client, &instance_id, &id, SPECIAL_USER, special_changes(&none, d.get("user_throttles")))
            .await
            .context("error creating special user throttling policy")?;
        apply_special_changes(&client, &instance_id, &id, SPECIAL_APP, special_changes(&none, d.get("app_throttles")))
            .await
            .context("error creating special application throttling policy")?;
        Ok(())
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = apig_client(cfg, d).await?;
        let instance_id = d.get_string("instance_id");
        let policy = match apig::get_policy(&client, &instance_id, d.id()).await {
            Ok(p) => p,
            Err(e) => return check_deleted(d, e, "throttling policy"),
        };

        d.set("region", region)?;
        d.set("type", apig::policy_type_name(policy["type"].as_i64().unwrap_or(1)))?;
        d.set("name", policy["name"].clone())?;
        d.set("period", policy["time_interval"].clone())?;
        d.set("period_unit", policy["time_unit"].clone())?;
        d.set("max_api_requests", policy["api_call_limits"].clone())?;
        d.set("max_user_requests", policy["user_call_limits"].clone())?;
        d.set("max_app_requests", policy["app_call_limits"].clone())?;
        d.set("max_ip_requests", policy["ip_call_limits"].clone())?;
        d.set("description", policy["remark"].clone())?;
        d.set("created_at", policy["create_time"].clone())?;

        if policy["is_inclu_special_throttle"].as_i64() == Some(1) {
            let specials = apig::list_special_throttles(&client, &instance_id, d.id())
                .await
                .context("error retrieving special throttle")?;
            let (users, apps) = flatten_specials(&specials)?;
            d.set("user_throttles", users)?;
            d.set("app_throttles", apps)?;
        }
        Ok(())
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = apig_client(cfg, d).await?;
        let instance_id = d.get_string("instance_id");
        let id = d.id().to_string();

        if d.has_changes_except(&["user_throttles", "app_throttles"]) {
            let opts = build_policy_opts(d).context("unable to get the update option of the throttling policy")?;
            apig::update_policy(&client, &instance_id, &id, &opts)
                .await
                .context("error updating throttling policy")?;
        }
        for (key, object_type) in [("user_throttles", SPECIAL_USER), ("app_throttles", SPECIAL_APP)] {
            if d.has_change(key) {
                let (old, new) = d.get_change(key);
                apply_special_changes(&client, &instance_id, &id, object_type, special_changes(old, new))
                    .await
                    .context(format!("error updating special throttles ({key})"))?;
            }
        }
        Ok(())
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = apig_client(cfg, d).await?;
        let instance_id = d.get_string("instance_id");
        let id = d.id().to_string();
        apig::delete_policy(&client, &instance_id, &id)
            .await
            .context(format!("unable to delete the throttling policy ({id})"))?;
        Ok(())
    }

    /// `<instance_id>/<policy_id>`; a policy name is accepted in place of the ID.
    async fn import(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let (instance_id, key) = split_id(d.id(), "<instance_id>/<policy_id>")?;
        d.set("instance_id", instance_id.clone())?;

        let client = apig_client(cfg, d).await?;
        match apig::get_policy(&client, &instance_id, &key).await {
            Ok(_) => {
                d.set_id(key);
                return Ok(());
            }
            Err(e) if !e.is_not_found() => return Err(e.into()),
            Err(_) => {}
        }
        let found = apig::find_policies_by_name(&client, &instance_id, &key)
            .await
            .context("error retrieving throttling policies")?;
        let id = found
            .first()
            .and_then(|p| p["id"].as_str())
            .ok_or_else(|| ProviderError::ResourceNotFound(format!("unable to find the throttling policy ({key})")))?;
        d.set_id(id);
        Ok(())
    }
}
