//! `huaweicloud_dns_recordset`
//!
//! The resource ID is `{zone_id}/{recordset_id}`. Record sets of public zones go through
//! the `v2.1` API, which supports resolution lines and weights; private zones use `v2`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::extract::path_search;
use hwcloud_sdk::request::{remove_nil, value_ignore_empty};
use hwcloud_sdk::services::{dns, tags};
use serde_json::{Value, json};

use crate::common::{check_deleted, expand_resource_tags, string_map, suppress_trailing_dot, tags_value};
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult, ResultExt};
use crate::resource_data::{ResourceData, TimeoutKind};
use crate::resources::dns_zone::parse_status;
use crate::schema::{Schema, SchemaMap, Validator, region_schema};
use crate::traits::Resource;
use crate::wait::{RefreshResult, StateChangeConf};

pub struct DnsRecordset;

const RECORD_TYPES: &[&str] = &["A", "AAAA", "MX", "CNAME", "TXT", "NS", "SRV", "CAA"];

/// Client serving the zone, and the zone type. Public zones are tried first.
async fn client_for_zone(cfg: &Config, region: &str, zone_id: &str) -> ProviderResult<(ServiceClient, String)> {
    let public = cfg
        .new_service_client("dns", region)
        .await
        .context("error creating DNS client")?;
    match dns::get_zone(&public, zone_id).await {
        Ok(zone) => return Ok((public, zone.zone_type)),
        Err(e) if !e.is_not_found() => return Err(ProviderError::from(e).with_context("error getting DNS zone")),
        Err(_) => {}
    }

    let regional = cfg
        .new_service_client("dns_region", region)
        .await
        .context("error creating DNS region client")?;
    let zone = dns::get_zone(&regional, zone_id).await.context("error getting DNS zone")?;
    Ok((regional, zone.zone_type))
}

fn build_create_body(d: &ResourceData) -> Value {
    let tags = expand_resource_tags(&d.get_map("tags"));
    remove_nil(json!({
        "name": value_ignore_empty(d.get("name").clone()),
        "description": value_ignore_empty(d.get("description").clone()),
        "type": value_ignore_empty(d.get("type").clone()),
        "status": value_ignore_empty(d.get("status").clone()),
        "ttl": value_ignore_empty(d.get("ttl").clone()),
        "records": value_ignore_empty(d.get("records").clone()),
        "line": value_ignore_empty(d.get("line_id").clone()),
        "tags": value_ignore_empty(json!(tags)),
        "weight": value_ignore_empty(d.get("weight").clone()),
    }))
}

fn build_update_body(d: &ResourceData) -> Value {
    remove_nil(json!({
        "name": value_ignore_empty(d.get("name").clone()),
        "description": value_ignore_empty(d.get("description").clone()),
        "type": value_ignore_empty(d.get("type").clone()),
        "ttl": value_ignore_empty(d.get("ttl").clone()),
        "records": value_ignore_empty(d.get("records").clone()),
        "weight": value_ignore_empty(d.get("weight").clone()),
    }))
}

/// `ACTIVE` is reported to users as `ENABLE`.
fn recordset_status(body: &Value) -> String {
    match body.get("status").and_then(Value::as_str) {
        Some("ACTIVE") => "ENABLE".to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn reject_private_only_args(d: &ResourceData, check_line: bool) -> ProviderResult<()> {
    if check_line && d.get_ok("line_id").is_some() {
        return Err(ProviderError::Validation("private zone do not support line_id".to_string()));
    }
    if d.get_ok("weight").is_some() {
        return Err(ProviderError::Validation("private zone do not support weight".to_string()));
    }
    Ok(())
}

struct Target<'a> {
    client: &'a ServiceClient,
    private: bool,
    zone_id: &'a str,
    id: &'a str,
}

async fn recordset_state(t: &Target<'_>) -> RefreshResult {
    match dns::get_recordset(t.client, t.private, t.zone_id, t.id).await {
        Ok(body) => {
            let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
            let state = parse_status(status);
            Ok(Some((body, state)))
        }
        Err(e) if e.is_not_found() => Ok(Some((Value::Null, "DELETED".to_string()))),
        Err(e) => Err(e.into()),
    }
}

async fn wait_for(t: &Target<'_>, pending: &[&str], target: &[&str], timeout: Duration) -> ProviderResult<Value> {
    StateChangeConf::new(pending, target, timeout, || recordset_state(t).boxed())
        .delay(Duration::from_secs(5))
        .poll_interval(Duration::from_secs(5))
        .wait_for_state()
        .await
}

#[async_trait]
impl Resource for DnsRecordset {
    fn type_name(&self) -> &'static str {
        "huaweicloud_dns_recordset"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            (
                "zone_id",
                Schema::string()
                    .required()
                    .force_new()
                    .description("The ID of the zone to which the record set belongs."),
            ),
            (
                "name",
                Schema::string()
                    .required()
                    .diff_suppress(suppress_trailing_dot)
                    .description("The name of the record set."),
            ),
            (
                "type",
                Schema::string().required().validate(Validator::StringInSlice(RECORD_TYPES)),
            ),
            ("records", Schema::set(Schema::string()).required().min_items(1)),
            ("ttl", Schema::int().optional().default_value(300)),
            ("line_id", Schema::string().optional().computed().force_new()),
            (
                "status",
                Schema::string()
                    .optional()
                    .default_value("ENABLE")
                    .validate(Validator::StringInSlice(&["ENABLE", "DISABLE"])),
            ),
            ("tags", Schema::map().optional()),
            ("description", Schema::string().optional().computed()),
            ("weight", Schema::int().optional().computed()),
            ("zone_name", Schema::string().computed()),
            ("zone_type", Schema::string().computed()),
        ])
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let zone_id = d.get_string("zone_id");
        let (client, zone_type) = client_for_zone(cfg, &region, &zone_id).await?;
        let private = zone_type == "private";
        if private {
            reject_private_only_args(d, true)?;
        }

        let resp = dns::create_recordset(&client, private, &zone_id, build_create_body(d))
            .await
            .context("error creating DNS recordset")?;
        let id = resp
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Serialization("unable to find the DNS recordset ID from the API response".to_string()))?
            .to_string();
        d.set_id(format!("{zone_id}/{id}"));

        let target = Target {
            client: &client,
            private,
            zone_id: &zone_id,
            id: &id,
        };
        wait_for(&target, &["PENDING"], &["ACTIVE", "DISABLE"], d.timeout(TimeoutKind::Create))
            .await
            .context(format!("error waiting for DNS recordset ({id}) to be ACTIVE or DISABLE"))?;
        Ok(())
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let (zone_id, id) = dns::parse_recordset_id(d.id())?;
        let (client, zone_type) = match client_for_zone(cfg, &region, &zone_id).await {
            Ok(found) => found,
            Err(e) => return check_deleted(d, e, "error creating DNS client"),
        };

        let body = match dns::get_recordset(&client, zone_type == "private", &zone_id, &id).await {
            Ok(body) => body,
            Err(e) => return check_deleted(d, e, "error retrieving DNS recordset"),
        };

        let get = |expr: &str| path_search(expr, &body).unwrap_or(Value::Null);
        d.set("region", region)?;
        d.set("name", get("name"))?;
        d.set("description", get("description"))?;
        d.set("zone_id", get("zone_id"))?;
        d.set("zone_name", get("zone_name"))?;
        d.set("type", get("type"))?;
        d.set("ttl", get("ttl"))?;
        d.set("records", get("records"))?;
        d.set("status", recordset_status(&body))?;
        d.set("line_id", get("line"))?;
        d.set("weight", get("weight"))?;
        d.set("zone_type", zone_type.clone())?;

        let base = dns::recordset_tags_base(&client, &zone_type, &id);
        let tags = tags::list_tags(&client, &base)
            .await
            .context("error fetching tags of DNS recordset")?;
        d.set("tags", tags_value(&tags))?;
        Ok(())
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let (zone_id, id) = dns::parse_recordset_id(d.id())?;
        let (client, zone_type) = client_for_zone(cfg, &region, &zone_id).await?;
        let private = zone_type == "private";
        if private {
            reject_private_only_args(d, false)?;
        }

        if d.has_changes(&["name", "description", "type", "ttl", "records", "weight"]) {
            dns::update_recordset(&client, private, &zone_id, &id, build_update_body(d))
                .await
                .context("error updating DNS recordset")?;
            let target = Target {
                client: &client,
                private,
                zone_id: &zone_id,
                id: &id,
            };
            wait_for(&target, &["PENDING"], &["ACTIVE", "DISABLE"], d.timeout(TimeoutKind::Update))
                .await
                .context(format!("error waiting for DNS recordset ({id}) to be ACTIVE or DISABLE"))?;
        }

        if d.has_change("status") {
            dns::set_recordset_status(&client, &id, &d.get_string("status"))
                .await
                .context("error updating DNS recordset status")?;
        }

        if d.has_change("tags") {
            let base = dns::recordset_tags_base(&client, &zone_type, &id);
            let old = string_map(d.get_change("tags").0);
            let new = cfg.merge_default_tags(d.get_map("tags"));
            tags::update_tags(&client, &base, &old, &new)
                .await
                .context("error updating DNS recordset tags")?;
        }
        Ok(())
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let (zone_id, id) = dns::parse_recordset_id(d.id())?;
        let (client, zone_type) = match client_for_zone(cfg, &region, &zone_id).await {
            Ok(found) => found,
            Err(e) => return check_deleted(d, e, "error creating DNS client"),
        };
        let private = zone_type == "private";

        dns::delete_recordset(&client, private, &zone_id, &id)
            .await
            .context("error deleting DNS recordset")?;
        let target = Target {
            client: &client,
            private,
            zone_id: &zone_id,
            id: &id,
        };
        wait_for(&target, &["ACTIVE", "PENDING", "ERROR"], &["DELETED"], d.timeout(TimeoutKind::Delete))
            .await
            .context(format!("error waiting for DNS recordset ({id}) to be DELETED"))?;
        Ok(())
    }
}
