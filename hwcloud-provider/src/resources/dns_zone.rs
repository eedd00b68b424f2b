//! `huaweicloud_dns_zone`
//!
//! Public zones live on the global `dns` endpoint, private zones on the regional
//! `dns_region` one and are bound to at least one VPC (`router`).

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::services::dns::{self, CreateZoneOpts, Router, UpdateZoneOpts, Zone};
use hwcloud_sdk::services::tags;
use serde_json::{Value, json};

use crate::common::{check_deleted, string_map, suppress_trailing_dot, tags_value};
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult, ResultExt};
use crate::resource_data::{ResourceData, TimeoutKind};
use crate::schema::{Schema, SchemaMap, Validator, region_schema};
use crate::traits::Resource;
use crate::wait::{RefreshResult, StateChangeConf};

pub struct DnsZone;

/// Collapse the `PENDING_*` family into `PENDING` for the waiters.
pub(crate) fn parse_status(status: &str) -> String {
    if status.starts_with("PENDING") {
        "PENDING".to_string()
    } else {
        status.to_string()
    }
}

fn zone_service(zone_type: &str) -> &'static str {
    if zone_type == "private" { "dns_region" } else { "dns" }
}

async fn zone_client(cfg: &Config, d: &ResourceData) -> ProviderResult<ServiceClient> {
    let region = cfg.get_region(d);
    cfg.new_service_client(zone_service(&d.get_string("zone_type")), &region)
        .await
        .context("error creating DNS client")
}

/// Routers from configuration; a missing `router_region` means the provider region.
fn configured_routers(d: &ResourceData, region: &str) -> Vec<Router> {
    d.get_list("router")
        .iter()
        .map(|r| {
            let router_region = r["router_region"].as_str().filter(|s| !s.is_empty()).unwrap_or(region);
            Router {
                router_id: r["router_id"].as_str().unwrap_or_default().to_string(),
                router_region: router_region.to_string(),
                ..Router::default()
            }
        })
        .collect()
}

/// Routers to associate and to disassociate so that `remote` matches `local`.
fn router_changes(local: &[Router], remote: &[Router]) -> (Vec<Router>, Vec<Router>) {
    let local_ids: BTreeSet<&str> = local.iter().map(|r| r.router_id.as_str()).collect();
    let remote_ids: BTreeSet<&str> = remote.iter().map(|r| r.router_id.as_str()).collect();
    let associate = local
        .iter()
        .filter(|r| !remote_ids.contains(r.router_id.as_str()))
        .cloned()
        .collect();
    let disassociate = remote
        .iter()
        .filter(|r| !local_ids.contains(r.router_id.as_str()))
        .map(|r| Router {
            router_id: r.router_id.clone(),
            router_region: r.router_region.clone(),
            ..Router::default()
        })
        .collect();
    (associate, disassociate)
}

fn flatten_routers(routers: &[Router]) -> Value {
    routers
        .iter()
        .map(|r| json!({"router_id": r.router_id, "router_region": r.router_region}))
        .collect()
}

fn build_create_opts(d: &ResourceData, cfg: &Config, region: &str) -> CreateZoneOpts {
    let non_empty = |key: &str| Some(d.get_string(key)).filter(|s| !s.is_empty());
    let zone_type = d.get_string("zone_type");
    let router = if zone_type == "private" {
        configured_routers(d, region).into_iter().next()
    } else {
        None
    };
    let epid = cfg.get_enterprise_project_id(d);
    CreateZoneOpts {
        name: d.get_string("name"),
        email: non_empty("email"),
        zone_type: Some(zone_type),
        ttl: Some(d.get_int("ttl")),
        description: non_empty("description"),
        router,
        enterprise_project_id: Some(epid).filter(|s| !s.is_empty()),
        proxy_pattern: non_empty("proxy_pattern"),
    }
}

async fn zone_state(client: &ServiceClient, id: &str) -> RefreshResult {
    match dns::get_zone(client, id).await {
        Ok(zone) => {
            log::debug!("DNS zone ({id}) current status: {}", zone.status);
            Ok(Some((json!({"id": zone.id}), parse_status(&zone.status))))
        }
        Err(e) if e.is_not_found() => Ok(Some((Value::Null, "DELETED".to_string()))),
        Err(e) => Err(e.into()),
    }
}

/// Status of one router binding; a router missing from the zone is `DELETED`.
async fn router_state(client: &ServiceClient, id: &str, router_id: &str) -> RefreshResult {
    let zone = dns::get_zone(client, id).await?;
    let state = zone
        .routers
        .iter()
        .find(|r| r.router_id == router_id)
        .map_or_else(|| "DELETED".to_string(), |r| parse_status(&r.status));
    Ok(Some((json!({"id": zone.id}), state)))
}

async fn wait_for_zone(
    client: &ServiceClient,
    id: &str,
    pending: &[&str],
    target: &[&str],
    timeout: Duration,
    min_timeout: Duration,
) -> ProviderResult<Value> {
    StateChangeConf::new(pending, target, timeout, || zone_state(client, id).boxed())
        .delay(Duration::from_secs(5))
        .min_timeout(min_timeout)
        .wait_for_state()
        .await
}

async fn set_status(client: &ServiceClient, d: &ResourceData, timeout: Duration) -> ProviderResult<()> {
    let id = d.id();
    let status = d.get_string("status");
    dns::set_zone_status(client, id, &status)
        .await
        .context(format!("error updating the status of DNS zone ({id})"))?;
    wait_for_zone(
        client,
        id,
        &["PENDING"],
        &["ACTIVE", "DISABLE", "FREEZE"],
        timeout,
        Duration::from_secs(10),
    )
    .await
    .context(format!("error waiting for DNS zone ({id}) status to become {status}"))?;
    Ok(())
}

async fn update_routers(
    client: &ServiceClient,
    d: &ResourceData,
    region: &str,
    timeout: Duration,
) -> ProviderResult<()> {
    let id = d.id();
    let zone = dns::get_zone(client, id).await.context("error getting DNS zone routers")?;
    let (associate, disassociate) = router_changes(&configured_routers(d, region), &zone.routers);

    for router in &associate {
        dns::associate_router(client, id, router)
            .await
            .context("error associating router with DNS zone")?;
        StateChangeConf::new(&["PENDING"], &["ACTIVE"], timeout, || {
            router_state(client, id, &router.router_id).boxed()
        })
        .delay(Duration::from_secs(5))
        .min_timeout(Duration::from_secs(3))
        .wait_for_state()
        .await
        .context(format!(
            "error waiting for router ({}) of DNS zone ({id}) to become ACTIVE",
            router.router_id
        ))?;
    }
    for router in &disassociate {
        dns::disassociate_router(client, id, router)
            .await
            .context("error disassociating router from DNS zone")?;
        StateChangeConf::new(&["ACTIVE", "PENDING", "ERROR"], &["DELETED"], timeout, || {
            router_state(client, id, &router.router_id).boxed()
        })
        .delay(Duration::from_secs(5))
        .min_timeout(Duration::from_secs(3))
        .wait_for_state()
        .await
        .context(format!(
            "error waiting for router ({}) of DNS zone ({id}) to be removed",
            router.router_id
        ))?;
    }
    Ok(())
}

async fn update_tags(cfg: &Config, client: &ServiceClient, d: &ResourceData, old: &Value) -> ProviderResult<()> {
    let base = dns::zone_tags_base(client, &d.get_string("zone_type"), d.id());
    let old = string_map(old);
    let new = cfg.merge_default_tags(d.get_map("tags"));
    tags::update_tags(client, &base, &old, &new)
        .await
        .context(format!("error updating tags of DNS zone {}", d.id()))
}

fn flatten_zone(d: &mut ResourceData, region: &str, zone: &Zone) -> ProviderResult<()> {
    d.set("region", region)?;
    d.set("name", zone.name.clone())?;
    d.set("email", zone.email.clone())?;
    d.set("zone_type", zone.zone_type.clone())?;
    d.set("ttl", zone.ttl)?;
    d.set("description", zone.description.clone())?;
    d.set("masters", zone.masters.clone())?;
    d.set("status", dns::zone_status_to_state(&zone.status))?;
    d.set("enterprise_project_id", zone.enterprise_project_id.clone())?;
    d.set("proxy_pattern", zone.proxy_pattern.clone())?;
    if zone.zone_type == "private" {
        d.set("router", flatten_routers(&zone.routers))?;
    }
    Ok(())
}

#[async_trait]
impl Resource for DnsZone {
    fn type_name(&self) -> &'static str {
        "huaweicloud_dns_zone"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            (
                "name",
                Schema::string().required().force_new().diff_suppress(suppress_trailing_dot),
            ),
            ("email", Schema::string().optional().computed()),
            (
                "zone_type",
                Schema::string()
                    .optional()
                    .force_new()
                    .default_value("public")
                    .validate(Validator::StringInSlice(&["public", "private"])),
            ),
            ("ttl", Schema::int().optional().default_value(300).validate(Validator::IntBetween(1, 2_147_483_647))),
            ("description", Schema::string().optional().validate(Validator::StringLenBetween(0, 255))),
            (
                "router",
                Schema::block_set(BTreeMap::from([
                    ("router_id", Schema::string().required()),
                    ("router_region", Schema::string().optional().computed()),
                ]))
                .optional(),
            ),
            ("enterprise_project_id", Schema::string().optional().computed().force_new()),
            (
                "status",
                Schema::string()
                    .optional()
                    .computed()
                    .validate(Validator::StringInSlice(&["ENABLE", "DISABLE"])),
            ),
            ("proxy_pattern", Schema::string().optional().computed().force_new()),
            ("tags", Schema::map().optional()),
            ("masters", Schema::set(Schema::string()).computed()),
        ])
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let private = d.get_string("zone_type") == "private";
        if private && d.get_list("router").is_empty() {
            return Err(ProviderError::Validation(
                "the argument (router) is required when creating DNS private zone".to_string(),
            ));
        }
        let client = zone_client(cfg, d).await?;

        let opts = build_create_opts(d, cfg, &region);
        log::debug!("create DNS zone options: {opts:?}");
        let zone = dns::create_zone(&client, &opts).await.context("error creating DNS zone")?;
        d.set_id(zone.id.clone());
        let id = zone.id;
        let timeout = d.timeout(TimeoutKind::Create);

        wait_for_zone(&client, &id, &["PENDING"], &["ACTIVE"], timeout, Duration::from_secs(3))
            .await
            .context(format!("error waiting for DNS zone ({id}) to become ACTIVE"))?;

        // Only one router can be bound at creation time.
        if private && d.get_list("router").len() > 1 {
            update_routers(&client, d, &region, timeout).await?;
        }

        if d.get_string("status") == "DISABLE" {
            set_status(&client, d, timeout).await?;
        }

        if !d.get_map("tags").is_empty() || !cfg.default_tags.is_empty() {
            update_tags(cfg, &client, d, &Value::Null).await?;
        }
        Ok(())
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let public = cfg
            .new_service_client("dns", &region)
            .await
            .context("error creating DNS client")?;

        // An imported zone has no zone_type yet: try the global endpoint first.
        let (client, zone) = match dns::get_zone(&public, d.id()).await {
            Ok(zone) => (public, zone),
            Err(e) if e.is_not_found() => {
                let regional = cfg
                    .new_service_client("dns_region", &region)
                    .await
                    .context("error creating DNS region client")?;
                match dns::get_zone(&regional, d.id()).await {
                    Ok(zone) => (regional, zone),
                    Err(e) => return check_deleted(d, e, "error retrieving DNS zone"),
                }
            }
            Err(e) => return check_deleted(d, e, "error retrieving DNS zone"),
        };
        log::debug!("retrieved DNS zone {}: {}", d.id(), zone.name);
        flatten_zone(d, &region, &zone)?;

        let base = dns::zone_tags_base(&client, &zone.zone_type, d.id());
        match tags::list_tags(&client, &base).await {
            Ok(tags) => d.set("tags", tags_value(&tags))?,
            Err(e) => log::warn!("error fetching tags of DNS zone ({}): {e}", d.id()),
        }
        Ok(())
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let private = d.get_string("zone_type") == "private";
        if private && d.get_list("router").is_empty() {
            return Err(ProviderError::Validation(
                "the argument (router) is required when updating DNS private zone".to_string(),
            ));
        }
        let client = zone_client(cfg, d).await?;
        let id = d.id().to_string();
        let timeout = d.timeout(TimeoutKind::Update);

        if d.has_changes(&["email", "ttl", "description"]) {
            let opts = UpdateZoneOpts {
                email: d.has_change("email").then(|| d.get_string("email")),
                ttl: d.has_change("ttl").then(|| d.get_int("ttl")),
                description: d.has_change("description").then(|| d.get_string("description")),
            };
            dns::update_zone(&client, &id, &opts).await.context("error updating DNS zone")?;
            wait_for_zone(
                &client,
                &id,
                &["PENDING"],
                &["ACTIVE", "DISABLE"],
                timeout,
                Duration::from_secs(3),
            )
            .await
            .context(format!("error waiting for DNS zone ({id}) to be updated"))?;
        }

        if d.has_change("status") && !d.get_string("status").is_empty() {
            set_status(&client, d, timeout).await?;
        }

        // Router binding requires an enabled zone.
        if private && d.has_change("router") {
            update_routers(&client, d, &region, timeout).await?;
        }

        if d.has_change("tags") {
            let old = d.get_change("tags").0.clone();
            update_tags(cfg, &client, d, &old).await?;
        }
        Ok(())
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = zone_client(cfg, d).await?;
        let id = d.id().to_string();

        dns::delete_zone(&client, &id).await.context("error deleting DNS zone")?;
        wait_for_zone(
            &client,
            &id,
            &["ACTIVE", "PENDING", "ERROR"],
            &["DELETED"],
            d.timeout(TimeoutKind::Delete),
            Duration::from_secs(3),
        )
        .await
        .context(format!("error waiting for DNS zone ({id}) to be deleted"))?;
        Ok(())
    }
}
