//! `huaweicloud_vpc`

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::services::{tags, vpc};
use serde_json::Value;

use crate::common::{check_deleted, string_map, tags_value};
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult, ResultExt};
use crate::resource_data::{ResourceData, TimeoutKind, Timeouts};
use crate::schema::{Schema, SchemaMap, Validator, region_schema};
use crate::traits::Resource;
use crate::wait::{RefreshResult, StateChangeConf};

pub struct Vpc;

async fn vpc_client(cfg: &Config, d: &ResourceData) -> ProviderResult<ServiceClient> {
    cfg.new_service_client("vpc", &cfg.get_region(d))
        .await
        .context("error creating VPC client")
}

fn build_create_opts(cfg: &Config, d: &ResourceData) -> vpc::CreateVpcOpts {
    let non_empty = |s: String| Some(s).filter(|s| !s.is_empty());
    vpc::CreateVpcOpts {
        name: d.get_string("name"),
        cidr: non_empty(d.get_string("cidr")),
        description: non_empty(d.get_string("description")),
        enterprise_project_id: non_empty(cfg.get_enterprise_project_id(d)),
    }
}

async fn vpc_state(client: &ServiceClient, id: &str) -> RefreshResult {
    match vpc::get_vpc(client, id).await {
        Ok(body) => {
            let status = body["status"].as_str().unwrap_or_default().to_string();
            Ok(Some((body, status)))
        }
        Err(e) if e.is_not_found() => Ok(Some((Value::Null, "DELETED".to_string()))),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Resource for Vpc {
    fn type_name(&self) -> &'static str {
        "huaweicloud_vpc"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            (
                "name",
                Schema::string()
                    .required()
                    .validate(Validator::StringLenBetween(1, 64))
                    .description("The name of the VPC."),
            ),
            ("cidr", Schema::string().optional().computed()),
            ("description", Schema::string().optional().validate(Validator::StringLenBetween(0, 255))),
            ("enterprise_project_id", Schema::string().optional().computed().force_new()),
            ("tags", Schema::map().optional()),
            ("status", Schema::string().computed()),
        ])
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            create: Duration::from_secs(10 * 60),
            delete: Duration::from_secs(3 * 60),
            ..Timeouts::default()
        }
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = vpc_client(cfg, d).await?;
        let opts = build_create_opts(cfg, d);
        log::debug!("create VPC options: {opts:?}");

        let created = vpc::create_vpc(&client, &opts).await.context("error creating VPC")?;
        let id = created["id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Serialization("error creating VPC: ID is not found in API response".to_string()))?
            .to_string();
        d.set_id(id.clone());
        log::info!("VPC ID: {id}");

        StateChangeConf::new(&["CREATING"], &["OK"], d.timeout(TimeoutKind::Create), || {
            vpc_state(&client, &id).boxed()
        })
        .delay(Duration::from_secs(5))
        .min_timeout(Duration::from_secs(3))
        .wait_for_state()
        .await
        .context(format!("error waiting for VPC ({id}) to become available"))?;

        let tags = cfg.merge_default_tags(d.get_map("tags"));
        if !tags.is_empty() {
            let base = vpc::tags_base(&client, "vpcs", &id);
            tags::update_tags(&client, &base, &BTreeMap::new(), &tags)
                .await
                .context(format!("error setting tags of VPC {id}"))?;
        }
        Ok(())
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = vpc_client(cfg, d).await?;
        let body = match vpc::get_vpc(&client, d.id()).await {
            Ok(body) => body,
            Err(e) => return check_deleted(d, e, "error retrieving VPC"),
        };

        d.set("region", region)?;
        d.set("name", body["name"].clone())?;
        d.set("cidr", body["cidr"].clone())?;
        d.set("description", body["description"].clone())?;
        d.set("enterprise_project_id", body["enterprise_project_id"].clone())?;
        d.set("status", body["status"].clone())?;

        let base = vpc::tags_base(&client, "vpcs", d.id());
        match tags::list_tags(&client, &base).await {
            Ok(tags) => d.set("tags", tags_value(&tags))?,
            Err(e) => log::warn!("error fetching tags of VPC ({}): {e}", d.id()),
        }
        Ok(())
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = vpc_client(cfg, d).await?;
        let id = d.id().to_string();

        if d.has_changes(&["name", "cidr", "description"]) {
            let opts = vpc::UpdateVpcOpts {
                name: d.get_string("name"),
                cidr: d.has_change("cidr").then(|| d.get_string("cidr")),
                description: d.has_change("description").then(|| d.get_string("description")),
            };
            vpc::update_vpc(&client, &id, &opts).await.context("error updating VPC")?;
        }

        if d.has_change("tags") {
            let base = vpc::tags_base(&client, "vpcs", &id);
            let old = string_map(d.get_change("tags").0);
            let new = cfg.merge_default_tags(d.get_map("tags"));
            tags::update_tags(&client, &base, &old, &new)
                .await
                .context(format!("error updating tags of VPC {id}"))?;
        }
        Ok(())
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = vpc_client(cfg, d).await?;
        let id = d.id().to_string();

        if let Err(e) = vpc::delete_vpc(&client, &id).await {
            return check_deleted(d, e, "error deleting VPC");
        }
        StateChangeConf::new(&["OK"], &["DELETED"], d.timeout(TimeoutKind::Delete), || {
            vpc_state(&client, &id).boxed()
        })
        .delay(Duration::from_secs(5))
        .min_timeout(Duration::from_secs(3))
        .wait_for_state()
        .await
        .context(format!("error waiting for VPC ({id}) to be deleted"))?;
        Ok(())
    }
}
