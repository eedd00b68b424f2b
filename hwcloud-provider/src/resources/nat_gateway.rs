//! `huaweicloud_nat_gateway`

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::services::nat::{self, CreateGatewayOpts, UpdateGatewayOpts};
use serde_json::Value;

use crate::common::check_deleted;
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult, ResultExt};
use crate::resource_data::{ResourceData, TimeoutKind};
use crate::schema::{Schema, SchemaMap, Validator, region_schema};
use crate::traits::Resource;
use crate::wait::{RefreshResult, StateChangeConf};

pub struct NatGateway;

async fn nat_client(cfg: &Config, d: &ResourceData) -> ProviderResult<ServiceClient> {
    cfg.new_service_client("nat", &cfg.get_region(d))
        .await
        .context("error creating NAT client")
}

async fn gateway_state(client: &ServiceClient, id: &str) -> RefreshResult {
    match nat::get_gateway(client, id).await {
        Ok(gw) => {
            let status = gw["status"].as_str().unwrap_or_default().to_string();
            Ok(Some((gw, status)))
        }
        Err(e) if e.is_not_found() => Ok(Some((Value::Null, "DELETED".to_string()))),
        Err(e) => Err(e.into()),
    }
}

fn build_create_opts(cfg: &Config, d: &ResourceData) -> CreateGatewayOpts {
    let non_empty = |s: String| Some(s).filter(|s| !s.is_empty());
    CreateGatewayOpts {
        name: d.get_string("name"),
        spec: d.get_string("spec"),
        router_id: d.get_string("vpc_id"),
        internal_network_id: d.get_string("subnet_id"),
        description: non_empty(d.get_string("description")),
        enterprise_project_id: non_empty(cfg.get_enterprise_project_id(d)),
    }
}

fn build_update_opts(d: &ResourceData) -> UpdateGatewayOpts {
    UpdateGatewayOpts {
        name: d.has_change("name").then(|| d.get_string("name")),
        spec: d.has_change("spec").then(|| d.get_string("spec")),
        description: d.has_change("description").then(|| d.get_string("description")),
    }
}

#[async_trait]
impl Resource for NatGateway {
    fn type_name(&self) -> &'static str {
        "huaweicloud_nat_gateway"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            ("name", Schema::string().required()),
            (
                "spec",
                Schema::string()
                    .required()
                    .validate(Validator::StringInSlice(&["1", "2", "3", "4"]))
                    .description("The specification of the NAT gateway, from 1 (small) to 4 (extra-large)."),
            ),
            ("vpc_id", Schema::string().required().force_new()),
            ("subnet_id", Schema::string().required().force_new()),
            ("description", Schema::string().optional().validate(Validator::StringLenBetween(0, 255))),
            ("enterprise_project_id", Schema::string().optional().computed().force_new()),
            ("status", Schema::string().computed()),
        ])
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = nat_client(cfg, d).await?;
        let opts = build_create_opts(cfg, d);
        log::debug!("create NAT gateway options: {opts:?}");

        let gw = nat::create_gateway(&client, &opts).await.context("error creating NAT gateway")?;
        let id = gw["id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Serialization("error creating NAT gateway: ID is not found in API response".to_string()))?
            .to_string();
        d.set_id(id.clone());

        StateChangeConf::new(&["PENDING_CREATE"], &["ACTIVE"], d.timeout(TimeoutKind::Create), || {
            gateway_state(&client, &id).boxed()
        })
        .delay(Duration::from_secs(5))
        .min_timeout(Duration::from_secs(3))
        .wait_for_state()
        .await
        .context(format!("error waiting for NAT gateway ({id}) to become ACTIVE"))?;
        Ok(())
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = nat_client(cfg, d).await?;
        let gw = match nat::get_gateway(&client, d.id()).await {
            Ok(gw) => gw,
            Err(e) => return check_deleted(d, e, "error retrieving NAT gateway"),
        };

        d.set("region", region)?;
        d.set("name", gw["name"].clone())?;
        d.set("spec", gw["spec"].clone())?;
        d.set("vpc_id", gw["router_id"].clone())?;
        d.set("subnet_id", gw["internal_network_id"].clone())?;
        d.set("description", gw["description"].clone())?;
        d.set("enterprise_project_id", gw["enterprise_project_id"].clone())?;
        d.set("status", gw["status"].clone())?;
        Ok(())
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        if !d.has_changes(&["name", "spec", "description"]) {
            return Ok(());
        }
        let client = nat_client(cfg, d).await?;
        let id = d.id().to_string();
        nat::update_gateway(&client, &id, &build_update_opts(d))
            .await
            .context(format!("error updating NAT gateway ({id})"))?;

        StateChangeConf::new(&["PENDING_UPDATE"], &["ACTIVE"], d.timeout(TimeoutKind::Update), || {
            gateway_state(&client, &id).boxed()
        })
        .delay(Duration::from_secs(5))
        .min_timeout(Duration::from_secs(3))
        .wait_for_state()
        .await
        .context(format!("error waiting for NAT gateway ({id}) to become ACTIVE"))?;
        Ok(())
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = nat_client(cfg, d).await?;
        let id = d.id().to_string();

        if let Err(e) = nat::delete_gateway(&client, &id).await {
            return check_deleted(d, e, "error deleting NAT gateway");
        }
        StateChangeConf::new(&["ACTIVE", "PENDING_DELETE"], &["DELETED"], d.timeout(TimeoutKind::Delete), || {
            gateway_state(&client, &id).boxed()
        })
        .delay(Duration::from_secs(5))
        .min_timeout(Duration::from_secs(3))
        .wait_for_state()
        .await
        .context(format!("error waiting for NAT gateway ({id}) to be deleted"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::{changed_data, new_data, test_config};

    fn raw() -> Value {
        json!({"name": "nat-1", "spec": "1", "vpc_id": "vpc-1", "subnet_id": "net-1"})
    }

    #[test]
    fn create_opts_map_network_ids() {
        let d = new_data(NatGateway.schema(), &raw());
        let opts = build_create_opts(&test_config(), &d);
        assert_eq!(opts.router_id, "vpc-1");
        assert_eq!(opts.internal_network_id, "net-1");
        assert_eq!(opts.description, None);
    }

    #[test]
    fn update_sends_changed_fields_only() {
        let mut planned = raw();
        planned["spec"] = json!(2);
        let d = changed_data(NatGateway.schema(), "gw-1", &raw(), &planned);
        let opts = build_update_opts(&d);
        assert_eq!(opts.spec.as_deref(), Some("2"));
        assert_eq!(opts.name, None);
    }

    #[test]
    fn spec_out_of_range_rejected() {
        let mut bad = raw();
        bad["spec"] = json!("5");
        let errors = crate::schema::prepare_config(&NatGateway.schema(), bad.as_object().unwrap_or(&serde_json::Map::new()))
            .err()
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("spec"));
    }
}
