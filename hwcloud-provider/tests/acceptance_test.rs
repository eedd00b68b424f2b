//! Acceptance tests against a live HuaweiCloud account
//!
//! Run with:
//! ```bash
//! HW_ACCESS_KEY=xxx HW_SECRET_KEY=yyy HW_REGION_NAME=cn-north-4 \
//!     cargo test -p hwcloud-provider --test acceptance_test -- --ignored --nocapture
//! ```

mod common;

use hwcloud_provider::types::PlanAction;
use serde_json::{Value, json};

use common::{TestContext, cleanup, config, random_name};

#[tokio::test]
#[ignore = "acceptance test: requires HW_ACCESS_KEY, HW_SECRET_KEY and HW_REGION_NAME"]
async fn vpc_lifecycle() {
    skip_if_no_credentials!("HW_ACCESS_KEY", "HW_SECRET_KEY", "HW_REGION_NAME");
    let ctx = require_ok!(TestContext::from_env());
    let service = &ctx.service;
    let name = random_name();

    // create
    let cfg = config(json!({
        "name": name,
        "cidr": "192.168.0.0/16",
        "description": "created by acceptance test",
        "tags": {"foo": "bar"},
    }));
    let state = require_ok!(service.apply("huaweicloud_vpc", "test", &cfg, None).await, "create VPC");
    assert!(!state.id.is_empty());
    assert_eq!(state.attribute("name"), Some(Value::String(name.clone())));
    assert_eq!(state.attribute("cidr"), Some(json!("192.168.0.0/16")));
    assert_eq!(state.attribute("status"), Some(json!("OK")));

    // update in place
    let updated_name = format!("{name}-update");
    let cfg = config(json!({
        "name": updated_name,
        "cidr": "192.168.0.0/16",
        "description": "updated by acceptance test",
        "tags": {"foo": "baz", "key": "value"},
    }));
    let plan = service.plan("huaweicloud_vpc", &cfg, Some(&state));
    assert!(matches!(plan.as_ref().map(|p| p.action), Ok(PlanAction::Update)), "{plan:?}");
    let state = match service.apply("huaweicloud_vpc", "test", &cfg, Some(&state)).await {
        Ok(s) => s,
        Err(e) => {
            cleanup(service, &state).await;
            panic!("update VPC: {e}");
        }
    };
    assert_eq!(state.attribute("name"), Some(Value::String(updated_name)));
    assert_eq!(state.attribute("description"), Some(json!("updated by acceptance test")));

    // import must read back the same attributes, so planning against it is a no-op
    let imported = service.import("huaweicloud_vpc", "imported", &state.id).await;
    match &imported {
        Ok(imported) => {
            assert_eq!(imported.id, state.id);
            assert_eq!(imported.attribute("name"), state.attribute("name"));
            assert_eq!(imported.attribute("cidr"), state.attribute("cidr"));
            let plan = service.plan("huaweicloud_vpc", &cfg, Some(imported));
            assert!(matches!(plan.as_ref().map(|p| p.action), Ok(PlanAction::NoOp)), "{plan:?}");
        }
        Err(e) => eprintln!("import failed: {e}"),
    }

    // destroy, then the resource must be gone
    require_ok!(service.destroy(&state).await, "destroy VPC");
    let refreshed = require_ok!(service.refresh(&state).await);
    assert!(refreshed.is_none(), "VPC {} still exists after destroy", state.id);
    assert!(imported.is_ok());
}

#[tokio::test]
#[ignore = "acceptance test: requires HW_ACCESS_KEY, HW_SECRET_KEY and HW_REGION_NAME"]
async fn vpc_subnet_lifecycle() {
    skip_if_no_credentials!("HW_ACCESS_KEY", "HW_SECRET_KEY", "HW_REGION_NAME");
    let ctx = require_ok!(TestContext::from_env());
    let service = &ctx.service;
    let name = random_name();

    let vpc_cfg = config(json!({"name": name, "cidr": "192.168.0.0/16"}));
    let vpc = require_ok!(service.apply("huaweicloud_vpc", "test", &vpc_cfg, None).await, "create VPC");

    let subnet_cfg = config(json!({
        "name": name,
        "cidr": "192.168.0.0/24",
        "gateway_ip": "192.168.0.1",
        "vpc_id": vpc.id,
    }));
    let subnet = match service.apply("huaweicloud_vpc_subnet", "test", &subnet_cfg, None).await {
        Ok(s) => s,
        Err(e) => {
            cleanup(service, &vpc).await;
            panic!("create subnet: {e}");
        }
    };
    assert_eq!(subnet.attribute("status"), Some(json!("ACTIVE")));
    assert_eq!(subnet.attribute("vpc_id"), Some(Value::String(vpc.id.clone())));

    // the subnet must be visible through the data source
    let query = config(json!({"vpc_id": vpc.id, "name": name}));
    let found = service.read_data_source("huaweicloud_vpc_subnets", "test", &query).await;

    cleanup(service, &subnet).await;
    cleanup(service, &vpc).await;

    let found = require_ok!(found);
    let subnets = require_some!(found.attributes.get("subnets").and_then(Value::as_array));
    assert_eq!(subnets.len(), 1);
    assert_eq!(subnets[0]["id"], Value::String(subnet.id.clone()));

    let gone = require_ok!(service.refresh(&subnet).await);
    assert!(gone.is_none());
}

#[tokio::test]
#[ignore = "acceptance test: requires HW_ACCESS_KEY, HW_SECRET_KEY and HW_REGION_NAME"]
async fn dns_zone_lifecycle() {
    skip_if_no_credentials!("HW_ACCESS_KEY", "HW_SECRET_KEY", "HW_REGION_NAME");
    let ctx = require_ok!(TestContext::from_env());
    let service = &ctx.service;
    let zone_name = format!("{}.com.", random_name());

    let cfg = config(json!({
        "name": zone_name,
        "email": "email@example.com",
        "ttl": 3000,
        "description": "a public zone",
    }));
    let state = require_ok!(service.apply("huaweicloud_dns_zone", "test", &cfg, None).await, "create zone");
    assert_eq!(state.attribute("zone_type"), Some(json!("public")));
    assert_eq!(state.attribute("status"), Some(json!("ENABLE")));

    let cfg = config(json!({
        "name": zone_name,
        "email": "email@example.com",
        "ttl": 6000,
        "description": "an updated public zone",
    }));
    let updated = service.apply("huaweicloud_dns_zone", "test", &cfg, Some(&state)).await;
    if let Ok(updated) = &updated {
        assert_eq!(updated.attribute("ttl"), Some(json!(6000)));
    }

    require_ok!(service.destroy(&state).await, "destroy zone");
    require_ok!(updated, "update zone");
    let gone = require_ok!(service.refresh(&state).await);
    assert!(gone.is_none());
}

#[test]
fn require_ok_needs_no_debug_on_the_value() {
    struct Opaque(u8);
    let value = require_ok!(Ok::<_, String>(Opaque(7)), "opaque value");
    assert_eq!(value.0, 7);
}
