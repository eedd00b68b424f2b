//! Live VPC API tests
//!
//! Run with:
//! ```bash
//! HW_ACCESS_KEY=xxx HW_SECRET_KEY=yyy HW_REGION_NAME=cn-north-4 HW_PROJECT_ID=zzz \
//!     cargo test -p hwcloud-sdk --test vpc_test -- --ignored --nocapture
//! ```

mod common;

use hwcloud_sdk::pagination::{MarkerPage, Pager};
use hwcloud_sdk::services::vpc::{self, CreateVpcOpts, ListSubnetOpts, UpdateVpcOpts};

const CREDENTIALS: [&str; 4] = ["HW_ACCESS_KEY", "HW_SECRET_KEY", "HW_REGION_NAME", "HW_PROJECT_ID"];

#[tokio::test]
#[ignore = "integration test: requires HW_ACCESS_KEY, HW_SECRET_KEY, HW_REGION_NAME and HW_PROJECT_ID"]
async fn test_vpc_crud() {
    skip_if_no_credentials!(CREDENTIALS[0], CREDENTIALS[1], CREDENTIALS[2], CREDENTIALS[3]);
    let client = require_ok!(common::client("vpc"));
    let name = common::test_name();

    let opts = CreateVpcOpts {
        name: name.clone(),
        cidr: Some("192.168.0.0/16".to_string()),
        ..Default::default()
    };
    let created = require_ok!(vpc::create_vpc(&client, &opts).await, "create VPC");
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty(), "no ID in {created}");

    let fetched = vpc::get_vpc(&client, &id).await;
    let updated = vpc::update_vpc(
        &client,
        &id,
        &UpdateVpcOpts {
            name: format!("{name}-update"),
            ..Default::default()
        },
    )
    .await;

    require_ok!(vpc::delete_vpc(&client, &id).await, "delete VPC");

    let fetched = require_ok!(fetched);
    assert_eq!(fetched["name"], name.as_str());
    let updated = require_ok!(updated);
    assert_eq!(updated["name"], format!("{name}-update").as_str());
}

#[tokio::test]
#[ignore = "integration test: requires HW_ACCESS_KEY, HW_SECRET_KEY, HW_REGION_NAME and HW_PROJECT_ID"]
async fn test_get_missing_vpc_is_not_found() {
    skip_if_no_credentials!(CREDENTIALS[0], CREDENTIALS[1], CREDENTIALS[2], CREDENTIALS[3]);
    let client = require_ok!(common::client("vpc"));

    let err = vpc::get_vpc(&client, "00000000-0000-0000-0000-000000000000").await;
    assert!(err.as_ref().is_err_and(|e| e.is_not_found()), "{err:?}");
}

#[tokio::test]
#[ignore = "integration test: requires HW_ACCESS_KEY, HW_SECRET_KEY, HW_REGION_NAME and HW_PROJECT_ID"]
async fn test_list_subnets_pages_by_marker() {
    skip_if_no_credentials!(CREDENTIALS[0], CREDENTIALS[1], CREDENTIALS[2], CREDENTIALS[3]);
    let client = require_ok!(common::client("vpc"));

    let opts = ListSubnetOpts {
        limit: Some(1),
        ..Default::default()
    };
    let url = require_ok!(vpc::list_subnets_url(&client, &opts));
    let subnets = require_ok!(
        Pager::new(&client, url, MarkerPage::new("subnets").limit(1))
            .all_items()
            .await
    );
    println!("{} subnets", subnets.len());
    assert!(subnets.iter().all(|s| s["id"].is_string()));
}
