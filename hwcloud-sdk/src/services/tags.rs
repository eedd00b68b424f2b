//! Resource tag API shared by VPC, NAT and DNS
//!
//! Tags are listed with `GET {base}/tags` and changed with
//! `POST {base}/tags/action` carrying `{"action": "create"|"delete", "tags": [...]}`.

use std::collections::BTreeMap;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{RequestOpts, ServiceClient};
use crate::error::Result;

/// One `{key, value}` pair as sent and received by the tag APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Convert a tag map into the list form.
pub fn expand_tags(tags: &BTreeMap<String, String>) -> Vec<ResourceTag> {
    tags.iter()
        .map(|(key, value)| ResourceTag {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

/// Convert the list form back into a map.
pub fn flatten_tags(tags: &[ResourceTag]) -> BTreeMap<String, String> {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

/// Read the tags below `base` (a resource URL without `/tags`).
pub async fn list_tags(client: &ServiceClient, base: &str) -> Result<BTreeMap<String, String>> {
    let body = client.get(&format!("{base}/tags")).await?;
    let tags: Vec<ResourceTag> = body
        .get("tags")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    Ok(flatten_tags(&tags))
}

/// Delete tags that disappeared or changed, then create new and changed ones.
pub async fn update_tags(
    client: &ServiceClient,
    base: &str,
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> Result<()> {
    let removed: BTreeMap<String, String> = old
        .iter()
        .filter(|(k, v)| new.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let added: BTreeMap<String, String> = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let url = format!("{base}/tags/action");
    for (action, tags) in [("delete", removed), ("create", added)] {
        if tags.is_empty() {
            continue;
        }
        let body = json!({"action": action, "tags": expand_tags(&tags)});
        client
            .request(
                Method::POST,
                &url,
                RequestOpts::json(body).ok_codes(&[200, 202, 204]),
            )
            .await?;
    }
    Ok(())
}
