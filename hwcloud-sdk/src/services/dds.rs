//! DDS v3 API: document database instances

use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};

use crate::client::{RequestOpts, ServiceClient};
use crate::error::Result;
use crate::extract::path_search;
use crate::request::{FieldRule, RequestBody, build_request_body};

#[derive(Debug, Clone, Default, Serialize)]
pub struct DataStore {
    #[serde(rename = "type")]
    pub store_type: String,
    pub version: String,
    pub storage_engine: String,
}

/// One node group flavor. `size` and `storage` only apply to shard, replica and single nodes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Flavor {
    #[serde(rename = "type")]
    pub flavor_type: String,
    pub num: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    pub spec_code: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupStrategy {
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_days: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateInstanceOpts {
    pub name: String,
    pub datastore: DataStore,
    pub region: String,
    pub availability_zone: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub password: String,
    /// `Sharding`, `ReplicaSet` or `Single`.
    pub mode: String,
    pub flavor: Vec<Flavor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_encryption_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_strategy: Option<BackupStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<String>,
    /// `"1"` enables SSL, `"0"` disables it.
    pub ssl_option: String,
}

impl RequestBody for CreateInstanceOpts {
    fn rules() -> &'static [FieldRule] {
        &[
            FieldRule::Required("name"),
            FieldRule::Required("datastore.type"),
            FieldRule::Required("datastore.version"),
            FieldRule::Required("region"),
            FieldRule::Required("availability_zone"),
            FieldRule::Required("vpc_id"),
            FieldRule::Required("subnet_id"),
            FieldRule::Required("security_group_id"),
            FieldRule::Required("password"),
            FieldRule::Required("mode"),
            FieldRule::Required("flavor"),
        ]
    }
}

pub fn instances_url(client: &ServiceClient) -> String {
    client.service_url(&["instances"])
}

pub fn instance_url(client: &ServiceClient, id: &str) -> String {
    client.service_url(&["instances", id])
}

/// `POST instances`; the body holds the new `id` and a `job_id`.
pub async fn create_instance(client: &ServiceClient, opts: &CreateInstanceOpts) -> Result<Value> {
    let body = build_request_body(opts, None)?;
    let resp = client
        .request(
            Method::POST,
            &instances_url(client),
            RequestOpts::json(body).ok_codes(&[202]),
        )
        .await?;
    Ok(resp.body)
}

/// Look an instance up with `GET instances?id=`. `None` when the list is empty.
pub async fn find_instance(client: &ServiceClient, id: &str) -> Result<Option<Value>> {
    let url = format!("{}?id={}", instances_url(client), urlencoding::encode(id));
    let body = client.get(&url).await?;
    Ok(path_search("instances[0]", &body))
}

pub async fn rename_instance(client: &ServiceClient, id: &str, name: &str) -> Result<()> {
    client
        .request(
            Method::PUT,
            &format!("{}/modify-name", instance_url(client, id)),
            RequestOpts::json(json!({ "new_instance_name": name })).ok_codes(&[200, 202, 204]),
        )
        .await?;
    Ok(())
}

pub async fn set_remark(client: &ServiceClient, id: &str, remark: &str) -> Result<()> {
    client
        .request(
            Method::PUT,
            &format!("{}/remark", instance_url(client, id)),
            RequestOpts::json(json!({ "remark": remark })).ok_codes(&[200, 202, 204]),
        )
        .await?;
    Ok(())
}

pub async fn reset_password(client: &ServiceClient, id: &str, password: &str) -> Result<()> {
    client
        .request(
            Method::PUT,
            &format!("{}/reset-password", instance_url(client, id)),
            RequestOpts::json(json!({ "user_pwd": password })).ok_codes(&[200, 202, 204]),
        )
        .await?;
    Ok(())
}

pub async fn delete_instance(client: &ServiceClient, id: &str) -> Result<()> {
    client
        .request(
            Method::DELETE,
            &instance_url(client, id),
            RequestOpts::default().ok_codes(&[200, 202]),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;

    fn opts() -> CreateInstanceOpts {
        CreateInstanceOpts {
            name: "dds-1".into(),
            datastore: DataStore {
                store_type: "DDS-Community".into(),
                version: "4.0".into(),
                storage_engine: "wiredTiger".into(),
            },
            region: "cn-north-4".into(),
            availability_zone: "cn-north-4a".into(),
            vpc_id: "vpc".into(),
            subnet_id: "subnet".into(),
            security_group_id: "sg".into(),
            password: "Passw0rd!".into(),
            mode: "ReplicaSet".into(),
            flavor: vec![Flavor {
                flavor_type: "replica".into(),
                num: 1,
                storage: Some("ULTRAHIGH".into()),
                size: Some(30),
                spec_code: "dds.mongodb.s6.large.2.repset".into(),
            }],
            ssl_option: "1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn create_body_renames_type_fields() {
        let body = build_request_body(&opts(), None).unwrap();
        assert_eq!(body["datastore"]["type"], "DDS-Community");
        assert_eq!(body["flavor"][0]["type"], "replica");
        assert_eq!(body["ssl_option"], "1");
        assert!(body.get("port").is_none());
    }

    #[test]
    fn flavor_required() {
        let mut o = opts();
        o.flavor.clear();
        assert!(matches!(
            build_request_body(&o, None),
            Err(SdkError::MissingRequiredField { field }) if field == "flavor"
        ));
    }
}
