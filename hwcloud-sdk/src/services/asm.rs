//! ASM v1 API: service meshes
//!
//! Mesh bodies are Kubernetes-style `{metadata, spec, status}` documents, so the
//! calls take and return plain JSON.

use reqwest::Method;
use serde_json::Value;

use crate::client::{RequestOpts, ServiceClient};
use crate::error::Result;
use crate::extract::{path_search_list, path_search_str};

/// Mesh phases that end a wait with an error.
pub const FAILURE_PHASES: &[&str] = &[
    "CreateFailed",
    "DeleteFailed",
    "UpgradeFailed",
    "RollbackFailed",
];

pub fn meshes_url(client: &ServiceClient) -> String {
    client.url_for("v1/{project_id}/meshes", &[])
}

pub fn mesh_url(client: &ServiceClient, id: &str) -> String {
    client.url_for("v1/{project_id}/meshes/{id}", &[("id", id)])
}

/// `POST meshes`; returns the created mesh, whose ID is `metadata.uid`.
pub async fn create_mesh(client: &ServiceClient, body: Value) -> Result<Value> {
    let resp = client
        .request(
            Method::POST,
            &meshes_url(client),
            RequestOpts::json(body).ok_codes(&[201]),
        )
        .await?;
    Ok(resp.body)
}

pub async fn get_mesh(client: &ServiceClient, id: &str) -> Result<Value> {
    client.get(&mesh_url(client, id)).await
}

pub async fn delete_mesh(client: &ServiceClient, id: &str) -> Result<()> {
    client
        .request(
            Method::DELETE,
            &mesh_url(client, id),
            RequestOpts::default().ok_codes(&[200, 202, 204]),
        )
        .await?;
    Ok(())
}

/// Mesh UID from a create or get response.
pub fn mesh_id(body: &Value) -> Option<String> {
    path_search_str("metadata.uid", body)
}

/// Mesh phase from `status.phase`.
pub fn mesh_phase(body: &Value) -> Option<String> {
    path_search_str("status.phase", body)
}

/// Meshes in a list response.
pub fn list_items(body: &Value) -> Vec<Value> {
    path_search_list("items", body)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn extracts_uid_and_phase() {
        let body = json!({
            "metadata": {"uid": "m-1", "name": "mesh"},
            "status": {"phase": "Running"}
        });
        assert_eq!(mesh_id(&body).as_deref(), Some("m-1"));
        assert_eq!(mesh_phase(&body).as_deref(), Some("Running"));
        assert!(FAILURE_PHASES.contains(&"CreateFailed"));
    }

    #[test]
    fn mesh_paths() {
        let c = ServiceClient::builder("asm", crate::client::Credentials::Token("t".into()))
            .region("ap-southeast-1")
            .project_id("p1")
            .http_client(reqwest::Client::new())
            .build()
            .unwrap();
        assert_eq!(
            mesh_url(&c, "m-1"),
            "https://asm.ap-southeast-1.myhuaweicloud.com/v1/p1/meshes/m-1"
        );
        assert!(list_items(&json!({"items": []})).is_empty());
    }
}
