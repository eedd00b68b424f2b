//! CES v2 API: alarm templates
//!
//! Bodies are assembled map-style by the caller with
//! [`value_ignore_empty`](crate::request::value_ignore_empty), matching how the
//! console sends them.

use reqwest::Method;
use serde_json::{Value, json};

use crate::client::{RequestOpts, ServiceClient};
use crate::error::Result;
use crate::request::remove_nil;

pub fn templates_url(client: &ServiceClient) -> String {
    client.url_for("v2/{project_id}/alarm-templates", &[])
}

pub fn template_url(client: &ServiceClient, id: &str) -> String {
    client.url_for("v2/{project_id}/alarm-templates/{template_id}", &[("template_id", id)])
}

/// Returns the new `template_id`.
pub async fn create_template(client: &ServiceClient, body: Value) -> Result<Value> {
    let resp = client
        .request(
            Method::POST,
            &templates_url(client),
            RequestOpts::json(remove_nil(body)).ok_codes(&[200, 201]),
        )
        .await?;
    Ok(resp.body)
}

pub async fn get_template(client: &ServiceClient, id: &str) -> Result<Value> {
    client.get(&template_url(client, id)).await
}

pub async fn update_template(client: &ServiceClient, id: &str, body: Value) -> Result<()> {
    client
        .request(
            Method::PUT,
            &template_url(client, id),
            RequestOpts::json(remove_nil(body)).ok_codes(&[204]),
        )
        .await?;
    Ok(())
}

/// `POST alarm-templates/batch-delete` for a single template.
pub async fn delete_template(
    client: &ServiceClient,
    id: &str,
    delete_associate_alarm: bool,
) -> Result<()> {
    let mut body = json!({ "template_ids": [id] });
    if delete_associate_alarm {
        body["delete_associate_alarm"] = json!(true);
    }
    client
        .request(
            Method::POST,
            &format!("{}/batch-delete", templates_url(client)),
            RequestOpts::json(body).ok_codes(&[200, 204]),
        )
        .await?;
    Ok(())
}

/// `template_type` as returned by the API mapped to the numeric argument.
/// `custom` is 0, `custom_event` is 2; system templates read as -1.
pub fn template_type_code(raw: &str) -> i64 {
    match raw {
        "custom" => 0,
        "custom_event" => 2,
        _ => -1,
    }
}
