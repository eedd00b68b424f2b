//! `huaweicloud_ces_alarm_template`

use std::collections::BTreeMap;

use async_trait::async_trait;
use hwcloud_sdk::request::value_ignore_empty;
use hwcloud_sdk::services::ces;
use serde_json::{Value, json};

use crate::common::check_deleted;
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult, ResultExt};
use crate::resource_data::ResourceData;
use crate::schema::{Schema, SchemaMap, enable_force_new_schema, region_schema};
use crate::traits::Resource;

pub struct CesAlarmTemplate;

fn hierarchical_value_schema() -> Schema {
    Schema::block_list(BTreeMap::from([
        ("critical", Schema::float().optional()),
        ("major", Schema::float().optional()),
        ("minor", Schema::float().optional()),
        ("info", Schema::float().optional()),
    ]))
    .optional()
    .max_items(1)
}

fn policy_schema() -> Schema {
    Schema::block_list(BTreeMap::from([
        ("namespace", Schema::string().required()),
        ("metric_name", Schema::string().required()),
        ("period", Schema::int().required()),
        ("filter", Schema::string().required()),
        ("comparison_operator", Schema::string().required()),
        ("count", Schema::int().required()),
        ("suppress_duration", Schema::int().required()),
        ("value", Schema::int().optional().computed()),
        ("hierarchical_value", hierarchical_value_schema()),
        ("alarm_level", Schema::int().optional().computed()),
        ("unit", Schema::string().optional().computed()),
        ("dimension_name", Schema::string().optional()),
    ]))
    .required()
    .min_items(1)
}

fn build_hierarchical_value(raw: &Value) -> Value {
    match raw.as_array().map(Vec::as_slice) {
        Some([v]) => json!({
            "critical": value_ignore_empty(v["critical"].clone()),
            "major": value_ignore_empty(v["major"].clone()),
            "minor": value_ignore_empty(v["minor"].clone()),
            "info": value_ignore_empty(v["info"].clone()),
        }),
        _ => Value::Null,
    }
}

fn build_policies(d: &ResourceData) -> Value {
    let policies: Vec<Value> = d
        .get_list("policies")
        .iter()
        .map(|p| {
            json!({
                "namespace": value_ignore_empty(p["namespace"].clone()),
                "dimension_name": value_ignore_empty(p["dimension_name"].clone()),
                "metric_name": value_ignore_empty(p["metric_name"].clone()),
                "period": p["period"],
                "filter": value_ignore_empty(p["filter"].clone()),
                "comparison_operator": value_ignore_empty(p["comparison_operator"].clone()),
                "value": p["value"],
                "hierarchical_value": build_hierarchical_value(&p["hierarchical_value"]),
                "unit": value_ignore_empty(p["unit"].clone()),
                "count": value_ignore_empty(p["count"].clone()),
                "alarm_level": value_ignore_empty(p["alarm_level"].clone()),
                "suppress_duration": p["suppress_duration"],
            })
        })
        .collect();
    value_ignore_empty(Value::Array(policies))
}

fn build_create_body(d: &ResourceData) -> Value {
    json!({
        "template_name": d.get_string("name"),
        "template_type": value_ignore_empty(d.get("type").clone()),
        "template_description": value_ignore_empty(d.get("description").clone()),
        "is_overwrite": value_ignore_empty(d.get("is_overwrite").clone()),
        "policies": build_policies(d),
    })
}

fn build_update_body(d: &ResourceData) -> Value {
    json!({
        "template_name": d.get_string("name"),
        "template_type": value_ignore_empty(d.get("type").clone()),
        "template_description": value_ignore_empty(d.get("description").clone()),
        "policies": build_policies(d),
    })
}

/// Policies for state. `hierarchical_value` is only kept where the configuration sets it.
fn flatten_policies(d: &ResourceData, body: &Value) -> Value {
    let policies = body["policies"].as_array().cloned().unwrap_or_default();
    Value::Array(
        policies
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let configured = d.get_ok(&format!("policies.{i}.hierarchical_value")).is_some();
                let hierarchical = match &p["hierarchical_value"] {
                    h if configured && !h.is_null() => json!([{
                        "critical": h["critical"],
                        "major": h["major"],
                        "minor": h["minor"],
                        "info": h["info"],
                    }]),
                    _ => Value::Null,
                };
                json!({
                    "namespace": p["namespace"],
                    "dimension_name": p["dimension_name"],
                    "metric_name": p["metric_name"],
                    "period": p["period"],
                    "filter": p["filter"],
                    "comparison_operator": p["comparison_operator"],
                    "value": p["value"],
                    "hierarchical_value": hierarchical,
                    "unit": p["unit"],
                    "count": p["count"],
                    "alarm_level": p["alarm_level"],
                    "suppress_duration": p["suppress_duration"],
                })
            })
            .collect(),
    )
}

#[async_trait]
impl Resource for CesAlarmTemplate {
    fn type_name(&self) -> &'static str {
        "huaweicloud_ces_alarm_template"
    }

    fn schema(&self) -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            ("name", Schema::string().required().description("Specifies the name of the CES alarm template.")),
            ("policies", policy_schema()),
            ("type", Schema::int().optional().description("Specifies the type of the CES alarm template.")),
            ("description", Schema::string().optional().computed()),
            ("is_overwrite", Schema::bool().optional().computed()),
            ("delete_associate_alarm", Schema::bool().optional()),
            ("enable_force_new", enable_force_new_schema()),
            ("association_alarm_total", Schema::int().computed()),
        ])
    }

    fn non_updatable_params(&self) -> &'static [&'static str] {
        &["type", "is_overwrite"]
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("ces", &region)
            .await
            .context("error creating CES client")?;

        let resp = ces::create_template(&client, build_create_body(d))
            .await
            .context("error creating CES alarm template")?;
        let id = resp["template_id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ProviderError::Serialization("error creating CES alarm template: ID is not found in API response".to_string())
            })?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("ces", &region)
            .await
            .context("error creating CES client")?;
        let body = match ces::get_template(&client, d.id()).await {
            Ok(b) => b,
            Err(e) => return check_deleted(d, e, "error retrieving CES alarm template"),
        };

        let template_type = ces::template_type_code(body["template_type"].as_str().unwrap_or_default());
        let policies = flatten_policies(d, &body);
        d.set("region", region)?;
        d.set("name", body["template_name"].clone())?;
        d.set("type", template_type)?;
        d.set("description", body["template_description"].clone())?;
        d.set("association_alarm_total", body["association_alarm_total"].clone())?;
        d.set("policies", policies)?;
        Ok(())
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        if !d.has_changes(&["name", "description", "policies"]) {
            return Ok(());
        }
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("ces", &region)
            .await
            .context("error creating CES client")?;
        ces::update_template(&client, d.id(), build_update_body(d))
            .await
            .context("error updating CES alarm template")?;
        Ok(())
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .new_service_client("ces", &region)
            .await
            .context("error creating CES client")?;
        ces::delete_template(&client, d.id(), d.get_bool("delete_associate_alarm"))
            .await
            .context("error deleting CES alarm template")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hwcloud_sdk::request::remove_nil;

    use super::*;
    use crate::test_utils::{changed_data, new_data};

    fn raw() -> Value {
        json!({
            "name": "tpl-1",
            "policies": [{
                "namespace": "SYS.ECS",
                "metric_name": "cpu_util",
                "period": 1,
                "filter": "average",
                "comparison_operator": ">",
                "count": 3,
                "suppress_duration": 0,
                "value": 80,
                "unit": "%",
            }],
        })
    }

    #[test]
    fn create_body_drops_empty_fields() {
        let d = new_data(CesAlarmTemplate.schema(), &raw());
        let body = remove_nil(build_create_body(&d));
        assert_eq!(body["template_name"], "tpl-1");
        assert!(body.get("template_type").is_none());
        assert!(body.get("is_overwrite").is_none());
        let policy = &body["policies"][0];
        assert_eq!(policy["suppress_duration"], 0);
        assert_eq!(policy["value"], 80);
        assert!(policy.get("dimension_name").is_none());
        assert!(policy.get("hierarchical_value").is_none());
    }

    #[test]
    fn hierarchical_value_needs_single_block() {
        assert_eq!(
            remove_nil(build_hierarchical_value(&json!([{"critical": 90.0, "major": 0.0}]))),
            json!({"critical": 90.0})
        );
        assert_eq!(build_hierarchical_value(&json!([])), Value::Null);
    }

    #[test]
    fn update_body_leaves_out_overwrite() {
        let mut planned = raw();
        planned["name"] = json!("tpl-2");
        planned["is_overwrite"] = json!(true);
        let d = changed_data(CesAlarmTemplate.schema(), "at-1", &raw(), &planned);
        let body = remove_nil(build_update_body(&d));
        assert_eq!(body["template_name"], "tpl-2");
        assert!(body.get("is_overwrite").is_none());
    }

    #[test]
    fn flatten_skips_unconfigured_hierarchy() {
        let d = new_data(CesAlarmTemplate.schema(), &raw());
        let body = json!({"policies": [{"metric_name": "cpu_util", "hierarchical_value": {"critical": 1.0}}]});
        let policies = flatten_policies(&d, &body);
        assert_eq!(policies[0]["metric_name"], "cpu_util");
        assert_eq!(policies[0]["hierarchical_value"], Value::Null);
    }
}
