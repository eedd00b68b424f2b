//! JSON description of registered schemas for `hwcloud schema`

use hwcloud_provider::ResourceRegistry;
use hwcloud_provider::schema::{Schema, SchemaMap, ValueType};
use serde_json::{Map, Value, json};

fn type_name(value_type: &ValueType) -> Value {
    match value_type {
        ValueType::String => json!("string"),
        ValueType::Int => json!("int"),
        ValueType::Float => json!("float"),
        ValueType::Bool => json!("bool"),
        ValueType::Map => json!("map"),
        ValueType::List(elem) => match &elem.value_type {
            ValueType::Block(_) => json!("block_list"),
            other => json!({ "list": type_name(other) }),
        },
        ValueType::Block(_) => json!("block"),
    }
}

fn describe(schema: &Schema) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), type_name(&schema.value_type));
    if schema.is_set {
        out.insert("set".into(), json!(true));
    }
    for (flag, set) in [
        ("required", schema.required),
        ("optional", schema.optional),
        ("computed", schema.computed),
        ("force_new", schema.force_new),
        ("sensitive", schema.sensitive),
    ] {
        if set {
            out.insert(flag.into(), json!(true));
        }
    }
    if let Some(default) = &schema.default {
        out.insert("default".into(), default.clone());
    }
    if schema.min_items > 0 {
        out.insert("min_items".into(), json!(schema.min_items));
    }
    if let Some(max) = schema.max_items {
        out.insert("max_items".into(), json!(max));
    }
    if !schema.description.is_empty() {
        out.insert("description".into(), json!(schema.description));
    }
    if let Some(fields) = schema.block_fields() {
        out.insert("block".into(), describe_map(fields));
    }
    Value::Object(out)
}

pub fn describe_map(schema: &SchemaMap) -> Value {
    Value::Object(schema.iter().map(|(k, s)| ((*k).to_string(), describe(s))).collect())
}

/// Names of every resource and data source.
pub fn catalog(registry: &ResourceRegistry) -> Value {
    json!({
        "resources": registry.resource_names(),
        "data_sources": registry.data_source_names(),
    })
}

/// Schema of one resource or data source; `data.` selects a data source.
pub fn describe_type(registry: &ResourceRegistry, name: &str) -> hwcloud_provider::ProviderResult<Value> {
    match name.strip_prefix("data.") {
        Some(ds) => {
            let data_source = registry.data_source(ds)?;
            Ok(json!({ "data_source": ds, "schema": describe_map(&data_source.schema()) }))
        }
        None => {
            let resource = registry.resource(name)?;
            let timeouts = resource.timeouts();
            Ok(json!({
                "resource": name,
                "schema": describe_map(&resource.schema()),
                "non_updatable": resource.non_updatable_params(),
                "timeouts": {
                    "create": timeouts.create.as_secs(),
                    "read": timeouts.read.as_secs(),
                    "update": timeouts.update.as_secs(),
                    "delete": timeouts.delete.as_secs(),
                },
            }))
        }
    }
}
