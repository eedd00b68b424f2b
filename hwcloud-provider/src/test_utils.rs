//! Test helpers
//!
//! Provide an offline [`Config`] and [`ResourceData`] built from JSON configuration.

use serde_json::{Map, Value};

use crate::config::{Config, ProviderSettings};
use crate::resource_data::{ResourceData, Timeouts};
use crate::schema::{SchemaMap, prepare_config};

pub const TEST_REGION: &str = "cn-north-4";
pub const TEST_PROJECT: &str = "p-test";

/// Token-authenticated config with a known project, so no IAM call is made.
pub fn test_config() -> Config {
    Config::builder()
        .settings(ProviderSettings {
            region: Some(TEST_REGION.to_string()),
            auth_token: Some("token".to_string()),
            project_id: Some(TEST_PROJECT.to_string()),
            ..ProviderSettings::default()
        })
        .env(ProviderSettings::default())
        .build()
        .unwrap_or_else(|e| panic!("test config: {e}"))
}

/// Configuration run through the schema, as the lifecycle service would pass it.
pub fn prepared(schema: &SchemaMap, raw: &Value) -> Map<String, Value> {
    let empty = Map::new();
    prepare_config(schema, raw.as_object().unwrap_or(&empty)).unwrap_or_else(|e| panic!("invalid config: {e:?}"))
}

/// Data for a resource about to be created.
pub fn new_data(schema: SchemaMap, raw: &Value) -> ResourceData {
    let config = prepared(&schema, raw);
    ResourceData::new(schema, config, Timeouts::default())
}

/// Data for an existing resource moving from `prior` to `planned`.
pub fn changed_data(schema: SchemaMap, id: &str, prior: &Value, planned: &Value) -> ResourceData {
    let prior = prepared(&schema, prior);
    let planned = prepared(&schema, planned);
    ResourceData::existing(schema, id, prior, planned, Timeouts::default())
}
