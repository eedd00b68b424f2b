//! Terraform-style JSON configuration
//!
//! ```json
//! {
//!   "provider": { "huaweicloud": { "region": "cn-north-4" } },
//!   "resource": { "huaweicloud_vpc": { "main": { "name": "demo", "cidr": "192.168.0.0/16" } } },
//!   "data": { "huaweicloud_vpc_subnets": { "all": { "vpc_id": "${huaweicloud_vpc.main.id}" } } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use hwcloud_provider::ProviderSettings;
use hwcloud_provider::types::ResourceMode;
use serde::Deserialize;
use serde_json::{Map, Value};

const PROVIDER_NAME: &str = "huaweicloud";

/// `type -> name -> body`
type BlockSection = BTreeMap<String, BTreeMap<String, Map<String, Value>>>;

/// Top-level layout of the file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfiguration {
    #[serde(default)]
    provider: BTreeMap<String, Value>,
    #[serde(default)]
    resource: BlockSection,
    #[serde(default)]
    data: BlockSection,
    // Tolerated so that files written for terraform still load.
    #[serde(default)]
    terraform: Option<Value>,
    #[serde(default)]
    variable: Option<Value>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    locals: Option<Value>,
}

/// One `resource` or `data` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub mode: ResourceMode,
    pub type_name: String,
    pub name: String,
    pub body: Map<String, Value>,
}

impl Block {
    /// `type.name`, or `data.type.name` for data sources. References use the same form.
    pub fn address(&self) -> String {
        match self.mode {
            ResourceMode::Managed => format!("{}.{}", self.type_name, self.name),
            ResourceMode::Data => format!("data.{}.{}", self.type_name, self.name),
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub provider: ProviderSettings,
    /// Resources then data sources; see [`crate::references::order_blocks`] for apply order.
    pub blocks: Vec<Block>,
}

impl Configuration {
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfiguration = serde_json::from_str(content).context("malformed configuration")?;
        let ignored = [
            ("terraform", &raw.terraform),
            ("variable", &raw.variable),
            ("output", &raw.output),
            ("locals", &raw.locals),
        ];
        for (key, _) in ignored.iter().filter(|(_, section)| section.is_some()) {
            tracing::debug!("ignoring top-level '{key}' section");
        }

        let mut blocks = collect_blocks(ResourceMode::Managed, raw.resource);
        blocks.extend(collect_blocks(ResourceMode::Data, raw.data));
        Ok(Self {
            provider: parse_provider(&raw.provider)?,
            blocks,
        })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid configuration {}", path.display()))
    }

    pub fn find(&self, address: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.address() == address)
    }
}

fn parse_provider(providers: &BTreeMap<String, Value>) -> Result<ProviderSettings> {
    for name in providers.keys().filter(|k| k.as_str() != PROVIDER_NAME) {
        tracing::warn!("ignoring unsupported provider '{name}'");
    }
    match providers.get(PROVIDER_NAME) {
        Some(block) => Ok(ProviderSettings::from_block(block)?),
        None => Ok(ProviderSettings::default()),
    }
}

fn collect_blocks(mode: ResourceMode, section: BlockSection) -> Vec<Block> {
    section
        .into_iter()
        .flat_map(|(type_name, instances)| {
            instances.into_iter().map(move |(name, body)| Block {
                mode,
                type_name: type_name.clone(),
                name,
                body,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "provider": {"huaweicloud": {"region": "cn-north-4", "max_retries": 3}},
        "resource": {
            "huaweicloud_vpc": {"main": {"name": "demo", "cidr": "192.168.0.0/16"}},
            "huaweicloud_vpc_subnet": {"web": {"name": "web", "vpc_id": "${huaweicloud_vpc.main.id}"}}
        },
        "data": {"huaweicloud_dns_zones": {"all": {}}}
    }"#;

    #[test]
    fn parses_provider_and_blocks() {
        let config = Configuration::parse(SAMPLE).unwrap();
        assert_eq!(config.provider.region.as_deref(), Some("cn-north-4"));
        assert_eq!(config.provider.max_retries, Some(3));

        let addresses: Vec<String> = config.blocks.iter().map(Block::address).collect();
        assert_eq!(
            addresses,
            vec![
                "huaweicloud_vpc.main",
                "huaweicloud_vpc_subnet.web",
                "data.huaweicloud_dns_zones.all",
            ]
        );
        let subnet = config.find("huaweicloud_vpc_subnet.web").unwrap();
        assert_eq!(subnet.body["vpc_id"], "${huaweicloud_vpc.main.id}");
    }

    #[test]
    fn missing_provider_block_is_allowed() {
        let config = Configuration::parse(r#"{"resource": {}}"#).unwrap();
        assert!(config.provider.region.is_none());
        assert!(config.blocks.is_empty());
    }

    #[test]
    fn rejects_malformed_sections() {
        assert!(Configuration::parse("[]").is_err());
        assert!(Configuration::parse(r#"{"resources": {}}"#).is_err());
        assert!(Configuration::parse(r#"{"resource": {"huaweicloud_vpc": {"main": 1}}}"#).is_err());
        assert!(Configuration::parse(r#"{"data": []}"#).is_err());
    }

    #[test]
    fn terraform_sections_are_tolerated() {
        let config = Configuration::parse(
            r#"{"terraform": {"required_version": ">= 1.0"}, "locals": {"a": 1}, "data": {"huaweicloud_dns_zones": {"z": {}}}}"#,
        )
        .unwrap();
        assert_eq!(config.blocks.len(), 1);
        assert_eq!(config.blocks[0].mode, ResourceMode::Data);
    }
}
