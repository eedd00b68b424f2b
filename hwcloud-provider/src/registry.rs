//! Provider registration: resource and data source names to handlers

use std::collections::HashMap;
use std::sync::Arc;

use crate::data_sources;
use crate::error::{ProviderError, ProviderResult};
use crate::resources;
use crate::traits::{DataSource, Resource};

/// Maps `huaweicloud_*` names to handlers. Read-only once built.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<&'static str, Arc<dyn Resource>>,
    data_sources: HashMap<&'static str, Arc<dyn DataSource>>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every handler this crate provides.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_resource(Arc::new(resources::AsmMesh));
        registry.register_resource(Arc::new(resources::ApigThrottlingPolicy));
        registry.register_resource(Arc::new(resources::CbrVault));
        registry.register_resource(Arc::new(resources::CesAlarmTemplate));
        registry.register_resource(Arc::new(resources::DdsInstance));
        registry.register_resource(Arc::new(resources::DnsRecordset));
        registry.register_resource(Arc::new(resources::DnsZone));
        registry.register_resource(Arc::new(resources::NatGateway));
        registry.register_resource(Arc::new(resources::Vpc));
        registry.register_resource(Arc::new(resources::VpcSubnet));

        registry.register_data_source(Arc::new(data_sources::AsmMeshes));
        registry.register_data_source(Arc::new(data_sources::CbrVaults));
        registry.register_data_source(Arc::new(data_sources::DnsZones));
        registry.register_data_source(Arc::new(data_sources::VpcSubnets));
        registry
    }

    /// Register a resource, replacing any handler with the same name.
    pub fn register_resource(&mut self, resource: Arc<dyn Resource>) {
        self.resources.insert(resource.type_name(), resource);
    }

    pub fn register_data_source(&mut self, data_source: Arc<dyn DataSource>) {
        self.data_sources.insert(data_source.type_name(), data_source);
    }

    pub fn resource(&self, type_name: &str) -> ProviderResult<Arc<dyn Resource>> {
        self.resources
            .get(type_name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownResourceType(type_name.to_string()))
    }

    pub fn data_source(&self, type_name: &str) -> ProviderResult<Arc<dyn DataSource>> {
        self.data_sources
            .get(type_name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownResourceType(format!("data.{type_name}")))
    }

    /// Sorted resource names.
    pub fn resource_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.resources.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Sorted data source names.
    pub fn data_source_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.data_sources.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_handler() {
        let registry = ResourceRegistry::with_defaults();
        assert_eq!(
            registry.resource_names(),
            vec![
                "huaweicloud_apig_throttling_policy",
                "huaweicloud_asm_mesh",
                "huaweicloud_cbr_vault",
                "huaweicloud_ces_alarm_template",
                "huaweicloud_dds_instance",
                "huaweicloud_dns_recordset",
                "huaweicloud_dns_zone",
                "huaweicloud_nat_gateway",
                "huaweicloud_vpc",
                "huaweicloud_vpc_subnet",
            ]
        );
        assert_eq!(
            registry.data_source_names(),
            vec![
                "huaweicloud_asm_meshes",
                "huaweicloud_cbr_vaults",
                "huaweicloud_dns_zones",
                "huaweicloud_vpc_subnets",
            ]
        );
    }

    #[test]
    fn unknown_names_are_errors() {
        let registry = ResourceRegistry::with_defaults();
        assert!(matches!(
            registry.resource("huaweicloud_nope"),
            Err(ProviderError::UnknownResourceType(n)) if n == "huaweicloud_nope"
        ));
        assert!(registry.data_source("huaweicloud_vpc").is_err());
    }

    #[test]
    fn every_resource_has_region_and_valid_non_updatable_params() {
        let registry = ResourceRegistry::with_defaults();
        for name in registry.resource_names() {
            let resource = registry.resource(name).unwrap();
            let schema = resource.schema();
            assert!(schema.contains_key("region"), "{name} has no region");
            for param in resource.non_updatable_params() {
                assert!(schema.contains_key(param), "{name}: unknown non-updatable {param}");
            }
            if !resource.non_updatable_params().is_empty() {
                assert!(schema.contains_key("enable_force_new"), "{name}: no enable_force_new");
            }
        }
    }
}
