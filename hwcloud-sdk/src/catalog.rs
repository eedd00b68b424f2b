//! Service catalog and endpoint construction
//!
//! Endpoints follow `https://{name}.{region}.{cloud}/`, or `https://{name}.{cloud}/`
//! for global services. The resource base appends the API version, the project ID
//! (unless the service is project-less) and an optional fixed path segment.

use crate::error::{Result, SdkError};

/// Default cloud domain.
pub const DEFAULT_CLOUD: &str = "myhuaweicloud.com";

/// Whether a service is addressed per region or once per cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Region,
    Global,
}

/// Static description of one service endpoint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceCatalog {
    /// Host label, e.g. `vpc` in `vpc.cn-north-4.myhuaweicloud.com`.
    pub name: &'static str,
    /// API version path segment.
    pub version: &'static str,
    pub scope: Scope,
    /// The resource base does not include `{project_id}`.
    pub without_project_id: bool,
    /// Extra path segment appended after the project ID.
    pub resource_base: Option<&'static str>,
    /// Requests are authorized at domain (account) level.
    pub admin: bool,
}

impl ServiceCatalog {
    const fn regional(name: &'static str, version: &'static str) -> Self {
        Self {
            name,
            version,
            scope: Scope::Region,
            without_project_id: false,
            resource_base: None,
            admin: false,
        }
    }

    const fn without_project(mut self) -> Self {
        self.without_project_id = true;
        self
    }

    const fn global(mut self) -> Self {
        self.scope = Scope::Global;
        self
    }

    const fn admin(mut self) -> Self {
        self.admin = true;
        self
    }

    const fn with_base(mut self, base: &'static str) -> Self {
        self.resource_base = Some(base);
        self
    }

    /// `https://{name}.{region}.{cloud}/`, or `https://{name}.{cloud}/` for global scope.
    pub fn endpoint(&self, region: &str, cloud: &str) -> String {
        match self.scope {
            Scope::Global => format!("https://{}.{cloud}/", self.name),
            Scope::Region => format!("https://{}.{region}.{cloud}/", self.name),
        }
    }

    /// Endpoint + version + project ID + resource base, each followed by `/`.
    pub fn resource_base_url(&self, endpoint: &str, project_id: &str) -> String {
        let mut base = ensure_trailing_slash(endpoint);
        base.push_str(self.version);
        base.push('/');
        if !self.without_project_id {
            base.push_str(project_id);
            base.push('/');
        }
        if let Some(extra) = self.resource_base {
            base.push_str(extra);
            base.push('/');
        }
        base
    }
}

/// Append `/` when missing.
pub fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Every service type the provider knows how to address.
const ALL_SERVICES: &[(&str, ServiceCatalog)] = &[
    ("iam", ServiceCatalog::regional("iam", "v3.0").without_project().global().admin()),
    ("identity", ServiceCatalog::regional("iam", "v3").without_project().global().admin()),
    ("asm", ServiceCatalog::regional("asm", "v1")),
    ("apig", ServiceCatalog::regional("apig", "v2").with_base("apigw")),
    ("cbr", ServiceCatalog::regional("cbr", "v3")),
    ("ces", ServiceCatalog::regional("ces", "V1.0")),
    ("cesv2", ServiceCatalog::regional("ces", "v2")),
    ("dds", ServiceCatalog::regional("dds", "v3")),
    ("dns", ServiceCatalog::regional("dns", "v2").without_project().global()),
    ("dns_region", ServiceCatalog::regional("dns", "v2").without_project()),
    ("nat", ServiceCatalog::regional("nat", "v2")),
    ("vpc", ServiceCatalog::regional("vpc", "v1")),
    ("networkv2", ServiceCatalog::regional("vpc", "v2.0").without_project()),
    ("waf", ServiceCatalog::regional("waf", "v1").with_base("waf")),
];

/// Look up a service type.
pub fn lookup(service: &str) -> Result<&'static ServiceCatalog> {
    ALL_SERVICES
        .iter()
        .find(|(name, _)| *name == service)
        .map(|(_, catalog)| catalog)
        .ok_or_else(|| SdkError::UnknownService {
            service: service.to_string(),
        })
}

/// Names of all catalog entries.
pub fn service_names() -> impl Iterator<Item = &'static str> {
    ALL_SERVICES.iter().map(|(name, _)| *name)
}
