//! Service layer over the registered handlers

mod lifecycle_service;

pub use lifecycle_service::LifecycleService;

use std::sync::Arc;

use crate::config::Config;
use crate::registry::ResourceRegistry;

/// Service context - holds all dependencies
///
/// The CLI (or any other front end) builds the [`Config`] and the registry once and
/// shares them with every service.
pub struct ServiceContext {
    /// Validated provider configuration
    pub config: Arc<Config>,
    /// Resource and data source handlers
    pub registry: Arc<ResourceRegistry>,
}

impl ServiceContext {
    #[must_use]
    pub fn new(config: Arc<Config>, registry: Arc<ResourceRegistry>) -> Self {
        Self { config, registry }
    }
}
