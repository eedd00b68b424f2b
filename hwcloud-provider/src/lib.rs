//! HuaweiCloud Provider Core Library
//!
//! Turns declarative resource configuration into calls against HuaweiCloud service
//! APIs, including:
//! - Provider configuration (credentials, region, project resolution)
//! - Schemas and `ResourceData` for every `huaweicloud_*` resource and data source
//! - CRUD handlers with state-change waiters
//! - The lifecycle service (plan, apply, refresh, destroy, import)
//!
//! HTTP, signing and pagination live in `hwcloud-sdk`; this crate only decides what
//! to send and how to read the answers back into state.

pub mod common;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod filters;
pub mod registry;
pub mod resource_data;
pub mod resources;
pub mod schema;
pub mod services;
pub mod traits;
pub mod types;
pub mod wait;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use config::{Config, ConfigBuilder, ProviderSettings};
pub use error::{ProviderError, ProviderResult};
pub use registry::ResourceRegistry;
pub use services::{LifecycleService, ServiceContext};
