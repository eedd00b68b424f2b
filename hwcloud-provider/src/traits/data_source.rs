//! Data source trait

use async_trait::async_trait;

use crate::config::Config;
use crate::error::ProviderResult;
use crate::resource_data::ResourceData;
use crate::schema::SchemaMap;

/// Read-only query registered as `data.huaweicloud_*`.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> SchemaMap;

    /// Run the query and set the computed attributes and an ID.
    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()>;
}
