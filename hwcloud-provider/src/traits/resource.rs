//! Managed resource trait

use async_trait::async_trait;

use crate::config::Config;
use crate::error::ProviderResult;
use crate::resource_data::{ResourceData, Timeouts};
use crate::schema::SchemaMap;

/// CRUD handlers of one `huaweicloud_*` resource type.
///
/// Every handler receives the provider [`Config`] and the resource's [`ResourceData`].
/// `create` must set the ID. `read` must clear it (through
/// [`check_deleted`](crate::common::check_deleted)) when the remote object is gone.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Registered name, e.g. `huaweicloud_vpc`.
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> SchemaMap;

    /// Default operation timeouts; a `timeouts` block in the configuration overrides them.
    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    /// Arguments that cannot be changed in place.
    ///
    /// Changing one is a plan error unless `enable_force_new = "true"`, which replaces
    /// the resource instead.
    fn non_updatable_params(&self) -> &'static [&'static str] {
        &[]
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()>;

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()>;

    async fn update(&self, _cfg: &Config, _d: &mut ResourceData) -> ProviderResult<()> {
        Ok(())
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()>;

    /// Turn an import ID into the resource ID and any arguments encoded in it.
    ///
    /// The default keeps the ID as given.
    async fn import(&self, _cfg: &Config, _d: &mut ResourceData) -> ProviderResult<()> {
        Ok(())
    }
}
