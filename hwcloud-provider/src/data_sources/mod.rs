//! Read-only `data.huaweicloud_*` queries

mod asm_meshes;
mod cbr_vaults;
mod dns_zones;
mod vpc_subnets;

pub use asm_meshes::AsmMeshes;
pub use cbr_vaults::CbrVaults;
pub use dns_zones::DnsZones;
pub use vpc_subnets::VpcSubnets;

/// Data source IDs only need to be unique per read.
pub(crate) fn query_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
