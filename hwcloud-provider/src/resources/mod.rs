//! Managed `huaweicloud_*` resources

mod apig_throttling_policy;
mod asm_mesh;
mod cbr_vault;
mod ces_alarm_template;
mod dds_instance;
mod dns_recordset;
pub(crate) mod dns_zone;
mod nat_gateway;
mod vpc;
mod vpc_subnet;

pub use apig_throttling_policy::ApigThrottlingPolicy;
pub use asm_mesh::AsmMesh;
pub use cbr_vault::CbrVault;
pub use ces_alarm_template::CesAlarmTemplate;
pub use dds_instance::DdsInstance;
pub use dns_recordset::DnsRecordset;
pub use dns_zone::DnsZone;
pub use nat_gateway::NatGateway;
pub use vpc::Vpc;
pub use vpc_subnet::VpcSubnet;
