//! Handler traits implemented by resources and data sources

mod data_source;
mod resource;

pub use data_source::DataSource;
pub use resource::Resource;
