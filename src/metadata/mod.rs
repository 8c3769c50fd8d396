pub mod contexts;
pub mod database;
pub mod factory;
pub mod resource;

pub use contexts::{DatabaseSummary, MetadataContexts, MetadataContextsHolder, TopologySummary};
pub use database::RuntimeDatabase;
pub use factory::MetadataContextsFactory;
pub use resource::{DataSourceHandle, DataSourceMetaData, ResourceMetaData};
