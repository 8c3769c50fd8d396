//! Metadata persistence.
//!
//! [`MetadataPersistFacade`] is the read side consumed by assembly and
//! governance. [`MetadataPersistWriter`] is the write side. Both are
//! implemented by [`MetadataPersistService`] on top of a key-value
//! [`PersistRepository`].

pub mod file_repository;
pub mod node;
pub mod repository;
pub mod service;
pub mod swapper;

pub use file_repository::FilePersistRepository;
pub use repository::{MemoryPersistRepository, PersistRepository};
pub use service::MetadataPersistService;
pub use swapper::{JsonRuleConfigurationSwapper, RuleConfigurationSwapper, RuleConfigurationSwapperRegistry};

use crate::config::{DataSourceConfiguration, DatabaseConfiguration, RuleConfiguration};
use crate::core::Result;
use crate::metadata::resource::DataSourceHandle;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Read side of the shared configuration store.
///
/// Implementations must not cache across calls: other nodes may change the
/// store between two reads.
#[async_trait]
pub trait MetadataPersistFacade: Send + Sync {
    /// Authoritative registry of database names.
    async fn load_all_database_names(&self) -> Result<BTreeSet<String>>;

    async fn load_database_rule_configurations(
        &self,
        database_name: &str,
    ) -> Result<Vec<Box<dyn RuleConfiguration>>>;

    async fn load_global_rule_configurations(&self) -> Result<Vec<Box<dyn RuleConfiguration>>>;

    /// Raw property values; typing and defaulting happen in
    /// [`ConfigurationProperties`](crate::config::ConfigurationProperties).
    async fn load_properties(&self) -> Result<BTreeMap<String, String>>;

    /// Combines locally known data source configurations with the persisted ones.
    async fn resolve_effective_data_sources(
        &self,
        database_name: &str,
        candidates: &BTreeMap<String, DataSourceConfiguration>,
    ) -> Result<BTreeMap<String, Arc<DataSourceHandle>>>;
}

/// Write side of the shared configuration store.
#[async_trait]
pub trait MetadataPersistWriter: Send + Sync {
    /// Registers `database_name` and persists its data sources and rules.
    async fn persist_database(&self, database_name: &str, config: &DatabaseConfiguration) -> Result<()>;

    async fn persist_data_sources(
        &self,
        database_name: &str,
        data_sources: &BTreeMap<String, DataSourceConfiguration>,
    ) -> Result<()>;

    async fn persist_database_rule_configurations(
        &self,
        database_name: &str,
        configs: &[Box<dyn RuleConfiguration>],
    ) -> Result<()>;

    async fn persist_global_rule_configurations(&self, configs: &[Box<dyn RuleConfiguration>]) -> Result<()>;

    async fn persist_properties(&self, props: &BTreeMap<String, String>) -> Result<()>;

    async fn drop_database(&self, database_name: &str) -> Result<()>;
}
