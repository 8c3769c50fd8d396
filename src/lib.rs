// ============================================================================
// shardmeta: metadata assembly and rule governance for a sharding proxy fleet
// ============================================================================

pub mod config;
pub mod core;
pub mod distsql;
pub mod instance;
pub mod metadata;
pub mod mode;
pub mod persist;
pub mod rule;
pub mod rules;

// Re-export main types for convenience
pub use config::{ConfigurationProperties, DataSourceConfiguration, DatabaseConfiguration, RuleConfiguration};
pub use core::{ErrorCategory, MetaError, Result, RuleKind, RuleScope, StatementKind};
pub use instance::InstanceContext;
pub use metadata::{MetadataContexts, MetadataContextsFactory, RuntimeDatabase};
pub use mode::{BootstrapOptions, ContextManager};
pub use persist::{MetadataPersistFacade, MetadataPersistService, MetadataPersistWriter};
pub use rule::{RuleBuilderRegistry, RuleMetadata, RuntimeRule};
