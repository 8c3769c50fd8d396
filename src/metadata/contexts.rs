use super::database::RuntimeDatabase;
use crate::config::{ConfigurationProperties, PropertyValue, RuleConfiguration};
use crate::core::RuleKind;
use crate::instance::InstanceContext;
use crate::persist::MetadataPersistFacade;
use crate::rule::RuleMetadata;
use chrono::{DateTime, Utc};
use im::OrdMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// One immutable, atomically published runtime topology.
///
/// Cloning is cheap: databases are shared structurally and by `Arc`.
#[derive(Clone)]
pub struct MetadataContexts {
    databases: OrdMap<String, Arc<RuntimeDatabase>>,
    global_rule_metadata: RuleMetadata,
    global_rule_configurations: Vec<Box<dyn RuleConfiguration>>,
    props: ConfigurationProperties,
    persist: Arc<dyn MetadataPersistFacade>,
    instance: Arc<InstanceContext>,
    assembled_at: DateTime<Utc>,
}

impl MetadataContexts {
    pub fn new(
        databases: OrdMap<String, Arc<RuntimeDatabase>>,
        global_rule_metadata: RuleMetadata,
        global_rule_configurations: Vec<Box<dyn RuleConfiguration>>,
        props: ConfigurationProperties,
        persist: Arc<dyn MetadataPersistFacade>,
        instance: Arc<InstanceContext>,
    ) -> Self {
        Self {
            databases,
            global_rule_metadata,
            global_rule_configurations,
            props,
            persist,
            instance,
            assembled_at: Utc::now(),
        }
    }

    pub fn databases(&self) -> &OrdMap<String, Arc<RuntimeDatabase>> {
        &self.databases
    }

    pub fn database(&self, name: &str) -> Option<&Arc<RuntimeDatabase>> {
        self.databases.get(name)
    }

    pub fn contains_database(&self, name: &str) -> bool {
        self.databases.contains_key(name)
    }

    pub fn database_names(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }

    pub fn global_rule_metadata(&self) -> &RuleMetadata {
        &self.global_rule_metadata
    }

    pub fn global_rule_configurations(&self) -> &[Box<dyn RuleConfiguration>] {
        &self.global_rule_configurations
    }

    pub fn props(&self) -> &ConfigurationProperties {
        &self.props
    }

    pub fn persist_facade(&self) -> &Arc<dyn MetadataPersistFacade> {
        &self.persist
    }

    pub fn instance_context(&self) -> &Arc<InstanceContext> {
        &self.instance
    }

    pub fn assembled_at(&self) -> DateTime<Utc> {
        self.assembled_at
    }

    /// New snapshot with `database` added or replaced; everything else shared.
    pub fn with_database(&self, database: Arc<RuntimeDatabase>) -> Self {
        let mut next = self.clone();
        next.databases = self.databases.update(database.name().to_string(), database);
        next.assembled_at = Utc::now();
        next
    }

    pub fn without_database(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.databases = self.databases.without(name);
        next.assembled_at = Utc::now();
        next
    }

    /// Behavioural summary; equal for equivalent snapshots.
    pub fn summary(&self) -> TopologySummary {
        TopologySummary {
            databases: self
                .databases
                .iter()
                .map(|(name, database)| {
                    (
                        name.clone(),
                        DatabaseSummary {
                            data_sources: database
                                .resource()
                                .names()
                                .into_iter()
                                .map(str::to_string)
                                .collect(),
                            rule_kinds: database.rule_metadata().kinds(),
                        },
                    )
                })
                .collect(),
            global_rule_kinds: self.global_rule_metadata.kinds(),
            props: self.props.to_map(),
        }
    }
}

impl fmt::Debug for MetadataContexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataContexts")
            .field("databases", &self.database_names())
            .field("global_rules", &self.global_rule_metadata.kinds())
            .field("instance", &self.instance.instance_id())
            .field("assembled_at", &self.assembled_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseSummary {
    pub data_sources: Vec<String>,
    pub rule_kinds: Vec<RuleKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologySummary {
    pub databases: BTreeMap<String, DatabaseSummary>,
    pub global_rule_kinds: Vec<RuleKind>,
    pub props: BTreeMap<String, PropertyValue>,
}

/// Publication point for the current snapshot.
///
/// Readers take an `Arc` and keep using it for as long as they like; a
/// publish never invalidates snapshots already handed out.
pub struct MetadataContextsHolder {
    current: RwLock<Arc<MetadataContexts>>,
}

impl MetadataContextsHolder {
    pub fn new(initial: MetadataContexts) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn load(&self) -> Arc<MetadataContexts> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the current snapshot and returns the previous one.
    pub fn publish(&self, next: MetadataContexts) -> Arc<MetadataContexts> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(next))
    }
}

impl fmt::Debug for MetadataContextsHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MetadataContextsHolder").field(&self.load()).finish()
    }
}
