use super::contexts::MetadataContexts;
use super::database::RuntimeDatabase;
use super::resource::ResourceMetaData;
use crate::config::{ConfigurationProperties, DataSourceConfiguration, DatabaseConfiguration, RuleConfiguration};
use crate::core::{MetaError, Result, RuleKind};
use crate::instance::{InstanceContext, InstanceType};
use crate::persist::MetadataPersistFacade;
use crate::rule::{RuleBuilderRegistry, RuleMetadata};
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, Level, event, info_span};

/// Where the set of databases to assemble comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatabaseDiscovery {
    /// Embedded nodes trust the caller-supplied configuration map.
    Supplied,
    /// Standalone proxies trust the persisted registry.
    Registry,
}

impl DatabaseDiscovery {
    fn for_instance(instance: &InstanceContext) -> Self {
        match instance.instance_type() {
            InstanceType::Embedded => DatabaseDiscovery::Supplied,
            InstanceType::Proxy => DatabaseDiscovery::Registry,
        }
    }

    async fn database_names(
        self,
        persist: &dyn MetadataPersistFacade,
        supplied: &BTreeMap<String, DatabaseConfiguration>,
    ) -> Result<BTreeSet<String>> {
        match self {
            DatabaseDiscovery::Supplied => Ok(supplied.keys().cloned().collect()),
            DatabaseDiscovery::Registry => persist.load_all_database_names().await,
        }
    }
}

/// Per-database state loaded in step 2, before any rule is built.
struct LoadedDatabase {
    name: String,
    resource: ResourceMetaData,
    rule_configurations: Vec<Box<dyn RuleConfiguration>>,
}

/// Assembles [`MetadataContexts`] snapshots from persisted state.
pub struct MetadataContextsFactory {
    builders: Arc<RuleBuilderRegistry>,
    singleton_kinds: Vec<RuleKind>,
}

impl Default for MetadataContextsFactory {
    fn default() -> Self {
        Self::new(Arc::new(RuleBuilderRegistry::with_builtin_builders()))
    }
}

impl MetadataContextsFactory {
    pub fn new(builders: Arc<RuleBuilderRegistry>) -> Self {
        Self {
            builders,
            singleton_kinds: crate::rules::builtin_singleton_kinds(),
        }
    }

    /// Requires exactly one global rule of `kind` in every snapshot.
    pub fn with_singleton_kind(mut self, kind: RuleKind) -> Self {
        if !self.singleton_kinds.contains(&kind) {
            self.singleton_kinds.push(kind);
        }
        self
    }

    pub fn builders(&self) -> &Arc<RuleBuilderRegistry> {
        &self.builders
    }

    pub fn singleton_kinds(&self) -> &[RuleKind] {
        &self.singleton_kinds
    }

    /// Builds a new snapshot. Fails without side effects on any invariant
    /// violation, persistence failure or unresolvable data source.
    pub async fn create(
        &self,
        persist: Arc<dyn MetadataPersistFacade>,
        database_configurations: &BTreeMap<String, DatabaseConfiguration>,
        instance: Arc<InstanceContext>,
    ) -> Result<MetadataContexts> {
        let discovery = DatabaseDiscovery::for_instance(&instance);
        let span = info_span!(
            "metadata.assemble",
            instance = %instance.instance_id(),
            discovery = ?discovery
        );
        let result = self
            .assemble(discovery, persist, database_configurations, instance)
            .instrument(span.clone())
            .await;
        if let Err(err) = &result {
            span.in_scope(|| event!(Level::ERROR, error = %err, "metadata assembly aborted"));
        }
        result
    }

    /// [`create`](Self::create) bounded by `deadline`. An expired deadline
    /// is an assembly error and leaves nothing behind.
    pub async fn create_with_deadline(
        &self,
        persist: Arc<dyn MetadataPersistFacade>,
        database_configurations: &BTreeMap<String, DatabaseConfiguration>,
        instance: Arc<InstanceContext>,
        deadline: Duration,
    ) -> Result<MetadataContexts> {
        tokio::time::timeout(deadline, self.create(persist, database_configurations, instance)).await?
    }

    async fn assemble(
        &self,
        discovery: DatabaseDiscovery,
        persist: Arc<dyn MetadataPersistFacade>,
        database_configurations: &BTreeMap<String, DatabaseConfiguration>,
        instance: Arc<InstanceContext>,
    ) -> Result<MetadataContexts> {
        // 1. database names
        let names = discovery
            .database_names(persist.as_ref(), database_configurations)
            .await?;
        event!(Level::DEBUG, databases = names.len(), "database names discovered");

        // 2. effective data sources and rule configurations, per database
        let loaded = try_join_all(names.iter().map(|name| {
            let candidates = database_configurations
                .get(name)
                .map(|c| c.data_sources.clone())
                .unwrap_or_default();
            Self::load_database(persist.as_ref(), name, candidates)
        }))
        .await?;

        // 3. global rule configurations
        let global_rule_configurations = persist.load_global_rule_configurations().await?;

        // 4. properties
        let props = ConfigurationProperties::new(&persist.load_properties().await?);

        // 5. runtime databases, then global rules
        let mut databases = BTreeMap::new();
        for database in loaded {
            let built = self.build_database(
                &database.name,
                database.resource,
                database.rule_configurations,
                &instance,
                &props,
            )?;
            databases.insert(database.name, built);
        }
        let global_rule_metadata = self.builders.build_global_rules(
            &global_rule_configurations,
            &databases,
            &instance,
            &props,
        )?;

        // 6. singleton invariants
        self.check_singletons(&global_rule_metadata)?;

        event!(
            Level::INFO,
            databases = databases.len(),
            global_rules = global_rule_metadata.len(),
            "metadata contexts assembled"
        );
        Ok(MetadataContexts::new(
            databases.into_iter().collect(),
            global_rule_metadata,
            global_rule_configurations,
            props,
            persist,
            instance,
        ))
    }

    /// Builds one runtime database from already resolved inputs.
    pub fn build_database(
        &self,
        database_name: &str,
        resource: ResourceMetaData,
        rule_configurations: Vec<Box<dyn RuleConfiguration>>,
        instance: &InstanceContext,
        props: &ConfigurationProperties,
    ) -> Result<Arc<RuntimeDatabase>> {
        let rule_metadata = self.builders.build_database_rules(
            database_name,
            &rule_configurations,
            &resource,
            instance,
            props,
        )?;
        event!(
            Level::DEBUG,
            database = %database_name,
            data_sources = resource.data_sources().len(),
            rules = rule_metadata.len(),
            "runtime database built"
        );
        Ok(Arc::new(RuntimeDatabase::new(
            database_name,
            resource,
            rule_configurations,
            rule_metadata,
        )))
    }

    /// Rebuilds one database against the current persisted state, reusing the
    /// global parts of `current`.
    pub async fn create_database(
        &self,
        current: &MetadataContexts,
        database_name: &str,
        candidates: BTreeMap<String, DataSourceConfiguration>,
    ) -> Result<Arc<RuntimeDatabase>> {
        let span = info_span!("metadata.assemble_database", database = %database_name);
        async {
            let loaded = Self::load_database(current.persist_facade().as_ref(), database_name, candidates).await?;
            self.build_database(
                &loaded.name,
                loaded.resource,
                loaded.rule_configurations,
                current.instance_context(),
                current.props(),
            )
        }
        .instrument(span)
        .await
    }

    async fn load_database(
        persist: &dyn MetadataPersistFacade,
        name: &str,
        candidates: BTreeMap<String, DataSourceConfiguration>,
    ) -> Result<LoadedDatabase> {
        let data_sources = persist.resolve_effective_data_sources(name, &candidates).await?;
        let rule_configurations = persist.load_database_rule_configurations(name).await?;
        Ok(LoadedDatabase {
            name: name.to_string(),
            resource: ResourceMetaData::new(data_sources),
            rule_configurations,
        })
    }

    fn check_singletons(&self, global_rule_metadata: &RuleMetadata) -> Result<()> {
        for kind in &self.singleton_kinds {
            let count = global_rule_metadata.count_of(*kind);
            if count != 1 {
                return Err(MetaError::SingletonRuleViolation {
                    rule_kind: *kind,
                    count,
                });
            }
        }
        Ok(())
    }
}
