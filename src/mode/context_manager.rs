use crate::config::{DataSourceConfiguration, DatabaseConfiguration, RuleConfiguration, find_rule_configuration};
use crate::core::{MetaError, Result};
use crate::distsql::{RuleDefinitionOutcome, RuleDefinitionStatement, UpdaterRegistry};
use crate::instance::InstanceContext;
use crate::metadata::{MetadataContexts, MetadataContextsFactory, MetadataContextsHolder, RuntimeDatabase};
use crate::persist::{MetadataPersistFacade, MetadataPersistWriter};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{Level, event};

/// Settings for [`ContextManager::bootstrap`].
#[derive(Default)]
pub struct BootstrapOptions {
    /// Persist the supplied database configurations before assembling.
    pub overwrite: bool,
    /// Global rules to persist when `overwrite` is set.
    pub global_rule_configurations: Option<Vec<Box<dyn RuleConfiguration>>>,
    /// Raw properties to persist when `overwrite` is set.
    pub props: Option<BTreeMap<String, String>>,
    pub deadline: Option<Duration>,
    pub factory: Option<MetadataContextsFactory>,
    pub updaters: Option<UpdaterRegistry>,
}

/// A validated and applied change waiting to be persisted and published.
/// Holds the database and publish locks until dropped.
struct PreparedChange {
    _database_guard: OwnedMutexGuard<()>,
    _publish_guard: OwnedMutexGuard<()>,
    database_name: String,
    rule_configurations: Vec<Box<dyn RuleConfiguration>>,
    next: MetadataContexts,
    outcome: RuleDefinitionOutcome,
}

/// Owns the published snapshot and serializes everything that replaces it.
///
/// Governance runs under a per-database lock; every publication, including
/// full reloads, runs under one publish lock.
pub struct ContextManager {
    holder: MetadataContextsHolder,
    factory: MetadataContextsFactory,
    facade: Arc<dyn MetadataPersistFacade>,
    writer: Arc<dyn MetadataPersistWriter>,
    updaters: UpdaterRegistry,
    instance: Arc<InstanceContext>,
    local_configurations: BTreeMap<String, DatabaseConfiguration>,
    database_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    publish_lock: Arc<Mutex<()>>,
}

impl ContextManager {
    /// Assembles and publishes the first snapshot.
    pub async fn bootstrap<P>(
        persist: Arc<P>,
        instance: InstanceContext,
        local_configurations: BTreeMap<String, DatabaseConfiguration>,
        options: BootstrapOptions,
    ) -> Result<Self>
    where
        P: MetadataPersistFacade + MetadataPersistWriter + 'static,
    {
        let facade: Arc<dyn MetadataPersistFacade> = persist.clone();
        let writer: Arc<dyn MetadataPersistWriter> = persist;
        let instance = Arc::new(instance);
        let factory = options.factory.unwrap_or_default();
        let updaters = options
            .updaters
            .unwrap_or_else(UpdaterRegistry::with_builtin_updaters);

        if options.overwrite {
            for (name, config) in &local_configurations {
                writer.persist_database(name, config).await?;
            }
            if let Some(global) = &options.global_rule_configurations {
                writer.persist_global_rule_configurations(global).await?;
            }
            if let Some(props) = &options.props {
                writer.persist_properties(props).await?;
            }
        }

        let contexts = match options.deadline {
            Some(deadline) => {
                factory
                    .create_with_deadline(facade.clone(), &local_configurations, instance.clone(), deadline)
                    .await?
            }
            None => {
                factory
                    .create(facade.clone(), &local_configurations, instance.clone())
                    .await?
            }
        };

        event!(
            Level::INFO,
            instance = %instance.instance_id(),
            databases = contexts.databases().len(),
            "context manager bootstrapped"
        );
        Ok(Self {
            holder: MetadataContextsHolder::new(contexts),
            factory,
            facade,
            writer,
            updaters,
            instance,
            local_configurations,
            database_locks: Mutex::new(HashMap::new()),
            publish_lock: Arc::new(Mutex::new(())),
        })
    }

    /// The current snapshot. Never blocks on assembly or governance.
    pub fn snapshot(&self) -> Arc<MetadataContexts> {
        self.holder.load()
    }

    pub fn instance_context(&self) -> &Arc<InstanceContext> {
        &self.instance
    }

    pub fn factory(&self) -> &MetadataContextsFactory {
        &self.factory
    }

    pub fn updaters(&self) -> &UpdaterRegistry {
        &self.updaters
    }

    /// Reassembles the whole topology from persisted state and publishes it.
    /// On failure the current snapshot stays published.
    pub async fn reload(&self) -> Result<Arc<MetadataContexts>> {
        let _publish = self.publish_lock.clone().lock_owned().await;
        let contexts = self
            .factory
            .create(self.facade.clone(), &self.local_configurations, self.instance.clone())
            .await?;
        self.holder.publish(contexts);
        let published = self.holder.load();
        self.prune_database_locks(&published).await;
        Ok(published)
    }

    pub async fn reload_with_deadline(&self, deadline: Duration) -> Result<Arc<MetadataContexts>> {
        tokio::time::timeout(deadline, self.reload()).await?
    }

    /// Rebuilds one database from persisted state and publishes the result.
    pub async fn reload_database(&self, database_name: &str) -> Result<Arc<MetadataContexts>> {
        let database_lock = self.database_lock(database_name).await?;
        let _database = database_lock.lock_owned().await;
        let _publish = self.publish_lock.clone().lock_owned().await;

        let current = self.holder.load();
        if !current.contains_database(database_name) {
            return Err(MetaError::DatabaseNotFound(database_name.to_string()));
        }
        let database = self
            .factory
            .create_database(&current, database_name, self.candidates(&current, database_name))
            .await?;
        self.holder.publish(current.with_database(database));
        Ok(self.holder.load())
    }

    /// Runs one rule definition statement against `database_name`.
    ///
    /// The configuration is re-read from the persistence facade, checked,
    /// updated, built, persisted and published. Validation or build failures
    /// leave both the persisted state and the published snapshot unchanged.
    pub async fn execute_rule_definition(
        &self,
        database_name: &str,
        statement: &dyn RuleDefinitionStatement,
    ) -> Result<RuleDefinitionOutcome> {
        let prepared = self.prepare(database_name, statement).await?;
        self.commit(prepared).await
    }

    /// Like [`execute_rule_definition`](Self::execute_rule_definition); the
    /// deadline bounds everything before the change is persisted.
    pub async fn execute_rule_definition_with_deadline(
        &self,
        database_name: &str,
        statement: &dyn RuleDefinitionStatement,
        deadline: Duration,
    ) -> Result<RuleDefinitionOutcome> {
        let prepared = tokio::time::timeout(deadline, self.prepare(database_name, statement)).await??;
        self.commit(prepared).await
    }

    async fn prepare(
        &self,
        database_name: &str,
        statement: &dyn RuleDefinitionStatement,
    ) -> Result<PreparedChange> {
        let database_guard = self.database_lock(database_name).await?.lock_owned().await;
        if !self.holder.load().contains_database(database_name) {
            return Err(MetaError::DatabaseNotFound(database_name.to_string()));
        }

        let mut rule_configurations = self
            .facade
            .load_database_rule_configurations(database_name)
            .await?;

        let publish_guard = self.publish_lock.clone().lock_owned().await;
        let current = self.holder.load();
        let database = current
            .database(database_name)
            .cloned()
            .ok_or_else(|| MetaError::DatabaseNotFound(database_name.to_string()))?;

        let outcome = self.updaters.execute(
            database_name,
            statement,
            &mut rule_configurations,
            database.resource(),
        )?;

        let rebuilt = if outcome.rebuild_required {
            self.factory.build_database(
                database_name,
                database.resource().clone(),
                rule_configurations.clone(),
                current.instance_context(),
                current.props(),
            )?
        } else {
            self.refresh_rule(&current, &database, &rule_configurations, &outcome)?
        };

        Ok(PreparedChange {
            _database_guard: database_guard,
            _publish_guard: publish_guard,
            database_name: database_name.to_string(),
            rule_configurations,
            next: current.with_database(rebuilt),
            outcome,
        })
    }

    async fn commit(&self, prepared: PreparedChange) -> Result<RuleDefinitionOutcome> {
        self.writer
            .persist_database_rule_configurations(&prepared.database_name, &prepared.rule_configurations)
            .await?;
        self.holder.publish(prepared.next);
        event!(
            Level::INFO,
            database = %prepared.database_name,
            statement = %prepared.outcome.statement_kind,
            rebuild_required = prepared.outcome.rebuild_required,
            "rule definition published"
        );
        Ok(prepared.outcome)
    }

    /// Rebuilds only the runtime rule the outcome touched.
    fn refresh_rule(
        &self,
        current: &MetadataContexts,
        database: &RuntimeDatabase,
        rule_configurations: &[Box<dyn RuleConfiguration>],
        outcome: &RuleDefinitionOutcome,
    ) -> Result<Arc<RuntimeDatabase>> {
        let config = find_rule_configuration(rule_configurations, outcome.rule_kind).ok_or_else(|| {
            MetaError::UpdaterContract(format!(
                "`{}` left no `{}` configuration behind",
                outcome.statement_kind, outcome.rule_kind
            ))
        })?;
        let rule_metadata = self.factory.builders().rebuild_database_rule(
            database,
            config,
            current.instance_context(),
            current.props(),
        )?;
        Ok(Arc::new(database.with_refreshed_rule(config.clone_box(), rule_metadata)))
    }

    /// Lock for a database of the published snapshot. Unknown names are
    /// refused before an entry is created for them.
    async fn database_lock(&self, database_name: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.database_locks.lock().await;
        if let Some(lock) = locks.get(database_name) {
            return Ok(lock.clone());
        }
        if !self.holder.load().contains_database(database_name) {
            return Err(MetaError::DatabaseNotFound(database_name.to_string()));
        }
        Ok(locks.entry(database_name.to_string()).or_default().clone())
    }

    /// Drops locks of databases that left the topology and are not held.
    async fn prune_database_locks(&self, published: &MetadataContexts) {
        let mut locks = self.database_locks.lock().await;
        let before = locks.len();
        locks.retain(|name, lock| published.contains_database(name) || Arc::strong_count(lock) > 1);
        if locks.len() < before {
            event!(Level::DEBUG, pruned = before - locks.len(), "database locks pruned");
        }
    }

    fn candidates(&self, current: &MetadataContexts, database_name: &str) -> BTreeMap<String, DataSourceConfiguration> {
        match self.local_configurations.get(database_name) {
            Some(config) => config.data_sources.clone(),
            None => current
                .database(database_name)
                .map(|db| db.resource().configurations())
                .unwrap_or_default(),
        }
    }
}
