use super::node::{self, GLOBAL_RULES_NODE, METADATA_NODE, PROPS_NODE};
use super::repository::PersistRepository;
use super::swapper::RuleConfigurationSwapperRegistry;
use super::{MetadataPersistFacade, MetadataPersistWriter};
use crate::config::{DataSourceConfiguration, DatabaseConfiguration, RuleConfiguration};
use crate::core::Result;
use crate::metadata::resource::DataSourceHandle;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{Level, event};

/// Repository-backed metadata persistence.
pub struct MetadataPersistService {
    repository: Arc<dyn PersistRepository>,
    swappers: Arc<RuleConfigurationSwapperRegistry>,
}

impl MetadataPersistService {
    pub fn new(repository: Arc<dyn PersistRepository>) -> Self {
        Self::with_swappers(
            repository,
            Arc::new(RuleConfigurationSwapperRegistry::with_builtin_swappers()),
        )
    }

    pub fn with_swappers(
        repository: Arc<dyn PersistRepository>,
        swappers: Arc<RuleConfigurationSwapperRegistry>,
    ) -> Self {
        Self {
            repository,
            swappers,
        }
    }

    pub fn repository(&self) -> &Arc<dyn PersistRepository> {
        &self.repository
    }

    /// Persisted data source configurations of one database; empty when none.
    pub async fn load_data_sources(
        &self,
        database_name: &str,
    ) -> Result<BTreeMap<String, DataSourceConfiguration>> {
        match self
            .repository
            .get(&node::data_sources_node(database_name)?)
            .await?
        {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn load_rules(&self, key: &str) -> Result<Vec<Box<dyn RuleConfiguration>>> {
        match self.repository.get(key).await? {
            Some(json) => self.swappers.swap_to_configurations(&json),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl MetadataPersistFacade for MetadataPersistService {
    async fn load_all_database_names(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .repository
            .get_child_keys(METADATA_NODE)
            .await?
            .into_iter()
            .collect())
    }

    async fn load_database_rule_configurations(
        &self,
        database_name: &str,
    ) -> Result<Vec<Box<dyn RuleConfiguration>>> {
        self.load_rules(&node::database_rules_node(database_name)?).await
    }

    async fn load_global_rule_configurations(&self) -> Result<Vec<Box<dyn RuleConfiguration>>> {
        self.load_rules(GLOBAL_RULES_NODE).await
    }

    /// Non-string JSON values are read in their JSON text form.
    async fn load_properties(&self) -> Result<BTreeMap<String, String>> {
        let Some(json) = self.repository.get(PROPS_NODE).await? else {
            return Ok(BTreeMap::new());
        };
        let values: BTreeMap<String, serde_json::Value> = serde_json::from_str(&json)?;
        Ok(values
            .into_iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect())
    }

    async fn resolve_effective_data_sources(
        &self,
        database_name: &str,
        candidates: &BTreeMap<String, DataSourceConfiguration>,
    ) -> Result<BTreeMap<String, Arc<DataSourceHandle>>> {
        let persisted = self.load_data_sources(database_name).await?;
        let effective = if persisted.is_empty() {
            candidates.clone()
        } else {
            for name in candidates.keys().filter(|n| !persisted.contains_key(*n)) {
                event!(
                    Level::DEBUG,
                    database = database_name,
                    data_source = %name,
                    "local data source is not persisted, ignoring"
                );
            }
            persisted
                .into_iter()
                .map(|(name, config)| match candidates.get(&name) {
                    Some(candidate) if *candidate == config => (name, candidate.clone()),
                    _ => (name, config),
                })
                .collect()
        };

        effective
            .into_iter()
            .map(|(name, config)| -> Result<(String, Arc<DataSourceHandle>)> {
                let handle = DataSourceHandle::create(database_name, &name, config)?;
                Ok((name, Arc::new(handle)))
            })
            .collect()
    }
}

#[async_trait]
impl MetadataPersistWriter for MetadataPersistService {
    async fn persist_database(&self, database_name: &str, config: &DatabaseConfiguration) -> Result<()> {
        self.persist_data_sources(database_name, &config.data_sources).await?;
        self.persist_database_rule_configurations(database_name, &config.rule_configurations)
            .await
    }

    async fn persist_data_sources(
        &self,
        database_name: &str,
        data_sources: &BTreeMap<String, DataSourceConfiguration>,
    ) -> Result<()> {
        let json = serde_json::to_string_pretty(data_sources)?;
        self.repository
            .persist(&node::data_sources_node(database_name)?, &json)
            .await
    }

    async fn persist_database_rule_configurations(
        &self,
        database_name: &str,
        configs: &[Box<dyn RuleConfiguration>],
    ) -> Result<()> {
        let json = self.swappers.swap_to_json(configs)?;
        self.repository
            .persist(&node::database_rules_node(database_name)?, &json)
            .await
    }

    async fn persist_global_rule_configurations(&self, configs: &[Box<dyn RuleConfiguration>]) -> Result<()> {
        let json = self.swappers.swap_to_json(configs)?;
        self.repository.persist(GLOBAL_RULES_NODE, &json).await
    }

    async fn persist_properties(&self, props: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(props)?;
        self.repository.persist(PROPS_NODE, &json).await
    }

    async fn drop_database(&self, database_name: &str) -> Result<()> {
        self.repository
            .delete(&node::database_node(database_name)?)
            .await
    }
}
