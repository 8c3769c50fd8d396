#![allow(dead_code)]

use async_trait::async_trait;
use shardmeta::config::{DataSourceConfiguration, DatabaseConfiguration, RuleConfiguration};
use shardmeta::core::{MetaError, Result};
use shardmeta::instance::{InstanceContext, ModeConfiguration};
use shardmeta::metadata::DataSourceHandle;
use shardmeta::persist::MetadataPersistFacade;
use shardmeta::rules::SqlParserRuleConfiguration;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn data_source(catalog: &str) -> DataSourceConfiguration {
    DataSourceConfiguration::new(&format!("mysql://127.0.0.1:3306/{}", catalog))
}

pub fn database_with(names: &[&str]) -> DatabaseConfiguration {
    names
        .iter()
        .fold(DatabaseConfiguration::new(), |db, name| db.with_data_source(name, data_source(name)))
}

pub fn proxy() -> Arc<InstanceContext> {
    Arc::new(InstanceContext::proxy("127.0.0.1", 3307, ModeConfiguration::standalone("memory")))
}

pub fn embedded() -> Arc<InstanceContext> {
    Arc::new(InstanceContext::embedded("5.4.0", ModeConfiguration::standalone("memory")))
}

/// Facade returning canned state and counting how often it is read.
#[derive(Default)]
pub struct ScriptedFacade {
    pub database_names: BTreeSet<String>,
    pub data_sources: BTreeMap<String, BTreeMap<String, DataSourceConfiguration>>,
    pub database_rules: BTreeMap<String, Vec<Box<dyn RuleConfiguration>>>,
    pub global_rules: Vec<Box<dyn RuleConfiguration>>,
    pub props: BTreeMap<String, String>,
    /// Added to every read.
    pub latency: Option<Duration>,
    /// Makes `load_properties` fail.
    pub fail_properties: bool,
    pub reads: AtomicUsize,
}

impl ScriptedFacade {
    /// A facade holding one SQL parser rule and nothing else.
    pub fn with_sql_parser() -> Self {
        Self::default().with_global_rule(SqlParserRuleConfiguration::default())
    }

    pub fn with_global_rule(mut self, config: impl RuleConfiguration) -> Self {
        self.global_rules.push(Box::new(config));
        self
    }

    pub fn with_database(mut self, name: &str, config: DatabaseConfiguration) -> Self {
        self.database_names.insert(name.to_string());
        self.data_sources.insert(name.to_string(), config.data_sources);
        self.database_rules.insert(name.to_string(), config.rule_configurations);
        self
    }

    pub fn with_prop(mut self, key: &str, value: &str) -> Self {
        self.props.insert(key.to_string(), value.to_string());
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl MetadataPersistFacade for ScriptedFacade {
    async fn load_all_database_names(&self) -> Result<BTreeSet<String>> {
        self.read().await;
        Ok(self.database_names.clone())
    }

    async fn load_database_rule_configurations(
        &self,
        database_name: &str,
    ) -> Result<Vec<Box<dyn RuleConfiguration>>> {
        self.read().await;
        Ok(self.database_rules.get(database_name).cloned().unwrap_or_default())
    }

    async fn load_global_rule_configurations(&self) -> Result<Vec<Box<dyn RuleConfiguration>>> {
        self.read().await;
        Ok(self.global_rules.clone())
    }

    async fn load_properties(&self) -> Result<BTreeMap<String, String>> {
        self.read().await;
        if self.fail_properties {
            return Err(MetaError::Persistence("props node unreadable".to_string()));
        }
        Ok(self.props.clone())
    }

    async fn resolve_effective_data_sources(
        &self,
        database_name: &str,
        candidates: &BTreeMap<String, DataSourceConfiguration>,
    ) -> Result<BTreeMap<String, Arc<DataSourceHandle>>> {
        self.read().await;
        let effective = match self.data_sources.get(database_name) {
            Some(persisted) if !persisted.is_empty() => persisted.clone(),
            _ => candidates.clone(),
        };
        let mut handles = BTreeMap::new();
        for (name, config) in effective {
            let handle = DataSourceHandle::create(database_name, &name, config)?;
            handles.insert(name, Arc::new(handle));
        }
        Ok(handles)
    }
}
