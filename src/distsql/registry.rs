use super::broadcast::{
    AlterShardingBroadcastTableRulesUpdater, CreateShardingBroadcastTableRulesUpdater,
    DropShardingBroadcastTableRulesUpdater,
};
use super::statement::RuleDefinitionStatement;
use super::updater::{DynRuleDefinitionUpdater, ErasedUpdater, RuleDefinitionUpdater};
use crate::config::RuleConfiguration;
use crate::core::{MetaError, Result, RuleKind, StatementKind};
use crate::metadata::ResourceMetaData;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// What a successfully applied rule definition statement did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleDefinitionOutcome {
    pub rule_kind: RuleKind,
    pub statement_kind: StatementKind,
    pub rebuild_required: bool,
}

/// Routes rule definition statements to their updater by
/// `(rule kind, statement kind)`.
#[derive(Default)]
pub struct UpdaterRegistry {
    updaters: BTreeMap<(RuleKind, StatementKind), Arc<dyn DynRuleDefinitionUpdater>>,
}

impl UpdaterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_updaters() -> Self {
        let mut registry = Self::new();
        registry.insert(CreateShardingBroadcastTableRulesUpdater);
        registry.insert(AlterShardingBroadcastTableRulesUpdater);
        registry.insert(DropShardingBroadcastTableRulesUpdater);
        registry
    }

    fn insert<U: RuleDefinitionUpdater + 'static>(&mut self, updater: U) {
        let key = (updater.rule_kind(), updater.statement_kind());
        self.updaters.insert(key, Arc::new(ErasedUpdater(updater)));
    }

    pub fn register<U: RuleDefinitionUpdater + 'static>(&mut self, updater: U) -> Result<()> {
        let key = (updater.rule_kind(), updater.statement_kind());
        if self.updaters.contains_key(&key) {
            return Err(MetaError::RegistryConflict(format!(
                "updater for statement `{}` on rule `{}` is already registered",
                key.1, key.0
            )));
        }
        self.insert(updater);
        Ok(())
    }

    pub fn contains(&self, rule_kind: RuleKind, statement_kind: StatementKind) -> bool {
        self.updaters.contains_key(&(rule_kind, statement_kind))
    }

    pub fn registered(&self) -> Vec<(RuleKind, StatementKind)> {
        self.updaters.keys().copied().collect()
    }

    /// Checks `statement` against `configs` and applies it in place.
    ///
    /// A failed check leaves `configs` untouched and never reaches the update.
    pub fn execute(
        &self,
        database_name: &str,
        statement: &dyn RuleDefinitionStatement,
        configs: &mut Vec<Box<dyn RuleConfiguration>>,
        resource: &ResourceMetaData,
    ) -> Result<RuleDefinitionOutcome> {
        let rule_kind = statement.rule_kind();
        let statement_kind = statement.statement_kind();
        let span = info_span!(
            "distsql.rule_definition",
            database = %database_name,
            statement = %statement_kind
        );
        let _enter = span.enter();

        let updater = self
            .updaters
            .get(&(rule_kind, statement_kind))
            .ok_or(MetaError::UnsupportedStatement {
                rule_kind,
                statement_kind,
            })?;

        if let Err(err) = updater.check(database_name, statement, configs, resource) {
            event!(Level::INFO, error = %err, "rule definition rejected");
            return Err(err);
        }
        let rebuild_required = updater.update(database_name, statement, configs)?;
        event!(Level::INFO, rebuild_required, "rule definition applied");

        Ok(RuleDefinitionOutcome {
            rule_kind,
            statement_kind,
            rebuild_required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distsql::broadcast::{
        CREATE_SHARDING_BROADCAST_TABLE_RULES, CreateShardingBroadcastTableRulesStatement,
        DropShardingBroadcastTableRulesStatement,
    };
    use crate::rules::{SHARDING, ShardingRuleConfiguration};
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct RenameStatement;

    impl RuleDefinitionStatement for RenameStatement {
        fn statement_kind(&self) -> StatementKind {
            StatementKind::new("RenameStatement")
        }
        fn rule_kind(&self) -> RuleKind {
            SHARDING
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct RejectingUpdater {
        updates: Arc<AtomicUsize>,
    }

    impl RuleDefinitionUpdater for RejectingUpdater {
        type Statement = RenameStatement;
        type Configuration = ShardingRuleConfiguration;

        fn rule_kind(&self) -> RuleKind {
            SHARDING
        }
        fn statement_kind(&self) -> StatementKind {
            StatementKind::new("RenameStatement")
        }
        fn check_statement(
            &self,
            database_name: &str,
            _statement: &RenameStatement,
            _current: Option<&ShardingRuleConfiguration>,
            _resource: &ResourceMetaData,
        ) -> Result<()> {
            Err(MetaError::RuleNotExists {
                rule_kind: SHARDING,
                database: database_name.to_string(),
            })
        }
        fn update_configuration(
            &self,
            _database_name: &str,
            _statement: &RenameStatement,
            _current: &mut ShardingRuleConfiguration,
        ) -> bool {
            self.updates.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_failed_check_never_reaches_update() {
        let updates = Arc::new(AtomicUsize::new(0));
        let mut registry = UpdaterRegistry::new();
        registry
            .register(RejectingUpdater {
                updates: updates.clone(),
            })
            .unwrap();
        let mut configs: Vec<Box<dyn RuleConfiguration>> =
            vec![Box::new(ShardingRuleConfiguration::default().with_broadcast_table("t_dict"))];

        let err = registry
            .execute("sharding_db", &RenameStatement, &mut configs, &ResourceMetaData::default())
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(updates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = UpdaterRegistry::with_builtin_updaters();
        let err = registry
            .register(crate::distsql::broadcast::DropShardingBroadcastTableRulesUpdater)
            .unwrap_err();
        assert!(matches!(err, MetaError::RegistryConflict(_)));
        assert_eq!(registry.registered().len(), 3);
    }

    #[test]
    fn test_unregistered_statement_is_unsupported() {
        let registry = UpdaterRegistry::new();
        let err = registry
            .execute(
                "sharding_db",
                &DropShardingBroadcastTableRulesStatement,
                &mut Vec::new(),
                &ResourceMetaData::default(),
            )
            .unwrap_err();
        assert!(matches!(err, MetaError::UnsupportedStatement { .. }));
    }

    #[test]
    fn test_create_adds_configuration_when_absent() {
        let registry = UpdaterRegistry::with_builtin_updaters();
        let mut configs: Vec<Box<dyn RuleConfiguration>> = Vec::new();
        let outcome = registry
            .execute(
                "sharding_db",
                &CreateShardingBroadcastTableRulesStatement::new(&["t_dict"]),
                &mut configs,
                &ResourceMetaData::default(),
            )
            .unwrap();

        assert_eq!(outcome.statement_kind, CREATE_SHARDING_BROADCAST_TABLE_RULES);
        assert!(outcome.rebuild_required);
        let config = configs[0].downcast_ref::<ShardingRuleConfiguration>().unwrap();
        assert!(config.is_broadcast_table("t_dict"));
    }
}
