//! Broadcast table rule definitions on the sharding rule.

use super::statement::RuleDefinitionStatement;
use super::updater::RuleDefinitionUpdater;
use crate::core::{MetaError, Result, RuleKind, StatementKind};
use crate::metadata::ResourceMetaData;
use crate::rules::{SHARDING, ShardingRuleConfiguration};
use std::any::Any;
use std::collections::BTreeSet;

pub const CREATE_SHARDING_BROADCAST_TABLE_RULES: StatementKind =
    StatementKind::new("CreateShardingBroadcastTableRulesStatement");
pub const ALTER_SHARDING_BROADCAST_TABLE_RULES: StatementKind =
    StatementKind::new("AlterShardingBroadcastTableRulesStatement");
pub const DROP_SHARDING_BROADCAST_TABLE_RULES: StatementKind =
    StatementKind::new("DropShardingBroadcastTableRulesStatement");

macro_rules! sharding_statement {
    ($ty:ty, $kind:expr) => {
        impl RuleDefinitionStatement for $ty {
            fn statement_kind(&self) -> StatementKind {
                $kind
            }

            fn rule_kind(&self) -> RuleKind {
                SHARDING
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

/// `CREATE SHARDING BROADCAST TABLE RULES (t1, t2, ...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateShardingBroadcastTableRulesStatement {
    pub tables: Vec<String>,
}

/// `ALTER SHARDING BROADCAST TABLE RULES (t1, t2, ...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterShardingBroadcastTableRulesStatement {
    pub tables: Vec<String>,
}

/// `DROP SHARDING BROADCAST TABLE RULES`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropShardingBroadcastTableRulesStatement;

sharding_statement!(CreateShardingBroadcastTableRulesStatement, CREATE_SHARDING_BROADCAST_TABLE_RULES);
sharding_statement!(AlterShardingBroadcastTableRulesStatement, ALTER_SHARDING_BROADCAST_TABLE_RULES);
sharding_statement!(DropShardingBroadcastTableRulesStatement, DROP_SHARDING_BROADCAST_TABLE_RULES);

impl CreateShardingBroadcastTableRulesStatement {
    pub fn new<S: AsRef<str>>(tables: &[S]) -> Self {
        Self {
            tables: tables.iter().map(|t| t.as_ref().trim().to_string()).collect(),
        }
    }
}

impl AlterShardingBroadcastTableRulesStatement {
    pub fn new<S: AsRef<str>>(tables: &[S]) -> Self {
        Self {
            tables: tables.iter().map(|t| t.as_ref().trim().to_string()).collect(),
        }
    }
}

/// Name checks shared by create and alter.
fn check_table_names(
    database_name: &str,
    statement_kind: StatementKind,
    tables: &[String],
    current: Option<&ShardingRuleConfiguration>,
) -> Result<()> {
    if tables.is_empty() || tables.iter().any(|t| t.trim().is_empty()) {
        return Err(MetaError::EmptyTableList(statement_kind));
    }

    let mut seen = BTreeSet::new();
    let duplicated: BTreeSet<String> = tables
        .iter()
        .filter(|t| !seen.insert(t.to_ascii_lowercase()))
        .cloned()
        .collect();
    if !duplicated.is_empty() {
        return Err(MetaError::DuplicateBroadcastTables {
            database: database_name.to_string(),
            tables: duplicated.into_iter().collect(),
        });
    }

    if let Some(current) = current {
        let conflicts: Vec<String> = tables
            .iter()
            .filter(|t| current.is_logic_table(t))
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            return Err(MetaError::BroadcastTableConflict {
                database: database_name.to_string(),
                tables: conflicts,
            });
        }
    }
    Ok(())
}

pub struct CreateShardingBroadcastTableRulesUpdater;

impl RuleDefinitionUpdater for CreateShardingBroadcastTableRulesUpdater {
    type Statement = CreateShardingBroadcastTableRulesStatement;
    type Configuration = ShardingRuleConfiguration;

    fn rule_kind(&self) -> RuleKind {
        SHARDING
    }

    fn statement_kind(&self) -> StatementKind {
        CREATE_SHARDING_BROADCAST_TABLE_RULES
    }

    fn check_statement(
        &self,
        database_name: &str,
        statement: &Self::Statement,
        current: Option<&Self::Configuration>,
        _resource: &ResourceMetaData,
    ) -> Result<()> {
        check_table_names(database_name, self.statement_kind(), &statement.tables, current)?;
        if let Some(current) = current {
            let existing: Vec<String> = statement
                .tables
                .iter()
                .filter(|t| current.is_broadcast_table(t))
                .cloned()
                .collect();
            if !existing.is_empty() {
                return Err(MetaError::DuplicateBroadcastTables {
                    database: database_name.to_string(),
                    tables: existing,
                });
            }
        }
        Ok(())
    }

    fn update_configuration(
        &self,
        _database_name: &str,
        statement: &Self::Statement,
        current: &mut Self::Configuration,
    ) -> bool {
        current.broadcast_tables.extend(statement.tables.iter().cloned());
        true
    }

    fn build_absent_configuration(&self, _statement: &Self::Statement) -> Option<Self::Configuration> {
        Some(ShardingRuleConfiguration::default())
    }
}

pub struct AlterShardingBroadcastTableRulesUpdater;

impl RuleDefinitionUpdater for AlterShardingBroadcastTableRulesUpdater {
    type Statement = AlterShardingBroadcastTableRulesStatement;
    type Configuration = ShardingRuleConfiguration;

    fn rule_kind(&self) -> RuleKind {
        SHARDING
    }

    fn statement_kind(&self) -> StatementKind {
        ALTER_SHARDING_BROADCAST_TABLE_RULES
    }

    fn check_statement(
        &self,
        database_name: &str,
        statement: &Self::Statement,
        current: Option<&Self::Configuration>,
        _resource: &ResourceMetaData,
    ) -> Result<()> {
        let current = current.ok_or_else(|| MetaError::RuleNotExists {
            rule_kind: SHARDING,
            database: database_name.to_string(),
        })?;
        check_table_names(database_name, self.statement_kind(), &statement.tables, Some(current))
    }

    fn update_configuration(
        &self,
        _database_name: &str,
        statement: &Self::Statement,
        current: &mut Self::Configuration,
    ) -> bool {
        current.broadcast_tables = statement.tables.iter().cloned().collect();
        true
    }
}

pub struct DropShardingBroadcastTableRulesUpdater;

impl RuleDefinitionUpdater for DropShardingBroadcastTableRulesUpdater {
    type Statement = DropShardingBroadcastTableRulesStatement;
    type Configuration = ShardingRuleConfiguration;

    fn rule_kind(&self) -> RuleKind {
        SHARDING
    }

    fn statement_kind(&self) -> StatementKind {
        DROP_SHARDING_BROADCAST_TABLE_RULES
    }

    fn check_statement(
        &self,
        database_name: &str,
        _statement: &Self::Statement,
        current: Option<&Self::Configuration>,
        _resource: &ResourceMetaData,
    ) -> Result<()> {
        match current {
            Some(config) if !config.broadcast_tables.is_empty() => Ok(()),
            _ => Err(MetaError::BroadcastTableRuleNotExists(database_name.to_string())),
        }
    }

    /// No other rule depends on broadcast membership, so the sharding rule is
    /// refreshed on its own.
    fn update_configuration(
        &self,
        _database_name: &str,
        _statement: &Self::Statement,
        current: &mut Self::Configuration,
    ) -> bool {
        current.broadcast_tables.clear();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ShardingTableRuleConfiguration;

    fn resource() -> ResourceMetaData {
        ResourceMetaData::default()
    }

    #[test]
    fn test_drop_check_fails_without_configuration() {
        let err = DropShardingBroadcastTableRulesUpdater
            .check_statement("sharding_db", &DropShardingBroadcastTableRulesStatement, None, &resource())
            .unwrap_err();
        assert!(matches!(err, MetaError::BroadcastTableRuleNotExists(ref db) if db == "sharding_db"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_drop_check_fails_when_already_empty() {
        let config = ShardingRuleConfiguration::default();
        let err = DropShardingBroadcastTableRulesUpdater
            .check_statement(
                "sharding_db",
                &DropShardingBroadcastTableRulesStatement,
                Some(&config),
                &resource(),
            )
            .unwrap_err();
        assert!(matches!(err, MetaError::BroadcastTableRuleNotExists(_)));
    }

    #[test]
    fn test_drop_clears_set_without_rebuild() {
        let mut config = ShardingRuleConfiguration::default()
            .with_broadcast_table("t_dict")
            .with_broadcast_table("t_region");
        let updater = DropShardingBroadcastTableRulesUpdater;
        let statement = DropShardingBroadcastTableRulesStatement;

        updater
            .check_statement("sharding_db", &statement, Some(&config), &resource())
            .unwrap();
        assert!(!updater.update_configuration("sharding_db", &statement, &mut config));
        assert!(config.broadcast_tables.is_empty());
    }

    #[test]
    fn test_create_rejects_duplicates_and_sharding_tables() {
        let config = ShardingRuleConfiguration::default()
            .with_table(ShardingTableRuleConfiguration::new("t_order", &[]))
            .with_broadcast_table("t_dict");
        let updater = CreateShardingBroadcastTableRulesUpdater;

        let err = updater
            .check_statement(
                "sharding_db",
                &CreateShardingBroadcastTableRulesStatement::new(&["t_a", "T_A"]),
                Some(&config),
                &resource(),
            )
            .unwrap_err();
        assert!(matches!(err, MetaError::DuplicateBroadcastTables { .. }));

        let err = updater
            .check_statement(
                "sharding_db",
                &CreateShardingBroadcastTableRulesStatement::new(&["t_order"]),
                Some(&config),
                &resource(),
            )
            .unwrap_err();
        assert!(matches!(err, MetaError::BroadcastTableConflict { ref tables, .. } if tables == &["t_order"]));

        let err = updater
            .check_statement(
                "sharding_db",
                &CreateShardingBroadcastTableRulesStatement::new(&["t_dict"]),
                Some(&config),
                &resource(),
            )
            .unwrap_err();
        assert!(matches!(err, MetaError::DuplicateBroadcastTables { .. }));
    }

    #[test]
    fn test_create_rejects_empty_list() {
        let err = CreateShardingBroadcastTableRulesUpdater
            .check_statement(
                "sharding_db",
                &CreateShardingBroadcastTableRulesStatement::new::<&str>(&[]),
                None,
                &resource(),
            )
            .unwrap_err();
        assert!(matches!(err, MetaError::EmptyTableList(kind) if kind == CREATE_SHARDING_BROADCAST_TABLE_RULES));
    }

    #[test]
    fn test_alter_requires_existing_configuration_and_replaces_set() {
        let updater = AlterShardingBroadcastTableRulesUpdater;
        let statement = AlterShardingBroadcastTableRulesStatement::new(&["t_region"]);
        let err = updater
            .check_statement("sharding_db", &statement, None, &resource())
            .unwrap_err();
        assert!(matches!(err, MetaError::RuleNotExists { rule_kind, .. } if rule_kind == SHARDING));

        let mut config = ShardingRuleConfiguration::default().with_broadcast_table("t_dict");
        updater
            .check_statement("sharding_db", &statement, Some(&config), &resource())
            .unwrap();
        assert!(updater.update_configuration("sharding_db", &statement, &mut config));
        assert_eq!(config.broadcast_tables.iter().collect::<Vec<_>>(), vec!["t_region"]);
    }
}
