/// Broadcast table rule definition tests, driven through the updater registry
///
/// Run with: cargo test --test broadcast_updater_tests

use shardmeta::config::RuleConfiguration;
use shardmeta::core::{ErrorCategory, MetaError};
use shardmeta::distsql::{
    AlterShardingBroadcastTableRulesStatement, CreateShardingBroadcastTableRulesStatement,
    DROP_SHARDING_BROADCAST_TABLE_RULES, DropShardingBroadcastTableRulesStatement, UpdaterRegistry,
};
use shardmeta::metadata::ResourceMetaData;
use shardmeta::rules::{SHARDING, ShardingRuleConfiguration, ShardingTableRuleConfiguration};

fn sharding(configs: &[Box<dyn RuleConfiguration>]) -> &ShardingRuleConfiguration {
    configs
        .iter()
        .find(|c| c.kind() == SHARDING)
        .and_then(|c| c.downcast_ref::<ShardingRuleConfiguration>())
        .unwrap()
}

fn broadcast_tables(configs: &[Box<dyn RuleConfiguration>]) -> Vec<String> {
    sharding(configs).broadcast_tables.iter().cloned().collect()
}

#[test]
fn test_drop_clears_broadcast_tables_without_rebuild() {
    let registry = UpdaterRegistry::with_builtin_updaters();
    let mut configs: Vec<Box<dyn RuleConfiguration>> = vec![Box::new(
        ShardingRuleConfiguration::default()
            .with_table(ShardingTableRuleConfiguration::new("t_order", &[]))
            .with_broadcast_table("t_dict")
            .with_broadcast_table("t_region"),
    )];

    let outcome = registry
        .execute(
            "sharding_db",
            &DropShardingBroadcastTableRulesStatement,
            &mut configs,
            &ResourceMetaData::default(),
        )
        .unwrap();

    assert_eq!(outcome.rule_kind, SHARDING);
    assert_eq!(outcome.statement_kind, DROP_SHARDING_BROADCAST_TABLE_RULES);
    assert!(!outcome.rebuild_required);
    assert!(broadcast_tables(&configs).is_empty());
    // Everything else about the sharding rule is untouched.
    assert!(sharding(&configs).is_logic_table("t_order"));
}

#[test]
fn test_second_drop_is_rejected_and_changes_nothing() {
    let registry = UpdaterRegistry::with_builtin_updaters();
    let mut configs: Vec<Box<dyn RuleConfiguration>> =
        vec![Box::new(ShardingRuleConfiguration::default().with_broadcast_table("t_dict"))];
    let resource = ResourceMetaData::default();

    registry
        .execute("sharding_db", &DropShardingBroadcastTableRulesStatement, &mut configs, &resource)
        .unwrap();
    let err = registry
        .execute("sharding_db", &DropShardingBroadcastTableRulesStatement, &mut configs, &resource)
        .unwrap_err();

    assert!(matches!(err, MetaError::BroadcastTableRuleNotExists(ref db) if db == "sharding_db"));
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(configs.len(), 1);
}

#[test]
fn test_drop_without_sharding_configuration_is_rejected() {
    let registry = UpdaterRegistry::with_builtin_updaters();
    let mut configs: Vec<Box<dyn RuleConfiguration>> = Vec::new();

    let err = registry
        .execute(
            "empty_db",
            &DropShardingBroadcastTableRulesStatement,
            &mut configs,
            &ResourceMetaData::default(),
        )
        .unwrap_err();

    assert!(matches!(err, MetaError::BroadcastTableRuleNotExists(ref db) if db == "empty_db"));
    assert!(configs.is_empty());
}

#[test]
fn test_create_then_alter_replaces_membership() {
    let registry = UpdaterRegistry::with_builtin_updaters();
    let resource = ResourceMetaData::default();
    let mut configs: Vec<Box<dyn RuleConfiguration>> = Vec::new();

    let created = registry
        .execute(
            "sharding_db",
            &CreateShardingBroadcastTableRulesStatement::new(&["t_dict", "t_region"]),
            &mut configs,
            &resource,
        )
        .unwrap();
    assert!(created.rebuild_required);
    assert_eq!(broadcast_tables(&configs), vec!["t_dict", "t_region"]);

    registry
        .execute(
            "sharding_db",
            &AlterShardingBroadcastTableRulesStatement::new(&["t_country"]),
            &mut configs,
            &resource,
        )
        .unwrap();
    assert_eq!(broadcast_tables(&configs), vec!["t_country"]);
}

#[test]
fn test_rejected_create_leaves_configuration_untouched() {
    let registry = UpdaterRegistry::with_builtin_updaters();
    let mut configs: Vec<Box<dyn RuleConfiguration>> = vec![Box::new(
        ShardingRuleConfiguration::default()
            .with_table(ShardingTableRuleConfiguration::new("t_order", &[]))
            .with_broadcast_table("t_dict"),
    )];

    let err = registry
        .execute(
            "sharding_db",
            &CreateShardingBroadcastTableRulesStatement::new(&["t_region", "t_order"]),
            &mut configs,
            &ResourceMetaData::default(),
        )
        .unwrap_err();

    assert!(matches!(err, MetaError::BroadcastTableConflict { .. }));
    assert_eq!(broadcast_tables(&configs), vec!["t_dict"]);
}
