use crate::core::{RuleKind, RuleScope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const SHARDING: RuleKind = RuleKind::new("sharding");

/// One logic table and the physical data nodes it spreads over.
///
/// An empty `actual_data_nodes` list places the table once on every data
/// source of the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingTableRuleConfiguration {
    pub logic_table: String,
    #[serde(default)]
    pub actual_data_nodes: Vec<String>,
}

impl ShardingTableRuleConfiguration {
    pub fn new(logic_table: &str, actual_data_nodes: &[&str]) -> Self {
        Self {
            logic_table: logic_table.to_string(),
            actual_data_nodes: actual_data_nodes.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardingRuleConfiguration {
    pub tables: Vec<ShardingTableRuleConfiguration>,
    /// Comma separated logic table names routed together.
    pub binding_table_groups: Vec<String>,
    pub broadcast_tables: BTreeSet<String>,
}

crate::impl_rule_configuration!(ShardingRuleConfiguration, SHARDING, RuleScope::Database);

impl ShardingRuleConfiguration {
    pub fn with_table(mut self, table: ShardingTableRuleConfiguration) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_binding_group(mut self, group: &str) -> Self {
        self.binding_table_groups.push(group.to_string());
        self
    }

    pub fn with_broadcast_table(mut self, table: &str) -> Self {
        self.broadcast_tables.insert(table.to_string());
        self
    }

    /// Whether `table` is a sharding logic table. Case-insensitive.
    pub fn is_logic_table(&self, table: &str) -> bool {
        self.tables
            .iter()
            .any(|t| t.logic_table.eq_ignore_ascii_case(table))
    }

    /// Whether `table` is already broadcast. Case-insensitive.
    pub fn is_broadcast_table(&self, table: &str) -> bool {
        self.broadcast_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_with_missing_sections() {
        let config: ShardingRuleConfiguration =
            serde_json::from_value(json!({"broadcast_tables": ["t_dict"]})).unwrap();
        assert!(config.tables.is_empty());
        assert!(config.is_broadcast_table("T_DICT"));
    }

    #[test]
    fn test_logic_table_lookup_ignores_case() {
        let config = ShardingRuleConfiguration::default()
            .with_table(ShardingTableRuleConfiguration::new("t_order", &[]));
        assert!(config.is_logic_table("T_Order"));
        assert!(!config.is_logic_table("t_order_item"));
    }
}
