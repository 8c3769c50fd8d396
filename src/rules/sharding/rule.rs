use super::config::{SHARDING, ShardingRuleConfiguration};
use crate::config::RuleConfiguration;
use crate::core::RuleKind;
use crate::rule::{BroadcastTableRule, DataNode, RoutingRule, RuntimeRule};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

/// Runtime sharding rule: routes logic tables and carries broadcast tables.
#[derive(Debug)]
pub struct ShardingRule {
    pub(super) configuration: ShardingRuleConfiguration,
    /// Keyed by lower-cased logic table name.
    pub(super) table_nodes: BTreeMap<String, Vec<DataNode>>,
    pub(super) binding_groups: Vec<BTreeSet<String>>,
    pub(super) broadcast_tables: BTreeSet<String>,
}

impl ShardingRule {
    pub fn is_sharding_table(&self, table: &str) -> bool {
        self.table_nodes.contains_key(&table.to_ascii_lowercase())
    }

    /// The binding group `table` belongs to, if any.
    pub fn binding_group(&self, table: &str) -> Option<&BTreeSet<String>> {
        let table = table.to_ascii_lowercase();
        self.binding_groups.iter().find(|g| g.contains(&table))
    }

    /// Data sources referenced by any data node.
    pub fn data_source_names(&self) -> BTreeSet<&str> {
        self.table_nodes
            .values()
            .flatten()
            .map(|n| n.data_source.as_str())
            .collect()
    }
}

impl RuntimeRule for ShardingRule {
    fn kind(&self) -> RuleKind {
        SHARDING
    }

    fn configuration(&self) -> &dyn RuleConfiguration {
        &self.configuration
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_routing(&self) -> Option<&dyn RoutingRule> {
        Some(self)
    }

    fn as_broadcast(&self) -> Option<&dyn BroadcastTableRule> {
        Some(self)
    }
}

impl RoutingRule for ShardingRule {
    fn logic_tables(&self) -> BTreeSet<String> {
        self.table_nodes.keys().cloned().collect()
    }

    fn data_nodes(&self, logic_table: &str) -> Option<&[DataNode]> {
        self.table_nodes
            .get(&logic_table.to_ascii_lowercase())
            .map(|nodes| nodes.as_slice())
    }
}

impl BroadcastTableRule for ShardingRule {
    fn broadcast_tables(&self) -> &BTreeSet<String> {
        &self.broadcast_tables
    }
}
