pub mod builder;
pub mod metadata;

pub use builder::{
    DatabaseRuleBuildContext, DatabaseRuleBuilder, GlobalRuleBuildContext, GlobalRuleBuilder,
    RuleBuilderRegistry,
};
pub use metadata::RuleMetadata;

use crate::config::RuleConfiguration;
use crate::core::RuleKind;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Behaviour-bearing counterpart of a rule configuration.
///
/// Capabilities are exposed through the `as_*` accessors; a rule answers
/// `Some` only for the capabilities it has.
pub trait RuntimeRule: fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> RuleKind;

    /// The configuration this rule was built from.
    fn configuration(&self) -> &dyn RuleConfiguration;

    fn as_any(&self) -> &dyn Any;

    fn as_routing(&self) -> Option<&dyn RoutingRule> {
        None
    }

    fn as_global(&self) -> Option<&dyn GlobalRule> {
        None
    }

    fn as_broadcast(&self) -> Option<&dyn BroadcastTableRule> {
        None
    }

    fn as_data_source_container(&self) -> Option<&dyn DataSourceContainerRule> {
        None
    }
}

/// Physical location of a logic table: `<data source>.<table>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataNode {
    pub data_source: String,
    pub table: String,
}

impl DataNode {
    pub fn parse(text: &str) -> Option<Self> {
        let (data_source, table) = text.trim().split_once('.')?;
        if data_source.is_empty() || table.is_empty() || table.contains('.') {
            return None;
        }
        Some(Self {
            data_source: data_source.to_string(),
            table: table.to_string(),
        })
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.data_source, self.table)
    }
}

/// Rule that takes part in routing logic tables to data nodes.
pub trait RoutingRule {
    fn logic_tables(&self) -> BTreeSet<String>;

    fn data_nodes(&self, logic_table: &str) -> Option<&[DataNode]>;
}

/// Rule that takes part in cluster-wide coordination.
pub trait GlobalRule {
    /// Effective settings, flattened for display.
    fn settings(&self) -> BTreeMap<String, String>;
}

/// Rule that carries broadcast-table membership.
pub trait BroadcastTableRule {
    fn broadcast_tables(&self) -> &BTreeSet<String>;

    fn is_broadcast_table(&self, table: &str) -> bool {
        self.broadcast_tables()
            .iter()
            .any(|t| t.eq_ignore_ascii_case(table))
    }
}

/// Rule that exports logical data sources on top of physical ones.
pub trait DataSourceContainerRule {
    /// Logical data source name to the physical data sources behind it.
    fn logical_data_sources(&self) -> BTreeMap<String, Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_node_parse() {
        let node = DataNode::parse("ds_0.t_order_1").unwrap();
        assert_eq!(node.data_source, "ds_0");
        assert_eq!(node.table, "t_order_1");
        assert_eq!(node.to_string(), "ds_0.t_order_1");
    }

    #[test]
    fn test_data_node_rejects_malformed() {
        assert!(DataNode::parse("t_order").is_none());
        assert!(DataNode::parse(".t_order").is_none());
        assert!(DataNode::parse("ds_0.").is_none());
        assert!(DataNode::parse("ds_0.schema.t_order").is_none());
    }
}
