//! Built-in rule catalog.
//!
//! Every rule kind ships its configuration, runtime rule and builder side by
//! side. Registries pick them up through the functions below.

pub mod readwrite_splitting;
pub mod sharding;
pub mod sql_parser;
pub mod transaction;

use crate::rule::{DatabaseRuleBuilder, GlobalRuleBuilder};
use std::sync::Arc;

pub use readwrite_splitting::{
    READWRITE_SPLITTING, ReadwriteSplittingDataSourceConfiguration, ReadwriteSplittingRule,
    ReadwriteSplittingRuleBuilder, ReadwriteSplittingRuleConfiguration,
};
pub use sharding::{
    SHARDING, ShardingRule, ShardingRuleBuilder, ShardingRuleConfiguration,
    ShardingTableRuleConfiguration,
};
pub use sql_parser::{CacheOption, SQL_PARSER, SqlParserRule, SqlParserRuleBuilder, SqlParserRuleConfiguration};
pub use transaction::{
    TRANSACTION, TransactionRule, TransactionRuleBuilder, TransactionRuleConfiguration,
    TransactionType,
};

pub fn builtin_database_builders() -> Vec<Arc<dyn DatabaseRuleBuilder>> {
    vec![
        Arc::new(ReadwriteSplittingRuleBuilder),
        Arc::new(ShardingRuleBuilder),
    ]
}

pub fn builtin_global_builders() -> Vec<Arc<dyn GlobalRuleBuilder>> {
    vec![Arc::new(SqlParserRuleBuilder), Arc::new(TransactionRuleBuilder)]
}

/// Rule kinds that must resolve to exactly one global runtime rule.
pub fn builtin_singleton_kinds() -> Vec<crate::core::RuleKind> {
    vec![SQL_PARSER]
}
