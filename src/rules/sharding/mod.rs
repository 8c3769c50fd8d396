mod builder;
mod config;
mod rule;

pub use builder::ShardingRuleBuilder;
pub use config::{SHARDING, ShardingRuleConfiguration, ShardingTableRuleConfiguration};
pub use rule::ShardingRule;
