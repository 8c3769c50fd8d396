//! Rule definition statements and the updaters that apply them.

pub mod broadcast;
pub mod registry;
pub mod statement;
pub mod updater;

pub use broadcast::{
    ALTER_SHARDING_BROADCAST_TABLE_RULES, AlterShardingBroadcastTableRulesStatement,
    AlterShardingBroadcastTableRulesUpdater, CREATE_SHARDING_BROADCAST_TABLE_RULES,
    CreateShardingBroadcastTableRulesStatement, CreateShardingBroadcastTableRulesUpdater,
    DROP_SHARDING_BROADCAST_TABLE_RULES, DropShardingBroadcastTableRulesStatement,
    DropShardingBroadcastTableRulesUpdater,
};
pub use registry::{RuleDefinitionOutcome, UpdaterRegistry};
pub use statement::RuleDefinitionStatement;
pub use updater::RuleDefinitionUpdater;
