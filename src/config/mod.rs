pub mod database;
pub mod props;
pub mod rule;

pub use database::{DataSourceConfiguration, DatabaseConfiguration};
pub use props::{ConfigurationProperties, ConfigurationPropertyKey, PropertyType, PropertyValue};
pub use rule::{RuleConfiguration, find_rule_configuration};
