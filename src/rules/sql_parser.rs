use crate::config::RuleConfiguration;
use crate::core::{MetaError, Result, RuleKind, RuleScope};
use crate::rule::{GlobalRule, GlobalRuleBuildContext, GlobalRuleBuilder, RuntimeRule};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// SQL parsing coordination rule. Exactly one must exist cluster-wide.
pub const SQL_PARSER: RuleKind = RuleKind::new("sql_parser");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOption {
    pub initial_capacity: usize,
    pub maximum_size: usize,
}

impl CacheOption {
    pub fn new(initial_capacity: usize, maximum_size: usize) -> Self {
        Self {
            initial_capacity,
            maximum_size,
        }
    }

    fn validate(&self, name: &str) -> std::result::Result<(), String> {
        if self.initial_capacity == 0 {
            return Err(format!("{} initial capacity must be positive", name));
        }
        if self.initial_capacity > self.maximum_size {
            return Err(format!(
                "{} initial capacity {} exceeds maximum size {}",
                name, self.initial_capacity, self.maximum_size
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlParserRuleConfiguration {
    pub sql_comment_parse_enabled: bool,
    pub parse_tree_cache: CacheOption,
    pub sql_statement_cache: CacheOption,
}

impl Default for SqlParserRuleConfiguration {
    fn default() -> Self {
        Self {
            sql_comment_parse_enabled: false,
            parse_tree_cache: CacheOption::new(128, 1024),
            sql_statement_cache: CacheOption::new(2000, 65535),
        }
    }
}

crate::impl_rule_configuration!(SqlParserRuleConfiguration, SQL_PARSER, RuleScope::Global);

#[derive(Debug)]
pub struct SqlParserRule {
    configuration: SqlParserRuleConfiguration,
}

impl SqlParserRule {
    pub fn is_sql_comment_parse_enabled(&self) -> bool {
        self.configuration.sql_comment_parse_enabled
    }
}

impl RuntimeRule for SqlParserRule {
    fn kind(&self) -> RuleKind {
        SQL_PARSER
    }

    fn configuration(&self) -> &dyn RuleConfiguration {
        &self.configuration
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_global(&self) -> Option<&dyn GlobalRule> {
        Some(self)
    }
}

impl GlobalRule for SqlParserRule {
    fn settings(&self) -> BTreeMap<String, String> {
        let c = &self.configuration;
        BTreeMap::from([
            ("sql_comment_parse_enabled".to_string(), c.sql_comment_parse_enabled.to_string()),
            (
                "parse_tree_cache".to_string(),
                format!("{}/{}", c.parse_tree_cache.initial_capacity, c.parse_tree_cache.maximum_size),
            ),
            (
                "sql_statement_cache".to_string(),
                format!("{}/{}", c.sql_statement_cache.initial_capacity, c.sql_statement_cache.maximum_size),
            ),
        ])
    }
}

pub struct SqlParserRuleBuilder;

impl GlobalRuleBuilder for SqlParserRuleBuilder {
    fn kind(&self) -> RuleKind {
        SQL_PARSER
    }

    fn order(&self) -> i32 {
        0
    }

    fn build(
        &self,
        config: &dyn RuleConfiguration,
        _ctx: &GlobalRuleBuildContext<'_>,
    ) -> Result<Vec<Arc<dyn RuntimeRule>>> {
        let config = config
            .downcast_ref::<SqlParserRuleConfiguration>()
            .ok_or_else(|| MetaError::rule_build(SQL_PARSER, "global rules", "unexpected configuration type"))?;
        config
            .parse_tree_cache
            .validate("parse tree cache")
            .and_then(|_| config.sql_statement_cache.validate("sql statement cache"))
            .map_err(|reason| MetaError::rule_build(SQL_PARSER, "global rules", reason))?;

        Ok(vec![Arc::new(SqlParserRule {
            configuration: config.clone(),
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationProperties;
    use crate::instance::{InstanceContext, ModeConfiguration};

    fn build(config: &SqlParserRuleConfiguration) -> Result<Vec<Arc<dyn RuntimeRule>>> {
        let instance = InstanceContext::embedded("5.4.0", ModeConfiguration::standalone("memory"));
        let props = ConfigurationProperties::default();
        let databases = BTreeMap::new();
        let ctx = GlobalRuleBuildContext {
            databases: &databases,
            built_rules: &[],
            instance: &instance,
            props: &props,
        };
        SqlParserRuleBuilder.build(config, &ctx)
    }

    #[test]
    fn test_default_configuration_builds() {
        let rules = build(&SqlParserRuleConfiguration::default()).unwrap();
        assert_eq!(rules.len(), 1);
        let settings = rules[0].as_global().unwrap().settings();
        assert_eq!(settings["parse_tree_cache"], "128/1024");
    }

    #[test]
    fn test_inverted_cache_bounds_fail() {
        let config = SqlParserRuleConfiguration {
            parse_tree_cache: CacheOption::new(4096, 1024),
            ..Default::default()
        };
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("parse tree cache"));
    }
}
