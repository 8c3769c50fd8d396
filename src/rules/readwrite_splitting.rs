use crate::config::RuleConfiguration;
use crate::core::{MetaError, Result, RuleKind, RuleScope};
use crate::rule::{DataSourceContainerRule, DatabaseRuleBuildContext, DatabaseRuleBuilder, RuntimeRule};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const READWRITE_SPLITTING: RuleKind = RuleKind::new("readwrite_splitting");

/// One logical data source backed by a primary and its replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadwriteSplittingDataSourceConfiguration {
    pub name: String,
    pub write_data_source_name: String,
    #[serde(default)]
    pub read_data_source_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadwriteSplittingRuleConfiguration {
    pub data_sources: Vec<ReadwriteSplittingDataSourceConfiguration>,
}

crate::impl_rule_configuration!(
    ReadwriteSplittingRuleConfiguration,
    READWRITE_SPLITTING,
    RuleScope::Database
);

impl ReadwriteSplittingRuleConfiguration {
    pub fn with_data_source(mut self, name: &str, write: &str, reads: &[&str]) -> Self {
        self.data_sources.push(ReadwriteSplittingDataSourceConfiguration {
            name: name.to_string(),
            write_data_source_name: write.to_string(),
            read_data_source_names: reads.iter().map(|r| r.to_string()).collect(),
        });
        self
    }
}

#[derive(Debug)]
pub struct ReadwriteSplittingRule {
    configuration: ReadwriteSplittingRuleConfiguration,
}

impl ReadwriteSplittingRule {
    pub fn write_data_source(&self, logical: &str) -> Option<&str> {
        self.configuration
            .data_sources
            .iter()
            .find(|g| g.name == logical)
            .map(|g| g.write_data_source_name.as_str())
    }
}

impl RuntimeRule for ReadwriteSplittingRule {
    fn kind(&self) -> RuleKind {
        READWRITE_SPLITTING
    }

    fn configuration(&self) -> &dyn RuleConfiguration {
        &self.configuration
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_data_source_container(&self) -> Option<&dyn DataSourceContainerRule> {
        Some(self)
    }
}

impl DataSourceContainerRule for ReadwriteSplittingRule {
    fn logical_data_sources(&self) -> BTreeMap<String, Vec<String>> {
        self.configuration
            .data_sources
            .iter()
            .map(|g| {
                let mut physical = vec![g.write_data_source_name.clone()];
                physical.extend(g.read_data_source_names.iter().cloned());
                (g.name.clone(), physical)
            })
            .collect()
    }
}

pub struct ReadwriteSplittingRuleBuilder;

impl DatabaseRuleBuilder for ReadwriteSplittingRuleBuilder {
    fn kind(&self) -> RuleKind {
        READWRITE_SPLITTING
    }

    fn order(&self) -> i32 {
        10
    }

    fn build(
        &self,
        config: &dyn RuleConfiguration,
        ctx: &DatabaseRuleBuildContext<'_>,
    ) -> Result<Vec<Arc<dyn RuntimeRule>>> {
        let config = config
            .downcast_ref::<ReadwriteSplittingRuleConfiguration>()
            .ok_or_else(|| {
                MetaError::rule_build(READWRITE_SPLITTING, ctx.database_name, "unexpected configuration type")
            })?;
        let fail = |reason: String| MetaError::rule_build(READWRITE_SPLITTING, ctx.database_name, reason);

        let mut seen = BTreeSet::new();
        for group in &config.data_sources {
            if !seen.insert(group.name.as_str()) {
                return Err(fail(format!("logical data source '{}' is declared twice", group.name)));
            }
            if ctx.resource.contains(&group.name) {
                return Err(fail(format!(
                    "logical data source '{}' shadows a physical data source",
                    group.name
                )));
            }
            for physical in std::iter::once(&group.write_data_source_name).chain(&group.read_data_source_names) {
                if !ctx.resource.contains(physical) {
                    return Err(fail(format!(
                        "data source '{}' of '{}' is not configured",
                        physical, group.name
                    )));
                }
            }
        }

        Ok(vec![Arc::new(ReadwriteSplittingRule {
            configuration: config.clone(),
        })])
    }
}
