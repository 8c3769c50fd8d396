use super::resource::ResourceMetaData;
use crate::config::{RuleConfiguration, find_rule_configuration};
use crate::core::RuleKind;
use crate::rule::RuleMetadata;

/// One assembled logical database: effective data sources, the rule
/// configurations it was built from and the runtime rules built from them.
///
/// Immutable once assembled; changes produce a new value.
#[derive(Debug, Clone)]
pub struct RuntimeDatabase {
    name: String,
    resource: ResourceMetaData,
    rule_configurations: Vec<Box<dyn RuleConfiguration>>,
    rule_metadata: RuleMetadata,
}

impl RuntimeDatabase {
    pub fn new(
        name: &str,
        resource: ResourceMetaData,
        rule_configurations: Vec<Box<dyn RuleConfiguration>>,
        rule_metadata: RuleMetadata,
    ) -> Self {
        Self {
            name: name.to_string(),
            resource,
            rule_configurations,
            rule_metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource(&self) -> &ResourceMetaData {
        &self.resource
    }

    pub fn rule_configurations(&self) -> &[Box<dyn RuleConfiguration>] {
        &self.rule_configurations
    }

    pub fn rule_configuration(&self, kind: RuleKind) -> Option<&dyn RuleConfiguration> {
        find_rule_configuration(&self.rule_configurations, kind)
    }

    pub fn rule_metadata(&self) -> &RuleMetadata {
        &self.rule_metadata
    }

    /// Copy with `config` replacing the configuration of its kind and the
    /// runtime rules swapped for `rule_metadata`.
    pub fn with_refreshed_rule(&self, config: Box<dyn RuleConfiguration>, rule_metadata: RuleMetadata) -> Self {
        let kind = config.kind();
        let mut rule_configurations: Vec<Box<dyn RuleConfiguration>> = Vec::with_capacity(self.rule_configurations.len() + 1);
        let mut replaced = false;
        for existing in &self.rule_configurations {
            if existing.kind() == kind {
                if !replaced {
                    rule_configurations.push(config.clone());
                    replaced = true;
                }
            } else {
                rule_configurations.push(existing.clone());
            }
        }
        if !replaced {
            rule_configurations.push(config);
        }
        Self {
            name: self.name.clone(),
            resource: self.resource.clone(),
            rule_configurations,
            rule_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{SHARDING, ShardingRuleConfiguration};

    #[test]
    fn test_with_refreshed_rule_replaces_configuration() {
        let database = RuntimeDatabase::new(
            "sharding_db",
            ResourceMetaData::default(),
            vec![Box::new(ShardingRuleConfiguration::default().with_broadcast_table("t_dict"))],
            RuleMetadata::default(),
        );
        let refreshed = database.with_refreshed_rule(
            Box::new(ShardingRuleConfiguration::default()),
            RuleMetadata::default(),
        );

        assert_eq!(refreshed.rule_configurations().len(), 1);
        let config = refreshed
            .rule_configuration(SHARDING)
            .and_then(|c| c.downcast_ref::<ShardingRuleConfiguration>())
            .unwrap();
        assert!(config.broadcast_tables.is_empty());
        let original = database
            .rule_configuration(SHARDING)
            .and_then(|c| c.downcast_ref::<ShardingRuleConfiguration>())
            .unwrap();
        assert!(original.is_broadcast_table("t_dict"));
    }
}
