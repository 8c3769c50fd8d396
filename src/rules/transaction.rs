use crate::config::RuleConfiguration;
use crate::core::{MetaError, Result, RuleKind, RuleScope};
use crate::rule::{GlobalRule, GlobalRuleBuildContext, GlobalRuleBuilder, RuntimeRule};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

pub const TRANSACTION: RuleKind = RuleKind::new("transaction");

const DEFAULT_XA_PROVIDER: &str = "Atomikos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    #[default]
    Local,
    Xa,
    Base,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Local => f.write_str("LOCAL"),
            TransactionType::Xa => f.write_str("XA"),
            TransactionType::Base => f.write_str("BASE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionRuleConfiguration {
    pub default_type: TransactionType,
    pub provider_type: Option<String>,
    pub props: BTreeMap<String, String>,
}

crate::impl_rule_configuration!(TransactionRuleConfiguration, TRANSACTION, RuleScope::Global);

#[derive(Debug)]
pub struct TransactionRule {
    configuration: TransactionRuleConfiguration,
    provider_type: Option<String>,
    databases: BTreeSet<String>,
}

impl TransactionRule {
    pub fn default_type(&self) -> TransactionType {
        self.configuration.default_type
    }

    pub fn provider_type(&self) -> Option<&str> {
        self.provider_type.as_deref()
    }

    /// Databases whose resources take part in distributed transactions.
    pub fn databases(&self) -> &BTreeSet<String> {
        &self.databases
    }
}

impl RuntimeRule for TransactionRule {
    fn kind(&self) -> RuleKind {
        TRANSACTION
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

impl GlobalRule for TransactionRule {
    fn settings(&self) -> BTreeMap<String, String> {
        let mut settings = BTreeMap::from([(
            "default_type".to_string(),
            self.configuration.default_type.to_string(),
        )]);
        if let Some(provider) = &self.provider_type {
            settings.insert("provider_type".to_string(), provider.clone());
        }
        settings
    }
}

pub struct TransactionRuleBuilder;

impl GlobalRuleBuilder for TransactionRuleBuilder {
    fn kind(&self) -> RuleKind {
        TRANSACTION
    }

    fn order(&self) -> i32 {
        10
    }

    fn build(
        &self,
        config: &dyn RuleConfiguration,
        ctx: &GlobalRuleBuildContext<'_>,
    ) -> Result<Vec<Arc<dyn RuntimeRule>>> {
        let config = config
            .downcast_ref::<TransactionRuleConfiguration>()
            .ok_or_else(|| MetaError::rule_build(TRANSACTION, "global rules", "unexpected configuration type"))?;
        let provider_type = match (config.default_type, &config.provider_type) {
            (_, Some(provider)) if !provider.trim().is_empty() => Some(provider.trim().to_string()),
            (TransactionType::Xa, _) => Some(DEFAULT_XA_PROVIDER.to_string()),
            _ => None,
        };
        Ok(vec![Arc::new(TransactionRule {
            configuration: config.clone(),
            provider_type,
            databases: ctx.databases.keys().cloned().collect(),
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationProperties;
    use crate::instance::{InstanceContext, ModeConfiguration};
    use serde_json::json;

    fn build(config: &TransactionRuleConfiguration) -> Arc<dyn RuntimeRule> {
        let instance = InstanceContext::embedded("5.4.0", ModeConfiguration::standalone("memory"));
        let props = ConfigurationProperties::default();
        let databases = BTreeMap::new();
        let ctx = GlobalRuleBuildContext {
            databases: &databases,
            built_rules: &[],
            instance: &instance,
            props: &props,
        };
        TransactionRuleBuilder.build(config, &ctx).unwrap().remove(0)
    }

    #[test]
    fn test_xa_without_provider_uses_default_provider() {
        let config: TransactionRuleConfiguration = serde_json::from_value(json!({"default_type": "XA"})).unwrap();
        let rule = build(&config);
        let rule = rule.as_any().downcast_ref::<TransactionRule>().unwrap();
        assert_eq!(rule.provider_type(), Some("Atomikos"));
    }

    #[test]
    fn test_local_has_no_provider() {
        let rule = build(&TransactionRuleConfiguration::default());
        let settings = rule.as_global().unwrap().settings();
        assert_eq!(settings.get("default_type").map(String::as_str), Some("LOCAL"));
        assert!(!settings.contains_key("provider_type"));
    }
}
