use crate::config::RuleConfiguration;
use crate::core::{MetaError, Result, RuleKind};
use crate::rules::{
    READWRITE_SPLITTING, ReadwriteSplittingRuleConfiguration, SHARDING, SQL_PARSER,
    ShardingRuleConfiguration, SqlParserRuleConfiguration, TRANSACTION,
    TransactionRuleConfiguration,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Converts one rule kind between its configuration object and a JSON body.
pub trait RuleConfigurationSwapper: Send + Sync {
    fn kind(&self) -> RuleKind;

    fn swap_to_value(&self, config: &dyn RuleConfiguration) -> Result<serde_json::Value>;

    fn swap_to_object(&self, value: serde_json::Value) -> Result<Box<dyn RuleConfiguration>>;
}

/// Swapper for configurations whose serde shape is their persisted shape.
pub struct JsonRuleConfigurationSwapper<T> {
    kind: RuleKind,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonRuleConfigurationSwapper<T> {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            _marker: PhantomData,
        }
    }
}

impl<T> RuleConfigurationSwapper for JsonRuleConfigurationSwapper<T>
where
    T: RuleConfiguration + Serialize + DeserializeOwned,
{
    fn kind(&self) -> RuleKind {
        self.kind
    }

    fn swap_to_value(&self, config: &dyn RuleConfiguration) -> Result<serde_json::Value> {
        let config = config.downcast_ref::<T>().ok_or_else(|| {
            MetaError::Serialization(format!(
                "configuration of kind `{}` is not handled by the `{}` swapper",
                config.kind(),
                self.kind
            ))
        })?;
        Ok(serde_json::to_value(config)?)
    }

    fn swap_to_object(&self, value: serde_json::Value) -> Result<Box<dyn RuleConfiguration>> {
        let config: T = serde_json::from_value(value)?;
        Ok(Box::new(config))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RuleDocument {
    kind: String,
    config: serde_json::Value,
}

/// Rule kind to swapper lookup used when reading and writing rule nodes.
#[derive(Default)]
pub struct RuleConfigurationSwapperRegistry {
    swappers: BTreeMap<&'static str, Arc<dyn RuleConfigurationSwapper>>,
}

impl RuleConfigurationSwapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_swappers() -> Self {
        let builtin: [Arc<dyn RuleConfigurationSwapper>; 4] = [
            Arc::new(JsonRuleConfigurationSwapper::<ReadwriteSplittingRuleConfiguration>::new(READWRITE_SPLITTING)),
            Arc::new(JsonRuleConfigurationSwapper::<ShardingRuleConfiguration>::new(SHARDING)),
            Arc::new(JsonRuleConfigurationSwapper::<SqlParserRuleConfiguration>::new(SQL_PARSER)),
            Arc::new(JsonRuleConfigurationSwapper::<TransactionRuleConfiguration>::new(TRANSACTION)),
        ];
        Self {
            swappers: builtin.into_iter().map(|s| (s.kind().name(), s)).collect(),
        }
    }

    pub fn register(&mut self, swapper: impl RuleConfigurationSwapper + 'static) -> Result<()> {
        let name = swapper.kind().name();
        if self.swappers.contains_key(name) {
            return Err(MetaError::RegistryConflict(format!(
                "swapper for rule kind `{}` is already registered",
                name
            )));
        }
        self.swappers.insert(name, Arc::new(swapper));
        Ok(())
    }

    fn swapper(&self, kind: &str) -> Result<&Arc<dyn RuleConfigurationSwapper>> {
        self.swappers.get(kind).ok_or_else(|| {
            MetaError::Persistence(format!("no swapper registered for rule kind `{}`", kind))
        })
    }

    /// Serializes rule configurations as a JSON array of `{kind, config}` documents.
    pub fn swap_to_json(&self, configs: &[Box<dyn RuleConfiguration>]) -> Result<String> {
        let documents = configs
            .iter()
            .map(|config| -> Result<RuleDocument> {
                let kind = config.kind().name();
                Ok(RuleDocument {
                    kind: kind.to_string(),
                    config: self.swapper(kind)?.swap_to_value(config.as_ref())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::to_string_pretty(&documents)?)
    }

    pub fn swap_to_configurations(&self, json: &str) -> Result<Vec<Box<dyn RuleConfiguration>>> {
        let documents: Vec<RuleDocument> = serde_json::from_str(json)?;
        documents
            .into_iter()
            .map(|doc| self.swapper(&doc.kind)?.swap_to_object(doc.config))
            .collect()
    }
}
