use super::{RuleMetadata, RuntimeRule};
use crate::config::{ConfigurationProperties, RuleConfiguration};
use crate::core::{MetaError, Result, RuleKind, RuleScope};
use crate::instance::InstanceContext;
use crate::metadata::database::RuntimeDatabase;
use crate::metadata::resource::ResourceMetaData;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Level, event};

/// Inputs visible to a database rule builder.
///
/// `built_rules` holds the rules already built for the same database, in
/// builder order, so later builders can depend on earlier ones.
pub struct DatabaseRuleBuildContext<'a> {
    pub database_name: &'a str,
    pub resource: &'a ResourceMetaData,
    pub built_rules: &'a [Arc<dyn RuntimeRule>],
    pub instance: &'a InstanceContext,
    pub props: &'a ConfigurationProperties,
}

/// Inputs visible to a global rule builder.
pub struct GlobalRuleBuildContext<'a> {
    pub databases: &'a BTreeMap<String, Arc<RuntimeDatabase>>,
    pub built_rules: &'a [Arc<dyn RuntimeRule>],
    pub instance: &'a InstanceContext,
    pub props: &'a ConfigurationProperties,
}

/// Builds runtime rules for one database-scoped rule kind.
///
/// Builders must be pure functions of their inputs.
pub trait DatabaseRuleBuilder: Send + Sync {
    fn kind(&self) -> RuleKind;

    /// Lower orders build first.
    fn order(&self) -> i32;

    fn build(
        &self,
        config: &dyn RuleConfiguration,
        ctx: &DatabaseRuleBuildContext<'_>,
    ) -> Result<Vec<Arc<dyn RuntimeRule>>>;
}

/// Builds runtime rules for one global rule kind.
pub trait GlobalRuleBuilder: Send + Sync {
    fn kind(&self) -> RuleKind;

    fn order(&self) -> i32;

    fn build(
        &self,
        config: &dyn RuleConfiguration,
        ctx: &GlobalRuleBuildContext<'_>,
    ) -> Result<Vec<Arc<dyn RuntimeRule>>>;
}

/// Capability-keyed registry of rule builders.
#[derive(Default)]
pub struct RuleBuilderRegistry {
    database_builders: BTreeMap<RuleKind, Arc<dyn DatabaseRuleBuilder>>,
    global_builders: BTreeMap<RuleKind, Arc<dyn GlobalRuleBuilder>>,
}

impl RuleBuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in rule kind registered.
    pub fn with_builtin_builders() -> Self {
        let mut registry = Self::new();
        for builder in crate::rules::builtin_database_builders() {
            registry.database_builders.insert(builder.kind(), builder);
        }
        for builder in crate::rules::builtin_global_builders() {
            registry.global_builders.insert(builder.kind(), builder);
        }
        registry
    }

    /// Registered rule kinds with their scope, in builder order.
    pub fn list_builders(&self) -> Vec<(RuleKind, RuleScope, i32)> {
        let mut kinds: Vec<_> = self
            .global_builders
            .values()
            .map(|b| (b.kind(), RuleScope::Global, b.order()))
            .chain(
                self.database_builders
                    .values()
                    .map(|b| (b.kind(), RuleScope::Database, b.order())),
            )
            .collect();
        kinds.sort_by_key(|(kind, scope, order)| (*scope != RuleScope::Global, *order, *kind));
        kinds
    }

    pub fn register_database_builder(
        &mut self,
        builder: impl DatabaseRuleBuilder + 'static,
    ) -> Result<()> {
        let kind = builder.kind();
        if self.database_builders.contains_key(&kind) || self.global_builders.contains_key(&kind) {
            return Err(MetaError::RegistryConflict(format!(
                "builder for rule kind `{}` is already registered",
                kind
            )));
        }
        self.database_builders.insert(kind, Arc::new(builder));
        Ok(())
    }

    pub fn register_global_builder(
        &mut self,
        builder: impl GlobalRuleBuilder + 'static,
    ) -> Result<()> {
        let kind = builder.kind();
        if self.database_builders.contains_key(&kind) || self.global_builders.contains_key(&kind) {
            return Err(MetaError::RegistryConflict(format!(
                "builder for rule kind `{}` is already registered",
                kind
            )));
        }
        self.global_builders.insert(kind, Arc::new(builder));
        Ok(())
    }

    pub fn database_builder(&self, kind: RuleKind) -> Option<&Arc<dyn DatabaseRuleBuilder>> {
        self.database_builders.get(&kind)
    }

    pub fn global_builder(&self, kind: RuleKind) -> Option<&Arc<dyn GlobalRuleBuilder>> {
        self.global_builders.get(&kind)
    }

    /// Builds the rules of one database, in builder order.
    ///
    /// Configurations of the same order keep their relative input order.
    pub fn build_database_rules(
        &self,
        database_name: &str,
        configs: &[Box<dyn RuleConfiguration>],
        resource: &ResourceMetaData,
        instance: &InstanceContext,
        props: &ConfigurationProperties,
    ) -> Result<RuleMetadata> {
        let mut ordered = Vec::with_capacity(configs.len());
        for config in configs {
            let builder = self.require_database_builder(config.as_ref())?;
            ordered.push((builder.order(), builder, config));
        }
        ordered.sort_by_key(|(order, _, _)| *order);

        let mut built: Vec<Arc<dyn RuntimeRule>> = Vec::new();
        for (_, builder, config) in ordered {
            let ctx = DatabaseRuleBuildContext {
                database_name,
                resource,
                built_rules: &built,
                instance,
                props,
            };
            let rules = builder.build(config.as_ref(), &ctx)?;
            event!(
                Level::DEBUG,
                database = database_name,
                rule_kind = %builder.kind(),
                count = rules.len(),
                "database rules built"
            );
            built.extend(rules);
        }
        Ok(RuleMetadata::new(built))
    }

    /// Rebuilds the rules of one kind against an existing database, reusing
    /// its other rules as the already-built siblings.
    pub fn rebuild_database_rule(
        &self,
        database: &RuntimeDatabase,
        config: &dyn RuleConfiguration,
        instance: &InstanceContext,
        props: &ConfigurationProperties,
    ) -> Result<RuleMetadata> {
        let builder = self.require_database_builder(config)?;
        let kind = builder.kind();
        let siblings: Vec<Arc<dyn RuntimeRule>> = database
            .rule_metadata()
            .rules()
            .iter()
            .filter(|r| {
                r.kind() != kind
                    && self
                        .database_builders
                        .get(&r.kind())
                        .map(|b| b.order() < builder.order())
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        let ctx = DatabaseRuleBuildContext {
            database_name: database.name(),
            resource: database.resource(),
            built_rules: &siblings,
            instance,
            props,
        };
        let rebuilt = builder.build(config, &ctx)?;
        Ok(database.rule_metadata().with_replaced_kind(kind, rebuilt))
    }

    /// Builds the cluster-wide rules, in builder order.
    pub fn build_global_rules(
        &self,
        configs: &[Box<dyn RuleConfiguration>],
        databases: &BTreeMap<String, Arc<RuntimeDatabase>>,
        instance: &InstanceContext,
        props: &ConfigurationProperties,
    ) -> Result<RuleMetadata> {
        let mut ordered = Vec::with_capacity(configs.len());
        for config in configs {
            if config.scope() != RuleScope::Global {
                return Err(MetaError::rule_build(
                    config.kind(),
                    "global rules",
                    "configuration is database scoped",
                ));
            }
            let builder = self
                .global_builders
                .get(&config.kind())
                .cloned()
                .ok_or_else(|| MetaError::BuilderNotFound(config.kind().to_string()))?;
            ordered.push((builder.order(), builder, config));
        }
        ordered.sort_by_key(|(order, _, _)| *order);

        let mut built: Vec<Arc<dyn RuntimeRule>> = Vec::new();
        for (_, builder, config) in ordered {
            let ctx = GlobalRuleBuildContext {
                databases,
                built_rules: &built,
                instance,
                props,
            };
            let rules = builder.build(config.as_ref(), &ctx)?;
            built.extend(rules);
        }
        Ok(RuleMetadata::new(built))
    }

    fn require_database_builder(
        &self,
        config: &dyn RuleConfiguration,
    ) -> Result<Arc<dyn DatabaseRuleBuilder>> {
        if config.scope() != RuleScope::Database {
            return Err(MetaError::rule_build(
                config.kind(),
                "database rules",
                "configuration is globally scoped",
            ));
        }
        self.database_builders
            .get(&config.kind())
            .cloned()
            .ok_or_else(|| MetaError::BuilderNotFound(config.kind().to_string()))
    }
}
