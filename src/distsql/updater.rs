use super::statement::RuleDefinitionStatement;
use crate::config::RuleConfiguration;
use crate::core::{MetaError, Result, RuleKind, StatementKind};
use crate::metadata::ResourceMetaData;

/// Validate-then-mutate handler for one statement kind on one rule kind.
///
/// `check_statement` is pure and runs first; `update_configuration` is only
/// ever called after it succeeded, and is total over a validated
/// configuration. Callers serialize calls per database.
pub trait RuleDefinitionUpdater: Send + Sync {
    type Statement: RuleDefinitionStatement;
    type Configuration: RuleConfiguration;

    fn rule_kind(&self) -> RuleKind;

    fn statement_kind(&self) -> StatementKind;

    fn check_statement(
        &self,
        database_name: &str,
        statement: &Self::Statement,
        current: Option<&Self::Configuration>,
        resource: &ResourceMetaData,
    ) -> Result<()>;

    /// Applies the statement in place. Returns whether the owning runtime
    /// database must be rebuilt (`true`) or the single runtime rule can be
    /// refreshed from the new configuration (`false`).
    fn update_configuration(
        &self,
        database_name: &str,
        statement: &Self::Statement,
        current: &mut Self::Configuration,
    ) -> bool;

    /// Configuration to start from when the database has none of this kind.
    /// `None` means the statement needs an existing configuration.
    fn build_absent_configuration(&self, _statement: &Self::Statement) -> Option<Self::Configuration> {
        None
    }
}

/// Object-safe face of a [`RuleDefinitionUpdater`], working on a database's
/// whole configuration list.
pub(crate) trait DynRuleDefinitionUpdater: Send + Sync {
    fn rule_kind(&self) -> RuleKind;

    fn statement_kind(&self) -> StatementKind;

    fn check(
        &self,
        database_name: &str,
        statement: &dyn RuleDefinitionStatement,
        configs: &[Box<dyn RuleConfiguration>],
        resource: &ResourceMetaData,
    ) -> Result<()>;

    fn update(
        &self,
        database_name: &str,
        statement: &dyn RuleDefinitionStatement,
        configs: &mut Vec<Box<dyn RuleConfiguration>>,
    ) -> Result<bool>;
}

pub(crate) struct ErasedUpdater<U>(pub(crate) U);

impl<U: RuleDefinitionUpdater> ErasedUpdater<U> {
    fn statement<'s>(&self, statement: &'s dyn RuleDefinitionStatement) -> Result<&'s U::Statement> {
        statement.downcast_ref::<U::Statement>().ok_or_else(|| {
            MetaError::UpdaterContract(format!(
                "updater for `{}` received statement `{}`",
                self.0.statement_kind(),
                statement.statement_kind()
            ))
        })
    }

    fn contract_mismatch(&self) -> MetaError {
        MetaError::UpdaterContract(format!(
            "configuration of kind `{}` has an unexpected type for `{}`",
            self.0.rule_kind(),
            self.0.statement_kind()
        ))
    }
}

impl<U: RuleDefinitionUpdater> DynRuleDefinitionUpdater for ErasedUpdater<U> {
    fn rule_kind(&self) -> RuleKind {
        self.0.rule_kind()
    }

    fn statement_kind(&self) -> StatementKind {
        self.0.statement_kind()
    }

    fn check(
        &self,
        database_name: &str,
        statement: &dyn RuleDefinitionStatement,
        configs: &[Box<dyn RuleConfiguration>],
        resource: &ResourceMetaData,
    ) -> Result<()> {
        let statement = self.statement(statement)?;
        let current = match configs.iter().find(|c| c.kind() == self.0.rule_kind()) {
            Some(config) => Some(
                config
                    .downcast_ref::<U::Configuration>()
                    .ok_or_else(|| self.contract_mismatch())?,
            ),
            None => None,
        };
        self.0.check_statement(database_name, statement, current, resource)
    }

    fn update(
        &self,
        database_name: &str,
        statement: &dyn RuleDefinitionStatement,
        configs: &mut Vec<Box<dyn RuleConfiguration>>,
    ) -> Result<bool> {
        let statement = self.statement(statement)?;
        let kind = self.0.rule_kind();
        if let Some(existing) = configs.iter_mut().find(|c| c.kind() == kind) {
            let current = existing
                .downcast_mut::<U::Configuration>()
                .ok_or_else(|| self.contract_mismatch())?;
            return Ok(self.0.update_configuration(database_name, statement, current));
        }

        let mut created = self.0.build_absent_configuration(statement).ok_or_else(|| {
            MetaError::UpdaterContract(format!(
                "`{}` mutated rule `{}` of database '{}', which has no configuration",
                self.0.statement_kind(),
                kind,
                database_name
            ))
        })?;
        let rebuild_required = self.0.update_configuration(database_name, statement, &mut created);
        configs.push(Box::new(created));
        Ok(rebuild_required)
    }
}
