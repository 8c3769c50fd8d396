use crate::core::{RuleKind, StatementKind};
use std::any::Any;
use std::fmt;

/// Parsed administrative statement that defines, alters or drops a rule.
pub trait RuleDefinitionStatement: fmt::Debug + Send + Sync + 'static {
    fn statement_kind(&self) -> StatementKind;

    /// Rule kind whose configuration the statement changes.
    fn rule_kind(&self) -> RuleKind;

    fn as_any(&self) -> &dyn Any;
}

impl dyn RuleDefinitionStatement {
    pub fn downcast_ref<T: RuleDefinitionStatement>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
