use super::types::{RuleKind, StatementKind};
use thiserror::Error;

/// Category an error belongs to. Decides how callers surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Aborts the whole assembly; no snapshot is published.
    Assembly,
    /// Rejected administrative command; no configuration was mutated.
    Validation,
    /// Malformed property value; only ever logged, the key falls back to its default.
    Property,
    /// Broken updater or registry contract. A programming error, not a user condition.
    Internal,
}

#[derive(Error, Debug)]
pub enum MetaError {
    // ------------------------------------------------------------------
    // Assembly
    // ------------------------------------------------------------------
    #[error("Rule `{rule_kind}` should have and only have one instance, found {count}.")]
    SingletonRuleViolation { rule_kind: RuleKind, count: usize },

    #[error("Data source '{data_source}' of database '{database}' cannot be resolved: {reason}")]
    DataSourceUnresolved {
        database: String,
        data_source: String,
        reason: String,
    },

    #[error("No builder registered for rule kind `{0}`")]
    BuilderNotFound(String),

    #[error("Failed to build rule `{rule_kind}` in {scope}: {reason}")]
    RuleBuild {
        rule_kind: RuleKind,
        scope: String,
        reason: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------
    #[error("Database '{0}' does not exist")]
    DatabaseNotFound(String),

    #[error("Rule `{rule_kind}` does not exist in database '{database}'")]
    RuleNotExists { rule_kind: RuleKind, database: String },

    #[error("Sharding broadcast table rules do not exist in database '{0}'")]
    BroadcastTableRuleNotExists(String),

    #[error("Duplicate broadcast tables in database '{database}': {}", .tables.join(", "))]
    DuplicateBroadcastTables { database: String, tables: Vec<String> },

    #[error("Tables already defined as sharding tables in database '{database}': {}", .tables.join(", "))]
    BroadcastTableConflict { database: String, tables: Vec<String> },

    #[error("Statement `{0}` must name at least one table")]
    EmptyTableList(StatementKind),

    #[error("No updater registered for statement `{statement_kind}` on rule `{rule_kind}`")]
    UnsupportedStatement {
        rule_kind: RuleKind,
        statement_kind: StatementKind,
    },

    // ------------------------------------------------------------------
    // Property
    // ------------------------------------------------------------------
    #[error("Property '{key}' expects {expected}, got '{value}'")]
    InvalidPropertyValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------
    #[error("Updater contract violated: {0}")]
    UpdaterContract(String),

    #[error("Registry conflict: {0}")]
    RegistryConflict(String),
}

impl MetaError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MetaError::SingletonRuleViolation { .. }
            | MetaError::DataSourceUnresolved { .. }
            | MetaError::BuilderNotFound(_)
            | MetaError::RuleBuild { .. }
            | MetaError::Persistence(_)
            | MetaError::Serialization(_)
            | MetaError::Cancelled(_) => ErrorCategory::Assembly,
            MetaError::DatabaseNotFound(_)
            | MetaError::RuleNotExists { .. }
            | MetaError::BroadcastTableRuleNotExists(_)
            | MetaError::DuplicateBroadcastTables { .. }
            | MetaError::BroadcastTableConflict { .. }
            | MetaError::EmptyTableList(_)
            | MetaError::UnsupportedStatement { .. } => ErrorCategory::Validation,
            MetaError::InvalidPropertyValue { .. } => ErrorCategory::Property,
            MetaError::UpdaterContract(_) | MetaError::RegistryConflict(_) => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    pub(crate) fn rule_build(rule_kind: RuleKind, scope: impl Into<String>, reason: impl Into<String>) -> Self {
        MetaError::RuleBuild {
            rule_kind,
            scope: scope.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetaError>;

impl From<serde_json::Error> for MetaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for MetaError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for MetaError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::Cancelled(err.to_string())
    }
}
