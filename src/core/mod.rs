pub mod error;
pub mod types;

pub use error::{ErrorCategory, MetaError, Result};
pub use types::{RuleKind, RuleScope, StatementKind};
