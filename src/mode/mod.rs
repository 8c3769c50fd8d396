pub mod context_manager;

pub use context_manager::{BootstrapOptions, ContextManager};
