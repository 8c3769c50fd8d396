//! Repository node layout.
//!
//! ```text
//! /metadata/<database>/data_sources
//! /metadata/<database>/rules
//! /rules
//! /props
//! ```

use crate::core::{MetaError, Result};
use regex::Regex;

lazy_static::lazy_static! {
    static ref NODE_SEGMENT: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_\-.$]*$").unwrap();
}

pub const METADATA_NODE: &str = "/metadata";
pub const GLOBAL_RULES_NODE: &str = "/rules";
pub const PROPS_NODE: &str = "/props";

fn segment(name: &str) -> Result<&str> {
    if NODE_SEGMENT.is_match(name) {
        Ok(name)
    } else {
        Err(MetaError::Persistence(format!(
            "'{}' is not a valid repository node name",
            name
        )))
    }
}

pub fn database_node(database_name: &str) -> Result<String> {
    Ok(format!("{}/{}", METADATA_NODE, segment(database_name)?))
}

pub fn data_sources_node(database_name: &str) -> Result<String> {
    Ok(format!("{}/data_sources", database_node(database_name)?))
}

pub fn database_rules_node(database_name: &str) -> Result<String> {
    Ok(format!("{}/rules", database_node(database_name)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_nodes() {
        assert_eq!(database_rules_node("sharding_db").unwrap(), "/metadata/sharding_db/rules");
        assert_eq!(
            data_sources_node("sharding_db").unwrap(),
            "/metadata/sharding_db/data_sources"
        );
    }

    #[test]
    fn test_rejects_path_like_names() {
        assert!(database_node("a/b").is_err());
        assert!(database_node("..").is_err());
        assert!(database_node("").is_err());
    }
}
