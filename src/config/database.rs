use super::rule::RuleConfiguration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Connection-pool description of one backing data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfiguration {
    pub url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Pool properties passed through untouched (max pool size, timeouts, ...).
    #[serde(default)]
    pub props: BTreeMap<String, serde_json::Value>,
}

impl DataSourceConfiguration {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            username: String::new(),
            password: String::new(),
            props: BTreeMap::new(),
        }
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = username.to_string();
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    pub fn prop(mut self, key: &str, value: serde_json::Value) -> Self {
        self.props.insert(key.to_string(), value);
        self
    }
}

/// Locally known configuration of one logical database.
///
/// The database name is the key under which the configuration is supplied.
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfiguration {
    pub data_sources: BTreeMap<String, DataSourceConfiguration>,
    pub rule_configurations: Vec<Box<dyn RuleConfiguration>>,
}

impl DatabaseConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_source(mut self, name: &str, config: DataSourceConfiguration) -> Self {
        self.data_sources.insert(name.to_string(), config);
        self
    }

    pub fn with_rule(mut self, config: impl RuleConfiguration) -> Self {
        self.rule_configurations.push(Box::new(config));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_source_configuration_defaults_on_deserialize() {
        let config: DataSourceConfiguration =
            serde_json::from_value(json!({"url": "mysql://127.0.0.1:3306/ds_0"})).unwrap();
        assert_eq!(config, DataSourceConfiguration::new("mysql://127.0.0.1:3306/ds_0"));
    }

    #[test]
    fn test_builder_methods() {
        let config = DataSourceConfiguration::new("postgresql://db:5432/orders")
            .username("root")
            .password("secret")
            .prop("maxPoolSize", json!(50));
        assert_eq!(config.username, "root");
        assert_eq!(config.props.get("maxPoolSize"), Some(&json!(50)));

        let db = DatabaseConfiguration::new().with_data_source("ds_0", config);
        assert_eq!(db.data_sources.len(), 1);
        assert!(db.rule_configurations.is_empty());
    }
}
