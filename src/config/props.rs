use crate::core::{MetaError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{Level, event};

/// Declared type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Boolean,
    Integer,
    Text,
}

impl PropertyType {
    fn describe(&self) -> &'static str {
        match self {
            PropertyType::Boolean => "a boolean",
            PropertyType::Integer => "an integer",
            PropertyType::Text => "a string",
        }
    }
}

/// Typed property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Boolean(b) => write!(f, "{}", b),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! property_keys {
    ($($variant:ident => ($name:literal, $ty:ident, $default:literal)),+ $(,)?) => {
        /// Closed set of tunable properties understood by the proxy fleet.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ConfigurationPropertyKey {
            $($variant),+
        }

        impl ConfigurationPropertyKey {
            pub const ALL: &'static [ConfigurationPropertyKey] = &[$(ConfigurationPropertyKey::$variant),+];

            pub fn key(&self) -> &'static str {
                match self {
                    $(ConfigurationPropertyKey::$variant => $name),+
                }
            }

            pub fn property_type(&self) -> PropertyType {
                match self {
                    $(ConfigurationPropertyKey::$variant => PropertyType::$ty),+
                }
            }

            pub fn default_value(&self) -> &'static str {
                match self {
                    $(ConfigurationPropertyKey::$variant => $default),+
                }
            }
        }
    };
}

property_keys! {
    SqlShow => ("sql-show", Boolean, "false"),
    SqlSimple => ("sql-simple", Boolean, "false"),
    KernelExecutorSize => ("kernel-executor-size", Integer, "0"),
    MaxConnectionsSizePerQuery => ("max-connections-size-per-query", Integer, "1"),
    CheckTableMetadataEnabled => ("check-table-metadata-enabled", Boolean, "false"),
    CheckDuplicateTableEnabled => ("check-duplicate-table-enabled", Boolean, "false"),
    SqlFederationType => ("sql-federation-type", Text, "NONE"),
    ProxyFrontendFlushThreshold => ("proxy-frontend-flush-threshold", Integer, "128"),
    ProxyBackendQueryFetchSize => ("proxy-backend-query-fetch-size", Integer, "-1"),
    ProxyFrontendExecutorSize => ("proxy-frontend-executor-size", Integer, "0"),
    ProxyFrontendMaxConnections => ("proxy-frontend-max-connections", Integer, "0"),
    ProxyHintEnabled => ("proxy-hint-enabled", Boolean, "false"),
}

impl ConfigurationPropertyKey {
    /// Every key name, once each, in declaration order.
    pub fn key_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.key()).collect()
    }

    pub fn from_key_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.key() == name)
    }

    /// Coerces a raw value to this key's declared type.
    pub fn parse(&self, raw: &str) -> Result<PropertyValue> {
        let trimmed = raw.trim();
        let invalid = || MetaError::InvalidPropertyValue {
            key: self.key().to_string(),
            value: raw.to_string(),
            expected: self.property_type().describe(),
        };
        match self.property_type() {
            PropertyType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Ok(PropertyValue::Boolean(true)),
                "false" => Ok(PropertyValue::Boolean(false)),
                _ => Err(invalid()),
            },
            PropertyType::Integer => trimmed
                .parse::<i64>()
                .map(PropertyValue::Integer)
                .map_err(|_| invalid()),
            PropertyType::Text => Ok(PropertyValue::Text(trimmed.to_string())),
        }
    }

    fn default_typed(&self) -> PropertyValue {
        match self.property_type() {
            PropertyType::Boolean => PropertyValue::Boolean(self.default_value() == "true"),
            PropertyType::Integer => {
                PropertyValue::Integer(self.default_value().parse().unwrap_or_default())
            }
            PropertyType::Text => PropertyValue::Text(self.default_value().to_string()),
        }
    }
}

impl fmt::Display for ConfigurationPropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Validated, typed property values. Every known key has a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationProperties {
    values: BTreeMap<ConfigurationPropertyKey, PropertyValue>,
}

impl ConfigurationProperties {
    /// Builds typed properties from raw key/value pairs.
    ///
    /// Unknown keys are ignored, missing keys take their default, and a value
    /// that cannot be coerced is logged and replaced by the key's default.
    pub fn new(raw: &BTreeMap<String, String>) -> Self {
        for name in raw.keys() {
            if ConfigurationPropertyKey::from_key_name(name).is_none() {
                event!(Level::DEBUG, key = %name, "ignoring unknown configuration property");
            }
        }

        let values = ConfigurationPropertyKey::ALL
            .iter()
            .map(|key| {
                let value = match raw.get(key.key()) {
                    None => key.default_typed(),
                    Some(raw_value) => match key.parse(raw_value) {
                        Ok(value) => value,
                        Err(err) => {
                            event!(
                                Level::WARN,
                                key = key.key(),
                                value = %raw_value,
                                default = key.default_value(),
                                error = %err,
                                "configuration property falls back to default"
                            );
                            key.default_typed()
                        }
                    },
                };
                (*key, value)
            })
            .collect();

        Self { values }
    }

    pub fn value(&self, key: ConfigurationPropertyKey) -> PropertyValue {
        self.values
            .get(&key)
            .cloned()
            .unwrap_or_else(|| key.default_typed())
    }

    pub fn get_bool(&self, key: ConfigurationPropertyKey) -> bool {
        match self.value(key) {
            PropertyValue::Boolean(b) => b,
            _ => false,
        }
    }

    pub fn get_int(&self, key: ConfigurationPropertyKey) -> i64 {
        match self.value(key) {
            PropertyValue::Integer(i) => i,
            _ => 0,
        }
    }

    pub fn get_string(&self, key: ConfigurationPropertyKey) -> String {
        self.value(key).to_string()
    }

    /// Values keyed by property name, for display and comparison.
    pub fn to_map(&self) -> BTreeMap<String, PropertyValue> {
        self.values
            .iter()
            .map(|(k, v)| (k.key().to_string(), v.clone()))
            .collect()
    }
}

impl Default for ConfigurationProperties {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}
