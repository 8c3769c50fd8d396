use crate::config::DataSourceConfiguration;
use crate::core::{MetaError, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

lazy_static::lazy_static! {
    static ref DATA_SOURCE_URL: Regex = Regex::new(
        r"^(?P<scheme>[a-zA-Z][a-zA-Z0-9+:.\-]*)://(?P<host>[^:/?#\s]+)(?::(?P<port>\d{1,5}))?/(?P<catalog>[^?#\s]*)(?:\?.*)?$"
    )
    .unwrap();
}

/// Parsed connection coordinates of a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSourceMetaData {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub catalog: String,
}

impl DataSourceMetaData {
    pub fn parse(url: &str) -> std::result::Result<Self, String> {
        let caps = DATA_SOURCE_URL
            .captures(url.trim())
            .ok_or_else(|| format!("url '{}' is not of the form <scheme>://<host>[:<port>]/<catalog>", url))?;
        let port = match caps.name("port") {
            Some(m) => Some(
                m.as_str()
                    .parse::<u16>()
                    .map_err(|_| format!("port '{}' is out of range", m.as_str()))?,
            ),
            None => None,
        };
        Ok(Self {
            scheme: caps["scheme"].to_string(),
            host: caps["host"].to_string(),
            port,
            catalog: caps["catalog"].to_string(),
        })
    }
}

/// Resolved, effective data source. Describes a pool; does not open connections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSourceHandle {
    name: String,
    #[serde(skip)]
    configuration: DataSourceConfiguration,
    metadata: DataSourceMetaData,
}

impl DataSourceHandle {
    pub fn create(
        database: &str,
        name: &str,
        configuration: DataSourceConfiguration,
    ) -> Result<Self> {
        let metadata = DataSourceMetaData::parse(&configuration.url).map_err(|reason| {
            MetaError::DataSourceUnresolved {
                database: database.to_string(),
                data_source: name.to_string(),
                reason,
            }
        })?;
        Ok(Self {
            name: name.to_string(),
            configuration,
            metadata,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn configuration(&self) -> &DataSourceConfiguration {
        &self.configuration
    }

    pub fn metadata(&self) -> &DataSourceMetaData {
        &self.metadata
    }
}

/// Read-only view of the data sources available to one database.
#[derive(Debug, Clone, Default)]
pub struct ResourceMetaData {
    data_sources: BTreeMap<String, Arc<DataSourceHandle>>,
}

impl ResourceMetaData {
    pub fn new(data_sources: BTreeMap<String, Arc<DataSourceHandle>>) -> Self {
        Self { data_sources }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.data_sources.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<DataSourceHandle>> {
        self.data_sources.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.data_sources.keys().map(|s| s.as_str()).collect()
    }

    pub fn data_sources(&self) -> &BTreeMap<String, Arc<DataSourceHandle>> {
        &self.data_sources
    }

    pub fn is_empty(&self) -> bool {
        self.data_sources.is_empty()
    }

    /// Configurations of every data source, e.g. to seed the next resolution.
    pub fn configurations(&self) -> BTreeMap<String, DataSourceConfiguration> {
        self.data_sources
            .iter()
            .map(|(name, handle)| (name.clone(), handle.configuration().clone()))
            .collect()
    }
}
