use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Role of the current node in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceType {
    /// Library embedded in an application process.
    Embedded,
    /// Standalone proxy process.
    Proxy,
}

/// Identity of the current node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstanceMetaData {
    Embedded { id: String, version: String },
    Proxy { id: String, ip: String, port: u16 },
}

impl InstanceMetaData {
    /// Embedded nodes have no stable address, so they get a random id.
    pub fn embedded(version: &str) -> Self {
        InstanceMetaData::Embedded {
            id: Uuid::new_v4().to_string(),
            version: version.to_string(),
        }
    }

    pub fn proxy(ip: &str, port: u16) -> Self {
        InstanceMetaData::Proxy {
            id: format!("{}@{}", ip, port),
            ip: ip.to_string(),
            port,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            InstanceMetaData::Embedded { id, .. } | InstanceMetaData::Proxy { id, .. } => id,
        }
    }

    pub fn instance_type(&self) -> InstanceType {
        match self {
            InstanceMetaData::Embedded { .. } => InstanceType::Embedded,
            InstanceMetaData::Proxy { .. } => InstanceType::Proxy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputeNodeInstance {
    pub metadata: InstanceMetaData,
    pub labels: BTreeSet<String>,
}

impl ComputeNodeInstance {
    pub fn new(metadata: InstanceMetaData) -> Self {
        Self {
            metadata,
            labels: BTreeSet::new(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.labels.insert(label.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeType {
    Standalone,
    Cluster,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeConfiguration {
    pub mode_type: ModeType,
    /// Name of the repository backing the persisted configuration ("memory", "file", ...).
    pub repository: String,
}

impl ModeConfiguration {
    pub fn standalone(repository: &str) -> Self {
        Self {
            mode_type: ModeType::Standalone,
            repository: repository.to_string(),
        }
    }

    pub fn cluster(repository: &str) -> Self {
        Self {
            mode_type: ModeType::Cluster,
            repository: repository.to_string(),
        }
    }
}

/// Process-wide identity state. Built once at start-up and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceContext {
    instance: ComputeNodeInstance,
    mode: ModeConfiguration,
}

impl InstanceContext {
    pub fn new(instance: ComputeNodeInstance, mode: ModeConfiguration) -> Self {
        Self { instance, mode }
    }

    pub fn embedded(version: &str, mode: ModeConfiguration) -> Self {
        Self::new(
            ComputeNodeInstance::new(InstanceMetaData::embedded(version)),
            mode,
        )
    }

    pub fn proxy(ip: &str, port: u16, mode: ModeConfiguration) -> Self {
        Self::new(ComputeNodeInstance::new(InstanceMetaData::proxy(ip, port)), mode)
    }

    pub fn instance(&self) -> &ComputeNodeInstance {
        &self.instance
    }

    pub fn instance_id(&self) -> &str {
        self.instance.metadata.id()
    }

    pub fn instance_type(&self) -> InstanceType {
        self.instance.metadata.instance_type()
    }

    pub fn mode(&self) -> &ModeConfiguration {
        &self.mode
    }

    pub fn is_cluster_mode(&self) -> bool {
        self.mode.mode_type == ModeType::Cluster
    }
}
