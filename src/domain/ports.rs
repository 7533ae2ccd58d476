//! Domain Ports - Core types and trait definitions for the engine
//!
//! Closed vocabularies (platforms, attributes, services, exposure modes)
//! and the boundary to the config agent status-check collaborator.

use crate::error::{Error, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Platforms
// =============================================================================

/// Deployment platform the instance runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "GCP")]
    Gcp,
    BareMetal,
    Minikube,
    Kind,
}

impl Platform {
    /// Platform assumed when the global config does not name one
    pub const DEFAULT: Platform = Platform::Gcp;

    /// All recognized platforms
    pub const ALL: [Platform; 4] = [
        Platform::Gcp,
        Platform::BareMetal,
        Platform::Minikube,
        Platform::Kind,
    ];

    /// Parse a platform identifier; unknown identifiers are rejected
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "GCP" => Ok(Platform::Gcp),
            "BareMetal" => Ok(Platform::BareMetal),
            "Minikube" => Ok(Platform::Minikube),
            "Kind" => Ok(Platform::Kind),
            other => Err(Error::UnsupportedPlatform {
                platform: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Gcp => "GCP",
            Platform::BareMetal => "BareMetal",
            Platform::Minikube => "Minikube",
            Platform::Kind => "Kind",
        }
    }

    /// Developer platforms backed by the csi-hostpath driver, which mounts
    /// volumes writable by root only.
    pub fn is_hostpath(&self) -> bool {
        matches!(self, Platform::Minikube | Platform::Kind)
    }

    /// Kind clusters can only run images loaded into the nodes.
    pub fn uses_local_images(&self) -> bool {
        matches!(self, Platform::Kind)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Configurable Attributes
// =============================================================================

/// Storage attributes resolved through the precedence policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    StorageClass,
    VolumeSnapshotClass,
}

impl Attribute {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "StorageClass" | "storage-class" => Ok(Attribute::StorageClass),
            "VolumeSnapshotClass" | "volume-snapshot-class" => Ok(Attribute::VolumeSnapshotClass),
            other => Err(Error::UnsupportedAttribute {
                attribute: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::StorageClass => "StorageClass",
            Attribute::VolumeSnapshotClass => "VolumeSnapshotClass",
        }
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Agent Services
// =============================================================================

/// Optional services an instance can switch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceKind {
    Backup,
    Monitoring,
    Logging,
    Patching,
}

impl ServiceKind {
    /// Parse a service identifier; `None` for anything outside the known set
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Backup" => Some(ServiceKind::Backup),
            "Monitoring" => Some(ServiceKind::Monitoring),
            "Logging" => Some(ServiceKind::Logging),
            "Patching" => Some(ServiceKind::Patching),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Backup => write!(f, "Backup"),
            ServiceKind::Monitoring => write!(f, "Monitoring"),
            ServiceKind::Logging => write!(f, "Logging"),
            ServiceKind::Patching => write!(f, "Patching"),
        }
    }
}

// =============================================================================
// Exposure
// =============================================================================

/// How the primary database endpoint is exposed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exposure {
    /// NodePort service, name suffixed with "-node"
    Node,
    /// LoadBalancer service
    #[default]
    LoadBalancer,
}

// =============================================================================
// Images
// =============================================================================

/// Container images by role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSet {
    /// Database engine and control daemon image
    #[serde(default)]
    pub service: String,

    /// Agent payload staging image
    #[serde(default)]
    pub dbinit: String,

    /// Log shipping sidecar image
    #[serde(default, alias = "logging_sidecar")]
    pub logging_sidecar: String,

    /// Config agent image
    #[serde(default)]
    pub config: String,

    /// Monitoring agent image
    #[serde(default)]
    pub monitoring: String,
}

impl ImageSet {
    /// Fill unset roles from another set (typically the global config)
    pub fn with_defaults(mut self, defaults: &ImageSet) -> Self {
        for (mine, theirs) in [
            (&mut self.service, &defaults.service),
            (&mut self.dbinit, &defaults.dbinit),
            (&mut self.logging_sidecar, &defaults.logging_sidecar),
            (&mut self.config, &defaults.config),
            (&mut self.monitoring, &defaults.monitoring),
        ] {
            if mine.is_empty() {
                mine.clone_from(theirs);
            }
        }
        self
    }
}

// =============================================================================
// Status Check Port
// =============================================================================

/// Remote status check against an instance's config agent.
///
/// Implementations must complete or fail within a bounded timeout and must
/// not retry; retry policy belongs to the caller.
#[async_trait]
pub trait StatusChecker: Send + Sync {
    /// Returns the database status string reported by the agent
    async fn check_instance_status(
        &self,
        instance_name: &str,
        cdb_name: &str,
        address: &str,
        db_domain: &str,
    ) -> Result<String>;
}
