//! Oracle Resource Engine - Instance Manifest Synthesis
//!
//! Turns a logical Oracle database Instance (plus an optional cluster-wide
//! Config) into the Kubernetes objects that run it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                         External Reconciler                                 │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────────────┐      ┌───────────────────────────────┐   │
//! │  │         Synthesizer           │      │     Config Agent Client       │   │
//! │  │  (one call per instance)      │      │   (status check, 3m bound)    │   │
//! │  └───────────────┬───────────────┘      └───────────────────────────────┘   │
//! │                  │                                                          │
//! ├──────────────────┼──────────────────────────────────────────────────────────┤
//! │                  ▼            Resource Builders                             │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────┐ ┌──────────┐ ┌──────────────┐   │
//! │  │ Services │ │   PVCs   │ │ StatefulSet  │ │  Agent   │ │  Volume      │   │
//! │  │   (x3)   │ │ (x disk) │ │ + ConfigMap  │ │Deployment│ │  Snapshots   │   │
//! │  └──────────┘ └────┬─────┘ └──────────────┘ └──────────┘ └──────────────┘   │
//! │                    │                                                        │
//! │         ┌──────────┴──────────┐      ┌─────────────────────┐                │
//! │         │  Disk Sizing        │      │  Ownership Linker   │                │
//! │         │  Attribute Resolver │      │  (every builder)    │                │
//! │         └──────────┬──────────┘      └─────────────────────┘                │
//! │                    ▼                                                        │
//! │         ┌─────────────────────┐                                             │
//! │         │  Platform Defaults  │  GCP │ BareMetal │ Minikube │ Kind          │
//! │         └─────────────────────┘                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controlplane`]: Synthesizer facade and config agent status client
//! - [`resources`]: Resource builders, disk sizing, attribute resolution
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: Core domain types and traits
//! - [`error`]: Error types and handling

pub mod controlplane;
pub mod crd;
pub mod domain;
pub mod error;
pub mod resources;

// Re-export commonly used types
pub use controlplane::{
    load_manifest, ConfigAgentClient, InstanceResources, Synthesizer, DIAL_TIMEOUT,
};

pub use crd::{
    Backup, BackupSpec, Config, ConfigSpec, DiskSpec, Instance, InstanceSpec, InstanceStatus,
    RestoreSpec, VolumeSnapshot, VolumeSnapshotSpec,
};

pub use domain::ports::{Attribute, Exposure, ImageSet, Platform, ServiceKind, StatusChecker};

pub use error::{Error, ErrorAction, Result};

pub use resources::{
    build_agent_deployment, build_agent_service, build_backup_snapshot, build_backup_snapshots,
    build_config_map, build_db_service, build_dbdaemon_service, build_instance_snapshot,
    build_pod_template, build_pvcs, build_statefulset, resolve_attribute, resolve_disk_size,
    service_url, set_controller_reference, AgentDeploymentParams, BuildParameters,
    PlatformProfile,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
