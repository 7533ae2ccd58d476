//! Backup CRD
//!
//! A backup owns the VolumeSnapshots taken for it, so deleting the backup
//! garbage collects its snapshots.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Backup of an Instance's disks.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "oracle.db.anthosapis.com",
    version = "v1alpha1",
    kind = "Backup",
    plural = "backups",
    status = "BackupStatus",
    printcolumn = r#"{"name": "Instance", "type": "string", "jsonPath": ".spec.instance"}"#,
    printcolumn = r#"{"name": "Type", "type": "string", "jsonPath": ".spec.type"}"#,
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    /// Name of the Instance being backed up
    pub instance: String,

    /// Backup type
    #[serde(default, rename = "type")]
    pub backup_type: BackupType,

    /// Explicit volume snapshot class for this backup
    #[serde(default)]
    pub volume_snapshot_class: Option<String>,
}

/// Kind of backup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BackupType {
    #[default]
    Snapshot,
    Physical,
}

/// Observed state of a Backup
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    /// Current phase
    #[serde(default)]
    pub phase: Option<String>,

    /// Identifier used to name the snapshots of this backup
    #[serde(default)]
    pub backup_id: Option<String>,

    /// Time the backup started
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub start_time: Option<DateTime<Utc>>,
}
