//! Instance CRD
//!
//! Logical description of one database instance. This is the main input of
//! the synthesis engine; it is never mutated by the builders.

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::ports::ServiceKind;

// =============================================================================
// Instance CRD
// =============================================================================

/// Instance describes a single containerized Oracle database.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "oracle.db.anthosapis.com",
    version = "v1alpha1",
    kind = "Instance",
    plural = "instances",
    shortname = "inst",
    status = "InstanceStatus",
    printcolumn = r#"{"name": "DB Engine", "type": "string", "jsonPath": ".spec.type"}"#,
    printcolumn = r#"{"name": "Version", "type": "string", "jsonPath": ".spec.version"}"#,
    printcolumn = r#"{"name": "Endpoint", "type": "string", "jsonPath": ".status.endpoint"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    /// Database engine type (informational)
    #[serde(default, rename = "type")]
    pub engine_type: Option<String>,

    /// Database version, e.g. "19.3" or "18c"
    #[serde(default)]
    pub version: String,

    /// Optional agent services and whether they are enabled
    #[serde(default)]
    pub services: BTreeMap<String, bool>,

    /// Network options for the primary database endpoint
    #[serde(default)]
    pub db_network_service_options: Option<DbNetworkServiceOptions>,

    /// Source CIDR ranges allowed to reach a load-balanced endpoint
    #[serde(default)]
    pub source_cidr_ranges: Vec<String>,

    /// OS user id the database processes run as
    #[serde(default, rename = "databaseUID")]
    pub database_uid: Option<i64>,

    /// OS group id the database processes run as
    #[serde(default, rename = "databaseGID")]
    pub database_gid: Option<i64>,

    /// Logical disks backing the instance
    #[serde(default)]
    pub disks: Vec<DiskSpec>,

    /// Database domain
    #[serde(default)]
    pub db_domain: Option<String>,

    /// Database unique name, optionally carrying a domain suffix
    #[serde(default)]
    pub db_unique_name: Option<String>,

    /// Container database name
    #[serde(default)]
    pub cdb_name: Option<String>,

    /// Memory request for the database container (e.g. "8Gi")
    #[serde(default)]
    pub min_memory_for_db_container: Option<String>,

    /// Restore request, if the instance is being seeded from a backup
    #[serde(default)]
    pub restore: Option<RestoreSpec>,
}

// =============================================================================
// Sub-Types
// =============================================================================

/// A logical disk request. Size and storage class are optional; unset
/// values are resolved from the global config and platform defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiskSpec {
    /// Logical disk name (DataDisk, LogDisk, BackupDisk)
    pub name: String,

    /// Requested capacity
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub size: Option<Quantity>,

    /// Explicit storage class
    #[serde(default)]
    pub storage_class: Option<String>,
}

impl DiskSpec {
    /// Disk with only a logical name set
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Requested size, if one was given and it is not zero
    pub fn nonzero_size(&self) -> Option<&Quantity> {
        self.size.as_ref().filter(|q| !quantity_is_zero(q))
    }
}

/// Network options for the primary database Service
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DbNetworkServiceOptions {
    /// GCP specific options
    #[serde(default)]
    pub gcp: GcpNetworkOptions,
}

/// GCP load balancer options
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GcpNetworkOptions {
    /// Internal or External load balancer
    #[serde(default)]
    pub load_balancer_type: Option<LoadBalancerType>,
}

/// Load balancer reachability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum LoadBalancerType {
    Internal,
    #[default]
    External,
}

/// Request to restore the instance disks from a prior backup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSpec {
    /// Identifier of the backup whose snapshots seed the disks
    #[serde(default, rename = "backupId")]
    pub backup_id: String,

    /// Time the restore was requested
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub request_time: Option<DateTime<Utc>>,
}

// =============================================================================
// Status
// =============================================================================

/// Observed state of an Instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    /// Connectable address of the primary endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Last status reported by the config agent
    #[serde(default)]
    pub database_status: Option<String>,

    /// Last status check time
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_status_check: Option<DateTime<Utc>>,
}

// =============================================================================
// Implementations
// =============================================================================

impl Instance {
    /// Get the name of this instance
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Database domain: the suffix of the unique name if it carries one,
    /// otherwise the explicit domain.
    pub fn db_domain(&self) -> String {
        if let Some((_, domain)) = self
            .spec
            .db_unique_name
            .as_deref()
            .and_then(|n| n.split_once('.'))
        {
            return domain.to_string();
        }
        self.spec.db_domain.clone().unwrap_or_default()
    }

    /// Service identifiers switched on for the instance, in map order
    pub fn enabled_services(&self) -> Vec<String> {
        self.spec
            .services
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether the given known service is switched on
    pub fn service_enabled(&self, kind: ServiceKind) -> bool {
        self.spec
            .services
            .iter()
            .any(|(name, enabled)| *enabled && ServiceKind::parse(name) == Some(kind))
    }

    /// Whether an internal load balancer was requested
    pub fn wants_internal_load_balancer(&self) -> bool {
        self.spec
            .db_network_service_options
            .as_ref()
            .and_then(|o| o.gcp.load_balancer_type)
            == Some(LoadBalancerType::Internal)
    }
}

/// Whether a quantity denotes zero capacity ("0", "0Gi", "0.0").
///
/// Unparseable quantities are treated as non-zero and passed through
/// untouched; the API server is the authority on quantity syntax.
pub fn quantity_is_zero(q: &Quantity) -> bool {
    let s = q.0.trim();
    if s.is_empty() {
        return true;
    }
    let numeric_end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(s.len());
    match s[..numeric_end].parse::<f64>() {
        Ok(v) => v == 0.0,
        Err(_) => false,
    }
}
