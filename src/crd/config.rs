//! Config CRD
//!
//! Cluster-wide override singleton. Every field is optional; an absent
//! Config means "use the platform defaults".

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::instance::DiskSpec;
use crate::domain::ports::ImageSet;

/// Global operator configuration overriding platform defaults.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "oracle.db.anthosapis.com",
    version = "v1alpha1",
    kind = "Config",
    plural = "configs",
    printcolumn = r#"{"name": "Platform", "type": "string", "jsonPath": ".spec.platform"}"#,
    printcolumn = r#"{"name": "Storage Class", "type": "string", "jsonPath": ".spec.storageClass"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSpec {
    /// Deployment platform: GCP, BareMetal, Minikube or Kind
    #[serde(default)]
    pub platform: Option<String>,

    /// Storage class replacing the platform default
    #[serde(default)]
    pub storage_class: Option<String>,

    /// Volume snapshot class replacing the platform default
    #[serde(default)]
    pub volume_snapshot_class: Option<String>,

    /// Per-disk size overrides
    #[serde(default)]
    pub disks: Vec<DiskSpec>,

    /// Log level per agent (config-agent, operator)
    #[serde(default)]
    pub log_level: BTreeMap<String, String>,

    /// Namespaces the database pod anti-affinity applies to
    #[serde(default)]
    pub host_anti_affinity_namespaces: Vec<String>,

    /// Default images by role
    #[serde(default)]
    pub images: Option<ImageSet>,
}

impl Config {
    /// Platform identifier if one is set and non-empty
    pub fn platform(&self) -> Option<&str> {
        self.spec.platform.as_deref().filter(|p| !p.is_empty())
    }

    /// Size override for a logical disk, if configured
    pub fn disk(&self, name: &str) -> Option<&DiskSpec> {
        self.spec.disks.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_platform_is_unset() {
        let config = Config::new(
            "config",
            ConfigSpec {
                platform: Some(String::new()),
                ..Default::default()
            },
        );
        assert!(config.platform().is_none());
    }

    #[test]
    fn test_spec_deserializes() {
        let spec: ConfigSpec = serde_yaml::from_str(
            r#"
platform: Kind
storageClass: standard
logLevel:
  config-agent: "5"
hostAntiAffinityNamespaces: [db, db2]
disks:
  - name: LogDisk
    size: 20Gi
"#,
        )
        .unwrap();
        let config = Config::new("config", spec);
        assert_eq!(config.platform(), Some("Kind"));
        assert_eq!(config.spec.host_anti_affinity_namespaces.len(), 2);
        assert!(config.disk("LogDisk").is_some());
        assert!(config.disk("DataDisk").is_none());
    }
}
