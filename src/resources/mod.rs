//! Resource Builders
//!
//! Pure functions turning an Instance (plus the optional global Config) into
//! the Kubernetes objects that run it:
//!
//! | Builder | Output |
//! |---------|--------|
//! | [`network`] | primary, control-daemon and agent Services |
//! | [`storage`] | one PersistentVolumeClaim per logical disk |
//! | [`workload`] | ConfigMap, pod template, StatefulSet |
//! | [`agent`] | agent Deployment |
//! | [`snapshot`] | VolumeSnapshots |
//!
//! Every builder links its output to the owning object through [`owner`].

pub mod agent;
pub mod consts;
pub mod disks;
pub mod network;
pub mod owner;
pub mod platform;
pub mod snapshot;
pub mod storage;
pub mod workload;

pub use agent::*;
pub use disks::*;
pub use network::*;
pub use owner::set_controller_reference;
pub use platform::*;
pub use snapshot::*;
pub use storage::*;
pub use workload::*;

use crate::crd::{Config, DiskSpec, Instance, RestoreSpec};
use crate::domain::ports::ImageSet;

/// CDB name used when the instance does not set one
pub const DEFAULT_CDB_NAME: &str = "GCLOUD";

// =============================================================================
// Build Parameters
// =============================================================================

/// Everything the StatefulSet-side builders need for one instance.
///
/// A transient bundle assembled by the caller for a single build; it only
/// borrows the Instance and Config.
#[derive(Debug, Clone)]
pub struct BuildParameters<'a> {
    pub instance: &'a Instance,
    pub config: Option<&'a Config>,
    pub images: ImageSet,
    /// Logical disks to provision, in order
    pub disks: Vec<DiskSpec>,
    pub restore: Option<RestoreSpec>,
    /// Whether containers may escalate privileges
    pub privilege_escalation: bool,
    pub sts_name: String,
    pub config_map_name: String,
    pub cdb_name: String,
    pub db_domain: String,
}

impl<'a> BuildParameters<'a> {
    /// Parameters derived from the instance: its disks (or the default
    /// disk set), its restore request, images completed from the Config,
    /// and the standard object names.
    pub fn new(instance: &'a Instance, config: Option<&'a Config>, images: ImageSet) -> Self {
        let images = match config.and_then(|c| c.spec.images.as_ref()) {
            Some(defaults) => images.with_defaults(defaults),
            None => images,
        };
        let name = instance.name();

        Self {
            instance,
            config,
            images,
            disks: instance_disks(instance),
            restore: instance.spec.restore.clone(),
            privilege_escalation: false,
            sts_name: consts::sts_name(name),
            config_map_name: consts::config_map_name(name),
            cdb_name: instance
                .spec
                .cdb_name
                .clone()
                .unwrap_or_else(|| DEFAULT_CDB_NAME.to_string()),
            db_domain: instance.db_domain(),
        }
    }

    pub fn with_restore(mut self, restore: Option<RestoreSpec>) -> Self {
        self.restore = restore;
        self
    }

    pub fn with_privilege_escalation(mut self, allow: bool) -> Self {
        self.privilege_escalation = allow;
        self
    }

    pub fn with_disks(mut self, disks: Vec<DiskSpec>) -> Self {
        self.disks = disks;
        self
    }

    pub fn instance_name(&self) -> &str {
        self.instance.name()
    }

    pub fn namespace(&self) -> Option<String> {
        self.instance.metadata.namespace.clone()
    }

    /// Backup id of an active restore request
    pub fn restore_backup_id(&self) -> Option<&str> {
        self.restore
            .as_ref()
            .map(|r| r.backup_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::crd::{ConfigSpec, InstanceSpec};

    pub fn instance(spec: InstanceSpec) -> Instance {
        let mut inst = Instance::new("orcl1", spec);
        inst.metadata.namespace = Some("db".into());
        inst.metadata.uid = Some("uid-orcl1".into());
        inst
    }

    pub fn config(platform: &str) -> Config {
        let mut cfg = Config::new(
            "config",
            ConfigSpec {
                platform: Some(platform.into()),
                ..Default::default()
            },
        );
        cfg.metadata.namespace = Some("db".into());
        cfg
    }

    pub fn images() -> ImageSet {
        ImageSet {
            service: "gcr.io/db/oracle-19.3-ee:latest".into(),
            dbinit: "gcr.io/db/dbinit:latest".into(),
            logging_sidecar: "gcr.io/db/loggingsidecar:latest".into(),
            config: "gcr.io/db/configagent:latest".into(),
            monitoring: "gcr.io/db/monitoring:latest".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::crd::{ConfigSpec, InstanceSpec};

    #[test]
    fn test_defaults() {
        let inst = instance(InstanceSpec::default());
        let params = BuildParameters::new(&inst, None, images());
        assert_eq!(params.sts_name, "orcl1-sts");
        assert_eq!(params.config_map_name, "orcl1-cm");
        assert_eq!(params.cdb_name, DEFAULT_CDB_NAME);
        let names: Vec<_> = params.disks.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["DataDisk", "LogDisk"]);
        assert!(!params.privilege_escalation);
        assert!(params.restore_backup_id().is_none());
    }

    #[test]
    fn test_images_completed_from_config() {
        let inst = instance(InstanceSpec::default());
        let cfg = Config::new(
            "config",
            ConfigSpec {
                images: Some(ImageSet {
                    monitoring: "monitoring:v2".into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let params = BuildParameters::new(&inst, Some(&cfg), ImageSet::default());
        assert_eq!(params.images.monitoring, "monitoring:v2");
    }

    #[test]
    fn test_empty_backup_id_is_no_restore() {
        let inst = instance(InstanceSpec {
            restore: Some(RestoreSpec::default()),
            ..Default::default()
        });
        let params = BuildParameters::new(&inst, None, images());
        assert!(params.restore_backup_id().is_none());
    }
}
