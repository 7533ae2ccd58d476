//! Disk Table & Disk Sizing Resolver
//!
//! Logical disks map to a fixed mount point and default capacity. Claim and
//! mount names are pure functions of (instance name, disk name) so repeated
//! synthesis yields the same objects.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::consts::DEFAULT_DISK_SIZE;
use super::platform::resolve;
use super::BuildParameters;
use crate::crd::{DiskSpec, Instance};
use crate::domain::ports::Attribute;
use crate::error::{Error, Result};

// =============================================================================
// Default Disk Table
// =============================================================================

/// Built-in defaults of a logical disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskDefaults {
    pub name: &'static str,
    pub size: &'static str,
    pub mount: &'static str,
}

pub const DEFAULT_DISK_TABLE: [DiskDefaults; 3] = [
    DiskDefaults {
        name: "DataDisk",
        size: "100Gi",
        mount: "u02",
    },
    DiskDefaults {
        name: "LogDisk",
        size: "150Gi",
        mount: "u03",
    },
    DiskDefaults {
        name: "BackupDisk",
        size: "100Gi",
        mount: "u04",
    },
];

/// Logical name of the disk holding the database files
pub const DATA_DISK: &str = "DataDisk";

pub fn disk_defaults(name: &str) -> Option<&'static DiskDefaults> {
    DEFAULT_DISK_TABLE.iter().find(|d| d.name == name)
}

/// Disks provisioned when an instance does not list any
pub fn default_disks() -> Vec<DiskSpec> {
    vec![DiskSpec::named("DataDisk"), DiskSpec::named("LogDisk")]
}

/// Disks of an instance, or the default set when it lists none
pub fn instance_disks(instance: &Instance) -> Vec<DiskSpec> {
    if instance.spec.disks.is_empty() {
        default_disks()
    } else {
        instance.spec.disks.clone()
    }
}

// =============================================================================
// Naming
// =============================================================================

/// Claim name and mount name of a logical disk.
///
/// Disks outside the table mount at their lower-cased name, keeping claim
/// names distinct per disk.
pub fn claim_name_and_mount(instance: &str, disk: &str) -> (String, String) {
    let mount = match disk_defaults(disk) {
        Some(d) => d.mount.to_string(),
        None => disk.to_lowercase(),
    };
    (format!("{}-pvc-{}", instance, mount), mount)
}

/// Fails when two disks of an instance map to the same claim, as disks
/// differing only in case do, or a disk named after a table mount.
pub fn ensure_distinct_claims(instance: &str, disks: &[DiskSpec]) -> Result<()> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    for disk in disks {
        let (claim, _) = claim_name_and_mount(instance, &disk.name);
        if let Some(first) = seen.get(&claim) {
            return Err(Error::DuplicateClaim {
                claim,
                first: first.to_string(),
                second: disk.name.clone(),
            });
        }
        seen.insert(claim, &disk.name);
    }
    Ok(())
}

/// Name of the claim a StatefulSet materialises from a claim template
pub fn statefulset_claim_name(claim: &str, sts: &str) -> String {
    format!("{}-{}-0", claim, sts)
}

/// Name of the snapshot of one mount taken for a backup; restores look the
/// snapshot up by the same name.
pub fn snapshot_name(backup_id: &str, mount: &str) -> String {
    format!("{}-{}", backup_id, mount)
}

// =============================================================================
// Sizing
// =============================================================================

/// Capacity of a logical disk.
///
/// Precedence: instance disk size, global Config disk size, table default,
/// then a fixed fallback. Never fails; a disk missing from the table is
/// logged and gets the fallback capacity.
pub fn resolve_disk_size(disk_name: &str, params: &BuildParameters<'_>) -> Quantity {
    if let Some(size) = params
        .disks
        .iter()
        .filter(|d| d.name == disk_name)
        .find_map(DiskSpec::nonzero_size)
    {
        debug!("disk {} sized by instance request: {}", disk_name, size.0);
        return size.clone();
    }

    if let Some(size) = params
        .config
        .and_then(|c| c.disk(disk_name))
        .and_then(DiskSpec::nonzero_size)
    {
        debug!("disk {} sized by global config: {}", disk_name, size.0);
        return size.clone();
    }

    match disk_defaults(disk_name) {
        Some(defaults) => {
            debug!("disk {} sized by default table: {}", disk_name, defaults.size);
            Quantity(defaults.size.to_string())
        }
        None => {
            warn!(
                "no default size for disk {:?}, using {}",
                disk_name, DEFAULT_DISK_SIZE
            );
            Quantity(DEFAULT_DISK_SIZE.to_string())
        }
    }
}

// =============================================================================
// Resolved Disks
// =============================================================================

/// A logical disk with every attribute resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDisk {
    pub name: String,
    pub claim_name: String,
    pub mount_name: String,
    pub mount_path: String,
    pub capacity: Quantity,
    pub storage_class: String,
}

/// Resolve capacity, storage class and names for every disk, in order.
///
/// A disk without a resolvable storage class, or two disks sharing a claim
/// name, fail the whole call.
pub fn resolve_disks(params: &BuildParameters<'_>) -> Result<Vec<ResolvedDisk>> {
    ensure_distinct_claims(params.instance_name(), &params.disks)?;
    params
        .disks
        .iter()
        .map(|disk| {
            let storage_class = resolve(
                Attribute::StorageClass,
                disk.storage_class.as_deref(),
                params.config,
            )
            .map_err(|e| Error::UnresolvedStorageClass {
                disk: disk.name.clone(),
                reason: e.to_string(),
            })?;
            info!("storage class identified for disk {}: {}", disk.name, storage_class);

            let (claim_name, mount_name) = claim_name_and_mount(params.instance_name(), &disk.name);
            Ok(ResolvedDisk {
                name: disk.name.clone(),
                mount_path: format!("/{}", mount_name),
                claim_name,
                mount_name,
                capacity: resolve_disk_size(&disk.name, params),
                storage_class,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::crd::{ConfigSpec, InstanceSpec};
    use crate::crd::Config;
    use assert_matches::assert_matches;

    fn sized(name: &str, size: &str) -> DiskSpec {
        DiskSpec {
            name: name.into(),
            size: Some(Quantity(size.into())),
            storage_class: None,
        }
    }

    fn config_with_disks(disks: Vec<DiskSpec>) -> Config {
        Config::new(
            "config",
            ConfigSpec {
                disks,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_instance_size_wins() {
        let inst = instance(InstanceSpec {
            disks: vec![sized("DataDisk", "300Gi")],
            ..Default::default()
        });
        let cfg = config_with_disks(vec![sized("DataDisk", "200Gi")]);
        let params = BuildParameters::new(&inst, Some(&cfg), images());
        assert_eq!(resolve_disk_size("DataDisk", &params), Quantity("300Gi".into()));
    }

    #[test]
    fn test_config_size_when_instance_zero() {
        let inst = instance(InstanceSpec {
            disks: vec![sized("DataDisk", "0")],
            ..Default::default()
        });
        let cfg = config_with_disks(vec![sized("DataDisk", "200Gi")]);
        let params = BuildParameters::new(&inst, Some(&cfg), images());
        assert_eq!(resolve_disk_size("DataDisk", &params), Quantity("200Gi".into()));
    }

    #[test]
    fn test_table_default() {
        let inst = instance(InstanceSpec {
            disks: vec![DiskSpec::named("LogDisk")],
            ..Default::default()
        });
        let cfg = config_with_disks(vec![sized("DataDisk", "200Gi")]);
        let params = BuildParameters::new(&inst, Some(&cfg), images());
        assert_eq!(resolve_disk_size("LogDisk", &params), Quantity("150Gi".into()));
    }

    #[test]
    fn test_unknown_disk_fallback() {
        let inst = instance(InstanceSpec {
            disks: vec![DiskSpec::named("ScratchDisk")],
            ..Default::default()
        });
        let params = BuildParameters::new(&inst, None, images());
        assert_eq!(
            resolve_disk_size("ScratchDisk", &params),
            Quantity(DEFAULT_DISK_SIZE.into())
        );

        // An explicit size still applies to a disk outside the table
        let params = params.with_disks(vec![sized("ScratchDisk", "5Gi")]);
        assert_eq!(resolve_disk_size("ScratchDisk", &params), Quantity("5Gi".into()));
    }

    #[test]
    fn test_naming_is_deterministic_and_distinct() {
        assert_eq!(
            claim_name_and_mount("orcl1", "DataDisk"),
            claim_name_and_mount("orcl1", "DataDisk")
        );
        assert_eq!(
            claim_name_and_mount("orcl1", "DataDisk"),
            ("orcl1-pvc-u02".to_string(), "u02".to_string())
        );

        let names: std::collections::BTreeSet<_> = ["DataDisk", "LogDisk", "BackupDisk", "Extra"]
            .iter()
            .map(|d| claim_name_and_mount("orcl1", d).0)
            .collect();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_colliding_claims_are_rejected() {
        let disks = vec![DiskSpec::named("ScratchDisk"), DiskSpec::named("scratchdisk")];
        assert_matches!(
            ensure_distinct_claims("orcl1", &disks),
            Err(Error::DuplicateClaim { claim, first, second })
                if claim == "orcl1-pvc-scratchdisk" && first == "ScratchDisk" && second == "scratchdisk"
        );

        let inst = instance(InstanceSpec {
            disks: vec![DiskSpec::named("DataDisk"), DiskSpec::named("U02")],
            ..Default::default()
        });
        let params = BuildParameters::new(&inst, None, images());
        assert_matches!(
            resolve_disks(&params),
            Err(Error::DuplicateClaim { claim, first, second })
                if claim == "orcl1-pvc-u02" && first == "DataDisk" && second == "U02"
        );

        let distinct = vec![DiskSpec::named("DataDisk"), DiskSpec::named("ScratchDisk")];
        assert!(ensure_distinct_claims("orcl1", &distinct).is_ok());
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(statefulset_claim_name("orcl1-pvc-u02", "orcl1-sts"), "orcl1-pvc-u02-orcl1-sts-0");
        assert_eq!(snapshot_name("bk-1", "u02"), "bk-1-u02");
    }

    #[test]
    fn test_resolve_disks() {
        let inst = instance(InstanceSpec {
            disks: vec![
                DiskSpec {
                    name: "LogDisk".into(),
                    size: None,
                    storage_class: Some("premium".into()),
                },
                DiskSpec::named("DataDisk"),
            ],
            ..Default::default()
        });
        let params = BuildParameters::new(&inst, None, images());
        let disks = resolve_disks(&params).unwrap();

        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].name, "LogDisk");
        assert_eq!(disks[0].storage_class, "premium");
        assert_eq!(disks[0].mount_path, "/u03");
        assert_eq!(disks[1].claim_name, "orcl1-pvc-u02");
        assert_eq!(disks[1].storage_class, "csi-gce-pd");
        assert_eq!(disks[1].capacity, Quantity("100Gi".into()));
    }

    #[test]
    fn test_resolve_disks_names_failing_disk() {
        let inst = instance(InstanceSpec {
            disks: vec![DiskSpec::named("DataDisk")],
            ..Default::default()
        });
        let cfg = config("Azure");
        let params = BuildParameters::new(&inst, Some(&cfg), images());
        assert_matches!(
            resolve_disks(&params),
            Err(Error::UnresolvedStorageClass { disk, .. }) if disk == "DataDisk"
        );
    }
}
