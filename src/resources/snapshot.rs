//! Snapshot Resource Builder
//!
//! VolumeSnapshot records for a single claim, owned either by the Backup
//! that requested them or by the Instance itself.

use kube::Resource;
use std::collections::BTreeMap;
use tracing::info;

use super::consts::sts_name;
use super::disks::{
    claim_name_and_mount, ensure_distinct_claims, instance_disks, snapshot_name,
    statefulset_claim_name,
};
use super::owner::set_controller_reference;
use super::platform::resolve;
use crate::crd::{
    Backup, Config, Instance, VolumeSnapshot, VolumeSnapshotSource, VolumeSnapshotSpec,
};
use crate::domain::ports::Attribute;
use crate::error::Result;

fn build_snapshot<O>(owner: &O, pvc_name: &str, snap_name: &str, class: &str) -> Result<VolumeSnapshot>
where
    O: Resource<DynamicType = ()>,
{
    let mut snapshot = VolumeSnapshot::new(
        snap_name,
        VolumeSnapshotSpec {
            source: VolumeSnapshotSource {
                persistent_volume_claim_name: Some(pvc_name.to_string()),
                volume_snapshot_content_name: None,
            },
            volume_snapshot_class_name: Some(class.to_string()),
        },
    );
    snapshot.metadata.namespace = owner.meta().namespace.clone();
    snapshot.metadata.labels = Some(BTreeMap::from([(
        "snap".to_string(),
        snap_name.to_string(),
    )]));

    set_controller_reference(owner, &mut snapshot)?;
    Ok(snapshot)
}

/// Snapshot of `pvc_name` owned by a Backup
pub fn build_backup_snapshot(
    backup: &Backup,
    pvc_name: &str,
    snap_name: &str,
    class: &str,
) -> Result<VolumeSnapshot> {
    build_snapshot(backup, pvc_name, snap_name, class)
}

/// Snapshot of `pvc_name` owned by an Instance
pub fn build_instance_snapshot(
    instance: &Instance,
    pvc_name: &str,
    snap_name: &str,
    class: &str,
) -> Result<VolumeSnapshot> {
    build_snapshot(instance, pvc_name, snap_name, class)
}

/// One Backup-owned snapshot per disk of the instance.
///
/// Snapshots target the claims the StatefulSet materialised and are named
/// so a restore with the same backup id finds them.
pub fn build_backup_snapshots(
    backup: &Backup,
    instance: &Instance,
    config: Option<&Config>,
    backup_id: &str,
) -> Result<Vec<VolumeSnapshot>> {
    let class = resolve(
        Attribute::VolumeSnapshotClass,
        backup.spec.volume_snapshot_class.as_deref(),
        config,
    )?;
    let sts = sts_name(instance.name());
    let disks = instance_disks(instance);
    ensure_distinct_claims(instance.name(), &disks)?;
    info!("snapshotting instance {} with class {}", instance.name(), class);

    disks
        .iter()
        .map(|disk| {
            let (claim, mount) = claim_name_and_mount(instance.name(), &disk.name);
            build_backup_snapshot(
                backup,
                &statefulset_claim_name(&claim, &sts),
                &snapshot_name(backup_id, &mount),
                &class,
            )
        })
        .collect()
}
