//! Storage Resource Builder
//!
//! One PersistentVolumeClaim per logical disk, either freshly provisioned by
//! the storage class or restored from the snapshot a backup took of the
//! same mount.

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, TypedLocalObjectReference,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tracing::info;

use super::disks::{resolve_disks, snapshot_name, ResolvedDisk};
use super::owner::set_controller_reference;
use super::BuildParameters;
use crate::crd::SNAPSHOT_API_GROUP;
use crate::error::Result;

/// Claims for every disk of the instance, in disk order.
pub fn build_pvcs(params: &BuildParameters<'_>) -> Result<Vec<PersistentVolumeClaim>> {
    resolve_disks(params)?
        .iter()
        .map(|disk| build_pvc(params, disk))
        .collect()
}

fn build_pvc(params: &BuildParameters<'_>, disk: &ResolvedDisk) -> Result<PersistentVolumeClaim> {
    let data_source = match params.restore_backup_id() {
        Some(backup_id) => {
            info!("starting a restore process for disk mount {}", disk.mount_name);
            Some(TypedLocalObjectReference {
                api_group: Some(SNAPSHOT_API_GROUP.to_string()),
                kind: "VolumeSnapshot".to_string(),
                name: snapshot_name(backup_id, &disk.mount_name),
            })
        }
        None => {
            info!("starting a provisioning process for disk mount {}", disk.mount_name);
            None
        }
    };

    let mut pvc = PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(disk.claim_name.clone()),
            namespace: params.namespace(),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    disk.capacity.clone(),
                )])),
                ..Default::default()
            }),
            storage_class_name: Some(disk.storage_class.clone()),
            data_source,
            ..Default::default()
        }),
        status: None,
    };

    set_controller_reference(params.instance, &mut pvc)?;
    Ok(pvc)
}
