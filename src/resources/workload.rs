//! Workload Template Builder
//!
//! Builds the database pod template and the single-replica StatefulSet that
//! wraps it, plus the ConfigMap the database container reads its
//! environment from.
//!
//! Pod layout:
//!
//! ```text
//! init:   dbinit ─► [prepare-pv-container]   (hostpath platforms only)
//! main:   oracledb │ dbdaemon │ alert-log-sidecar │ listener-log-sidecar
//! shared: var-tmp (/var/tmp), agent-repo (/agents), one mount per disk
//! ```

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Affinity, ConfigMap, ConfigMapEnvSource, Container, ContainerPort, EmptyDirVolumeSource,
    EnvFromSource, PersistentVolumeClaim, PodAffinityTerm, PodAntiAffinity, PodSecurityContext,
    PodSpec, PodTemplateSpec, ResourceRequirements, SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::consts::*;
use super::disks::{claim_name_and_mount, ensure_distinct_claims, DATA_DISK};
use super::owner::set_controller_reference;
use super::platform::effective_platform;
use super::BuildParameters;
use crate::crd::Instance;
use crate::domain::ports::Platform;
use crate::error::Result;

const VAR_TMP_VOLUME: &str = "var-tmp";
const AGENT_REPO_VOLUME: &str = "agent-repo";
const HOSTPATH_INIT_IMAGE: &str = "busybox:latest";

// =============================================================================
// ConfigMap
// =============================================================================

/// Filesystem layout of the database software for a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleLayout {
    pub base: String,
    pub inventory: String,
    pub home: String,
}

impl OracleLayout {
    pub fn for_version(version: &str) -> Self {
        if version == "18c" {
            // Express Edition images install under /opt
            Self {
                base: "/opt/oracle".to_string(),
                inventory: "/opt/oracle/oraInventory".to_string(),
                home: "/opt/oracle/product/18c/dbhomeXE".to_string(),
            }
        } else {
            Self {
                base: "/u01/app/oracle".to_string(),
                inventory: "/u01/app/oraInventory".to_string(),
                home: format!("/u01/app/oracle/product/{}/db", version),
            }
        }
    }
}

/// ConfigMap with the database container environment
pub fn build_config_map(instance: &Instance, name: &str) -> Result<ConfigMap> {
    let layout = OracleLayout::for_version(&instance.spec.version);
    let data = BTreeMap::from([
        ("SCRIPTS_DIR".to_string(), SCRIPT_DIR.to_string()),
        ("INSTALL_DIR".to_string(), "/stage".to_string()),
        (
            "HEALTHCHECK_DB_SCRIPT".to_string(),
            "health-check-db.sh".to_string(),
        ),
        (
            "LD_LIBRARY_PATH".to_string(),
            format!("export LD_LIBRARY_PATH={}/lib:/usr/lib\n", layout.home),
        ),
        ("ORACLE_BASE".to_string(), layout.base),
        ("ORACLE_INV".to_string(), layout.inventory),
        ("ORACLE_HOME".to_string(), layout.home),
    ]);

    let mut cm = ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: instance.metadata.namespace.clone(),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    };

    set_controller_reference(instance, &mut cm)?;
    Ok(cm)
}

// =============================================================================
// Pod Template
// =============================================================================

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn port(name: &str, number: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        protocol: Some("TCP".to_string()),
        container_port: number,
        ..Default::default()
    }
}

/// One mount per logical disk, named after its claim
pub fn disk_mounts(params: &BuildParameters<'_>) -> Vec<VolumeMount> {
    params
        .disks
        .iter()
        .map(|disk| {
            let (claim, mount_name) = claim_name_and_mount(params.instance_name(), &disk.name);
            mount(&claim, &format!("/{}", mount_name))
        })
        .collect()
}

fn shared_mounts() -> Vec<VolumeMount> {
    vec![
        mount(VAR_TMP_VOLUME, "/var/tmp"),
        mount(AGENT_REPO_VOLUME, SCRIPT_DIR),
    ]
}

/// Process identity of the database pod, defaulted when unset
pub fn process_identity(instance: &Instance) -> (i64, i64) {
    let uid = instance.spec.database_uid.unwrap_or_else(|| {
        info!("set pod user ID to default value {}", DEFAULT_UID);
        DEFAULT_UID
    });
    let gid = instance.spec.database_gid.unwrap_or_else(|| {
        info!("set pod group ID to default value {}", DEFAULT_GID);
        DEFAULT_GID
    });
    (uid, gid)
}

/// Image pull policy for a platform
pub fn image_pull_policy(platform: Platform) -> &'static str {
    if platform.uses_local_images() {
        "IfNotPresent"
    } else {
        "Always"
    }
}

/// Init container handing every disk mount to the database user.
///
/// The csi-hostpath driver used on Minikube and Kind mounts volumes
/// writable by root only.
fn hostpath_init_container(params: &BuildParameters<'_>, uid: i64, gid: i64) -> Container {
    let mounts = disk_mounts(params);
    let cmd = mounts
        .iter()
        .map(|m| format!("chown {}:{} {}", uid, gid, m.mount_path))
        .collect::<Vec<_>>()
        .join(" && ");
    info!("adding an init container for csi-hostpath volumes: {}", cmd);

    Container {
        name: "prepare-pv-container".to_string(),
        image: Some(HOSTPATH_INIT_IMAGE.to_string()),
        command: Some(vec!["sh".to_string(), "-c".to_string(), cmd]),
        security_context: Some(SecurityContext {
            run_as_user: Some(0),
            run_as_group: Some(0),
            run_as_non_root: Some(false),
            allow_privilege_escalation: Some(params.privilege_escalation),
            ..Default::default()
        }),
        volume_mounts: Some(mounts),
        ..Default::default()
    }
}

fn log_sidecar(
    params: &BuildParameters<'_>,
    name: &str,
    log_type: &str,
    pull_policy: &str,
    data_mount: Option<&VolumeMount>,
) -> Container {
    let mut mounts = shared_mounts();
    mounts.extend(data_mount.cloned());

    Container {
        name: name.to_string(),
        image: Some(params.images.logging_sidecar.clone()),
        command: Some(vec!["/logging_main".to_string()]),
        args: Some(vec![format!("--logType={}", log_type)]),
        security_context: Some(escalation(params)),
        volume_mounts: Some(mounts),
        image_pull_policy: Some(pull_policy.to_string()),
        ..Default::default()
    }
}

fn escalation(params: &BuildParameters<'_>) -> SecurityContext {
    SecurityContext {
        allow_privilege_escalation: Some(params.privilege_escalation),
        ..Default::default()
    }
}

/// Pod template of the database StatefulSet.
///
/// Fails when the configured platform is unknown or two disks share a
/// claim name.
pub fn build_pod_template(params: &BuildParameters<'_>) -> Result<PodTemplateSpec> {
    let platform = effective_platform(params.config)?;
    ensure_distinct_claims(params.instance_name(), &params.disks)?;
    let pull_policy = image_pull_policy(platform);
    let instance = params.instance;

    let labels = BTreeMap::from([
        ("instance".to_string(), params.instance_name().to_string()),
        ("statefulset".to_string(), params.sts_name.clone()),
        ("app".to_string(), DATABASE_POD_APP_LABEL.to_string()),
    ]);

    let min_memory = match instance.spec.min_memory_for_db_container.as_deref() {
        Some(m) if !m.is_empty() => {
            info!(
                "replacing memory request floor {} with {}",
                SAFE_MIN_MEMORY_FOR_DB_CONTAINER, m
            );
            m
        }
        _ => SAFE_MIN_MEMORY_FOR_DB_CONTAINER,
    };

    let pvc_mounts = disk_mounts(params);
    let data_mount = match params.disks.iter().position(|d| d.name == DATA_DISK) {
        Some(i) => Some(pvc_mounts[i].clone()),
        None => {
            warn!(
                "instance {} has no {}, log sidecars run without it",
                params.instance_name(),
                DATA_DISK
            );
            None
        }
    };

    let mut engine_mounts = shared_mounts();
    engine_mounts.extend(pvc_mounts);

    info!("creating pod template with service image {}", params.images.service);
    let containers = vec![
        Container {
            name: "oracledb".to_string(),
            image: Some(params.images.service.clone()),
            command: Some(vec![format!("{}/init_oracle.sh", SCRIPT_DIR)]),
            args: Some(vec![params.cdb_name.clone(), params.db_domain.clone()]),
            resources: Some(ResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "memory".to_string(),
                    Quantity(min_memory.to_string()),
                )])),
                ..Default::default()
            }),
            ports: Some(vec![
                port("secure-listener", SECURE_LISTENER_PORT),
                port("ssl-listener", SSL_LISTENER_PORT),
            ]),
            volume_mounts: Some(engine_mounts.clone()),
            security_context: Some(escalation(params)),
            env_from: Some(vec![EnvFromSource {
                config_map_ref: Some(ConfigMapEnvSource {
                    name: Some(params.config_map_name.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            image_pull_policy: Some(pull_policy.to_string()),
            ..Default::default()
        },
        Container {
            name: "dbdaemon".to_string(),
            image: Some(params.images.service.clone()),
            command: Some(vec![format!("{}/dbdaemon", SCRIPT_DIR)]),
            args: Some(vec![format!("--cdb_name={}", params.cdb_name)]),
            ports: Some(vec![port("dbdaemon", DB_DAEMON_PORT)]),
            volume_mounts: Some(engine_mounts),
            security_context: Some(escalation(params)),
            image_pull_policy: Some(pull_policy.to_string()),
            ..Default::default()
        },
        log_sidecar(params, "alert-log-sidecar", "ALERT", pull_policy, data_mount.as_ref()),
        log_sidecar(params, "listener-log-sidecar", "LISTENER", pull_policy, data_mount.as_ref()),
    ];

    let mut init_containers = vec![Container {
        name: "dbinit".to_string(),
        image: Some(params.images.dbinit.clone()),
        command: Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("cp -r agent_repo/. {dir}/ && chmod -R 750 {dir}/*", dir = SCRIPT_DIR),
        ]),
        security_context: Some(escalation(params)),
        volume_mounts: Some(vec![mount(AGENT_REPO_VOLUME, SCRIPT_DIR)]),
        image_pull_policy: Some(pull_policy.to_string()),
        ..Default::default()
    }];

    let (uid, gid) = process_identity(instance);
    if platform.is_hostpath() {
        init_containers.push(hostpath_init_container(params, uid, gid));
    }

    let volumes = [VAR_TMP_VOLUME, AGENT_REPO_VOLUME]
        .into_iter()
        .map(|name| Volume {
            name: name.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        })
        .collect();

    let anti_affinity_namespaces = params
        .config
        .map(|c| c.spec.host_anti_affinity_namespaces.clone())
        .filter(|ns| !ns.is_empty());

    let spec = PodSpec {
        security_context: Some(PodSecurityContext {
            run_as_user: Some(uid),
            run_as_group: Some(gid),
            fs_group: Some(gid),
            run_as_non_root: Some(true),
            ..Default::default()
        }),
        containers,
        init_containers: Some(init_containers),
        share_process_namespace: Some(true),
        volumes: Some(volumes),
        affinity: Some(Affinity {
            pod_anti_affinity: Some(PodAntiAffinity {
                required_during_scheduling_ignored_during_execution: Some(vec![PodAffinityTerm {
                    label_selector: Some(LabelSelector {
                        match_labels: Some(BTreeMap::from([(
                            "app".to_string(),
                            DATABASE_POD_APP_LABEL.to_string(),
                        )])),
                        ..Default::default()
                    }),
                    namespaces: anti_affinity_namespaces,
                    topology_key: HOSTNAME_TOPOLOGY_KEY.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels),
            namespace: params.namespace(),
            ..Default::default()
        }),
        spec: Some(spec),
    })
}

// =============================================================================
// StatefulSet
// =============================================================================

/// Single-replica StatefulSet running the pod template with the disk
/// claims as volume claim templates.
///
/// The claim templates carry the Instance controller reference and the
/// StatefulSet controller copies it onto the claims it creates. Deleting
/// the Instance therefore garbage-collects its data volumes; retaining
/// them means snapshotting first or orphaning the claims on delete.
pub fn build_statefulset(
    params: &BuildParameters<'_>,
    pvcs: Vec<PersistentVolumeClaim>,
    template: PodTemplateSpec,
) -> Result<StatefulSet> {
    let mut sts = StatefulSet {
        metadata: ObjectMeta {
            name: Some(params.sts_name.clone()),
            namespace: params.namespace(),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(BTreeMap::from([
                    ("instance".to_string(), params.instance_name().to_string()),
                    ("statefulset".to_string(), params.sts_name.clone()),
                ])),
                ..Default::default()
            },
            template,
            volume_claim_templates: Some(pvcs),
            ..Default::default()
        }),
        status: None,
    };

    set_controller_reference(params.instance, &mut sts)?;
    Ok(sts)
}
