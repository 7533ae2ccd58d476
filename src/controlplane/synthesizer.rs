//! Instance Synthesizer
//!
//! Runs every builder for one instance and collects the manifests in the
//! order they are usually applied: Services, ConfigMap, StatefulSet (with
//! its claim templates), agent Deployment.

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::crd::{Config, Instance, RestoreSpec};
use crate::domain::ports::{Exposure, ImageSet};
use crate::error::{Error, Result};
use crate::resources::{
    build_agent_deployment, build_agent_service, build_config_map, build_db_service,
    build_dbdaemon_service, build_pod_template, build_pvcs, build_statefulset,
    AgentDeploymentParams, BuildParameters,
};

// =============================================================================
// Synthesizer Settings
// =============================================================================

/// Per-run settings the Instance itself does not carry
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    pub images: ImageSet,
    pub exposure: Exposure,
    /// Overrides the restore request of the instance when set
    pub restore: Option<RestoreSpec>,
    pub privilege_escalation: bool,
}

/// Every manifest generated for one instance
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceResources {
    pub db_service: Service,
    pub dbdaemon_service: Service,
    pub agent_service: Service,
    pub config_map: ConfigMap,
    /// Claims also embedded as the StatefulSet's claim templates
    pub pvcs: Vec<PersistentVolumeClaim>,
    pub statefulset: StatefulSet,
    pub agent_deployment: Deployment,
}

impl Synthesizer {
    pub fn new(images: ImageSet) -> Self {
        Self {
            images,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_exposure(mut self, exposure: Exposure) -> Self {
        self.exposure = exposure;
        self
    }

    #[must_use]
    pub fn with_restore(mut self, restore: Option<RestoreSpec>) -> Self {
        self.restore = restore;
        self
    }

    #[must_use]
    pub fn with_privilege_escalation(mut self, allow: bool) -> Self {
        self.privilege_escalation = allow;
        self
    }

    /// Build all manifests; the first builder failure aborts the run.
    pub fn synthesize(&self, instance: &Instance, config: Option<&Config>) -> Result<InstanceResources> {
        info!(
            "synthesizing resources for instance {} (version {:?})",
            instance.name(),
            instance.spec.version
        );

        let mut params = BuildParameters::new(instance, config, self.images.clone())
            .with_privilege_escalation(self.privilege_escalation);
        if self.restore.is_some() {
            params = params.with_restore(self.restore.clone());
        }

        let pvcs = build_pvcs(&params)?;
        let template = build_pod_template(&params)?;
        let statefulset = build_statefulset(&params, pvcs.clone(), template)?;

        let agent_params = AgentDeploymentParams::new(instance, config, self.images.clone())
            .with_privilege_escalation(self.privilege_escalation);

        let resources = InstanceResources {
            db_service: build_db_service(instance, self.exposure)?,
            dbdaemon_service: build_dbdaemon_service(instance)?,
            agent_service: build_agent_service(instance)?,
            config_map: build_config_map(instance, &params.config_map_name)?,
            pvcs,
            statefulset,
            agent_deployment: build_agent_deployment(&agent_params)?,
        };
        debug!("synthesized {} claims for {}", resources.pvcs.len(), instance.name());
        Ok(resources)
    }
}

impl InstanceResources {
    /// Multi-document YAML of every top-level object, in apply order.
    ///
    /// Claims are left out: the StatefulSet creates them from its templates.
    pub fn to_yaml_stream(&self) -> Result<String> {
        let docs = [
            to_yaml(&self.db_service)?,
            to_yaml(&self.dbdaemon_service)?,
            to_yaml(&self.agent_service)?,
            to_yaml(&self.config_map)?,
            to_yaml(&self.statefulset)?,
            to_yaml(&self.agent_deployment)?,
        ];
        Ok(docs
            .iter()
            .map(|doc| format!("---\n{}", doc))
            .collect::<String>())
    }
}

fn to_yaml<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

// =============================================================================
// Manifest Loading
// =============================================================================

/// Read a YAML manifest from disk
pub fn load_manifest<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(serde_yaml::from_str(&raw)?)
}
