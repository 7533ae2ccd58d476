//! Agent Deployment Builder
//!
//! The config agent, and the monitoring agent when enabled, run in a
//! single-replica Deployment pinned to the node of the database pod.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Affinity, Container, ContainerPort, PodAffinity, PodAffinityTerm, PodSecurityContext,
    PodSpec, PodTemplateSpec, SecurityContext,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::consts::*;
use super::owner::set_controller_reference;
use super::platform::effective_platform;
use super::workload::image_pull_policy;
use crate::crd::{Config, Instance};
use crate::domain::ports::{ImageSet, ServiceKind};
use crate::error::Result;

/// Inputs of the agent Deployment
#[derive(Debug, Clone)]
pub struct AgentDeploymentParams<'a> {
    pub instance: &'a Instance,
    pub config: Option<&'a Config>,
    pub images: ImageSet,
    pub name: String,
    /// Enabled service identifiers, as listed on the instance
    pub services: Vec<String>,
    pub privilege_escalation: bool,
    /// Extra arguments per agent name
    pub args: BTreeMap<String, Vec<String>>,
}

impl<'a> AgentDeploymentParams<'a> {
    pub fn new(instance: &'a Instance, config: Option<&'a Config>, images: ImageSet) -> Self {
        let images = match config.and_then(|c| c.spec.images.as_ref()) {
            Some(defaults) => images.with_defaults(defaults),
            None => images,
        };

        Self {
            instance,
            config,
            images,
            name: agent_deployment_name(instance.name()),
            services: instance.enabled_services(),
            privilege_escalation: false,
            args: log_level_args(config),
        }
    }

    pub fn with_privilege_escalation(mut self, allow: bool) -> Self {
        self.privilege_escalation = allow;
        self
    }
}

/// `--v=LEVEL` arguments for every agent with a configured log level
pub fn log_level_args(config: Option<&Config>) -> BTreeMap<String, Vec<String>> {
    let Some(config) = config else {
        return BTreeMap::new();
    };

    LOG_LEVEL_AGENTS
        .iter()
        .filter_map(|agent| {
            config
                .spec
                .log_level
                .get(*agent)
                .filter(|level| !level.is_empty())
                .map(|level| (agent.to_string(), vec![format!("--v={}", level)]))
        })
        .collect()
}

fn agent_port(name: &str, number: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        protocol: Some("TCP".to_string()),
        container_port: number,
        ..Default::default()
    }
}

/// Agent Deployment for an instance.
///
/// Fails when the configured platform is unknown or the instance cannot
/// own the Deployment.
pub fn build_agent_deployment(params: &AgentDeploymentParams<'_>) -> Result<Deployment> {
    let platform = effective_platform(params.config)?;
    let pull_policy = image_pull_policy(platform).to_string();
    let instance_name = params.instance.name();
    let dbdaemon_svc = dbdaemon_svc_name(instance_name);
    let security_context = SecurityContext {
        allow_privilege_escalation: Some(params.privilege_escalation),
        ..Default::default()
    };

    let mut config_args = vec![
        format!("--port={}", CONFIG_AGENT_PORT),
        format!("--dbservice={}", dbdaemon_svc),
        format!("--dbport={}", DB_DAEMON_PORT),
    ];
    if let Some(extra) = params.args.get(CONFIG_AGENT_NAME) {
        config_args.extend(extra.iter().cloned());
    }

    let mut containers = vec![Container {
        name: CONFIG_AGENT_NAME.to_string(),
        image: Some(params.images.config.clone()),
        command: Some(vec!["/configagent".to_string()]),
        args: Some(config_args),
        ports: Some(vec![agent_port("ca-port", CONFIG_AGENT_PORT)]),
        security_context: Some(security_context.clone()),
        image_pull_policy: Some(pull_policy.clone()),
        ..Default::default()
    }];

    for service in &params.services {
        match ServiceKind::parse(service) {
            Some(ServiceKind::Monitoring) => containers.push(Container {
                name: MONITORING_AGENT_NAME.to_string(),
                image: Some(params.images.monitoring.clone()),
                command: Some(vec!["/monitoring_agent".to_string()]),
                args: Some(vec![
                    format!("--dbservice={}", dbdaemon_svc),
                    format!("--dbport={}", DB_DAEMON_PORT),
                ]),
                ports: Some(vec![agent_port("oe-port", MONITORING_AGENT_PORT)]),
                security_context: Some(security_context.clone()),
                image_pull_policy: Some(pull_policy.clone()),
                ..Default::default()
            }),
            Some(kind) => debug!("service {} has no agent container", kind),
            None => warn!("unsupported service {:?} requested, skipping", service),
        }
    }

    let labels = BTreeMap::from([
        ("instance-agent".to_string(), agent_label(instance_name)),
        ("deployment".to_string(), params.name.clone()),
    ]);
    let namespace = params.instance.metadata.namespace.clone();
    info!("building agent deployment {} with {} containers", params.name, containers.len());

    let pod_spec = PodSpec {
        security_context: Some(PodSecurityContext::default()),
        containers,
        affinity: Some(Affinity {
            pod_affinity: Some(PodAffinity {
                required_during_scheduling_ignored_during_execution: Some(vec![PodAffinityTerm {
                    label_selector: Some(LabelSelector {
                        match_labels: Some(BTreeMap::from([(
                            "instance".to_string(),
                            instance_name.to_string(),
                        )])),
                        ..Default::default()
                    }),
                    namespaces: namespace.clone().map(|ns| vec![ns]),
                    topology_key: HOSTNAME_TOPOLOGY_KEY.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    let mut deployment = Deployment {
        metadata: ObjectMeta {
            name: Some(params.name.clone()),
            namespace: namespace.clone(),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    namespace,
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            ..Default::default()
        }),
        status: None,
    };

    set_controller_reference(params.instance, &mut deployment)?;
    Ok(deployment)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::crd::{ConfigSpec, InstanceSpec};
    use assert_matches::assert_matches;
    use kube::ResourceExt;

    fn containers(d: &Deployment) -> &[Container] {
        &d.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers
    }

    #[test]
    fn test_config_agent_only() {
        let inst = instance(InstanceSpec::default());
        let params = AgentDeploymentParams::new(&inst, None, images());
        let d = build_agent_deployment(&params).unwrap();

        assert_eq!(d.name_any(), "orcl1-agent-deployment");
        let c = containers(&d);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].name, "config-agent");
        assert_eq!(
            c[0].args.as_ref().unwrap(),
            &vec![
                "--port=3202".to_string(),
                "--dbservice=orcl1-dbdaemon-svc".to_string(),
                "--dbport=3203".to_string(),
            ]
        );
        assert_eq!(c[0].image_pull_policy.as_deref(), Some("Always"));

        let spec = d.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(1));
        let labels = spec.selector.match_labels.as_ref().unwrap();
        assert_eq!(labels["instance-agent"], "orcl1-agent");
        assert_eq!(labels["deployment"], "orcl1-agent-deployment");
        assert_eq!(d.owner_references()[0].name, "orcl1");
    }

    #[test]
    fn test_monitoring_and_unknown_services() {
        let inst = instance(InstanceSpec::default());
        let mut params = AgentDeploymentParams::new(&inst, None, images());
        params.services = vec![
            "Monitoring".into(),
            "Backup".into(),
            "HA".into(),
        ];
        let d = build_agent_deployment(&params).unwrap();

        let names: Vec<_> = containers(&d).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["config-agent", "oracle-monitoring"]);
        let monitoring = &containers(&d)[1];
        assert_eq!(monitoring.ports.as_ref().unwrap()[0].container_port, MONITORING_AGENT_PORT);
        assert_eq!(monitoring.image.as_deref(), Some("gcr.io/db/monitoring:latest"));
    }

    #[test]
    fn test_services_from_instance() {
        let inst = instance(InstanceSpec {
            services: BTreeMap::from([
                ("Monitoring".to_string(), true),
                ("Logging".to_string(), false),
            ]),
            ..Default::default()
        });
        let params = AgentDeploymentParams::new(&inst, None, images());
        assert_eq!(params.services, vec!["Monitoring".to_string()]);
        assert_eq!(containers(&build_agent_deployment(&params).unwrap()).len(), 2);
    }

    #[test]
    fn test_pod_affinity() {
        let inst = instance(InstanceSpec::default());
        let d = build_agent_deployment(&AgentDeploymentParams::new(&inst, None, images())).unwrap();
        let terms = d
            .spec
            .and_then(|s| s.template.spec)
            .and_then(|s| s.affinity)
            .and_then(|a| a.pod_affinity)
            .and_then(|a| a.required_during_scheduling_ignored_during_execution)
            .unwrap();
        let term = &terms[0];
        assert_eq!(term.topology_key, HOSTNAME_TOPOLOGY_KEY);
        assert_eq!(term.namespaces, Some(vec!["db".to_string()]));
        assert_eq!(
            term.label_selector.as_ref().unwrap().match_labels.as_ref().unwrap()["instance"],
            "orcl1"
        );
    }

    #[test]
    fn test_log_level_args() {
        assert!(log_level_args(None).is_empty());

        let cfg = Config::new(
            "config",
            ConfigSpec {
                log_level: BTreeMap::from([
                    ("config-agent".to_string(), "5".to_string()),
                    ("operator".to_string(), String::new()),
                    ("dbdaemon".to_string(), "2".to_string()),
                ]),
                ..Default::default()
            },
        );
        let args = log_level_args(Some(&cfg));
        assert_eq!(args.len(), 1);
        assert_eq!(args["config-agent"], vec!["--v=5".to_string()]);

        let inst = instance(InstanceSpec::default());
        let params = AgentDeploymentParams::new(&inst, Some(&cfg), images());
        let d = build_agent_deployment(&params).unwrap();
        assert_eq!(containers(&d)[0].args.as_ref().unwrap().last().unwrap(), "--v=5");
    }

    #[test]
    fn test_kind_pull_policy_and_escalation() {
        let inst = instance(InstanceSpec::default());
        let cfg = config("Kind");
        let params =
            AgentDeploymentParams::new(&inst, Some(&cfg), images()).with_privilege_escalation(true);
        let d = build_agent_deployment(&params).unwrap();
        let c = &containers(&d)[0];
        assert_eq!(c.image_pull_policy.as_deref(), Some("IfNotPresent"));
        assert_eq!(
            c.security_context.as_ref().unwrap().allow_privilege_escalation,
            Some(true)
        );
    }

    #[test]
    fn test_unknown_platform_fails() {
        let inst = instance(InstanceSpec::default());
        let cfg = config("Azure");
        assert_matches!(
            build_agent_deployment(&AgentDeploymentParams::new(&inst, Some(&cfg), images())),
            Err(crate::error::Error::UnsupportedPlatform { .. })
        );
    }
}
