//! Network Resource Builder
//!
//! Three Services per instance: the client-facing database endpoint, the
//! cluster-internal control daemon endpoint, and the agent endpoint. The
//! agent Service selects the agent Deployment, not the database pod.

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use std::net::IpAddr;
use tracing::debug;

use super::consts::*;
use super::owner::set_controller_reference;
use crate::crd::Instance;
use crate::domain::ports::{Exposure, ServiceKind};
use crate::error::Result;

fn tcp_port(name: &str, port: i32, target: bool) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        protocol: Some("TCP".to_string()),
        port,
        target_port: target.then_some(IntOrString::Int(port)),
        ..Default::default()
    }
}

fn instance_selector(instance: &Instance) -> BTreeMap<String, String> {
    BTreeMap::from([("instance".to_string(), instance.name().to_string())])
}

/// Source ranges for a load-balanced endpoint: the instance's allow-list,
/// or open to all when it sets none.
pub fn effective_source_ranges(instance: &Instance) -> Vec<String> {
    if instance.spec.source_cidr_ranges.is_empty() {
        DEFAULT_SOURCE_CIDR_RANGES.iter().map(|s| s.to_string()).collect()
    } else {
        instance.spec.source_cidr_ranges.clone()
    }
}

/// Client-facing database Service.
///
/// `Exposure::Node` yields a NodePort Service named "{inst}-svc-node";
/// otherwise a LoadBalancer, internal when the instance asks for it.
pub fn build_db_service(instance: &Instance, exposure: Exposure) -> Result<Service> {
    let mut name = svc_name(instance.name());
    let mut annotations = None;
    let mut source_ranges = None;

    let service_type = match exposure {
        Exposure::Node => {
            name.push_str("-node");
            "NodePort"
        }
        Exposure::LoadBalancer => {
            if instance.wants_internal_load_balancer() {
                annotations = Some(BTreeMap::from([(
                    INTERNAL_LB_ANNOTATION.to_string(),
                    "Internal".to_string(),
                )]));
            }
            source_ranges = Some(effective_source_ranges(instance));
            "LoadBalancer"
        }
    };
    debug!("building {} service {}", service_type, name);

    let mut svc = Service {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: instance.metadata.namespace.clone(),
            annotations,
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(instance_selector(instance)),
            ports: Some(vec![
                tcp_port("secure-listener", SECURE_LISTENER_PORT, true),
                tcp_port("ssl-listener", SSL_LISTENER_PORT, true),
            ]),
            type_: Some(service_type.to_string()),
            load_balancer_source_ranges: source_ranges,
            ..Default::default()
        }),
        status: None,
    };

    set_controller_reference(instance, &mut svc)?;
    Ok(svc)
}

/// Cluster-internal Service in front of the control daemon.
pub fn build_dbdaemon_service(instance: &Instance) -> Result<Service> {
    let mut svc = Service {
        metadata: ObjectMeta {
            name: Some(dbdaemon_svc_name(instance.name())),
            namespace: instance.metadata.namespace.clone(),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(instance_selector(instance)),
            ports: Some(vec![tcp_port("dbdaemon", DB_DAEMON_PORT, true)]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        status: None,
    };

    set_controller_reference(instance, &mut svc)?;
    Ok(svc)
}

/// Cluster-internal Service in front of the agent Deployment.
///
/// Always exposes the config agent; the monitoring port only when
/// monitoring is enabled.
pub fn build_agent_service(instance: &Instance) -> Result<Service> {
    let mut ports = vec![tcp_port(CONFIG_AGENT_NAME, CONFIG_AGENT_PORT, true)];
    if instance.service_enabled(ServiceKind::Monitoring) {
        ports.push(tcp_port(MONITORING_AGENT_NAME, MONITORING_AGENT_PORT, false));
    }

    let mut svc = Service {
        metadata: ObjectMeta {
            name: Some(agent_svc_name(instance.name())),
            namespace: instance.metadata.namespace.clone(),
            labels: Some(BTreeMap::from([(
                "app".to_string(),
                "agent-svc".to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(BTreeMap::from([(
                "instance-agent".to_string(),
                agent_label(instance.name()),
            )])),
            ports: Some(ports),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        status: None,
    };

    set_controller_reference(instance, &mut svc)?;
    Ok(svc)
}

// =============================================================================
// Address Extraction
// =============================================================================

/// Connectable "host:port" of a load-balanced Service.
///
/// Empty until the load balancer has published an ingress; prefers the
/// hostname over the IP.
pub fn service_url(svc: &Service, port: i32) -> String {
    let ingress = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|ingress| ingress.first());

    let Some(ingress) = ingress else {
        return String::new();
    };

    let host = ingress
        .hostname
        .as_deref()
        .filter(|h| !h.is_empty())
        .or(ingress.ip.as_deref())
        .unwrap_or_default();

    join_host_port(host, port)
}

fn join_host_port(host: &str, port: i32) -> String {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{}]:{}", host, port),
        _ => format!("{}:{}", host, port),
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::crd::{DbNetworkServiceOptions, GcpNetworkOptions, InstanceSpec, LoadBalancerType};
    use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, ServiceStatus};
    use kube::ResourceExt;

    fn port_numbers(svc: &Service) -> Vec<i32> {
        svc.spec
            .as_ref()
            .unwrap()
            .ports
            .as_ref()
            .unwrap()
            .iter()
            .map(|p| p.port)
            .collect()
    }

    #[test]
    fn test_db_service_load_balancer() {
        let inst = instance(InstanceSpec::default());
        let svc = build_db_service(&inst, Exposure::LoadBalancer).unwrap();
        let spec = svc.spec.as_ref().unwrap();

        assert_eq!(svc.name_any(), "orcl1-svc");
        assert_eq!(svc.namespace().as_deref(), Some("db"));
        assert_eq!(spec.type_.as_deref(), Some("LoadBalancer"));
        assert_eq!(port_numbers(&svc), vec![SECURE_LISTENER_PORT, SSL_LISTENER_PORT]);
        assert_eq!(spec.selector.as_ref().unwrap()["instance"], "orcl1");
        assert_eq!(
            spec.load_balancer_source_ranges.as_deref(),
            Some(&["0.0.0.0/0".to_string()][..])
        );
        assert!(svc.metadata.annotations.is_none());
        assert_eq!(svc.owner_references()[0].name, "orcl1");
    }

    #[test]
    fn test_db_service_node_port() {
        let inst = instance(InstanceSpec::default());
        let svc = build_db_service(&inst, Exposure::Node).unwrap();
        assert_eq!(svc.name_any(), "orcl1-svc-node");
        assert_eq!(svc.spec.as_ref().unwrap().type_.as_deref(), Some("NodePort"));
        assert!(svc.spec.as_ref().unwrap().load_balancer_source_ranges.is_none());
    }

    #[test]
    fn test_db_service_internal_load_balancer() {
        let inst = instance(InstanceSpec {
            db_network_service_options: Some(DbNetworkServiceOptions {
                gcp: GcpNetworkOptions {
                    load_balancer_type: Some(LoadBalancerType::Internal),
                },
            }),
            source_cidr_ranges: vec!["10.0.0.0/8".into()],
            ..Default::default()
        });
        let svc = build_db_service(&inst, Exposure::LoadBalancer).unwrap();
        assert_eq!(svc.annotations()[INTERNAL_LB_ANNOTATION], "Internal");
        assert_eq!(
            svc.spec.unwrap().load_balancer_source_ranges,
            Some(vec!["10.0.0.0/8".to_string()])
        );

        // Node exposure never carries the internal LB marker
        let svc = build_db_service(&inst, Exposure::Node).unwrap();
        assert!(svc.metadata.annotations.is_none());
    }

    #[test]
    fn test_dbdaemon_service() {
        let inst = instance(InstanceSpec::default());
        let svc = build_dbdaemon_service(&inst).unwrap();
        assert_eq!(svc.name_any(), "orcl1-dbdaemon-svc");
        assert_eq!(svc.spec.as_ref().unwrap().type_.as_deref(), Some("ClusterIP"));
        assert_eq!(port_numbers(&svc), vec![DB_DAEMON_PORT]);
    }

    #[test]
    fn test_agent_service_ports() {
        let inst = instance(InstanceSpec::default());
        let svc = build_agent_service(&inst).unwrap();
        assert_eq!(svc.name_any(), "orcl1-agent-svc");
        assert_eq!(port_numbers(&svc), vec![CONFIG_AGENT_PORT]);
        assert_eq!(
            svc.spec.as_ref().unwrap().selector.as_ref().unwrap()["instance-agent"],
            "orcl1-agent"
        );

        let inst = instance(InstanceSpec {
            services: BTreeMap::from([("Monitoring".to_string(), true)]),
            ..Default::default()
        });
        let svc = build_agent_service(&inst).unwrap();
        assert_eq!(port_numbers(&svc), vec![CONFIG_AGENT_PORT, MONITORING_AGENT_PORT]);

        let inst = instance(InstanceSpec {
            services: BTreeMap::from([("Monitoring".to_string(), false)]),
            ..Default::default()
        });
        assert_eq!(port_numbers(&build_agent_service(&inst).unwrap()), vec![CONFIG_AGENT_PORT]);
    }

    #[test]
    fn test_unpersisted_owner_fails() {
        let mut inst = instance(InstanceSpec::default());
        inst.metadata.uid = None;
        assert!(build_dbdaemon_service(&inst).is_err());
    }

    fn with_ingress(ingress: Vec<LoadBalancerIngress>) -> Service {
        Service {
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: Some(ingress),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_service_url() {
        assert_eq!(service_url(&Service::default(), 6021), "");
        assert_eq!(service_url(&with_ingress(vec![]), 6021), "");

        let svc = with_ingress(vec![LoadBalancerIngress {
            ip: Some("34.1.2.3".into()),
            ..Default::default()
        }]);
        assert_eq!(service_url(&svc, 6021), "34.1.2.3:6021");

        let svc = with_ingress(vec![LoadBalancerIngress {
            hostname: Some("db.example.com".into()),
            ip: Some("34.1.2.3".into()),
            ..Default::default()
        }]);
        assert_eq!(service_url(&svc, 6021), "db.example.com:6021");

        let svc = with_ingress(vec![LoadBalancerIngress {
            ip: Some("fd00::1".into()),
            ..Default::default()
        }]);
        assert_eq!(service_url(&svc, 6021), "[fd00::1]:6021");
    }
}
