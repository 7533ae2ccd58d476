//! Ports, identities, and naming templates shared with the agents

/// Database listener ports
pub const SECURE_LISTENER_PORT: i32 = 6021;
pub const SSL_LISTENER_PORT: i32 = 5522;

/// Control daemon port inside the database pod
pub const DB_DAEMON_PORT: i32 = 3203;

/// Agent ports
pub const CONFIG_AGENT_PORT: i32 = 3202;
pub const MONITORING_AGENT_PORT: i32 = 9161;

pub const CONFIG_AGENT_NAME: &str = "config-agent";
pub const MONITORING_AGENT_NAME: &str = "oracle-monitoring";
pub const OPERATOR_NAME: &str = "operator";

/// Agents that accept a `--v` log level argument
pub const LOG_LEVEL_AGENTS: [&str; 2] = [CONFIG_AGENT_NAME, OPERATOR_NAME];

/// Default OS identity of the database processes
pub const DEFAULT_UID: i64 = 54321;
pub const DEFAULT_GID: i64 = 54322;

/// Memory request floor for the database container
pub const SAFE_MIN_MEMORY_FOR_DB_CONTAINER: &str = "4.0Gi";

/// Capacity used for disks missing from the default disk table
pub const DEFAULT_DISK_SIZE: &str = "100Gi";

/// Source ranges used when the instance does not restrict them
pub const DEFAULT_SOURCE_CIDR_RANGES: [&str; 1] = ["0.0.0.0/0"];

/// Directory the agent payloads are staged into
pub const SCRIPT_DIR: &str = "/agents";

/// `app` label of database pods, used for anti-affinity
pub const DATABASE_POD_APP_LABEL: &str = "databasepod";

pub const HOSTNAME_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

pub const INTERNAL_LB_ANNOTATION: &str = "cloud.google.com/load-balancer-type";

// =============================================================================
// Naming
// =============================================================================

pub fn svc_name(instance: &str) -> String {
    format!("{}-svc", instance)
}

pub fn dbdaemon_svc_name(instance: &str) -> String {
    format!("{}-dbdaemon-svc", instance)
}

pub fn agent_svc_name(instance: &str) -> String {
    format!("{}-agent-svc", instance)
}

pub fn sts_name(instance: &str) -> String {
    format!("{}-sts", instance)
}

pub fn config_map_name(instance: &str) -> String {
    format!("{}-cm", instance)
}

pub fn agent_deployment_name(instance: &str) -> String {
    format!("{}-agent-deployment", instance)
}

/// Label value pairing the agent pods with their Service
pub fn agent_label(instance: &str) -> String {
    format!("{}-agent", instance)
}
