//! Error types for the resource synthesis engine
//!
//! Provides structured error types for configuration resolution, ownership
//! linkage, and the config agent status-check collaborator.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Configuration Resolution Errors
    // =========================================================================
    #[error("Unsupported deployment platform {platform:?} (supported: GCP, BareMetal, Minikube, Kind)")]
    UnsupportedPlatform { platform: String },

    #[error("Unknown attribute requested {attribute:?} (supported: StorageClass, VolumeSnapshotClass)")]
    UnsupportedAttribute { attribute: String },

    #[error("No layer supplied a value for attribute {attribute} on platform {platform}")]
    UnresolvedAttribute { attribute: String, platform: String },

    #[error("Failed to identify a storageClassName for disk {disk:?}: {reason}")]
    UnresolvedStorageClass { disk: String, reason: String },

    #[error("Disks {first:?} and {second:?} both map to claim {claim}")]
    DuplicateClaim {
        claim: String,
        first: String,
        second: String,
    },

    // =========================================================================
    // Ownership Errors
    // =========================================================================
    #[error("Cannot set {owner_kind}/{owner_name} as owner of {kind}/{name}: {reason}")]
    OwnerReference {
        owner_kind: String,
        owner_name: String,
        kind: String,
        name: String,
        reason: String,
    },

    // =========================================================================
    // Status Check Errors
    // =========================================================================
    #[error("Status check against {address} failed: {reason}")]
    StatusCheck { address: String, reason: String },

    #[error("Status check against {address} timed out after {timeout:?}")]
    StatusCheckTimeout { address: String, timeout: Duration },

    #[error("Config agent connection error: {0}")]
    Http(#[from] reqwest::Error),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Action the reconciler should take when a build or status check fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Collaborator errors - the agent may still be starting
            Error::StatusCheck { .. } | Error::Http(_) => {
                ErrorAction::RequeueWithBackoff
            }

            Error::StatusCheckTimeout { .. } => {
                ErrorAction::RequeueAfter(Duration::from_secs(30))
            }

            // Resolution and ownership errors only clear when the inputs change
            Error::Configuration(_)
            | Error::UnsupportedPlatform { .. }
            | Error::UnsupportedAttribute { .. }
            | Error::UnresolvedAttribute { .. }
            | Error::UnresolvedStorageClass { .. }
            | Error::DuplicateClaim { .. }
            | Error::OwnerReference { .. }
            | Error::YamlParse(_) => ErrorAction::NoRequeue,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::StatusCheck { .. }
                | Error::StatusCheckTimeout { .. }
                | Error::Http(_)
        )
    }
}

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_actions() {
        let err = Error::StatusCheckTimeout {
            address: "10.0.0.1".into(),
            timeout: Duration::from_secs(180),
        };
        assert_eq!(
            err.action(),
            ErrorAction::RequeueAfter(Duration::from_secs(30))
        );

        let err = Error::UnsupportedPlatform {
            platform: "Azure".into(),
        };
        assert_eq!(err.action(), ErrorAction::NoRequeue);

        let err = Error::UnresolvedStorageClass {
            disk: "DataDisk".into(),
            reason: "no platform default".into(),
        };
        assert_eq!(err.action(), ErrorAction::NoRequeue);
    }

    #[test]
    fn test_error_retryable() {
        let transient = Error::StatusCheck {
            address: "10.0.0.1".into(),
            reason: "connection refused".into(),
        };
        assert!(transient.is_retryable());
        assert!(transient.is_transient());

        let config_err = Error::UnsupportedAttribute {
            attribute: "Replicas".into(),
        };
        assert!(!config_err.is_retryable());
        assert!(!config_err.is_transient());
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = Error::UnsupportedPlatform {
            platform: "unknown-platform".into(),
        };
        assert!(err.to_string().contains("unknown-platform"));

        let err = Error::UnresolvedStorageClass {
            disk: "LogDisk".into(),
            reason: "x".into(),
        };
        assert!(err.to_string().contains("LogDisk"));

        let err = Error::DuplicateClaim {
            claim: "orcl1-pvc-u02".into(),
            first: "DataDisk".into(),
            second: "U02".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DataDisk") && msg.contains("U02"));
    }

    #[test]
    fn test_input_errors_are_not_requeued() {
        let err = Error::Configuration("cannot read /nope.yaml".into());
        assert_eq!(err.action(), ErrorAction::NoRequeue);
        assert!(!err.is_transient());

        let yaml = serde_yaml::from_str::<u32>("[").unwrap_err();
        let err = Error::from(yaml);
        assert_matches::assert_matches!(err, Error::YamlParse(_));
        assert_eq!(err.action(), ErrorAction::NoRequeue);

        let err = Error::DuplicateClaim {
            claim: "orcl1-pvc-scratchdisk".into(),
            first: "ScratchDisk".into(),
            second: "scratchdisk".into(),
        };
        assert!(!err.is_retryable());
    }
}
