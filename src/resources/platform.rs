//! Platform Default Table & Attribute Resolver
//!
//! Storage attributes resolve in three layers: an explicit per-request
//! value, then the global Config override, then the platform default.

use crate::crd::Config;
use crate::domain::ports::{Attribute, Platform};
use crate::error::{Error, Result};
use tracing::debug;

// =============================================================================
// Platform Default Table
// =============================================================================

/// Default storage backends of a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    pub storage_class: &'static str,
    pub volume_snapshot_class: &'static str,
}

impl PlatformProfile {
    /// Look up the defaults of a platform
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Gcp => PlatformProfile {
                storage_class: "csi-gce-pd",
                volume_snapshot_class: "csi-gce-pd-snapshot-class",
            },
            Platform::BareMetal => PlatformProfile {
                storage_class: "csi-trident",
                volume_snapshot_class: "csi-trident-snapshot-class",
            },
            Platform::Minikube | Platform::Kind => PlatformProfile {
                storage_class: "csi-hostpath-sc",
                volume_snapshot_class: "csi-hostpath-snapclass",
            },
        }
    }

    fn default_for(&self, attribute: Attribute) -> &'static str {
        match attribute {
            Attribute::StorageClass => self.storage_class,
            Attribute::VolumeSnapshotClass => self.volume_snapshot_class,
        }
    }
}

/// Platform named by the global config, or the default platform
pub fn effective_platform(config: Option<&Config>) -> Result<Platform> {
    match config.and_then(Config::platform) {
        Some(p) => Platform::parse(p),
        None => Ok(Platform::DEFAULT),
    }
}

// =============================================================================
// Attribute Resolver
// =============================================================================

/// Resolve a storage attribute by name.
///
/// A non-empty `explicit` value is returned as is. Otherwise the platform
/// is resolved first (unknown platforms fail), then the attribute name
/// (unknown attributes fail), then a Config override replaces the platform
/// default.
pub fn resolve_attribute(
    name: &str,
    explicit: Option<&str>,
    config: Option<&Config>,
) -> Result<String> {
    if let Some(value) = explicit.filter(|v| !v.is_empty()) {
        return Ok(value.to_string());
    }

    let platform = effective_platform(config)?;
    let attribute = Attribute::parse(name)?;
    resolve_for_platform(attribute, platform, config)
}

/// Typed variant of [`resolve_attribute`]
pub fn resolve(
    attribute: Attribute,
    explicit: Option<&str>,
    config: Option<&Config>,
) -> Result<String> {
    resolve_attribute(attribute.as_str(), explicit, config)
}

fn resolve_for_platform(
    attribute: Attribute,
    platform: Platform,
    config: Option<&Config>,
) -> Result<String> {
    resolve_with_profile(
        attribute,
        platform,
        &PlatformProfile::for_platform(platform),
        config,
    )
}

/// Config override, else the profile default. Fails when neither layer
/// supplies a non-empty value; the built-in table never does that, so
/// only a profile with an empty entry reaches the error.
fn resolve_with_profile(
    attribute: Attribute,
    platform: Platform,
    profile: &PlatformProfile,
    config: Option<&Config>,
) -> Result<String> {
    let override_value = config.and_then(|c| match attribute {
        Attribute::StorageClass => c.spec.storage_class.as_deref(),
        Attribute::VolumeSnapshotClass => c.spec.volume_snapshot_class.as_deref(),
    });

    let value = match override_value.filter(|v| !v.is_empty()) {
        Some(v) => {
            debug!("{} overridden by global config: {}", attribute, v);
            v
        }
        None => profile.default_for(attribute),
    };

    if value.is_empty() {
        return Err(Error::UnresolvedAttribute {
            attribute: attribute.to_string(),
            platform: platform.to_string(),
        });
    }
    Ok(value.to_string())
}
