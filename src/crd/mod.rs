//! Custom Resource Definitions consumed and emitted by the engine
//!
//! - Instance: logical database instance (input)
//! - Config: optional cluster-wide override singleton (input)
//! - Backup: owner of backup snapshots (input)
//! - VolumeSnapshot: CSI snapshot record (output)

pub mod backup;
pub mod config;
pub mod instance;
pub mod volume_snapshot;

pub use backup::*;
pub use config::*;
pub use instance::*;
pub use volume_snapshot::*;
