//! Control Plane Module
//!
//! Entry points for an external reconciler: the synthesizer that runs all
//! builders for an instance, and the status client of the config agent.

pub mod status;
pub mod synthesizer;

pub use status::*;
pub use synthesizer::*;
