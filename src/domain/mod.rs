//! Domain layer - Core vocabulary and port definitions
//!
//! This module defines the closed sets the builders match on and the
//! traits external collaborators implement.

pub mod ports;

pub use ports::*;
