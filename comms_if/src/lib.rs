//! # Communications interface crate.
//!
//! Provides the telecommand definitions and networking used between the dome
//! executable and whatever drives it (an observatory control system, a
//! ground tool or a script).

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands accepted by the dome executable
pub mod tc;

/// Network module
pub mod net;
