//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the ground station software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Operator telecommands
pub mod tc;

/// Packet definitions for equipment (like drones)
pub mod eqpt;
