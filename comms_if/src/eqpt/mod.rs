//! # Equipment Interface
//!
//! This module defines the interface structures which are exchanged with equipment, such as the
//! drones being commanded by the ground station.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod drone;
