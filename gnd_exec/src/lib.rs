//! # Ground station library.
//!
//! This library allows other crates in the workspace, and the benches, to access items defined
//! inside the ground station crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Compute loop - repeatedly solves the model in its own thread and publishes the trajectories
pub mod compute;

/// Data store - state owned by the exec thread between cycles
pub mod data_store;

/// Geometry - constraint shapes, their regions and frame conversions
pub mod geom;

/// Layouts - text files describing a set of constraints
pub mod layout;

/// Constraint model - the shared store of constraints, drones and trajectories
pub mod model;

/// Parameter builder - turns a model snapshot into a fixed size solver input
pub mod param_builder;

/// Executable parameters
pub mod params;

/// Solver interface and the built in solver
pub mod solver;

/// Telemetry ingestion - moves entities bound to telemetry ports
pub mod telem;

/// Trajectory manager - staging, execution and playback of trajectories
pub mod traj_mgr;
