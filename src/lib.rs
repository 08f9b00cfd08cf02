//! # Drone Swarm Virtual Forces
//!
//! Decentralized leader-follower coordination for a swarm of aerial agents.
//! Every agent periodically broadcasts its position and role, listens for its
//! peers, and steers under a virtual attraction/repulsion force toward an
//! equilibrium around the leader.
//!
//! ## Features
//! - Per-agent state machine driven by a single-threaded event queue
//! - Spring-like attraction to leaders, inverse-distance repulsion between followers
//! - Explicit Euler integration with adaptive velocity dampening
//! - Fixed 25-byte broadcast payload
//! - Scheduled role compromise to test robustness against a rogue leader
//! - Seeded, reproducible placement and link loss
//!
//! ## Example
//! ```
//! use drone_swarm_forces::{RecordingSink, Simulation, SimulationConfig};
//!
//! let config = SimulationConfig {
//!     follower_count: 3,
//!     duration_secs: 2.0,
//!     ..Default::default()
//! };
//! let mut sim = Simulation::new(config, RecordingSink::new()).unwrap();
//! let summary = sim.run().unwrap();
//! assert_eq!(summary.agents.len(), 4);
//! ```

#![forbid(unsafe_code)]
#![allow(missing_docs)]
// Standard clippy allows
#![allow(clippy::manual_range_contains)]
#![allow(clippy::needless_range_loop)]
// Pedantic clippy allows (style preferences, not bugs)
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::wildcard_imports)] // Used for internal module re-exports
#![allow(clippy::cast_possible_truncation)] // Checked at runtime where needed
#![allow(clippy::module_name_repetitions)]

/// Per-vehicle state machine: broadcast, receive, compute, compromise
pub mod agent;
/// Run configuration and per-agent parameters
pub mod config;
/// Force model and motion integrator
pub mod control;
/// Formation quality score over a position track
pub mod metrics;
/// Waypoint-driven position model
pub mod mobility;
/// Seeded initial placement inside a sphere
pub mod placement;
/// Deterministic random number generation
pub mod rng;
/// Role compromise injection
pub mod safety;
/// Virtual clock and event queue
pub mod scheduler;
/// Discrete-event driver for a whole swarm
pub mod simulation;
/// Per-agent table of last known peer states
pub mod swarm_table;
/// Colour and position telemetry sinks
pub mod telemetry;
/// Datagram transport and the simulated network
pub mod transport;
/// Core types, wire payload and errors
pub mod types;
/// 3D vector arithmetic
pub mod vector;

pub use agent::{Agent, AgentContext, AgentEvent, AgentStatus};
pub use config::{AgentConfig, CompromiseConfig, SimulationConfig};
pub use control::{compute_forces, Forces, MotionIntegrator, MotionStep};
pub use metrics::{formation_error, FormationScore};
pub use scheduler::{EventId, EventQueue, Scheduler, SimTime};
pub use simulation::{RunSummary, Simulation};
pub use telemetry::{LogSink, RecordingSink, TelemetrySink};
pub use types::*;
pub use vector::Vector3;
