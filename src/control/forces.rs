//! Virtual force model
//!
//! Followers are pulled toward every known leader with a spring-like force
//! proportional to distance, and pushed away from every other follower with
//! a force inversely proportional to distance. Leaders feel nothing.

use log::{trace, warn};

use crate::types::{AgentId, AgentState, Role};
use crate::vector::Vector3;

/// Peers closer than this (meters) are treated as coincident and exert no force
pub const MIN_FORCE_DISTANCE: f64 = 1e-9;

/// Attraction and repulsion acting on one agent
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Forces {
    /// Sum of pulls toward leaders
    pub attraction: Vector3,
    /// Sum of pushes away from followers
    pub repulsion: Vector3,
}

impl Forces {
    /// No force on either axis
    pub const ZERO: Forces = Forces {
        attraction: Vector3::ZERO,
        repulsion: Vector3::ZERO,
    };
}

/// Compute the forces on an agent with `role` at `position` from a swarm
/// table snapshot.
///
/// Coincident peers (closer than [`MIN_FORCE_DISTANCE`]) and peers with
/// non-finite positions are skipped rather than divided into.
pub fn compute_forces<I>(role: Role, position: Vector3, peers: I) -> Forces
where
    I: IntoIterator<Item = (AgentId, AgentState)>,
{
    let mut forces = Forces::ZERO;
    if role.is_leader() {
        return forces;
    }

    for (peer, state) in peers {
        let offset = state.position - position;
        let length = offset.length();
        if !length.is_finite() || length < MIN_FORCE_DISTANCE {
            if state.role.is_leader() {
                warn!("follower sits on leader {} (distance {}), no attraction", peer, length);
            } else {
                trace!("skipping coincident peer {} at distance {}", peer, length);
            }
            continue;
        }
        // Unit vector from us to the peer
        let to_other = offset / length;

        match state.role {
            Role::Leader => forces.attraction += to_other * length,
            Role::Follower => forces.repulsion += -to_other * (1.0 / length),
        }
    }

    forces
}
