//! Core type definitions for the virtual-forces swarm

use core::fmt;
use core::time::Duration;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::vector::Vector3;

/// Maximum supported swarm size (must be power of 2 for FnvIndexMap)
pub const MAX_SWARM_SIZE: usize = 128;

/// Size in bytes of an encoded [`AgentState`]: three little-endian `f64`
/// coordinates followed by a single role byte.
pub const AGENT_STATE_SIZE: usize = 3 * 8 + 1;

/// Maximum datagram size accepted by the transport
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Result type for swarm operations
pub type Result<T> = core::result::Result<T, SwarmError>;

/// Network identity of an agent.
///
/// Identities are IPv4 addresses; the swarm occupies a contiguous range
/// starting at a base address, so `offset` enumerates every peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Ipv4Addr);

impl AgentId {
    /// Create an identity from an IPv4 address
    pub const fn new(addr: Ipv4Addr) -> Self {
        Self(addr)
    }

    /// Create an identity from the raw 32-bit address
    pub fn from_u32(raw: u32) -> Self {
        Self(Ipv4Addr::from(raw))
    }

    /// Raw 32-bit address
    pub fn as_u32(&self) -> u32 {
        u32::from(self.0)
    }

    /// Lowest octet of the address (the host number inside a /24)
    pub fn host_octet(&self) -> u8 {
        self.0.octets()[3]
    }

    /// Identity `n` addresses after this one, `None` on overflow
    pub fn offset(&self, n: u32) -> Option<Self> {
        self.as_u32().checked_add(n).map(Self::from_u32)
    }
}

impl From<Ipv4Addr> for AgentId {
    fn from(addr: Ipv4Addr) -> Self {
        Self(addr)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of an agent in the swarm.
///
/// Variant order is the wire encoding: `Follower` is byte 0, `Leader` is byte 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Attracted to leaders, repelled by other followers
    Follower,
    /// Attractive to followers, not moved by swarm forces
    Leader,
}

impl Role {
    /// Check if this is the leader role
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Follower => write!(f, "follower"),
            Role::Leader => write!(f, "leader"),
        }
    }
}

/// Broadcast payload: an agent's position and role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Position at broadcast time (meters)
    pub position: Vector3,
    /// Role at broadcast time
    pub role: Role,
}

impl AgentState {
    /// Create a new state
    pub fn new(position: Vector3, role: Role) -> Self {
        Self { position, role }
    }

    /// Encode into the fixed-size wire format
    pub fn encode(&self) -> Result<[u8; AGENT_STATE_SIZE]> {
        let mut buf = [0u8; AGENT_STATE_SIZE];
        let used = postcard::to_slice(self, &mut buf)
            .map_err(|_| SwarmError::SerializationError)?
            .len();
        if used != AGENT_STATE_SIZE {
            return Err(SwarmError::SerializationError);
        }
        Ok(buf)
    }

    /// Decode from the wire format.
    ///
    /// Anything that is not exactly [`AGENT_STATE_SIZE`] bytes, or carries an
    /// unknown role byte, is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != AGENT_STATE_SIZE {
            return Err(SwarmError::InvalidPayload);
        }
        postcard::from_bytes(bytes).map_err(|_| SwarmError::InvalidPayload)
    }
}

/// Error types for the swarm core and its simulation harness
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwarmError {
    /// Transport endpoint could not be bound
    #[error("failed to bind endpoint for {0}")]
    BindFailed(AgentId),
    /// Another endpoint already holds the address
    #[error("address {0} is already bound")]
    AddressInUse(AgentId),
    /// Operation not valid in the current lifecycle state
    #[error("operation not valid in the current state")]
    InvalidState,
    /// Received bytes are not a valid agent state
    #[error("payload is not a valid agent state")]
    InvalidPayload,
    /// Datagram exceeds the transport limit
    #[error("payload of {0} bytes exceeds the datagram limit")]
    PayloadTooLarge(usize),
    /// Serialization failed
    #[error("serialization error")]
    SerializationError,
    /// A bounded table is full
    #[error("swarm size exceeded")]
    SwarmSizeExceeded,
    /// Waypoint is earlier than the last waypoint already queued
    #[error("waypoint at {0:?} precedes the last queued waypoint")]
    WaypointOutOfOrder(Duration),
    /// Invalid configuration value
    #[error("configuration error: {0}")]
    ConfigError(&'static str),
    /// No agent with this identity exists
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_state_round_trip() {
        let state = AgentState::new(Vector3::new(1.5, -2.25, 1e6), Role::Leader);
        let bytes = state.encode().unwrap();

        assert_eq!(bytes.len(), AGENT_STATE_SIZE);
        assert_eq!(AgentState::decode(&bytes).unwrap(), state);
    }

    #[test]
    fn test_wire_layout() {
        let state = AgentState::new(Vector3::new(1.0, 2.0, 3.0), Role::Leader);
        let bytes = state.encode().unwrap();

        assert_eq!(&bytes[0..8], &1.0f64.to_le_bytes());
        assert_eq!(&bytes[8..16], &2.0f64.to_le_bytes());
        assert_eq!(&bytes[16..24], &3.0f64.to_le_bytes());
        assert_eq!(bytes[24], 1);
    }

    #[test]
    fn test_decode_rejects_wrong_size() {
        let bytes = AgentState::new(Vector3::ZERO, Role::Follower).encode().unwrap();

        assert_eq!(AgentState::decode(&bytes[..24]), Err(SwarmError::InvalidPayload));
        let mut long = [0u8; AGENT_STATE_SIZE + 7];
        long[..AGENT_STATE_SIZE].copy_from_slice(&bytes);
        assert_eq!(AgentState::decode(&long), Err(SwarmError::InvalidPayload));
        assert_eq!(AgentState::decode(&[]), Err(SwarmError::InvalidPayload));
    }

    #[test]
    fn test_decode_rejects_unknown_role() {
        let mut bytes = AgentState::new(Vector3::ZERO, Role::Follower).encode().unwrap();
        bytes[24] = 7;

        assert_eq!(AgentState::decode(&bytes), Err(SwarmError::InvalidPayload));
    }

    #[test]
    fn test_agent_id_offsets() {
        let base = AgentId::new(Ipv4Addr::new(10, 1, 1, 1));

        assert_eq!(base.offset(1), Some(AgentId::new(Ipv4Addr::new(10, 1, 1, 2))));
        assert_eq!(base.offset(1).unwrap().host_octet(), 2);
        assert_eq!(AgentId::from_u32(u32::MAX).offset(1), None);
        assert_eq!(base.to_string(), "10.1.1.1");
    }
}
