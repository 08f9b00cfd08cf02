//! Datagram transport
//!
//! Agents bind one endpoint at their own address and exchange fixed-size
//! datagrams. The in-memory [`SimulatedNetwork`] stands in for the radio: it
//! queues outgoing datagrams, optionally drops some with a seeded loss
//! model, and checks at delivery time that the receiver is still bound.
//! Integrity, loss, duplication and reordering are all the transport's
//! business; receivers must cope with any of them.

use core::time::Duration;

use heapless::{FnvIndexSet, Vec};
use log::{debug, trace};

use crate::rng::SimRng;
use crate::types::*;

/// Transport interface consumed by agents
pub trait Transport {
    /// Bind an endpoint at `local`
    fn bind(&mut self, local: AgentId) -> Result<()>;

    /// Send `payload` from `from` to `to`
    fn send_to(&mut self, from: AgentId, to: AgentId, payload: &[u8]) -> Result<()>;

    /// Release the endpoint at `local`
    fn close(&mut self, local: AgentId);
}

/// A datagram in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Sender address
    pub from: AgentId,
    /// Destination address
    pub to: AgentId,
    /// Raw payload bytes
    pub payload: Vec<u8, MAX_DATAGRAM_SIZE>,
}

impl Datagram {
    /// Build a datagram, rejecting oversized payloads
    pub fn new(from: AgentId, to: AgentId, payload: &[u8]) -> Result<Self> {
        let payload = Vec::from_slice(payload).map_err(|_| SwarmError::PayloadTooLarge(payload.len()))?;
        Ok(Self { from, to, payload })
    }
}

/// Link parameters for the simulated network
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    /// One-way delivery delay
    pub latency: Duration,
    /// Probability that a datagram is lost (0.0 - 1.0)
    pub loss: f64,
    /// Seed for the loss model
    pub seed: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(1),
            loss: 0.0,
            seed: 0,
        }
    }
}

/// Datagram accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkStats {
    /// Datagrams handed to the network
    pub sent: u64,
    /// Datagrams handed to a bound receiver
    pub delivered: u64,
    /// Datagrams lost on the link
    pub lost: u64,
    /// Datagrams addressed to an unbound endpoint
    pub unreachable: u64,
}

/// In-memory broadcast medium shared by every agent of a run
#[derive(Debug)]
pub struct SimulatedNetwork {
    link: LinkConfig,
    rng: SimRng,
    bound: FnvIndexSet<AgentId, MAX_SWARM_SIZE>,
    refused: FnvIndexSet<AgentId, MAX_SWARM_SIZE>,
    outbox: std::vec::Vec<Datagram>,
    stats: NetworkStats,
}

impl SimulatedNetwork {
    /// Create a network with the given link parameters
    pub fn new(link: LinkConfig) -> Self {
        Self {
            rng: SimRng::new(link.seed),
            link,
            bound: FnvIndexSet::new(),
            refused: FnvIndexSet::new(),
            outbox: std::vec::Vec::new(),
            stats: NetworkStats::default(),
        }
    }

    /// Make every future bind at `addr` fail
    pub fn refuse_binding(&mut self, addr: AgentId) -> Result<()> {
        self.refused
            .insert(addr)
            .map_err(|_| SwarmError::SwarmSizeExceeded)?;
        Ok(())
    }

    /// Check if an endpoint is bound at `addr`
    pub fn is_bound(&self, addr: &AgentId) -> bool {
        self.bound.contains(addr)
    }

    /// One-way delivery delay
    pub fn latency(&self) -> Duration {
        self.link.latency
    }

    /// Take the datagrams queued since the last call, minus link losses
    pub fn take_outgoing(&mut self) -> std::vec::Vec<Datagram> {
        let queued = core::mem::take(&mut self.outbox);
        let mut surviving = std::vec::Vec::with_capacity(queued.len());
        for datagram in queued {
            if self.rng.chance(self.link.loss) {
                self.stats.lost += 1;
                trace!("lost datagram {} -> {}", datagram.from, datagram.to);
            } else {
                surviving.push(datagram);
            }
        }
        surviving
    }

    /// Hand a datagram to its receiver if the endpoint is still bound
    pub fn deliver(&mut self, datagram: Datagram) -> Option<Datagram> {
        if self.bound.contains(&datagram.to) {
            self.stats.delivered += 1;
            Some(datagram)
        } else {
            self.stats.unreachable += 1;
            trace!("no endpoint at {}, dropping datagram from {}", datagram.to, datagram.from);
            None
        }
    }

    /// Datagram accounting so far
    pub fn stats(&self) -> NetworkStats {
        self.stats
    }
}

impl Transport for SimulatedNetwork {
    fn bind(&mut self, local: AgentId) -> Result<()> {
        if self.refused.contains(&local) {
            return Err(SwarmError::BindFailed(local));
        }
        if self.bound.contains(&local) {
            return Err(SwarmError::AddressInUse(local));
        }
        self.bound
            .insert(local)
            .map_err(|_| SwarmError::SwarmSizeExceeded)?;
        debug!("bound endpoint {}", local);
        Ok(())
    }

    fn send_to(&mut self, from: AgentId, to: AgentId, payload: &[u8]) -> Result<()> {
        let datagram = Datagram::new(from, to, payload)?;
        self.stats.sent += 1;
        self.outbox.push(datagram);
        Ok(())
    }

    fn close(&mut self, local: AgentId) {
        if self.bound.remove(&local) {
            debug!("closed endpoint {}", local);
        }
    }
}
