//! Per-agent view of the swarm
//!
//! Maps each peer to the last state received from it. Entries are never
//! evicted and carry no timestamp: whichever payload arrived last wins, even
//! if the transport reordered it behind an older one.

use heapless::FnvIndexMap;

use crate::types::*;

/// Last known broadcast state of a peer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwarmEntry {
    /// Most recently received payload
    pub last_known: AgentState,
}

/// Table of peers keyed by identity
#[derive(Debug, Clone)]
pub struct SwarmTable {
    /// Owner of the table; never stored as a key
    local_id: AgentId,
    entries: FnvIndexMap<AgentId, SwarmEntry, MAX_SWARM_SIZE>,
}

impl SwarmTable {
    /// Create an empty table owned by `local_id`
    pub fn new(local_id: AgentId) -> Self {
        Self {
            local_id,
            entries: FnvIndexMap::new(),
        }
    }

    /// Overwrite (or insert) the entry for `peer`.
    ///
    /// Updates naming the owner are ignored.
    pub fn update(&mut self, peer: AgentId, state: AgentState) -> Result<()> {
        if peer == self.local_id {
            return Ok(());
        }
        self.entries
            .insert(peer, SwarmEntry { last_known: state })
            .map_err(|_| SwarmError::SwarmSizeExceeded)?;
        Ok(())
    }

    /// Last known state of `peer`
    pub fn get(&self, peer: &AgentId) -> Option<&AgentState> {
        self.entries.get(peer).map(|entry| &entry.last_known)
    }

    /// Check if `peer` has been heard from
    pub fn contains(&self, peer: &AgentId) -> bool {
        self.entries.contains_key(peer)
    }

    /// Lazy view of every (peer, state) pair.
    ///
    /// The iterator borrows the table, so it reflects the table at call time.
    /// No ordering is guaranteed across peers.
    pub fn snapshot(&self) -> impl Iterator<Item = (AgentId, AgentState)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, entry.last_known))
    }

    /// Number of known peers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no peer has been heard from
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owner of the table
    pub fn local_id(&self) -> AgentId {
        self.local_id
    }
}

/// Monotonic per-peer packet counters
#[derive(Debug, Clone, Default)]
pub struct PeerCounters {
    counts: FnvIndexMap<AgentId, u64, MAX_SWARM_SIZE>,
}

impl PeerCounters {
    /// Create empty counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for `peer`, returning the new count
    pub fn increment(&mut self, peer: AgentId) -> Result<u64> {
        if let Some(count) = self.counts.get_mut(&peer) {
            *count += 1;
            return Ok(*count);
        }
        self.counts
            .insert(peer, 1)
            .map_err(|_| SwarmError::SwarmSizeExceeded)?;
        Ok(1)
    }

    /// Count for `peer` (zero if never seen)
    pub fn get(&self, peer: &AgentId) -> u64 {
        self.counts.get(peer).copied().unwrap_or(0)
    }

    /// Sum over all peers
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterate over (peer, count) pairs
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, u64)> + '_ {
        self.counts.iter().map(|(id, count)| (*id, *count))
    }
}
