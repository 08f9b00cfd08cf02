//! Role compromise injection
//!
//! Models a single compromised agent that starts asserting leadership at a
//! fixed simulated time. The injector decides who is compromised and when,
//! then keeps a ledger of compromises that actually fired so each agent is
//! flipped at most once per run.

use heapless::FnvIndexMap;
use log::{info, warn};

use crate::scheduler::SimTime;
use crate::types::*;

// ═══════════════════════════════════════════════════════════════════════════
// TARGET SELECTION
// ═══════════════════════════════════════════════════════════════════════════

/// Predicate choosing which agents get compromised
pub trait CompromisePolicy {
    /// Check if `id` should be compromised
    fn selects(&self, id: AgentId) -> bool;
}

/// Compromise the agent whose host octet matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostOctetPolicy(pub u8);

impl CompromisePolicy for HostOctetPolicy {
    fn selects(&self, id: AgentId) -> bool {
        id.host_octet() == self.0
    }
}

impl<F: Fn(AgentId) -> bool> CompromisePolicy for F {
    fn selects(&self, id: AgentId) -> bool {
        self(id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// LEDGER
// ═══════════════════════════════════════════════════════════════════════════

/// Unique identifier for a planned compromise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaultId(pub u64);

/// A planned role compromise and whether it has fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCompromise {
    /// Ledger identifier
    pub id: FaultId,
    /// Agent whose role flips
    pub target: AgentId,
    /// When the flip is due
    pub scheduled_at: SimTime,
    /// When the flip actually happened
    pub fired_at: Option<SimTime>,
}

impl RoleCompromise {
    /// Check if the flip happened
    pub fn has_fired(&self) -> bool {
        self.fired_at.is_some()
    }
}

/// Plans role compromises and records when they fire
#[derive(Debug)]
pub struct FaultInjector {
    at: SimTime,
    planned: FnvIndexMap<AgentId, RoleCompromise, MAX_SWARM_SIZE>,
    next_fault_id: u64,
}

impl FaultInjector {
    /// Create an injector that compromises agents at `at`
    pub fn new(at: SimTime) -> Self {
        Self {
            at,
            planned: FnvIndexMap::new(),
            next_fault_id: 1,
        }
    }

    /// Time compromises are due
    pub fn at(&self) -> SimTime {
        self.at
    }

    /// Select targets among `candidates`.
    ///
    /// Only followers are eligible: a leader has nothing left to assert.
    /// Returns the number of newly planned compromises.
    pub fn plan<P, I>(&mut self, policy: &P, candidates: I) -> Result<usize>
    where
        P: CompromisePolicy + ?Sized,
        I: IntoIterator<Item = (AgentId, Role)>,
    {
        let mut added = 0;
        for (id, role) in candidates {
            if !policy.selects(id) || self.planned.contains_key(&id) {
                continue;
            }
            if role.is_leader() {
                warn!("compromise policy selected leader {}, ignoring", id);
                continue;
            }

            let compromise = RoleCompromise {
                id: FaultId(self.next_fault_id),
                target: id,
                scheduled_at: self.at,
                fired_at: None,
            };
            self.planned
                .insert(id, compromise)
                .map_err(|_| SwarmError::SwarmSizeExceeded)?;
            self.next_fault_id += 1;
            added += 1;
            info!("planned role compromise of {} at {}", id, self.at);
        }
        Ok(added)
    }

    /// Scheduled time for `id`, if it is a target
    pub fn scheduled_for(&self, id: AgentId) -> Option<SimTime> {
        self.planned.get(&id).map(|c| c.scheduled_at)
    }

    /// Record that the compromise of `id` fired at `now`.
    ///
    /// Returns `Ok(false)` when it had already fired; the first time wins.
    pub fn record_fired(&mut self, id: AgentId, now: SimTime) -> Result<bool> {
        let compromise = self
            .planned
            .get_mut(&id)
            .ok_or(SwarmError::UnknownAgent(id))?;
        if compromise.has_fired() {
            return Ok(false);
        }
        compromise.fired_at = Some(now);
        Ok(true)
    }

    /// Check if `id` has been compromised
    pub fn is_compromised(&self, id: AgentId) -> bool {
        self.planned.get(&id).is_some_and(RoleCompromise::has_fired)
    }

    /// Number of planned compromises
    pub fn planned_count(&self) -> usize {
        self.planned.len()
    }

    /// Number of compromises that fired
    pub fn fired_count(&self) -> usize {
        self.planned.values().filter(|c| c.has_fired()).count()
    }

    /// Every planned compromise in planning order
    pub fn compromises(&self) -> impl Iterator<Item = &RoleCompromise> + '_ {
        self.planned.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn id(n: u8) -> AgentId {
        AgentId::new(std::net::Ipv4Addr::new(10, 1, 1, n))
    }

    fn swarm() -> [(AgentId, Role); 4] {
        [
            (id(1), Role::Leader),
            (id(2), Role::Follower),
            (id(3), Role::Follower),
            (id(4), Role::Follower),
        ]
    }

    fn at_15s() -> SimTime {
        SimTime::from_duration(Duration::from_secs(15))
    }

    #[test]
    fn test_host_octet_policy_selects_one() {
        let mut injector = FaultInjector::new(at_15s());
        assert_eq!(injector.plan(&HostOctetPolicy(2), swarm()).unwrap(), 1);

        assert_eq!(injector.scheduled_for(id(2)), Some(at_15s()));
        assert_eq!(injector.scheduled_for(id(3)), None);
    }

    #[test]
    fn test_leader_never_planned() {
        let mut injector = FaultInjector::new(at_15s());
        assert_eq!(injector.plan(&HostOctetPolicy(1), swarm()).unwrap(), 0);
        assert_eq!(injector.planned_count(), 0);
    }

    #[test]
    fn test_closure_policy() {
        let mut injector = FaultInjector::new(at_15s());
        let odd = |id: AgentId| id.host_octet() % 2 == 1;
        assert_eq!(injector.plan(&odd, swarm()).unwrap(), 1);
        assert!(injector.scheduled_for(id(3)).is_some());
    }

    #[test]
    fn test_fires_at_most_once() {
        let mut injector = FaultInjector::new(at_15s());
        injector.plan(&HostOctetPolicy(2), swarm()).unwrap();

        assert!(!injector.is_compromised(id(2)));
        assert!(injector.record_fired(id(2), at_15s()).unwrap());
        assert!(!injector.record_fired(id(2), at_15s() + Duration::from_secs(1)).unwrap());
        assert!(injector.is_compromised(id(2)));
        assert_eq!(injector.fired_count(), 1);

        let fired = injector.compromises().next().unwrap();
        assert_eq!(fired.fired_at, Some(at_15s()));
    }

    #[test]
    fn test_unplanned_target_rejected() {
        let mut injector = FaultInjector::new(at_15s());
        assert_eq!(
            injector.record_fired(id(3), at_15s()),
            Err(SwarmError::UnknownAgent(id(3)))
        );
    }
}
