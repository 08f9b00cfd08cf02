//! Agent state machine
//!
//! One [`Agent`] runs per simulated vehicle. It never blocks: every callback
//! runs to completion against an [`AgentContext`] and expresses delayed work
//! as new events on the scheduler. Three periodic or one-shot events drive
//! it:
//!
//! - `Broadcast`: send the own position and role to every other address
//! - `Compute`: run the force model and integrator, propose a waypoint
//! - `Compromise`: flip a follower to leader, once
//!
//! Datagrams arrive through [`Agent::on_receive`] whenever the transport
//! delivers one.

use core::time::Duration;

use log::{debug, info, trace};

use crate::config::AgentConfig;
use crate::control::{compute_forces, MotionIntegrator};
use crate::mobility::Mobility;
use crate::scheduler::{EventId, Prioritized, Scheduler, SimTime};
use crate::swarm_table::{PeerCounters, SwarmTable};
use crate::telemetry::{TelemetrySink, COMPROMISED_COLOR, LEADER_COLOR};
use crate::transport::Transport;
use crate::types::*;
use crate::vector::Vector3;

/// Events an agent schedules for itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentEvent {
    /// Periodic state broadcast
    Broadcast,
    /// Periodic force computation
    Compute,
    /// One-shot role compromise
    Compromise,
}

impl Prioritized for AgentEvent {
    fn dispatch_class(&self) -> u8 {
        match self {
            // Must land before any compute tick due at the same instant
            AgentEvent::Compromise => 0,
            AgentEvent::Broadcast | AgentEvent::Compute => 1,
        }
    }
}

/// Agent lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// Created, endpoint not bound
    Uninitialized,
    /// Endpoint bound, ticks scheduled
    Running,
    /// Endpoint released, ticks cancelled (terminal)
    Stopped,
}

/// Collaborators an agent reaches during a callback
pub struct AgentContext<'a> {
    pub scheduler: &'a mut dyn Scheduler<AgentEvent>,
    pub transport: &'a mut dyn Transport,
    pub mobility: &'a mut dyn Mobility,
    pub telemetry: &'a mut dyn TelemetrySink,
}

/// Per-vehicle coordination state
#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    role: Role,
    status: AgentStatus,
    config: AgentConfig,
    velocity: Vector3,
    table: SwarmTable,
    sent: PeerCounters,
    received: PeerCounters,
    integrator: MotionIntegrator,
    send_event: Option<EventId>,
    compute_event: Option<EventId>,
    compromise_event: Option<EventId>,
    compromised: bool,
}

impl Agent {
    /// Create an agent; the role is fixed here and only a compromise changes it
    pub fn new(id: AgentId, role: Role, config: AgentConfig) -> Self {
        let integrator = MotionIntegrator::new(
            config.attraction_gain,
            config.repulsion_gain,
            config.calculate_interval,
        )
        .with_dampening(config.min_dampen, config.max_dampen);

        Self {
            id,
            role,
            status: AgentStatus::Uninitialized,
            config,
            velocity: Vector3::ZERO,
            table: SwarmTable::new(id),
            sent: PeerCounters::new(),
            received: PeerCounters::new(),
            integrator,
            send_event: None,
            compute_event: None,
            compromise_event: None,
            compromised: false,
        }
    }

    /// Bind the endpoint and schedule the first broadcast and compute ticks.
    ///
    /// A bind failure leaves the agent `Uninitialized`.
    pub fn start(&mut self, ctx: &mut AgentContext<'_>) -> Result<()> {
        if self.status != AgentStatus::Uninitialized {
            return Err(SwarmError::InvalidState);
        }
        ctx.transport.bind(self.id)?;
        self.status = AgentStatus::Running;

        let now = ctx.scheduler.now();
        if self.role.is_leader() {
            ctx.telemetry.record_color(now, self.id, LEADER_COLOR);
        }

        schedule(&mut self.send_event, ctx, Duration::ZERO, AgentEvent::Broadcast);
        schedule(&mut self.compute_event, ctx, Duration::ZERO, AgentEvent::Compute);

        if let Some(at) = self.config.compromise_at {
            if !self.role.is_leader() {
                schedule(&mut self.compromise_event, ctx, now.until(at), AgentEvent::Compromise);
            }
        }

        info!("agent {} started as {} at {}", self.id, self.role, now);
        Ok(())
    }

    /// Cancel outstanding events and release the endpoint
    pub fn stop(&mut self, ctx: &mut AgentContext<'_>) -> Result<()> {
        if self.status != AgentStatus::Running {
            return Err(SwarmError::InvalidState);
        }
        for slot in [&mut self.send_event, &mut self.compute_event, &mut self.compromise_event] {
            if let Some(id) = slot.take() {
                ctx.scheduler.cancel(id);
            }
        }
        ctx.transport.close(self.id);
        self.status = AgentStatus::Stopped;

        for (peer, count) in self.sent.iter() {
            debug!("{} sent {} packets to {}", self.id, count, peer);
        }
        for (peer, count) in self.received.iter() {
            debug!("{} received {} packets from {}", self.id, count, peer);
        }
        info!(
            "agent {} stopped as {}: {} sent, {} received, {} peers known",
            self.id,
            self.role,
            self.sent.total(),
            self.received.total(),
            self.table.len()
        );
        Ok(())
    }

    /// Dispatch one of the agent's own events
    pub fn handle(&mut self, event: AgentEvent, ctx: &mut AgentContext<'_>) -> Result<()> {
        if self.status != AgentStatus::Running {
            trace!("agent {} ignoring {:?} while {:?}", self.id, event, self.status);
            return Ok(());
        }
        match event {
            AgentEvent::Broadcast => self.on_broadcast_tick(ctx),
            AgentEvent::Compute => self.on_compute_tick(ctx),
            AgentEvent::Compromise => self.on_compromise(ctx).map(|_| ()),
        }
    }

    /// Send the own state to every other address in the range, then reschedule
    pub fn on_broadcast_tick(&mut self, ctx: &mut AgentContext<'_>) -> Result<()> {
        self.send_event = None;
        let now = ctx.scheduler.now();
        let payload = self.snapshot(&*ctx.mobility, now).encode()?;

        let peers = self.config.peers().filter(|peer| *peer != self.id);
        for peer in peers {
            ctx.transport.send_to(self.id, peer, &payload)?;
            self.sent.increment(peer)?;
        }
        trace!("{} broadcast at {}", self.id, now);

        let interval = self.config.packet_interval;
        schedule(&mut self.send_event, ctx, interval, AgentEvent::Broadcast);
        Ok(())
    }

    /// Handle a delivered datagram.
    ///
    /// Self-traffic and anything that does not decode as an [`AgentState`]
    /// is dropped without touching the table or the counters. Returns whether
    /// the datagram was accepted.
    pub fn on_receive(&mut self, from: AgentId, payload: &[u8]) -> Result<bool> {
        if self.status != AgentStatus::Running {
            trace!("{} not running, dropping datagram from {}", self.id, from);
            return Ok(false);
        }
        if from == self.id {
            trace!("{} dropping own datagram", self.id);
            return Ok(false);
        }
        let state = match AgentState::decode(payload) {
            Ok(state) => state,
            Err(_) => {
                trace!("{} dropping {} byte datagram from {}", self.id, payload.len(), from);
                return Ok(false);
            }
        };

        self.received.increment(from)?;
        // Last received wins, even if it is older than what we hold
        self.table.update(from, state)?;
        Ok(true)
    }

    /// Integrate one step under the current swarm forces, then reschedule
    pub fn on_compute_tick(&mut self, ctx: &mut AgentContext<'_>) -> Result<()> {
        self.compute_event = None;
        let now = ctx.scheduler.now();
        let position = ctx.mobility.position(now);

        let forces = compute_forces(self.role, position, self.table.snapshot());
        let step = self.integrator.step(self.velocity, &forces, position, now);
        self.velocity = step.velocity;
        ctx.mobility.add_waypoint(step.waypoint)?;
        trace!(
            "{} at {}: accel ({:.4}, {:.4}, {:.4})",
            self.id,
            now,
            step.acceleration.x,
            step.acceleration.y,
            step.acceleration.z
        );

        let interval = self.config.calculate_interval;
        schedule(&mut self.compute_event, ctx, interval, AgentEvent::Compute);
        Ok(())
    }

    /// Flip a follower to leader. Returns `false` if nothing changed.
    pub fn on_compromise(&mut self, ctx: &mut AgentContext<'_>) -> Result<bool> {
        self.compromise_event = None;
        if self.compromised || self.role.is_leader() {
            return Ok(false);
        }
        let now = ctx.scheduler.now();
        self.role = Role::Leader;
        self.compromised = true;
        ctx.telemetry.record_color(now, self.id, COMPROMISED_COLOR);
        info!("agent {} compromised at {}, now asserting leadership", self.id, now);
        Ok(true)
    }

    /// Broadcast payload for the position the mobility model reports at `now`
    pub fn snapshot(&self, mobility: &dyn Mobility, now: SimTime) -> AgentState {
        AgentState::new(mobility.position(now), self.role)
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn velocity(&self) -> Vector3 {
        self.velocity
    }

    pub fn table(&self) -> &SwarmTable {
        &self.table
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Packets sent to `peer`
    pub fn sent_to(&self, peer: &AgentId) -> u64 {
        self.sent.get(peer)
    }

    /// Packets accepted from `peer`
    pub fn received_from(&self, peer: &AgentId) -> u64 {
        self.received.get(peer)
    }

    pub fn total_sent(&self) -> u64 {
        self.sent.total()
    }

    pub fn total_received(&self) -> u64 {
        self.received.total()
    }

    pub fn is_compromised(&self) -> bool {
        self.compromised
    }
}

/// Schedule `event` into `slot`; a tick that is still pending is a bug
fn schedule(
    slot: &mut Option<EventId>,
    ctx: &mut AgentContext<'_>,
    delay: Duration,
    event: AgentEvent,
) {
    assert!(slot.is_none(), "{:?} scheduled while one is still pending", event);
    *slot = Some(ctx.scheduler.schedule_after(delay, event));
}
