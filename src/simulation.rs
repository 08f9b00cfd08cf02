//! Discrete-event simulation driver
//!
//! Owns every agent of a run together with the collaborators they consume:
//! one event queue, one simulated network, one mobility model per agent and
//! a telemetry sink. Dispatch is single-threaded and each callback runs to
//! completion, so agents need no locking.

use core::time::Duration;

use log::{debug, info};

use crate::agent::{Agent, AgentContext, AgentEvent, AgentStatus};
use crate::config::SimulationConfig;
use crate::mobility::{Mobility, WaypointMobility};
use crate::placement::initial_layout;
use crate::safety::{FaultInjector, HostOctetPolicy};
use crate::scheduler::{EventId, EventQueue, Prioritized, Scheduler, SimTime};
use crate::telemetry::TelemetrySink;
use crate::transport::{Datagram, NetworkStats, SimulatedNetwork};
use crate::types::*;
use crate::vector::Vector3;

/// Everything the queue can dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// Start the agent at this index
    Start(usize),
    /// An agent's own event
    Agent(usize, AgentEvent),
    /// A datagram reaching its destination
    Deliver(Datagram),
    /// Record every agent's position
    SamplePositions,
}

impl Prioritized for SimEvent {
    fn dispatch_class(&self) -> u8 {
        match self {
            SimEvent::Agent(_, event) => event.dispatch_class(),
            _ => 1,
        }
    }
}

/// Scheduler view handed to one agent: tags its events with its index
struct AgentScheduler<'q> {
    queue: &'q mut EventQueue<SimEvent>,
    index: usize,
}

impl Scheduler<AgentEvent> for AgentScheduler<'_> {
    fn now(&self) -> SimTime {
        self.queue.now()
    }

    fn schedule_after(&mut self, delay: Duration, event: AgentEvent) -> EventId {
        self.queue.schedule_after(delay, SimEvent::Agent(self.index, event))
    }

    fn cancel(&mut self, id: EventId) -> bool {
        self.queue.cancel(id)
    }
}

/// Final state of one agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSummary {
    pub id: AgentId,
    pub role: Role,
    pub position: Vector3,
    pub velocity: Vector3,
    pub compromised: bool,
    pub sent: u64,
    pub received: u64,
}

/// Outcome of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Time the run ended
    pub end_time: SimTime,
    /// Events dispatched by the queue
    pub events_dispatched: u64,
    /// Datagram accounting
    pub network: NetworkStats,
    /// Per-agent final state, leader first
    pub agents: Vec<AgentSummary>,
}

/// A whole swarm run
pub struct Simulation<S: TelemetrySink> {
    config: SimulationConfig,
    queue: EventQueue<SimEvent>,
    network: SimulatedNetwork,
    agents: Vec<Agent>,
    mobility: Vec<WaypointMobility>,
    injector: Option<FaultInjector>,
    sink: S,
    sample_interval: Duration,
    stop_time: SimTime,
    finished: bool,
}

impl<S: TelemetrySink> Simulation<S> {
    /// Build a run with followers scattered around the leader
    pub fn new(config: SimulationConfig, sink: S) -> Result<Self> {
        config.validate()?;
        let layout = initial_layout(config.seed, config.spawn_radius, config.follower_count as usize)?;
        Self::with_positions(config, layout, sink)
    }

    /// Build a run with explicit start positions, leader first
    pub fn with_positions(config: SimulationConfig, positions: Vec<Vector3>, sink: S) -> Result<Self> {
        config.validate()?;
        if positions.len() != config.agent_count() as usize {
            return Err(SwarmError::ConfigError("one start position per agent required"));
        }

        let base = AgentId::new(config.base_address);
        let mut ids = Vec::with_capacity(positions.len());
        for index in 0..config.agent_count() {
            ids.push(base.offset(index).ok_or(SwarmError::ConfigError("address range overflows"))?);
        }
        let role_of = |index: usize| if index == 0 { Role::Leader } else { Role::Follower };

        let injector = match (config.compromise, config.compromise_time()?) {
            (Some(compromise), Some(at)) => {
                let mut injector = FaultInjector::new(at);
                let candidates = ids.iter().enumerate().map(|(i, id)| (*id, role_of(i)));
                injector.plan(&HostOctetPolicy(compromise.host_octet), candidates)?;
                Some(injector)
            }
            _ => None,
        };

        let agent_config = config.agent_config()?;
        let agents = ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let mut agent_config = agent_config.clone();
                agent_config.compromise_at = injector.as_ref().and_then(|i| i.scheduled_for(*id));
                Agent::new(*id, role_of(index), agent_config)
            })
            .collect();
        let mobility = positions.into_iter().map(WaypointMobility::new).collect();

        let stop_time = config.stop_time()?;
        let follower_start = config.follower_start()?;
        let mut queue = EventQueue::new();
        queue.stop_at(stop_time);
        queue.schedule_at(SimTime::ZERO, SimEvent::Start(0));
        for index in 1..ids.len() {
            queue.schedule_at(follower_start, SimEvent::Start(index));
        }
        queue.schedule_at(SimTime::ZERO, SimEvent::SamplePositions);

        Ok(Self {
            network: SimulatedNetwork::new(config.link_config()?),
            sample_interval: config.sample_interval()?,
            config,
            queue,
            agents,
            mobility,
            injector,
            sink,
            stop_time,
            finished: false,
        })
    }

    /// Dispatch the next event. Returns `false` once the run is over.
    pub fn step(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        let Some((_, event)) = self.queue.pop() else {
            self.teardown()?;
            return Ok(false);
        };

        match event {
            SimEvent::Start(index) => self.with_agent(index, |agent, ctx| agent.start(ctx))?,
            SimEvent::Agent(index, AgentEvent::Compromise) => self.compromise(index)?,
            SimEvent::Agent(index, event) => self.with_agent(index, |agent, ctx| agent.handle(event, ctx))?,
            SimEvent::Deliver(datagram) => self.deliver(datagram)?,
            SimEvent::SamplePositions => self.sample_positions(),
        }
        self.flush_network();
        Ok(true)
    }

    /// Dispatch events until the stop time, then stop every running agent
    pub fn run(&mut self) -> Result<RunSummary> {
        info!(
            "starting run: {} agents, {}s, seed {}",
            self.agents.len(),
            self.config.duration_secs,
            self.config.seed
        );
        while self.step()? {}
        let summary = self.summary();
        info!(
            "run finished after {} events: {} datagrams sent, {} delivered, {} lost",
            summary.events_dispatched, summary.network.sent, summary.network.delivered, summary.network.lost
        );
        Ok(summary)
    }

    /// Snapshot of the run so far
    pub fn summary(&self) -> RunSummary {
        let now = self.now();
        let agents = self
            .agents
            .iter()
            .zip(&self.mobility)
            .map(|(agent, mobility)| AgentSummary {
                id: agent.id(),
                role: agent.role(),
                position: mobility.position(now),
                velocity: agent.velocity(),
                compromised: agent.is_compromised(),
                sent: agent.total_sent(),
                received: agent.total_received(),
            })
            .collect();

        RunSummary {
            end_time: now,
            events_dispatched: self.queue.dispatched(),
            network: self.network.stats(),
            agents,
        }
    }

    fn with_agent<F, T>(&mut self, index: usize, f: F) -> Result<T>
    where
        F: FnOnce(&mut Agent, &mut AgentContext<'_>) -> Result<T>,
    {
        let agent = self.agents.get_mut(index).ok_or(SwarmError::InvalidState)?;
        let mobility = self.mobility.get_mut(index).ok_or(SwarmError::InvalidState)?;
        let mut scheduler = AgentScheduler {
            queue: &mut self.queue,
            index,
        };
        let mut ctx = AgentContext {
            scheduler: &mut scheduler,
            transport: &mut self.network,
            mobility,
            telemetry: &mut self.sink,
        };
        f(agent, &mut ctx)
    }

    fn compromise(&mut self, index: usize) -> Result<()> {
        let fired = self.with_agent(index, |agent, ctx| {
            if agent.status() == AgentStatus::Running {
                agent.on_compromise(ctx)
            } else {
                Ok(false)
            }
        })?;
        if fired {
            let now = self.now();
            if let (Some(injector), Some(agent)) = (self.injector.as_mut(), self.agents.get(index)) {
                injector.record_fired(agent.id(), now)?;
            }
        }
        Ok(())
    }

    fn deliver(&mut self, datagram: Datagram) -> Result<()> {
        let Some(datagram) = self.network.deliver(datagram) else {
            return Ok(());
        };
        let index = self.index_of(datagram.to)?;
        self.agents[index].on_receive(datagram.from, &datagram.payload)?;
        Ok(())
    }

    fn sample_positions(&mut self) {
        let now = self.now();
        for (agent, mobility) in self.agents.iter().zip(self.mobility.iter_mut()) {
            self.sink.record_position(now, agent.id(), mobility.position(now));
            mobility.prune_before(now);
        }
        self.queue.schedule_after(self.sample_interval, SimEvent::SamplePositions);
    }

    /// Schedule delivery of everything sent during the last callback
    fn flush_network(&mut self) {
        let latency = self.network.latency();
        for datagram in self.network.take_outgoing() {
            self.queue.schedule_after(latency, SimEvent::Deliver(datagram));
        }
    }

    fn teardown(&mut self) -> Result<()> {
        self.finished = true;
        for index in 0..self.agents.len() {
            if self.agents[index].status() == AgentStatus::Running {
                self.with_agent(index, |agent, ctx| agent.stop(ctx))?;
            }
        }
        debug!("teardown complete at {}", self.stop_time);
        Ok(())
    }

    fn index_of(&self, id: AgentId) -> Result<usize> {
        let base = AgentId::new(self.config.base_address);
        let index = id.as_u32().wrapping_sub(base.as_u32()) as usize;
        if index < self.agents.len() {
            Ok(index)
        } else {
            Err(SwarmError::UnknownAgent(id))
        }
    }

    /// Current simulated time
    pub fn now(&self) -> SimTime {
        if self.finished {
            self.stop_time
        } else {
            self.queue.now()
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Agent with the given identity
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.index_of(id).ok().map(|index| &self.agents[index])
    }

    /// Mobility model of the agent with the given identity
    pub fn mobility(&self, id: AgentId) -> Option<&WaypointMobility> {
        self.index_of(id).ok().map(|index| &self.mobility[index])
    }

    pub fn injector(&self) -> Option<&FaultInjector> {
        self.injector.as_ref()
    }

    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    /// Network access for setup, e.g. refusing a binding
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the run and hand back the sink
    pub fn into_sink(self) -> S {
        self.sink
    }
}
