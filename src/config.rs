//! Configuration for the swarm simulation
//!
//! All options are plain scalars with documented defaults. The harness can
//! deserialize a [`SimulationConfig`] from any serde format; missing fields
//! take their defaults.

use core::time::Duration;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::control::integrator::{DEFAULT_MAX_DAMPEN, DEFAULT_MIN_DAMPEN};
use crate::placement::MAX_SPAWN_RADIUS;
use crate::scheduler::SimTime;
use crate::transport::LinkConfig;
use crate::types::*;

/// Scheduled role compromise settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompromiseConfig {
    /// Absolute simulated time at which the compromise fires (seconds).
    ///
    /// Measured from the start of the run, not from the target's own start.
    /// A follower starting at 1 s with an attack 15 s into its life needs
    /// `at_secs = 16.0`.
    pub at_secs: f64,
    /// Host octet of the address to compromise
    pub host_octet: u8,
}

impl Default for CompromiseConfig {
    fn default() -> Self {
        Self {
            at_secs: 15.0,
            // .1 is the leader, so the first follower is the target
            host_octet: 2,
        }
    }
}

/// Whole-run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Gain applied to attraction toward leaders
    pub attraction_gain: f64,
    /// Gain applied to repulsion between followers
    pub repulsion_gain: f64,
    /// Seed for placement and link loss
    pub seed: u64,
    /// Number of followers (the leader is extra)
    pub follower_count: u32,
    /// Radius of the sphere followers spawn in (meters)
    pub spawn_radius: f64,
    /// Length of the run (seconds)
    pub duration_secs: f64,
    /// Broadcast period (seconds)
    pub packet_interval_secs: f64,
    /// Force computation period, also the integration step (seconds)
    pub calculate_interval_secs: f64,
    /// Where the harness writes position samples; never opened by this crate
    pub positions_output_path: String,
    /// Delay before followers start, relative to the leader (seconds)
    pub follower_start_delay_secs: f64,
    /// Position sampling period for telemetry (seconds)
    pub position_sample_interval_secs: f64,
    /// Speed below which no dampening applies (m/s)
    pub min_dampen: f64,
    /// Speed above which dampening is maximal (m/s)
    pub max_dampen: f64,
    /// Address of the leader; followers take the following addresses
    pub base_address: Ipv4Addr,
    /// One-way link latency (seconds)
    pub link_latency_secs: f64,
    /// Probability of losing a datagram (0.0 - 1.0)
    pub packet_loss: f64,
    /// Scheduled role compromise, if any
    pub compromise: Option<CompromiseConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            attraction_gain: 1.0,
            repulsion_gain: 1.0,
            seed: 0,
            follower_count: 7,
            spawn_radius: 4.0,
            duration_secs: 180.0,
            packet_interval_secs: 1.5,
            calculate_interval_secs: 0.01,
            positions_output_path: "positions.csv".to_string(),
            follower_start_delay_secs: 1.0,
            position_sample_interval_secs: 0.05,
            min_dampen: DEFAULT_MIN_DAMPEN,
            max_dampen: DEFAULT_MAX_DAMPEN,
            base_address: Ipv4Addr::new(10, 1, 1, 1),
            link_latency_secs: 0.001,
            packet_loss: 0.0,
            compromise: None,
        }
    }
}

impl SimulationConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.attraction_gain.is_finite() || !self.repulsion_gain.is_finite() {
            return Err(SwarmError::ConfigError("gains must be finite"));
        }
        if !self.spawn_radius.is_finite() || self.spawn_radius <= 0.0 {
            return Err(SwarmError::ConfigError("spawn radius must be positive"));
        }
        if self.spawn_radius > MAX_SPAWN_RADIUS {
            return Err(SwarmError::ConfigError("spawn radius too large"));
        }
        if self.agent_count() as usize > MAX_SWARM_SIZE {
            return Err(SwarmError::SwarmSizeExceeded);
        }
        for (secs, what) in [
            (self.duration_secs, "duration must be positive"),
            (self.packet_interval_secs, "packet interval must be positive"),
            (self.calculate_interval_secs, "calculate interval must be positive"),
            (self.position_sample_interval_secs, "sample interval must be positive"),
        ] {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(SwarmError::ConfigError(what));
            }
        }
        for (secs, what) in [
            (self.follower_start_delay_secs, "start delay must be non-negative"),
            (self.link_latency_secs, "link latency must be non-negative"),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(SwarmError::ConfigError(what));
            }
        }
        if !(self.min_dampen >= 0.0 && self.min_dampen < self.max_dampen && self.max_dampen.is_finite()) {
            return Err(SwarmError::ConfigError("dampening thresholds must satisfy 0 <= min < max"));
        }
        if !(0.0..=1.0).contains(&self.packet_loss) {
            return Err(SwarmError::ConfigError("packet loss must be within [0, 1]"));
        }
        if AgentId::new(self.base_address)
            .offset(self.follower_count)
            .is_none()
        {
            return Err(SwarmError::ConfigError("address range overflows"));
        }
        if let Some(compromise) = &self.compromise {
            if !compromise.at_secs.is_finite() || compromise.at_secs < 0.0 {
                return Err(SwarmError::ConfigError("compromise time must be non-negative"));
            }
        }
        Ok(())
    }

    /// Leader plus followers
    pub fn agent_count(&self) -> u32 {
        self.follower_count.saturating_add(1)
    }

    /// End of the run
    pub fn stop_time(&self) -> Result<SimTime> {
        SimTime::from_secs_f64(self.duration_secs)
    }

    /// Follower start time
    pub fn follower_start(&self) -> Result<SimTime> {
        SimTime::from_secs_f64(self.follower_start_delay_secs)
    }

    /// Telemetry sampling period
    pub fn sample_interval(&self) -> Result<Duration> {
        secs(self.position_sample_interval_secs)
    }

    /// Compromise time, if a compromise is configured
    pub fn compromise_time(&self) -> Result<Option<SimTime>> {
        self.compromise
            .map(|c| SimTime::from_secs_f64(c.at_secs))
            .transpose()
    }

    /// Link parameters for the simulated network
    pub fn link_config(&self) -> Result<LinkConfig> {
        Ok(LinkConfig {
            latency: secs(self.link_latency_secs)?,
            loss: self.packet_loss,
            seed: self.seed,
        })
    }

    /// Per-agent configuration shared by every agent in the run
    pub fn agent_config(&self) -> Result<AgentConfig> {
        Ok(AgentConfig {
            base_address: AgentId::new(self.base_address),
            agent_count: self.agent_count(),
            packet_interval: secs(self.packet_interval_secs)?,
            calculate_interval: secs(self.calculate_interval_secs)?,
            attraction_gain: self.attraction_gain,
            repulsion_gain: self.repulsion_gain,
            min_dampen: self.min_dampen,
            max_dampen: self.max_dampen,
            compromise_at: None,
        })
    }
}

fn secs(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| SwarmError::ConfigError("duration must be finite and non-negative"))
}

/// Configuration handed to one agent at construction
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// First address of the swarm's range
    pub base_address: AgentId,
    /// Number of addresses in the range
    pub agent_count: u32,
    /// Broadcast period
    pub packet_interval: Duration,
    /// Force computation period and integration step
    pub calculate_interval: Duration,
    /// Gain applied to attraction
    pub attraction_gain: f64,
    /// Gain applied to repulsion
    pub repulsion_gain: f64,
    /// Speed below which no dampening applies
    pub min_dampen: f64,
    /// Speed above which dampening is maximal
    pub max_dampen: f64,
    /// Absolute time of a scheduled role compromise
    pub compromise_at: Option<SimTime>,
}

impl AgentConfig {
    /// Every address in the swarm's range
    pub fn peers(&self) -> impl Iterator<Item = AgentId> + '_ {
        (0..self.agent_count).filter_map(move |i| self.base_address.offset(i))
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_address: AgentId::new(Ipv4Addr::new(10, 1, 1, 1)),
            agent_count: 2,
            packet_interval: Duration::from_millis(1500),
            calculate_interval: Duration::from_millis(10),
            attraction_gain: 1.0,
            repulsion_gain: 1.0,
            min_dampen: DEFAULT_MIN_DAMPEN,
            max_dampen: DEFAULT_MAX_DAMPEN,
            compromise_at: None,
        }
    }
}
