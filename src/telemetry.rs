//! Telemetry sinks
//!
//! Agents report colour changes (role changes) and the harness reports
//! sampled positions. Where the records go is up to the sink: an in-memory
//! recorder for tests and post-processing, or the `log` facade.
//!
//! # Example
//! ```
//! use drone_swarm_forces::telemetry::{RecordingSink, TelemetrySink};
//! use drone_swarm_forces::{AgentId, SimTime, Vector3};
//!
//! let mut sink = RecordingSink::new();
//! let id = AgentId::from_u32(0x0A01_0101);
//! sink.record_position(SimTime::ZERO, id, Vector3::ZERO);
//! assert_eq!(sink.positions().len(), 1);
//! ```

use log::info;

use crate::scheduler::SimTime;
use crate::types::AgentId;
use crate::vector::Vector3;

/// Colour reported for a leader at start (RGB in [0, 1])
pub const LEADER_COLOR: Vector3 = Vector3::new(0.3, 0.7, 1.0);

/// Colour reported for an agent whose role was compromised
pub const COMPROMISED_COLOR: Vector3 = Vector3::new(1.0, 0.2, 0.2);

/// Destination for telemetry records
pub trait TelemetrySink {
    /// An agent changed its display colour
    fn record_color(&mut self, time: SimTime, id: AgentId, color: Vector3);

    /// Sampled position of an agent
    fn record_position(&mut self, time: SimTime, id: AgentId, position: Vector3);
}

/// Colour change record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorRecord {
    pub time: SimTime,
    pub id: AgentId,
    pub color: Vector3,
}

/// Position sample record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRecord {
    pub time: SimTime,
    pub id: AgentId,
    pub position: Vector3,
}

/// Keeps every record in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    colors: Vec<ColorRecord>,
    positions: Vec<PositionRecord>,
}

impl RecordingSink {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All colour changes in arrival order
    pub fn colors(&self) -> &[ColorRecord] {
        &self.colors
    }

    /// All position samples in arrival order
    pub fn positions(&self) -> &[PositionRecord] {
        &self.positions
    }

    /// Position samples for one agent
    pub fn track(&self, id: AgentId) -> impl Iterator<Item = &PositionRecord> + '_ {
        self.positions.iter().filter(move |record| record.id == id)
    }
}

impl TelemetrySink for RecordingSink {
    fn record_color(&mut self, time: SimTime, id: AgentId, color: Vector3) {
        self.colors.push(ColorRecord { time, id, color });
    }

    fn record_position(&mut self, time: SimTime, id: AgentId, position: Vector3) {
        self.positions.push(PositionRecord { time, id, position });
    }
}

/// Writes records through the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn record_color(&mut self, time: SimTime, id: AgentId, color: Vector3) {
        info!(target: "telemetry", "color,{},{},{},{},{}", time.as_secs_f64(), id, color.x, color.y, color.z);
    }

    fn record_position(&mut self, time: SimTime, id: AgentId, position: Vector3) {
        info!(
            target: "telemetry",
            "{},{},{},{},{}",
            time.as_secs_f64(),
            id,
            position.x,
            position.y,
            position.z
        );
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn record_color(&mut self, time: SimTime, id: AgentId, color: Vector3) {
        (**self).record_color(time, id, color);
    }

    fn record_position(&mut self, time: SimTime, id: AgentId, position: Vector3) {
        (**self).record_position(time, id, position);
    }
}
