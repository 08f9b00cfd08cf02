//! Waypoint-driven mobility
//!
//! The coordination core never writes positions. It reads the current
//! position from a [`Mobility`] model and proposes future waypoints; the model
//! interpolates linearly between them.

use core::time::Duration;
use std::collections::VecDeque;

use crate::scheduler::SimTime;
use crate::types::*;
use crate::vector::Vector3;

/// A future (time, position) pair handed to the mobility model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    /// Simulated time at which the position is reached
    pub time: SimTime,
    /// Target position (meters)
    pub position: Vector3,
}

impl Waypoint {
    /// Create a new waypoint
    pub fn new(time: SimTime, position: Vector3) -> Self {
        Self { time, position }
    }
}

/// Mobility interface consumed by agents
pub trait Mobility {
    /// Position at simulated time `now`
    fn position(&self, now: SimTime) -> Vector3;

    /// Queue a future waypoint
    fn add_waypoint(&mut self, waypoint: Waypoint) -> Result<()>;
}

/// Piecewise-linear mobility between queued waypoints.
///
/// The initial position is the first waypoint at time zero. Before the first
/// waypoint and after the last one the model holds still.
#[derive(Debug, Clone)]
pub struct WaypointMobility {
    waypoints: VecDeque<Waypoint>,
}

impl WaypointMobility {
    /// Create a model resting at `initial`
    pub fn new(initial: Vector3) -> Self {
        let mut waypoints = VecDeque::new();
        waypoints.push_back(Waypoint::new(SimTime::ZERO, initial));
        Self { waypoints }
    }

    /// Drop waypoints that can no longer influence positions at or after `now`
    pub fn prune_before(&mut self, now: SimTime) {
        while self.waypoints.len() > 1 && self.waypoints[1].time <= now {
            self.waypoints.pop_front();
        }
    }

    /// Number of queued waypoints
    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    /// Last queued waypoint
    pub fn last_waypoint(&self) -> Option<&Waypoint> {
        self.waypoints.back()
    }
}

impl Mobility for WaypointMobility {
    fn position(&self, now: SimTime) -> Vector3 {
        // Index of the first waypoint strictly after `now`
        let next = self.waypoints.partition_point(|wp| wp.time <= now);
        if next == 0 {
            return self.waypoints.front().map_or(Vector3::ZERO, |wp| wp.position);
        }
        let from = self.waypoints[next - 1];
        let Some(to) = self.waypoints.get(next) else {
            return from.position;
        };

        let span = to.time.as_duration().saturating_sub(from.time.as_duration());
        if span == Duration::ZERO {
            return to.position;
        }
        let elapsed = now.as_duration().saturating_sub(from.time.as_duration());
        let fraction = elapsed.as_secs_f64() / span.as_secs_f64();
        from.position + (to.position - from.position) * fraction
    }

    fn add_waypoint(&mut self, waypoint: Waypoint) -> Result<()> {
        if let Some(last) = self.waypoints.back() {
            if waypoint.time < last.time {
                return Err(SwarmError::WaypointOutOfOrder(waypoint.time.as_duration()));
            }
        }
        self.waypoints.push_back(waypoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: f64) -> SimTime {
        SimTime::from_secs_f64(secs).unwrap()
    }

    #[test]
    fn test_initial_position_holds() {
        let model = WaypointMobility::new(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(model.position(at(0.0)), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(model.position(at(100.0)), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_linear_interpolation() {
        let mut model = WaypointMobility::new(Vector3::ZERO);
        model
            .add_waypoint(Waypoint::new(at(2.0), Vector3::new(4.0, 0.0, -2.0)))
            .unwrap();

        let mid = model.position(at(1.0));
        assert!((mid.x - 2.0).abs() < 1e-9);
        assert!((mid.z + 1.0).abs() < 1e-9);
        assert_eq!(model.position(at(2.0)), Vector3::new(4.0, 0.0, -2.0));
        assert_eq!(model.position(at(3.0)), Vector3::new(4.0, 0.0, -2.0));
    }

    #[test]
    fn test_rejects_out_of_order_waypoint() {
        let mut model = WaypointMobility::new(Vector3::ZERO);
        model.add_waypoint(Waypoint::new(at(2.0), Vector3::ZERO)).unwrap();

        let result = model.add_waypoint(Waypoint::new(at(1.0), Vector3::ZERO));
        assert!(matches!(result, Err(SwarmError::WaypointOutOfOrder(_))));
    }

    #[test]
    fn test_prune_keeps_current_segment() {
        let mut model = WaypointMobility::new(Vector3::ZERO);
        for i in 1..=5 {
            model
                .add_waypoint(Waypoint::new(at(i as f64), Vector3::new(i as f64, 0.0, 0.0)))
                .unwrap();
        }

        model.prune_before(at(3.5));
        assert_eq!(model.waypoint_count(), 3);
        assert!((model.position(at(3.5)).x - 3.5).abs() < 1e-9);
    }
}
