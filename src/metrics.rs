//! Formation quality
//!
//! Scores a recorded position track with one error value. Three costs add
//! up: how far followers sit from the target distance to the leader, how
//! much the follower spacing wanders over the run, and how fast agents are
//! still moving. Lower is better.
//!
//! # Example
//! ```
//! use drone_swarm_forces::metrics::formation_error;
//! use drone_swarm_forces::telemetry::{RecordingSink, TelemetrySink};
//! use drone_swarm_forces::{AgentId, SimTime, Vector3};
//!
//! let mut sink = RecordingSink::new();
//! sink.record_position(SimTime::ZERO, AgentId::from_u32(1), Vector3::ZERO);
//! sink.record_position(SimTime::ZERO, AgentId::from_u32(2), Vector3::new(7.5, 0.0, 0.0));
//!
//! let score = formation_error(sink.positions()).unwrap();
//! assert_eq!(score.error, 0.0);
//! ```

use std::collections::BTreeMap;

use log::debug;

use crate::scheduler::SimTime;
use crate::telemetry::PositionRecord;
use crate::types::AgentId;
use crate::vector::Vector3;

/// Follower-to-leader distance the formation should settle at (meters)
pub const TARGET_DISTANCE: f64 = 7.5;

/// Target and cost weights for [`formation_error_with`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormationWeights {
    /// Desired follower-to-leader distance
    pub target_distance: f64,
    /// Weight on `|target - mean leader distance|`
    pub leader_distance: f64,
    /// Weight on the follower spacing deviation
    pub spacing: f64,
    /// Weight on the mean speed
    pub speed: f64,
}

impl Default for FormationWeights {
    fn default() -> Self {
        Self {
            target_distance: TARGET_DISTANCE,
            leader_distance: 400.0,
            spacing: 400.0,
            speed: 250.0,
        }
    }
}

/// Formation quality of one recorded run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormationScore {
    /// Sample instants the score was built from
    pub frames: usize,
    /// Mean over frames of the mean follower-to-leader distance
    pub mean_leader_distance: f64,
    /// Mean absolute deviation of the per-frame mean follower spacing
    pub spacing_deviation: f64,
    /// Mean over frames of the mean agent speed
    pub mean_speed: f64,
    /// Weighted sum of the three costs
    pub error: f64,
}

/// Score `records` with the default target and weights
pub fn formation_error(records: &[PositionRecord]) -> Option<FormationScore> {
    formation_error_with(records, &FormationWeights::default())
}

/// Score `records`, grouped into frames by sample time.
///
/// The leader is the lowest address in the track. Speeds are taken between
/// consecutive frames for agents present in both. Returns `None` if no frame
/// holds both the leader and a follower.
pub fn formation_error_with(records: &[PositionRecord], weights: &FormationWeights) -> Option<FormationScore> {
    let leader = records.iter().map(|record| record.id).min()?;

    let mut frames: BTreeMap<SimTime, BTreeMap<AgentId, Vector3>> = BTreeMap::new();
    for record in records {
        frames.entry(record.time).or_default().insert(record.id, record.position);
    }

    let mut leader_distances = Vec::with_capacity(frames.len());
    let mut spacings = Vec::with_capacity(frames.len());
    let mut speeds = Vec::with_capacity(frames.len());
    let mut previous: Option<(SimTime, &BTreeMap<AgentId, Vector3>)> = None;

    for (time, frame) in &frames {
        if let Some(leader_position) = frame.get(&leader) {
            let followers: Vec<Vector3> = frame
                .iter()
                .filter(|(id, _)| **id != leader)
                .map(|(_, position)| *position)
                .collect();

            if let Some(distance) = mean(followers.iter().map(|p| p.distance_to(leader_position))) {
                leader_distances.push(distance);
            }
            let pairs = followers
                .iter()
                .enumerate()
                .flat_map(|(i, a)| followers[i + 1..].iter().map(move |b| a.distance_to(b)));
            if let Some(spacing) = mean(pairs) {
                spacings.push(spacing);
            }
        }

        if let Some((last_time, last)) = previous {
            let dt = last_time.until(*time).as_secs_f64();
            let frame_speeds = frame
                .iter()
                .filter_map(|(id, position)| last.get(id).map(|before| position.distance_to(before) / dt));
            if let Some(speed) = mean(frame_speeds) {
                speeds.push(speed);
            }
        }
        previous = Some((*time, frame));
    }

    let mean_leader_distance = mean(leader_distances.iter().copied())?;
    let spacing_deviation = mean_absolute_deviation(&spacings).unwrap_or(0.0);
    let mean_speed = mean(speeds.iter().copied()).unwrap_or(0.0);

    let error = weights.spacing * spacing_deviation
        + weights.leader_distance * (weights.target_distance - mean_leader_distance).abs()
        + weights.speed * mean_speed;

    debug!(
        "formation over {} frames: leader distance {:.3}, spacing deviation {:.3}, speed {:.3}, error {:.3}",
        frames.len(),
        mean_leader_distance,
        spacing_deviation,
        mean_speed,
        error
    );

    Some(FormationScore {
        frames: frames.len(),
        mean_leader_distance,
        spacing_deviation,
        mean_speed,
        error,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn mean_absolute_deviation(values: &[f64]) -> Option<f64> {
    let centre = mean(values.iter().copied())?;
    mean(values.iter().map(|v| (v - centre).abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    const LEADER: AgentId = AgentId::new(std::net::Ipv4Addr::new(10, 1, 1, 1));

    fn follower(host: u8) -> AgentId {
        AgentId::new(std::net::Ipv4Addr::new(10, 1, 1, host))
    }

    fn at(millis: u64) -> SimTime {
        SimTime::from_duration(Duration::from_millis(millis))
    }

    fn record(time: SimTime, id: AgentId, position: Vector3) -> PositionRecord {
        PositionRecord { time, id, position }
    }

    #[test]
    fn test_settled_ring_scores_zero() {
        let mut records = Vec::new();
        for t in [at(0), at(100), at(200)] {
            records.push(record(t, LEADER, Vector3::ZERO));
            records.push(record(t, follower(2), Vector3::new(7.5, 0.0, 0.0)));
            records.push(record(t, follower(3), Vector3::new(-7.5, 0.0, 0.0)));
        }

        let score = formation_error(&records).unwrap();
        assert_eq!(score.frames, 3);
        assert_eq!(score.mean_leader_distance, 7.5);
        assert_eq!(score.spacing_deviation, 0.0);
        assert_eq!(score.mean_speed, 0.0);
        assert!(score.error.abs() < 1e-12);
    }

    #[test]
    fn test_moving_follower_costs_distance_and_speed() {
        let records = [
            record(at(0), LEADER, Vector3::ZERO),
            record(at(0), follower(2), Vector3::new(5.0, 0.0, 0.0)),
            record(at(500), LEADER, Vector3::ZERO),
            record(at(500), follower(2), Vector3::new(6.0, 0.0, 0.0)),
        ];

        let score = formation_error(&records).unwrap();
        assert!((score.mean_leader_distance - 5.5).abs() < 1e-12);
        // Leader still, follower at 2 m/s
        assert!((score.mean_speed - 1.0).abs() < 1e-12);
        assert_eq!(score.spacing_deviation, 0.0);
        assert!((score.error - (400.0 * 2.0 + 250.0 * 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_spacing_deviation() {
        let records = [
            record(at(0), LEADER, Vector3::ZERO),
            record(at(0), follower(2), Vector3::new(1.0, 0.0, 0.0)),
            record(at(0), follower(3), Vector3::new(-1.0, 0.0, 0.0)),
            record(at(100), LEADER, Vector3::ZERO),
            record(at(100), follower(2), Vector3::new(2.0, 0.0, 0.0)),
            record(at(100), follower(3), Vector3::new(-2.0, 0.0, 0.0)),
        ];

        let score = formation_error(&records).unwrap();
        // Spacing 2 m then 4 m
        assert!((score.spacing_deviation - 1.0).abs() < 1e-12);
        assert!((score.mean_leader_distance - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_custom_weights() {
        let records = [
            record(at(0), LEADER, Vector3::ZERO),
            record(at(0), follower(2), Vector3::new(3.0, 4.0, 0.0)),
        ];
        let weights = FormationWeights {
            target_distance: 5.0,
            leader_distance: 1.0,
            spacing: 0.0,
            speed: 0.0,
        };

        let score = formation_error_with(&records, &weights).unwrap();
        assert_eq!(score.error, 0.0);
        assert_eq!(score.mean_speed, 0.0);
    }

    #[test]
    fn test_needs_followers() {
        assert!(formation_error(&[]).is_none());
        assert!(formation_error(&[record(at(0), LEADER, Vector3::ZERO)]).is_none());
    }
}
