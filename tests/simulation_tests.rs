//! End-to-end tests for whole-swarm runs

use std::net::Ipv4Addr;
use std::time::Duration;

use drone_swarm_forces::telemetry::{COMPROMISED_COLOR, LEADER_COLOR};
use drone_swarm_forces::*;

fn addr(host: u8) -> AgentId {
    AgentId::new(Ipv4Addr::new(10, 1, 1, host))
}

fn assert_close(actual: Vector3, expected: Vector3) {
    assert!(
        (actual - expected).length() < 1e-12,
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

/// Leader at the origin, followers 2 m and 3 m away on different axes.
/// Everyone starts at once; the run ends after the second compute tick.
fn triangle_config() -> SimulationConfig {
    SimulationConfig {
        follower_count: 2,
        follower_start_delay_secs: 0.0,
        duration_secs: 0.015,
        ..Default::default()
    }
}

fn triangle() -> Vec<Vector3> {
    vec![
        Vector3::ZERO,
        Vector3::new(2.0, 0.0, 0.0),
        Vector3::new(0.0, 3.0, 0.0),
    ]
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn test_one_compute_tick_from_known_distances() {
        let mut sim = Simulation::with_positions(triangle_config(), triangle(), RecordingSink::new()).unwrap();
        sim.run().unwrap();

        let dt = 0.01;
        let sqrt13 = 13f64.sqrt();

        // Pulled 2 m toward the leader, pushed 1/sqrt(13) away from the other follower
        let a1 = Vector3::new(-2.0, 0.0, 0.0) + Vector3::new(2.0, -3.0, 0.0) / sqrt13 / sqrt13;
        let a2 = Vector3::new(0.0, -3.0, 0.0) + Vector3::new(-2.0, 3.0, 0.0) / sqrt13 / sqrt13;

        assert_close(sim.agent(addr(2)).unwrap().velocity(), a1 * dt);
        assert_close(sim.agent(addr(3)).unwrap().velocity(), a2 * dt);
        assert_eq!(sim.agent(addr(1)).unwrap().velocity(), Vector3::ZERO);
    }

    #[test]
    fn test_every_agent_hears_every_other() {
        let mut sim = Simulation::with_positions(triangle_config(), triangle(), RecordingSink::new()).unwrap();
        let summary = sim.run().unwrap();

        for agent in sim.agents() {
            assert_eq!(agent.table().len(), 2);
            assert_eq!(agent.total_sent(), 2);
            assert_eq!(agent.total_received(), 2);
            assert!(agent.table().get(&agent.id()).is_none());
        }
        assert_eq!(summary.network.sent, 6);
        assert_eq!(summary.network.delivered, 6);
    }

    #[test]
    fn test_leader_color_recorded_at_start() {
        let mut sim = Simulation::with_positions(triangle_config(), triangle(), RecordingSink::new()).unwrap();
        sim.run().unwrap();

        let colors = sim.sink().colors();
        assert_eq!(colors.len(), 1);
        assert_eq!(colors[0].id, addr(1));
        assert_eq!(colors[0].color, LEADER_COLOR);
        assert_eq!(colors[0].time, SimTime::ZERO);
    }
}

#[cfg(test)]
mod compromise_tests {
    use super::*;

    #[test]
    fn test_compromise_at_compute_instant() {
        let config = SimulationConfig {
            compromise: Some(CompromiseConfig { at_secs: 0.01, host_octet: 2 }),
            ..triangle_config()
        };
        let mut sim = Simulation::with_positions(config, triangle(), RecordingSink::new()).unwrap();
        let summary = sim.run().unwrap();

        // Compromised before its compute tick at 10 ms: it never moved
        let rogue = sim.agent(addr(2)).unwrap();
        assert_eq!(rogue.role(), Role::Leader);
        assert!(rogue.is_compromised());
        assert_eq!(rogue.velocity(), Vector3::ZERO);

        // The other follower still saw it as a follower at 10 ms
        let sqrt13 = 13f64.sqrt();
        let a2 = Vector3::new(0.0, -3.0, 0.0) + Vector3::new(-2.0, 3.0, 0.0) / sqrt13 / sqrt13;
        assert_close(sim.agent(addr(3)).unwrap().velocity(), a2 * 0.01);

        let injector = sim.injector().unwrap();
        assert_eq!(injector.fired_count(), 1);
        assert!(injector.is_compromised(addr(2)));
        assert!(!injector.is_compromised(addr(3)));

        let compromised: Vec<_> = summary.agents.iter().filter(|a| a.compromised).collect();
        assert_eq!(compromised.len(), 1);
        assert_eq!(compromised[0].id, addr(2));

        let color = sim.sink().colors().iter().find(|c| c.id == addr(2)).unwrap();
        assert_eq!(color.color, COMPROMISED_COLOR);
        assert_eq!(color.time, SimTime::from_duration(Duration::from_millis(10)));
    }

    #[test]
    fn test_compromise_seen_by_peers_after_broadcast() {
        let config = SimulationConfig {
            follower_count: 3,
            follower_start_delay_secs: 0.0,
            duration_secs: 2.0,
            compromise: Some(CompromiseConfig { at_secs: 0.5, host_octet: 2 }),
            ..Default::default()
        };
        let mut sim = Simulation::new(config, RecordingSink::new()).unwrap();
        sim.run().unwrap();

        // The broadcast at 1.5 s carries the new role
        for host in [1, 3, 4] {
            let agent = sim.agent(addr(host)).unwrap();
            assert_eq!(agent.table().get(&addr(2)).unwrap().role, Role::Leader);
        }
        let leaders = sim.agents().iter().filter(|a| a.role().is_leader()).count();
        assert_eq!(leaders, 2);
    }

    #[test]
    fn test_compromise_time_is_absolute() {
        // Followers start at 1 s; 15 s into the follower's life is 16 s of run time
        let config = SimulationConfig {
            follower_count: 2,
            duration_secs: 17.0,
            compromise: Some(CompromiseConfig { at_secs: 16.0, host_octet: 2 }),
            ..Default::default()
        };
        let mut sim = Simulation::new(config, RecordingSink::new()).unwrap();
        sim.run().unwrap();

        let fired = sim.injector().unwrap().compromises().next().unwrap();
        assert_eq!(fired.target, addr(2));
        assert_eq!(fired.fired_at, Some(SimTime::from_duration(Duration::from_secs(16))));
    }

    #[test]
    fn test_compromise_disabled_by_default() {
        let mut sim = Simulation::new(SimulationConfig { duration_secs: 20.0, ..Default::default() }, RecordingSink::new()).unwrap();
        sim.run().unwrap();

        assert!(sim.injector().is_none());
        assert_eq!(sim.agents().iter().filter(|a| a.role().is_leader()).count(), 1);
    }
}

#[cfg(test)]
mod harness_tests {
    use super::*;

    #[test]
    fn test_bind_failure_aborts_run() {
        let mut sim = Simulation::with_positions(triangle_config(), triangle(), RecordingSink::new()).unwrap();
        sim.network_mut().refuse_binding(addr(3)).unwrap();

        assert_eq!(sim.run(), Err(SwarmError::BindFailed(addr(3))));
    }

    #[test]
    fn test_positions_sampled_on_cadence() {
        let config = SimulationConfig {
            follower_count: 2,
            duration_secs: 0.2,
            ..Default::default()
        };
        let mut sim = Simulation::new(config, RecordingSink::new()).unwrap();
        sim.run().unwrap();

        // Samples at 0, 50, 100 and 150 ms for each of three agents
        let sink = sim.into_sink();
        assert_eq!(sink.positions().len(), 12);
        let times: Vec<_> = sink.track(addr(1)).map(|r| r.time.as_duration()).collect();
        assert_eq!(
            times,
            vec![
                Duration::ZERO,
                Duration::from_millis(50),
                Duration::from_millis(100),
                Duration::from_millis(150)
            ]
        );
    }

    #[test]
    fn test_runs_with_log_sink() {
        let config = SimulationConfig {
            follower_count: 2,
            duration_secs: 1.5,
            ..Default::default()
        };
        let summary = Simulation::new(config, LogSink).unwrap().run().unwrap();
        assert_eq!(summary.end_time, SimTime::from_duration(Duration::from_millis(1500)));
    }

    #[test]
    fn test_same_seed_same_run() {
        let config = SimulationConfig {
            follower_count: 4,
            duration_secs: 5.0,
            seed: 7,
            ..Default::default()
        };
        let a = Simulation::new(config.clone(), RecordingSink::new()).unwrap().run().unwrap();
        let b = Simulation::new(config, RecordingSink::new()).unwrap().run().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_total_loss_leaves_tables_empty() {
        let config = SimulationConfig {
            follower_count: 3,
            duration_secs: 4.0,
            packet_loss: 1.0,
            ..Default::default()
        };
        let mut sim = Simulation::new(config, RecordingSink::new()).unwrap();
        let summary = sim.run().unwrap();

        assert_eq!(summary.network.delivered, 0);
        assert!(summary.network.lost > 0);
        assert!(sim.agents().iter().all(|a| a.table().is_empty()));
        assert!(summary.agents.iter().all(|a| a.velocity == Vector3::ZERO));
    }

    #[test]
    fn test_followers_converge_toward_leader() {
        let config = SimulationConfig {
            follower_count: 4,
            duration_secs: 60.0,
            seed: 3,
            ..Default::default()
        };
        let mut sim = Simulation::new(config, RecordingSink::new()).unwrap();
        let summary = sim.run().unwrap();

        for agent in &summary.agents[1..] {
            assert!(agent.position.is_finite());
            assert!(agent.position.length() < 100.0, "{} drifted to {:?}", agent.id, agent.position);
        }
        assert_eq!(summary.agents[0].position, Vector3::ZERO);
    }
}

#[cfg(test)]
mod metrics_tests {
    use super::*;

    #[test]
    fn test_formation_scored_from_recorded_track() {
        let config = SimulationConfig {
            follower_count: 4,
            duration_secs: 20.0,
            seed: 5,
            ..Default::default()
        };
        let mut sim = Simulation::new(config, RecordingSink::new()).unwrap();
        sim.run().unwrap();

        let score = formation_error(sim.sink().positions()).unwrap();
        // One frame per 50 ms sample
        assert_eq!(score.frames, 400);
        assert!(score.error.is_finite());
        assert!(score.error >= 0.0);
        assert!(score.mean_leader_distance > 0.0);
    }

    #[test]
    fn test_empty_track_has_no_score() {
        let sink = RecordingSink::new();
        assert!(formation_error(sink.positions()).is_none());
    }
}
