//! Motion integrator
//!
//! Turns a force pair into a velocity update and a proposed waypoint one
//! time step ahead, then bleeds off speed with an adaptive dampening term.

use core::time::Duration;

use crate::control::forces::Forces;
use crate::mobility::Waypoint;
use crate::scheduler::SimTime;
use crate::vector::Vector3;

/// Default speed (m/s) below which no dampening is applied
pub const DEFAULT_MIN_DAMPEN: f64 = 0.2;

/// Default speed (m/s) above which dampening is at its maximum
pub const DEFAULT_MAX_DAMPEN: f64 = 1.0;

/// Fraction of velocity removed per simulated second at full dampening
pub const MAX_DAMPEN_PER_SECOND: f64 = 0.5;

/// Result of one integration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    /// Acceleration applied this step
    pub acceleration: Vector3,
    /// Velocity after the force update and dampening
    pub velocity: Vector3,
    /// Position proposed for `now + dt`
    pub waypoint: Waypoint,
}

/// Explicit Euler integrator with adaptive velocity dampening
#[derive(Debug, Clone)]
pub struct MotionIntegrator {
    attraction_gain: f64,
    repulsion_gain: f64,
    min_dampen: f64,
    max_dampen: f64,
    mass: f64,
    dt: Duration,
}

impl MotionIntegrator {
    /// Create an integrator with the default dampening thresholds
    pub fn new(attraction_gain: f64, repulsion_gain: f64, dt: Duration) -> Self {
        Self {
            attraction_gain,
            repulsion_gain,
            min_dampen: DEFAULT_MIN_DAMPEN,
            max_dampen: DEFAULT_MAX_DAMPEN,
            mass: 1.0,
            dt,
        }
    }

    /// Override the dampening thresholds
    pub fn with_dampening(mut self, min_dampen: f64, max_dampen: f64) -> Self {
        self.min_dampen = min_dampen;
        self.max_dampen = max_dampen;
        self
    }

    /// Integration time step
    pub fn dt(&self) -> Duration {
        self.dt
    }

    /// a = F / m with the configured gains
    pub fn acceleration(&self, forces: &Forces) -> Vector3 {
        (forces.attraction * self.attraction_gain + forces.repulsion * self.repulsion_gain)
            / self.mass
    }

    /// Advance `velocity` under `forces` from `position` at `now`.
    ///
    /// The waypoint is projected with the undampened velocity; dampening only
    /// affects the velocity carried into the next step.
    pub fn step(&self, velocity: Vector3, forces: &Forces, position: Vector3, now: SimTime) -> MotionStep {
        let dt = self.dt.as_secs_f64();
        let acceleration = self.acceleration(forces);
        let velocity = velocity + acceleration * dt;
        let waypoint = Waypoint::new(now + self.dt, position + velocity * dt);

        MotionStep {
            acceleration,
            velocity: self.dampen(velocity),
            waypoint,
        }
    }

    /// Fraction of velocity to remove at `speed`.
    ///
    /// Zero up to `min_dampen`, rising linearly to `0.5 * dt` at `max_dampen`
    /// and flat beyond it. Never above 1, so long steps stop an agent rather
    /// than reverse it.
    pub fn dampening_factor(&self, speed: f64) -> f64 {
        let max_factor = (MAX_DAMPEN_PER_SECOND * self.dt.as_secs_f64()).min(1.0);
        if speed > self.max_dampen {
            max_factor
        } else if speed > self.min_dampen {
            remap(speed, (self.min_dampen, self.max_dampen), (0.0, max_factor))
        } else {
            // Slow agents get moving without resistance
            0.0
        }
    }

    /// Scale `velocity` down by the dampening factor for its speed
    pub fn dampen(&self, velocity: Vector3) -> Vector3 {
        let factor = self.dampening_factor(velocity.length());
        velocity - velocity * factor
    }
}

/// Map `value` linearly from range `from` into range `to`
fn remap(value: f64, from: (f64, f64), to: (f64, f64)) -> f64 {
    let t = (value - from.0) / (from.1 - from.0);
    to.0 + (to.1 - to.0) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integrator() -> MotionIntegrator {
        MotionIntegrator::new(1.0, 1.0, Duration::from_millis(10))
    }

    #[test]
    fn test_dampening_boundaries() {
        let int = integrator();

        assert_eq!(int.dampening_factor(0.0), 0.0);
        assert_eq!(int.dampening_factor(DEFAULT_MIN_DAMPEN), 0.0);
        assert!((int.dampening_factor(DEFAULT_MAX_DAMPEN) - 0.005).abs() < 1e-15);
        assert!((int.dampening_factor(50.0) - 0.005).abs() < 1e-15);
    }

    #[test]
    fn test_dampening_interpolates() {
        let int = integrator();
        let mid = int.dampening_factor(0.6);
        assert!((mid - 0.0025).abs() < 1e-12);
    }

    #[test]
    fn test_dampening_never_reverses() {
        let int = integrator();
        let v = Vector3::new(3.0, -4.0, 0.0);
        let damped = int.dampen(v);

        assert!(damped.length() <= v.length());
        assert!(damped.x > 0.0 && damped.y < 0.0);
    }

    #[test]
    fn test_long_step_caps_dampening() {
        let int = MotionIntegrator::new(1.0, 1.0, Duration::from_secs(5));
        assert_eq!(int.dampening_factor(2.0), 1.0);

        let damped = int.dampen(Vector3::new(2.0, 0.0, 0.0));
        assert_eq!(damped, Vector3::ZERO);

        // Halfway up the ramp at dt = 5 s
        assert!((int.dampening_factor(0.6) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_step_applies_acceleration() {
        let int = MotionIntegrator::new(2.0, 0.5, Duration::from_millis(10));
        let forces = Forces {
            attraction: Vector3::new(1.0, 0.0, 0.0),
            repulsion: Vector3::new(0.0, 2.0, 0.0),
        };
        let step = int.step(Vector3::ZERO, &forces, Vector3::new(5.0, 5.0, 5.0), SimTime::ZERO);

        assert_eq!(step.acceleration, Vector3::new(2.0, 1.0, 0.0));
        assert!((step.velocity.x - 0.02).abs() < 1e-12);
        assert!((step.velocity.y - 0.01).abs() < 1e-12);
        assert_eq!(step.waypoint.time.as_duration(), Duration::from_millis(10));
        assert!((step.waypoint.position.x - 5.0002).abs() < 1e-12);
    }

    #[test]
    fn test_waypoint_uses_undamped_velocity() {
        let int = integrator();
        let fast = Vector3::new(10.0, 0.0, 0.0);
        let step = int.step(fast, &Forces::ZERO, Vector3::ZERO, SimTime::ZERO);

        assert!((step.waypoint.position.x - 0.1).abs() < 1e-12);
        assert!((step.velocity.x - 10.0 * (1.0 - 0.005)).abs() < 1e-12);
    }
}
