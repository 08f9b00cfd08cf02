//! Initial follower placement
//!
//! Followers are scattered uniformly inside a sphere around the leader by
//! rejection sampling from the bounding cube.

use log::debug;

use crate::rng::SimRng;
use crate::types::*;
use crate::vector::Vector3;

/// Largest accepted spawn radius (meters)
pub const MAX_SPAWN_RADIUS: f64 = 1.0e6;

/// Sample `count` distinct points strictly inside a sphere of `radius`
/// centred on the origin.
pub fn scatter_in_sphere(rng: &mut SimRng, radius: f64, count: usize) -> Result<Vec<Vector3>> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(SwarmError::ConfigError("spawn radius must be positive"));
    }
    if radius > MAX_SPAWN_RADIUS {
        return Err(SwarmError::ConfigError("spawn radius too large"));
    }

    let mut points: Vec<Vector3> = Vec::with_capacity(count);
    let mut rejected = 0usize;
    while points.len() < count {
        let candidate = Vector3::new(
            rng.next_f64_range(-radius, radius),
            rng.next_f64_range(-radius, radius),
            rng.next_f64_range(-radius, radius),
        );
        if candidate.length() < radius && !points.contains(&candidate) {
            points.push(candidate);
        } else {
            rejected += 1;
        }
    }

    debug!(
        "placed {} followers within {} m ({} samples rejected)",
        count, radius, rejected
    );
    Ok(points)
}

/// Leader at the origin followed by `follower_count` scattered followers
pub fn initial_layout(seed: u64, radius: f64, follower_count: usize) -> Result<Vec<Vector3>> {
    let mut rng = SimRng::new(seed);
    let mut layout = Vec::with_capacity(follower_count + 1);
    layout.push(Vector3::ZERO);
    layout.extend(scatter_in_sphere(&mut rng, radius, follower_count)?);
    Ok(layout)
}
