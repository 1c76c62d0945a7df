//! Summaries of a group of agents, shared by boids and predators.

use bevy::prelude::*;

use crate::agent::FlockAgent;

/// Blend agent positions together pairwise, each step moving halfway
/// toward the next agent. Agents later in the iteration pull harder than
/// earlier ones, so this is not the arithmetic mean.
///
/// Returns zero for an empty set. Check for emptiness first, since an
/// agent standing at the origin gives the same answer.
pub fn average_position<A: FlockAgent>(agents: impl IntoIterator<Item = A>) -> Vec3 {
    agents
        .into_iter()
        .map(|agent| agent.position())
        .reduce(|average, position| average.lerp(position, 0.5))
        .unwrap_or(Vec3::ZERO)
}

/// The heading of a group as seen from `reference`. Agents closer to the
/// reference count for more, fading to nothing at `radius_sqr`. The sum
/// starts at `seed`, typically the observer's own heading.
///
/// Returns zero for an empty set or when the headings cancel out.
pub fn average_heading<A: FlockAgent>(
    agents: impl IntoIterator<Item = A>,
    reference: Vec3,
    radius_sqr: f32,
    seed: Vec3,
) -> Vec3 {
    let mut agents = agents.into_iter().peekable();
    if agents.peek().is_none() {
        return Vec3::ZERO;
    }
    agents
        .fold(seed, |heading, agent| {
            let weight = 1.0 - agent.position().distance_squared(reference) / radius_sqr;
            heading + agent.velocity_normalized() * weight
        })
        .normalize_or_zero()
}

/// The agent closest to `reference`. The first of several equally close
/// agents wins.
pub fn nearest<A: FlockAgent>(agents: impl IntoIterator<Item = A>, reference: Vec3) -> Option<A> {
    let mut closest = None;
    let mut closest_distance = f32::MAX;
    for agent in agents {
        let distance = agent.position().distance_squared(reference);
        if distance < closest_distance {
            closest_distance = distance;
            closest = Some(agent);
        }
    }
    closest
}
