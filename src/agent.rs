use bevy::prelude::*;

use crate::math::saturate_ratio;

/// The capabilities every agent in the flock shares: it has a position
/// and a velocity. Neighbor aggregation and nearest-agent searches work
/// on anything that implements this.
pub trait FlockAgent {
    fn position(&self) -> Vec3;

    fn velocity(&self) -> Vec3;

    /// The direction of travel, or zero when the agent is stationary.
    /// Always derived from the current velocity.
    fn velocity_normalized(&self) -> Vec3 {
        self.velocity().normalize_or_zero()
    }
}

/// A copy of an agent's kinematic state taken at the start of a
/// simulation phase. Agents read each other only through snapshots, so
/// the order in which agents are updated within a phase does not matter.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub entity: Entity,
    pub position: Vec3,
    pub velocity: Vec3,
}

impl AgentSnapshot {
    pub fn new(entity: Entity, position: Vec3, velocity: Vec3) -> Self {
        Self {
            entity,
            position,
            velocity,
        }
    }
}

impl FlockAgent for AgentSnapshot {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }
}

impl<A: FlockAgent> FlockAgent for &A {
    fn position(&self) -> Vec3 {
        (*self).position()
    }

    fn velocity(&self) -> Vec3 {
        (*self).velocity()
    }
}

/// Wing flap rate for the host's animation, from 0.0 (gliding or
/// stationary) to 1.0 (flying level at full speed). Diving agents flap
/// less the steeper they dive.
#[derive(Component, Debug, Default, Copy, Clone, PartialEq, Reflect, Deref)]
#[reflect(Component)]
pub struct FlapSpeed(pub(crate) f32);

impl FlapSpeed {
    pub fn from_velocity(velocity: Vec3, max_speed: f32) -> Self {
        let speed = saturate_ratio(velocity.length(), max_speed);
        let Ok(direction) = Dir3::new(velocity) else {
            return Self(0.0);
        };
        let dive_degrees = Vec3::NEG_Y.angle_between(*direction).to_degrees();
        Self(speed * dive_degrees.clamp(0.0, 90.0) / 90.0)
    }
}
