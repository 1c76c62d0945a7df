use bevy::prelude::*;
use derivative::Derivative;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::math::dir_and_mag;

/// How an agent turns its total steering demand into motion.
#[derive(Debug, Copy, Clone, PartialEq, Reflect, Derivative)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
#[derivative(Default)]
pub struct Locomotion {
    /// The largest change in velocity the agent can make in one tick,
    /// regardless of how strong its combined demand is.
    #[derivative(Default(value = "5.0"))]
    pub max_available_thrust: f32,
    /// The agent's velocity is never longer than this.
    #[derivative(Default(value = "10.0"))]
    pub max_speed: f32,
    /// Scales how far the agent moves per unit of velocity and time.
    #[derivative(Default(value = "1.0"))]
    pub speed_multiplier: f32,
}

impl Locomotion {
    pub fn with_max_available_thrust(self, thrust: f32) -> Self {
        Self {
            max_available_thrust: thrust,
            ..self
        }
    }

    pub fn with_max_speed(self, speed: f32) -> Self {
        Self {
            max_speed: speed,
            ..self
        }
    }

    pub fn with_speed_multiplier(self, multiplier: f32) -> Self {
        Self {
            speed_multiplier: multiplier,
            ..self
        }
    }

    /// Apply a combined steering demand to a velocity. The demand is cut
    /// down to the available thrust before it is added, and the result is
    /// cut down to the maximum speed.
    pub fn steer(&self, velocity: Vec3, demand: Vec3) -> Vec3 {
        let (direction, magnitude) = dir_and_mag(demand);
        let thrust = direction * magnitude.min(self.max_available_thrust);
        self.limit_speed(velocity + thrust)
    }

    /// Cut a velocity down to the maximum speed, keeping its direction.
    pub fn limit_speed(&self, velocity: Vec3) -> Vec3 {
        let (direction, speed) = dir_and_mag(velocity);
        if speed > self.max_speed {
            direction * self.max_speed
        } else {
            velocity
        }
    }

    /// Move the agent along its velocity and turn it to face where it is
    /// going. A stationary agent keeps its current heading.
    pub fn integrate(&self, transform: &mut Transform, velocity: Vec3, delta_secs: f32) {
        transform.translation += velocity * delta_secs * self.speed_multiplier;
        if let Ok(direction) = Dir3::new(velocity) {
            transform.look_to(direction, Dir3::Y);
        }
    }
}
