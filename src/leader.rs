use bevy::prelude::*;
use derivative::Derivative;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::spline::CatmullRomSpline;

/// How far ahead of the leader, in distance along its spline, to look when
/// turning it to face along the curve.
const HEADING_LOOK_AHEAD: f32 = 0.01;

/// The point the flock follows. The leader travels along the
/// [CatmullRomSpline] on the same entity at a constant speed, wrapping
/// back to the start when it passes the end.
#[derive(Component, Debug, Clone, Reflect, Derivative)]
#[derivative(Default)]
#[reflect(Component)]
#[require(Transform)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct FlockLeader {
    /// Distance along the spline per second. May be negative.
    #[derivative(Default(value = "1.0"))]
    pub speed: f32,
    /// A disabled leader stays where it is.
    #[derivative(Default(value = "true"))]
    pub enabled: bool,
    distance_travelled: f32,
}

impl FlockLeader {
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Start somewhere other than the beginning of the spline.
    pub fn with_distance_travelled(mut self, distance: f32) -> Self {
        self.distance_travelled = distance;
        self
    }

    /// Where along the spline the leader is, in `[0, total_length)`.
    pub fn distance_travelled(&self) -> f32 {
        self.distance_travelled
    }

    fn advance(&mut self, delta_secs: f32, total_length: f32) {
        self.distance_travelled =
            wrap_distance(self.distance_travelled + self.speed * delta_secs, total_length);
    }
}

/// Wrap a distance into `[0, total_length)`. Going past the end continues
/// from the start; going below zero continues from the end.
pub fn wrap_distance(distance: f32, total_length: f32) -> f32 {
    if total_length <= 0.0 {
        return 0.0;
    }
    let wrapped = distance.rem_euclid(total_length);
    // rem_euclid can round up to exactly total_length for tiny negatives.
    if wrapped >= total_length { 0.0 } else { wrapped }
}

pub(crate) fn advance_leader(
    time: Res<Time>,
    mut leaders: Query<(Entity, &mut FlockLeader, &CatmullRomSpline, &mut Transform)>,
) {
    let delta_secs = time.delta_secs();
    for (entity, mut leader, spline, mut transform) in leaders.iter_mut() {
        if !leader.enabled {
            continue;
        }
        let total_length = spline.total_length();
        if total_length <= 0.0 {
            warn_once!("Leader {} has a spline with no length", entity);
        }
        leader.advance(delta_secs, total_length);

        let distance = leader.distance_travelled;
        let position = spline.geodesic_position_by_distance(distance);
        let ahead = spline
            .geodesic_position_by_distance(wrap_distance(distance + HEADING_LOOK_AHEAD, total_length));
        transform.translation = position;
        if let Ok(direction) = Dir3::new(ahead - position) {
            transform.look_to(direction, Dir3::Y);
        }
    }
}
