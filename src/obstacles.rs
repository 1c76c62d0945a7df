use avian3d::prelude::*;
use bevy::{
    ecs::{query::QueryData, system::SystemParam},
    prelude::*,
};
use derivative::Derivative;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::{death::LifeState, math::saturate_ratio};

/// Something that can answer "where is the closest obstacle surface near
/// this point". Only points that pass `accept` are considered.
pub trait ObstacleQuery {
    fn nearest_surface_point(
        &self,
        origin: Vec3,
        radius: f32,
        accept: &dyn Fn(Vec3) -> bool,
    ) -> Option<Vec3>;
}

/// Opt an agent into obstacle avoidance. The closest obstacle in front of
/// the agent is sensed each tick and stored in [NearbyObstacle].
#[derive(Component, Debug, Clone, Reflect, Derivative)]
#[derivative(Default)]
#[reflect(Component)]
#[require(NearbyObstacle)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct AvoidObstacles {
    /// How far to look for obstacles.
    #[derivative(Default(value = "8.0"))]
    pub awareness_radius: f32,
    /// Only colliders on these layers are obstacles.
    #[derivative(Default(value = "LayerMask::DEFAULT"))]
    pub layers: LayerMask,
}

impl AvoidObstacles {
    pub fn with_awareness_radius(mut self, radius: f32) -> Self {
        self.awareness_radius = radius;
        self
    }

    pub fn with_layers(mut self, layers: impl Into<LayerMask>) -> Self {
        self.layers = layers.into();
        self
    }
}

/// The closest obstacle surface point ahead of the agent as of the last
/// sensing pass, if any.
#[derive(Component, Debug, Default, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct NearbyObstacle {
    pub surface_point: Option<Vec3>,
}

/// Steer away from an obstacle point ahead of the agent. The closer the
/// point, the more the result turns away from it; far away it mostly
/// keeps the current heading. Points behind the agent are ignored.
pub fn obstacle_avoidance(
    position: Vec3,
    heading: Vec3,
    awareness_radius: f32,
    surface_point: Option<Vec3>,
) -> Vec3 {
    let Some(point) = surface_point else {
        return Vec3::ZERO;
    };
    let to_point = point - position;
    if to_point.dot(heading) <= 0.0 {
        return Vec3::ZERO;
    }
    let weight = 1.0 - saturate_ratio(to_point.length_squared(), awareness_radius * awareness_radius);
    -to_point.normalize_or_zero() * weight + heading * (1.0 - weight)
}

/// Colliders found through avian's spatial query pipeline.
#[derive(SystemParam)]
pub struct ObstacleColliders<'w, 's> {
    spatial_query: SpatialQuery<'w, 's>,
    colliders: Query<'w, 's, (&'static Collider, &'static GlobalTransform)>,
}

impl<'w, 's> ObstacleColliders<'w, 's> {
    /// View the colliders on `layers`, ignoring `agent`'s own colliders.
    pub fn on_layers(&self, layers: LayerMask, agent: Entity) -> LayeredObstacles<'_, 'w, 's> {
        LayeredObstacles {
            colliders: self,
            layers,
            agent,
        }
    }
}

pub struct LayeredObstacles<'a, 'w, 's> {
    colliders: &'a ObstacleColliders<'w, 's>,
    layers: LayerMask,
    agent: Entity,
}

impl ObstacleQuery for LayeredObstacles<'_, '_, '_> {
    fn nearest_surface_point(
        &self,
        origin: Vec3,
        radius: f32,
        accept: &dyn Fn(Vec3) -> bool,
    ) -> Option<Vec3> {
        let shape = Collider::sphere(radius);
        let filter = SpatialQueryFilter::default()
            .with_mask(self.layers)
            .with_excluded_entities([self.agent]);
        let hits = self
            .colliders
            .spatial_query
            .shape_intersections(&shape, origin, Quat::IDENTITY, &filter);

        let mut closest = None;
        let mut closest_distance = f32::INFINITY;
        for hit in hits {
            let Ok((collider, transform)) = self.colliders.colliders.get(hit) else {
                continue;
            };
            let (point, _) =
                collider.project_point(transform.translation(), transform.rotation(), origin, true);
            if !accept(point) {
                continue;
            }
            let distance = point.distance_squared(origin);
            if distance < closest_distance {
                closest_distance = distance;
                closest = Some(point);
            }
        }
        closest
    }
}

#[derive(QueryData)]
#[query_data(mutable)]
pub(crate) struct SenseObstaclesQuery {
    entity: Entity,
    avoid: &'static AvoidObstacles,
    transform: &'static Transform,
    velocity: &'static LinearVelocity,
    life: Option<&'static LifeState>,
    nearby: &'static mut NearbyObstacle,
}

pub(crate) fn sense_obstacles(
    obstacles: ObstacleColliders,
    mut agents: Query<SenseObstaclesQuery>,
) {
    for mut agent in agents.iter_mut() {
        if agent.life.is_some_and(LifeState::is_dead) {
            agent.nearby.surface_point = None;
            continue;
        }
        let origin = agent.transform.translation;
        let heading = agent.velocity.normalize_or_zero();
        let in_front = |point: Vec3| (point - origin).dot(heading) > 0.0;
        agent.nearby.surface_point = obstacles
            .on_layers(agent.avoid.layers, agent.entity)
            .nearest_surface_point(origin, agent.avoid.awareness_radius, &in_front);
    }
}
