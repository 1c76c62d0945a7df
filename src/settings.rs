use bevy::prelude::*;
use derivative::Derivative;
use enum_map::enum_map;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::{
    control::{BoidDemand, DemandWeights, normalized_weights},
    movement::Locomotion,
    roster::{BoundaryZone, SpawnMode},
};

fn default_boid_weights() -> DemandWeights<BoidDemand> {
    enum_map! {
        BoidDemand::Obedience => 0.5,
        BoidDemand::Avoidance => 0.8,
        BoidDemand::Alignment => 0.5,
        BoidDemand::Cohesion => 0.4,
        BoidDemand::Randomness => 0.1,
        BoidDemand::Evasion => 1.0,
    }
}

/// Parameters shared by every boid in the flock. Insert this resource
/// before adding the [crate::prelude::FlockPlugin] to override the defaults.
#[derive(Resource, Debug, Clone, Derivative)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
#[derivative(Default)]
pub struct FlockSettings {
    /// Boids within this distance of each other are neighbors. Predators
    /// predicted to come this close are evaded.
    #[derivative(Default(value = "5.0"))]
    pub view_radius: f32,
    /// Neighbors predicted to come closer than this are avoided.
    #[derivative(Default(value = "1.0"))]
    pub collide_radius: f32,
    /// How far ahead, in seconds, to predict neighbors when avoiding them.
    #[derivative(Default(value = "0.5"))]
    pub avoidance_predict_time: f32,
    /// How far ahead, in seconds, to predict predators when evading them.
    #[derivative(Default(value = "0.5"))]
    pub evasion_predict_time: f32,
    pub locomotion: Locomotion,
    /// Acceleration applied to dead boids.
    #[derivative(Default(value = "Vec3::new(0.0, -9.81, 0.0)"))]
    pub gravity: Vec3,
    #[derivative(Default(value = "default_boid_weights()"))]
    pub weights: DemandWeights<BoidDemand>,
    /// The flock size to maintain. While predators are hunting and fewer
    /// boids are alive, a respawn is requested every tick.
    #[derivative(Default(value = "10"))]
    pub population: usize,
    /// Where respawned boids should appear.
    #[derivative(Default(value = "SpawnMode::OnLeader"))]
    pub respawn_mode: SpawnMode,
    /// The volume used by [SpawnMode::Origin] and [SpawnMode::Random].
    pub boundary: BoundaryZone,
}

impl FlockSettings {
    pub fn with_view_radius(mut self, radius: f32) -> Self {
        self.view_radius = radius;
        self
    }

    pub fn with_collide_radius(mut self, radius: f32) -> Self {
        self.collide_radius = radius;
        self
    }

    pub fn with_locomotion(mut self, locomotion: Locomotion) -> Self {
        self.locomotion = locomotion;
        self
    }

    pub fn with_weight(mut self, demand: BoidDemand, weight: f32) -> Self {
        self.weights[demand] = weight;
        self
    }

    pub fn with_population(mut self, population: usize) -> Self {
        self.population = population;
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryZone) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn view_radius_sqr(&self) -> f32 {
        self.view_radius * self.view_radius
    }

    pub fn collide_radius_sqr(&self) -> f32 {
        self.collide_radius * self.collide_radius
    }

    /// Each weight as a share of the total, for display.
    pub fn normalized_weights(&self) -> DemandWeights<BoidDemand> {
        normalized_weights(&self.weights)
    }
}
