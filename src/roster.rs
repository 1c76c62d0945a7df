use avian3d::prelude::LinearVelocity;
use bevy::{platform::collections::HashMap, prelude::*};
use derivative::Derivative;
use rand::{Rng, SeedableRng, rngs::StdRng};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::{
    agent::AgentSnapshot, boid::Boid, death::LifeState, leader::FlockLeader,
    neighbors::Neighborhood, predator::Predator, settings::FlockSettings,
};

/// An axis-aligned box that spawn positions are drawn from.
#[derive(Debug, Copy, Clone, PartialEq, Reflect, Derivative)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derivative(Default)]
pub struct BoundaryZone {
    #[derivative(Default(value = "Vec3::splat(-10.0)"))]
    pub min: Vec3,
    #[derivative(Default(value = "Vec3::splat(10.0)"))]
    pub max: Vec3,
}

impl BoundaryZone {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        self.min.lerp(self.max, 0.5)
    }

    /// A point drawn uniformly from inside the box.
    pub fn random_point(&self, rng: &mut impl Rng) -> Vec3 {
        let blend = Vec3::new(
            rng.random::<f32>(),
            rng.random::<f32>(),
            rng.random::<f32>(),
        );
        self.min + (self.max - self.min) * blend
    }
}

/// Where new boids are placed.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum SpawnMode {
    /// The center of the boundary zone.
    #[default]
    Origin,
    /// On top of the leader, or the world origin without one.
    OnLeader,
    /// Anywhere inside the boundary zone.
    Random,
}

impl SpawnMode {
    pub fn spawn_position(
        &self,
        boundary: &BoundaryZone,
        leader: Option<Vec3>,
        rng: &mut impl Rng,
    ) -> Vec3 {
        match self {
            SpawnMode::Origin => boundary.center(),
            SpawnMode::OnLeader => leader.unwrap_or(Vec3::ZERO),
            SpawnMode::Random => boundary.random_point(rng),
        }
    }
}

/// Sent when the flock is below its population while predators are
/// hunting. The host should spawn a boid at `position`.
#[derive(Message, Debug, Copy, Clone, PartialEq)]
pub struct BoidRespawnRequested {
    pub position: Vec3,
}

/// The living boids as they were at the start of a simulation phase,
/// together with each one's neighbor list.
#[derive(Debug, Default, Clone)]
pub struct FlockRoster {
    boids: Vec<AgentSnapshot>,
    index: HashMap<Entity, usize>,
    neighborhoods: HashMap<Entity, Vec<Entity>>,
}

impl FlockRoster {
    pub fn new(boids: impl IntoIterator<Item = (AgentSnapshot, Vec<Entity>)>) -> Self {
        let mut roster = Self::default();
        for (boid, neighbors) in boids {
            roster.neighborhoods.insert(boid.entity, neighbors);
            roster.boids.push(boid);
        }
        roster.reindex();
        roster
    }

    pub fn boids(&self) -> &[AgentSnapshot] {
        &self.boids
    }

    pub fn len(&self) -> usize {
        self.boids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boids.is_empty()
    }

    pub fn get(&self, entity: Entity) -> Option<&AgentSnapshot> {
        self.index.get(&entity).map(|&i| &self.boids[i])
    }

    /// The neighbors of `entity` that are still in the roster.
    pub fn neighbors_of(&self, entity: Entity) -> impl Iterator<Item = &AgentSnapshot> + '_ {
        self.neighborhoods
            .get(&entity)
            .into_iter()
            .flatten()
            .filter_map(|neighbor| self.get(*neighbor))
    }

    /// Take a boid out of the roster, e.g. once it has been caught.
    pub fn remove(&mut self, entity: Entity) {
        if self.index.remove(&entity).is_none() {
            return;
        }
        self.boids.retain(|boid| boid.entity != entity);
        self.neighborhoods.remove(&entity);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .boids
            .iter()
            .enumerate()
            .map(|(i, boid)| (boid.entity, i))
            .collect();
    }
}

pub(crate) type RosterQueryData = (
    Entity,
    &'static Transform,
    &'static LinearVelocity,
    &'static Neighborhood,
    &'static LifeState,
);

pub(crate) fn living_roster<'a>(
    boids: impl Iterator<
        Item = (
            Entity,
            &'a Transform,
            &'a LinearVelocity,
            &'a Neighborhood,
            &'a LifeState,
        ),
    >,
) -> FlockRoster {
    FlockRoster::new(
        boids
            .filter(|(.., life)| life.is_alive())
            .map(|(entity, transform, velocity, neighborhood, _)| {
                (
                    AgentSnapshot::new(entity, transform.translation, velocity.0),
                    neighborhood.neighbors().to_vec(),
                )
            }),
    )
}

/// Request a replacement boid while predators hunt a shrinking flock.
/// At most one request is sent per tick. Requests the host has not
/// answered yet count towards the population, and each boid added to the
/// world settles one of them.
pub(crate) fn request_respawns(
    settings: Res<FlockSettings>,
    leader: Query<&Transform, With<FlockLeader>>,
    predators: Query<(), With<Predator>>,
    boids: Query<&LifeState, With<Boid>>,
    arrivals: Query<(), Added<Boid>>,
    mut requests: MessageWriter<BoidRespawnRequested>,
    mut pending: Local<usize>,
    mut rng: Local<Option<StdRng>>,
) {
    *pending = pending.saturating_sub(arrivals.iter().count());
    if predators.is_empty() {
        return;
    }
    let living = boids.iter().filter(|life| life.is_alive()).count();
    if living + *pending >= settings.population {
        return;
    }
    let rng = rng.get_or_insert_with(|| StdRng::seed_from_u64(42));
    let leader = leader.iter().next().map(|transform| transform.translation);
    let position = settings
        .respawn_mode
        .spawn_position(&settings.boundary, leader, rng);
    requests.write(BoidRespawnRequested { position });
    *pending += 1;
    debug!("Requested a boid at {position} ({} outstanding)", *pending);
}
