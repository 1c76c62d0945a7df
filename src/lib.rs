mod agent;
mod aggregate;
mod boid;
mod control;
mod death;
mod leader;
mod math;
mod movement;
mod neighbors;
mod obstacles;
mod plugin;
pub mod prelude;
mod predator;
mod roster;
mod settings;
mod spline;

pub(crate) const SMALL_THRESHOLD: f32 = 0.0001;

/// Distinct entity ids for tests that only need snapshots. Mint every id a
/// test uses in one call.
#[cfg(test)]
pub(crate) fn test_entities(count: usize) -> Vec<bevy::prelude::Entity> {
    let mut world = bevy::prelude::World::new();
    (0..count).map(|_| world.spawn_empty().id()).collect()
}
