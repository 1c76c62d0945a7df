use bevy::{ecs::query::QueryData, prelude::*};

use crate::{boid::Boid, death::LifeState, settings::FlockSettings};

/// The living boids within view of a boid, rebuilt from scratch every
/// tick. Dead boids have an empty neighborhood and appear in no one
/// else's.
#[derive(Component, Debug, Default, Clone, Reflect)]
#[reflect(Component)]
pub struct Neighborhood {
    pub(crate) neighbors: Vec<Entity>,
}

impl Neighborhood {
    pub fn neighbors(&self) -> &[Entity] {
        &self.neighbors
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

#[derive(QueryData)]
#[query_data(mutable)]
pub(crate) struct UpdateNeighborhoodQuery {
    entity: Entity,
    transform: &'static Transform,
    life: &'static LifeState,
    neighborhood: &'static mut Neighborhood,
}

pub(crate) fn update_neighborhoods(
    settings: Res<FlockSettings>,
    mut boids: Query<UpdateNeighborhoodQuery, With<Boid>>,
) {
    let living: Vec<(Entity, Vec3)> = boids
        .iter()
        .filter(|boid| boid.life.is_alive())
        .map(|boid| (boid.entity, boid.transform.translation))
        .collect();
    let view_radius_sqr = settings.view_radius_sqr();

    for boid in boids.iter_mut() {
        let mut neighborhood = boid.neighborhood;
        neighborhood.neighbors.clear();
        if boid.life.is_dead() {
            continue;
        }
        let origin = boid.transform.translation;
        neighborhood.neighbors.extend(
            living
                .iter()
                .filter(|(other, position)| {
                    *other != boid.entity && position.distance_squared(origin) <= view_radius_sqr
                })
                .map(|(other, _)| *other),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    fn boid_at(world: &mut World, position: Vec3) -> Entity {
        world
            .spawn((Boid::default(), Transform::from_translation(position)))
            .id()
    }

    #[test]
    fn test_update_neighborhoods() {
        let mut world = World::new();
        world.insert_resource(FlockSettings::default().with_view_radius(2.0));
        let a = boid_at(&mut world, Vec3::ZERO);
        let b = boid_at(&mut world, Vec3::new(2.0, 0.0, 0.0));
        let c = boid_at(&mut world, Vec3::new(3.5, 0.0, 0.0));

        world
            .run_system_once(update_neighborhoods)
            .expect("Failed to run update_neighborhoods system");

        // Exactly at the view radius still counts.
        assert_eq!(world.get::<Neighborhood>(a).unwrap().neighbors(), [b]);
        let mut of_b = world.get::<Neighborhood>(b).unwrap().neighbors().to_vec();
        of_b.sort();
        let mut expect = vec![a, c];
        expect.sort();
        assert_eq!(of_b, expect);
        assert_eq!(world.get::<Neighborhood>(c).unwrap().neighbors(), [b]);
    }

    #[test]
    fn test_dead_boids_are_not_neighbors() {
        let mut world = World::new();
        world.init_resource::<FlockSettings>();
        let a = boid_at(&mut world, Vec3::ZERO);
        let b = boid_at(&mut world, Vec3::X);

        world
            .run_system_once(update_neighborhoods)
            .expect("Failed to run update_neighborhoods system");
        assert_eq!(world.get::<Neighborhood>(b).unwrap().len(), 1);

        world.get_mut::<LifeState>(a).unwrap().kill();
        world
            .run_system_once(update_neighborhoods)
            .expect("Failed to run update_neighborhoods system");
        assert!(world.get::<Neighborhood>(a).unwrap().is_empty());
        assert!(world.get::<Neighborhood>(b).unwrap().is_empty());
    }
}
