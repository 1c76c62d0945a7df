use std::f32::consts::TAU;

use avian3d::prelude::LinearVelocity;
use bevy::{ecs::query::QueryData, prelude::*};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    agent::{AgentSnapshot, FlapSpeed, FlockAgent},
    aggregate::{average_heading, average_position},
    control::{BoidDemand, Demands, weighted_sum},
    death::LifeState,
    leader::FlockLeader,
    neighbors::Neighborhood,
    obstacles::{AvoidObstacles, NearbyObstacle, obstacle_avoidance},
    predator::Predator,
    roster::{RosterQueryData, living_roster},
    settings::FlockSettings,
};

/// A member of the flock. Flock-wide parameters live in [FlockSettings].
#[derive(Component, Debug, Default, Clone)]
#[require(Transform, LinearVelocity, Neighborhood, LifeState, FlapSpeed)]
pub struct Boid {
    demands: Demands<BoidDemand>,
    total_demand: Vec3,
}

impl Boid {
    /// The unweighted demands from the last tick the boid was alive.
    pub fn demands(&self) -> &Demands<BoidDemand> {
        &self.demands
    }

    pub fn total_demand(&self) -> Vec3 {
        self.total_demand
    }
}

/// A direction drawn uniformly from the unit sphere.
pub fn random_unit_vector(rng: &mut impl Rng) -> Vec3 {
    let z: f32 = rng.random_range(-1.0..=1.0);
    let theta: f32 = rng.random_range(0.0..TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z)
}

/// Sum of unit vectors pointing away from every threat within
/// `radius_sqr` of `from`, normalized.
fn sum_of_escapes(from: Vec3, threats: impl IntoIterator<Item = Vec3>, radius_sqr: f32) -> Vec3 {
    threats
        .into_iter()
        .map(|threat| threat - from)
        .filter(|to_threat| to_threat.length_squared() <= radius_sqr)
        .map(|to_threat| -to_threat.normalize_or_zero())
        .sum::<Vec3>()
        .normalize_or_zero()
}

/// Every demand acting on `me` this tick, before weighting.
pub fn compute_boid_demands(
    me: &AgentSnapshot,
    neighbors: &[&AgentSnapshot],
    leader: Option<Vec3>,
    predators: &[AgentSnapshot],
    settings: &FlockSettings,
    random: Vec3,
) -> Demands<BoidDemand> {
    let mut demands = Demands::<BoidDemand>::default();
    let position = me.position();

    if let Some(leader) = leader {
        demands[BoidDemand::Obedience] = (leader - position).normalize_or_zero();
    }

    let my_future = position + me.velocity() * settings.avoidance_predict_time;
    demands[BoidDemand::Avoidance] = sum_of_escapes(
        my_future,
        neighbors
            .iter()
            .map(|n| n.position() + n.velocity() * settings.avoidance_predict_time),
        settings.collide_radius_sqr(),
    );

    demands[BoidDemand::Alignment] = average_heading(
        neighbors.iter().copied(),
        position,
        settings.view_radius_sqr(),
        me.velocity_normalized(),
    );

    if !neighbors.is_empty() {
        let center = average_position(neighbors.iter().copied());
        demands[BoidDemand::Cohesion] = (center.lerp(position, 0.5) - position).normalize_or_zero();
    }

    demands[BoidDemand::Randomness] = random;

    demands[BoidDemand::Evasion] = sum_of_escapes(
        position,
        predators
            .iter()
            .map(|p| p.position() + p.velocity() * settings.evasion_predict_time),
        settings.view_radius_sqr(),
    );

    demands
}

#[derive(QueryData)]
#[query_data(mutable)]
pub(crate) struct SteerBoidQuery {
    boid: &'static mut Boid,
    transform: &'static mut Transform,
    velocity: &'static mut LinearVelocity,
    flap: &'static mut FlapSpeed,
    avoid: Option<(&'static AvoidObstacles, &'static NearbyObstacle)>,
}

pub(crate) fn steer_boids(
    settings: Res<FlockSettings>,
    time: Res<Time>,
    leader: Query<&Transform, (With<FlockLeader>, Without<Boid>)>,
    predators: Query<(Entity, &Transform, &LinearVelocity), (With<Predator>, Without<Boid>)>,
    mut boids: ParamSet<(
        Query<RosterQueryData, With<Boid>>,
        Query<(Entity, SteerBoidQuery), With<Boid>>,
    )>,
    mut rng: Local<Option<StdRng>>,
) {
    let rng = rng.get_or_insert_with(|| StdRng::seed_from_u64(42));
    let delta_secs = time.delta_secs();
    let locomotion = settings.locomotion;

    let roster = living_roster(boids.p0().iter());
    let leader = leader.iter().next().map(|transform| transform.translation);
    let predators: Vec<AgentSnapshot> = predators
        .iter()
        .map(|(entity, transform, velocity)| {
            AgentSnapshot::new(entity, transform.translation, velocity.0)
        })
        .collect();

    for (entity, mut item) in boids.p1().iter_mut() {
        let Some(me) = roster.get(entity) else {
            continue;
        };
        let neighbors: Vec<&AgentSnapshot> = roster.neighbors_of(entity).collect();
        let demands = compute_boid_demands(
            me,
            &neighbors,
            leader,
            &predators,
            &settings,
            random_unit_vector(rng),
        );
        let avoidance = item.avoid.map_or(Vec3::ZERO, |(avoid, nearby)| {
            obstacle_avoidance(
                me.position,
                me.velocity_normalized(),
                avoid.awareness_radius,
                nearby.surface_point,
            )
        });
        let total_demand = weighted_sum(&demands, &settings.weights) + avoidance;

        item.boid.demands = demands;
        item.boid.total_demand = total_demand;
        item.velocity.0 = locomotion.steer(me.velocity, total_demand);
        locomotion.integrate(&mut item.transform, item.velocity.0, delta_secs);
        *item.flap = FlapSpeed::from_velocity(item.velocity.0, locomotion.max_speed);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{control::DemandWeights, neighbors::update_neighborhoods, test_entities};
    use bevy::ecs::system::RunSystemOnce;

    /// Snapshots with distinct entities, one per `(position, velocity)`.
    fn snapshots<const N: usize>(agents: [(Vec3, Vec3); N]) -> [AgentSnapshot; N] {
        let entities = test_entities(N);
        std::array::from_fn(|i| AgentSnapshot::new(entities[i], agents[i].0, agents[i].1))
    }

    #[test]
    fn test_random_unit_vector() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let v = random_unit_vector(&mut rng);
            assert!((v.length() - 1.0).abs() < 0.0001, "Not unit length: {:?}", v);
        }
    }

    #[test]
    fn test_lone_boid_demands() {
        let settings = FlockSettings::default();
        let [me] = snapshots([(Vec3::ZERO, Vec3::X)]);
        let demands = compute_boid_demands(
            &me,
            &[],
            Some(Vec3::new(0.0, 0.0, 10.0)),
            &[],
            &settings,
            Vec3::Y,
        );
        assert_eq!(demands[BoidDemand::Obedience], Vec3::Z);
        assert_eq!(demands[BoidDemand::Avoidance], Vec3::ZERO);
        assert_eq!(demands[BoidDemand::Alignment], Vec3::ZERO);
        assert_eq!(demands[BoidDemand::Cohesion], Vec3::ZERO);
        assert_eq!(demands[BoidDemand::Randomness], Vec3::Y);
        assert_eq!(demands[BoidDemand::Evasion], Vec3::ZERO);
    }

    #[test]
    fn test_no_leader_no_obedience() {
        let settings = FlockSettings::default();
        let [me] = snapshots([(Vec3::ZERO, Vec3::X)]);
        let demands = compute_boid_demands(&me, &[], None, &[], &settings, Vec3::ZERO);
        assert_eq!(demands[BoidDemand::Obedience], Vec3::ZERO);
    }

    #[test]
    fn test_avoidance_uses_predicted_positions() {
        let settings = FlockSettings::default().with_collide_radius(1.0);
        let [me, incoming, leaving] = snapshots([
            (Vec3::ZERO, Vec3::ZERO),
            // Currently 2 away, but heading straight for us.
            (Vec3::new(2.0, 0.0, 0.0), Vec3::new(-3.0, 0.0, 0.0)),
            // Currently close, but leaving.
            (Vec3::new(0.0, 0.0, 0.9), Vec3::new(0.0, 0.0, 4.0)),
        ]);
        let demands = compute_boid_demands(
            &me,
            &[&incoming, &leaving],
            None,
            &[],
            &settings,
            Vec3::ZERO,
        );
        assert!(demands[BoidDemand::Avoidance].abs_diff_eq(Vec3::NEG_X, 0.0001));
    }

    #[test]
    fn test_cohesion_halves_the_pull() {
        let settings = FlockSettings::default();
        let [me, other] = snapshots([
            (Vec3::ZERO, Vec3::ZERO),
            (Vec3::new(0.0, 4.0, 0.0), Vec3::ZERO),
        ]);
        let demands = compute_boid_demands(&me, &[&other], None, &[], &settings, Vec3::ZERO);
        assert!(demands[BoidDemand::Cohesion].abs_diff_eq(Vec3::Y, 0.0001));
    }

    #[test]
    fn test_alignment_seeded_with_own_heading() {
        let settings = FlockSettings::default().with_view_radius(5.0);
        let [me, other] = snapshots([(Vec3::ZERO, Vec3::Z), (Vec3::ZERO, Vec3::X)]);
        let demands = compute_boid_demands(&me, &[&other], None, &[], &settings, Vec3::ZERO);
        let expect = Vec3::new(1.0, 0.0, 1.0).normalize();
        assert!(demands[BoidDemand::Alignment].abs_diff_eq(expect, 0.0001));
    }

    #[test]
    fn test_evasion() {
        let settings = FlockSettings::default().with_view_radius(5.0);
        let [me, closing, leaving] = snapshots([
            (Vec3::ZERO, Vec3::ZERO),
            // Predicted 4 away on +X.
            (Vec3::new(6.0, 0.0, 0.0), Vec3::new(-4.0, 0.0, 0.0)),
            // Predicted too far away to matter.
            (Vec3::new(0.0, 0.0, 4.0), Vec3::new(0.0, 0.0, 10.0)),
        ]);
        let predators = [closing, leaving];
        let demands = compute_boid_demands(&me, &[], None, &predators, &settings, Vec3::ZERO);
        assert!(demands[BoidDemand::Evasion].abs_diff_eq(Vec3::NEG_X, 0.0001));
    }

    fn steering_world(settings: FlockSettings) -> World {
        let mut world = World::new();
        world.insert_resource(settings);
        let mut time = Time::<()>::default();
        time.advance_by(Duration::from_secs_f32(0.1));
        world.insert_resource(time);
        world
    }

    #[test]
    fn test_steer_boids_follows_leader() {
        let mut weights = DemandWeights::<BoidDemand>::default();
        weights[BoidDemand::Obedience] = 1.0;
        let mut settings = FlockSettings::default();
        settings.weights = weights;
        let mut world = steering_world(settings);
        world.spawn((FlockLeader::default(), Transform::from_xyz(0.0, 0.0, 20.0)));
        let boid = world.spawn(Boid::default()).id();

        world
            .run_system_once(steer_boids)
            .expect("Failed to run steer_boids system");

        let velocity = world.get::<LinearVelocity>(boid).unwrap().0;
        assert!(velocity.abs_diff_eq(Vec3::Z, 0.0001));
        let transform = world.get::<Transform>(boid).unwrap();
        assert!(transform.translation.abs_diff_eq(Vec3::new(0.0, 0.0, 0.1), 0.0001));
        assert!(transform.forward().abs_diff_eq(Vec3::Z, 0.0001));
        let boid = world.get::<Boid>(boid).unwrap();
        assert_eq!(boid.demands()[BoidDemand::Obedience], Vec3::Z);
        assert!(boid.total_demand().abs_diff_eq(Vec3::Z, 0.0001));
    }

    #[test]
    fn test_steer_boids_respects_limits() {
        let mut world = steering_world(FlockSettings::default());
        world.spawn((FlockLeader::default(), Transform::from_xyz(50.0, 0.0, 0.0)));
        world.spawn((
            Predator::default(),
            Transform::from_xyz(1.0, 0.0, 0.0),
            LinearVelocity(Vec3::new(-5.0, 0.0, 0.0)),
        ));
        for i in 0..6 {
            world.spawn((
                Boid::default(),
                Transform::from_xyz(i as f32 * 0.5, 0.0, 0.0),
                LinearVelocity(Vec3::new(9.0, 3.0, 0.0)),
            ));
        }

        for _ in 0..5 {
            world
                .run_system_once(update_neighborhoods)
                .expect("Failed to run update_neighborhoods system");
            world
                .run_system_once(steer_boids)
                .expect("Failed to run steer_boids system");
        }

        let max_speed = world.resource::<FlockSettings>().locomotion.max_speed;
        let mut query = world.query_filtered::<&LinearVelocity, With<Boid>>();
        for velocity in query.iter(&world) {
            assert!(velocity.0.length() <= max_speed + 0.0001);
        }
    }

    #[test]
    fn test_steer_boids_skips_dead() {
        let mut world = steering_world(FlockSettings::default());
        world.spawn((FlockLeader::default(), Transform::from_xyz(0.0, 0.0, 20.0)));
        let boid = world
            .spawn((Boid::default(), LifeState::Dead { elapsed: 0.0 }))
            .id();

        world
            .run_system_once(steer_boids)
            .expect("Failed to run steer_boids system");

        assert_eq!(world.get::<LinearVelocity>(boid).unwrap().0, Vec3::ZERO);
        assert_eq!(world.get::<Transform>(boid).unwrap().translation, Vec3::ZERO);
    }
}
