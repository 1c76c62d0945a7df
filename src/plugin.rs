use bevy::prelude::*;

use crate::{
    boid::steer_boids,
    death::{BoidCaptured, BoidExpired, apply_captures, fall_dead_boids},
    leader::advance_leader,
    neighbors::update_neighborhoods,
    obstacles::sense_obstacles,
    predator::hunt,
    roster::{BoidRespawnRequested, request_respawns},
    settings::FlockSettings,
};

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub struct FlockSystemSet;

/// Runs the flock simulation in [FixedUpdate]. Obstacle sensing uses
/// avian3d's spatial queries, so `PhysicsPlugins` must be added as well.
/// Spawning and despawning agents is left to the app: listen for
/// [BoidExpired] and [BoidRespawnRequested] to keep the flock topped up.
pub struct FlockPlugin;

impl Plugin for FlockPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FlockSettings>()
            .add_message::<BoidCaptured>()
            .add_message::<BoidExpired>()
            .add_message::<BoidRespawnRequested>();

        let update_systems = (
            advance_leader,
            update_neighborhoods,
            sense_obstacles,
            steer_boids,
            hunt,
            apply_captures,
            fall_dead_boids,
            request_respawns,
        )
            .chain()
            .in_set(FlockSystemSet);
        app.add_systems(FixedUpdate, update_systems);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        boid::Boid,
        control::BoidDemand,
        leader::FlockLeader,
        predator::{HuntState, Predator},
        spline::CatmullRomSpline,
    };
    use avian3d::prelude::PhysicsPlugins;
    use bevy::{
        MinimalPlugins,
        asset::{AssetEvent, AssetPlugin, Assets},
        scene::ScenePlugin,
        transform::TransformPlugin,
    };

    fn flock_app() -> App {
        let mut app = App::new();
        app.add_plugins((
            MinimalPlugins,
            AssetPlugin::default(),
            ScenePlugin,
            TransformPlugin,
            PhysicsPlugins::default(),
            FlockPlugin,
        ));
        app.init_resource::<Assets<Mesh>>();
        app.add_message::<AssetEvent<Mesh>>();
        app.finish();
        app.cleanup();
        app
    }

    fn run_fixed_step(app: &mut App, delta_secs: f32) {
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(delta_secs));
        app.world_mut().run_schedule(FixedUpdate);
    }

    #[test]
    fn test_one_tick_sees_fresh_leader_and_neighborhoods() {
        let mut app = flock_app();
        let points = (0..6).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let spline = CatmullRomSpline::new(points, false).expect("Valid spline");
        let world = app.world_mut();
        let leader = world
            .spawn((FlockLeader::default().with_speed(2.0), spline))
            .id();
        let start = Vec3::new(1.2, 0.0, 5.0);
        let first = world
            .spawn((Boid::default(), Transform::from_translation(start)))
            .id();
        let second = world
            .spawn((Boid::default(), Transform::from_xyz(1.2, 0.5, 5.0)))
            .id();
        let predator = world
            .spawn((Predator::default(), Transform::from_xyz(1.2, 0.0, 7.0)))
            .id();

        run_fixed_step(&mut app, 0.1);

        // Obedience aims at where the leader moved to this tick, not at the
        // origin it was spawned at.
        let world = app.world();
        let leader_position = world.get::<Transform>(leader).unwrap().translation;
        assert!(leader_position.distance(Vec3::ZERO) > 1.0);
        let obedience = world.get::<Boid>(first).unwrap().demands()[BoidDemand::Obedience];
        let expect = (leader_position - start).normalize();
        assert!(
            obedience.abs_diff_eq(expect, 0.0001),
            "Obedience {obedience} does not point at {leader_position}"
        );

        // Both boids started with empty neighborhoods, so the target group
        // only holds both when neighborhoods are rebuilt before the hunt.
        let state = world.get::<HuntState>(predator).unwrap();
        assert_eq!(state.target_group().len(), 2);
        assert!(state.target_group().contains(&first));
        assert!(state.target_group().contains(&second));
        assert_eq!(state.kill_count(), 0);
    }
}
