use avian3d::prelude::*;
use bevy::prelude::*;
use bevy_flocking::prelude::*;

const NUM_BOIDS: usize = 40;
const NUM_PREDATORS: usize = 2;
const ZONE_SIZE: f32 = 30.0;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(PhysicsPlugins::default())
        .insert_resource(
            FlockSettings::default()
                .with_population(NUM_BOIDS)
                .with_boundary(BoundaryZone::new(
                    Vec3::new(-ZONE_SIZE, 2.0, -ZONE_SIZE),
                    Vec3::new(ZONE_SIZE, 15.0, ZONE_SIZE),
                )),
        )
        .add_plugins(FlockPlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, (despawn_expired_boids, respawn_boids, color_dead_boids))
        .run();
}

#[derive(Resource)]
struct BoidAssets {
    mesh: Handle<Mesh>,
    alive: Handle<StandardMaterial>,
    dead: Handle<StandardMaterial>,
}

fn boid_bundle(assets: &BoidAssets, position: Vec3) -> impl Bundle {
    (
        Mesh3d(assets.mesh.clone()),
        MeshMaterial3d(assets.alive.clone()),
        Transform::from_translation(position),
        Boid::default(),
        AvoidObstacles::default().with_awareness_radius(4.0),
    )
}

/// A figure-eight loop the leader flies around.
fn leader_path() -> Result<CatmullRomSpline, SplineError> {
    let points = vec![
        Vec3::new(0.0, 8.0, 0.0),
        Vec3::new(20.0, 10.0, 15.0),
        Vec3::new(25.0, 6.0, 0.0),
        Vec3::new(20.0, 10.0, -15.0),
        Vec3::new(0.0, 8.0, 0.0),
        Vec3::new(-20.0, 12.0, 15.0),
        Vec3::new(-25.0, 6.0, 0.0),
        Vec3::new(-20.0, 10.0, -15.0),
    ];
    CatmullRomSpline::new(points, true)?.with_table_size(200)
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    settings: Res<FlockSettings>,
) {
    // Ground plane
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::new(Vec3::Y, Vec2::new(200.0, 200.0)))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.3, 0.5, 0.3),
            ..default()
        })),
        Transform::from_xyz(0.0, -0.1, 0.0),
        RigidBody::Static,
        Collider::cuboid(200.0, 0.2, 200.0),
    ));

    // A pillar in the middle of the leader's path
    commands.spawn((
        Mesh3d(meshes.add(Cylinder::new(2.0, 20.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.5, 0.5, 0.5),
            ..default()
        })),
        Transform::from_xyz(12.0, 10.0, 0.0),
        RigidBody::Static,
        Collider::cylinder(2.0, 20.0),
    ));

    match leader_path() {
        Ok(spline) => {
            commands.spawn((
                Mesh3d(meshes.add(Sphere::new(0.3))),
                MeshMaterial3d(materials.add(StandardMaterial {
                    base_color: Color::srgb(1.0, 1.0, 0.0),
                    unlit: true,
                    ..default()
                })),
                FlockLeader::default().with_speed(6.0),
                spline,
            ));
        }
        Err(err) => error!("Could not build the leader path: {err}"),
    }

    let assets = BoidAssets {
        mesh: meshes.add(Cuboid::new(0.3, 0.2, 0.6)),
        alive: materials.add(StandardMaterial {
            base_color: Color::srgb(0.2, 0.4, 0.9),
            ..default()
        }),
        dead: materials.add(StandardMaterial {
            base_color: Color::srgb(0.2, 0.2, 0.2),
            ..default()
        }),
    };
    let mut rng = rand::rng();
    for _ in 0..NUM_BOIDS {
        let position = settings.boundary.random_point(&mut rng);
        commands.spawn(boid_bundle(&assets, position));
    }
    commands.insert_resource(assets);

    let predator_mesh = meshes.add(Cuboid::new(0.6, 0.3, 1.2));
    let predator_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.9, 0.2, 0.2),
        ..default()
    });
    for i in 0..NUM_PREDATORS {
        let x = if i % 2 == 0 { -ZONE_SIZE } else { ZONE_SIZE };
        commands.spawn((
            Mesh3d(predator_mesh.clone()),
            MeshMaterial3d(predator_material.clone()),
            Transform::from_xyz(x, 10.0, 0.0),
            Predator::default(),
            AvoidObstacles::default(),
        ));
    }

    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 60.0, 60.0).looking_at(Vec3::new(0.0, 5.0, 0.0), Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

fn despawn_expired_boids(mut commands: Commands, mut expired: MessageReader<BoidExpired>) {
    for message in expired.read() {
        commands.entity(message.boid).despawn();
    }
}

fn respawn_boids(
    mut commands: Commands,
    assets: Res<BoidAssets>,
    mut requests: MessageReader<BoidRespawnRequested>,
) {
    for request in requests.read() {
        commands.spawn(boid_bundle(&assets, request.position));
    }
}

fn color_dead_boids(
    assets: Res<BoidAssets>,
    mut boids: Query<(&LifeState, &mut MeshMaterial3d<StandardMaterial>), Changed<LifeState>>,
) {
    for (life, mut material) in boids.iter_mut() {
        if life.is_dead() {
            material.0 = assets.dead.clone();
        }
    }
}
