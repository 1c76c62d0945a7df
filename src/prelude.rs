pub use crate::{
    agent::{AgentSnapshot, FlapSpeed, FlockAgent},
    aggregate::{average_heading, average_position, nearest},
    boid::{Boid, compute_boid_demands, random_unit_vector},
    control::{
        BoidDemand, DemandWeights, Demands, PredatorDemand, normalized_weights, weighted_sum,
    },
    death::{BoidCaptured, BoidExpired, LifeState, REMOVAL_DELAY},
    leader::{FlockLeader, wrap_distance},
    movement::Locomotion,
    neighbors::Neighborhood,
    obstacles::{
        AvoidObstacles, LayeredObstacles, NearbyObstacle, ObstacleColliders, ObstacleQuery,
        obstacle_avoidance,
    },
    plugin::{FlockPlugin, FlockSystemSet},
    predator::{
        HuntState, Predator, compute_predator_demands, select_groups, withdrawal_weight,
    },
    roster::{BoidRespawnRequested, BoundaryZone, FlockRoster, SpawnMode},
    settings::FlockSettings,
    spline::{ArcLengthSample, CatmullRomSpline, SplineError, catmull_rom},
};
