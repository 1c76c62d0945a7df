use avian3d::prelude::LinearVelocity;
use bevy::{ecs::query::QueryData, prelude::*};
use derivative::Derivative;
use enum_map::enum_map;
use itertools::Itertools;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::{
    agent::{AgentSnapshot, FlapSpeed, FlockAgent},
    aggregate::{average_position, nearest},
    boid::Boid,
    control::{DemandWeights, Demands, PredatorDemand, normalized_weights, weighted_sum},
    death::BoidCaptured,
    math::saturate_ratio,
    movement::Locomotion,
    obstacles::{AvoidObstacles, NearbyObstacle, obstacle_avoidance},
    roster::{FlockRoster, RosterQueryData, living_roster},
};

fn default_predator_weights() -> DemandWeights<PredatorDemand> {
    enum_map! {
        PredatorDemand::Separation => 0.4,
        PredatorDemand::Disruption => 0.5,
        PredatorDemand::Eagerness => 1.0,
        PredatorDemand::Withdrawal => 0.8,
        PredatorDemand::Independence => 0.3,
    }
}

fn default_predator_locomotion() -> Locomotion {
    Locomotion::default()
        .with_max_available_thrust(5.0)
        .with_max_speed(20.0)
        .with_speed_multiplier(10.0)
}

/// An agent that hunts the flock. Each attack runs on a clock: for the
/// first `withdrawal_start` seconds the predator commits fully to the
/// attack, then it gradually pulls away until `withdrawal_end`, when the
/// clock restarts.
#[derive(Component, Debug, Clone, Reflect, Derivative)]
#[derivative(Default)]
#[reflect(Component)]
#[require(Transform, LinearVelocity, HuntState, FlapSpeed)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct Predator {
    #[derivative(Default(value = "default_predator_locomotion()"))]
    pub locomotion: Locomotion,
    /// Other predators closer than this push each other apart.
    #[derivative(Default(value = "8.0"))]
    pub view_radius: f32,
    /// Eagerness fades to nothing for targets further away than this.
    #[derivative(Default(value = "3.0"))]
    pub attack_radius: f32,
    /// A target this close at the end of a tick is caught.
    #[derivative(Default(value = "0.25"))]
    pub capture_radius: f32,
    #[derivative(Default(value = "4.0"))]
    pub withdrawal_start: f32,
    #[derivative(Default(value = "8.0"))]
    pub withdrawal_end: f32,
    /// A disabled predator neither moves nor hunts. Other predators still
    /// keep their distance from it.
    #[derivative(Default(value = "true"))]
    pub enabled: bool,
    #[reflect(ignore)]
    #[derivative(Default(value = "default_predator_weights()"))]
    pub weights: DemandWeights<PredatorDemand>,
}

impl Predator {
    pub fn with_locomotion(mut self, locomotion: Locomotion) -> Self {
        self.locomotion = locomotion;
        self
    }

    pub fn with_view_radius(mut self, radius: f32) -> Self {
        self.view_radius = radius;
        self
    }

    pub fn with_attack_radius(mut self, radius: f32) -> Self {
        self.attack_radius = radius;
        self
    }

    pub fn with_capture_radius(mut self, radius: f32) -> Self {
        self.capture_radius = radius;
        self
    }

    /// Set when the predator starts and finishes pulling away from an attack.
    pub fn with_withdrawal(mut self, start: f32, end: f32) -> Self {
        self.withdrawal_start = start;
        self.withdrawal_end = end;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_weight(mut self, demand: PredatorDemand, weight: f32) -> Self {
        self.weights[demand] = weight;
        self
    }

    /// Each weight as a share of the total, for display.
    pub fn normalized_weights(&self) -> DemandWeights<PredatorDemand> {
        normalized_weights(&self.weights)
    }
}

/// What a predator is currently doing, updated every tick.
#[derive(Component, Debug, Default, Clone)]
pub struct HuntState {
    kill_count: u32,
    time_since_attack_started: f32,
    target_group: Vec<Entity>,
    fringe_group: Vec<Entity>,
    demands: Demands<PredatorDemand>,
    total_demand: Vec3,
}

impl HuntState {
    /// Boids caught so far. Never decreases.
    pub fn kill_count(&self) -> u32 {
        self.kill_count
    }

    pub fn time_since_attack_started(&self) -> f32 {
        self.time_since_attack_started
    }

    /// The nearest boid and its neighbors, nearest first.
    pub fn target_group(&self) -> &[Entity] {
        &self.target_group
    }

    /// Boids next to the target group but not part of it.
    pub fn fringe_group(&self) -> &[Entity] {
        &self.fringe_group
    }

    pub fn demands(&self) -> &Demands<PredatorDemand> {
        &self.demands
    }

    pub fn total_demand(&self) -> Vec3 {
        self.total_demand
    }

    fn advance_clock(&mut self, delta_secs: f32, withdrawal_end: f32) {
        self.time_since_attack_started += delta_secs;
        if self.time_since_attack_started > withdrawal_end {
            self.time_since_attack_started = 0.0;
        }
    }
}

/// How far into the withdrawal phase the attack is: 0.0 before `start`,
/// 1.0 from `end`, linear in between.
pub fn withdrawal_weight(start: f32, end: f32, time: f32) -> f32 {
    if end <= start {
        return if time < start { 0.0 } else { 1.0 };
    }
    ((time - start) / (end - start)).clamp(0.0, 1.0)
}

/// Pick the target group (the nearest boid plus its neighbors) and the
/// fringe group (their neighbors outside the target group). Both lists
/// keep discovery order and hold no duplicates.
pub fn select_groups(roster: &FlockRoster, position: Vec3) -> (Vec<Entity>, Vec<Entity>) {
    let Some(closest) = nearest(roster.boids(), position) else {
        return (Vec::new(), Vec::new());
    };
    let target_group: Vec<Entity> = std::iter::once(closest.entity)
        .chain(roster.neighbors_of(closest.entity).map(|boid| boid.entity))
        .unique()
        .collect();
    let fringe_group = target_group
        .iter()
        .flat_map(|member| roster.neighbors_of(*member))
        .map(|boid| boid.entity)
        .filter(|entity| !target_group.contains(entity))
        .unique()
        .collect();
    (target_group, fringe_group)
}

/// Every demand acting on a predator this tick, before weighting.
/// `others` may include the predator itself; it is skipped.
pub fn compute_predator_demands(
    me: &AgentSnapshot,
    predator: &Predator,
    time_since_attack_started: f32,
    roster: &FlockRoster,
    target_group: &[Entity],
    fringe_group: &[Entity],
    others: &[AgentSnapshot],
) -> Demands<PredatorDemand> {
    let mut demands = Demands::<PredatorDemand>::default();
    let position = me.position();
    let withdrawal = withdrawal_weight(
        predator.withdrawal_start,
        predator.withdrawal_end,
        time_since_attack_started,
    );
    let commitment = 1.0 - withdrawal;
    let targets: Vec<&AgentSnapshot> = target_group
        .iter()
        .filter_map(|entity| roster.get(*entity))
        .collect();
    let fringes: Vec<&AgentSnapshot> = fringe_group
        .iter()
        .filter_map(|entity| roster.get(*entity))
        .collect();

    if !fringes.is_empty() {
        let toward = average_position(fringes.iter().copied()) - position;
        demands[PredatorDemand::Separation] = toward.normalize_or_zero() * commitment;
    }

    if !targets.is_empty() {
        let toward = average_position(targets.iter().copied()) - position;
        demands[PredatorDemand::Disruption] = toward.normalize_or_zero() * commitment;
    }

    if let Some(target) = nearest(targets.iter().copied(), position) {
        let toward = target.position() - position;
        let attack_radius_sqr = predator.attack_radius * predator.attack_radius;
        let proximity = 1.0 - saturate_ratio(toward.length_squared(), attack_radius_sqr);
        demands[PredatorDemand::Eagerness] = toward.normalize_or_zero() * proximity * commitment;
    }

    if !roster.is_empty() {
        let away = position - average_position(roster.boids());
        demands[PredatorDemand::Withdrawal] = away.normalize_or_zero() * withdrawal;
    }

    let rivals = others.iter().filter(|other| other.entity != me.entity);
    if let Some(rival) = nearest(rivals, position) {
        let toward = rival.position() - position;
        // Compared against the plain view radius, so rivals are only felt
        // when very close.
        let proximity = 1.0 - saturate_ratio(toward.length_squared(), predator.view_radius);
        demands[PredatorDemand::Independence] = -toward.normalize_or_zero() * proximity;
    }

    demands
}

#[derive(QueryData)]
#[query_data(mutable)]
pub(crate) struct HuntQuery {
    entity: Entity,
    predator: &'static Predator,
    state: &'static mut HuntState,
    transform: &'static mut Transform,
    velocity: &'static mut LinearVelocity,
    flap: &'static mut FlapSpeed,
    avoid: Option<(&'static AvoidObstacles, &'static NearbyObstacle)>,
}

pub(crate) fn hunt(
    time: Res<Time>,
    boids: Query<RosterQueryData, With<Boid>>,
    mut predators: Query<HuntQuery, Without<Boid>>,
    mut captures: MessageWriter<BoidCaptured>,
) {
    let delta_secs = time.delta_secs();
    let mut roster = living_roster(boids.iter());
    let snapshots: Vec<AgentSnapshot> = predators
        .iter()
        .map(|item| AgentSnapshot::new(item.entity, item.transform.translation, item.velocity.0))
        .collect();

    for mut item in predators.iter_mut() {
        let Some(me) = snapshots.iter().find(|s| s.entity == item.entity) else {
            continue;
        };
        let predator = item.predator;
        if !predator.enabled {
            continue;
        }
        let locomotion = predator.locomotion;

        let (target_group, fringe_group) = select_groups(&roster, me.position);
        let demands = compute_predator_demands(
            me,
            predator,
            item.state.time_since_attack_started,
            &roster,
            &target_group,
            &fringe_group,
            &snapshots,
        );
        let avoidance = item.avoid.map_or(Vec3::ZERO, |(avoid, nearby)| {
            obstacle_avoidance(
                me.position,
                me.velocity_normalized(),
                avoid.awareness_radius,
                nearby.surface_point,
            )
        });
        let total_demand = weighted_sum(&demands, &predator.weights) + avoidance;

        item.velocity.0 = locomotion.steer(me.velocity, total_demand);
        locomotion.integrate(&mut item.transform, item.velocity.0, delta_secs);
        *item.flap = FlapSpeed::from_velocity(item.velocity.0, locomotion.max_speed);

        let state = &mut *item.state;
        state.demands = demands;
        state.total_demand = total_demand;
        state.advance_clock(delta_secs, predator.withdrawal_end);

        let position = item.transform.translation;
        let capture_radius_sqr = predator.capture_radius * predator.capture_radius;
        let caught = nearest(
            target_group.iter().filter_map(|entity| roster.get(*entity)),
            position,
        )
        .filter(|target| target.position.distance_squared(position) <= capture_radius_sqr)
        .map(|target| target.entity);
        if let Some(boid) = caught {
            captures.write(BoidCaptured {
                boid,
                predator: item.entity,
            });
            state.kill_count += 1;
            roster.remove(boid);
            info!(
                "Predator {} caught boid {} ({} kills)",
                item.entity, boid, state.kill_count
            );
        }

        state.target_group = target_group;
        state.fringe_group = fringe_group;
    }
}
