use avian3d::prelude::LinearVelocity;
use bevy::prelude::*;

use crate::{agent::FlapSpeed, boid::Boid, settings::FlockSettings};

/// How long a dead boid keeps falling before it should be removed.
pub const REMOVAL_DELAY: f32 = 5.0;

/// Whether a boid is alive, and if not, how long ago it died. A dead boid
/// never comes back to life; the host replaces it with a new entity.
#[derive(Component, Debug, Default, Copy, Clone, PartialEq, Reflect)]
#[reflect(Component)]
pub enum LifeState {
    #[default]
    Alive,
    Dead {
        /// Seconds since death. Only ever increases.
        elapsed: f32,
    },
}

impl LifeState {
    pub fn is_alive(&self) -> bool {
        matches!(self, LifeState::Alive)
    }

    pub fn is_dead(&self) -> bool {
        !self.is_alive()
    }

    pub fn time_since_death(&self) -> Option<f32> {
        match self {
            LifeState::Alive => None,
            LifeState::Dead { elapsed } => Some(*elapsed),
        }
    }

    /// Mark the agent as dead. Returns false, changing nothing, if it
    /// was already dead.
    pub fn kill(&mut self) -> bool {
        if self.is_dead() {
            return false;
        }
        *self = LifeState::Dead { elapsed: 0.0 };
        true
    }

    /// Advance the removal timer. Returns true on the one tick where the
    /// time since death first exceeds [REMOVAL_DELAY].
    pub fn tick(&mut self, delta_secs: f32) -> bool {
        let LifeState::Dead { elapsed } = self else {
            return false;
        };
        let expired_before = *elapsed > REMOVAL_DELAY;
        *elapsed += delta_secs;
        !expired_before && *elapsed > REMOVAL_DELAY
    }
}

/// Sent when a predator catches a boid. The boid is killed when the
/// message is applied, not by the predator directly.
#[derive(Message, Debug, Copy, Clone, PartialEq, Eq)]
pub struct BoidCaptured {
    pub boid: Entity,
    pub predator: Entity,
}

/// Sent once for each dead boid whose removal timer has run out. The host
/// should despawn the entity.
#[derive(Message, Debug, Copy, Clone, PartialEq, Eq)]
pub struct BoidExpired {
    pub boid: Entity,
}

pub(crate) fn apply_captures(
    mut captures: MessageReader<BoidCaptured>,
    mut boids: Query<&mut LifeState, With<Boid>>,
) {
    for capture in captures.read() {
        let Ok(mut life) = boids.get_mut(capture.boid) else {
            continue;
        };
        if !life.kill() {
            debug!("Ignoring capture of already dead boid {}", capture.boid);
        }
    }
}

/// Dead boids stop steering and fall under gravity until their removal
/// timer runs out.
pub(crate) fn fall_dead_boids(
    settings: Res<FlockSettings>,
    time: Res<Time>,
    mut boids: Query<
        (
            Entity,
            &mut LifeState,
            &mut Transform,
            &mut LinearVelocity,
            &mut FlapSpeed,
        ),
        With<Boid>,
    >,
    mut expired: MessageWriter<BoidExpired>,
) {
    let delta_secs = time.delta_secs();
    let locomotion = settings.locomotion;
    for (entity, mut life, mut transform, mut velocity, mut flap) in boids.iter_mut() {
        if life.is_alive() {
            continue;
        }
        velocity.0 += settings.gravity * delta_secs;
        if life.tick(delta_secs) {
            debug!("Boid {} finished falling", entity);
            expired.write(BoidExpired { boid: entity });
            continue;
        }
        velocity.0 = locomotion.limit_speed(velocity.0);
        locomotion.integrate(&mut transform, velocity.0, delta_secs);
        *flap = FlapSpeed::from_velocity(velocity.0, locomotion.max_speed);
    }
}
