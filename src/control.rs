use bevy::prelude::*;
use enum_map::{Enum, EnumArray, EnumMap};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::SMALL_THRESHOLD;

/// The steering influences acting on a boid.
#[derive(Debug, Copy, Clone, Enum, Hash, PartialEq, Eq, Display)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum BoidDemand {
    /// Head toward the leader.
    Obedience,
    /// Steer clear of neighbors predicted to come too close.
    Avoidance,
    /// Match the heading of nearby neighbors.
    Alignment,
    /// Move toward the middle of the neighborhood.
    Cohesion,
    /// A fresh random direction every tick.
    Randomness,
    /// Flee predators predicted to come within view.
    Evasion,
}

/// The steering influences acting on a predator.
#[derive(Debug, Copy, Clone, Enum, Hash, PartialEq, Eq, Display)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum PredatorDemand {
    /// Cut between the target group and the fringe around it.
    Separation,
    /// Drive into the middle of the target group.
    Disruption,
    /// Lunge at the nearest target, harder the closer it is.
    Eagerness,
    /// Pull away from the flock late in an attack.
    Withdrawal,
    /// Keep away from other predators.
    Independence,
}

/// One unweighted steering vector per demand kind.
pub type Demands<K> = EnumMap<K, Vec3>;

/// One weight per demand kind. Weights are independent of each other and
/// do not need to sum to one.
pub type DemandWeights<K> = EnumMap<K, f32>;

/// Scale every demand by its weight and add them up.
pub fn weighted_sum<K>(demands: &Demands<K>, weights: &DemandWeights<K>) -> Vec3
where
    K: EnumArray<Vec3> + EnumArray<f32>,
{
    demands
        .iter()
        .map(|(kind, demand)| *demand * weights[kind])
        .sum()
}

/// Each weight as a share of the total. Only useful for showing the
/// relative strength of each demand; steering uses the raw weights.
pub fn normalized_weights<K>(weights: &DemandWeights<K>) -> DemandWeights<K>
where
    K: EnumArray<f32> + Copy,
{
    let total: f32 = weights.values().sum();
    if total.abs() < SMALL_THRESHOLD {
        return DemandWeights::default();
    }
    EnumMap::from_fn(|kind| weights[kind] / total)
}
