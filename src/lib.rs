//! Disease progression and transmission for agent-based epidemic models.
//!
//! A [`Context`] holds the simulation state as typed data plugins. Diseases are registered from
//! parameters ([`disease::ContextDiseaseExt`], [`params::ContextParamsExt`]), people and groups
//! are added through [`population::ContextPopulationExt`] and [`group::ContextGroupsExt`], and
//! [`simulation::ContextSimulationExt`] runs the days.
//!
//! Each infection draws its course from the disease's natural history when it starts
//! ([`infection::Infection`], [`trajectory::Trajectory`]). Transmission inside a group follows
//! one of four contact models chosen by the kind of group ([`transmission`]).

pub mod age_map;
mod context;
pub mod disease;
pub mod distribution;
pub mod epidemic;
pub mod error;
pub mod group;
pub mod hashing;
pub mod infection;
pub mod log;
pub mod natural_history;
pub mod params;
pub mod population;
pub mod random;
pub mod simulation;
pub mod strain;
mod trait_map;
pub mod trajectory;
pub mod transmission;

pub use rand;

// All modules import `crate::TypeId` in case we want to change the underlying type of `TypeId`.
pub(crate) use std::any::TypeId;

#[inline(always)]
pub fn type_of<T: 'static>() -> TypeId {
    TypeId::of::<T>()
}

pub use context::{Context, DataPlugin};
pub use error::IxaError;
pub use crate::log::{debug, error, info, trace, warn};

/// A simulated day. Day 0 is the first day of the run.
pub type Day = i32;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PersonId(pub usize);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct GroupId(pub usize);

/// Index of a registered disease.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ConditionId(pub usize);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct StrainId(pub u32);

/// The strain every disease starts with.
pub const DEFAULT_STRAIN: StrainId = StrainId(0);
