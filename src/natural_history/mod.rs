//! Within-host models that turn an exposure into a [`Trajectory`].
//!
//! Every disease picks one model when it is registered. All models share the [`IntraHost`]
//! interface; [`NaturalHistory`] dispatches to the configured one.

mod default;
mod fixed;
mod markov;
mod ode;
mod rsa;

pub use default::{ProgressionHistory, SymptomProbability};
pub use fixed::FixedHistory;
pub use markov::MarkovHistory;
pub use ode::{OdeHistory, WithinHostModel};
pub use rsa::RsaHistory;

use crate::error::IxaError;
use crate::params::NaturalHistoryParams;
use crate::trajectory::Trajectory;
use crate::{StrainId, DEFAULT_STRAIN};
use rand::Rng;

pub trait IntraHost {
    /// Draws the course of a new infection of a host of the given age. `loads` holds the
    /// share of each strain in the inoculum; an empty slice means the default strain alone.
    fn get_trajectory<R: Rng + ?Sized>(
        &self,
        age: f64,
        loads: &[(StrainId, f64)],
        rng: &mut R,
    ) -> Trajectory;

    /// Draws the length of a symptomatic period, for infections that start showing symptoms
    /// after an intervention.
    fn days_symptomatic<R: Rng + ?Sized>(&self, age: f64, rng: &mut R) -> usize;

    /// Longest trajectory the model can produce.
    fn max_days(&self) -> usize;
}

fn loads_or_default(loads: &[(StrainId, f64)]) -> Vec<(StrainId, f64)> {
    if loads.is_empty() {
        vec![(DEFAULT_STRAIN, 1.0)]
    } else {
        loads.to_vec()
    }
}

#[derive(Debug, Clone)]
pub enum NaturalHistory {
    Default(ProgressionHistory),
    Fixed(FixedHistory),
    Rsa(RsaHistory),
    Ode(OdeHistory),
    Markov(MarkovHistory),
}

impl NaturalHistory {
    /// Builds the configured model. `name` prefixes parameter names in errors.
    pub fn from_params(name: &str, params: &NaturalHistoryParams) -> Result<Self, IxaError> {
        Ok(match params {
            NaturalHistoryParams::Default(params) => {
                NaturalHistory::Default(ProgressionHistory::from_params(name, params)?)
            }
            NaturalHistoryParams::Fixed(params) => {
                NaturalHistory::Fixed(FixedHistory::from_params(name, params)?)
            }
            NaturalHistoryParams::Rsa(params) => {
                NaturalHistory::Rsa(RsaHistory::from_params(name, params)?)
            }
            NaturalHistoryParams::Ode(params) => {
                NaturalHistory::Ode(OdeHistory::from_params(name, params)?)
            }
            NaturalHistoryParams::Markov(params) => {
                NaturalHistory::Markov(MarkovHistory::from_params(name, params)?)
            }
        })
    }
}

impl IntraHost for NaturalHistory {
    fn get_trajectory<R: Rng + ?Sized>(
        &self,
        age: f64,
        loads: &[(StrainId, f64)],
        rng: &mut R,
    ) -> Trajectory {
        match self {
            NaturalHistory::Default(model) => model.get_trajectory(age, loads, rng),
            NaturalHistory::Fixed(model) => model.get_trajectory(age, loads, rng),
            NaturalHistory::Rsa(model) => model.get_trajectory(age, loads, rng),
            NaturalHistory::Ode(model) => model.get_trajectory(age, loads, rng),
            NaturalHistory::Markov(model) => model.get_trajectory(age, loads, rng),
        }
    }

    fn days_symptomatic<R: Rng + ?Sized>(&self, age: f64, rng: &mut R) -> usize {
        match self {
            NaturalHistory::Default(model) => model.days_symptomatic(age, rng),
            NaturalHistory::Fixed(model) => model.days_symptomatic(age, rng),
            NaturalHistory::Rsa(model) => model.days_symptomatic(age, rng),
            NaturalHistory::Ode(model) => model.days_symptomatic(age, rng),
            NaturalHistory::Markov(model) => model.days_symptomatic(age, rng),
        }
    }

    fn max_days(&self) -> usize {
        match self {
            NaturalHistory::Default(model) => model.max_days(),
            NaturalHistory::Fixed(model) => model.max_days(),
            NaturalHistory::Rsa(model) => model.max_days(),
            NaturalHistory::Ode(model) => model.max_days(),
            NaturalHistory::Markov(model) => model.max_days(),
        }
    }
}
