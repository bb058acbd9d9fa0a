use super::{loads_or_default, IntraHost};
use crate::age_map::AgeMap;
use crate::distribution::PeriodDistribution;
use crate::error::IxaError;
use crate::params::{DefaultHistoryParams, Progression, SymptomProbabilityParams};
use crate::trajectory::Trajectory;
use crate::StrainId;
use rand::Rng;
use std::iter;

#[derive(Debug, Clone)]
pub enum SymptomProbability {
    Scalar(f64),
    ByAge(AgeMap),
}

impl SymptomProbability {
    pub fn at_age(&self, age: f64) -> f64 {
        match self {
            SymptomProbability::Scalar(p) => *p,
            SymptomProbability::ByAge(map) => map.find_value(age),
        }
    }
}

/// Latent, asymptomatic and symptomatic phases drawn from day-count distributions, each
/// with a constant infectivity.
#[derive(Debug, Clone)]
pub struct ProgressionHistory {
    progression: Progression,
    prob_symptoms: SymptomProbability,
    days_latent: PeriodDistribution,
    days_asymptomatic: PeriodDistribution,
    days_symptomatic: PeriodDistribution,
    asymptomatic_infectivity: f64,
    symptomatic_infectivity: f64,
}

impl ProgressionHistory {
    pub fn from_params(name: &str, params: &DefaultHistoryParams) -> Result<Self, IxaError> {
        let prob_symptoms = match &params.prob_symptoms {
            SymptomProbabilityParams::Scalar(p) => {
                if !(0.0..=1.0).contains(p) {
                    return Err(IxaError::invalid_parameter(
                        format!("{name}.prob_symptoms"),
                        "must be between 0 and 1",
                    ));
                }
                SymptomProbability::Scalar(*p)
            }
            SymptomProbabilityParams::ByAge(flat) => SymptomProbability::ByAge(
                AgeMap::from_flat(&format!("{name}.prob_symptoms"), flat)?,
            ),
        };
        for (field, value) in [
            ("asymptomatic_infectivity", params.asymptomatic_infectivity),
            ("symptomatic_infectivity", params.symptomatic_infectivity),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(IxaError::invalid_parameter(
                    format!("{name}.{field}"),
                    "must be a non-negative number",
                ));
            }
        }
        Ok(ProgressionHistory {
            progression: params.progression,
            prob_symptoms,
            days_latent: PeriodDistribution::from_params(
                &format!("{name}.days_latent"),
                &params.days_latent,
            )?,
            days_asymptomatic: PeriodDistribution::from_params(
                &format!("{name}.days_asymptomatic"),
                &params.days_asymptomatic,
            )?,
            days_symptomatic: PeriodDistribution::from_params(
                &format!("{name}.days_symptomatic"),
                &params.days_symptomatic,
            )?,
            asymptomatic_infectivity: params.asymptomatic_infectivity,
            symptomatic_infectivity: params.symptomatic_infectivity,
        })
    }

    pub fn prob_symptoms(&self) -> &SymptomProbability {
        &self.prob_symptoms
    }

    /// Phase lengths `(latent, asymptomatic, symptomatic)` of a new infection.
    fn draw_phases<R: Rng + ?Sized>(&self, age: f64, rng: &mut R) -> (usize, usize, usize) {
        let will_be_symptomatic = rng.random::<f64>() < self.prob_symptoms.at_age(age);
        let latent = self.days_latent.sample(age, rng);
        let (asymptomatic, symptomatic) = match self.progression {
            Progression::Sequential => {
                let asymptomatic = self.days_asymptomatic.sample(age, rng);
                let symptomatic = if will_be_symptomatic {
                    self.days_symptomatic.sample(age, rng)
                } else {
                    0
                };
                (asymptomatic, symptomatic)
            }
            Progression::Branching => {
                if will_be_symptomatic {
                    (0, self.days_symptomatic.sample(age, rng))
                } else {
                    (self.days_asymptomatic.sample(age, rng), 0)
                }
            }
        };
        (latent, asymptomatic, symptomatic)
    }
}

impl IntraHost for ProgressionHistory {
    fn get_trajectory<R: Rng + ?Sized>(
        &self,
        age: f64,
        loads: &[(StrainId, f64)],
        rng: &mut R,
    ) -> Trajectory {
        let (latent, asymptomatic, symptomatic) = self.draw_phases(age, rng);

        let infectivity: Vec<f64> = iter::repeat_n(0.0, latent)
            .chain(iter::repeat_n(self.asymptomatic_infectivity, asymptomatic))
            .chain(iter::repeat_n(self.symptomatic_infectivity, symptomatic))
            .collect();
        let symptomaticity: Vec<f64> = iter::repeat_n(0.0, latent + asymptomatic)
            .chain(iter::repeat_n(1.0, symptomatic))
            .collect();

        let mut trajectory = Trajectory::new();
        for (strain, _) in loads_or_default(loads) {
            trajectory.set_infectivity(strain, infectivity.clone());
        }
        trajectory.set_symptomaticity(symptomaticity);
        trajectory
    }

    fn days_symptomatic<R: Rng + ?Sized>(&self, age: f64, rng: &mut R) -> usize {
        self.days_symptomatic.sample(age, rng)
    }

    fn max_days(&self) -> usize {
        self.days_latent.max_days()
            + self.days_asymptomatic.max_days()
            + self.days_symptomatic.max_days()
    }
}
