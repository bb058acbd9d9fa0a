use super::{loads_or_default, IntraHost};
use crate::distribution::DayDistribution;
use crate::error::IxaError;
use crate::params::{FixedHistoryParams, FixedProfileParams};
use crate::trajectory::Trajectory;
use crate::StrainId;
use rand::Rng;
use std::path::Path;

/// Draws one of a library of precomputed profiles. Each strain of the inoculum gets the
/// profile's infectivity scaled by its load.
#[derive(Debug, Clone)]
pub struct FixedHistory {
    profiles: Vec<FixedProfileParams>,
    probabilities: DayDistribution,
}

/// Reads one profile per row. The header row is skipped and rows may differ in length.
fn read_profiles_csv(path: &Path) -> Result<Vec<Vec<f64>>, IxaError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut profiles = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let profile = record
            .iter()
            .filter(|field| !field.is_empty())
            .map(|field| {
                field.parse::<f64>().map_err(|_| {
                    IxaError::IxaError(format!(
                        "{}: row {} has a non-numeric value `{field}`",
                        path.display(),
                        row + 1
                    ))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        profiles.push(profile);
    }
    Ok(profiles)
}

impl FixedHistory {
    pub fn from_params(name: &str, params: &FixedHistoryParams) -> Result<Self, IxaError> {
        let mut profiles = params.profiles.clone();
        match (&params.infectivity_file, &params.symptomaticity_file) {
            (Some(infectivity_file), Some(symptomaticity_file)) => {
                let infectivity = read_profiles_csv(infectivity_file)?;
                let symptomaticity = read_profiles_csv(symptomaticity_file)?;
                if infectivity.len() != symptomaticity.len() {
                    return Err(IxaError::invalid_parameter(
                        format!("{name}.symptomaticity_file"),
                        format!(
                            "has {} profiles but the infectivity file has {}",
                            symptomaticity.len(),
                            infectivity.len()
                        ),
                    ));
                }
                profiles.extend(infectivity.into_iter().zip(symptomaticity).map(
                    |(infectivity, symptomaticity)| FixedProfileParams {
                        infectivity,
                        symptomaticity,
                    },
                ));
            }
            (None, None) => {}
            _ => {
                return Err(IxaError::invalid_parameter(
                    format!("{name}.infectivity_file"),
                    "infectivity and symptomaticity files must be given together",
                ));
            }
        }

        if profiles.is_empty() {
            return Err(IxaError::invalid_parameter(
                format!("{name}.profiles"),
                "the profile library is empty",
            ));
        }
        if params.probabilities.len() != profiles.len() {
            return Err(IxaError::invalid_parameter(
                format!("{name}.probabilities"),
                format!(
                    "needs one cumulative probability per profile ({})",
                    profiles.len()
                ),
            ));
        }
        let probabilities =
            DayDistribution::new(&format!("{name}.probabilities"), params.probabilities.clone())?;
        Ok(FixedHistory {
            profiles,
            probabilities,
        })
    }

    fn draw_profile<R: Rng + ?Sized>(&self, rng: &mut R) -> &FixedProfileParams {
        &self.profiles[self.probabilities.sample(rng)]
    }
}

impl IntraHost for FixedHistory {
    fn get_trajectory<R: Rng + ?Sized>(
        &self,
        _age: f64,
        loads: &[(StrainId, f64)],
        rng: &mut R,
    ) -> Trajectory {
        let profile = self.draw_profile(rng);
        let mut trajectory = Trajectory::new();
        for (strain, load) in loads_or_default(loads) {
            trajectory.set_infectivity(
                strain,
                profile.infectivity.iter().map(|value| value * load).collect(),
            );
        }
        trajectory.set_symptomaticity(profile.symptomaticity.clone());
        trajectory
    }

    fn days_symptomatic<R: Rng + ?Sized>(&self, _age: f64, rng: &mut R) -> usize {
        self.draw_profile(rng)
            .symptomaticity
            .iter()
            .filter(|&&value| value > 0.0)
            .count()
    }

    fn max_days(&self) -> usize {
        self.profiles
            .iter()
            .map(|p| p.infectivity.len().max(p.symptomaticity.len()))
            .max()
            .unwrap_or(0)
    }
}
