//! Discretized day-count distributions for natural-history periods.

use crate::error::IxaError;
use crate::random::sample_cumulative;
use rand::Rng;
use serde::{Deserialize, Serialize};

const CDF_TOLERANCE: f64 = 1e-4;

/// A cumulative distribution over day counts: entry `i` is the probability that the period
/// lasts at most `i` days.
#[derive(Debug, Clone, PartialEq)]
pub struct DayDistribution {
    cumulative: Vec<f64>,
}

impl DayDistribution {
    pub fn new(name: &str, cumulative: Vec<f64>) -> Result<Self, IxaError> {
        check_valid_cdf(name, &cumulative)?;
        Ok(DayDistribution { cumulative })
    }

    /// A distribution that always yields `days`.
    pub fn constant(days: usize) -> Self {
        let mut cumulative = vec![0.0; days];
        cumulative.push(1.0);
        DayDistribution { cumulative }
    }

    pub fn max_days(&self) -> usize {
        self.cumulative.len() - 1
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        sample_cumulative(rng, &self.cumulative)
    }
}

fn check_valid_cdf(name: &str, cumulative: &[f64]) -> Result<(), IxaError> {
    let Some(&last) = cumulative.last() else {
        return Err(IxaError::invalid_parameter(name, "distribution is empty"));
    };
    if cumulative.iter().any(|&w| !(0.0..=1.0).contains(&w)) {
        return Err(IxaError::invalid_parameter(
            name,
            "cumulative weights must be between 0 and 1",
        ));
    }
    if !cumulative.is_sorted() {
        return Err(IxaError::invalid_parameter(
            name,
            "cumulative weights must be non-decreasing",
        ));
    }
    if (last - 1.0).abs() > CDF_TOLERANCE {
        return Err(IxaError::invalid_parameter(
            name,
            format!("cumulative weights must end at 1, found {last}"),
        ));
    }
    Ok(())
}

/// Configuration form of a period distribution: either one cumulative array for everyone or
/// one per age group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeriodDistributionParams {
    Single(Vec<f64>),
    ByAge {
        /// Upper age bound of each group.
        age_groups: Vec<f64>,
        distributions: Vec<Vec<f64>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeriodDistribution {
    Single(DayDistribution),
    ByAge {
        age_groups: Vec<f64>,
        distributions: Vec<DayDistribution>,
    },
}

impl PeriodDistribution {
    pub fn from_params(name: &str, params: &PeriodDistributionParams) -> Result<Self, IxaError> {
        match params {
            PeriodDistributionParams::Single(cumulative) => Ok(PeriodDistribution::Single(
                DayDistribution::new(name, cumulative.clone())?,
            )),
            PeriodDistributionParams::ByAge {
                age_groups,
                distributions,
            } => {
                if age_groups.is_empty() || age_groups.len() != distributions.len() {
                    return Err(IxaError::invalid_parameter(
                        name,
                        "each age group needs exactly one distribution",
                    ));
                }
                if !age_groups.is_sorted() {
                    return Err(IxaError::invalid_parameter(
                        name,
                        "age groups must be non-decreasing",
                    ));
                }
                let distributions = distributions
                    .iter()
                    .enumerate()
                    .map(|(i, cumulative)| {
                        DayDistribution::new(&format!("{name}[{i}]"), cumulative.clone())
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PeriodDistribution::ByAge {
                    age_groups: age_groups.clone(),
                    distributions,
                })
            }
        }
    }

    fn for_age(&self, age: f64) -> &DayDistribution {
        match self {
            PeriodDistribution::Single(distribution) => distribution,
            // Ages past the last bound use the oldest group.
            PeriodDistribution::ByAge {
                age_groups,
                distributions,
            } => {
                let group = age_groups
                    .iter()
                    .position(|&bound| age < bound)
                    .unwrap_or(distributions.len() - 1);
                &distributions[group]
            }
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, age: f64, rng: &mut R) -> usize {
        self.for_age(age).sample(rng)
    }

    pub fn max_days(&self) -> usize {
        match self {
            PeriodDistribution::Single(distribution) => distribution.max_days(),
            PeriodDistribution::ByAge { distributions, .. } => distributions
                .iter()
                .map(DayDistribution::max_days)
                .max()
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn samples_stay_within_support() {
        let distribution = DayDistribution::new("days", vec![0.0, 0.2, 0.7, 1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100_000 {
            let days = distribution.sample(&mut rng);
            assert!((1..=3).contains(&days));
        }
        assert_eq!(distribution.max_days(), 3);
    }

    #[test]
    fn constant_distribution_always_yields_its_value() {
        let distribution = DayDistribution::constant(4);
        let mut rng = StdRng::seed_from_u64(5);
        assert!((0..100).all(|_| distribution.sample(&mut rng) == 4));
    }

    #[test]
    fn invalid_distributions_name_the_parameter() {
        for cumulative in [vec![], vec![0.5, 0.2, 1.0], vec![0.2, 0.6], vec![-0.1, 1.0]] {
            match DayDistribution::new("flu.days_symptomatic", cumulative) {
                Err(IxaError::InvalidParameter { name, .. }) => {
                    assert_eq!(name, "flu.days_symptomatic");
                }
                other => panic!("expected a parameter error, got {other:?}"),
            }
        }
    }

    #[test]
    fn age_stratified_distribution_picks_group() {
        let params: PeriodDistributionParams = serde_json::from_str(
            r#"{"age_groups": [18.0, 120.0], "distributions": [[0.0, 1.0], [0.0, 0.0, 0.0, 1.0]]}"#,
        )
        .unwrap();
        let distribution = PeriodDistribution::from_params("days", &params).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(distribution.sample(10.0, &mut rng), 1);
        assert_eq!(distribution.sample(40.0, &mut rng), 3);
        assert_eq!(distribution.sample(150.0, &mut rng), 3);
        assert_eq!(distribution.max_days(), 3);
    }

    #[test]
    fn mismatched_age_groups_are_rejected() {
        let params = PeriodDistributionParams::ByAge {
            age_groups: vec![18.0, 120.0],
            distributions: vec![vec![1.0]],
        };
        assert!(PeriodDistribution::from_params("days", &params).is_err());
    }
}
