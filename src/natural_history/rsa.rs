use super::{loads_or_default, IntraHost};
use crate::error::IxaError;
use crate::params::{AgeSeverityParams, RsaHistoryParams};
use crate::trajectory::Trajectory;
use crate::StrainId;
use rand::Rng;

/// Quadratic response-surface coefficients `[c0, x1, x2, x1*x2, x1^2, x2^2]` by day of
/// illness for the symptom score.
const SYMPTOM_COEFFICIENTS: [[f64; 6]; 11] = [
    [0.0028, -0.0219, -0.1371, 0.0805, 0.0065, 0.3258],
    [0.6238, 0.2043, -1.1329, -0.6542, 0.0141, -0.4606],
    [0.8332, 0.6492, -0.5557, -0.7593, 0.3423, -0.3726],
    [0.6610, 0.8267, -0.2723, -0.5517, 0.6364, 0.2271],
    [0.4482, 0.7849, -0.1936, -0.2763, 0.7802, 0.2816],
    [0.2708, 0.6001, -0.1848, -0.2685, 0.7596, 0.2400],
    [0.1590, 0.4117, -0.1449, -0.2353, 0.5750, 0.2031],
    [0.0922, 0.2702, -0.1086, -0.1761, 0.4037, 0.1516],
    [0.0533, 0.1730, -0.0806, -0.1327, 0.2722, 0.1053],
    [0.0311, 0.1088, -0.0582, -0.1003, 0.1767, 0.0716],
    [0.0181, 0.0680, -0.0410, -0.0736, 0.1127, 0.0488],
];

/// Same layout as [`SYMPTOM_COEFFICIENTS`], for the log viral load.
const VIRAL_LOAD_COEFFICIENTS: [[f64; 6]; 11] = [
    [1.7957, -0.3485, -4.4816, -0.1895, -0.1568, -1.6468],
    [3.2574, 0.3007, -1.1052, -0.6959, -0.0630, -2.0984],
    [2.7126, 0.8607, -0.2395, -0.4676, -0.0365, 0.5058],
    [2.1846, 1.4181, -0.2884, -0.2562, -0.1603, 0.5260],
    [1.5961, 1.9964, -0.3433, -0.2195, -0.0835, 0.5198],
    [0.9935, 2.5375, -0.4165, -0.2218, 0.0490, 0.6078],
    [0.4070, 3.0739, -0.4965, -0.2629, 0.0129, 0.6567],
    [-0.1908, 3.6330, -0.5486, -0.3169, -0.0335, 0.8026],
    [-0.8006, 4.2066, -0.6178, -0.3140, -0.0128, 0.9302],
    [-1.4123, 4.7840, -0.7109, -0.2540, 0.0305, 0.9870],
    [-2.0198, 5.3592, -0.8238, -0.1551, 0.0694, 0.9632],
];

const MAX_DAYS_SICK: usize = SYMPTOM_COEFFICIENTS.len() - 1;
const CLEARANCE_THRESHOLD: f64 = 1e-4;

fn response_surface(c: &[f64; 6], x1: f64, x2: f64) -> f64 {
    c[0] + c[1] * x1 + c[2] * x2 + c[3] * x1 * x2 + c[4] * x1 * x1 + c[5] * x2 * x2
}

/// Uniform in `[-0.5, 0.5]`.
fn random_phenotype<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.random::<f64>() - 0.5
}

/// Maps `age` linearly onto `[-0.5, 0.5]` between the two bounds, clamping outside them.
fn age_phenotype(age: f64, bounds: &AgeSeverityParams) -> f64 {
    let age = age.clamp(bounds.lower_age, bounds.upper_age);
    (age - bounds.lower_age) / (bounds.upper_age - bounds.lower_age) - 0.5
}

/// Response-surface model: two phenotype coordinates (recovery and severity) pick a point on
/// fitted daily symptom and viral load surfaces.
#[derive(Debug, Clone)]
pub struct RsaHistory {
    symptoms_scaling: f64,
    viral_infectivity_scaling: f64,
    days_sick: usize,
    age_severity: Option<AgeSeverityParams>,
}

impl RsaHistory {
    pub fn from_params(name: &str, params: &RsaHistoryParams) -> Result<Self, IxaError> {
        if !(1..=MAX_DAYS_SICK).contains(&params.days_sick) {
            return Err(IxaError::invalid_parameter(
                format!("{name}.days_sick"),
                format!("must be between 1 and {MAX_DAYS_SICK}"),
            ));
        }
        if params.viral_infectivity_scaling <= 0.0 {
            return Err(IxaError::invalid_parameter(
                format!("{name}.viral_infectivity_scaling"),
                "must be positive",
            ));
        }
        if let Some(bounds) = &params.age_severity {
            if bounds.upper_age <= bounds.lower_age {
                return Err(IxaError::invalid_parameter(
                    format!("{name}.age_severity"),
                    "upper_age must exceed lower_age",
                ));
            }
        }
        Ok(RsaHistory {
            symptoms_scaling: params.symptoms_scaling,
            viral_infectivity_scaling: params.viral_infectivity_scaling,
            days_sick: params.days_sick,
            age_severity: params.age_severity.clone(),
        })
    }

    /// Daily `(infectivity, symptomaticity)` after the latent day, stopping once the virus
    /// has cleared.
    fn daily_course(&self, x1: f64, x2: f64) -> Vec<(f64, f64)> {
        let mut course = Vec::with_capacity(self.days_sick);
        for day in 1..=self.days_sick {
            let symptoms = self.symptoms_scaling
                * response_surface(&SYMPTOM_COEFFICIENTS[day], x1, x2).max(0.0);
            let infectivity = (response_surface(&VIRAL_LOAD_COEFFICIENTS[day], x1, x2)
                / self.viral_infectivity_scaling)
                .max(0.0);
            if day > 4 && infectivity < CLEARANCE_THRESHOLD {
                break;
            }
            course.push((infectivity, symptoms));
        }
        course
    }
}

impl IntraHost for RsaHistory {
    fn get_trajectory<R: Rng + ?Sized>(
        &self,
        age: f64,
        loads: &[(StrainId, f64)],
        rng: &mut R,
    ) -> Trajectory {
        let x1 = match &self.age_severity {
            Some(bounds) => age_phenotype(age, bounds),
            None => random_phenotype(rng),
        };
        let x2 = random_phenotype(rng);
        let course = self.daily_course(x1, x2);

        // One latent day with nothing.
        let infectivity: Vec<f64> = std::iter::once(0.0)
            .chain(course.iter().map(|&(infectivity, _)| infectivity))
            .collect();
        let symptomaticity: Vec<f64> = std::iter::once(0.0)
            .chain(course.iter().map(|&(_, symptoms)| symptoms))
            .collect();

        let mut trajectory = Trajectory::new();
        for (strain, _) in loads_or_default(loads) {
            trajectory.set_infectivity(strain, infectivity.clone());
        }
        trajectory.set_symptomaticity(symptomaticity);
        trajectory
    }

    fn days_symptomatic<R: Rng + ?Sized>(&self, _age: f64, _rng: &mut R) -> usize {
        self.days_sick
    }

    fn max_days(&self) -> usize {
        self.days_sick + 1
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::DEFAULT_STRAIN;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(age_severity: Option<AgeSeverityParams>) -> RsaHistoryParams {
        RsaHistoryParams {
            symptoms_scaling: 1.0,
            viral_infectivity_scaling: 3.71,
            days_sick: 10,
            age_severity,
        }
    }

    #[test]
    fn course_starts_with_a_latent_day() {
        let model = RsaHistory::from_params("flu", &params(None)).unwrap();
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..100 {
            let trajectory = model.get_trajectory(30.0, &[], &mut rng);
            assert_eq!(trajectory.data_point(0).infectivity, 0.0);
            assert!(trajectory.duration() >= 5);
            assert!(trajectory.duration() <= model.max_days());
            assert!(trajectory
                .infectivity(DEFAULT_STRAIN)
                .unwrap()
                .iter()
                .all(|&v| v >= 0.0));
            assert!(trajectory.symptomaticity().iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn surface_matches_center_coefficients() {
        let model = RsaHistory::from_params("flu", &params(None)).unwrap();
        let course = model.daily_course(0.0, 0.0);
        assert!((course[0].0 - 3.2574 / 3.71).abs() < 1e-12);
        assert!((course[0].1 - 0.6238).abs() < 1e-12);
    }

    #[test]
    fn age_maps_onto_phenotype_range() {
        let bounds = AgeSeverityParams {
            lower_age: 18.0,
            upper_age: 65.0,
        };
        assert_eq!(age_phenotype(5.0, &bounds), -0.5);
        assert_eq!(age_phenotype(90.0, &bounds), 0.5);
        assert!((age_phenotype(41.5, &bounds)).abs() < 1e-12);
    }

    #[test]
    fn days_sick_is_bounded_by_the_tables() {
        let mut bad = params(None);
        bad.days_sick = 11;
        assert!(RsaHistory::from_params("flu", &bad).is_err());
    }
}
