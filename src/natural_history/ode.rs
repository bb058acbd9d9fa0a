//! Multi-strain within-host immune response model.
//!
//! Each strain carries five state variables (viral load `V`, infected cells `I`, plasma cells
//! `P`, antibodies `A`, antigenic distance `S`); the host carries five shared ones (healthy
//! cells `H`, antigen presenting cells `M`, interferon `F`, resistant cells `R`, effector
//! cells `E`). The system is integrated once per infection with a fixed-step fourth-order
//! Runge-Kutta scheme and sampled at the end of every day.

use super::{loads_or_default, IntraHost};
use crate::error::IxaError;
use crate::params::OdeHistoryParams;
use crate::trajectory::Trajectory;
use crate::StrainId;
use rand::Rng;
use rand_distr::{Distribution, Normal};

const PER_STRAIN: usize = 5;
const VIRUS: usize = 0;
const INFECTED: usize = 1;
const PLASMA: usize = 2;
const ANTIBODY: usize = 3;
const DISTANCE: usize = 4;

const SHARED: usize = 5;
const HEALTHY: usize = 0;
const APC: usize = 1;
const INTERFERON: usize = 2;
const RESISTANT: usize = 3;
const EFFECTOR: usize = 4;

const INOCULUM_SIGMA: f64 = 0.005;
const INOCULUM_MIN: f64 = 0.005;
const INOCULUM_MAX: f64 = 0.5;
const VIRAL_LOAD_MAX: f64 = 100.0;

/// Rate constants of the within-host model.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::struct_field_names)]
pub struct WithinHostModel {
    pub g_v: f64,
    pub g_vh: f64,
    pub g_hv: f64,
    pub b_pm: f64,
    pub b_mv: f64,
    pub g_av: f64,
    pub a_i: f64,
    pub a_v: f64,
    pub g_va: f64,
    pub a_v1: f64,
    pub a_v2: f64,
    pub b_hd: f64,
    pub a_r: f64,
    pub b_hf: f64,
    pub b_ie: f64,
    pub b_md: f64,
    pub a_m: f64,
    pub b_f: f64,
    pub c_f: f64,
    pub b_fh: f64,
    pub a_f: f64,
    pub b_em: f64,
    pub b_ei: f64,
    pub a_e: f64,
    pub a_p: f64,
    pub b_a: f64,
    pub a_a: f64,
    pub r_s: f64,
}

impl Default for WithinHostModel {
    fn default() -> Self {
        WithinHostModel {
            g_v: 582.0,
            g_vh: 1.23,
            g_hv: 0.688,
            b_pm: 2.0,
            b_mv: 0.0867,
            g_av: 277.0,
            a_i: 1.63,
            a_v: 3.9,
            g_va: 343.0,
            a_v1: 78.9,
            a_v2: 17764.0,
            b_hd: 4.75,
            a_r: 2.0,
            b_hf: 0.019,
            b_ie: 0.0088,
            b_md: 4.18,
            a_m: 0.658,
            b_f: 85203.0,
            c_f: 1024.0,
            b_fh: 19.8,
            a_f: 4.41,
            b_em: 2.65,
            b_ei: 1.16,
            a_e: 0.75,
            a_p: 0.0736,
            b_a: 0.00484,
            a_a: 0.00484,
            r_s: 1.1e-5,
        }
    }
}

impl WithinHostModel {
    /// Initial state for the given inoculum per strain.
    pub fn initial_state(inocula: &[f64]) -> Vec<f64> {
        let mut state = Vec::with_capacity(inocula.len() * PER_STRAIN + SHARED);
        for &inoculum in inocula {
            state.extend_from_slice(&[inoculum, 0.0, 1.0, 1.0, 0.1]);
        }
        // H, M, F, R, E
        state.extend_from_slice(&[1.0, 0.0, 0.0, 0.0, 1.0]);
        state
    }

    /// Writes the time derivative of `y` into `dy`.
    pub fn right_hand_side(&self, y: &[f64], dy: &mut [f64]) {
        let strains = (y.len() - SHARED) / PER_STRAIN;
        let shared = strains * PER_STRAIN;
        let (h, m, f, r, e) = (
            y[shared + HEALTHY],
            y[shared + APC],
            y[shared + INTERFERON],
            y[shared + RESISTANT],
            y[shared + EFFECTOR],
        );
        let infected: f64 = (0..strains).map(|s| y[s * PER_STRAIN + INFECTED]).sum();

        let mut d_f = self.b_f * m - self.b_fh * h * f - self.a_f * f;
        let d_r = self.b_hf * f * h - self.a_r * r;
        let d_e = self.b_em * m * e - self.b_ei * infected * e + self.a_e * (1.0 - e);
        let mut d_h = self.b_hd * (1.0 - h - r) * (h + r) + self.a_r * r - self.b_hf * f * h;
        let mut d_m = -self.a_m * m;

        for s in 0..strains {
            let base = s * PER_STRAIN;
            let (v, i, p, a, ag) = (
                y[base + VIRUS],
                y[base + INFECTED],
                y[base + PLASMA],
                y[base + ANTIBODY],
                y[base + DISTANCE],
            );
            d_f += self.c_f * i;
            d_h -= self.b_hd * i * (h + r) + self.g_hv * v * h;
            d_m += (1.0 - m) * (self.b_md * (1.0 - h - r - infected) + self.b_mv * v);

            dy[base + VIRUS] = self.g_v * i
                - self.g_va * ag * a * v
                - self.g_vh * h * v
                - self.a_v * v
                - self.a_v1 * v / (1.0 + self.a_v2 * v);
            dy[base + INFECTED] = self.g_hv * v * h - self.b_ie * e * i - self.a_i * i;
            dy[base + PLASMA] = self.b_pm * m * p + self.a_p * (1.0 - p);
            dy[base + ANTIBODY] = self.b_a * p - self.g_av * ag * a * v - self.a_a * a;
            dy[base + DISTANCE] = self.r_s * p * (1.0 - ag);
        }

        dy[shared + HEALTHY] = d_h;
        dy[shared + APC] = d_m;
        dy[shared + INTERFERON] = d_f;
        dy[shared + RESISTANT] = d_r;
        dy[shared + EFFECTOR] = d_e;
    }

    /// Advances `y` by one Runge-Kutta step of size `dt`.
    fn rk4_step(&self, y: &mut [f64], dt: f64, k: &mut [Vec<f64>; 4], scratch: &mut [f64]) {
        self.right_hand_side(y, &mut k[0]);
        for ((s, &y0), &k0) in scratch.iter_mut().zip(y.iter()).zip(k[0].iter()) {
            *s = y0 + 0.5 * dt * k0;
        }
        self.right_hand_side(scratch, &mut k[1]);
        for ((s, &y0), &k1) in scratch.iter_mut().zip(y.iter()).zip(k[1].iter()) {
            *s = y0 + 0.5 * dt * k1;
        }
        self.right_hand_side(scratch, &mut k[2]);
        for ((s, &y0), &k2) in scratch.iter_mut().zip(y.iter()).zip(k[2].iter()) {
            *s = y0 + dt * k2;
        }
        self.right_hand_side(scratch, &mut k[3]);
        for (n, value) in y.iter_mut().enumerate() {
            *value += dt / 6.0 * (k[0][n] + 2.0 * k[1][n] + 2.0 * k[2][n] + k[3][n]);
            // Populations cannot go negative; clip integration overshoot.
            *value = value.max(0.0);
        }
    }

    /// Integrates from `initial` and returns the state at the end of each of `days` days.
    pub fn solve(&self, initial: &[f64], days: usize, step_size: f64) -> Vec<Vec<f64>> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps_per_day = (1.0 / step_size).round().max(1.0) as usize;
        let dt = 1.0 / steps_per_day as f64;
        let n = initial.len();
        let mut y = initial.to_vec();
        let mut k = [vec![0.0; n], vec![0.0; n], vec![0.0; n], vec![0.0; n]];
        let mut scratch = vec![0.0; n];
        let mut samples = Vec::with_capacity(days);
        for _ in 0..days {
            for _ in 0..steps_per_day {
                self.rk4_step(&mut y, dt, &mut k, &mut scratch);
            }
            samples.push(y.clone());
        }
        samples
    }
}

/// Natural history read off the within-host model: infectivity follows each strain's viral
/// load, symptoms follow interferon.
#[derive(Debug, Clone)]
pub struct OdeHistory {
    model: WithinHostModel,
    viral_titer_scaling: f64,
    viral_titer_latent_threshold: f64,
    interferon_scaling: f64,
    interferon_threshold: f64,
    duration: usize,
    step_size: f64,
}

impl OdeHistory {
    pub fn from_params(name: &str, params: &OdeHistoryParams) -> Result<Self, IxaError> {
        for (field, value) in [
            ("viral_titer_scaling", params.viral_titer_scaling),
            ("interferon_scaling", params.interferon_scaling),
            ("step_size", params.step_size),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(IxaError::invalid_parameter(
                    format!("{name}.{field}"),
                    "must be positive",
                ));
            }
        }
        if params.step_size > 1.0 {
            return Err(IxaError::invalid_parameter(
                format!("{name}.step_size"),
                "must not exceed one day",
            ));
        }
        if params.duration == 0 {
            return Err(IxaError::invalid_parameter(
                format!("{name}.duration"),
                "must be at least one day",
            ));
        }
        Ok(OdeHistory {
            model: WithinHostModel::default(),
            viral_titer_scaling: params.viral_titer_scaling,
            viral_titer_latent_threshold: params.viral_titer_latent_threshold,
            interferon_scaling: params.interferon_scaling,
            interferon_threshold: params.interferon_threshold,
            duration: params.duration,
            step_size: params.step_size,
        })
    }

    /// Initial viral load for a strain transmitted with relative load `load`.
    fn inoculum<R: Rng + ?Sized>(&self, load: f64, rng: &mut R) -> f64 {
        let mu =
            (load * self.viral_titer_scaling / VIRAL_LOAD_MAX * INOCULUM_MAX).max(INOCULUM_MIN);
        Normal::new(mu, INOCULUM_SIGMA)
            .map_or(mu, |normal| normal.sample(rng))
            .max(0.0)
    }

    /// Infectivity while the viral titer stays above the latent threshold, after a day with
    /// none.
    fn infectivity(&self, titers: impl Iterator<Item = f64>) -> Vec<f64> {
        std::iter::once(0.0)
            .chain(
                titers
                    .take_while(|&titer| titer > self.viral_titer_latent_threshold)
                    .map(|titer| titer / self.viral_titer_scaling),
            )
            .collect()
    }

    /// Symptoms for the first day and then while interferon stays above its threshold.
    fn symptomaticity(&self, interferon: &[f64]) -> Vec<f64> {
        let above = interferon
            .iter()
            .skip(1)
            .take_while(|&&f| f > self.interferon_threshold)
            .count();
        interferon[..(above + 1).min(interferon.len())]
            .iter()
            .map(|f| f / self.interferon_scaling)
            .collect()
    }
}

impl IntraHost for OdeHistory {
    fn get_trajectory<R: Rng + ?Sized>(
        &self,
        _age: f64,
        loads: &[(StrainId, f64)],
        rng: &mut R,
    ) -> Trajectory {
        let loads = loads_or_default(loads);
        let inocula: Vec<f64> = loads.iter().map(|&(_, load)| self.inoculum(load, rng)).collect();
        let samples = self.model.solve(
            &WithinHostModel::initial_state(&inocula),
            self.duration,
            self.step_size,
        );

        let mut trajectory = Trajectory::new();
        for (s, &(strain, _)) in loads.iter().enumerate() {
            let titers = samples.iter().map(|state| state[s * PER_STRAIN + VIRUS]);
            trajectory.set_infectivity(strain, self.infectivity(titers));
        }
        let shared = loads.len() * PER_STRAIN;
        let interferon: Vec<f64> = samples.iter().map(|state| state[shared + INTERFERON]).collect();
        trajectory.set_symptomaticity(self.symptomaticity(&interferon));
        trajectory
    }

    fn days_symptomatic<R: Rng + ?Sized>(&self, _age: f64, _rng: &mut R) -> usize {
        self.duration
    }

    fn max_days(&self) -> usize {
        self.duration + 1
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::DEFAULT_STRAIN;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> OdeHistoryParams {
        OdeHistoryParams {
            viral_titer_scaling: 10.0,
            viral_titer_latent_threshold: 1e-3,
            interferon_scaling: 100.0,
            interferon_threshold: 1.0,
            duration: 8,
            step_size: 1e-3,
        }
    }

    #[test]
    fn initial_state_layout() {
        let state = WithinHostModel::initial_state(&[0.4, 0.2]);
        assert_eq!(state.len(), 2 * PER_STRAIN + SHARED);
        assert_eq!(state[VIRUS], 0.4);
        assert_eq!(state[PER_STRAIN + VIRUS], 0.2);
        assert_eq!(state[2 * PER_STRAIN + HEALTHY], 1.0);
        assert_eq!(state[2 * PER_STRAIN + EFFECTOR], 1.0);
    }

    #[test]
    fn uninfected_host_is_at_rest() {
        let model = WithinHostModel::default();
        let state = WithinHostModel::initial_state(&[0.0]);
        let mut dy = vec![1.0; state.len()];
        model.right_hand_side(&state, &mut dy);
        // Only the slow antigenic drift moves.
        assert!(dy.iter().all(|d| d.abs() < 1e-4), "{dy:?}");
    }

    #[test]
    fn solution_stays_finite_and_non_negative() {
        let model = WithinHostModel::default();
        let samples = model.solve(&WithinHostModel::initial_state(&[0.5]), 8, 1e-3);
        assert_eq!(samples.len(), 8);
        for state in &samples {
            assert!(state.iter().all(|x| x.is_finite() && *x >= 0.0), "{state:?}");
        }
    }

    #[test]
    fn trajectory_has_a_leading_uninfectious_day() {
        let model = OdeHistory::from_params("flu", &params()).unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        let trajectory = model.get_trajectory(30.0, &[], &mut rng);
        let infectivity = trajectory.infectivity(DEFAULT_STRAIN).unwrap();
        assert_eq!(infectivity[0], 0.0);
        assert!(infectivity.len() <= model.max_days());
        assert!(!trajectory.symptomaticity().is_empty());
    }

    #[test]
    fn extraction_stops_at_thresholds() {
        let model = OdeHistory::from_params("flu", &params()).unwrap();
        assert_eq!(
            model.infectivity([5.0, 2.0, 1e-4, 3.0].into_iter()),
            vec![0.0, 0.5, 0.2]
        );
        assert_eq!(model.symptomaticity(&[0.5, 200.0, 0.2, 300.0]), vec![0.005, 2.0]);
    }

    #[test]
    fn non_positive_scaling_is_rejected() {
        let mut bad = params();
        bad.viral_titer_scaling = 0.0;
        assert!(OdeHistory::from_params("flu", &bad).is_err());
    }
}
