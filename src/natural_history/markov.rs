//! Courses driven by a Markov chain over named disease states.
//!
//! Each state carries an infectivity and a symptom level. A new infection starts in a state
//! drawn from its age group's initial distribution and stays there for an exponentially
//! distributed number of days before jumping to another state. The course ends when the chain
//! settles in a quiet state it cannot leave, or in death when it enters a fatal state.

use super::{loads_or_default, IntraHost};
use crate::error::IxaError;
use crate::log::trace;
use crate::params::{MarkovGroupParams, MarkovHistoryParams};
use crate::random::draw_exponential;
use crate::trajectory::Trajectory;
use crate::StrainId;
use rand::Rng;
use std::iter;

#[derive(Debug, Clone, PartialEq)]
struct MarkovState {
    name: String,
    infectivity: f64,
    symptoms: f64,
    fatal: bool,
}

impl MarkovState {
    fn is_quiet(&self) -> bool {
        self.infectivity <= 0.0 && self.symptoms <= 0.0
    }
}

/// Initial distribution and transition matrix of one age group.
#[derive(Debug, Clone)]
struct ChainGroup {
    initial_percent: Vec<f64>,
    /// Row-stochastic; the diagonal holds the probability of staying.
    transitions: Vec<Vec<f64>>,
}

impl ChainGroup {
    fn from_params(
        name: &str,
        states: usize,
        params: &MarkovGroupParams,
    ) -> Result<Self, IxaError> {
        if params.initial_percent.len() != states {
            return Err(IxaError::invalid_parameter(
                format!("{name}.initial_percent"),
                format!("needs one entry per state ({states})"),
            ));
        }
        let others = &params.initial_percent[1..];
        if others.iter().any(|p| !(0.0..=100.0).contains(p)) {
            return Err(IxaError::invalid_parameter(
                format!("{name}.initial_percent"),
                "percentages must be between 0 and 100",
            ));
        }
        let assigned: f64 = others.iter().sum();
        if assigned > 100.0 {
            return Err(IxaError::invalid_parameter(
                format!("{name}.initial_percent"),
                format!("percentages add up to {assigned}"),
            ));
        }
        let mut initial_percent = params.initial_percent.clone();
        initial_percent[0] = 100.0 - assigned;

        if params.transitions.len() != states
            || params.transitions.iter().any(|row| row.len() != states)
        {
            return Err(IxaError::invalid_parameter(
                format!("{name}.transitions"),
                format!("must be a {states} by {states} matrix"),
            ));
        }
        let mut transitions = params.transitions.clone();
        for (i, row) in transitions.iter_mut().enumerate() {
            let leaving = row
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &p)| p);
            if leaving.clone().any(|p| !(0.0..=1.0).contains(&p)) {
                return Err(IxaError::invalid_parameter(
                    format!("{name}.transitions[{i}]"),
                    "probabilities must be between 0 and 1",
                ));
            }
            let total: f64 = leaving.sum();
            if total > 1.0 {
                return Err(IxaError::invalid_parameter(
                    format!("{name}.transitions[{i}]"),
                    format!("probabilities of leaving add up to {total}"),
                ));
            }
            row[i] = 1.0 - total;
        }
        Ok(ChainGroup {
            initial_percent,
            transitions,
        })
    }

    fn initial_state<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let r = rng.random::<f64>() * 100.0;
        pick(&self.initial_percent, r).unwrap_or(0)
    }

    /// Days until the chain leaves `state`, or `None` if it never does.
    fn days_in_state<R: Rng + ?Sized>(
        &self,
        state: usize,
        period: f64,
        rng: &mut R,
    ) -> Option<usize> {
        let stay = self.transitions[state][state];
        if stay >= 1.0 {
            return None;
        }
        if stay <= 0.0 {
            return Some(1);
        }
        let days = draw_exponential(rng, -stay.ln()).map_or(1.0, |draw| (draw * period).round());
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let days = days as usize;
        Some(days.max(1))
    }

    fn next_state<R: Rng + ?Sized>(&self, state: usize, rng: &mut R) -> usize {
        let weights: Vec<f64> = self.transitions[state]
            .iter()
            .enumerate()
            .map(|(j, &p)| if j == state { 0.0 } else { p })
            .collect();
        let total: f64 = weights.iter().sum();
        pick(&weights, rng.random::<f64>() * total).unwrap_or(state)
    }
}

/// Index of the entry whose cumulative weight first exceeds `r`.
fn pick(weights: &[f64], r: f64) -> Option<usize> {
    let mut sum = 0.0;
    weights.iter().position(|&w| {
        sum += w;
        r < sum
    })
}

#[derive(Debug, Clone)]
pub struct MarkovHistory {
    states: Vec<MarkovState>,
    age_bounds: Vec<f64>,
    groups: Vec<ChainGroup>,
    transition_time_period: f64,
    max_days: usize,
}

/// States visited on each day of one course.
struct Course {
    days: Vec<usize>,
    fatal: bool,
}

impl MarkovHistory {
    pub fn from_params(name: &str, params: &MarkovHistoryParams) -> Result<Self, IxaError> {
        if params.states.is_empty() {
            return Err(IxaError::invalid_parameter(
                format!("{name}.states"),
                "at least one state is needed",
            ));
        }
        for (i, state) in params.states.iter().enumerate() {
            for (field, value) in [("infectivity", state.infectivity), ("symptoms", state.symptoms)]
            {
                if !(value >= 0.0 && value.is_finite()) {
                    return Err(IxaError::invalid_parameter(
                        format!("{name}.states[{i}].{field}"),
                        "must be a non-negative number",
                    ));
                }
            }
        }
        let expected_groups = params.age_bounds.len().max(1);
        if params.groups.len() != expected_groups {
            return Err(IxaError::invalid_parameter(
                format!("{name}.groups"),
                format!("needs one group per age bound ({expected_groups})"),
            ));
        }
        if !params.age_bounds.is_sorted() {
            return Err(IxaError::invalid_parameter(
                format!("{name}.age_bounds"),
                "age bounds must be non-decreasing",
            ));
        }
        if !(params.transition_time_period > 0.0 && params.transition_time_period.is_finite()) {
            return Err(IxaError::invalid_parameter(
                format!("{name}.transition_time_period"),
                "must be a positive number of days",
            ));
        }

        let groups = params
            .groups
            .iter()
            .enumerate()
            .map(|(g, group)| {
                ChainGroup::from_params(&format!("{name}.groups[{g}]"), params.states.len(), group)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let states = params
            .states
            .iter()
            .map(|state| MarkovState {
                name: state.name.clone(),
                infectivity: state.infectivity,
                symptoms: state.symptoms,
                fatal: state.fatal,
            })
            .collect();
        Ok(MarkovHistory {
            states,
            age_bounds: params.age_bounds.clone(),
            groups,
            transition_time_period: params.transition_time_period,
            max_days: params.max_days,
        })
    }

    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(|state| state.name.as_str()).collect()
    }

    /// Ages past the last bound use the last group.
    fn group(&self, age: f64) -> &ChainGroup {
        let index = self
            .age_bounds
            .iter()
            .position(|&bound| age < bound)
            .unwrap_or(self.groups.len() - 1);
        &self.groups[index]
    }

    fn run_chain<R: Rng + ?Sized>(&self, age: f64, rng: &mut R) -> Course {
        let group = self.group(age);
        let mut state = group.initial_state(rng);
        let mut days = Vec::new();
        let mut fatal = false;
        while days.len() < self.max_days {
            if self.states[state].fatal {
                fatal = true;
                break;
            }
            let room = self.max_days - days.len();
            let Some(stay) = group.days_in_state(state, self.transition_time_period, rng) else {
                if !self.states[state].is_quiet() {
                    days.extend(iter::repeat_n(state, room));
                }
                break;
            };
            days.extend(iter::repeat_n(state, stay.min(room)));
            let next = group.next_state(state, rng);
            trace!(
                "markov course: {} -> {} after day {}",
                self.states[state].name,
                self.states[next].name,
                days.len()
            );
            state = next;
        }
        if !fatal {
            while days.last().is_some_and(|&last| self.states[last].is_quiet()) {
                days.pop();
            }
        }
        Course { days, fatal }
    }
}

impl IntraHost for MarkovHistory {
    fn get_trajectory<R: Rng + ?Sized>(
        &self,
        age: f64,
        loads: &[(StrainId, f64)],
        rng: &mut R,
    ) -> Trajectory {
        let course = self.run_chain(age, rng);
        let infectivity: Vec<f64> = course
            .days
            .iter()
            .map(|&state| self.states[state].infectivity)
            .collect();
        let mut trajectory = Trajectory::new();
        for (strain, load) in loads_or_default(loads) {
            trajectory.set_infectivity(
                strain,
                infectivity.iter().map(|value| value * load).collect(),
            );
        }
        trajectory.set_symptomaticity(
            course
                .days
                .iter()
                .map(|&state| self.states[state].symptoms)
                .collect(),
        );
        trajectory.set_ends_in_death(course.fatal);
        trajectory
    }

    fn days_symptomatic<R: Rng + ?Sized>(&self, age: f64, rng: &mut R) -> usize {
        self.run_chain(age, rng)
            .days
            .iter()
            .filter(|&&state| self.states[state].symptoms > 0.0)
            .count()
    }

    fn max_days(&self) -> usize {
        self.max_days
    }
}
