//! Per-day infectivity and symptom curves of one infection.
//!
//! Day `t` of a trajectory is `t` days after exposure. Infectivity is kept per strain in
//! insertion order; symptomaticity is shared by all strains. Reading past the end of a
//! sequence yields `0.0`.

use crate::StrainId;
use indexmap::IndexMap;
use std::iter;

/// Infectivity summed over strains and symptomaticity on one day of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DataPoint {
    pub infectivity: f64,
    pub symptomaticity: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    infectivity: IndexMap<StrainId, Vec<f64>>,
    symptomaticity: Vec<f64>,
    duration: usize,
    /// The host dies on the last day instead of recovering.
    ends_in_death: bool,
}

/// Resizes `values` to `len`, padding with the last value (or `0.0` when empty).
fn resize_with_boundary(values: &mut Vec<f64>, len: usize) {
    let boundary = values.last().copied().unwrap_or(0.0);
    values.resize(len, boundary);
}

/// Moves the sequence boundary at `onset` to `end`: shrinking removes the days in between,
/// growing inserts `fill` copies right before `onset`.
fn move_boundary(values: &mut Vec<f64>, onset: usize, end: usize, fill: f64) {
    let onset = onset.min(values.len());
    if end < onset {
        values.drain(end..onset);
    } else {
        values.splice(onset..onset, iter::repeat_n(fill, end - onset));
    }
}

impl Trajectory {
    pub fn new() -> Self {
        Trajectory::default()
    }

    pub fn with_sequences(
        infectivity: IndexMap<StrainId, Vec<f64>>,
        symptomaticity: Vec<f64>,
    ) -> Self {
        let mut trajectory = Trajectory {
            infectivity,
            symptomaticity,
            duration: 0,
            ends_in_death: false,
        };
        trajectory.update_duration();
        trajectory
    }

    fn update_duration(&mut self) {
        self.duration = self
            .infectivity
            .values()
            .map(Vec::len)
            .chain(iter::once(self.symptomaticity.len()))
            .max()
            .unwrap_or(0);
    }

    /// Number of days covered: the longest of all sequences.
    pub fn duration(&self) -> usize {
        self.duration
    }

    pub fn ends_in_death(&self) -> bool {
        self.ends_in_death
    }

    pub fn set_ends_in_death(&mut self, ends_in_death: bool) {
        self.ends_in_death = ends_in_death;
    }

    pub fn contains(&self, strain: StrainId) -> bool {
        self.infectivity.contains_key(&strain)
    }

    pub fn infectivity(&self, strain: StrainId) -> Option<&[f64]> {
        self.infectivity.get(&strain).map(Vec::as_slice)
    }

    pub fn symptomaticity(&self) -> &[f64] {
        &self.symptomaticity
    }

    pub fn set_infectivity(&mut self, strain: StrainId, values: Vec<f64>) {
        self.infectivity.insert(strain, values);
        self.update_duration();
    }

    pub fn set_symptomaticity(&mut self, values: Vec<f64>) {
        self.symptomaticity = values;
        self.update_duration();
    }

    /// Strains in the order they were added.
    pub fn all_strains(&self) -> Vec<StrainId> {
        self.infectivity.keys().copied().collect()
    }

    pub fn data_point(&self, t: usize) -> DataPoint {
        DataPoint {
            infectivity: self
                .infectivity
                .values()
                .filter_map(|values| values.get(t))
                .sum(),
            symptomaticity: self.symptomaticity.get(t).copied().unwrap_or(0.0),
        }
    }

    /// Data point `offset` days after exposure; negative offsets are before the infection.
    pub fn data_point_at(&self, offset: i32) -> DataPoint {
        usize::try_from(offset).map_or_else(|_| DataPoint::default(), |t| self.data_point(t))
    }

    /// Per-day data points over the whole duration.
    pub fn iter(&self) -> impl Iterator<Item = DataPoint> + '_ {
        (0..self.duration).map(|t| self.data_point(t))
    }

    /// Infectivity of each strain on day `t`, normalized to sum to one. Strains without
    /// infectivity that day are left out.
    pub fn current_loads(&self, t: usize) -> Vec<(StrainId, f64)> {
        let loads: Vec<(StrainId, f64)> = self
            .infectivity
            .iter()
            .filter_map(|(&strain, values)| {
                values.get(t).filter(|&&v| v > 0.0).map(|&v| (strain, v))
            })
            .collect();
        let total: f64 = loads.iter().map(|(_, load)| load).sum();
        loads
            .into_iter()
            .map(|(strain, load)| (strain, load / total))
            .collect()
    }

    /// Makes the symptomatic phase that is running from day `start` last `days_left` more
    /// days: every sequence is cut or padded with its boundary value to `start + days_left`.
    pub fn modify_symptomatic_period(&mut self, start: usize, days_left: usize) {
        let end = start + days_left;
        for values in self.infectivity.values_mut() {
            resize_with_boundary(values, end);
        }
        resize_with_boundary(&mut self.symptomaticity, end);
        self.update_duration();
    }

    /// Makes the asymptomatic phase that is running from day `start` and used to end on day
    /// `onset` end on day `start + days_left` instead. Everything from `onset` on keeps its
    /// shape and moves with the boundary. Inserted days repeat the last asymptomatic
    /// infectivity and carry no symptoms.
    pub fn modify_asymptomatic_period(&mut self, start: usize, days_left: usize, onset: usize) {
        let end = start + days_left;
        for values in self.infectivity.values_mut() {
            let fill = match onset.min(values.len()) {
                0 => 0.0,
                last => values[last - 1],
            };
            move_boundary(values, onset, end, fill);
        }
        if self.symptomaticity.len() > onset || end < onset {
            move_boundary(&mut self.symptomaticity, onset, end, 0.0);
        }
        self.update_duration();
    }

    /// Starts or cancels the symptomatic phase at day `onset`. With a positive
    /// `symptomatic_period` the host is fully symptomatic for that many days and every
    /// infectivity sequence is cut or padded to the new end; with zero the trajectory ends at
    /// `onset`.
    pub fn modify_develops_symptoms(&mut self, onset: usize, symptomatic_period: usize) {
        let end = onset + symptomatic_period;
        self.symptomaticity.resize(onset, 0.0);
        self.symptomaticity.resize(end, 1.0);
        for values in self.infectivity.values_mut() {
            resize_with_boundary(values, end);
        }
        self.update_duration();
    }

    /// Splits strain `new` off `old` at day `day`: from `day` on, the infectivity of `old`
    /// belongs to `new` and `old` drops to zero. Does nothing if `new` is already present or
    /// `day` is past the end of `old`.
    pub fn mutate(&mut self, old: StrainId, new: StrainId, day: usize) {
        if self.infectivity.contains_key(&new) {
            return;
        }
        let Some(old_values) = self.infectivity.get_mut(&old) else {
            debug_assert!(false, "mutating strain {old:?} that is not in the trajectory");
            return;
        };
        if day > old_values.len() {
            return;
        }
        let mut new_values = vec![0.0; day];
        new_values.extend_from_slice(&old_values[day..]);
        old_values[day..].fill(0.0);
        self.infectivity.insert(new, new_values);
        self.update_duration();
    }
}
