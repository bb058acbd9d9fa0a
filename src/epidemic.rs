//! Population-level counters fed by every exposure and health transition.

use crate::hashing::HashMap;
use crate::infection::HealthTransition;
use crate::log::info;
use crate::population::HealthEvent;
use crate::{ConditionId, Context, DataPlugin, Day, PersonId};

/// Receives the bookkeeping notifications of the simulation driver.
pub trait Epidemic {
    /// Called once for every successful transmission or seeded case.
    fn become_exposed(&mut self, person: PersonId, condition: ConditionId, day: Day);

    fn record_transition(&mut self, event: &HealthEvent, day: Day);

    /// Closes the counts of `day`.
    fn end_day(&mut self, day: Day);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub exposed: usize,
    pub infectious: usize,
    pub symptomatic: usize,
    pub recovered: usize,
    pub unsusceptible: usize,
    pub susceptible: usize,
    pub deaths: usize,
}

impl Counts {
    fn count(&mut self, transition: HealthTransition) {
        match transition {
            HealthTransition::BecameInfectious => self.infectious += 1,
            HealthTransition::BecameSymptomatic => self.symptomatic += 1,
            HealthTransition::Recovered => self.recovered += 1,
            HealthTransition::BecameUnsusceptible => self.unsusceptible += 1,
            HealthTransition::BecameSusceptible => self.susceptible += 1,
            HealthTransition::Died => self.deaths += 1,
        }
    }

    fn accumulate(&mut self, other: &Counts) {
        self.exposed += other.exposed;
        self.infectious += other.infectious;
        self.symptomatic += other.symptomatic;
        self.recovered += other.recovered;
        self.unsusceptible += other.unsusceptible;
        self.susceptible += other.susceptible;
        self.deaths += other.deaths;
    }
}

/// Daily and cumulative counts per condition.
#[derive(Debug, Default)]
pub struct EpidemicTracker {
    today: HashMap<ConditionId, Counts>,
    cumulative: HashMap<ConditionId, Counts>,
    history: HashMap<ConditionId, Vec<(Day, Counts)>>,
}

impl DataPlugin for EpidemicTracker {
    const new: &'static dyn Fn() -> Self = &EpidemicTracker::default;
}

impl EpidemicTracker {
    /// Counts of the day in progress.
    pub fn today(&self, condition: ConditionId) -> Counts {
        self.today.get(&condition).copied().unwrap_or_default()
    }

    /// Counts over all closed days.
    pub fn cumulative(&self, condition: ConditionId) -> Counts {
        self.cumulative.get(&condition).copied().unwrap_or_default()
    }

    /// Closed days in order.
    pub fn history(&self, condition: ConditionId) -> &[(Day, Counts)] {
        self.history
            .get(&condition)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// New exposures on each closed day.
    pub fn incidence(&self, condition: ConditionId) -> Vec<usize> {
        self.history(condition)
            .iter()
            .map(|(_, counts)| counts.exposed)
            .collect()
    }
}

impl Epidemic for EpidemicTracker {
    fn become_exposed(&mut self, _person: PersonId, condition: ConditionId, _day: Day) {
        self.today.entry(condition).or_default().exposed += 1;
    }

    fn record_transition(&mut self, event: &HealthEvent, _day: Day) {
        self.today
            .entry(event.condition)
            .or_default()
            .count(event.transition);
    }

    fn end_day(&mut self, day: Day) {
        let mut conditions: Vec<ConditionId> = self
            .today
            .keys()
            .chain(self.cumulative.keys())
            .copied()
            .collect();
        conditions.sort_unstable();
        conditions.dedup();

        for condition in conditions {
            let counts = self.today.remove(&condition).unwrap_or_default();
            let total = self.cumulative.entry(condition).or_default();
            total.accumulate(&counts);
            info!(
                "day {day} {condition:?}: exposed {} (total {}), symptomatic {}, recovered {}, \
                 deaths {}",
                counts.exposed,
                total.exposed,
                counts.symptomatic,
                counts.recovered,
                counts.deaths
            );
            self.history
                .entry(condition)
                .or_default()
                .push((day, counts));
        }
    }
}

pub trait ContextEpidemicExt {
    fn get_epidemic_tracker(&self) -> Option<&EpidemicTracker>;

    /// Cumulative counts for `condition` over all completed days.
    fn get_epidemic_counts(&self, condition: ConditionId) -> Counts;
}

impl ContextEpidemicExt for Context {
    fn get_epidemic_tracker(&self) -> Option<&EpidemicTracker> {
        self.get_data_container::<EpidemicTracker>()
    }

    fn get_epidemic_counts(&self, condition: ConditionId) -> Counts {
        self.get_epidemic_tracker()
            .map(|tracker| tracker.cumulative(condition))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FLU: ConditionId = ConditionId(0);

    fn event(transition: HealthTransition) -> HealthEvent {
        HealthEvent {
            person: PersonId(0),
            condition: FLU,
            transition,
        }
    }

    #[test]
    fn days_close_into_history() {
        let mut tracker = EpidemicTracker::default();
        tracker.become_exposed(PersonId(0), FLU, 0);
        tracker.become_exposed(PersonId(1), FLU, 0);
        tracker.record_transition(&event(HealthTransition::BecameInfectious), 0);
        assert_eq!(tracker.today(FLU).exposed, 2);
        tracker.end_day(0);

        tracker.record_transition(&event(HealthTransition::Died), 1);
        tracker.end_day(1);
        tracker.end_day(2);

        assert_eq!(tracker.incidence(FLU), vec![2, 0, 0]);
        let total = tracker.cumulative(FLU);
        assert_eq!(total.exposed, 2);
        assert_eq!(total.infectious, 1);
        assert_eq!(total.deaths, 1);
        assert_eq!(tracker.today(FLU), Counts::default());
        assert_eq!(tracker.history(FLU)[1].0, 1);
        assert!(tracker.history(ConditionId(4)).is_empty());
    }

    #[test]
    fn context_without_tracker_reports_zero() {
        let context = Context::new();
        assert_eq!(context.get_epidemic_counts(FLU), Counts::default());
    }
}
