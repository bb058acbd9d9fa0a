//! The daily driver.
//!
//! A day runs in three steps: every infection advances to the new day, each disease spreads
//! through all groups in parallel, and the exposures found by the groups are applied to the
//! population in group order. Every random draw comes from a stream derived from the base
//! seed, the day and the group, so a run is reproducible whatever the thread count.

use crate::disease::ContextDiseaseExt;
use crate::epidemic::{Epidemic, EpidemicTracker};
use crate::group::GroupRegistry;
use crate::hashing::hash_value;
use crate::infection::{Infection, InfectionSource, PeriodError};
use crate::log::{debug, info};
use crate::population::{ContextPopulationExt, HealthEvent, HostView, Population};
use crate::random::ContextRandomExt;
use crate::transmission::{spread_in_group, ContextTransmissionExt, ExposureBuffer};
use crate::{define_rng, ConditionId, Context, Day, IxaError, PersonId};
use rand::rngs::StdRng;
use rayon::prelude::*;

define_rng!(HealthRng);
define_rng!(TransmissionRng);
define_rng!(ExposureRng);
define_rng!(InterventionRng);

/// A change made to a person's condition by an intervention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modification {
    SymptomaticPeriod(f64),
    AsymptomaticPeriod(f64),
    InfectiousPeriod(f64),
    DevelopsSymptoms(bool),
    Infectivity(f64),
    Susceptibility(f64),
}

pub trait ContextSimulationExt {
    /// Infects `person` on the current day with no infector and no place. Returns `false` if
    /// the person is not susceptible.
    fn seed_infection(
        &mut self,
        person: PersonId,
        condition: ConditionId,
    ) -> Result<bool, IxaError>;

    /// Applies an intervention to `person`. Returns `false` when it has no effect, such as a
    /// period that is already over or a person without an active infection.
    fn modify_infection(
        &mut self,
        person: PersonId,
        condition: ConditionId,
        modification: Modification,
    ) -> Result<bool, IxaError>;

    /// Simulates the current day and moves on to the next one.
    fn run_day(&mut self);

    /// Runs `days` days.
    fn run(&mut self, days: Day);
}

fn check_person(context: &Context, person: PersonId) -> Result<(), IxaError> {
    if person.0 >= context.get_current_population() {
        return Err(IxaError::IxaError(format!("unknown person {person:?}")));
    }
    Ok(())
}

/// Applies exposures in buffer order and notifies the tracker. Later exposures of someone
/// already infected today are dropped.
fn apply_exposures(
    context: &mut Context,
    condition: ConditionId,
    buffers: Vec<ExposureBuffer>,
    day: Day,
) {
    let mut rng = context.derived_rng::<ExposureRng>(hash_value(&(day, condition.0)));
    let mut exposed: Vec<(PersonId, Vec<HealthEvent>)> = Vec::new();
    let population = context.population_mut();
    for buffer in buffers {
        for infection in buffer {
            let person = infection.host();
            if let Some(events) = population.become_exposed(infection, day, &mut rng) {
                exposed.push((person, events));
            }
        }
    }

    let tracker = context.get_data_container_mut::<EpidemicTracker>();
    for (person, events) in &exposed {
        tracker.become_exposed(*person, condition, day);
        for event in events {
            tracker.record_transition(event, day);
        }
    }
}

fn on_infection(
    population: &mut Population,
    person: PersonId,
    condition: ConditionId,
    modify: impl FnOnce(&mut Infection) -> Result<(), PeriodError>,
) -> Option<Result<(), PeriodError>> {
    population
        .health_mut(person, condition)
        .infection_mut()
        .map(modify)
}

fn spread_disease(context: &mut Context, condition: ConditionId, day: Day) {
    let Some(disease) = context.get_disease(condition) else {
        return;
    };
    let settings = context.transmission_settings();

    let buffers = context.with_data_container::<GroupRegistry, _>(|context, registry| {
        let Some(population) = context.population() else {
            return Vec::new();
        };
        let rngs: Vec<StdRng> = (0..registry.groups.len())
            .map(|index| {
                context.derived_rng::<TransmissionRng>(hash_value(&(day, condition.0, index)))
            })
            .collect();
        registry
            .groups
            .par_iter_mut()
            .zip(rngs)
            .map(|(group, mut rng)| {
                spread_in_group(group, &disease, population, day, &settings, &mut rng)
            })
            .collect::<Vec<_>>()
    });

    let new_infections: usize = buffers.iter().map(ExposureBuffer::len).sum();
    if new_infections > 0 {
        debug!("day {day}: {new_infections} candidate exposures to {}", disease.name());
    }
    apply_exposures(context, condition, buffers, day);
}

impl ContextSimulationExt for Context {
    fn seed_infection(
        &mut self,
        person: PersonId,
        condition: ConditionId,
    ) -> Result<bool, IxaError> {
        check_person(self, person)?;
        let disease = self
            .get_disease(condition)
            .ok_or_else(|| IxaError::IxaError(format!("unknown condition {condition:?}")))?;
        let day = self.current_day();
        let population = self.population_mut();
        if !population.is_susceptible(person, condition) {
            return Ok(false);
        }

        let mut rng = self.derived_rng::<ExposureRng>(hash_value(&(day, person.0, condition.0)));
        let population = self.population_mut();
        let infection = Infection::new(
            disease,
            person,
            InfectionSource::default(),
            day,
            population.age(person),
            &[],
            &mut rng,
        );
        let Some(events) = population.become_exposed(infection, day, &mut rng) else {
            return Ok(false);
        };
        info!("seeded {condition:?} in {person:?} on day {day}");

        let tracker = self.get_data_container_mut::<EpidemicTracker>();
        tracker.become_exposed(person, condition, day);
        for event in &events {
            tracker.record_transition(event, day);
        }
        Ok(true)
    }

    fn modify_infection(
        &mut self,
        person: PersonId,
        condition: ConditionId,
        modification: Modification,
    ) -> Result<bool, IxaError> {
        check_person(self, person)?;
        if self.get_disease(condition).is_none() {
            return Err(IxaError::IxaError(format!("unknown condition {condition:?}")));
        }
        let day = self.current_day();
        let mut rng =
            self.derived_rng::<InterventionRng>(hash_value(&(day, person.0, condition.0)));
        let population = self.population_mut();

        let result = match modification {
            Modification::Susceptibility(m) | Modification::Infectivity(m) if m < 0.0 => {
                Some(Err(PeriodError::NegativeMultiplier(m)))
            }
            Modification::Susceptibility(m) => {
                population.scale_susceptibility(person, condition, m);
                Some(Ok(()))
            }
            Modification::SymptomaticPeriod(m) => {
                on_infection(population, person, condition, |infection| {
                    infection.modify_symptomatic_period(m, day)
                })
            }
            Modification::AsymptomaticPeriod(m) => {
                on_infection(population, person, condition, |infection| {
                    infection.modify_asymptomatic_period(m, day)
                })
            }
            Modification::InfectiousPeriod(m) => {
                on_infection(population, person, condition, |infection| {
                    infection.modify_infectious_period(m, day)
                })
            }
            Modification::DevelopsSymptoms(symptoms) => {
                on_infection(population, person, condition, |infection| {
                    infection.modify_develops_symptoms(symptoms, day, &mut rng)
                })
            }
            Modification::Infectivity(m) => {
                on_infection(population, person, condition, |infection| {
                    infection.modify_infectivity(m);
                    Ok(())
                })
            }
        };
        let Some(result) = result else {
            debug!("{person:?} has no active {condition:?} infection to modify");
            return Ok(false);
        };
        match result {
            Ok(()) => Ok(true),
            Err(error) => {
                debug!("{person:?} {condition:?}: {modification:?} ignored: {error}");
                Ok(false)
            }
        }
    }

    fn run_day(&mut self) {
        let day = self.current_day();
        let mut rng = self.derived_rng::<HealthRng>(hash_value(&day));
        let events = self
            .get_data_container_mut::<Population>()
            .update_health(day, &mut rng);
        let tracker = self.get_data_container_mut::<EpidemicTracker>();
        for event in &events {
            tracker.record_transition(event, day);
        }

        for condition in self.disease_ids() {
            spread_disease(self, condition, day);
        }

        self.get_data_container_mut::<EpidemicTracker>().end_day(day);
        self.set_current_day(day + 1);
    }

    fn run(&mut self, days: Day) {
        for _ in 0..days {
            self.run_day();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::disease::test::fixed_course_params;
    use crate::epidemic::ContextEpidemicExt;
    use crate::group::{ContextGroupsExt, GroupKind, Mixing};
    use crate::GroupId;

    /// 60 people in households of four, all of them in one school.
    fn town(seed: u64) -> (Context, ConditionId, Vec<PersonId>) {
        let mut context = Context::new();
        context.init_random(seed);
        let flu = context
            .add_disease(&fixed_course_params("flu", 1, 1, 3, 0.5))
            .unwrap();
        let people: Vec<PersonId> = (0..60u32)
            .map(|i| context.add_person(f64::from(i % 80)))
            .collect();
        for household in people.chunks(4) {
            context.add_place(
                GroupKind::Household,
                household.to_vec(),
                Mixing {
                    contacts_per_day: 0.3,
                    transmission_prob: 1.0,
                },
            );
        }
        context.add_place(
            GroupKind::School,
            people.clone(),
            Mixing {
                contacts_per_day: 2.0,
                transmission_prob: 0.5,
            },
        );
        (context, flu, people)
    }

    fn states(
        context: &Context,
        flu: ConditionId,
        people: &[PersonId],
    ) -> Vec<(bool, Option<Day>)> {
        people
            .iter()
            .map(|&person| {
                let population = context.population().unwrap();
                (
                    population.is_susceptible(person, flu),
                    population.infection(person, flu).map(Infection::exposure_date),
                )
            })
            .collect()
    }

    #[test]
    fn runs_are_reproducible() {
        let run = |seed| {
            let (mut context, flu, people) = town(seed);
            context.seed_infection(people[0], flu).unwrap();
            context.seed_infection(people[30], flu).unwrap();
            context.run(12);
            let incidence = context.get_epidemic_tracker().unwrap().incidence(flu);
            (incidence, states(&context, flu, &people))
        };
        let (incidence, final_states) = run(42);
        assert_eq!(incidence.len(), 12);
        assert_eq!((incidence, final_states), run(42));
    }

    #[test]
    fn seeding_counts_as_an_exposure() {
        let (mut context, flu, people) = town(1);
        assert!(context.seed_infection(people[5], flu).unwrap());
        assert!(!context.seed_infection(people[5], flu).unwrap());

        let infection = context.population().unwrap().infection(people[5], flu).unwrap();
        assert_eq!(infection.infector(), None);
        assert_eq!(infection.place(), None);
        assert_eq!(infection.exposure_date(), 0);

        assert!(context.seed_infection(PersonId(1000), flu).is_err());
        assert!(context.seed_infection(people[6], ConditionId(7)).is_err());

        context.run_day();
        assert!(context.get_epidemic_counts(flu).exposed >= 1);
        assert_eq!(context.current_day(), 1);
    }

    #[test]
    fn seed_day_transitions_are_counted_once() {
        let mut context = Context::new();
        context.init_random(5);
        let flu = context
            .add_disease(&fixed_course_params("flu", 0, 0, 3, 1.0))
            .unwrap();
        let person = context.add_person(25.0);
        context.seed_infection(person, flu).unwrap();
        context.run_day();

        let counts = context.get_epidemic_counts(flu);
        assert_eq!(counts.exposed, 1);
        assert_eq!(counts.infectious, 1);
        assert_eq!(counts.symptomatic, 1);
        assert_eq!(counts.unsusceptible, 1);
        assert_eq!(counts.recovered, 0);

        context.run(3);
        let counts = context.get_epidemic_counts(flu);
        assert_eq!(counts.infectious, 1);
        assert_eq!(counts.recovered, 1);
    }

    #[test]
    fn certain_household_contact_infects_everyone_at_home() {
        let mut context = Context::new();
        context.init_random(8);
        let flu = context
            .add_disease(&fixed_course_params("flu", 0, 0, 5, 1.0))
            .unwrap();
        let people: Vec<PersonId> = (0..4).map(|_| context.add_person(40.0)).collect();
        let other = context.add_person(40.0);
        let home = context.add_place(
            GroupKind::Household,
            people.clone(),
            Mixing {
                contacts_per_day: 1.0,
                transmission_prob: 1.0,
            },
        );
        assert_eq!(home, GroupId(0));

        context.seed_infection(people[0], flu).unwrap();
        context.run_day();

        let population = context.population().unwrap();
        for &person in &people[1..] {
            let infection = population.infection(person, flu).unwrap();
            assert_eq!(infection.infector(), Some(people[0]));
            assert_eq!(infection.place(), Some(home));
        }
        assert!(population.is_susceptible(other, flu));
        assert_eq!(population.infection(people[0], flu).unwrap().infectee_count(), 3);
        assert_eq!(context.get_epidemic_counts(flu).exposed, 4);
    }

    #[test]
    fn interventions_report_whether_they_applied() {
        let (mut context, flu, people) = town(3);
        context.seed_infection(people[0], flu).unwrap();

        assert!(!context
            .modify_infection(people[1], flu, Modification::SymptomaticPeriod(0.5))
            .unwrap());
        assert!(!context
            .modify_infection(people[0], flu, Modification::InfectiousPeriod(-1.0))
            .unwrap());
        assert!(context
            .modify_infection(people[0], flu, Modification::Infectivity(0.5))
            .unwrap());
        assert!(context
            .modify_infection(people[0], flu, Modification::InfectiousPeriod(2.0))
            .unwrap());

        assert!(context
            .modify_infection(people[2], flu, Modification::Susceptibility(0.0))
            .unwrap());
        assert_eq!(
            context.population().unwrap().susceptibility(people[2], flu),
            0.0
        );
        assert!(context
            .modify_infection(PersonId(500), flu, Modification::Infectivity(1.0))
            .is_err());
    }
}
