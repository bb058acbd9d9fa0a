//! People and their per-condition health records.
//!
//! [`Population`] is the data plugin the transmission models read through [`HostView`]. All
//! writes go through the daily health pass ([`Population::update_health`]) and the end-of-step
//! merge of new exposures ([`Population::become_exposed`]); the parallel transmission pass only
//! ever holds a shared reference.

use crate::hashing::{HashMap, HashSet};
use crate::infection::{HealthTransition, HostProfile, Infection};
use crate::log::trace;
use crate::{ConditionId, Context, DataPlugin, Day, GroupId, PersonId, StrainId};
use rand::Rng;

/// Read-only host queries used by the transmission models.
pub trait HostView: Sync {
    /// Alive, not infected with `condition` and not immune to it.
    fn is_susceptible(&self, person: PersonId, condition: ConditionId) -> bool;

    fn susceptibility(&self, person: PersonId, condition: ConditionId) -> f64;

    /// Today's infectivity; zero unless the person is infectious.
    fn infectivity(&self, person: PersonId, condition: ConditionId) -> f64;

    fn is_infectious(&self, person: PersonId, condition: ConditionId) -> bool;

    /// Factor on the person's transmission of `condition` from their other active conditions.
    fn transmission_modifier(&self, person: PersonId, condition: ConditionId) -> f64;

    /// Factor on the person's susceptibility to `condition` from their other active conditions.
    fn susceptibility_modifier(&self, person: PersonId, condition: ConditionId) -> f64;

    fn is_present(&self, person: PersonId, group: GroupId) -> bool;

    fn age(&self, person: PersonId) -> f64;

    /// Normalized strain loads the person passes on when infecting someone on `day`.
    fn transmitted_loads(&self, person: PersonId, condition: ConditionId, day: Day)
    -> Vec<(StrainId, f64)>;
}

/// One finished infection.
#[derive(Debug, Clone, PartialEq)]
pub struct PastInfection {
    pub exposure_date: Day,
    pub recovery_date: Option<Day>,
    pub age_at_exposure: f64,
    pub strains: Vec<StrainId>,
}

impl PastInfection {
    fn from_infection(infection: &Infection) -> Self {
        PastInfection {
            exposure_date: infection.exposure_date(),
            recovery_date: infection.recovery_date(),
            age_at_exposure: infection.age_at_exposure(),
            strains: infection.trajectory().all_strains(),
        }
    }
}

/// A person's state with respect to one condition.
#[derive(Debug, Clone)]
pub struct Health {
    infection: Option<Infection>,
    susceptible: bool,
    infectious: bool,
    symptomatic: bool,
    recovered: bool,
    susceptibility: f64,
    susceptible_date: Option<Day>,
    past_infections: Vec<PastInfection>,
}

impl Default for Health {
    fn default() -> Self {
        Health {
            infection: None,
            susceptible: true,
            infectious: false,
            symptomatic: false,
            recovered: false,
            susceptibility: 1.0,
            susceptible_date: None,
            past_infections: Vec::new(),
        }
    }
}

impl Health {
    pub fn infection(&self) -> Option<&Infection> {
        self.infection.as_ref()
    }

    pub(crate) fn infection_mut(&mut self) -> Option<&mut Infection> {
        self.infection.as_mut()
    }

    pub fn is_susceptible(&self) -> bool {
        self.susceptible && self.infection.is_none()
    }

    pub fn is_infectious(&self) -> bool {
        self.infectious
    }

    pub fn is_symptomatic(&self) -> bool {
        self.symptomatic
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    pub fn susceptibility(&self) -> f64 {
        self.susceptibility
    }

    pub fn past_infections(&self) -> &[PastInfection] {
        &self.past_infections
    }

    fn infectivity(&self) -> f64 {
        match &self.infection {
            Some(infection) if self.infectious => infection.infectivity(),
            _ => 0.0,
        }
    }

    fn end_infection(&mut self) {
        if let Some(infection) = self.infection.take() {
            self.past_infections
                .push(PastInfection::from_infection(&infection));
            self.susceptible_date = infection.susceptible_date();
        }
        self.infectious = false;
        self.symptomatic = false;
    }

    fn apply(&mut self, transition: HealthTransition) {
        match transition {
            HealthTransition::BecameInfectious => self.infectious = true,
            HealthTransition::BecameSymptomatic => self.symptomatic = true,
            HealthTransition::BecameUnsusceptible => self.susceptible = false,
            HealthTransition::Recovered => {
                self.end_infection();
                self.susceptible = false;
                self.recovered = true;
            }
            HealthTransition::BecameSusceptible => {
                self.susceptible = true;
                self.recovered = false;
                self.susceptible_date = None;
            }
            HealthTransition::Died => self.end_infection(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Person {
    age: f64,
    alive: bool,
    case_fatality_multiplier: f64,
    health: Vec<Health>,
}

impl Person {
    fn new(age: f64) -> Self {
        Person {
            age,
            alive: true,
            case_fatality_multiplier: 1.0,
            health: Vec::new(),
        }
    }

    fn health(&self, condition: ConditionId) -> Option<&Health> {
        self.health.get(condition.0)
    }

    fn health_mut(&mut self, condition: ConditionId) -> &mut Health {
        if condition.0 >= self.health.len() {
            self.health.resize_with(condition.0 + 1, Health::default);
        }
        &mut self.health[condition.0]
    }

    fn profile(&self) -> HostProfile {
        HostProfile {
            real_age: self.age,
            case_fatality_multiplier: self.case_fatality_multiplier,
        }
    }
}

/// Effect of having one condition on transmitting or catching another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionInteraction {
    pub transmission: f64,
    pub susceptibility: f64,
}

/// A transition that happened to a person, reported to the epidemic bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthEvent {
    pub person: PersonId,
    pub condition: ConditionId,
    pub transition: HealthTransition,
}

#[derive(Default)]
pub struct Population {
    people: Vec<Person>,
    absences: HashSet<(PersonId, GroupId)>,
    // (active condition, affected condition)
    interactions: HashMap<(ConditionId, ConditionId), ConditionInteraction>,
}

impl DataPlugin for Population {
    const new: &'static dyn Fn() -> Self = &Population::default;
}

impl Population {
    pub fn add_person(&mut self, age: f64) -> PersonId {
        let person = PersonId(self.people.len());
        self.people.push(Person::new(age));
        person
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn is_alive(&self, person: PersonId) -> bool {
        self.people.get(person.0).is_some_and(|p| p.alive)
    }

    pub fn health(&self, person: PersonId, condition: ConditionId) -> Option<&Health> {
        self.people.get(person.0).and_then(|p| p.health(condition))
    }

    /// # Panics
    ///
    /// Panics if `person` was never added.
    pub(crate) fn health_mut(&mut self, person: PersonId, condition: ConditionId) -> &mut Health {
        self.people[person.0].health_mut(condition)
    }

    pub fn infection(&self, person: PersonId, condition: ConditionId) -> Option<&Infection> {
        self.health(person, condition).and_then(Health::infection)
    }

    pub fn set_absent(&mut self, person: PersonId, group: GroupId, absent: bool) {
        if absent {
            self.absences.insert((person, group));
        } else {
            self.absences.remove(&(person, group));
        }
    }

    pub fn set_case_fatality_multiplier(&mut self, person: PersonId, multiplier: f64) {
        if let Some(p) = self.people.get_mut(person.0) {
            p.case_fatality_multiplier = multiplier;
        }
    }

    /// Having `active` scales transmission and susceptibility of `affected`.
    pub fn set_condition_interaction(
        &mut self,
        active: ConditionId,
        affected: ConditionId,
        interaction: ConditionInteraction,
    ) {
        self.interactions.insert((active, affected), interaction);
    }

    fn interaction_product(
        &self,
        person: PersonId,
        condition: ConditionId,
        factor: impl Fn(&ConditionInteraction) -> f64,
    ) -> f64 {
        if self.interactions.is_empty() {
            return 1.0;
        }
        let Some(p) = self.people.get(person.0) else {
            return 1.0;
        };
        p.health
            .iter()
            .enumerate()
            .filter(|&(other, health)| other != condition.0 && health.infection.is_some())
            .filter_map(|(other, _)| self.interactions.get(&(ConditionId(other), condition)))
            .map(factor)
            .product()
    }

    /// Gives a susceptible person a new infection and applies whatever it does on its first
    /// day. Returns `None` if the person is no longer susceptible, which happens when several
    /// groups exposed them on the same day.
    pub(crate) fn become_exposed<R: Rng + ?Sized>(
        &mut self,
        mut infection: Infection,
        today: Day,
        rng: &mut R,
    ) -> Option<Vec<HealthEvent>> {
        let person = infection.host();
        let condition = infection.disease().id();
        if !self.is_susceptible(person, condition) {
            return None;
        }
        if let Some(infector) = infection.infector() {
            if let Some(source) = self.people[infector.0].health_mut(condition).infection_mut() {
                source.add_infectee();
            }
        }

        let host = &mut self.people[person.0];
        let transitions = infection.update(today, &host.profile(), rng);
        host.health_mut(condition).infection = Some(infection);
        let mut events = Vec::with_capacity(transitions.len());
        for transition in transitions {
            self.apply_transition(person, condition, transition);
            events.push(HealthEvent {
                person,
                condition,
                transition,
            });
        }
        Some(events)
    }

    fn apply_transition(
        &mut self,
        person: PersonId,
        condition: ConditionId,
        transition: HealthTransition,
    ) {
        trace!("{person:?} {condition:?}: {transition:?}");
        let p = &mut self.people[person.0];
        if transition == HealthTransition::Died {
            p.alive = false;
            for health in &mut p.health {
                health.apply(HealthTransition::Died);
            }
        } else {
            p.health_mut(condition).apply(transition);
        }
    }

    /// Advances every living person's infections to `today` and restores susceptibility
    /// whose waning date has come. Mutation runs after the day's transitions.
    pub(crate) fn update_health<R: Rng + ?Sized>(
        &mut self,
        today: Day,
        rng: &mut R,
    ) -> Vec<HealthEvent> {
        let mut events = Vec::new();
        for index in 0..self.people.len() {
            if !self.people[index].alive {
                continue;
            }
            let person = PersonId(index);
            let mut died = false;
            for condition in (0..self.people[index].health.len()).map(ConditionId) {
                if died {
                    break;
                }
                let profile = self.people[index].profile();
                let health = &mut self.people[index].health[condition.0];

                let mut transitions = Vec::new();
                if let Some(infection) = health.infection.as_mut() {
                    transitions = infection.update(today, &profile, rng);
                    if health.infectious && !transitions.contains(&HealthTransition::Recovered) {
                        let strain = infection.dominant_strain(today);
                        if let Some(new) = infection.disease().within_host_mutation(strain, rng) {
                            infection.mutate(strain, new, today);
                        }
                    }
                }

                for transition in transitions {
                    self.apply_transition(person, condition, transition);
                    events.push(HealthEvent {
                        person,
                        condition,
                        transition,
                    });
                    died |= transition == HealthTransition::Died;
                }

                let health = &self.people[index].health[condition.0];
                if !died
                    && health.infection.is_none()
                    && !health.susceptible
                    && health.susceptible_date.is_some_and(|date| today >= date)
                {
                    self.apply_transition(person, condition, HealthTransition::BecameSusceptible);
                    events.push(HealthEvent {
                        person,
                        condition,
                        transition: HealthTransition::BecameSusceptible,
                    });
                }
            }
        }
        events
    }

    pub(crate) fn scale_susceptibility(
        &mut self,
        person: PersonId,
        condition: ConditionId,
        multiplier: f64,
    ) {
        self.health_mut(person, condition).susceptibility *= multiplier;
    }
}

impl HostView for Population {
    fn is_susceptible(&self, person: PersonId, condition: ConditionId) -> bool {
        match self.people.get(person.0) {
            Some(p) if p.alive => p.health(condition).is_none_or(Health::is_susceptible),
            _ => false,
        }
    }

    fn susceptibility(&self, person: PersonId, condition: ConditionId) -> f64 {
        self.health(person, condition)
            .map_or(1.0, Health::susceptibility)
    }

    fn infectivity(&self, person: PersonId, condition: ConditionId) -> f64 {
        self.health(person, condition).map_or(0.0, Health::infectivity)
    }

    fn is_infectious(&self, person: PersonId, condition: ConditionId) -> bool {
        self.is_alive(person) && self.health(person, condition).is_some_and(Health::is_infectious)
    }

    fn transmission_modifier(&self, person: PersonId, condition: ConditionId) -> f64 {
        self.interaction_product(person, condition, |i| i.transmission)
    }

    fn susceptibility_modifier(&self, person: PersonId, condition: ConditionId) -> f64 {
        self.interaction_product(person, condition, |i| i.susceptibility)
    }

    fn is_present(&self, person: PersonId, group: GroupId) -> bool {
        self.is_alive(person) && !self.absences.contains(&(person, group))
    }

    fn age(&self, person: PersonId) -> f64 {
        self.people.get(person.0).map_or(0.0, |p| p.age)
    }

    fn transmitted_loads(
        &self,
        person: PersonId,
        condition: ConditionId,
        day: Day,
    ) -> Vec<(StrainId, f64)> {
        self.infection(person, condition)
            .map(|infection| infection.current_loads(day))
            .unwrap_or_default()
    }
}

pub trait ContextPopulationExt {
    fn add_person(&mut self, age: f64) -> PersonId;

    fn get_current_population(&self) -> usize;

    fn population(&self) -> Option<&Population>;

    fn population_mut(&mut self) -> &mut Population;

    fn get_health(&self, person: PersonId, condition: ConditionId) -> Option<&Health>;

    fn is_alive(&self, person: PersonId) -> bool;

    /// Marks `person` as absent from (or back in) `group` until changed again.
    fn set_absent(&mut self, person: PersonId, group: GroupId, absent: bool);
}

impl ContextPopulationExt for Context {
    fn add_person(&mut self, age: f64) -> PersonId {
        self.get_data_container_mut::<Population>().add_person(age)
    }

    fn get_current_population(&self) -> usize {
        self.population().map_or(0, Population::len)
    }

    fn population(&self) -> Option<&Population> {
        self.get_data_container::<Population>()
    }

    fn population_mut(&mut self) -> &mut Population {
        self.get_data_container_mut::<Population>()
    }

    fn get_health(&self, person: PersonId, condition: ConditionId) -> Option<&Health> {
        self.population()
            .and_then(|population| population.health(person, condition))
    }

    fn is_alive(&self, person: PersonId) -> bool {
        self.population()
            .is_some_and(|population| population.is_alive(person))
    }

    fn set_absent(&mut self, person: PersonId, group: GroupId, absent: bool) {
        self.population_mut().set_absent(person, group, absent);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::disease::test::{fixed_course_disease, fixed_course_params};
    use crate::disease::Disease;
    use crate::infection::InfectionSource;
    use crate::params::CaseFatalityParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    const FLU: ConditionId = ConditionId(0);

    fn expose(
        population: &mut Population,
        disease: &Arc<Disease>,
        person: PersonId,
        day: Day,
        rng: &mut StdRng,
    ) -> Option<Vec<HealthEvent>> {
        let infection = Infection::new(
            Arc::clone(disease),
            person,
            InfectionSource::default(),
            day,
            population.age(person),
            &[],
            rng,
        );
        population.become_exposed(infection, day, rng)
    }

    fn transitions(events: &[HealthEvent]) -> Vec<HealthTransition> {
        events.iter().map(|event| event.transition).collect()
    }

    #[test]
    fn new_people_are_susceptible_and_present() {
        let mut population = Population::default();
        let person = population.add_person(34.0);
        assert!(population.is_susceptible(person, FLU));
        assert_eq!(population.susceptibility(person, FLU), 1.0);
        assert!(population.is_present(person, GroupId(3)));
        assert!(!population.is_infectious(person, FLU));
        assert!(!population.is_susceptible(PersonId(7), FLU));

        population.set_absent(person, GroupId(3), true);
        assert!(!population.is_present(person, GroupId(3)));
        assert!(population.is_present(person, GroupId(4)));
        population.set_absent(person, GroupId(3), false);
        assert!(population.is_present(person, GroupId(3)));
    }

    #[test]
    fn course_runs_through_health_record() {
        let disease = fixed_course_disease(1, 0, 2, 1.0);
        let mut population = Population::default();
        let person = population.add_person(30.0);
        let mut rng = StdRng::seed_from_u64(4);

        let first_day = expose(&mut population, &disease, person, 0, &mut rng).unwrap();
        assert_eq!(transitions(&first_day), vec![HealthTransition::BecameUnsusceptible]);
        assert!(!population.is_susceptible(person, FLU));
        // A second exposure the same day is dropped.
        assert!(expose(&mut population, &disease, person, 0, &mut rng).is_none());

        let day1 = population.update_health(1, &mut rng);
        assert_eq!(
            transitions(&day1),
            vec![HealthTransition::BecameInfectious, HealthTransition::BecameSymptomatic]
        );
        assert!(population.is_infectious(person, FLU));
        assert_eq!(population.infectivity(person, FLU), 1.0);
        assert_eq!(population.transmitted_loads(person, FLU, 1).len(), 1);

        population.update_health(2, &mut rng);
        let day3 = population.update_health(3, &mut rng);
        assert_eq!(transitions(&day3), vec![HealthTransition::Recovered]);
        let health = population.health(person, FLU).unwrap();
        assert!(health.is_recovered());
        assert!(health.infection().is_none());
        assert_eq!(health.past_infections().len(), 1);
        assert_eq!(health.past_infections()[0].recovery_date, Some(3));
        // Permanent immunity.
        assert!(!population.is_susceptible(person, FLU));
        assert!(population.update_health(40, &mut rng).is_empty());
    }

    #[test]
    fn exposure_day_is_not_replayed_by_the_health_pass() {
        let disease = fixed_course_disease(0, 0, 2, 1.0);
        let mut population = Population::default();
        let person = population.add_person(30.0);
        let mut rng = StdRng::seed_from_u64(4);

        let first_day = expose(&mut population, &disease, person, 0, &mut rng).unwrap();
        assert_eq!(
            transitions(&first_day),
            vec![
                HealthTransition::BecameInfectious,
                HealthTransition::BecameSymptomatic,
                HealthTransition::BecameUnsusceptible,
            ]
        );
        assert!(population.update_health(0, &mut rng).is_empty());
        assert!(population.is_infectious(person, FLU));
        assert_eq!(
            transitions(&population.update_health(2, &mut rng)),
            vec![HealthTransition::Recovered]
        );
    }

    #[test]
    fn immunity_wanes_on_the_drawn_day() {
        let mut params = fixed_course_params("flu", 1, 0, 2, 1.0);
        params.immunity_loss_rate = 0.2;
        let disease = Arc::new(Disease::from_params(FLU, &params).unwrap());
        let mut population = Population::default();
        let person = population.add_person(30.0);
        let mut rng = StdRng::seed_from_u64(4);
        expose(&mut population, &disease, person, 0, &mut rng);
        let susceptible_date = population
            .infection(person, FLU)
            .unwrap()
            .susceptible_date()
            .unwrap();

        let mut became_susceptible = None;
        for day in 1..=susceptible_date {
            let events = population.update_health(day, &mut rng);
            if transitions(&events).contains(&HealthTransition::BecameSusceptible) {
                became_susceptible = Some(day);
            }
        }
        assert_eq!(became_susceptible, Some(susceptible_date));
        assert!(population.is_susceptible(person, FLU));
    }

    #[test]
    fn death_ends_every_condition() {
        let mut params = fixed_course_params("flu", 0, 0, 5, 1.0);
        params.case_fatality = Some(CaseFatalityParams {
            min_symptoms: 0.0,
            age_probability: vec![120.0, 1.0],
            prob_by_day: vec![1.0],
        });
        let deadly = Arc::new(Disease::from_params(FLU, &params).unwrap());
        let mild = Arc::new(
            Disease::from_params(ConditionId(1), &fixed_course_params("rsv", 3, 0, 5, 1.0))
                .unwrap(),
        );
        let mut population = Population::default();
        let person = population.add_person(80.0);
        let mut rng = StdRng::seed_from_u64(4);
        expose(&mut population, &mild, person, 0, &mut rng);
        let events = expose(&mut population, &deadly, person, 0, &mut rng).unwrap();

        assert!(transitions(&events).contains(&HealthTransition::Died));
        assert!(!population.is_alive(person));
        assert!(population.infection(person, ConditionId(1)).is_none());
        assert!(!population.is_present(person, GroupId(0)));
        assert!(!population.is_susceptible(person, ConditionId(1)));
        assert!(population.update_health(1, &mut rng).is_empty());
    }

    #[test]
    fn other_conditions_scale_transmission() {
        let disease = fixed_course_disease(1, 0, 5, 1.0);
        let mut population = Population::default();
        let person = population.add_person(30.0);
        let mut rng = StdRng::seed_from_u64(4);
        let hiv = ConditionId(1);
        population.set_condition_interaction(
            FLU,
            hiv,
            ConditionInteraction {
                transmission: 2.0,
                susceptibility: 3.0,
            },
        );
        assert_eq!(population.transmission_modifier(person, hiv), 1.0);

        expose(&mut population, &disease, person, 0, &mut rng);
        assert_eq!(population.transmission_modifier(person, hiv), 2.0);
        assert_eq!(population.susceptibility_modifier(person, hiv), 3.0);
        // A condition does not modify itself.
        assert_eq!(population.transmission_modifier(person, FLU), 1.0);
    }

    #[test]
    fn infector_counts_infectees() {
        let disease = fixed_course_disease(0, 0, 5, 1.0);
        let mut population = Population::default();
        let infector = population.add_person(30.0);
        let infectee = population.add_person(30.0);
        let mut rng = StdRng::seed_from_u64(4);
        expose(&mut population, &disease, infector, 0, &mut rng);

        let infection = Infection::new(
            Arc::clone(&disease),
            infectee,
            InfectionSource {
                infector: Some(infector),
                place: Some(GroupId(0)),
            },
            1,
            30.0,
            &population.transmitted_loads(infector, FLU, 1),
            &mut rng,
        );
        population.become_exposed(infection, 1, &mut rng).unwrap();
        assert_eq!(population.infection(infector, FLU).unwrap().infectee_count(), 1);
        assert_eq!(population.infection(infectee, FLU).unwrap().infector(), Some(infector));
    }
}
