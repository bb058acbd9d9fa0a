//! Who infects whom inside one group on one day.
//!
//! [`spread_in_group`] picks the contact model for the group and runs it. Models only read
//! the population; every successful transmission becomes an [`Infection`] in the group's
//! [`ExposureBuffer`], and the driver applies the buffers once all groups are done. This is
//! what lets groups be processed on different threads.

mod default_model;
mod density;
mod network;
mod pairwise;
mod seasonality;

pub use seasonality::Seasonality;

use crate::disease::Disease;
use crate::group::{Group, GroupKind, MixingGroup};
use crate::hashing::HashSet;
use crate::infection::{Infection, InfectionSource};
use crate::log::{debug, trace};
use crate::params::TransmissionParams;
use crate::population::HostView;
use crate::{ConditionId, Context, DataPlugin, Day, GroupId, PersonId, StrainId};
use rand::Rng;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionSettings {
    /// Neighborhoods use the density model instead of the default one.
    pub neighborhood_density: bool,
    pub max_infectees: Option<usize>,
    pub seasonality: Seasonality,
}

impl Default for TransmissionSettings {
    fn default() -> Self {
        TransmissionSettings {
            neighborhood_density: false,
            max_infectees: Some(10),
            seasonality: Seasonality::default(),
        }
    }
}

impl TransmissionSettings {
    pub fn from_params(params: &TransmissionParams, start_day_of_year: u32) -> Self {
        TransmissionSettings {
            neighborhood_density: params.enable_neighborhood_density_transmission,
            max_infectees: params.density_transmission_maximum_infectees,
            seasonality: Seasonality::new(
                params.seasonal_reduction,
                params.seasonal_peak_day_of_year,
                start_day_of_year,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionModel {
    Default,
    Pairwise,
    Density,
    Network,
}

pub fn select_model(kind: GroupKind, settings: &TransmissionSettings) -> TransmissionModel {
    match kind {
        GroupKind::Household => TransmissionModel::Pairwise,
        GroupKind::Neighborhood if settings.neighborhood_density => TransmissionModel::Density,
        GroupKind::Network => TransmissionModel::Network,
        _ => TransmissionModel::Default,
    }
}

/// New infections found in one group, in the order they happened.
#[derive(Debug, Default)]
pub struct ExposureBuffer {
    infections: Vec<Infection>,
    exposed: HashSet<PersonId>,
    attempts: usize,
}

impl ExposureBuffer {
    pub fn len(&self) -> usize {
        self.infections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infections.is_empty()
    }

    pub fn contains(&self, person: PersonId) -> bool {
        self.exposed.contains(&person)
    }

    /// Transmission attempts made, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn iter(&self) -> impl Iterator<Item = &Infection> {
        self.infections.iter()
    }

    fn push(&mut self, infection: Infection) {
        self.exposed.insert(infection.host());
        self.infections.push(infection);
    }
}

impl IntoIterator for ExposureBuffer {
    type Item = Infection;
    type IntoIter = std::vec::IntoIter<Infection>;

    fn into_iter(self) -> Self::IntoIter {
        self.infections.into_iter()
    }
}

/// Everything a contact model needs besides the group itself.
pub struct Spread<'a, H: HostView> {
    pub disease: &'a Arc<Disease>,
    pub hosts: &'a H,
    pub group: GroupId,
    pub day: Day,
    pub seasonal_multiplier: f64,
}

impl<H: HostView> Spread<'_, H> {
    pub fn condition(&self) -> ConditionId {
        self.disease.id()
    }

    /// Susceptible and not already exposed earlier in this pass.
    pub fn is_susceptible(&self, person: PersonId, buffer: &ExposureBuffer) -> bool {
        !buffer.contains(person) && self.hosts.is_susceptible(person, self.condition())
    }

    /// The strains passed from `infector` with their loads, each possibly mutated.
    fn inoculum<R: Rng + ?Sized>(&self, infector: PersonId, rng: &mut R) -> Vec<(StrainId, f64)> {
        let mut inoculum: Vec<(StrainId, f64)> = Vec::new();
        for (strain, load) in self
            .hosts
            .transmitted_loads(infector, self.condition(), self.day)
        {
            let strain = self.disease.transmitted_strain(strain, rng);
            match inoculum.iter_mut().find(|(s, _)| *s == strain) {
                Some((_, total)) => *total += load,
                None => inoculum.push((strain, load)),
            }
        }
        inoculum
    }

    /// Tries to pass the disease from `infector` to `infectee` with base probability `prob`.
    /// A success draws the infectee's course of infection right away.
    pub fn attempt_transmission<R: Rng + ?Sized>(
        &self,
        prob: f64,
        infector: PersonId,
        infectee: PersonId,
        rng: &mut R,
        buffer: &mut ExposureBuffer,
    ) -> bool {
        debug_assert!(self.is_susceptible(infectee, buffer));
        let condition = self.condition();
        buffer.attempts += 1;

        let transmission_prob = prob
            * self.hosts.transmission_modifier(infector, condition)
            * self.seasonal_multiplier;
        let susceptibility = self.hosts.susceptibility(infectee, condition)
            * self.hosts.susceptibility_modifier(infectee, condition);
        let infection_prob = transmission_prob * susceptibility;

        let r = rng.random::<f64>();
        if r >= infection_prob {
            trace!(
                "no transmission: {infector:?} -> {infectee:?}, r = {r}, prob = {infection_prob}"
            );
            return false;
        }
        trace!(
            "transmission succeeded: {infector:?} -> {infectee:?}, r = {r}, prob = {infection_prob}"
        );

        let inoculum = self.inoculum(infector, rng);
        let infection = Infection::new(
            Arc::clone(self.disease),
            infectee,
            InfectionSource {
                infector: Some(infector),
                place: Some(self.group),
            },
            self.day,
            self.hosts.age(infectee),
            &inoculum,
            rng,
        );
        buffer.push(infection);
        true
    }
}

/// Runs one day of transmission of `disease` in `group`.
pub fn spread_in_group<H: HostView, R: Rng + ?Sized>(
    group: &mut Group,
    disease: &Arc<Disease>,
    hosts: &H,
    day: Day,
    settings: &TransmissionSettings,
    rng: &mut R,
) -> ExposureBuffer {
    let condition = disease.id();
    let mut buffer = ExposureBuffer::default();
    if disease.transmissibility() == 0.0 || !group.is_open(day) {
        group.reset_place_state(condition);
        return buffer;
    }
    group.update_infectious(condition, hosts);
    if group.infectious_people(condition).is_empty() {
        group.reset_place_state(condition);
        return buffer;
    }

    let model = select_model(group.kind(), settings);
    let spread = Spread {
        disease,
        hosts,
        group: group.id(),
        day,
        seasonal_multiplier: match model {
            TransmissionModel::Network => 1.0,
            _ => settings.seasonality.multiplier(day),
        },
    };
    match (&*group, model) {
        (Group::Network(network), _) => network::network_model(network, &spread, rng, &mut buffer),
        (_, TransmissionModel::Pairwise) => {
            pairwise::pairwise_model(&*group, &spread, rng, &mut buffer);
        }
        (_, TransmissionModel::Density) => {
            density::density_model(&*group, &spread, settings.max_infectees, rng, &mut buffer);
        }
        _ => default_model::default_model(&*group, &spread, rng, &mut buffer),
    }

    if !buffer.is_empty() {
        debug!(
            "day {day} {model:?} transmission of {} in {:?}: {} infections in {} attempts",
            disease.name(),
            group.id(),
            buffer.len(),
            buffer.attempts()
        );
    }
    group.reset_place_state(condition);
    buffer
}

struct TransmissionPlugin {
    settings: TransmissionSettings,
}

impl DataPlugin for TransmissionPlugin {
    const new: &'static dyn Fn() -> Self = &|| TransmissionPlugin {
        settings: TransmissionSettings::default(),
    };
}

pub trait ContextTransmissionExt {
    fn set_transmission_params(&mut self, params: &TransmissionParams, start_day_of_year: u32);

    fn set_transmission_settings(&mut self, settings: TransmissionSettings);

    fn transmission_settings(&self) -> TransmissionSettings;
}

impl ContextTransmissionExt for Context {
    fn set_transmission_params(&mut self, params: &TransmissionParams, start_day_of_year: u32) {
        let settings = TransmissionSettings::from_params(params, start_day_of_year);
        self.set_transmission_settings(settings);
    }

    fn set_transmission_settings(&mut self, settings: TransmissionSettings) {
        self.get_data_container_mut::<TransmissionPlugin>().settings = settings;
    }

    fn transmission_settings(&self) -> TransmissionSettings {
        self.get_data_container::<TransmissionPlugin>()
            .map(|plugin| plugin.settings.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::disease::test::{fixed_course_disease, fixed_course_params};
    use crate::group::{Mixing, Place};
    use crate::params::EvolutionParams;
    use crate::population::Population;
    use crate::DEFAULT_STRAIN;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// A population of `size` adults in which the people at `infectious` are infectious
    /// from day 0.
    pub(crate) fn population_with(
        disease: &Arc<Disease>,
        size: usize,
        infectious: &[usize],
    ) -> (Population, Vec<PersonId>) {
        let mut population = Population::default();
        let people: Vec<PersonId> = (0..size).map(|_| population.add_person(30.0)).collect();
        let mut rng = StdRng::seed_from_u64(0);
        for &index in infectious {
            let infection = Infection::new(
                Arc::clone(disease),
                people[index],
                InfectionSource::default(),
                0,
                30.0,
                &[],
                &mut rng,
            );
            population.become_exposed(infection, 0, &mut rng);
        }
        (population, people)
    }

    /// Always-infectious disease: no latent period, infectivity 1 for five days.
    pub(crate) fn instant_disease() -> Arc<Disease> {
        fixed_course_disease(0, 0, 5, 1.0)
    }

    pub(crate) fn place(kind: GroupKind, people: &[PersonId], contacts: f64) -> Group {
        Group::Place(Place::new(
            GroupId(0),
            kind,
            people.to_vec(),
            Mixing {
                contacts_per_day: contacts,
                transmission_prob: 1.0,
            },
        ))
    }

    pub(crate) fn infectees(buffer: &ExposureBuffer) -> Vec<PersonId> {
        buffer.iter().map(Infection::host).collect()
    }

    #[test]
    fn model_follows_group_kind() {
        let mut settings = TransmissionSettings::default();
        assert_eq!(select_model(GroupKind::Household, &settings), TransmissionModel::Pairwise);
        assert_eq!(select_model(GroupKind::Neighborhood, &settings), TransmissionModel::Default);
        assert_eq!(select_model(GroupKind::School, &settings), TransmissionModel::Default);
        assert_eq!(select_model(GroupKind::Network, &settings), TransmissionModel::Network);
        settings.neighborhood_density = true;
        assert_eq!(select_model(GroupKind::Neighborhood, &settings), TransmissionModel::Density);
    }

    #[test]
    fn certain_transmission_creates_infections() {
        let disease = instant_disease();
        let (population, people) = population_with(&disease, 2, &[0]);
        let spread = Spread {
            disease: &disease,
            hosts: &population,
            group: GroupId(3),
            day: 4,
            seasonal_multiplier: 1.0,
        };
        let mut buffer = ExposureBuffer::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(spread.attempt_transmission(1.0, people[0], people[1], &mut rng, &mut buffer));
        assert!(!spread.is_susceptible(people[1], &buffer));

        let infection = buffer.iter().next().unwrap();
        assert_eq!(infection.exposure_date(), 4);
        assert_eq!(infection.infector(), Some(people[0]));
        assert_eq!(infection.place(), Some(GroupId(3)));
        assert_eq!(infection.trajectory().all_strains(), vec![DEFAULT_STRAIN]);
        assert_eq!(buffer.attempts(), 1);
    }

    #[test]
    fn seasonality_and_susceptibility_scale_the_probability() {
        let disease = instant_disease();
        let (mut population, people) = population_with(&disease, 2, &[0]);
        let mut rng = StdRng::seed_from_u64(1);
        let mut buffer = ExposureBuffer::default();
        let off_season = Spread {
            disease: &disease,
            hosts: &population,
            group: GroupId(0),
            day: 0,
            seasonal_multiplier: 0.0,
        };
        for _ in 0..100 {
            let infected =
                off_season.attempt_transmission(1.0, people[0], people[1], &mut rng, &mut buffer);
            assert!(!infected);
        }

        population.scale_susceptibility(people[1], disease.id(), 0.0);
        let immune = Spread {
            disease: &disease,
            hosts: &population,
            group: GroupId(0),
            day: 0,
            seasonal_multiplier: 1.0,
        };
        for _ in 0..100 {
            assert!(!immune.attempt_transmission(1.0, people[0], people[1], &mut rng, &mut buffer));
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn transmission_can_mutate_the_strain() {
        let mut params = fixed_course_params("flu", 0, 0, 5, 1.0);
        params.evolution = Some(EvolutionParams {
            genotype_length: 8,
            alphabet: 4,
            transmission_mutation_prob: 1.0,
            daily_mutation_prob: 0.0,
        });
        let disease = Arc::new(Disease::from_params(ConditionId(0), &params).unwrap());
        let (population, people) = population_with(&disease, 2, &[0]);
        let spread = Spread {
            disease: &disease,
            hosts: &population,
            group: GroupId(0),
            day: 1,
            seasonal_multiplier: 1.0,
        };
        let mut buffer = ExposureBuffer::default();
        let mut rng = StdRng::seed_from_u64(5);
        assert!(spread.attempt_transmission(1.0, people[0], people[1], &mut rng, &mut buffer));
        let strains = buffer.iter().next().unwrap().trajectory().all_strains();
        assert_eq!(strains.len(), 1);
        assert_ne!(strains[0], DEFAULT_STRAIN);
        assert_eq!(disease.strains().get(strains[0]).unwrap().parent, Some(DEFAULT_STRAIN));
    }

    #[test]
    fn closed_places_and_harmless_diseases_do_nothing() {
        let disease = instant_disease();
        let (population, people) = population_with(&disease, 5, &[0]);
        let settings = TransmissionSettings::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut group = place(GroupKind::School, &people, 50.0);
        if let Group::Place(p) = &mut group {
            p.close(0, 7);
        }
        let buffer = spread_in_group(&mut group, &disease, &population, 3, &settings, &mut rng);
        assert!(buffer.is_empty());
        assert_eq!(buffer.attempts(), 0);
        assert!(group.infectious_people(disease.id()).is_empty());

        let mut params = fixed_course_params("cold", 0, 0, 5, 1.0);
        params.transmissibility = 0.0;
        let harmless = Arc::new(Disease::from_params(ConditionId(0), &params).unwrap());
        let mut group = place(GroupKind::School, &people, 50.0);
        let buffer = spread_in_group(&mut group, &harmless, &population, 3, &settings, &mut rng);
        assert!(buffer.is_empty());
    }

    #[test]
    fn dispatch_runs_the_household_model() {
        let disease = instant_disease();
        let (population, people) = population_with(&disease, 4, &[0]);
        let settings = TransmissionSettings::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut group = place(GroupKind::Household, &people, 1.0);
        let buffer = spread_in_group(&mut group, &disease, &population, 0, &settings, &mut rng);
        assert_eq!(infectees(&buffer), people[1..].to_vec());
        // The cache is cleared after each pass.
        assert!(group.infectious_people(disease.id()).is_empty());
    }

    #[test]
    fn settings_come_from_params() {
        let mut context = Context::new();
        assert_eq!(context.transmission_settings(), TransmissionSettings::default());
        let params = TransmissionParams {
            enable_neighborhood_density_transmission: true,
            density_transmission_maximum_infectees: None,
            seasonal_reduction: 0.5,
            seasonal_peak_day_of_year: 20,
        };
        context.set_transmission_params(&params, 1);
        let settings = context.transmission_settings();
        assert!(settings.neighborhood_density);
        assert_eq!(settings.max_infectees, None);
        assert!(settings.seasonality.is_enabled());
        assert!((settings.seasonality.multiplier(19) - 1.0).abs() < 1e-12);
    }
}
