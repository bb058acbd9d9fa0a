//! Per-disease configuration shared by all infections of that disease.

use crate::age_map::AgeMap;
use crate::error::IxaError;
use crate::log::debug;
use crate::natural_history::{IntraHost, NaturalHistory};
use crate::params::{CaseFatalityParams, DiseaseParams, EvolutionParams};
use crate::random::draw_exponential;
use crate::strain::StrainTable;
use crate::trajectory::Trajectory;
use crate::{ConditionId, Context, DataPlugin, StrainId};
use rand::Rng;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CaseFatality {
    min_symptoms: f64,
    age_probability: AgeMap,
    prob_by_day: Vec<f64>,
}

impl CaseFatality {
    fn from_params(name: &str, params: &CaseFatalityParams) -> Result<Self, IxaError> {
        if params.prob_by_day.is_empty()
            || params.prob_by_day.iter().any(|p| !(0.0..=1.0).contains(p))
        {
            return Err(IxaError::invalid_parameter(
                format!("{name}.case_fatality.prob_by_day"),
                "needs at least one probability between 0 and 1",
            ));
        }
        Ok(CaseFatality {
            min_symptoms: params.min_symptoms,
            age_probability: AgeMap::from_flat(
                &format!("{name}.case_fatality.age_probability"),
                &params.age_probability,
            )?,
            prob_by_day: params.prob_by_day.clone(),
        })
    }

    /// Probability of dying today for a host `days_symptomatic` days into symptoms. Days past
    /// the configured table use its last entry.
    pub fn probability(&self, real_age: f64, days_symptomatic: usize, multiplier: f64) -> f64 {
        let by_day = self.prob_by_day[days_symptomatic.min(self.prob_by_day.len() - 1)];
        self.age_probability.find_value(real_age) * multiplier * by_day
    }
}

#[derive(Debug)]
pub struct Disease {
    id: ConditionId,
    name: String,
    transmissibility: f64,
    infectivity_threshold: f64,
    symptomaticity_threshold: f64,
    natural_history: NaturalHistory,
    susceptibility_period: u32,
    immunity_loss_rate: f64,
    infection_immunity: AgeMap,
    case_fatality: Option<CaseFatality>,
    chronic_grace_period: Option<u32>,
    evolution: Option<EvolutionParams>,
    strains: StrainTable,
}

fn check_probability(name: String, value: f64) -> Result<(), IxaError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(IxaError::invalid_parameter(name, "must be between 0 and 1"))
    }
}

fn check_non_negative(name: String, value: f64) -> Result<(), IxaError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(IxaError::invalid_parameter(name, "must be a non-negative number"))
    }
}

impl Disease {
    /// Validates `params` and builds the disease. Every error names the offending parameter.
    pub fn from_params(id: ConditionId, params: &DiseaseParams) -> Result<Self, IxaError> {
        let name = params.name.as_str();
        check_non_negative(format!("{name}.transmissibility"), params.transmissibility)?;
        check_non_negative(
            format!("{name}.infectivity_threshold"),
            params.infectivity_threshold,
        )?;
        check_non_negative(
            format!("{name}.symptomaticity_threshold"),
            params.symptomaticity_threshold,
        )?;
        check_non_negative(format!("{name}.immunity_loss_rate"), params.immunity_loss_rate)?;
        if let Some(evolution) = &params.evolution {
            check_probability(
                format!("{name}.evolution.transmission_mutation_prob"),
                evolution.transmission_mutation_prob,
            )?;
            check_probability(
                format!("{name}.evolution.daily_mutation_prob"),
                evolution.daily_mutation_prob,
            )?;
            if evolution.genotype_length == 0 {
                return Err(IxaError::invalid_parameter(
                    format!("{name}.evolution.genotype_length"),
                    "must be positive",
                ));
            }
        }

        let natural_history = NaturalHistory::from_params(name, &params.natural_history)?;
        let case_fatality = params
            .case_fatality
            .as_ref()
            .map(|cf| CaseFatality::from_params(name, cf))
            .transpose()?;
        let infection_immunity =
            AgeMap::from_flat(&format!("{name}.infection_immunity"), &params.infection_immunity)?;

        let strains = StrainTable::new();
        let genotype_length = params.evolution.as_ref().map_or(0, |e| e.genotype_length);
        strains.add(vec![0; genotype_length], params.transmissibility, None);

        Ok(Disease {
            id,
            name: params.name.clone(),
            transmissibility: params.transmissibility,
            infectivity_threshold: params.infectivity_threshold,
            symptomaticity_threshold: params.symptomaticity_threshold,
            natural_history,
            susceptibility_period: params.susceptibility_period,
            immunity_loss_rate: params.immunity_loss_rate,
            infection_immunity,
            case_fatality,
            chronic_grace_period: params.chronic.as_ref().map(|c| c.grace_period),
            evolution: params.evolution.clone(),
            strains,
        })
    }

    pub fn id(&self) -> ConditionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transmissibility(&self) -> f64 {
        self.transmissibility
    }

    pub fn infectivity_threshold(&self) -> f64 {
        self.infectivity_threshold
    }

    pub fn symptomaticity_threshold(&self) -> f64 {
        self.symptomaticity_threshold
    }

    pub fn susceptibility_period(&self) -> u32 {
        self.susceptibility_period
    }

    pub fn natural_history(&self) -> &NaturalHistory {
        &self.natural_history
    }

    pub fn strains(&self) -> &StrainTable {
        &self.strains
    }

    pub fn case_fatality(&self) -> Option<&CaseFatality> {
        self.case_fatality.as_ref()
    }

    /// Days from exposure to infectiousness for diseases with a chronic course.
    pub fn chronic_grace_period(&self) -> Option<u32> {
        self.chronic_grace_period
    }

    pub fn get_trajectory<R: Rng + ?Sized>(
        &self,
        age: f64,
        loads: &[(StrainId, f64)],
        rng: &mut R,
    ) -> Trajectory {
        self.natural_history.get_trajectory(age, loads, rng)
    }

    /// Days a recovered host stays immune, or `None` for lifelong immunity.
    pub fn days_recovered<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<i32> {
        if self.immunity_loss_rate <= 0.0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        draw_exponential(rng, self.immunity_loss_rate).map(|days| (0.5 + days).floor() as i32)
    }

    /// Whether an infection at `age` leaves the host immune after recovery.
    pub fn gen_immunity_infection<R: Rng + ?Sized>(&self, age: f64, rng: &mut R) -> bool {
        rng.random::<f64>() <= self.infection_immunity.find_value_or(age, 1.0)
    }

    /// Runs the daily fatality test for a host with the given symptoms.
    pub fn is_fatal<R: Rng + ?Sized>(
        &self,
        real_age: f64,
        symptoms: f64,
        days_symptomatic: usize,
        multiplier: f64,
        rng: &mut R,
    ) -> bool {
        let Some(case_fatality) = &self.case_fatality else {
            return false;
        };
        if symptoms < case_fatality.min_symptoms {
            return false;
        }
        rng.random::<f64>() < case_fatality.probability(real_age, days_symptomatic, multiplier)
    }

    /// The strain passed on by a transmission of `strain`, which may pick up a mutation.
    pub fn transmitted_strain<R: Rng + ?Sized>(&self, strain: StrainId, rng: &mut R) -> StrainId {
        match &self.evolution {
            Some(evolution)
                if evolution.transmission_mutation_prob > 0.0
                    && rng.random::<f64>() < evolution.transmission_mutation_prob =>
            {
                self.strains.point_mutation(strain, evolution.alphabet, rng)
            }
            _ => strain,
        }
    }

    /// Draws whether `strain` mutates within its host today, returning the new strain if so.
    pub fn within_host_mutation<R: Rng + ?Sized>(
        &self,
        strain: StrainId,
        rng: &mut R,
    ) -> Option<StrainId> {
        let evolution = self.evolution.as_ref()?;
        if evolution.daily_mutation_prob <= 0.0
            || rng.random::<f64>() >= evolution.daily_mutation_prob
        {
            return None;
        }
        Some(self.strains.point_mutation(strain, evolution.alphabet, rng)).filter(|&s| s != strain)
    }
}

struct DiseaseRegistry {
    diseases: Vec<Arc<Disease>>,
}

impl DataPlugin for DiseaseRegistry {
    const new: &'static dyn Fn() -> Self = &|| DiseaseRegistry {
        diseases: Vec::new(),
    };
}

pub trait ContextDiseaseExt {
    /// Validates and registers a disease; ids are assigned in registration order.
    fn add_disease(&mut self, params: &DiseaseParams) -> Result<ConditionId, IxaError>;

    /// Registers several diseases in order. Nothing is registered unless all of them are valid.
    fn add_diseases(&mut self, params: &[DiseaseParams]) -> Result<Vec<ConditionId>, IxaError>;

    fn get_disease(&self, id: ConditionId) -> Option<Arc<Disease>>;

    fn get_disease_by_name(&self, name: &str) -> Option<Arc<Disease>>;

    fn disease_ids(&self) -> Vec<ConditionId>;
}

impl ContextDiseaseExt for Context {
    fn add_disease(&mut self, params: &DiseaseParams) -> Result<ConditionId, IxaError> {
        let ids = self.add_diseases(std::slice::from_ref(params))?;
        Ok(ids[0])
    }

    fn add_diseases(&mut self, params: &[DiseaseParams]) -> Result<Vec<ConditionId>, IxaError> {
        let first = self
            .get_data_container::<DiseaseRegistry>()
            .map_or(0, |registry| registry.diseases.len());
        let mut built = Vec::with_capacity(params.len());
        for (offset, disease_params) in params.iter().enumerate() {
            let name = &disease_params.name;
            let repeated = params[..offset].iter().any(|earlier| &earlier.name == name);
            if repeated || self.get_disease_by_name(name).is_some() {
                return Err(IxaError::invalid_parameter(
                    format!("diseases.{name}"),
                    "disease names must be unique",
                ));
            }
            built.push(Disease::from_params(ConditionId(first + offset), disease_params)?);
        }

        let registry = self.get_data_container_mut::<DiseaseRegistry>();
        let mut ids = Vec::with_capacity(built.len());
        for disease in built {
            debug!("registered disease {} as {:?}", disease.name(), disease.id());
            ids.push(disease.id());
            registry.diseases.push(Arc::new(disease));
        }
        Ok(ids)
    }

    fn get_disease(&self, id: ConditionId) -> Option<Arc<Disease>> {
        self.get_data_container::<DiseaseRegistry>()
            .and_then(|registry| registry.diseases.get(id.0).cloned())
    }

    fn get_disease_by_name(&self, name: &str) -> Option<Arc<Disease>> {
        self.get_data_container::<DiseaseRegistry>().and_then(|registry| {
            registry
                .diseases
                .iter()
                .find(|disease| disease.name() == name)
                .cloned()
        })
    }

    fn disease_ids(&self) -> Vec<ConditionId> {
        self.get_data_container::<DiseaseRegistry>()
            .map_or_else(Vec::new, |registry| {
                registry.diseases.iter().map(|d| d.id()).collect()
            })
    }
}
