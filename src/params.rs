use crate::disease::ContextDiseaseExt;
use crate::distribution::PeriodDistributionParams;
use crate::error::IxaError;
use crate::log::{info, init_logging, parse_level};
use crate::random::ContextRandomExt;
use crate::transmission::ContextTransmissionExt;
use crate::{Context, DataPlugin};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

fn default_start_day_of_year() -> u32 {
    1
}

fn default_max_infectees() -> Option<usize> {
    Some(10)
}

fn default_days_sick() -> usize {
    10
}

fn default_ode_duration() -> usize {
    8
}

fn default_ode_step() -> f64 {
    1e-4
}

fn default_alphabet() -> u32 {
    4
}

fn default_transition_time_period() -> f64 {
    1.0
}

fn default_markov_max_days() -> usize {
    365
}

/// Top-level parameters of a run.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Params {
    /// The random seed for the simulation.
    pub seed: u64,
    /// Day of the year (1 to 366) of simulation day 0.
    #[serde(default = "default_start_day_of_year")]
    pub start_day_of_year: u32,
    #[serde(default)]
    pub transmission: TransmissionParams,
    pub diseases: Vec<DiseaseParams>,
    /// Console log level; logging stays off when absent.
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TransmissionParams {
    /// Use the density model instead of the default model in neighborhoods.
    #[serde(default)]
    pub enable_neighborhood_density_transmission: bool,
    /// Infections one infector may cause per day under the density model; `null` for no cap.
    #[serde(default = "default_max_infectees")]
    pub density_transmission_maximum_infectees: Option<usize>,
    /// Fraction by which transmission drops at the seasonal trough; 0 disables seasonality.
    #[serde(default)]
    pub seasonal_reduction: f64,
    #[serde(default = "default_start_day_of_year")]
    pub seasonal_peak_day_of_year: u32,
}

impl Default for TransmissionParams {
    fn default() -> Self {
        TransmissionParams {
            enable_neighborhood_density_transmission: false,
            density_transmission_maximum_infectees: default_max_infectees(),
            seasonal_reduction: 0.0,
            seasonal_peak_day_of_year: default_start_day_of_year(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct DiseaseParams {
    pub name: String,
    pub transmissibility: f64,
    /// Infectivity above which a host counts as infectious.
    #[serde(default)]
    pub infectivity_threshold: f64,
    /// Symptomaticity above which a host counts as symptomatic.
    #[serde(default)]
    pub symptomaticity_threshold: f64,
    pub natural_history: NaturalHistoryParams,
    /// Days after exposure at which the host stops being susceptible.
    #[serde(default)]
    pub susceptibility_period: u32,
    /// Rate of the exponential delay until recovered hosts lose immunity; 0 keeps immunity.
    #[serde(default)]
    pub immunity_loss_rate: f64,
    /// Age map of the probability that an infection leaves immunity; empty means always.
    #[serde(default)]
    pub infection_immunity: Vec<f64>,
    #[serde(default)]
    pub case_fatality: Option<CaseFatalityParams>,
    #[serde(default)]
    pub chronic: Option<ChronicParams>,
    #[serde(default)]
    pub evolution: Option<EvolutionParams>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum NaturalHistoryParams {
    Default(DefaultHistoryParams),
    Fixed(FixedHistoryParams),
    Rsa(RsaHistoryParams),
    Ode(OdeHistoryParams),
    Markov(MarkovHistoryParams),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Progression {
    /// Latent, then asymptomatic, then (for symptomatic cases) symptomatic.
    #[default]
    Sequential,
    /// Latent, then either asymptomatic or symptomatic.
    Branching,
}

/// Probability of developing symptoms, either one value or an age map.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum SymptomProbabilityParams {
    Scalar(f64),
    ByAge(Vec<f64>),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DefaultHistoryParams {
    #[serde(default)]
    pub progression: Progression,
    pub prob_symptoms: SymptomProbabilityParams,
    pub days_latent: PeriodDistributionParams,
    pub days_asymptomatic: PeriodDistributionParams,
    pub days_symptomatic: PeriodDistributionParams,
    pub asymptomatic_infectivity: f64,
    pub symptomatic_infectivity: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FixedProfileParams {
    pub infectivity: Vec<f64>,
    pub symptomaticity: Vec<f64>,
}

/// A library of precomputed profiles drawn with the given cumulative probabilities. Profiles
/// are listed inline or read from two CSV files with one profile per row.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FixedHistoryParams {
    #[serde(default)]
    pub profiles: Vec<FixedProfileParams>,
    #[serde(default)]
    pub infectivity_file: Option<PathBuf>,
    #[serde(default)]
    pub symptomaticity_file: Option<PathBuf>,
    pub probabilities: Vec<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct AgeSeverityParams {
    pub lower_age: f64,
    pub upper_age: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RsaHistoryParams {
    pub symptoms_scaling: f64,
    pub viral_infectivity_scaling: f64,
    #[serde(default = "default_days_sick")]
    pub days_sick: usize,
    /// Ties the first severity coordinate to age instead of drawing it.
    #[serde(default)]
    pub age_severity: Option<AgeSeverityParams>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OdeHistoryParams {
    pub viral_titer_scaling: f64,
    pub viral_titer_latent_threshold: f64,
    pub interferon_scaling: f64,
    pub interferon_threshold: f64,
    #[serde(default = "default_ode_duration")]
    pub duration: usize,
    /// Integration step in days.
    #[serde(default = "default_ode_step")]
    pub step_size: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct MarkovStateParams {
    pub name: String,
    pub infectivity: f64,
    pub symptoms: f64,
    /// Entering this state kills the host.
    #[serde(default)]
    pub fatal: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct MarkovGroupParams {
    /// Percent of infections starting in each state. The first state gets whatever the
    /// others leave, so its entry is ignored.
    pub initial_percent: Vec<f64>,
    /// `transitions[i][j]` is the probability of moving from state `i` to state `j` in one
    /// time period. Diagonal entries are ignored; staying gets what the row leaves.
    pub transitions: Vec<Vec<f64>>,
}

/// A Markov chain over named states, each with its own infectivity and symptoms.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MarkovHistoryParams {
    pub states: Vec<MarkovStateParams>,
    /// Upper age bound of each entry of `groups`. Empty when there is a single group.
    #[serde(default)]
    pub age_bounds: Vec<f64>,
    pub groups: Vec<MarkovGroupParams>,
    /// Days per step of the transition probabilities.
    #[serde(default = "default_transition_time_period")]
    pub transition_time_period: f64,
    /// Longest course; chains still active by then are cut off.
    #[serde(default = "default_markov_max_days")]
    pub max_days: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct CaseFatalityParams {
    /// Minimum symptomaticity for the fatality test to run.
    pub min_symptoms: f64,
    /// Age map of the baseline fatality probability.
    pub age_probability: Vec<f64>,
    /// Probability factor by day of symptoms.
    pub prob_by_day: Vec<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ChronicParams {
    /// Days between exposure and becoming infectious.
    pub grace_period: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct EvolutionParams {
    /// Length of the root strain's genotype.
    pub genotype_length: usize,
    #[serde(default = "default_alphabet")]
    pub alphabet: u32,
    /// Probability that a transmitted strain picks up a point mutation.
    #[serde(default)]
    pub transmission_mutation_prob: f64,
    /// Daily probability of a point mutation within an infected host.
    #[serde(default)]
    pub daily_mutation_prob: f64,
}

fn validate_inputs(params: &Params) -> Result<(), IxaError> {
    if !(1..=366).contains(&params.start_day_of_year) {
        return Err(IxaError::invalid_parameter(
            "start_day_of_year",
            "must be between 1 and 366",
        ));
    }
    let transmission = &params.transmission;
    if !(0.0..=1.0).contains(&transmission.seasonal_reduction) {
        return Err(IxaError::invalid_parameter(
            "transmission.seasonal_reduction",
            "must be between 0 and 1",
        ));
    }
    if !(1..=366).contains(&transmission.seasonal_peak_day_of_year) {
        return Err(IxaError::invalid_parameter(
            "transmission.seasonal_peak_day_of_year",
            "must be between 1 and 366",
        ));
    }
    if transmission.density_transmission_maximum_infectees == Some(0) {
        return Err(IxaError::invalid_parameter(
            "transmission.density_transmission_maximum_infectees",
            "must be positive or null",
        ));
    }
    for (i, disease) in params.diseases.iter().enumerate() {
        if params.diseases[..i].iter().any(|d| d.name == disease.name) {
            return Err(IxaError::invalid_parameter(
                format!("diseases.{}", disease.name),
                "disease names must be unique",
            ));
        }
    }
    Ok(())
}

/// Reads parameters from a JSON file and checks the run-level settings. Disease settings are
/// checked when the diseases are registered.
pub fn read_params(path: &Path) -> Result<Params, IxaError> {
    let file = File::open(path)?;
    let params: Params = serde_json::from_reader(BufReader::new(file))?;
    validate_inputs(&params)?;
    Ok(params)
}

struct ParamsPlugin {
    params: Option<Params>,
}

impl DataPlugin for ParamsPlugin {
    const new: &'static dyn Fn() -> Self = &|| ParamsPlugin { params: None };
}

pub trait ContextParamsExt {
    /// Loads a parameter file and sets the context up from it: logging, every disease in file
    /// order, the random seed and transmission settings. A disease that fails to load leaves
    /// no disease registered.
    fn load_params(&mut self, path: &Path) -> Result<(), IxaError>;

    fn apply_params(&mut self, params: Params) -> Result<(), IxaError>;

    fn params(&self) -> Option<&Params>;
}

impl ContextParamsExt for Context {
    fn load_params(&mut self, path: &Path) -> Result<(), IxaError> {
        let params = read_params(path)?;
        self.apply_params(params)
    }

    fn apply_params(&mut self, params: Params) -> Result<(), IxaError> {
        validate_inputs(&params)?;
        if let Some(level) = &params.log_level {
            init_logging(parse_level(level)?)?;
        }
        self.add_diseases(&params.diseases)?;
        self.init_random(params.seed);
        self.set_transmission_params(&params.transmission, params.start_day_of_year);
        info!(
            "loaded parameters: seed {}, {} disease(s)",
            params.seed,
            params.diseases.len()
        );
        self.get_data_container_mut::<ParamsPlugin>().params = Some(params);
        Ok(())
    }

    fn params(&self) -> Option<&Params> {
        self.get_data_container::<ParamsPlugin>()
            .and_then(|plugin| plugin.params.as_ref())
    }
}
