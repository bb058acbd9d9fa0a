//! One host's infection with one disease.
//!
//! An infection owns its [`Trajectory`] and derives every transition date from it in
//! [`Infection::determine_transition_dates`]; any change to the trajectory is followed by a
//! call to that method. The daily [`Infection::update`] reports the transitions that happen on
//! the given day as [`HealthTransition`]s for the host's health record to apply.

use crate::disease::Disease;
use crate::error::IxaError;
use crate::natural_history::IntraHost;
use crate::trajectory::Trajectory;
use crate::{Day, GroupId, PersonId, StrainId, DEFAULT_STRAIN};
use rand::Rng;
use std::fmt::{self, Display};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthTransition {
    BecameInfectious,
    BecameSymptomatic,
    Recovered,
    BecameUnsusceptible,
    /// Immunity has waned. Reported by the population, never by an infection.
    BecameSusceptible,
    Died,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Asymptomatic,
    Symptomatic,
}

impl Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Asymptomatic => write!(f, "asymptomatic"),
            Period::Symptomatic => write!(f, "symptomatic"),
        }
    }
}

/// Why a period modification was refused. The infection is left unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum PeriodError {
    NegativeMultiplier(f64),
    PeriodElapsed { period: Period, today: Day, end: Day },
    NoSuchPeriod(Period),
}

impl Display for PeriodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodError::NegativeMultiplier(multiplier) => {
                write!(f, "multiplier {multiplier} is negative")
            }
            PeriodError::PeriodElapsed { period, today, end } => {
                write!(f, "{period} period ended on day {end}, before day {today}")
            }
            PeriodError::NoSuchPeriod(period) => {
                write!(f, "infection has no {period} period")
            }
        }
    }
}

impl std::error::Error for PeriodError {}

impl From<PeriodError> for IxaError {
    fn from(error: PeriodError) -> Self {
        IxaError::IxaError(error.to_string())
    }
}

/// Host attributes the daily fatality test needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostProfile {
    pub real_age: f64,
    /// Product of the host's chronic-condition risk multipliers.
    pub case_fatality_multiplier: f64,
}

impl Default for HostProfile {
    fn default() -> Self {
        HostProfile {
            real_age: 0.0,
            case_fatality_multiplier: 1.0,
        }
    }
}

/// Where an infection came from; both are `None` for seeded cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InfectionSource {
    pub infector: Option<PersonId>,
    pub place: Option<GroupId>,
}

/// Days from `from` to `to`, or zero when `to` comes first.
fn days_between(from: Day, to: Day) -> usize {
    usize::try_from(to - from).unwrap_or(0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_days(days: usize, multiplier: f64) -> usize {
    (days as f64 * multiplier) as usize
}

#[derive(Debug, Clone)]
pub struct Infection {
    disease: Arc<Disease>,
    host: PersonId,
    source: InfectionSource,
    trajectory: Trajectory,
    age_at_exposure: f64,

    exposure_date: Day,
    infectious_date: Option<Day>,
    symptomatic_date: Option<Day>,
    asymptomatic_date: Option<Day>,
    recovery_date: Option<Day>,
    susceptible_date: Option<Day>,
    unsusceptible_date: Day,

    latent_period: usize,
    incubation_period: usize,
    asymptomatic_period: usize,
    symptomatic_period: usize,
    recovery_period: Option<i32>,

    infectivity_multiplier: f64,
    infectivity: f64,
    symptoms: f64,

    immune_response: bool,
    will_be_symptomatic: bool,
    is_susceptible: bool,
    is_fatal: bool,
    infectee_count: usize,

    last_update: Option<Day>,
    /// Transitions already reported on `last_update`.
    reported_today: Vec<HealthTransition>,
}

impl Infection {
    /// Draws the course of a new infection of `host`, exposed on `exposure_date` to the
    /// strains in `loads`.
    pub fn new<R: Rng + ?Sized>(
        disease: Arc<Disease>,
        host: PersonId,
        source: InfectionSource,
        exposure_date: Day,
        age: f64,
        loads: &[(StrainId, f64)],
        rng: &mut R,
    ) -> Self {
        let trajectory = if disease.chronic_grace_period().is_some() {
            Trajectory::new()
        } else {
            disease.get_trajectory(age, loads, rng)
        };
        let immune_response = disease.gen_immunity_infection(age, rng);
        let recovery_period = if immune_response {
            disease.days_recovered(rng)
        } else {
            Some(0)
        };
        #[allow(clippy::cast_possible_wrap)]
        let unsusceptible_date = exposure_date + disease.susceptibility_period() as Day;

        let mut infection = Infection {
            disease,
            host,
            source,
            trajectory,
            age_at_exposure: age,
            exposure_date,
            infectious_date: None,
            symptomatic_date: None,
            asymptomatic_date: None,
            recovery_date: None,
            susceptible_date: None,
            unsusceptible_date,
            latent_period: 0,
            incubation_period: 0,
            asymptomatic_period: 0,
            symptomatic_period: 0,
            recovery_period,
            infectivity_multiplier: 1.0,
            infectivity: 0.0,
            symptoms: 0.0,
            immune_response,
            will_be_symptomatic: false,
            is_susceptible: true,
            is_fatal: false,
            infectee_count: 0,
            last_update: None,
            reported_today: Vec::new(),
        };
        infection.determine_transition_dates();
        infection
    }

    /// Recomputes every transition date and period length from the trajectory.
    pub fn determine_transition_dates(&mut self) {
        self.infectious_date = None;
        self.symptomatic_date = None;
        self.asymptomatic_date = None;
        self.latent_period = 0;
        self.incubation_period = 0;
        self.asymptomatic_period = 0;
        self.symptomatic_period = 0;

        if let Some(grace_period) = self.disease.chronic_grace_period() {
            self.latent_period = grace_period as usize;
            #[allow(clippy::cast_possible_wrap)]
            let infectious_date = self.exposure_date + grace_period as Day;
            self.infectious_date = Some(infectious_date);
            self.asymptomatic_date = Some(infectious_date);
            self.recovery_date = None;
            self.susceptible_date = None;
            self.will_be_symptomatic = false;
            return;
        }

        let infectivity_threshold = self.disease.infectivity_threshold();
        let symptomaticity_threshold = self.disease.symptomaticity_threshold();
        for (t, point) in self.trajectory.iter().enumerate() {
            let infective = point.infectivity > infectivity_threshold;
            let symptomatic = point.symptomaticity > symptomaticity_threshold;
            #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
            let date = self.exposure_date + t as Day;

            if infective && self.infectious_date.is_none() {
                self.latent_period = t;
                self.infectious_date = Some(date);
                if !symptomatic {
                    self.asymptomatic_date = Some(date);
                }
            }
            if symptomatic && self.symptomatic_date.is_none() {
                self.incubation_period = t;
                self.symptomatic_date = Some(date);
            }
            if symptomatic {
                self.symptomatic_period += 1;
            } else if infective {
                self.asymptomatic_period += 1;
            }
        }

        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
        let recovery_date = self.exposure_date + self.trajectory.duration() as Day;
        self.recovery_date = Some(recovery_date);
        self.susceptible_date = self
            .recovery_period
            .filter(|&days| days >= 0)
            .map(|days| recovery_date + days);
        self.will_be_symptomatic = self.symptomatic_date.is_some();
    }

    /// Refreshes today's infectivity and symptoms and returns the transitions due today.
    ///
    /// A second update on the same day reports only transitions not yet reported that day,
    /// such as a recovery a modification moved to today, and skips the fatality test.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        today: Day,
        host: &HostProfile,
        rng: &mut R,
    ) -> Vec<HealthTransition> {
        let repeat = self.last_update == Some(today);
        if !repeat {
            self.last_update = Some(today);
            self.reported_today.clear();
        }

        if self.disease.chronic_grace_period().is_some() {
            let infectious = self.infectious_date.is_some_and(|date| today >= date);
            self.infectivity = if infectious { 1.0 } else { 0.0 };
            self.symptoms = 0.0;
        } else {
            let point = self.trajectory.data_point_at(today - self.exposure_date);
            self.infectivity = point.infectivity;
            self.symptoms = point.symptomaticity;
        }

        let mut transitions = Vec::new();
        if self.infectious_date == Some(today) {
            transitions.push(HealthTransition::BecameInfectious);
        }
        if self.symptomatic_date == Some(today) {
            transitions.push(HealthTransition::BecameSymptomatic);
        }
        let course_ends_today = self.recovery_date == Some(today);
        let dies_today = course_ends_today && self.trajectory.ends_in_death();
        if course_ends_today && !dies_today {
            transitions.push(HealthTransition::Recovered);
        }
        if self.unsusceptible_date == today {
            self.is_susceptible = false;
            transitions.push(HealthTransition::BecameUnsusceptible);
        }
        if dies_today {
            self.is_fatal = true;
            transitions.push(HealthTransition::Died);
        }
        transitions.retain(|transition| !self.reported_today.contains(transition));

        let still_sick = self.recovery_date.is_none_or(|date| today < date);
        if let Some(symptomatic_date) = self.symptomatic_date {
            if !repeat
                && still_sick
                && today >= symptomatic_date
                && self.disease.is_fatal(
                    host.real_age,
                    self.symptoms,
                    days_between(symptomatic_date, today),
                    host.case_fatality_multiplier,
                    rng,
                )
            {
                self.is_fatal = true;
                transitions.push(HealthTransition::Died);
            }
        }
        self.reported_today.extend_from_slice(&transitions);
        transitions
    }

    /// Infectivity on `day`, including any modification.
    pub fn get_infectivity(&self, day: Day) -> f64 {
        let base = if self.disease.chronic_grace_period().is_some() {
            if self.infectious_date.is_some_and(|date| day >= date) {
                1.0
            } else {
                0.0
            }
        } else {
            self.trajectory
                .data_point_at(day - self.exposure_date)
                .infectivity
        };
        base * self.infectivity_multiplier
    }

    pub fn get_symptoms(&self, day: Day) -> f64 {
        self.trajectory
            .data_point_at(day - self.exposure_date)
            .symptomaticity
    }

    /// Infectivity as of the last update.
    pub fn infectivity(&self) -> f64 {
        self.infectivity * self.infectivity_multiplier
    }

    /// Symptoms as of the last update.
    pub fn symptoms(&self) -> f64 {
        self.symptoms
    }

    pub fn is_infectious(&self) -> bool {
        self.infectivity() > self.disease.infectivity_threshold()
    }

    pub fn is_symptomatic(&self) -> bool {
        self.symptoms > self.disease.symptomaticity_threshold()
    }

    /// Normalized per-strain loads the host passes on when infecting someone on `day`.
    pub fn current_loads(&self, day: Day) -> Vec<(StrainId, f64)> {
        let loads = usize::try_from(day - self.exposure_date)
            .map(|t| self.trajectory.current_loads(t))
            .unwrap_or_default();
        if loads.is_empty() {
            vec![(DEFAULT_STRAIN, 1.0)]
        } else {
            loads
        }
    }

    /// The strain added most recently among those with infectivity on `day`.
    pub fn dominant_strain(&self, day: Day) -> StrainId {
        self.current_loads(day)
            .last()
            .map_or(DEFAULT_STRAIN, |&(strain, _)| strain)
    }

    /// Splits `new` off `old` from `day` on. See [`Trajectory::mutate`].
    pub fn mutate(&mut self, old: StrainId, new: StrainId, day: Day) {
        let offset = days_between(self.exposure_date, day);
        self.trajectory.mutate(old, new, offset);
        self.determine_transition_dates();
    }

    pub fn modify_infectivity(&mut self, multiplier: f64) {
        self.infectivity_multiplier *= multiplier;
    }

    /// Scales the remaining symptomatic period by `multiplier`. Before symptom onset the whole
    /// symptomatic period is scaled; during it, the days left until recovery are, so a
    /// multiplier of zero recovers the host today.
    pub fn modify_symptomatic_period(
        &mut self,
        multiplier: f64,
        today: Day,
    ) -> Result<(), PeriodError> {
        if multiplier < 0.0 {
            return Err(PeriodError::NegativeMultiplier(multiplier));
        }
        let symptomatic_date = self
            .symptomatic_date
            .ok_or(PeriodError::NoSuchPeriod(Period::Symptomatic))?;
        let recovery_date = self
            .recovery_date
            .ok_or(PeriodError::NoSuchPeriod(Period::Symptomatic))?;
        if today >= recovery_date {
            return Err(PeriodError::PeriodElapsed {
                period: Period::Symptomatic,
                today,
                end: recovery_date,
            });
        }

        let (start, days_left) = if today < symptomatic_date {
            (
                days_between(self.exposure_date, symptomatic_date),
                scale_days(self.symptomatic_period, multiplier),
            )
        } else {
            (
                days_between(self.exposure_date, today),
                scale_days(days_between(today, recovery_date), multiplier),
            )
        };
        self.trajectory.modify_symptomatic_period(start, days_left);
        self.determine_transition_dates();
        Ok(())
    }

    /// Scales the remaining asymptomatic period by `multiplier`, moving everything after it.
    /// Infections that never become symptomatic are asymptomatic until recovery.
    pub fn modify_asymptomatic_period(
        &mut self,
        multiplier: f64,
        today: Day,
    ) -> Result<(), PeriodError> {
        if multiplier < 0.0 {
            return Err(PeriodError::NegativeMultiplier(multiplier));
        }
        let infectious_date = self
            .infectious_date
            .ok_or(PeriodError::NoSuchPeriod(Period::Asymptomatic))?;
        let end = self
            .symptomatic_date
            .or(self.recovery_date)
            .ok_or(PeriodError::NoSuchPeriod(Period::Asymptomatic))?;
        if today >= end {
            return Err(PeriodError::PeriodElapsed {
                period: Period::Asymptomatic,
                today,
                end,
            });
        }

        let (start, days_left) = if today < infectious_date {
            (
                days_between(self.exposure_date, infectious_date),
                scale_days(days_between(infectious_date, end), multiplier),
            )
        } else {
            (
                days_between(self.exposure_date, today),
                scale_days(days_between(today, end), multiplier),
            )
        };
        let onset = days_between(self.exposure_date, end);
        self.trajectory
            .modify_asymptomatic_period(start, days_left, onset);
        self.determine_transition_dates();
        Ok(())
    }

    /// Scales whatever is left of the infectious period: the asymptomatic part first, if it
    /// has not ended, then the symptomatic part, if there is one. Both parts are checked before
    /// either is changed, so a refused request leaves the infection as it was.
    pub fn modify_infectious_period(
        &mut self,
        multiplier: f64,
        today: Day,
    ) -> Result<(), PeriodError> {
        if multiplier < 0.0 {
            return Err(PeriodError::NegativeMultiplier(multiplier));
        }
        let recovery_date = self
            .recovery_date
            .ok_or(PeriodError::NoSuchPeriod(Period::Asymptomatic))?;
        if today >= recovery_date {
            let period = if self.symptomatic_date.is_some() {
                Period::Symptomatic
            } else {
                Period::Asymptomatic
            };
            return Err(PeriodError::PeriodElapsed {
                period,
                today,
                end: recovery_date,
            });
        }

        let asymptomatic_end = self.symptomatic_date.unwrap_or(recovery_date);
        let asymptomatic_left = self
            .infectious_date
            .is_some_and(|start| start < asymptomatic_end && today < asymptomatic_end);
        let symptomatic_left = self.symptomatic_date.is_some();
        if !asymptomatic_left && !symptomatic_left {
            return Err(PeriodError::NoSuchPeriod(Period::Asymptomatic));
        }

        if asymptomatic_left {
            self.modify_asymptomatic_period(multiplier, today)?;
        }
        if symptomatic_left {
            self.modify_symptomatic_period(multiplier, today)?;
        }
        Ok(())
    }

    /// Makes the infection symptomatic or asymptomatic from now on. A new symptomatic period
    /// starts where the asymptomatic one would have ended; removing symptoms ends the
    /// infection at symptom onset.
    pub fn modify_develops_symptoms<R: Rng + ?Sized>(
        &mut self,
        symptoms: bool,
        today: Day,
        rng: &mut R,
    ) -> Result<(), PeriodError> {
        let recovery_date = self
            .recovery_date
            .ok_or(PeriodError::NoSuchPeriod(Period::Symptomatic))?;
        if today >= recovery_date {
            return Err(PeriodError::PeriodElapsed {
                period: Period::Symptomatic,
                today,
                end: recovery_date,
            });
        }
        if let Some(symptomatic_date) = self.symptomatic_date {
            if today >= symptomatic_date {
                return Err(PeriodError::PeriodElapsed {
                    period: Period::Asymptomatic,
                    today,
                    end: symptomatic_date,
                });
            }
        }
        if symptoms == self.will_be_symptomatic {
            return Ok(());
        }

        let onset = days_between(
            self.exposure_date,
            self.symptomatic_date.unwrap_or(recovery_date),
        );
        let symptomatic_period = if symptoms {
            self.disease
                .natural_history()
                .days_symptomatic(self.age_at_exposure, rng)
        } else {
            0
        };
        self.trajectory
            .modify_develops_symptoms(onset, symptomatic_period);
        self.determine_transition_dates();
        Ok(())
    }

    pub fn add_infectee(&mut self) {
        self.infectee_count += 1;
    }

    pub fn infectee_count(&self) -> usize {
        self.infectee_count
    }

    pub fn disease(&self) -> &Arc<Disease> {
        &self.disease
    }

    pub fn host(&self) -> PersonId {
        self.host
    }

    pub fn infector(&self) -> Option<PersonId> {
        self.source.infector
    }

    pub fn place(&self) -> Option<GroupId> {
        self.source.place
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn age_at_exposure(&self) -> f64 {
        self.age_at_exposure
    }

    pub fn exposure_date(&self) -> Day {
        self.exposure_date
    }

    pub fn infectious_date(&self) -> Option<Day> {
        self.infectious_date
    }

    pub fn symptomatic_date(&self) -> Option<Day> {
        self.symptomatic_date
    }

    pub fn asymptomatic_date(&self) -> Option<Day> {
        self.asymptomatic_date
    }

    pub fn recovery_date(&self) -> Option<Day> {
        self.recovery_date
    }

    /// Day the host becomes susceptible again, or `None` if immunity is lifelong.
    pub fn susceptible_date(&self) -> Option<Day> {
        self.susceptible_date
    }

    pub fn unsusceptible_date(&self) -> Day {
        self.unsusceptible_date
    }

    pub fn latent_period(&self) -> usize {
        self.latent_period
    }

    pub fn incubation_period(&self) -> usize {
        self.incubation_period
    }

    pub fn asymptomatic_period(&self) -> usize {
        self.asymptomatic_period
    }

    pub fn symptomatic_period(&self) -> usize {
        self.symptomatic_period
    }

    pub fn immune_response(&self) -> bool {
        self.immune_response
    }

    pub fn will_be_symptomatic(&self) -> bool {
        self.will_be_symptomatic
    }

    pub fn is_susceptible(&self) -> bool {
        self.is_susceptible
    }

    pub fn is_fatal(&self) -> bool {
        self.is_fatal
    }
}
