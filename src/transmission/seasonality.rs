use crate::Day;
use std::f64::consts::PI;

const DAYS_PER_YEAR: i64 = 365;

/// Cosine-shaped seasonal factor on transmission, largest on the peak day of the year.
#[derive(Debug, Clone, PartialEq)]
pub struct Seasonality {
    // Indexed by day of year minus one; empty when disabled.
    multipliers: Vec<f64>,
    start_day_of_year: u32,
}

impl Default for Seasonality {
    fn default() -> Self {
        Seasonality::disabled(1)
    }
}

impl Seasonality {
    pub fn disabled(start_day_of_year: u32) -> Self {
        Seasonality {
            multipliers: Vec::new(),
            start_day_of_year,
        }
    }

    /// `reduction` is the fraction transmission drops by half a year away from the peak.
    pub fn new(reduction: f64, peak_day_of_year: u32, start_day_of_year: u32) -> Self {
        if reduction <= 0.0 {
            return Seasonality::disabled(start_day_of_year);
        }
        let multipliers = (1..=366u32)
            .map(|day_of_year| {
                let distance = f64::from(peak_day_of_year.abs_diff(day_of_year));
                let cosine = (2.0 * PI * distance / 365.0).cos();
                ((1.0 - reduction) + reduction * 0.5 * (1.0 + cosine)).max(0.0)
            })
            .collect();
        Seasonality {
            multipliers,
            start_day_of_year,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.multipliers.is_empty()
    }

    /// Day of the year (1 to 365) of simulation day `day`.
    pub fn day_of_year(&self, day: Day) -> u32 {
        let offset = i64::from(self.start_day_of_year) - 1 + i64::from(day);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let day_of_year = (offset.rem_euclid(DAYS_PER_YEAR) + 1) as u32;
        day_of_year
    }

    pub fn multiplier(&self, day: Day) -> f64 {
        if self.multipliers.is_empty() {
            return 1.0;
        }
        self.multipliers[self.day_of_year(day) as usize - 1]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disabled_is_neutral() {
        let seasonality = Seasonality::new(0.0, 15, 1);
        assert!(!seasonality.is_enabled());
        assert_eq!(seasonality.multiplier(100), 1.0);
    }

    #[test]
    fn peak_and_trough() {
        let seasonality = Seasonality::new(0.4, 15, 1);
        // Day 14 is January 15th.
        assert!((seasonality.multiplier(14) - 1.0).abs() < 1e-12);
        let trough = seasonality.multiplier(14 + 182);
        assert!((trough - 0.6).abs() < 1e-3, "trough {trough}");
        for day in 0..365 {
            let m = seasonality.multiplier(day);
            assert!((0.6 - 1e-9..=1.0 + 1e-9).contains(&m));
        }
    }

    #[test]
    fn day_of_year_wraps() {
        let seasonality = Seasonality::new(0.3, 15, 280);
        assert_eq!(seasonality.day_of_year(0), 280);
        assert_eq!(seasonality.day_of_year(85), 365);
        assert_eq!(seasonality.day_of_year(86), 1);
        assert_eq!(seasonality.day_of_year(100), 15);
        assert_eq!(seasonality.day_of_year(-280), 365);
    }
}
