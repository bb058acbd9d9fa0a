//! Age-stratified lookup tables.
//!
//! An age map is configured as a flat list alternating an upper age bound and a value,
//! `[5.0, 0.2, 18.0, 0.4, 65.0, 0.6, 120.0, 0.8]`. A lookup returns the value of the first
//! group whose bound exceeds the age, and `0.0` past the last bound.

use crate::error::IxaError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgeMap {
    upper_bounds: Vec<f64>,
    values: Vec<f64>,
}

impl AgeMap {
    /// Builds a map from the flat configuration form. `name` identifies the parameter in errors.
    pub fn from_flat(name: &str, flat: &[f64]) -> Result<Self, IxaError> {
        if flat.len() % 2 != 0 {
            return Err(IxaError::invalid_parameter(
                name,
                format!(
                    "age map needs (upper age, value) pairs but has {} entries",
                    flat.len()
                ),
            ));
        }
        let (upper_bounds, values): (Vec<f64>, Vec<f64>) =
            flat.chunks_exact(2).map(|pair| (pair[0], pair[1])).unzip();
        if !upper_bounds.is_sorted() {
            return Err(IxaError::invalid_parameter(
                name,
                "age bounds must be non-decreasing",
            ));
        }
        if values.iter().any(|value| !value.is_finite()) {
            return Err(IxaError::invalid_parameter(name, "values must be finite"));
        }
        Ok(AgeMap {
            upper_bounds,
            values,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn find_value(&self, age: f64) -> f64 {
        self.upper_bounds
            .iter()
            .position(|&bound| age < bound)
            .map_or(0.0, |group| self.values[group])
    }

    /// Like [`AgeMap::find_value`], but an empty map yields `default`.
    pub fn find_value_or(&self, age: f64, default: f64) -> f64 {
        if self.is_empty() {
            default
        } else {
            self.find_value(age)
        }
    }
}

#[cfg(test)]
mod test {
    use super::AgeMap;
    use crate::error::IxaError;

    #[test]
    fn looks_up_first_group_above_age() {
        let map = AgeMap::from_flat("prob", &[5.0, 0.1, 18.0, 0.3, 120.0, 0.9]).unwrap();
        assert_eq!(map.find_value(0.0), 0.1);
        assert_eq!(map.find_value(5.0), 0.3);
        assert_eq!(map.find_value(17.9), 0.3);
        assert_eq!(map.find_value(64.0), 0.9);
        assert_eq!(map.find_value(130.0), 0.0);
    }

    #[test]
    fn empty_map_uses_default() {
        let map = AgeMap::from_flat("prob", &[]).unwrap();
        assert!(map.is_empty());
        assert_eq!(map.find_value(30.0), 0.0);
        assert_eq!(map.find_value_or(30.0, 1.0), 1.0);
    }

    #[test]
    fn odd_length_list_is_rejected() {
        let error = AgeMap::from_flat("flu.prob_symptoms", &[5.0, 0.1, 18.0]).unwrap_err();
        match error {
            IxaError::InvalidParameter { name, .. } => assert_eq!(name, "flu.prob_symptoms"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn decreasing_bounds_are_rejected() {
        assert!(AgeMap::from_flat("prob", &[18.0, 0.1, 5.0, 0.2]).is_err());
    }
}
