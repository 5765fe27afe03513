//! Interval-aligned sample series.

use std::ops::Index;

use serde::{Deserialize, Serialize};

/// Length mismatch between two series combined element-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthMismatch {
    pub expected: usize,
    pub found: usize,
}

/// An ordered sequence of samples, one per measurement interval.
///
/// Every series combined in one computation step must share the same length
/// and interval alignment; the fallible element-wise operators enforce the
/// length half of that contract. Division follows IEEE-754: a zero divisor
/// yields `inf` or `NaN`, never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSeries(Vec<f64>);

impl TimeSeries {
    pub fn new(samples: Vec<f64>) -> Self {
        Self(samples)
    }

    /// A series of `len` zeros.
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    pub fn get(&self, interval: usize) -> Option<f64> {
        self.0.get(interval).copied()
    }

    /// Combines two equally long series sample by sample.
    ///
    /// # Errors
    ///
    /// Returns [`LengthMismatch`] when `other` has a different length.
    pub fn zip_map(
        &self,
        other: &Self,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, LengthMismatch> {
        if self.len() != other.len() {
            return Err(LengthMismatch {
                expected: self.len(),
                found: other.len(),
            });
        }
        Ok(Self(
            self.0.iter().zip(&other.0).map(|(&a, &b)| f(a, b)).collect(),
        ))
    }

    /// # Errors
    ///
    /// Returns [`LengthMismatch`] when the lengths differ.
    pub fn try_add(&self, other: &Self) -> Result<Self, LengthMismatch> {
        self.zip_map(other, |a, b| a + b)
    }

    /// # Errors
    ///
    /// Returns [`LengthMismatch`] when the lengths differ.
    pub fn try_sub(&self, other: &Self) -> Result<Self, LengthMismatch> {
        self.zip_map(other, |a, b| a - b)
    }

    /// # Errors
    ///
    /// Returns [`LengthMismatch`] when the lengths differ.
    pub fn try_div(&self, other: &Self) -> Result<Self, LengthMismatch> {
        self.zip_map(other, |a, b| a / b)
    }

    /// Applies `f` to every sample.
    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self(self.0.iter().map(|&x| f(x)).collect())
    }

    /// Multiplies every sample by `factor`.
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        self.map(|x| x * factor)
    }

    /// Arithmetic mean of the samples; `NaN` for an empty series.
    pub fn mean(&self) -> f64 {
        #[expect(
            clippy::cast_precision_loss,
            reason = "interval counts are far below 2^52"
        )]
        let n = self.0.len() as f64;
        self.0.iter().sum::<f64>() / n
    }
}

impl From<Vec<f64>> for TimeSeries {
    fn from(samples: Vec<f64>) -> Self {
        Self(samples)
    }
}

impl FromIterator<f64> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Index<usize> for TimeSeries {
    type Output = f64;

    fn index(&self, interval: usize) -> &f64 {
        &self.0[interval]
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elementwise_ops() {
        let a = TimeSeries::new(vec![4.0, 6.0]);
        let b = TimeSeries::new(vec![1.0, 2.0]);
        assert_eq!(a.try_add(&b).unwrap().as_slice(), &[5.0, 8.0]);
        assert_eq!(a.try_sub(&b).unwrap().as_slice(), &[3.0, 4.0]);
        assert_eq!(a.try_div(&b).unwrap().as_slice(), &[4.0, 3.0]);
        assert_eq!(a.scale(0.5).as_slice(), &[2.0, 3.0]);
    }

    #[test]
    fn length_mismatch_is_reported() {
        let a = TimeSeries::new(vec![1.0, 2.0, 3.0]);
        let b = TimeSeries::new(vec![1.0]);
        assert_eq!(
            a.try_add(&b).unwrap_err(),
            LengthMismatch {
                expected: 3,
                found: 1
            }
        );
    }

    #[test]
    fn division_by_zero_follows_ieee() {
        let a = TimeSeries::new(vec![1.0, 0.0]);
        let zero = TimeSeries::zeros(2);
        let q = a.try_div(&zero).unwrap();
        assert!(q[0].is_infinite());
        assert!(q[1].is_nan());
    }

    #[test]
    fn mean_of_samples() {
        assert!((TimeSeries::new(vec![1.0, 2.0, 6.0]).mean() - 3.0).abs() < 1e-12);
        assert!(TimeSeries::default().mean().is_nan());
    }
}
