//! Observed data to fit.

use crate::error::{EqFitError, Result};
use ndarray::{Array1, ArrayView1};

/// Anything that can be turned into one column of a [`Dataset`].
pub trait IntoColumn {
    /// Convert into an owned column.
    fn into_column(self) -> Array1<f64>;
}

impl IntoColumn for Array1<f64> {
    fn into_column(self) -> Array1<f64> {
        self
    }
}

impl IntoColumn for &Array1<f64> {
    fn into_column(self) -> Array1<f64> {
        self.clone()
    }
}

impl IntoColumn for ArrayView1<'_, f64> {
    fn into_column(self) -> Array1<f64> {
        self.to_owned()
    }
}

impl IntoColumn for Vec<f64> {
    fn into_column(self) -> Array1<f64> {
        Array1::from(self)
    }
}

impl IntoColumn for &Vec<f64> {
    fn into_column(self) -> Array1<f64> {
        self.iter().copied().collect()
    }
}

impl IntoColumn for &[f64] {
    fn into_column(self) -> Array1<f64> {
        self.iter().copied().collect()
    }
}

impl<const N: usize> IntoColumn for [f64; N] {
    fn into_column(self) -> Array1<f64> {
        self.into_iter().collect()
    }
}

impl<const N: usize> IntoColumn for &[f64; N] {
    fn into_column(self) -> Array1<f64> {
        self.iter().copied().collect()
    }
}

/// Paired x/y observations.
///
/// A dataset is never empty, both columns have the same length and every
/// value is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    x: Array1<f64>,
    y: Array1<f64>,
}

impl Dataset {
    /// Create a dataset, checking its shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use eqfit_rs::fit::Dataset;
    ///
    /// let data = Dataset::new(vec![1.0, 2.0, 3.0], [2.0, 4.0, 6.0]).unwrap();
    /// assert_eq!(data.len(), 3);
    /// assert!(Dataset::new(vec![1.0, 2.0], vec![1.0]).is_err());
    /// ```
    pub fn new(x: impl IntoColumn, y: impl IntoColumn) -> Result<Self> {
        let x = x.into_column();
        let y = y.into_column();

        if x.len() != y.len() {
            return Err(EqFitError::DataShape(format!(
                "x has {} values, y has {}",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(EqFitError::DataShape("dataset is empty".to_string()));
        }
        for (name, column) in [("x", &x), ("y", &y)] {
            if let Some(i) = column.iter().position(|v| !v.is_finite()) {
                return Err(EqFitError::DataShape(format!(
                    "{}[{}] is {}",
                    name, i, column[i]
                )));
            }
        }

        Ok(Self { x, y })
    }

    /// The independent variable.
    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    /// The observed response.
    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Always false for a constructed dataset.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Sorted distinct abscissae.
    pub fn distinct_x(&self) -> Vec<f64> {
        let mut xs = self.x.to_vec();
        xs.sort_by(f64::total_cmp);
        xs.dedup();
        xs
    }
}

impl TryFrom<(Vec<f64>, Vec<f64>)> for Dataset {
    type Error = EqFitError;

    fn try_from((x, y): (Vec<f64>, Vec<f64>)) -> Result<Self> {
        Self::new(x, y)
    }
}

impl TryFrom<(&[f64], &[f64])> for Dataset {
    type Error = EqFitError;

    fn try_from((x, y): (&[f64], &[f64])) -> Result<Self> {
        Self::new(x, y)
    }
}

impl TryFrom<(Array1<f64>, Array1<f64>)> for Dataset {
    type Error = EqFitError;

    fn try_from((x, y): (Array1<f64>, Array1<f64>)) -> Result<Self> {
        Self::new(x, y)
    }
}
