//! Non-negative weight vectors normalized to sum to 1.
//!
//! Used for utility weights, production plans and trade propensities. Every
//! mutation renormalizes, so readers can treat the weights as a categorical
//! distribution without dividing by the total.

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};

use crate::error::BarterError;

/// Slack allowed on the sum of a deserialized vector
pub const NORMALIZED_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Simplex(Vec<f64>);

impl Simplex {
    /// Equal weight on every coordinate
    pub fn uniform(len: usize) -> Self {
        Self(vec![1.0 / len as f64; len])
    }

    /// Normalize raw non-negative weights.
    ///
    /// Fails with `DegenerateWeightVector` when the weights are empty, contain
    /// a negative or non-finite entry, or sum to zero.
    pub fn from_weights(weights: Vec<f64>) -> Result<Self, BarterError> {
        let sum = checked_sum(&weights)?;
        Ok(Self(weights.into_iter().map(|w| w / sum).collect()))
    }

    pub fn weights(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    /// Add `step` to one coordinate and renormalize.
    pub fn reinforce(&mut self, index: usize, step: f64) -> Result<(), BarterError> {
        let len = self.0.len();
        let mut raw = self.0.clone();
        let slot = raw
            .get_mut(index)
            .ok_or(BarterError::IndexOutOfRange { index, len })?;
        *slot += step;
        *self = Self::from_weights(raw)?;
        Ok(())
    }

    /// Largest share, i.e. max/sum with the sum fixed at 1.
    pub fn max_share(&self) -> f64 {
        self.0.iter().copied().fold(0.0, f64::max)
    }

    /// Categorical draw of one index.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Result<usize, BarterError> {
        let dist = WeightedIndex::new(&self.0).map_err(|_| BarterError::DegenerateWeightVector {
            len: self.0.len(),
            sum: self.0.iter().sum(),
        })?;
        Ok(dist.sample(rng))
    }
}

fn checked_sum(weights: &[f64]) -> Result<f64, BarterError> {
    let sum: f64 = weights.iter().sum();
    let valid = weights.iter().all(|w| w.is_finite() && *w >= 0.0);
    if !valid || !sum.is_finite() || sum <= 0.0 {
        return Err(BarterError::DegenerateWeightVector {
            len: weights.len(),
            sum,
        });
    }
    Ok(sum)
}

impl TryFrom<Vec<f64>> for Simplex {
    type Error = BarterError;

    /// Accepts an already normalized vector verbatim, so checkpoints restore bit for bit.
    fn try_from(weights: Vec<f64>) -> Result<Self, Self::Error> {
        let sum = checked_sum(&weights)?;
        if (sum - 1.0).abs() > NORMALIZED_TOLERANCE {
            return Err(BarterError::DegenerateWeightVector {
                len: weights.len(),
                sum,
            });
        }
        Ok(Self(weights))
    }
}

impl From<Simplex> for Vec<f64> {
    fn from(simplex: Simplex) -> Self {
        simplex.0
    }
}
