use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::BarterError;
use crate::simplex::Simplex;
use crate::types::{AgentId, GoodId, Quantity};
use crate::valuation;

// === CONSUMPTION ===

#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeOutcome {
    /// Some holding was below the unit count, nothing eaten
    Skipped,
    /// One entry per unit eaten
    Consumed(Vec<GoodId>),
}

// === AGENT ===

/// A barter agent: private production rates and tastes, plus the strategy
/// vectors it adapts over time.
///
/// `endowment` never holds a negative coordinate; every mutating method
/// checks before writing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    /// Output of good i per unit of effort
    pub ppf: Vec<u32>,
    pub endowment: Vec<Quantity>,
    pub utility_params: Simplex,
    /// Share of effort spent on each good
    pub production_plan: Simplex,
    /// Odds of proposing each enumerated trade pair
    pub trade_propensity: Simplex,
    pub cumulative_utility: f64,
    pub trades_done: u64,
    pub age: u64,
}

impl Agent {
    /// Build an agent with a uniform production plan and trade propensity.
    pub fn new(
        id: AgentId,
        ppf: Vec<u32>,
        endowment: Vec<Quantity>,
        utility_params: Simplex,
        trade_pairs: usize,
    ) -> Result<Self, BarterError> {
        let goods = ppf.len();
        let agent = Self {
            id,
            ppf,
            endowment,
            utility_params,
            production_plan: Simplex::uniform(goods),
            trade_propensity: Simplex::uniform(trade_pairs),
            cumulative_utility: 0.0,
            trades_done: 0,
            age: 0,
        };
        agent.validate()?;
        Ok(agent)
    }

    /// Check the fundamentals: one entry per good everywhere, positive
    /// production rates and finite non-negative holdings.
    pub fn validate(&self) -> Result<(), BarterError> {
        let goods = self.goods();
        for found in [
            self.endowment.len(),
            self.utility_params.len(),
            self.production_plan.len(),
        ] {
            if found != goods {
                return Err(BarterError::GoodCountMismatch {
                    expected: goods,
                    found,
                });
            }
        }
        if let Some(good) = self.ppf.iter().position(|&rate| rate == 0) {
            return Err(BarterError::NonPositivePpf { good });
        }
        if let Some((good, &held)) = self
            .endowment
            .iter()
            .enumerate()
            .find(|(_, held)| !held.is_finite() || **held < 0.0)
        {
            return Err(BarterError::NegativeEndowment {
                agent: Some(self.id),
                good,
                resulting: held,
            });
        }
        Ok(())
    }

    pub fn goods(&self) -> usize {
        self.ppf.len()
    }

    pub fn utility(&self) -> f64 {
        valuation::utility(&self.endowment, self.utility_params.weights())
    }

    /// Utility after a hypothetical production step, without touching the endowment
    pub fn projected_utility(&self, effort: f64) -> f64 {
        let output = valuation::production(self.production_plan.weights(), &self.ppf, effort);
        let projected: Vec<Quantity> = self
            .endowment
            .iter()
            .zip(&output)
            .map(|(held, made)| held + made)
            .collect();
        valuation::utility(&projected, self.utility_params.weights())
    }

    /// Max share of the production plan; 1/K for a generalist, 1 for a specialist
    pub fn specialization(&self) -> f64 {
        self.production_plan.max_share()
    }

    /// Spend `effort` on production under the current plan.
    pub fn produce(&mut self, effort: f64) -> Vec<Quantity> {
        let output = valuation::production(self.production_plan.weights(), &self.ppf, effort);
        for (held, made) in self.endowment.iter_mut().zip(&output) {
            *held += made;
        }
        output
    }

    /// Eat `units` goods drawn by taste.
    ///
    /// Skips the whole step when the smallest holding is below `units`, so no
    /// sequence of draws can take a coordinate negative.
    pub fn consume<R: Rng>(&mut self, units: u32, rng: &mut R) -> Result<ConsumeOutcome, BarterError> {
        let smallest = self.endowment.iter().copied().fold(f64::INFINITY, f64::min);
        if units == 0 || smallest < units as f64 {
            return Ok(ConsumeOutcome::Skipped);
        }

        let mut eaten = Vec::with_capacity(units as usize);
        for _ in 0..units {
            let good = self.utility_params.draw(rng)?;
            let held = &mut self.endowment[good];
            debug_assert!(*held >= 1.0);
            *held -= 1.0;
            self.cumulative_utility += self.utility_params.weights()[good];
            eaten.push(good);
        }
        Ok(ConsumeOutcome::Consumed(eaten))
    }

    /// Endowment after adding `delta`, or the first coordinate that would go negative.
    pub fn checked_endowment(&self, delta: &[Quantity]) -> Result<Vec<Quantity>, BarterError> {
        if delta.len() != self.endowment.len() {
            return Err(BarterError::GoodCountMismatch {
                expected: self.endowment.len(),
                found: delta.len(),
            });
        }
        let mut next = Vec::with_capacity(delta.len());
        for (good, (held, change)) in self.endowment.iter().zip(delta).enumerate() {
            let resulting = held + change;
            if resulting.is_nan() || resulting < 0.0 {
                return Err(BarterError::NegativeEndowment {
                    agent: Some(self.id),
                    good,
                    resulting,
                });
            }
            next.push(resulting);
        }
        Ok(next)
    }
}
