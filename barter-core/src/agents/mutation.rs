//! Single-coordinate strategy mutations, shared by solo adaptation and
//! reproduction.

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};

use super::Agent;
use crate::config::{AdaptationConfig, MutationWeights};
use crate::error::BarterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationTarget {
    ProductionPlan,
    TradePropensity,
    UtilityParams,
    Ppf,
    Endowment,
}

impl MutationTarget {
    pub const ALL: [MutationTarget; 5] = [
        MutationTarget::ProductionPlan,
        MutationTarget::TradePropensity,
        MutationTarget::UtilityParams,
        MutationTarget::Ppf,
        MutationTarget::Endowment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MutationTarget::ProductionPlan => "production_plan",
            MutationTarget::TradePropensity => "trade_propensity",
            MutationTarget::UtilityParams => "utility_params",
            MutationTarget::Ppf => "ppf",
            MutationTarget::Endowment => "endowment",
        }
    }

    /// Length of the targeted vector on `agent`
    pub fn len(&self, agent: &Agent) -> usize {
        match self {
            MutationTarget::TradePropensity => agent.trade_propensity.len(),
            _ => agent.goods(),
        }
    }
}

/// One unit step on one coordinate of one strategy vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mutation {
    pub target: MutationTarget,
    pub index: usize,
}

impl Mutation {
    pub fn new(target: MutationTarget, index: usize) -> Self {
        Self { target, index }
    }

    /// Draw a target by `weights`, then a coordinate uniformly.
    pub fn random<R: Rng>(
        agent: &Agent,
        weights: &MutationWeights,
        rng: &mut R,
    ) -> Result<Self, BarterError> {
        let odds = weights.as_array();
        let dist = WeightedIndex::new(odds).map_err(|_| BarterError::DegenerateWeightVector {
            len: odds.len(),
            sum: odds.iter().map(|&w| w as f64).sum(),
        })?;
        let target = MutationTarget::ALL[dist.sample(rng)];
        let index = rng.random_range(0..target.len(agent));
        Ok(Self { target, index })
    }

    /// Apply to `agent`. Simplex targets renormalize; `ppf` grows by one unit.
    pub fn apply(&self, agent: &mut Agent, config: &AdaptationConfig) -> Result<(), BarterError> {
        let len = self.target.len(agent);
        if self.index >= len {
            return Err(BarterError::IndexOutOfRange {
                index: self.index,
                len,
            });
        }
        match self.target {
            MutationTarget::ProductionPlan => agent
                .production_plan
                .reinforce(self.index, config.strategy_step)?,
            MutationTarget::TradePropensity => agent
                .trade_propensity
                .reinforce(self.index, config.strategy_step)?,
            MutationTarget::UtilityParams => agent
                .utility_params
                .reinforce(self.index, config.strategy_step)?,
            MutationTarget::Ppf => agent.ppf[self.index] += 1,
            MutationTarget::Endowment => agent.endowment[self.index] += config.endowment_step,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simplex::Simplex;
    use crate::types::AgentId;
    use rand::SeedableRng;
    use slotmap::KeyData;

    fn agent() -> Agent {
        Agent::new(
            AgentId::from(KeyData::from_ffi(1)),
            vec![2, 3, 1],
            vec![10.0, 10.0, 10.0],
            Simplex::uniform(3),
            6,
        )
        .unwrap()
    }

    #[test]
    fn test_apply_each_target() {
        let config = AdaptationConfig::default();

        let mut a = agent();
        Mutation::new(MutationTarget::Ppf, 2).apply(&mut a, &config).unwrap();
        assert_eq!(a.ppf, vec![2, 3, 2]);

        Mutation::new(MutationTarget::Endowment, 0)
            .apply(&mut a, &config)
            .unwrap();
        assert_eq!(a.endowment[0], 10.0 + config.endowment_step);

        Mutation::new(MutationTarget::TradePropensity, 5)
            .apply(&mut a, &config)
            .unwrap();
        assert!(a.trade_propensity.get(5).unwrap() > a.trade_propensity.get(0).unwrap());
        let total: f64 = a.trade_propensity.weights().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_apply_out_of_range_leaves_agent() {
        let config = AdaptationConfig::default();
        let mut a = agent();
        let before = a.clone();
        let result = Mutation::new(MutationTarget::ProductionPlan, 3).apply(&mut a, &config);
        assert!(matches!(
            result,
            Err(BarterError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert_eq!(a, before);
    }

    #[test]
    fn test_random_respects_zero_weights() {
        let a = agent();
        let weights = MutationWeights {
            production_plan: 0,
            trade_propensity: 1,
            utility_params: 0,
            ppf: 0,
            endowment: 0,
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let m = Mutation::random(&a, &weights, &mut rng).unwrap();
            assert_eq!(m.target, MutationTarget::TradePropensity);
            assert!(m.index < 6);
        }
    }
}
