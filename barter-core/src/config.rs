use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::error::BarterError;

/// Randomized initial conditions for a population.
///
/// Ranges are half-open (`min..max`), matching integer draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(from_wasm_abi)]
#[serde(default)]
pub struct PopulationConfig {
    pub agents: usize,
    pub goods: usize,
    /// Marginal output per unit of effort, per good
    pub ppf_range: (u32, u32),
    pub endowment_range: (u32, u32),
    /// Raw utility weights before normalization
    pub utility_weight_range: (u32, u32),
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            agents: 50,
            goods: 2,
            ppf_range: (1, 4),
            endowment_range: (10, 20),
            utility_weight_range: (1, 4),
        }
    }
}

/// Relative odds of each mutation target during solo adaptation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(from_wasm_abi)]
#[serde(default)]
pub struct MutationWeights {
    pub production_plan: u32,
    pub trade_propensity: u32,
    pub utility_params: u32,
    pub ppf: u32,
    pub endowment: u32,
}

impl Default for MutationWeights {
    fn default() -> Self {
        Self {
            production_plan: 10,
            trade_propensity: 10,
            utility_params: 2,
            ppf: 2,
            endowment: 1,
        }
    }
}

impl MutationWeights {
    /// Weights in `MutationTarget::ALL` order
    pub fn as_array(&self) -> [u32; 5] {
        [
            self.production_plan,
            self.trade_propensity,
            self.utility_params,
            self.ppf,
            self.endowment,
        ]
    }
}

/// Per-step behavior shared by every agent in a population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(from_wasm_abi)]
#[serde(default)]
pub struct AdaptationConfig {
    /// Units of effort spent producing each step
    pub effort_per_tick: f64,
    /// Goods eaten per step (skipped entirely when any holding is below this)
    pub consumption_units: u32,
    /// Weight added to a simplex coordinate before renormalizing
    pub strategy_step: f64,
    /// Goods added by an endowment mutation
    pub endowment_step: f64,
    pub mutation_weights: MutationWeights,
    /// Ledger window used for per-agent trade history
    pub memory: usize,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            effort_per_tick: 1.0,
            consumption_units: 5,
            strategy_step: 0.05,
            endowment_step: 1.0,
            mutation_weights: MutationWeights::default(),
            memory: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Tsify)]
#[tsify(from_wasm_abi)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub population: PopulationConfig,
    pub adaptation: AdaptationConfig,
}

impl SimulationConfig {
    /// Parse JSON; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, BarterError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BarterError> {
        self.population.validate()?;
        self.adaptation.validate()
    }
}

impl PopulationConfig {
    pub fn validate(&self) -> Result<(), BarterError> {
        if self.agents < 2 {
            return Err(BarterError::InsufficientPopulation { found: self.agents });
        }
        if self.goods < 2 {
            return Err(BarterError::TooFewGoods { found: self.goods });
        }
        self.validate_ranges()
    }

    /// Check the draw ranges alone, for callers adding agents one at a time.
    pub fn validate_ranges(&self) -> Result<(), BarterError> {
        let (ppf_min, ppf_max) = self.ppf_range;
        if ppf_min == 0 || ppf_min >= ppf_max {
            return Err(BarterError::Config(format!(
                "ppf_range must be a non-empty range of positive integers, got {ppf_min}..{ppf_max}"
            )));
        }
        let (e_min, e_max) = self.endowment_range;
        if e_min >= e_max {
            return Err(BarterError::Config(format!(
                "endowment_range is empty: {e_min}..{e_max}"
            )));
        }
        let (u_min, u_max) = self.utility_weight_range;
        if u_min == 0 || u_min >= u_max {
            return Err(BarterError::Config(format!(
                "utility_weight_range must be a non-empty range of positive integers, got {u_min}..{u_max}"
            )));
        }
        Ok(())
    }
}

impl AdaptationConfig {
    pub fn validate(&self) -> Result<(), BarterError> {
        if !(self.effort_per_tick.is_finite() && self.effort_per_tick >= 0.0) {
            return Err(BarterError::Config(format!(
                "effort_per_tick must be non-negative, got {}",
                self.effort_per_tick
            )));
        }
        if !(self.strategy_step.is_finite() && self.strategy_step > 0.0) {
            return Err(BarterError::Config(format!(
                "strategy_step must be positive, got {}",
                self.strategy_step
            )));
        }
        if !(self.endowment_step.is_finite() && self.endowment_step > 0.0) {
            return Err(BarterError::Config(format!(
                "endowment_step must be positive, got {}",
                self.endowment_step
            )));
        }
        if self.mutation_weights.as_array().iter().all(|w| *w == 0) {
            return Err(BarterError::DegenerateWeightVector { len: 5, sum: 0.0 });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        SimulationConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SimulationConfig::from_json_str(
            r#"{ "seed": 9, "population": { "agents": 4, "goods": 3 } }"#,
        )
        .unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.population.agents, 4);
        assert_eq!(config.population.goods, 3);
        assert_eq!(config.population.ppf_range, (1, 4));
        assert_eq!(config.adaptation, AdaptationConfig::default());
    }

    #[test]
    fn test_single_agent_rejected() {
        let err = SimulationConfig::from_json_str(r#"{ "population": { "agents": 1 } }"#);
        assert!(matches!(
            err,
            Err(BarterError::InsufficientPopulation { found: 1 })
        ));
    }

    #[test]
    fn test_zero_mutation_weights_rejected() {
        let mut config = SimulationConfig::default();
        config.adaptation.mutation_weights = MutationWeights {
            production_plan: 0,
            trade_propensity: 0,
            utility_params: 0,
            ppf: 0,
            endowment: 0,
        };
        assert!(matches!(
            config.validate(),
            Err(BarterError::DegenerateWeightVector { .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            SimulationConfig::from_json_str("{ not json"),
            Err(BarterError::Json { .. })
        ));
    }
}
