use rand::SeedableRng;
use rand::rngs::StdRng;
use wasm_bindgen::prelude::*;

pub mod adaptation;
pub mod agents;
pub mod config;
pub mod error;
pub mod ledger;
pub mod population;
pub mod simplex;
pub mod state;
pub mod tick;
pub mod trade;
pub mod types;
pub mod valuation;

#[cfg(feature = "instrument")]
pub use instrument;

pub use adaptation::{SoloOutcome, solo_update};
pub use agents::{Agent, ConsumeOutcome, Mutation, MutationTarget};
pub use config::{AdaptationConfig, MutationWeights, PopulationConfig, SimulationConfig};
pub use error::BarterError;
pub use ledger::{Ledger, TradeRecord};
pub use population::{Population, StepReport};
pub use simplex::Simplex;
pub use state::{AgentSnapshot, PopulationStats, StateSnapshot, TradeSnapshot};
pub use tick::{TickSummary, run_tick, run_ticks};
pub use trade::{Deal, Evaluation, Proposal, Rejection, TradeAttempt, TradeOutcome};
pub use types::{AgentId, GoodId, KeyToU64, Quantity, TradePair, TradePairs};

// ============================================================================
// WASM API - Simulation
// ============================================================================

/// A population plus the one generator every draw comes from.
#[wasm_bindgen]
pub struct Simulation {
    population: Population,
    rng: StdRng,
}

#[wasm_bindgen]
impl Simulation {
    #[wasm_bindgen(constructor)]
    pub fn new(agents: usize, goods: usize, seed: u64) -> Result<Simulation, JsError> {
        // Better panic messages in browser console
        console_error_panic_hook::set_once();

        let mut rng = StdRng::seed_from_u64(seed);
        let population = Population::create(agents, goods, &mut rng)?;
        Ok(Self { population, rng })
    }

    /// Build from a (partial) `SimulationConfig` object
    #[wasm_bindgen]
    pub fn from_config(config: JsValue) -> Result<Simulation, JsError> {
        console_error_panic_hook::set_once();

        let config: SimulationConfig = serde_wasm_bindgen::from_value(config)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let population = Population::with_config(&config, &mut rng)?;
        Ok(Self { population, rng })
    }

    /// Resume from `checkpoint` output. The generator restarts from `seed`.
    #[wasm_bindgen]
    pub fn restore(json: &str, seed: u64) -> Result<Simulation, JsError> {
        console_error_panic_hook::set_once();

        Ok(Self {
            population: Population::from_json(json)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Advance the simulation by one tick
    #[wasm_bindgen]
    pub fn advance_tick(&mut self) -> Result<(), JsError> {
        run_tick(&mut self.population, &mut self.rng)?;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn get_tick(&self) -> u64 {
        self.population.tick()
    }

    #[wasm_bindgen]
    pub fn trade_count(&self) -> usize {
        self.population.ledger().len()
    }

    #[wasm_bindgen]
    pub fn agent_count(&self) -> usize {
        self.population.len()
    }

    /// Get a snapshot of the current state for rendering
    #[wasm_bindgen]
    pub fn get_state_snapshot(&self) -> StateSnapshot {
        StateSnapshot::capture(&self.population)
    }

    #[wasm_bindgen]
    pub fn get_stats(&self) -> PopulationStats {
        PopulationStats::collect(&self.population)
    }

    /// Every committed trade, oldest first
    #[wasm_bindgen]
    pub fn ledger(&self) -> Result<JsValue, JsError> {
        let trades: Vec<TradeSnapshot> = self
            .population
            .ledger()
            .records()
            .iter()
            .map(TradeSnapshot::from)
            .collect();
        Ok(serde_wasm_bindgen::to_value(&trades)?)
    }

    /// Full population as JSON
    #[wasm_bindgen]
    pub fn checkpoint(&self) -> Result<String, JsError> {
        Ok(self.population.to_json()?)
    }
}

impl Simulation {
    pub fn population(&self) -> &Population {
        &self.population
    }
}
