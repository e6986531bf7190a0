use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::agents::Agent;
use crate::ledger::TradeRecord;
use crate::population::Population;
use crate::types::{GoodId, KeyToU64};

// ============================================================================
// Aggregate statistics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct PopulationStats {
    pub tick: u64,
    pub agents: usize,
    pub total_trades: usize,
    pub trades_this_tick: usize,
    pub mean_utility: f64,
    /// Mean of max(production_plan) over agents; 1/K means no specialization
    pub mean_specialization: f64,
    pub mean_cumulative_utility: f64,
}

impl PopulationStats {
    pub fn collect(population: &Population) -> Self {
        let n = population.len();
        let mean = |f: fn(&Agent) -> f64| {
            if n == 0 {
                0.0
            } else {
                population.agents().map(f).sum::<f64>() / n as f64
            }
        };
        Self {
            tick: population.tick(),
            agents: n,
            total_trades: population.ledger().len(),
            trades_this_tick: population.ledger().committed_at(population.tick()).count(),
            mean_utility: mean(Agent::utility),
            mean_specialization: mean(Agent::specialization),
            mean_cumulative_utility: mean(|a| a.cumulative_utility),
        }
    }
}

// ============================================================================
// Snapshots for rendering
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct StateSnapshot {
    pub stats: PopulationStats,
    pub agents: Vec<AgentSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct AgentSnapshot {
    pub id: u64,
    pub ppf: Vec<u32>,
    pub endowment: Vec<f64>,
    pub utility: f64,
    pub utility_params: Vec<f64>,
    pub production_plan: Vec<f64>,
    pub trade_propensity: Vec<f64>,
    pub specialization: f64,
    pub trades_done: u64,
    pub cumulative_utility: f64,
    pub age: u64,
    /// Last trades this agent took part in, oldest first
    pub recent_trades: Vec<TradeSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct TradeSnapshot {
    pub tick: u64,
    pub initiator: u64,
    pub partner: u64,
    pub buy: GoodId,
    pub sell: GoodId,
    /// Units of `buy` the initiator received
    pub bought: f64,
    /// Units of `sell` the initiator gave up
    pub sold: f64,
}

impl From<&TradeRecord> for TradeSnapshot {
    fn from(record: &TradeRecord) -> Self {
        Self {
            tick: record.tick,
            initiator: record.initiator.to_u64(),
            partner: record.partner.to_u64(),
            buy: record.pair.buy,
            sell: record.pair.sell,
            bought: record.deal.get(record.pair.buy),
            sold: -record.deal.get(record.pair.sell),
        }
    }
}

impl StateSnapshot {
    pub fn capture(population: &Population) -> Self {
        let memory = population.config().memory;
        let agents = population
            .agents()
            .map(|agent| AgentSnapshot {
                id: agent.id.to_u64(),
                ppf: agent.ppf.clone(),
                endowment: agent.endowment.clone(),
                utility: agent.utility(),
                utility_params: agent.utility_params.weights().to_vec(),
                production_plan: agent.production_plan.weights().to_vec(),
                trade_propensity: agent.trade_propensity.weights().to_vec(),
                specialization: agent.specialization(),
                trades_done: agent.trades_done,
                cumulative_utility: agent.cumulative_utility,
                age: agent.age,
                recent_trades: population
                    .ledger()
                    .recent_involving(agent.id, memory)
                    .into_iter()
                    .map(TradeSnapshot::from)
                    .collect(),
            })
            .collect();

        Self {
            stats: PopulationStats::collect(population),
            agents,
        }
    }
}
