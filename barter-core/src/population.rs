use rand::Rng;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::agents::{Agent, ConsumeOutcome, Mutation};
use crate::config::{AdaptationConfig, PopulationConfig, SimulationConfig};
use crate::error::BarterError;
use crate::ledger::Ledger;
use crate::simplex::Simplex;
use crate::trade::{TradeAttempt, TradeContext, attempt_trade};
#[cfg(feature = "instrument")]
use crate::types::KeyToU64;
use crate::types::{AgentId, Quantity, TradePairs};

/// What one activation of one agent did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub agent: AgentId,
    pub partner: AgentId,
    pub produced: Vec<Quantity>,
    pub attempt: TradeAttempt,
    pub consumption: ConsumeOutcome,
}

/// Every agent, the shared trade pair enumeration and the global ledger.
///
/// The good count is fixed at creation. Agents are never removed; `order`
/// holds each id exactly once and is what the scheduler permutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Population {
    goods: usize,
    agents: SlotMap<AgentId, Agent>,
    pub(crate) order: Vec<AgentId>,
    pairs: TradePairs,
    ledger: Ledger,
    pub(crate) tick: u64,
    config: AdaptationConfig,
}

impl Population {
    // === Construction ===

    /// An agentless population over `goods` goods.
    pub fn empty(goods: usize, config: AdaptationConfig) -> Result<Self, BarterError> {
        if goods < 2 {
            return Err(BarterError::TooFewGoods { found: goods });
        }
        config.validate()?;
        Ok(Self {
            goods,
            agents: SlotMap::with_key(),
            order: Vec::new(),
            pairs: TradePairs::enumerate(goods),
            ledger: Ledger::new(),
            tick: 0,
            config,
        })
    }

    /// `agents` randomized agents over `goods` goods with default ranges and behavior.
    pub fn create<R: Rng>(agents: usize, goods: usize, rng: &mut R) -> Result<Self, BarterError> {
        let population = PopulationConfig {
            agents,
            goods,
            ..PopulationConfig::default()
        };
        Self::with_config(
            &SimulationConfig {
                population,
                ..SimulationConfig::default()
            },
            rng,
        )
    }

    pub fn with_config<R: Rng>(config: &SimulationConfig, rng: &mut R) -> Result<Self, BarterError> {
        config.validate()?;
        let mut population = Self::empty(config.population.goods, config.adaptation.clone())?;
        for _ in 0..config.population.agents {
            population.add_random_agent(&config.population, rng)?;
        }
        Ok(population)
    }

    // === Agent Management ===

    /// Register an agent with explicit fundamentals. Raw utility weights are normalized.
    pub fn add_agent(
        &mut self,
        ppf: Vec<u32>,
        endowment: Vec<Quantity>,
        utility_weights: Vec<f64>,
    ) -> Result<AgentId, BarterError> {
        if ppf.len() != self.goods {
            return Err(BarterError::GoodCountMismatch {
                expected: self.goods,
                found: ppf.len(),
            });
        }
        let utility_params = Simplex::from_weights(utility_weights)?;
        let agent = Agent::new(
            AgentId::default(),
            ppf,
            endowment,
            utility_params,
            self.pairs.len(),
        )?;
        Ok(self.insert(agent))
    }

    /// Register an agent with fundamentals drawn from the configured ranges.
    pub fn add_random_agent<R: Rng>(
        &mut self,
        ranges: &PopulationConfig,
        rng: &mut R,
    ) -> Result<AgentId, BarterError> {
        ranges.validate_ranges()?;
        let (ppf_lo, ppf_hi) = ranges.ppf_range;
        let (end_lo, end_hi) = ranges.endowment_range;
        let (util_lo, util_hi) = ranges.utility_weight_range;

        let ppf = (0..self.goods).map(|_| rng.random_range(ppf_lo..ppf_hi)).collect();
        let endowment = (0..self.goods)
            .map(|_| rng.random_range(end_lo..end_hi) as Quantity)
            .collect();
        let weights = (0..self.goods)
            .map(|_| rng.random_range(util_lo..util_hi) as f64)
            .collect();
        self.add_agent(ppf, endowment, weights)
    }

    fn insert(&mut self, mut agent: Agent) -> AgentId {
        let id = self.agents.insert_with_key(|id| {
            agent.id = id;
            agent
        });
        self.order.push(id);
        id
    }

    /// Clone `parent` into a fresh agent and apply `mutations` to the clone.
    ///
    /// The child keeps the parent's fundamentals, strategy and holdings but
    /// starts with no trades, no accumulated utility and age zero. Nothing is
    /// registered if any mutation fails.
    pub fn reproduce(&mut self, parent: AgentId, mutations: &[Mutation]) -> Result<AgentId, BarterError> {
        let mut child = self
            .agents
            .get(parent)
            .ok_or(BarterError::UnknownAgent(parent))?
            .clone();
        child.trades_done = 0;
        child.cumulative_utility = 0.0;
        child.age = 0;
        for mutation in mutations {
            mutation.apply(&mut child, &self.config)?;
        }
        Ok(self.insert(child))
    }

    // === Queries ===

    pub fn goods(&self) -> usize {
        self.goods
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Direct write access for external hooks. Callers own the invariants of
    /// whatever they change.
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    /// Ids in current activation order
    pub fn agent_ids(&self) -> &[AgentId] {
        &self.order
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.order.iter().filter_map(|id| self.agents.get(*id))
    }

    pub fn pairs(&self) -> &TradePairs {
        &self.pairs
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn config(&self) -> &AdaptationConfig {
        &self.config
    }

    // === Matching ===

    /// Uniform draw over every agent except `agent`.
    ///
    /// Single draw over the other N-1 slots: a hit on `agent` itself is
    /// redirected to the last slot, which the draw never reaches.
    pub fn find_partner<R: Rng>(&self, agent: AgentId, rng: &mut R) -> Result<AgentId, BarterError> {
        let n = self.order.len();
        if n < 2 {
            return Err(BarterError::InsufficientPopulation { found: n });
        }
        if !self.agents.contains_key(agent) {
            return Err(BarterError::UnknownAgent(agent));
        }
        let drawn = self.order[rng.random_range(0..n - 1)];
        Ok(if drawn == agent { self.order[n - 1] } else { drawn })
    }

    // === Activation ===

    /// Produce, find a partner, trade or adapt, then consume.
    ///
    /// The partner's endowment may change here, before its own activation
    /// later in the same tick.
    pub fn step_agent<R: Rng>(&mut self, id: AgentId, rng: &mut R) -> Result<StepReport, BarterError> {
        let produced = {
            let agent = self.agents.get_mut(id).ok_or(BarterError::UnknownAgent(id))?;
            agent.age += 1;
            agent.produce(self.config.effort_per_tick)
        };

        let partner = self.find_partner(id, rng)?;
        let ctx = TradeContext {
            pairs: &self.pairs,
            config: &self.config,
            tick: self.tick,
        };
        let [initiator, counterparty] = self
            .agents
            .get_disjoint_mut([id, partner])
            .ok_or(BarterError::UnknownAgent(partner))?;

        let attempt = attempt_trade(ctx, initiator, counterparty, &mut self.ledger, rng)?;
        let consumption = initiator.consume(self.config.consumption_units, rng)?;

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "consumption",
            tick = self.tick,
            agent_id = id.to_u64(),
            units = self.config.consumption_units as u64,
            consumed = matches!(consumption, ConsumeOutcome::Consumed(_)),
            utility = initiator.utility(),
            cumulative_utility = initiator.cumulative_utility,
        );

        Ok(StepReport {
            agent: id,
            partner,
            produced,
            attempt,
            consumption,
        })
    }

    // === Checkpointing ===

    pub fn to_json(&self) -> Result<String, BarterError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore a checkpoint, rejecting one whose parts disagree with each
    /// other or that a fresh population could never have reached.
    pub fn from_json(json: &str) -> Result<Self, BarterError> {
        let population: Self = serde_json::from_str(json)?;
        if population.goods < 2 {
            return Err(BarterError::TooFewGoods {
                found: population.goods,
            });
        }
        population.config.validate()?;
        if population.pairs != TradePairs::enumerate(population.goods) {
            return Err(BarterError::Config(
                "trade pairs do not match the good count".into(),
            ));
        }
        if population.order.len() != population.agents.len()
            || population.order.iter().any(|id| !population.agents.contains_key(*id))
        {
            return Err(BarterError::Config(
                "activation order does not match the agent set".into(),
            ));
        }
        for (id, agent) in &population.agents {
            if agent.id != id {
                return Err(BarterError::Config(format!(
                    "agent stored under {id:?} claims id {:?}",
                    agent.id
                )));
            }
            agent.validate()?;
            if agent.goods() != population.goods || agent.trade_propensity.len() != population.pairs.len() {
                return Err(BarterError::GoodCountMismatch {
                    expected: population.goods,
                    found: agent.goods(),
                });
            }
        }
        Ok(population)
    }
}
