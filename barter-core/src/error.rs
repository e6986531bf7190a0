//! Logical faults raised by the trade and adaptation engine.

use crate::types::{AgentId, GoodId};

#[derive(Debug, thiserror::Error)]
pub enum BarterError {
    /// Partner selection needs somebody other than the active agent.
    #[error("trading requires at least two agents, population has {found}")]
    InsufficientPopulation { found: usize },

    #[error("an economy needs at least two goods, got {found}")]
    TooFewGoods { found: usize },

    /// A simplex-constrained vector cannot be normalized.
    #[error("weight vector of length {len} sums to {sum} and cannot be normalized")]
    DegenerateWeightVector { len: usize, sum: f64 },

    /// A trade or consumption would leave a coordinate below zero.
    #[error("good {good} would fall to {resulting} for agent {agent:?}")]
    NegativeEndowment {
        agent: Option<AgentId>,
        good: GoodId,
        resulting: f64,
    },

    #[error("trade pair index {index} is outside the {count} enumerated pairs")]
    InvalidTradePairIndex { index: usize, count: usize },

    #[error("index {index} out of range for vector of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("expected a vector over {expected} goods, got {found}")]
    GoodCountMismatch { expected: usize, found: usize },

    #[error("production capability for good {good} must be positive")]
    NonPositivePpf { good: GoodId },

    #[error("unknown agent {0:?}")]
    UnknownAgent(AgentId),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to (de)serialize: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}
