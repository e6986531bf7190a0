use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::error::BarterError;

// ============================================================================
// IDs - Using slotmap for generational indices
// ============================================================================

new_key_type! {
    pub struct AgentId;
}

/// Trait for converting SlotMap keys to u64 for the WASM boundary and event fields
pub trait KeyToU64 {
    fn to_u64(self) -> u64;
}

impl KeyToU64 for AgentId {
    fn to_u64(self) -> u64 {
        self.0.as_ffi()
    }
}

// ============================================================================
// Goods - indexed 0..K, good 0 is the numeraire
// ============================================================================

pub type GoodId = usize;
pub type Quantity = f64;

// ============================================================================
// Trade Pairs - every ordered (buy, sell) combination of distinct goods
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradePair {
    pub buy: GoodId,
    pub sell: GoodId,
}

impl TradePair {
    pub fn new(buy: GoodId, sell: GoodId) -> Self {
        Self { buy, sell }
    }

    /// The same exchange seen from the counterparty's side
    pub fn reversed(self) -> Self {
        Self {
            buy: self.sell,
            sell: self.buy,
        }
    }
}

/// The K·(K−1) trade pairs of a population, enumerated once at creation.
///
/// Order is buy-major: `(0,1), (0,2), ..., (1,0), (1,2), ...`. Agents index
/// their trade propensities by position in this list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradePairs {
    pairs: Vec<TradePair>,
}

impl TradePairs {
    pub fn enumerate(goods: usize) -> Self {
        let pairs = (0..goods)
            .flat_map(|buy| {
                (0..goods)
                    .filter(move |&sell| sell != buy)
                    .map(move |sell| TradePair::new(buy, sell))
            })
            .collect();
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<TradePair, BarterError> {
        self.pairs
            .get(index)
            .copied()
            .ok_or(BarterError::InvalidTradePairIndex {
                index,
                count: self.pairs.len(),
            })
    }

    pub fn index_of(&self, pair: TradePair) -> Option<usize> {
        self.pairs.iter().position(|p| *p == pair)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TradePair> {
        self.pairs.iter()
    }
}
