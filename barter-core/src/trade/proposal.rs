use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agents::Agent;
use crate::error::BarterError;
use crate::types::{GoodId, Quantity, TradePair, TradePairs};

/// Units of the buy good requested by every proposal
pub const BUY_QUANTITY: Quantity = 1.0;

// === DEAL ===

/// Net change to the initiator's endowment. The partner receives the negation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal(Vec<Quantity>);

impl Deal {
    pub fn zero(goods: usize) -> Self {
        Self(vec![0.0; goods])
    }

    /// Receive `bought` of `pair.buy`, give up `sold` of `pair.sell`.
    pub fn exchange(
        goods: usize,
        pair: TradePair,
        bought: Quantity,
        sold: Quantity,
    ) -> Result<Self, BarterError> {
        let mut delta = vec![0.0; goods];
        for good in [pair.buy, pair.sell] {
            if good >= goods {
                return Err(BarterError::IndexOutOfRange {
                    index: good,
                    len: goods,
                });
            }
        }
        delta[pair.buy] += bought;
        delta[pair.sell] -= sold;
        Ok(Self(delta))
    }

    pub fn delta(&self) -> &[Quantity] {
        &self.0
    }

    /// The partner's side of the same deal
    pub fn negated(&self) -> Self {
        Self(self.0.iter().map(|q| -q).collect())
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|q| *q == 0.0)
    }

    pub fn get(&self, good: GoodId) -> Quantity {
        self.0.get(good).copied().unwrap_or(0.0)
    }
}

// === PROPOSAL ===

#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub pair_index: usize,
    pub pair: TradePair,
    /// Units of `pair.sell` offered for `BUY_QUANTITY` of `pair.buy`
    pub price: u32,
    pub deal: Deal,
}

/// Highest whole price the agent can offer without doing worse than making
/// the good itself: the largest `p` with `p * ppf[buy] < ppf[sell]`.
///
/// Zero when even one unit is too dear.
pub fn price_ceiling(ppf: &[u32], pair: TradePair) -> Result<u32, BarterError> {
    let rate = |good: GoodId| {
        ppf.get(good).copied().ok_or(BarterError::IndexOutOfRange {
            index: good,
            len: ppf.len(),
        })
    };
    let buy_rate = rate(pair.buy)?;
    let sell_rate = rate(pair.sell)?;
    if buy_rate == 0 {
        return Err(BarterError::NonPositivePpf { good: pair.buy });
    }
    Ok(sell_rate.saturating_sub(1) / buy_rate)
}

/// Draw a trade pair by propensity and a price under the agent's own ceiling.
///
/// A zero ceiling yields a zero deal, which the comparator then rejects.
pub fn propose<R: Rng>(
    agent: &Agent,
    pairs: &TradePairs,
    rng: &mut R,
) -> Result<Proposal, BarterError> {
    let pair_index = agent.trade_propensity.draw(rng)?;
    let pair = pairs.get(pair_index)?;
    let ceiling = price_ceiling(&agent.ppf, pair)?;

    let (price, deal) = if ceiling == 0 {
        (0, Deal::zero(agent.goods()))
    } else {
        let price = rng.random_range(1..=ceiling);
        let deal = Deal::exchange(agent.goods(), pair, BUY_QUANTITY, price as Quantity)?;
        (price, deal)
    };

    Ok(Proposal {
        pair_index,
        pair,
        price,
        deal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simplex::Simplex;
    use crate::types::AgentId;
    use crate::valuation::compare;
    use rand::SeedableRng;
    use slotmap::KeyData;

    fn agent(ppf: Vec<u32>) -> Agent {
        let goods = ppf.len();
        Agent::new(
            AgentId::from(KeyData::from_ffi(1)),
            ppf,
            vec![20.0; goods],
            Simplex::uniform(goods),
            goods * (goods - 1),
        )
        .unwrap()
    }

    #[test]
    fn test_price_ceiling() {
        let ppf = [4, 1];
        assert_eq!(price_ceiling(&ppf, TradePair::new(1, 0)).unwrap(), 3);
        assert_eq!(price_ceiling(&ppf, TradePair::new(0, 1)).unwrap(), 0);
        assert_eq!(price_ceiling(&[2, 3], TradePair::new(0, 1)).unwrap(), 1);
        assert_eq!(price_ceiling(&[2, 2], TradePair::new(0, 1)).unwrap(), 0);
    }

    #[test]
    fn test_exchange_vector() {
        let deal = Deal::exchange(3, TradePair::new(2, 0), 1.0, 2.0).unwrap();
        assert_eq!(deal.delta(), &[-2.0, 0.0, 1.0]);
        assert_eq!(deal.negated().delta(), &[2.0, 0.0, -1.0]);
        assert!(Deal::exchange(2, TradePair::new(2, 0), 1.0, 1.0).is_err());
    }

    #[test]
    fn test_proposals_never_undercut_own_rate() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let a = agent(vec![3, 1, 2]);
        let pairs = TradePairs::enumerate(3);
        for _ in 0..200 {
            let proposal = propose(&a, &pairs, &mut rng).unwrap();
            if proposal.deal.is_zero() {
                assert_eq!(proposal.price, 0);
                continue;
            }
            assert!(proposal.price >= 1);
            assert!(compare(proposal.deal.delta(), &a.ppf) > 0.0);
        }
    }

    #[test]
    fn test_degenerate_pair_gives_zero_deal() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let mut a = agent(vec![4, 1]);
        // All weight on (buy 0, sell 1), which a ppf of [4, 1] cannot afford
        a.trade_propensity = Simplex::from_weights(vec![1.0, 0.0]).unwrap();
        let proposal = propose(&a, &TradePairs::enumerate(2), &mut rng).unwrap();
        assert_eq!(proposal.pair, TradePair::new(0, 1));
        assert!(proposal.deal.is_zero());
    }
}
