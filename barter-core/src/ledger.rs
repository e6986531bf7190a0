use serde::{Deserialize, Serialize};

use crate::trade::Deal;
use crate::types::{AgentId, TradePair};

/// A committed trade. Written once, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub initiator: AgentId,
    pub partner: AgentId,
    /// Change to the initiator's endowment; the partner received the negation
    pub deal: Deal,
    pub pair: TradePair,
    pub pair_index: usize,
    pub tick: u64,
    /// Comparator value of `deal` against the initiator's ppf at commit time
    pub initiator_surplus: f64,
    /// Comparator value of `-deal` against the partner's ppf at commit time
    pub partner_surplus: f64,
}

impl TradeRecord {
    pub fn involves(&self, agent: AgentId) -> bool {
        self.initiator == agent || self.partner == agent
    }
}

/// Append-only trade history in commit order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    records: Vec<TradeRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, record: TradeRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&TradeRecord> {
        self.records.get(index)
    }

    pub fn last(&self) -> Option<&TradeRecord> {
        self.records.last()
    }

    /// Trades where `agent` was either side
    pub fn involving(&self, agent: AgentId) -> impl Iterator<Item = &TradeRecord> {
        self.records.iter().filter(move |r| r.involves(agent))
    }

    pub fn initiated_by(&self, agent: AgentId) -> impl Iterator<Item = &TradeRecord> {
        self.records.iter().filter(move |r| r.initiator == agent)
    }

    /// The last `window` trades involving `agent`, oldest first
    pub fn recent_involving(&self, agent: AgentId, window: usize) -> Vec<&TradeRecord> {
        let mut recent: Vec<&TradeRecord> = self
            .records
            .iter()
            .rev()
            .filter(|r| r.involves(agent))
            .take(window)
            .collect();
        recent.reverse();
        recent
    }

    /// Trades committed during `tick`
    pub fn committed_at(&self, tick: u64) -> impl Iterator<Item = &TradeRecord> {
        // Ticks are non-decreasing along the ledger.
        let start = self.records.partition_point(|r| r.tick < tick);
        self.records[start..].iter().take_while(move |r| r.tick == tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn id(n: u64) -> AgentId {
        AgentId::from(KeyData::from_ffi(n))
    }

    fn record(initiator: u64, partner: u64, tick: u64) -> TradeRecord {
        TradeRecord {
            initiator: id(initiator),
            partner: id(partner),
            deal: Deal::zero(2),
            pair: TradePair::new(0, 1),
            pair_index: 0,
            tick,
            initiator_surplus: 0.0,
            partner_surplus: 0.0,
        }
    }

    fn ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.append(record(1, 2, 1));
        ledger.append(record(2, 3, 1));
        ledger.append(record(3, 1, 2));
        ledger.append(record(1, 3, 4));
        ledger
    }

    #[test]
    fn test_append_preserves_order() {
        let ledger = ledger();
        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.last().unwrap().tick, 4);
        let ticks: Vec<u64> = ledger.records().iter().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![1, 1, 2, 4]);
    }

    #[test]
    fn test_participant_views() {
        let ledger = ledger();
        assert_eq!(ledger.involving(id(1)).count(), 3);
        assert_eq!(ledger.initiated_by(id(1)).count(), 2);
        assert_eq!(ledger.involving(id(9)).count(), 0);
    }

    #[test]
    fn test_recent_window() {
        let ledger = ledger();
        let recent = ledger.recent_involving(id(3), 2);
        let ticks: Vec<u64> = recent.iter().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![2, 4]);
        assert!(ledger.recent_involving(id(3), 0).is_empty());
    }

    #[test]
    fn test_committed_at() {
        let ledger = ledger();
        assert_eq!(ledger.committed_at(1).count(), 2);
        assert_eq!(ledger.committed_at(3).count(), 0);
        assert_eq!(ledger.committed_at(4).count(), 1);
    }
}
