use rand::Rng;

use super::proposal::{Proposal, propose};
use crate::adaptation::{SoloOutcome, solo_update};
use crate::agents::Agent;
use crate::config::AdaptationConfig;
use crate::error::BarterError;
use crate::ledger::{Ledger, TradeRecord};
#[cfg(feature = "instrument")]
use crate::types::KeyToU64;
use crate::types::{GoodId, TradePairs};
use crate::valuation::compare;

// === CONTEXT ===

/// Population-wide state a trade attempt reads.
#[derive(Debug, Clone, Copy)]
pub struct TradeContext<'a> {
    pub pairs: &'a TradePairs,
    pub config: &'a AdaptationConfig,
    pub tick: u64,
}

// === EVALUATION ===

/// Comparator values of one proposal, one per side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub initiator_surplus: f64,
    pub partner_surplus: f64,
}

impl Evaluation {
    pub fn of(proposal: &Proposal, initiator: &Agent, partner: &Agent) -> Self {
        Self {
            initiator_surplus: compare(proposal.deal.delta(), &initiator.ppf),
            partner_surplus: compare(proposal.deal.negated().delta(), &partner.ppf),
        }
    }

    pub fn good_for_initiator(&self) -> bool {
        self.initiator_surplus > 0.0
    }

    pub fn good_for_partner(&self) -> bool {
        self.partner_surplus > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Initiator,
    Partner,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Comparator not strictly positive for the initiator (includes zero deals)
    InitiatorUnfavorable,
    PartnerUnfavorable,
    /// Mutually favorable, but one side cannot cover its half
    WouldGoNegative {
        side: Side,
        good: GoodId,
        resulting: f64,
    },
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::InitiatorUnfavorable => "initiator_unfavorable",
            Rejection::PartnerUnfavorable => "partner_unfavorable",
            Rejection::WouldGoNegative { .. } => "would_go_negative",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    /// Index of the new ledger record
    Committed { record: usize },
    /// Only the initiator adapts; the partner is untouched
    Rejected {
        reason: Rejection,
        adaptation: SoloOutcome,
    },
}

impl TradeOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TradeOutcome::Committed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeAttempt {
    pub proposal: Proposal,
    pub evaluation: Evaluation,
    pub outcome: TradeOutcome,
}

// === COMMIT ===

/// Evaluate `proposal` and commit it if both sides gain and both can pay.
///
/// All checks run before any write: on `Err(Rejection)` neither agent nor the
/// ledger has changed. On success both endowments move, one record is
/// appended, and both agents reinforce the pattern they just traded.
pub fn settle(
    ctx: TradeContext<'_>,
    proposal: &Proposal,
    evaluation: &Evaluation,
    initiator: &mut Agent,
    partner: &mut Agent,
    ledger: &mut Ledger,
) -> Result<Result<usize, Rejection>, BarterError> {
    if !evaluation.good_for_initiator() {
        return Ok(Err(Rejection::InitiatorUnfavorable));
    }
    if !evaluation.good_for_partner() {
        return Ok(Err(Rejection::PartnerUnfavorable));
    }

    let initiator_next = match initiator.checked_endowment(proposal.deal.delta()) {
        Ok(next) => next,
        Err(BarterError::NegativeEndowment { good, resulting, .. }) => {
            return Ok(Err(Rejection::WouldGoNegative {
                side: Side::Initiator,
                good,
                resulting,
            }));
        }
        Err(e) => return Err(e),
    };
    let partner_next = match partner.checked_endowment(proposal.deal.negated().delta()) {
        Ok(next) => next,
        Err(BarterError::NegativeEndowment { good, resulting, .. }) => {
            return Ok(Err(Rejection::WouldGoNegative {
                side: Side::Partner,
                good,
                resulting,
            }));
        }
        Err(e) => return Err(e),
    };

    let mirrored = ctx
        .pairs
        .index_of(proposal.pair.reversed())
        .ok_or(BarterError::InvalidTradePairIndex {
            index: proposal.pair_index,
            count: ctx.pairs.len(),
        })?;

    // Validate both reinforcements on copies so a failure cannot leave one side updated.
    let mut initiator_plan = initiator.production_plan.clone();
    initiator_plan.reinforce(proposal.pair.sell, ctx.config.strategy_step)?;
    let mut initiator_propensity = initiator.trade_propensity.clone();
    initiator_propensity.reinforce(proposal.pair_index, ctx.config.strategy_step)?;
    let mut partner_plan = partner.production_plan.clone();
    partner_plan.reinforce(proposal.pair.buy, ctx.config.strategy_step)?;
    let mut partner_propensity = partner.trade_propensity.clone();
    partner_propensity.reinforce(mirrored, ctx.config.strategy_step)?;

    initiator.endowment = initiator_next;
    partner.endowment = partner_next;

    let record = ledger.append(TradeRecord {
        initiator: initiator.id,
        partner: partner.id,
        deal: proposal.deal.clone(),
        pair: proposal.pair,
        pair_index: proposal.pair_index,
        tick: ctx.tick,
        initiator_surplus: evaluation.initiator_surplus,
        partner_surplus: evaluation.partner_surplus,
    });

    // Each side leans toward making more of what it gave away and toward
    // repeating the exchange from its own point of view.
    initiator.trades_done += 1;
    initiator.production_plan = initiator_plan;
    initiator.trade_propensity = initiator_propensity;
    partner.trades_done += 1;
    partner.production_plan = partner_plan;
    partner.trade_propensity = partner_propensity;

    Ok(Ok(record))
}

/// Propose, evaluate, then commit or fall back to solo adaptation.
pub fn attempt_trade<R: Rng>(
    ctx: TradeContext<'_>,
    initiator: &mut Agent,
    partner: &mut Agent,
    ledger: &mut Ledger,
    rng: &mut R,
) -> Result<TradeAttempt, BarterError> {
    let proposal = propose(initiator, ctx.pairs, rng)?;
    let evaluation = Evaluation::of(&proposal, initiator, partner);

    let outcome = match settle(ctx, &proposal, &evaluation, initiator, partner, ledger)? {
        Ok(record) => TradeOutcome::Committed { record },
        Err(reason) => {
            let adaptation = solo_update(initiator, ctx.config, rng)?;
            TradeOutcome::Rejected { reason, adaptation }
        }
    };

    #[cfg(feature = "instrument")]
    {
        let rejection = match &outcome {
            TradeOutcome::Committed { .. } => "",
            TradeOutcome::Rejected { reason, .. } => reason.as_str(),
        };
        tracing::info!(
            target: "trade",
            tick = ctx.tick,
            initiator = initiator.id.to_u64(),
            partner = partner.id.to_u64(),
            buy = proposal.pair.buy as u64,
            sell = proposal.pair.sell as u64,
            price = proposal.price as u64,
            initiator_surplus = evaluation.initiator_surplus,
            partner_surplus = evaluation.partner_surplus,
            committed = outcome.is_committed(),
            rejection = rejection,
        );
        if let TradeOutcome::Rejected { adaptation, .. } = &outcome {
            tracing::info!(
                target: "solo_update",
                tick = ctx.tick,
                agent_id = initiator.id.to_u64(),
                mutation = adaptation.mutation.target.as_str(),
                index = adaptation.mutation.index as u64,
                baseline = adaptation.baseline,
                candidate = adaptation.candidate,
                accepted = adaptation.accepted,
            );
        }
    }

    Ok(TradeAttempt {
        proposal,
        evaluation,
        outcome,
    })
}
