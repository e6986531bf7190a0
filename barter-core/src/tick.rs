use rand::Rng;
use rand::seq::SliceRandom;

use crate::agents::ConsumeOutcome;
use crate::error::BarterError;
use crate::population::Population;
use crate::trade::TradeOutcome;

/// Tallies for one pass over the population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: u64,
    pub activations: usize,
    pub committed: usize,
    pub rejected: usize,
    /// Rejections whose solo update kept its mutation
    pub adapted: usize,
    /// Activations where the agent actually ate
    pub consumed: usize,
}

/// Advance one tick: shuffle the activation order, then step every agent once.
///
/// Agents act strictly one after another, so a partner may be traded with
/// before its own turn comes up.
pub fn run_tick<R: Rng>(population: &mut Population, rng: &mut R) -> Result<TickSummary, BarterError> {
    if population.len() < 2 {
        return Err(BarterError::InsufficientPopulation {
            found: population.len(),
        });
    }

    population.tick += 1;
    population.order.shuffle(rng);

    let mut summary = TickSummary {
        tick: population.tick,
        ..TickSummary::default()
    };
    let order = population.order.clone();
    for id in order {
        let report = population.step_agent(id, rng)?;
        summary.activations += 1;
        match report.attempt.outcome {
            TradeOutcome::Committed { .. } => summary.committed += 1,
            TradeOutcome::Rejected { adaptation, .. } => {
                summary.rejected += 1;
                if adaptation.accepted {
                    summary.adapted += 1;
                }
            }
        }
        if matches!(report.consumption, ConsumeOutcome::Consumed(_)) {
            summary.consumed += 1;
        }
    }

    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "tick",
        tick = summary.tick,
        agents = summary.activations as u64,
        committed = summary.committed as u64,
        rejected = summary.rejected as u64,
        adapted = summary.adapted as u64,
        consumed = summary.consumed as u64,
    );

    Ok(summary)
}

/// Run `ticks` ticks back to back.
pub fn run_ticks<R: Rng>(
    population: &mut Population,
    ticks: u64,
    rng: &mut R,
) -> Result<Vec<TickSummary>, BarterError> {
    (0..ticks).map(|_| run_tick(population, rng)).collect()
}
