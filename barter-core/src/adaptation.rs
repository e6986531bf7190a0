//! Solo adaptation: a one-mutation greedy search run when a trade falls
//! through.
//!
//! The agent scores its current strategy by the utility it would have after
//! one more production step, tries a single random mutation on an independent
//! copy, and adopts it only on a strict improvement. No annealing, and no
//! memory of failed attempts.

use rand::Rng;

use crate::agents::{Agent, Mutation};
use crate::config::AdaptationConfig;
use crate::error::BarterError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoloOutcome {
    pub mutation: Mutation,
    pub baseline: f64,
    pub candidate: f64,
    pub accepted: bool,
}

/// Run one hill-climbing step on `agent`.
///
/// When the candidate does not beat the baseline the agent is left exactly
/// as it was.
pub fn solo_update<R: Rng>(
    agent: &mut Agent,
    config: &AdaptationConfig,
    rng: &mut R,
) -> Result<SoloOutcome, BarterError> {
    let baseline = agent.projected_utility(config.effort_per_tick);
    let mutation = Mutation::random(agent, &config.mutation_weights, rng)?;

    let mut doppelganger = agent.clone();
    mutation.apply(&mut doppelganger, config)?;
    let candidate = doppelganger.projected_utility(config.effort_per_tick);
    drop(doppelganger);

    let accepted = candidate > baseline;
    if accepted {
        mutation.apply(agent, config)?;
    }

    Ok(SoloOutcome {
        mutation,
        baseline,
        candidate,
        accepted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::MutationTarget;
    use crate::config::MutationWeights;
    use crate::simplex::Simplex;
    use crate::types::AgentId;
    use rand::SeedableRng;
    use slotmap::KeyData;

    fn agent() -> Agent {
        Agent::new(
            AgentId::from(KeyData::from_ffi(1)),
            vec![4, 1],
            vec![12.0, 15.0],
            Simplex::uniform(2),
            2,
        )
        .unwrap()
    }

    fn only(target: MutationTarget) -> AdaptationConfig {
        let mut weights = MutationWeights {
            production_plan: 0,
            trade_propensity: 0,
            utility_params: 0,
            ppf: 0,
            endowment: 0,
        };
        match target {
            MutationTarget::ProductionPlan => weights.production_plan = 1,
            MutationTarget::TradePropensity => weights.trade_propensity = 1,
            MutationTarget::UtilityParams => weights.utility_params = 1,
            MutationTarget::Ppf => weights.ppf = 1,
            MutationTarget::Endowment => weights.endowment = 1,
        }
        AdaptationConfig {
            mutation_weights: weights,
            ..AdaptationConfig::default()
        }
    }

    #[test]
    fn test_trade_propensity_never_changes_utility() {
        // Propensities do not enter production, so the candidate only ties.
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let config = only(MutationTarget::TradePropensity);
        let mut a = agent();
        let before = a.clone();
        for _ in 0..20 {
            let outcome = solo_update(&mut a, &config, &mut rng).unwrap();
            assert!(!outcome.accepted);
            assert_eq!(outcome.baseline, outcome.candidate);
        }
        assert_eq!(a, before);
    }

    #[test]
    fn test_endowment_gain_always_accepted() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let config = only(MutationTarget::Endowment);
        let mut a = agent();
        let total_before: f64 = a.endowment.iter().sum();
        let outcome = solo_update(&mut a, &config, &mut rng).unwrap();
        assert!(outcome.accepted);
        assert!(outcome.candidate > outcome.baseline);
        let total_after: f64 = a.endowment.iter().sum();
        assert_eq!(total_after, total_before + config.endowment_step);
    }

    #[test]
    fn test_accepted_mutation_matches_candidate() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let config = AdaptationConfig::default();
        for _ in 0..100 {
            let mut a = agent();
            let before = a.clone();
            let outcome = solo_update(&mut a, &config, &mut rng).unwrap();
            if outcome.accepted {
                let mut expected = before.clone();
                outcome.mutation.apply(&mut expected, &config).unwrap();
                assert_eq!(a, expected);
                assert!((a.projected_utility(config.effort_per_tick) - outcome.candidate).abs() < 1e-12);
            } else {
                assert_eq!(a, before);
            }
        }
    }
}
