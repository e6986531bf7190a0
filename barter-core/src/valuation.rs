//! Utility and comparative-advantage valuation.
//!
//! Both functions are pure: same inputs, same output.

use crate::types::Quantity;

/// Additive power utility: `Σ endowment_i ^ weight_i`.
///
/// Not a Cobb-Douglas product despite the weights summing to 1. `0^0` is 1
/// and `0^p` is 0 for `p > 0`, both of which `powf` already yields.
pub fn utility(endowment: &[Quantity], weights: &[f64]) -> f64 {
    endowment
        .iter()
        .zip(weights)
        .map(|(&held, &weight)| held.powf(weight))
        .sum()
}

/// Value a deal in the agent's own production terms, with good 0 as numeraire.
///
/// Each coordinate is priced at `ppf_0 / ppf_i`, the number of good-0 units the
/// agent gives up to make one unit of good i. Positive means the agent gains
/// more than it would by producing the goods itself.
pub fn compare(deal: &[Quantity], ppf: &[u32]) -> f64 {
    let Some(&numeraire) = ppf.first() else {
        return 0.0;
    };
    let numeraire = numeraire as f64;
    deal.iter()
        .zip(ppf)
        .map(|(&delta, &rate)| delta * (numeraire / rate as f64))
        .sum()
}

/// Output of `effort` units of work spread by `plan` over goods with rates `ppf`
pub fn production(plan: &[f64], ppf: &[u32], effort: f64) -> Vec<Quantity> {
    plan.iter()
        .zip(ppf)
        .map(|(&share, &rate)| share * rate as f64 * effort)
        .collect()
}
