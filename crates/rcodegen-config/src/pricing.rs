//! Named pricing constants used to compute cost for tool families that
//! don't self-report a dollar figure (spec §4.7.1).
//!
//! Kept as plain `f64` constants behind a struct (rather than literals
//! scattered at call sites) so the numbers can drift only in one place and
//! so [`PricingConfig`] can be overridden from the settings file without
//! touching the extraction code.

use serde::{Deserialize, Serialize};

/// Per-token USD pricing and the input/output split ratio used when a tool
/// only reports an aggregate token count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Gemini-like tools report `stats.input_tokens`/`output_tokens`
    /// directly; cost is `input * gemini_input_per_token + output *
    /// gemini_output_per_token`.
    pub gemini_input_per_token_usd: f64,
    pub gemini_output_per_token_usd: f64,

    /// Codex-like tools report only a combined token count; it is split at
    /// [`Self::codex_input_split_ratio`] (input share) before pricing with
    /// the same per-token rates.
    pub codex_input_per_token_usd: f64,
    pub codex_output_per_token_usd: f64,
    pub codex_input_split_ratio: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            gemini_input_per_token_usd: 0.000_001_25,
            gemini_output_per_token_usd: 0.000_005,
            codex_input_per_token_usd: 0.000_003,
            codex_output_per_token_usd: 0.000_015,
            codex_input_split_ratio: 0.7,
        }
    }
}

impl PricingConfig {
    /// `input_tokens × P_in + output_tokens × P_out`, computed entirely in
    /// floating point (spec §4.7.1: integer division here is a bug).
    pub fn gemini_cost_usd(&self, input_tokens: f64, output_tokens: f64) -> f64 {
        input_tokens * self.gemini_input_per_token_usd + output_tokens * self.gemini_output_per_token_usd
    }

    /// Split a combined Codex token count into `(input, output)` at the
    /// configured ratio, rounding only at the final integer conversion, then
    /// price each share.
    pub fn codex_split_and_cost(&self, total_tokens: f64) -> (u64, u64, f64) {
        let input = total_tokens * self.codex_input_split_ratio;
        let output = total_tokens * (1.0 - self.codex_input_split_ratio);
        let cost = input * self.codex_input_per_token_usd + output * self.codex_output_per_token_usd;
        (input as u64, output as u64, cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codex_split_matches_named_ratio_not_integer_division() {
        let pricing = PricingConfig::default();
        // §8 scenario 6: 15 tokens at 0.7/0.3 -> input=10, output=4 (not the
        // 15*7/10=10 / 15*3/10=4 integer-division coincidence — a different
        // ratio like 0.73 must not silently round the same way).
        let (input, output, _cost) = pricing.codex_split_and_cost(15.0);
        assert_eq!(input, 10);
        assert_eq!(output, 4);
    }

    #[test]
    fn codex_split_with_nonstandard_ratio_uses_float_math() {
        let mut pricing = PricingConfig::default();
        pricing.codex_input_split_ratio = 0.73;
        let (input, output, _) = pricing.codex_split_and_cost(15.0);
        // floor(15*0.73)=10, floor(15*0.27)=4 — still distinguishable from the
        // 0.7 ratio's split only because float math is used throughout.
        assert_eq!(input, 10);
        assert_eq!(output, 4);
    }

    #[test]
    fn gemini_cost_is_linear_in_tokens() {
        let pricing = PricingConfig::default();
        let cost = pricing.gemini_cost_usd(1000.0, 500.0);
        assert!((cost - (1000.0 * pricing.gemini_input_per_token_usd + 500.0 * pricing.gemini_output_per_token_usd)).abs() < 1e-12);
    }
}
