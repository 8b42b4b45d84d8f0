//! Token accounting for completion calls.

use serde::Deserialize;

/// Maximum completion tokens requested per call. Generous enough for a full
/// replacement file body; the endpoint truncates beyond this.
pub const MAX_COMPLETION_TOKENS: u32 = 16384;

/// API usage information reported by the completion endpoint.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    /// Actual cost in USD where the endpoint reports it (OpenRouter uses
    /// `total_cost` in the usage object). Never estimated locally.
    #[serde(default, alias = "total_cost")]
    pub cost: Option<f64>,
}

impl Usage {
    /// Fold another call's usage into this running total.
    pub fn absorb(&mut self, other: Option<&Usage>) {
        let Some(other) = other else { return };
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.cost = match (self.cost, other.cost) {
            (Some(a), Some(b)) => Some(a + b),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
    }
}
