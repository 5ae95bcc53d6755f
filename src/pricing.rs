use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostInfo {
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub total_cost_usd: f64,
    pub pricing_model: String,
}

/// USD per million tokens for the flat-rate models.
const STANDARD_PRICING: &[(&str, f64, f64)] = &[
    ("qwen-vl-max", 2.8, 8.4),
    ("qwen-vl-plus", 1.12, 2.8),
    ("qwen3-vl-plus", 1.12, 2.8),
    ("qwen-vl-turbo", 0.28, 0.84),
];

const FALLBACK_MODEL: &str = "qwen-vl-plus";

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

/// Estimates the cost of one request from its token usage.
///
/// qwen3-vl-flash bills on an input-token tier per request; everything else
/// uses a flat per-model rate, matched by substring with a qwen-vl-plus
/// fallback for unknown models.
pub fn calculate_cost(input_tokens: u64, output_tokens: u64, model: &str) -> CostInfo {
    let model_lower = model.to_lowercase();

    if model_lower.contains("qwen3-vl-flash") {
        let (input_price, output_price) = if input_tokens <= 32_000 {
            (0.05, 0.40)
        } else if input_tokens <= 128_000 {
            (0.075, 0.60)
        } else {
            (0.12, 0.96)
        };

        let input_cost = input_tokens as f64 / 1_000_000.0 * input_price;
        let output_cost = output_tokens as f64 / 1_000_000.0 * output_price;
        return CostInfo {
            input_cost_usd: round6(input_cost),
            output_cost_usd: round6(output_cost),
            total_cost_usd: round6(input_cost + output_cost),
            pricing_model: "qwen3-vl-flash-tiered".to_string(),
        };
    }

    let (key, input_price, output_price) = STANDARD_PRICING
        .iter()
        .find(|(key, _, _)| model_lower.contains(key))
        .copied()
        .unwrap_or((FALLBACK_MODEL, 1.12, 2.8));

    let input_cost = input_tokens as f64 / 1_000_000.0 * input_price;
    let output_cost = output_tokens as f64 / 1_000_000.0 * output_price;
    CostInfo {
        input_cost_usd: round6(input_cost),
        output_cost_usd: round6(output_cost),
        total_cost_usd: round6(input_cost + output_cost),
        pricing_model: key.to_string(),
    }
}
