//! Token estimation and model pricing.
//!
//! Estimates are heuristic (about four characters per token); adapters should
//! prefer provider-reported counts when available.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Price per token in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_token: f64,
    pub output_per_token: f64,
}

impl ModelPricing {
    pub fn per_million(input: f64, output: f64) -> Self {
        Self {
            input_per_token: input / 1_000_000.0,
            output_per_token: output / 1_000_000.0,
        }
    }
}

/// Known models as (name, input, output) in USD per million tokens.
const MODEL_PRICING: &[(&str, f64, f64)] = &[
    // OpenAI
    ("gpt-4", 30.0, 60.0),
    ("gpt-4-32k", 60.0, 120.0),
    ("gpt-4-turbo", 10.0, 30.0),
    ("gpt-4o", 2.5, 10.0),
    ("gpt-4o-mini", 0.15, 0.6),
    ("gpt-3.5-turbo", 0.5, 1.5),
    // Anthropic
    ("claude-3-opus", 15.0, 75.0),
    ("claude-3-sonnet", 3.0, 15.0),
    ("claude-3-haiku", 0.25, 1.25),
    ("claude-3.5-sonnet", 3.0, 15.0),
    ("claude-3.5-haiku", 0.8, 4.0),
];

/// Applied to unknown models so budgets err on the safe side.
pub fn fallback_pricing() -> ModelPricing {
    ModelPricing::per_million(30.0, 60.0)
}

/// Image parts are billed as a flat low-detail estimate.
const IMAGE_TOKENS: u64 = 85;
const MESSAGE_OVERHEAD_TOKENS: u64 = 3;

/// Pricing for a model: exact match first, then the longest known prefix.
///
/// Matching is case-insensitive.
pub fn pricing_for(model: &str) -> Option<ModelPricing> {
    let model = model.to_ascii_lowercase();

    let exact = MODEL_PRICING.iter().find(|(name, _, _)| *name == model);
    let entry = exact.or_else(|| {
        MODEL_PRICING
            .iter()
            .filter(|(name, _, _)| model.starts_with(name))
            .max_by_key(|(name, _, _)| name.len())
    });

    entry.map(|(_, input, output)| ModelPricing::per_million(*input, *output))
}

/// Names of every priced model.
pub fn known_models() -> impl Iterator<Item = &'static str> {
    MODEL_PRICING.iter().map(|(name, _, _)| *name)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Token estimation
// ═══════════════════════════════════════════════════════════════════════════════

/// Rough token count: four characters per token, at least one for any text.
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() as u64 / 4).max(1)
}

/// Chat message as sent to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default)]
    pub content: MessageContent,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Plain text or multimodal parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: serde_json::Value },
}

/// Estimated prompt size of a message list, including formatting overhead.
pub fn count_messages_tokens(messages: &[Message]) -> u64 {
    messages
        .iter()
        .map(|message| {
            let content = match &message.content {
                MessageContent::Text(text) => estimate_tokens(text),
                MessageContent::Parts(parts) => parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => estimate_tokens(text),
                        ContentPart::ImageUrl { .. } => IMAGE_TOKENS,
                    })
                    .sum(),
            };
            MESSAGE_OVERHEAD_TOKENS + content + message.role.len() as u64 / 4
        })
        .sum()
}

/// Prompt given either as raw text or as chat messages.
#[derive(Debug, Clone, Copy)]
pub enum Prompt<'a> {
    Text(&'a str),
    Messages(&'a [Message]),
}

impl<'a> From<&'a str> for Prompt<'a> {
    fn from(text: &'a str) -> Self {
        Prompt::Text(text)
    }
}

impl<'a> From<&'a [Message]> for Prompt<'a> {
    fn from(messages: &'a [Message]) -> Self {
        Prompt::Messages(messages)
    }
}

impl<'a> From<&'a Vec<Message>> for Prompt<'a> {
    fn from(messages: &'a Vec<Message>) -> Self {
        Prompt::Messages(messages)
    }
}

impl Prompt<'_> {
    pub fn tokens(&self) -> u64 {
        match self {
            Prompt::Text(text) => estimate_tokens(text),
            Prompt::Messages(messages) => count_messages_tokens(messages),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cost
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenCount {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Cost breakdown for one completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub model: String,
    pub input_cost: f64,
    pub output_cost: f64,
    /// False when the fallback pricing was applied
    pub known_model: bool,
}

impl CostEstimate {
    pub fn total_cost(&self) -> f64 {
        self.input_cost + self.output_cost
    }
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: input=${:.6} output=${:.6} total=${:.6}",
            self.model,
            self.input_cost,
            self.output_cost,
            self.total_cost()
        )
    }
}

/// Cost of a completion. Unknown models use [`fallback_pricing`].
pub fn calculate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> CostEstimate {
    let (pricing, known_model) = match pricing_for(model) {
        Some(pricing) => (pricing, true),
        None => {
            tracing::debug!(model = model, "No pricing for model, using fallback");
            (fallback_pricing(), false)
        }
    };

    CostEstimate {
        model: model.to_string(),
        input_cost: input_tokens as f64 * pricing.input_per_token,
        output_cost: output_tokens as f64 * pricing.output_per_token,
        known_model,
    }
}

/// Estimate tokens and cost for a prompt and its completion text.
pub fn estimate_completion_cost<'a>(
    input: impl Into<Prompt<'a>>,
    output: &str,
    model: &str,
) -> (TokenCount, CostEstimate) {
    let count = TokenCount {
        input_tokens: input.into().tokens(),
        output_tokens: estimate_tokens(output),
    };
    let cost = calculate_cost(model, count.input_tokens, count.output_tokens);
    (count, cost)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("hi"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn test_pricing_prefix_match() {
        let exact = pricing_for("GPT-4o").unwrap();
        assert_eq!(exact, ModelPricing::per_million(2.5, 10.0));

        // gpt-4o-mini-2024 must not resolve to gpt-4 or gpt-4o
        let versioned = pricing_for("gpt-4o-mini-2024-07-18").unwrap();
        assert_eq!(versioned, ModelPricing::per_million(0.15, 0.6));

        assert!(pricing_for("llama-3").is_none());
    }

    #[test]
    fn test_calculate_cost() {
        let cost = calculate_cost("gpt-4", 1_000, 500);
        assert!(cost.known_model);
        assert!((cost.input_cost - 0.03).abs() < 1e-12);
        assert!((cost.output_cost - 0.03).abs() < 1e-12);
        assert!((cost.total_cost() - 0.06).abs() < 1e-12);

        let unknown = calculate_cost("mystery-model", 1_000, 0);
        assert!(!unknown.known_model);
        assert!(unknown.total_cost() > 0.0);
    }

    #[test]
    fn test_count_messages_tokens() {
        let messages = vec![
            Message::new("user", "abcdefgh"),
            Message {
                role: "assistant".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: "abcd".to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: serde_json::json!({"url": "https://example.com/a.png"}),
                    },
                ]),
            },
        ];
        // (3 + 2 + 1) + (3 + 1 + 85 + 2)
        assert_eq!(count_messages_tokens(&messages), 97);
    }

    #[test]
    fn test_message_content_deserialize() {
        let raw = r#"[
            {"role": "user", "content": "hello there"},
            {"role": "user", "content": [{"type": "image_url", "image_url": {"url": "x"}}]}
        ]"#;
        let messages: Vec<Message> = serde_json::from_str(raw).unwrap();
        assert!(matches!(messages[1].content, MessageContent::Parts(_)));
    }

    #[test]
    fn test_estimate_completion_cost() {
        let (count, cost) = estimate_completion_cost("abcdefgh", "abcd", "claude-3-haiku");
        assert_eq!(count.input_tokens, 2);
        assert_eq!(count.output_tokens, 1);
        assert_eq!(count.total_tokens(), 3);
        assert!(cost.known_model);
    }
}
