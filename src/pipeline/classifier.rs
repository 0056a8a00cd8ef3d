//! Keyword classifier: decides whether a group message is a taxi request.
//!
//! Single-word keywords are compared against each whitespace token of the
//! message using a strict threshold. Phrases are compared against the whole
//! message with a looser one, since the partial-ratio score is penalized by
//! the length gap between a short phrase and a long message.

use tracing::{debug, info};

use crate::pipeline::matcher;
use crate::pipeline::types::{KeywordSet, MatchResult, MatchedPair};

/// Default minimum score for a single-token keyword hit.
pub const DEFAULT_TOKEN_THRESHOLD: f64 = 95.0;

/// Default minimum score for a phrase keyword hit.
pub const DEFAULT_PHRASE_THRESHOLD: f64 = 70.0;

/// Score thresholds for the two keyword shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    pub token_threshold: f64,
    pub phrase_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            token_threshold: DEFAULT_TOKEN_THRESHOLD,
            phrase_threshold: DEFAULT_PHRASE_THRESHOLD,
        }
    }
}

/// Applies fuzzy keyword matching to inbound text.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify `message` against every keyword in `keywords`.
    ///
    /// Each keyword contributes at most one pair. Pairs follow keyword order.
    pub fn classify(&self, message: &str, keywords: &KeywordSet) -> MatchResult {
        let message = message.to_lowercase();
        let tokens: Vec<&str> = message.split_whitespace().collect();
        let mut result = MatchResult::default();

        for keyword in keywords.iter() {
            let fragment = if keyword.is_phrase() {
                let score = matcher::similarity(&message, keyword.as_str());
                (score >= self.config.phrase_threshold).then(|| message.clone())
            } else {
                tokens
                    .iter()
                    .find(|token| {
                        matcher::matches(token, keyword.as_str(), self.config.token_threshold)
                    })
                    .map(|token| token.to_string())
            };

            if let Some(fragment) = fragment {
                let pair = MatchedPair {
                    fragment,
                    keyword: keyword.clone(),
                };
                debug!(pair = %pair, "Keyword matched");
                result.pairs.push(pair);
            }
        }

        if result.is_relevant() {
            let summary = result
                .pairs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            info!(count = result.count(), matched = %summary, "Message matched keywords");
        } else {
            info!(message = %message, "No keywords matched");
        }

        result
    }
}
