//! Token usage statistics collected while tokenizing.
use serde::{Deserialize, Serialize};

use crate::utils;
use crate::vocabulary::TokenSet;

/// Per-id occurrence counts plus the number of input bytes scanned.
///
/// Counts are indexed by token id and sized for one frozen vocabulary; after
/// any [`TokenSet`] mutation the ids shift and a fresh `TokenStats` must be
/// collected.
#[derive(Debug, Clone)]
pub struct TokenStats {
    count: Vec<u64>,
    scanned_bytes: u64,
}

impl TokenStats {
    /// Creates zeroed statistics for a vocabulary of `ntokens` tokens.
    pub fn new(ntokens: usize) -> Self {
        Self {
            count: vec![0; ntokens],
            scanned_bytes: 0,
        }
    }

    /// Records one occurrence of the token with the given id.
    #[inline]
    pub fn count_token(&mut self, id: u32) {
        self.count[id as usize] += 1;
    }

    /// Records `n` scanned input bytes.
    #[inline]
    pub fn count_bytes(&mut self, n: u64) {
        self.scanned_bytes += n;
    }

    /// The vocabulary size these statistics were collected for.
    pub fn ntokens(&self) -> usize {
        self.count.len()
    }

    /// The occurrence count of one token.
    pub fn token_count(&self, id: u32) -> u64 {
        self.count[id as usize]
    }

    /// All occurrence counts in id order.
    pub fn counts(&self) -> &[u64] {
        &self.count
    }

    /// The number of input bytes scanned.
    pub fn scanned_bytes(&self) -> u64 {
        self.scanned_bytes
    }

    /// The total number of emitted tokens. This is the quantity the trainer
    /// minimizes.
    pub fn total_tokens(&self) -> u64 {
        self.count.iter().sum()
    }

    /// The number of distinct tokens that occurred at least once.
    pub fn used_tokens(&self) -> usize {
        self.count.iter().filter(|&&c| c > 0).count()
    }

    /// Average input bytes covered per emitted token.
    pub fn bytes_per_token(&self) -> f64 {
        let total = self.total_tokens();
        if total == 0 {
            return 0.0;
        }
        self.scanned_bytes as f64 / total as f64
    }

    /// Output entropy estimate: emitted tokens per byte times the bit width
    /// of the alphabet.
    pub fn bits_per_byte(&self) -> f64 {
        if self.scanned_bytes == 0 || self.count.len() < 2 {
            return 0.0;
        }
        let tokens_per_byte = self.total_tokens() as f64 / self.scanned_bytes as f64;
        tokens_per_byte * (self.count.len() as f64).log2()
    }

    /// `(id, count)` pairs of the used tokens, most frequent first.
    pub fn top_counts(&self) -> Vec<(u32, u64)> {
        let mut pairs: Vec<(u32, u64)> = self
            .count
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(i, &c)| (i as u32, c))
            .collect();
        pairs.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        pairs
    }

    /// The serializable digest stored in the trained artifact.
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            ntokens: self.count.len(),
            scanned_bytes: self.scanned_bytes,
            used_tokens: self.used_tokens(),
            total_tokens: self.total_tokens(),
            bytes_per_token: self.bytes_per_token(),
            bits_per_byte: self.bits_per_byte(),
        }
    }

    /// Logs a short usage report, listing the most frequent tokens at debug
    /// level.
    pub fn report(&self, token_set: &TokenSet) {
        log::info!(
            "scanned {} bytes with {} tokens: used {}, total {}, {:.4} bytes/token, {:.4} bits/byte",
            self.scanned_bytes,
            self.count.len(),
            self.used_tokens(),
            self.total_tokens(),
            self.bytes_per_token(),
            self.bits_per_byte()
        );
        if log::log_enabled!(log::Level::Debug) {
            for (id, count) in self.top_counts().into_iter().take(200) {
                log::debug!(
                    "{} {}",
                    utils::display_form(token_set.token(id).string()),
                    count
                );
            }
        }
    }
}

/// The `stats` object of the trained artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    /// Vocabulary size.
    pub ntokens: usize,
    /// Input bytes scanned while collecting the statistics.
    pub scanned_bytes: u64,
    /// Distinct tokens that occurred at least once.
    pub used_tokens: usize,
    /// Total emitted tokens.
    pub total_tokens: u64,
    /// Average input bytes covered per emitted token.
    pub bytes_per_token: f64,
    /// Emitted tokens per byte times the alphabet's bit width.
    pub bits_per_byte: f64,
}
