//! Trainer configuration, mirroring the options-struct/builder pattern used
//! throughout the pack's tokenizer trainers (e.g. `BinaryPairVocabTrainerOptions`).

use crate::error::{Result, TrainError};

const DEFAULT_CHUNK_COUNT: usize = 16;

/// Configuration for a single training run.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Target vocabulary size, including the 256 single-byte tokens and the
    /// special tokens.
    pub vocab_size:          usize,
    /// Ordered, distinct special tokens. The first is the chunk split marker
    /// unless `split_marker` overrides it.
    pub special_tokens:      Vec<String>,
    /// Bytes used to locate safe chunk boundaries. Defaults to the UTF-8
    /// bytes of the first special token.
    pub split_marker:        Option<Vec<u8>>,
    /// Upper bound on the number of parallel pre-tokenization chunks.
    pub desired_chunk_count: usize,
}

impl TrainerConfig {
    pub fn new(vocab_size: usize, special_tokens: Vec<String>) -> Self {
        Self {
            vocab_size,
            special_tokens,
            split_marker: None,
            desired_chunk_count: DEFAULT_CHUNK_COUNT,
        }
    }

    pub fn with_desired_chunk_count(mut self, desired_chunk_count: usize) -> Self {
        self.desired_chunk_count = desired_chunk_count;
        self
    }

    pub fn with_split_marker(mut self, split_marker: Vec<u8>) -> Self {
        self.split_marker = Some(split_marker);
        self
    }

    /// The bytes used as the chunk split marker: `split_marker` if set,
    /// otherwise the UTF-8 bytes of the first special token.
    pub fn split_marker_bytes(&self) -> Vec<u8> {
        self.split_marker.clone().unwrap_or_else(|| {
            self.special_tokens
                .first()
                .map(|s| s.as_bytes().to_vec())
                .unwrap_or_default()
        })
    }

    /// The number of merges the merge engine should learn:
    /// `vocab_size - 256 - |special_tokens|`.
    pub fn merge_budget(&self) -> usize {
        self.vocab_size - 256 - self.special_tokens.len()
    }

    /// Validates the configuration, surfacing `Invalid-argument` per the
    /// error-handling policy.
    pub fn validate(&self) -> Result<()> {
        let floor = 256 + self.special_tokens.len();
        if self.vocab_size < floor {
            return Err(TrainError::InvalidArgument(format!(
                "vocab_size ({}) must be >= 256 + |special_tokens| ({})",
                self.vocab_size, floor
            )));
        }
        let mut seen = std::collections::HashSet::with_capacity(self.special_tokens.len());
        for token in &self.special_tokens {
            if !seen.insert(token) {
                return Err(TrainError::InvalidArgument(format!(
                    "duplicate special token: {token:?}"
                )));
            }
        }
        if self.desired_chunk_count == 0 {
            return Err(TrainError::InvalidArgument(
                "desired_chunk_count must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_budget_subtracts_bytes_and_specials() {
        let cfg = TrainerConfig::new(259, vec!["<|endoftext|>".to_string()]);
        assert_eq!(cfg.merge_budget(), 2);
    }

    #[test]
    fn split_marker_bytes_default_to_first_special_token() {
        let cfg = TrainerConfig::new(300, vec!["<|endoftext|>".to_string(), "<|pad|>".to_string()]);
        assert_eq!(cfg.split_marker_bytes(), b"<|endoftext|>".to_vec());
    }

    #[test]
    fn validate_rejects_too_small_vocab() {
        let cfg = TrainerConfig::new(256, vec!["<|endoftext|>".to_string()]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_special_tokens() {
        let cfg = TrainerConfig::new(
            1000,
            vec!["<|endoftext|>".to_string(), "<|endoftext|>".to_string()],
        );
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_accepts_minimal_config() {
        let cfg = TrainerConfig::new(257, vec!["<|endoftext|>".to_string()]);
        assert!(cfg.validate().is_ok());
    }
}
