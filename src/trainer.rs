//! Orchestrates the four training components in a linear data flow:
//! Chunker -> Pre-tokenizer (fan-out parallel) -> Frequency merger -> BPE
//! merge engine -> vocab assembly.

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;

use crate::bpe::MergeEngine;
use crate::chunker::find_chunk_boundaries;
use crate::config::TrainerConfig;
use crate::error::{Result, TrainError};
use crate::merger::merge_frequency_tables;
use crate::pretokenizer::pretokenize_range;

/// A trained vocabulary: integer id to byte-sequence.
pub type Vocab = HashMap<u32, Vec<u8>>;

/// An ordered, learned byte-pair merge.
pub type Merge = (Vec<u8>, Vec<u8>);

/// Trains a BPE vocabulary and merge list over the corpus at `input_path`.
///
/// `vocab` assigns ids 0..255 to the single-byte values, the next
/// `|special_tokens|` ids to the special tokens in order, and subsequent ids
/// to merge-pair concatenations in the order merges were learned.
pub fn train(config: &TrainerConfig, input_path: &Path) -> Result<(Vocab, Vec<Merge>)> {
    if input_path.as_os_str().is_empty() {
        return Err(TrainError::InvalidArgument("input_path must not be empty".to_string()));
    }
    config.validate()?;

    let marker = config.split_marker_bytes();
    let boundaries = find_chunk_boundaries(input_path, config.desired_chunk_count, &marker)?;

    let ranges: Vec<(u64, u64)> = boundaries.windows(2).map(|w| (w[0], w[1])).collect();
    log::debug!("trainer: pre-tokenizing {} chunk(s) in parallel", ranges.len());

    let per_chunk: Result<Vec<_>> = ranges
        .par_iter()
        .map(|&(start, end)| pretokenize_range(input_path, start, end, &config.special_tokens))
        .collect();
    let per_chunk = per_chunk?;

    let freqs = merge_frequency_tables(per_chunk);
    log::debug!("trainer: merged frequency table has {} distinct pre-tokens", freqs.len());

    let k = config.merge_budget();
    let merges = MergeEngine::new(freqs).train(k);

    let vocab = assemble_vocab(&config.special_tokens, &merges);
    Ok((vocab, merges))
}

fn assemble_vocab(special_tokens: &[String], merges: &[Merge]) -> Vocab {
    let mut vocab = HashMap::with_capacity(256 + special_tokens.len() + merges.len());
    for byte in 0u32..256 {
        vocab.insert(byte, vec![byte as u8]);
    }
    for (i, token) in special_tokens.iter().enumerate() {
        vocab.insert(256 + i as u32, token.as_bytes().to_vec());
    }
    let base = 256 + special_tokens.len() as u32;
    for (i, (a, b)) in merges.iter().enumerate() {
        let mut bytes = a.clone();
        bytes.extend_from_slice(b);
        vocab.insert(base + i as u32, bytes);
    }
    vocab
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_temp(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn empty_corpus_yields_only_bytes_and_specials() {
        let file = write_temp(b"");
        let config = TrainerConfig::new(257, vec!["<|endoftext|>".to_string()]);
        let (vocab, merges) = train(&config, file.path()).unwrap();
        assert!(merges.is_empty());
        assert_eq!(vocab.len(), 257);
        for b in 0u32..256 {
            assert_eq!(vocab[&b], vec![b as u8]);
        }
        assert_eq!(vocab[&256], b"<|endoftext|>".to_vec());
    }

    #[test]
    fn vocab_covers_exactly_the_expected_id_range() {
        let file = write_temp(b"aaabdaaabac");
        let config = TrainerConfig::new(259, vec!["<|endoftext|>".to_string()]);
        let (vocab, merges) = train(&config, file.path()).unwrap();
        let expected_len = 256 + config.special_tokens.len() + merges.len();
        assert_eq!(vocab.len(), expected_len);
        for id in 0..expected_len as u32 {
            assert!(vocab.contains_key(&id), "missing id {id}");
        }
    }

    #[test]
    fn determinism_across_chunk_counts() {
        let contents = b"the quick brown fox jumps over the lazy dog. the dog barks.";
        let file = write_temp(contents);
        let config1 = TrainerConfig::new(280, vec!["<|endoftext|>".to_string()])
            .with_desired_chunk_count(1);
        let config8 = TrainerConfig::new(280, vec!["<|endoftext|>".to_string()])
            .with_desired_chunk_count(8);
        let (_, merges1) = train(&config1, file.path()).unwrap();
        let (_, merges8) = train(&config8, file.path()).unwrap();
        assert_eq!(merges1, merges8);
    }

    #[test]
    fn rejects_vocab_size_below_floor() {
        let file = write_temp(b"x");
        let config = TrainerConfig::new(200, vec!["<|endoftext|>".to_string()]);
        assert!(train(&config, file.path()).is_err());
    }
}
