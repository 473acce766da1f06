//! Trains a byte-pair encoding (BPE) tokenizer vocabulary over a UTF-8 text
//! corpus: chunks the input file at safe split points, pre-tokenizes each
//! chunk in parallel into a frequency table, then runs the incremental
//! merge loop that repeatedly selects the most frequent adjacent byte-pair
//! and rewrites the table.
//!
//! Encoding/decoding with a trained vocabulary, and incremental retraining,
//! are out of scope: this crate produces a final `(vocab, merges)` artifact
//! from a bounded input file.

pub mod bpe;
pub mod chunker;
pub mod config;
pub mod error;
pub mod merger;
pub mod pretokenizer;
pub mod trainer;

pub use config::TrainerConfig;
pub use error::{Result, TrainError};
pub use trainer::{train, Merge, Vocab};
